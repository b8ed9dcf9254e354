//! Event pipelines.
//!
//! One pipeline per event kind. Each run rebuilds everything from the live
//! state of the issue or pull request: labels, bot comments and statuses.
//! Steps run one after another and a failing step never aborts the run.

mod issue_comment;
mod issues;
mod pull_request;
pub mod slash;

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::comments::{
    CommentIdentity, CommentOutcome, CommentProtocol, CommentRecord, CommentTemplates, RuleId,
    Violation,
};
use crate::config::PipelineSettings;
use crate::conventional::{parse_commit_title, ConventionalMessage};
use crate::github::events::WebhookEvent;
use crate::github::{GitHubApi, ObjectRef, Reaction};
use crate::labels::{LabelTarget, Taxonomy};
use crate::reconcile::ReconcileOutcome;
use crate::status::{CheckCategory, CheckState};

pub use slash::{parse_slash_command, LabelVerb, SlashCommand};

/// Summary of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub target: ObjectRef,
    pub labels: ReconcileOutcome,
    /// Comment protocol calls that changed or found something.
    pub comments: Vec<CommentRecord>,
    /// Final check states; empty for issues, which have no commit.
    pub checks: BTreeMap<CheckCategory, CheckState>,
    /// Reaction left on a slash command.
    pub reaction: Option<Reaction>,
}

impl PipelineReport {
    fn new(target: ObjectRef) -> Self {
        Self {
            target,
            labels: ReconcileOutcome::default(),
            comments: Vec::new(),
            checks: BTreeMap::new(),
            reaction: None,
        }
    }

    #[must_use]
    pub fn check(&self, category: CheckCategory) -> Option<CheckState> {
        self.checks.get(&category).copied()
    }
}

/// Runs the pipeline matching each delivered event.
///
/// Catalogs and templates are built once at startup and shared.
#[derive(Clone)]
pub struct Orchestrator {
    api: Arc<dyn GitHubApi>,
    taxonomy: Arc<Taxonomy>,
    templates: Arc<CommentTemplates>,
    settings: PipelineSettings,
}

impl Orchestrator {
    pub fn new(
        api: Arc<dyn GitHubApi>,
        taxonomy: Arc<Taxonomy>,
        templates: Arc<CommentTemplates>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            api,
            taxonomy,
            templates,
            settings,
        }
    }

    /// Run the pipeline for one delivery. `None` when the event is ignored.
    #[instrument(skip_all, fields(event = %event.name(), target_ref))]
    pub async fn handle(&self, event: &WebhookEvent) -> Option<PipelineReport> {
        if let Some(target) = event.object_ref() {
            tracing::Span::current().record("target_ref", tracing::field::display(&target));
        }

        let report = match event {
            WebhookEvent::PullRequest(e) => self.handle_pull_request(e).await,
            WebhookEvent::Issues(e) => self.handle_issues(e).await,
            WebhookEvent::IssueComment(e) => self.handle_issue_comment(e).await,
            WebhookEvent::Ping => {
                info!("Received ping");
                None
            }
            WebhookEvent::Unsupported { event } => {
                debug!(event = %event, "Ignoring unsupported event");
                None
            }
        };

        if let Some(report) = &report {
            info!(
                labels_added = report.labels.added.len(),
                labels_removed = report.labels.removed.len(),
                label_failures = report.labels.failures.len(),
                comments = report.comments.len(),
                "Pipeline finished"
            );
        }
        report
    }

    fn api(&self) -> &dyn GitHubApi {
        self.api.as_ref()
    }

    /// Parse a title or commit message and look its type up in the catalog.
    /// An unknown type counts as a parse failure.
    fn conventional_facts(&self, text: &str) -> Option<(ConventionalMessage, LabelTarget)> {
        let message = match parse_commit_title(text) {
            Ok(message) => message,
            Err(e) => {
                debug!(text = %text, error = %e, "Not a conventional message");
                return None;
            }
        };
        let Some(label) = self.taxonomy.type_label(&message.commit_type) else {
            debug!(commit_type = %message.commit_type, "Unknown commit type");
            return None;
        };
        Some((message, label))
    }

    /// Decide whether a scope label can be wanted.
    ///
    /// Missing definitions surface a label comment unless scopes are
    /// auto-created. Existing ones retire it.
    async fn resolve_scope(&self, scope: &str, feedback: &mut Feedback<'_>) -> ScopeResolution {
        let label = self.taxonomy.scope_label(scope);
        let identity = CommentIdentity::missing_label(label.name.clone());

        if self.settings.auto_create_scopes {
            feedback.retire(&identity).await;
            return ScopeResolution::Wanted(label);
        }

        let repo = &feedback.target().repo;
        match self.api().get_label(repo, &label.name).await {
            Ok(_) => {
                feedback.retire(&identity).await;
                ScopeResolution::Wanted(label)
            }
            Err(e) if e.is_not_found() => {
                debug!(label = %label.name, "Scope label is not defined");
                feedback
                    .surface(&Violation::LabelNotExists {
                        label: label.name.clone(),
                    })
                    .await;
                ScopeResolution::Missing(label.name)
            }
            Err(e) => {
                warn!(label = %label.name, error = %e, "Failed to look up scope label");
                ScopeResolution::Unknown(label.name)
            }
        }
    }
}

enum ScopeResolution {
    Wanted(LabelTarget),
    Missing(String),
    /// The lookup failed; the label name is kept so its comment survives.
    Unknown(String),
}

impl ScopeResolution {
    fn label_name(&self) -> &str {
        match self {
            Self::Wanted(label) => &label.name,
            Self::Missing(name) | Self::Unknown(name) => name,
        }
    }
}

/// Comment protocol wrapper that logs failures and records outcomes.
struct Feedback<'a> {
    protocol: CommentProtocol<'a>,
    target: &'a ObjectRef,
    records: Vec<CommentRecord>,
}

impl<'a> Feedback<'a> {
    fn new(api: &'a dyn GitHubApi, target: &'a ObjectRef, templates: &'a CommentTemplates) -> Self {
        Self {
            protocol: CommentProtocol::new(api, target, templates),
            target,
            records: Vec::new(),
        }
    }

    fn target(&self) -> &'a ObjectRef {
        self.target
    }

    /// Post or refresh the comment for a violation.
    async fn surface(&mut self, violation: &Violation) {
        let identity = violation.identity();
        match self.protocol.edit_or_create(violation).await {
            Ok(outcome) => self.records.push(CommentRecord { identity, outcome }),
            Err(e) => {
                warn!(identity = %identity, error = %e, "Failed to post bot comment");
            }
        }
    }

    /// Remove the comment for a condition that no longer holds.
    async fn retire(&mut self, identity: &CommentIdentity) {
        match self.protocol.remove_if_present(identity).await {
            Ok(CommentOutcome::Absent) => {}
            Ok(outcome) => self.records.push(CommentRecord {
                identity: identity.clone(),
                outcome,
            }),
            Err(e) => {
                warn!(identity = %identity, error = %e, "Failed to remove bot comment");
            }
        }
    }

    /// Drop comments of `rule` whose disambiguator is no longer current.
    async fn retire_stale(&mut self, rule: RuleId, keep: &HashSet<String>) {
        match self.protocol.retire_stale(rule, keep).await {
            Ok(records) => self.records.extend(records),
            Err(e) => {
                warn!(rule = %rule, error = %e, "Failed to remove stale bot comments");
            }
        }
    }

    fn into_records(self) -> Vec<CommentRecord> {
        self.records
    }
}
