use std::collections::HashSet;

use tracing::{debug, instrument, warn};

use super::{Feedback, Orchestrator, PipelineReport, ScopeResolution};
use crate::comments::{CommentIdentity, RuleId, Violation};
use crate::conventional::parse_issue_title;
use crate::github::events::{IssuesAction, IssuesEvent};
use crate::reconcile::{DesiredLabels, Reconciler};

impl Orchestrator {
    pub(super) async fn handle_issues(&self, event: &IssuesEvent) -> Option<PipelineReport> {
        if event.issue.is_pull_request() {
            debug!("Issue event is for a pull request");
            return None;
        }
        if event.issue.user.is_bot() {
            debug!(author = %event.issue.user.login, "Issue authored by a bot");
            return None;
        }
        match event.action {
            IssuesAction::Opened | IssuesAction::Edited | IssuesAction::Reopened => {
                Some(self.run_issue(event).await)
            }
            IssuesAction::Labeled => Some(self.run_issue_labeled(event).await),
            other => {
                debug!(action = ?other, "Ignoring issues action");
                None
            }
        }
    }

    #[instrument(skip_all, fields(number = event.issue.number))]
    async fn run_issue(&self, event: &IssuesEvent) -> PipelineReport {
        let target = event.object_ref();
        let issue = &event.issue;
        let api = self.api();

        let mut report = PipelineReport::new(target.clone());
        let mut feedback = Feedback::new(api, &target, &self.templates);
        let mut desired = DesiredLabels::new();
        let mut expected_scopes = HashSet::new();
        let mut unresolved_scope = None;

        match parse_issue_title(&issue.title) {
            Ok(title) => {
                feedback
                    .retire(&CommentIdentity::singleton(RuleId::IssueTitleInvalid))
                    .await;
                let resolution = self.resolve_scope(&title.label_scope(), &mut feedback).await;
                expected_scopes.insert(resolution.label_name().to_string());
                match resolution {
                    ScopeResolution::Wanted(label) => desired.insert(label),
                    ScopeResolution::Missing(_) => {}
                    ScopeResolution::Unknown(name) => unresolved_scope = Some(name),
                }
            }
            Err(e) => {
                debug!(title = %issue.title, error = %e, "Issue title is not conventional");
                feedback
                    .surface(&Violation::IssueTitleInvalid {
                        title: issue.title.clone(),
                    })
                    .await;
            }
        }
        feedback
            .retire_stale(RuleId::LabelNotExists, &expected_scopes)
            .await;

        if self
            .taxonomy
            .is_community_association(&issue.author_association)
        {
            desired.insert(self.taxonomy.community());
        }

        let reconciler = Reconciler::new(api, &target, &self.taxonomy);
        match reconciler.live_labels().await {
            Ok(live) => {
                if let Some(name) = unresolved_scope.filter(|name| live.contains(name)) {
                    desired.insert(self.taxonomy.scope_label(&name));
                }
                report.labels = reconciler.apply(&desired, &live).await;
            }
            Err(e) => warn!(error = %e, "Failed to fetch live labels"),
        }

        report.comments = feedback.into_records();
        report
    }

    /// A label was applied by hand; its missing-label comment is obsolete.
    async fn run_issue_labeled(&self, event: &IssuesEvent) -> PipelineReport {
        let target = event.object_ref();
        let mut report = PipelineReport::new(target.clone());
        let Some(label) = &event.label else {
            return report;
        };

        let mut feedback = Feedback::new(self.api(), &target, &self.templates);
        feedback
            .retire(&CommentIdentity::missing_label(label.name.clone()))
            .await;
        report.comments = feedback.into_records();
        report
    }
}
