use std::collections::{BTreeSet, HashSet};

use tracing::{debug, instrument, warn};

use super::{Feedback, Orchestrator, PipelineReport, ScopeResolution};
use crate::comments::{CommentIdentity, RuleId, Violation};
use crate::conventional::ConventionalMessage;
use crate::github::events::{PullRequestAction, PullRequestEvent};
use crate::labels::{LabelCategory, LabelTarget};
use crate::reconcile::{DesiredLabels, Reconciler};
use crate::status::{CheckBoard, CheckCategory};

impl Orchestrator {
    pub(super) async fn handle_pull_request(
        &self,
        event: &PullRequestEvent,
    ) -> Option<PipelineReport> {
        match event.action {
            PullRequestAction::Opened
            | PullRequestAction::Edited
            | PullRequestAction::Synchronize
            | PullRequestAction::Reopened => {}
            other => {
                debug!(action = ?other, "Ignoring pull request action");
                return None;
            }
        }
        if event.pull_request.user.is_bot() {
            debug!(author = %event.pull_request.user.login, "Pull request authored by a bot");
            return None;
        }
        Some(self.run_pull_request(event).await)
    }

    /// Title, commits, scope, size and community checks, then label reconciliation.
    ///
    /// The title and every valid commit contribute their type, breaking and
    /// scope facts to the desired labels.
    #[instrument(skip_all, fields(number = event.pull_request.number, sha = %event.pull_request.head.sha))]
    async fn run_pull_request(&self, event: &PullRequestEvent) -> PipelineReport {
        let target = event.object_ref();
        let pr = &event.pull_request;
        let api = self.api();

        let mut report = PipelineReport::new(target.clone());
        let mut board = CheckBoard::start(api, target.repo.clone(), pr.head.sha.clone()).await;
        let mut feedback = Feedback::new(api, &target, &self.templates);
        let mut desired = DesiredLabels::new();

        // Title
        let mut scopes = BTreeSet::new();
        if let Some((message, type_label)) = self.conventional_facts(&pr.title) {
            feedback
                .retire(&CommentIdentity::singleton(RuleId::PrTitleInvalid))
                .await;
            self.collect_facts(message, type_label, &mut desired, &mut scopes);
        } else {
            board.mark_failure(CheckCategory::TitleFormat).await;
            feedback
                .surface(&Violation::PrTitleInvalid {
                    title: pr.title.clone(),
                })
                .await;
        }

        // Commits
        let commits_listed = match api.list_commits(&target).await {
            Ok(commits) => {
                let mut invalid = HashSet::new();
                for commit in &commits {
                    if let Some((message, type_label)) = self.conventional_facts(&commit.message) {
                        self.collect_facts(message, type_label, &mut desired, &mut scopes);
                        continue;
                    }
                    invalid.insert(commit.sha.clone());
                    feedback
                        .surface(&Violation::CommitInvalid {
                            sha: commit.sha.clone(),
                            message: commit.message.clone(),
                        })
                        .await;
                }
                if !invalid.is_empty() {
                    debug!(invalid = invalid.len(), total = commits.len(), "Found non-conventional commits");
                    board.mark_failure(CheckCategory::CommitFormat).await;
                }
                // Also drops comments for commits a force-push removed
                feedback.retire_stale(RuleId::CommitInvalid, &invalid).await;
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to list pull request commits");
                board.mark_error(CheckCategory::CommitFormat).await;
                false
            }
        };

        // Scope labels, once per distinct scope across title and commits
        let mut expected_scopes = HashSet::new();
        let mut unresolved_scopes = Vec::new();
        for scope in &scopes {
            let resolution = self.resolve_scope(scope, &mut feedback).await;
            expected_scopes.insert(resolution.label_name().to_string());
            match resolution {
                ScopeResolution::Wanted(label) => desired.insert(label),
                ScopeResolution::Missing(_) => board.mark_failure(CheckCategory::Labeler).await,
                ScopeResolution::Unknown(name) => {
                    board.mark_error(CheckCategory::Labeler).await;
                    unresolved_scopes.push(name);
                }
            }
        }
        // Without the commits, their scopes are unknown and their comments stay
        if commits_listed {
            feedback
                .retire_stale(RuleId::LabelNotExists, &expected_scopes)
                .await;
        }

        // Size
        let size = self.taxonomy.sizes().classify(pr.additions, pr.deletions);
        debug!(diff = size.diff, tier = %size.tier, "Classified pull request size");
        desired.insert(self.taxonomy.size_label(size.tier));
        if size.is_too_big() {
            feedback.surface(&Violation::SizeTooBig).await;
            if self.settings.fail_oversized {
                board.mark_failure(CheckCategory::SizeLimit).await;
            }
        } else {
            feedback
                .retire(&CommentIdentity::singleton(RuleId::SizeTooBig))
                .await;
        }

        if self
            .taxonomy
            .is_community_association(&pr.author_association)
        {
            desired.insert(self.taxonomy.community());
        }

        // Labels
        let reconciler = Reconciler::new(api, &target, &self.taxonomy);
        match reconciler.live_labels().await {
            Ok(live) => {
                // Keep scope labels we could not verify rather than strip them
                for name in unresolved_scopes.iter().filter(|name| live.contains(*name)) {
                    desired.insert(self.taxonomy.scope_label(name));
                }
                let outcome = reconciler.apply(&desired, &live).await;
                for failure in &outcome.failures {
                    if failure.category == Some(LabelCategory::Size) {
                        board.mark_error(CheckCategory::SizeLimit).await;
                    } else {
                        board.mark_failure(CheckCategory::Labeler).await;
                    }
                }
                report.labels = outcome;
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch live labels");
                board.mark_error(CheckCategory::Labeler).await;
            }
        }

        report.comments = feedback.into_records();
        report.checks = board.finalize().await;
        report
    }

    /// Labels and scope from one parsed title or commit.
    fn collect_facts(
        &self,
        message: ConventionalMessage,
        type_label: LabelTarget,
        desired: &mut DesiredLabels,
        scopes: &mut BTreeSet<String>,
    ) {
        desired.insert(type_label);
        if message.breaking_change {
            desired.insert(self.taxonomy.breaking_change());
        }
        if let Some(scope) = message.scope {
            scopes.insert(self.taxonomy.scope_label(&scope).name);
        }
    }
}
