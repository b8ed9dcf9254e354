use tracing::{debug, info, instrument, warn};

use super::slash::{parse_slash_command, LabelVerb, SlashCommand};
use super::{Feedback, Orchestrator, PipelineReport};
use crate::comments::CommentIdentity;
use crate::github::events::{IssueCommentAction, IssueCommentEvent};
use crate::github::{GitHubApi, GitHubResult, ObjectRef, Reaction};
use crate::labels::{LabelTarget, Taxonomy};
use crate::reconcile::Reconciler;

impl Orchestrator {
    pub(super) async fn handle_issue_comment(
        &self,
        event: &IssueCommentEvent,
    ) -> Option<PipelineReport> {
        if event.action != IssueCommentAction::Created {
            debug!(action = ?event.action, "Ignoring issue comment action");
            return None;
        }
        let author = &event.comment.user;
        if author.is_bot() {
            debug!(author = %author.login, "Comment posted by a bot");
            return None;
        }
        let command = parse_slash_command(&event.comment.body)?;

        let repo = event.repository.repo_ref();
        match self.api().is_member(&repo, &author.login).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(author = %author.login, "Ignoring slash command from non-member");
                return None;
            }
            Err(e) => {
                warn!(author = %author.login, error = %e, "Failed to check membership");
                return None;
            }
        }

        Some(self.run_slash_command(event, &command).await)
    }

    #[instrument(skip_all, fields(number = event.issue.number, verb = ?command.verb, scope = %command.scope))]
    async fn run_slash_command(
        &self,
        event: &IssueCommentEvent,
        command: &SlashCommand,
    ) -> PipelineReport {
        let target = event.object_ref();
        let api = self.api();
        let label = self.taxonomy.scope_label(&command.scope);

        let mut report = PipelineReport::new(target.clone());
        let mut feedback = Feedback::new(api, &target, &self.templates);

        let result = match command.verb {
            LabelVerb::Add => {
                let added = attach_scope_label(api, &target, &self.taxonomy, &label).await;
                if added.is_ok() {
                    report.labels.added.push(label.name.clone());
                    feedback
                        .retire(&CommentIdentity::missing_label(label.name.clone()))
                        .await;
                }
                added
            }
            LabelVerb::Remove => {
                let removed = match api.remove_label(&target, &label.name).await {
                    Err(e) if e.is_not_found() => Ok(()),
                    other => other,
                };
                if removed.is_ok() {
                    report.labels.removed.push(label.name.clone());
                }
                removed
            }
        };

        let reaction = match result {
            Ok(()) => {
                info!(label = %label.name, "Applied slash command");
                Reaction::PlusOne
            }
            Err(e) => {
                warn!(label = %label.name, error = %e, "Slash command failed");
                Reaction::MinusOne
            }
        };
        if let Err(e) = api
            .add_reaction(&target.repo, event.comment.id, reaction)
            .await
        {
            warn!(comment_id = event.comment.id, error = %e, "Failed to react to comment");
        }

        report.reaction = Some(reaction);
        report.comments = feedback.into_records();
        report
    }
}

/// Define the scope label if needed, then attach it.
async fn attach_scope_label(
    api: &dyn GitHubApi,
    target: &ObjectRef,
    taxonomy: &Taxonomy,
    label: &LabelTarget,
) -> GitHubResult<()> {
    Reconciler::new(api, target, taxonomy).ensure_label(label).await?;
    api.add_label(target, &label.name).await
}
