use std::collections::HashSet;

use tracing::{debug, info, warn};

use super::markers::Markers;
use super::rules::{CommentIdentity, CommentTemplates, RuleId, Violation};
use crate::github::{GitHubApi, GitHubResult, IssueComment, ObjectRef};

/// What a protocol call did to the comment thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentOutcome {
    Created { id: u64 },
    Edited { id: u64 },
    /// The live comment already had the exact body.
    Unchanged { id: u64 },
    Removed { id: u64 },
    /// Nothing to remove.
    Absent,
}

/// A protocol call and the identity it applied to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentRecord {
    pub identity: CommentIdentity,
    pub outcome: CommentOutcome,
}

/// Creates, edits and retires bot comments on one issue or pull request.
///
/// Every call re-reads the comment thread. Overlapping deliveries for the same
/// object can still race; duplicates left behind by such a race are cleaned
/// up by the next `edit_or_create` or `remove_if_present`.
pub struct CommentProtocol<'a> {
    api: &'a dyn GitHubApi,
    target: &'a ObjectRef,
    templates: &'a CommentTemplates,
}

impl<'a> CommentProtocol<'a> {
    pub fn new(
        api: &'a dyn GitHubApi,
        target: &'a ObjectRef,
        templates: &'a CommentTemplates,
    ) -> Self {
        Self {
            api,
            target,
            templates,
        }
    }

    /// First comment carrying this identity, if any.
    pub async fn find(&self, identity: &CommentIdentity) -> GitHubResult<Option<IssueComment>> {
        Ok(self.find_all(identity).await?.into_iter().next())
    }

    async fn find_all(&self, identity: &CommentIdentity) -> GitHubResult<Vec<IssueComment>> {
        let comments = self.api.list_comments(self.target).await?;
        Ok(comments
            .into_iter()
            .filter(|comment| identity.matches(&Markers::parse(&comment.body)))
            .collect())
    }

    /// Post the violation unless a comment with its identity already exists.
    pub async fn create_if_absent(&self, violation: &Violation) -> GitHubResult<CommentOutcome> {
        let identity = violation.identity();
        if let Some(existing) = self.find(&identity).await? {
            return Ok(CommentOutcome::Unchanged { id: existing.id });
        }
        self.create(violation).await
    }

    /// Refresh the violation comment, creating it when none exists or when the
    /// one found was deleted in the meantime.
    pub async fn edit_or_create(&self, violation: &Violation) -> GitHubResult<CommentOutcome> {
        let identity = violation.identity();
        let mut matches = self.find_all(&identity).await?.into_iter();

        let Some(existing) = matches.next() else {
            return self.create(violation).await;
        };

        for duplicate in matches {
            self.delete_duplicate(&identity, duplicate.id).await;
        }

        let body = self.templates.body(violation);
        if existing.body == body {
            return Ok(CommentOutcome::Unchanged { id: existing.id });
        }

        match self
            .api
            .edit_comment(&self.target.repo, existing.id, &body)
            .await
        {
            Ok(comment) => {
                debug!(target_ref = %self.target, identity = %identity, comment_id = comment.id, "Edited bot comment");
                Ok(CommentOutcome::Edited { id: comment.id })
            }
            Err(e) if e.is_not_found() => {
                debug!(
                    target_ref = %self.target,
                    identity = %identity,
                    comment_id = existing.id,
                    "Bot comment vanished before edit, recreating"
                );
                self.create(violation).await
            }
            Err(e) => Err(e),
        }
    }

    /// Delete every comment carrying this identity.
    pub async fn remove_if_present(
        &self,
        identity: &CommentIdentity,
    ) -> GitHubResult<CommentOutcome> {
        let matches = self.find_all(identity).await?;
        let Some(first) = matches.first().map(|c| c.id) else {
            return Ok(CommentOutcome::Absent);
        };

        for comment in &matches {
            match self.api.delete_comment(&self.target.repo, comment.id).await {
                Ok(()) => {}
                // Already gone is the state we wanted
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }

        info!(target_ref = %self.target, identity = %identity, count = matches.len(), "Removed bot comment");
        Ok(CommentOutcome::Removed { id: first })
    }

    /// Delete comments of a disambiguated rule whose disambiguator is not in
    /// `keep`: commit comments after a force-push, or label comments after
    /// the scope changed.
    pub async fn retire_stale(
        &self,
        rule: RuleId,
        keep: &HashSet<String>,
    ) -> GitHubResult<Vec<CommentRecord>> {
        let Some(key) = rule.disambiguator_key() else {
            return Ok(Vec::new());
        };
        let comments = self.api.list_comments(self.target).await?;
        let mut outcomes = Vec::new();

        for comment in comments {
            let markers = Markers::parse(&comment.body);
            if markers.bot_id() != Some(rule.code()) {
                continue;
            }
            let Some(value) = markers.get(key).map(ToString::to_string) else {
                continue;
            };
            if keep.contains(&value) {
                continue;
            }

            match self.api.delete_comment(&self.target.repo, comment.id).await {
                Ok(()) => {
                    info!(target_ref = %self.target, rule = %rule, disambiguator = %value, comment_id = comment.id, "Removed stale bot comment");
                    outcomes.push(CommentRecord {
                        identity: CommentIdentity {
                            rule,
                            disambiguator: Some(value),
                        },
                        outcome: CommentOutcome::Removed { id: comment.id },
                    });
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    warn!(target_ref = %self.target, rule = %rule, disambiguator = %value, error = %e, "Failed to remove stale bot comment");
                }
            }
        }

        Ok(outcomes)
    }

    async fn create(&self, violation: &Violation) -> GitHubResult<CommentOutcome> {
        let body = self.templates.body(violation);
        let comment = self.api.create_comment(self.target, &body).await?;
        info!(
            target_ref = %self.target,
            identity = %violation.identity(),
            comment_id = comment.id,
            "Created bot comment"
        );
        Ok(CommentOutcome::Created { id: comment.id })
    }

    async fn delete_duplicate(&self, identity: &CommentIdentity, comment_id: u64) {
        match self.api.delete_comment(&self.target.repo, comment_id).await {
            Ok(()) => {
                debug!(target_ref = %self.target, identity = %identity, comment_id, "Removed duplicate bot comment");
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => {
                warn!(target_ref = %self.target, identity = %identity, comment_id, error = %e, "Failed to remove duplicate bot comment");
            }
        }
    }
}
