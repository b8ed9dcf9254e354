//! Webhook payloads, decoded once at the boundary into a closed set of events.

use serde::Deserialize;

use super::{AuthorAssociation, Label, ObjectRef, RepoRef, User};
use crate::error::WebhookError;

/// Repository block shared by every payload.
#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    pub name: String,
    pub owner: User,
}

impl Repository {
    #[must_use]
    pub fn repo_ref(&self) -> RepoRef {
        RepoRef::new(self.owner.login.clone(), self.name.clone())
    }
}

/// Head commit of a pull request.
#[derive(Debug, Clone, Deserialize)]
pub struct GitRef {
    pub sha: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub head: GitRef,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
    pub author_association: AuthorAssociation,
    pub user: User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PullRequestAction {
    Opened,
    Edited,
    Synchronize,
    Reopened,
    Closed,
    Labeled,
    Unlabeled,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestEvent {
    pub action: PullRequestAction,
    pub pull_request: PullRequest,
    pub repository: Repository,
}

impl PullRequestEvent {
    #[must_use]
    pub fn object_ref(&self) -> ObjectRef {
        ObjectRef::new(self.repository.repo_ref(), self.pull_request.number)
    }
}

/// Present on issues that are really pull requests.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestLink {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    pub author_association: AuthorAssociation,
    pub user: User,
    #[serde(default)]
    pub pull_request: Option<PullRequestLink>,
}

impl Issue {
    #[must_use]
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssuesAction {
    Opened,
    Edited,
    Reopened,
    Labeled,
    Unlabeled,
    Closed,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssuesEvent {
    pub action: IssuesAction,
    pub issue: Issue,
    /// The label just applied or removed, on `labeled`/`unlabeled`.
    #[serde(default)]
    pub label: Option<Label>,
    pub repository: Repository,
}

impl IssuesEvent {
    #[must_use]
    pub fn object_ref(&self) -> ObjectRef {
        ObjectRef::new(self.repository.repo_ref(), self.issue.number)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Comment {
    pub id: u64,
    #[serde(default)]
    pub body: String,
    pub user: User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCommentAction {
    Created,
    Edited,
    Deleted,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueCommentEvent {
    pub action: IssueCommentAction,
    pub comment: Comment,
    pub issue: Issue,
    pub repository: Repository,
}

impl IssueCommentEvent {
    #[must_use]
    pub fn object_ref(&self) -> ObjectRef {
        ObjectRef::new(self.repository.repo_ref(), self.issue.number)
    }
}

/// A decoded delivery.
#[derive(Debug, Clone)]
pub enum WebhookEvent {
    PullRequest(Box<PullRequestEvent>),
    Issues(Box<IssuesEvent>),
    IssueComment(Box<IssueCommentEvent>),
    Ping,
    Unsupported { event: String },
}

impl WebhookEvent {
    /// Decode a delivery from its `X-GitHub-Event` value and raw body.
    pub fn parse(event_type: &str, body: &[u8]) -> Result<Self, WebhookError> {
        let payload_error = |source| WebhookError::Payload {
            event: event_type.to_string(),
            source,
        };
        match event_type {
            "pull_request" => serde_json::from_slice(body)
                .map(|e| Self::PullRequest(Box::new(e)))
                .map_err(payload_error),
            "issues" => serde_json::from_slice(body)
                .map(|e| Self::Issues(Box::new(e)))
                .map_err(payload_error),
            "issue_comment" => serde_json::from_slice(body)
                .map(|e| Self::IssueComment(Box::new(e)))
                .map_err(payload_error),
            "ping" => Ok(Self::Ping),
            other => Ok(Self::Unsupported {
                event: other.to_string(),
            }),
        }
    }

    /// Event name as GitHub sends it.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::PullRequest(_) => "pull_request",
            Self::Issues(_) => "issues",
            Self::IssueComment(_) => "issue_comment",
            Self::Ping => "ping",
            Self::Unsupported { event } => event,
        }
    }

    /// Issue or pull request the event is about.
    #[must_use]
    pub fn object_ref(&self) -> Option<ObjectRef> {
        match self {
            Self::PullRequest(e) => Some(e.object_ref()),
            Self::Issues(e) => Some(e.object_ref()),
            Self::IssueComment(e) => Some(e.object_ref()),
            Self::Ping | Self::Unsupported { .. } => None,
        }
    }
}
