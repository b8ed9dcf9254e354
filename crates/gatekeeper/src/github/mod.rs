//! GitHub collaborator surface.
//!
//! The pipelines only ever talk to [`GitHubApi`]. [`GitHubClient`] is the
//! REST implementation used by the service; [`fakes::MemoryGitHub`] backs the
//! tests.

mod client;
pub mod events;
pub mod fakes;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use client::GitHubClient;

use crate::error::GitHubError;
use crate::status::CheckState;

pub type GitHubResult<T> = Result<T, GitHubError>;

/// `owner/name` of a repository.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// An issue or pull request. Both share the issues numbering space.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectRef {
    pub repo: RepoRef,
    pub number: u64,
}

impl ObjectRef {
    #[must_use]
    pub fn new(repo: RepoRef, number: u64) -> Self {
        Self { repo, number }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.repo, self.number)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub login: String,
}

impl User {
    /// Apps post as `name[bot]`.
    #[must_use]
    pub fn is_bot(&self) -> bool {
        self.login.ends_with("[bot]")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueComment {
    pub id: u64,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub user: Option<User>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    #[serde(default)]
    pub color: String,
}

/// Definition used when creating a label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelSpec {
    pub name: String,
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub sha: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    PlusOne,
    MinusOne,
}

impl Reaction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PlusOne => "+1",
            Self::MinusOne => "-1",
        }
    }
}

/// How the author relates to the repository, as reported on the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthorAssociation {
    Owner,
    Member,
    Collaborator,
    Contributor,
    FirstTimeContributor,
    FirstTimer,
    Mannequin,
    None,
    #[serde(other)]
    Other,
}

/// One commit status push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub context: String,
    pub state: CheckState,
    pub description: String,
}

/// Every GitHub call the pipelines make. All of them are fallible I/O.
#[async_trait]
pub trait GitHubApi: Send + Sync {
    async fn list_comments(&self, target: &ObjectRef) -> GitHubResult<Vec<IssueComment>>;

    async fn create_comment(&self, target: &ObjectRef, body: &str) -> GitHubResult<IssueComment>;

    async fn edit_comment(
        &self,
        repo: &RepoRef,
        comment_id: u64,
        body: &str,
    ) -> GitHubResult<IssueComment>;

    async fn delete_comment(&self, repo: &RepoRef, comment_id: u64) -> GitHubResult<()>;

    async fn add_reaction(
        &self,
        repo: &RepoRef,
        comment_id: u64,
        reaction: Reaction,
    ) -> GitHubResult<()>;

    /// Repository label definition; `NotFound` when the repository lacks it.
    async fn get_label(&self, repo: &RepoRef, name: &str) -> GitHubResult<Label>;

    /// `AlreadyExists` when a label with that name is already defined.
    async fn create_label(&self, repo: &RepoRef, spec: &LabelSpec) -> GitHubResult<Label>;

    /// Labels currently attached to the issue or pull request.
    async fn list_issue_labels(&self, target: &ObjectRef) -> GitHubResult<Vec<Label>>;

    async fn add_label(&self, target: &ObjectRef, name: &str) -> GitHubResult<()>;

    async fn remove_label(&self, target: &ObjectRef, name: &str) -> GitHubResult<()>;

    /// Commits of a pull request, oldest first.
    async fn list_commits(&self, target: &ObjectRef) -> GitHubResult<Vec<CommitInfo>>;

    async fn create_status(
        &self,
        repo: &RepoRef,
        sha: &str,
        status: &StatusUpdate,
    ) -> GitHubResult<()>;

    /// Organization membership, or repository collaborator access when no
    /// organization is configured.
    async fn is_member(&self, repo: &RepoRef, login: &str) -> GitHubResult<bool>;
}
