//! Per-check commit status state machine.
//!
//! A [`CheckBoard`] owns the four check categories of one pull request run.
//! It only exposes failure marks and [`CheckBoard::finalize`], so a category
//! that failed can never be reported as successful later in the same run.
//! Every transition is pushed to the commit status endpoint right away.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::github::{GitHubApi, RepoRef, StatusUpdate};

/// Independent pass/fail gate reported as a commit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CheckCategory {
    TitleFormat,
    CommitFormat,
    SizeLimit,
    Labeler,
}

impl CheckCategory {
    pub const ALL: [CheckCategory; 4] = [
        Self::TitleFormat,
        Self::CommitFormat,
        Self::SizeLimit,
        Self::Labeler,
    ];

    /// Status context string. Branch protection rules match on these.
    #[must_use]
    pub const fn context(self) -> &'static str {
        match self {
            Self::TitleFormat => "PR_Check_Title",
            Self::CommitFormat => "PR_Check_Commits",
            Self::SizeLimit => "PR_Check_SizeChanges",
            Self::Labeler => "PR_Labeler",
        }
    }

    /// Human-readable description shown next to the status.
    #[must_use]
    pub const fn description(self, state: CheckState) -> &'static str {
        match (self, state) {
            (Self::TitleFormat, CheckState::Pending) => "Checking PR title",
            (Self::TitleFormat, CheckState::Success) => "PR title is valid",
            (Self::TitleFormat, CheckState::Failure | CheckState::Error) => "PR title is invalid",
            (Self::CommitFormat, CheckState::Pending) => "Checking PR commits",
            (Self::CommitFormat, CheckState::Success) => "PR has valid commits",
            (Self::CommitFormat, CheckState::Failure | CheckState::Error) => {
                "PR has invalid commits"
            }
            (Self::SizeLimit, CheckState::Pending) => "Checking size changes",
            (Self::SizeLimit, CheckState::Success) => "Successfully checked size changes",
            (Self::SizeLimit, CheckState::Failure | CheckState::Error) => {
                "Failed to check size changes"
            }
            (Self::Labeler, CheckState::Pending) => "Labeling PR",
            (Self::Labeler, CheckState::Success) => "Successfully labeled PR",
            (Self::Labeler, CheckState::Failure | CheckState::Error) => "Failed to label PR",
        }
    }
}

impl fmt::Display for CheckCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.context())
    }
}

/// Commit status state, serialized the way the statuses API expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckState {
    Pending,
    Success,
    Failure,
    Error,
}

impl CheckState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Error => "error",
        }
    }

    #[must_use]
    pub const fn is_pending(self) -> bool {
        matches!(self, Self::Pending)
    }
}

impl fmt::Display for CheckState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check states of one pull request run, bound to its head SHA.
pub struct CheckBoard<'a> {
    api: &'a dyn GitHubApi,
    repo: RepoRef,
    sha: String,
    states: BTreeMap<CheckCategory, CheckState>,
}

impl<'a> CheckBoard<'a> {
    /// Put every category in `Pending` and publish it.
    pub async fn start(api: &'a dyn GitHubApi, repo: RepoRef, sha: impl Into<String>) -> Self {
        let mut board = Self {
            api,
            repo,
            sha: sha.into(),
            states: BTreeMap::new(),
        };
        for category in CheckCategory::ALL {
            board.states.insert(category, CheckState::Pending);
            board.push(category, CheckState::Pending).await;
        }
        board
    }

    #[must_use]
    pub fn state(&self, category: CheckCategory) -> CheckState {
        self.states
            .get(&category)
            .copied()
            .unwrap_or(CheckState::Pending)
    }

    /// The check found a problem with the pull request.
    pub async fn mark_failure(&mut self, category: CheckCategory) {
        self.settle(category, CheckState::Failure).await;
    }

    /// The check could not be evaluated because a GitHub call failed.
    pub async fn mark_error(&mut self, category: CheckCategory) {
        self.settle(category, CheckState::Error).await;
    }

    /// Promote every category still pending to `Success` and return the final states.
    pub async fn finalize(mut self) -> BTreeMap<CheckCategory, CheckState> {
        for category in CheckCategory::ALL {
            self.settle(category, CheckState::Success).await;
        }
        self.states
    }

    // The first terminal state of a category wins.
    async fn settle(&mut self, category: CheckCategory, next: CheckState) {
        let current = self.state(category);
        if !current.is_pending() {
            debug!(
                check = %category,
                current = %current,
                ignored = %next,
                "Check already settled"
            );
            return;
        }
        self.states.insert(category, next);
        self.push(category, next).await;
    }

    async fn push(&self, category: CheckCategory, state: CheckState) {
        let update = StatusUpdate {
            context: category.context().to_string(),
            state,
            description: category.description(state).to_string(),
        };
        if let Err(e) = self.api.create_status(&self.repo, &self.sha, &update).await {
            warn!(
                repo = %self.repo,
                sha = %self.sha,
                check = %category,
                state = %state,
                error = %e,
                "Failed to publish commit status"
            );
        }
    }
}
