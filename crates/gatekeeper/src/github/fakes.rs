//! In-memory GitHub fake (testing only)
//!
//! `MemoryGitHub` implements [`GitHubApi`] over plain collections and exposes
//! builders to seed repository state, inspection helpers to assert on it, and
//! switches to inject the failures the pipelines must tolerate.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{
    CommitInfo, GitHubApi, GitHubResult, IssueComment, Label, LabelSpec, ObjectRef, Reaction,
    RepoRef, StatusUpdate, User,
};
use crate::error::GitHubError;

/// Login the fake uses for comments created through the API.
pub const BOT_LOGIN: &str = "gatekeeper[bot]";

#[derive(Debug, Default)]
struct State {
    next_comment_id: u64,
    comments: BTreeMap<u64, (ObjectRef, IssueComment)>,
    definitions: HashMap<RepoRef, BTreeMap<String, Label>>,
    attached: HashMap<ObjectRef, BTreeSet<String>>,
    commits: HashMap<ObjectRef, Vec<CommitInfo>>,
    statuses: Vec<(String, StatusUpdate)>,
    reactions: Vec<(u64, Reaction)>,
    members: HashSet<String>,
    edits: usize,

    vanish_on_edit: HashSet<u64>,
    fail_label_add: HashSet<String>,
    fail_label_remove: HashSet<String>,
    race_label_creation: HashSet<String>,
    fail_commit_listing: bool,
    fail_label_listing: bool,
    fail_statuses: bool,
    fail_membership: bool,
}

/// In-memory GitHub backed by `Mutex`-guarded collections.
#[derive(Debug, Default)]
pub struct MemoryGitHub {
    state: Mutex<State>,
}

impl MemoryGitHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -----------------------------------------------------------------------
    // Seeding
    // -----------------------------------------------------------------------

    /// Define a label in the repository without attaching it anywhere.
    pub fn define_label(&self, repo: &RepoRef, name: &str) {
        self.lock().definitions.entry(repo.clone()).or_default().insert(
            name.to_string(),
            Label {
                name: name.to_string(),
                color: "ededed".to_string(),
            },
        );
    }

    /// Define a label and attach it to the object.
    pub fn attach_label(&self, target: &ObjectRef, name: &str) {
        self.define_label(&target.repo, name);
        self.lock()
            .attached
            .entry(target.clone())
            .or_default()
            .insert(name.to_string());
    }

    pub fn set_commits(&self, target: &ObjectRef, commits: &[(&str, &str)]) {
        let commits = commits
            .iter()
            .map(|(sha, message)| CommitInfo {
                sha: (*sha).to_string(),
                message: (*message).to_string(),
            })
            .collect();
        self.lock().commits.insert(target.clone(), commits);
    }

    pub fn add_member(&self, login: &str) {
        self.lock().members.insert(login.to_string());
    }

    /// Post a comment as `login`, bypassing the API.
    pub fn insert_comment(&self, target: &ObjectRef, login: &str, body: &str) -> u64 {
        let mut state = self.lock();
        Self::push_comment(&mut state, target, login, body).id
    }

    /// Delete a comment behind the bot's back.
    pub fn delete_comment_out_of_band(&self, comment_id: u64) {
        self.lock().comments.remove(&comment_id);
    }

    // -----------------------------------------------------------------------
    // Failure injection
    // -----------------------------------------------------------------------

    /// The comment disappears when the next edit reaches it; the edit gets a 404.
    pub fn vanish_on_edit(&self, comment_id: u64) {
        self.lock().vanish_on_edit.insert(comment_id);
    }

    pub fn fail_label_add(&self, name: &str) {
        self.lock().fail_label_add.insert(name.to_string());
    }

    pub fn fail_label_remove(&self, name: &str) {
        self.lock().fail_label_remove.insert(name.to_string());
    }

    /// `get_label` misses, then `create_label` loses the race to another writer.
    pub fn race_label_creation(&self, name: &str) {
        self.lock().race_label_creation.insert(name.to_string());
    }

    pub fn fail_commit_listing(&self) {
        self.lock().fail_commit_listing = true;
    }

    pub fn fail_label_listing(&self) {
        self.lock().fail_label_listing = true;
    }

    pub fn fail_statuses(&self) {
        self.lock().fail_statuses = true;
    }

    pub fn fail_membership(&self) {
        self.lock().fail_membership = true;
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    /// Comments on the object, oldest first.
    pub fn comments(&self, target: &ObjectRef) -> Vec<IssueComment> {
        self.lock()
            .comments
            .values()
            .filter(|(owner, _)| owner == target)
            .map(|(_, comment)| comment.clone())
            .collect()
    }

    pub fn issue_labels(&self, target: &ObjectRef) -> BTreeSet<String> {
        self.lock()
            .attached
            .get(target)
            .cloned()
            .unwrap_or_default()
    }

    pub fn has_label_definition(&self, repo: &RepoRef, name: &str) -> bool {
        self.lock()
            .definitions
            .get(repo)
            .is_some_and(|labels| labels.contains_key(name))
    }

    pub fn label_definition(&self, repo: &RepoRef, name: &str) -> Option<Label> {
        self.lock()
            .definitions
            .get(repo)
            .and_then(|labels| labels.get(name).cloned())
    }

    /// Every status pushed for the SHA, in push order.
    pub fn statuses(&self, sha: &str) -> Vec<StatusUpdate> {
        self.lock()
            .statuses
            .iter()
            .filter(|(s, _)| s == sha)
            .map(|(_, update)| update.clone())
            .collect()
    }

    pub fn latest_status(&self, sha: &str, context: &str) -> Option<StatusUpdate> {
        self.statuses(sha)
            .into_iter()
            .rev()
            .find(|update| update.context == context)
    }

    pub fn reactions(&self, comment_id: u64) -> Vec<Reaction> {
        self.lock()
            .reactions
            .iter()
            .filter(|(id, _)| *id == comment_id)
            .map(|(_, reaction)| *reaction)
            .collect()
    }

    /// Number of successful comment edits.
    pub fn edit_count(&self) -> usize {
        self.lock().edits
    }

    fn push_comment(state: &mut State, target: &ObjectRef, login: &str, body: &str) -> IssueComment {
        state.next_comment_id += 1;
        let comment = IssueComment {
            id: state.next_comment_id,
            body: body.to_string(),
            user: Some(User {
                login: login.to_string(),
            }),
        };
        state
            .comments
            .insert(comment.id, (target.clone(), comment.clone()));
        comment
    }
}

fn not_found(what: impl Into<String>) -> GitHubError {
    GitHubError::NotFound(what.into())
}

fn injected(what: &str) -> GitHubError {
    GitHubError::Api {
        status: 500,
        message: format!("injected failure: {what}"),
    }
}

#[async_trait]
impl GitHubApi for MemoryGitHub {
    async fn list_comments(&self, target: &ObjectRef) -> GitHubResult<Vec<IssueComment>> {
        Ok(self.comments(target))
    }

    async fn create_comment(&self, target: &ObjectRef, body: &str) -> GitHubResult<IssueComment> {
        let mut state = self.lock();
        Ok(Self::push_comment(&mut state, target, BOT_LOGIN, body))
    }

    async fn edit_comment(
        &self,
        _repo: &RepoRef,
        comment_id: u64,
        body: &str,
    ) -> GitHubResult<IssueComment> {
        let mut state = self.lock();
        if state.vanish_on_edit.remove(&comment_id) {
            state.comments.remove(&comment_id);
        }
        let Some((_, comment)) = state.comments.get_mut(&comment_id) else {
            return Err(not_found(format!("comment {comment_id}")));
        };
        comment.body = body.to_string();
        let updated = comment.clone();
        state.edits += 1;
        Ok(updated)
    }

    async fn delete_comment(&self, _repo: &RepoRef, comment_id: u64) -> GitHubResult<()> {
        self.lock()
            .comments
            .remove(&comment_id)
            .map(|_| ())
            .ok_or_else(|| not_found(format!("comment {comment_id}")))
    }

    async fn add_reaction(
        &self,
        _repo: &RepoRef,
        comment_id: u64,
        reaction: Reaction,
    ) -> GitHubResult<()> {
        self.lock().reactions.push((comment_id, reaction));
        Ok(())
    }

    async fn get_label(&self, repo: &RepoRef, name: &str) -> GitHubResult<Label> {
        let state = self.lock();
        if state.race_label_creation.contains(name) {
            return Err(not_found(format!("label {name}")));
        }
        state
            .definitions
            .get(repo)
            .and_then(|labels| labels.get(name).cloned())
            .ok_or_else(|| not_found(format!("label {name}")))
    }

    async fn create_label(&self, repo: &RepoRef, spec: &LabelSpec) -> GitHubResult<Label> {
        let mut state = self.lock();
        let raced = state.race_label_creation.remove(&spec.name);
        let labels = state.definitions.entry(repo.clone()).or_default();
        if raced || labels.contains_key(&spec.name) {
            labels.entry(spec.name.clone()).or_insert_with(|| Label {
                name: spec.name.clone(),
                color: spec.color.clone(),
            });
            return Err(GitHubError::AlreadyExists(format!("label {}", spec.name)));
        }
        let label = Label {
            name: spec.name.clone(),
            color: spec.color.clone(),
        };
        labels.insert(spec.name.clone(), label.clone());
        Ok(label)
    }

    async fn list_issue_labels(&self, target: &ObjectRef) -> GitHubResult<Vec<Label>> {
        let state = self.lock();
        if state.fail_label_listing {
            return Err(injected("list labels"));
        }
        let definitions = state.definitions.get(&target.repo);
        Ok(state
            .attached
            .get(target)
            .into_iter()
            .flatten()
            .map(|name| {
                definitions
                    .and_then(|labels| labels.get(name).cloned())
                    .unwrap_or_else(|| Label {
                        name: name.clone(),
                        color: String::new(),
                    })
            })
            .collect())
    }

    async fn add_label(&self, target: &ObjectRef, name: &str) -> GitHubResult<()> {
        let mut state = self.lock();
        if state.fail_label_add.contains(name) {
            return Err(injected("add label"));
        }
        let defined = state
            .definitions
            .get(&target.repo)
            .is_some_and(|labels| labels.contains_key(name));
        if !defined {
            return Err(GitHubError::Api {
                status: 422,
                message: format!("label {name} is not defined"),
            });
        }
        state
            .attached
            .entry(target.clone())
            .or_default()
            .insert(name.to_string());
        Ok(())
    }

    async fn remove_label(&self, target: &ObjectRef, name: &str) -> GitHubResult<()> {
        let mut state = self.lock();
        if state.fail_label_remove.contains(name) {
            return Err(injected("remove label"));
        }
        let removed = state
            .attached
            .get_mut(target)
            .is_some_and(|labels| labels.remove(name));
        if removed {
            Ok(())
        } else {
            Err(not_found(format!("label {name} on {target}")))
        }
    }

    async fn list_commits(&self, target: &ObjectRef) -> GitHubResult<Vec<CommitInfo>> {
        let state = self.lock();
        if state.fail_commit_listing {
            return Err(injected("list commits"));
        }
        Ok(state.commits.get(target).cloned().unwrap_or_default())
    }

    async fn create_status(
        &self,
        _repo: &RepoRef,
        sha: &str,
        status: &StatusUpdate,
    ) -> GitHubResult<()> {
        let mut state = self.lock();
        if state.fail_statuses {
            return Err(injected("create status"));
        }
        state.statuses.push((sha.to_string(), status.clone()));
        Ok(())
    }

    async fn is_member(&self, _repo: &RepoRef, login: &str) -> GitHubResult<bool> {
        let state = self.lock();
        if state.fail_membership {
            return Err(injected("membership"));
        }
        Ok(state.members.contains(login))
    }
}
