//! Label reconciliation.
//!
//! The desired label set is recomputed on every delivery and compared with the
//! labels attached right now. Only the difference is applied, so re-running
//! against an already converged object makes no calls beyond the read.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, instrument, warn};

use crate::github::{GitHubApi, GitHubResult, ObjectRef};
use crate::labels::{LabelCategory, LabelTarget, Taxonomy};

/// Labels one pipeline run wants attached, deduplicated by name.
#[derive(Debug, Clone, Default)]
pub struct DesiredLabels {
    targets: BTreeMap<String, LabelTarget>,
}

impl DesiredLabels {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a label. A second insert of the same name is ignored.
    pub fn insert(&mut self, target: LabelTarget) {
        self.targets.entry(target.name.clone()).or_insert(target);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&LabelTarget> {
        self.targets.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.targets.contains_key(name)
    }

    #[must_use]
    pub fn names(&self) -> BTreeSet<String> {
        self.targets.keys().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Add/remove sets that turn the live labels into the desired ones.
///
/// Names compare case-sensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelDiff {
    pub to_add: BTreeSet<String>,
    pub to_remove: BTreeSet<String>,
}

impl LabelDiff {
    #[must_use]
    pub fn compute(desired: &BTreeSet<String>, live: &BTreeSet<String>) -> Self {
        Self {
            to_add: desired.difference(live).cloned().collect(),
            to_remove: live.difference(desired).cloned().collect(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelOperation {
    Add,
    Remove,
}

/// A label the reconciler could not converge. The batch carried on past it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelFailure {
    pub label: String,
    /// Catalog of the label, when it was one of ours.
    pub category: Option<LabelCategory>,
    pub operation: LabelOperation,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub failures: Vec<LabelFailure>,
}

/// Applies label diffs to one issue or pull request.
pub struct Reconciler<'a> {
    api: &'a dyn GitHubApi,
    target: &'a ObjectRef,
    taxonomy: &'a Taxonomy,
}

impl<'a> Reconciler<'a> {
    pub fn new(api: &'a dyn GitHubApi, target: &'a ObjectRef, taxonomy: &'a Taxonomy) -> Self {
        Self {
            api,
            target,
            taxonomy,
        }
    }

    /// Names of the labels attached right now.
    pub async fn live_labels(&self) -> GitHubResult<BTreeSet<String>> {
        let labels = self.api.list_issue_labels(self.target).await?;
        Ok(labels.into_iter().map(|label| label.name).collect())
    }

    /// Make sure the repository defines the label. A concurrent creation
    /// reported as "already exists" counts as success.
    pub async fn ensure_label(&self, label: &LabelTarget) -> GitHubResult<()> {
        match self.api.get_label(&self.target.repo, &label.name).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => {
                match self.api.create_label(&self.target.repo, &label.spec()).await {
                    Ok(_) => {
                        info!(repo = %self.target.repo, label = %label.name, "Created label");
                        Ok(())
                    }
                    Err(e) if e.is_already_exists() => Ok(()),
                    Err(e) => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Converge the attached labels on `desired`. Per-label failures are
    /// logged and collected; they never stop the batch.
    #[instrument(skip(self, desired, live), fields(target_ref = %self.target))]
    pub async fn apply(
        &self,
        desired: &DesiredLabels,
        live: &BTreeSet<String>,
    ) -> ReconcileOutcome {
        let diff = LabelDiff::compute(&desired.names(), live);
        let mut outcome = ReconcileOutcome::default();

        if diff.is_empty() {
            debug!("Labels already converged");
            return outcome;
        }

        for name in &diff.to_remove {
            match self.api.remove_label(self.target, name).await {
                Ok(()) => outcome.removed.push(name.clone()),
                // Someone else already removed it
                Err(e) if e.is_not_found() => outcome.removed.push(name.clone()),
                Err(e) => {
                    warn!(label = %name, error = %e, "Failed to remove label");
                    outcome.failures.push(LabelFailure {
                        label: name.clone(),
                        category: self.taxonomy.category_of(name),
                        operation: LabelOperation::Remove,
                        error: e.to_string(),
                    });
                }
            }
        }

        for name in &diff.to_add {
            let Some(label) = desired.get(name) else {
                continue;
            };
            let attached = match self.ensure_label(label).await {
                Ok(()) => self.api.add_label(self.target, name).await,
                Err(e) => Err(e),
            };
            match attached {
                Ok(()) => outcome.added.push(name.clone()),
                Err(e) => {
                    warn!(label = %name, category = %label.category, error = %e, "Failed to add label");
                    outcome.failures.push(LabelFailure {
                        label: name.clone(),
                        category: Some(label.category),
                        operation: LabelOperation::Add,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            added = outcome.added.len(),
            removed = outcome.removed.len(),
            failed = outcome.failures.len(),
            "Reconciled labels"
        );
        outcome
    }
}
