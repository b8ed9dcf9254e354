use std::collections::BTreeMap;
use std::fmt;

use super::markers::{MarkerKey, MarkerValue, Markers};
use crate::labels::SCOPE_PREFIX;

// Rule ids are base << ordinal. New rules go at the end so posted ids stay valid.
const RULE_BASE: i64 = 597_659_851;

/// Kind of violation a bot comment reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RuleId {
    IssueTitleInvalid,
    LabelNotExists,
    PrTitleInvalid,
    CommitInvalid,
    SizeTooBig,
}

impl RuleId {
    pub const ALL: [RuleId; 5] = [
        Self::IssueTitleInvalid,
        Self::LabelNotExists,
        Self::PrTitleInvalid,
        Self::CommitInvalid,
        Self::SizeTooBig,
    ];

    /// Value of the `botid` marker.
    #[must_use]
    pub const fn code(self) -> i64 {
        let ordinal = match self {
            Self::IssueTitleInvalid => 0,
            Self::LabelNotExists => 1,
            Self::PrTitleInvalid => 2,
            Self::CommitInvalid => 3,
            Self::SizeTooBig => 4,
        };
        RULE_BASE << ordinal
    }

    /// Secondary marker that tells apart several comments of the same rule.
    #[must_use]
    pub const fn disambiguator_key(self) -> Option<MarkerKey> {
        match self {
            Self::LabelNotExists => Some(MarkerKey::BotLabel),
            Self::CommitInvalid => Some(MarkerKey::CommitId),
            Self::IssueTitleInvalid | Self::PrTitleInvalid | Self::SizeTooBig => None,
        }
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::IssueTitleInvalid => "issue_title_invalid",
            Self::LabelNotExists => "label_not_exists",
            Self::PrTitleInvalid => "pr_title_invalid",
            Self::CommitInvalid => "commit_invalid",
            Self::SizeTooBig => "size_too_big",
        };
        f.write_str(name)
    }
}

/// `(rule, disambiguator)` pair that names at most one live comment.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CommentIdentity {
    pub rule: RuleId,
    pub disambiguator: Option<String>,
}

impl CommentIdentity {
    #[must_use]
    pub fn singleton(rule: RuleId) -> Self {
        Self {
            rule,
            disambiguator: None,
        }
    }

    #[must_use]
    pub fn missing_label(label: impl Into<String>) -> Self {
        Self {
            rule: RuleId::LabelNotExists,
            disambiguator: Some(label.into()),
        }
    }

    #[must_use]
    pub fn invalid_commit(sha: impl Into<String>) -> Self {
        Self {
            rule: RuleId::CommitInvalid,
            disambiguator: Some(sha.into()),
        }
    }

    /// Markers written at the top of the comment body.
    #[must_use]
    pub fn markers(&self) -> Markers {
        let markers = Markers::new().with(MarkerKey::BotId, MarkerValue::Int(self.rule.code()));
        match (self.rule.disambiguator_key(), &self.disambiguator) {
            (Some(key), Some(value)) => markers.with(key, MarkerValue::Text(value.clone())),
            _ => markers,
        }
    }

    /// Whether parsed markers name this identity. A missing or different
    /// secondary marker is a mismatch, never an error.
    #[must_use]
    pub fn matches(&self, markers: &Markers) -> bool {
        if markers.bot_id() != Some(self.rule.code()) {
            return false;
        }
        match (self.rule.disambiguator_key(), &self.disambiguator) {
            (Some(key), Some(expected)) => markers
                .get(key)
                .is_some_and(|value| value.matches(expected)),
            _ => true,
        }
    }
}

impl fmt::Display for CommentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.disambiguator {
            Some(d) => write!(f, "{}({d})", self.rule),
            None => write!(f, "{}", self.rule),
        }
    }
}

/// A problem to report, with what the message needs to describe it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    IssueTitleInvalid { title: String },
    LabelNotExists { label: String },
    PrTitleInvalid { title: String },
    CommitInvalid { sha: String, message: String },
    SizeTooBig,
}

impl Violation {
    #[must_use]
    pub fn rule(&self) -> RuleId {
        match self {
            Self::IssueTitleInvalid { .. } => RuleId::IssueTitleInvalid,
            Self::LabelNotExists { .. } => RuleId::LabelNotExists,
            Self::PrTitleInvalid { .. } => RuleId::PrTitleInvalid,
            Self::CommitInvalid { .. } => RuleId::CommitInvalid,
            Self::SizeTooBig => RuleId::SizeTooBig,
        }
    }

    #[must_use]
    pub fn identity(&self) -> CommentIdentity {
        match self {
            Self::LabelNotExists { label } => CommentIdentity::missing_label(label.clone()),
            Self::CommitInvalid { sha, .. } => CommentIdentity::invalid_commit(sha.clone()),
            other => CommentIdentity::singleton(other.rule()),
        }
    }
}

/// Message templates, one per rule. Built once and shared.
///
/// Placeholders: `{title}`, `{label}`, `{scope}`, `{message}`.
#[derive(Debug, Clone)]
pub struct CommentTemplates {
    templates: BTreeMap<RuleId, String>,
}

const CONVENTIONAL_COMMITS_LINK: &str = "For more information about conventional commit, please visit [conventionalcommits.org](https://www.conventionalcommits.org/en/v1.0.0/)";

impl CommentTemplates {
    #[must_use]
    pub fn standard() -> Self {
        let templates = BTreeMap::from([
            (
                RuleId::IssueTitleInvalid,
                "The issue title `{title}` is not conventional issue format.\nPlease follow this format: `[SCOPE] title`".to_string(),
            ),
            (
                RuleId::LabelNotExists,
                "The label `{label}` does not exist in this repository.\nIf you are an administrator you can write a comment with the command `/label:add {scope}` to create the label automatically.".to_string(),
            ),
            (
                RuleId::PrTitleInvalid,
                format!("The pull request title `{{title}}` is not conventional commit format.\nPlease follow this format: `type(scope): subject` or `type: subject`\n\n{CONVENTIONAL_COMMITS_LINK}"),
            ),
            (
                RuleId::CommitInvalid,
                format!("The commit message `{{message}}` is not conventional commit format.\nPlease follow one of these formats:\n* `type(scope): subject`\n* `type: subject`\n\n{CONVENTIONAL_COMMITS_LINK}"),
            ),
            (
                RuleId::SizeTooBig,
                "Thank you for your contribution, but this PR exceeds the recommended size of 1000 lines. Please make sure you are NOT addressing multiple issues with one PR.\nNote this PR might be rejected due to its size.".to_string(),
            ),
        ]);
        Self { templates }
    }

    /// Human-readable part of the comment.
    #[must_use]
    pub fn message(&self, violation: &Violation) -> String {
        let template = self
            .templates
            .get(&violation.rule())
            .map_or("", String::as_str);

        match violation {
            Violation::IssueTitleInvalid { title } | Violation::PrTitleInvalid { title } => {
                template.replace("{title}", title)
            }
            Violation::LabelNotExists { label } => {
                let scope = label.strip_prefix(SCOPE_PREFIX).unwrap_or(label);
                template.replace("{label}", label).replace("{scope}", scope)
            }
            Violation::CommitInvalid { message, .. } => {
                let header = message.lines().next().unwrap_or_default();
                template.replace("{message}", header)
            }
            Violation::SizeTooBig => template.to_string(),
        }
    }

    /// Full comment body: identity markers, then the message.
    #[must_use]
    pub fn body(&self, violation: &Violation) -> String {
        let mut body = violation.identity().markers().render();
        body.push_str(&self.message(violation));
        body
    }
}

impl Default for CommentTemplates {
    fn default() -> Self {
        Self::standard()
    }
}
