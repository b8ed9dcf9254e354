use regex::Regex;
use std::sync::LazyLock;

use crate::error::ParseError;

const EXPECTED: &str = "[SCOPE] subject";

static ISSUE_TITLE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[(?P<scope>[A-Z]+(?:/[A-Z]+)?)\]\s+(?P<subject>.*\S.*)$").unwrap()
});

/// Facts extracted from a bracketed issue title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueTitle {
    /// Scope as written, upper-case.
    pub scope: String,
    /// Subject after the bracket.
    pub message: String,
}

impl IssueTitle {
    /// Scope in the lower-case form used for `category/<scope>` labels.
    #[must_use]
    pub fn label_scope(&self) -> String {
        self.scope.to_lowercase()
    }
}

/// Parse an issue title of the form `[SCOPE] subject`.
pub fn parse_issue_title(text: &str) -> Result<IssueTitle, ParseError> {
    let caps = ISSUE_TITLE_REGEX
        .captures(text.trim())
        .ok_or(ParseError::InvalidFormat { expected: EXPECTED })?;

    Ok(IssueTitle {
        scope: caps["scope"].to_string(),
        message: caps["subject"].trim().to_string(),
    })
}
