use regex::Regex;
use std::sync::LazyLock;

use crate::error::ParseError;

const EXPECTED: &str = "type(scope): subject";

// Header line: type, optional (scope), optional !, colon, subject
static HEADER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<type>[A-Za-z]+)(?:\((?P<scope>[^()\r\n]*)\))?(?P<breaking>!)?:[ \t]*(?P<subject>.*)$")
        .unwrap()
});

static SCOPE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z]+(?:/[A-Za-z]+)?$").unwrap());

/// Facts extracted from a conventional-commit header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConventionalMessage {
    /// Type code as written, e.g. `feat`.
    pub commit_type: String,
    /// Scope, e.g. `api` or `api/auth`.
    pub scope: Option<String>,
    /// Subject text after the colon.
    pub subject: String,
    /// Set by a `!` marker or a `BREAKING CHANGE:` footer.
    pub breaking_change: bool,
}

/// Parse a PR title or commit message.
///
/// Only the first line is matched against the header grammar. The remaining
/// lines are scanned for a breaking-change footer.
pub fn parse_commit_title(text: &str) -> Result<ConventionalMessage, ParseError> {
    let mut lines = text.lines();
    let header = lines.next().unwrap_or_default().trim();

    let caps = HEADER_REGEX
        .captures(header)
        .ok_or(ParseError::InvalidFormat { expected: EXPECTED })?;

    let subject = caps
        .name("subject")
        .map(|m| m.as_str().trim())
        .unwrap_or_default();
    if subject.is_empty() {
        return Err(ParseError::EmptySubject);
    }

    let scope = match caps.name("scope") {
        Some(m) if SCOPE_REGEX.is_match(m.as_str()) => Some(m.as_str().to_string()),
        Some(m) => {
            return Err(ParseError::InvalidScope {
                scope: m.as_str().to_string(),
            })
        }
        None => None,
    };

    let breaking_footer = lines.any(|line| {
        line.starts_with("BREAKING CHANGE:") || line.starts_with("BREAKING-CHANGE:")
    });

    Ok(ConventionalMessage {
        commit_type: caps["type"].to_string(),
        scope,
        subject: subject.to_string(),
        breaking_change: caps.name("breaking").is_some() || breaking_footer,
    })
}
