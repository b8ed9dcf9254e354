//! Error types for the gatekeeper.
//!
//! Three enums cover the three boundaries the core talks across:
//! - `ParseError` for titles and commit messages that do not follow a grammar
//! - `GitHubError` for collaborator I/O
//! - `WebhookError` for deliveries that cannot be decoded

use std::time::Duration;

use thiserror::Error;

/// A title or commit message did not match its grammar.
///
/// This is an expected outcome that drives user feedback, not a system fault.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid format, expected `{expected}`")]
    InvalidFormat { expected: &'static str },

    #[error("invalid scope `{scope}`, expected `scope` or `scope/subscope`")]
    InvalidScope { scope: String },

    #[error("subject is empty")]
    EmptySubject,
}

/// Errors returned by the GitHub collaborator.
#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GitHub API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Rate limit exceeded, reset in {reset_in:?}")]
    RateLimited { reset_in: Duration },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl GitHubError {
    /// Whether the target resource does not exist (HTTP 404).
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether a create call collided with an existing resource.
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }
}

/// Errors decoding a webhook delivery at the HTTP boundary.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Missing header {0}")]
    MissingHeader(&'static str),

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Malformed {event} payload: {source}")]
    Payload {
        event: String,
        #[source]
        source: serde_json::Error,
    },
}
