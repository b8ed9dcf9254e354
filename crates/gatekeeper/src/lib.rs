//! Conventional-metadata enforcement for GitHub pull requests and issues.
//!
//! This crate provides:
//! - Parsers for conventional-commit titles and bracketed issue titles
//! - Label catalogs, size tiers and diff-based label reconciliation
//! - Commit status checks with sticky failures
//! - Bot feedback comments recognized through hidden markers
//! - Pipelines per webhook event, plus the HTTP service that queues them

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)] // Every GitHub call can fail

pub mod comments;
pub mod config;
pub mod conventional;
pub mod error;
pub mod github;
pub mod labels;
pub mod pipeline;
pub mod reconcile;
pub mod server;
pub mod status;
pub mod webhooks;

pub use config::{Config, PipelineSettings};
pub use error::{GitHubError, ParseError, WebhookError};
pub use github::events::WebhookEvent;
pub use github::{GitHubApi, GitHubClient};
pub use pipeline::{Orchestrator, PipelineReport};
pub use webhooks::verify_webhook_signature;
