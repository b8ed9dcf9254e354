//! Configuration for the gatekeeper service.

use std::env;

/// Default GitHub REST endpoint.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Gatekeeper service configuration.
#[derive(Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct Config {
    /// HTTP server port.
    pub port: u16,
    /// Webhook signing secret for `X-Hub-Signature-256` verification.
    pub webhook_secret: Option<String>,
    /// GitHub token for API calls.
    pub github_token: Option<String>,
    /// GitHub REST API base URL.
    pub api_url: String,
    /// Organization used for the membership check on slash commands.
    /// Falls back to the repository collaborator check when unset.
    pub organization: Option<String>,
    /// Bounded delivery queue depth.
    pub queue_depth: usize,
    /// Number of pipeline workers draining the queue.
    pub workers: usize,
    /// Emit JSON log lines instead of the human-readable format.
    pub log_json: bool,
    /// Pipeline behaviour switches.
    pub pipeline: PipelineSettings,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("webhook_secret", &self.webhook_secret.as_ref().map(|_| "***"))
            .field("github_token", &self.github_token.as_ref().map(|_| "***"))
            .field("api_url", &self.api_url)
            .field("organization", &self.organization)
            .field("queue_depth", &self.queue_depth)
            .field("workers", &self.workers)
            .field("log_json", &self.log_json)
            .field("pipeline", &self.pipeline)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: env::var("GATEKEEPER_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8080),
            webhook_secret: env::var("GITHUB_WEBHOOK_SECRET")
                .ok()
                .filter(|s| !s.is_empty()),
            github_token: env::var("GITHUB_TOKEN").ok().filter(|s| !s.is_empty()),
            api_url: env::var("GITHUB_API_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            organization: env::var("GATEKEEPER_ORGANIZATION")
                .ok()
                .filter(|s| !s.is_empty()),
            queue_depth: env::var("GATEKEEPER_QUEUE_DEPTH")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(100),
            workers: env::var("GATEKEEPER_WORKERS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(10),
            log_json: env_flag("GATEKEEPER_LOG_JSON"),
            pipeline: PipelineSettings::default(),
        }
    }
}

/// Switches that change how the pipelines react to findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Create missing `category/<scope>` labels instead of asking for them.
    pub auto_create_scopes: bool,
    /// Fail the size check for XL pull requests instead of only commenting.
    pub fail_oversized: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            auto_create_scopes: env_flag("GATEKEEPER_AUTO_CREATE_SCOPES"),
            fail_oversized: env_flag("GATEKEEPER_FAIL_OVERSIZED"),
        }
    }
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false)
}
