//! GitHub REST client implementing [`GitHubApi`].
//!
//! Handles auth, pagination, rate-limit tracking and the mapping of HTTP
//! failures onto [`GitHubError`] variants the pipelines branch on.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client as HttpClient, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};

use super::{
    CommitInfo, GitHubApi, GitHubResult, IssueComment, Label, LabelSpec, ObjectRef, Reaction,
    RepoRef, StatusUpdate,
};
use crate::error::GitHubError;

const PER_PAGE: usize = 100;

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
    #[serde(default)]
    errors: Vec<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubCommit {
    sha: String,
    commit: GitHubCommitDetail,
}

#[derive(Debug, Deserialize)]
struct GitHubCommitDetail {
    message: String,
}

#[derive(Debug, Default)]
struct RateLimit {
    remaining: Option<i64>,
    reset: Option<Instant>,
}

/// GitHub REST API client.
#[derive(Debug)]
pub struct GitHubClient {
    http_client: HttpClient,
    base_url: String,
    token: String,
    organization: Option<String>,
    rate_limit: Mutex<RateLimit>,
}

impl GitHubClient {
    /// Create a client for `base_url` (usually `https://api.github.com`).
    ///
    /// `organization` selects the membership check used for slash commands;
    /// without it, repository collaborator access is checked instead.
    pub fn new(
        token: &str,
        base_url: &str,
        organization: Option<String>,
    ) -> GitHubResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static("gatekeeper/1.0"));

        let http_client = HttpClient::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            organization,
            rate_limit: Mutex::new(RateLimit::default()),
        })
    }

    fn repo_url(&self, repo: &RepoRef, rest: &str) -> String {
        format!(
            "{}/repos/{}/{}/{rest}",
            self.base_url, repo.owner, repo.name
        )
    }

    /// Send a request, tracking rate limits and turning non-2xx into errors.
    async fn send(&self, request: RequestBuilder) -> GitHubResult<Response> {
        self.check_rate_limit()?;

        let response = request
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .send()
            .await?;
        self.update_rate_limit(&response);

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(Self::error_from(response).await)
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> GitHubResult<T> {
        let response = self.send(request).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Follow `page=N` until a short page comes back.
    async fn get_paginated<T: DeserializeOwned>(&self, url: &str) -> GitHubResult<Vec<T>> {
        let mut items = Vec::new();
        for page in 1.. {
            let request = self.http_client.get(url).query(&[
                ("per_page", PER_PAGE.to_string()),
                ("page", page.to_string()),
            ]);
            let batch: Vec<T> = self.send_json(request).await?;
            let short = batch.len() < PER_PAGE;
            items.extend(batch);
            if short {
                break;
            }
        }
        Ok(items)
    }

    async fn error_from(response: Response) -> GitHubError {
        let status = response.status();
        let rate_limited = Self::rate_limit_exhausted(&response);
        let reset_in = Self::get_rate_limit_reset(&response);
        let body = response.text().await.unwrap_or_default();
        let parsed: Option<ApiErrorBody> = serde_json::from_str(&body).ok();
        let message = parsed
            .as_ref()
            .map_or_else(|| body.clone(), |b| b.message.clone());

        match status {
            StatusCode::NOT_FOUND => GitHubError::NotFound(message),
            StatusCode::UNPROCESSABLE_ENTITY
                if parsed.as_ref().is_some_and(|b| {
                    b.errors
                        .iter()
                        .any(|e| e.code.as_deref() == Some("already_exists"))
                }) =>
            {
                GitHubError::AlreadyExists(message)
            }
            StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS if rate_limited => {
                GitHubError::RateLimited {
                    reset_in: reset_in.unwrap_or(Duration::from_secs(60)),
                }
            }
            _ => GitHubError::Api {
                status: status.as_u16(),
                message,
            },
        }
    }

    /// Check if we're within rate limits
    fn check_rate_limit(&self) -> GitHubResult<()> {
        let limit = self
            .rate_limit
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let (Some(0), Some(reset)) = (limit.remaining, limit.reset) {
            let now = Instant::now();
            if now < reset {
                return Err(GitHubError::RateLimited {
                    reset_in: reset - now,
                });
            }
        }
        Ok(())
    }

    /// Update rate limit tracking from response headers
    fn update_rate_limit(&self, response: &Response) {
        let remaining = header_i64(response, "x-ratelimit-remaining");
        let reset = Self::get_rate_limit_reset(response);
        let mut limit = self
            .rate_limit
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if remaining.is_some() {
            limit.remaining = remaining;
        }
        if let Some(reset) = reset {
            limit.reset = Some(Instant::now() + reset);
        }
    }

    fn rate_limit_exhausted(response: &Response) -> bool {
        header_i64(response, "x-ratelimit-remaining") == Some(0)
            || response.headers().contains_key("retry-after")
    }

    fn get_rate_limit_reset(response: &Response) -> Option<Duration> {
        header_i64(response, "x-ratelimit-reset").map(|reset_timestamp| {
            let now = chrono::Utc::now().timestamp();
            Duration::from_secs(u64::try_from(reset_timestamp - now).unwrap_or(0))
        })
    }
}

fn header_i64(response: &Response, name: &str) -> Option<i64> {
    response
        .headers()
        .get(name)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.parse::<i64>().ok())
}

#[async_trait]
impl GitHubApi for GitHubClient {
    #[instrument(skip(self), fields(target_ref = %target))]
    async fn list_comments(&self, target: &ObjectRef) -> GitHubResult<Vec<IssueComment>> {
        let url = self.repo_url(&target.repo, &format!("issues/{}/comments", target.number));
        let comments: Vec<IssueComment> = self.get_paginated(&url).await?;
        debug!("Retrieved {} comments", comments.len());
        Ok(comments)
    }

    #[instrument(skip(self, body), fields(target_ref = %target))]
    async fn create_comment(&self, target: &ObjectRef, body: &str) -> GitHubResult<IssueComment> {
        let url = self.repo_url(&target.repo, &format!("issues/{}/comments", target.number));
        self.send_json(self.http_client.post(&url).json(&json!({ "body": body })))
            .await
    }

    #[instrument(skip(self, body), fields(repo = %repo))]
    async fn edit_comment(
        &self,
        repo: &RepoRef,
        comment_id: u64,
        body: &str,
    ) -> GitHubResult<IssueComment> {
        let url = self.repo_url(repo, &format!("issues/comments/{comment_id}"));
        self.send_json(self.http_client.patch(&url).json(&json!({ "body": body })))
            .await
    }

    #[instrument(skip(self), fields(repo = %repo))]
    async fn delete_comment(&self, repo: &RepoRef, comment_id: u64) -> GitHubResult<()> {
        let url = self.repo_url(repo, &format!("issues/comments/{comment_id}"));
        self.send(self.http_client.delete(&url)).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(repo = %repo))]
    async fn add_reaction(
        &self,
        repo: &RepoRef,
        comment_id: u64,
        reaction: Reaction,
    ) -> GitHubResult<()> {
        let url = self.repo_url(repo, &format!("issues/comments/{comment_id}/reactions"));
        self.send(
            self.http_client
                .post(&url)
                .json(&json!({ "content": reaction.as_str() })),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(repo = %repo))]
    async fn get_label(&self, repo: &RepoRef, name: &str) -> GitHubResult<Label> {
        let url = self.repo_url(repo, &format!("labels/{}", urlencoding::encode(name)));
        self.send_json(self.http_client.get(&url)).await
    }

    #[instrument(skip(self, spec), fields(repo = %repo, label = %spec.name))]
    async fn create_label(&self, repo: &RepoRef, spec: &LabelSpec) -> GitHubResult<Label> {
        let url = self.repo_url(repo, "labels");
        self.send_json(self.http_client.post(&url).json(spec)).await
    }

    #[instrument(skip(self), fields(target_ref = %target))]
    async fn list_issue_labels(&self, target: &ObjectRef) -> GitHubResult<Vec<Label>> {
        let url = self.repo_url(&target.repo, &format!("issues/{}/labels", target.number));
        self.get_paginated(&url).await
    }

    #[instrument(skip(self), fields(target_ref = %target))]
    async fn add_label(&self, target: &ObjectRef, name: &str) -> GitHubResult<()> {
        let url = self.repo_url(&target.repo, &format!("issues/{}/labels", target.number));
        self.send(
            self.http_client
                .post(&url)
                .json(&json!({ "labels": [name] })),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(target_ref = %target))]
    async fn remove_label(&self, target: &ObjectRef, name: &str) -> GitHubResult<()> {
        let url = self.repo_url(
            &target.repo,
            &format!(
                "issues/{}/labels/{}",
                target.number,
                urlencoding::encode(name)
            ),
        );
        self.send(self.http_client.delete(&url)).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(target_ref = %target))]
    async fn list_commits(&self, target: &ObjectRef) -> GitHubResult<Vec<CommitInfo>> {
        let url = self.repo_url(&target.repo, &format!("pulls/{}/commits", target.number));
        let commits: Vec<GitHubCommit> = self.get_paginated(&url).await?;
        Ok(commits
            .into_iter()
            .map(|c| CommitInfo {
                sha: c.sha,
                message: c.commit.message,
            })
            .collect())
    }

    #[instrument(skip(self, status), fields(repo = %repo, context = %status.context, state = %status.state))]
    async fn create_status(
        &self,
        repo: &RepoRef,
        sha: &str,
        status: &StatusUpdate,
    ) -> GitHubResult<()> {
        let url = self.repo_url(repo, &format!("statuses/{sha}"));
        let body = json!({
            "state": status.state,
            "context": status.context,
            "description": status.description,
        });
        self.send(self.http_client.post(&url).json(&body)).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(repo = %repo))]
    async fn is_member(&self, repo: &RepoRef, login: &str) -> GitHubResult<bool> {
        let url = match &self.organization {
            Some(org) => format!("{}/orgs/{org}/members/{login}", self.base_url),
            None => self.repo_url(repo, &format!("collaborators/{login}")),
        };
        match self.send(self.http_client.get(&url)).await {
            Ok(response) => Ok(response.status() == StatusCode::NO_CONTENT),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}
