//! GitHub REST client implementing [`RepositorySource`].

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use super::convert::{to_commit, to_commit_stats, to_pull_request, to_pull_request_detail};
use super::error::{GitHubError, is_retryable, short_error_message};
use super::types::{
    GitHubBranch, GitHubCommitDetail, GitHubCommitItem, GitHubErrorBody, GitHubPullRequest,
    GitHubPullRequestDetail, GitHubUser,
};
use crate::analysis::ProgressCallback;
use crate::http::reqwest_transport::ReqwestTransport;
use crate::http::{HttpRequest, HttpResponse, HttpTransport};
use crate::platform::{
    ApiRateLimiter, Commit, CommitStats, DateWindow, PullRequest, PullRequestDetail,
    RepositorySource,
};
use crate::retry::{RetryConfig, with_retry};

/// Public GitHub API root.
pub const GITHUB_API_URL: &str = "https://api.github.com";

/// Page size for list endpoints (GitHub's maximum).
const PER_PAGE: usize = 100;

/// Upper bound on pages fetched for a single listing.
const MAX_PAGES: u32 = 1_000;

const ACCEPT: &str = "application/vnd.github.v3+json";

/// GitHub API client.
///
/// Cheap to clone: the transport and rate limiter are shared.
#[derive(Clone)]
pub struct GitHubClient {
    transport: Arc<dyn HttpTransport>,
    api_url: String,
    token: Option<String>,
    rate_limiter: Option<ApiRateLimiter>,
    retry: RetryConfig,
    on_progress: Option<Arc<ProgressCallback>>,
}

impl GitHubClient {
    /// Create a client against the public API with a bounded request timeout.
    ///
    /// Without a token only public repositories are readable, and the
    /// collaborator listing will be rejected.
    pub fn new(token: Option<&str>, timeout: StdDuration) -> Result<Self, GitHubError> {
        let transport = ReqwestTransport::with_timeout(timeout)
            .map_err(|e| GitHubError::Config(e.to_string()))?;
        Ok(Self::new_with_transport(
            GITHUB_API_URL,
            token,
            Arc::new(transport),
        ))
    }

    pub fn new_with_transport(
        api_url: &str,
        token: Option<&str>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            transport,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.map(str::to_string),
            rate_limiter: None,
            retry: RetryConfig::default(),
            on_progress: None,
        }
    }

    /// Pace every request through `limiter`.
    #[must_use]
    pub fn with_rate_limiter(mut self, limiter: ApiRateLimiter) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Report retry backoffs through `on_progress`.
    #[must_use]
    pub fn with_progress(mut self, on_progress: Arc<ProgressCallback>) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    /// Get the API root URL.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Join `segments` onto the API root, percent-encoding each one.
    ///
    /// Empty, `.` and `..` segments are rejected: the URL parser would drop
    /// them and the request would reach a different endpoint.
    fn build_url(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<String, GitHubError> {
        let mut url = reqwest::Url::parse(&self.api_url)
            .map_err(|e| GitHubError::Config(format!("invalid API URL {}: {e}", self.api_url)))?;
        {
            let mut path = url.path_segments_mut().map_err(|()| {
                GitHubError::Config(format!("API URL {} cannot take a path", self.api_url))
            })?;
            path.pop_if_empty();
            for segment in segments {
                if matches!(*segment, "" | "." | "..") {
                    return Err(GitHubError::Config(format!(
                        "invalid path segment {segment:?}"
                    )));
                }
                path.push(segment);
            }
        }
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url.to_string())
    }

    /// Make a single authenticated GET request.
    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, GitHubError> {
        if let Some(ref limiter) = self.rate_limiter {
            limiter.wait().await;
        }

        let mut request = HttpRequest::get(url).header("Accept", ACCEPT);
        if let Some(ref token) = self.token {
            request = request.header("Authorization", format!("token {token}"));
        }

        let response = self.transport.send(request).await?;
        check_status(&response)?;
        serde_json::from_slice(&response.body).map_err(GitHubError::Json)
    }

    /// GET with the configured retry policy.
    async fn fetch<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<T, GitHubError> {
        let url = self.build_url(segments, query)?;
        let resource = segments.join("/");
        with_retry(
            || self.get::<T>(&url),
            is_retryable,
            short_error_message,
            &resource,
            &self.retry,
            self.on_progress.as_deref(),
        )
        .await
    }

    /// Fetch every page of a list endpoint, preserving upstream order.
    async fn fetch_all<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<Vec<T>, GitHubError> {
        let mut items = Vec::new();
        for page in 1..=MAX_PAGES {
            let mut page_query = query.to_vec();
            page_query.push(("per_page", PER_PAGE.to_string()));
            page_query.push(("page", page.to_string()));

            let batch: Vec<T> = self.fetch(segments, &page_query).await?;
            let count = batch.len();
            items.extend(batch);
            tracing::trace!(resource = %segments.join("/"), page, count, "Fetched page");

            if count < PER_PAGE {
                return Ok(items);
            }
        }

        tracing::warn!(
            resource = %segments.join("/"),
            max_pages = MAX_PAGES,
            "Stopped paginating at page limit"
        );
        Ok(items)
    }
}

/// Map a non-2xx response to an error, detecting exhausted quotas.
fn check_status(response: &HttpResponse) -> Result<(), GitHubError> {
    if response.is_success() {
        return Ok(());
    }

    let quota_exhausted = response.header("x-ratelimit-remaining") == Some("0");
    if response.status == 429 || (response.status == 403 && quota_exhausted) {
        let reset_at = response
            .header("x-ratelimit-reset")
            .and_then(|v| v.parse::<i64>().ok())
            .and_then(|epoch| chrono::DateTime::from_timestamp(epoch, 0));
        return Err(GitHubError::RateLimited { reset_at });
    }

    let message = serde_json::from_slice::<GitHubErrorBody>(&response.body)
        .map(|b| b.message)
        .unwrap_or_else(|_| response.body_text());
    Err(GitHubError::Api {
        status: response.status,
        message,
    })
}

#[async_trait]
impl RepositorySource for GitHubClient {
    async fn list_branches(
        &self,
        owner: &str,
        repo: &str,
    ) -> crate::platform::Result<Vec<String>> {
        let branches: Vec<GitHubBranch> = self
            .fetch_all(&["repos", owner, repo, "branches"], &[])
            .await?;
        Ok(branches.into_iter().map(|b| b.name).collect())
    }

    async fn list_collaborators(
        &self,
        owner: &str,
        repo: &str,
    ) -> crate::platform::Result<Vec<String>> {
        let users: Vec<GitHubUser> = self
            .fetch_all(&["repos", owner, repo, "collaborators"], &[])
            .await?;
        Ok(users.into_iter().map(|u| u.login).collect())
    }

    async fn list_commits(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        window: &DateWindow,
    ) -> crate::platform::Result<Vec<Commit>> {
        let mut query = vec![("sha", branch.to_string())];
        if let Some(ref since) = window.since {
            query.push(("since", since.clone()));
        }
        if let Some(ref until) = window.until {
            query.push(("until", until.clone()));
        }

        let items: Vec<GitHubCommitItem> = self
            .fetch_all(&["repos", owner, repo, "commits"], &query)
            .await?;
        Ok(items.into_iter().map(to_commit).collect())
    }

    async fn commit_stats(
        &self,
        owner: &str,
        repo: &str,
        sha: &str,
    ) -> crate::platform::Result<CommitStats> {
        let detail: GitHubCommitDetail = self
            .fetch(&["repos", owner, repo, "commits", sha], &[])
            .await?;
        Ok(detail.stats.map(to_commit_stats).unwrap_or_default())
    }

    async fn list_pull_requests(
        &self,
        owner: &str,
        repo: &str,
    ) -> crate::platform::Result<Vec<PullRequest>> {
        let prs: Vec<GitHubPullRequest> = self
            .fetch_all(&["repos", owner, repo, "pulls"], &[("state", "all".to_string())])
            .await?;
        Ok(prs.into_iter().map(to_pull_request).collect())
    }

    async fn pr_detail(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> crate::platform::Result<PullRequestDetail> {
        let number = number.to_string();
        let detail: GitHubPullRequestDetail = self
            .fetch(&["repos", owner, repo, "pulls", &number], &[])
            .await?;
        Ok(to_pull_request_detail(detail))
    }
}
