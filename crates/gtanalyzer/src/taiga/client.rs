//! Taiga REST client implementing [`BoardSource`].

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use super::convert::{to_history_event, to_milestone, to_project, to_task};
use super::error::{TaigaError, is_retryable, short_error_message};
use super::types::{TaigaErrorBody, TaigaHistoryEntry, TaigaMilestone, TaigaProject, TaigaTask};
use crate::analysis::ProgressCallback;
use crate::http::reqwest_transport::ReqwestTransport;
use crate::http::{HttpRequest, HttpResponse, HttpTransport};
use crate::platform::{
    ApiRateLimiter, BoardProject, BoardSource, BoardTask, HistoryEvent, Milestone,
};
use crate::retry::{RetryConfig, with_retry};

/// Hosted Taiga API root.
pub const TAIGA_API_URL: &str = "https://api.taiga.io/api/v1";

/// Taiga REST client.
#[derive(Clone)]
pub struct TaigaClient {
    transport: Arc<dyn HttpTransport>,
    api_url: String,
    token: Option<String>,
    rate_limiter: Option<ApiRateLimiter>,
    retry: RetryConfig,
    on_progress: Option<Arc<ProgressCallback>>,
}

impl TaigaClient {
    /// Create a client against the hosted API with a bounded request timeout.
    pub fn new(token: Option<&str>, timeout: StdDuration) -> Result<Self, TaigaError> {
        let transport =
            ReqwestTransport::with_timeout(timeout).map_err(|e| TaigaError::Config(e.to_string()))?;
        Ok(Self::new_with_transport(TAIGA_API_URL, token, Arc::new(transport)))
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

    #[must_use]
    pub fn with_progress(mut self, on_progress: Arc<ProgressCallback>) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn build_url(&self, path: &str, query: &[(&str, String)]) -> Result<String, TaigaError> {
        let base = format!("{}{}", self.api_url, path);
        let url = if query.is_empty() {
            reqwest::Url::parse(&base)
        } else {
            reqwest::Url::parse_with_params(&base, query)
        };
        url.map(|u| u.to_string())
            .map_err(|e| TaigaError::Config(format!("invalid URL {base}: {e}")))
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, TaigaError> {
        if let Some(ref limiter) = self.rate_limiter {
            limiter.wait().await;
        }

        // Listings come back whole instead of in 30-item pages.
        let mut request = HttpRequest::get(url)
            .header("Content-Type", "application/json")
            .header("x-disable-pagination", "True");
        if let Some(ref token) = self.token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let response = self.transport.send(request).await?;
        check_status(&response)?;
        serde_json::from_slice(&response.body).map_err(TaigaError::Json)
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, TaigaError> {
        let url = self.build_url(path, query)?;
        with_retry(
            || self.get::<T>(&url),
            is_retryable,
            short_error_message,
            path,
            &self.retry,
            self.on_progress.as_deref(),
        )
        .await
    }
}

fn check_status(response: &HttpResponse) -> Result<(), TaigaError> {
    if response.is_success() {
        return Ok(());
    }
    if response.status == 429 {
        return Err(TaigaError::RateLimited);
    }

    let message = serde_json::from_slice::<TaigaErrorBody>(&response.body)
        .map(|b| b.message)
        .unwrap_or_else(|_| response.body_text());
    Err(TaigaError::Api {
        status: response.status,
        message,
    })
}

#[async_trait]
impl BoardSource for TaigaClient {
    async fn project_by_slug(&self, slug: &str) -> crate::platform::Result<BoardProject> {
        let project: TaigaProject = self
            .fetch("/projects/by_slug", &[("slug", slug.to_string())])
            .await?;
        Ok(to_project(project))
    }

    async fn milestones(&self, project_id: u64) -> crate::platform::Result<Vec<Milestone>> {
        let milestones: Vec<TaigaMilestone> = self
            .fetch("/milestones", &[("project", project_id.to_string())])
            .await?;
        Ok(milestones.into_iter().map(to_milestone).collect())
    }

    async fn tasks(&self, project_id: u64) -> crate::platform::Result<Vec<BoardTask>> {
        let tasks: Vec<TaigaTask> = self
            .fetch("/tasks", &[("project", project_id.to_string())])
            .await?;
        Ok(tasks.into_iter().map(to_task).collect())
    }

    async fn user_story_history(
        &self,
        user_story_id: u64,
    ) -> crate::platform::Result<Vec<HistoryEvent>> {
        let entries: Vec<TaigaHistoryEntry> = self
            .fetch(&format!("/history/userstory/{user_story_id}"), &[])
            .await?;
        Ok(entries.into_iter().map(to_history_event).collect())
    }

    async fn task_history(&self, task_id: u64) -> crate::platform::Result<Vec<HistoryEvent>> {
        let entries: Vec<TaigaHistoryEntry> = self
            .fetch(&format!("/history/task/{task_id}"), &[])
            .await?;
        Ok(entries.into_iter().map(to_history_event).collect())
    }
}
