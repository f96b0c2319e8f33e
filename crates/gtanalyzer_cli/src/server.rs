//! HTTP surface for dispatching batches and polling their results.
//!
//! Every POST route takes a JSON body. Analyze routes return a dispatch
//! acknowledgement immediately; results routes answer `202 Accepted` with
//! `{"status": "not_ready"}` until the requested data exists.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use gtanalyzer::analysis::{
    BoardAnalyzer, BoardReport, MilestoneSummary, RepositoryAnalyzer, RepositoryReport,
};
use gtanalyzer::platform::{BoardSource, RepositorySource};
use gtanalyzer::{
    AnalysisParams, BatchRequest, DispatchAck, DispatchError, Dispatcher, EntityRef,
    ProgressStore, RequestId, ResultPoller, StoreError,
};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::config::Config;

/// Builds a repository source for one request from an optional token.
pub type RepositorySourceFactory =
    Arc<dyn Fn(Option<&str>) -> Result<Arc<dyn RepositorySource>, String> + Send + Sync>;

/// Builds a board source for one request from an optional token.
pub type BoardSourceFactory =
    Arc<dyn Fn(Option<&str>) -> Result<Arc<dyn BoardSource>, String> + Send + Sync>;

/// Shared state of the HTTP server.
#[derive(Clone)]
pub struct AppState {
    repositories: Arc<ProgressStore<RepositoryReport>>,
    boards: Arc<ProgressStore<BoardReport>>,
    repository_sources: RepositorySourceFactory,
    board_sources: BoardSourceFactory,
    sweep_interval: Duration,
}

impl AppState {
    pub fn new(
        store_ttl: Duration,
        sweep_interval: Duration,
        repository_sources: RepositorySourceFactory,
        board_sources: BoardSourceFactory,
    ) -> Self {
        Self {
            repositories: Arc::new(ProgressStore::new(store_ttl)),
            boards: Arc::new(ProgressStore::new(store_ttl)),
            repository_sources,
            board_sources,
            sweep_interval,
        }
    }

    /// State backed by the real clients; payload tokens override configured ones.
    pub fn from_config(config: Config) -> Self {
        let config = Arc::new(config);

        let github_config = Arc::clone(&config);
        let repository_sources: RepositorySourceFactory =
            Arc::new(move |token: Option<&str>| github_source(&github_config, token));

        let taiga_config = Arc::clone(&config);
        let board_sources: BoardSourceFactory =
            Arc::new(move |token: Option<&str>| taiga_source(&taiga_config, token));

        Self::new(
            config.store_ttl(),
            config.sweep_interval(),
            repository_sources,
            board_sources,
        )
    }

    /// Start background eviction for both stores.
    pub fn spawn_sweepers(&self) -> Vec<JoinHandle<()>> {
        vec![
            self.repositories.spawn_sweeper(self.sweep_interval),
            self.boards.spawn_sweeper(self.sweep_interval),
        ]
    }
}

#[cfg(feature = "github")]
fn github_source(
    config: &Config,
    token: Option<&str>,
) -> Result<Arc<dyn RepositorySource>, String> {
    crate::commands::shared::github_client(config, token, None)
        .map(|client| Arc::new(client) as Arc<dyn RepositorySource>)
        .map_err(|e| e.to_string())
}

#[cfg(not(feature = "github"))]
fn github_source(
    _config: &Config,
    _token: Option<&str>,
) -> Result<Arc<dyn RepositorySource>, String> {
    Err("GitHub support is not enabled in this build".to_string())
}

#[cfg(feature = "taiga")]
fn taiga_source(config: &Config, token: Option<&str>) -> Result<Arc<dyn BoardSource>, String> {
    crate::commands::shared::taiga_client(config, token, None)
        .map(|client| Arc::new(client) as Arc<dyn BoardSource>)
        .map_err(|e| e.to_string())
}

#[cfg(not(feature = "taiga"))]
fn taiga_source(_config: &Config, _token: Option<&str>) -> Result<Arc<dyn BoardSource>, String> {
    Err("Taiga support is not enabled in this build".to_string())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/ganalyzer/analyze", post(analyze_repositories))
        .route("/api/v1/ganalyzer/results", post(repository_results))
        .route("/api/v1/tanalyzer/analyze", post(analyze_boards))
        .route("/api/v1/tanalyzer/results", post(board_results))
        .route("/api/v1/tanalyzer/milestones", post(board_milestones))
        .with_state(state)
}

// ─── Payloads ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RepositoryAnalyzeRequest {
    #[serde(default)]
    pub token: Option<String>,
    pub owner: String,
    pub repositories: Vec<EntityRef>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BoardAnalyzeRequest {
    #[serde(default)]
    pub auth_token: Option<String>,
    pub boards: Vec<EntityRef>,
}

#[derive(Debug, Deserialize)]
pub struct ResultsRequest {
    pub request_id: String,
    /// Poll a single entity instead of the whole request.
    #[serde(default)]
    pub entity: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MilestonesRequest {
    #[serde(default)]
    pub auth_token: Option<String>,
    pub board: String,
}

#[derive(Debug, Serialize)]
struct Status {
    status: &'static str,
}

// ─── Handlers ──────────────────────────────────────────────────────────────────

async fn health() -> Json<Status> {
    Json(Status { status: "ok" })
}

async fn analyze_repositories(
    State(state): State<AppState>,
    payload: Result<Json<RepositoryAnalyzeRequest>, JsonRejection>,
) -> Result<Json<DispatchAck>, AppError> {
    let Json(req) = payload?;
    if req.owner.trim().is_empty() {
        return Err(AppError::BadRequest("owner is required".to_string()));
    }

    let source = (state.repository_sources)(req.token.as_deref()).map_err(AppError::Internal)?;
    let dispatcher = Dispatcher::new(
        Arc::new(RepositoryAnalyzer::new(source)),
        Arc::clone(&state.repositories),
    );
    let batch = BatchRequest::new(
        req.repositories,
        AnalysisParams::for_owner(req.owner).with_window(req.start_date, req.end_date),
    );

    // Dropping the handle detaches the worker.
    let (ack, _handle) = dispatcher.dispatch(batch)?;
    tracing::info!(
        request_id = %ack.request_id,
        combinations = ack.combinations,
        kind = "github",
        "Batch accepted"
    );
    Ok(Json(ack))
}

async fn analyze_boards(
    State(state): State<AppState>,
    payload: Result<Json<BoardAnalyzeRequest>, JsonRejection>,
) -> Result<Json<DispatchAck>, AppError> {
    let Json(req) = payload?;

    let source = (state.board_sources)(req.auth_token.as_deref()).map_err(AppError::Internal)?;
    let dispatcher = Dispatcher::new(
        Arc::new(BoardAnalyzer::new(source)),
        Arc::clone(&state.boards),
    );
    let batch = BatchRequest::new(req.boards, AnalysisParams::default());

    let (ack, _handle) = dispatcher.dispatch(batch)?;
    tracing::info!(
        request_id = %ack.request_id,
        combinations = ack.combinations,
        kind = "taiga",
        "Batch accepted"
    );
    Ok(Json(ack))
}

async fn repository_results(
    State(state): State<AppState>,
    payload: Result<Json<ResultsRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(req) = payload?;
    poll(ResultPoller::new(Arc::clone(&state.repositories)), req)
}

async fn board_results(
    State(state): State<AppState>,
    payload: Result<Json<ResultsRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(req) = payload?;
    poll(ResultPoller::new(Arc::clone(&state.boards)), req)
}

fn poll<R: Clone + Serialize>(
    poller: ResultPoller<R>,
    req: ResultsRequest,
) -> Result<Response, AppError> {
    let request_id: RequestId = req
        .request_id
        .parse()
        .map_err(|_| AppError::BadRequest(format!("invalid request_id: {}", req.request_id)))?;

    let response = match req.entity {
        Some(entity) => Json(poller.poll_entity(&request_id, &entity)?).into_response(),
        None => Json(poller.poll(&request_id)?).into_response(),
    };
    Ok(response)
}

async fn board_milestones(
    State(state): State<AppState>,
    payload: Result<Json<MilestonesRequest>, JsonRejection>,
) -> Result<Json<Vec<MilestoneSummary>>, AppError> {
    let Json(req) = payload?;
    if req.board.trim().is_empty() {
        return Err(AppError::BadRequest("board is required".to_string()));
    }

    let source = (state.board_sources)(req.auth_token.as_deref()).map_err(AppError::Internal)?;
    let summaries = BoardAnalyzer::new(source)
        .milestone_summaries(&req.board)
        .await
        .map_err(|e| AppError::Upstream(e.reason()))?;
    Ok(Json(summaries))
}

// ─── Errors ────────────────────────────────────────────────────────────────────

/// Error type for route handlers.
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    /// The request or entity has no result yet.
    NotReady,
    Upstream(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotReady => {
                return (StatusCode::ACCEPTED, Json(Status { status: "not_ready" })).into_response();
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Upstream(msg) => {
                tracing::warn!(error = %msg, "Upstream request failed");
                (StatusCode::BAD_GATEWAY, msg)
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = Json(serde_json::json!({
            "error": message,
            "saved": false,
        }));

        (status, body).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<DispatchError> for AppError {
    fn from(err: DispatchError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        if err.is_not_ready() {
            AppError::NotReady
        } else {
            AppError::Internal(err.to_string())
        }
    }
}
