//! Administrative HTTP surface.
//!
//! JSON-only endpoints mirroring the CLI: submit an invalidation (optionally
//! deferred), read the purge log, truncate it. There is no HTML here — hosts
//! that want a form render one against these routes.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::application::{
    jobs::enqueue_invalidate_urls_job,
    pagination::{LogPage, PageRequest},
    pipeline::InvalidationPipeline,
    repos::{JobsRepo, PurgeLogRepo, RepoError},
};
use crate::domain::entries::PurgeLogEntry;

#[derive(Clone)]
pub struct AdminState {
    pub pipeline: Arc<InvalidationPipeline>,
    pub log: Arc<dyn PurgeLogRepo>,
    pub jobs: Arc<dyn JobsRepo>,
    pub defer_delay: Duration,
}

pub fn build_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/invalidations", post(submit_invalidation))
        .route("/log", get(list_log).delete(truncate_log))
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::NO_CONTENT
}

#[derive(Debug, Deserialize)]
struct InvalidationRequestBody {
    urls: Vec<String>,
    #[serde(default)]
    defer: bool,
}

#[derive(Debug, Serialize)]
struct InvalidationResponseBody {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    job_id: Option<String>,
}

async fn submit_invalidation(
    State(state): State<AdminState>,
    Json(body): Json<InvalidationRequestBody>,
) -> Result<Response, ApiError> {
    if body.defer {
        let job_id =
            enqueue_invalidate_urls_job(state.jobs.as_ref(), body.urls, state.defer_delay)
                .await
                .map_err(ApiError::from_repo)?;
        let response = InvalidationResponseBody { ok: true, job_id };
        return Ok((StatusCode::ACCEPTED, Json(response)).into_response());
    }

    let ok = state.pipeline.invalidate(&body.urls).await;
    let response = InvalidationResponseBody { ok, job_id: None };
    Ok((StatusCode::OK, Json(response)).into_response())
}

#[derive(Debug, Deserialize)]
struct LogQuery {
    #[serde(default = "default_log_limit")]
    limit: u32,
    #[serde(default = "default_log_page")]
    page: u32,
}

fn default_log_limit() -> u32 {
    100
}

fn default_log_page() -> u32 {
    1
}

async fn list_log(
    State(state): State<AdminState>,
    Query(query): Query<LogQuery>,
) -> Result<Json<LogPage<PurgeLogEntry>>, ApiError> {
    let page = state
        .log
        .list(PageRequest::new(query.limit, query.page))
        .await
        .map_err(ApiError::from_repo)?;
    Ok(Json(page))
}

async fn truncate_log(State(state): State<AdminState>) -> Result<StatusCode, ApiError> {
    state.log.truncate().await.map_err(ApiError::from_repo)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

pub mod codes {
    pub const INVALID_INPUT: &str = "invalid_input";
    pub const DB_TIMEOUT: &str = "db_timeout";
    pub const REPO: &str = "repo_error";
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    hint: Option<String>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: &'static str,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message,
            hint,
        }
    }

    pub fn from_repo(err: RepoError) -> Self {
        match err {
            RepoError::InvalidInput { message } => Self::new(
                StatusCode::BAD_REQUEST,
                codes::INVALID_INPUT,
                "Invalid input",
                Some(message),
            ),
            RepoError::Timeout => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                codes::DB_TIMEOUT,
                "Database timeout",
                None,
            ),
            RepoError::Persistence(message) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::REPO,
                "Persistence error",
                Some(message),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message.to_string(),
                hint: self.hint,
            },
        };
        (self.status, Json(body)).into_response()
    }
}
