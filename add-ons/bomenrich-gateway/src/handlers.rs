//! HTTP surface for the workflow engine: progress
//! queries and pause/resume/cancel signal relay, plus liveness/readiness
//! checks for orchestration probes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use bomenrich_core::CoreError;
use bomenrich_events::{WorkflowDispatch, WorkflowSignal};

use crate::auth::Authed;
use crate::state::AppState;

pub struct ApiError(CoreError);

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.kind() {
            bomenrich_core::ErrorKind::Validation => StatusCode::BAD_REQUEST,
            bomenrich_core::ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
            bomenrich_core::ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            bomenrich_core::ErrorKind::NotFound => StatusCode::NOT_FOUND,
            bomenrich_core::ErrorKind::Conflict => StatusCode::CONFLICT,
            bomenrich_core::ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            bomenrich_core::ErrorKind::Transient => StatusCode::SERVICE_UNAVAILABLE,
            bomenrich_core::ErrorKind::PermanentDownstream => StatusCode::BAD_GATEWAY,
            bomenrich_core::ErrorKind::CoordinatorFatal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({"error": self.0.to_string()}))).into_response()
    }
}

#[derive(Serialize)]
pub struct ProgressResponse {
    pub state: String,
    pub total: u32,
    pub enriched: u32,
    pub failed: u32,
    pub skipped: u32,
    pub percent_complete: f64,
}

pub async fn get_progress(
    State(app): State<AppState>,
    Authed(auth): Authed,
    Path(workflow_id): Path<String>,
) -> Result<Json<ProgressResponse>, ApiError> {
    auth.require_role(bomenrich_auth::Role::Analyst)?;

    match app.engine.get_progress(&auth, &workflow_id).await? {
        Some((state, progress)) => Ok(Json(ProgressResponse {
                    state: format!("{state:?}"),
                    total: progress.total,
                    enriched: progress.enriched,
                    failed: progress.failed,
                    skipped: progress.skipped,
                    percent_complete: progress.percent_complete(),
                })),
        None => Err(ApiError(CoreError::NotFound)),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Pause,
    Resume,
    Cancel,
}

#[derive(Deserialize)]
pub struct SignalRequest {
    pub signal: SignalKind,
}

pub async fn signal_workflow(
    State(app): State<AppState>,
    Authed(auth): Authed,
    Path(workflow_id): Path<String>,
    Json(body): Json<SignalRequest>,
) -> Result<StatusCode, ApiError> {
    auth.require_role(bomenrich_auth::Role::Engineer)?;

    let signal = match body.signal {
        SignalKind::Pause => WorkflowSignal::Pause,
        SignalKind::Resume => WorkflowSignal::Resume,
        SignalKind::Cancel => WorkflowSignal::Cancel,
    };
    app.engine.signal_workflow_authorized(&auth, &workflow_id, signal).await?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn healthz() -> StatusCode {
    StatusCode::OK
}

pub async fn readyz(State(app): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").execute(&app.db).await {
        Ok(_) => StatusCode::OK,
        Err(err) => {
            tracing::warn!(error = %err, "readiness check failed: database unreachable");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
