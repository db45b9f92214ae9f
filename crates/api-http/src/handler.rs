//! Route Handlers
//!
//! `AuthSession` comes before the body extractor in every signature, so an
//! unauthenticated request is rejected without its body being read.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use tracing::info;

use codequal_core::application::JobView;
use codequal_core::VERSION;

use crate::auth::AuthSession;
use crate::error::ApiError;
use crate::state::AppState;
use crate::types::{HealthResponse, SubmitAnalysisRequest, SubmitAnalysisResponse};

/// POST /analysis/repository
pub async fn submit_analysis(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    body: Result<Json<SubmitAnalysisRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmitAnalysisResponse>), ApiError> {
    let Json(body) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let request = body.into_submit_request()?;

    let analysis_id = state.scheduler.submit(&session, request).await?;
    info!(analysis_id = %analysis_id, subject = %session.subject, "Analysis accepted");

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitAnalysisResponse { analysis_id }),
    ))
}

/// GET /analysis/results/{analysisId}
pub async fn get_result(
    State(state): State<AppState>,
    AuthSession(_session): AuthSession,
    Path(analysis_id): Path<String>,
) -> Result<Json<JobView>, ApiError> {
    let view = state.gateway.get_result(&analysis_id).await?;
    Ok(Json(view))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let jobs = state.gateway.job_counts().await?;
    Ok(Json(HealthResponse {
        status: "ok",
        version: VERSION,
        jobs,
    }))
}
