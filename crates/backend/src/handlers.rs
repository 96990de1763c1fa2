//! Axum REST handlers for the campaign API.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use outreach_core::{ApprovalSubmission, Campaign, CampaignStartRequest, Channel};
use serde::Serialize;
use tracing::warn;

use crate::executor::PipelineExecutor;

/// Shared handler state.
#[derive(Clone)]
pub struct BackendState {
    pub executor: PipelineExecutor,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ApprovalAck {
    pub status: &'static str,
    pub approved: Vec<Channel>,
    pub regen: Vec<Channel>,
    pub skipped: Vec<Channel>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: &str, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            message: message.into(),
        }),
    )
}

fn not_found(id: &str) -> ApiError {
    api_error(
        StatusCode::NOT_FOUND,
        "campaign_not_found",
        format!("campaign {id} not found"),
    )
}

/// POST /api/v1/campaigns
pub async fn create_campaign(
    State(state): State<BackendState>,
    Json(request): Json<CampaignStartRequest>,
) -> Result<(StatusCode, Json<Campaign>), ApiError> {
    if request.content.trim().is_empty() {
        metrics::counter!("backend.validation_errors").increment(1);
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "invalid_start_request",
            "content must not be empty",
        ));
    }
    let campaign = state.executor.submit(&request);
    Ok((StatusCode::CREATED, Json(campaign)))
}

/// GET /api/v1/campaigns/:campaign_id
pub async fn get_campaign(
    State(state): State<BackendState>,
    Path(campaign_id): Path<String>,
) -> Result<Json<Campaign>, ApiError> {
    state
        .executor
        .store()
        .get(&campaign_id)
        .map(Json)
        .ok_or_else(|| not_found(&campaign_id))
}

/// POST /api/v1/campaigns/:campaign_id/approve
pub async fn approve_campaign(
    State(state): State<BackendState>,
    Path(campaign_id): Path<String>,
    Json(batch): Json<ApprovalSubmission>,
) -> Result<Json<ApprovalAck>, ApiError> {
    if let Err(e) = batch.ensure_disjoint() {
        warn!(campaign_id = %campaign_id, error = %e, "Approval batch rejected");
        metrics::counter!("backend.validation_errors").increment(1);
        return Err(api_error(StatusCode::BAD_REQUEST, "invalid_approval", e.to_string()));
    }

    state
        .executor
        .on_approval(&campaign_id, batch.clone())
        .ok_or_else(|| not_found(&campaign_id))?;

    metrics::counter!("backend.approvals.received").increment(1);
    Ok(Json(ApprovalAck {
        status: "ok",
        approved: batch.approved,
        regen: batch.regen,
        skipped: batch.skipped,
    }))
}

/// GET / and GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "Outreach Engine API",
    })
}
