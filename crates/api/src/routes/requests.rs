//! Decisions on individual visit requests.

use axum::{
    extract::{Path, State},
    Json,
};
use domain::models::VisitRequest;
use domain::services::VisitDetail;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::VisitResponse;
use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::CurrentActor;
use crate::middleware::metrics::record_transition;

#[derive(Debug, Deserialize, Validate)]
pub struct DenyRequest {
    #[validate(length(min = 1, max = 500, message = "Reason must be 1 to 500 characters"))]
    pub reason: String,
}

/// GET /api/v1/requests/:id
pub async fn get_request(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> Result<Json<VisitDetail>, ApiError> {
    Ok(Json(state.workflow.get(&actor, id).await?))
}

/// POST /api/v1/requests/:id/approve
pub async fn approve(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> Result<Json<VisitResponse>, ApiError> {
    let outcome = state.workflow.approve(&actor, id).await?;
    record_transition("approve");
    Ok(Json(outcome.into()))
}

/// POST /api/v1/requests/:id/deny
///
/// Denial also blacklists the visitor for this resident.
pub async fn deny(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
    Json(body): Json<DenyRequest>,
) -> Result<Json<VisitRequest>, ApiError> {
    body.validate()?;
    let request = state.workflow.deny(&actor, id, &body.reason).await?;
    record_transition("deny");
    Ok(Json(request))
}
