//! Anonymous, visitor-facing endpoints.
//!
//! The visitor proves ownership of a request only by its phone number.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use domain::models::{EntryType, NewVisit, VisitRequest};
use domain::services::VisitorStatus;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::VisitResponse;
use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::metrics::record_transition;

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub phone_number: String,
}

#[derive(Debug, Deserialize)]
pub struct BlacklistCheckQuery {
    pub phone: String,
    pub resident_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct BlacklistCheckResponse {
    pub blacklisted: bool,
}

/// POST /api/v1/visitor/requests
pub async fn create_request(
    State(state): State<AppState>,
    Json(input): Json<NewVisit>,
) -> Result<(StatusCode, Json<VisitResponse>), ApiError> {
    let outcome = state
        .workflow
        .create(None, EntryType::PreRegistered, input)
        .await?;
    record_transition("create");
    Ok((StatusCode::CREATED, Json(outcome.into())))
}

/// POST /api/v1/visitor/requests/:id/cancel
pub async fn cancel_request(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<CancelRequest>,
) -> Result<Json<VisitRequest>, ApiError> {
    let request = state.workflow.cancel(id, &body.phone_number).await?;
    record_transition("cancel");
    Ok(Json(request))
}

/// GET /api/v1/visitor/status/:phone
pub async fn status(
    State(state): State<AppState>,
    Path(phone): Path<String>,
) -> Result<Json<VisitorStatus>, ApiError> {
    Ok(Json(state.directory.status(&phone).await?))
}

/// GET /api/v1/visitor/blacklist-check?phone=&resident_id=
pub async fn blacklist_check(
    State(state): State<AppState>,
    Query(query): Query<BlacklistCheckQuery>,
) -> Result<Json<BlacklistCheckResponse>, ApiError> {
    let blacklisted = state
        .blacklist
        .is_blacklisted(&query.phone, query.resident_id)
        .await?;
    Ok(Json(BlacklistCheckResponse { blacklisted }))
}
