//! Administrator endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use domain::models::UserAccount;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::CurrentActor;

#[derive(Debug, Deserialize, Validate)]
pub struct RejectAccountRequest {
    #[validate(length(min = 1, max = 500, message = "Reason must be 1 to 500 characters"))]
    pub reason: String,
}

/// POST /api/v1/admin/accounts/:id/approve
pub async fn approve_account(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> Result<Json<UserAccount>, ApiError> {
    Ok(Json(state.accounts.approve(&actor, id).await?))
}

/// POST /api/v1/admin/accounts/:id/reject
pub async fn reject_account(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
    Json(body): Json<RejectAccountRequest>,
) -> Result<Json<UserAccount>, ApiError> {
    body.validate()?;
    Ok(Json(state.accounts.reject(&actor, id, &body.reason).await?))
}
