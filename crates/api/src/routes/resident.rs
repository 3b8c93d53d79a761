//! Resident endpoints.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use domain::models::{EntryType, NewVisit};
use domain::services::VisitDetail;

use super::{ListResponse, PageQuery, VisitResponse};
use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::CurrentActor;
use crate::middleware::metrics::record_transition;

/// POST /api/v1/resident/visitors
///
/// Invites a visitor. Inviting on one's own behalf approves the request at
/// once and returns the credential.
pub async fn invite_visitor(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(input): Json<NewVisit>,
) -> Result<(StatusCode, Json<VisitResponse>), ApiError> {
    let outcome = state
        .workflow
        .create(Some(&actor), EntryType::ResidentInvited, input)
        .await?;
    record_transition("create");
    Ok((StatusCode::CREATED, Json(outcome.into())))
}

/// GET /api/v1/resident/requests/pending
pub async fn pending_requests(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> Result<Json<ListResponse<VisitDetail>>, ApiError> {
    let pending = state.workflow.pending_for_resident(&actor).await?;
    Ok(Json(pending.into()))
}

/// GET /api/v1/resident/requests?limit=&offset=
pub async fn request_history(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Query(page): Query<PageQuery>,
) -> Result<Json<ListResponse<VisitDetail>>, ApiError> {
    let history = state
        .workflow
        .history(&actor, page.limit, page.offset)
        .await?;
    Ok(Json(history.into()))
}
