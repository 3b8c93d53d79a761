//! Gate officer endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use domain::models::{NewVisit, VisitRequest, VisitStatus};
use domain::services::{VerifiedCredential, VisitDetail};
use serde::Deserialize;
use uuid::Uuid;

use super::{ListResponse, VisitResponse};
use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::CurrentActor;
use crate::middleware::metrics::{record_transition, record_verification};

#[derive(Debug, Deserialize)]
pub struct TodayQuery {
    pub status: Option<VisitStatus>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub credential: String,
}

/// Optional explicit timestamp for arrival or departure; defaults to now.
#[derive(Debug, Default, Deserialize)]
pub struct GateTimeRequest {
    pub at: Option<DateTime<Utc>>,
}

/// POST /api/v1/security/walk-ins
pub async fn record_walk_in(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(input): Json<NewVisit>,
) -> Result<(StatusCode, Json<VisitResponse>), ApiError> {
    let outcome = state.workflow.record_walk_in(&actor, input).await?;
    record_transition("walk_in");
    Ok((StatusCode::CREATED, Json(outcome.into())))
}

/// GET /api/v1/security/walk-ins/pending
pub async fn pending_walk_ins(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> Result<Json<ListResponse<VisitDetail>>, ApiError> {
    Ok(Json(state.workflow.pending_walk_ins(&actor).await?.into()))
}

/// GET /api/v1/security/visits/today?status=
pub async fn todays_visits(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Query(query): Query<TodayQuery>,
) -> Result<Json<ListResponse<VisitDetail>>, ApiError> {
    let visits = state.workflow.todays_visits(&actor, query.status).await?;
    Ok(Json(visits.into()))
}

/// POST /api/v1/security/verify
pub async fn verify_credential(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(body): Json<VerifyRequest>,
) -> Result<Json<VerifiedCredential>, ApiError> {
    let result = state
        .credentials
        .verify(&actor, &body.credential)
        .await
        .map_err(ApiError::from);
    record_verification(&result);
    result.map(Json)
}

/// POST /api/v1/security/requests/:id/arrival
pub async fn record_arrival(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
    body: Option<Json<GateTimeRequest>>,
) -> Result<Json<VisitRequest>, ApiError> {
    let Json(body) = body.unwrap_or_default();
    let request = state.workflow.record_arrival(&actor, id, body.at).await?;
    record_transition("arrival");
    Ok(Json(request))
}

/// POST /api/v1/security/requests/:id/departure
pub async fn record_departure(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
    body: Option<Json<GateTimeRequest>>,
) -> Result<Json<VisitRequest>, ApiError> {
    let Json(body) = body.unwrap_or_default();
    let request = state.workflow.record_departure(&actor, id, body.at).await?;
    record_transition("departure");
    Ok(Json(request))
}

/// POST /api/v1/security/requests/:id/complete
pub async fn complete(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> Result<Json<VisitRequest>, ApiError> {
    let request = state.workflow.complete(&actor, id).await?;
    record_transition("complete");
    Ok(Json(request))
}
