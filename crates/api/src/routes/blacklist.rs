//! Blacklist administration.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use domain::models::{BlacklistEntry, NewBlacklistEntry};
use domain::services::BlacklistQuery;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::ListResponse;
use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::CurrentActor;

#[derive(Debug, Deserialize)]
pub struct ListBlacklistQuery {
    pub resident_id: Option<Uuid>,
    pub visitor_id: Option<Uuid>,
    #[serde(default)]
    pub include_removed: bool,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Deserialize, Validate)]
pub struct RemoveEntryRequest {
    #[validate(length(min = 1, max = 500, message = "Reason must be 1 to 500 characters"))]
    pub reason: String,
}

/// GET /api/v1/blacklist
pub async fn list_entries(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Query(query): Query<ListBlacklistQuery>,
) -> Result<Json<ListResponse<BlacklistEntry>>, ApiError> {
    let entries = state
        .blacklist
        .list(
            &actor,
            BlacklistQuery {
                resident_id: query.resident_id,
                visitor_id: query.visitor_id,
                include_removed: query.include_removed,
                limit: query.limit,
                offset: query.offset,
            },
        )
        .await?;
    Ok(Json(entries.into()))
}

/// POST /api/v1/blacklist
///
/// 201 when a new entry was imposed, 200 when one was already in force.
pub async fn add_entry(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(input): Json<NewBlacklistEntry>,
) -> Result<(StatusCode, Json<BlacklistEntry>), ApiError> {
    let (entry, created) = state.blacklist.add(&actor, input).await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(entry)))
}

/// POST /api/v1/blacklist/:id/remove
pub async fn remove_entry(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
    Json(body): Json<RemoveEntryRequest>,
) -> Result<Json<BlacklistEntry>, ApiError> {
    body.validate()?;
    Ok(Json(state.blacklist.remove(&actor, id, &body.reason).await?))
}
