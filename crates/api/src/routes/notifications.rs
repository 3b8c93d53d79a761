//! In-app notification inbox.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use domain::models::Notification;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ListResponse;
use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::CurrentActor;

#[derive(Debug, Deserialize)]
pub struct InboxQuery {
    #[serde(default)]
    pub unread_only: bool,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Serialize)]
pub struct MarkAllReadResponse {
    pub updated: u64,
}

/// GET /api/v1/notifications?unread_only=&limit=
pub async fn list(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Query(query): Query<InboxQuery>,
) -> Result<Json<ListResponse<Notification>>, ApiError> {
    let notifications = state
        .inbox
        .list(&actor, query.unread_only, query.limit)
        .await?;
    Ok(Json(notifications.into()))
}

/// POST /api/v1/notifications/:id/read
pub async fn mark_read(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> Result<Json<Notification>, ApiError> {
    Ok(Json(state.inbox.mark_read(&actor, id).await?))
}

/// POST /api/v1/notifications/read-all
pub async fn mark_all_read(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> Result<Json<MarkAllReadResponse>, ApiError> {
    let updated = state.inbox.mark_all_read(&actor).await?;
    Ok(Json(MarkAllReadResponse { updated }))
}
