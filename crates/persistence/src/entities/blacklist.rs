//! Blacklist entry entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the blacklist_entries table.
#[derive(Debug, Clone, FromRow)]
pub struct BlacklistEntryEntity {
    pub id: Uuid,
    pub visitor_id: Uuid,
    pub resident_id: Uuid,
    pub reason: String,
    pub is_permanent: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub removed_at: Option<DateTime<Utc>>,
    pub removed_by: Option<Uuid>,
    pub removal_reason: Option<String>,
}

impl From<BlacklistEntryEntity> for domain::models::BlacklistEntry {
    fn from(entity: BlacklistEntryEntity) -> Self {
        Self {
            id: entity.id,
            visitor_id: entity.visitor_id,
            resident_id: entity.resident_id,
            reason: entity.reason,
            is_permanent: entity.is_permanent,
            expires_at: entity.expires_at,
            is_active: entity.is_active,
            created_by: entity.created_by,
            created_at: entity.created_at,
            removed_at: entity.removed_at,
            removed_by: entity.removed_by,
            removal_reason: entity.removal_reason,
        }
    }
}
