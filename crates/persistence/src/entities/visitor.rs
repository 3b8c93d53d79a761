//! Visitor entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the visitors table.
#[derive(Debug, Clone, FromRow)]
pub struct VisitorEntity {
    pub id: Uuid,
    pub phone_number: String,
    pub full_name: String,
    pub email: Option<String>,
    pub id_number: Option<String>,
    pub company: Option<String>,
    pub default_purpose: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<VisitorEntity> for domain::models::Visitor {
    fn from(entity: VisitorEntity) -> Self {
        Self {
            id: entity.id,
            phone_number: entity.phone_number,
            full_name: entity.full_name,
            email: entity.email,
            id_number: entity.id_number,
            company: entity.company,
            default_purpose: entity.default_purpose,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}
