//! In-app notification entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{Notification, NotificationData, NotificationPriority};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// Database enum for notification priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "notification_priority", rename_all = "lowercase")]
pub enum NotificationPriorityDb {
    Low,
    Medium,
    High,
    Urgent,
}

impl From<NotificationPriorityDb> for NotificationPriority {
    fn from(priority: NotificationPriorityDb) -> Self {
        match priority {
            NotificationPriorityDb::Low => NotificationPriority::Low,
            NotificationPriorityDb::Medium => NotificationPriority::Medium,
            NotificationPriorityDb::High => NotificationPriority::High,
            NotificationPriorityDb::Urgent => NotificationPriority::Urgent,
        }
    }
}

impl From<NotificationPriority> for NotificationPriorityDb {
    fn from(priority: NotificationPriority) -> Self {
        match priority {
            NotificationPriority::Low => NotificationPriorityDb::Low,
            NotificationPriority::Medium => NotificationPriorityDb::Medium,
            NotificationPriority::High => NotificationPriorityDb::High,
            NotificationPriority::Urgent => NotificationPriorityDb::Urgent,
        }
    }
}

/// Database row mapping for the notifications table.
///
/// `data` carries the typed payload as JSONB; `category` duplicates its tag
/// for indexing.
#[derive(Debug, Clone, FromRow)]
pub struct NotificationEntity {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub title: String,
    pub message: String,
    pub priority: NotificationPriorityDb,
    pub category: String,
    pub data: Json<NotificationData>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

impl From<NotificationEntity> for Notification {
    fn from(entity: NotificationEntity) -> Self {
        Self {
            id: entity.id,
            recipient_id: entity.recipient_id,
            title: entity.title,
            message: entity.message,
            priority: entity.priority.into(),
            data: entity.data.0,
            is_read: entity.is_read,
            created_at: entity.created_at,
            read_at: entity.read_at,
        }
    }
}
