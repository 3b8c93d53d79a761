//! Notification repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::entities::{NotificationEntity, NotificationPriorityDb};
use crate::metrics::QueryTimer;
use domain::models::Notification;

/// Repository for in-app notifications.
pub struct NotificationRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> NotificationRepository<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    pub async fn insert(&mut self, notification: &Notification) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("insert_notification");
        let result = sqlx::query(
            r#"
            INSERT INTO notifications (id, recipient_id, title, message, priority, category,
                                       data, is_read, created_at, read_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(notification.id)
        .bind(notification.recipient_id)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(NotificationPriorityDb::from(notification.priority))
        .bind(notification.data.category())
        .bind(Json(&notification.data))
        .bind(notification.is_read)
        .bind(notification.created_at)
        .bind(notification.read_at)
        .execute(&mut *self.conn)
        .await;
        timer.record();
        result.map(|_| ())
    }

    pub async fn find_by_id(
        &mut self,
        id: Uuid,
    ) -> Result<Option<NotificationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_notification_by_id");
        let result = sqlx::query_as::<_, NotificationEntity>(
            r#"
            SELECT id, recipient_id, title, message, priority, category, data, is_read,
                   created_at, read_at
            FROM notifications
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await;
        timer.record();
        result
    }

    /// Write the read state. Content is immutable.
    pub async fn update_read_state(
        &mut self,
        notification: &Notification,
    ) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("update_notification_read_state");
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET is_read = $2, read_at = $3
            WHERE id = $1
            "#,
        )
        .bind(notification.id)
        .bind(notification.is_read)
        .bind(notification.read_at)
        .execute(&mut *self.conn)
        .await;
        timer.record();
        result.map(|_| ())
    }

    /// Newest first.
    pub async fn list_for_recipient(
        &mut self,
        recipient_id: Uuid,
        unread_only: bool,
        limit: i64,
    ) -> Result<Vec<NotificationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_notifications");
        let result = sqlx::query_as::<_, NotificationEntity>(
            r#"
            SELECT id, recipient_id, title, message, priority, category, data, is_read,
                   created_at, read_at
            FROM notifications
            WHERE recipient_id = $1 AND ($2 = false OR is_read = false)
            ORDER BY created_at DESC, id DESC
            LIMIT $3
            "#,
        )
        .bind(recipient_id)
        .bind(unread_only)
        .bind(limit)
        .fetch_all(&mut *self.conn)
        .await;
        timer.record();
        result
    }

    /// Returns the number of notifications marked read.
    pub async fn mark_all_read(
        &mut self,
        recipient_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("mark_all_notifications_read");
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET is_read = true, read_at = $2
            WHERE recipient_id = $1 AND is_read = false
            "#,
        )
        .bind(recipient_id)
        .bind(at)
        .execute(&mut *self.conn)
        .await;
        timer.record();
        result.map(|r| r.rows_affected())
    }
}
