//! User account repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::entities::{UserEntity, UserRoleDb};
use crate::metrics::QueryTimer;

/// Repository for user account reads and the approval decision.
///
/// Borrows the connection of an open transaction.
pub struct UserRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> UserRepository<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    /// Find a user by ID.
    pub async fn find_by_id(&mut self, id: Uuid) -> Result<Option<UserEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_user_by_id");
        let result = sqlx::query_as::<_, UserEntity>(
            r#"
            SELECT id, full_name, email, phone_number, role, unit_number, is_active,
                   is_approved, approved_at, approved_by, rejected_at, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await;
        timer.record();
        result
    }

    /// Find a user by ID and lock the row until the transaction ends.
    pub async fn find_by_id_for_update(
        &mut self,
        id: Uuid,
    ) -> Result<Option<UserEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_user_by_id_for_update");
        let result = sqlx::query_as::<_, UserEntity>(
            r#"
            SELECT id, full_name, email, phone_number, role, unit_number, is_active,
                   is_approved, approved_at, approved_by, rejected_at, created_at
            FROM users
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await;
        timer.record();
        result
    }

    /// Approve and activate the account if it is still pending.
    ///
    /// Returns true if a row was updated.
    pub async fn approve_if_pending(
        &mut self,
        id: Uuid,
        approved_by: Option<Uuid>,
        approved_at: Option<DateTime<Utc>>,
    ) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("approve_user_if_pending");
        let result = sqlx::query(
            r#"
            UPDATE users
            SET is_approved = true, is_active = true, approved_at = $2, approved_by = $3
            WHERE id = $1 AND is_approved = false AND rejected_at IS NULL
            "#,
        )
        .bind(id)
        .bind(approved_at)
        .bind(approved_by)
        .execute(&mut *self.conn)
        .await;
        timer.record();
        result.map(|r| r.rows_affected() > 0)
    }

    /// Deactivate and mark the account rejected if it is still pending.
    ///
    /// Returns true if a row was updated.
    pub async fn reject_if_pending(
        &mut self,
        id: Uuid,
        rejected_at: Option<DateTime<Utc>>,
    ) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("reject_user_if_pending");
        let result = sqlx::query(
            r#"
            UPDATE users
            SET is_active = false, rejected_at = COALESCE($2, NOW())
            WHERE id = $1 AND is_approved = false AND rejected_at IS NULL
            "#,
        )
        .bind(id)
        .bind(rejected_at)
        .execute(&mut *self.conn)
        .await;
        timer.record();
        result.map(|r| r.rows_affected() > 0)
    }

    /// Active, approved security officers, oldest account first.
    pub async fn list_active_security(&mut self) -> Result<Vec<UserEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_active_security");
        let result = sqlx::query_as::<_, UserEntity>(
            r#"
            SELECT id, full_name, email, phone_number, role, unit_number, is_active,
                   is_approved, approved_at, approved_by, rejected_at, created_at
            FROM users
            WHERE role = $1 AND is_active = true AND is_approved = true
            ORDER BY created_at
            "#,
        )
        .bind(UserRoleDb::Security)
        .fetch_all(&mut *self.conn)
        .await;
        timer.record();
        result
    }
}
