//! Blacklist repository for database operations.

use sqlx::PgConnection;
use uuid::Uuid;

use crate::entities::BlacklistEntryEntity;
use crate::metrics::QueryTimer;
use domain::models::BlacklistEntry;
use domain::store::BlacklistFilter;

/// Repository for blacklist entries. Rows are never deleted.
pub struct BlacklistRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> BlacklistRepository<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    /// Find the active entry for a pair, whether or not it has expired.
    pub async fn find_active_for_pair(
        &mut self,
        visitor_id: Uuid,
        resident_id: Uuid,
    ) -> Result<Option<BlacklistEntryEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_active_blacklist_entry");
        let result = sqlx::query_as::<_, BlacklistEntryEntity>(
            r#"
            SELECT id, visitor_id, resident_id, reason, is_permanent, expires_at, is_active,
                   created_by, created_at, removed_at, removed_by, removal_reason
            FROM blacklist_entries
            WHERE visitor_id = $1 AND resident_id = $2 AND is_active = true
            "#,
        )
        .bind(visitor_id)
        .bind(resident_id)
        .fetch_optional(&mut *self.conn)
        .await;
        timer.record();
        result
    }

    pub async fn find_by_id(
        &mut self,
        id: Uuid,
    ) -> Result<Option<BlacklistEntryEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_blacklist_entry_by_id");
        let result = sqlx::query_as::<_, BlacklistEntryEntity>(
            r#"
            SELECT id, visitor_id, resident_id, reason, is_permanent, expires_at, is_active,
                   created_by, created_at, removed_at, removed_by, removal_reason
            FROM blacklist_entries
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await;
        timer.record();
        result
    }

    /// Insert an entry. A second active entry for the pair violates
    /// `idx_blacklist_active_pair`.
    pub async fn insert(&mut self, entry: &BlacklistEntry) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("insert_blacklist_entry");
        let result = sqlx::query(
            r#"
            INSERT INTO blacklist_entries (id, visitor_id, resident_id, reason, is_permanent,
                                           expires_at, is_active, created_by, created_at,
                                           removed_at, removed_by, removal_reason)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(entry.id)
        .bind(entry.visitor_id)
        .bind(entry.resident_id)
        .bind(&entry.reason)
        .bind(entry.is_permanent)
        .bind(entry.expires_at)
        .bind(entry.is_active)
        .bind(entry.created_by)
        .bind(entry.created_at)
        .bind(entry.removed_at)
        .bind(entry.removed_by)
        .bind(&entry.removal_reason)
        .execute(&mut *self.conn)
        .await;
        timer.record();
        result.map(|_| ())
    }

    /// Write the removal fields.
    pub async fn update(&mut self, entry: &BlacklistEntry) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("update_blacklist_entry");
        let result = sqlx::query(
            r#"
            UPDATE blacklist_entries
            SET is_active = $2, removed_at = $3, removed_by = $4, removal_reason = $5
            WHERE id = $1
            "#,
        )
        .bind(entry.id)
        .bind(entry.is_active)
        .bind(entry.removed_at)
        .bind(entry.removed_by)
        .bind(&entry.removal_reason)
        .execute(&mut *self.conn)
        .await;
        timer.record();
        result.map(|_| ())
    }

    /// Newest first.
    pub async fn list(
        &mut self,
        filter: &BlacklistFilter,
    ) -> Result<Vec<BlacklistEntryEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_blacklist_entries");
        let result = sqlx::query_as::<_, BlacklistEntryEntity>(
            r#"
            SELECT id, visitor_id, resident_id, reason, is_permanent, expires_at, is_active,
                   created_by, created_at, removed_at, removed_by, removal_reason
            FROM blacklist_entries
            WHERE ($1::uuid IS NULL OR resident_id = $1)
              AND ($2::uuid IS NULL OR visitor_id = $2)
              AND ($3 = false OR is_active = true)
            ORDER BY created_at DESC, id DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(filter.resident_id)
        .bind(filter.visitor_id)
        .bind(filter.active_only)
        .bind(filter.limit)
        .bind(filter.offset.unwrap_or(0).max(0))
        .fetch_all(&mut *self.conn)
        .await;
        timer.record();
        result
    }
}
