//! PostgreSQL implementation of the domain storage contract.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use domain::models::{
    BlacklistEntry, Notification, UserAccount, VisitRequest, VisitStatus, Visitor,
};
use domain::store::{
    BlacklistFilter, LockKey, StoreError, VisitRequestFilter, VisitStore, VisitTx,
};

use crate::metrics::QueryTimer;
use crate::repositories::{
    BlacklistRepository, NotificationRepository, UserRepository, VisitRequestRepository,
    VisitorRepository,
};

/// PostgreSQL error code for unique_violation.
const UNIQUE_VIOLATION: &str = "23505";

/// Maps a driver error onto the storage contract.
///
/// Unique-index violations become `Conflict`; pool exhaustion and I/O
/// failures become `Unavailable`.
pub fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            StoreError::Conflict(db_err.message().to_string())
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(err.to_string())
        }
        _ => StoreError::Database(err.to_string()),
    }
}

/// Record store backed by a PostgreSQL pool.
#[derive(Clone)]
pub struct PgVisitStore {
    pool: PgPool,
}

impl PgVisitStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl VisitStore for PgVisitStore {
    async fn begin(&self) -> Result<Box<dyn VisitTx>, StoreError> {
        let tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        Ok(Box::new(PgVisitTx { tx }))
    }
}

/// One open database transaction. Dropping it rolls back.
pub struct PgVisitTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait::async_trait]
impl VisitTx for PgVisitTx {
    async fn lock(&mut self, key: &LockKey) -> Result<(), StoreError> {
        let timer = QueryTimer::new("advisory_xact_lock");
        let result = sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(key.to_string())
            .execute(&mut *self.tx)
            .await;
        timer.record();
        result.map(|_| ()).map_err(map_sqlx_error)
    }

    async fn find_user(&mut self, id: Uuid) -> Result<Option<UserAccount>, StoreError> {
        UserRepository::new(&mut self.tx)
            .find_by_id(id)
            .await
            .map(|u| u.map(Into::into))
            .map_err(map_sqlx_error)
    }

    async fn find_user_for_update(
        &mut self,
        id: Uuid,
    ) -> Result<Option<UserAccount>, StoreError> {
        UserRepository::new(&mut self.tx)
            .find_by_id_for_update(id)
            .await
            .map(|u| u.map(Into::into))
            .map_err(map_sqlx_error)
    }

    async fn approve_user_if_pending(&mut self, user: &UserAccount) -> Result<bool, StoreError> {
        UserRepository::new(&mut self.tx)
            .approve_if_pending(user.id, user.approved_by, user.approved_at)
            .await
            .map_err(map_sqlx_error)
    }

    async fn reject_user_if_pending(&mut self, user: &UserAccount) -> Result<bool, StoreError> {
        UserRepository::new(&mut self.tx)
            .reject_if_pending(user.id, user.rejected_at)
            .await
            .map_err(map_sqlx_error)
    }

    async fn list_active_security(&mut self) -> Result<Vec<UserAccount>, StoreError> {
        UserRepository::new(&mut self.tx)
            .list_active_security()
            .await
            .map(|users| users.into_iter().map(Into::into).collect())
            .map_err(map_sqlx_error)
    }

    async fn find_visitor(&mut self, id: Uuid) -> Result<Option<Visitor>, StoreError> {
        VisitorRepository::new(&mut self.tx)
            .find_by_id(id)
            .await
            .map(|v| v.map(Into::into))
            .map_err(map_sqlx_error)
    }

    async fn find_visitor_by_phone(
        &mut self,
        phone: &str,
    ) -> Result<Option<Visitor>, StoreError> {
        VisitorRepository::new(&mut self.tx)
            .find_by_phone(phone)
            .await
            .map(|v| v.map(Into::into))
            .map_err(map_sqlx_error)
    }

    async fn insert_visitor(&mut self, visitor: &Visitor) -> Result<(), StoreError> {
        VisitorRepository::new(&mut self.tx)
            .insert(visitor)
            .await
            .map_err(map_sqlx_error)
    }

    async fn update_visitor(&mut self, visitor: &Visitor) -> Result<(), StoreError> {
        VisitorRepository::new(&mut self.tx)
            .update(visitor)
            .await
            .map_err(map_sqlx_error)
    }

    async fn find_visit_request(&mut self, id: Uuid) -> Result<Option<VisitRequest>, StoreError> {
        VisitRequestRepository::new(&mut self.tx)
            .find_by_id(id)
            .await
            .map(|r| r.map(Into::into))
            .map_err(map_sqlx_error)
    }

    async fn find_visit_request_for_update(
        &mut self,
        id: Uuid,
    ) -> Result<Option<VisitRequest>, StoreError> {
        VisitRequestRepository::new(&mut self.tx)
            .find_by_id_for_update(id)
            .await
            .map(|r| r.map(Into::into))
            .map_err(map_sqlx_error)
    }

    async fn find_visit_request_by_credential(
        &mut self,
        credential_hash: &str,
    ) -> Result<Option<VisitRequest>, StoreError> {
        VisitRequestRepository::new(&mut self.tx)
            .find_by_credential_hash(credential_hash)
            .await
            .map(|r| r.map(Into::into))
            .map_err(map_sqlx_error)
    }

    async fn find_live_visit_request(
        &mut self,
        visitor_id: Uuid,
        resident_id: Uuid,
        visit_date: NaiveDate,
    ) -> Result<Option<VisitRequest>, StoreError> {
        VisitRequestRepository::new(&mut self.tx)
            .find_live(visitor_id, resident_id, visit_date)
            .await
            .map(|r| r.map(Into::into))
            .map_err(map_sqlx_error)
    }

    async fn insert_visit_request(&mut self, request: &VisitRequest) -> Result<(), StoreError> {
        VisitRequestRepository::new(&mut self.tx)
            .insert(request)
            .await
            .map_err(map_sqlx_error)
    }

    async fn update_visit_request_if_status(
        &mut self,
        request: &VisitRequest,
        expected: VisitStatus,
    ) -> Result<bool, StoreError> {
        VisitRequestRepository::new(&mut self.tx)
            .update_if_status(request, expected)
            .await
            .map_err(map_sqlx_error)
    }

    async fn list_visit_requests(
        &mut self,
        filter: &VisitRequestFilter,
    ) -> Result<Vec<VisitRequest>, StoreError> {
        VisitRequestRepository::new(&mut self.tx)
            .list(filter)
            .await
            .map(|rows| rows.into_iter().map(Into::into).collect())
            .map_err(map_sqlx_error)
    }

    async fn find_active_blacklist_entry(
        &mut self,
        visitor_id: Uuid,
        resident_id: Uuid,
    ) -> Result<Option<BlacklistEntry>, StoreError> {
        BlacklistRepository::new(&mut self.tx)
            .find_active_for_pair(visitor_id, resident_id)
            .await
            .map(|e| e.map(Into::into))
            .map_err(map_sqlx_error)
    }

    async fn find_blacklist_entry(
        &mut self,
        id: Uuid,
    ) -> Result<Option<BlacklistEntry>, StoreError> {
        BlacklistRepository::new(&mut self.tx)
            .find_by_id(id)
            .await
            .map(|e| e.map(Into::into))
            .map_err(map_sqlx_error)
    }

    async fn insert_blacklist_entry(&mut self, entry: &BlacklistEntry) -> Result<(), StoreError> {
        BlacklistRepository::new(&mut self.tx)
            .insert(entry)
            .await
            .map_err(map_sqlx_error)
    }

    async fn update_blacklist_entry(&mut self, entry: &BlacklistEntry) -> Result<(), StoreError> {
        BlacklistRepository::new(&mut self.tx)
            .update(entry)
            .await
            .map_err(map_sqlx_error)
    }

    async fn list_blacklist_entries(
        &mut self,
        filter: &BlacklistFilter,
    ) -> Result<Vec<BlacklistEntry>, StoreError> {
        BlacklistRepository::new(&mut self.tx)
            .list(filter)
            .await
            .map(|rows| rows.into_iter().map(Into::into).collect())
            .map_err(map_sqlx_error)
    }

    async fn insert_notification(
        &mut self,
        notification: &Notification,
    ) -> Result<(), StoreError> {
        NotificationRepository::new(&mut self.tx)
            .insert(notification)
            .await
            .map_err(map_sqlx_error)
    }

    async fn find_notification(&mut self, id: Uuid) -> Result<Option<Notification>, StoreError> {
        NotificationRepository::new(&mut self.tx)
            .find_by_id(id)
            .await
            .map(|n| n.map(Into::into))
            .map_err(map_sqlx_error)
    }

    async fn update_notification(
        &mut self,
        notification: &Notification,
    ) -> Result<(), StoreError> {
        NotificationRepository::new(&mut self.tx)
            .update_read_state(notification)
            .await
            .map_err(map_sqlx_error)
    }

    async fn list_notifications(
        &mut self,
        recipient_id: Uuid,
        unread_only: bool,
        limit: i64,
    ) -> Result<Vec<Notification>, StoreError> {
        NotificationRepository::new(&mut self.tx)
            .list_for_recipient(recipient_id, unread_only, limit)
            .await
            .map(|rows| rows.into_iter().map(Into::into).collect())
            .map_err(map_sqlx_error)
    }

    async fn mark_all_notifications_read(
        &mut self,
        recipient_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        NotificationRepository::new(&mut self.tx)
            .mark_all_read(recipient_id, at)
            .await
            .map_err(map_sqlx_error)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(map_sqlx_error)
    }
}
