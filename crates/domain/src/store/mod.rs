//! Transactional storage contract.
//!
//! Every domain operation opens one [`VisitTx`], performs all of its reads and
//! writes through it, and commits once. Dropping a transaction without calling
//! [`VisitTx::commit`] rolls it back.

pub mod memory;

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    BlacklistEntry, EntryType, Notification, UserAccount, VisitRequest, VisitStatus, Visitor,
};

pub use memory::MemoryStore;

/// Storage-layer failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    /// A uniqueness rule was violated.
    #[error("Storage conflict: {0}")]
    Conflict(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Named transaction-scoped locks.
///
/// Held until the owning transaction commits or rolls back.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LockKey {
    /// Serializes the duplicate-request guard for one visitor, resident and day.
    VisitSlot {
        visitor_id: Uuid,
        resident_id: Uuid,
        date: NaiveDate,
    },
    /// Serializes blacklist check-then-insert for one pair.
    BlacklistPair { visitor_id: Uuid, resident_id: Uuid },
    /// Serializes find-or-create of a visitor by phone.
    VisitorPhone(String),
}

impl std::fmt::Display for LockKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockKey::VisitSlot {
                visitor_id,
                resident_id,
                date,
            } => write!(f, "visit-slot:{}:{}:{}", visitor_id, resident_id, date),
            LockKey::BlacklistPair {
                visitor_id,
                resident_id,
            } => write!(f, "blacklist:{}:{}", visitor_id, resident_id),
            LockKey::VisitorPhone(phone) => write!(f, "visitor-phone:{}", phone),
        }
    }
}

/// Sort order for visit request listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VisitOrder {
    #[default]
    NewestFirst,
    ScheduledAscending,
}

/// Filter for [`VisitTx::list_visit_requests`]. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct VisitRequestFilter {
    pub resident_id: Option<Uuid>,
    pub visitor_id: Option<Uuid>,
    /// Empty matches every status.
    pub statuses: Vec<VisitStatus>,
    pub entry_type: Option<EntryType>,
    pub visit_date: Option<NaiveDate>,
    /// Inclusive lower bound on `visit_date`.
    pub visit_date_from: Option<NaiveDate>,
    /// Inclusive lower bound on `created_at`.
    pub created_since: Option<DateTime<Utc>>,
    pub order: VisitOrder,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl VisitRequestFilter {
    pub fn matches(&self, request: &VisitRequest) -> bool {
        self.resident_id.map_or(true, |id| request.resident_id == id)
            && self.visitor_id.map_or(true, |id| request.visitor_id == id)
            && (self.statuses.is_empty() || self.statuses.contains(&request.status))
            && self.entry_type.map_or(true, |t| request.entry_type == t)
            && self.visit_date.map_or(true, |d| request.visit_date == d)
            && self.visit_date_from.map_or(true, |d| request.visit_date >= d)
            && self.created_since.map_or(true, |at| request.created_at >= at)
    }
}

/// Filter for [`VisitTx::list_blacklist_entries`].
#[derive(Debug, Clone, Default)]
pub struct BlacklistFilter {
    pub resident_id: Option<Uuid>,
    pub visitor_id: Option<Uuid>,
    pub active_only: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl BlacklistFilter {
    pub fn matches(&self, entry: &BlacklistEntry) -> bool {
        self.resident_id.map_or(true, |id| entry.resident_id == id)
            && self.visitor_id.map_or(true, |id| entry.visitor_id == id)
            && (!self.active_only || entry.is_active)
    }
}

/// Opens transactions against the record store.
#[async_trait::async_trait]
pub trait VisitStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn VisitTx>, StoreError>;
}

/// One open transaction.
#[async_trait::async_trait]
pub trait VisitTx: Send {
    async fn lock(&mut self, key: &LockKey) -> Result<(), StoreError>;

    // Users

    async fn find_user(&mut self, id: Uuid) -> Result<Option<UserAccount>, StoreError>;

    async fn find_user_for_update(&mut self, id: Uuid)
        -> Result<Option<UserAccount>, StoreError>;

    /// Writes `user` only if the stored row is still neither approved nor rejected.
    async fn approve_user_if_pending(&mut self, user: &UserAccount) -> Result<bool, StoreError>;

    /// Same guard as [`VisitTx::approve_user_if_pending`], for a rejection.
    async fn reject_user_if_pending(&mut self, user: &UserAccount) -> Result<bool, StoreError>;

    /// Active, approved security officers.
    async fn list_active_security(&mut self) -> Result<Vec<UserAccount>, StoreError>;

    // Visitors

    async fn find_visitor(&mut self, id: Uuid) -> Result<Option<Visitor>, StoreError>;

    async fn find_visitor_by_phone(&mut self, phone: &str)
        -> Result<Option<Visitor>, StoreError>;

    async fn insert_visitor(&mut self, visitor: &Visitor) -> Result<(), StoreError>;

    async fn update_visitor(&mut self, visitor: &Visitor) -> Result<(), StoreError>;

    // Visit requests

    async fn find_visit_request(&mut self, id: Uuid) -> Result<Option<VisitRequest>, StoreError>;

    /// Like [`find_visit_request`](Self::find_visit_request) but holds a row lock.
    async fn find_visit_request_for_update(
        &mut self,
        id: Uuid,
    ) -> Result<Option<VisitRequest>, StoreError>;

    async fn find_visit_request_by_credential(
        &mut self,
        credential_hash: &str,
    ) -> Result<Option<VisitRequest>, StoreError>;

    /// A pending or approved request for the tuple, if any.
    async fn find_live_visit_request(
        &mut self,
        visitor_id: Uuid,
        resident_id: Uuid,
        visit_date: NaiveDate,
    ) -> Result<Option<VisitRequest>, StoreError>;

    async fn insert_visit_request(&mut self, request: &VisitRequest) -> Result<(), StoreError>;

    /// Compare-and-swap: writes `request` only if the stored status is still
    /// `expected`. Returns whether the write happened.
    async fn update_visit_request_if_status(
        &mut self,
        request: &VisitRequest,
        expected: VisitStatus,
    ) -> Result<bool, StoreError>;

    async fn list_visit_requests(
        &mut self,
        filter: &VisitRequestFilter,
    ) -> Result<Vec<VisitRequest>, StoreError>;

    // Blacklist

    /// The active entry for the pair, expired or not.
    async fn find_active_blacklist_entry(
        &mut self,
        visitor_id: Uuid,
        resident_id: Uuid,
    ) -> Result<Option<BlacklistEntry>, StoreError>;

    async fn find_blacklist_entry(&mut self, id: Uuid)
        -> Result<Option<BlacklistEntry>, StoreError>;

    async fn insert_blacklist_entry(&mut self, entry: &BlacklistEntry) -> Result<(), StoreError>;

    async fn update_blacklist_entry(&mut self, entry: &BlacklistEntry) -> Result<(), StoreError>;

    async fn list_blacklist_entries(
        &mut self,
        filter: &BlacklistFilter,
    ) -> Result<Vec<BlacklistEntry>, StoreError>;

    // Notifications

    async fn insert_notification(&mut self, notification: &Notification)
        -> Result<(), StoreError>;

    async fn find_notification(&mut self, id: Uuid) -> Result<Option<Notification>, StoreError>;

    async fn update_notification(&mut self, notification: &Notification)
        -> Result<(), StoreError>;

    /// Newest first.
    async fn list_notifications(
        &mut self,
        recipient_id: Uuid,
        unread_only: bool,
        limit: i64,
    ) -> Result<Vec<Notification>, StoreError>;

    /// Marks every unread notification of the recipient read. Returns the count.
    async fn mark_all_notifications_read(
        &mut self,
        recipient_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<u64, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
