//! In-memory record store.
//!
//! A transaction holds the store-wide lock for its whole lifetime and works on a
//! private copy of the state, which replaces the shared state on commit. All
//! transactions are therefore serialized, which makes named locks no-ops.
//! Uniqueness rules mirror the PostgreSQL schema.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{
    BlacklistFilter, LockKey, StoreError, VisitOrder, VisitRequestFilter, VisitStore, VisitTx,
};
use crate::models::{
    BlacklistEntry, Notification, UserAccount, UserRole, VisitRequest, VisitStatus, Visitor,
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: HashMap<Uuid, UserAccount>,
    visitors: HashMap<Uuid, Visitor>,
    visit_requests: HashMap<Uuid, VisitRequest>,
    blacklist: HashMap<Uuid, BlacklistEntry>,
    notifications: HashMap<Uuid, Notification>,
}

/// Process-local [`VisitStore`] used by tests and single-node demos.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a user account (accounts are owned by the authentication service).
    pub async fn insert_user(&self, user: UserAccount) {
        self.state.lock().await.users.insert(user.id, user);
    }

    pub async fn user(&self, id: Uuid) -> Option<UserAccount> {
        self.state.lock().await.users.get(&id).cloned()
    }

    pub async fn visit_request(&self, id: Uuid) -> Option<VisitRequest> {
        self.state.lock().await.visit_requests.get(&id).cloned()
    }

    pub async fn visit_requests(&self) -> Vec<VisitRequest> {
        self.state
            .lock()
            .await
            .visit_requests
            .values()
            .cloned()
            .collect()
    }

    pub async fn blacklist_entries(&self) -> Vec<BlacklistEntry> {
        self.state.lock().await.blacklist.values().cloned().collect()
    }

    pub async fn notifications_for(&self, recipient_id: Uuid) -> Vec<Notification> {
        self.state
            .lock()
            .await
            .notifications
            .values()
            .filter(|n| n.recipient_id == recipient_id)
            .cloned()
            .collect()
    }
}

#[async_trait::async_trait]
impl VisitStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn VisitTx>, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx { guard, working }))
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

impl MemoryTx {
    fn decide_user_if_pending(&mut self, user: &UserAccount) -> Result<bool, StoreError> {
        match self.working.users.get_mut(&user.id) {
            Some(stored) if stored.is_pending_approval() => {
                *stored = user.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn check_active_blacklist_unique(&self, entry: &BlacklistEntry) -> Result<(), StoreError> {
        if !entry.is_active {
            return Ok(());
        }
        let clash = self.working.blacklist.values().any(|other| {
            other.id != entry.id
                && other.is_active
                && other.visitor_id == entry.visitor_id
                && other.resident_id == entry.resident_id
        });
        if clash {
            return Err(StoreError::Conflict(
                "active blacklist entry already exists for pair".into(),
            ));
        }
        Ok(())
    }
}

fn page<T>(items: Vec<T>, limit: Option<i64>, offset: Option<i64>) -> Vec<T> {
    let offset = offset.unwrap_or(0).max(0) as usize;
    let limit = limit.map_or(usize::MAX, |l| l.max(0) as usize);
    items.into_iter().skip(offset).take(limit).collect()
}

#[async_trait::async_trait]
impl VisitTx for MemoryTx {
    async fn lock(&mut self, _key: &LockKey) -> Result<(), StoreError> {
        Ok(())
    }

    async fn find_user(&mut self, id: Uuid) -> Result<Option<UserAccount>, StoreError> {
        Ok(self.working.users.get(&id).cloned())
    }

    async fn find_user_for_update(
        &mut self,
        id: Uuid,
    ) -> Result<Option<UserAccount>, StoreError> {
        self.find_user(id).await
    }

    async fn approve_user_if_pending(&mut self, user: &UserAccount) -> Result<bool, StoreError> {
        self.decide_user_if_pending(user)
    }

    async fn reject_user_if_pending(&mut self, user: &UserAccount) -> Result<bool, StoreError> {
        self.decide_user_if_pending(user)
    }

    async fn list_active_security(&mut self) -> Result<Vec<UserAccount>, StoreError> {
        let mut officers: Vec<UserAccount> = self
            .working
            .users
            .values()
            .filter(|u| u.role == UserRole::Security && u.is_active && u.is_approved)
            .cloned()
            .collect();
        officers.sort_by_key(|u| u.created_at);
        Ok(officers)
    }

    async fn find_visitor(&mut self, id: Uuid) -> Result<Option<Visitor>, StoreError> {
        Ok(self.working.visitors.get(&id).cloned())
    }

    async fn find_visitor_by_phone(
        &mut self,
        phone: &str,
    ) -> Result<Option<Visitor>, StoreError> {
        Ok(self
            .working
            .visitors
            .values()
            .find(|v| v.phone_number == phone)
            .cloned())
    }

    async fn insert_visitor(&mut self, visitor: &Visitor) -> Result<(), StoreError> {
        if self
            .working
            .visitors
            .values()
            .any(|v| v.phone_number == visitor.phone_number)
        {
            return Err(StoreError::Conflict(format!(
                "visitor with phone {} already exists",
                visitor.phone_number
            )));
        }
        self.working.visitors.insert(visitor.id, visitor.clone());
        Ok(())
    }

    async fn update_visitor(&mut self, visitor: &Visitor) -> Result<(), StoreError> {
        self.working.visitors.insert(visitor.id, visitor.clone());
        Ok(())
    }

    async fn find_visit_request(&mut self, id: Uuid) -> Result<Option<VisitRequest>, StoreError> {
        Ok(self.working.visit_requests.get(&id).cloned())
    }

    async fn find_visit_request_for_update(
        &mut self,
        id: Uuid,
    ) -> Result<Option<VisitRequest>, StoreError> {
        self.find_visit_request(id).await
    }

    async fn find_visit_request_by_credential(
        &mut self,
        credential_hash: &str,
    ) -> Result<Option<VisitRequest>, StoreError> {
        Ok(self
            .working
            .visit_requests
            .values()
            .find(|r| r.credential_hash.as_deref() == Some(credential_hash))
            .cloned())
    }

    async fn find_live_visit_request(
        &mut self,
        visitor_id: Uuid,
        resident_id: Uuid,
        visit_date: NaiveDate,
    ) -> Result<Option<VisitRequest>, StoreError> {
        Ok(self
            .working
            .visit_requests
            .values()
            .find(|r| {
                r.visitor_id == visitor_id
                    && r.resident_id == resident_id
                    && r.visit_date == visit_date
                    && r.status.is_live()
            })
            .cloned())
    }

    async fn insert_visit_request(&mut self, request: &VisitRequest) -> Result<(), StoreError> {
        if self.working.visit_requests.contains_key(&request.id) {
            return Err(StoreError::Conflict(format!(
                "visit request {} already exists",
                request.id
            )));
        }
        self.working
            .visit_requests
            .insert(request.id, request.clone());
        Ok(())
    }

    async fn update_visit_request_if_status(
        &mut self,
        request: &VisitRequest,
        expected: VisitStatus,
    ) -> Result<bool, StoreError> {
        match self.working.visit_requests.get_mut(&request.id) {
            Some(stored) if stored.status == expected => {
                *stored = request.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_visit_requests(
        &mut self,
        filter: &VisitRequestFilter,
    ) -> Result<Vec<VisitRequest>, StoreError> {
        let mut requests: Vec<VisitRequest> = self
            .working
            .visit_requests
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        match filter.order {
            VisitOrder::NewestFirst => {
                requests.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)))
            }
            VisitOrder::ScheduledAscending => {
                requests.sort_by(|a, b| a.scheduled_at.cmp(&b.scheduled_at).then(a.id.cmp(&b.id)))
            }
        }
        Ok(page(requests, filter.limit, filter.offset))
    }

    async fn find_active_blacklist_entry(
        &mut self,
        visitor_id: Uuid,
        resident_id: Uuid,
    ) -> Result<Option<BlacklistEntry>, StoreError> {
        Ok(self
            .working
            .blacklist
            .values()
            .find(|e| e.is_active && e.visitor_id == visitor_id && e.resident_id == resident_id)
            .cloned())
    }

    async fn find_blacklist_entry(
        &mut self,
        id: Uuid,
    ) -> Result<Option<BlacklistEntry>, StoreError> {
        Ok(self.working.blacklist.get(&id).cloned())
    }

    async fn insert_blacklist_entry(&mut self, entry: &BlacklistEntry) -> Result<(), StoreError> {
        self.check_active_blacklist_unique(entry)?;
        self.working.blacklist.insert(entry.id, entry.clone());
        Ok(())
    }

    async fn update_blacklist_entry(&mut self, entry: &BlacklistEntry) -> Result<(), StoreError> {
        self.check_active_blacklist_unique(entry)?;
        self.working.blacklist.insert(entry.id, entry.clone());
        Ok(())
    }

    async fn list_blacklist_entries(
        &mut self,
        filter: &BlacklistFilter,
    ) -> Result<Vec<BlacklistEntry>, StoreError> {
        let mut entries: Vec<BlacklistEntry> = self
            .working
            .blacklist
            .values()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(page(entries, filter.limit, filter.offset))
    }

    async fn insert_notification(
        &mut self,
        notification: &Notification,
    ) -> Result<(), StoreError> {
        self.working
            .notifications
            .insert(notification.id, notification.clone());
        Ok(())
    }

    async fn find_notification(&mut self, id: Uuid) -> Result<Option<Notification>, StoreError> {
        Ok(self.working.notifications.get(&id).cloned())
    }

    async fn update_notification(
        &mut self,
        notification: &Notification,
    ) -> Result<(), StoreError> {
        self.working
            .notifications
            .insert(notification.id, notification.clone());
        Ok(())
    }

    async fn list_notifications(
        &mut self,
        recipient_id: Uuid,
        unread_only: bool,
        limit: i64,
    ) -> Result<Vec<Notification>, StoreError> {
        let mut notifications: Vec<Notification> = self
            .working
            .notifications
            .values()
            .filter(|n| n.recipient_id == recipient_id && (!unread_only || !n.is_read))
            .cloned()
            .collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(page(notifications, Some(limit), None))
    }

    async fn mark_all_notifications_read(
        &mut self,
        recipient_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let mut count = 0;
        for n in self
            .working
            .notifications
            .values_mut()
            .filter(|n| n.recipient_id == recipient_id && !n.is_read)
        {
            n.is_read = true;
            n.read_at = Some(at);
            count += 1;
        }
        Ok(count)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}
