//! In-app notification inbox.
//!
//! Open to every signed-in account, approved or not, so that pending accounts
//! can see their approval notice.

use uuid::Uuid;

use super::context::ServiceContext;
use crate::error::VisitError;
use crate::models::{Actor, Notification};

const MAX_PAGE: i64 = 100;

#[derive(Debug, Clone)]
pub struct Inbox {
    ctx: ServiceContext,
}

impl Inbox {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Newest first.
    pub async fn list(
        &self,
        actor: &Actor,
        unread_only: bool,
        limit: i64,
    ) -> Result<Vec<Notification>, VisitError> {
        let mut tx = self.ctx.store.begin().await?;
        let notifications = tx
            .list_notifications(actor.id, unread_only, limit.clamp(1, MAX_PAGE))
            .await?;
        Ok(notifications)
    }

    /// Marks one notification read. Reading an already-read one is a no-op.
    pub async fn mark_read(&self, actor: &Actor, id: Uuid) -> Result<Notification, VisitError> {
        let mut tx = self.ctx.store.begin().await?;
        let mut notification = tx
            .find_notification(id)
            .await?
            .filter(|n| n.recipient_id == actor.id)
            .ok_or(VisitError::NotFound("Notification"))?;
        if notification.is_read {
            return Ok(notification);
        }

        notification.is_read = true;
        notification.read_at = Some(self.ctx.clock.now());
        tx.update_notification(&notification).await?;
        tx.commit().await?;
        Ok(notification)
    }

    pub async fn mark_all_read(&self, actor: &Actor) -> Result<u64, VisitError> {
        let now = self.ctx.clock.now();
        let mut tx = self.ctx.store.begin().await?;
        let count = tx.mark_all_notifications_read(actor.id, now).await?;
        tx.commit().await?;
        tracing::debug!(user_id = %actor.id, count, "Notifications marked read");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NotificationData, NotificationPriority, UserRole};
    use crate::services::email::MockEmailSender;
    use crate::store::{MemoryStore, VisitStore};
    use chrono::Utc;
    use std::sync::Arc;

    async fn seeded(store: &MemoryStore, recipient: Uuid, count: usize) -> Vec<Uuid> {
        let mut tx = store.begin().await.unwrap();
        let mut ids = Vec::new();
        for _ in 0..count {
            let n = Notification::new(
                recipient,
                "Account approved",
                "Welcome",
                NotificationPriority::High,
                NotificationData::AccountApproved {
                    approved_by: Uuid::new_v4(),
                },
                Utc::now(),
            );
            tx.insert_notification(&n).await.unwrap();
            ids.push(n.id);
        }
        tx.commit().await.unwrap();
        ids
    }

    fn inbox(store: &MemoryStore) -> Inbox {
        Inbox::new(ServiceContext::new(
            Arc::new(store.clone()),
            Arc::new(MockEmailSender::new()),
        ))
    }

    #[tokio::test]
    async fn test_mark_read_is_idempotent_and_private() {
        let store = MemoryStore::new();
        let owner = Actor::new(Uuid::new_v4(), UserRole::Resident, false);
        let stranger = Actor::new(Uuid::new_v4(), UserRole::Resident, true);
        let ids = seeded(&store, owner.id, 1).await;
        let inbox = inbox(&store);

        assert!(matches!(
            inbox.mark_read(&stranger, ids[0]).await,
            Err(VisitError::NotFound("Notification"))
        ));

        let first = inbox.mark_read(&owner, ids[0]).await.unwrap();
        assert!(first.is_read);
        let second = inbox.mark_read(&owner, ids[0]).await.unwrap();
        assert_eq!(first.read_at, second.read_at);
    }

    #[tokio::test]
    async fn test_mark_all_read() {
        let store = MemoryStore::new();
        let owner = Actor::new(Uuid::new_v4(), UserRole::Security, true);
        seeded(&store, owner.id, 3).await;
        let inbox = inbox(&store);

        assert_eq!(inbox.list(&owner, true, 50).await.unwrap().len(), 3);
        assert_eq!(inbox.mark_all_read(&owner).await.unwrap(), 3);
        assert!(inbox.list(&owner, true, 50).await.unwrap().is_empty());
        assert_eq!(inbox.list(&owner, false, 50).await.unwrap().len(), 3);
        assert_eq!(inbox.mark_all_read(&owner).await.unwrap(), 0);
    }
}
