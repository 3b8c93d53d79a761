//! Account approval by administrators.
//!
//! A registration is pending until an administrator either approves it, which
//! activates the account, or rejects it, which deactivates it. The decision is
//! final and is written with a compare-and-swap on the pending state.

use uuid::Uuid;

use shared::validation::validate_reason;

use super::context::ServiceContext;
use super::email::Outbox;
use super::notification::Dispatcher;
use crate::error::VisitError;
use crate::models::{Actor, UserAccount, UserRole};

#[derive(Debug, Clone)]
pub struct AccountApprovals {
    ctx: ServiceContext,
}

impl AccountApprovals {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Approves a newly registered account and tells its holder.
    pub async fn approve(&self, actor: &Actor, user_id: Uuid) -> Result<UserAccount, VisitError> {
        actor.require(&[UserRole::Admin])?;
        let now = self.ctx.clock.now();
        let mut tx = self.ctx.store.begin().await?;

        let mut user = tx
            .find_user_for_update(user_id)
            .await?
            .ok_or(VisitError::NotFound("User"))?;
        ensure_pending(&user, "approve")?;

        user.is_approved = true;
        user.is_active = true;
        user.approved_at = Some(now);
        user.approved_by = Some(actor.id);
        if !tx.approve_user_if_pending(&user).await? {
            return Err(VisitError::invalid_transition("approve", "decided"));
        }

        let mut outbox = Outbox::new();
        Dispatcher::new(&self.ctx.policy, now)
            .account_approved(&mut *tx, &mut outbox, &user, actor.id)
            .await?;
        tx.commit().await?;

        tracing::info!(
            user_id = %user.id,
            role = %user.role,
            approved_by = %actor.id,
            "Account approved"
        );

        outbox.deliver(self.ctx.mailer.clone(), self.ctx.delivery).await;
        Ok(user)
    }

    /// Rejects a pending registration, deactivating the account, and emails
    /// the reason to its holder.
    pub async fn reject(
        &self,
        actor: &Actor,
        user_id: Uuid,
        reason: &str,
    ) -> Result<UserAccount, VisitError> {
        actor.require(&[UserRole::Admin])?;
        validate_reason(reason)?;
        let reason = reason.trim();
        let now = self.ctx.clock.now();
        let mut tx = self.ctx.store.begin().await?;

        let mut user = tx
            .find_user_for_update(user_id)
            .await?
            .ok_or(VisitError::NotFound("User"))?;
        ensure_pending(&user, "reject")?;

        user.is_active = false;
        user.rejected_at = Some(now);
        if !tx.reject_user_if_pending(&user).await? {
            return Err(VisitError::invalid_transition("reject", "decided"));
        }

        let mut outbox = Outbox::new();
        Dispatcher::new(&self.ctx.policy, now).account_rejected(&mut outbox, &user, reason);
        tx.commit().await?;

        tracing::info!(
            user_id = %user.id,
            role = %user.role,
            rejected_by = %actor.id,
            "Account rejected"
        );

        outbox.deliver(self.ctx.mailer.clone(), self.ctx.delivery).await;
        Ok(user)
    }
}

fn ensure_pending(user: &UserAccount, action: &'static str) -> Result<(), VisitError> {
    if user.is_approved {
        Err(VisitError::invalid_transition(action, "approved"))
    } else if user.rejected_at.is_some() {
        Err(VisitError::invalid_transition(action, "rejected"))
    } else {
        Ok(())
    }
}
