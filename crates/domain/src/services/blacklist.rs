//! Blacklist ledger.
//!
//! At most one active entry exists per (visitor, resident) pair. An active
//! entry past its expiry no longer bars the pair and is retired the next time
//! an entry for the pair is imposed.

use chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

use super::context::ServiceContext;
use crate::error::VisitError;
use crate::models::blacklist::EXPIRED_REMOVAL_REASON;
use crate::models::{Actor, BlacklistEntry, NewBlacklistEntry, UserRole};
use crate::store::{BlacklistFilter, LockKey, StoreError, VisitTx};

/// True iff an active, unexpired entry bars the pair.
pub(crate) async fn is_blacklisted(
    tx: &mut dyn VisitTx,
    visitor_id: Uuid,
    resident_id: Uuid,
    now: DateTime<Utc>,
) -> Result<bool, StoreError> {
    Ok(tx
        .find_active_blacklist_entry(visitor_id, resident_id)
        .await?
        .is_some_and(|entry| entry.is_in_force(now)))
}

/// Parameters for [`impose`].
pub(crate) struct Imposition<'a> {
    pub visitor_id: Uuid,
    pub resident_id: Uuid,
    pub reason: &'a str,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_by: Uuid,
}

/// Idempotent insert. If an entry is already in force it is returned unchanged
/// (first reason wins) with `false`; otherwise a new entry is stored and
/// returned with `true`.
pub(crate) async fn impose(
    tx: &mut dyn VisitTx,
    imposition: Imposition<'_>,
    now: DateTime<Utc>,
) -> Result<(BlacklistEntry, bool), StoreError> {
    tx.lock(&LockKey::BlacklistPair {
        visitor_id: imposition.visitor_id,
        resident_id: imposition.resident_id,
    })
    .await?;

    if let Some(mut existing) = tx
        .find_active_blacklist_entry(imposition.visitor_id, imposition.resident_id)
        .await?
    {
        if existing.is_in_force(now) {
            return Ok((existing, false));
        }
        existing.retire(None, EXPIRED_REMOVAL_REASON, now);
        tx.update_blacklist_entry(&existing).await?;
    }

    let entry = BlacklistEntry {
        id: Uuid::new_v4(),
        visitor_id: imposition.visitor_id,
        resident_id: imposition.resident_id,
        reason: imposition.reason.trim().to_string(),
        is_permanent: imposition.expires_at.is_none(),
        expires_at: imposition.expires_at,
        is_active: true,
        created_by: imposition.created_by,
        created_at: now,
        removed_at: None,
        removed_by: None,
        removal_reason: None,
    };
    tx.insert_blacklist_entry(&entry).await?;
    Ok((entry, true))
}

/// Query for listing entries.
#[derive(Debug, Clone, Default)]
pub struct BlacklistQuery {
    pub resident_id: Option<Uuid>,
    pub visitor_id: Option<Uuid>,
    pub include_removed: bool,
    pub limit: i64,
    pub offset: i64,
}

/// Blacklist administration and lookups.
#[derive(Debug, Clone)]
pub struct BlacklistLedger {
    ctx: ServiceContext,
}

impl BlacklistLedger {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Visitor-facing check by phone number. Unknown phones are never blacklisted.
    pub async fn is_blacklisted(&self, phone: &str, resident_id: Uuid) -> Result<bool, VisitError> {
        let phone = shared::validation::normalize_phone(phone)?;
        let now = self.ctx.clock.now();
        let mut tx = self.ctx.store.begin().await?;
        match tx.find_visitor_by_phone(&phone).await? {
            Some(visitor) => Ok(is_blacklisted(&mut *tx, visitor.id, resident_id, now).await?),
            None => Ok(false),
        }
    }

    /// Adds an entry. Residents may only bar visitors from themselves.
    ///
    /// Returns the entry in force for the pair and whether it was created now.
    pub async fn add(
        &self,
        actor: &Actor,
        input: NewBlacklistEntry,
    ) -> Result<(BlacklistEntry, bool), VisitError> {
        actor.require(&[UserRole::Resident, UserRole::Admin])?;
        input.validate().map_err(|e| VisitError::validation(e.to_string()))?;

        let resident_id = match (actor.role, input.resident_id) {
            (UserRole::Resident, None) => actor.id,
            (_, Some(id)) if actor.speaks_for_resident(id) => id,
            (UserRole::Resident, Some(_)) => {
                return Err(VisitError::forbidden(
                    "residents may only manage their own blacklist",
                ))
            }
            _ => return Err(VisitError::validation("resident_id is required")),
        };

        let now = self.ctx.clock.now();
        if input.expires_at.is_some_and(|at| at <= now) {
            return Err(VisitError::validation("expires_at must be in the future"));
        }

        let mut tx = self.ctx.store.begin().await?;
        tx.find_visitor(input.visitor_id)
            .await?
            .ok_or(VisitError::NotFound("Visitor"))?;
        match tx.find_user(resident_id).await? {
            Some(user) if user.role == UserRole::Resident => {}
            _ => return Err(VisitError::NotFound("Resident")),
        }

        let (entry, created) = impose(
            &mut *tx,
            Imposition {
                visitor_id: input.visitor_id,
                resident_id,
                reason: &input.reason,
                expires_at: input.expires_at,
                created_by: actor.id,
            },
            now,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(
            blacklist_entry_id = %entry.id,
            visitor_id = %entry.visitor_id,
            resident_id = %entry.resident_id,
            created,
            "Blacklist entry imposed"
        );
        Ok((entry, created))
    }

    /// Removes an entry by flipping it inactive and recording who and why.
    pub async fn remove(
        &self,
        actor: &Actor,
        entry_id: Uuid,
        reason: &str,
    ) -> Result<BlacklistEntry, VisitError> {
        actor.require(&[UserRole::Resident, UserRole::Admin])?;
        shared::validation::validate_reason(reason)?;

        let now = self.ctx.clock.now();
        let mut tx = self.ctx.store.begin().await?;
        let entry = tx
            .find_blacklist_entry(entry_id)
            .await?
            .ok_or(VisitError::NotFound("Blacklist entry"))?;

        if !actor.speaks_for_resident(entry.resident_id) {
            return Err(VisitError::forbidden(
                "residents may only manage their own blacklist",
            ));
        }

        tx.lock(&LockKey::BlacklistPair {
            visitor_id: entry.visitor_id,
            resident_id: entry.resident_id,
        })
        .await?;
        // Re-read under the pair lock
        let mut entry = tx
            .find_blacklist_entry(entry_id)
            .await?
            .ok_or(VisitError::NotFound("Blacklist entry"))?;
        if !entry.is_active {
            return Err(VisitError::invalid_transition("remove", "removed"));
        }

        entry.retire(Some(actor.id), reason.trim(), now);
        tx.update_blacklist_entry(&entry).await?;
        tx.commit().await?;

        tracing::info!(
            blacklist_entry_id = %entry.id,
            removed_by = %actor.id,
            "Blacklist entry removed"
        );
        Ok(entry)
    }

    /// Lists entries. Residents only ever see their own.
    pub async fn list(
        &self,
        actor: &Actor,
        query: BlacklistQuery,
    ) -> Result<Vec<BlacklistEntry>, VisitError> {
        actor.require(&[UserRole::Resident, UserRole::Security, UserRole::Admin])?;

        let resident_id = match actor.role {
            UserRole::Resident => Some(actor.id),
            _ => query.resident_id,
        };
        let filter = BlacklistFilter {
            resident_id,
            visitor_id: query.visitor_id,
            active_only: !query.include_removed,
            limit: Some(query.limit.clamp(1, 200)),
            offset: Some(query.offset.max(0)),
        };

        let mut tx = self.ctx.store.begin().await?;
        Ok(tx.list_blacklist_entries(&filter).await?)
    }
}
