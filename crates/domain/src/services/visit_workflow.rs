//! Visit request state machine.
//!
//! ```text
//! pending ──approve──> approved ──complete──> completed
//!    │ ──deny──> denied (+ blacklist entry)
//!    └ ──cancel──> cancelled
//! ```
//!
//! Every operation runs in one store transaction. Status changes are written
//! with a compare-and-swap on the previous status, so of two concurrent
//! transitions on the same request exactly one succeeds and the other fails
//! with `InvalidTransition`. Checks run in a fixed order: existence, then
//! permission, then state.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;
use validator::Validate;

use shared::validation::{normalize_phone, trim_optional, validate_reason};

use super::blacklist::{self, Imposition};
use super::context::ServiceContext;
use super::credential;
use super::email::Outbox;
use super::notification::Dispatcher;
use super::visitor_directory;
use crate::error::VisitError;
use crate::models::{
    Actor, EntryType, NewVisit, UserAccount, UserRole, VisitOutcome, VisitRequest, VisitStatus,
    Visitor,
};
use crate::store::{LockKey, VisitOrder, VisitRequestFilter, VisitTx};

/// A request together with the visitor it refers to.
#[derive(Debug, Clone, Serialize)]
pub struct VisitDetail {
    #[serde(flatten)]
    pub request: VisitRequest,
    pub visitor: Visitor,
}

/// Whether creation by `actor` lands directly in `approved`.
///
/// Only the owning resident (or an administrator) acting as inviter is also the
/// approving authority. Walk-ins never self-approve.
pub fn is_self_approving(entry_type: EntryType, actor: Option<&Actor>, resident_id: Uuid) -> bool {
    entry_type != EntryType::WalkIn && actor.is_some_and(|a| a.speaks_for_resident(resident_id))
}

/// Visit request state machine.
#[derive(Debug, Clone)]
pub struct VisitWorkflow {
    ctx: ServiceContext,
}

impl VisitWorkflow {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Creates a pre-registered or resident-invited request.
    ///
    /// Anonymous callers may only pre-register. A signed-in resident (or
    /// administrator) creates on the resident's behalf, which self-approves
    /// and returns a credential.
    pub async fn create(
        &self,
        actor: Option<&Actor>,
        entry_type: EntryType,
        input: NewVisit,
    ) -> Result<VisitOutcome, VisitError> {
        if entry_type == EntryType::WalkIn {
            return Err(VisitError::validation("walk-ins are recorded by security"));
        }
        input
            .validate()
            .map_err(|e| VisitError::validation(e.to_string()))?;

        match actor {
            None if entry_type == EntryType::PreRegistered => {}
            None => return Err(VisitError::forbidden("sign in to invite visitors")),
            Some(actor) => {
                actor.require(&[UserRole::Resident, UserRole::Admin])?;
                if !actor.speaks_for_resident(input.resident_id) {
                    return Err(VisitError::forbidden(
                        "residents may only invite visitors to themselves",
                    ));
                }
            }
        }

        let now = self.ctx.clock.now();
        let scheduled_at = input
            .scheduled_at
            .ok_or_else(|| VisitError::validation("scheduled_at is required"))?;
        if scheduled_at + self.ctx.policy.max_clock_skew < now {
            return Err(VisitError::validation("scheduled time is in the past"));
        }

        let self_approving = is_self_approving(entry_type, actor, input.resident_id);
        self.open(
            Opening {
                entry_type,
                scheduled_at,
                self_approved_by: actor.filter(|_| self_approving).map(|a| a.id),
                security_officer_id: None,
            },
            input,
            now,
        )
        .await
    }

    /// Logs a visitor who turned up at the gate. Always starts `pending`.
    pub async fn record_walk_in(
        &self,
        actor: &Actor,
        input: NewVisit,
    ) -> Result<VisitOutcome, VisitError> {
        actor.require(&[UserRole::Security, UserRole::Admin])?;
        input
            .validate()
            .map_err(|e| VisitError::validation(e.to_string()))?;

        let now = self.ctx.clock.now();
        self.open(
            Opening {
                entry_type: EntryType::WalkIn,
                scheduled_at: now,
                self_approved_by: None,
                security_officer_id: Some(actor.id),
            },
            input,
            now,
        )
        .await
    }

    async fn open(
        &self,
        opening: Opening,
        input: NewVisit,
        now: DateTime<Utc>,
    ) -> Result<VisitOutcome, VisitError> {
        let visit_date = self.ctx.policy.local_date(opening.scheduled_at);
        let mut tx = self.ctx.store.begin().await?;

        let resident = tx
            .find_user(input.resident_id)
            .await?
            .filter(UserAccount::is_receiving_resident)
            .ok_or(VisitError::NotFound("Resident"))?;

        let (phone, existing) =
            visitor_directory::lookup(&mut *tx, &input.visitor.phone_number).await?;
        if let Some(known) = &existing {
            tx.lock(&LockKey::BlacklistPair {
                visitor_id: known.id,
                resident_id: resident.id,
            })
            .await?;
            if blacklist::is_blacklisted(&mut *tx, known.id, resident.id, now).await? {
                tracing::warn!(
                    visitor_id = %known.id,
                    resident_id = %resident.id,
                    entry_type = %opening.entry_type,
                    "Blacklisted visitor refused"
                );
                return Err(VisitError::forbidden("visitor is blacklisted by this resident"));
            }
        }
        let visitor = visitor_directory::register(
            &mut *tx,
            phone,
            existing,
            &input.visitor,
            &input.purpose,
            now,
        )
        .await?;

        tx.lock(&LockKey::VisitSlot {
            visitor_id: visitor.id,
            resident_id: resident.id,
            date: visit_date,
        })
        .await?;
        if let Some(live) = tx
            .find_live_visit_request(visitor.id, resident.id, visit_date)
            .await?
        {
            return Err(VisitError::Conflict(format!(
                "visitor already has a {} request for {}",
                live.status, visit_date
            )));
        }

        let credential = opening.self_approved_by.map(|_| credential::issue());
        let request = VisitRequest {
            id: Uuid::new_v4(),
            visitor_id: visitor.id,
            resident_id: resident.id,
            security_officer_id: opening.security_officer_id,
            entry_type: opening.entry_type,
            status: if credential.is_some() {
                VisitStatus::Approved
            } else {
                VisitStatus::Pending
            },
            scheduled_at: opening.scheduled_at,
            visit_date,
            expected_duration_minutes: input.expected_duration_minutes,
            purpose: input.purpose.trim().to_string(),
            notes: trim_optional(input.notes.as_deref()),
            vehicle_registration: trim_optional(input.vehicle_registration.as_deref())
                .map(|v| v.to_uppercase()),
            number_of_guests: input.number_of_guests.unwrap_or(1),
            credential_hash: credential.as_ref().map(|c| c.hash.clone()),
            denial_reason: None,
            approved_by: opening.self_approved_by,
            created_at: now,
            updated_at: now,
            approved_at: credential.as_ref().map(|_| now),
            denied_at: None,
            completed_at: None,
            cancelled_at: None,
            actual_arrival: None,
            actual_departure: None,
        };
        tx.insert_visit_request(&request).await?;

        let mut outbox = Outbox::new();
        let dispatcher = Dispatcher::new(&self.ctx.policy, now);
        match (&credential, opening.security_officer_id) {
            (Some(c), _) => {
                dispatcher
                    .request_approved(
                        &mut *tx,
                        &mut outbox,
                        &request,
                        &visitor,
                        &resident,
                        Some(&c.token),
                    )
                    .await?
            }
            (None, Some(officer_id)) => {
                dispatcher
                    .walk_in_logged(&mut *tx, &mut outbox, &request, &visitor, &resident, officer_id)
                    .await?
            }
            (None, None) => {
                dispatcher
                    .request_received(&mut *tx, &mut outbox, &request, &visitor, &resident)
                    .await?
            }
        }
        tx.commit().await?;

        tracing::info!(
            visit_request_id = %request.id,
            visitor_id = %visitor.id,
            resident_id = %resident.id,
            entry_type = %request.entry_type,
            status = %request.status,
            "Visit request created"
        );

        outbox.deliver(self.ctx.mailer.clone(), self.ctx.delivery).await;
        Ok(VisitOutcome {
            request,
            credential: credential.map(|c| c.token),
        })
    }

    /// `pending -> approved`, by the owning resident or an administrator.
    /// Issues the credential and notifies security and the visitor.
    pub async fn approve(&self, actor: &Actor, id: Uuid) -> Result<VisitOutcome, VisitError> {
        actor.require(&[UserRole::Resident, UserRole::Admin])?;
        let now = self.ctx.clock.now();
        let mut tx = self.ctx.store.begin().await?;

        let mut request = load_for_update(&mut *tx, id).await?;
        if !actor.speaks_for_resident(request.resident_id) {
            return Err(VisitError::forbidden("only the resident may decide on this request"));
        }
        ensure_transition(&request, VisitStatus::Approved, "approve")?;

        tx.lock(&LockKey::BlacklistPair {
            visitor_id: request.visitor_id,
            resident_id: request.resident_id,
        })
        .await?;
        if blacklist::is_blacklisted(&mut *tx, request.visitor_id, request.resident_id, now).await? {
            return Err(VisitError::forbidden("visitor is blacklisted by this resident"));
        }

        let credential = credential::issue();
        request.status = VisitStatus::Approved;
        request.approved_at = Some(now);
        request.approved_by = Some(actor.id);
        request.credential_hash = Some(credential.hash.clone());
        request.updated_at = now;
        swap_status(&mut *tx, &request, VisitStatus::Pending, "approve").await?;

        let (visitor, resident) = parties(&mut *tx, &request).await?;
        let mut outbox = Outbox::new();
        Dispatcher::new(&self.ctx.policy, now)
            .request_approved(
                &mut *tx,
                &mut outbox,
                &request,
                &visitor,
                &resident,
                Some(&credential.token),
            )
            .await?;
        tx.commit().await?;

        tracing::info!(
            visit_request_id = %request.id,
            actor_id = %actor.id,
            status = %request.status,
            "Visit request approved"
        );

        outbox.deliver(self.ctx.mailer.clone(), self.ctx.delivery).await;
        Ok(VisitOutcome {
            request,
            credential: Some(credential.token),
        })
    }

    /// `pending -> denied`, by the owning resident or an administrator.
    ///
    /// Always leaves exactly one active blacklist entry for the pair; an entry
    /// already in force is reused.
    pub async fn deny(
        &self,
        actor: &Actor,
        id: Uuid,
        reason: &str,
    ) -> Result<VisitRequest, VisitError> {
        actor.require(&[UserRole::Resident, UserRole::Admin])?;
        validate_reason(reason)?;
        let reason = reason.trim();

        let now = self.ctx.clock.now();
        let mut tx = self.ctx.store.begin().await?;

        let mut request = load_for_update(&mut *tx, id).await?;
        if !actor.speaks_for_resident(request.resident_id) {
            return Err(VisitError::forbidden("only the resident may decide on this request"));
        }
        ensure_transition(&request, VisitStatus::Denied, "deny")?;

        request.status = VisitStatus::Denied;
        request.denied_at = Some(now);
        request.denial_reason = Some(reason.to_string());
        request.updated_at = now;
        swap_status(&mut *tx, &request, VisitStatus::Pending, "deny").await?;

        let (entry, created) = blacklist::impose(
            &mut *tx,
            Imposition {
                visitor_id: request.visitor_id,
                resident_id: request.resident_id,
                reason,
                expires_at: None,
                created_by: actor.id,
            },
            now,
        )
        .await?;

        let (visitor, resident) = parties(&mut *tx, &request).await?;
        let mut outbox = Outbox::new();
        Dispatcher::new(&self.ctx.policy, now).request_denied(&mut outbox, &request, &visitor, &resident);
        tx.commit().await?;

        tracing::info!(
            visit_request_id = %request.id,
            actor_id = %actor.id,
            blacklist_entry_id = %entry.id,
            blacklist_created = created,
            "Visit request denied"
        );

        outbox.deliver(self.ctx.mailer.clone(), self.ctx.delivery).await;
        Ok(request)
    }

    /// `pending -> cancelled`, by the visitor, proven by phone number.
    pub async fn cancel(&self, id: Uuid, phone: &str) -> Result<VisitRequest, VisitError> {
        let phone = normalize_phone(phone)?;
        let now = self.ctx.clock.now();
        let mut tx = self.ctx.store.begin().await?;

        let mut request = load_for_update(&mut *tx, id).await?;
        let (visitor, resident) = parties(&mut *tx, &request).await?;
        if visitor.phone_number != phone {
            return Err(VisitError::forbidden("phone number does not match the request"));
        }
        ensure_transition(&request, VisitStatus::Cancelled, "cancel")?;

        request.status = VisitStatus::Cancelled;
        request.cancelled_at = Some(now);
        request.updated_at = now;
        swap_status(&mut *tx, &request, VisitStatus::Pending, "cancel").await?;

        Dispatcher::new(&self.ctx.policy, now)
            .request_cancelled(&mut *tx, &request, &visitor, &resident)
            .await?;
        tx.commit().await?;

        tracing::info!(visit_request_id = %request.id, "Visit request cancelled by visitor");
        Ok(request)
    }

    /// `approved -> completed`, by security. The credential stops verifying.
    /// No fan-out.
    pub async fn complete(&self, actor: &Actor, id: Uuid) -> Result<VisitRequest, VisitError> {
        actor.require(&[UserRole::Security, UserRole::Admin])?;
        let now = self.ctx.clock.now();
        let mut tx = self.ctx.store.begin().await?;

        let mut request = load_for_update(&mut *tx, id).await?;
        ensure_transition(&request, VisitStatus::Completed, "complete")?;

        request.status = VisitStatus::Completed;
        request.completed_at = Some(now);
        request.security_officer_id = Some(actor.id);
        request.updated_at = now;
        swap_status(&mut *tx, &request, VisitStatus::Approved, "complete").await?;
        tx.commit().await?;

        tracing::info!(
            visit_request_id = %request.id,
            officer_id = %actor.id,
            "Visit completed"
        );
        Ok(request)
    }

    /// Records the actual arrival. Only while approved, and only once.
    pub async fn record_arrival(
        &self,
        actor: &Actor,
        id: Uuid,
        at: Option<DateTime<Utc>>,
    ) -> Result<VisitRequest, VisitError> {
        actor.require(&[UserRole::Security, UserRole::Admin])?;
        let now = self.ctx.clock.now();
        let at = self.gate_time(at, now)?;
        let mut tx = self.ctx.store.begin().await?;

        let mut request = load_for_update(&mut *tx, id).await?;
        if request.status != VisitStatus::Approved {
            return Err(VisitError::invalid_transition("record arrival", request.status));
        }
        if request.actual_arrival.is_some() {
            return Err(VisitError::Conflict("arrival already recorded".into()));
        }

        request.actual_arrival = Some(at);
        request.security_officer_id.get_or_insert(actor.id);
        request.updated_at = now;
        swap_status(&mut *tx, &request, VisitStatus::Approved, "record arrival").await?;
        tx.commit().await?;

        tracing::info!(
            visit_request_id = %request.id,
            officer_id = %actor.id,
            arrived_at = %at,
            "Arrival recorded"
        );
        Ok(request)
    }

    /// Records the actual departure. Only after arrival, and only once.
    pub async fn record_departure(
        &self,
        actor: &Actor,
        id: Uuid,
        at: Option<DateTime<Utc>>,
    ) -> Result<VisitRequest, VisitError> {
        actor.require(&[UserRole::Security, UserRole::Admin])?;
        let now = self.ctx.clock.now();
        let at = self.gate_time(at, now)?;
        let mut tx = self.ctx.store.begin().await?;

        let mut request = load_for_update(&mut *tx, id).await?;
        if !matches!(request.status, VisitStatus::Approved | VisitStatus::Completed) {
            return Err(VisitError::invalid_transition("record departure", request.status));
        }
        let arrival = request
            .actual_arrival
            .ok_or_else(|| VisitError::invalid_transition("record departure", "awaiting arrival"))?;
        if request.actual_departure.is_some() {
            return Err(VisitError::Conflict("departure already recorded".into()));
        }
        if at < arrival {
            return Err(VisitError::validation("departure cannot precede arrival"));
        }

        let status = request.status;
        request.actual_departure = Some(at);
        request.updated_at = now;
        swap_status(&mut *tx, &request, status, "record departure").await?;
        tx.commit().await?;

        tracing::info!(
            visit_request_id = %request.id,
            officer_id = %actor.id,
            departed_at = %at,
            "Departure recorded"
        );
        Ok(request)
    }

    fn gate_time(
        &self,
        at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, VisitError> {
        let Some(at) = at else { return Ok(now) };
        if at > now + self.ctx.policy.max_clock_skew {
            return Err(VisitError::validation("timestamp is in the future"));
        }
        if at < now - self.ctx.policy.max_backdate {
            return Err(VisitError::validation("timestamp is too far in the past"));
        }
        Ok(at)
    }

    /// Pending requests awaiting the resident's decision, soonest first.
    pub async fn pending_for_resident(&self, actor: &Actor) -> Result<Vec<VisitDetail>, VisitError> {
        actor.require(&[UserRole::Resident])?;
        self.query(VisitRequestFilter {
            resident_id: Some(actor.id),
            statuses: vec![VisitStatus::Pending],
            order: VisitOrder::ScheduledAscending,
            ..Default::default()
        })
        .await
    }

    /// Every request addressed to the resident, newest first.
    pub async fn history(
        &self,
        actor: &Actor,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<VisitDetail>, VisitError> {
        actor.require(&[UserRole::Resident])?;
        self.query(VisitRequestFilter {
            resident_id: Some(actor.id),
            order: VisitOrder::NewestFirst,
            limit: Some(limit.clamp(1, 100)),
            offset: Some(offset.max(0)),
            ..Default::default()
        })
        .await
    }

    /// Walk-ins still waiting for the resident.
    pub async fn pending_walk_ins(&self, actor: &Actor) -> Result<Vec<VisitDetail>, VisitError> {
        actor.require(&[UserRole::Security, UserRole::Admin])?;
        self.query(VisitRequestFilter {
            statuses: vec![VisitStatus::Pending],
            entry_type: Some(EntryType::WalkIn),
            order: VisitOrder::NewestFirst,
            ..Default::default()
        })
        .await
    }

    /// Requests scheduled for today in the gate's calendar.
    pub async fn todays_visits(
        &self,
        actor: &Actor,
        status: Option<VisitStatus>,
    ) -> Result<Vec<VisitDetail>, VisitError> {
        actor.require(&[UserRole::Security, UserRole::Admin])?;
        let today = self.ctx.policy.local_date(self.ctx.clock.now());
        self.query(VisitRequestFilter {
            visit_date: Some(today),
            statuses: status.into_iter().collect(),
            order: VisitOrder::ScheduledAscending,
            ..Default::default()
        })
        .await
    }

    /// One request, visible to its resident, security and administrators.
    pub async fn get(&self, actor: &Actor, id: Uuid) -> Result<VisitDetail, VisitError> {
        actor.require(&[UserRole::Resident, UserRole::Security, UserRole::Admin])?;
        let mut tx = self.ctx.store.begin().await?;
        let request = tx
            .find_visit_request(id)
            .await?
            .ok_or(VisitError::NotFound("Visit request"))?;
        if actor.role == UserRole::Resident && request.resident_id != actor.id {
            return Err(VisitError::forbidden("request belongs to another resident"));
        }
        let visitor = tx
            .find_visitor(request.visitor_id)
            .await?
            .ok_or(VisitError::NotFound("Visitor"))?;
        Ok(VisitDetail { request, visitor })
    }

    async fn query(&self, filter: VisitRequestFilter) -> Result<Vec<VisitDetail>, VisitError> {
        let mut tx = self.ctx.store.begin().await?;
        let requests = tx.list_visit_requests(&filter).await?;
        let mut details = Vec::with_capacity(requests.len());
        for request in requests {
            let visitor = tx
                .find_visitor(request.visitor_id)
                .await?
                .ok_or(VisitError::NotFound("Visitor"))?;
            details.push(VisitDetail { request, visitor });
        }
        Ok(details)
    }
}

/// How a new request enters the machine.
struct Opening {
    entry_type: EntryType,
    scheduled_at: DateTime<Utc>,
    /// Set when creation self-approves; the approving actor.
    self_approved_by: Option<Uuid>,
    /// The officer who logged a walk-in at the gate.
    security_officer_id: Option<Uuid>,
}

/// Fails with `InvalidTransition` unless the lifecycle lets `request` move to `next`.
fn ensure_transition(
    request: &VisitRequest,
    next: VisitStatus,
    action: &'static str,
) -> Result<(), VisitError> {
    if request.status.can_transition_to(next) {
        Ok(())
    } else {
        Err(VisitError::invalid_transition(action, request.status))
    }
}

async fn load_for_update(tx: &mut dyn VisitTx, id: Uuid) -> Result<VisitRequest, VisitError> {
    tx.find_visit_request_for_update(id)
        .await?
        .ok_or(VisitError::NotFound("Visit request"))
}

async fn parties(
    tx: &mut dyn VisitTx,
    request: &VisitRequest,
) -> Result<(Visitor, UserAccount), VisitError> {
    let visitor = tx
        .find_visitor(request.visitor_id)
        .await?
        .ok_or(VisitError::NotFound("Visitor"))?;
    let resident = tx
        .find_user(request.resident_id)
        .await?
        .ok_or(VisitError::NotFound("Resident"))?;
    Ok((visitor, resident))
}

/// Writes `request` if the stored status is still `expected`; otherwise the
/// caller lost a race and gets `InvalidTransition` with the winner's status.
async fn swap_status(
    tx: &mut dyn VisitTx,
    request: &VisitRequest,
    expected: VisitStatus,
    action: &'static str,
) -> Result<(), VisitError> {
    if tx.update_visit_request_if_status(request, expected).await? {
        return Ok(());
    }
    let current = tx
        .find_visit_request(request.id)
        .await?
        .map(|r| r.status.to_string())
        .unwrap_or_else(|| "gone".to_string());
    Err(VisitError::invalid_transition(action, current))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VisitorDetails;
    use crate::services::clock::{Clock, GatePolicy, ManualClock};
    use crate::services::credential::CredentialIssuer;
    use crate::services::email::{DeliveryMode, MockEmailSender};
    use crate::store::MemoryStore;
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;

    const JANE: &str = "+254 712 345 678";

    struct Gate {
        store: MemoryStore,
        clock: Arc<ManualClock>,
        mailer: MockEmailSender,
        workflow: VisitWorkflow,
        credentials: CredentialIssuer,
        resident: Actor,
        other_resident: Actor,
        officer: Actor,
    }

    fn account(role: UserRole, email: &str) -> UserAccount {
        UserAccount {
            id: Uuid::new_v4(),
            full_name: format!("{} account", role),
            email: Some(email.to_string()),
            phone_number: None,
            role,
            unit_number: Some("C-7".into()),
            is_active: true,
            is_approved: true,
            approved_at: None,
            approved_by: None,
            rejected_at: None,
            created_at: Utc::now(),
        }
    }

    async fn gate() -> Gate {
        let store = MemoryStore::new();
        // 09:00 at the gate (UTC+3)
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 6, 0, 0).unwrap(),
        ));
        let mailer = MockEmailSender::new();

        let resident = account(UserRole::Resident, "r42@example.com");
        let other_resident = account(UserRole::Resident, "r7@example.com");
        let officer = account(UserRole::Security, "guard@example.com");
        for user in [&resident, &other_resident, &officer] {
            store.insert_user(user.clone()).await;
        }

        let ctx = ServiceContext::new(Arc::new(store.clone()), Arc::new(mailer.clone()))
            .with_clock(clock.clone())
            .with_policy(GatePolicy::with_offset_minutes(180).unwrap())
            .with_delivery(DeliveryMode::Inline);

        Gate {
            store,
            clock,
            mailer,
            workflow: VisitWorkflow::new(ctx.clone()),
            credentials: CredentialIssuer::new(ctx),
            resident: resident.actor(),
            other_resident: other_resident.actor(),
            officer: officer.actor(),
        }
    }

    impl Gate {
        fn tomorrow_at_ten(&self) -> DateTime<Utc> {
            // 10:00 local is 07:00 UTC
            Utc.with_ymd_and_hms(2026, 3, 2, 7, 0, 0).unwrap()
        }

        fn visit(&self, resident: &Actor) -> NewVisit {
            NewVisit::new(
                VisitorDetails::new(JANE, "Jane").with_email("jane@example.com"),
                resident.id,
                "delivery",
            )
            .scheduled_at(self.tomorrow_at_ten())
        }

        async fn pending(&self) -> VisitRequest {
            self.workflow
                .create(None, EntryType::PreRegistered, self.visit(&self.resident))
                .await
                .unwrap()
                .request
        }
    }

    #[tokio::test]
    async fn test_visitor_request_then_approval() {
        let g = gate().await;
        let request = g.pending().await;
        assert_eq!(request.status, VisitStatus::Pending);
        assert_eq!(request.entry_type, EntryType::PreRegistered);
        assert!(request.credential_hash.is_none());
        assert_eq!(g.store.notifications_for(g.resident.id).await.len(), 1);

        let outcome = g.workflow.approve(&g.resident, request.id).await.unwrap();
        assert_eq!(outcome.request.status, VisitStatus::Approved);
        assert!(outcome.request.approved_at.is_some());
        let token = outcome.credential.unwrap();
        assert_eq!(
            outcome.request.credential_hash.as_deref(),
            Some(shared::crypto::sha256_hex(&token).as_str())
        );

        let security_inbox = g.store.notifications_for(g.officer.id).await;
        assert_eq!(security_inbox.len(), 1);
        assert_eq!(security_inbox[0].data.category(), "visit_approved");

        let to_jane = g.mailer.sent_to("jane@example.com");
        assert_eq!(to_jane.len(), 2);
        assert!(to_jane[1].body.contains(&token));
    }

    #[tokio::test]
    async fn test_denial_blacklists_the_pair() {
        let g = gate().await;
        let request = g.pending().await;

        let denied = g
            .workflow
            .deny(&g.resident, request.id, "not expected")
            .await
            .unwrap();
        assert_eq!(denied.status, VisitStatus::Denied);
        assert!(denied.denied_at.is_some());

        let entries = g.store.blacklist_entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].reason, "not expected");
        assert!(entries[0].is_permanent);

        g.clock.advance(Duration::days(2));
        let retry = g
            .workflow
            .create(
                None,
                EntryType::PreRegistered,
                g.visit(&g.resident)
                    .scheduled_at(g.clock.now() + Duration::days(1)),
            )
            .await
            .unwrap_err();
        assert!(matches!(retry, VisitError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_blacklist_is_scoped_to_one_resident() {
        let g = gate().await;
        let request = g.pending().await;
        g.workflow
            .deny(&g.resident, request.id, "not expected")
            .await
            .unwrap();

        let walk_in = g
            .workflow
            .record_walk_in(&g.officer, g.visit(&g.resident))
            .await
            .unwrap_err();
        assert!(matches!(walk_in, VisitError::Forbidden(_)));

        let elsewhere = g
            .workflow
            .record_walk_in(&g.officer, g.visit(&g.other_resident))
            .await
            .unwrap();
        assert_eq!(elsewhere.request.status, VisitStatus::Pending);
    }

    #[tokio::test]
    async fn test_walk_in_approval_and_completion() {
        let g = gate().await;
        let walk_in = g
            .workflow
            .record_walk_in(&g.officer, g.visit(&g.other_resident))
            .await
            .unwrap();
        assert_eq!(walk_in.request.entry_type, EntryType::WalkIn);
        assert_eq!(walk_in.request.status, VisitStatus::Pending);
        assert_eq!(walk_in.request.security_officer_id, Some(g.officer.id));
        assert_eq!(walk_in.request.scheduled_at, g.clock.now());
        assert!(walk_in.credential.is_none());

        let inbox = g.store.notifications_for(g.other_resident.id).await;
        assert_eq!(inbox[0].data.category(), "walk_in");

        let token = g
            .workflow
            .approve(&g.other_resident, walk_in.request.id)
            .await
            .unwrap()
            .credential
            .unwrap();
        g.credentials.verify(&g.officer, &token).await.unwrap();

        let completed = g
            .workflow
            .complete(&g.officer, walk_in.request.id)
            .await
            .unwrap();
        assert_eq!(completed.status, VisitStatus::Completed);
        assert!(completed.credential_hash.is_some());
        assert!(matches!(
            g.credentials.verify(&g.officer, &token).await,
            Err(VisitError::NotApproved)
        ));
    }

    #[tokio::test]
    async fn test_resident_invitation_self_approves() {
        let g = gate().await;
        let outcome = g
            .workflow
            .create(
                Some(&g.resident),
                EntryType::ResidentInvited,
                g.visit(&g.resident),
            )
            .await
            .unwrap();
        assert_eq!(outcome.request.status, VisitStatus::Approved);
        assert_eq!(outcome.request.approved_by, Some(g.resident.id));
        assert!(outcome.credential.is_some());
        // Fans out like Approve
        assert_eq!(g.store.notifications_for(g.officer.id).await.len(), 1);
        assert!(g.store.notifications_for(g.resident.id).await.is_empty());
    }

    #[test]
    fn test_is_self_approving() {
        let resident = Actor::new(Uuid::new_v4(), UserRole::Resident, true);
        let officer = Actor::new(Uuid::new_v4(), UserRole::Security, true);
        let admin = Actor::new(Uuid::new_v4(), UserRole::Admin, true);

        assert!(is_self_approving(EntryType::ResidentInvited, Some(&resident), resident.id));
        assert!(is_self_approving(EntryType::PreRegistered, Some(&resident), resident.id));
        assert!(is_self_approving(EntryType::ResidentInvited, Some(&admin), resident.id));
        assert!(!is_self_approving(EntryType::WalkIn, Some(&resident), resident.id));
        assert!(!is_self_approving(EntryType::PreRegistered, None, resident.id));
        assert!(!is_self_approving(EntryType::PreRegistered, Some(&officer), resident.id));
        assert!(!is_self_approving(
            EntryType::ResidentInvited,
            Some(&resident),
            Uuid::new_v4()
        ));
    }

    #[tokio::test]
    async fn test_anonymous_callers_cannot_invite() {
        let g = gate().await;
        let err = g
            .workflow
            .create(None, EntryType::ResidentInvited, g.visit(&g.resident))
            .await
            .unwrap_err();
        assert!(matches!(err, VisitError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_duplicate_live_request_is_conflict() {
        let g = gate().await;
        g.pending().await;
        let err = g
            .workflow
            .create(None, EntryType::PreRegistered, g.visit(&g.resident))
            .await
            .unwrap_err();
        assert!(matches!(err, VisitError::Conflict(_)));

        // A different day is fine
        let next_day = g.visit(&g.resident).scheduled_at(g.tomorrow_at_ten() + Duration::days(1));
        g.workflow
            .create(None, EntryType::PreRegistered, next_day)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_past_schedule_rejected_except_for_walk_ins() {
        let g = gate().await;
        let past = g.visit(&g.resident).scheduled_at(g.clock.now() - Duration::hours(1));
        let err = g
            .workflow
            .create(None, EntryType::PreRegistered, past.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, VisitError::Validation(_)));

        g.workflow.record_walk_in(&g.officer, past).await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_or_unapproved_resident_is_not_found() {
        let g = gate().await;
        let mut pending_account = account(UserRole::Resident, "new@example.com");
        pending_account.is_approved = false;
        g.store.insert_user(pending_account.clone()).await;

        for resident_id in [Uuid::new_v4(), pending_account.id, g.officer.id] {
            let mut visit = g.visit(&g.resident);
            visit.resident_id = resident_id;
            let err = g
                .workflow
                .create(None, EntryType::PreRegistered, visit)
                .await
                .unwrap_err();
            assert!(matches!(err, VisitError::NotFound("Resident")));
        }
    }

    #[tokio::test]
    async fn test_only_owning_resident_may_decide() {
        let g = gate().await;
        let request = g.pending().await;

        let err = g
            .workflow
            .approve(&g.other_resident, request.id)
            .await
            .unwrap_err();
        assert!(matches!(err, VisitError::Forbidden(_)));
        let err = g.workflow.approve(&g.officer, request.id).await.unwrap_err();
        assert!(matches!(err, VisitError::Forbidden(_)));

        let unapproved = Actor::new(g.resident.id, UserRole::Resident, false);
        let err = g.workflow.approve(&unapproved, request.id).await.unwrap_err();
        assert!(matches!(err, VisitError::Forbidden(_)));

        let admin = Actor::new(Uuid::new_v4(), UserRole::Admin, true);
        g.workflow.approve(&admin, request.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_transitions_from_wrong_state_leave_record_unchanged() {
        let g = gate().await;
        let request = g.pending().await;
        g.workflow
            .deny(&g.resident, request.id, "not expected")
            .await
            .unwrap();
        let before = g.store.visit_request(request.id).await.unwrap();

        assert!(matches!(
            g.workflow.approve(&g.resident, request.id).await,
            Err(VisitError::InvalidTransition { .. })
        ));
        assert!(matches!(
            g.workflow.deny(&g.resident, request.id, "again").await,
            Err(VisitError::InvalidTransition { .. })
        ));
        assert!(matches!(
            g.workflow.cancel(request.id, JANE).await,
            Err(VisitError::InvalidTransition { .. })
        ));
        assert!(matches!(
            g.workflow.complete(&g.officer, request.id).await,
            Err(VisitError::InvalidTransition { .. })
        ));

        assert_eq!(g.store.visit_request(request.id).await.unwrap(), before);
        assert_eq!(g.store.blacklist_entries().await.len(), 1);
    }

    #[tokio::test]
    async fn test_complete_requires_approved() {
        let g = gate().await;
        let request = g.pending().await;
        let err = g.workflow.complete(&g.officer, request.id).await.unwrap_err();
        assert!(matches!(err, VisitError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_approved_request_only_moves_to_completed() {
        let g = gate().await;
        let request = g.pending().await;
        g.workflow.approve(&g.resident, request.id).await.unwrap();

        let err = g
            .workflow
            .deny(&g.resident, request.id, "changed my mind")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            VisitError::InvalidTransition { action: "deny", ref from } if from == "approved"
        ));
        let err = g.workflow.cancel(request.id, JANE).await.unwrap_err();
        assert!(matches!(
            err,
            VisitError::InvalidTransition { action: "cancel", ref from } if from == "approved"
        ));

        g.workflow.complete(&g.officer, request.id).await.unwrap();
        let err = g.workflow.complete(&g.officer, request.id).await.unwrap_err();
        assert!(matches!(
            err,
            VisitError::InvalidTransition { action: "complete", ref from } if from == "completed"
        ));
    }

    #[tokio::test]
    async fn test_cancel_requires_matching_phone() {
        let g = gate().await;
        let request = g.pending().await;

        let err = g.workflow.cancel(request.id, "0799999999").await.unwrap_err();
        assert!(matches!(err, VisitError::Forbidden(_)));

        let cancelled = g.workflow.cancel(request.id, "+254-712-345-678").await.unwrap();
        assert_eq!(cancelled.status, VisitStatus::Cancelled);
        assert!(cancelled.cancelled_at.is_some());
        assert!(g.store.blacklist_entries().await.is_empty());

        let inbox = g.store.notifications_for(g.resident.id).await;
        assert!(inbox.iter().any(|n| n.data.category() == "visit_cancelled"));
    }

    #[tokio::test]
    async fn test_unknown_request_is_not_found() {
        let g = gate().await;
        assert!(matches!(
            g.workflow.approve(&g.resident, Uuid::new_v4()).await,
            Err(VisitError::NotFound("Visit request"))
        ));
    }

    #[tokio::test]
    async fn test_verify_only_on_the_scheduled_day() {
        let g = gate().await;
        let request = g.pending().await;
        let token = g
            .workflow
            .approve(&g.resident, request.id)
            .await
            .unwrap()
            .credential
            .unwrap();

        // Still the day before
        assert!(matches!(
            g.credentials.verify(&g.officer, &token).await,
            Err(VisitError::Expired)
        ));

        g.clock.set(g.tomorrow_at_ten());
        let verified = g.credentials.verify(&g.officer, &token).await.unwrap();
        assert_eq!(verified.request.id, request.id);
        assert_eq!(verified.visitor.full_name, "Jane");
        assert_eq!(verified.resident.id, g.resident.id);

        g.clock.advance(Duration::days(1));
        assert!(matches!(
            g.credentials.verify(&g.officer, &token).await,
            Err(VisitError::Expired)
        ));

        assert!(matches!(
            g.credentials.verify(&g.officer, "forged-token").await,
            Err(VisitError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_arrival_and_departure() {
        let g = gate().await;
        let request = g.pending().await;

        let err = g
            .workflow
            .record_arrival(&g.officer, request.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, VisitError::InvalidTransition { .. }));

        g.workflow.approve(&g.resident, request.id).await.unwrap();
        let err = g
            .workflow
            .record_departure(&g.officer, request.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, VisitError::InvalidTransition { .. }));

        let arrived = g
            .workflow
            .record_arrival(&g.officer, request.id, None)
            .await
            .unwrap();
        assert_eq!(arrived.actual_arrival, Some(g.clock.now()));
        assert_eq!(arrived.status, VisitStatus::Approved);

        let again = g
            .workflow
            .record_arrival(&g.officer, request.id, None)
            .await
            .unwrap_err();
        assert!(matches!(again, VisitError::Conflict(_)));

        let before_arrival = g.clock.now() - Duration::minutes(5);
        let err = g
            .workflow
            .record_departure(&g.officer, request.id, Some(before_arrival))
            .await
            .unwrap_err();
        assert!(matches!(err, VisitError::Validation(_)));

        g.clock.advance(Duration::hours(1));
        g.workflow.complete(&g.officer, request.id).await.unwrap();
        let departed = g
            .workflow
            .record_departure(&g.officer, request.id, None)
            .await
            .unwrap();
        assert_eq!(departed.status, VisitStatus::Completed);
        assert_eq!(departed.actual_departure, Some(g.clock.now()));

        let again = g
            .workflow
            .record_departure(&g.officer, request.id, None)
            .await
            .unwrap_err();
        assert!(matches!(again, VisitError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_gate_time_window() {
        let g = gate().await;
        let request = g.pending().await;
        g.workflow.approve(&g.resident, request.id).await.unwrap();

        let future = g.clock.now() + Duration::hours(1);
        assert!(matches!(
            g.workflow.record_arrival(&g.officer, request.id, Some(future)).await,
            Err(VisitError::Validation(_))
        ));
        let ancient = g.clock.now() - Duration::days(2);
        assert!(matches!(
            g.workflow.record_arrival(&g.officer, request.id, Some(ancient)).await,
            Err(VisitError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_approvals_have_one_winner() {
        let g = gate().await;
        let request = g.pending().await;

        let (a, b) = tokio::join!(
            g.workflow.approve(&g.resident, request.id),
            g.workflow.approve(&g.resident, request.id)
        );
        let results = [a, b];
        let wins = results.iter().filter(|r| r.is_ok()).count();
        let losses = results
            .iter()
            .filter(|r| matches!(r, Err(VisitError::InvalidTransition { .. })))
            .count();
        assert_eq!((wins, losses), (1, 1));
        assert_eq!(g.store.notifications_for(g.officer.id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_denials_leave_one_blacklist_entry() {
        let g = gate().await;
        let request = g.pending().await;

        let w1 = g.workflow.clone();
        let w2 = g.workflow.clone();
        let resident = g.resident;
        let id = request.id;
        let first = tokio::spawn(async move { w1.deny(&resident, id, "first").await });
        let second = tokio::spawn(async move { w2.deny(&resident, id, "second").await });
        let results = [first.await.unwrap(), second.await.unwrap()];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        let entries = g.store.blacklist_entries().await;
        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_active);
    }

    #[tokio::test]
    async fn test_email_outage_does_not_block_transition() {
        let g = gate().await;
        let failing = MockEmailSender::failing();
        let ctx = ServiceContext::new(Arc::new(g.store.clone()), Arc::new(failing.clone()))
            .with_clock(g.clock.clone())
            .with_delivery(DeliveryMode::Inline);
        let workflow = VisitWorkflow::new(ctx);

        let request = g.pending().await;
        let outcome = workflow.approve(&g.resident, request.id).await.unwrap();
        assert_eq!(outcome.request.status, VisitStatus::Approved);
        assert!(!failing.sent().is_empty());
        assert_eq!(
            g.store.visit_request(request.id).await.unwrap().status,
            VisitStatus::Approved
        );
    }

    #[tokio::test]
    async fn test_visitor_details_refreshed_on_later_registration() {
        let g = gate().await;
        g.pending().await;

        let mut later = NewVisit::new(
            VisitorDetails::new(JANE, "Jane Wanjiru").with_email("jane.w@example.com"),
            g.other_resident.id,
            "tutoring",
        )
        .scheduled_at(g.tomorrow_at_ten());
        later.number_of_guests = Some(2);
        let outcome = g
            .workflow
            .create(None, EntryType::PreRegistered, later)
            .await
            .unwrap();
        assert_eq!(outcome.request.number_of_guests, 2);

        let detail = g.workflow.get(&g.officer, outcome.request.id).await.unwrap();
        assert_eq!(detail.visitor.full_name, "Jane Wanjiru");
        assert_eq!(detail.visitor.email.as_deref(), Some("jane.w@example.com"));
        assert_eq!(detail.visitor.phone_number, "+254712345678");
    }

    #[tokio::test]
    async fn test_read_queries() {
        let g = gate().await;
        let pending = g.pending().await;
        let walk_in = g
            .workflow
            .record_walk_in(&g.officer, g.visit(&g.other_resident))
            .await
            .unwrap();

        let mine = g.workflow.pending_for_resident(&g.resident).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].request.id, pending.id);

        let walk_ins = g.workflow.pending_walk_ins(&g.officer).await.unwrap();
        assert_eq!(walk_ins.len(), 1);
        assert_eq!(walk_ins[0].request.id, walk_in.request.id);

        // The walk-in is today; the pre-registration is tomorrow
        let today = g.workflow.todays_visits(&g.officer, None).await.unwrap();
        assert_eq!(today.len(), 1);
        let approved_today = g
            .workflow
            .todays_visits(&g.officer, Some(VisitStatus::Approved))
            .await
            .unwrap();
        assert!(approved_today.is_empty());

        let history = g.workflow.history(&g.resident, 10, 0).await.unwrap();
        assert_eq!(history.len(), 1);

        assert!(matches!(
            g.workflow.get(&g.other_resident, pending.id).await,
            Err(VisitError::Forbidden(_))
        ));
        assert!(matches!(
            g.workflow.pending_walk_ins(&g.resident).await,
            Err(VisitError::Forbidden(_))
        ));
    }
}
