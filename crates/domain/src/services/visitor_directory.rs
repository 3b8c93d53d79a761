//! Visitor directory: one record per normalized phone number.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use shared::validation::{normalize_phone, trim_optional};

use super::context::ServiceContext;
use crate::error::VisitError;
use crate::models::{VisitRequest, VisitStatus, Visitor, VisitorDetails};
use crate::store::{LockKey, VisitOrder, VisitRequestFilter, VisitTx};

/// Window and size of the "recent" list in a status lookup.
const RECENT_WINDOW_DAYS: i64 = 30;
const RECENT_LIMIT: i64 = 10;

/// Locks the phone number and loads the visitor, if known.
///
/// Returns the normalized phone alongside so callers can register afterwards
/// under the same lock.
pub(crate) async fn lookup(
    tx: &mut dyn VisitTx,
    raw_phone: &str,
) -> Result<(String, Option<Visitor>), VisitError> {
    let phone = normalize_phone(raw_phone)?;
    tx.lock(&LockKey::VisitorPhone(phone.clone())).await?;
    let existing = tx.find_visitor_by_phone(&phone).await?;
    Ok((phone, existing))
}

/// Creates the visitor, or refreshes an existing record with the details just
/// supplied. Optional fields only overwrite when present.
pub(crate) async fn register(
    tx: &mut dyn VisitTx,
    phone: String,
    existing: Option<Visitor>,
    details: &VisitorDetails,
    purpose: &str,
    now: DateTime<Utc>,
) -> Result<Visitor, VisitError> {
    let full_name = details.full_name.trim().to_string();
    let purpose = Some(purpose.trim().to_string());

    match existing {
        Some(mut visitor) => {
            visitor.full_name = full_name;
            if let Some(email) = trim_optional(details.email.as_deref()) {
                visitor.email = Some(email);
            }
            if let Some(id_number) = trim_optional(details.id_number.as_deref()) {
                visitor.id_number = Some(id_number);
            }
            if let Some(company) = trim_optional(details.company.as_deref()) {
                visitor.company = Some(company);
            }
            visitor.default_purpose = purpose;
            visitor.updated_at = now;
            tx.update_visitor(&visitor).await?;
            Ok(visitor)
        }
        None => {
            let visitor = Visitor {
                id: Uuid::new_v4(),
                phone_number: phone,
                full_name,
                email: trim_optional(details.email.as_deref()),
                id_number: trim_optional(details.id_number.as_deref()),
                company: trim_optional(details.company.as_deref()),
                default_purpose: purpose,
                created_at: now,
                updated_at: now,
            };
            tx.insert_visitor(&visitor).await?;
            tracing::debug!(visitor_id = %visitor.id, "Visitor registered");
            Ok(visitor)
        }
    }
}

/// Visitor-facing overview of a phone number's requests.
#[derive(Debug, Clone, Serialize)]
pub struct VisitorStatus {
    pub visitor: Visitor,
    pub pending: Vec<VisitRequest>,
    /// Approved requests for today or later.
    pub upcoming: Vec<VisitRequest>,
    /// Requests created in the last 30 days, newest first.
    pub recent: Vec<VisitRequest>,
}

/// Read side of the directory.
#[derive(Debug, Clone)]
pub struct VisitorDirectory {
    ctx: ServiceContext,
}

impl VisitorDirectory {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    pub async fn status(&self, raw_phone: &str) -> Result<VisitorStatus, VisitError> {
        let phone = normalize_phone(raw_phone)?;
        let now = self.ctx.clock.now();
        let today = self.ctx.policy.local_date(now);

        let mut tx = self.ctx.store.begin().await?;
        let visitor = tx
            .find_visitor_by_phone(&phone)
            .await?
            .ok_or(VisitError::NotFound("Visitor"))?;

        let pending = tx
            .list_visit_requests(&VisitRequestFilter {
                visitor_id: Some(visitor.id),
                statuses: vec![VisitStatus::Pending],
                order: VisitOrder::ScheduledAscending,
                ..Default::default()
            })
            .await?;
        let upcoming = tx
            .list_visit_requests(&VisitRequestFilter {
                visitor_id: Some(visitor.id),
                statuses: vec![VisitStatus::Approved],
                visit_date_from: Some(today),
                order: VisitOrder::ScheduledAscending,
                ..Default::default()
            })
            .await?;
        let recent = tx
            .list_visit_requests(&VisitRequestFilter {
                visitor_id: Some(visitor.id),
                created_since: Some(now - Duration::days(RECENT_WINDOW_DAYS)),
                order: VisitOrder::NewestFirst,
                limit: Some(RECENT_LIMIT),
                ..Default::default()
            })
            .await?;

        Ok(VisitorStatus {
            visitor,
            pending,
            upcoming,
            recent,
        })
    }
}
