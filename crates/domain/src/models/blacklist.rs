//! Blacklist entries barring a visitor from one resident.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Reason recorded when an expired entry is retired by a newer one.
pub const EXPIRED_REMOVAL_REASON: &str = "expired";

/// A per-(visitor, resident) bar on visit requests.
///
/// Rows are never deleted; removal fills in the removal fields and clears
/// `is_active`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BlacklistEntry {
    pub id: Uuid,
    pub visitor_id: Uuid,
    pub resident_id: Uuid,
    pub reason: String,
    pub is_permanent: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    /// User who imposed the entry.
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub removed_at: Option<DateTime<Utc>>,
    /// `None` when the system retired an expired entry.
    pub removed_by: Option<Uuid>,
    pub removal_reason: Option<String>,
}

impl BlacklistEntry {
    /// Whether this entry currently bars the pair.
    pub fn is_in_force(&self, now: DateTime<Utc>) -> bool {
        self.is_active && (self.is_permanent || self.expires_at.is_some_and(|at| at > now))
    }

    /// Active but past its expiry.
    pub fn is_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.is_active && !self.is_in_force(now)
    }

    pub(crate) fn retire(&mut self, removed_by: Option<Uuid>, reason: &str, now: DateTime<Utc>) {
        self.is_active = false;
        self.removed_at = Some(now);
        self.removed_by = removed_by;
        self.removal_reason = Some(reason.to_string());
    }
}

/// Request to add a blacklist entry explicitly.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct NewBlacklistEntry {
    pub visitor_id: Uuid,
    /// Defaults to the calling resident.
    pub resident_id: Option<Uuid>,
    #[validate(custom(function = "shared::validation::validate_not_blank"))]
    #[validate(length(max = 500, message = "Reason must be at most 500 characters"))]
    pub reason: String,
    /// Absent means permanent.
    pub expires_at: Option<DateTime<Utc>>,
}
