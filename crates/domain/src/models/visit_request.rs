//! Visit request aggregate and its lifecycle vocabulary.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::visitor::VisitorDetails;

/// Status of a visit request.
///
/// `pending -> {approved, denied, cancelled}` and `approved -> completed`;
/// everything else is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisitStatus {
    Pending,
    Approved,
    Denied,
    Completed,
    Cancelled,
}

impl VisitStatus {
    /// Statuses that block a second request for the same visitor, resident and day.
    pub fn is_live(&self) -> bool {
        matches!(self, VisitStatus::Pending | VisitStatus::Approved)
    }

    pub fn can_transition_to(&self, next: VisitStatus) -> bool {
        matches!(
            (self, next),
            (VisitStatus::Pending, VisitStatus::Approved)
                | (VisitStatus::Pending, VisitStatus::Denied)
                | (VisitStatus::Pending, VisitStatus::Cancelled)
                | (VisitStatus::Approved, VisitStatus::Completed)
        )
    }
}

impl std::fmt::Display for VisitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VisitStatus::Pending => write!(f, "pending"),
            VisitStatus::Approved => write!(f, "approved"),
            VisitStatus::Denied => write!(f, "denied"),
            VisitStatus::Completed => write!(f, "completed"),
            VisitStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for VisitStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(VisitStatus::Pending),
            "approved" => Ok(VisitStatus::Approved),
            "denied" => Ok(VisitStatus::Denied),
            "completed" => Ok(VisitStatus::Completed),
            "cancelled" => Ok(VisitStatus::Cancelled),
            _ => Err(format!("Invalid visit status: {}", s)),
        }
    }
}

/// How a visit request entered the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    /// Submitted by the visitor through the public form.
    PreRegistered,
    /// Registered by the resident on the visitor's behalf.
    ResidentInvited,
    /// Logged by security at the gate.
    WalkIn,
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryType::PreRegistered => write!(f, "pre_registered"),
            EntryType::ResidentInvited => write!(f, "resident_invited"),
            EntryType::WalkIn => write!(f, "walk_in"),
        }
    }
}

impl std::str::FromStr for EntryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pre_registered" => Ok(EntryType::PreRegistered),
            "resident_invited" => Ok(EntryType::ResidentInvited),
            "walk_in" => Ok(EntryType::WalkIn),
            _ => Err(format!("Invalid entry type: {}", s)),
        }
    }
}

/// The aggregate root: one visitor's intended or actual visit to one resident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct VisitRequest {
    pub id: Uuid,
    pub visitor_id: Uuid,
    pub resident_id: Uuid,
    /// Officer who logged the walk-in, recorded the arrival, or completed the visit.
    pub security_officer_id: Option<Uuid>,
    pub entry_type: EntryType,
    pub status: VisitStatus,
    pub scheduled_at: DateTime<Utc>,
    /// `scheduled_at` in the gate's local calendar.
    pub visit_date: NaiveDate,
    pub expected_duration_minutes: Option<i32>,
    pub purpose: String,
    pub notes: Option<String>,
    pub vehicle_registration: Option<String>,
    pub number_of_guests: i32,
    /// SHA-256 hex digest of the gate credential. Retained after completion.
    #[serde(skip_serializing)]
    pub credential_hash: Option<String>,
    pub denial_reason: Option<String>,
    pub approved_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub denied_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub actual_arrival: Option<DateTime<Utc>>,
    pub actual_departure: Option<DateTime<Utc>>,
}

impl VisitRequest {
    /// True while the credential would pass the status half of verification.
    pub fn has_active_credential(&self) -> bool {
        self.status == VisitStatus::Approved && self.credential_hash.is_some()
    }
}

/// Input shared by every creation path.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct NewVisit {
    #[validate(nested)]
    pub visitor: VisitorDetails,
    pub resident_id: Uuid,
    /// Ignored for walk-ins, which are scheduled at the moment of recording.
    pub scheduled_at: Option<DateTime<Utc>>,
    #[validate(custom(function = "shared::validation::validate_purpose"))]
    #[validate(length(max = 500, message = "Purpose must be at most 500 characters"))]
    pub purpose: String,
    #[validate(range(
        min = 1,
        max = 1440,
        message = "Expected duration must be between 1 and 1440 minutes"
    ))]
    pub expected_duration_minutes: Option<i32>,
    #[validate(length(max = 1000, message = "Notes must be at most 1000 characters"))]
    pub notes: Option<String>,
    #[validate(length(max = 20, message = "Vehicle registration must be at most 20 characters"))]
    pub vehicle_registration: Option<String>,
    #[validate(range(min = 1, max = 20, message = "Number of guests must be between 1 and 20"))]
    pub number_of_guests: Option<i32>,
}

impl NewVisit {
    pub fn new(visitor: VisitorDetails, resident_id: Uuid, purpose: impl Into<String>) -> Self {
        Self {
            visitor,
            resident_id,
            scheduled_at: None,
            purpose: purpose.into(),
            expected_duration_minutes: None,
            notes: None,
            vehicle_registration: None,
            number_of_guests: None,
        }
    }

    pub fn scheduled_at(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_at = Some(at);
        self
    }
}

/// Result of a transition that may mint a gate credential.
///
/// `credential` holds the plaintext token and is only ever returned here.
#[derive(Debug, Clone)]
pub struct VisitOutcome {
    pub request: VisitRequest,
    pub credential: Option<String>,
}
