//! Visit request entity (database row mapping).

use chrono::{DateTime, NaiveDate, Utc};
use domain::models::{EntryType, VisitRequest, VisitStatus};
use sqlx::FromRow;
use uuid::Uuid;

/// Database enum for visit request status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "visit_status", rename_all = "lowercase")]
pub enum VisitStatusDb {
    Pending,
    Approved,
    Denied,
    Completed,
    Cancelled,
}

impl From<VisitStatusDb> for VisitStatus {
    fn from(status: VisitStatusDb) -> Self {
        match status {
            VisitStatusDb::Pending => VisitStatus::Pending,
            VisitStatusDb::Approved => VisitStatus::Approved,
            VisitStatusDb::Denied => VisitStatus::Denied,
            VisitStatusDb::Completed => VisitStatus::Completed,
            VisitStatusDb::Cancelled => VisitStatus::Cancelled,
        }
    }
}

impl From<VisitStatus> for VisitStatusDb {
    fn from(status: VisitStatus) -> Self {
        match status {
            VisitStatus::Pending => VisitStatusDb::Pending,
            VisitStatus::Approved => VisitStatusDb::Approved,
            VisitStatus::Denied => VisitStatusDb::Denied,
            VisitStatus::Completed => VisitStatusDb::Completed,
            VisitStatus::Cancelled => VisitStatusDb::Cancelled,
        }
    }
}

/// Database enum for how a request entered the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "entry_type", rename_all = "snake_case")]
pub enum EntryTypeDb {
    PreRegistered,
    ResidentInvited,
    WalkIn,
}

impl From<EntryTypeDb> for EntryType {
    fn from(entry_type: EntryTypeDb) -> Self {
        match entry_type {
            EntryTypeDb::PreRegistered => EntryType::PreRegistered,
            EntryTypeDb::ResidentInvited => EntryType::ResidentInvited,
            EntryTypeDb::WalkIn => EntryType::WalkIn,
        }
    }
}

impl From<EntryType> for EntryTypeDb {
    fn from(entry_type: EntryType) -> Self {
        match entry_type {
            EntryType::PreRegistered => EntryTypeDb::PreRegistered,
            EntryType::ResidentInvited => EntryTypeDb::ResidentInvited,
            EntryType::WalkIn => EntryTypeDb::WalkIn,
        }
    }
}

/// Database row mapping for the visit_requests table.
#[derive(Debug, Clone, FromRow)]
pub struct VisitRequestEntity {
    pub id: Uuid,
    pub visitor_id: Uuid,
    pub resident_id: Uuid,
    pub security_officer_id: Option<Uuid>,
    pub entry_type: EntryTypeDb,
    pub status: VisitStatusDb,
    pub scheduled_at: DateTime<Utc>,
    pub visit_date: NaiveDate,
    pub expected_duration_minutes: Option<i32>,
    pub purpose: String,
    pub notes: Option<String>,
    pub vehicle_registration: Option<String>,
    pub number_of_guests: i32,
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

impl From<VisitRequestEntity> for VisitRequest {
    fn from(entity: VisitRequestEntity) -> Self {
        Self {
            id: entity.id,
            visitor_id: entity.visitor_id,
            resident_id: entity.resident_id,
            security_officer_id: entity.security_officer_id,
            entry_type: entity.entry_type.into(),
            status: entity.status.into(),
            scheduled_at: entity.scheduled_at,
            visit_date: entity.visit_date,
            expected_duration_minutes: entity.expected_duration_minutes,
            purpose: entity.purpose,
            notes: entity.notes,
            vehicle_registration: entity.vehicle_registration,
            number_of_guests: entity.number_of_guests,
            credential_hash: entity.credential_hash,
            denial_reason: entity.denial_reason,
            approved_by: entity.approved_by,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
            approved_at: entity.approved_at,
            denied_at: entity.denied_at,
            completed_at: entity.completed_at,
            cancelled_at: entity.cancelled_at,
            actual_arrival: entity.actual_arrival,
            actual_departure: entity.actual_departure,
        }
    }
}
