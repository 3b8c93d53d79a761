//! In-app notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Notification priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl std::fmt::Display for NotificationPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationPriority::Low => write!(f, "low"),
            NotificationPriority::Medium => write!(f, "medium"),
            NotificationPriority::High => write!(f, "high"),
            NotificationPriority::Urgent => write!(f, "urgent"),
        }
    }
}

impl std::str::FromStr for NotificationPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(NotificationPriority::Low),
            "medium" => Ok(NotificationPriority::Medium),
            "high" => Ok(NotificationPriority::High),
            "urgent" => Ok(NotificationPriority::Urgent),
            _ => Err(format!("Invalid notification priority: {}", s)),
        }
    }
}

/// Category-specific data attached to a notification.
///
/// Serialized with the category as the tag, so the category column and the
/// payload can never disagree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum NotificationData {
    VisitRequest {
        visit_request_id: Uuid,
        visitor_name: String,
        scheduled_at: DateTime<Utc>,
    },
    VisitApproved {
        visit_request_id: Uuid,
        visitor_name: String,
        resident_name: String,
        unit_number: Option<String>,
        scheduled_at: DateTime<Utc>,
    },
    WalkIn {
        visit_request_id: Uuid,
        visitor_name: String,
        security_officer_id: Uuid,
    },
    VisitCancelled {
        visit_request_id: Uuid,
        visitor_name: String,
    },
    AccountApproved {
        approved_by: Uuid,
    },
}

impl NotificationData {
    pub fn category(&self) -> &'static str {
        match self {
            NotificationData::VisitRequest { .. } => "visit_request",
            NotificationData::VisitApproved { .. } => "visit_approved",
            NotificationData::WalkIn { .. } => "walk_in",
            NotificationData::VisitCancelled { .. } => "visit_cancelled",
            NotificationData::AccountApproved { .. } => "account_approved",
        }
    }

    /// Link back to the originating visit request, if any.
    pub fn visit_request_id(&self) -> Option<Uuid> {
        match self {
            NotificationData::VisitRequest {
                visit_request_id, ..
            }
            | NotificationData::VisitApproved {
                visit_request_id, ..
            }
            | NotificationData::WalkIn {
                visit_request_id, ..
            }
            | NotificationData::VisitCancelled {
                visit_request_id, ..
            } => Some(*visit_request_id),
            NotificationData::AccountApproved { .. } => None,
        }
    }
}

/// A notification addressed to one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub title: String,
    pub message: String,
    pub priority: NotificationPriority,
    pub data: NotificationData,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

impl Notification {
    pub fn new(
        recipient_id: Uuid,
        title: impl Into<String>,
        message: impl Into<String>,
        priority: NotificationPriority,
        data: NotificationData,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient_id,
            title: title.into(),
            message: message.into(),
            priority,
            data,
            is_read: false,
            created_at: now,
            read_at: None,
        }
    }
}
