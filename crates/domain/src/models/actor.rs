//! Actors and user accounts.
//!
//! Accounts are owned by the authentication service; the gate only reads them
//! and records the administrator's approve or reject decision.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::VisitError;

/// Role of an authenticated account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Resident,
    Security,
    Admin,
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserRole::Resident => write!(f, "resident"),
            UserRole::Security => write!(f, "security"),
            UserRole::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "resident" => Ok(UserRole::Resident),
            "security" => Ok(UserRole::Security),
            "admin" => Ok(UserRole::Admin),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// Already-authenticated caller of a domain operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub role: UserRole,
    pub approved: bool,
}

impl Actor {
    pub fn new(id: Uuid, role: UserRole, approved: bool) -> Self {
        Self { id, role, approved }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Returns true if the actor is the resident `resident_id` or an administrator.
    pub fn speaks_for_resident(&self, resident_id: Uuid) -> bool {
        self.is_admin() || (self.role == UserRole::Resident && self.id == resident_id)
    }

    /// Fails with `Forbidden` unless the actor holds one of `roles` and is approved.
    ///
    /// Administrators are always treated as approved.
    pub fn require(&self, roles: &[UserRole]) -> Result<(), VisitError> {
        if !roles.contains(&self.role) {
            return Err(VisitError::forbidden(format!(
                "role {} may not perform this operation",
                self.role
            )));
        }
        if !self.approved && !self.is_admin() {
            return Err(VisitError::forbidden("account is awaiting approval"));
        }
        Ok(())
    }
}

/// User account as seen by the gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct UserAccount {
    pub id: Uuid,
    pub full_name: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub role: UserRole,
    /// House or apartment identifier, residents only.
    pub unit_number: Option<String>,
    pub is_active: bool,
    pub is_approved: bool,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<Uuid>,
    /// Set when an administrator turned the registration down.
    pub rejected_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl UserAccount {
    /// A resident that may receive visit requests.
    pub fn is_receiving_resident(&self) -> bool {
        self.role == UserRole::Resident && self.is_active && self.is_approved
    }

    /// Neither approved nor rejected yet.
    pub fn is_pending_approval(&self) -> bool {
        !self.is_approved && self.rejected_at.is_none()
    }

    pub fn actor(&self) -> Actor {
        Actor::new(self.id, self.role, self.is_approved)
    }
}
