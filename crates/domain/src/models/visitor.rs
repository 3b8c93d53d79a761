//! Visitor identity, deduplicated by normalized phone number.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A person who visits residents. Never deleted while referenced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Visitor {
    pub id: Uuid,
    /// Normalized phone number, unique.
    pub phone_number: String,
    pub full_name: String,
    pub email: Option<String>,
    pub id_number: Option<String>,
    pub company: Option<String>,
    /// Purpose given on the most recent registration.
    pub default_purpose: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Visitor {
    pub fn is_contactable(&self) -> bool {
        self.email.is_some()
    }
}

/// Contact details supplied by any entry path.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct VisitorDetails {
    #[validate(custom(function = "shared::validation::validate_phone"))]
    pub phone_number: String,
    #[validate(custom(function = "shared::validation::validate_display_name"))]
    #[validate(length(max = 200, message = "Name must be at most 200 characters"))]
    pub full_name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    #[validate(length(max = 50, message = "ID number must be at most 50 characters"))]
    pub id_number: Option<String>,
    #[validate(length(max = 200, message = "Company must be at most 200 characters"))]
    pub company: Option<String>,
}

impl VisitorDetails {
    pub fn new(phone_number: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            phone_number: phone_number.into(),
            full_name: full_name.into(),
            email: None,
            id_number: None,
            company: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}
