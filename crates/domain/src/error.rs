//! Domain error types.

use thiserror::Error;

use crate::store::StoreError;

/// Errors surfaced synchronously by every domain operation.
///
/// None of these are retried automatically; apart from `Storage` they all
/// describe a policy violation by the caller.
#[derive(Debug, Error)]
pub enum VisitError {
    /// Blacklisted pair, or a role/ownership violation.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Illegal state change, including re-processing a terminal record.
    #[error("Cannot {action}: record is {from}")]
    InvalidTransition { action: &'static str, from: String },

    #[error("{0} not found")]
    NotFound(&'static str),

    /// Duplicate live request for the same visitor, resident and day,
    /// or a gate timestamp that was already recorded.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Credential presented on a day other than the scheduled one.
    #[error("Credential is not valid today")]
    Expired,

    /// Credential belongs to a request that is no longer approved.
    #[error("Credential is not approved")]
    NotApproved,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl VisitError {
    pub fn forbidden(message: impl Into<String>) -> Self {
        VisitError::Forbidden(message.into())
    }

    pub fn invalid_transition(action: &'static str, from: impl ToString) -> Self {
        VisitError::InvalidTransition {
            action,
            from: from.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        VisitError::Validation(message.into())
    }
}

impl From<validator::ValidationError> for VisitError {
    fn from(err: validator::ValidationError) -> Self {
        let message = err
            .message
            .map(|m| m.to_string())
            .unwrap_or_else(|| err.code.to_string());
        VisitError::Validation(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transition_display() {
        let err = VisitError::invalid_transition("approve", "denied");
        assert_eq!(err.to_string(), "Cannot approve: record is denied");
    }

    #[test]
    fn test_from_validation_error_uses_message() {
        let err: VisitError = shared::validation::validate_phone("1").unwrap_err().into();
        assert!(matches!(err, VisitError::Validation(m) if m.contains("7 to 15 digits")));
    }

    #[test]
    fn test_storage_error_is_transparent() {
        let err: VisitError = StoreError::Unavailable("pool timed out".into()).into();
        assert_eq!(err.to_string(), "Storage unavailable: pool timed out");
    }
}
