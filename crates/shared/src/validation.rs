//! Common validation utilities.

use lazy_static::lazy_static;
use regex::Regex;
use validator::ValidationError;

lazy_static! {
    /// Normalized phone: optional leading `+`, then 7 to 15 digits (E.164 upper bound).
    static ref NORMALIZED_PHONE: Regex = Regex::new(r"^\+?[0-9]{7,15}$").unwrap();
    /// Characters tolerated as visual separators in user-entered phone numbers.
    static ref PHONE_SEPARATORS: Regex = Regex::new(r"[\s\-\.\(\)/]").unwrap();
}

/// Minimum length of a visitor's display name after trimming.
pub const MIN_NAME_LEN: usize = 2;

/// Minimum length of a purpose-of-visit text after trimming.
pub const MIN_PURPOSE_LEN: usize = 3;

/// Maximum length of a denial, removal or rejection reason after trimming.
pub const MAX_REASON_LEN: usize = 500;

/// Normalizes a user-entered phone number into the form used as the visitor key.
///
/// Separators (spaces, dashes, dots, parentheses, slashes) are stripped. A leading
/// `+` is preserved. Anything else that is not a digit makes the number invalid.
pub fn normalize_phone(raw: &str) -> Result<String, ValidationError> {
    let stripped = PHONE_SEPARATORS.replace_all(raw.trim(), "");
    if NORMALIZED_PHONE.is_match(&stripped) {
        Ok(stripped.into_owned())
    } else {
        let mut err = ValidationError::new("phone_format");
        err.message = Some("Phone number must contain 7 to 15 digits".into());
        Err(err)
    }
}

/// Validates a phone number as entered (validator crate `custom` hook).
pub fn validate_phone(raw: &str) -> Result<(), ValidationError> {
    normalize_phone(raw).map(|_| ())
}

/// Validates a visitor display name.
pub fn validate_display_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().chars().count() >= MIN_NAME_LEN {
        Ok(())
    } else {
        let mut err = ValidationError::new("name_length");
        err.message = Some("Name must be at least 2 characters".into());
        Err(err)
    }
}

/// Validates a purpose-of-visit text.
pub fn validate_purpose(purpose: &str) -> Result<(), ValidationError> {
    if purpose.trim().chars().count() >= MIN_PURPOSE_LEN {
        Ok(())
    } else {
        let mut err = ValidationError::new("purpose_length");
        err.message = Some("Purpose of visit must be at least 3 characters".into());
        Err(err)
    }
}

/// Validates that a free-text field is not blank.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Value cannot be blank".into());
        Err(err)
    } else {
        Ok(())
    }
}

/// Validates a decision reason: present, and at most [`MAX_REASON_LEN`] characters.
pub fn validate_reason(reason: &str) -> Result<(), ValidationError> {
    validate_not_blank(reason)?;
    if reason.trim().chars().count() > MAX_REASON_LEN {
        let mut err = ValidationError::new("reason_length");
        err.message = Some("Reason must be at most 500 characters".into());
        return Err(err);
    }
    Ok(())
}

/// Trims an optional free-text value, mapping blank input to `None`.
pub fn trim_optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
