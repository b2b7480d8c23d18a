//! Form validation performed before any request leaves the client.

use crate::error::ValidationError;

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Phrase required to confirm account deletion.
pub const DELETE_CONFIRMATION: &str = "DELETE";

/// Reject blank values for a named field.
///
/// # Errors
/// Returns [`ValidationError::MissingField`] when `value` is empty after trimming.
pub fn require<'a>(field: &'static str, value: &'a str) -> Result<&'a str, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ValidationError::MissingField { field })
    } else {
        Ok(trimmed)
    }
}

/// Minimal structural check for an email address.
///
/// # Errors
/// Returns [`ValidationError::InvalidEmail`] when the address has no local part,
/// no `@`, or no dotted domain.
pub fn email(value: &str) -> Result<String, ValidationError> {
    let trimmed = require("email", value)?;
    let invalid = || ValidationError::InvalidEmail {
        value: trimmed.to_string(),
    };
    let (local, domain) = trimmed.split_once('@').ok_or_else(invalid)?;
    if local.is_empty()
        || domain.starts_with('.')
        || domain.ends_with('.')
        || !domain.contains('.')
        || domain.contains('@')
        || trimmed.chars().any(char::is_whitespace)
    {
        return Err(invalid());
    }
    Ok(trimmed.to_string())
}

/// Check a password against the strength policy.
///
/// # Errors
/// Returns [`ValidationError::WeakPassword`] listing every unmet requirement.
pub fn password_strength(password: &str) -> Result<(), ValidationError> {
    let mut missing = Vec::new();
    if password.chars().count() < MIN_PASSWORD_LEN {
        missing.push("at least 8 characters");
    }
    if !password.chars().any(|ch| ch.is_ascii_uppercase()) {
        missing.push("one uppercase letter");
    }
    if !password.chars().any(|ch| ch.is_ascii_lowercase()) {
        missing.push("one lowercase letter");
    }
    if !password.chars().any(|ch| ch.is_ascii_digit()) {
        missing.push("one number");
    }
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::WeakPassword { missing })
    }
}

/// Ensure a password and its confirmation agree.
///
/// # Errors
/// Returns [`ValidationError::PasswordMismatch`] when they differ and
/// [`ValidationError::MissingField`] when the password is blank.
pub fn password_pair(password: &str, confirmation: &str) -> Result<(), ValidationError> {
    require("password", password)?;
    if password == confirmation {
        Ok(())
    } else {
        Err(ValidationError::PasswordMismatch)
    }
}

/// Ensure the user typed the destructive-action phrase.
///
/// # Errors
/// Returns [`ValidationError::ConfirmationMismatch`] when `typed` differs from
/// [`DELETE_CONFIRMATION`].
pub fn delete_confirmation(typed: &str) -> Result<(), ValidationError> {
    if typed.trim() == DELETE_CONFIRMATION {
        Ok(())
    } else {
        Err(ValidationError::ConfirmationMismatch {
            expected: DELETE_CONFIRMATION,
        })
    }
}
