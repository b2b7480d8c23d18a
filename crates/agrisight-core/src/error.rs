//! Normalized error types shared by the client layers.
//!
//! # Design
//! - The backend reports failures as `{message}` or `{detail}`; callers only ever see [`ApiError`].
//! - Validation failures are raised before any network call and never reach the transport.

use thiserror::Error;

/// Coarse classification of a failed API interaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Input rejected before or by the backend as malformed.
    Validation,
    /// Authentication failed or expired (HTTP 401).
    Unauthorized,
    /// A rate or resend limit was hit (HTTP 429).
    LimitReached,
    /// The referenced record or token does not exist or expired (HTTP 404).
    NotFound,
    /// Any other business-rule rejection (remaining 4xx).
    Business,
    /// The backend failed (5xx).
    Server,
    /// The request never produced a response.
    Network,
    /// A response arrived but could not be decoded.
    Decode,
}

impl ErrorKind {
    /// Classify an HTTP status code.
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            401 => Self::Unauthorized,
            404 => Self::NotFound,
            429 => Self::LimitReached,
            400 | 409 | 422 => Self::Validation,
            500..=599 => Self::Server,
            _ => Self::Business,
        }
    }

    /// Short label used in logs and CLI output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Unauthorized => "unauthorized",
            Self::LimitReached => "limit_reached",
            Self::NotFound => "not_found",
            Self::Business => "business",
            Self::Server => "server",
            Self::Network => "network",
            Self::Decode => "decode",
        }
    }
}

/// Error returned by every client operation.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ApiError {
    /// Classification of the failure.
    pub kind: ErrorKind,
    /// HTTP status when a response was received.
    pub status: Option<u16>,
    /// User-facing message (backend-supplied when available).
    pub message: String,
}

const LIMIT_MARKERS: [&str; 2] = ["resend limit reached", "too many"];
const NOT_FOUND_MARKERS: [&str; 3] = ["otp token not found", "expired", "not found"];

impl ApiError {
    /// Build an error from an HTTP status and the backend message.
    ///
    /// Some endpoints report OTP limits with a generic status; the message
    /// text is consulted so limit and missing-token cases are classified the
    /// same way regardless of status.
    #[must_use]
    pub fn from_response(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut kind = ErrorKind::from_status(status);
        if matches!(kind, ErrorKind::Validation | ErrorKind::Business) {
            let lowered = message.to_ascii_lowercase();
            if LIMIT_MARKERS.iter().any(|marker| lowered.contains(marker)) {
                kind = ErrorKind::LimitReached;
            } else if NOT_FOUND_MARKERS.iter().any(|marker| lowered.contains(marker)) {
                kind = ErrorKind::NotFound;
            }
        }
        Self {
            kind,
            status: Some(status),
            message,
        }
    }

    /// Transport-level failure without a response.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Network,
            status: None,
            message: message.into(),
        }
    }

    /// Response body could not be decoded.
    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Decode,
            status: None,
            message: message.into(),
        }
    }

    /// Client-side validation failure.
    #[must_use]
    pub fn validation(error: &ValidationError) -> Self {
        Self {
            kind: ErrorKind::Validation,
            status: None,
            message: error.to_string(),
        }
    }

    /// Whether the error forces an OTP flow back to its initial screen.
    #[must_use]
    pub const fn ends_otp_flow(&self) -> bool {
        matches!(self.kind, ErrorKind::LimitReached | ErrorKind::NotFound)
    }
}

impl From<ValidationError> for ApiError {
    fn from(error: ValidationError) -> Self {
        Self::validation(&error)
    }
}

/// Client-side validation failures raised before any request.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A required form field was blank.
    #[error("{field} is required")]
    MissingField {
        /// Name of the blank field.
        field: &'static str,
    },
    /// Password and confirmation differ.
    #[error("passwords do not match")]
    PasswordMismatch,
    /// Password fails the strength policy.
    #[error("password must contain: {}", .missing.join(", "))]
    WeakPassword {
        /// Requirements that were not met.
        missing: Vec<&'static str>,
    },
    /// Not every code cell holds a digit.
    #[error("please enter the complete {expected}-digit code")]
    IncompleteCode {
        /// Expected number of digits.
        expected: usize,
    },
    /// Email address is not plausibly formed.
    #[error("'{value}' is not a valid email address")]
    InvalidEmail {
        /// Rejected input.
        value: String,
    },
    /// Destructive confirmation phrase was not typed.
    #[error("type {expected} to confirm")]
    ConfirmationMismatch {
        /// Phrase the user has to type.
        expected: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification_covers_auth_and_limits() {
        assert_eq!(ErrorKind::from_status(401), ErrorKind::Unauthorized);
        assert_eq!(ErrorKind::from_status(429), ErrorKind::LimitReached);
        assert_eq!(ErrorKind::from_status(404), ErrorKind::NotFound);
        assert_eq!(ErrorKind::from_status(503), ErrorKind::Server);
        assert_eq!(ErrorKind::from_status(403), ErrorKind::Business);
    }

    #[test]
    fn limit_message_overrides_generic_status() {
        let error = ApiError::from_response(400, "Resend limit reached");
        assert_eq!(error.kind, ErrorKind::LimitReached);
        assert!(error.ends_otp_flow());

        let error = ApiError::from_response(400, "OTP token not found");
        assert_eq!(error.kind, ErrorKind::NotFound);
    }

    #[test]
    fn plain_validation_message_keeps_kind() {
        let error = ApiError::from_response(400, "Invalid OTP");
        assert_eq!(error.kind, ErrorKind::Validation);
        assert!(!error.ends_otp_flow());
        assert_eq!(error.to_string(), "Invalid OTP");
    }

    #[test]
    fn weak_password_lists_requirements() {
        let error = ValidationError::WeakPassword {
            missing: vec!["one number", "one uppercase letter"],
        };
        assert_eq!(
            error.to_string(),
            "password must contain: one number, one uppercase letter"
        );
    }
}
