//! Client configuration.
//!
//! # Design
//! - Plain data with defaults; the CLI fills it from flags and environment variables.
//! - `validate` runs once before any client is built so bad input fails fast.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Default backend address.
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";
/// Default resend cooldown, in seconds, for both OTP purposes.
pub const DEFAULT_RESEND_COOLDOWN_SECS: u32 = 60;
/// Default number of resends before a flow must restart.
pub const DEFAULT_MAX_RESENDS: u32 = 5;

/// Errors raised while validating [`ClientConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A URL could not be parsed.
    #[error("invalid URL for '{field}': {value}")]
    InvalidUrl {
        /// Field holding the URL.
        field: &'static str,
        /// Rejected input.
        value: String,
    },
    /// A URL used something other than http or https.
    #[error("unsupported scheme '{scheme}' for '{field}'")]
    UnsupportedScheme {
        /// Field holding the URL.
        field: &'static str,
        /// Rejected scheme.
        scheme: String,
    },
    /// A numeric field was outside its allowed range.
    #[error("invalid value for '{field}': {reason}")]
    InvalidField {
        /// Field that failed validation.
        field: &'static str,
        /// Machine-readable reason.
        reason: &'static str,
    },
}

/// Settings shared by every client component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Application backend base URL.
    pub api_url: Url,
    /// Model service base URL; defaults to `api_url`.
    pub model_api_url: Option<Url>,
    /// Per-request timeout; `None` keeps the transport default.
    pub timeout: Option<Duration>,
    /// Cooldown between signup code resends.
    pub signup_cooldown_secs: u32,
    /// Cooldown between email-change code resends.
    pub email_change_cooldown_secs: u32,
    /// Resends allowed per challenge.
    pub max_resends: u32,
    /// Directory for durable client state; `None` keeps state in memory.
    pub state_dir: Option<PathBuf>,
}

impl ClientConfig {
    /// Configuration for `api_url` with every other field at its default.
    #[must_use]
    pub const fn new(api_url: Url) -> Self {
        Self {
            api_url,
            model_api_url: None,
            timeout: None,
            signup_cooldown_secs: DEFAULT_RESEND_COOLDOWN_SECS,
            email_change_cooldown_secs: DEFAULT_RESEND_COOLDOWN_SECS,
            max_resends: DEFAULT_MAX_RESENDS,
            state_dir: None,
        }
    }

    /// Configuration pointing at `api_url` with defaults elsewhere.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidUrl`] when `api_url` does not parse.
    pub fn for_api(api_url: &str) -> Result<Self, ConfigError> {
        parse_url("api_url", api_url).map(Self::new)
    }

    /// Base URL for model-service calls.
    #[must_use]
    pub fn model_base(&self) -> &Url {
        self.model_api_url.as_ref().unwrap_or(&self.api_url)
    }

    /// Check every field for consistency.
    ///
    /// # Errors
    /// Returns [`ConfigError`] describing the first invalid field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_scheme("api_url", &self.api_url)?;
        if let Some(url) = &self.model_api_url {
            check_scheme("model_api_url", url)?;
        }
        if self.timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err(ConfigError::InvalidField {
                field: "timeout",
                reason: "must be greater than zero",
            });
        }
        if self.max_resends == 0 {
            return Err(ConfigError::InvalidField {
                field: "max_resends",
                reason: "must allow at least one resend",
            });
        }
        Ok(())
    }
}

/// Parse a configuration URL.
///
/// # Errors
/// Returns [`ConfigError::InvalidUrl`] when `value` does not parse.
pub fn parse_url(field: &'static str, value: &str) -> Result<Url, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidUrl {
        field,
        value: value.to_string(),
    })
}

fn check_scheme(field: &'static str, url: &Url) -> Result<(), ConfigError> {
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::UnsupportedScheme {
            field,
            scheme: other.to_string(),
        }),
    }
}
