//! Logging setup errors.

use thiserror::Error;

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Failures while configuring logging.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A global subscriber was already installed.
    #[error("logging subscriber already installed")]
    SubscriberInstall {
        /// Error from `tracing-subscriber`.
        source: tracing_subscriber::util::TryInitError,
    },
    /// `--log-format` named an unknown format.
    #[error("unknown log format '{value}' (expected json, pretty or auto)")]
    UnknownFormat {
        /// Rejected input.
        value: String,
    },
}
