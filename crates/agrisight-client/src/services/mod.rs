//! Typed wrappers over backend endpoints.
//!
//! # Design
//! - Each service validates its input, calls [`crate::http::ApiClient`], and logs failures
//!   before returning them unchanged.
//! - Operations that change who is signed in run through the session handle.

pub mod auth;
pub mod models;
pub mod predictions;
pub mod profile;

pub use auth::AuthService;
pub use models::ModelService;
pub use predictions::PredictionService;
pub use profile::ProfileService;

use agrisight_core::ApiError;

pub(crate) fn log_failure(operation: &'static str, error: &ApiError) {
    tracing::warn!(
        operation,
        kind = error.kind.as_str(),
        status = error.status,
        error = %error,
        "request failed"
    );
}
