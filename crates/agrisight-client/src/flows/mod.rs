//! Verification flows that combine the OTP machine with storage and the backend.

pub mod otp;

pub use otp::{BackendTransport, FlowReport, OtpFlow, OtpTransport};

use agrisight_core::{OtpPurpose, StorageError};
use thiserror::Error;

/// Convenience alias for flow results.
pub type FlowResult<T> = Result<T, FlowError>;

/// Errors that stop a flow step.
#[derive(Debug, Error)]
pub enum FlowError {
    /// Persisted flow context could not be read or written.
    #[error("flow state could not be persisted")]
    Storage(#[from] StorageError),
    /// A target was offered to a flow of another purpose.
    #[error("flow for {} cannot start a {} challenge", .expected.as_str(), .actual.as_str())]
    PurposeMismatch {
        /// Purpose the flow verifies.
        expected: OtpPurpose,
        /// Purpose of the rejected target.
        actual: OtpPurpose,
    },
}
