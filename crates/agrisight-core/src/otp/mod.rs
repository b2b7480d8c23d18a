//! One-time-code verification used by signup and email change.
//!
//! # Design
//! - [`machine`] is a pure `(state, event) -> effects` reducer; transport lives in the
//!   client crate.
//! - [`code`] models the six input cells independently of any widget toolkit.
//! - [`cooldown`] derives the resend timer from the issue instant instead of ticking a counter.

pub mod code;
pub mod cooldown;
pub mod machine;

pub use code::CodeInput;
pub use cooldown::{Cooldown, format_countdown};
pub use machine::{
    OtpChallenge, OtpEffect, OtpEvent, OtpMachine, OtpNotice, OtpPurpose, OtpState, OtpTarget,
};

/// Number of digits in every verification code.
pub const CODE_LENGTH: usize = 6;
