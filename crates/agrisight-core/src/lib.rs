#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(
    missing_docs,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
#![allow(clippy::module_name_repetitions)]

//! Transport-free state for the AgriSight client.
//!
//! Layout:
//! - `session.rs`: the authenticated user snapshot and its invariants
//! - `store.rs`: session actions and the reducer that applies them
//! - `otp/`: the verification-code state machine, code cells, and cooldown
//! - `routes.rs`: route table and the open/private guards
//! - `handoff.rs`: durable key/value hand-off between screens
//! - `predictions.rs`: prediction history list with optimistic removal
//! - `error.rs`: normalized API errors and client-side validation

pub mod clock;
pub mod error;
pub mod handoff;
pub mod otp;
pub mod predictions;
pub mod routes;
pub mod session;
pub mod store;
pub mod validate;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{ApiError, ErrorKind, ValidationError};
pub use handoff::{HandoffKey, KeyValueStore, MemoryStore, PendingEmailChange, StorageError};
pub use otp::{
    CodeInput, Cooldown, OtpChallenge, OtpEffect, OtpEvent, OtpMachine, OtpNotice, OtpPurpose,
    OtpState, OtpTarget,
};
pub use predictions::{Prediction, PredictionList};
pub use routes::{GuardDecision, Route, RouteAccess};
pub use session::{Session, SessionUser};
pub use store::{SessionAction, SessionOp, SessionOutcome};
