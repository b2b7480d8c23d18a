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

//! Logging primitives shared across the AgriSight workspace.
//!
//! Layout:
//! - `init.rs`: subscriber installation and log format selection
//! - `context.rs`: the command-level span carrying build metadata
//! - `error.rs`: telemetry error type

pub mod context;
pub mod error;
pub mod init;

pub use context::CommandSpan;
pub use error::{Result, TelemetryError};
pub use init::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_sha, init_logging};
