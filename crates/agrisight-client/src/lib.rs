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
#![allow(clippy::module_name_repetitions, clippy::redundant_pub_crate)]

//! HTTP client, session handle, services and verification flows for AgriSight.
//!
//! Layout:
//! - `config.rs`: client settings and their validation
//! - `http.rs`: cookie-authenticated transport and error normalization
//! - `credentials.rs`: session cookie jar
//! - `storage.rs`: file-backed and shared key/value stores
//! - `session.rs`: observable session container
//! - `models.rs`: request and response payloads
//! - `services/`: typed endpoint wrappers
//! - `flows/`: OTP flow driver
//! - `app.rs`: wiring of all of the above from one configuration

pub mod app;
pub mod config;
pub mod credentials;
pub mod flows;
pub mod http;
pub mod models;
pub mod services;
pub mod session;
pub mod storage;

pub use app::{AgriSight, ClientError};
pub use config::{ClientConfig, ConfigError};
pub use flows::{BackendTransport, FlowError, FlowReport, OtpFlow, OtpTransport};
pub use http::{ApiClient, RequestOptions, Service, Upload};
pub use services::{AuthService, ModelService, PredictionService, ProfileService};
pub use session::SessionHandle;
pub use storage::{FileStore, SharedStore};
