//! Wiring of the client components from a single [`ClientConfig`].

use agrisight_core::{ApiError, OtpMachine, OtpPurpose, StorageError};
use thiserror::Error;

use crate::config::{ClientConfig, ConfigError};
use crate::flows::{BackendTransport, OtpFlow};
use crate::http::ApiClient;
use crate::services::{AuthService, ModelService, PredictionService, ProfileService};
use crate::session::SessionHandle;
use crate::storage::SharedStore;

/// Errors raised while assembling the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration failed validation.
    #[error("invalid client configuration")]
    Config(#[from] ConfigError),
    /// The state directory could not be opened.
    #[error("client state could not be opened")]
    Storage(#[from] StorageError),
    /// The HTTP transport could not be built.
    #[error("HTTP client could not be built")]
    Transport(#[from] ApiError),
}

/// Every service sharing one session, store and transport.
#[derive(Clone, Debug)]
pub struct AgriSight {
    config: ClientConfig,
    client: ApiClient,
    auth: AuthService,
    profile: ProfileService,
    predictions: PredictionService,
    models: ModelService,
}

impl AgriSight {
    /// Validate `config` and build the client, restoring persisted state.
    ///
    /// # Errors
    /// Returns [`ClientError`] when the configuration is invalid, the state
    /// directory cannot be read, or the transport cannot be built.
    pub fn connect(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let store = SharedStore::open(config.state_dir.as_deref())?;
        let client = ApiClient::new(&config, SessionHandle::new(), store)?;
        tracing::debug!(
            api_url = %config.api_url,
            model_api_url = %config.model_base(),
            persistent = config.state_dir.is_some(),
            "client assembled"
        );
        Ok(Self {
            auth: AuthService::new(client.clone()),
            profile: ProfileService::new(client.clone()),
            predictions: PredictionService::new(client.clone()),
            models: ModelService::new(client.clone()),
            client,
            config,
        })
    }

    /// Configuration the client was built from.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Underlying transport.
    #[must_use]
    pub const fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Shared session.
    #[must_use]
    pub const fn session(&self) -> &SessionHandle {
        self.client.session()
    }

    /// Durable store.
    #[must_use]
    pub const fn store(&self) -> &SharedStore {
        self.client.store()
    }

    /// Authentication endpoints.
    #[must_use]
    pub const fn auth(&self) -> &AuthService {
        &self.auth
    }

    /// Profile endpoints.
    #[must_use]
    pub const fn profile(&self) -> &ProfileService {
        &self.profile
    }

    /// Prediction endpoints.
    #[must_use]
    pub const fn predictions(&self) -> &PredictionService {
        &self.predictions
    }

    /// Model-service endpoints.
    #[must_use]
    pub const fn models(&self) -> &ModelService {
        &self.models
    }

    /// Fresh signup verification flow.
    #[must_use]
    pub fn signup_flow(&self) -> OtpFlow<BackendTransport> {
        self.flow(OtpPurpose::Signup, self.config.signup_cooldown_secs)
    }

    /// Fresh email-change verification flow.
    #[must_use]
    pub fn email_change_flow(&self) -> OtpFlow<BackendTransport> {
        self.flow(
            OtpPurpose::EmailChange,
            self.config.email_change_cooldown_secs,
        )
    }

    fn flow(&self, purpose: OtpPurpose, cooldown_secs: u32) -> OtpFlow<BackendTransport> {
        OtpFlow::new(
            OtpMachine::new(purpose, cooldown_secs, self.config.max_resends),
            BackendTransport::new(self.auth.clone(), self.profile.clone()),
            self.store().clone(),
            self.session().clone(),
        )
    }
}
