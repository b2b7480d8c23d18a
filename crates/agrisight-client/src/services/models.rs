//! Model listing from the model service.

use agrisight_core::ApiError;
use reqwest::Method;

use crate::http::{ApiClient, RequestOptions, Service};
use crate::models::{DetectionModel, ModelList};
use crate::services::log_failure;

/// Model-service endpoints.
#[derive(Clone, Debug)]
pub struct ModelService {
    client: ApiClient,
}

impl ModelService {
    /// Service over `client`.
    #[must_use]
    pub const fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// List models, optionally filtered by status and type.
    ///
    /// # Errors
    /// Returns the backend failure.
    #[tracing::instrument(skip_all)]
    pub async fn list(
        &self,
        status: Option<&str>,
        model_type: Option<&str>,
    ) -> Result<Vec<DetectionModel>, ApiError> {
        let filters = [("status", status), ("model_type", model_type)]
            .into_iter()
            .filter_map(|(key, value)| value.map(|value| (key, value)));
        self.client
            .call_as::<ModelList>(
                Method::GET,
                "/model/models",
                None,
                RequestOptions::query(filters).on(Service::Model),
            )
            .await
            .map(ModelList::into_models)
            .inspect_err(|err| log_failure("list_models", err))
    }
}
