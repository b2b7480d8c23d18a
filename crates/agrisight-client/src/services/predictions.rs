//! Prediction upload, history and deletion.

use agrisight_core::validate;
use agrisight_core::{ApiError, Prediction, PredictionList};
use reqwest::Method;
use serde_json::{Value, json};

use crate::http::{ApiClient, RequestOptions, Upload};
use crate::models::{HistoryQuery, MessageResponse, PredictionPage, PredictionRecord};
use crate::services::log_failure;

/// Prediction endpoints.
#[derive(Clone, Debug)]
pub struct PredictionService {
    client: ApiClient,
}

impl PredictionService {
    /// Service over `client`.
    #[must_use]
    pub const fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Run `model_name` on an uploaded image.
    ///
    /// # Errors
    /// Returns a validation error for a blank model name, or the backend failure.
    #[tracing::instrument(skip_all, fields(model = %model_name, file = %upload.file_name))]
    pub async fn predict(&self, model_name: &str, upload: Upload) -> Result<Prediction, ApiError> {
        let model_name = validate::require("model_name", model_name)?;
        let path = format!("/prediction/{model_name}");
        let value = self
            .client
            .upload(Method::POST, &path, upload, RequestOptions::default())
            .await
            .inspect_err(|err| log_failure("predict", err))?;
        let record = match value {
            Value::Object(mut object) if object.contains_key("prediction") => {
                object.remove("prediction").unwrap_or_default()
            }
            other => other,
        };
        let record: PredictionRecord = serde_json::from_value(record)
            .map_err(|err| ApiError::decode(format!("unexpected prediction response: {err}")))?;
        let mut prediction = Prediction::from(record);
        if prediction.model_name.is_none() {
            prediction.model_name = Some(model_name.to_string());
        }
        Ok(prediction)
    }

    /// Fetch one page of history.
    ///
    /// # Errors
    /// Returns the backend failure.
    #[tracing::instrument(skip_all, fields(skip = query.skip, limit = query.limit))]
    pub async fn history(&self, query: &HistoryQuery) -> Result<Vec<Prediction>, ApiError> {
        let body = json!(query);
        self.client
            .call_as::<PredictionPage>(
                Method::POST,
                "/prediction/get-user-predictions",
                Some(&body),
                RequestOptions::default(),
            )
            .await
            .map(PredictionPage::into_predictions)
            .inspect_err(|err| log_failure("history", err))
    }

    /// Delete a prediction.
    ///
    /// # Errors
    /// Returns the backend failure.
    #[tracing::instrument(skip_all, fields(prediction_id = %prediction_id))]
    pub async fn delete(&self, prediction_id: &str) -> Result<MessageResponse, ApiError> {
        let body = json!({ "prediction_id": prediction_id });
        self.client
            .call_as(
                Method::POST,
                "/prediction/delete-prediction",
                Some(&body),
                RequestOptions::default(),
            )
            .await
            .inspect_err(|err| log_failure("delete_prediction", err))
    }

    /// Remove a record from `list` immediately, then delete it on the backend.
    ///
    /// When the delete fails the list is replaced with a fresh fetch of
    /// `query`; if that also fails the removed record is put back where it was.
    ///
    /// # Errors
    /// Returns the delete failure after the list has been repaired.
    pub async fn delete_optimistic(
        &self,
        list: &mut PredictionList,
        prediction_id: &str,
        query: &HistoryQuery,
    ) -> Result<(), ApiError> {
        let removed = list.remove_optimistic(prediction_id);
        let Err(error) = self.delete(prediction_id).await else {
            return Ok(());
        };
        match self.history(query).await {
            Ok(items) => list.replace(items),
            Err(refetch) => {
                tracing::warn!(error = %refetch, "refetch after failed delete also failed");
                if let Some((index, record)) = removed {
                    list.restore(index, record);
                }
            }
        }
        Err(error)
    }
}
