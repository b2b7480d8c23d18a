//! Request and response bodies exchanged with the backend.

use agrisight_core::{Prediction, SessionUser};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of a signup code request.
#[derive(Clone, Debug, Serialize)]
pub struct SignupRequest {
    /// Address of the new account.
    pub email: String,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Chosen password.
    pub password: String,
    /// Password confirmation.
    pub confirm_password: String,
}

/// Profile returned by `profile/users`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Backend identifier.
    #[serde(alias = "user_id", alias = "_id")]
    pub id: String,
    /// Current address.
    #[serde(default)]
    pub email: Option<String>,
    /// Given name.
    #[serde(default)]
    pub first_name: Option<String>,
    /// Family name.
    #[serde(default)]
    pub last_name: Option<String>,
    /// Avatar URL.
    #[serde(default)]
    pub profile_pic_url: Option<String>,
    /// Declared farm size.
    #[serde(default, deserialize_with = "lenient_string")]
    pub farm_size: Option<String>,
}

impl UserProfile {
    /// Session identity derived from the profile.
    #[must_use]
    pub fn session_user(&self) -> SessionUser {
        SessionUser {
            id: self.id.clone(),
            email: self.email.clone(),
            profile_pic_url: self.profile_pic_url.clone(),
        }
    }

    /// `first last`, skipping blank parts.
    #[must_use]
    pub fn display_name(&self) -> String {
        [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Response of a resend call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ResendResponse {
    /// Backend message.
    #[serde(default)]
    pub message: Option<String>,
    /// Resends performed so far, as counted by the backend.
    #[serde(default)]
    pub resend_count: Option<u32>,
}

/// Generic `{message}` acknowledgement.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct MessageResponse {
    /// Backend message.
    #[serde(default)]
    pub message: Option<String>,
}

/// History paging and ordering.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HistoryQuery {
    /// Records to skip.
    pub skip: u32,
    /// Records to return.
    pub limit: u32,
    /// Field to sort by.
    pub sort_by: String,
    /// `-1` for descending, `1` for ascending.
    pub sort_order: i8,
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: 5,
            sort_by: "created_at".to_string(),
            sort_order: -1,
        }
    }
}

impl HistoryQuery {
    /// Query for page `page` (1-based) of `per_page` records, newest first.
    #[must_use]
    pub fn page(page: u32, per_page: u32) -> Self {
        let per_page = per_page.max(1);
        Self {
            skip: page.saturating_sub(1).saturating_mul(per_page),
            limit: per_page,
            ..Self::default()
        }
    }
}

/// Prediction record as stored by the backend.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PredictionRecord {
    #[serde(alias = "id", alias = "_id")]
    prediction_id: String,
    #[serde(default, alias = "crop_type")]
    crop: Option<String>,
    #[serde(default, alias = "disease_name")]
    disease: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    raw_output: Option<Value>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default, alias = "date")]
    created_at: Option<String>,
    #[serde(default)]
    model_name: Option<String>,
}

impl From<PredictionRecord> for Prediction {
    fn from(record: PredictionRecord) -> Self {
        let primary = record
            .raw_output
            .as_ref()
            .and_then(|raw| raw.get("primary_confidence"))
            .and_then(Value::as_f64);
        Self {
            prediction_id: record.prediction_id,
            crop: record.crop.unwrap_or_else(|| "Unknown".to_string()),
            disease: record.disease.unwrap_or_else(|| "Unknown".to_string()),
            confidence: primary.or(record.confidence).unwrap_or_default(),
            image_url: record.image_url,
            created_at: record.created_at,
            model_name: record.model_name,
        }
    }
}

/// History response: either a bare list or wrapped in `predictions`/`data`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PredictionPage {
    /// Bare array.
    List(Vec<PredictionRecord>),
    /// Wrapped array.
    Wrapped {
        /// Records.
        #[serde(alias = "data", alias = "items")]
        predictions: Vec<PredictionRecord>,
    },
}

impl PredictionPage {
    /// Normalized records.
    #[must_use]
    pub fn into_predictions(self) -> Vec<Prediction> {
        let records = match self {
            Self::List(records) | Self::Wrapped { predictions: records } => records,
        };
        records.into_iter().map(Prediction::from).collect()
    }
}

/// Detection model offered by the model service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionModel {
    /// Name used in the prediction path.
    #[serde(alias = "model_name")]
    pub name: String,
    /// Human-readable name.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Deployment status.
    #[serde(default)]
    pub status: Option<String>,
    /// Kind of model.
    #[serde(default)]
    pub model_type: Option<String>,
}

/// Model listing: either a bare list or wrapped in `models`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ModelList {
    /// Bare array.
    List(Vec<DetectionModel>),
    /// Wrapped array.
    Wrapped {
        /// Models.
        models: Vec<DetectionModel>,
    },
}

impl ModelList {
    /// Contained models.
    #[must_use]
    pub fn into_models(self) -> Vec<DetectionModel> {
        match self {
            Self::List(models) | Self::Wrapped { models } => models,
        }
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(text)) => Some(text),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prediction_prefers_primary_confidence_and_date_alias() -> serde_json::Result<()> {
        let record: PredictionRecord = serde_json::from_value(json!({
            "prediction_id": "p-1",
            "crop": "Maize",
            "disease": "Rust",
            "confidence": 0.4,
            "raw_output": {"primary_confidence": 0.87},
            "date": "2025-03-01T10:00:00Z",
            "model_name": "maize-v2"
        }))?;
        let prediction = Prediction::from(record);
        assert!((prediction.confidence - 0.87).abs() < f64::EPSILON);
        assert_eq!(prediction.created_at.as_deref(), Some("2025-03-01T10:00:00Z"));
        Ok(())
    }

    #[test]
    fn prediction_page_accepts_wrapped_and_bare_lists() -> serde_json::Result<()> {
        let bare: PredictionPage = serde_json::from_value(json!([{"prediction_id": "a"}]))?;
        assert_eq!(bare.into_predictions()[0].crop, "Unknown");
        let wrapped: PredictionPage =
            serde_json::from_value(json!({"predictions": [{"id": "b", "confidence": 0.5}]}))?;
        assert_eq!(wrapped.into_predictions()[0].prediction_id, "b");
        Ok(())
    }

    #[test]
    fn profile_accepts_numeric_farm_size() -> serde_json::Result<()> {
        let profile: UserProfile = serde_json::from_value(json!({
            "id": "u-1",
            "email": "grower@farm.io",
            "first_name": "Ada",
            "last_name": "",
            "farm_size": 12
        }))?;
        assert_eq!(profile.farm_size.as_deref(), Some("12"));
        assert_eq!(profile.display_name(), "Ada");
        Ok(())
    }

    #[test]
    fn history_page_computes_skip() {
        let query = HistoryQuery::page(3, 10);
        assert_eq!(query.skip, 20);
        assert_eq!(query.limit, 10);
        assert_eq!(query.sort_order, -1);
    }
}
