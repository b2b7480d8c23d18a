//! Prediction history as seen by the history screen.
//!
//! # Design
//! - Records are read-only; the only local mutation is optimistic removal.
//! - A failed delete is repaired by replacing the list with a fresh fetch.

use serde::{Deserialize, Serialize};

/// One stored inference result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Backend identifier.
    pub prediction_id: String,
    /// Crop label reported by the model.
    pub crop: String,
    /// Disease label reported by the model.
    pub disease: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Location of the analysed image.
    pub image_url: Option<String>,
    /// Creation timestamp as reported by the backend.
    pub created_at: Option<String>,
    /// Model that produced the result.
    pub model_name: Option<String>,
}

impl Prediction {
    /// Confidence as a whole percentage, clamped to `0..=100`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn confidence_percent(&self) -> u8 {
        if self.confidence.is_nan() {
            return 0;
        }
        (self.confidence.clamp(0.0, 1.0) * 100.0).round() as u8
    }

    /// Case-insensitive match on disease or crop label.
    #[must_use]
    pub fn matches(&self, term: &str) -> bool {
        let needle = term.trim().to_lowercase();
        needle.is_empty()
            || self.disease.to_lowercase().contains(&needle)
            || self.crop.to_lowercase().contains(&needle)
    }
}

/// Loaded page of predictions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PredictionList {
    items: Vec<Prediction>,
}

impl PredictionList {
    /// List holding `items` in backend order.
    #[must_use]
    pub const fn new(items: Vec<Prediction>) -> Self {
        Self { items }
    }

    /// Records in display order.
    #[must_use]
    pub fn items(&self) -> &[Prediction] {
        &self.items
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Record with `prediction_id`.
    #[must_use]
    pub fn get(&self, prediction_id: &str) -> Option<&Prediction> {
        self.items
            .iter()
            .find(|item| item.prediction_id == prediction_id)
    }

    /// Remove a record before the backend confirms the delete.
    ///
    /// Returns the record with the index it held, for [`Self::restore`].
    pub fn remove_optimistic(&mut self, prediction_id: &str) -> Option<(usize, Prediction)> {
        let index = self
            .items
            .iter()
            .position(|item| item.prediction_id == prediction_id)?;
        Some((index, self.items.remove(index)))
    }

    /// Put a removed record back at `index`, or at the end when the list shrank.
    pub fn restore(&mut self, index: usize, record: Prediction) {
        let index = index.min(self.items.len());
        self.items.insert(index, record);
    }

    /// Replace the contents with a fresh fetch.
    pub fn replace(&mut self, items: Vec<Prediction>) {
        self.items = items;
    }

    /// Records matching `term` on disease or crop.
    #[must_use]
    pub fn search(&self, term: &str) -> Vec<&Prediction> {
        self.items.iter().filter(|item| item.matches(term)).collect()
    }
}
