//! Prediction results returned to callers and published downstream

use crate::error::{DeliveryError, Result};
use crate::labels::{ClassLabel, CLASS_COUNT};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tolerance when checking that class probabilities sum to one.
pub const PROBABILITY_TOLERANCE: f64 = 1e-6;

/// Probability of every class. All three labels are always present.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassProbabilities {
    #[serde(rename = "On-Time")]
    pub on_time: f64,
    #[serde(rename = "At Risk")]
    pub at_risk: f64,
    #[serde(rename = "Delayed")]
    pub delayed: f64,
}

impl ClassProbabilities {
    /// Build from a classifier output indexed by class id.
    ///
    /// Models fitted on data where a class never occurred return fewer
    /// columns; missing classes get probability zero. The vector is
    /// renormalized so float32 runtimes still sum to one.
    pub fn from_model_output(raw: &[f64]) -> Result<Self> {
        if raw.len() > CLASS_COUNT {
            return Err(DeliveryError::SchemaMismatch {
                what: "class count",
                expected: CLASS_COUNT,
                actual: raw.len(),
            });
        }
        if raw.iter().any(|p| !p.is_finite() || *p < 0.0) {
            return Err(DeliveryError::Inference(format!(
                "classifier returned invalid probabilities: {raw:?}"
            )));
        }

        let total: f64 = raw.iter().sum();
        if total <= 0.0 {
            return Err(DeliveryError::Inference(
                "classifier returned an all-zero probability vector".to_string(),
            ));
        }

        let at = |id: usize| raw.get(id).copied().unwrap_or(0.0) / total;
        Ok(Self {
            on_time: at(ClassLabel::OnTime.id()),
            at_risk: at(ClassLabel::AtRisk.id()),
            delayed: at(ClassLabel::Delayed.id()),
        })
    }

    pub fn get(&self, class: ClassLabel) -> f64 {
        match class {
            ClassLabel::OnTime => self.on_time,
            ClassLabel::AtRisk => self.at_risk,
            ClassLabel::Delayed => self.delayed,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ClassLabel, f64)> + '_ {
        ClassLabel::ALL.into_iter().map(move |class| (class, self.get(class)))
    }

    pub fn max(&self) -> f64 {
        self.on_time.max(self.at_risk).max(self.delayed)
    }

    pub fn sum(&self) -> f64 {
        self.on_time + self.at_risk + self.delayed
    }
}

/// Outcome of a single prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Class id returned by the model
    pub predicted_class_id: usize,
    /// Human-readable label of `predicted_class_id`
    pub predicted_label: ClassLabel,
    /// Highest class probability
    pub confidence: f64,
    /// Probability of every class
    pub probabilities: ClassProbabilities,
}

impl PredictionResult {
    pub fn new(predicted: ClassLabel, probabilities: ClassProbabilities) -> Self {
        Self {
            predicted_class_id: predicted.id(),
            predicted_label: predicted,
            confidence: probabilities.max(),
            probabilities,
        }
    }
}

/// Prediction announced on the outbound subject
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionEvent {
    /// Unique event identifier
    pub event_id: String,
    /// Request this prediction answers
    pub request_id: String,
    pub username: String,
    #[serde(flatten)]
    pub result: PredictionResult,
    pub timestamp: DateTime<Utc>,
}

impl PredictionEvent {
    pub fn new(request_id: String, username: String, result: PredictionResult) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            request_id,
            username,
            result,
            timestamp: Utc::now(),
        }
    }
}

/// Number of predictions per class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCounts {
    #[serde(rename = "On-Time")]
    pub on_time: u64,
    #[serde(rename = "At Risk")]
    pub at_risk: u64,
    #[serde(rename = "Delayed")]
    pub delayed: u64,
}

impl LabelCounts {
    pub fn record(&mut self, class: ClassLabel) {
        match class {
            ClassLabel::OnTime => self.on_time += 1,
            ClassLabel::AtRisk => self.at_risk += 1,
            ClassLabel::Delayed => self.delayed += 1,
        }
    }

    pub fn get(&self, class: ClassLabel) -> u64 {
        match class {
            ClassLabel::OnTime => self.on_time,
            ClassLabel::AtRisk => self.at_risk,
            ClassLabel::Delayed => self.delayed,
        }
    }

    pub fn total(&self) -> u64 {
        self.on_time + self.at_risk + self.delayed
    }
}

impl FromIterator<ClassLabel> for LabelCounts {
    fn from_iter<I: IntoIterator<Item = ClassLabel>>(iter: I) -> Self {
        let mut counts = Self::default();
        for class in iter {
            counts.record(class);
        }
        counts
    }
}
