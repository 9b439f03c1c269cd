//! Multinomial logistic regression trained in-process.
//!
//! A small, dependency-free model that satisfies both the [`Classifier`] and
//! [`Trainable`] contracts. The trainer uses it to produce a JSON artifact
//! the service can load without an ONNX runtime.

use crate::error::{DeliveryError, Result};
use crate::feature_encoder::EncodedFeatureVector;
use crate::labels::{ClassLabel, CLASS_COUNT};
use crate::models::classifier::{Classifier, Trainable};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Softmax regression over standardized features
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoftmaxRegression {
    /// Gradient descent step size
    pub learning_rate: f64,
    /// Full-batch passes over the training set
    pub epochs: usize,
    /// L2 penalty on the weights (not the bias)
    pub l2: f64,
    means: Vec<f64>,
    scales: Vec<f64>,
    /// One row of weights per class
    weights: Vec<Vec<f64>>,
    bias: Vec<f64>,
}

impl Default for SoftmaxRegression {
    fn default() -> Self {
        Self::new(0.1, 300, 1e-4)
    }
}

impl SoftmaxRegression {
    pub fn new(learning_rate: f64, epochs: usize, l2: f64) -> Self {
        Self {
            learning_rate,
            epochs,
            l2,
            means: Vec::new(),
            scales: Vec::new(),
            weights: Vec::new(),
            bias: Vec::new(),
        }
    }

    pub fn is_fitted(&self) -> bool {
        !self.weights.is_empty()
    }

    /// Load a fitted model from its JSON artifact
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let unavailable = |reason: String| DeliveryError::ModelUnavailable {
            path: path.display().to_string(),
            reason,
        };

        let text = fs::read_to_string(path).map_err(|e| unavailable(e.to_string()))?;
        let model: Self = serde_json::from_str(&text).map_err(|e| unavailable(e.to_string()))?;
        if !model.is_fitted() {
            return Err(unavailable("artifact holds an unfitted model".to_string()));
        }
        if model.weights.len() != CLASS_COUNT
            || model.weights.iter().any(|row| row.len() != model.means.len())
            || model.scales.len() != model.means.len()
            || model.bias.len() != CLASS_COUNT
        {
            return Err(unavailable("inconsistent parameter shapes".to_string()));
        }

        info!(path = %path.display(), features = model.means.len(), "Softmax model loaded");
        Ok(model)
    }

    /// Write the fitted model as a JSON artifact
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    fn standardize(&self, features: &[f64]) -> Vec<f64> {
        features
            .iter()
            .zip(self.means.iter().zip(&self.scales))
            .map(|(x, (mean, scale))| (x - mean) / scale)
            .collect()
    }

    fn logits(&self, standardized: &[f64]) -> [f64; CLASS_COUNT] {
        let mut logits = [0.0; CLASS_COUNT];
        for (class, logit) in logits.iter_mut().enumerate() {
            *logit = self.bias[class]
                + self.weights[class]
                    .iter()
                    .zip(standardized)
                    .map(|(w, x)| w * x)
                    .sum::<f64>();
        }
        logits
    }
}

fn softmax(logits: &[f64; CLASS_COUNT]) -> [f64; CLASS_COUNT] {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut exp = [0.0; CLASS_COUNT];
    for (e, &l) in exp.iter_mut().zip(logits) {
        *e = (l - max).exp();
    }
    let total: f64 = exp.iter().sum();
    exp.map(|e| e / total)
}

/// Per-column mean and standard deviation; constant columns get scale 1.
fn column_stats(rows: &[Vec<f64>], width: usize) -> (Vec<f64>, Vec<f64>) {
    let n = rows.len() as f64;
    let mut means = vec![0.0; width];
    for row in rows {
        for (mean, x) in means.iter_mut().zip(row) {
            *mean += x / n;
        }
    }

    let mut scales = vec![0.0; width];
    for row in rows {
        for ((scale, x), mean) in scales.iter_mut().zip(row).zip(&means) {
            *scale += (x - mean).powi(2) / n;
        }
    }
    for scale in scales.iter_mut() {
        *scale = scale.sqrt();
        if *scale < 1e-12 {
            *scale = 1.0;
        }
    }

    (means, scales)
}

impl Classifier for SoftmaxRegression {
    fn name(&self) -> &str {
        "SoftmaxRegression"
    }

    fn input_width(&self) -> Option<usize> {
        self.is_fitted().then_some(self.means.len())
    }

    fn predict_proba(&self, features: &[f64]) -> Result<Vec<f64>> {
        if !self.is_fitted() {
            return Err(DeliveryError::Inference("model has not been fitted".to_string()));
        }
        if features.len() != self.means.len() {
            return Err(DeliveryError::SchemaMismatch {
                what: "model input width",
                expected: self.means.len(),
                actual: features.len(),
            });
        }

        let standardized = self.standardize(features);
        Ok(softmax(&self.logits(&standardized)).to_vec())
    }
}

impl Trainable for SoftmaxRegression {
    fn fit(&mut self, features: &[EncodedFeatureVector], labels: &[ClassLabel]) -> Result<()> {
        if features.is_empty() {
            return Err(DeliveryError::Dataset("cannot fit on an empty dataset".to_string()));
        }
        if features.len() != labels.len() {
            return Err(DeliveryError::Dataset(format!(
                "{} feature rows but {} labels",
                features.len(),
                labels.len()
            )));
        }

        let width = features[0].len();
        let (means, scales) = {
            let raw: Vec<Vec<f64>> = features.iter().map(|f| f.as_slice().to_vec()).collect();
            column_stats(&raw, width)
        };
        self.means = means;
        self.scales = scales;
        self.weights = vec![vec![0.0; width]; CLASS_COUNT];
        self.bias = vec![0.0; CLASS_COUNT];

        let rows: Vec<Vec<f64>> = features.iter().map(|f| self.standardize(f.as_slice())).collect();
        let n = rows.len() as f64;

        for epoch in 0..self.epochs {
            let mut grad_w = vec![vec![0.0; width]; CLASS_COUNT];
            let mut grad_b = [0.0; CLASS_COUNT];
            let mut loss = 0.0;

            for (row, label) in rows.iter().zip(labels) {
                let probabilities = softmax(&self.logits(row));
                loss -= probabilities[label.id()].max(1e-15).ln();

                for class in 0..CLASS_COUNT {
                    let target = if class == label.id() { 1.0 } else { 0.0 };
                    let error = probabilities[class] - target;
                    grad_b[class] += error / n;
                    for (g, x) in grad_w[class].iter_mut().zip(row) {
                        *g += error * x / n;
                    }
                }
            }

            for class in 0..CLASS_COUNT {
                for (w, g) in self.weights[class].iter_mut().zip(&grad_w[class]) {
                    *w -= self.learning_rate * (g + self.l2 * *w);
                }
                self.bias[class] -= self.learning_rate * grad_b[class];
            }

            if epoch % 50 == 0 {
                debug!(epoch, loss = loss / n, "Softmax training progress");
            }
        }

        info!(rows = rows.len(), features = width, epochs = self.epochs, "Softmax model fitted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature_encoder::FeatureEncoder;
    use crate::schema::{
        DeliveryMode, DeliveryPartner, PackageType, Region, VehicleType, WeatherCondition,
    };
    use crate::types::event::RawDeliveryEvent;

    fn event(weather: WeatherCondition, mode: DeliveryMode, distance: f64) -> RawDeliveryEvent {
        RawDeliveryEvent {
            delivery_partner: DeliveryPartner::Ekart,
            package_type: PackageType::Clothing,
            vehicle_type: VehicleType::Van,
            delivery_mode: mode,
            region: Region::North,
            weather_condition: weather,
            distance_km: distance,
            package_weight_kg: 2.0,
            delivery_rating: 4.0,
            delivery_cost: 100.0,
        }
    }

    /// Three well separated groups: calm and short, rainy same day, stormy and long.
    fn toy_dataset() -> (Vec<EncodedFeatureVector>, Vec<ClassLabel>) {
        let encoder = FeatureEncoder::new();
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for i in 0..10 {
            let offset = i as f64;
            features.push(encoder.encode(&event(WeatherCondition::Clear, DeliveryMode::Standard, 10.0 + offset)));
            labels.push(ClassLabel::OnTime);
            features.push(encoder.encode(&event(WeatherCondition::Rainy, DeliveryMode::SameDay, 200.0 + offset)));
            labels.push(ClassLabel::AtRisk);
            features.push(encoder.encode(&event(WeatherCondition::Stormy, DeliveryMode::TwoDay, 900.0 + offset)));
            labels.push(ClassLabel::Delayed);
        }
        (features, labels)
    }

    #[test]
    fn test_fit_separates_toy_classes() {
        let (features, labels) = toy_dataset();
        let mut model = SoftmaxRegression::default();
        model.fit(&features, &labels).unwrap();

        for (x, y) in features.iter().zip(&labels) {
            assert_eq!(model.predict(x.as_slice()).unwrap(), y.id());
        }
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let (features, labels) = toy_dataset();
        let mut model = SoftmaxRegression::default();
        model.fit(&features, &labels).unwrap();

        let probabilities = model.predict_proba(features[0].as_slice()).unwrap();
        assert_eq!(probabilities.len(), CLASS_COUNT);
        assert!((probabilities.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(probabilities.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_unfitted_model_refuses_to_predict() {
        let model = SoftmaxRegression::default();
        assert_eq!(model.input_width(), None);
        assert!(matches!(
            model.predict_proba(&[0.0; 45]),
            Err(DeliveryError::Inference(_))
        ));
    }

    #[test]
    fn test_width_mismatch() {
        let (features, labels) = toy_dataset();
        let mut model = SoftmaxRegression::default();
        model.fit(&features, &labels).unwrap();

        assert_eq!(model.input_width(), Some(45));
        assert!(matches!(
            model.predict_proba(&[0.0; 44]),
            Err(DeliveryError::SchemaMismatch { expected: 45, actual: 44, .. })
        ));
    }

    #[test]
    fn test_fit_rejects_bad_input() {
        let (features, labels) = toy_dataset();
        let mut model = SoftmaxRegression::default();
        assert!(model.fit(&[], &[]).is_err());
        assert!(model.fit(&features, &labels[1..]).is_err());
    }

    #[test]
    fn test_artifact_save_and_load() {
        let (features, labels) = toy_dataset();
        let mut model = SoftmaxRegression::new(0.1, 50, 0.0);
        model.fit(&features, &labels).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models").join("delivery_risk.json");
        model.save(&path).unwrap();

        let loaded = SoftmaxRegression::load(&path).unwrap();
        let expected = model.predict_proba(features[3].as_slice()).unwrap();
        let actual = loaded.predict_proba(features[3].as_slice()).unwrap();
        for (a, e) in actual.iter().zip(&expected) {
            assert!((a - e).abs() < 1e-9);
        }
    }

    #[test]
    fn test_load_rejects_unfitted_or_garbage_artifacts() {
        let dir = tempfile::tempdir().unwrap();

        let unfitted = dir.path().join("unfitted.json");
        SoftmaxRegression::default().save(&unfitted).unwrap();
        assert!(matches!(
            SoftmaxRegression::load(&unfitted),
            Err(DeliveryError::ModelUnavailable { .. })
        ));

        let garbage = dir.path().join("garbage.json");
        fs::write(&garbage, "not json").unwrap();
        assert!(matches!(
            SoftmaxRegression::load(&garbage),
            Err(DeliveryError::ModelUnavailable { .. })
        ));
    }
}
