//! Classifier contract consumed by the inference service

use crate::error::Result;
use crate::feature_encoder::EncodedFeatureVector;
use crate::labels::ClassLabel;

/// A fitted multi-class classifier over encoded feature vectors.
///
/// Implementations are shared read-only between concurrent requests; any
/// internal state a backend needs while predicting must be synchronized
/// inside the implementation.
pub trait Classifier: Send + Sync {
    /// Short name used in logs and reports
    fn name(&self) -> &str;

    /// Input width declared by the artifact, if it declares one
    fn input_width(&self) -> Option<usize>;

    /// Per-class probabilities indexed by class id
    fn predict_proba(&self, features: &[f64]) -> Result<Vec<f64>>;

    /// Most likely class id. Ties resolve to the lowest id.
    fn predict(&self, features: &[f64]) -> Result<usize> {
        let probabilities = self.predict_proba(features)?;
        Ok(argmax(&probabilities))
    }
}

/// A classifier that can be fitted offline.
pub trait Trainable: Classifier {
    fn fit(&mut self, features: &[EncodedFeatureVector], labels: &[ClassLabel]) -> Result<()>;
}

pub(crate) fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(best, best_value), (index, &value)| {
            if value > best_value {
                (index, value)
            } else {
                (best, best_value)
            }
        })
        .0
}
