//! Model artifact loader

use crate::error::{DeliveryError, Result};
use crate::models::classifier::Classifier;
use crate::models::onnx::OnnxClassifier;
use crate::models::softmax::SoftmaxRegression;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Artifact formats the service can serve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    /// ONNX graph, run through ONNX Runtime
    Onnx,
    /// JSON artifact written by `train_model`
    SoftmaxJson,
}

impl ModelFormat {
    /// Format implied by the file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "onnx" => Some(ModelFormat::Onnx),
            "json" => Some(ModelFormat::SoftmaxJson),
            _ => None,
        }
    }
}

/// Loader for classifier artifacts
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    /// Create a new model loader with the given ONNX thread count
    pub fn with_threads(onnx_threads: usize) -> Self {
        Self {
            onnx_threads: onnx_threads.max(1),
        }
    }

    /// Load the artifact at `path`, choosing the backend by extension
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<Arc<dyn Classifier>> {
        let path = path.as_ref();

        if !path.exists() {
            warn!(path = %path.display(), "Model file not found");
            return Err(DeliveryError::ModelUnavailable {
                path: path.display().to_string(),
                reason: "file not found".to_string(),
            });
        }

        let model: Arc<dyn Classifier> = match ModelFormat::from_path(path) {
            Some(ModelFormat::Onnx) => Arc::new(OnnxClassifier::load(path, self.onnx_threads)?),
            Some(ModelFormat::SoftmaxJson) => Arc::new(SoftmaxRegression::load(path)?),
            None => {
                return Err(DeliveryError::ModelUnavailable {
                    path: path.display().to_string(),
                    reason: "unsupported artifact extension (expected .onnx or .json)".to_string(),
                })
            }
        };

        info!(
            model = %model.name(),
            path = %path.display(),
            input_width = ?model.input_width(),
            "Classifier ready"
        );

        Ok(model)
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self { onnx_threads: 1 }
    }
}
