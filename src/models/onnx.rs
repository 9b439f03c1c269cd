//! ONNX Runtime classifier backend

use crate::error::{DeliveryError, Result};
use crate::models::classifier::Classifier;
use anyhow::Context;
use ort::memory::Allocator;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType, Tensor};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Classifier exported to ONNX (e.g. a scikit-learn forest through skl2onnx)
pub struct OnnxClassifier {
    /// Model name, taken from the artifact file stem
    name: String,
    /// ONNX Runtime session; running it needs exclusive access
    session: Mutex<Session>,
    /// Input name for the model
    input_name: String,
    /// Output name for probabilities
    output_name: String,
    /// Feature width from the input signature, when static
    input_width: Option<usize>,
}

impl OnnxClassifier {
    /// Load a model file. Any failure is reported as an unavailable model.
    pub fn load<P: AsRef<Path>>(path: P, onnx_threads: usize) -> Result<Self> {
        let path = path.as_ref();
        Self::open(path, onnx_threads).map_err(|e| DeliveryError::ModelUnavailable {
            path: path.display().to_string(),
            reason: format!("{e:#}"),
        })
    }

    fn open(path: &Path, onnx_threads: usize) -> anyhow::Result<Self> {
        ort::init().commit()?;

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "onnx".to_string());

        info!(model = %name, path = %path.display(), threads = onnx_threads, "Loading ONNX model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(onnx_threads)?
            .commit_from_file(path)
            .with_context(|| format!("Failed to load model from {}", path.display()))?;

        let input = session
            .inputs
            .first()
            .context("model declares no inputs")?;
        let input_name = input.name.clone();
        let input_width = input
            .input_type
            .tensor_shape()
            .and_then(|shape| shape.iter().last().copied())
            .filter(|&dim| dim > 0)
            .map(|dim| dim as usize);

        // skl2onnx emits "output_label" before "output_probability"
        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob"))
            .or_else(|| session.outputs.last())
            .map(|o| o.name.clone())
            .unwrap_or_else(|| "probabilities".to_string());

        info!(
            model = %name,
            input = %input_name,
            output = %output_name,
            input_width = ?input_width,
            "Model loaded successfully"
        );

        Ok(Self {
            name,
            session: Mutex::new(session),
            input_name,
            output_name,
            input_width,
        })
    }

    fn run(&self, features: &[f64]) -> anyhow::Result<Vec<f64>> {
        let input: Vec<f32> = features.iter().map(|&v| v as f32).collect();

        // Prepare input tensor - shape [1, num_features]
        let shape = vec![1_i64, input.len() as i64];
        let input_tensor =
            Tensor::from_array((shape, input)).context("Failed to create input tensor")?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        let outputs = session.run(ort::inputs![&self.input_name => input_tensor])?;

        self.extract_probabilities(&outputs)
    }

    /// Handles both tensor outputs (zipmap disabled) and seq(map) outputs
    fn extract_probabilities(&self, outputs: &ort::session::SessionOutputs) -> anyhow::Result<Vec<f64>> {
        if let Some(output) = outputs.get(&self.output_name) {
            let dtype = output.dtype();

            if let Ok(tensor) = output.try_extract_tensor::<f32>() {
                let (shape, data) = tensor;
                let dims: Vec<i64> = shape.iter().copied().collect();
                return probabilities_from_tensor(&dims, data);
            }

            if DynSequenceValueType::can_downcast(&dtype) {
                if let Ok(probabilities) = self.extract_from_sequence_map(output) {
                    return Ok(probabilities);
                }
            }
        }

        // Fallback: first non-label output that yields probabilities
        for (name, output) in outputs.iter() {
            if name.contains("label") {
                continue;
            }

            let dtype = output.dtype();

            if let Ok(tensor) = output.try_extract_tensor::<f32>() {
                let (shape, data) = tensor;
                let dims: Vec<i64> = shape.iter().copied().collect();
                debug!(model = %self.name, output = %name, "Extracted from tensor (fallback)");
                return probabilities_from_tensor(&dims, data);
            }

            if DynSequenceValueType::can_downcast(&dtype) {
                if let Ok(probabilities) = self.extract_from_sequence_map(&output) {
                    return Ok(probabilities);
                }
            }
        }

        warn!(model = %self.name, "No probability output found");
        anyhow::bail!("model produced no probability output")
    }

    /// Extract class probabilities from seq(map(int64, float))
    fn extract_from_sequence_map(&self, output: &ort::value::DynValue) -> anyhow::Result<Vec<f64>> {
        let allocator = Allocator::default();

        let sequence = output
            .downcast_ref::<DynSequenceValueType>()
            .map_err(|e| anyhow::anyhow!("Failed to downcast to sequence: {}", e))?;

        let maps = sequence.try_extract_sequence::<DynMapValueType>(&allocator)?;
        let map_value = maps.first().context("Empty sequence")?;

        // Batch size is always 1
        let kv_pairs = map_value.try_extract_key_values::<i64, f32>()?;
        let probabilities = probabilities_from_pairs(&kv_pairs)?;

        debug!(model = %self.name, probabilities = ?probabilities, "Extracted from seq(map)");
        Ok(probabilities)
    }
}

/// Probability row of a `[1, classes]` or `[classes]` tensor.
fn probabilities_from_tensor(dims: &[i64], data: &[f32]) -> anyhow::Result<Vec<f64>> {
    let classes = match dims {
        [1, classes] | [classes] => *classes as usize,
        _ => anyhow::bail!("unexpected probability tensor shape {:?}", dims),
    };
    if data.len() < classes {
        anyhow::bail!("probability tensor has {} values, expected {}", data.len(), classes);
    }
    Ok(data[..classes].iter().map(|&p| p as f64).collect())
}

/// Dense probability vector from (class id, probability) pairs.
fn probabilities_from_pairs(pairs: &[(i64, f32)]) -> anyhow::Result<Vec<f64>> {
    if pairs.is_empty() {
        anyhow::bail!("No probability found in map");
    }
    if let Some((class_id, _)) = pairs.iter().find(|(class_id, _)| *class_id < 0) {
        anyhow::bail!("negative class id {} in probability map", class_id);
    }

    let classes = pairs.iter().map(|(class_id, _)| *class_id as usize + 1).max().unwrap_or(0);
    let mut probabilities = vec![0.0; classes];
    for &(class_id, probability) in pairs {
        probabilities[class_id as usize] = probability as f64;
    }
    Ok(probabilities)
}

impl Classifier for OnnxClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_width(&self) -> Option<usize> {
        self.input_width
    }

    fn predict_proba(&self, features: &[f64]) -> Result<Vec<f64>> {
        self.run(features)
            .map_err(|e| DeliveryError::Inference(format!("{}: {e:#}", self.name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probabilities_from_batched_tensor() {
        let probabilities = probabilities_from_tensor(&[1, 3], &[0.1, 0.6, 0.3]).unwrap();
        assert_eq!(probabilities.len(), 3);
        assert!((probabilities[1] - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_probabilities_from_flat_tensor() {
        let probabilities = probabilities_from_tensor(&[3], &[0.2, 0.2, 0.6]).unwrap();
        assert!((probabilities[2] - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_rejects_unexpected_tensor_shape() {
        assert!(probabilities_from_tensor(&[2, 3], &[0.0; 6]).is_err());
        assert!(probabilities_from_tensor(&[1, 3], &[0.5, 0.5]).is_err());
    }

    #[test]
    fn test_probabilities_from_unordered_pairs() {
        let probabilities = probabilities_from_pairs(&[(2, 0.5), (0, 0.25), (1, 0.25)]).unwrap();
        assert_eq!(probabilities, vec![0.25, 0.25, 0.5]);
    }

    #[test]
    fn test_pairs_with_missing_class() {
        let probabilities = probabilities_from_pairs(&[(0, 0.4), (2, 0.6)]).unwrap();
        assert_eq!(probabilities.len(), 3);
        assert_eq!(probabilities[1], 0.0);
        assert!(probabilities_from_pairs(&[]).is_err());
        assert!(probabilities_from_pairs(&[(-1, 1.0)]).is_err());
    }
}
