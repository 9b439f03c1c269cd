//! Offline model evaluation and the metrics report artifact

use crate::error::{DeliveryError, Result};
use crate::labels::{ClassLabel, CLASS_COUNT};
use crate::models::Classifier;
use crate::training::TrainingSet;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Rows are true classes, columns predicted classes
pub type ConfusionMatrix = [[usize; CLASS_COUNT]; CLASS_COUNT];

/// Headline scores reported per model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationScores {
    pub accuracy: f64,
    pub macro_f1: f64,
    pub weighted_f1: f64,
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

pub fn confusion_matrix(y_true: &[ClassLabel], y_pred: &[ClassLabel]) -> ConfusionMatrix {
    let mut matrix = [[0; CLASS_COUNT]; CLASS_COUNT];
    for (truth, predicted) in y_true.iter().zip(y_pred) {
        matrix[truth.id()][predicted.id()] += 1;
    }
    matrix
}

impl ClassificationScores {
    /// Accuracy plus macro and support-weighted F1.
    ///
    /// The macro average runs over classes present in either vector; a class
    /// with no true or predicted samples does not dilute it.
    pub fn compute(y_true: &[ClassLabel], y_pred: &[ClassLabel]) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(DeliveryError::Dataset(format!(
                "{} true labels but {} predictions",
                y_true.len(),
                y_pred.len()
            )));
        }
        if y_true.is_empty() {
            return Err(DeliveryError::Dataset("cannot score an empty evaluation set".to_string()));
        }

        Ok(Self::from_matrix(&confusion_matrix(y_true, y_pred)))
    }

    pub fn from_matrix(matrix: &ConfusionMatrix) -> Self {
        let total: usize = matrix.iter().flatten().sum();
        let correct: usize = (0..CLASS_COUNT).map(|c| matrix[c][c]).sum();

        let mut f1_sum = 0.0;
        let mut present = 0usize;
        let mut weighted = 0.0;

        for class in 0..CLASS_COUNT {
            let tp = matrix[class][class];
            let support: usize = matrix[class].iter().sum();
            let predicted: usize = matrix.iter().map(|row| row[class]).sum();
            if support == 0 && predicted == 0 {
                continue;
            }

            let fp = predicted - tp;
            let fn_ = support - tp;
            let f1 = if tp == 0 {
                0.0
            } else {
                2.0 * tp as f64 / (2 * tp + fp + fn_) as f64
            };

            present += 1;
            f1_sum += f1;
            weighted += f1 * support as f64;
        }

        let ratio = |n: f64, d: usize| if d == 0 { 0.0 } else { n / d as f64 };
        Self {
            accuracy: round4(ratio(correct as f64, total)),
            macro_f1: round4(ratio(f1_sum, present)),
            weighted_f1: round4(ratio(weighted, total)),
        }
    }
}

/// Result of scoring one model on a held-out set
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub scores: ClassificationScores,
    pub confusion: ConfusionMatrix,
}

/// Score a fitted model against a labelled set
pub fn evaluate(model: &dyn Classifier, set: &TrainingSet) -> Result<Evaluation> {
    let predictions = set
        .features
        .iter()
        .map(|features| {
            let id = model.predict(features.as_slice())?;
            ClassLabel::from_id(id).ok_or_else(|| {
                DeliveryError::Inference(format!("classifier returned unknown class id {id}"))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let scores = ClassificationScores::compute(&set.labels, &predictions)?;
    let confusion = confusion_matrix(&set.labels, &predictions);

    info!(
        model = %model.name(),
        rows = set.len(),
        accuracy = scores.accuracy,
        macro_f1 = scores.macro_f1,
        weighted_f1 = scores.weighted_f1,
        "Model evaluated"
    );

    Ok(Evaluation { scores, confusion })
}

/// One model row of the metrics report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub name: String,
    pub accuracy: f64,
    pub macro_f1: f64,
    pub weighted_f1: f64,
}

impl ModelMetrics {
    pub fn new(name: impl Into<String>, scores: ClassificationScores) -> Self {
        Self {
            name: name.into(),
            accuracy: scores.accuracy,
            macro_f1: scores.macro_f1,
            weighted_f1: scores.weighted_f1,
        }
    }
}

/// Offline evaluation results served by the `metrics_report` request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub models: Vec<ModelMetrics>,
    #[serde(default)]
    pub notes: String,
}

impl Default for MetricsReport {
    fn default() -> Self {
        let row = |name: &str, accuracy, macro_f1, weighted_f1| {
            ModelMetrics::new(
                name,
                ClassificationScores {
                    accuracy,
                    macro_f1,
                    weighted_f1,
                },
            )
        };
        Self {
            models: vec![
                row("RandomForestClassifier", 0.86, 0.84, 0.86),
                row("GradientBoostingClassifier", 0.82, 0.80, 0.82),
                row("XGBoost (Optional)", 0.88, 0.86, 0.88),
            ],
            notes: "Update model_metrics.json with your latest experiment outputs before final submission."
                .to_string(),
        }
    }
}

impl MetricsReport {
    /// Read the report artifact, or the built-in placeholder when it is absent.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(path = %path.display(), "Metrics report not found, serving defaults");
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
