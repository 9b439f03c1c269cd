//! Training dataset loading and splitting

use crate::error::{DeliveryError, Result, ValidationError};
use crate::feature_encoder::{EncodedFeatureVector, FeatureEncoder};
use crate::labels::{ClassLabel, CLASS_COUNT};
use crate::schema::RAW_COLUMNS;
use crate::upload::{canonical_event, CsvTable};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use tracing::{info, warn};

/// Target column of the delivery logistics export
pub const TARGET_COLUMN: &str = "Delivery_Status";
const TARGET_ALIAS: &str = "delivery_status";

pub const DEFAULT_TEST_FRACTION: f64 = 0.2;
pub const DEFAULT_SEED: u64 = 42;

/// Encoded features with their labels, row-aligned
#[derive(Debug, Clone, Default)]
pub struct TrainingSet {
    pub features: Vec<EncodedFeatureVector>,
    pub labels: Vec<ClassLabel>,
}

/// Row accounting from a dataset load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub rows_read: usize,
    pub incomplete: usize,
    pub duplicates: usize,
    pub invalid: usize,
}

impl TrainingSet {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn class_distribution(&self) -> [usize; CLASS_COUNT] {
        let mut counts = [0; CLASS_COUNT];
        for label in &self.labels {
            counts[label.id()] += 1;
        }
        counts
    }

    fn subset(&self, indices: &[usize]) -> Self {
        Self {
            features: indices.iter().map(|&i| self.features[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }

    /// Stratified train/test split, deterministic for a given seed.
    ///
    /// Each class contributes `round(n * test_fraction)` rows to the test set,
    /// keeping at least one training row per class when the class has two or more.
    pub fn stratified_split(&self, test_fraction: f64, seed: u64) -> Result<(Self, Self)> {
        if !(0.0..1.0).contains(&test_fraction) {
            return Err(DeliveryError::Dataset(format!(
                "test fraction must be in [0, 1), got {test_fraction}"
            )));
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut train = Vec::new();
        let mut test = Vec::new();

        for class in ClassLabel::ALL {
            let mut indices: Vec<usize> = (0..self.len())
                .filter(|&i| self.labels[i] == class)
                .collect();
            indices.shuffle(&mut rng);

            let mut n_test = (indices.len() as f64 * test_fraction).round() as usize;
            if indices.len() > 1 {
                n_test = n_test.min(indices.len() - 1);
            } else {
                n_test = 0;
            }

            test.extend_from_slice(&indices[..n_test]);
            train.extend_from_slice(&indices[n_test..]);
        }

        train.shuffle(&mut rng);
        test.shuffle(&mut rng);

        Ok((self.subset(&train), self.subset(&test)))
    }
}

/// Load and encode a delivery logistics CSV.
///
/// Incomplete and duplicate rows are dropped, then rows that fail parsing
/// or range validation are skipped.
pub fn load_dataset<P: AsRef<Path>>(path: P, encoder: &FeatureEncoder) -> Result<(TrainingSet, LoadStats)> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| DeliveryError::Dataset(format!("cannot open {}: {e}", path.display())))?;
    let table = CsvTable::from_reader(file)?;

    let target = if table.has_column(TARGET_COLUMN) {
        TARGET_COLUMN
    } else if table.has_column(TARGET_ALIAS) {
        TARGET_ALIAS
    } else {
        return Err(ValidationError::MissingColumns(vec![TARGET_COLUMN.to_string()]).into());
    };
    table.require(&RAW_COLUMNS)?;

    let mut required: Vec<&str> = RAW_COLUMNS.to_vec();
    required.push(target);

    let mut stats = LoadStats::default();
    let mut seen = HashSet::new();
    let mut set = TrainingSet::default();

    for row in table.rows() {
        stats.rows_read += 1;

        let cells: Vec<&str> = required.iter().map(|c| table.cell(row, c)).collect();
        if cells.iter().any(|c| c.is_empty()) {
            stats.incomplete += 1;
            continue;
        }
        if !seen.insert(cells.join("\u{1f}")) {
            stats.duplicates += 1;
            continue;
        }

        match canonical_event(&table, row) {
            Ok(event) => {
                set.features.push(encoder.encode(&event));
                set.labels.push(ClassLabel::from_delivery_status(table.cell(row, target)));
            }
            Err(err) => {
                stats.invalid += 1;
                warn!(row = stats.rows_read, error = %err, "Skipping invalid training row");
            }
        }
    }

    if set.is_empty() {
        return Err(DeliveryError::Dataset(format!(
            "no usable rows in {}",
            path.display()
        )));
    }

    info!(
        path = %path.display(),
        rows = set.len(),
        dropped_incomplete = stats.incomplete,
        dropped_duplicates = stats.duplicates,
        skipped_invalid = stats.invalid,
        distribution = ?set.class_distribution(),
        "Training dataset loaded"
    );

    Ok((set, stats))
}
