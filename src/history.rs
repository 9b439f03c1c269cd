//! Prediction history store

use crate::error::{DeliveryError, Result};
use crate::types::PredictionResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// A prediction about to be recorded
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub username: String,
    pub request_payload: serde_json::Value,
    pub prediction_label: String,
    pub prediction_id: usize,
    pub confidence: f64,
}

impl HistoryEntry {
    pub fn new(
        username: impl Into<String>,
        request_payload: serde_json::Value,
        result: &PredictionResult,
    ) -> Self {
        Self {
            username: username.into(),
            request_payload,
            prediction_label: result.predicted_label.label().to_string(),
            prediction_id: result.predicted_class_id,
            confidence: result.confidence,
        }
    }
}

/// A stored prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: u64,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub request_payload: serde_json::Value,
    pub prediction_label: String,
    pub prediction_id: usize,
    pub confidence: f64,
}

/// Append-only store of served predictions
pub trait HistoryStore: Send + Sync {
    /// Persist an entry, assigning its id and timestamp
    fn insert(&self, entry: HistoryEntry) -> Result<HistoryRecord>;

    /// Up to `limit` most recent records, newest first
    fn recent(&self, limit: usize) -> Result<Vec<HistoryRecord>>;
}

struct JsonlState {
    next_id: u64,
    file: File,
    /// Everything on disk, ascending by id
    records: Vec<HistoryRecord>,
}

/// History kept as one JSON object per line
pub struct JsonlHistoryStore {
    path: PathBuf,
    state: Mutex<JsonlState>,
}

impl JsonlHistoryStore {
    /// Open (or create) the history file, resuming ids after the last record
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut records = read_records(&path)?;
        records.sort_by_key(|r| r.id);
        let next_id = records.last().map_or(0, |r| r.id) + 1;

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        info!(path = %path.display(), records = records.len(), "History store opened");

        Ok(Self {
            path,
            state: Mutex::new(JsonlState {
                next_id,
                file,
                records,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_records(path: &Path) -> Result<Vec<HistoryRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<HistoryRecord>(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!(path = %path.display(), line = index + 1, error = %e, "Skipping corrupt history line")
            }
        }
    }
    Ok(records)
}

impl HistoryStore for JsonlHistoryStore {
    fn insert(&self, entry: HistoryEntry) -> Result<HistoryRecord> {
        let mut state = self
            .state
            .lock()
            .map_err(|e| DeliveryError::History(format!("lock poisoned: {e}")))?;

        let record = HistoryRecord {
            id: state.next_id,
            username: entry.username,
            created_at: Utc::now(),
            request_payload: entry.request_payload,
            prediction_label: entry.prediction_label,
            prediction_id: entry.prediction_id,
            confidence: entry.confidence,
        };

        let mut line = serde_json::to_string(&record)?;
        line.push('\n');
        state
            .file
            .write_all(line.as_bytes())
            .and_then(|_| state.file.flush())
            .map_err(|e| DeliveryError::History(e.to_string()))?;
        state.next_id += 1;
        state.records.push(record.clone());

        debug!(id = record.id, username = %record.username, "History record written");
        Ok(record)
    }

    fn recent(&self, limit: usize) -> Result<Vec<HistoryRecord>> {
        let state = self
            .state
            .lock()
            .map_err(|e| DeliveryError::History(format!("lock poisoned: {e}")))?;

        Ok(state.records.iter().rev().take(limit).cloned().collect())
    }
}
