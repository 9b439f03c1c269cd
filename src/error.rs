//! Error taxonomy for the delivery risk pipeline.
//!
//! Validation failures carry enough detail for the caller to fix the input.
//! Everything else is an internal failure that is logged and surfaced as an
//! opaque service error.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Input rejected at the request boundary, before it reaches the encoder.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Numeric field outside its declared interval
    #[error("{field} must be in {constraint}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        constraint: &'static str,
    },

    /// Categorical value outside the closed enumeration
    #[error("{field} has unknown value '{value}'")]
    UnknownCategory { field: &'static str, value: String },

    /// Cell that should hold a number but does not parse as one
    #[error("{field} is not a number: '{value}'")]
    InvalidNumber { field: &'static str, value: String },

    /// Upload without one or more required columns
    #[error("Missing columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    /// Payload that could not be decoded at all
    #[error("malformed input: {0}")]
    Malformed(String),
}

impl ValidationError {
    /// Name of the offending field, when the error is tied to one.
    pub fn field(&self) -> Option<&str> {
        match self {
            ValidationError::OutOfRange { field, .. }
            | ValidationError::UnknownCategory { field, .. }
            | ValidationError::InvalidNumber { field, .. } => Some(field),
            ValidationError::MissingColumns(_) | ValidationError::Malformed(_) => None,
        }
    }
}

/// Canonical error type for the crate.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Model artifact missing or unreadable
    #[error("model unavailable at {path}: {reason}")]
    ModelUnavailable { path: String, reason: String },

    /// Encoder output and loaded model disagree on the feature or class layout
    #[error("schema mismatch on {what}: expected {expected}, got {actual}")]
    SchemaMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("history store error: {0}")]
    History(String),

    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DeliveryError>;

impl DeliveryError {
    /// Errors that mean the service must not start (or keep) serving.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DeliveryError::ModelUnavailable { .. } | DeliveryError::SchemaMismatch { .. }
        )
    }

    /// Whether the caller caused this error by sending bad input.
    pub fn is_validation(&self) -> bool {
        matches!(self, DeliveryError::Validation(_))
    }

    /// Client-facing body. Internal structure is never exposed.
    pub fn public_reply(&self) -> ErrorReply {
        match self {
            DeliveryError::Validation(err) => ErrorReply {
                error: "validation_failed".to_string(),
                field: err.field().map(str::to_string),
                detail: Some(err.to_string()),
            },
            _ => ErrorReply::internal(),
        }
    }
}

/// Error body sent back to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReply {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ErrorReply {
    pub fn internal() -> Self {
        Self {
            error: "internal_error".to_string(),
            field: None,
            detail: None,
        }
    }
}
