//! Delivery Risk Pipeline Library
//!
//! Classifies deliveries as On-Time, At Risk or Delayed from a handful of
//! raw shipment attributes, using a model trained offline on the same
//! feature layout.

pub mod config;
pub mod consumer;
pub mod context;
pub mod error;
pub mod evaluation;
pub mod feature_encoder;
pub mod history;
pub mod inference;
pub mod labels;
pub mod metrics;
pub mod models;
pub mod producer;
pub mod schema;
pub mod service;
pub mod training;
pub mod types;
pub mod upload;

pub use config::AppConfig;
pub use context::AppContext;
pub use error::{DeliveryError, Result, ValidationError};
pub use feature_encoder::{EncodedFeatureVector, FeatureEncoder};
pub use inference::InferenceService;
pub use labels::ClassLabel;
pub use service::{RequestHandler, ServiceResponse};
pub use types::{PredictionResult, RawDeliveryEvent};
