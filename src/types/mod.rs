//! Type definitions for the delivery risk pipeline

pub mod business;
pub mod event;
pub mod prediction;
pub mod request;

pub use business::BusinessInput;
pub use event::RawDeliveryEvent;
pub use prediction::{ClassProbabilities, LabelCounts, PredictionEvent, PredictionResult};
pub use request::{RequestEnvelope, ServiceRequest};
