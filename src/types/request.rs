//! Request envelope accepted on the request subject

use crate::types::business::BusinessInput;
use crate::types::event::RawDeliveryEvent;
use serde::{Deserialize, Serialize};

/// Username recorded when the caller does not identify itself.
pub const ANONYMOUS_USER: &str = "anonymous";

fn anonymous() -> String {
    ANONYMOUS_USER.to_string()
}

/// Incoming request with caller metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Caller-supplied correlation id; generated when absent
    #[serde(default)]
    pub request_id: Option<String>,

    /// Caller identity recorded in the prediction history
    #[serde(default = "anonymous")]
    pub username: String,

    #[serde(flatten)]
    pub request: ServiceRequest,
}

impl RequestEnvelope {
    pub fn new(request: ServiceRequest) -> Self {
        Self {
            request_id: None,
            username: anonymous(),
            request,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

/// Operation requested by the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ServiceRequest {
    /// Classify one event in the canonical schema
    Predict { event: RawDeliveryEvent },
    /// Classify one business-form input
    PredictLive { input: BusinessInput },
    /// Classify every row of a canonical-schema CSV
    PredictBatch { csv: String },
    /// Summarize a business-schema CSV upload
    UploadSummary { csv: String },
    /// Most recent prediction history entries
    History {
        #[serde(default)]
        limit: Option<usize>,
    },
    /// Offline model evaluation report
    MetricsReport,
}

impl ServiceRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceRequest::Predict { .. } => "predict",
            ServiceRequest::PredictLive { .. } => "predict_live",
            ServiceRequest::PredictBatch { .. } => "predict_batch",
            ServiceRequest::UploadSummary { .. } => "upload_summary",
            ServiceRequest::History { .. } => "history",
            ServiceRequest::MetricsReport => "metrics_report",
        }
    }
}
