//! Request dispatch, independent of the transport

use crate::context::AppContext;
use crate::error::{DeliveryError, ErrorReply, Result, ValidationError};
use crate::evaluation::MetricsReport;
use crate::history::{HistoryEntry, HistoryRecord, HistoryStore};
use crate::types::{PredictionEvent, PredictionResult, RequestEnvelope, ServiceRequest};
use crate::upload::{self, BatchOutcome, UploadSummary};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Reply body, tagged by `kind`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ServiceResponse {
    Prediction(PredictionResult),
    Batch(BatchOutcome),
    Upload(UploadSummary),
    History { items: Vec<HistoryRecord> },
    MetricsReport(MetricsReport),
    Error(ErrorReply),
}

/// Outcome of one request
#[derive(Debug)]
pub struct HandledRequest {
    pub request_id: String,
    pub response: ServiceResponse,
    /// Single predictions are also announced downstream
    pub published: Option<PredictionEvent>,
    /// The loaded model cannot serve this schema; the process must stop
    pub fatal: bool,
}

/// Serves requests against a shared [`AppContext`]
#[derive(Clone)]
pub struct RequestHandler {
    ctx: AppContext,
}

impl RequestHandler {
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    /// Decode a raw message and handle it. Undecodable payloads get a validation reply.
    pub fn handle_payload(&self, payload: &[u8]) -> HandledRequest {
        match serde_json::from_slice::<RequestEnvelope>(payload) {
            Ok(envelope) => self.handle(envelope),
            Err(e) => {
                warn!(error = %e, "Failed to deserialize request");
                self.ctx.metrics.record_validation_rejection();
                let err = DeliveryError::from(ValidationError::Malformed(e.to_string()));
                HandledRequest {
                    request_id: uuid::Uuid::new_v4().to_string(),
                    response: ServiceResponse::Error(err.public_reply()),
                    published: None,
                    fatal: false,
                }
            }
        }
    }

    pub fn handle(&self, envelope: RequestEnvelope) -> HandledRequest {
        let start_time = Instant::now();
        let request_id = envelope
            .request_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let kind = envelope.request.kind();

        let mut fatal = false;
        let (response, published) =
            match self.dispatch(&request_id, &envelope.username, envelope.request) {
                Ok(handled) => handled,
                Err(err) => {
                    if err.is_validation() {
                        self.ctx.metrics.record_validation_rejection();
                        warn!(request_id = %request_id, kind, error = %err, "Request rejected");
                    } else if err.is_fatal() {
                        fatal = true;
                        self.ctx.metrics.record_internal_failure();
                        error!(
                            request_id = %request_id,
                            kind,
                            model = %self.ctx.inference.model_name(),
                            error = %err,
                            "Model does not fit the feature schema, stopping service"
                        );
                    } else {
                        self.ctx.metrics.record_internal_failure();
                        error!(request_id = %request_id, kind, error = %err, "Request failed");
                    }
                    (ServiceResponse::Error(err.public_reply()), None)
                }
            };

        let processing_time = start_time.elapsed();
        self.ctx.metrics.record_request(kind, processing_time);
        debug!(
            request_id = %request_id,
            kind,
            processing_time_us = processing_time.as_micros() as u64,
            "Request handled"
        );

        HandledRequest {
            request_id,
            response,
            published,
            fatal,
        }
    }

    fn dispatch(
        &self,
        request_id: &str,
        username: &str,
        request: ServiceRequest,
    ) -> Result<(ServiceResponse, Option<PredictionEvent>)> {
        match request {
            ServiceRequest::Predict { event } => {
                let result = self.ctx.inference.predict(&event)?;
                self.record(username, serde_json::to_value(&event)?, &result);
                let published = self.announce(request_id, username, &result);
                Ok((ServiceResponse::Prediction(result), Some(published)))
            }
            ServiceRequest::PredictLive { input } => {
                let event = upload::adapt(&input);
                let result = self.ctx.inference.predict(&event)?;
                self.record(username, serde_json::to_value(&input)?, &result);
                let published = self.announce(request_id, username, &result);
                Ok((ServiceResponse::Prediction(result), Some(published)))
            }
            ServiceRequest::PredictBatch { csv } => {
                let outcome = upload::predict_canonical_csv(&self.ctx.inference, &csv)?;
                for row in &outcome.results {
                    self.record(username, serde_json::to_value(&row.event)?, &row.prediction);
                }
                for _ in &outcome.rejected {
                    self.ctx.metrics.record_validation_rejection();
                }
                info!(
                    request_id = %request_id,
                    classified = outcome.count,
                    rejected = outcome.rejected.len(),
                    "Batch served"
                );
                Ok((ServiceResponse::Batch(outcome), None))
            }
            ServiceRequest::UploadSummary { csv } => {
                let summary = upload::summarize_upload(&self.ctx.inference, &csv)?;
                Ok((ServiceResponse::Upload(summary), None))
            }
            ServiceRequest::History { limit } => {
                let limit = limit.unwrap_or(self.ctx.config.history.default_limit);
                let items = self.ctx.history.recent(limit)?;
                Ok((ServiceResponse::History { items }, None))
            }
            ServiceRequest::MetricsReport => {
                let report = MetricsReport::load_or_default(&self.ctx.config.metrics.report_path)?;
                Ok((ServiceResponse::MetricsReport(report), None))
            }
        }
    }

    fn announce(&self, request_id: &str, username: &str, result: &PredictionResult) -> PredictionEvent {
        PredictionEvent::new(request_id.to_string(), username.to_string(), result.clone())
    }

    /// Count the prediction and append it to history.
    ///
    /// A history write failure is logged; the prediction is still returned.
    fn record(&self, username: &str, payload: serde_json::Value, result: &PredictionResult) {
        self.ctx
            .metrics
            .record_prediction(result.predicted_label, result.confidence);

        if let Err(e) = self
            .ctx
            .history
            .insert(HistoryEntry::new(username, payload, result))
        {
            self.ctx.metrics.record_internal_failure();
            error!(username = %username, error = %e, "Failed to write prediction history");
        }
    }
}
