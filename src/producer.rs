//! NATS publisher for predictions and replies

use crate::service::ServiceResponse;
use crate::types::PredictionEvent;
use anyhow::Result;
use async_nats::{Client, Subject};
use tracing::debug;

/// Publishes prediction events and request replies
#[derive(Clone)]
pub struct PredictionProducer {
    client: Client,
    subject: String,
}

impl PredictionProducer {
    /// Create a new producer for the prediction subject
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Announce a served prediction
    pub async fn publish(&self, event: &PredictionEvent) -> Result<()> {
        let payload = serde_json::to_vec(event)?;

        self.client
            .publish(self.subject.clone(), payload.into())
            .await?;

        debug!(
            event_id = %event.event_id,
            request_id = %event.request_id,
            label = %event.result.predicted_label,
            confidence = event.result.confidence,
            "Published prediction"
        );

        Ok(())
    }

    /// Answer a request on its reply subject
    pub async fn reply(&self, reply_to: Subject, response: &ServiceResponse) -> Result<()> {
        let payload = serde_json::to_vec(response)?;
        self.client.publish(reply_to.clone(), payload.into()).await?;
        debug!(reply_to = %reply_to, "Reply sent");
        Ok(())
    }

    /// Get the subject name
    pub fn subject(&self) -> &str {
        &self.subject
    }
}
