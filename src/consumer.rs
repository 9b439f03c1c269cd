//! NATS subscription for incoming prediction requests

use anyhow::{Context, Result};
use async_nats::{Client, Subscriber};
use tracing::info;

/// Joins the request subject as a member of the service queue group.
///
/// Replicas sharing a group split the request stream between them.
pub struct RequestConsumer {
    client: Client,
    subject: String,
    queue_group: String,
}

impl RequestConsumer {
    pub fn new(client: Client, subject: &str, queue_group: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
            queue_group: queue_group.to_string(),
        }
    }

    pub async fn subscribe(&self) -> Result<Subscriber> {
        let subscriber = self
            .client
            .queue_subscribe(self.subject.clone(), self.queue_group.clone())
            .await
            .with_context(|| format!("Failed to subscribe to {}", self.subject))?;
        info!(
            subject = %self.subject,
            queue_group = %self.queue_group,
            "Subscribed to request subject"
        );
        Ok(subscriber)
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn queue_group(&self) -> &str {
        &self.queue_group
    }
}
