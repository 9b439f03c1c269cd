//! Delivery Risk Pipeline - Main Entry Point
//!
//! Consumes prediction requests from NATS, classifies deliveries and replies,
//! publishing every single prediction on the outbound subject.

use anyhow::{Context, Result};
use delivery_risk_pipeline::{
    config::AppConfig,
    consumer::RequestConsumer,
    context::AppContext,
    metrics::MetricsReporter,
    producer::PredictionProducer,
    service::RequestHandler,
};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tracing::{error, info, warn};

fn init_tracing(config: &AppConfig) -> Result<()> {
    let filter = config.logging.env_filter()?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    init_tracing(&config)?;

    info!("Starting Delivery Risk Pipeline");
    info!(
        model = %config.model.path,
        history = %config.history.path,
        workers = config.service.workers,
        "Configuration loaded successfully"
    );

    // Model load failures are fatal: never serve without a classifier
    let ctx = AppContext::initialize(config.clone()).context("Failed to initialize application context")?;
    let metrics = ctx.metrics.clone();
    let handler = RequestHandler::new(ctx);

    let client = async_nats::connect(&config.nats.url)
        .await
        .with_context(|| format!("Failed to connect to NATS at {}", config.nats.url))?;
    info!("Connected to NATS at {}", config.nats.url);

    let consumer = RequestConsumer::new(
        client.clone(),
        &config.nats.request_subject,
        &config.nats.queue_group,
    );
    let producer = Arc::new(PredictionProducer::new(client.clone(), &config.nats.prediction_subject));

    info!(
        request_subject = %consumer.subject(),
        queue_group = %consumer.queue_group(),
        prediction_subject = %producer.subject(),
        "Starting request loop with {} parallel workers",
        config.service.workers
    );

    let semaphore = Arc::new(Semaphore::new(config.service.workers.max(1)));

    let reporter = MetricsReporter::new(metrics.clone(), config.metrics.report_interval_secs);
    tokio::spawn(reporter.start());

    let mut subscription = consumer.subscribe().await?;
    let (fatal_tx, mut fatal_rx) = mpsc::channel::<String>(1);
    let mut fatal = None;

    loop {
        let message = tokio::select! {
            message = subscription.next() => match message {
                Some(message) => message,
                None => break,
            },
            Some(request_id) = fatal_rx.recv() => {
                fatal = Some(request_id);
                break;
            }
        };

        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .context("Worker semaphore closed")?;

        let handler = handler.clone();
        let producer = producer.clone();
        let fatal_tx = fatal_tx.clone();

        tokio::spawn(async move {
            // Inference and history writes block
            let payload = message.payload.clone();
            let handled = match tokio::task::spawn_blocking(move || handler.handle_payload(&payload)).await {
                Ok(handled) => handled,
                Err(e) => {
                    error!(error = %e, "Request handler panicked");
                    return;
                }
            };

            if let Some(reply_to) = message.reply {
                if let Err(e) = producer.reply(reply_to, &handled.response).await {
                    error!(request_id = %handled.request_id, error = %e, "Failed to send reply");
                }
            }

            if let Some(event) = &handled.published {
                if let Err(e) = producer.publish(event).await {
                    error!(request_id = %handled.request_id, error = %e, "Failed to publish prediction");
                }
            }

            if handled.fatal {
                let _ = fatal_tx.try_send(handled.request_id.clone());
            }

            drop(permit);
        });
    }

    if let Err(e) = subscription.unsubscribe().await {
        warn!(error = %e, "Failed to unsubscribe from request subject");
    }

    info!("Pipeline shutting down...");
    metrics.print_summary();

    if let Some(request_id) = fatal {
        anyhow::bail!("Model does not fit the feature schema (first seen on request {request_id})");
    }

    Ok(())
}
