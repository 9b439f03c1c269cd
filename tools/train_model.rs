//! Offline Trainer
//!
//! Fits the softmax model on a delivery logistics CSV and writes the model
//! and metrics artifacts consumed by the service.
//!
//! Usage: train_model <dataset.csv> [model.json] [model_metrics.json]

use anyhow::{Context, Result};
use delivery_risk_pipeline::evaluation::{evaluate, MetricsReport, ModelMetrics};
use delivery_risk_pipeline::feature_encoder::FeatureEncoder;
use delivery_risk_pipeline::labels::ClassLabel;
use delivery_risk_pipeline::models::{Classifier, SoftmaxRegression, Trainable};
use delivery_risk_pipeline::training::{load_dataset, DEFAULT_SEED, DEFAULT_TEST_FRACTION};
use tracing::info;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("train_model=info".parse()?)
                .add_directive("delivery_risk_pipeline=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let dataset = args
        .get(1)
        .context("usage: train_model <dataset.csv> [model.json] [model_metrics.json]")?;
    let model_path = args.get(2).map(|s| s.as_str()).unwrap_or("models/delivery_risk.json");
    let metrics_path = args
        .get(3)
        .map(|s| s.as_str())
        .unwrap_or("reports/model_metrics.json");

    let encoder = FeatureEncoder::new();
    let (set, stats) = load_dataset(dataset, &encoder)
        .with_context(|| format!("Failed to load dataset {dataset}"))?;
    info!(
        rows = set.len(),
        dropped = stats.incomplete + stats.duplicates + stats.invalid,
        "Dataset ready"
    );

    let (train, test) = set.stratified_split(DEFAULT_TEST_FRACTION, DEFAULT_SEED)?;
    info!(train = train.len(), test = test.len(), "Stratified split");

    let mut model = SoftmaxRegression::default();
    model.fit(&train.features, &train.labels)?;

    let evaluation = evaluate(&model, if test.is_empty() { &train } else { &test })?;
    for class in ClassLabel::ALL {
        info!(
            class = %class,
            confusion = ?evaluation.confusion[class.id()],
            "Confusion matrix row"
        );
    }

    model
        .save(model_path)
        .with_context(|| format!("Failed to write model to {model_path}"))?;
    info!(path = %model_path, "Model artifact written");

    let report = MetricsReport {
        models: vec![ModelMetrics::new(model.name(), evaluation.scores)],
        notes: format!(
            "Generated by train_model from {dataset} (test fraction {DEFAULT_TEST_FRACTION}, seed {DEFAULT_SEED})"
        ),
    };
    report
        .save(metrics_path)
        .with_context(|| format!("Failed to write metrics to {metrics_path}"))?;
    info!(
        path = %metrics_path,
        accuracy = evaluation.scores.accuracy,
        macro_f1 = evaluation.scores.macro_f1,
        weighted_f1 = evaluation.scores.weighted_f1,
        "Metrics report written"
    );

    Ok(())
}
