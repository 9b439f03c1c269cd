//! Configuration management for the delivery risk pipeline

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Environment variable naming an alternative config file
pub const CONFIG_PATH_ENV: &str = "DELIVERY_RISK_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/config.toml";
const ENV_PREFIX: &str = "DELIVERY_RISK";

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub nats: NatsConfig,
    pub model: ModelConfig,
    pub history: HistoryConfig,
    pub metrics: MetricsConfig,
    pub service: ServiceConfig,
    pub logging: LoggingConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject for incoming requests
    pub request_subject: String,
    /// Subject for published predictions
    pub prediction_subject: String,
    /// Queue group shared by service replicas, so each request is served once
    #[serde(default = "default_queue_group")]
    pub queue_group: String,
}

fn default_queue_group() -> String {
    "delivery-risk-workers".to_string()
}

/// Classifier artifact configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Model artifact, `.onnx` or `.json`
    pub path: String,
    /// Number of threads for ONNX inference (default: 1)
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
}

fn default_onnx_threads() -> usize {
    1
}

/// Prediction history configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    /// JSON-lines history file
    pub path: String,
    /// Records returned when a history request names no limit
    #[serde(default = "default_history_limit")]
    pub default_limit: usize,
}

fn default_history_limit() -> usize {
    100
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Offline evaluation report served by `metrics_report`
    pub report_path: String,
    /// Seconds between runtime metric summaries
    #[serde(default = "default_report_interval")]
    pub report_interval_secs: u64,
}

fn default_report_interval() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Maximum requests handled concurrently
    pub workers: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl LoggingConfig {
    /// Subscriber filter: `RUST_LOG` when set, otherwise `level` for every target
    pub fn env_filter(&self) -> Result<EnvFilter> {
        match std::env::var(EnvFilter::DEFAULT_ENV) {
            Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(&directives)
                .with_context(|| format!("Invalid {} directives {directives:?}", EnvFilter::DEFAULT_ENV)),
            _ => self.level_filter(),
        }
    }

    /// Filter built from the configured level alone
    pub fn level_filter(&self) -> Result<EnvFilter> {
        EnvFilter::try_new(&self.level)
            .with_context(|| format!("Invalid logging level {:?}", self.level))
    }
}

impl AppConfig {
    /// Load configuration from `DELIVERY_RISK_CONFIG` or the default path
    pub fn load() -> Result<Self> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from_path(path)
    }

    /// Load configuration from a specific path, then apply environment overrides
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let config = Config::builder()
            .add_source(File::from(path))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .with_context(|| format!("Failed to build configuration from {}", path.display()))?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            nats: NatsConfig {
                url: "nats://localhost:4222".to_string(),
                request_subject: "delivery.requests".to_string(),
                prediction_subject: "delivery.predictions".to_string(),
                queue_group: default_queue_group(),
            },
            model: ModelConfig {
                path: "models/delivery_risk.json".to_string(),
                onnx_threads: default_onnx_threads(),
            },
            history: HistoryConfig {
                path: "data/history.jsonl".to_string(),
                default_limit: default_history_limit(),
            },
            metrics: MetricsConfig {
                report_path: "reports/model_metrics.json".to_string(),
                report_interval_secs: default_report_interval(),
            },
            service: ServiceConfig { workers: 4 },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "json".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.nats.url, "nats://localhost:4222");
        assert_eq!(config.nats.request_subject, "delivery.requests");
        assert_eq!(config.nats.queue_group, "delivery-risk-workers");
        assert_eq!(config.model.onnx_threads, 1);
        assert_eq!(config.history.default_limit, 100);
        assert_eq!(config.service.workers, 4);
    }

    #[test]
    fn test_load_from_file_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[nats]
url = "nats://broker:4222"
request_subject = "req"
prediction_subject = "pred"

[model]
path = "models/forest.onnx"

[history]
path = "history.jsonl"

[metrics]
report_path = "metrics.json"

[service]
workers = 8

[logging]
level = "debug"
format = "pretty"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from_path(&path).unwrap();
        assert_eq!(config.nats.url, "nats://broker:4222");
        assert_eq!(config.nats.queue_group, "delivery-risk-workers");
        assert_eq!(config.model.path, "models/forest.onnx");
        assert_eq!(config.model.onnx_threads, 1);
        assert_eq!(config.history.default_limit, 100);
        assert_eq!(config.metrics.report_interval_secs, 30);
        assert_eq!(config.service.workers, 8);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(AppConfig::load_from_path("does/not/exist.toml").is_err());
    }

    fn logging(level: &str) -> LoggingConfig {
        LoggingConfig {
            level: level.to_string(),
            format: "pretty".to_string(),
        }
    }

    #[test]
    fn test_debug_level_reaches_crate_targets() {
        use tracing_subscriber::layer::SubscriberExt;

        let subscriber = tracing_subscriber::registry().with(logging("debug").level_filter().unwrap());
        let (crate_debug, dependency_debug) = tracing::subscriber::with_default(subscriber, || {
            (
                tracing::enabled!(target: "delivery_risk_pipeline::inference", tracing::Level::DEBUG),
                tracing::enabled!(target: "async_nats::client", tracing::Level::DEBUG),
            )
        });
        assert!(crate_debug);
        assert!(dependency_debug);
    }

    #[test]
    fn test_warn_level_silences_crate_info() {
        use tracing_subscriber::layer::SubscriberExt;

        let subscriber = tracing_subscriber::registry().with(logging("warn").level_filter().unwrap());
        let crate_info = tracing::subscriber::with_default(subscriber, || {
            tracing::enabled!(target: "delivery_risk_pipeline::service", tracing::Level::INFO)
        });
        assert!(!crate_info);
    }

    #[test]
    fn test_invalid_level_is_an_error() {
        assert!(logging("delivery_risk_pipeline=loud").level_filter().is_err());
    }
}
