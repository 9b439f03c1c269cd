//! Application context shared by every request

use crate::config::AppConfig;
use crate::error::Result;
use crate::history::{HistoryStore, JsonlHistoryStore};
use crate::inference::InferenceService;
use crate::metrics::PipelineMetrics;
use crate::models::ModelLoader;
use std::sync::Arc;
use tracing::info;

/// Long-lived components, built once at startup
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub inference: Arc<InferenceService>,
    pub history: Arc<dyn HistoryStore>,
    pub metrics: Arc<PipelineMetrics>,
}

impl AppContext {
    /// Load the model artifact and open the history store.
    ///
    /// Fails with a fatal error when the artifact is missing, unreadable or
    /// incompatible with the encoder.
    pub fn initialize(config: AppConfig) -> Result<Self> {
        let model = ModelLoader::with_threads(config.model.onnx_threads).load(&config.model.path)?;
        let inference = InferenceService::new(model)?;
        let history = JsonlHistoryStore::open(&config.history.path)?;

        info!(
            model = %inference.model_name(),
            history = %config.history.path,
            "Application context initialized"
        );

        Ok(Self::with_components(
            config,
            Arc::new(inference),
            Arc::new(history),
            Arc::new(PipelineMetrics::new()),
        ))
    }

    pub fn with_components(
        config: AppConfig,
        inference: Arc<InferenceService>,
        history: Arc<dyn HistoryStore>,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            inference,
            history,
            metrics,
        }
    }
}
