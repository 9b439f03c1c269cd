//! Runtime metrics for the delivery risk service.

use crate::labels::{ClassLabel, CLASS_COUNT};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

const MAX_SAMPLES: usize = 10_000;

/// Metrics collector for the request handler
pub struct PipelineMetrics {
    /// Predictions returned to callers (batch rows included)
    pub predictions_served: AtomicU64,
    /// Requests or rows rejected for bad input
    pub validation_rejections: AtomicU64,
    /// Requests that failed inside the service
    pub internal_failures: AtomicU64,
    /// Predictions per class id
    by_label: [AtomicU64; CLASS_COUNT],
    /// Request handling times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Requests per kind
    requests_by_kind: RwLock<HashMap<&'static str, u64>>,
    /// Confidence distribution buckets
    confidence_buckets: RwLock<[u64; 10]>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl PipelineMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            predictions_served: AtomicU64::new(0),
            validation_rejections: AtomicU64::new(0),
            internal_failures: AtomicU64::new(0),
            by_label: Default::default(),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            requests_by_kind: RwLock::new(HashMap::new()),
            confidence_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record a handled request of the given kind
    pub fn record_request(&self, kind: &'static str, processing_time: Duration) {
        if let Ok(mut by_kind) = self.requests_by_kind.write() {
            *by_kind.entry(kind).or_insert(0) += 1;
        }

        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            if times.len() > MAX_SAMPLES {
                times.drain(0..MAX_SAMPLES / 2);
            }
        }
    }

    /// Record one served prediction
    pub fn record_prediction(&self, label: ClassLabel, confidence: f64) {
        self.predictions_served.fetch_add(1, Ordering::Relaxed);
        self.by_label[label.id()].fetch_add(1, Ordering::Relaxed);

        let bucket = (confidence.clamp(0.0, 1.0) * 10.0).min(9.0) as usize;
        if let Ok(mut buckets) = self.confidence_buckets.write() {
            buckets[bucket] += 1;
        }
    }

    pub fn record_validation_rejection(&self) {
        self.validation_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_internal_failure(&self) {
        self.internal_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let sorted = match self.processing_times.read() {
            Ok(times) if !times.is_empty() => {
                let mut sorted = times.clone();
                sorted.sort_unstable();
                sorted
            }
            _ => return ProcessingStats::default(),
        };

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();
        let percentile = |p: f64| sorted[((count as f64 * p) as usize).min(count - 1)];

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: percentile(0.5),
            p95_us: percentile(0.95),
            p99_us: percentile(0.99),
            max_us: sorted[count - 1],
        }
    }

    /// Get current throughput (predictions per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.predictions_served.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn get_label_counts(&self) -> [u64; CLASS_COUNT] {
        let mut counts = [0; CLASS_COUNT];
        for (count, atomic) in counts.iter_mut().zip(&self.by_label) {
            *count = atomic.load(Ordering::Relaxed);
        }
        counts
    }

    pub fn get_confidence_distribution(&self) -> [u64; 10] {
        self.confidence_buckets
            .read()
            .map(|buckets| *buckets)
            .unwrap_or_default()
    }

    pub fn get_requests_by_kind(&self) -> HashMap<&'static str, u64> {
        self.requests_by_kind
            .read()
            .map(|by_kind| by_kind.clone())
            .unwrap_or_default()
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let served = self.predictions_served.load(Ordering::Relaxed);
        let rejected = self.validation_rejections.load(Ordering::Relaxed);
        let failed = self.internal_failures.load(Ordering::Relaxed);

        let processing = self.get_processing_stats();
        let throughput = self.get_throughput();
        let labels = self.get_label_counts();
        let confidence = self.get_confidence_distribution();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║            DELIVERY RISK PIPELINE - METRICS SUMMARY          ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Predictions Served: {:>8}  │  Throughput: {:>6.1} pred/s  ║",
            served, throughput
        );
        info!(
            "║ Rejected (input):   {:>8}  │  Failed (internal): {:>6}  ║",
            rejected, failed
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Request Time (μs): mean={:>5} p50={:>5} p95={:>5} p99={:>5}  ║",
            processing.mean_us, processing.p50_us, processing.p95_us, processing.p99_us
        );
        for (kind, count) in self.get_requests_by_kind() {
            info!("║   {:16}: {:>8}", kind, count);
        }
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Predictions by Label:                                        ║");
        for class in ClassLabel::ALL {
            let count = labels[class.id()];
            let pct = if served > 0 {
                (count as f64 / served as f64) * 100.0
            } else {
                0.0
            };
            info!("║   {:10}: {:>6} ({:>5.1}%)", class.label(), count, pct);
        }
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Confidence Distribution:                                     ║");
        let total: u64 = confidence.iter().sum();
        for (i, &count) in confidence.iter().enumerate() {
            let pct = if total > 0 { (count as f64 / total as f64) * 100.0 } else { 0.0 };
            let bar: String = "█".repeat(((pct / 2.0) as usize).min(20));
            info!(
                "║   {:.1}-{:.1}: {:>6} ({:>5.1}%) {}",
                i as f64 / 10.0,
                (i + 1) as f64 / 10.0,
                count,
                pct,
                bar
            );
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Periodic metrics summaries in the log
pub struct MetricsReporter {
    metrics: Arc<PipelineMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<PipelineMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs: interval_secs.max(1),
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        // The first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = PipelineMetrics::new();

        metrics.record_request("predict", Duration::from_micros(100));
        metrics.record_request("predict", Duration::from_micros(300));
        metrics.record_request("history", Duration::from_micros(50));
        metrics.record_prediction(ClassLabel::OnTime, 0.95);
        metrics.record_prediction(ClassLabel::Delayed, 0.55);
        metrics.record_validation_rejection();

        assert_eq!(metrics.predictions_served.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.validation_rejections.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.internal_failures.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.get_label_counts(), [1, 0, 1]);
        assert_eq!(metrics.get_requests_by_kind().get("predict"), Some(&2));
    }

    #[test]
    fn test_confidence_buckets() {
        let metrics = PipelineMetrics::new();
        metrics.record_prediction(ClassLabel::AtRisk, 1.0);
        metrics.record_prediction(ClassLabel::AtRisk, 0.34);

        let buckets = metrics.get_confidence_distribution();
        assert_eq!(buckets[9], 1);
        assert_eq!(buckets[3], 1);
    }

    #[test]
    fn test_processing_stats() {
        let metrics = PipelineMetrics::new();
        assert_eq!(metrics.get_processing_stats().count, 0);

        for us in [100, 200, 300, 400] {
            metrics.record_request("predict", Duration::from_micros(us));
        }
        let stats = metrics.get_processing_stats();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.mean_us, 250);
        assert_eq!(stats.p50_us, 300);
        assert_eq!(stats.max_us, 400);
    }
}
