use super::types::{IngestEvent, IngestEventType, MonitoringConfig};
use std::collections::HashMap;

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::time::interval;
use tracing::{debug, info, trace, warn};

/// Holds aggregated metrics for a single stream
#[derive(Debug, Clone)]
pub struct StreamMetrics {
    // Record counters
    pub records_submitted: u64,
    pub records_delivered: u64,
    pub records_rejected: u64,
    pub records_abandoned: u64,

    // Round and batch counters
    pub rounds: u64,
    pub retry_rounds: u64,
    pub batches: u64,
    pub batch_errors: u64,

    // Call outcomes
    pub ingests_completed: u64,
    pub ingests_exhausted: u64,
    pub ingests_cancelled: u64,

    /// Rejections per service error code
    pub error_codes: HashMap<String, u64>,

    // Performance metrics
    pub submit_time: Duration,
    pub avg_batch_time: Duration,
    pub max_batch_time: Duration,

    // Window information
    pub window_start: Instant,
    pub last_updated: Instant,
}

impl Default for StreamMetrics {
    fn default() -> Self {
        let now = Instant::now();
        Self {
            records_submitted: 0,
            records_delivered: 0,
            records_rejected: 0,
            records_abandoned: 0,
            rounds: 0,
            retry_rounds: 0,
            batches: 0,
            batch_errors: 0,
            ingests_completed: 0,
            ingests_exhausted: 0,
            ingests_cancelled: 0,
            error_codes: HashMap::new(),
            submit_time: Duration::default(),
            avg_batch_time: Duration::default(),
            max_batch_time: Duration::default(),
            window_start: now,
            last_updated: now,
        }
    }
}

/// Aggregates monitoring events into metrics
pub struct MetricsAggregator {
    metrics: Arc<RwLock<HashMap<String, StreamMetrics>>>,
    window_duration: Duration,
    monitoring_rx: tokio::sync::mpsc::Receiver<IngestEvent>,
}

impl MetricsAggregator {
    /// Create a new metrics aggregator
    pub fn new(
        window_duration: Duration,
        monitoring_rx: tokio::sync::mpsc::Receiver<IngestEvent>,
    ) -> Self {
        Self {
            metrics: Arc::new(RwLock::new(HashMap::new())),
            window_duration,
            monitoring_rx,
        }
    }

    /// Shared handle to the metrics, readable while `run` consumes the aggregator
    pub fn metrics_handle(&self) -> Arc<RwLock<HashMap<String, StreamMetrics>>> {
        self.metrics.clone()
    }

    /// Aggregator emitting every `metrics_interval` of the config
    pub fn from_config(
        config: &MonitoringConfig,
        monitoring_rx: tokio::sync::mpsc::Receiver<IngestEvent>,
    ) -> Self {
        Self::new(config.metrics_interval, monitoring_rx)
    }

    /// Process events until every sender is dropped, emitting metrics each window
    pub async fn run(mut self) {
        let mut interval = interval(self.window_duration);

        loop {
            tokio::select! {
                event = self.monitoring_rx.recv() => match event {
                    Some(event) => self.process_event(event).await,
                    None => {
                        debug!("Monitoring channel closed, emitting final metrics");
                        self.emit_metrics().await;
                        break;
                    }
                },

                _ = interval.tick() => {
                    self.emit_metrics().await;
                }
            }
        }
    }

    pub async fn process_event(&self, event: IngestEvent) {
        let mut metrics = self.metrics.write().await;
        let stream_metrics = metrics.entry(event.stream_name.clone()).or_default();

        match event.event_type {
            IngestEventType::BatchSubmitted {
                round,
                size,
                rejected,
                duration,
            } => {
                stream_metrics.batches += 1;
                stream_metrics.records_submitted += size as u64;
                stream_metrics.submit_time += duration;
                stream_metrics.avg_batch_time =
                    stream_metrics.submit_time.div_f64(stream_metrics.batches as f64);
                if duration > stream_metrics.max_batch_time {
                    stream_metrics.max_batch_time = duration;
                }
                trace!(
                    stream = %event.stream_name,
                    round = round,
                    size = size,
                    rejected = rejected,
                    duration_ms = ?duration.as_millis(),
                    "Batch submitted"
                );
            }
            IngestEventType::BatchError { round, size, error } => {
                stream_metrics.batch_errors += 1;
                warn!(
                    stream = %event.stream_name,
                    round = round,
                    size = size,
                    error = %error,
                    "Batch submission failed"
                );
            }
            IngestEventType::RecordRejected {
                round,
                index,
                error_code,
            } => {
                trace!(
                    stream = %event.stream_name,
                    round = round,
                    index = index,
                    error_code = %error_code,
                    "Record rejected"
                );
                *stream_metrics.error_codes.entry(error_code).or_insert(0) += 1;
            }
            IngestEventType::RoundComplete {
                round,
                accepted,
                rejected,
                ..
            } => {
                stream_metrics.rounds += 1;
                if round > 1 {
                    stream_metrics.retry_rounds += 1;
                }
                stream_metrics.records_delivered += accepted as u64;
                stream_metrics.records_rejected += rejected as u64;
            }
            IngestEventType::IngestComplete {
                rounds,
                delivered,
                outstanding,
                duration,
            } => {
                stream_metrics.ingests_completed += 1;
                debug!(
                    stream = %event.stream_name,
                    rounds = rounds,
                    delivered = delivered,
                    outstanding = outstanding,
                    duration_ms = ?duration.as_millis(),
                    "Ingestion completed"
                );
            }
            IngestEventType::Exhausted {
                rounds,
                outstanding,
            } => {
                stream_metrics.ingests_exhausted += 1;
                // Counted here only, since a partial result is reported by both events
                stream_metrics.records_abandoned += outstanding as u64;
                warn!(
                    stream = %event.stream_name,
                    rounds = rounds,
                    outstanding = outstanding,
                    "Retries exhausted"
                );
            }
            IngestEventType::Cancelled {
                rounds,
                outstanding,
            } => {
                stream_metrics.ingests_cancelled += 1;
                info!(
                    stream = %event.stream_name,
                    rounds = rounds,
                    outstanding = outstanding,
                    "Ingestion cancelled"
                );
            }
        }

        stream_metrics.last_updated = Instant::now();
    }

    async fn emit_metrics(&self) {
        let metrics = self.metrics.read().await;

        for (stream_name, metrics) in metrics.iter() {
            if metrics.last_updated.elapsed() > self.window_duration * 2 {
                continue;
            }

            info!(
                stream = %stream_name,
                records_submitted = metrics.records_submitted,
                records_delivered = metrics.records_delivered,
                records_rejected = metrics.records_rejected,
                records_abandoned = metrics.records_abandoned,
                rounds = metrics.rounds,
                retry_rounds = metrics.retry_rounds,
                batches = metrics.batches,
                batch_errors = metrics.batch_errors,
                avg_batch_time_ms = %metrics.avg_batch_time.as_millis(),
                max_batch_time_ms = %metrics.max_batch_time.as_millis(),
                "Metrics for window"
            );

            if metrics.records_abandoned > 0 || metrics.ingests_exhausted > 0 {
                warn!(
                    stream = %stream_name,
                    abandoned = metrics.records_abandoned,
                    exhausted = metrics.ingests_exhausted,
                    error_codes = ?metrics.error_codes,
                    "Records were not delivered"
                );
            }

            if metrics.batch_errors > 0 {
                warn!(
                    stream = %stream_name,
                    failures = metrics.batch_errors,
                    "Transport failures detected"
                );
            }
        }
        drop(metrics);

        let mut metrics = self.metrics.write().await;
        metrics.retain(|_, m| m.last_updated.elapsed() <= self.window_duration * 2);
    }

    /// Get current metrics for all streams
    pub async fn get_metrics(&self) -> HashMap<String, StreamMetrics> {
        self.metrics.read().await.clone()
    }

    /// Get metrics for a specific stream
    pub async fn get_stream_metrics(&self, stream_name: &str) -> Option<StreamMetrics> {
        self.metrics.read().await.get(stream_name).cloned()
    }
}
