//! Monitoring system for tracking ingestion progress and health
//!
//! Events are streamed over a bounded channel returned by
//! [`BatchIngester::new`](crate::BatchIngester::new) and can be folded into
//! per-stream metrics with [`MetricsAggregator`].

mod metrics;
mod types;

pub use metrics::{MetricsAggregator, StreamMetrics};
pub use types::{IngestEvent, IngestEventType, MonitoringConfig};
