use std::time::{Duration, SystemTime};

/// Configuration for the monitoring system
#[derive(Debug, Clone)]
pub struct MonitoringConfig {
    /// Whether monitoring is enabled
    pub enabled: bool,
    /// Size of the monitoring channel buffer
    pub channel_size: usize,
    /// How often to emit aggregated metrics
    pub metrics_interval: Duration,
    /// Whether to emit one event per rejected record
    pub include_record_details: bool,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            channel_size: 1000,
            metrics_interval: Duration::from_secs(60),
            include_record_details: false,
        }
    }
}

/// Represents a monitoring event from the ingester
#[derive(Debug, Clone)]
pub struct IngestEvent {
    /// When the event occurred
    pub timestamp: SystemTime,
    /// Stream the records were destined for
    pub stream_name: String,
    /// The type of event and its details
    pub event_type: IngestEventType,
}

/// The different types of events that can occur during ingestion
#[derive(Debug, Clone)]
pub enum IngestEventType {
    /// One sink call returned outcomes
    BatchSubmitted {
        round: u32,
        size: usize,
        rejected: usize,
        duration: Duration,
    },
    /// One sink call failed at the transport level
    BatchError {
        round: u32,
        size: usize,
        error: String,
    },
    /// A record was rejected by the sink
    RecordRejected {
        round: u32,
        index: usize,
        error_code: String,
    },
    /// All batches of a round converged
    RoundComplete {
        round: u32,
        submitted: usize,
        accepted: usize,
        rejected: usize,
        duration: Duration,
    },
    /// Ingestion finished, either fully delivered or with partial results
    IngestComplete {
        rounds: u32,
        delivered: usize,
        outstanding: usize,
        duration: Duration,
    },
    /// Give-up condition reached with records outstanding
    Exhausted { rounds: u32, outstanding: usize },
    /// Shutdown observed between rounds
    Cancelled { rounds: u32, outstanding: usize },
}

impl IngestEvent {
    fn new(stream_name: &str, event_type: IngestEventType) -> Self {
        Self {
            timestamp: SystemTime::now(),
            stream_name: stream_name.to_string(),
            event_type,
        }
    }

    pub fn batch_submitted(
        stream_name: &str,
        round: u32,
        size: usize,
        rejected: usize,
        duration: Duration,
    ) -> Self {
        Self::new(
            stream_name,
            IngestEventType::BatchSubmitted {
                round,
                size,
                rejected,
                duration,
            },
        )
    }

    pub fn batch_error(stream_name: &str, round: u32, size: usize, error: String) -> Self {
        Self::new(stream_name, IngestEventType::BatchError { round, size, error })
    }

    pub fn record_rejected(stream_name: &str, round: u32, index: usize, error_code: String) -> Self {
        Self::new(
            stream_name,
            IngestEventType::RecordRejected {
                round,
                index,
                error_code,
            },
        )
    }

    pub fn round_complete(
        stream_name: &str,
        round: u32,
        submitted: usize,
        rejected: usize,
        duration: Duration,
    ) -> Self {
        Self::new(
            stream_name,
            IngestEventType::RoundComplete {
                round,
                submitted,
                accepted: submitted - rejected,
                rejected,
                duration,
            },
        )
    }

    pub fn ingest_complete(
        stream_name: &str,
        rounds: u32,
        delivered: usize,
        outstanding: usize,
        duration: Duration,
    ) -> Self {
        Self::new(
            stream_name,
            IngestEventType::IngestComplete {
                rounds,
                delivered,
                outstanding,
                duration,
            },
        )
    }

    pub fn exhausted(stream_name: &str, rounds: u32, outstanding: usize) -> Self {
        Self::new(stream_name, IngestEventType::Exhausted { rounds, outstanding })
    }

    pub fn cancelled(stream_name: &str, rounds: u32, outstanding: usize) -> Self {
        Self::new(stream_name, IngestEventType::Cancelled { rounds, outstanding })
    }
}
