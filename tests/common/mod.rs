// tests/common/mod.rs
#![allow(dead_code)]

use kinesis_batch_ingest::monitoring::MonitoringConfig;
use kinesis_batch_ingest::{
    BackoffConfig, ExhaustionPolicy, IngestConfig, Record, RetryPolicy,
};
use std::sync::Once;
use std::time::Duration;

static INIT: Once = Once::new();

pub fn init_logging() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::from_default_env()
                    .add_directive("kinesis_batch_ingest=debug".parse().unwrap())
                    .add_directive("test=debug".parse().unwrap()),
            )
            .with_test_writer()
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .try_init()
            .ok();
    });
}

pub fn create_test_config() -> IngestConfig {
    IngestConfig {
        stream_name: "test-stream".to_string(),
        max_batch_size: 500,
        max_batch_bytes: 5 * 1024 * 1024,
        max_concurrent_batches: 1,
        retry: RetryPolicy {
            max_attempts: Some(5),
            backoff: BackoffConfig::None,
            on_exhaustion: ExhaustionPolicy::Fail,
            deadline: None,
        },
        monitoring: MonitoringConfig::default(),
    }
}

pub fn create_monitored_config() -> IngestConfig {
    IngestConfig {
        monitoring: MonitoringConfig {
            enabled: true,
            channel_size: 1000,
            metrics_interval: Duration::from_secs(60),
            include_record_details: true,
        },
        ..create_test_config()
    }
}

/// True if `sub` appears in `full` in the same relative order
pub fn is_subsequence(sub: &[Record], full: &[Record]) -> bool {
    let mut remaining = full.iter();
    sub.iter().all(|record| remaining.any(|candidate| candidate == record))
}
