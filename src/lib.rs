//! Kinesis Batch Ingest - at-least-once batch writes to AWS Kinesis
//!
//! This crate submits records in bounded batches and resubmits only the
//! records the service rejected, until every record is accepted or the retry
//! policy gives up.

pub mod client;
pub mod error;
pub mod ingest;
pub mod monitoring;
pub mod record;
pub mod retry;
pub mod session;
pub mod shards;

// Make test utilities available for integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test;

pub use error::{IngestError, Result};
pub use ingest::{BatchIngester, IngestConfig, IngestReport};
pub use record::{FailedRecord, Record, RecordError, SubmissionOutcome};
pub use retry::{Backoff, BackoffConfig, ExhaustionPolicy, ExponentialBackoff, RetryPolicy};
pub use session::{SdkSession, SessionConfig};
pub use shards::ShardLister;

// Re-export main traits
pub use crate::client::{KinesisSink, RecordSink, SinkError, StreamReader};
