//! Sink abstraction and its AWS Kinesis implementation
//!
//! The ingester only depends on [`RecordSink::submit`]. [`StreamReader`] covers
//! the listing and cursor operations of the same stream so a sink can be used
//! for inspection without changing its shape.

use crate::record::{Record, SubmissionOutcome};
use async_trait::async_trait;
use aws_sdk_kinesis::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_kinesis::primitives::Blob;
use aws_sdk_kinesis::types::{PutRecordsRequestEntry, ShardIteratorType};
use aws_sdk_kinesis::Client;
use aws_smithy_types::error::display::DisplayErrorContext;
use aws_smithy_types_convert::date_time::DateTimeExt;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, instrument, trace};

/// Transport-level failure of a sink call
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SinkError {
    #[error("Throughput exceeded")]
    ThroughputExceeded,

    #[error("Access denied")]
    AccessDenied,

    #[error("Shard iterator expired")]
    ExpiredIterator,

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("KMS error: {0}")]
    KmsError(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("{0}")]
    Other(String),
}

impl SinkError {
    /// Classify a service error code
    pub fn from_code(code: Option<&str>, detail: String) -> Self {
        match code {
            Some("ProvisionedThroughputExceededException") | Some("LimitExceededException") => {
                SinkError::ThroughputExceeded
            }
            Some("AccessDeniedException") => SinkError::AccessDenied,
            Some("ExpiredIteratorException") => SinkError::ExpiredIterator,
            Some("ResourceNotFoundException") => SinkError::ResourceNotFound(detail),
            Some("InvalidArgumentException") | Some("ValidationException") => {
                SinkError::InvalidArgument(detail)
            }
            Some(code) if code.starts_with("KMS") || code.starts_with("Kms") => {
                SinkError::KmsError(detail)
            }
            _ => SinkError::Other(detail),
        }
    }

    /// Whether re-running the whole call later has a reasonable chance of succeeding
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SinkError::ThroughputExceeded | SinkError::Timeout(_) | SinkError::ConnectionError(_)
        )
    }
}

impl<E, R> From<SdkError<E, R>> for SinkError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    fn from(err: SdkError<E, R>) -> Self {
        let detail = DisplayErrorContext(&err).to_string();
        match &err {
            SdkError::TimeoutError(_) => SinkError::Timeout(detail),
            SdkError::DispatchFailure(_) => SinkError::ConnectionError(detail),
            _ => SinkError::from_code(err.code(), detail),
        }
    }
}

/// Destination that accepts batches of records
///
/// Implementations must return exactly one outcome per submitted record, in
/// submission order, and only fail the whole call for transport problems.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn submit(&self, batch: &[Record]) -> Result<Vec<SubmissionOutcome>, SinkError>;
}

/// Where a cursor starts reading within a shard
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartingPosition {
    TrimHorizon,
    Latest,
    AtSequenceNumber(String),
    AfterSequenceNumber(String),
    AtTimestamp(DateTime<Utc>),
}

/// One page of a shard listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShardPage {
    pub shard_ids: Vec<String>,
    pub has_more: bool,
}

/// Listing and cursor operations of a stream
#[async_trait]
pub trait StreamReader: Send + Sync {
    /// Fetch one page of shard ids starting after `exclusive_start_shard_id`
    async fn describe_page(
        &self,
        exclusive_start_shard_id: Option<&str>,
    ) -> Result<ShardPage, SinkError>;

    async fn open_cursor(
        &self,
        shard_id: &str,
        position: &StartingPosition,
    ) -> Result<String, SinkError>;

    /// Read up to `limit` records at `cursor`, returning the next cursor if the shard is open
    async fn read(
        &self,
        cursor: &str,
        limit: i32,
    ) -> Result<(Vec<Record>, Option<String>), SinkError>;
}

/// A Kinesis data stream addressed by name
#[derive(Debug, Clone)]
pub struct KinesisSink {
    client: Client,
    stream_name: String,
}

impl KinesisSink {
    pub fn new(client: Client, stream_name: impl Into<String>) -> Self {
        Self {
            client,
            stream_name: stream_name.into(),
        }
    }

    pub fn stream_name(&self) -> &str {
        &self.stream_name
    }
}

#[async_trait]
impl RecordSink for KinesisSink {
    #[instrument(skip(self, batch), fields(stream = %self.stream_name, batch_size = batch.len()))]
    async fn submit(&self, batch: &[Record]) -> Result<Vec<SubmissionOutcome>, SinkError> {
        let entries = batch
            .iter()
            .map(|record| {
                PutRecordsRequestEntry::builder()
                    .data(Blob::new(record.data().to_vec()))
                    .partition_key(record.partition_key())
                    .build()
                    .map_err(|e| SinkError::InvalidArgument(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let output = self
            .client
            .put_records()
            .stream_name(&self.stream_name)
            .set_records(Some(entries))
            .send()
            .await?;

        debug!(
            failed_record_count = output.failed_record_count().unwrap_or_default(),
            "PutRecords completed"
        );

        Ok(output
            .records()
            .iter()
            .map(|entry| {
                SubmissionOutcome::from_parts(
                    entry.error_code(),
                    entry.error_message(),
                    entry.sequence_number(),
                    entry.shard_id(),
                )
            })
            .collect())
    }
}

#[async_trait]
impl StreamReader for KinesisSink {
    #[instrument(skip(self), fields(stream = %self.stream_name))]
    async fn describe_page(
        &self,
        exclusive_start_shard_id: Option<&str>,
    ) -> Result<ShardPage, SinkError> {
        let response = self
            .client
            .list_shards()
            .stream_name(&self.stream_name)
            .set_exclusive_start_shard_id(exclusive_start_shard_id.map(String::from))
            .send()
            .await?;

        let shard_ids: Vec<String> = response
            .shards()
            .iter()
            .map(|shard| shard.shard_id().to_string())
            .collect();

        trace!(shards = shard_ids.len(), "Listed shard page");

        Ok(ShardPage {
            shard_ids,
            has_more: response.next_token().is_some(),
        })
    }

    #[instrument(skip(self), fields(stream = %self.stream_name))]
    async fn open_cursor(
        &self,
        shard_id: &str,
        position: &StartingPosition,
    ) -> Result<String, SinkError> {
        let req = self
            .client
            .get_shard_iterator()
            .stream_name(&self.stream_name)
            .shard_id(shard_id);

        let req = match position {
            StartingPosition::TrimHorizon => req.shard_iterator_type(ShardIteratorType::TrimHorizon),
            StartingPosition::Latest => req.shard_iterator_type(ShardIteratorType::Latest),
            StartingPosition::AtSequenceNumber(seq) => req
                .shard_iterator_type(ShardIteratorType::AtSequenceNumber)
                .starting_sequence_number(seq),
            StartingPosition::AfterSequenceNumber(seq) => req
                .shard_iterator_type(ShardIteratorType::AfterSequenceNumber)
                .starting_sequence_number(seq),
            StartingPosition::AtTimestamp(ts) => req
                .shard_iterator_type(ShardIteratorType::AtTimestamp)
                .timestamp(aws_smithy_types::DateTime::from_chrono_utc(*ts)),
        };

        let response = req.send().await?;
        response
            .shard_iterator()
            .map(String::from)
            .ok_or_else(|| SinkError::Other(format!("No iterator returned for shard {}", shard_id)))
    }

    #[instrument(skip(self, cursor), fields(stream = %self.stream_name))]
    async fn read(
        &self,
        cursor: &str,
        limit: i32,
    ) -> Result<(Vec<Record>, Option<String>), SinkError> {
        let response = self
            .client
            .get_records()
            .shard_iterator(cursor)
            .limit(limit)
            .send()
            .await?;

        let records = response
            .records()
            .iter()
            .map(|r| read_record(r.data().as_ref(), r.partition_key()))
            .collect();

        Ok((records, response.next_shard_iterator().map(String::from)))
    }
}

/// Copy a record read from a shard; a missing partition key becomes empty
fn read_record(data: &[u8], partition_key: Option<&str>) -> Record {
    Record::new(Bytes::copy_from_slice(data), partition_key.unwrap_or_default())
}
