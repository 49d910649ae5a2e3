//! Batch ingestion with partial-failure retry
//!
//! A call to [`BatchIngester::ingest`] runs in rounds:
//!
//! - The outstanding records are cut into batches and submitted to the sink
//! - Each outcome is matched with its record by position
//! - Accepted records are dropped, rejected ones form the next round
//! - The loop ends when nothing is outstanding or the retry policy gives up
//!
//! Delivery is at-least-once: a record accepted after an ambiguous earlier
//! response may be stored twice by the service.

use crate::client::RecordSink;
use crate::error::{IngestError, Result};
use crate::monitoring::{IngestEvent, MonitoringConfig};
use crate::record::{FailedRecord, Record, RecordError, SubmissionOutcome};
use crate::retry::{Backoff, ExhaustionPolicy, RetryPolicy};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, trace, warn};

/// Service ceiling on records per PutRecords call
pub const MAX_BATCH_SIZE: usize = 500;
/// Service ceiling on payload bytes per PutRecords call
pub const MAX_BATCH_BYTES: usize = 5 * 1024 * 1024;

/// Configuration for the ingester
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Name of the destination stream, used for logging and monitoring
    pub stream_name: String,
    /// Maximum number of records per sink call
    pub max_batch_size: usize,
    /// Maximum encoded bytes per sink call
    pub max_batch_bytes: usize,
    /// Maximum number of sink calls in flight within one round
    pub max_concurrent_batches: usize,
    /// Retry behaviour for rejected records
    pub retry: RetryPolicy,
    /// Monitoring configuration
    pub monitoring: MonitoringConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            stream_name: String::new(),
            max_batch_size: MAX_BATCH_SIZE,
            max_batch_bytes: MAX_BATCH_BYTES,
            max_concurrent_batches: 1,
            retry: RetryPolicy::default(),
            monitoring: MonitoringConfig::default(),
        }
    }
}

impl IngestConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_batch_size == 0 || self.max_batch_size > MAX_BATCH_SIZE {
            return Err(IngestError::ConfigError(format!(
                "max_batch_size must be between 1 and {}, got {}",
                MAX_BATCH_SIZE, self.max_batch_size
            )));
        }
        if self.max_batch_bytes == 0 || self.max_batch_bytes > MAX_BATCH_BYTES {
            return Err(IngestError::ConfigError(format!(
                "max_batch_bytes must be between 1 and {}, got {}",
                MAX_BATCH_BYTES, self.max_batch_bytes
            )));
        }
        if self.max_concurrent_batches == 0 {
            return Err(IngestError::ConfigError(
                "max_concurrent_batches must be at least 1".to_string(),
            ));
        }
        if self.retry.max_attempts == Some(0) {
            return Err(IngestError::ConfigError(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.monitoring.enabled && self.monitoring.channel_size == 0 {
            return Err(IngestError::ConfigError(
                "monitoring channel_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Final state of an ingestion call
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReport {
    /// Submission rounds performed
    pub rounds: u32,
    /// Number of input records
    pub submitted: usize,
    /// Records accepted by the sink
    pub delivered: usize,
    /// Records that never succeeded, in original relative order
    pub outstanding: Vec<FailedRecord>,
    pub elapsed: Duration,
}

impl IngestReport {
    fn empty() -> Self {
        Self {
            rounds: 0,
            submitted: 0,
            delivered: 0,
            outstanding: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.outstanding.is_empty()
    }
}

/// Cut a sequence of record sizes into contiguous batch ranges
///
/// Each range holds at most `max_records` entries and at most `max_bytes`
/// bytes, except that an entry larger than `max_bytes` gets a batch of its own.
pub fn plan_batches<I>(sizes: I, max_records: usize, max_bytes: usize) -> Vec<Range<usize>>
where
    I: IntoIterator<Item = usize>,
{
    let mut batches = Vec::new();
    let mut start = 0;
    let mut pos = 0;
    let mut bytes = 0;

    for size in sizes {
        let count = pos - start;
        if count > 0 && (count >= max_records || bytes + size > max_bytes) {
            batches.push(start..pos);
            start = pos;
            bytes = 0;
        }
        bytes += size;
        pos += 1;
    }

    if pos > start {
        batches.push(start..pos);
    }
    batches
}

/// Pair every rejected item with its error, preserving order
///
/// Fails with [`IngestError::ProtocolViolation`] when the counts differ.
pub fn filter_failures<'a, T>(
    items: &'a [T],
    outcomes: &'a [SubmissionOutcome],
) -> Result<Vec<(&'a T, &'a RecordError)>> {
    if items.len() != outcomes.len() {
        return Err(IngestError::ProtocolViolation {
            expected: items.len(),
            actual: outcomes.len(),
        });
    }

    Ok(items
        .iter()
        .zip(outcomes)
        .filter_map(|(item, outcome)| outcome.error().map(|err| (item, err)))
        .collect())
}

/// Submits records to a sink until every one is accepted or the policy gives up
///
/// # Examples
///
/// ```rust,no_run
/// use kinesis_batch_ingest::{BatchIngester, IngestConfig, Record, SdkSession, SessionConfig};
///
/// async fn put_some_records() -> kinesis_batch_ingest::Result<()> {
///     let session = SdkSession::open(SessionConfig::default()).await;
///     let config = IngestConfig {
///         stream_name: "sample-stream".to_string(),
///         ..Default::default()
///     };
///     let sink = session.sink(&config.stream_name);
///     let (ingester, _monitoring_rx) = BatchIngester::new(config, sink)?;
///
///     let records: Vec<Record> = (0..500)
///         .map(|i| Record::new(format!("{}, dog", i), format!("pk-{}", i % 100)))
///         .collect();
///
///     let report = ingester.ingest_all(&records).await?;
///     assert!(report.is_complete());
///     Ok(())
/// }
/// ```
pub struct BatchIngester<S: RecordSink> {
    sink: Arc<S>,
    config: IngestConfig,
    backoff: Box<dyn Backoff>,
    monitoring_tx: Option<mpsc::Sender<IngestEvent>>,
}

impl<S: RecordSink> BatchIngester<S> {
    /// Creates a new ingester
    ///
    /// Returns the ingester and, when monitoring is enabled, the receiving end
    /// of its event channel.
    pub fn new(
        config: IngestConfig,
        sink: S,
    ) -> Result<(Self, Option<mpsc::Receiver<IngestEvent>>)> {
        config.validate()?;

        let (monitoring_tx, monitoring_rx) = if config.monitoring.enabled {
            let (tx, rx) = mpsc::channel(config.monitoring.channel_size);
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };

        let backoff = config.retry.backoff.build();

        Ok((
            Self {
                sink: Arc::new(sink),
                config,
                backoff,
                monitoring_tx,
            },
            monitoring_rx,
        ))
    }

    /// Replace the backoff built from the retry policy
    pub fn with_backoff(mut self, backoff: impl Backoff + 'static) -> Self {
        self.backoff = Box::new(backoff);
        self
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Ingest without a shutdown signal
    pub async fn ingest_all(&self, records: &[Record]) -> Result<IngestReport> {
        let (_shutdown_tx, mut shutdown_rx) = watch::channel(false);
        self.ingest(records, &mut shutdown_rx).await
    }

    /// Ingest `records`, retrying rejected ones
    ///
    /// The shutdown signal is observed before every round and while waiting
    /// out a backoff. A submission already in flight always completes.
    #[instrument(skip_all, fields(stream = %self.config.stream_name, records = records.len()))]
    pub async fn ingest(
        &self,
        records: &[Record],
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<IngestReport> {
        let stream_name = self.config.stream_name.as_str();
        let policy = &self.config.retry;
        let start = Instant::now();

        if records.is_empty() {
            debug!(stream = %stream_name, "No records to ingest");
            return Ok(IngestReport::empty());
        }

        info!(stream = %stream_name, records = records.len(), "Starting ingestion");

        // Positions into `records`; identity is positional, never by content
        let mut outstanding: Vec<usize> = (0..records.len()).collect();
        let mut delivered = 0;
        let mut round = 0;

        loop {
            if *shutdown.borrow() {
                return Err(self.cancelled(round, outstanding.len()).await);
            }

            round += 1;
            let round_start = Instant::now();
            trace!(stream = %stream_name, round = round, outstanding = outstanding.len(), "Starting round");

            let outcomes = self.submit_round(round, records, &outstanding).await?;
            let failures = filter_failures(&outstanding, &outcomes)?;
            let rejected = failures.len();
            delivered += outstanding.len() - rejected;

            self.send_monitoring_event(IngestEvent::round_complete(
                stream_name,
                round,
                outstanding.len(),
                rejected,
                round_start.elapsed(),
            ))
            .await;

            if self.config.monitoring.include_record_details {
                for (index, err) in &failures {
                    self.send_monitoring_event(IngestEvent::record_rejected(
                        stream_name,
                        round,
                        **index,
                        err.code.clone(),
                    ))
                    .await;
                }
            }

            if failures.is_empty() {
                info!(
                    stream = %stream_name,
                    rounds = round,
                    delivered = delivered,
                    duration_ms = ?start.elapsed().as_millis(),
                    "All records delivered"
                );
                self.send_monitoring_event(IngestEvent::ingest_complete(
                    stream_name,
                    round,
                    delivered,
                    0,
                    start.elapsed(),
                ))
                .await;

                return Ok(IngestReport {
                    rounds: round,
                    submitted: records.len(),
                    delivered,
                    outstanding: Vec::new(),
                    elapsed: start.elapsed(),
                });
            }

            let (next, errors): (Vec<usize>, Vec<RecordError>) = failures
                .into_iter()
                .map(|(index, err)| (*index, err.clone()))
                .unzip();
            outstanding = next;

            let delay = self.backoff.next_delay(round - 1);
            if policy.is_exhausted(round, start.elapsed() + delay) {
                let failed: Vec<FailedRecord> = outstanding
                    .iter()
                    .zip(errors)
                    .map(|(&index, error)| FailedRecord {
                        index,
                        record: records[index].clone(),
                        error,
                    })
                    .collect();
                return self.exhausted(round, records.len(), delivered, failed, start).await;
            }

            warn!(
                stream = %stream_name,
                round = round,
                failed = outstanding.len(),
                delay_ms = ?delay.as_millis(),
                "Some records failed, retrying"
            );

            if !delay.is_zero() && Self::wait_for_backoff(delay, shutdown).await {
                return Err(self.cancelled(round, outstanding.len()).await);
            }
        }
    }

    /// Submit every outstanding record once, returning outcomes in the same order
    async fn submit_round(
        &self,
        round: u32,
        records: &[Record],
        outstanding: &[usize],
    ) -> Result<Vec<SubmissionOutcome>> {
        let batches = plan_batches(
            outstanding.iter().map(|&index| records[index].encoded_len()),
            self.config.max_batch_size,
            self.config.max_batch_bytes,
        );

        trace!(round = round, batches = batches.len(), "Planned batches");

        let results: Vec<Vec<SubmissionOutcome>> = stream::iter(batches)
            .map(|range| {
                let batch: Vec<Record> = outstanding[range]
                    .iter()
                    .map(|&index| records[index].clone())
                    .collect();
                self.submit_batch(round, batch)
            })
            .buffered(self.config.max_concurrent_batches)
            .try_collect()
            .await?;

        Ok(results.into_iter().flatten().collect())
    }

    async fn submit_batch(&self, round: u32, batch: Vec<Record>) -> Result<Vec<SubmissionOutcome>> {
        let stream_name = self.config.stream_name.as_str();
        let size = batch.len();
        let batch_start = Instant::now();

        match self.sink.submit(&batch).await {
            Ok(outcomes) => {
                if outcomes.len() != size {
                    error!(
                        stream = %stream_name,
                        round = round,
                        expected = size,
                        actual = outcomes.len(),
                        "Sink returned a mismatched number of outcomes"
                    );
                    return Err(IngestError::ProtocolViolation {
                        expected: size,
                        actual: outcomes.len(),
                    });
                }

                let rejected = outcomes.iter().filter(|o| o.is_failure()).count();
                debug!(
                    stream = %stream_name,
                    round = round,
                    size = size,
                    rejected = rejected,
                    "Batch submitted"
                );
                self.send_monitoring_event(IngestEvent::batch_submitted(
                    stream_name,
                    round,
                    size,
                    rejected,
                    batch_start.elapsed(),
                ))
                .await;

                Ok(outcomes)
            }
            Err(e) => {
                warn!(
                    stream = %stream_name,
                    round = round,
                    size = size,
                    error = %e,
                    "Batch submission failed"
                );
                self.send_monitoring_event(IngestEvent::batch_error(
                    stream_name,
                    round,
                    size,
                    e.to_string(),
                ))
                .await;
                Err(e.into())
            }
        }
    }

    async fn exhausted(
        &self,
        rounds: u32,
        submitted: usize,
        delivered: usize,
        failed: Vec<FailedRecord>,
        start: Instant,
    ) -> Result<IngestReport> {
        let stream_name = self.config.stream_name.as_str();
        self.send_monitoring_event(IngestEvent::exhausted(stream_name, rounds, failed.len()))
            .await;

        match self.config.retry.on_exhaustion {
            ExhaustionPolicy::Fail => {
                error!(
                    stream = %stream_name,
                    rounds = rounds,
                    outstanding = failed.len(),
                    "Retries exhausted, giving up"
                );
                Err(IngestError::ExhaustedRetries {
                    attempts: rounds,
                    failed,
                })
            }
            ExhaustionPolicy::ReturnPartial => {
                warn!(
                    stream = %stream_name,
                    rounds = rounds,
                    delivered = delivered,
                    outstanding = failed.len(),
                    "Retries exhausted, returning partial result"
                );
                self.send_monitoring_event(IngestEvent::ingest_complete(
                    stream_name,
                    rounds,
                    delivered,
                    failed.len(),
                    start.elapsed(),
                ))
                .await;

                Ok(IngestReport {
                    rounds,
                    submitted,
                    delivered,
                    outstanding: failed,
                    elapsed: start.elapsed(),
                })
            }
        }
    }

    async fn cancelled(&self, rounds: u32, outstanding: usize) -> IngestError {
        info!(
            stream = %self.config.stream_name,
            rounds = rounds,
            outstanding = outstanding,
            "Shutdown requested, stopping ingestion"
        );
        self.send_monitoring_event(IngestEvent::cancelled(
            &self.config.stream_name,
            rounds,
            outstanding,
        ))
        .await;
        IngestError::Cancelled {
            rounds,
            outstanding,
        }
    }

    /// Sleep for `delay`; returns true if shutdown was requested meanwhile
    async fn wait_for_backoff(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return false,
                changed = shutdown.changed() => match changed {
                    Ok(()) if *shutdown.borrow() => {
                        debug!("Backoff interrupted by shutdown signal");
                        return true;
                    }
                    Ok(()) => continue,
                    // Sender gone, nobody can ask for shutdown any more
                    Err(_) => {
                        (&mut sleep).await;
                        return false;
                    }
                },
            }
        }
    }

    /// Sends a monitoring event if monitoring is enabled; never blocks ingestion
    async fn send_monitoring_event(&self, event: IngestEvent) {
        if let Some(tx) = &self.monitoring_tx {
            if let Err(e) = tx.try_send(event) {
                warn!(error = %e, "Failed to send monitoring event");
            } else {
                trace!("Sent monitoring event successfully");
            }
        }
    }
}
