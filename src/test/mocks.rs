use crate::client::{RecordSink, ShardPage, SinkError, StartingPosition, StreamReader};
use crate::record::{Record, SubmissionOutcome};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

pub type SubmitResponse = Result<Vec<SubmissionOutcome>, SinkError>;

#[derive(Debug, Clone)]
struct FailureRule {
    /// Remaining rejections, None for every attempt
    remaining: Option<u32>,
    code: String,
}

/// Mock sink for testing
///
/// Scripted responses queued with [`MockSink::mock_submit`] are returned first,
/// one per call, then positional failures queued with
/// [`MockSink::fail_positions_next`]. Otherwise every record is accepted unless
/// a failure rule matches its payload.
#[derive(Debug, Default, Clone)]
pub struct MockSink {
    responses: Arc<Mutex<VecDeque<SubmitResponse>>>,
    failure_rules: Arc<Mutex<HashMap<Bytes, FailureRule>>>,
    fail_all_code: Arc<Mutex<Option<String>>>,
    position_failures: Arc<Mutex<VecDeque<(Vec<usize>, String)>>>,
    submitted: Arc<Mutex<Vec<Vec<Record>>>>,
    sequence: Arc<AtomicU64>,
    submit_delay: Arc<Mutex<Option<Duration>>>,
}

impl MockSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_with_delay(delay: Duration) -> Self {
        let sink = Self::default();
        *sink.submit_delay.lock() = Some(delay);
        sink
    }

    /// Queue the response for the next call
    pub fn mock_submit(&self, response: SubmitResponse) {
        self.responses.lock().push_back(response);
    }

    /// Reject the record with this payload on its next `times` submissions
    pub fn fail_record_times(&self, record: &Record, times: u32, code: &str) {
        self.failure_rules.lock().insert(
            record.data().clone(),
            FailureRule {
                remaining: Some(times),
                code: code.to_string(),
            },
        );
    }

    /// Reject the record with this payload on every submission
    pub fn fail_record_always(&self, record: &Record, code: &str) {
        self.failure_rules.lock().insert(
            record.data().clone(),
            FailureRule {
                remaining: None,
                code: code.to_string(),
            },
        );
    }

    /// Reject the entries at `positions` of the next unscripted call, whatever their content
    pub fn fail_positions_next(&self, positions: &[usize], code: &str) {
        self.position_failures
            .lock()
            .push_back((positions.to_vec(), code.to_string()));
    }

    /// Reject every record on every submission
    pub fn fail_all(&self, code: &str) {
        *self.fail_all_code.lock() = Some(code.to_string());
    }

    pub fn submit_count(&self) -> usize {
        self.submitted.lock().len()
    }

    /// Every batch received, in call order
    pub fn submitted_batches(&self) -> Vec<Vec<Record>> {
        self.submitted.lock().clone()
    }

    fn outcome_for(&self, record: &Record) -> SubmissionOutcome {
        if let Some(code) = self.fail_all_code.lock().as_ref() {
            return SubmissionOutcome::rejected(code.clone(), "Mock rejection");
        }

        let mut rules = self.failure_rules.lock();
        if let Some(rule) = rules.get_mut(record.data()) {
            match rule.remaining {
                None => return SubmissionOutcome::rejected(rule.code.clone(), "Mock rejection"),
                Some(n) if n > 0 => {
                    rule.remaining = Some(n - 1);
                    return SubmissionOutcome::rejected(rule.code.clone(), "Mock rejection");
                }
                Some(_) => {}
            }
        }

        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        SubmissionOutcome::Accepted {
            sequence_number: Some(format!("{:056}", sequence)),
            shard_id: Some("shardId-000000000000".to_string()),
        }
    }
}

#[async_trait]
impl RecordSink for MockSink {
    async fn submit(&self, batch: &[Record]) -> Result<Vec<SubmissionOutcome>, SinkError> {
        let delay = *self.submit_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.submitted.lock().push(batch.to_vec());

        let scripted = self.responses.lock().pop_front();
        if let Some(response) = scripted {
            return response;
        }

        let by_position = self.position_failures.lock().pop_front();
        if let Some((positions, code)) = by_position {
            return Ok((0..batch.len())
                .map(|i| {
                    if positions.contains(&i) {
                        SubmissionOutcome::rejected(code.clone(), "Mock rejection")
                    } else {
                        SubmissionOutcome::accepted()
                    }
                })
                .collect());
        }

        Ok(batch.iter().map(|record| self.outcome_for(record)).collect())
    }
}

/// Mock stream reader for testing listing and cursors
#[derive(Debug, Default, Clone)]
pub struct MockStreamReader {
    describe_responses: Arc<Mutex<VecDeque<Result<ShardPage, SinkError>>>>,
    describe_requests: Arc<Mutex<Vec<Option<String>>>>,
    cursor_responses: Arc<Mutex<VecDeque<Result<String, SinkError>>>>,
    #[allow(clippy::type_complexity)]
    read_responses: Arc<Mutex<VecDeque<Result<(Vec<Record>, Option<String>), SinkError>>>>,
}

impl MockStreamReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mock_describe_page(&self, response: Result<ShardPage, SinkError>) {
        self.describe_responses.lock().push_back(response);
    }

    pub fn mock_open_cursor(&self, response: Result<String, SinkError>) {
        self.cursor_responses.lock().push_back(response);
    }

    pub fn mock_read(&self, response: Result<(Vec<Record>, Option<String>), SinkError>) {
        self.read_responses.lock().push_back(response);
    }

    /// Exclusive start shard ids of every describe call, in order
    pub fn describe_requests(&self) -> Vec<Option<String>> {
        self.describe_requests.lock().clone()
    }
}

#[async_trait]
impl StreamReader for MockStreamReader {
    async fn describe_page(
        &self,
        exclusive_start_shard_id: Option<&str>,
    ) -> Result<ShardPage, SinkError> {
        self.describe_requests
            .lock()
            .push(exclusive_start_shard_id.map(String::from));
        self.describe_responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(ShardPage::default()))
    }

    async fn open_cursor(
        &self,
        shard_id: &str,
        _position: &StartingPosition,
    ) -> Result<String, SinkError> {
        self.cursor_responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(format!("{}-iterator", shard_id)))
    }

    async fn read(
        &self,
        _cursor: &str,
        _limit: i32,
    ) -> Result<(Vec<Record>, Option<String>), SinkError> {
        self.read_responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok((vec![], None)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::TestUtils;

    #[tokio::test]
    async fn test_failure_rules_count_down() -> anyhow::Result<()> {
        let sink = MockSink::new();
        let records = TestUtils::create_test_records(2);
        sink.fail_record_times(&records[0], 1, "InternalFailure");

        let first = sink.submit(&records).await?;
        assert!(first[0].is_failure());
        assert!(!first[1].is_failure());

        let second = sink.submit(&records[..1]).await?;
        assert!(!second[0].is_failure());
        assert_eq!(sink.submit_count(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_scripted_response_takes_priority() {
        let sink = MockSink::new();
        sink.mock_submit(Err(SinkError::ThroughputExceeded));

        let result = sink.submit(&TestUtils::create_test_records(1)).await;
        assert!(matches!(result, Err(SinkError::ThroughputExceeded)));
    }

    #[tokio::test]
    async fn test_position_failures_ignore_content() -> anyhow::Result<()> {
        let sink = MockSink::new();
        let records = vec![TestUtils::create_test_record("same", "pk"); 3];
        sink.fail_positions_next(&[2], "InternalFailure");

        let first = sink.submit(&records).await?;
        let failed: Vec<bool> = first.iter().map(|o| o.is_failure()).collect();
        assert_eq!(failed, vec![false, false, true]);

        let second = sink.submit(&records).await?;
        assert!(second.iter().all(|o| !o.is_failure()));
        Ok(())
    }

    #[tokio::test]
    async fn test_reader_defaults() -> anyhow::Result<()> {
        let reader = MockStreamReader::new();
        reader.mock_read(Ok((TestUtils::create_test_records(2), Some("next".to_string()))));

        let cursor = reader
            .open_cursor("shard-1", &StartingPosition::TrimHorizon)
            .await?;
        assert_eq!(cursor, "shard-1-iterator");

        let (records, next) = reader.read(&cursor, 25).await?;
        assert_eq!(records.len(), 2);
        assert_eq!(next.as_deref(), Some("next"));

        let (records, next) = reader.read("next", 25).await?;
        assert!(records.is_empty());
        assert!(next.is_none());
        Ok(())
    }
}
