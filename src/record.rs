//! Record and per-record outcome types

use bytes::Bytes;
use std::fmt;

/// A single entry destined for the stream
///
/// Records are immutable once built. The ingester never inspects the payload;
/// it only filters and re-packages records between rounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    data: Bytes,
    partition_key: String,
}

impl Record {
    pub fn new(data: impl Into<Bytes>, partition_key: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            partition_key: partition_key.into(),
        }
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }

    /// Size counted against the per-request payload limit (data plus partition key)
    pub fn encoded_len(&self) -> usize {
        self.data.len() + self.partition_key.len()
    }
}

/// Per-record rejection reported by the sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordError {
    pub code: String,
    pub message: Option<String>,
}

impl RecordError {
    pub fn new(code: impl Into<String>, message: Option<String>) -> Self {
        Self {
            code: code.into(),
            message,
        }
    }
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {}", self.code, message),
            None => f.write_str(&self.code),
        }
    }
}

/// Outcome of one record within a submitted batch, in submission order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Accepted {
        sequence_number: Option<String>,
        shard_id: Option<String>,
    },
    Rejected(RecordError),
}

impl SubmissionOutcome {
    pub fn accepted() -> Self {
        SubmissionOutcome::Accepted {
            sequence_number: None,
            shard_id: None,
        }
    }

    pub fn rejected(code: impl Into<String>, message: impl Into<String>) -> Self {
        SubmissionOutcome::Rejected(RecordError::new(code, Some(message.into())))
    }

    /// Build an outcome from raw result fields; an absent or empty error code means success
    pub fn from_parts(
        error_code: Option<&str>,
        error_message: Option<&str>,
        sequence_number: Option<&str>,
        shard_id: Option<&str>,
    ) -> Self {
        match error_code {
            Some(code) if !code.is_empty() => SubmissionOutcome::Rejected(RecordError::new(
                code,
                error_message.map(String::from),
            )),
            _ => SubmissionOutcome::Accepted {
                sequence_number: sequence_number.map(String::from),
                shard_id: shard_id.map(String::from),
            },
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, SubmissionOutcome::Rejected(_))
    }

    pub fn error(&self) -> Option<&RecordError> {
        match self {
            SubmissionOutcome::Rejected(err) => Some(err),
            SubmissionOutcome::Accepted { .. } => None,
        }
    }
}

/// A record that was still outstanding when ingestion stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedRecord {
    /// Position in the caller's original input
    pub index: usize,
    pub record: Record,
    /// Last rejection seen for this record
    pub error: RecordError,
}
