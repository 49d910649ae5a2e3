//! Error types for batch ingestion

use crate::client::SinkError;
use crate::record::FailedRecord;
use thiserror::Error;

/// Main error type for ingestion operations
#[derive(Debug, Error)]
pub enum IngestError {
    /// The sink call itself could not complete. Not retried within the round.
    #[error("Transport error: {0}")]
    Transport(#[from] SinkError),

    #[error("Protocol violation: sent {expected} records but received {actual} outcomes")]
    ProtocolViolation { expected: usize, actual: usize },

    #[error("Retries exhausted after {attempts} attempts with {} records outstanding", failed.len())]
    ExhaustedRetries {
        attempts: u32,
        failed: Vec<FailedRecord>,
    },

    #[error("Ingestion cancelled after {rounds} rounds with {outstanding} records outstanding")]
    Cancelled { rounds: u32, outstanding: usize },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl IngestError {
    pub fn is_transport(&self) -> bool {
        matches!(self, IngestError::Transport(_))
    }

    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, IngestError::ProtocolViolation { .. })
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, IngestError::ExhaustedRetries { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, IngestError::Cancelled { .. })
    }

    /// Records still failing when retries ran out
    pub fn failed_records(&self) -> &[FailedRecord] {
        match self {
            IngestError::ExhaustedRetries { failed, .. } => failed,
            _ => &[],
        }
    }
}

/// Result type for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;
