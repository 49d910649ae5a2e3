//! Retry policy for partially failed batches

mod backoff;

pub use backoff::{Backoff, ExponentialBackoff, ExponentialBackoffBuilder, FixedBackoff, NoBackoff};

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default bound on submission rounds
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// What to do when records are still failing after the last allowed round
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustionPolicy {
    /// Return `IngestError::ExhaustedRetries`
    #[default]
    Fail,
    /// Return a report listing the records that never succeeded
    ReturnPartial,
}

/// Serializable description of the delay between rounds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackoffConfig {
    #[default]
    None,
    Fixed {
        delay: Duration,
    },
    Exponential {
        initial_delay: Duration,
        max_delay: Duration,
        multiplier: f64,
        jitter_factor: f64,
    },
}

impl BackoffConfig {
    pub fn build(&self) -> Box<dyn Backoff> {
        match self {
            BackoffConfig::None => Box::new(NoBackoff),
            BackoffConfig::Fixed { delay } => Box::new(FixedBackoff::new(*delay)),
            BackoffConfig::Exponential {
                initial_delay,
                max_delay,
                multiplier,
                jitter_factor,
            } => Box::new(
                ExponentialBackoff::builder()
                    .initial_delay(*initial_delay)
                    .max_delay(*max_delay)
                    .multiplier(*multiplier)
                    .jitter_factor(*jitter_factor)
                    .build(),
            ),
        }
    }
}

/// Configuration for the ingestion retry loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of submission rounds (None for unbounded)
    pub max_attempts: Option<u32>,
    /// Delay between rounds
    pub backoff: BackoffConfig,
    /// Behaviour once `max_attempts` or `deadline` is reached
    pub on_exhaustion: ExhaustionPolicy,
    /// Wall-clock limit for the whole call, checked after each round
    pub deadline: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Some(DEFAULT_MAX_ATTEMPTS),
            backoff: BackoffConfig::None,
            on_exhaustion: ExhaustionPolicy::Fail,
            deadline: None,
        }
    }
}

impl RetryPolicy {
    /// Whether no further round may start after `attempts` rounds taking `elapsed`
    pub fn is_exhausted(&self, attempts: u32, elapsed: Duration) -> bool {
        let attempts_spent = self.max_attempts.is_some_and(|max| attempts >= max);
        let deadline_passed = self.deadline.is_some_and(|deadline| elapsed >= deadline);
        attempts_spent || deadline_passed
    }
}
