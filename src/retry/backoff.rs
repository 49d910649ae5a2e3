use rand::Rng;
use std::time::Duration;
use tracing::trace;

/// Delay applied between ingestion rounds
pub trait Backoff: Send + Sync {
    /// Delay before retry number `retry` (0 for the first retry)
    fn next_delay(&self, retry: u32) -> Duration;
}

/// Resubmit immediately
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBackoff;

impl Backoff for NoBackoff {
    fn next_delay(&self, _retry: u32) -> Duration {
        Duration::ZERO
    }
}

/// Exponential backoff with jitter
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    jitter_factor: f64,
}

impl ExponentialBackoff {
    pub fn new(initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay,
            multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }

    pub fn builder() -> ExponentialBackoffBuilder {
        ExponentialBackoffBuilder::default()
    }

    fn calculate_delay(&self, retry: u32) -> Duration {
        let base = self.initial_delay.as_millis() as f64;
        let exp_delay = base * self.multiplier.powi(retry.min(i32::MAX as u32) as i32);
        let max_ms = self.max_delay.as_millis() as f64;

        // Jitter applies to the capped delay
        let capped_delay = exp_delay.min(max_ms);

        let jitter_range = capped_delay * self.jitter_factor;
        let jitter = if jitter_range > 0.0 {
            rand::thread_rng().gen_range(-jitter_range..=jitter_range)
        } else {
            0.0
        };

        let final_delay = (capped_delay + jitter).clamp(0.0, max_ms);

        trace!(
            retry = retry,
            base_delay_ms = capped_delay,
            jitter_ms = jitter,
            final_delay_ms = final_delay,
            "Calculated backoff delay"
        );

        Duration::from_millis(final_delay as u64)
    }
}

impl Backoff for ExponentialBackoff {
    fn next_delay(&self, retry: u32) -> Duration {
        self.calculate_delay(retry)
    }
}

/// Builder for [`ExponentialBackoff`], starting from 100ms doubling up to 30s with 10% jitter
#[derive(Debug, Clone)]
pub struct ExponentialBackoffBuilder {
    backoff: ExponentialBackoff,
}

impl Default for ExponentialBackoffBuilder {
    fn default() -> Self {
        Self {
            backoff: ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(30)),
        }
    }
}

impl ExponentialBackoffBuilder {
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.backoff.initial_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.backoff.max_delay = delay;
        self
    }

    /// Growth factor per retry; values below 1 are raised to 1
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.backoff.multiplier = multiplier.max(1.0);
        self
    }

    /// Fraction of the delay added or removed at random, within 0..=1
    pub fn jitter_factor(mut self, factor: f64) -> Self {
        self.backoff.jitter_factor = factor.clamp(0.0, 1.0);
        self
    }

    pub fn build(self) -> ExponentialBackoff {
        self.backoff
    }
}

/// Same delay before every retry
#[derive(Debug, Clone)]
pub struct FixedBackoff {
    delay: Duration,
}

impl FixedBackoff {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Backoff for FixedBackoff {
    fn next_delay(&self, retry: u32) -> Duration {
        trace!(retry = retry, delay_ms = ?self.delay.as_millis(), "Fixed backoff delay");
        self.delay
    }
}
