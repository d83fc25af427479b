//! Retry delay policy for failed fetches.

use std::time::Duration;
use tgram_core::config::{BackoffKind, PollingConfig};

/// Delay before retrying a failed `getUpdates`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay after every failure.
    Fixed(Duration),
    /// `initial * 2^(failures - 1)`, capped at `max`.
    Exponential { initial: Duration, max: Duration },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Fixed(Duration::from_secs(3))
    }
}

impl Backoff {
    /// Delay after the `failures`-th consecutive failure (1-based).
    pub fn delay(&self, failures: u32) -> Duration {
        match *self {
            Self::Fixed(d) => d,
            Self::Exponential { initial, max } => {
                let factor = 2u32.saturating_pow(failures.saturating_sub(1));
                initial.saturating_mul(factor).min(max)
            }
        }
    }

    pub fn from_config(config: &PollingConfig) -> Self {
        let initial = Duration::from_secs(config.retry_delay_secs);
        match config.backoff {
            BackoffKind::Fixed => Self::Fixed(initial),
            BackoffKind::Exponential => Self::Exponential {
                initial,
                max: Duration::from_secs(config.max_retry_delay_secs),
            },
        }
    }
}
