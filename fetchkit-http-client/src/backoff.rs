//! Backoff delay calculation.

use rand::Rng;
use std::time::Duration;

/// Backoff strategy for retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackoffStrategy {
    /// Same delay before every retry.
    Fixed,
    /// Delay grows by `base_delay` per attempt.
    Linear,
    /// Delay doubles each attempt.
    #[default]
    Exponential,
}

impl BackoffStrategy {
    /// Delay to wait after the given failed attempt (1-indexed).
    ///
    /// Attempt 0 is treated as 1. Arithmetic saturates at [`Duration::MAX`].
    pub fn base_delay_for(&self, attempt: u32, base_delay: Duration) -> Duration {
        let attempt = attempt.max(1);
        match self {
            Self::Fixed => base_delay,
            Self::Linear => base_delay.saturating_mul(attempt),
            Self::Exponential => match 1u32.checked_shl(attempt - 1) {
                Some(factor) => base_delay.saturating_mul(factor),
                None if base_delay.is_zero() => Duration::ZERO,
                None => Duration::MAX,
            },
        }
    }

    /// Delay for an attempt, with full jitter applied when `jitter` is set.
    pub fn delay(&self, attempt: u32, base_delay: Duration, jitter: bool) -> Duration {
        let delay = self.base_delay_for(attempt, base_delay);
        if jitter { full_jitter(delay) } else { delay }
    }
}

/// Draw a delay uniformly from `[0, delay]`.
pub fn full_jitter(delay: Duration) -> Duration {
    if delay.is_zero() {
        return Duration::ZERO;
    }

    let ceiling = u64::try_from(delay.as_nanos()).unwrap_or(u64::MAX);
    Duration::from_nanos(rand::rng().random_range(0..=ceiling))
}
