//! Backoff for reconciler retries.

use std::time::Duration;

use backon::ExponentialBuilder;

/// Bounded exponential backoff with jitter.
///
/// `max_attempts` counts the first try, so an event is retried at most
/// `max_attempts - 1` times.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: f32,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            base_delay: Duration::from_millis(500),
            multiplier: 1.5,
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn backoff(&self) -> ExponentialBuilder {
        self.backoff_after(0)
    }

    /// Backoff for a retry loop that starts after `spent` attempts were
    /// already made elsewhere. The loop's own first try is attempt
    /// `spent + 1`, so it may retry `max_attempts - spent - 1` more times.
    pub fn backoff_after(&self, spent: u32) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.delay_before_retry(spent))
            .with_factor(self.multiplier)
            .with_max_delay(self.max_delay)
            .with_max_times(self.remaining_after(spent + 1) as usize)
            .with_jitter()
    }

    /// Attempts still allowed once `spent` have been made.
    pub fn remaining_after(&self, spent: u32) -> u32 {
        self.max_attempts.saturating_sub(spent)
    }

    /// Delay before the `retry`-th retry (0-based), before jitter.
    pub fn delay_before_retry(&self, retry: u32) -> Duration {
        let base = self.base_delay.as_millis() as f64;
        let millis = base * f64::from(self.multiplier).powi(retry as i32);
        Duration::from_millis(millis.round() as u64).min(self.max_delay)
    }

    /// Upper bound on the time spent sleeping between attempts, before jitter.
    pub fn worst_case_delay(&self) -> Duration {
        (0..self.max_attempts.saturating_sub(1))
            .map(|retry| self.delay_before_retry(retry))
            .sum()
    }
}
