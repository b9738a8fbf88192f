//! Retry policy and delay calculation.
//!
//! [`RetryPolicy`] bounds how many times a resolution is re-attempted and
//! how long to wait between attempts. The attempt loop itself lives in
//! [`Resolver`](crate::Resolver); this module is pure configuration.

use std::time::Duration;

/// Default base delay for [`RetryPolicy::exponential`].
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// How a failed resolution is retried.
///
/// ```rust
/// # use huginn::RetryPolicy;
/// # use std::time::Duration;
/// let policy = RetryPolicy::exponential_with_base(3, Duration::from_millis(200));
/// assert_eq!(policy.max_attempts(), 4);
/// assert_eq!(policy.delay(2), Duration::from_millis(800));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RetryPolicy {
    /// Single attempt.
    #[default]
    None,
    /// Retry `count` times immediately.
    Fixed { count: u32 },
    /// Retry up to `max_retries` times, waiting `base_delay * 2^n` before
    /// retry `n` (0-indexed).
    ExponentialBackoff {
        max_retries: u32,
        base_delay: Duration,
    },
}

impl RetryPolicy {
    /// Retry `count` times without waiting.
    pub fn fixed(count: u32) -> Self {
        Self::Fixed { count }
    }

    /// Exponential backoff from a one second base delay.
    pub fn exponential(max_retries: u32) -> Self {
        Self::exponential_with_base(max_retries, DEFAULT_BASE_DELAY)
    }

    /// Exponential backoff from a custom base delay.
    pub fn exponential_with_base(max_retries: u32, base_delay: Duration) -> Self {
        Self::ExponentialBackoff {
            max_retries,
            base_delay,
        }
    }

    /// Number of retries after the initial attempt.
    pub fn max_retries(&self) -> u32 {
        match *self {
            Self::None => 0,
            Self::Fixed { count } => count,
            Self::ExponentialBackoff { max_retries, .. } => max_retries,
        }
    }

    /// Total attempts, including the initial one.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries().saturating_add(1)
    }

    /// Wait before retry number `retry` (0-indexed, so `delay(0)` precedes
    /// the second attempt).
    pub fn delay(&self, retry: u32) -> Duration {
        match *self {
            Self::None | Self::Fixed { .. } => Duration::ZERO,
            Self::ExponentialBackoff { base_delay, .. } => {
                base_delay.saturating_mul(2u32.saturating_pow(retry))
            }
        }
    }
}
