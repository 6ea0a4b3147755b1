//! Exponential backoff policy for email delivery retries.

use std::time::Duration;

use chrono::{DateTime, Utc};

use printshop_common::config::AppConfig;
use printshop_common::types::EmailDelivery;

/// Default attempt ceiling.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
/// Default delay after the first failed attempt.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(60);
/// Default upper bound on the delay between attempts.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(3600);

/// Retry policy: `delay = min(cap, base * 2^(attempts - 1))`, up to `max_attempts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_attempts: config.email_retry_max_attempts,
            base_delay: Duration::from_secs(config.email_retry_base_seconds),
            max_delay: Duration::from_secs(config.email_retry_cap_seconds),
        }
    }

    /// The ceiling as stored in the `attempts` column.
    pub fn max_attempts_i32(&self) -> i32 {
        i32::try_from(self.max_attempts).unwrap_or(i32::MAX)
    }

    /// Delay required after `attempts` attempts before the next one.
    ///
    /// Zero when nothing has been attempted yet.
    pub fn delay_for(&self, attempts: i32) -> Duration {
        if attempts <= 0 {
            return Duration::ZERO;
        }

        let exp = (attempts - 1).min(31) as u32;
        self.base_delay
            .checked_mul(1u32 << exp)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Whether the attempt ceiling has been reached.
    pub fn is_exhausted(&self, attempts: i32) -> bool {
        attempts >= self.max_attempts_i32()
    }

    /// Whether the backoff window for `delivery` has elapsed at `now`.
    ///
    /// A last attempt recorded in the future (clock skew) is treated as not yet due.
    pub fn is_due(&self, delivery: &EmailDelivery, now: DateTime<Utc>) -> bool {
        let Some(last_attempt_at) = delivery.last_attempt_at else {
            return true;
        };

        match now.signed_duration_since(last_attempt_at).to_std() {
            Ok(elapsed) => elapsed >= self.delay_for(delivery.attempts),
            Err(_) => false,
        }
    }

    /// Earliest time the next attempt may run, if one is allowed at all.
    pub fn next_attempt_at(&self, delivery: &EmailDelivery) -> Option<DateTime<Utc>> {
        if self.is_exhausted(delivery.attempts) {
            return None;
        }
        let delay = chrono::Duration::from_std(self.delay_for(delivery.attempts)).ok()?;
        Some(delivery.last_attempt_at.map_or(delivery.created_at, |t| t + delay))
    }
}
