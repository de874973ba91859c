use backon::BackoffBuilder;
use chrono::{DateTime, Utc};
use rand::Rng as _;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: usize = 3;
const BASE_DELAY: Duration = Duration::from_millis(250);
const MAX_JITTER_MS: u64 = 250;

/// Bounded retry policy for rate-limited calls.
///
/// Used as a `backon` backoff builder: it yields one delay per retry, so a
/// call makes at most `max_attempts` attempts in total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: usize,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

impl BackoffBuilder for RetryPolicy {
    type Backoff = RetryBackoff;

    fn build(self) -> Self::Backoff {
        RetryBackoff {
            remaining: self.max_attempts - 1,
            attempt: 0,
        }
    }
}

#[derive(Debug)]
pub struct RetryBackoff {
    remaining: usize,
    attempt: u32,
}

impl Iterator for RetryBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        self.attempt += 1;
        let jitter = Duration::from_millis(rand::rng().random_range(0..=MAX_JITTER_MS));
        Some(backoff_delay(self.attempt, jitter))
    }
}

/// Exponential delay after the `attempt`-th failed attempt (1-based), plus jitter.
pub fn backoff_delay(attempt: u32, jitter: Duration) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    BASE_DELAY.saturating_mul(factor).saturating_add(jitter)
}

/// Reads `Retry-After` from response headers.
pub fn retry_after_from_headers(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?;
    parse_retry_after(value, Utc::now())
}

/// Parses a `Retry-After` value: delta-seconds first, then an HTTP date.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(seconds) = value.parse::<f64>() {
        if !seconds.is_finite() {
            return None;
        }
        let millis = (seconds * 1000.0).max(0.0);
        return Some(Duration::from_millis(millis as u64));
    }

    let at = DateTime::parse_from_rfc2822(value).ok()?;
    let millis = (at.with_timezone(&Utc) - now).num_milliseconds().max(0);
    Some(Duration::from_millis(millis as u64))
}
