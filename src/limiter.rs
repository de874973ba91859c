//! Minimum-spacing rate limiter for outgoing requests.
//!
//! A quota of `n` requests per minute becomes a fixed gap of
//! `ceil(60000 / n)` milliseconds between granted turns.

use std::sync::Mutex;
use std::time::Duration;
use tokio::time::{Instant, sleep_until};
use tracing::trace;

const MILLIS_PER_MINUTE: u64 = 60_000;

#[derive(Debug)]
struct LimiterState {
    min_interval: Duration,
    next_allowed_at: Option<Instant>,
}

#[derive(Debug)]
pub struct RateLimiter {
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    /// Builds a limiter; the quota is floored and clamped to at least one request per minute.
    pub fn new(requests_per_minute: f64) -> Self {
        Self {
            state: Mutex::new(LimiterState {
                min_interval: interval_for(clamp_per_minute(requests_per_minute)),
                next_allowed_at: None,
            }),
        }
    }

    /// Changes the quota for turns reserved from now on. Non-finite or
    /// non-positive values are ignored.
    pub fn configure(&self, requests_per_minute: f64) {
        if !is_positive_finite(requests_per_minute) {
            return;
        }
        let min_interval = interval_for(clamp_per_minute(requests_per_minute));
        self.lock().min_interval = min_interval;
    }

    pub fn min_interval(&self) -> Duration {
        self.lock().min_interval
    }

    /// Waits until this caller may send its request.
    ///
    /// The turn is reserved before suspending, so overlapping callers are
    /// granted in call order and stay `min_interval` apart.
    pub async fn wait_turn(&self) {
        let granted_at = {
            let mut state = self.lock();
            let now = Instant::now();
            let granted_at = state.next_allowed_at.map_or(now, |next| next.max(now));
            state.next_allowed_at = Some(granted_at + state.min_interval);
            granted_at
        };

        let wait = granted_at.saturating_duration_since(Instant::now());
        if !wait.is_zero() {
            trace!(wait_ms = wait.as_millis() as u64, "rate limiter delaying request");
            sleep_until(granted_at).await;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LimiterState> {
        // The state is plain data; a poisoned lock still holds a usable value.
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

pub(crate) fn is_positive_finite(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn clamp_per_minute(requests_per_minute: f64) -> u64 {
    if !requests_per_minute.is_finite() {
        return 1;
    }
    requests_per_minute.floor().max(1.0) as u64
}

fn interval_for(requests_per_minute: u64) -> Duration {
    Duration::from_millis(MILLIS_PER_MINUTE.div_ceil(requests_per_minute))
}
