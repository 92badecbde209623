//! Exponential backoff shared by queue items and chunk uploads

use rand::Rng;
use std::time::Duration;

/// Unjittered delay for the n-th retry: `min(initial * 2^n, max)`
pub fn backoff_delay(retry_count: u32, initial_ms: u64, max_ms: u64) -> u64 {
    // 2^63 already overflows any sane initial delay
    let factor = 1u64.checked_shl(retry_count.min(63)).unwrap_or(u64::MAX);
    initial_ms.saturating_mul(factor).min(max_ms)
}

/// Applies multiplicative jitter in `[0.75, 1.25]`
pub fn jitter(delay_ms: u64) -> u64 {
    let factor: f64 = rand::rng().random_range(0.75..=1.25);
    (delay_ms as f64 * factor).round() as u64
}

pub fn jittered_delay(retry_count: u32, initial_ms: u64, max_ms: u64) -> u64 {
    jitter(backoff_delay(retry_count, initial_ms, max_ms))
}

/// Backoff parameters bundled for callers that sleep between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub initial_ms: u64,
    pub max_ms: u64,
}

impl Backoff {
    pub fn new(initial_ms: u64, max_ms: u64) -> Self {
        Self { initial_ms, max_ms }
    }

    pub fn delay(&self, retry_count: u32) -> u64 {
        backoff_delay(retry_count, self.initial_ms, self.max_ms)
    }

    pub fn jittered(&self, retry_count: u32) -> Duration {
        Duration::from_millis(jittered_delay(retry_count, self.initial_ms, self.max_ms))
    }

    /// Whether a queue item last attempted at `last_attempt` may run again at `now`.
    ///
    /// The window is drawn with jitter on every check, so items with the same
    /// retry count do not all become eligible in the same cycle.
    pub fn window_elapsed(&self, retry_count: u32, last_attempt: Option<i64>, now_ms: i64) -> bool {
        if retry_count == 0 {
            return true;
        }
        let Some(last) = last_attempt else {
            return true;
        };
        let wait = jittered_delay(retry_count, self.initial_ms, self.max_ms) as i64;
        now_ms.saturating_sub(last) >= wait
    }
}
