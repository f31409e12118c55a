//! Reconnect delay policy

use rand::Rng;
use std::time::Duration;

/// Delay before reconnect attempt `n` (0-based).
///
/// With a factor of 1 every attempt waits `initial`; larger factors grow the
/// delay geometrically up to `max`. Jitter adds up to 10% on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    factor: u32,
    jitter: bool,
}

impl Backoff {
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial: delay,
            max: delay,
            factor: 1,
            jitter: false,
        }
    }

    pub fn exponential(initial: Duration, max: Duration, factor: u32) -> Self {
        Self {
            initial,
            max: max.max(initial),
            factor: factor.max(1),
            jitter: false,
        }
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self
            .factor
            .checked_pow(attempt)
            .and_then(|mult| self.initial.checked_mul(mult))
            .map_or(self.max, |d| d.min(self.max));

        if !self.jitter {
            return base;
        }

        let spread = (base.as_millis() / 10) as u64;
        if spread == 0 {
            return base;
        }
        base + Duration::from_millis(rand::thread_rng().gen_range(0..=spread))
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::fixed(Duration::from_millis(3000))
    }
}
