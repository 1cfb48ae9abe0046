//! Throttle shared by every upstream call.
//!
//! The bucket holds `capacity` tokens. A spent token returns to the bucket
//! exactly one `refill_interval` after it was taken, so any window of length
//! `refill_interval` contains at most `capacity` calls, including the boundary
//! between two windows.

use std::{
    collections::VecDeque,
    sync::Mutex,
    time::Duration,
};

use tokio::time::Instant;
use tracing::debug;

pub const DEFAULT_MAX_WAIT_POLLS: u32 = 50;

#[derive(Debug)]
pub struct TokenBucket {
    capacity: usize,
    refill_interval: Duration,
    max_wait_polls: u32,
    spent: Mutex<VecDeque<Instant>>,
}

impl TokenBucket {
    pub fn new(capacity: usize, refill_interval: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            refill_interval,
            max_wait_polls: DEFAULT_MAX_WAIT_POLLS,
            spent: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// How many times a caller may go back to sleep waiting for a token
    /// before giving up with `RateLimitExhausted`.
    pub fn with_max_wait_polls(mut self, max_wait_polls: u32) -> Self {
        self.max_wait_polls = max_wait_polls;
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn refill_interval(&self) -> Duration {
        self.refill_interval
    }

    /// Takes a token if one is available, otherwise returns how long until the
    /// oldest spent token comes back.
    pub fn try_acquire(&self) -> Result<(), Duration> {
        let now = Instant::now();
        let mut spent = self.spent.lock().unwrap_or_else(|e| e.into_inner());

        while let Some(oldest) = spent.front() {
            if *oldest + self.refill_interval <= now {
                spent.pop_front();
            } else {
                break;
            }
        }

        if spent.len() < self.capacity {
            spent.push_back(now);
            return Ok(());
        }

        // Non-empty because capacity is at least one.
        let oldest = spent.front().copied().unwrap_or(now);
        Err((oldest + self.refill_interval).saturating_duration_since(now))
    }

    /// Waits for a token. Only the calling task sleeps, other tasks keep running.
    pub async fn acquire(&self, label: &str) -> crate::Result<()> {
        let mut polls = 0;
        loop {
            let wait = match self.try_acquire() {
                Ok(()) => return Ok(()),
                Err(wait) => wait,
            };

            if polls >= self.max_wait_polls {
                return Err(crate::Error::RateLimitExhausted {
                    label: label.to_string(),
                    waited_polls: polls,
                });
            }
            polls += 1;

            debug!(label, ?wait, polls, "waiting for rate limit token");
            tokio::time::sleep(wait.max(Duration::from_millis(1))).await;
        }
    }

    pub fn available(&self) -> usize {
        let now = Instant::now();
        let spent = self.spent.lock().unwrap_or_else(|e| e.into_inner());
        let in_flight = spent
            .iter()
            .filter(|at| **at + self.refill_interval > now)
            .count();
        self.capacity.saturating_sub(in_flight)
    }
}
