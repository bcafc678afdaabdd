// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bounded retry for storage opens.
//
// Removable media routinely refuses an open for a few milliseconds (card
// busy, contact bounce). Every open the ring performs goes through a
// `RetryPolicy`; waits between attempts go through the `Pause` seam so
// tests can record the schedule instead of sleeping.

use std::cell::RefCell;
use std::io;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Something that can block the current thread for a while.
pub trait Pause {
    /// Wait for `duration`.
    fn pause(&self, duration: Duration);
}

/// Sleeps the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadPause;

impl Pause for ThreadPause {
    fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Records requested pauses without waiting.
#[derive(Debug, Default)]
pub struct RecordedPauses {
    pauses: RefCell<Vec<Duration>>,
}

impl RecordedPauses {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every pause requested so far, in order.
    pub fn recorded(&self) -> Vec<Duration> {
        self.pauses.borrow().clone()
    }
}

impl Pause for RecordedPauses {
    fn pause(&self, duration: Duration) {
        self.pauses.borrow_mut().push(duration);
    }
}

impl<P: Pause + ?Sized> Pause for &P {
    fn pause(&self, duration: Duration) {
        (**self).pause(duration);
    }
}

/// Attempt count and backoff schedule for storage opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub attempts: u32,
    /// Wait after the first failed attempt, in milliseconds.
    pub initial_delay_ms: u64,
    /// Factor applied to the wait after each further failure. One keeps a
    /// fixed delay.
    pub backoff: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            initial_delay_ms: 10,
            backoff: 2,
        }
    }
}

impl RetryPolicy {
    /// A policy that tries exactly once.
    pub fn none() -> Self {
        Self {
            attempts: 1,
            initial_delay_ms: 0,
            backoff: 1,
        }
    }

    /// A fixed-delay policy.
    pub fn fixed(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts,
            initial_delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            backoff: 1,
        }
    }

    /// The wait following failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = u64::from(self.backoff.max(1)).saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.initial_delay_ms.saturating_mul(factor))
    }

    /// Run `op` until it succeeds or the attempt budget is spent, pausing
    /// between attempts. Returns the last error on exhaustion.
    pub fn run<T, P, F>(&self, pause: &P, what: &str, mut op: F) -> io::Result<T>
    where
        P: Pause + ?Sized,
        F: FnMut() -> io::Result<T>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(error) if attempt < attempts => {
                    let delay = self.delay_after(attempt);
                    debug!(
                        what,
                        attempt,
                        attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Storage operation failed, retrying"
                    );
                    pause.pause(delay);
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failing_then_ok(failures: u32) -> impl FnMut() -> io::Result<u32> {
        let mut calls = 0;
        move || {
            calls += 1;
            if calls <= failures {
                Err(io::Error::other("busy"))
            } else {
                Ok(calls)
            }
        }
    }

    #[test]
    fn test_first_attempt_success_does_not_pause() {
        let pauses = RecordedPauses::new();
        let result = RetryPolicy::default().run(&pauses, "open", failing_then_ok(0));
        assert_eq!(result.unwrap(), 1);
        assert!(pauses.recorded().is_empty());
    }

    #[test]
    fn test_backoff_schedule() {
        let pauses = RecordedPauses::new();
        let policy = RetryPolicy {
            attempts: 4,
            initial_delay_ms: 10,
            backoff: 2,
        };
        let result = policy.run(&pauses, "open", failing_then_ok(3));
        assert_eq!(result.unwrap(), 4);
        assert_eq!(
            pauses.recorded(),
            vec![
                Duration::from_millis(10),
                Duration::from_millis(20),
                Duration::from_millis(40),
            ]
        );
    }

    #[test]
    fn test_exhaustion_returns_last_error() {
        let pauses = RecordedPauses::new();
        let policy = RetryPolicy::fixed(3, Duration::from_millis(5));
        let result = policy.run(&pauses, "open", failing_then_ok(10));
        assert!(result.is_err());
        assert_eq!(pauses.recorded(), vec![Duration::from_millis(5); 2]);
    }

    #[test]
    fn test_zero_attempts_still_tries_once() {
        let pauses = RecordedPauses::new();
        let policy = RetryPolicy {
            attempts: 0,
            ..RetryPolicy::default()
        };
        assert!(policy.run(&pauses, "open", failing_then_ok(0)).is_ok());
        assert!(policy.run(&pauses, "open", failing_then_ok(1)).is_err());
        assert!(pauses.recorded().is_empty());
    }

    #[test]
    fn test_none_policy() {
        let policy = RetryPolicy::none();
        assert_eq!(policy.attempts, 1);
        assert_eq!(policy.delay_after(1), Duration::ZERO);
    }
}
