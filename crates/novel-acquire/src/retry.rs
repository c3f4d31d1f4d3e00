//! Bounded retry loop as an explicit state machine.
//!
//! ```text
//! Attempting(1) --fail--> Attempting(2) --fail--> ... Attempting(max) --fail--> Exhausted
//!       \______________________ succeed ______________________/
//!                                  |
//!                               Success
//! ```

use std::time::Duration;

/// Default number of attempts per chapter (including the first).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Where a chapter fetch currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// About to issue attempt `n` (1-indexed).
    Attempting(u32),
    Success,
    Exhausted,
}

impl RetryState {
    pub fn start() -> Self {
        RetryState::Attempting(1)
    }

    /// Transition after a successful attempt.
    pub fn succeed(self) -> Self {
        match self {
            RetryState::Attempting(_) => RetryState::Success,
            terminal => terminal,
        }
    }

    /// Transition after a failed attempt.
    pub fn fail(self, policy: &RetryPolicy) -> Self {
        match self {
            RetryState::Attempting(n) if n < policy.max_attempts => RetryState::Attempting(n + 1),
            RetryState::Attempting(_) => RetryState::Exhausted,
            terminal => terminal,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RetryState::Attempting(_))
    }
}

/// How many attempts a chapter gets, and how long to wait between them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    /// `max_attempts` is clamped to at least 1.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Pause between a failed attempt and the next one. Zero means retry immediately.
    pub fn delay(&self) -> Duration {
        self.delay
    }
}
