//! Wall-clock deadline shared by every attempt of one logical request.
//!
//! The remaining budget is `budget - elapsed`, recomputed on every call, so
//! retries and backend switches all draw from the same pool of time.

use std::time::Duration;
use tokio::time::Instant;

/// A deadline started at construction time.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    /// Starts a deadline with the given overall budget.
    pub fn new(budget: Duration) -> Self {
        Self::starting_at(Instant::now(), budget)
    }

    /// Creates a deadline that started at `started`.
    pub fn starting_at(started: Instant, budget: Duration) -> Self {
        Self { started, budget }
    }

    /// The overall budget.
    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Time spent since the deadline started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Remaining budget, saturating at zero.
    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.elapsed())
    }

    /// Timeout for the next attempt: `min(cap, remaining - margin)`.
    ///
    /// Returns `None` when no further attempt may start.
    pub fn attempt_timeout(&self, cap: Duration, margin: Duration) -> Option<Duration> {
        let remaining = self.remaining();
        if remaining <= margin {
            return None;
        }
        Some(cap.min(remaining - margin))
    }

    /// Clamps a sleep so it never eats into the safety margin.
    pub fn clamp_sleep(&self, delay: Duration, margin: Duration) -> Duration {
        delay.min(self.remaining().saturating_sub(margin))
    }
}
