//! Tick-driven timers.
//!
//! Game logic never reads the wall clock. Time only advances through the
//! `dt` handed to each tick, so a recorded sequence of ticks always
//! produces the same phase transitions.

use std::time::Duration;

use crate::TICK_RATE;

/// Duration of one simulation tick at the given rate.
pub fn tick_duration(tick_rate: u32) -> Duration {
    Duration::from_micros(1_000_000 / u64::from(tick_rate.max(1)))
}

/// Duration of one tick at the default `TICK_RATE`.
pub fn default_tick() -> Duration {
    tick_duration(TICK_RATE)
}

fn as_micros_i64(d: Duration) -> i64 {
    i64::try_from(d.as_micros()).unwrap_or(i64::MAX)
}

// =============================================================================
// ROUND TIMER
// =============================================================================

/// Remaining time of the active round.
///
/// Signed: it is allowed to go below zero so observers can see the overshoot
/// of the tick that expired it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RoundTimer {
    remaining_us: i64,
}

impl RoundTimer {
    /// Create a timer holding `duration`.
    pub fn new(duration: Duration) -> Self {
        Self { remaining_us: as_micros_i64(duration) }
    }

    /// Subtract elapsed time.
    pub fn advance(&mut self, dt: Duration) {
        self.remaining_us = self.remaining_us.saturating_sub(as_micros_i64(dt));
    }

    /// True once remaining time is zero or below.
    #[inline]
    pub fn expired(&self) -> bool {
        self.remaining_us <= 0
    }

    /// Remaining microseconds (may be negative).
    #[inline]
    pub fn remaining_micros(&self) -> i64 {
        self.remaining_us
    }

    /// Remaining seconds, for display only.
    pub fn remaining_secs_f32(&self) -> f32 {
        self.remaining_us as f32 / 1_000_000.0
    }
}

// =============================================================================
// DEFERRED TIMER
// =============================================================================

/// A cancellable one-shot callback slot.
///
/// The owner schedules a delay, advances it every tick and acts when
/// `advance` reports that it fired. Firing consumes the schedule.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeferredTimer {
    remaining: Option<Duration>,
}

impl DeferredTimer {
    /// Create an idle timer.
    pub const fn new() -> Self {
        Self { remaining: None }
    }

    /// Schedule (or reschedule) firing after `delay`.
    pub fn schedule(&mut self, delay: Duration) {
        self.remaining = Some(delay);
    }

    /// Drop the pending schedule, if any.
    pub fn cancel(&mut self) {
        self.remaining = None;
    }

    /// Is a callback pending?
    pub fn is_pending(&self) -> bool {
        self.remaining.is_some()
    }

    /// Advance by `dt`. Returns true exactly once, on the tick the delay elapses.
    pub fn advance(&mut self, dt: Duration) -> bool {
        match self.remaining {
            Some(left) if left <= dt => {
                self.remaining = None;
                true
            }
            Some(left) => {
                self.remaining = Some(left - dt);
                false
            }
            None => false,
        }
    }
}
