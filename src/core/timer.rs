//! Accumulate-Compare Timers
//!
//! Every timed phase in the simulation (charging, cooldown, slam prep) is an
//! elapsed counter advanced by a known delta and compared against a fixed
//! duration. Nothing sleeps or suspends.

use serde::{Deserialize, Serialize};

/// Slack used when comparing accumulated time against a duration.
///
/// Summing ten deltas of 0.1 lands just below 1.0 in f32; without slack the
/// threshold would be reached one step late.
pub const TIMER_EPSILON: f32 = 1e-5;

/// Elapsed time against a fixed duration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseTimer {
    elapsed: f32,
    duration: f32,
}

impl PhaseTimer {
    /// Create a timer that completes after `duration` seconds.
    pub fn new(duration: f32) -> Self {
        Self {
            elapsed: 0.0,
            duration: duration.max(0.0),
        }
    }

    /// Advance by `dt` seconds. Elapsed time never exceeds the duration.
    ///
    /// Returns true only on the call that completes the timer.
    pub fn advance(&mut self, dt: f32) -> bool {
        let was_done = self.is_done();
        self.elapsed = (self.elapsed + dt.max(0.0)).min(self.duration);
        if !was_done && self.elapsed + TIMER_EPSILON >= self.duration {
            self.elapsed = self.duration;
            return true;
        }
        false
    }

    /// Has the full duration accumulated?
    #[inline]
    pub fn is_done(&self) -> bool {
        self.elapsed >= self.duration
    }

    /// Elapsed seconds.
    #[inline]
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Completion ratio in [0, 1]. A zero-length timer is always complete.
    #[inline]
    pub fn progress(&self) -> f32 {
        if self.duration <= 0.0 {
            1.0
        } else {
            (self.elapsed / self.duration).clamp(0.0, 1.0)
        }
    }
}

/// Hold time clamped to a maximum, converted to a release ratio.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChargeTimer {
    held: f32,
    max: f32,
}

impl ChargeTimer {
    /// Create an empty charge with the given ceiling.
    pub fn new(max: f32) -> Self {
        Self {
            held: 0.0,
            max: max.max(0.0),
        }
    }

    /// Accumulate `dt` seconds of hold time, clamped at the ceiling.
    pub fn accumulate(&mut self, dt: f32) {
        self.held = (self.held + dt.max(0.0)).min(self.max);
    }

    /// Seconds held so far (never above the ceiling).
    #[inline]
    pub fn held(&self) -> f32 {
        self.held
    }

    /// Release ratio: `min(held, max) / max`.
    #[inline]
    pub fn ratio(&self) -> f32 {
        charge_ratio(self.held, self.max)
    }

    /// Reset to zero held time.
    pub fn reset(&mut self) {
        self.held = 0.0;
    }
}

/// `min(elapsed, max) / max`, clamped to [0, 1]. Zero when `max` is not positive.
#[inline]
pub fn charge_ratio(elapsed: f32, max: f32) -> f32 {
    if max <= 0.0 {
        return 0.0;
    }
    (elapsed.min(max) / max).clamp(0.0, 1.0)
}
