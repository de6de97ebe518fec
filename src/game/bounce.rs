//! Bounce Locomotion
//!
//! Alternative to rolling: the character hops on a sine clock. Near the
//! crest of the wave (`sin > HOP_THRESHOLD`) it gets one upward impulse and
//! may steer; the rest of the cycle it only bobs visually.

use serde::{Deserialize, Serialize};

use crate::config::CharacterConfig;

/// `sin(phase)` above this opens the hop window.
pub const HOP_THRESHOLD: f32 = 0.95;

/// Result of advancing the oscillator one tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BounceStep {
    /// Vertical visual scale multiplier, `1 + sin(phase) * amplitude`.
    pub bob_scale: f32,
    /// Window opened this tick: apply the hop impulse.
    pub hop: bool,
    /// Inside the hop window: move force may be applied.
    pub move_window: bool,
}

impl Default for BounceStep {
    fn default() -> Self {
        Self {
            bob_scale: 1.0,
            hop: false,
            move_window: true,
        }
    }
}

/// Phase accumulator driving the hop cycle.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BounceOscillator {
    phase: f32,
    in_window: bool,
}

impl BounceOscillator {
    /// Current phase in radians, wrapped to `[0, 2π)`.
    #[inline]
    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// Advance by `dt` and report what this tick allows.
    pub fn advance(&mut self, dt: f32, config: &CharacterConfig) -> BounceStep {
        self.phase = (self.phase + dt * config.bounce_frequency).rem_euclid(std::f32::consts::TAU);
        let wave = self.phase.sin();

        let move_window = wave > HOP_THRESHOLD;
        let hop = move_window && !self.in_window;
        self.in_window = move_window;

        BounceStep {
            bob_scale: 1.0 + wave * config.bounce_amplitude,
            hop,
            move_window,
        }
    }
}
