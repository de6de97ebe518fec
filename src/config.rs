//! Simulation Configuration
//!
//! Every tunable constant of a character lives in [`CharacterConfig`].
//! Defaults are the tuned values; a JSON file may override any subset.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default simulation tick rate (Hz).
pub const DEFAULT_TICK_RATE: u32 = 60;

/// How horizontal movement is driven.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocomotionMode {
    /// Continuous rolling force every tick.
    #[default]
    Rolling,
    /// Periodic hops; movement force only applies during the hop window.
    Bouncing,
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// JSON could not be parsed.
    #[error("invalid config json: {0}")]
    Parse(#[from] serde_json::Error),

    /// Config file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// A value is outside its allowed range.
    #[error("invalid value for {field}: {reason}")]
    Invalid {
        /// Offending field name.
        field: &'static str,
        /// Why it was rejected.
        reason: &'static str,
    },
}

/// Per-character tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterConfig {
    // =========================================================================
    // Movement
    // =========================================================================
    /// Horizontal acceleration per unit of move input.
    pub move_force: f32,
    /// Heading smoothing sharpness (1/s).
    pub rotation_sharpness: f32,
    /// Locomotion style.
    pub locomotion: LocomotionMode,

    // =========================================================================
    // Jump
    // =========================================================================
    /// Impulse at full charge.
    pub jump_force: f32,
    /// Hold time for full charge (s).
    pub max_jump_time: f32,
    /// Time to restore squeeze after release (s).
    pub jump_cooldown: f32,
    /// Squeeze at full jump charge.
    pub min_squeeze: f32,

    // =========================================================================
    // Dash
    // =========================================================================
    /// Velocity change at full charge.
    pub dash_force: f32,
    /// Hold time for full charge (s).
    pub max_dash_time: f32,

    // =========================================================================
    // Slam
    // =========================================================================
    /// Hang time before the downward impulse (s).
    pub slam_prep_duration: f32,
    /// Downward impulse applied at the end of prep.
    pub slam_force: f32,
    /// Radius searched for impact targets.
    pub impact_radius: f32,
    /// Explosion impulse sent to each target.
    pub impact_force: f32,
    /// Upward modifier for the explosion impulse.
    pub impact_upward_bias: f32,

    // =========================================================================
    // Ground probe
    // =========================================================================
    /// Radius of the character's collision sphere.
    pub collider_radius: f32,
    /// Radius of the downward probe sphere.
    pub ground_probe_radius: f32,
    /// Probe start height above the collider bottom.
    pub ground_probe_lift: f32,
    /// Distance below the collider bottom still counted as support.
    pub ground_clearance: f32,

    // =========================================================================
    // Bounce locomotion
    // =========================================================================
    /// Upward impulse per hop.
    pub bounce_force: f32,
    /// Phase speed of the hop oscillator (rad/s).
    pub bounce_frequency: f32,
    /// Visual bob amplitude.
    pub bounce_amplitude: f32,

    // =========================================================================
    // Diagnostics
    // =========================================================================
    /// Allowed gap between owner-reported and authoritative charge ratios.
    pub charge_drift_tolerance: f32,
    /// Use the owner's squeeze value while jump charging.
    pub trust_owner_squeeze: bool,
}

impl Default for CharacterConfig {
    fn default() -> Self {
        Self {
            move_force: 10.0,
            rotation_sharpness: 12.0,
            locomotion: LocomotionMode::Rolling,
            jump_force: 10.0,
            max_jump_time: 1.0,
            jump_cooldown: 0.25,
            min_squeeze: 0.5,
            dash_force: 15.0,
            max_dash_time: 0.5,
            slam_prep_duration: 0.25,
            slam_force: 30.0,
            impact_radius: 5.0,
            impact_force: 20.0,
            impact_upward_bias: 1.0,
            collider_radius: 0.5,
            ground_probe_radius: 0.45,
            ground_probe_lift: 0.1,
            ground_clearance: 0.1,
            bounce_force: 5.0,
            bounce_frequency: 2.0,
            bounce_amplitude: 0.2,
            charge_drift_tolerance: 0.15,
            trust_owner_squeeze: false,
        }
    }
}

impl CharacterConfig {
    /// Parse from JSON. Missing fields take their default.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(ConfigError::Invalid { field, reason: "must be positive" })
            }
        }
        fn non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
            if value.is_finite() && value >= 0.0 {
                Ok(())
            } else {
                Err(ConfigError::Invalid { field, reason: "must not be negative" })
            }
        }

        positive("max_jump_time", self.max_jump_time)?;
        positive("max_dash_time", self.max_dash_time)?;
        positive("slam_prep_duration", self.slam_prep_duration)?;
        positive("collider_radius", self.collider_radius)?;
        positive("ground_probe_radius", self.ground_probe_radius)?;
        positive("impact_radius", self.impact_radius)?;
        non_negative("jump_cooldown", self.jump_cooldown)?;
        non_negative("move_force", self.move_force)?;
        non_negative("rotation_sharpness", self.rotation_sharpness)?;
        non_negative("jump_force", self.jump_force)?;
        non_negative("dash_force", self.dash_force)?;
        non_negative("slam_force", self.slam_force)?;
        non_negative("impact_force", self.impact_force)?;
        non_negative("ground_probe_lift", self.ground_probe_lift)?;
        non_negative("ground_clearance", self.ground_clearance)?;
        non_negative("bounce_force", self.bounce_force)?;
        non_negative("bounce_frequency", self.bounce_frequency)?;
        non_negative("bounce_amplitude", self.bounce_amplitude)?;
        non_negative("charge_drift_tolerance", self.charge_drift_tolerance)?;

        if !(self.min_squeeze > 0.0 && self.min_squeeze <= 1.0) {
            return Err(ConfigError::Invalid {
                field: "min_squeeze",
                reason: "must be in (0, 1]",
            });
        }
        if self.ground_probe_radius > self.collider_radius {
            return Err(ConfigError::Invalid {
                field: "ground_probe_radius",
                reason: "must not exceed collider_radius",
            });
        }
        if self.bounce_amplitude >= 1.0 {
            return Err(ConfigError::Invalid {
                field: "bounce_amplitude",
                reason: "must be below 1",
            });
        }
        Ok(())
    }
}

/// Fixed-step loop settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Ticks per second.
    pub tick_rate: u32,
}

impl SimConfig {
    /// Seconds per tick.
    #[inline]
    pub fn fixed_dt(&self) -> f32 {
        1.0 / self.tick_rate.max(1) as f32
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_rate: DEFAULT_TICK_RATE,
        }
    }
}
