//! Core primitives.
//!
//! Timers, vector helpers and state hashing used by every game module.

pub mod hash;
pub mod math;
pub mod timer;

// Re-export core types
pub use hash::{compute_state_hash, StateHash, StateHasher};
pub use math::{lerp, planar_direction, smoothing_factor, squeeze_matrix, yaw_rotation};
pub use timer::{charge_ratio, ChargeTimer, PhaseTimer};
