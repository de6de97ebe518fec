//! Simulation Events
//!
//! Events emitted while ticking, for logging, replay comparison and
//! presentation layers (sound, particles).

use serde::{Deserialize, Serialize};

use crate::game::state::EntityId;

/// Why an entity did nothing this tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// No physics body is attached (or it was removed).
    MissingBody,
}

/// Event payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SimEventData {
    /// Jump charge started.
    JumpCharging,

    /// Jump charge released.
    JumpReleased {
        /// Charge ratio at release.
        charge_ratio: f32,
        /// Impulse magnitude actually applied (0 if airborne).
        impulse: f32,
    },

    /// Jump charge dropped without an impulse.
    JumpCancelled,

    /// Dash released.
    DashReleased {
        /// Charge ratio at release.
        charge_ratio: f32,
        /// Velocity change magnitude.
        speed: f32,
    },

    /// Slam hang started.
    SlamPrepStarted,

    /// Slam hang finished and the downward impulse was applied.
    SlamFalling {
        /// Downward impulse magnitude.
        impulse: f32,
    },

    /// Slam hit the ground.
    SlamLanded {
        /// Number of impact requests sent.
        targets: u32,
    },

    /// Impact request sent to another entity.
    ImpactSent {
        /// Receiving entity.
        target: EntityId,
        /// Explosion impulse magnitude.
        magnitude: f32,
    },

    /// Impact request applied to this entity.
    ImpactApplied {
        /// Entity whose slam caused it.
        source: EntityId,
        /// Explosion impulse magnitude.
        magnitude: f32,
    },

    /// Bounce locomotion hop.
    Bounced,

    /// Entity skipped its tick.
    TickSkipped {
        /// Why.
        reason: SkipReason,
    },
}

/// An event with timing and the entity it concerns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimEvent {
    /// Tick when the event occurred.
    pub tick: u64,
    /// Entity involved.
    pub entity: EntityId,
    /// Event data.
    pub data: SimEventData,
}

impl SimEvent {
    /// Create a new event.
    pub fn new(tick: u64, entity: EntityId, data: SimEventData) -> Self {
        Self { tick, entity, data }
    }

    /// Is this a slam landing?
    pub fn is_slam_landing(&self) -> bool {
        matches!(self.data, SimEventData::SlamLanded { .. })
    }
}
