//! Character State Definitions
//!
//! Identifiers and the per-entity state owned by the authoritative simulator.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::core::hash::StateHasher;
use crate::game::action::ActionStateMachine;
use crate::game::bounce::BounceOscillator;
use crate::physics::BodyHandle;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Networked entity identifier.
///
/// Implements Ord for deterministic BTreeMap ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct EntityId(pub u32);

/// Session participant identifier (UUID as bytes).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct ParticipantId(pub [u8; 16]);

impl ParticipantId {
    /// Create from raw bytes.
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Fresh random participant id.
    pub fn random() -> Self {
        Self(*uuid::Uuid::new_v4().as_bytes())
    }

    /// Create from UUID string.
    pub fn from_uuid_str(s: &str) -> Option<Self> {
        uuid::Uuid::parse_str(s).ok().map(|u| Self(*u.as_bytes()))
    }

    /// Convert to UUID string.
    pub fn to_uuid_string(&self) -> String {
        uuid::Uuid::from_bytes(self.0).to_string()
    }

    /// Short hex prefix for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

// =============================================================================
// CHARACTER STATE
// =============================================================================

/// State of one character, written only by its authority.
///
/// Position, rotation and velocity live in the physics body; `grounded` is
/// recomputed by the ground probe whenever it is needed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CharacterState {
    /// Entity this state belongs to.
    pub entity: EntityId,

    /// Participant whose input drives the entity.
    pub owner: ParticipantId,

    /// Physics body, if one is attached.
    pub body: Option<BodyHandle>,

    /// Jump / dash / slam sub-machines and the squeeze they drive.
    pub actions: ActionStateMachine,

    /// Last nonzero horizontal move direction (unit length).
    pub last_facing: Vec3,

    /// Hop oscillator for bounce locomotion.
    pub bounce: BounceOscillator,
}

impl CharacterState {
    /// Fresh state at spawn.
    pub fn new(entity: EntityId, owner: ParticipantId, body: Option<BodyHandle>) -> Self {
        Self {
            entity,
            owner,
            body,
            actions: ActionStateMachine::new(),
            last_facing: Vec3::Z,
            bounce: BounceOscillator::default(),
        }
    }

    /// Current squeeze factor.
    #[inline]
    pub fn squeeze(&self) -> f32 {
        self.actions.squeeze()
    }

    /// Hash this character's state for verification.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u32(self.entity.0);
        hasher.update_bool(self.body.is_some());
        hasher.update_vec3(self.last_facing);
        self.actions.hash_into(hasher);
        hasher.update_f32(self.bounce.phase());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_participant_uuid_round_trip() {
        let id = ParticipantId::random();
        let parsed = ParticipantId::from_uuid_str(&id.to_uuid_string());
        assert_eq!(parsed, Some(id));
        assert!(ParticipantId::from_uuid_str("not-a-uuid").is_none());
    }

    #[test]
    fn test_new_character_is_idle() {
        let state = CharacterState::new(EntityId(1), ParticipantId::new([1; 16]), None);
        assert_eq!(state.squeeze(), 1.0);
        assert_eq!(state.last_facing, Vec3::Z);
        assert!(state.actions.is_idle());
    }

    #[test]
    fn test_short_id() {
        let id = ParticipantId::new([0xab; 16]);
        assert_eq!(id.short(), "abababab");
    }
}
