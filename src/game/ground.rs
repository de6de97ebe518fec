//! Ground Detection
//!
//! Sphere probe cast straight down from just inside the bottom of the
//! character's collider. Stateless: every call re-probes.

use glam::Vec3;

use crate::config::CharacterConfig;
use crate::physics::{ColliderId, ProbeHit, SpatialQuery};

/// Maximum probe hits inspected per query.
pub const MAX_GROUND_HITS: usize = 8;

/// Downward probe for a single character.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GroundDetector {
    probe_radius: f32,
    probe_lift: f32,
    clearance: f32,
    collider_radius: f32,
}

impl GroundDetector {
    /// Probe geometry from config.
    pub fn new(config: &CharacterConfig) -> Self {
        Self {
            probe_radius: config.ground_probe_radius,
            probe_lift: config.ground_probe_lift,
            clearance: config.ground_clearance,
            collider_radius: config.collider_radius,
        }
    }

    /// Probe start for a body centred at `position`.
    pub fn probe_origin(&self, position: Vec3) -> Vec3 {
        let bottom = position - Vec3::Y * self.collider_radius;
        bottom + Vec3::Y * (self.probe_radius + self.probe_lift)
    }

    /// Sweep distance below the probe start.
    #[inline]
    pub fn probe_distance(&self) -> f32 {
        self.probe_lift + self.clearance
    }

    /// Is there a collider other than `own` under the character?
    pub fn is_grounded<Q: SpatialQuery + ?Sized>(
        &self,
        query: &Q,
        position: Vec3,
        own: Option<ColliderId>,
    ) -> bool {
        let mut hits = [ProbeHit::default(); MAX_GROUND_HITS];
        let count = query.sphere_probe(
            self.probe_origin(position),
            self.probe_radius,
            Vec3::NEG_Y,
            self.probe_distance(),
            &mut hits,
        );
        hits[..count].iter().any(|hit| Some(hit.collider) != own)
    }
}
