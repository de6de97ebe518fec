//! Impact Broadcast
//!
//! When a slam lands, every other character within `impact_radius` is sent an
//! [`ImpactRequest`]. The sender never touches the targets' bodies; each
//! target's own authority applies the impulse on its next tick.

use glam::Vec3;
use tracing::{debug, warn};

use crate::config::CharacterConfig;
use crate::game::state::EntityId;
use crate::network::rpc::{ImpactRequest, ImpactSender};
use crate::physics::{ColliderId, SpatialQuery};

/// Maximum colliders inspected per broadcast.
pub const MAX_IMPACT_TARGETS: usize = 16;

/// Finds slam targets and sends them impact requests.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ImpactBroadcaster {
    radius: f32,
    magnitude: f32,
    upward_bias: f32,
}

impl ImpactBroadcaster {
    /// Impact parameters from config.
    pub fn new(config: &CharacterConfig) -> Self {
        Self {
            radius: config.impact_radius,
            magnitude: config.impact_force,
            upward_bias: config.impact_upward_bias,
        }
    }

    /// Send an impact to every character near `center` except `source`.
    ///
    /// `resolve` maps colliders to entities; colliders that are not
    /// characters (ground, props) map to `None`. Returns the requests that
    /// were delivered.
    pub fn broadcast<Q, S, F>(
        &self,
        source: EntityId,
        center: Vec3,
        query: &Q,
        resolve: F,
        sender: &S,
    ) -> Vec<ImpactRequest>
    where
        Q: SpatialQuery + ?Sized,
        S: ImpactSender + ?Sized,
        F: Fn(ColliderId) -> Option<EntityId>,
    {
        let mut colliders = [ColliderId::GROUND; MAX_IMPACT_TARGETS];
        let count = query.overlap_sphere(center, self.radius, &mut colliders);

        let mut sent = Vec::new();
        for collider in &colliders[..count] {
            let Some(target) = resolve(*collider) else {
                continue;
            };
            if target == source || sent.iter().any(|r: &ImpactRequest| r.target == target) {
                continue;
            }
            let request = ImpactRequest {
                source,
                target,
                magnitude: self.magnitude,
                center,
                radius: self.radius,
                upward_bias: self.upward_bias,
            };
            match sender.send_impact(request) {
                Ok(()) => sent.push(request),
                Err(e) => warn!(source = source.0, "impact not delivered: {}", e),
            }
        }

        debug!(source = source.0, targets = sent.len(), "impact broadcast");
        sent
    }
}
