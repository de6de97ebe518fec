//! Physics Service Interface
//!
//! The simulation never integrates bodies itself. It reads and pushes a
//! rigid body through [`RigidBodies`] and asks spatial questions through
//! [`SpatialQuery`]. Any engine can sit behind these traits; [`arena`] is a
//! small in-memory one for demos and tests.

pub mod arena;

use glam::{Mat3, Quat, Vec3};
use serde::{Deserialize, Serialize};

pub use arena::{Arena, ArenaError, ArenaSettings};

/// Handle to a dynamic body.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BodyHandle(pub u32);

/// Identifier of a collider (static or attached to a body).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ColliderId(pub u32);

impl ColliderId {
    /// The static ground plane.
    pub const GROUND: Self = Self(0);
}

/// How a force vector changes a body's motion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForceMode {
    /// Continuous acceleration for the next step, ignoring mass.
    Acceleration,
    /// Instant change of momentum (velocity change divided by mass).
    Impulse,
    /// Instant change of velocity, ignoring mass.
    VelocityChange,
}

/// One hit returned by a sphere probe.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProbeHit {
    /// Collider that was hit.
    pub collider: ColliderId,
    /// Distance travelled along the probe direction (0 for initial overlap).
    pub distance: f32,
}

impl Default for ProbeHit {
    fn default() -> Self {
        Self {
            collider: ColliderId::GROUND,
            distance: 0.0,
        }
    }
}

/// A body started touching a collider during the last physics step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CollisionEnter {
    /// Dynamic body that collided.
    pub body: BodyHandle,
    /// Collider it touched.
    pub other: ColliderId,
}

/// Mutable access to dynamic bodies.
///
/// Getters return `None` for unknown handles; mutators ignore them.
pub trait RigidBodies {
    /// World position of the body's center.
    fn position(&self, body: BodyHandle) -> Option<Vec3>;

    /// World rotation.
    fn rotation(&self, body: BodyHandle) -> Option<Quat>;

    /// Linear velocity.
    fn velocity(&self, body: BodyHandle) -> Option<Vec3>;

    /// Collider attached to the body.
    fn collider(&self, body: BodyHandle) -> Option<ColliderId>;

    /// Overwrite rotation.
    fn set_rotation(&mut self, body: BodyHandle, rotation: Quat);

    /// Overwrite linear velocity.
    fn set_velocity(&mut self, body: BodyHandle, velocity: Vec3);

    /// Set the render scale. Has no effect on collision.
    fn set_visual_scale(&mut self, body: BodyHandle, scale: Mat3);

    /// Apply a force with the given mode.
    fn apply_force(&mut self, body: BodyHandle, force: Vec3, mode: ForceMode);

    /// Impulse pushing away from `center`, fading linearly to zero at `radius`.
    ///
    /// `upward_bias` lowers the apparent center so the push lifts the body.
    fn apply_explosion_impulse(
        &mut self,
        body: BodyHandle,
        magnitude: f32,
        center: Vec3,
        radius: f32,
        upward_bias: f32,
    );
}

/// Read-only spatial queries.
pub trait SpatialQuery {
    /// Sweep a sphere and write hits into `hits`. Returns the number written.
    ///
    /// Colliders overlapping the sphere at its start are reported with
    /// distance 0. At most `hits.len()` hits are reported.
    fn sphere_probe(
        &self,
        origin: Vec3,
        radius: f32,
        direction: Vec3,
        max_distance: f32,
        hits: &mut [ProbeHit],
    ) -> usize;

    /// Colliders overlapping a sphere, written into `out`. Returns the count.
    fn overlap_sphere(&self, center: Vec3, radius: f32, out: &mut [ColliderId]) -> usize;
}
