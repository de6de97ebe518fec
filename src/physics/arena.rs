//! Minimal Arena Physics
//!
//! Sphere bodies over an infinite ground plane at `y = 0`. Semi-implicit
//! Euler integration, positional contact resolution and collision-enter
//! events. Good enough to exercise the simulation; not a physics engine.

use std::collections::{BTreeMap, BTreeSet};

use glam::{Mat3, Quat, Vec3};
use thiserror::Error;
use tracing::trace;

use super::{
    BodyHandle, ColliderId, CollisionEnter, ForceMode, ProbeHit, RigidBodies, SpatialQuery,
};

/// Contacts closer than this count as touching.
const CONTACT_SLOP: f32 = 1e-3;

/// Arena errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArenaError {
    /// Handle does not refer to a live body.
    #[error("unknown body {0:?}")]
    UnknownBody(BodyHandle),

    /// Mass and radius must be positive.
    #[error("invalid body shape: {0}")]
    InvalidShape(&'static str),
}

/// Global arena parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ArenaSettings {
    /// Gravity acceleration.
    pub gravity: Vec3,
    /// Horizontal velocity damping (1/s).
    pub linear_damping: f32,
}

impl Default for ArenaSettings {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.81, 0.0),
            linear_damping: 0.5,
        }
    }
}

#[derive(Clone, Debug)]
struct ArenaBody {
    collider: ColliderId,
    position: Vec3,
    rotation: Quat,
    velocity: Vec3,
    radius: f32,
    mass: f32,
    scale: Mat3,
    /// Acceleration accumulated for the next step.
    pending_accel: Vec3,
}

/// In-memory physics world.
#[derive(Clone, Debug)]
pub struct Arena {
    settings: ArenaSettings,
    bodies: BTreeMap<BodyHandle, ArenaBody>,
    next_id: u32,
    /// Pairs touching after the last step (body, collider).
    contacts: BTreeSet<(BodyHandle, ColliderId)>,
}

impl Arena {
    /// Create an empty arena.
    pub fn new(settings: ArenaSettings) -> Self {
        Self {
            settings,
            bodies: BTreeMap::new(),
            next_id: 1, // 0 is the ground
            contacts: BTreeSet::new(),
        }
    }

    /// Add a sphere body. Returns its handle; the collider shares its id.
    pub fn spawn_sphere(
        &mut self,
        position: Vec3,
        radius: f32,
        mass: f32,
    ) -> Result<BodyHandle, ArenaError> {
        if !(radius > 0.0) {
            return Err(ArenaError::InvalidShape("radius must be positive"));
        }
        if !(mass > 0.0) {
            return Err(ArenaError::InvalidShape("mass must be positive"));
        }
        let id = self.next_id;
        self.next_id += 1;
        let handle = BodyHandle(id);
        self.bodies.insert(
            handle,
            ArenaBody {
                collider: ColliderId(id),
                position,
                rotation: Quat::IDENTITY,
                velocity: Vec3::ZERO,
                radius,
                mass,
                scale: Mat3::IDENTITY,
                pending_accel: Vec3::ZERO,
            },
        );
        Ok(handle)
    }

    /// Remove a body.
    pub fn despawn(&mut self, body: BodyHandle) -> Result<(), ArenaError> {
        self.bodies
            .remove(&body)
            .ok_or(ArenaError::UnknownBody(body))?;
        self.contacts.retain(|(b, c)| *b != body && *c != ColliderId(body.0));
        Ok(())
    }

    /// Current render scale of a body.
    pub fn visual_scale(&self, body: BodyHandle) -> Option<Mat3> {
        self.bodies.get(&body).map(|b| b.scale)
    }

    /// Number of live bodies.
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Advance the world by `dt` seconds.
    ///
    /// Returns the contacts that began during this step, in handle order.
    pub fn step(&mut self, dt: f32) -> Vec<CollisionEnter> {
        let gravity = self.settings.gravity;
        let damping = 1.0 / (1.0 + self.settings.linear_damping * dt);

        for body in self.bodies.values_mut() {
            body.velocity += (gravity + body.pending_accel) * dt;
            body.pending_accel = Vec3::ZERO;
            body.velocity.x *= damping;
            body.velocity.z *= damping;
            body.position += body.velocity * dt;
        }

        let mut touching = BTreeSet::new();

        // Ground plane
        for (handle, body) in self.bodies.iter_mut() {
            let penetration = body.radius - body.position.y;
            if penetration >= -CONTACT_SLOP {
                if penetration > 0.0 {
                    body.position.y = body.radius;
                }
                if body.velocity.y < 0.0 {
                    body.velocity.y = 0.0;
                }
                touching.insert((*handle, ColliderId::GROUND));
            }
        }

        // Sphere pairs
        let handles: Vec<BodyHandle> = self.bodies.keys().copied().collect();
        for (i, a) in handles.iter().enumerate() {
            for b in &handles[i + 1..] {
                if let Some((ca, cb)) = self.resolve_pair(*a, *b) {
                    touching.insert((*a, cb));
                    touching.insert((*b, ca));
                }
            }
        }

        let entered: Vec<CollisionEnter> = touching
            .difference(&self.contacts)
            .map(|(body, other)| CollisionEnter {
                body: *body,
                other: *other,
            })
            .collect();

        for event in &entered {
            trace!(body = event.body.0, other = event.other.0, "collision enter");
        }

        self.contacts = touching;
        entered
    }

    /// Separate two overlapping spheres. Returns their colliders if touching.
    fn resolve_pair(&mut self, a: BodyHandle, b: BodyHandle) -> Option<(ColliderId, ColliderId)> {
        let (pa, ra, ma, va, ca) = {
            let body = self.bodies.get(&a)?;
            (body.position, body.radius, body.mass, body.velocity, body.collider)
        };
        let (pb, rb, mb, vb, cb) = {
            let body = self.bodies.get(&b)?;
            (body.position, body.radius, body.mass, body.velocity, body.collider)
        };

        let delta = pb - pa;
        let dist = delta.length();
        let overlap = ra + rb - dist;
        if overlap < -CONTACT_SLOP {
            return None;
        }
        if overlap > 0.0 {
            let normal = if dist > 1e-6 { delta / dist } else { Vec3::X };
            let total = ma + mb;
            let approach = (vb - va).dot(normal);
            let impulse = if approach < 0.0 { -approach } else { 0.0 };

            if let Some(body) = self.bodies.get_mut(&a) {
                body.position -= normal * overlap * (mb / total);
                body.velocity -= normal * impulse * (mb / total);
            }
            if let Some(body) = self.bodies.get_mut(&b) {
                body.position += normal * overlap * (ma / total);
                body.velocity += normal * impulse * (ma / total);
            }
        }
        Some((ca, cb))
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new(ArenaSettings::default())
    }
}

impl RigidBodies for Arena {
    fn position(&self, body: BodyHandle) -> Option<Vec3> {
        self.bodies.get(&body).map(|b| b.position)
    }

    fn rotation(&self, body: BodyHandle) -> Option<Quat> {
        self.bodies.get(&body).map(|b| b.rotation)
    }

    fn velocity(&self, body: BodyHandle) -> Option<Vec3> {
        self.bodies.get(&body).map(|b| b.velocity)
    }

    fn collider(&self, body: BodyHandle) -> Option<ColliderId> {
        self.bodies.get(&body).map(|b| b.collider)
    }

    fn set_rotation(&mut self, body: BodyHandle, rotation: Quat) {
        if let Some(b) = self.bodies.get_mut(&body) {
            b.rotation = rotation.normalize();
        }
    }

    fn set_velocity(&mut self, body: BodyHandle, velocity: Vec3) {
        if let Some(b) = self.bodies.get_mut(&body) {
            b.velocity = velocity;
        }
    }

    fn set_visual_scale(&mut self, body: BodyHandle, scale: Mat3) {
        if let Some(b) = self.bodies.get_mut(&body) {
            b.scale = scale;
        }
    }

    fn apply_force(&mut self, body: BodyHandle, force: Vec3, mode: ForceMode) {
        let Some(b) = self.bodies.get_mut(&body) else {
            return;
        };
        match mode {
            ForceMode::Acceleration => b.pending_accel += force,
            ForceMode::Impulse => b.velocity += force / b.mass,
            ForceMode::VelocityChange => b.velocity += force,
        }
    }

    fn apply_explosion_impulse(
        &mut self,
        body: BodyHandle,
        magnitude: f32,
        center: Vec3,
        radius: f32,
        upward_bias: f32,
    ) {
        let Some(b) = self.bodies.get_mut(&body) else {
            return;
        };
        let distance = b.position.distance(center);
        if radius <= 0.0 || distance > radius {
            return;
        }
        let falloff = 1.0 - distance / radius;
        let origin = center - Vec3::Y * upward_bias;
        let direction = (b.position - origin).try_normalize().unwrap_or(Vec3::Y);
        b.velocity += direction * (magnitude * falloff / b.mass);
    }
}

impl SpatialQuery for Arena {
    fn sphere_probe(
        &self,
        origin: Vec3,
        radius: f32,
        direction: Vec3,
        max_distance: f32,
        hits: &mut [ProbeHit],
    ) -> usize {
        let Some(dir) = direction.try_normalize() else {
            return 0;
        };
        let mut count = 0;
        let mut push = |collider: ColliderId, distance: f32, count: &mut usize| {
            if *count < hits.len() {
                hits[*count] = ProbeHit { collider, distance };
                *count += 1;
            }
        };

        // Ground plane
        let clearance = origin.y - radius;
        if clearance <= 0.0 {
            push(ColliderId::GROUND, 0.0, &mut count);
        } else if dir.y < 0.0 {
            let t = clearance / -dir.y;
            if t <= max_distance {
                push(ColliderId::GROUND, t, &mut count);
            }
        }

        // Spheres: ray against a sphere inflated by the probe radius
        for body in self.bodies.values() {
            let combined = radius + body.radius;
            let to_origin = origin - body.position;
            let c = to_origin.length_squared() - combined * combined;
            if c <= 0.0 {
                push(body.collider, 0.0, &mut count);
                continue;
            }
            let b = to_origin.dot(dir);
            if b >= 0.0 {
                continue; // moving away
            }
            let disc = b * b - c;
            if disc < 0.0 {
                continue;
            }
            let t = -b - disc.sqrt();
            if t <= max_distance {
                push(body.collider, t.max(0.0), &mut count);
            }
        }

        count
    }

    fn overlap_sphere(&self, center: Vec3, radius: f32, out: &mut [ColliderId]) -> usize {
        let mut count = 0;
        if center.y - radius <= 0.0 && count < out.len() {
            out[count] = ColliderId::GROUND;
            count += 1;
        }
        for body in self.bodies.values() {
            if count >= out.len() {
                break;
            }
            if body.position.distance(center) <= radius + body.radius {
                out[count] = body.collider;
                count += 1;
            }
        }
        count
    }
}
