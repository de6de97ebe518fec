//! Movement Simulator
//!
//! Authoritative per-character step. Owns the character state and its
//! impact inbox; reads input, ground and body state, runs the action
//! machine, and pushes the resulting forces to the physics body.
//!
//! ## Per-tick order
//!
//! 1. Authority check (non-authoritative copies do nothing)
//! 2. Apply queued impact requests
//! 3. Pull the input frame
//! 4. Probe ground
//! 5. Smooth rotation toward the move heading
//! 6. Movement force (gated by the hop window in bounce mode)
//! 7. Action machine, then its impulses
//! 8. Visual scale from squeeze (and bob)

use glam::{Mat3, Vec3};
use tracing::{debug, trace};

use crate::config::{CharacterConfig, ConfigError, LocomotionMode};
use crate::core::math::{planar_direction, smoothing_factor, squeeze_matrix, yaw_rotation, DIRECTION_EPSILON};
use crate::game::action::{ActionContext, SlamPhase};
use crate::game::bounce::BounceStep;
use crate::game::events::{SimEvent, SimEventData, SkipReason};
use crate::game::ground::GroundDetector;
use crate::game::impact::ImpactBroadcaster;
use crate::game::input::InputFrame;
use crate::game::state::{CharacterState, EntityId};
use crate::network::authority::Authority;
use crate::network::channel::InputChannel;
use crate::network::rpc::{ImpactInbox, ImpactSender};
use crate::physics::{BodyHandle, ColliderId, ForceMode, RigidBodies, SpatialQuery};

/// Authoritative simulator for one character.
#[derive(Debug)]
pub struct MovementSimulator {
    state: CharacterState,
    config: CharacterConfig,
    ground: GroundDetector,
    impacts: ImpactBroadcaster,
    inbox: ImpactInbox,
}

impl MovementSimulator {
    /// Create a simulator. Fails if `config` does not validate.
    pub fn new(
        state: CharacterState,
        config: CharacterConfig,
        inbox: ImpactInbox,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            ground: GroundDetector::new(&config),
            impacts: ImpactBroadcaster::new(&config),
            state,
            config,
            inbox,
        })
    }

    /// Character state.
    pub fn state(&self) -> &CharacterState {
        &self.state
    }

    /// Character tuning.
    pub fn config(&self) -> &CharacterConfig {
        &self.config
    }

    /// Entity id.
    pub fn entity(&self) -> EntityId {
        self.state.entity
    }

    /// Attach or detach the physics body.
    pub fn set_body(&mut self, body: Option<BodyHandle>) {
        self.state.body = body;
    }

    /// Ground probe for the current body position.
    pub fn is_grounded<W>(&self, world: &W) -> bool
    where
        W: RigidBodies + SpatialQuery + ?Sized,
    {
        let Some(body) = self.state.body else {
            return false;
        };
        let Some(position) = world.position(body) else {
            return false;
        };
        self.ground.is_grounded(world, position, world.collider(body))
    }

    /// Run one fixed tick.
    pub fn tick<W, C, A>(
        &mut self,
        tick: u64,
        dt: f32,
        world: &mut W,
        input: &mut C,
        authority: &A,
    ) -> Vec<SimEvent>
    where
        W: RigidBodies + SpatialQuery + ?Sized,
        C: InputChannel + ?Sized,
        A: Authority + ?Sized,
    {
        let entity = self.state.entity;
        let mut events = Vec::new();

        if !authority.is_authority(entity) {
            trace!(entity = entity.0, "not authoritative, skipping");
            return events;
        }

        let Some((body, position)) = self
            .state
            .body
            .and_then(|body| world.position(body).map(|pos| (body, pos)))
        else {
            debug!(entity = entity.0, tick, "no physics body, tick skipped");
            events.push(SimEvent::new(
                tick,
                entity,
                SimEventData::TickSkipped {
                    reason: SkipReason::MissingBody,
                },
            ));
            return events;
        };

        // Impacts first so this tick's forces see them.
        for request in self.inbox.drain() {
            world.apply_explosion_impulse(
                body,
                request.magnitude,
                request.center,
                request.radius,
                request.upward_bias,
            );
            events.push(SimEvent::new(
                tick,
                entity,
                SimEventData::ImpactApplied {
                    source: request.source,
                    magnitude: request.magnitude,
                },
            ));
        }

        let frame = if authority.is_owner(entity, self.state.owner) {
            input.latest(self.state.owner)
        } else {
            trace!(entity = entity.0, owner = %self.state.owner.short(), "input from non-owner ignored");
            InputFrame::default()
        };
        let grounded = self
            .ground
            .is_grounded(&*world, position, world.collider(body));
        let velocity = world.velocity(body).unwrap_or(Vec3::ZERO);

        // Heading
        let direction = planar_direction(frame.move_axis, frame.facing);
        if direction.length() > DIRECTION_EPSILON {
            self.state.last_facing = direction.normalize();
        }
        let current = world.rotation(body).unwrap_or_default();
        let target = yaw_rotation(self.state.last_facing);
        let rotation = current.slerp(target, smoothing_factor(self.config.rotation_sharpness, dt));
        world.set_rotation(body, rotation);

        // Locomotion
        let bounce = match self.config.locomotion {
            LocomotionMode::Rolling => BounceStep::default(),
            LocomotionMode::Bouncing => self.state.bounce.advance(dt, &self.config),
        };
        if bounce.hop {
            world.apply_force(body, Vec3::Y * self.config.bounce_force, ForceMode::Impulse);
            events.push(SimEvent::new(tick, entity, SimEventData::Bounced));
        }
        if bounce.move_window && direction != Vec3::ZERO {
            world.apply_force(body, direction * self.config.move_force, ForceMode::Acceleration);
        }

        // Actions
        let ctx = ActionContext {
            dt,
            grounded,
            velocity,
            up: Vec3::Y,
            facing: self.state.last_facing,
        };
        let output = self.state.actions.step(&frame, &ctx, &self.config);

        if let Some(v) = output.velocity_override {
            world.set_velocity(body, v);
        }
        if let Some(impulse) = output.jump_impulse {
            world.apply_force(body, impulse, ForceMode::Impulse);
        }
        if let Some(change) = output.dash_velocity_change {
            world.apply_force(body, change, ForceMode::VelocityChange);
        }
        if let Some(impulse) = output.slam_impulse {
            world.apply_force(body, impulse, ForceMode::Impulse);
        }
        events.extend(
            output
                .events
                .into_iter()
                .map(|data| SimEvent::new(tick, entity, data)),
        );

        // Squeeze along the body's own up axis; bob only scales the render.
        let up = rotation * Vec3::Y;
        let scale: Mat3 = squeeze_matrix(up, self.state.squeeze() * bounce.bob_scale);
        world.set_visual_scale(body, scale);

        events
    }

    /// Handle a collision-enter reported by physics for this character.
    ///
    /// A falling slam that touches a foreign collider while grounded lands:
    /// the slam resets and every other character in range gets an impact.
    pub fn on_collision_enter<W, A, S, F>(
        &mut self,
        tick: u64,
        other: ColliderId,
        world: &W,
        authority: &A,
        resolve: F,
        sender: &S,
    ) -> Vec<SimEvent>
    where
        W: RigidBodies + SpatialQuery + ?Sized,
        A: Authority + ?Sized,
        S: ImpactSender + ?Sized,
        F: Fn(ColliderId) -> Option<EntityId>,
    {
        let Some(body) = self.state.body else {
            return Vec::new();
        };
        if world.collider(body) == Some(other) {
            return Vec::new();
        }
        self.land_slam(tick, world, authority, resolve, sender)
    }

    /// Land a falling slam that is resting on the ground after physics.
    ///
    /// Covers bodies that reached the floor during prep: their contact is
    /// already recorded, so no collision-enter follows.
    pub fn settle_slam<W, A, S, F>(
        &mut self,
        tick: u64,
        world: &W,
        authority: &A,
        resolve: F,
        sender: &S,
    ) -> Vec<SimEvent>
    where
        W: RigidBodies + SpatialQuery + ?Sized,
        A: Authority + ?Sized,
        S: ImpactSender + ?Sized,
        F: Fn(ColliderId) -> Option<EntityId>,
    {
        self.land_slam(tick, world, authority, resolve, sender)
    }

    fn land_slam<W, A, S, F>(
        &mut self,
        tick: u64,
        world: &W,
        authority: &A,
        resolve: F,
        sender: &S,
    ) -> Vec<SimEvent>
    where
        W: RigidBodies + SpatialQuery + ?Sized,
        A: Authority + ?Sized,
        S: ImpactSender + ?Sized,
        F: Fn(ColliderId) -> Option<EntityId>,
    {
        let entity = self.state.entity;
        if self.state.actions.slam.phase != SlamPhase::Falling || !authority.is_authority(entity) {
            return Vec::new();
        }
        let Some(center) = self.state.body.and_then(|body| world.position(body)) else {
            return Vec::new();
        };
        if !self.is_grounded(world) || !self.state.actions.on_ground_impact() {
            return Vec::new();
        }

        let sent = self.impacts.broadcast(entity, center, world, resolve, sender);
        debug!(entity = entity.0, tick, targets = sent.len(), "slam landed");

        let mut events: Vec<SimEvent> = sent
            .iter()
            .map(|request| {
                SimEvent::new(
                    tick,
                    entity,
                    SimEventData::ImpactSent {
                        target: request.target,
                        magnitude: request.magnitude,
                    },
                )
            })
            .collect();
        events.push(SimEvent::new(
            tick,
            entity,
            SimEventData::SlamLanded {
                targets: sent.len() as u32,
            },
        ));
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::input::InputPacket;
    use crate::game::state::ParticipantId;
    use crate::network::authority::AuthorityTable;
    use crate::network::channel::InputRelay;
    use crate::network::rpc::{ImpactBus, ImpactRequest};
    use crate::physics::{Arena, ArenaSettings};
    use glam::Vec2;

    const DT: f32 = 1.0 / 60.0;

    struct Rig {
        arena: Arena,
        relay: InputRelay,
        authority: AuthorityTable,
        bus: ImpactBus,
        sim: MovementSimulator,
        body: BodyHandle,
        owner: ParticipantId,
    }

    fn rig(config: CharacterConfig, position: Vec3) -> Rig {
        let mut arena = Arena::new(ArenaSettings::default());
        let body = arena.spawn_sphere(position, config.collider_radius, 1.0).unwrap();
        let owner = ParticipantId::new([7; 16]);
        let entity = EntityId(1);
        let mut bus = ImpactBus::new();
        let inbox = bus.register(entity);
        let mut authority = AuthorityTable::new();
        authority.assign(entity, owner, true);
        let sim = MovementSimulator::new(CharacterState::new(entity, owner, Some(body)), config, inbox).unwrap();
        Rig {
            arena,
            relay: InputRelay::new(),
            authority,
            bus,
            sim,
            body,
            owner,
        }
    }

    impl Rig {
        fn step(&mut self, tick: u64) -> Vec<SimEvent> {
            let events = self
                .sim
                .tick(tick, DT, &mut self.arena, &mut self.relay, &self.authority);
            self.arena.step(DT);
            events
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut bus = ImpactBus::new();
        let config = CharacterConfig {
            max_jump_time: 0.0,
            ..Default::default()
        };
        let state = CharacterState::new(EntityId(1), ParticipantId::default(), None);
        assert!(MovementSimulator::new(state, config, bus.register(EntityId(1))).is_err());
    }

    #[test]
    fn test_missing_body_skips_tick() {
        let mut rig = rig(CharacterConfig::default(), Vec3::new(0.0, 0.5, 0.0));
        rig.sim.set_body(None);
        let events = rig.step(1);
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].data,
            SimEventData::TickSkipped {
                reason: SkipReason::MissingBody
            }
        );
    }

    #[test]
    fn test_non_authority_does_nothing() {
        let mut rig = rig(CharacterConfig::default(), Vec3::new(0.0, 0.5, 0.0));
        rig.authority.assign(EntityId(1), rig.owner, false);
        let tx = rig.relay.connect(rig.owner);
        tx.send(&InputPacket::new(1, InputFrame::with_movement(Vec2::X))).unwrap();

        assert!(rig.step(1).is_empty());
        assert_eq!(rig.arena.velocity(rig.body).unwrap().x, 0.0);
    }

    #[test]
    fn test_disconnected_owner_stays_put() {
        let mut rig = rig(CharacterConfig::default(), Vec3::new(0.0, 0.5, 0.0));
        for tick in 1..=30 {
            rig.step(tick);
        }
        let pos = rig.arena.position(rig.body).unwrap();
        assert!(pos.x.abs() < 1e-6 && pos.z.abs() < 1e-6);
        assert!(rig.sim.state().actions.is_idle());
    }

    #[test]
    fn test_move_and_turn() {
        let mut rig = rig(CharacterConfig::default(), Vec3::new(0.0, 0.5, 0.0));
        let tx = rig.relay.connect(rig.owner);
        for tick in 1..=60 {
            tx.send(&InputPacket::new(tick, InputFrame::with_movement(Vec2::X))).unwrap();
            rig.step(tick);
        }
        assert!(rig.arena.position(rig.body).unwrap().x > 0.5);
        assert!(rig.sim.state().last_facing.abs_diff_eq(Vec3::X, 1e-5));

        let forward = rig.arena.rotation(rig.body).unwrap() * Vec3::Z;
        assert!(forward.dot(Vec3::X) > 0.99);
    }

    #[test]
    fn test_grounded_jump_applies_impulse() {
        let mut rig = rig(CharacterConfig::default(), Vec3::new(0.0, 0.5, 0.0));
        let tx = rig.relay.connect(rig.owner);
        let press = InputFrame {
            jump_requested: true,
            ..Default::default()
        };
        let release = InputFrame {
            jump_released: true,
            ..Default::default()
        };

        rig.step(1);
        tx.send(&InputPacket::new(2, press)).unwrap();
        rig.step(2);
        for tick in 3..33 {
            rig.step(tick);
        }
        tx.send(&InputPacket::new(33, release)).unwrap();
        let events = rig
            .sim
            .tick(33, DT, &mut rig.arena, &mut rig.relay, &rig.authority);

        assert!(events
            .iter()
            .any(|e| matches!(e.data, SimEventData::JumpReleased { impulse, .. } if impulse > 0.0)));
        assert!(rig.arena.velocity(rig.body).unwrap().y > 0.0);
    }

    #[test]
    fn test_squeeze_sets_visual_scale() {
        let mut rig = rig(CharacterConfig::default(), Vec3::new(0.0, 0.5, 0.0));
        let tx = rig.relay.connect(rig.owner);
        rig.step(1);
        tx.send(&InputPacket::new(2, InputFrame { jump_requested: true, ..Default::default() }))
            .unwrap();
        for tick in 2..40 {
            rig.step(tick);
        }
        let squeeze = rig.sim.state().squeeze();
        assert!(squeeze < 1.0);

        let scale = rig.arena.visual_scale(rig.body).unwrap();
        let up = rig.arena.rotation(rig.body).unwrap() * Vec3::Y;
        assert!((scale * up).abs_diff_eq(up * squeeze, 1e-4));
    }

    #[test]
    fn test_inbox_impact_applied() {
        let mut rig = rig(CharacterConfig::default(), Vec3::new(0.0, 0.5, 0.0));
        rig.bus
            .send_impact(ImpactRequest {
                source: EntityId(9),
                target: EntityId(1),
                magnitude: 20.0,
                center: Vec3::new(-1.0, 0.5, 0.0),
                radius: 5.0,
                upward_bias: 1.0,
            })
            .unwrap();

        let events = rig.step(1);
        assert!(events.iter().any(|e| e.data
            == SimEventData::ImpactApplied {
                source: EntityId(9),
                magnitude: 20.0
            }));
        let v = rig.arena.velocity(rig.body).unwrap();
        assert!(v.x > 0.0 && v.y > 0.0);
    }

    #[test]
    fn test_collision_ignored_unless_falling() {
        let mut rig = rig(CharacterConfig::default(), Vec3::new(0.0, 0.5, 0.0));
        let events = rig.sim.on_collision_enter(
            1,
            ColliderId::GROUND,
            &rig.arena,
            &rig.authority,
            |_| None,
            &rig.bus,
        );
        assert!(events.is_empty());
    }

    #[test]
    fn test_non_owner_input_ignored() {
        let mut rig = rig(CharacterConfig::default(), Vec3::new(0.0, 0.5, 0.0));
        rig.authority.assign(EntityId(1), ParticipantId::new([8; 16]), true);
        let tx = rig.relay.connect(rig.owner);
        for tick in 1..=30 {
            tx.send(&InputPacket::new(tick, InputFrame::with_movement(Vec2::X))).unwrap();
            rig.step(tick);
        }
        assert!(rig.arena.position(rig.body).unwrap().x.abs() < 1e-6);
    }

    #[test]
    fn test_dash_repress_within_one_tick() {
        let mut rig = rig(CharacterConfig::default(), Vec3::new(0.0, 0.5, 0.0));
        let tx = rig.relay.connect(rig.owner);
        let press = InputFrame {
            dash_requested: true,
            ..Default::default()
        };
        let release = InputFrame {
            dash_released: true,
            ..Default::default()
        };

        let mut events = Vec::new();
        tx.send(&InputPacket::new(1, press)).unwrap();
        events.extend(rig.step(1));
        for tick in 2..10 {
            events.extend(rig.step(tick));
        }
        // Release and re-press both arrive before tick 10.
        tx.send(&InputPacket::new(2, release)).unwrap();
        tx.send(&InputPacket::new(3, press)).unwrap();
        for tick in 10..20 {
            events.extend(rig.step(tick));
        }
        tx.send(&InputPacket::new(4, release)).unwrap();
        for tick in 20..25 {
            events.extend(rig.step(tick));
        }

        let dashes = events
            .iter()
            .filter(|e| matches!(e.data, SimEventData::DashReleased { .. }))
            .count();
        assert_eq!(dashes, 2);
        assert!(rig.sim.state().actions.is_idle());
    }

    #[test]
    fn test_settle_lands_slam_already_on_ground() {
        let mut rig = rig(CharacterConfig::default(), Vec3::new(0.0, 0.75, 0.0));
        rig.arena.set_velocity(rig.body, Vec3::new(0.0, -3.0, 0.0));
        let tx = rig.relay.connect(rig.owner);
        tx.send(&InputPacket::new(
            1,
            InputFrame {
                slam_requested: true,
                ..Default::default()
            },
        ))
        .unwrap();

        let mut landed = 0;
        for tick in 1..=300 {
            rig.step(tick);
            let events = rig
                .sim
                .settle_slam(tick, &rig.arena, &rig.authority, |_| None, &rig.bus);
            landed += events
                .iter()
                .filter(|e| matches!(e.data, SimEventData::SlamLanded { .. }))
                .count();
        }
        assert_eq!(landed, 1);
        assert_eq!(rig.sim.state().actions.slam.phase, SlamPhase::Idle);
    }

    #[test]
    fn test_bounce_mode_hops() {
        let config = CharacterConfig {
            locomotion: LocomotionMode::Bouncing,
            ..Default::default()
        };
        let mut rig = rig(config, Vec3::new(0.0, 0.5, 0.0));
        let hops = (1..=240)
            .flat_map(|tick| rig.step(tick))
            .filter(|e| e.data == SimEventData::Bounced)
            .count();
        assert!(hops >= 1);
    }
}
