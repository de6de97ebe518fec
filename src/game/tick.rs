//! Authoritative Simulation Tick
//!
//! Drives every character simulator at a fixed rate, steps physics, and
//! routes collision-enter events back to the characters.
//!
//! Iteration is in `EntityId` order (BTreeMap), so identical inputs give
//! identical state hashes.

use std::collections::BTreeMap;

use glam::Vec3;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{CharacterConfig, ConfigError, SimConfig};
use crate::core::hash::{compute_state_hash, StateHash};
use crate::game::events::SimEvent;
use crate::game::input::{InputCapture, InputEvent, InputPacket};
use crate::game::simulator::MovementSimulator;
use crate::game::state::{CharacterState, EntityId, ParticipantId};
use crate::network::authority::AuthorityTable;
use crate::network::channel::{InputRelay, InputSender};
use crate::network::rpc::ImpactBus;
use crate::physics::{Arena, ArenaError, ArenaSettings, BodyHandle, ColliderId, RigidBodies};

/// Result of a tick.
#[derive(Debug, Default)]
pub struct TickResult {
    /// Tick that was simulated.
    pub tick: u64,
    /// Events generated this tick
    pub events: Vec<SimEvent>,
}

/// Errors when adding a character.
#[derive(Debug, Error)]
pub enum SpawnError {
    /// Character config failed validation.
    #[error("invalid character config: {0}")]
    Config(#[from] ConfigError),

    /// Physics refused the body.
    #[error("physics error: {0}")]
    Arena(#[from] ArenaError),

    /// Entity id already in use.
    #[error("entity {0:?} already exists")]
    DuplicateEntity(EntityId),

    /// Participant already controls another entity.
    #[error("participant {0:?} already owns a character")]
    DuplicateOwner(ParticipantId),
}

/// Everything needed to place a character.
#[derive(Clone, Debug)]
pub struct SpawnSpec {
    /// Entity id.
    pub entity: EntityId,
    /// Owning participant.
    pub owner: ParticipantId,
    /// Initial body center.
    pub position: Vec3,
    /// Body mass.
    pub mass: f32,
    /// Tuning.
    pub config: CharacterConfig,
}

impl SpawnSpec {
    /// Unit-mass character with default tuning.
    pub fn new(entity: EntityId, owner: ParticipantId, position: Vec3) -> Self {
        Self {
            entity,
            owner,
            position,
            mass: 1.0,
            config: CharacterConfig::default(),
        }
    }
}

/// Authoritative world: arena, characters and their transports.
#[derive(Debug)]
pub struct Simulation {
    tick: u64,
    config: SimConfig,
    arena: Arena,
    characters: BTreeMap<EntityId, MovementSimulator>,
    bodies: BTreeMap<BodyHandle, EntityId>,
    colliders: BTreeMap<ColliderId, EntityId>,
    authority: AuthorityTable,
    input: InputRelay,
    bus: ImpactBus,
}

impl Simulation {
    /// Empty world.
    pub fn new(config: SimConfig, arena: ArenaSettings) -> Self {
        Self {
            tick: 0,
            config,
            arena: Arena::new(arena),
            characters: BTreeMap::new(),
            bodies: BTreeMap::new(),
            colliders: BTreeMap::new(),
            authority: AuthorityTable::new(),
            input: InputRelay::new(),
            bus: ImpactBus::new(),
        }
    }

    /// Add an authoritative character. Returns the sender its owner uses.
    pub fn spawn(&mut self, spec: SpawnSpec) -> Result<InputSender, SpawnError> {
        if self.characters.contains_key(&spec.entity) {
            return Err(SpawnError::DuplicateEntity(spec.entity));
        }
        // One input channel per owner.
        if self.characters.values().any(|sim| sim.state().owner == spec.owner) {
            return Err(SpawnError::DuplicateOwner(spec.owner));
        }
        spec.config.validate()?;

        let body = self
            .arena
            .spawn_sphere(spec.position, spec.config.collider_radius, spec.mass)?;
        let collider = self.arena.collider(body).ok_or(ArenaError::UnknownBody(body))?;

        let inbox = self.bus.register(spec.entity);
        let state = CharacterState::new(spec.entity, spec.owner, Some(body));
        let sim = MovementSimulator::new(state, spec.config, inbox)?;

        self.authority.assign(spec.entity, spec.owner, true);
        self.bodies.insert(body, spec.entity);
        self.colliders.insert(collider, spec.entity);
        self.characters.insert(spec.entity, sim);

        info!(entity = spec.entity.0, owner = %spec.owner.short(), "character spawned");
        Ok(self.input.connect(spec.owner))
    }

    /// Remove a character and its body.
    pub fn despawn(&mut self, entity: EntityId) -> Option<MovementSimulator> {
        let sim = self.characters.remove(&entity)?;
        if let Some(body) = sim.state().body {
            if let Err(e) = self.arena.despawn(body) {
                warn!(entity = entity.0, "despawn: {}", e);
            }
            self.bodies.remove(&body);
        }
        self.colliders.retain(|_, e| *e != entity);
        self.authority.remove(entity);
        self.bus.unregister(entity);
        self.input.disconnect(sim.state().owner);
        debug!(entity = entity.0, "character despawned");
        Some(sim)
    }

    /// Run one fixed tick.
    pub fn tick(&mut self) -> TickResult {
        self.tick += 1;
        let tick = self.tick;
        let dt = self.config.fixed_dt();
        let mut result = TickResult {
            tick,
            events: Vec::new(),
        };

        // 1. Characters, in entity order
        for sim in self.characters.values_mut() {
            result
                .events
                .extend(sim.tick(tick, dt, &mut self.arena, &mut self.input, &self.authority));
        }

        // 2. Physics
        let contacts = self.arena.step(dt);

        // 3. Collision-enter routing
        let colliders = &self.colliders;
        for contact in contacts {
            let Some(entity) = self.bodies.get(&contact.body) else {
                continue;
            };
            let Some(sim) = self.characters.get_mut(entity) else {
                continue;
            };
            result.events.extend(sim.on_collision_enter(
                tick,
                contact.other,
                &self.arena,
                &self.authority,
                |c| colliders.get(&c).copied(),
                &self.bus,
            ));
        }

        // 4. Falling slams already resting on the ground
        for sim in self.characters.values_mut() {
            result.events.extend(sim.settle_slam(
                tick,
                &self.arena,
                &self.authority,
                |c| colliders.get(&c).copied(),
                &self.bus,
            ));
        }

        #[cfg(feature = "debug-tracing")]
        tracing::trace!(tick, hash = %hex::encode(self.compute_hash()), "tick complete");

        result
    }

    /// Hash of every character and body.
    pub fn compute_hash(&self) -> StateHash {
        compute_state_hash(self.tick, |h| {
            for sim in self.characters.values() {
                sim.state().hash_into(h);
                if let Some(body) = sim.state().body {
                    h.update_vec3(self.arena.position(body).unwrap_or(Vec3::ZERO));
                    h.update_vec3(self.arena.velocity(body).unwrap_or(Vec3::ZERO));
                    h.update_quat(self.arena.rotation(body).unwrap_or_default());
                }
            }
        })
    }

    /// Current tick.
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Fixed delta in seconds.
    pub fn fixed_dt(&self) -> f32 {
        self.config.fixed_dt()
    }

    /// Character simulator.
    pub fn character(&self, entity: EntityId) -> Option<&MovementSimulator> {
        self.characters.get(&entity)
    }

    /// Number of characters.
    pub fn character_count(&self) -> usize {
        self.characters.len()
    }

    /// Physics world.
    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Mutable physics world.
    pub fn arena_mut(&mut self) -> &mut Arena {
        &mut self.arena
    }

    /// Authority table.
    pub fn authority_mut(&mut self) -> &mut AuthorityTable {
        &mut self.authority
    }

    /// Body of `entity`, if it has one.
    pub fn body_of(&self, entity: EntityId) -> Option<BodyHandle> {
        self.characters.get(&entity).and_then(|sim| sim.state().body)
    }
}

// =============================================================================
// SCRIPTED REPLAY
// =============================================================================

/// A raw input event fed to an owner's capture at a given tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScriptedInput {
    /// Tick before which the event is captured.
    pub tick: u64,
    /// Character whose owner produces the event.
    pub entity: EntityId,
    /// The event.
    pub event: InputEvent,
}

/// Outcome of a scripted run.
#[derive(Debug)]
pub struct ReplayOutcome {
    /// All events, in tick order.
    pub events: Vec<SimEvent>,
    /// Hash after the last tick.
    pub final_hash: StateHash,
}

/// Run a scenario end to end: capture → channel → simulator → physics.
///
/// Each owner captures once per tick and sends one packet, so the run is
/// fully deterministic.
pub fn replay(
    config: SimConfig,
    arena: ArenaSettings,
    spawns: &[SpawnSpec],
    script: &[ScriptedInput],
    ticks: u64,
) -> Result<ReplayOutcome, SpawnError> {
    let mut sim = Simulation::new(config, arena);
    let mut owners: BTreeMap<EntityId, (InputCapture, InputSender)> = BTreeMap::new();
    for spec in spawns {
        let capture = InputCapture::new(&spec.config);
        let sender = sim.spawn(spec.clone())?;
        owners.insert(spec.entity, (capture, sender));
    }

    let dt = sim.fixed_dt();
    let mut events = Vec::new();
    for _ in 0..ticks {
        let next = sim.current_tick() + 1;
        for input in script.iter().filter(|s| s.tick == next) {
            if let Some((capture, _)) = owners.get_mut(&input.entity) {
                capture.push(input.event);
            }
        }
        for (entity, (capture, sender)) in owners.iter_mut() {
            capture.update(dt);
            let packet = InputPacket::new(next, capture.take_frame());
            if let Err(e) = sender.send(&packet) {
                warn!(entity = entity.0, "input not sent: {}", e);
            }
        }
        events.extend(sim.tick().events);
    }

    Ok(ReplayOutcome {
        events,
        final_hash: sim.compute_hash(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::action::{JumpPhase, SlamPhase};
    use crate::game::events::SimEventData;
    use crate::game::input::{Action, InputFrame};
    use glam::Vec2;

    const A: EntityId = EntityId(1);
    const B: EntityId = EntityId(2);

    fn slam_spawns() -> Vec<SpawnSpec> {
        vec![
            SpawnSpec::new(A, ParticipantId::new([1; 16]), Vec3::new(0.0, 3.0, 0.0)),
            SpawnSpec::new(B, ParticipantId::new([2; 16]), Vec3::new(2.0, 0.5, 0.0)),
        ]
    }

    fn slam_script() -> Vec<ScriptedInput> {
        vec![ScriptedInput {
            tick: 1,
            entity: A,
            event: InputEvent::Press(Action::Slam),
        }]
    }

    fn run(spawns: &[SpawnSpec], script: &[ScriptedInput], ticks: u64) -> ReplayOutcome {
        replay(SimConfig::default(), ArenaSettings::default(), spawns, script, ticks).unwrap()
    }

    #[test]
    fn test_slam_sends_exactly_one_impact() {
        let outcome = run(&slam_spawns(), &slam_script(), 120);

        let landed: Vec<_> = outcome.events.iter().filter(|e| e.is_slam_landing()).collect();
        assert_eq!(landed.len(), 1);
        assert_eq!(landed[0].entity, A);
        assert_eq!(landed[0].data, SimEventData::SlamLanded { targets: 1 });

        let applied: Vec<_> = outcome
            .events
            .iter()
            .filter(|e| matches!(e.data, SimEventData::ImpactApplied { .. }))
            .collect();
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].entity, B);
        assert_eq!(
            applied[0].data,
            SimEventData::ImpactApplied {
                source: A,
                magnitude: CharacterConfig::default().impact_force
            }
        );
        assert!(applied[0].tick > landed[0].tick, "applied on the target's next tick");
    }

    #[test]
    fn test_impact_pushes_target_away() {
        let mut sim = Simulation::new(SimConfig::default(), ArenaSettings::default());
        let tx_a = sim.spawn(slam_spawns()[0].clone()).unwrap();
        let _tx_b = sim.spawn(slam_spawns()[1].clone()).unwrap();

        let mut capture = InputCapture::new(&CharacterConfig::default());
        capture.push(InputEvent::Press(Action::Slam));
        capture.update(sim.fixed_dt());
        tx_a.send(&InputPacket::new(1, capture.take_frame())).unwrap();

        let mut applied_at = None;
        for _ in 0..120 {
            let result = sim.tick();
            if result
                .events
                .iter()
                .any(|e| matches!(e.data, SimEventData::ImpactApplied { .. }))
            {
                applied_at = Some(result.tick);
                break;
            }
        }
        assert!(applied_at.is_some());
        let body_b = sim.body_of(B).unwrap();
        let v = sim.arena().velocity(body_b).unwrap();
        assert!(v.x > 0.0, "pushed away from A along +X");
        assert_eq!(sim.character(A).unwrap().state().actions.slam.phase, SlamPhase::Idle);
    }

    #[test]
    fn test_grounded_slam_stays_idle() {
        let spawns = vec![SpawnSpec::new(A, ParticipantId::new([1; 16]), Vec3::new(0.0, 0.5, 0.0))];
        let outcome = run(&spawns, &slam_script(), 30);
        assert!(!outcome
            .events
            .iter()
            .any(|e| e.data == SimEventData::SlamPrepStarted));
    }

    #[test]
    fn test_replay_determinism() {
        let mut script = slam_script();
        script.push(ScriptedInput {
            tick: 5,
            entity: B,
            event: InputEvent::Move(Vec2::new(0.3, 1.0)),
        });
        script.push(ScriptedInput {
            tick: 20,
            entity: B,
            event: InputEvent::Press(Action::Dash),
        });
        script.push(ScriptedInput {
            tick: 35,
            entity: B,
            event: InputEvent::Release(Action::Dash),
        });

        let first = run(&slam_spawns(), &script, 180);
        let second = run(&slam_spawns(), &script, 180);
        assert_eq!(first.final_hash, second.final_hash);
        assert_eq!(first.events, second.events);

        let idle = run(&slam_spawns(), &[], 180);
        assert_ne!(first.final_hash, idle.final_hash);
    }

    #[test]
    fn test_duplicate_spawn_rejected() {
        let mut sim = Simulation::new(SimConfig::default(), ArenaSettings::default());
        sim.spawn(slam_spawns()[0].clone()).unwrap();
        let err = sim.spawn(slam_spawns()[0].clone()).unwrap_err();
        assert!(matches!(err, SpawnError::DuplicateEntity(id) if id == A));
    }

    #[test]
    fn test_second_character_for_owner_rejected() {
        let mut sim = Simulation::new(SimConfig::default(), ArenaSettings::default());
        let owner = ParticipantId::new([1; 16]);
        let tx = sim
            .spawn(SpawnSpec::new(A, owner, Vec3::new(0.0, 0.5, 0.0)))
            .unwrap();
        let err = sim
            .spawn(SpawnSpec::new(B, owner, Vec3::new(2.0, 0.5, 0.0)))
            .unwrap_err();
        assert!(matches!(err, SpawnError::DuplicateOwner(p) if p == owner));
        assert_eq!(sim.character_count(), 1);
        assert_eq!(sim.arena().body_count(), 1);

        // The first character still hears its owner.
        tx.send(&InputPacket::new(1, InputFrame::with_movement(Vec2::X))).unwrap();
        for _ in 0..30 {
            sim.tick();
        }
        assert!(sim.arena().position(sim.body_of(A).unwrap()).unwrap().x > 0.0);
    }

    #[test]
    fn test_slam_lands_when_ground_reached_during_prep() {
        let mut sim = Simulation::new(SimConfig::default(), ArenaSettings::default());
        let tx = sim
            .spawn(SpawnSpec::new(A, ParticipantId::new([1; 16]), Vec3::new(0.0, 0.75, 0.0)))
            .unwrap();
        let body = sim.body_of(A).unwrap();
        sim.arena_mut().set_velocity(body, Vec3::new(0.0, -3.0, 0.0));

        let slam = InputFrame {
            slam_requested: true,
            ..Default::default()
        };
        tx.send(&InputPacket::new(1, slam)).unwrap();

        let mut events = Vec::new();
        for _ in 0..300 {
            events.extend(sim.tick().events);
        }
        assert_eq!(events.iter().filter(|e| e.data == SimEventData::SlamPrepStarted).count(), 1);
        let landed: Vec<_> = events.iter().filter(|e| e.is_slam_landing()).collect();
        assert_eq!(landed.len(), 1);
        assert_eq!(landed[0].data, SimEventData::SlamLanded { targets: 0 });
        let state = sim.character(A).unwrap().state();
        assert_eq!(state.actions.slam.phase, SlamPhase::Idle);

        // Jumping works again afterwards.
        let jump = InputFrame {
            jump_requested: true,
            ..Default::default()
        };
        tx.send(&InputPacket::new(301, jump)).unwrap();
        sim.tick();
        assert_eq!(sim.character(A).unwrap().state().actions.jump.phase, JumpPhase::Charging);
    }

    #[test]
    fn test_invalid_config_spawn_rejected() {
        let mut sim = Simulation::new(SimConfig::default(), ArenaSettings::default());
        let mut spec = slam_spawns()[0].clone();
        spec.config.min_squeeze = 0.0;
        assert!(matches!(sim.spawn(spec), Err(SpawnError::Config(_))));
        assert_eq!(sim.character_count(), 0);
        assert_eq!(sim.arena().body_count(), 0);
    }

    #[test]
    fn test_despawn_cleans_up() {
        let mut sim = Simulation::new(SimConfig::default(), ArenaSettings::default());
        sim.spawn(slam_spawns()[0].clone()).unwrap();
        assert!(sim.despawn(A).is_some());
        assert!(sim.despawn(A).is_none());
        assert_eq!(sim.arena().body_count(), 0);
        assert!(sim.tick().events.is_empty());
    }

    #[test]
    fn test_removed_body_skips_tick() {
        let mut sim = Simulation::new(SimConfig::default(), ArenaSettings::default());
        sim.spawn(slam_spawns()[0].clone()).unwrap();
        let body = sim.body_of(A).unwrap();
        sim.arena_mut().despawn(body).unwrap();

        let result = sim.tick();
        assert!(result
            .events
            .iter()
            .any(|e| matches!(e.data, SimEventData::TickSkipped { .. })));
    }

    #[test]
    fn test_non_authoritative_character_frozen() {
        let mut sim = Simulation::new(SimConfig::default(), ArenaSettings::default());
        let owner = ParticipantId::new([1; 16]);
        let tx = sim
            .spawn(SpawnSpec::new(A, owner, Vec3::new(0.0, 0.5, 0.0)))
            .unwrap();
        sim.authority_mut().assign(A, owner, false);

        let mut capture = InputCapture::new(&CharacterConfig::default());
        capture.push(InputEvent::Move(Vec2::X));
        capture.update(sim.fixed_dt());
        tx.send(&InputPacket::new(1, capture.take_frame())).unwrap();
        for _ in 0..30 {
            sim.tick();
        }
        let x = sim.arena().position(sim.body_of(A).unwrap()).unwrap().x;
        assert_eq!(x, 0.0);
    }
}
