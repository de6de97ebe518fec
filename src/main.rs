//! Bounce Arena Simulator
//!
//! Runs a scripted two-character slam scenario on the authoritative
//! simulation, then replays it to verify determinism.
//!
//! Usage: `bounce-arena-sim [character-config.json]`

use anyhow::{bail, Context, Result};
use glam::{Vec2, Vec3};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use bounce_arena::{
    game::{
        events::SimEventData,
        input::{Action, InputEvent},
        state::{EntityId, ParticipantId},
        tick::{replay, ScriptedInput, SpawnSpec},
    },
    physics::ArenaSettings,
    CharacterConfig, SimConfig, TICK_RATE, VERSION,
};

/// Ticks to simulate (4 seconds).
const DEMO_TICKS: u64 = 4 * TICK_RATE as u64;

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Bounce Arena Simulator v{}", VERSION);
    info!("Tick Rate: {} Hz", TICK_RATE);

    let config = match std::env::args().nth(1) {
        Some(path) => CharacterConfig::load(&path)
            .with_context(|| format!("loading character config from {}", path))?,
        None => CharacterConfig::default(),
    };

    demo_slam(config)
}

/// Two characters: A jumps, slams next to B, B gets knocked away.
fn demo_slam(config: CharacterConfig) -> Result<()> {
    info!("=== Starting Demo ===");

    let a = EntityId(1);
    let b = EntityId(2);
    let spawns = vec![
        SpawnSpec {
            config: config.clone(),
            ..SpawnSpec::new(a, ParticipantId::random(), Vec3::new(0.0, config.collider_radius, 0.0))
        },
        SpawnSpec {
            config: config.clone(),
            ..SpawnSpec::new(b, ParticipantId::random(), Vec3::new(2.5, config.collider_radius, 0.0))
        },
    ];
    for spec in &spawns {
        info!(
            "Added character {} (owner {}) at ({:.2}, {:.2}, {:.2})",
            spec.entity.0,
            spec.owner.short(),
            spec.position.x,
            spec.position.y,
            spec.position.z
        );
    }

    let script = demo_script(a, b);
    let sim_config = SimConfig::default();

    info!("Running {} ticks...", DEMO_TICKS);
    let outcome = replay(sim_config, ArenaSettings::default(), &spawns, &script, DEMO_TICKS)?;

    // Log important events
    for event in &outcome.events {
        match &event.data {
            SimEventData::JumpReleased { charge_ratio, impulse } => {
                info!(
                    "Tick {}: {} jumped (charge {:.2}, impulse {:.2})",
                    event.tick, event.entity.0, charge_ratio, impulse
                );
            }
            SimEventData::SlamLanded { targets } => {
                info!("Tick {}: {} slammed, {} target(s)", event.tick, event.entity.0, targets);
            }
            SimEventData::ImpactApplied { source, magnitude } => {
                info!(
                    "Tick {}: {} knocked by {} (magnitude {:.1})",
                    event.tick, event.entity.0, source.0, magnitude
                );
            }
            SimEventData::DashReleased { speed, .. } => {
                info!("Tick {}: {} dashed at {:.2}", event.tick, event.entity.0, speed);
            }
            _ => {}
        }
    }

    info!("=== Results ===");
    info!("Final State Hash: {}", hex::encode(outcome.final_hash));
    info!("Total events: {}", outcome.events.len());

    // Verify determinism by replaying
    info!("=== Verifying Determinism ===");
    let second = replay(sim_config, ArenaSettings::default(), &spawns, &script, DEMO_TICKS)?;
    info!("Replay Hash: {}", hex::encode(second.final_hash));

    if outcome.final_hash != second.final_hash {
        warn!("Hash mismatch between run and replay");
        bail!("determinism check failed");
    }
    info!("DETERMINISM VERIFIED: hashes match");
    Ok(())
}

/// A charges a half-second jump, slams at the top; B strolls and dashes.
fn demo_script(a: EntityId, b: EntityId) -> Vec<ScriptedInput> {
    let at = |tick: u64, entity: EntityId, event: InputEvent| ScriptedInput { tick, entity, event };
    vec![
        at(10, a, InputEvent::Press(Action::Jump)),
        at(40, a, InputEvent::Release(Action::Jump)),
        at(55, a, InputEvent::Press(Action::Slam)),
        at(5, b, InputEvent::Move(Vec2::new(0.0, 0.5))),
        at(120, b, InputEvent::Move(Vec2::ZERO)),
        at(150, b, InputEvent::Press(Action::Dash)),
        at(170, b, InputEvent::Release(Action::Dash)),
    ]
}
