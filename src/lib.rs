//! # Bounce Arena Core
//!
//! Authoritative character-action simulation: charged jump, charged dash
//! and ground slam for networked physics characters.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     BOUNCE ARENA CORE                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Shared primitives                         │
//! │  ├── math.rs     - Squeeze matrix, heading, smoothing        │
//! │  ├── timer.rs    - Accumulate-compare timers                 │
//! │  └── hash.rs     - State hashing for verification            │
//! │                                                              │
//! │  physics/        - Engine seam (traits) + in-memory arena    │
//! │                                                              │
//! │  game/           - Character logic (authoritative)           │
//! │  ├── input.rs    - Input capture and frames                  │
//! │  ├── action.rs   - Jump / dash / slam state machines         │
//! │  ├── ground.rs   - Ground probe                              │
//! │  ├── impact.rs   - Slam impact broadcast                     │
//! │  ├── simulator.rs- Per-character tick                        │
//! │  └── tick.rs     - Fixed-rate driver                         │
//! │                                                              │
//! │  network/        - Input channel, impact RPC, authority      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism
//!
//! - No HashMap (uses BTreeMap for sorted iteration)
//! - No system time: every timer is an accumulated fixed delta
//! - Channels are drained with `try_recv`, never awaited
//!
//! Given identical inputs, the simulation produces identical state hashes
//! on the same platform.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod core;
pub mod game;
pub mod network;
pub mod physics;

// Re-export commonly used types
pub use config::{CharacterConfig, ConfigError, LocomotionMode, SimConfig};
pub use game::action::ActionStateMachine;
pub use game::input::{InputCapture, InputFrame};
pub use game::state::{CharacterState, EntityId, ParticipantId};
pub use game::tick::{Simulation, TickResult};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Simulation tick rate (Hz)
pub const TICK_RATE: u32 = config::DEFAULT_TICK_RATE;
