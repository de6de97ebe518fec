//! Game Logic Module
//!
//! Character simulation. Deterministic given identical input and physics.
//!
//! ## Module Structure
//!
//! - `input`: Input capture, frames and wire packets
//! - `state`: Identifiers and per-character state
//! - `action`: Jump / dash / slam state machines
//! - `ground`: Downward probe for grounded checks
//! - `bounce`: Hop oscillator for bounce locomotion
//! - `impact`: Slam landing broadcast
//! - `simulator`: Authoritative per-character step
//! - `tick`: Fixed-rate driver over all characters
//! - `events`: Simulation events for logs and replay

pub mod action;
pub mod bounce;
pub mod events;
pub mod ground;
pub mod impact;
pub mod input;
pub mod simulator;
pub mod state;
pub mod tick;

// Re-export key types
pub use action::{ActionStateMachine, DashPhase, JumpPhase, SlamPhase};
pub use events::{SimEvent, SimEventData};
pub use ground::GroundDetector;
pub use impact::ImpactBroadcaster;
pub use input::{Action, InputCapture, InputEvent, InputFrame, InputPacket};
pub use simulator::MovementSimulator;
pub use state::{CharacterState, EntityId, ParticipantId};
pub use tick::{Simulation, SpawnSpec, TickResult};
