//! Input Capture
//!
//! Owner-side translation of raw control events into per-tick input frames.
//!
//! Raw events land in an edge-event queue and are drained on every local
//! frame, so the capture cadence (variable render rate) is decoupled from the
//! send cadence (fixed network tick). Press/release edges survive until the
//! next [`InputCapture::take_frame`] no matter how many local frames pass.

use std::collections::VecDeque;

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::config::CharacterConfig;
use crate::core::math::lerp;
use crate::core::timer::ChargeTimer;

// =============================================================================
// INPUT FRAME
// =============================================================================

/// Input for one network tick.
///
/// `*_requested` flags are press edges, `*_released` flags are release
/// edges. Each edge is set in exactly one outgoing frame. The default frame
/// is all zero / false, which is also what a disconnected owner produces.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InputFrame {
    /// Move axis, x = right, y = forward. Magnitude at most 1.
    pub move_axis: Vec2,

    /// Camera forward hint used to orient the move axis. Zero = world axes.
    pub facing: Vec3,

    /// Owner's live charge squeeze (1 when not charging).
    pub squeeze: f32,

    /// Jump pressed since the previous frame.
    pub jump_requested: bool,

    /// Dash pressed since the previous frame.
    pub dash_requested: bool,

    /// Slam pressed since the previous frame.
    pub slam_requested: bool,

    /// Jump released since the previous frame.
    pub jump_released: bool,

    /// Dash released since the previous frame.
    pub dash_released: bool,

    /// Owner-measured jump charge ratio at release.
    pub jump_charge: f32,

    /// Owner-measured dash charge ratio at release.
    pub dash_charge: f32,
}

impl InputFrame {
    /// Frame with only a move axis.
    pub fn with_movement(move_axis: Vec2) -> Self {
        Self {
            move_axis,
            squeeze: 1.0,
            ..Default::default()
        }
    }

    /// Does this frame carry any press or release edge?
    #[inline]
    pub fn has_edges(&self) -> bool {
        self.jump_requested
            || self.dash_requested
            || self.slam_requested
            || self.jump_released
            || self.dash_released
    }

    /// Copy with every edge flag cleared and continuous fields kept.
    pub fn without_edges(&self) -> Self {
        Self {
            move_axis: self.move_axis,
            facing: self.facing,
            squeeze: self.squeeze,
            ..Default::default()
        }
    }

    /// Would folding `newer` in lose edge order?
    ///
    /// True when `newer` presses an action this frame already releases: the
    /// merged frame would release and press in one tick, and the press would
    /// be read before the release.
    pub fn conflicts_with(&self, newer: &InputFrame) -> bool {
        (self.jump_released && newer.jump_requested) || (self.dash_released && newer.dash_requested)
    }

    /// Fold a newer frame into this one.
    ///
    /// Continuous fields come from `newer`; edges are OR-ed so none is lost
    /// when several frames arrive between two ticks.
    pub fn absorb(&mut self, newer: &InputFrame) {
        self.move_axis = newer.move_axis;
        self.facing = newer.facing;
        self.squeeze = newer.squeeze;
        self.jump_requested |= newer.jump_requested;
        self.dash_requested |= newer.dash_requested;
        self.slam_requested |= newer.slam_requested;
        if newer.jump_released {
            self.jump_released = true;
            self.jump_charge = newer.jump_charge;
        }
        if newer.dash_released {
            self.dash_released = true;
            self.dash_charge = newer.dash_charge;
        }
    }
}

/// Input frame stamped with the owner's tick, as sent over the wire.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct InputPacket {
    /// Owner tick when the frame was taken.
    pub tick: u64,
    /// The frame.
    pub frame: InputFrame,
}

impl InputPacket {
    /// Create from tick and frame.
    pub fn new(tick: u64, frame: InputFrame) -> Self {
        Self { tick, frame }
    }

    /// Encode to the bincode wire format.
    pub fn encode(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Decode from the bincode wire format.
    pub fn decode(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}

// =============================================================================
// RAW EVENTS
// =============================================================================

/// Edge-triggered actions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    /// Charged jump.
    Jump,
    /// Charged dash.
    Dash,
    /// Ground slam (no charge).
    Slam,
}

/// Raw control event from the input layer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InputEvent {
    /// Move axis changed.
    Move(Vec2),
    /// Camera forward changed.
    Facing(Vec3),
    /// Button went down.
    Press(Action),
    /// Button went up.
    Release(Action),
}

// =============================================================================
// CAPTURE
// =============================================================================

/// Charge limits mirrored from the character config.
#[derive(Clone, Copy, Debug, PartialEq)]
struct ChargeLimits {
    max_jump_time: f32,
    max_dash_time: f32,
    min_squeeze: f32,
}

/// Owner-side input sampler.
#[derive(Debug)]
pub struct InputCapture {
    limits: ChargeLimits,
    queue: VecDeque<InputEvent>,
    move_axis: Vec2,
    facing: Vec3,
    jump_charge: Option<ChargeTimer>,
    dash_charge: Option<ChargeTimer>,
    /// Edges waiting for the next outgoing frame.
    pending: InputFrame,
}

impl InputCapture {
    /// Create a capture using the character's charge limits.
    pub fn new(config: &CharacterConfig) -> Self {
        Self {
            limits: ChargeLimits {
                max_jump_time: config.max_jump_time,
                max_dash_time: config.max_dash_time,
                min_squeeze: config.min_squeeze,
            },
            queue: VecDeque::with_capacity(16),
            move_axis: Vec2::ZERO,
            facing: Vec3::ZERO,
            jump_charge: None,
            dash_charge: None,
            pending: InputFrame::default(),
        }
    }

    /// Queue a raw event. Takes effect on the next [`update`](Self::update).
    pub fn push(&mut self, event: InputEvent) {
        self.queue.push_back(event);
    }

    /// Run one local frame: advance held charges by `dt`, then drain events.
    pub fn update(&mut self, dt: f32) {
        if let Some(charge) = self.jump_charge.as_mut() {
            charge.accumulate(dt);
        }
        if let Some(charge) = self.dash_charge.as_mut() {
            charge.accumulate(dt);
        }

        while let Some(&event) = self.queue.front() {
            if self.must_wait(event) {
                trace!(?event, "press held until pending release is sent");
                break;
            }
            self.queue.pop_front();
            self.apply(event);
        }
    }

    /// A press of an action whose release has not been sent yet goes in the
    /// next frame, so the release is seen first.
    fn must_wait(&self, event: InputEvent) -> bool {
        match event {
            InputEvent::Press(Action::Jump) => self.pending.jump_released,
            InputEvent::Press(Action::Dash) => self.pending.dash_released,
            _ => false,
        }
    }

    fn apply(&mut self, event: InputEvent) {
        match event {
            InputEvent::Move(axis) => self.move_axis = axis.clamp_length_max(1.0),
            InputEvent::Facing(facing) => self.facing = facing,
            InputEvent::Press(Action::Jump) => {
                if self.jump_charge.is_none() {
                    self.jump_charge = Some(ChargeTimer::new(self.limits.max_jump_time));
                    self.pending.jump_requested = true;
                }
            }
            InputEvent::Press(Action::Dash) => {
                if self.dash_charge.is_none() {
                    self.dash_charge = Some(ChargeTimer::new(self.limits.max_dash_time));
                    self.pending.dash_requested = true;
                }
            }
            InputEvent::Press(Action::Slam) => self.pending.slam_requested = true,
            InputEvent::Release(Action::Jump) => {
                if let Some(charge) = self.jump_charge.take() {
                    self.pending.jump_released = true;
                    self.pending.jump_charge = charge.ratio();
                    trace!(ratio = charge.ratio(), "jump released locally");
                }
            }
            InputEvent::Release(Action::Dash) => {
                if let Some(charge) = self.dash_charge.take() {
                    self.pending.dash_released = true;
                    self.pending.dash_charge = charge.ratio();
                    trace!(ratio = charge.ratio(), "dash released locally");
                }
            }
            InputEvent::Release(Action::Slam) => {}
        }
    }

    /// Live squeeze derived from the local jump charge.
    pub fn squeeze(&self) -> f32 {
        match &self.jump_charge {
            Some(charge) => lerp(1.0, self.limits.min_squeeze, charge.ratio()),
            None => 1.0,
        }
    }

    /// Is a jump being held?
    pub fn is_charging_jump(&self) -> bool {
        self.jump_charge.is_some()
    }

    /// Produce the outgoing frame and clear sent edges.
    pub fn take_frame(&mut self) -> InputFrame {
        let pending = std::mem::take(&mut self.pending);
        InputFrame {
            move_axis: self.move_axis,
            facing: self.facing,
            squeeze: self.squeeze(),
            ..pending
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
