//! Action State Machine
//!
//! Three independent sub-machines driven once per authoritative tick:
//!
//! ```text
//! Jump:  Idle ──press∧grounded──▶ Charging ──release──▶ Cooldown ──elapsed──▶ Idle
//! Dash:  Idle ──press──▶ Charging ──release──▶ Idle
//! Slam:  Idle ──press∧airborne──▶ Prep ──elapsed──▶ Falling ──landing──▶ Idle
//! ```
//!
//! The machine never touches physics. [`ActionStateMachine::step`] returns
//! the impulses to apply as an [`ActionOutput`]; the simulator applies them.
//!
//! ## Exclusivity
//!
//! Jump starts only when grounded and slam only when airborne, so both can
//! never trigger in the same tick. Slam is evaluated first; entering slam prep
//! cancels a jump charge in progress and takes over the squeeze.
//!
//! Invalid requests (release without charge, slam while grounded, jump while
//! slamming) are dropped without changing state.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::CharacterConfig;
use crate::core::hash::StateHasher;
use crate::core::math::lerp;
use crate::core::timer::{charge_ratio, ChargeTimer, PhaseTimer};
use crate::game::events::SimEventData;
use crate::game::input::InputFrame;

/// Jump impulse for a given hold time: `jump_force × min(t, max) / max`.
#[inline]
pub fn jump_impulse(charge_time: f32, config: &CharacterConfig) -> f32 {
    config.jump_force * charge_ratio(charge_time, config.max_jump_time)
}

/// Squeeze while charging a jump: 1 at no charge, `min_squeeze` at full.
#[inline]
pub fn charge_squeeze(charge_time: f32, config: &CharacterConfig) -> f32 {
    lerp(1.0, config.min_squeeze, charge_ratio(charge_time, config.max_jump_time))
}

// =============================================================================
// SUB-MACHINE STATES
// =============================================================================

/// Jump phase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum JumpPhase {
    /// Ready.
    #[default]
    Idle,
    /// Button held, squeeze shrinking.
    Charging,
    /// Released, squeeze restoring.
    Cooldown,
}

/// Jump sub-machine.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct JumpState {
    /// Current phase.
    pub phase: JumpPhase,
    /// Hold time, clamped to `max_jump_time`.
    pub charge: ChargeTimer,
    /// Squeeze restore timer (valid in Cooldown).
    pub cooldown: PhaseTimer,
    /// An impulse was applied and its cooldown has not finished.
    pub jumped: bool,
    /// Squeeze at the moment of release.
    pub release_squeeze: f32,
}

impl JumpState {
    /// Seconds charged so far.
    #[inline]
    pub fn charge_time(&self) -> f32 {
        self.charge.held()
    }
}

/// Dash phase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DashPhase {
    /// Ready.
    #[default]
    Idle,
    /// Button held.
    Charging,
}

/// Dash sub-machine.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DashState {
    /// Current phase.
    pub phase: DashPhase,
    /// Hold time, clamped to `max_dash_time`.
    pub charge: ChargeTimer,
}

impl DashState {
    /// Seconds charged so far.
    #[inline]
    pub fn charge_time(&self) -> f32 {
        self.charge.held()
    }
}

/// Slam phase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlamPhase {
    /// Ready.
    #[default]
    Idle,
    /// Hanging in the air, velocity damping toward zero.
    Prep,
    /// Driving down, waiting for a ground collision.
    Falling,
}

/// Slam sub-machine.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SlamState {
    /// Current phase.
    pub phase: SlamPhase,
    /// Prep timer (valid in Prep).
    pub prep: PhaseTimer,
    /// Squeeze when prep started.
    pub start_squeeze: f32,
    /// Velocity when prep started.
    pub start_velocity: Vec3,
}

impl SlamState {
    /// Seconds spent in prep.
    #[inline]
    pub fn prep_elapsed(&self) -> f32 {
        self.prep.elapsed()
    }

    /// Is a slam in progress (Prep or Falling)?
    #[inline]
    pub fn is_active(&self) -> bool {
        self.phase != SlamPhase::Idle
    }
}

// =============================================================================
// STEP IO
// =============================================================================

/// Per-tick facts the machine reads.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ActionContext {
    /// Fixed tick delta (s).
    pub dt: f32,
    /// Ground probe result for this tick.
    pub grounded: bool,
    /// Body velocity at the start of the step.
    pub velocity: Vec3,
    /// World up.
    pub up: Vec3,
    /// Current facing (unit, horizontal).
    pub facing: Vec3,
}

/// Effects produced by one step.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ActionOutput {
    /// Jump impulse (apply as `ForceMode::Impulse`).
    pub jump_impulse: Option<Vec3>,
    /// Dash velocity change (apply as `ForceMode::VelocityChange`).
    pub dash_velocity_change: Option<Vec3>,
    /// Slam downward impulse (apply as `ForceMode::Impulse`).
    pub slam_impulse: Option<Vec3>,
    /// Velocity to force on the body (slam prep damping).
    pub velocity_override: Option<Vec3>,
    /// Transitions that happened.
    pub events: Vec<SimEventData>,
}

// =============================================================================
// MACHINE
// =============================================================================

/// Jump, dash and slam for one character.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionStateMachine {
    /// Jump sub-machine.
    pub jump: JumpState,
    /// Dash sub-machine.
    pub dash: DashState,
    /// Slam sub-machine.
    pub slam: SlamState,
    squeeze: f32,
}

impl Default for ActionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionStateMachine {
    /// All sub-machines idle, squeeze 1.
    pub fn new() -> Self {
        Self {
            jump: JumpState::default(),
            dash: DashState::default(),
            slam: SlamState::default(),
            squeeze: 1.0,
        }
    }

    /// Current squeeze factor in `[min_squeeze, 1]`.
    #[inline]
    pub fn squeeze(&self) -> f32 {
        self.squeeze
    }

    /// Are all three sub-machines idle?
    pub fn is_idle(&self) -> bool {
        self.jump.phase == JumpPhase::Idle
            && self.dash.phase == DashPhase::Idle
            && self.slam.phase == SlamPhase::Idle
    }

    /// Advance all sub-machines by one tick.
    pub fn step(
        &mut self,
        frame: &InputFrame,
        ctx: &ActionContext,
        config: &CharacterConfig,
    ) -> ActionOutput {
        let mut out = ActionOutput::default();
        self.step_slam(frame, ctx, config, &mut out);
        self.step_jump(frame, ctx, config, &mut out);
        self.step_dash(frame, ctx, config, &mut out);
        out
    }

    fn step_slam(
        &mut self,
        frame: &InputFrame,
        ctx: &ActionContext,
        config: &CharacterConfig,
        out: &mut ActionOutput,
    ) {
        match self.slam.phase {
            SlamPhase::Idle => {
                if !frame.slam_requested {
                    return;
                }
                if ctx.grounded {
                    trace!("slam rejected: grounded");
                    return;
                }
                if self.jump.phase == JumpPhase::Charging {
                    self.jump.phase = JumpPhase::Idle;
                    self.jump.charge.reset();
                    out.events.push(SimEventData::JumpCancelled);
                }
                self.slam = SlamState {
                    phase: SlamPhase::Prep,
                    prep: PhaseTimer::new(config.slam_prep_duration),
                    start_squeeze: self.squeeze,
                    start_velocity: ctx.velocity,
                };
                debug!("slam prep started");
                out.events.push(SimEventData::SlamPrepStarted);
            }
            SlamPhase::Prep => {
                self.slam.prep.advance(ctx.dt);
                let alpha = self.slam.prep.progress();
                self.squeeze = lerp(self.slam.start_squeeze, 1.0, alpha);
                out.velocity_override = Some(self.slam.start_velocity.lerp(Vec3::ZERO, alpha));

                if self.slam.prep.is_done() {
                    self.squeeze = 1.0;
                    self.slam.phase = SlamPhase::Falling;
                    out.slam_impulse = Some(-ctx.up * config.slam_force);
                    debug!(impulse = config.slam_force, "slam falling");
                    out.events.push(SimEventData::SlamFalling {
                        impulse: config.slam_force,
                    });
                }
            }
            // Ends through on_ground_impact once the simulator sees a landing.
            SlamPhase::Falling => {}
        }
    }

    fn step_jump(
        &mut self,
        frame: &InputFrame,
        ctx: &ActionContext,
        config: &CharacterConfig,
        out: &mut ActionOutput,
    ) {
        let slam_active = self.slam.is_active();

        match self.jump.phase {
            JumpPhase::Idle => {
                if !frame.jump_requested {
                    return;
                }
                if !ctx.grounded || slam_active {
                    trace!(grounded = ctx.grounded, slam_active, "jump rejected");
                    return;
                }
                self.jump.phase = JumpPhase::Charging;
                self.jump.charge = ChargeTimer::new(config.max_jump_time);
                out.events.push(SimEventData::JumpCharging);
                // Squeeze starts at 1; held time accrues from the next tick.
                self.squeeze = 1.0;
                if frame.jump_released {
                    self.release_jump(frame, ctx, config, out);
                }
            }
            JumpPhase::Charging => {
                self.jump.charge.accumulate(ctx.dt);
                self.squeeze = if config.trust_owner_squeeze && frame.squeeze > 0.0 {
                    frame.squeeze.clamp(config.min_squeeze, 1.0)
                } else {
                    charge_squeeze(self.jump.charge_time(), config)
                };
                if frame.jump_released && !slam_active {
                    self.release_jump(frame, ctx, config, out);
                }
            }
            JumpPhase::Cooldown => {
                self.jump.cooldown.advance(ctx.dt);
                if !slam_active {
                    self.squeeze = lerp(self.jump.release_squeeze, 1.0, self.jump.cooldown.progress());
                }
                if self.jump.cooldown.is_done() {
                    if !slam_active {
                        self.squeeze = 1.0;
                    }
                    self.jump.jumped = false;
                    self.jump.phase = JumpPhase::Idle;
                    trace!("jump cooldown finished");
                }
            }
        }
    }

    fn release_jump(
        &mut self,
        frame: &InputFrame,
        ctx: &ActionContext,
        config: &CharacterConfig,
        out: &mut ActionOutput,
    ) {
        let ratio = self.jump.charge.ratio();
        let magnitude = jump_impulse(self.jump.charge_time(), config);

        let applied = if ctx.grounded && !self.jump.jumped {
            out.jump_impulse = Some(ctx.up * magnitude);
            self.jump.jumped = true;
            magnitude
        } else {
            0.0
        };

        if (frame.jump_charge - ratio).abs() > config.charge_drift_tolerance {
            debug!(
                reported = frame.jump_charge,
                authoritative = ratio,
                "jump charge drift"
            );
        }

        debug!(ratio, impulse = applied, "jump released");
        out.events.push(SimEventData::JumpReleased {
            charge_ratio: ratio,
            impulse: applied,
        });

        self.jump.release_squeeze = self.squeeze;
        self.jump.cooldown = PhaseTimer::new(config.jump_cooldown);
        self.jump.charge.reset();
        self.jump.phase = JumpPhase::Cooldown;
    }

    fn step_dash(
        &mut self,
        frame: &InputFrame,
        ctx: &ActionContext,
        config: &CharacterConfig,
        out: &mut ActionOutput,
    ) {
        match self.dash.phase {
            DashPhase::Idle => {
                if !frame.dash_requested {
                    if frame.dash_released {
                        trace!("dash release ignored: not charging");
                    }
                    return;
                }
                self.dash.phase = DashPhase::Charging;
                self.dash.charge = ChargeTimer::new(config.max_dash_time);
                if frame.dash_released {
                    self.release_dash(frame, ctx, config, out);
                }
            }
            DashPhase::Charging => {
                self.dash.charge.accumulate(ctx.dt);
                if frame.dash_released {
                    self.release_dash(frame, ctx, config, out);
                }
            }
        }
    }

    fn release_dash(
        &mut self,
        frame: &InputFrame,
        ctx: &ActionContext,
        config: &CharacterConfig,
        out: &mut ActionOutput,
    ) {
        let ratio = self.dash.charge.ratio();
        let speed = config.dash_force * ratio;
        out.dash_velocity_change = Some(ctx.facing * speed);

        if (frame.dash_charge - ratio).abs() > config.charge_drift_tolerance {
            debug!(
                reported = frame.dash_charge,
                authoritative = ratio,
                "dash charge drift"
            );
        }

        debug!(ratio, speed, "dash released");
        out.events.push(SimEventData::DashReleased {
            charge_ratio: ratio,
            speed,
        });

        self.dash.charge.reset();
        self.dash.phase = DashPhase::Idle;
    }

    /// A qualifying ground collision was observed.
    ///
    /// Ends a falling slam and returns true if an impact should be broadcast.
    pub fn on_ground_impact(&mut self) -> bool {
        if self.slam.phase != SlamPhase::Falling {
            return false;
        }
        self.slam = SlamState::default();
        true
    }

    /// Hash all sub-machine state.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u8(self.jump.phase as u8);
        hasher.update_f32(self.jump.charge_time());
        hasher.update_f32(self.jump.cooldown.elapsed());
        hasher.update_bool(self.jump.jumped);
        hasher.update_u8(self.dash.phase as u8);
        hasher.update_f32(self.dash.charge_time());
        hasher.update_u8(self.slam.phase as u8);
        hasher.update_f32(self.slam.prep_elapsed());
        hasher.update_f32(self.squeeze);
    }
}

// =============================================================================
// TESTS
// =============================================================================
