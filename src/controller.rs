//! The locomotion state machine.
//!
//! [`LocomotionController`] owns the [`MovementState`] and turns input plus
//! ground state into forces. It never talks to the physics engine itself:
//! every operation returns the force, impulse or pose change to apply, and
//! the systems in [`crate::systems`] hand those to the backend. This keeps the
//! whole model testable without a physics world.
//!
//! # Force model
//!
//! Forces are continuous unless stated otherwise: the engine integrates a
//! force `F` into a velocity change of `F * dt / mass` per fixed step.
//!
//! | Regime | Decay term | Input term |
//! |---|---|---|
//! | `SlopeBlocked` | none, downward anchor only | none |
//! | `Airborne` | `-v_xz * in_air_drag * dt` if drag enabled | `dir * air_accel * dt * in_air_movement_modifier` |
//! | `Sliding` | `-v * slide_friction * dt` | `dir * move_speed * dt * crouch_multiplier` |
//! | `Ground` | `-v * friction * dt` | `dir * move_speed * dt * crouch_multiplier` |
//!
//! Decay terms are limited so one step never removes more than the current
//! velocity. A small settling force pointing down is added in every regime.

use bevy::prelude::*;

use crate::config::LocomotionConfig;
use crate::detection::GroundInfo;
use crate::intent::LocomotionIntent;
use crate::look::BodyOrientation;
use crate::slide::{SlideProbe, SlideTimer, SlideTimerState};
use crate::state::MovementState;

/// Movement model selected for one fixed step, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Regime {
    /// Crouching on ground too steep to walk: only anchor the body.
    SlopeBlocked,
    /// Not grounded, or jump held.
    Airborne,
    /// Grounded while a slide is in progress.
    Sliding,
    /// Regular ground movement.
    Ground,
}

/// Per-step values read from input and the physics engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepInput {
    /// Strafe (`x`) and forward (`y`) axes.
    pub move_axes: Vec2,
    /// Yaw-only facing frame.
    pub orientation: BodyOrientation,
    /// Current linear velocity.
    pub velocity: Vec3,
    /// Body mass. Must be positive.
    pub mass: f32,
}

/// Physical snapshot of the body used by crouch, slide and jump handling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodySnapshot {
    pub position: Vec3,
    pub velocity: Vec3,
    pub mass: f32,
    pub scale: Vec3,
    /// Horizontal forward direction of the body frame.
    pub forward: Vec3,
}

/// Pose change requested by a crouch toggle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrouchOutcome {
    /// New local scale.
    pub scale: Vec3,
    /// Translation to apply so the feet stay planted.
    pub offset: Vec3,
    /// Slide impulse, when the crouch started a slide.
    pub slide_impulse: Option<Vec3>,
}

/// Force opposing `velocity` by `coefficient * dt`, limited so that a single
/// step never reverses the velocity.
fn decay_force(velocity: Vec3, coefficient: f32, dt: f32, mass: f32) -> Vec3 {
    if coefficient <= 0.0 || velocity.length_squared() <= f32::EPSILON {
        return Vec3::ZERO;
    }
    let force = -velocity * coefficient * dt;
    if mass > 0.0 {
        force.clamp_length_max(velocity.length() * mass / dt)
    } else {
        force
    }
}

#[inline]
fn horizontal(v: Vec3) -> Vec3 {
    Vec3::new(v.x, 0.0, v.z)
}

/// First-person locomotion controller.
///
/// This is the **central hub** for all movement state. Every mutation of
/// [`MovementState`] goes through the methods below, which are called from
/// the fixed-step and frame systems in a fixed order.
///
/// Spawning a controller also inserts default [`LocomotionConfig`],
/// [`LocomotionIntent`], [`BodyOrientation`] and [`GroundInfo`] components
/// unless they are provided.
#[derive(Component, Reflect, Debug, Clone, Default)]
#[reflect(Component)]
#[require(LocomotionConfig, LocomotionIntent, BodyOrientation, GroundInfo)]
pub struct LocomotionController {
    state: MovementState,
    slide_timer: Option<SlideTimer>,

    // === Force accumulation (used by backends that keep persistent forces) ===
    #[reflect(ignore)]
    accumulated_force: Vec3,
    #[reflect(ignore)]
    applied_force: Vec3,
}

impl LocomotionController {
    /// Create a controller with idle state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a controller whose crouch restores to the given scale.
    pub fn with_standing_scale(scale: Vec3) -> Self {
        let mut controller = Self::default();
        controller.state.standing_scale = scale;
        controller
    }

    /// Current movement state.
    #[inline]
    pub fn state(&self) -> &MovementState {
        &self.state
    }

    /// The active slide timer, if a slide is being tracked.
    #[inline]
    pub fn slide_timer(&self) -> Option<&SlideTimer> {
        self.slide_timer.as_ref()
    }

    // ==================== Inputs ====================

    /// Take this step's ground sensor result.
    ///
    /// Must run before [`try_jump`](Self::try_jump) and
    /// [`advance`](Self::advance) in the same step, so that a jump's
    /// `grounded = false` is not overwritten before movement uses it.
    pub fn observe_ground(&mut self, ground: &GroundInfo) {
        self.state.was_grounded = self.state.grounded;
        self.state.grounded = ground.grounded;
        if ground.detected {
            self.state.current_slope = ground.slope_angle;
        }
    }

    /// Record whether sprint is held.
    pub fn set_sprinting(&mut self, held: bool) {
        self.state.sprinting = held;
    }

    /// Record whether jump is held.
    pub fn set_jumping(&mut self, held: bool) {
        self.state.jumping = held;
    }

    /// Whether the character touched down this step.
    #[inline]
    pub fn just_landed(&self) -> bool {
        self.state.grounded && !self.state.was_grounded
    }

    // ==================== Derived Quantities ====================

    /// Target speed fed into the input term.
    pub fn current_move_speed(&self, config: &LocomotionConfig) -> f32 {
        let multiplier = if config.enable_sprint && self.state.sprinting {
            config.sprint_multiplier
        } else {
            config.move_multiplier
        };
        config.move_speed * multiplier
    }

    /// Speed above which input stops accelerating the body.
    pub fn current_max_speed(&self, config: &LocomotionConfig) -> f32 {
        if self.state.in_air() {
            config.in_air_max_speed
        } else if self.state.crouching {
            config.crouch_max_speed
        } else if config.enable_sprint && self.state.sprinting {
            config.ground_max_speed + config.sprint_max_speed_modifier
        } else {
            config.ground_max_speed
        }
    }

    /// Input multiplier for the grounded regimes.
    fn crouch_multiplier(&self, config: &LocomotionConfig) -> f32 {
        if self.state.grounded && self.state.crouching {
            config.crouch_move_multiplier
        } else {
            1.0
        }
    }

    /// Movement regime for the current state.
    pub fn regime(&self, config: &LocomotionConfig) -> Regime {
        let state = &self.state;
        if state.grounded && state.crouching && state.on_steep_slope(config.max_slope) {
            Regime::SlopeBlocked
        } else if state.in_air() {
            Regime::Airborne
        } else if state.sliding {
            Regime::Sliding
        } else {
            Regime::Ground
        }
    }

    /// Whether a slide may start at the given speed.
    pub fn can_slide(&self, speed: f32, config: &LocomotionConfig) -> bool {
        let state = &self.state;
        speed > config.slide_speed_threshold
            && state.grounded
            && state.crouching
            && !state.sliding
            && state.slide_cooldown_elapsed(config.slide_cooldown)
            && !state.on_steep_slope(config.max_slope)
    }

    /// Jump multiplier for the current state.
    ///
    /// Crouching on walkable ground gives a crouch jump. Crouching on a steep
    /// slope gives a slide jump, which scales with speed while descending.
    /// Everything else is a regular jump.
    pub fn jump_multiplier(&self, velocity: Vec3, config: &LocomotionConfig) -> f32 {
        let steep = self.state.on_steep_slope(config.max_slope);
        match (self.state.crouching, steep) {
            (true, false) => config.crouch_jump_multiplier,
            (true, true) if velocity.y < 0.0 => {
                velocity.length() * config.descending_jump_speed_scale + config.jump_multiplier
            }
            (true, true) => config.slide_jump_multiplier,
            (false, _) => config.jump_multiplier,
        }
    }

    // ==================== Actions ====================

    /// Jump if grounded. Returns the upward impulse to apply.
    ///
    /// Clears `grounded` right away so the rest of the step already uses the
    /// airborne model.
    pub fn try_jump(&mut self, velocity: Vec3, config: &LocomotionConfig) -> Option<Vec3> {
        if !config.enable_jump || !self.state.grounded {
            return None;
        }

        let multiplier = self.jump_multiplier(velocity, config);
        self.state.grounded = false;

        debug!("jump with multiplier {multiplier:.2}");
        Some(Vec3::Y * config.jump_force * multiplier)
    }

    /// Enter or leave the crouch.
    ///
    /// Entering records the current scale, shrinks to `crouch_scale`, lowers
    /// the body by half the lost height and starts a slide when possible.
    /// Leaving always clears both `crouching` and `sliding` and restores the
    /// recorded scale. Entering while already crouched does nothing.
    pub fn set_crouch(
        &mut self,
        active: bool,
        body: &BodySnapshot,
        config: &LocomotionConfig,
    ) -> Option<CrouchOutcome> {
        if !config.enable_crouch {
            return None;
        }

        if active {
            if self.state.crouching {
                return None;
            }
            self.state.standing_scale = body.scale;
            self.state.crouching = true;

            let offset = Vec3::NEG_Y * self.crouch_drop(config);
            let crouched = BodySnapshot {
                position: body.position + offset,
                ..*body
            };
            let slide_impulse = self.slide(&crouched, config);

            debug!("crouch entered (slide: {})", slide_impulse.is_some());
            Some(CrouchOutcome {
                scale: config.crouch_scale,
                offset,
                slide_impulse,
            })
        } else {
            let was_crouching = self.state.crouching;
            self.state.crouching = false;
            self.state.sliding = false;

            let offset = if was_crouching {
                debug!("crouch left");
                Vec3::Y * self.crouch_drop(config)
            } else {
                Vec3::ZERO
            };
            Some(CrouchOutcome {
                scale: self.state.standing_scale,
                offset,
                slide_impulse: None,
            })
        }
    }

    /// Half the height lost by crouching.
    fn crouch_drop(&self, config: &LocomotionConfig) -> f32 {
        (self.state.standing_scale.y - config.crouch_scale.y) * config.standing_height * 0.5
    }

    /// Start a slide if allowed. Returns the forward impulse to apply.
    ///
    /// The slide timer is seeded with the momentum the body will have once
    /// the impulse lands. A timer from an earlier slide is dropped.
    pub fn slide(&mut self, body: &BodySnapshot, config: &LocomotionConfig) -> Option<Vec3> {
        if !config.enable_slide || !self.can_slide(body.velocity.length(), config) {
            return None;
        }

        let impulse = body.forward * config.slide_force;
        self.state.sliding = true;
        self.state.time_since_last_slide = 0.0;
        self.state.slide_generation += 1;

        let generation = self.state.slide_generation;
        let momentum = body.velocity * body.mass + impulse;
        let timer = SlideTimer::new(generation, momentum, body.mass, body.position);

        if config.debug_slide_trajectory {
            debug!(
                "slide {generation} projected from {} to {}",
                body.position,
                timer.final_position()
            );
        }
        if let Some(previous) = self.slide_timer.replace(timer) {
            if !previous.is_finished() {
                debug!(
                    "slide {generation} supersedes slide {}",
                    previous.generation()
                );
            }
        }

        debug!("slide {generation} started");
        Some(impulse)
    }

    /// Start a slide when touching down crouched and fast enough.
    pub fn try_landing_slide(
        &mut self,
        body: &BodySnapshot,
        config: &LocomotionConfig,
    ) -> Option<Vec3> {
        if !self.just_landed() {
            return None;
        }
        self.slide(body, config)
    }

    /// Compute this step's continuous force.
    pub fn advance(&mut self, dt: f32, input: &StepInput, config: &LocomotionConfig) -> Vec3 {
        if !config.has_control || dt <= 0.0 {
            return Vec3::ZERO;
        }

        let settle = Vec3::NEG_Y * config.ground_settle_force * dt;
        let regime = self.regime(config);
        trace!("locomotion regime {regime:?}");

        if regime == Regime::SlopeBlocked {
            return settle + Vec3::NEG_Y * config.slope_anchor_force * dt;
        }

        let velocity = input.velocity;
        let mut direction = input.orientation.direction(input.move_axes).normalize_or_zero();
        if velocity.length() > self.current_max_speed(config) {
            direction = Vec3::ZERO;
        }
        let move_speed = self.current_move_speed(config);

        let movement = match regime {
            Regime::Airborne => {
                let drag = if config.enable_in_air_drag {
                    decay_force(horizontal(velocity), config.in_air_drag, dt, input.mass)
                } else {
                    Vec3::ZERO
                };
                let acceleration = config.in_air_acceleration.unwrap_or(move_speed);
                drag + direction * acceleration * dt * config.in_air_movement_modifier
            }
            Regime::Sliding => {
                decay_force(velocity, config.slide_friction, dt, input.mass)
                    + direction * move_speed * dt * self.crouch_multiplier(config)
            }
            Regime::Ground => {
                decay_force(velocity, config.friction, dt, input.mass)
                    + direction * move_speed * dt * self.crouch_multiplier(config)
            }
            Regime::SlopeBlocked => Vec3::ZERO,
        };

        settle + movement
    }

    // ==================== Frame Updates ====================

    /// Advance the slide cooldown.
    pub fn tick_cooldown(&mut self, dt: f32, config: &LocomotionConfig) {
        if config.enable_slide && self.state.time_since_last_slide < config.slide_cooldown {
            self.state.time_since_last_slide += dt;
        }
    }

    /// Poll the slide timer once. Returns `None` when no timer is active.
    ///
    /// A finished timer is dropped. It clears `sliding` only if it still
    /// belongs to the current slide generation.
    pub fn poll_slide_timer(
        &mut self,
        position: Vec3,
        config: &LocomotionConfig,
    ) -> Option<SlideTimerState> {
        let timer = self.slide_timer.as_mut()?;

        let probe = SlideProbe {
            position,
            crouching: self.state.crouching,
            slope: self.state.current_slope,
            max_slope: config.max_slope,
            stop_threshold: config.slide_stop_threshold,
        };
        let status = timer.poll(&probe);
        let generation = timer.generation();

        if config.debug_slide_trajectory {
            debug!(
                "slide {generation}: {:.2} to projected end",
                timer.distance_to_target()
            );
        }

        if status == SlideTimerState::Finished {
            self.slide_timer = None;
            if generation == self.state.slide_generation && self.state.sliding {
                self.state.sliding = false;
                debug!("slide {generation} ended");
            }
        }
        Some(status)
    }

    // ==================== Force Accumulation ====================

    /// Add a force to this step's accumulator.
    pub fn add_force(&mut self, force: Vec3) {
        self.accumulated_force += force;
    }

    /// Force accumulated so far this step.
    pub fn accumulated_force(&self) -> Vec3 {
        self.accumulated_force
    }

    /// Start a new step. Returns the force applied last step so the backend
    /// can remove it, and clears the accumulator.
    pub(crate) fn prepare_new_frame(&mut self) -> Vec3 {
        self.accumulated_force = Vec3::ZERO;
        std::mem::take(&mut self.applied_force)
    }

    /// Finish the step. Returns the accumulated force and remembers it as
    /// applied.
    pub(crate) fn finalize_frame(&mut self) -> Vec3 {
        self.applied_force = self.accumulated_force;
        self.applied_force
    }
}
