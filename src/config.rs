//! Controller configuration components.
//!
//! This module defines every tunable of the locomotion controller: movement
//! and slide parameters, mouse-look settings and ground sensing. Each config
//! has documented defaults, presets, `with_*` builders and a `validate` check.

use bevy::prelude::*;
use thiserror::Error;

/// Errors reported when a configuration component holds nonsensical values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// A value that must be strictly positive is zero, negative or NaN.
    #[error("`{field}` must be positive, got {value}")]
    NotPositive { field: &'static str, value: f32 },

    /// A value that must not be negative is negative or NaN.
    #[error("`{field}` must not be negative, got {value}")]
    Negative { field: &'static str, value: f32 },

    /// A value is outside its allowed range.
    #[error("`{field}` must be within [{min}, {max}], got {value}")]
    OutOfRange {
        field: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },
}

fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { field, value })
    }
}

fn non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Negative { field, value })
    }
}

fn within(field: &'static str, value: f32, min: f32, max: f32) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

/// Movement, jump, crouch and slide parameters.
///
/// Force-valued parameters are in engine force units: the physics engine turns
/// a continuous force `F` into a velocity change of `F * dt / mass` per step.
/// Angles are in degrees.
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq)]
#[reflect(Component)]
pub struct LocomotionConfig {
    // === Movement Settings ===
    /// When false the controller issues no movement forces at all.
    pub has_control: bool,

    /// Base movement speed, scaled by `move_multiplier` or `sprint_multiplier`.
    pub move_speed: f32,

    /// Multiplier on `move_speed` while walking.
    pub move_multiplier: f32,

    /// Speed above which grounded input stops accelerating.
    pub ground_max_speed: f32,

    /// Ground friction. Each step opposes the velocity with `friction * dt`.
    pub friction: f32,

    /// Walkable maximum slope (degrees). At or above it, crouching anchors
    /// the character and slides cannot start.
    pub max_slope: f32,

    /// Small downward force applied every step to keep ground contact stable.
    pub ground_settle_force: f32,

    /// Downward force that pins a crouching character on a too-steep slope.
    pub slope_anchor_force: f32,

    // === Air Settings ===
    /// Whether horizontal velocity decays while airborne.
    pub enable_in_air_drag: bool,

    /// Speed above which air input stops accelerating.
    pub in_air_max_speed: f32,

    /// Multiplier on input acceleration while airborne.
    pub in_air_movement_modifier: f32,

    /// Air drag, used only when `enable_in_air_drag` is set.
    pub in_air_drag: f32,

    /// Air acceleration. `None` reuses the current ground move speed.
    pub in_air_acceleration: Option<f32>,

    // === Sprint Settings ===
    /// Whether sprinting is available.
    pub enable_sprint: bool,

    /// Multiplier on `move_speed` while sprinting.
    pub sprint_multiplier: f32,

    /// Added to `ground_max_speed` while sprinting.
    pub sprint_max_speed_modifier: f32,

    // === Jump Settings ===
    /// Whether jumping is available.
    pub enable_jump: bool,

    /// Keep jumping every step while the jump button is held and grounded.
    pub auto_jump: bool,

    /// Base jump impulse.
    pub jump_force: f32,

    /// Multiplier for a regular standing jump.
    pub jump_multiplier: f32,

    /// Slide jumps while descending use `speed * scale + jump_multiplier`.
    pub descending_jump_speed_scale: f32,

    // === Crouch Settings ===
    /// Whether crouching is available.
    pub enable_crouch: bool,

    /// Multiplier on input acceleration while crouching on the ground.
    pub crouch_move_multiplier: f32,

    /// Speed above which crouched input stops accelerating.
    pub crouch_max_speed: f32,

    /// Jump multiplier when crouching on a walkable slope.
    pub crouch_jump_multiplier: f32,

    /// Jump multiplier when crouching on a steep slope and not descending.
    pub slide_jump_multiplier: f32,

    /// Local scale applied while crouched.
    pub crouch_scale: Vec3,

    /// Collider height at unit scale. Crouching moves the body down by half
    /// of the height lost so the feet stay planted.
    pub standing_height: f32,

    // === Slide Settings ===
    /// Whether sliding is available.
    pub enable_slide: bool,

    /// Log the projected slide trajectory and per-frame distances.
    pub debug_slide_trajectory: bool,

    /// Forward impulse applied at slide start.
    pub slide_force: f32,

    /// Friction used instead of `friction` while sliding.
    pub slide_friction: f32,

    /// Seconds before another slide may start.
    pub slide_cooldown: f32,

    /// Minimum speed required to start a slide.
    pub slide_speed_threshold: f32,

    /// A slide ends once the body is this close to its projected end point.
    pub slide_stop_threshold: f32,
}

impl Default for LocomotionConfig {
    fn default() -> Self {
        Self {
            // Movement settings
            has_control: true,
            move_speed: 500.0,
            move_multiplier: 9.0,
            ground_max_speed: 20.0,
            friction: 230.0,
            max_slope: 15.0,
            ground_settle_force: 10.0,
            slope_anchor_force: 5000.0,

            // Air settings
            enable_in_air_drag: false,
            in_air_max_speed: 30.0,
            in_air_movement_modifier: 0.8,
            in_air_drag: 160.0,
            in_air_acceleration: None,

            // Sprint settings
            enable_sprint: true,
            sprint_multiplier: 12.0,
            sprint_max_speed_modifier: 5.0,

            // Jump settings
            enable_jump: true,
            auto_jump: true,
            jump_force: 7.0,
            jump_multiplier: 1.5,
            descending_jump_speed_scale: 0.1,

            // Crouch settings
            enable_crouch: true,
            crouch_move_multiplier: 0.5,
            crouch_max_speed: 10.0,
            crouch_jump_multiplier: 1.4,
            slide_jump_multiplier: 1.4,
            crouch_scale: Vec3::new(1.0, 0.5, 1.0),
            standing_height: 2.0,

            // Slide settings
            enable_slide: true,
            debug_slide_trajectory: false,
            slide_force: 25.0,
            slide_friction: 3.0,
            slide_cooldown: 1.0,
            slide_speed_threshold: 5.0,
            slide_stop_threshold: 2.4,
        }
    }
}

impl LocomotionConfig {
    /// Check every value for sign and range errors.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("move_speed", self.move_speed)?;
        positive("move_multiplier", self.move_multiplier)?;
        positive("ground_max_speed", self.ground_max_speed)?;
        non_negative("friction", self.friction)?;
        within("max_slope", self.max_slope, 0.0, 90.0)?;
        non_negative("ground_settle_force", self.ground_settle_force)?;
        non_negative("slope_anchor_force", self.slope_anchor_force)?;

        positive("in_air_max_speed", self.in_air_max_speed)?;
        non_negative("in_air_movement_modifier", self.in_air_movement_modifier)?;
        non_negative("in_air_drag", self.in_air_drag)?;
        if let Some(accel) = self.in_air_acceleration {
            non_negative("in_air_acceleration", accel)?;
        }

        positive("sprint_multiplier", self.sprint_multiplier)?;
        non_negative("sprint_max_speed_modifier", self.sprint_max_speed_modifier)?;

        positive("jump_force", self.jump_force)?;
        positive("jump_multiplier", self.jump_multiplier)?;
        non_negative("descending_jump_speed_scale", self.descending_jump_speed_scale)?;

        non_negative("crouch_move_multiplier", self.crouch_move_multiplier)?;
        positive("crouch_max_speed", self.crouch_max_speed)?;
        positive("crouch_jump_multiplier", self.crouch_jump_multiplier)?;
        positive("slide_jump_multiplier", self.slide_jump_multiplier)?;
        positive("crouch_scale.x", self.crouch_scale.x)?;
        positive("crouch_scale.y", self.crouch_scale.y)?;
        positive("crouch_scale.z", self.crouch_scale.z)?;
        positive("standing_height", self.standing_height)?;

        positive("slide_force", self.slide_force)?;
        non_negative("slide_friction", self.slide_friction)?;
        non_negative("slide_cooldown", self.slide_cooldown)?;
        non_negative("slide_speed_threshold", self.slide_speed_threshold)?;
        non_negative("slide_stop_threshold", self.slide_stop_threshold)?;
        Ok(())
    }

    /// Config tuned for a fast, floaty arena shooter feel.
    pub fn arena() -> Self {
        Self {
            enable_in_air_drag: false,
            in_air_movement_modifier: 1.0,
            slide_force: 35.0,
            slide_cooldown: 0.5,
            ..default()
        }
    }

    /// Config with sprinting, sliding and auto-jump disabled.
    pub fn grounded_walker() -> Self {
        Self {
            enable_sprint: false,
            enable_slide: false,
            auto_jump: false,
            ..default()
        }
    }

    /// Builder: set move speed and walk multiplier.
    pub fn with_move_speed(mut self, speed: f32, multiplier: f32) -> Self {
        self.move_speed = speed;
        self.move_multiplier = multiplier;
        self
    }

    /// Builder: set ground friction.
    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    /// Builder: set walkable maximum slope in degrees.
    pub fn with_max_slope(mut self, degrees: f32) -> Self {
        self.max_slope = degrees;
        self
    }

    /// Builder: enable air drag with the given strength.
    pub fn with_air_drag(mut self, drag: f32) -> Self {
        self.enable_in_air_drag = true;
        self.in_air_drag = drag;
        self
    }

    /// Builder: use a dedicated air acceleration instead of the move speed.
    pub fn with_air_acceleration(mut self, acceleration: f32) -> Self {
        self.in_air_acceleration = Some(acceleration);
        self
    }

    /// Builder: set jump force and base multiplier.
    pub fn with_jump(mut self, force: f32, multiplier: f32) -> Self {
        self.jump_force = force;
        self.jump_multiplier = multiplier;
        self
    }

    /// Builder: enable or disable auto-jump.
    pub fn with_auto_jump(mut self, enabled: bool) -> Self {
        self.auto_jump = enabled;
        self
    }

    /// Builder: set slide force, cooldown and start threshold.
    pub fn with_slide(mut self, force: f32, cooldown: f32, speed_threshold: f32) -> Self {
        self.slide_force = force;
        self.slide_cooldown = cooldown;
        self.slide_speed_threshold = speed_threshold;
        self
    }

    /// Builder: set the slide stop distance.
    pub fn with_slide_stop_threshold(mut self, threshold: f32) -> Self {
        self.slide_stop_threshold = threshold;
        self
    }

    /// Builder: set crouch scale.
    pub fn with_crouch_scale(mut self, scale: Vec3) -> Self {
        self.crouch_scale = scale;
        self
    }

    /// Builder: log slide trajectories.
    pub fn with_debug_slide_trajectory(mut self, enabled: bool) -> Self {
        self.debug_slide_trajectory = enabled;
        self
    }
}

/// Mouse-look configuration.
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq)]
#[reflect(Component)]
pub struct LookConfig {
    /// Whether look input rotates the camera and body frame.
    pub enable_mouse_look: bool,
    /// Per-axis sensitivity.
    pub sensitivity: Vec2,
    /// Global multiplier on top of `sensitivity`.
    pub sens_multiplier: f32,
    /// Pitch limit in degrees, both up and down.
    pub max_angle: f32,
}

impl Default for LookConfig {
    fn default() -> Self {
        Self {
            enable_mouse_look: true,
            sensitivity: Vec2::new(20.0, 20.0),
            sens_multiplier: 0.2,
            max_angle: 90.0,
        }
    }
}

impl LookConfig {
    /// Turn a raw device delta into degrees for this step.
    pub fn scale_delta(&self, raw: Vec2, dt: f32) -> Vec2 {
        raw * self.sensitivity * dt * self.sens_multiplier
    }

    /// Check every value for sign and range errors.
    pub fn validate(&self) -> Result<(), ConfigError> {
        non_negative("sensitivity.x", self.sensitivity.x)?;
        non_negative("sensitivity.y", self.sensitivity.y)?;
        non_negative("sens_multiplier", self.sens_multiplier)?;
        within("max_angle", self.max_angle, 0.0, 90.0)
    }

    /// Builder: set sensitivity.
    pub fn with_sensitivity(mut self, sensitivity: Vec2) -> Self {
        self.sensitivity = sensitivity;
        self
    }

    /// Builder: set the pitch limit.
    pub fn with_max_angle(mut self, degrees: f32) -> Self {
        self.max_angle = degrees;
        self
    }
}

/// How ground contact is detected.
#[derive(Reflect, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GroundSensorStrategy {
    /// Ground state follows physics contacts; slope comes from a short ray.
    ContactPersistence,
    /// A downward sphere probe each step decides ground state and slope.
    #[default]
    ProbeCast,
}

/// Ground sensor configuration.
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq)]
#[reflect(Component)]
pub struct GroundSensorConfig {
    /// Detection strategy.
    pub strategy: GroundSensorStrategy,
    /// Length of the slope ray used by the contact strategy.
    pub slope_raycast_distance: f32,
    /// Radius of the probe sphere.
    pub probe_radius: f32,
    /// Probe distance from the body origin while standing.
    pub probe_distance: f32,
    /// Probe distance while crouched (the collider is shorter).
    pub crouch_probe_distance: f32,
    /// Collision-group bits of ground colliders. `None` treats everything as ground.
    pub ground_layers: Option<u32>,
}

impl Default for GroundSensorConfig {
    fn default() -> Self {
        Self {
            strategy: GroundSensorStrategy::ProbeCast,
            slope_raycast_distance: 1.0,
            probe_radius: 0.4,
            probe_distance: 0.75,
            crouch_probe_distance: 0.3,
            ground_layers: None,
        }
    }
}

impl GroundSensorConfig {
    /// Contact-persistence sensing with default distances.
    pub fn contacts() -> Self {
        Self {
            strategy: GroundSensorStrategy::ContactPersistence,
            ..default()
        }
    }

    /// Probe distance for the current crouch state.
    #[inline]
    pub fn probe_distance_for(&self, crouching: bool) -> f32 {
        if crouching {
            self.crouch_probe_distance
        } else {
            self.probe_distance
        }
    }

    /// Builder: restrict ground to the given collision-group bits.
    pub fn with_ground_layers(mut self, layers: u32) -> Self {
        self.ground_layers = Some(layers);
        self
    }

    /// Builder: set probe radius and distances.
    pub fn with_probe(mut self, radius: f32, distance: f32, crouch_distance: f32) -> Self {
        self.probe_radius = radius;
        self.probe_distance = distance;
        self.crouch_probe_distance = crouch_distance;
        self
    }

    /// Check every value for sign errors.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("slope_raycast_distance", self.slope_raycast_distance)?;
        positive("probe_radius", self.probe_radius)?;
        positive("probe_distance", self.probe_distance)?;
        positive("crouch_probe_distance", self.crouch_probe_distance)
    }
}
