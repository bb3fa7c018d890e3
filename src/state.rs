//! Movement state and state marker components.
//!
//! [`MovementState`] is the single source of truth for the controller's
//! flags and timers. The marker components mirror it for convenient queries
//! and are added/removed by [`crate::systems::sync_state_markers`].

use bevy::prelude::*;

/// Flags and timers describing what the character is currently doing.
///
/// Owned by [`LocomotionController`](crate::controller::LocomotionController)
/// and only mutated through its methods.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct MovementState {
    /// Standing on ground this step.
    pub grounded: bool,
    /// Grounded value of the previous fixed step, used to detect landings.
    pub was_grounded: bool,
    /// Angle between world-up and the last ground normal, in degrees.
    pub current_slope: f32,
    /// Crouch is active.
    pub crouching: bool,
    /// A slide is in progress. Never true without `crouching`.
    pub sliding: bool,
    /// Sprint is held.
    pub sprinting: bool,
    /// Jump is held.
    pub jumping: bool,
    /// Seconds since the last slide started. Infinite before the first slide.
    pub time_since_last_slide: f32,
    /// Bumped on every slide start; identifies the current slide timer.
    pub slide_generation: u64,
    /// Scale restored when the crouch ends.
    pub standing_scale: Vec3,
}

impl Default for MovementState {
    fn default() -> Self {
        Self {
            grounded: false,
            was_grounded: false,
            current_slope: 0.0,
            crouching: false,
            sliding: false,
            sprinting: false,
            jumping: false,
            time_since_last_slide: f32::INFINITY,
            slide_generation: 0,
            standing_scale: Vec3::ONE,
        }
    }
}

impl MovementState {
    /// Whether the last ground contact is too steep to walk on.
    #[inline]
    pub fn on_steep_slope(&self, max_slope: f32) -> bool {
        self.current_slope >= max_slope
    }

    /// Whether the slide cooldown has elapsed.
    #[inline]
    pub fn slide_cooldown_elapsed(&self, cooldown: f32) -> bool {
        self.time_since_last_slide >= cooldown
    }

    /// Whether the airborne model applies (in the air or holding jump).
    #[inline]
    pub fn in_air(&self) -> bool {
        !self.grounded || self.jumping
    }
}

/// Marker component indicating the character is grounded.
///
/// This is a marker component - it has no data, just indicates state.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Grounded;

/// Marker component indicating the character is airborne.
///
/// Mutually exclusive with [`Grounded`].
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Airborne;

/// Marker component indicating the character is crouched.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Crouching;

/// Marker component indicating a slide is in progress.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Sliding;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_is_idle() {
        let state = MovementState::default();
        assert!(!state.grounded);
        assert!(!state.crouching);
        assert!(!state.sliding);
        assert_eq!(state.slide_generation, 0);
        assert_eq!(state.standing_scale, Vec3::ONE);
    }

    #[test]
    fn first_slide_is_never_on_cooldown() {
        let state = MovementState::default();
        assert!(state.time_since_last_slide.is_infinite());
        assert!(state.slide_cooldown_elapsed(1.0));
    }

    #[test]
    fn steep_slope_is_inclusive() {
        let state = MovementState {
            current_slope: 15.0,
            ..default()
        };
        assert!(state.on_steep_slope(15.0));
        assert!(!state.on_steep_slope(15.5));
    }

    #[test]
    fn holding_jump_counts_as_airborne() {
        let mut state = MovementState {
            grounded: true,
            ..default()
        };
        assert!(!state.in_air());

        state.jumping = true;
        assert!(state.in_air());
    }
}
