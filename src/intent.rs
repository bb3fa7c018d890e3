//! Movement intent component.
//!
//! Intents represent what the player (or AI) wants to do. Input code writes
//! axes and held button states here at any time; the controller reads them at
//! the start of the next fixed step, detects press/release edges and applies
//! their effects there. Nothing written here touches physics directly.

use bevy::prelude::*;

/// Press/release transitions of one button since the last fixed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ButtonEdge {
    /// The button went from released to held.
    pub pressed: bool,
    /// The button went from held to released.
    pub released: bool,
}

impl ButtonEdge {
    /// Held states the button passed through since the last step, in order.
    ///
    /// `held` is the state the button is in now. When both edges are
    /// latched, the one leading away from `held` happened first.
    pub fn transitions(self, held: bool) -> impl Iterator<Item = bool> {
        let both = self.pressed && self.released;
        let first = if both {
            Some(!held)
        } else if self.pressed {
            Some(true)
        } else if self.released {
            Some(false)
        } else {
            None
        };
        first.into_iter().chain(both.then_some(held))
    }
}

/// Edges for every button, consumed once per fixed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IntentEdges {
    pub jump: ButtonEdge,
    pub crouch: ButtonEdge,
    pub sprint: ButtonEdge,
}

#[derive(Reflect, Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Button {
    held: bool,
    pressed: bool,
    released: bool,
}

impl Button {
    fn set(&mut self, held: bool) {
        if held && !self.held {
            self.pressed = true;
        } else if !held && self.held {
            self.released = true;
        }
        self.held = held;
    }

    fn take_edge(&mut self) -> ButtonEdge {
        let edge = ButtonEdge {
            pressed: self.pressed,
            released: self.released,
        };
        self.pressed = false;
        self.released = false;
        edge
    }
}

/// Player input for one character.
///
/// # Example
///
/// ```rust
/// use bevy::prelude::*;
/// use fps_locomotion::prelude::*;
///
/// let mut intent = LocomotionIntent::new();
/// intent.set_move(Vec2::new(0.0, 1.0));
/// intent.set_jump_pressed(true);
/// assert!(intent.is_moving());
/// assert!(intent.is_jump_pressed());
/// ```
#[derive(Component, Reflect, Debug, Clone, Default, PartialEq)]
#[reflect(Component)]
pub struct LocomotionIntent {
    /// Strafe (`x`) and forward (`y`) axes, each in [-1, 1].
    pub move_axes: Vec2,
    /// Raw look delta accumulated since the last frame update.
    pub look_delta: Vec2,
    jump: Button,
    crouch: Button,
    sprint: Button,
}

impl LocomotionIntent {
    /// Create a new empty intent.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the move axes, each clamped to [-1, 1].
    pub fn set_move(&mut self, axes: Vec2) {
        self.move_axes = axes.clamp(Vec2::NEG_ONE, Vec2::ONE);
    }

    /// Add a raw look delta. Deltas accumulate until the look update reads them.
    pub fn add_look(&mut self, delta: Vec2) {
        self.look_delta += delta;
    }

    /// Take the accumulated look delta, leaving zero behind.
    pub fn take_look(&mut self) -> Vec2 {
        std::mem::take(&mut self.look_delta)
    }

    /// Clear movement axes and look delta. Button states are kept.
    pub fn clear(&mut self) {
        self.move_axes = Vec2::ZERO;
        self.look_delta = Vec2::ZERO;
    }

    /// Whether there is active movement input.
    pub fn is_moving(&self) -> bool {
        self.move_axes.length_squared() > 1e-6
    }

    /// Set whether jump is held.
    pub fn set_jump_pressed(&mut self, pressed: bool) {
        self.jump.set(pressed);
    }

    /// Set whether crouch is held.
    pub fn set_crouch_pressed(&mut self, pressed: bool) {
        self.crouch.set(pressed);
    }

    /// Set whether sprint is held.
    pub fn set_sprint_pressed(&mut self, pressed: bool) {
        self.sprint.set(pressed);
    }

    /// Whether jump is currently held.
    pub fn is_jump_pressed(&self) -> bool {
        self.jump.held
    }

    /// Whether crouch is currently held.
    pub fn is_crouch_pressed(&self) -> bool {
        self.crouch.held
    }

    /// Whether sprint is currently held.
    pub fn is_sprint_pressed(&self) -> bool {
        self.sprint.held
    }

    /// Return the edges since the previous call and mark them consumed.
    ///
    /// Edges are latched when the held state changes, so a press and release
    /// that both happen between two fixed steps are both reported.
    pub fn take_edges(&mut self) -> IntentEdges {
        IntentEdges {
            jump: self.jump.take_edge(),
            crouch: self.crouch.take_edge(),
            sprint: self.sprint.take_edge(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_new() {
        let intent = LocomotionIntent::new();
        assert_eq!(intent.move_axes, Vec2::ZERO);
        assert!(!intent.is_jump_pressed());
        assert!(!intent.is_crouch_pressed());
        assert!(!intent.is_sprint_pressed());
    }

    #[test]
    fn move_axes_are_clamped() {
        let mut intent = LocomotionIntent::new();
        intent.set_move(Vec2::new(3.0, -2.0));
        assert_eq!(intent.move_axes, Vec2::new(1.0, -1.0));
    }

    #[test]
    fn is_moving_threshold() {
        let mut intent = LocomotionIntent::new();
        assert!(!intent.is_moving());

        intent.set_move(Vec2::new(0.0001, 0.0));
        assert!(!intent.is_moving());

        intent.set_move(Vec2::new(0.5, 0.0));
        assert!(intent.is_moving());
    }

    #[test]
    fn look_delta_accumulates_and_is_taken() {
        let mut intent = LocomotionIntent::new();
        intent.add_look(Vec2::new(1.0, 2.0));
        intent.add_look(Vec2::new(0.5, -1.0));

        assert_eq!(intent.take_look(), Vec2::new(1.5, 1.0));
        assert_eq!(intent.take_look(), Vec2::ZERO);
    }

    #[test]
    fn press_edge_reported_once() {
        let mut intent = LocomotionIntent::new();
        intent.set_jump_pressed(true);

        let edges = intent.take_edges();
        assert!(edges.jump.pressed);
        assert!(!edges.jump.released);

        // Still held: no new edge.
        let edges = intent.take_edges();
        assert_eq!(edges.jump, ButtonEdge::default());
    }

    #[test]
    fn release_edge_reported() {
        let mut intent = LocomotionIntent::new();
        intent.set_crouch_pressed(true);
        intent.take_edges();

        intent.set_crouch_pressed(false);
        let edges = intent.take_edges();
        assert!(edges.crouch.released);
        assert!(!edges.crouch.pressed);
    }

    #[test]
    fn tap_between_steps_reports_both_edges() {
        let mut intent = LocomotionIntent::new();
        intent.set_jump_pressed(true);
        intent.set_jump_pressed(false);

        let edges = intent.take_edges();
        assert!(edges.jump.pressed);
        assert!(edges.jump.released);
        assert!(!intent.is_jump_pressed());

        // Consumed.
        assert_eq!(intent.take_edges(), IntentEdges::default());
    }

    #[test]
    fn repeated_same_state_is_not_an_edge() {
        let mut intent = LocomotionIntent::new();
        intent.set_crouch_pressed(false);
        assert_eq!(intent.take_edges(), IntentEdges::default());

        intent.set_crouch_pressed(true);
        intent.set_crouch_pressed(true);
        let edges = intent.take_edges();
        assert!(edges.crouch.pressed);
        assert!(!edges.crouch.released);
    }

    #[test]
    fn transitions_follow_event_order() {
        let none = ButtonEdge::default();
        assert_eq!(none.transitions(true).count(), 0);

        let press = ButtonEdge {
            pressed: true,
            released: false,
        };
        assert_eq!(press.transitions(true).collect::<Vec<_>>(), [true]);

        // Tapped from released: down, then up.
        let both = ButtonEdge {
            pressed: true,
            released: true,
        };
        assert_eq!(both.transitions(false).collect::<Vec<_>>(), [true, false]);

        // Re-pressed while held: up, then down.
        assert_eq!(both.transitions(true).collect::<Vec<_>>(), [false, true]);
    }

    #[test]
    fn clear_keeps_buttons() {
        let mut intent = LocomotionIntent::new();
        intent.set_move(Vec2::Y);
        intent.set_sprint_pressed(true);

        intent.clear();
        assert!(!intent.is_moving());
        assert!(intent.is_sprint_pressed());
    }
}
