//! Projected slide termination.
//!
//! A [`SlideTimer`] is created when a slide starts. It projects, once, where
//! the slide's initial momentum would carry the body and is then polled once
//! per rendered frame until the body gets close to that point, leaves the
//! crouch, or reaches a slope that is too steep. It is a plain state machine
//! owned by the controller: nothing is scheduled behind its back, and a
//! timer that has finished stays finished.

use bevy::prelude::*;

/// Progress of a slide timer.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlideTimerState {
    /// Keep polling on the next frame.
    #[default]
    Running,
    /// The slide is over. Terminal.
    Finished,
}

/// Live values sampled each frame for [`SlideTimer::poll`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlideProbe {
    /// Current world position of the body.
    pub position: Vec3,
    /// Whether crouch is still held.
    pub crouching: bool,
    /// Current slope in degrees.
    pub slope: f32,
    /// Walkable maximum slope in degrees.
    pub max_slope: f32,
    /// Distance to the projected end point at which the slide stops.
    pub stop_threshold: f32,
}

/// One slide's stop condition.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct SlideTimer {
    generation: u64,
    predicted_velocity: Vec3,
    final_position: Vec3,
    distance_to_target: f32,
    state: SlideTimerState,
}

impl SlideTimer {
    /// Project the slide from its starting momentum.
    ///
    /// `mass` must be positive; a non-positive mass projects no travel at all,
    /// so the timer finishes on its first poll instead of producing NaN.
    pub fn new(generation: u64, momentum: Vec3, mass: f32, position: Vec3) -> Self {
        debug_assert!(mass > 0.0, "slide projection needs a positive mass, got {mass}");

        let predicted_velocity = if mass > 0.0 {
            momentum / mass
        } else {
            Vec3::ZERO
        };
        let final_position = position + predicted_velocity;

        Self {
            generation,
            predicted_velocity,
            final_position,
            distance_to_target: position.distance(final_position),
            state: SlideTimerState::Running,
        }
    }

    /// Slide generation this timer belongs to.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Velocity implied by the starting momentum.
    #[inline]
    pub fn predicted_velocity(&self) -> Vec3 {
        self.predicted_velocity
    }

    /// Projected end point of the slide.
    #[inline]
    pub fn final_position(&self) -> Vec3 {
        self.final_position
    }

    /// Distance to the end point as of the last poll.
    #[inline]
    pub fn distance_to_target(&self) -> f32 {
        self.distance_to_target
    }

    /// Current state.
    #[inline]
    pub fn state(&self) -> SlideTimerState {
        self.state
    }

    /// Whether the timer has finished.
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.state == SlideTimerState::Finished
    }

    /// Evaluate the stop conditions against this frame's values.
    pub fn poll(&mut self, probe: &SlideProbe) -> SlideTimerState {
        if self.is_finished() {
            return SlideTimerState::Finished;
        }

        self.distance_to_target = probe.position.distance(self.final_position);

        let keep_sliding = probe.crouching
            && self.distance_to_target > probe.stop_threshold
            && probe.slope < probe.max_slope;

        if !keep_sliding {
            self.state = SlideTimerState::Finished;
        }
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe_at(position: Vec3) -> SlideProbe {
        SlideProbe {
            position,
            crouching: true,
            slope: 0.0,
            max_slope: 15.0,
            stop_threshold: 2.4,
        }
    }

    #[test]
    fn projection_from_momentum() {
        let timer = SlideTimer::new(1, Vec3::new(0.0, 0.0, 600.0), 1.0, Vec3::ZERO);

        assert_eq!(timer.predicted_velocity(), Vec3::new(0.0, 0.0, 600.0));
        assert_eq!(timer.final_position(), Vec3::new(0.0, 0.0, 600.0));
        assert_eq!(timer.distance_to_target(), 600.0);
    }

    #[test]
    fn projection_divides_by_mass() {
        let timer = SlideTimer::new(1, Vec3::new(40.0, 0.0, 0.0), 4.0, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(timer.final_position(), Vec3::new(11.0, 0.0, 0.0));
    }

    #[test]
    fn keeps_running_while_far_from_target() {
        let mut timer = SlideTimer::new(1, Vec3::new(0.0, 0.0, 600.0), 1.0, Vec3::ZERO);

        assert_eq!(timer.poll(&probe_at(Vec3::new(0.0, 0.0, 10.0))), SlideTimerState::Running);
        assert_eq!(timer.poll(&probe_at(Vec3::new(0.0, 0.0, 500.0))), SlideTimerState::Running);
        assert!((timer.distance_to_target() - 100.0).abs() < 1e-3);
    }

    #[test]
    fn finishes_within_stop_threshold() {
        let mut timer = SlideTimer::new(1, Vec3::new(0.0, 0.0, 600.0), 1.0, Vec3::ZERO);

        assert_eq!(timer.poll(&probe_at(Vec3::new(0.0, 0.0, 597.0))), SlideTimerState::Running);
        assert_eq!(timer.poll(&probe_at(Vec3::new(0.0, 0.0, 598.0))), SlideTimerState::Finished);
    }

    #[test]
    fn finishes_when_crouch_released() {
        let mut timer = SlideTimer::new(1, Vec3::new(0.0, 0.0, 600.0), 1.0, Vec3::ZERO);
        let probe = SlideProbe {
            crouching: false,
            ..probe_at(Vec3::ZERO)
        };
        assert_eq!(timer.poll(&probe), SlideTimerState::Finished);
    }

    #[test]
    fn finishes_on_steep_slope() {
        let mut timer = SlideTimer::new(1, Vec3::new(0.0, 0.0, 600.0), 1.0, Vec3::ZERO);
        let probe = SlideProbe {
            slope: 15.0,
            ..probe_at(Vec3::ZERO)
        };
        assert_eq!(timer.poll(&probe), SlideTimerState::Finished);
    }

    #[test]
    fn finished_is_terminal() {
        let mut timer = SlideTimer::new(1, Vec3::new(0.0, 0.0, 600.0), 1.0, Vec3::ZERO);
        let released = SlideProbe {
            crouching: false,
            ..probe_at(Vec3::ZERO)
        };
        timer.poll(&released);

        // Conditions recover, but the timer never restarts.
        assert_eq!(timer.poll(&probe_at(Vec3::ZERO)), SlideTimerState::Finished);
        assert!(timer.is_finished());
    }

    #[test]
    fn zero_momentum_finishes_immediately() {
        let mut timer = SlideTimer::new(1, Vec3::ZERO, 1.0, Vec3::new(3.0, 0.0, 3.0));
        assert_eq!(timer.poll(&probe_at(Vec3::new(3.0, 0.0, 3.0))), SlideTimerState::Finished);
    }
}
