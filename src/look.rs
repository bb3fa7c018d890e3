//! Mouse look.
//!
//! Pitch and yaw are accumulated in degrees. Positive pitch looks down and
//! positive yaw turns right (clockwise seen from above). The camera receives
//! both angles; the body only receives yaw, which is the frame movement
//! input is expressed in.

use bevy::prelude::*;

use crate::config::LookConfig;
use crate::intent::LocomotionIntent;

/// Yaw-only facing frame used to turn move axes into a world direction.
#[derive(Component, Reflect, Debug, Clone, Copy, Default, PartialEq)]
#[reflect(Component)]
pub struct BodyOrientation {
    /// Heading in degrees. Zero faces -Z.
    pub yaw: f32,
}

impl BodyOrientation {
    /// Create an orientation from a heading in degrees.
    pub fn from_yaw(yaw: f32) -> Self {
        Self { yaw }
    }

    /// Rotation of the frame.
    #[inline]
    pub fn rotation(&self) -> Quat {
        Quat::from_rotation_y(-self.yaw.to_radians())
    }

    /// Horizontal forward direction.
    #[inline]
    pub fn forward(&self) -> Vec3 {
        self.rotation() * Vec3::NEG_Z
    }

    /// Horizontal right direction.
    #[inline]
    pub fn right(&self) -> Vec3 {
        self.rotation() * Vec3::X
    }

    /// World-space movement direction for `x` (strafe) and `y` (forward)
    /// axes. Not normalized.
    pub fn direction(&self, axes: Vec2) -> Vec3 {
        self.right() * axes.x + self.forward() * axes.y
    }
}

/// Camera and body poses produced by one look update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LookPose {
    /// Pitch and yaw rotation for the camera.
    pub camera: Quat,
    /// Yaw-only frame for the body.
    pub body: BodyOrientation,
}

/// Accumulated look angles.
///
/// `camera` names the entity whose rotation follows pitch and yaw. It is not
/// expected to be a child of the body.
#[derive(Component, Reflect, Debug, Clone, Copy, Default, PartialEq)]
#[reflect(Component)]
#[require(LookConfig, BodyOrientation, LocomotionIntent)]
pub struct LookController {
    /// Pitch in degrees, clamped to the configured limit.
    pub x_rotation: f32,
    /// Yaw in degrees.
    pub yaw: f32,
    /// Camera entity to rotate.
    pub camera: Option<Entity>,
}

impl LookController {
    /// Look controller driving the given camera entity.
    pub fn with_camera(camera: Entity) -> Self {
        Self {
            camera: Some(camera),
            ..default()
        }
    }

    /// Apply an already scaled look delta (degrees).
    pub fn apply(&mut self, delta: Vec2, config: &LookConfig) -> LookPose {
        self.yaw = (self.yaw + delta.x).rem_euclid(360.0);
        self.x_rotation = (self.x_rotation - delta.y).clamp(-config.max_angle, config.max_angle);
        self.pose()
    }

    /// Pose for the current angles.
    pub fn pose(&self) -> LookPose {
        let camera = Quat::from_euler(
            EulerRot::YXZ,
            -self.yaw.to_radians(),
            -self.x_rotation.to_radians(),
            0.0,
        );
        LookPose {
            camera,
            body: BodyOrientation::from_yaw(self.yaw),
        }
    }
}
