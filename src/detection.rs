//! Ground detection rules.
//!
//! Backends gather raw contacts and cast hits; the functions here turn them
//! into a [`GroundInfo`] so that both sensing strategies share one set of
//! rules regardless of the physics engine behind them.

use bevy::prelude::*;

/// A ray or shape cast hit as reported by the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CollisionData {
    /// Distance travelled by the cast before the hit.
    pub distance: f32,
    /// Outward normal of the surface that was hit.
    pub normal: Vec3,
    /// World position of the hit point.
    pub point: Vec3,
    pub entity: Option<Entity>,
}

impl CollisionData {
    pub fn new(distance: f32, normal: Vec3, point: Vec3, entity: Option<Entity>) -> Self {
        Self {
            distance,
            normal,
            point,
            entity,
        }
    }
}

/// Returns the angle in degrees between world-up and a surface normal.
///
/// A zero normal (a cast that reported no usable normal) reads as flat ground.
pub fn slope_angle_degrees(normal: Vec3) -> f32 {
    if normal.length_squared() <= f32::EPSILON {
        return 0.0;
    }
    Vec3::Y.angle_between(normal).to_degrees()
}

/// Whether a contact normal counts as "up" within rounding tolerance.
///
/// The vertical component is rounded to the nearest integer, so any normal
/// with `y >= 0.5` (surfaces up to 60 degrees) qualifies.
#[inline]
pub fn is_upward_contact(normal: Vec3) -> bool {
    normal.y.round() == 1.0
}

/// Ground state for one fixed step.
///
/// Produced by the active ground sensor and handed to
/// [`LocomotionController::observe_ground`](crate::controller::LocomotionController::observe_ground).
#[derive(Component, Reflect, Debug, Clone, Copy, Default, PartialEq)]
#[reflect(Component)]
pub struct GroundInfo {
    /// Whether any ground surface was touched or hit this step.
    pub detected: bool,

    /// Whether the character counts as standing on the ground.
    pub grounded: bool,

    /// Angle between world-up and the ground normal, in degrees.
    /// Only meaningful when `detected` is true.
    pub slope_angle: f32,

    /// Ground surface normal (points away from the surface).
    pub normal: Vec3,

    /// Distance reported by the cast, zero for pure contacts.
    pub distance: f32,

    /// Entity that was hit (ground entity).
    pub ground_entity: Option<Entity>,
}

impl GroundInfo {
    /// No ground in reach.
    pub fn airborne() -> Self {
        Self::default()
    }

    /// Probe-cast strategy: a single downward sphere probe decides both the
    /// grounded flag and the slope.
    pub fn from_probe(hit: Option<CollisionData>) -> Self {
        match hit {
            Some(hit) => Self {
                detected: true,
                grounded: true,
                slope_angle: slope_angle_degrees(hit.normal),
                normal: hit.normal,
                distance: hit.distance,
                ground_entity: hit.entity,
            },
            None => Self::airborne(),
        }
    }

    /// Contact-persistence strategy.
    ///
    /// `contact_normals` are the normals of every current contact with a
    /// ground-layer collider, pointing toward the character. The character is
    /// grounded exactly while one of them is upward; walls and ceilings alone
    /// never ground it. The slope comes from a separate downward ray; a missed
    /// ray reads as flat.
    pub fn from_contacts(contact_normals: &[Vec3], slope_ray: Option<CollisionData>) -> Self {
        if contact_normals.is_empty() {
            return Self::airborne();
        }

        let grounded = contact_normals.iter().copied().any(is_upward_contact);

        let (normal, distance, ground_entity) = slope_ray
            .map(|ray| (ray.normal, ray.distance, ray.entity))
            .unwrap_or((Vec3::ZERO, 0.0, None));

        Self {
            detected: true,
            grounded,
            slope_angle: slope_angle_degrees(normal),
            normal,
            distance,
            ground_entity,
        }
    }
}
