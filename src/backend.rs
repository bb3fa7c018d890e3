//! Physics backend abstraction.
//!
//! This module defines the trait that physics backends must implement to
//! work with the locomotion controller. The controller never talks to a
//! physics engine directly; every velocity read, force and pose change goes
//! through a [`LocomotionPhysicsBackend`].
//!
//! Ground queries are not part of the trait. They need engine-specific
//! system parameters, so each backend provides its own sensor systems that
//! write [`GroundInfo`](crate::detection::GroundInfo) in
//! [`LocomotionSet::Sensors`](crate::LocomotionSet::Sensors).

use bevy::prelude::*;

/// Trait for physics backend implementations.
///
/// Implement this trait to integrate a physics engine with the locomotion
/// controller. Methods are static and take the [`World`] so they can be
/// called from exclusive systems.
///
/// Transform based defaults are provided for pose access, which is what
/// most engines expect: they read the entity's `Transform` and sync it to
/// the simulated body.
///
/// For an example implementation, see the `rapier` module's
/// `Rapier3dBackend`.
pub trait LocomotionPhysicsBackend: 'static + Send + Sync {
    /// Returns the plugin that sets up this backend.
    fn plugin() -> impl Plugin;

    /// Get the current linear velocity of an entity.
    fn get_velocity(world: &World, entity: Entity) -> Vec3;

    /// Set the linear velocity of an entity.
    fn set_velocity(world: &mut World, entity: Entity, velocity: Vec3);

    /// Apply an impulse to an entity.
    ///
    /// Impulse is an instantaneous change in momentum.
    fn apply_impulse(world: &mut World, entity: Entity, impulse: Vec3);

    /// Apply a force to an entity.
    ///
    /// Force is applied over the physics timestep.
    fn apply_force(world: &mut World, entity: Entity, force: Vec3);

    /// Get the mass of an entity.
    ///
    /// Must return a positive value. Backends fall back to 1.0 while the
    /// engine has not computed mass properties yet.
    fn get_mass(_world: &World, _entity: Entity) -> f32 {
        1.0
    }

    /// Get the current world position of an entity.
    fn get_position(world: &World, entity: Entity) -> Vec3 {
        world
            .get::<Transform>(entity)
            .map(|t| t.translation)
            .or_else(|| world.get::<GlobalTransform>(entity).map(|t| t.translation()))
            .unwrap_or(Vec3::ZERO)
    }

    /// Move an entity by `offset` without going through the solver.
    fn translate(world: &mut World, entity: Entity, offset: Vec3) {
        if let Some(mut transform) = world.get_mut::<Transform>(entity) {
            transform.translation += offset;
        }
    }

    /// Get the local scale of an entity.
    fn get_scale(world: &World, entity: Entity) -> Vec3 {
        world
            .get::<Transform>(entity)
            .map(|t| t.scale)
            .unwrap_or(Vec3::ONE)
    }

    /// Set the local scale of an entity.
    fn set_scale(world: &mut World, entity: Entity, scale: Vec3) {
        if let Some(mut transform) = world.get_mut::<Transform>(entity) {
            transform.scale = scale;
        }
    }

    /// Get the fixed timestep delta time.
    fn get_fixed_timestep(world: &World) -> f32 {
        fixed_timestep(world)
    }
}

/// Fixed timestep delta, with a 60 Hz fallback for apps that have not
/// advanced `Time<Fixed>` yet.
pub fn fixed_timestep(world: &World) -> f32 {
    world
        .get_resource::<Time<Fixed>>()
        .map(|t| t.delta_secs())
        .filter(|&d| d > 0.0)
        .unwrap_or(1.0 / 60.0)
}

/// Empty plugin for backends that don't need additional setup.
pub struct NoOpBackendPlugin;

impl Plugin for NoOpBackendPlugin {
    fn build(&self, _app: &mut App) {}
}
