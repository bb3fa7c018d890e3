//! Rapier3D physics backend implementation.
//!
//! This module provides the physics backend for Bevy Rapier3D.
//! Enable with the `rapier3d` feature (on by default).
//!
//! Rapier runs its own step in whichever schedule `RapierPhysicsPlugin` was
//! configured for. Controller forces are written to [`ExternalForce`], which
//! persists between steps, so the two schedules do not need to line up.

use bevy::prelude::*;
use bevy_rapier3d::geometry::Group;
use bevy_rapier3d::prelude::*;

use crate::backend::LocomotionPhysicsBackend;
use crate::config::{GroundSensorConfig, GroundSensorStrategy};
use crate::controller::LocomotionController;
use crate::detection::{CollisionData, GroundInfo};
use crate::LocomotionSet;

/// Rapier3D physics backend for the locomotion controller.
///
/// This backend uses `bevy_rapier3d` for velocity access, impulses and
/// forces. Ground sensing is handled by dedicated Rapier systems that
/// receive `RapierContext` as a system parameter.
pub struct Rapier3dBackend;

impl LocomotionPhysicsBackend for Rapier3dBackend {
    fn plugin() -> impl Plugin {
        Rapier3dBackendPlugin
    }

    fn get_velocity(world: &World, entity: Entity) -> Vec3 {
        world
            .get::<Velocity>(entity)
            .map(|v| v.linvel)
            .unwrap_or(Vec3::ZERO)
    }

    fn set_velocity(world: &mut World, entity: Entity, velocity: Vec3) {
        if let Some(mut vel) = world.get_mut::<Velocity>(entity) {
            vel.linvel = velocity;
        }
    }

    fn apply_impulse(world: &mut World, entity: Entity, impulse: Vec3) {
        if let Some(mut ext_impulse) = world.get_mut::<ExternalImpulse>(entity) {
            ext_impulse.impulse += impulse;
            return;
        }
        // Fallback: apply as velocity change if no ExternalImpulse component
        let mass = Self::get_mass(world, entity);
        if let Some(mut vel) = world.get_mut::<Velocity>(entity) {
            vel.linvel += impulse / mass;
        }
    }

    fn apply_force(world: &mut World, entity: Entity, force: Vec3) {
        // Accumulated on the controller; written to ExternalForce in
        // LocomotionSet::FinalApplication.
        if let Some(mut controller) = world.get_mut::<LocomotionController>(entity) {
            controller.add_force(force);
        }
    }

    fn get_mass(world: &World, entity: Entity) -> f32 {
        // Rapier fills ReadMassProperties after the body's first step.
        world
            .get::<ReadMassProperties>(entity)
            .map(|props| props.get().mass)
            .filter(|mass| *mass > 0.0 && mass.is_finite())
            .unwrap_or(1.0)
    }
}

/// Plugin that sets up Rapier3D-specific systems for the locomotion controller.
pub struct Rapier3dBackendPlugin;

impl Plugin for Rapier3dBackendPlugin {
    fn build(&self, app: &mut App) {
        // Preparation: remove the forces we applied last step
        app.add_systems(
            FixedUpdate,
            clear_controller_forces.in_set(LocomotionSet::Preparation),
        );

        // Sensors: each entity is handled by exactly one strategy
        app.add_systems(
            FixedUpdate,
            (rapier_probe_ground_sensor, rapier_contact_ground_sensor)
                .in_set(LocomotionSet::Sensors),
        );

        // Final Application: apply accumulated forces to physics
        app.add_systems(
            FixedUpdate,
            apply_controller_forces.in_set(LocomotionSet::FinalApplication),
        );
    }
}

/// Query filter excluding the character itself, sensors and (optionally)
/// anything outside the ground layers.
fn ground_filter(entity: Entity, ground_layers: Option<u32>) -> QueryFilter<'static> {
    let filter = QueryFilter::default()
        .exclude_rigid_body(entity)
        .exclude_sensors();

    match ground_layers {
        Some(bits) => filter.groups(CollisionGroups::new(
            Group::ALL,
            Group::from_bits_truncate(bits),
        )),
        None => filter,
    }
}

/// Whether `other` belongs to the ground layers. Colliders without explicit
/// groups are members of every group.
fn is_ground_collider(
    q_groups: &Query<&CollisionGroups>,
    other: Entity,
    ground_layers: Option<u32>,
) -> bool {
    let Some(bits) = ground_layers else {
        return true;
    };
    q_groups
        .get(other)
        .map(|groups| groups.memberships.bits() & bits != 0)
        .unwrap_or(true)
}

/// Downward sphere probe (the `ProbeCast` strategy).
fn rapier_probe_ground_sensor(
    rapier_context: ReadRapierContext,
    mut q_controllers: Query<(
        Entity,
        &GlobalTransform,
        Option<&GroundSensorConfig>,
        &LocomotionController,
        &mut GroundInfo,
    )>,
) {
    let Ok(context) = rapier_context.single() else {
        return;
    };

    for (entity, transform, sensor, controller, mut ground) in &mut q_controllers {
        let sensor = sensor.copied().unwrap_or_default();
        if sensor.strategy != GroundSensorStrategy::ProbeCast {
            continue;
        }

        let origin = transform.translation();
        let distance = sensor.probe_distance_for(controller.state().crouching);
        let probe = Collider::ball(sensor.probe_radius);

        let hit = context
            .cast_shape(
                origin,
                Quat::IDENTITY,
                Vec3::NEG_Y,
                &*probe.raw,
                ShapeCastOptions {
                    max_time_of_impact: distance,
                    stop_at_penetration: false,
                    ..default()
                },
                ground_filter(entity, sensor.ground_layers),
            )
            .map(|(hit_entity, hit)| {
                // normal1 is the outward normal of the collider that was hit
                let normal = hit.details.map(|d| d.normal1).unwrap_or(Vec3::Y);
                let point = origin + Vec3::NEG_Y * hit.time_of_impact;
                CollisionData::new(hit.time_of_impact, normal, point, Some(hit_entity))
            });

        *ground = GroundInfo::from_probe(hit);
    }
}

/// Contact-based ground state plus a slope ray (the `ContactPersistence`
/// strategy).
fn rapier_contact_ground_sensor(
    rapier_context: ReadRapierContext,
    q_groups: Query<&CollisionGroups>,
    mut q_controllers: Query<
        (
            Entity,
            &GlobalTransform,
            Option<&GroundSensorConfig>,
            &mut GroundInfo,
        ),
        With<LocomotionController>,
    >,
) {
    let Ok(context) = rapier_context.single() else {
        return;
    };

    for (entity, transform, sensor, mut ground) in &mut q_controllers {
        let sensor = sensor.copied().unwrap_or_default();
        if sensor.strategy != GroundSensorStrategy::ContactPersistence {
            continue;
        }

        let mut normals = Vec::new();
        for pair in context.contact_pairs_with(entity) {
            if !pair.has_any_active_contact() {
                continue;
            }

            let first: Option<Entity> = pair.collider1().into();
            let second: Option<Entity> = pair.collider2().into();
            // Manifold normals point from collider1 to collider2; flip them
            // when the character is collider1 so they point at the character.
            let (other, sign) = if first == Some(entity) {
                (second, -1.0)
            } else {
                (first, 1.0)
            };
            let Some(other) = other else {
                continue;
            };
            if !is_ground_collider(&q_groups, other, sensor.ground_layers) {
                continue;
            }

            normals.extend(pair.manifolds().map(|manifold| manifold.normal() * sign));
        }

        let origin = transform.translation();
        let slope_ray = context
            .cast_ray_and_get_normal(
                origin,
                Vec3::NEG_Y,
                sensor.slope_raycast_distance,
                true,
                ground_filter(entity, sensor.ground_layers),
            )
            .map(|(hit_entity, hit)| {
                CollisionData::new(hit.time_of_impact, hit.normal, hit.point, Some(hit_entity))
            });

        *ground = GroundInfo::from_contacts(&normals, slope_ray);
    }
}

/// Clear controller forces at the start of each step.
///
/// `ExternalForce` persists between steps, so the force applied last step is
/// subtracted again. Forces written by other code are left untouched.
pub fn clear_controller_forces(
    mut q: Query<(&mut ExternalForce, &mut LocomotionController)>,
) {
    for (mut ext_force, mut controller) in &mut q {
        let force_to_subtract = controller.prepare_new_frame();
        ext_force.force -= force_to_subtract;
    }
}

/// Apply the step's accumulated controller force to `ExternalForce`.
pub fn apply_controller_forces(
    mut q: Query<(&mut ExternalForce, &mut LocomotionController)>,
) {
    for (mut ext_force, mut controller) in &mut q {
        let force_to_apply = controller.finalize_frame();
        ext_force.force += force_to_apply;
    }
}

/// Bundle for creating a first-person character with Rapier3D physics.
///
/// This bundle provides the Rapier components the controller reads and
/// writes: a dynamic body, velocity, external force and impulse, locked
/// rotation and mass properties.
///
/// # Example
///
/// ```ignore
/// use bevy::prelude::*;
/// use bevy_rapier3d::prelude::*;
/// use fps_locomotion::prelude::*;
///
/// fn spawn_player(mut commands: Commands) {
///     let camera = commands.spawn(Camera3d::default()).id();
///     commands.spawn((
///         Transform::from_xyz(0.0, 1.0, 0.0),
///         LocomotionController::new(),
///         LocomotionConfig::arena(),
///         LookController::with_camera(camera),
///         Rapier3dCharacterBundle::new(),
///         Collider::capsule_y(0.5, 0.5),
///     ));
/// }
/// ```
///
/// # Defaults
///
/// - `rigid_body`: [`RigidBody::Dynamic`]
/// - `locked_axes`: [`LockedAxes::ROTATION_LOCKED`], the body never tips over
/// - `damping`: no linear damping (the controller applies its own friction)
/// - `mass_properties`: Default (computed by Rapier from collider)
#[derive(Bundle, Default)]
pub struct Rapier3dCharacterBundle {
    /// The rigid body type. Should be [`RigidBody::Dynamic`] for force-driven movement.
    pub rigid_body: RigidBody,
    /// Current linear and angular velocity. Updated by Rapier each physics step.
    pub velocity: Velocity,
    /// Persistent force. Controller forces are added and removed each step.
    pub external_force: ExternalForce,
    /// Impulses for jumps and slides.
    pub external_impulse: ExternalImpulse,
    /// Which axes are locked.
    pub locked_axes: LockedAxes,
    /// Damping coefficients for velocity reduction.
    pub damping: Damping,
    /// Computed mass properties. Rapier updates this based on the entity's collider.
    pub mass_properties: ReadMassProperties,
}

impl Rapier3dCharacterBundle {
    /// Create a new character bundle with rotation locked.
    pub fn new() -> Self {
        Self {
            rigid_body: RigidBody::Dynamic,
            velocity: Velocity::default(),
            external_force: ExternalForce::default(),
            external_impulse: ExternalImpulse::default(),
            locked_axes: LockedAxes::ROTATION_LOCKED,
            damping: Damping {
                linear_damping: 0.0,
                angular_damping: 1.0,
            },
            // Rapier will update this based on collider after first physics step
            mass_properties: ReadMassProperties::default(),
        }
    }

    /// Set the rigid body type for the character.
    ///
    /// The controller drives movement with forces, so anything other than
    /// [`RigidBody::Dynamic`] only makes sense for scripted sequences.
    pub fn with_body(mut self, body: RigidBody) -> Self {
        self.rigid_body = body;
        self
    }

    /// Set the damping coefficients for velocity reduction.
    ///
    /// Linear damping stacks with the controller's friction and air drag.
    pub fn with_damping(mut self, linear: f32, angular: f32) -> Self {
        self.damping = Damping {
            linear_damping: linear,
            angular_damping: angular,
        };
        self
    }

    /// Set which axes should be locked for the rigid body.
    pub fn with_locked_axes(mut self, axes: LockedAxes) -> Self {
        self.locked_axes = axes;
        self
    }
}

#[cfg(test)]
mod tests {
    use bevy::ecs::system::RunSystemOnce;
    use bevy::time::Virtual;

    use super::*;
    use crate::config::LocomotionConfig;
    use crate::controller::BodySnapshot;
    use crate::LocomotionControllerPlugin;

    fn create_test_app() -> App {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins);
        app.add_plugins(RapierPhysicsPlugin::<NoUserData>::default());
        app.insert_resource(Time::<Fixed>::from_hz(60.0));
        app
    }

    #[test]
    fn rapier_backend_get_position() {
        let mut app = create_test_app();

        let entity = app
            .world_mut()
            .spawn((Transform::from_xyz(10.0, 20.0, -5.0), RigidBody::Dynamic))
            .id();

        app.update();

        let pos = Rapier3dBackend::get_position(app.world(), entity);
        assert!((pos - Vec3::new(10.0, 20.0, -5.0)).length() < 0.01);
    }

    #[test]
    fn rapier_backend_velocity() {
        let mut app = create_test_app();

        let entity = app
            .world_mut()
            .spawn((
                Transform::default(),
                RigidBody::Dynamic,
                Velocity::linear(Vec3::new(5.0, 3.0, -2.0)),
            ))
            .id();

        app.update();

        Rapier3dBackend::set_velocity(app.world_mut(), entity, Vec3::new(10.0, 0.0, 0.0));

        let vel = Rapier3dBackend::get_velocity(app.world(), entity);
        assert!((vel.x - 10.0).abs() < 0.01);
        assert!(vel.y.abs() < 0.01);
        assert!(vel.z.abs() < 0.01);
    }

    #[test]
    fn impulses_accumulate_in_external_impulse() {
        let mut world = World::new();
        let entity = world.spawn(ExternalImpulse::default()).id();

        Rapier3dBackend::apply_impulse(&mut world, entity, Vec3::Y * 7.0);
        Rapier3dBackend::apply_impulse(&mut world, entity, Vec3::NEG_Z * 25.0);

        let impulse = world.get::<ExternalImpulse>(entity).unwrap().impulse;
        assert_eq!(impulse, Vec3::new(0.0, 7.0, -25.0));
    }

    #[test]
    fn mass_falls_back_before_first_step() {
        let mut world = World::new();
        let entity = world.spawn(ReadMassProperties::default()).id();
        assert_eq!(Rapier3dBackend::get_mass(&world, entity), 1.0);
    }

    #[test]
    fn controller_forces_replace_last_step() {
        let mut world = World::new();
        let entity = world
            .spawn((
                ExternalForce {
                    force: Vec3::X,
                    torque: Vec3::ZERO,
                },
                LocomotionController::new(),
            ))
            .id();

        // Step 1: controller adds a force on top of the external one.
        world.run_system_once(clear_controller_forces).unwrap();
        Rapier3dBackend::apply_force(&mut world, entity, Vec3::NEG_Y * 10.0);
        world.run_system_once(apply_controller_forces).unwrap();
        let force = world.get::<ExternalForce>(entity).unwrap().force;
        assert_eq!(force, Vec3::new(1.0, -10.0, 0.0));

        // Step 2: the old controller force is removed, the external one stays.
        world.run_system_once(clear_controller_forces).unwrap();
        Rapier3dBackend::apply_force(&mut world, entity, Vec3::Z * 2.0);
        world.run_system_once(apply_controller_forces).unwrap();
        let force = world.get::<ExternalForce>(entity).unwrap().force;
        assert_eq!(force, Vec3::new(1.0, 0.0, 2.0));
    }

    #[test]
    fn rapier_character_bundle_creates_valid_entity() {
        let mut app = create_test_app();

        let entity = app
            .world_mut()
            .spawn((
                Transform::default(),
                Rapier3dCharacterBundle::new(),
                Collider::capsule_y(0.5, 0.5),
            ))
            .id();

        app.update();

        assert!(app.world().get::<RigidBody>(entity).is_some());
        assert!(app.world().get::<Velocity>(entity).is_some());
        assert!(app.world().get::<ExternalForce>(entity).is_some());
        assert_eq!(
            app.world().get::<LockedAxes>(entity),
            Some(&LockedAxes::ROTATION_LOCKED)
        );
    }

    // ==================== Ground Sensor Tests ====================

    fn create_locomotion_app() -> App {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins);
        app.add_plugins(TransformPlugin);
        app.add_plugins(RapierPhysicsPlugin::<NoUserData>::default());
        app.add_plugins(LocomotionControllerPlugin::<Rapier3dBackend>::default());
        app.insert_resource(Time::<Fixed>::from_hz(60.0));

        app.finish();
        app.cleanup();
        app
    }

    /// Static cuboid whose top face sits at `y = 0.5` before rotation.
    fn spawn_ground(app: &mut App, rotation: Quat) -> Entity {
        let transform = Transform::from_rotation(rotation);
        app.world_mut()
            .spawn((
                transform,
                GlobalTransform::from(transform),
                RigidBody::Fixed,
                Collider::cuboid(50.0, 0.5, 50.0),
            ))
            .id()
    }

    /// Ball-shaped character so the probe geometry is easy to reason about.
    fn spawn_sensing_character(
        app: &mut App,
        position: Vec3,
        sensor: GroundSensorConfig,
        gravity: f32,
    ) -> Entity {
        let transform = Transform::from_translation(position);
        app.world_mut()
            .spawn((
                transform,
                GlobalTransform::from(transform),
                LocomotionController::new(),
                sensor,
                Rapier3dCharacterBundle::new(),
                Collider::ball(0.3),
                GravityScale(gravity),
            ))
            .id()
    }

    fn tick(app: &mut App) {
        let timestep = std::time::Duration::from_secs_f64(1.0 / 60.0);
        app.world_mut()
            .resource_mut::<Time<Virtual>>()
            .advance_by(timestep);
        app.update();
        app.world_mut().run_schedule(FixedUpdate);
        app.update();
    }

    fn ground_info(app: &App, entity: Entity) -> GroundInfo {
        *app.world().get::<GroundInfo>(entity).unwrap()
    }

    #[test]
    fn sphere_cast_grounds_on_flat_floor() {
        let mut app = create_locomotion_app();
        let floor = spawn_ground(&mut app, Quat::IDENTITY);
        // Cast ball bottom starts 0.3 above the floor, within 0.75 reach.
        let character = spawn_sensing_character(
            &mut app,
            Vec3::Y * 1.2,
            GroundSensorConfig::default(),
            0.0,
        );

        tick(&mut app);
        tick(&mut app);

        let ground = ground_info(&app, character);
        assert!(ground.grounded, "{ground:?}");
        assert!(ground.slope_angle < 1.0, "{ground:?}");
        assert!(ground.normal.y > 0.99);
        assert_eq!(ground.ground_entity, Some(floor));
        assert!(
            app.world()
                .get::<LocomotionController>(character)
                .unwrap()
                .state()
                .grounded
        );
    }

    #[test]
    fn sphere_cast_measures_ramp_slope() {
        let mut app = create_locomotion_app();
        spawn_ground(&mut app, Quat::from_rotation_z(30f32.to_radians()));
        // Ramp surface is at y ~= 0.58 under the origin.
        let character = spawn_sensing_character(
            &mut app,
            Vec3::Y * 1.34,
            GroundSensorConfig::default(),
            0.0,
        );

        tick(&mut app);
        tick(&mut app);

        let ground = ground_info(&app, character);
        assert!(ground.grounded, "{ground:?}");
        assert!(
            (ground.slope_angle - 30.0).abs() < 1.0,
            "slope {}",
            ground.slope_angle
        );
    }

    #[test]
    fn sphere_cast_out_of_reach_is_airborne() {
        let mut app = create_locomotion_app();
        spawn_ground(&mut app, Quat::IDENTITY);
        let character = spawn_sensing_character(
            &mut app,
            Vec3::Y * 50.0,
            GroundSensorConfig::default(),
            0.0,
        );

        tick(&mut app);
        tick(&mut app);

        let ground = ground_info(&app, character);
        assert!(!ground.detected);
        assert!(!ground.grounded);
    }

    #[test]
    fn crouched_sphere_cast_uses_shorter_reach() {
        let mut app = create_locomotion_app();
        spawn_ground(&mut app, Quat::IDENTITY);
        // Cast ball bottom 0.5 above the floor: inside 0.75, outside 0.3.
        let character = spawn_sensing_character(
            &mut app,
            Vec3::Y * 1.4,
            GroundSensorConfig::default(),
            0.0,
        );

        tick(&mut app);
        tick(&mut app);
        assert!(ground_info(&app, character).grounded);

        let body = BodySnapshot {
            position: Vec3::Y * 1.4,
            velocity: Vec3::ZERO,
            mass: 1.0,
            scale: Vec3::ONE,
            forward: Vec3::NEG_Z,
        };
        app.world_mut()
            .get_mut::<LocomotionController>(character)
            .unwrap()
            .set_crouch(true, &body, &LocomotionConfig::default());

        tick(&mut app);
        assert!(!ground_info(&app, character).grounded);
    }

    #[test]
    fn sphere_cast_ignores_colliders_outside_ground_layers() {
        let mut app = create_locomotion_app();
        let floor = spawn_ground(&mut app, Quat::IDENTITY);
        app.world_mut()
            .entity_mut(floor)
            .insert(CollisionGroups::new(Group::GROUP_2, Group::ALL));
        let character = spawn_sensing_character(
            &mut app,
            Vec3::Y * 1.2,
            GroundSensorConfig::default().with_ground_layers(Group::GROUP_1.bits()),
            0.0,
        );

        tick(&mut app);
        tick(&mut app);

        assert!(!ground_info(&app, character).grounded);
    }

    #[test]
    fn resting_contact_grounds_character() {
        let mut app = create_locomotion_app();
        spawn_ground(&mut app, Quat::IDENTITY);
        // Drops a few centimetres onto the floor under Rapier gravity.
        let character = spawn_sensing_character(
            &mut app,
            Vec3::Y * 0.85,
            GroundSensorConfig::contacts(),
            1.0,
        );

        for _ in 0..30 {
            tick(&mut app);
        }

        let ground = ground_info(&app, character);
        assert!(ground.detected, "{ground:?}");
        assert!(ground.grounded, "{ground:?}");
        assert!(ground.slope_angle < 1.0);
    }

    #[test]
    fn contact_sensor_airborne_without_contacts() {
        let mut app = create_locomotion_app();
        spawn_ground(&mut app, Quat::IDENTITY);
        let character = spawn_sensing_character(
            &mut app,
            Vec3::Y * 10.0,
            GroundSensorConfig::contacts(),
            0.0,
        );

        tick(&mut app);
        tick(&mut app);

        assert!(!ground_info(&app, character).grounded);
    }
}
