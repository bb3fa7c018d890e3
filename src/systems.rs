//! Core controller systems.
//!
//! Fixed-step systems read input and ground state, run the
//! [`LocomotionController`] state machine and hand the resulting forces and
//! pose changes to the physics backend. Frame systems handle look, the slide
//! cooldown and slide timers. Systems that touch the physics engine are
//! generic over the backend and run exclusively, collecting entities first
//! and then calling into the backend one entity at a time.

use bevy::prelude::*;

use crate::backend::LocomotionPhysicsBackend;
use crate::config::{GroundSensorConfig, LocomotionConfig, LookConfig};
use crate::controller::{BodySnapshot, CrouchOutcome, LocomotionController, StepInput};
use crate::detection::GroundInfo;
use crate::intent::{IntentEdges, LocomotionIntent};
use crate::look::{BodyOrientation, LookController};
use crate::state::{Airborne, Crouching, Grounded, Sliding};

/// Log configs that fail validation when they are added.
///
/// The entity keeps simulating with the given values.
pub fn report_invalid_configs(
    q_locomotion: Query<(Entity, &LocomotionConfig), Added<LocomotionConfig>>,
    q_look: Query<(Entity, &LookConfig), Added<LookConfig>>,
    q_sensor: Query<(Entity, &GroundSensorConfig), Added<GroundSensorConfig>>,
) {
    for (entity, config) in &q_locomotion {
        if let Err(err) = config.validate() {
            error!("invalid LocomotionConfig on {entity}: {err}");
        }
    }
    for (entity, config) in &q_look {
        if let Err(err) = config.validate() {
            error!("invalid LookConfig on {entity}: {err}");
        }
    }
    for (entity, config) in &q_sensor {
        if let Err(err) = config.validate() {
            error!("invalid GroundSensorConfig on {entity}: {err}");
        }
    }
}

/// Feed this step's [`GroundInfo`] into each controller.
///
/// Runs after the backend sensors and before intents are consumed, so a jump
/// later in the step is the last word on `grounded`.
pub fn apply_ground_info(mut q_controllers: Query<(&GroundInfo, &mut LocomotionController)>) {
    for (ground, mut controller) in &mut q_controllers {
        controller.observe_ground(ground);
    }
}

fn body_snapshot<B: LocomotionPhysicsBackend>(
    world: &World,
    entity: Entity,
    orientation: &BodyOrientation,
) -> BodySnapshot {
    BodySnapshot {
        position: B::get_position(world, entity),
        velocity: B::get_velocity(world, entity),
        mass: B::get_mass(world, entity),
        scale: B::get_scale(world, entity),
        forward: orientation.forward(),
    }
}

/// Held buttons sampled alongside the edges.
#[derive(Clone, Copy)]
struct HeldButtons {
    jump: bool,
    crouch: bool,
    sprint: bool,
}

/// Consume button edges and held states from [`LocomotionIntent`].
///
/// Order within a step: held flags, landing slide, crouch transitions, jump.
/// A crouch tap between two steps crouches and stands again in the same
/// step. Jump fires on the press edge, or on every grounded step while held
/// when `auto_jump` is enabled.
pub fn consume_intents<B: LocomotionPhysicsBackend>(world: &mut World) {
    let entities: Vec<(Entity, LocomotionConfig, BodyOrientation, IntentEdges, HeldButtons)> =
        world
            .query_filtered::<(
                Entity,
                &LocomotionConfig,
                Option<&BodyOrientation>,
                &mut LocomotionIntent,
            ), With<LocomotionController>>()
            .iter_mut(world)
            .map(|(e, config, orientation, mut intent)| {
                let edges = intent.take_edges();
                let held = HeldButtons {
                    jump: intent.is_jump_pressed(),
                    crouch: intent.is_crouch_pressed(),
                    sprint: intent.is_sprint_pressed(),
                };
                (
                    e,
                    *config,
                    orientation.copied().unwrap_or_default(),
                    edges,
                    held,
                )
            })
            .collect();

    for (entity, config, orientation, edges, held) in entities {
        let mut body = body_snapshot::<B>(world, entity, &orientation);

        let (landing_slide, crouches, jump) = {
            let Some(mut controller) = world.get_mut::<LocomotionController>(entity) else {
                continue;
            };
            controller.set_sprinting(held.sprint);
            controller.set_jumping(held.jump);

            let landing_slide = controller.try_landing_slide(&body, &config);

            let mut crouches: Vec<CrouchOutcome> = Vec::new();
            for active in edges.crouch.transitions(held.crouch) {
                if let Some(outcome) = controller.set_crouch(active, &body, &config) {
                    body.scale = outcome.scale;
                    body.position += outcome.offset;
                    crouches.push(outcome);
                }
            }

            let wants_jump = edges.jump.pressed || (config.auto_jump && held.jump);
            let jump = if wants_jump {
                controller.try_jump(body.velocity, &config)
            } else {
                None
            };

            (landing_slide, crouches, jump)
        };

        if let Some(impulse) = landing_slide {
            B::apply_impulse(world, entity, impulse);
        }

        for outcome in crouches {
            B::set_scale(world, entity, outcome.scale);
            if outcome.offset != Vec3::ZERO {
                B::translate(world, entity, outcome.offset);
            }
            if let Some(impulse) = outcome.slide_impulse {
                B::apply_impulse(world, entity, impulse);
            }
        }

        if let Some(impulse) = jump {
            B::apply_impulse(world, entity, impulse);
        }
    }
}

/// Run one movement step for every controller and apply the force.
pub fn apply_locomotion<B: LocomotionPhysicsBackend>(world: &mut World) {
    let dt = B::get_fixed_timestep(world);

    let entities: Vec<(Entity, LocomotionConfig, BodyOrientation, Vec2)> = world
        .query_filtered::<(
            Entity,
            &LocomotionConfig,
            Option<&BodyOrientation>,
            Option<&LocomotionIntent>,
        ), With<LocomotionController>>()
        .iter(world)
        .map(|(e, config, orientation, intent)| {
            (
                e,
                *config,
                orientation.copied().unwrap_or_default(),
                intent.map(|i| i.move_axes).unwrap_or(Vec2::ZERO),
            )
        })
        .collect();

    for (entity, config, orientation, move_axes) in entities {
        let input = StepInput {
            move_axes,
            orientation,
            velocity: B::get_velocity(world, entity),
            mass: B::get_mass(world, entity),
        };

        let force = {
            let Some(mut controller) = world.get_mut::<LocomotionController>(entity) else {
                continue;
            };
            controller.advance(dt, &input, &config)
        };

        if force != Vec3::ZERO {
            B::apply_force(world, entity, force);
        }
    }
}

/// Apply accumulated look input to the look angles, body frame and camera.
pub fn update_look(
    time: Res<Time>,
    mut q_look: Query<(
        &mut LookController,
        &LookConfig,
        &mut LocomotionIntent,
        &mut BodyOrientation,
    )>,
    mut q_cameras: Query<&mut Transform, Without<LookController>>,
) {
    for (mut look, config, mut intent, mut body) in &mut q_look {
        let raw = intent.take_look();
        if !config.enable_mouse_look {
            continue;
        }

        let pose = look.apply(config.scale_delta(raw, time.delta_secs()), config);
        if *body != pose.body {
            *body = pose.body;
        }

        if let Some(camera) = look.camera {
            if let Ok(mut transform) = q_cameras.get_mut(camera) {
                transform.rotation = pose.camera;
            }
        }
    }
}

/// Advance the slide cooldown by the frame delta.
pub fn tick_slide_cooldowns(
    time: Res<Time>,
    mut q_controllers: Query<(&mut LocomotionController, &LocomotionConfig)>,
) {
    let dt = time.delta_secs();
    for (mut controller, config) in &mut q_controllers {
        controller.tick_cooldown(dt, config);
    }
}

/// Poll every active slide timer against the body's current position.
pub fn poll_slide_timers<B: LocomotionPhysicsBackend>(world: &mut World) {
    let entities: Vec<(Entity, LocomotionConfig)> = world
        .query::<(Entity, &LocomotionController, &LocomotionConfig)>()
        .iter(world)
        .filter(|(_, controller, _)| controller.slide_timer().is_some())
        .map(|(e, _, config)| (e, *config))
        .collect();

    for (entity, config) in entities {
        let position = B::get_position(world, entity);
        if let Some(mut controller) = world.get_mut::<LocomotionController>(entity) {
            controller.poll_slide_timer(position, &config);
        }
    }
}

/// Sync state marker components with the controller state.
pub fn sync_state_markers(
    mut commands: Commands,
    q_controllers: Query<(
        Entity,
        &LocomotionController,
        Has<Grounded>,
        Has<Airborne>,
        Has<Crouching>,
        Has<Sliding>,
    )>,
) {
    for (entity, controller, has_grounded, has_airborne, has_crouching, has_sliding) in
        &q_controllers
    {
        let state = controller.state();

        // Grounded/Airborne
        if state.grounded && !has_grounded {
            commands.entity(entity).insert(Grounded).remove::<Airborne>();
        } else if !state.grounded && !has_airborne {
            commands.entity(entity).insert(Airborne).remove::<Grounded>();
        }

        if state.crouching && !has_crouching {
            commands.entity(entity).insert(Crouching);
        } else if !state.crouching && has_crouching {
            commands.entity(entity).remove::<Crouching>();
        }

        if state.sliding && !has_sliding {
            commands.entity(entity).insert(Sliding);
        } else if !state.sliding && has_sliding {
            commands.entity(entity).remove::<Sliding>();
        }
    }
}

#[cfg(test)]
mod tests {
    use bevy::ecs::system::RunSystemOnce;

    use super::*;

    fn grounded() -> GroundInfo {
        GroundInfo {
            detected: true,
            grounded: true,
            normal: Vec3::Y,
            ..default()
        }
    }

    #[test]
    fn markers_follow_ground_state() {
        let mut world = World::new();
        let entity = world.spawn((LocomotionController::new(), grounded())).id();

        world.run_system_once(apply_ground_info).unwrap();
        world.run_system_once(sync_state_markers).unwrap();
        assert!(world.get::<Grounded>(entity).is_some());
        assert!(world.get::<Airborne>(entity).is_none());

        world.entity_mut(entity).insert(GroundInfo::airborne());
        world.run_system_once(apply_ground_info).unwrap();
        world.run_system_once(sync_state_markers).unwrap();
        assert!(world.get::<Grounded>(entity).is_none());
        assert!(world.get::<Airborne>(entity).is_some());
    }

    #[test]
    fn new_controller_is_marked_airborne() {
        let mut world = World::new();
        let entity = world.spawn(LocomotionController::new()).id();

        world.run_system_once(sync_state_markers).unwrap();
        assert!(world.get::<Airborne>(entity).is_some());
        assert!(world.get::<Crouching>(entity).is_none());
        assert!(world.get::<Sliding>(entity).is_none());
    }

    #[test]
    fn cooldown_ticks_with_frame_time() {
        let mut world = World::new();
        let mut time = Time::<()>::default();
        time.advance_by(std::time::Duration::from_millis(250));
        world.insert_resource(time);

        let entity = world.spawn(LocomotionController::new()).id();
        world.run_system_once(tick_slide_cooldowns).unwrap();

        // Before the first slide the cooldown is already infinite.
        let controller = world.get::<LocomotionController>(entity).unwrap();
        assert!(controller.state().time_since_last_slide.is_infinite());
    }

    #[test]
    fn invalid_config_does_not_stop_the_app() {
        let mut world = World::new();
        world.spawn(LocomotionConfig::default().with_max_slope(120.0));
        world.spawn(LookConfig::default().with_max_angle(-5.0));

        assert!(world.run_system_once(report_invalid_configs).is_ok());
    }
}
