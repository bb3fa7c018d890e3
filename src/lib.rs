//! # `fps_locomotion`
//!
//! A first-person rigidbody locomotion controller with physics backend
//! abstraction.
//!
//! This crate turns player input into forces on a dynamic rigid body:
//! - Ground movement with frame-rate independent friction
//! - Air control with optional drag
//! - Sprinting, crouching and jumping with state dependent multipliers
//! - A momentum preserving slide that ends at its projected stopping point
//! - Slope awareness: steep slopes block crouched movement and end slides
//! - Mouse look with clamped pitch and a yaw-only movement frame
//!
//! ## Architecture
//!
//! Each fixed step runs the [`LocomotionSet`]s in order:
//! 1. `Preparation`: the backend clears last step's forces
//! 2. `Sensors`: the backend's ground sensor writes [`GroundInfo`](detection::GroundInfo)
//! 3. `Intent`: ground state is handed to the controller, then jump, crouch
//!    and sprint input is consumed
//! 4. `Movement`: the controller computes the step's force
//! 5. `FinalApplication`: the backend pushes the force into the engine
//!
//! Look, the slide cooldown and slide timers run once per rendered frame
//! in `Update`.
//!
//! ## Usage
//!
//! ```rust
//! use bevy::prelude::*;
//! use fps_locomotion::prelude::*;
//!
//! // Controller components for a player; intent, orientation and ground
//! // info are added automatically when the controller is spawned.
//! let controller = LocomotionController::new();
//! let config = LocomotionConfig::arena();
//! let look = LookController::default();
//!
//! assert!(config.validate().is_ok());
//! ```

use bevy::prelude::*;

pub mod backend;
pub mod config;
pub mod controller;
pub mod detection;
pub mod intent;
pub mod look;
pub mod slide;
pub mod state;
pub mod systems;

#[cfg(feature = "rapier3d")]
pub mod rapier;

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::backend::LocomotionPhysicsBackend;
    pub use crate::config::{
        ConfigError, GroundSensorConfig, GroundSensorStrategy, LocomotionConfig, LookConfig,
    };
    pub use crate::controller::{
        BodySnapshot, CrouchOutcome, LocomotionController, Regime, StepInput,
    };
    pub use crate::detection::{CollisionData, GroundInfo};
    pub use crate::intent::LocomotionIntent;
    pub use crate::look::{BodyOrientation, LookController, LookPose};
    pub use crate::slide::{SlideTimer, SlideTimerState};
    pub use crate::state::{Airborne, Crouching, Grounded, MovementState, Sliding};
    pub use crate::{LocomotionControllerPlugin, LocomotionSet};

    #[cfg(feature = "rapier3d")]
    pub use crate::rapier::{Rapier3dBackend, Rapier3dCharacterBundle};
}

/// System sets for the fixed-step locomotion pipeline, chained in
/// declaration order.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocomotionSet {
    /// Reset per-step accumulators.
    Preparation,
    /// Backend ground sensing.
    Sensors,
    /// Ground state handoff and input consumption.
    Intent,
    /// Force computation.
    Movement,
    /// Push accumulated forces into the physics engine.
    FinalApplication,
}

/// Main plugin for the locomotion controller.
///
/// This plugin is generic over a physics backend `B` which provides the
/// actual physics operations (force application, velocity access, ground
/// sensing).
///
/// # Type Parameters
/// - `B`: The physics backend implementation (e.g., `Rapier3dBackend`)
///
/// # Examples
///
/// With Rapier3D backend:
/// ```rust,no_run
/// use bevy::prelude::*;
/// use bevy_rapier3d::prelude::*;
/// use fps_locomotion::prelude::*;
///
/// App::new()
///     .add_plugins(DefaultPlugins)
///     .add_plugins(RapierPhysicsPlugin::<NoUserData>::default())
///     .add_plugins(LocomotionControllerPlugin::<Rapier3dBackend>::default())
///     .run();
/// ```
pub struct LocomotionControllerPlugin<B: backend::LocomotionPhysicsBackend> {
    _marker: std::marker::PhantomData<B>,
}

impl<B: backend::LocomotionPhysicsBackend> Default for LocomotionControllerPlugin<B> {
    fn default() -> Self {
        Self {
            _marker: std::marker::PhantomData,
        }
    }
}

impl<B: backend::LocomotionPhysicsBackend> Plugin for LocomotionControllerPlugin<B> {
    fn build(&self, app: &mut App) {
        // Register core types
        app.register_type::<controller::LocomotionController>();
        app.register_type::<config::LocomotionConfig>();
        app.register_type::<config::LookConfig>();
        app.register_type::<config::GroundSensorConfig>();
        app.register_type::<intent::LocomotionIntent>();
        app.register_type::<look::LookController>();
        app.register_type::<look::BodyOrientation>();
        app.register_type::<detection::GroundInfo>();
        app.register_type::<state::Grounded>();
        app.register_type::<state::Airborne>();
        app.register_type::<state::Crouching>();
        app.register_type::<state::Sliding>();

        app.configure_sets(
            FixedUpdate,
            (
                LocomotionSet::Preparation,
                LocomotionSet::Sensors,
                LocomotionSet::Intent,
                LocomotionSet::Movement,
                LocomotionSet::FinalApplication,
            )
                .chain(),
        );

        // Add the physics backend plugin
        app.add_plugins(B::plugin());

        app.add_systems(
            FixedUpdate,
            (systems::apply_ground_info, systems::consume_intents::<B>)
                .chain()
                .in_set(LocomotionSet::Intent),
        );
        app.add_systems(
            FixedUpdate,
            systems::apply_locomotion::<B>.in_set(LocomotionSet::Movement),
        );

        // Per-frame work: look, cooldown, slide timers, then markers
        app.add_systems(
            Update,
            (
                systems::report_invalid_configs,
                systems::update_look,
                systems::tick_slide_cooldowns,
                systems::poll_slide_timers::<B>,
                systems::sync_state_markers,
            )
                .chain(),
        );
    }
}
