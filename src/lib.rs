//! # Bevy Ballistics Core
//!
//! Data-lifecycle and numerical-solver layer for projectile ballistics in Bevy 0.18.
//!
//! ## Features
//! - Fixed-capacity projectile slots split into logic and compute records
//! - Cyclic object pool with O(1) acquire/release and oldest-first recycling
//! - Exit-point search for rays passing through convex or concave colliders
//! - Closed-form and drag-aware zeroing, solved off-thread in batches
//!
//! ## Quick Start
//! ```rust,no_run
//! use bevy::prelude::*;
//! use bevy_ballistics_core::prelude::*;
//!
//! fn main() {
//!     App::new()
//!         .add_plugins(MinimalPlugins)
//!         .add_plugins(BallisticsPluginGroup)
//!         .run();
//! }
//! ```

pub mod components;
pub mod events;
pub mod pool;
pub mod resources;
pub mod slots;
pub mod systems;
pub mod types;


pub mod prelude {
    pub use crate::components::*;
    pub use crate::events::*;
    pub use crate::pool::{CyclicPool, PoolError, PoolHandle};
    pub use crate::resources::*;
    pub use crate::slots::{DualRecord, SlotError, SlotStore};
    pub use crate::systems::exit_ray::{find_exit, ray_aabb_far, ExitRaySettings};
    pub use crate::systems::zeroing::{
        range_no_drag, solve_zeroing_batch, zeroing_angle_no_drag, zeroing_angles_with_drag,
        ZeroingJob, ZeroingParams, ZeroingSettings, ZeroingTable,
    };
    pub use crate::types::*;
    pub use crate::BallisticsPluginGroup;
    pub use crate::{BallisticsCorePlugin, BallisticsZeroingPlugin};
}

use bevy::prelude::*;

use components::ProjectileSlots;

/// Main plugin group that includes all ballistics subsystems.
///
/// # Example
/// ```
/// use bevy::prelude::*;
/// use bevy_ballistics_core::prelude::*;
///
/// let mut app = App::new();
/// app.add_plugins(MinimalPlugins).add_plugins(BallisticsPluginGroup);
/// ```
#[derive(Default)]
pub struct BallisticsPluginGroup;

impl PluginGroup for BallisticsPluginGroup {
    fn build(self) -> bevy::app::PluginGroupBuilder {
        bevy::app::PluginGroupBuilder::start::<Self>()
            .add(BallisticsCorePlugin)
            .add(BallisticsZeroingPlugin)
    }
}

/// Projectile slot lifecycle plugin.
///
/// Allocates the [`ProjectileSlots`] store once, sized by
/// [`resources::BallisticsConfig::slot_capacity`] (insert the config before
/// adding the plugin to change it).
///
/// # Systems
/// - `drain_spawn_queue` - Streams queued spawns into free slots
/// - `update_slot_kinematics` - Integrates every active compute record
/// - `retire_projectiles` - Frees expired and out-of-range slots
pub struct BallisticsCorePlugin;

impl Plugin for BallisticsCorePlugin {
    fn build(&self, app: &mut App) {
        let capacity = app
            .world()
            .get_resource::<resources::BallisticsConfig>()
            .map_or(resources::BallisticsConfig::default().slot_capacity, |config| {
                config.slot_capacity
            });

        app.register_type::<resources::BallisticsEnvironment>()
            .register_type::<resources::BallisticsConfig>()
            .init_resource::<resources::BallisticsEnvironment>()
            .init_resource::<resources::BallisticsConfig>()
            .init_resource::<resources::ProjectileSpawnQueue>()
            .insert_resource(ProjectileSlots::new(capacity))
            .add_message::<events::ProjectileRetired>()
            .add_systems(
                FixedUpdate,
                (
                    systems::logic::drain_spawn_queue,
                    systems::kinematics::update_slot_kinematics,
                    systems::logic::retire_projectiles,
                )
                    .chain(),
            );
    }
}

/// Weapon zeroing plugin.
///
/// # Systems
/// - `start_zeroing_requests` - Dispatches solver jobs for new `ZeroingRequest`s
/// - `poll_zeroing_jobs` - Writes finished jobs into `WeaponZeroing`
pub struct BallisticsZeroingPlugin;

impl Plugin for BallisticsZeroingPlugin {
    fn build(&self, app: &mut App) {
        app.register_type::<components::WeaponZeroing>()
            .init_resource::<resources::BallisticsConfig>()
            .add_message::<events::ZeroingResolved>()
            .add_systems(
                Update,
                (
                    systems::logic::start_zeroing_requests,
                    systems::logic::poll_zeroing_jobs,
                )
                    .chain(),
            );
    }
}
