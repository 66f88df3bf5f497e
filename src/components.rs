//! Projectile records and weapon zeroing components.

use std::f32::consts::PI;

use bevy::prelude::*;

use crate::slots::{DualRecord, SlotStore};
use crate::systems::zeroing::{ZeroingJob, ZeroingParams};

/// Slot store holding every in-flight projectile.
pub type ProjectileSlots = SlotStore<ProjectileSource>;

/// Spawn description for a projectile.
///
/// Pushed into [`crate::resources::ProjectileSpawnQueue`] by weapon code and
/// converted into a [`ProjectileRecord`] and a [`ProjectileKinematics`] when
/// a slot frees up.
///
/// # Fields
/// * `origin` - World-space muzzle position
/// * `velocity` - Initial velocity vector in meters per second
/// * `mass` - Mass in kilograms
/// * `drag_coefficient` - Dimensionless drag coefficient
/// * `radius` - Projectile radius in meters, used for the reference area
/// * `lifetime` - Seconds before the projectile is retired
/// * `damage` - Base damage carried to gameplay code
/// * `owner` - Optional entity that fired the projectile
///
/// # Example
/// ```
/// use bevy::prelude::*;
/// use bevy_ballistics_core::components::ProjectileSource;
///
/// let source = ProjectileSource::new(Vec3::new(0.0, 1.5, 0.0), Vec3::Z * 800.0)
///     .with_mass(0.008)
///     .with_owner(Entity::PLACEHOLDER);
/// ```
#[derive(Clone, Debug, Reflect)]
pub struct ProjectileSource {
    pub origin: Vec3,
    pub velocity: Vec3,
    pub mass: f32,
    pub drag_coefficient: f32,
    pub radius: f32,
    pub lifetime: f32,
    pub damage: f32,
    pub owner: Option<Entity>,
}

impl Default for ProjectileSource {
    /// A 10 g rifle bullet fired along -Z at 400 m/s.
    fn default() -> Self {
        Self {
            origin: Vec3::ZERO,
            velocity: Vec3::NEG_Z * 400.0,
            mass: 0.01,
            drag_coefficient: 0.3,
            radius: 0.0056,
            lifetime: 10.0,
            damage: 25.0,
            owner: None,
        }
    }
}

impl ProjectileSource {
    pub fn new(origin: Vec3, velocity: Vec3) -> Self {
        Self {
            origin,
            velocity,
            ..Default::default()
        }
    }

    pub fn with_mass(mut self, mass: f32) -> Self {
        self.mass = mass;
        self
    }

    pub fn with_drag(mut self, drag_coefficient: f32) -> Self {
        self.drag_coefficient = drag_coefficient;
        self
    }

    pub fn with_radius(mut self, radius: f32) -> Self {
        self.radius = radius;
        self
    }

    pub fn with_lifetime(mut self, lifetime: f32) -> Self {
        self.lifetime = lifetime;
        self
    }

    pub fn with_damage(mut self, damage: f32) -> Self {
        self.damage = damage;
        self
    }

    pub fn with_owner(mut self, owner: Entity) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Cross-sectional reference area (m²).
    pub fn reference_area(&self) -> f32 {
        PI * self.radius * self.radius
    }
}

impl DualRecord for ProjectileSource {
    type Logic = ProjectileRecord;
    type Compute = ProjectileKinematics;

    fn to_logic(&self, logic: &mut ProjectileRecord) {
        *logic = ProjectileRecord {
            owner: self.owner,
            damage: self.damage,
            origin: self.origin,
            age: 0.0,
            lifetime: self.lifetime,
        };
    }

    fn to_compute(&self, compute: &mut ProjectileKinematics) {
        let drag_factor = if self.mass > 0.0 {
            0.5 * self.drag_coefficient * self.reference_area() / self.mass
        } else {
            0.0
        };

        *compute = ProjectileKinematics {
            position: self.origin,
            previous_position: self.origin,
            velocity: self.velocity,
            drag_factor,
        };
    }
}

/// Gameplay-side projectile record.
///
/// # Fields
/// * `owner` - Entity that fired the projectile
/// * `damage` - Base damage
/// * `origin` - Muzzle position, used for range checks
/// * `age` - Seconds since the slot was filled
/// * `lifetime` - Seconds the projectile may live
#[derive(Clone, Debug, Default, PartialEq, Reflect)]
pub struct ProjectileRecord {
    pub owner: Option<Entity>,
    pub damage: f32,
    pub origin: Vec3,
    pub age: f32,
    pub lifetime: f32,
}

/// Batch-integration projectile record.
///
/// `drag_factor` folds `0.5 * Cd * A / m` so the integrator only multiplies by
/// air density and speed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Reflect)]
pub struct ProjectileKinematics {
    pub position: Vec3,
    /// Position before the last integration step, for swept collision
    pub previous_position: Vec3,
    pub velocity: Vec3,
    pub drag_factor: f32,
}

/// Weapon zeroing state.
///
/// Written by [`crate::systems::logic::poll_zeroing_jobs`] once a
/// [`ZeroingRequest`] has been solved.
///
/// # Fields
/// * `distance` - Zeroed distance in meters
/// * `pitch_adjustment` - Elevation in radians needed to hit `distance`
/// * `reachable` - False if the last request could not be reached; the
///   previous pitch is kept in that case
///
/// # Example
/// ```
/// use bevy_ballistics_core::components::WeaponZeroing;
///
/// let zeroing = WeaponZeroing {
///     distance: 200.0,
///     pitch_adjustment: 0.005,
///     reachable: true,
/// };
/// ```
#[derive(Component, Reflect, Clone)]
#[reflect(Component)]
pub struct WeaponZeroing {
    /// Zeroed distance in meters
    pub distance: f32,
    /// Calculated pitch adjustment (radians)
    pub pitch_adjustment: f32,
    /// Whether `distance` is within range
    pub reachable: bool,
}

impl Default for WeaponZeroing {
    /// Zeroed at 100 meters with no adjustment.
    fn default() -> Self {
        Self {
            distance: 100.0,
            pitch_adjustment: 0.0,
            reachable: true,
        }
    }
}

/// Request to (re)zero a weapon at `distance` using drag-aware simulation.
///
/// Consumed by [`crate::systems::logic::start_zeroing_requests`].
#[derive(Component, Clone)]
pub struct ZeroingRequest {
    pub distance: f32,
    pub params: ZeroingParams,
}

/// In-flight zeroing job attached to a weapon entity.
#[derive(Component)]
pub struct ZeroingTask {
    pub distance: f32,
    pub job: ZeroingJob,
}
