//! Global resources for the ballistics core.

use bevy::prelude::*;

use crate::components::ProjectileSource;
use crate::systems::exit_ray::ExitRaySettings;
use crate::systems::zeroing::ZeroingSettings;

/// Global environment settings affecting all projectiles.
///
/// # Fields
/// * `gravity` - Gravity vector in meters per second squared
/// * `air_density` - Air density in kg/m³ at sea level and 15 °C
/// * `wind` - Wind velocity vector in meters per second
/// * `temperature` - Ambient temperature in Celsius affecting air density
/// * `altitude` - Altitude in meters affecting air density
///
/// # Example
/// ```
/// use bevy::prelude::*;
/// use bevy_ballistics_core::resources::BallisticsEnvironment;
///
/// let env = BallisticsEnvironment {
///     gravity: Vec3::new(0.0, -9.81, 0.0),
///     air_density: 1.1,
///     wind: Vec3::new(2.0, 0.0, 0.0),
///     temperature: 25.0,
///     altitude: 100.0,
/// };
/// ```
#[derive(Resource, Reflect, Clone)]
#[reflect(Resource)]
pub struct BallisticsEnvironment {
    /// Gravity vector (m/s²)
    pub gravity: Vec3,
    /// Air density affecting drag (kg/m³)
    pub air_density: f32,
    /// Wind velocity vector (m/s)
    pub wind: Vec3,
    /// Temperature affecting air density calculations (Celsius)
    pub temperature: f32,
    /// Altitude affecting air density (meters)
    pub altitude: f32,
}

impl Default for BallisticsEnvironment {
    /// Earth-like conditions: 9.81 m/s² down, 1.225 kg/m³, no wind, 15 °C, sea level.
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.81, 0.0),
            air_density: 1.225, // Standard at sea level
            wind: Vec3::ZERO,
            temperature: 15.0,
            altitude: 0.0,
        }
    }
}

impl BallisticsEnvironment {
    /// Environment without air, for closed-form comparisons.
    pub fn vacuum() -> Self {
        Self {
            air_density: 0.0,
            ..Default::default()
        }
    }

    /// Calculate adjusted air density based on altitude and temperature.
    ///
    /// Uses a simplified barometric formula.
    ///
    /// # Returns
    /// The effective air density considering altitude and temperature
    pub fn effective_air_density(&self) -> f32 {
        let temp_kelvin = self.temperature + 273.15;
        let pressure_ratio = (-self.altitude / 8500.0).exp();
        self.air_density * pressure_ratio * (288.15 / temp_kelvin)
    }

    /// Magnitude of gravity (m/s²).
    pub fn gravity_magnitude(&self) -> f32 {
        self.gravity.length()
    }
}

/// Global configuration for the ballistics core.
///
/// # Fields
/// * `slot_capacity` - Number of projectile slots allocated at startup
/// * `max_projectile_distance` - Distance from the muzzle past which projectiles retire
/// * `zeroing` - Drag-aware zeroing solver tuning
/// * `exit_ray` - Exit-ray stepper tuning
///
/// # Example
/// ```
/// use bevy_ballistics_core::resources::BallisticsConfig;
///
/// let config = BallisticsConfig {
///     slot_capacity: 256,
///     max_projectile_distance: 3000.0,
///     ..Default::default()
/// };
/// ```
#[derive(Resource, Reflect, Clone)]
#[reflect(Resource)]
pub struct BallisticsConfig {
    /// Projectile slots allocated once at startup
    pub slot_capacity: usize,
    /// Maximum projectile distance before retirement (meters)
    pub max_projectile_distance: f32,
    /// Zeroing solver tuning
    pub zeroing: ZeroingSettings,
    /// Exit-ray stepper tuning
    pub exit_ray: ExitRaySettings,
}

impl Default for BallisticsConfig {
    /// 512 slots, 2000 m retirement distance, default solver tunings.
    fn default() -> Self {
        Self {
            slot_capacity: 512,
            max_projectile_distance: 2000.0,
            zeroing: ZeroingSettings::default(),
            exit_ray: ExitRaySettings::default(),
        }
    }
}

/// Pending projectile spawns streamed into the slot store.
///
/// When more projectiles are queued than there are free slots, the remainder
/// stays queued and `cursor` records where the next tick resumes.
///
/// # Example
/// ```
/// use bevy::prelude::*;
/// use bevy_ballistics_core::components::ProjectileSource;
/// use bevy_ballistics_core::resources::ProjectileSpawnQueue;
///
/// let mut queue = ProjectileSpawnQueue::default();
/// queue.push(ProjectileSource::new(Vec3::ZERO, Vec3::Z * 900.0));
/// assert_eq!(queue.pending_count(), 1);
/// ```
#[derive(Resource, Default)]
pub struct ProjectileSpawnQueue {
    pub pending: Vec<ProjectileSource>,
    pub cursor: usize,
}

impl ProjectileSpawnQueue {
    pub fn push(&mut self, source: ProjectileSource) {
        self.pending.push(source);
    }

    /// Spawns not yet written into a slot.
    pub fn pending_count(&self) -> usize {
        self.pending.len().saturating_sub(self.cursor)
    }
}
