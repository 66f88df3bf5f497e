//! Messages emitted by the ballistics core.
//!
//! Note: In Bevy 0.18, buffered events use the `Message` trait instead of `Event`.

use bevy::ecs::message::Message;
use bevy::prelude::*;

/// Why a projectile slot was returned to the free region.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetireReason {
    /// Lifetime elapsed
    Expired,
    /// Travelled past `BallisticsConfig::max_projectile_distance`
    OutOfRange,
}

/// Sent when a projectile slot is retired.
///
/// The slot's records stay readable until the slot is reused, so handlers can
/// still inspect the final position.
///
/// # Fields
/// * `slot` - Retired slot index
/// * `owner` - Entity that fired the projectile
/// * `position` - Last integrated position
/// * `reason` - Why the projectile was retired
#[derive(Message, Clone, Debug)]
pub struct ProjectileRetired {
    pub slot: usize,
    pub owner: Option<Entity>,
    pub position: Vec3,
    pub reason: RetireReason,
}

/// Sent when a weapon's zeroing request has been solved.
///
/// # Fields
/// * `weapon` - Entity carrying the `WeaponZeroing` component
/// * `distance` - Requested distance in meters
/// * `angle` - Solved elevation, or None when unreachable
#[derive(Message, Clone, Debug)]
pub struct ZeroingResolved {
    pub weapon: Entity,
    pub distance: f32,
    pub angle: Option<f32>,
}
