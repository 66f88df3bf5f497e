//! Exit-ray stepper - finds where a penetrating ray leaves a solid.
//!
//! A probe ray is fired backward from just past the solid's bounding box and
//! walked toward the entry point one surface crossing at a time. The last
//! crossing before the probe reaches the entry point is the exit point, which
//! is correct for concave shapes where the bounding-box exit is not.

use bevy::math::bounding::Aabb3d;
use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::types::{slab_intersection, ExitRayShape};

/// Tuning for [`find_exit`].
#[derive(Clone, Copy, Debug, PartialEq, Reflect, Serialize, Deserialize)]
pub struct ExitRaySettings {
    /// Maximum number of surface crossings walked
    pub max_steps: u32,
    /// Hits closer than this to the ray origin count as the entry surface (m)
    pub origin_epsilon: f32,
    /// Distance the probe is pushed past each hit (m)
    pub nudge: f32,
    /// Distance past the bounding-box exit the probe starts from (m)
    pub probe_offset: f32,
}

impl Default for ExitRaySettings {
    fn default() -> Self {
        Self {
            max_steps: 16,
            origin_epsilon: 1.0e-3,
            nudge: 1.0e-3,
            probe_offset: 1.0e-2,
        }
    }
}

/// Far intersection distance of a ray with an axis-aligned bounding box.
///
/// Uses the slab method. Returns None when the ray misses the box or the box
/// lies entirely behind the origin.
pub fn ray_aabb_far(bounds: &Aabb3d, origin: Vec3, direction: Dir3) -> Option<f32> {
    slab_intersection(bounds.min.into(), bounds.max.into(), origin, *direction).map(|(_, far)| far)
}

/// Find the point where a ray entering `shape` at `origin` leaves it again.
///
/// # Arguments
/// * `bounds` - Axis-aligned bounds of the solid
/// * `shape` - The solid's actual (possibly non-convex) surface
/// * `origin` - Entry point of the ray (or any point inside the solid)
/// * `direction` - Direction of travel
/// * `settings` - Step limits and tolerances
///
/// # Returns
/// The exit point, or None if the probe never crossed a surface in front of
/// the origin
pub fn find_exit(
    bounds: &Aabb3d,
    shape: &impl ExitRayShape,
    origin: Vec3,
    direction: Dir3,
    settings: &ExitRaySettings,
) -> Option<Vec3> {
    let far = ray_aabb_far(bounds, origin, direction)?;
    let backward = -direction;

    let mut remaining = far + settings.probe_offset;
    let mut probe = origin + *direction * remaining;
    let mut exit = None;

    for _ in 0..settings.max_steps {
        let Some(distance) =
            shape.cast_surface(probe, backward, remaining + settings.origin_epsilon)
        else {
            break;
        };

        let hit = probe + *backward * distance;
        if hit.distance(origin) <= settings.origin_epsilon {
            break;
        }
        exit = Some(hit);

        remaining -= distance + settings.nudge;
        if remaining <= 0.0 {
            break;
        }
        probe = hit + *backward * settings.nudge;
    }

    exit
}
