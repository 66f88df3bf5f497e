//! Common types for collider queries and solver results.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Surface query used by the exit-ray stepper.
///
/// Unlike a regular solid raycast, a ray that starts inside the shape must
/// report the point where it leaves the shape rather than a hit at distance
/// zero. This lets the stepper walk through successive surface crossings of
/// non-convex shapes.
///
/// # Example
/// ```
/// use bevy::prelude::*;
/// use bevy_ballistics_core::types::{ExitRayShape, SolidSphere};
///
/// let sphere = SolidSphere { center: Vec3::ZERO, radius: 1.0 };
/// let hit = sphere.cast_surface(Vec3::ZERO, Dir3::X, 10.0);
/// assert!((hit.unwrap() - 1.0).abs() < 1e-5);
/// ```
pub trait ExitRayShape {
    /// Distance along `direction` to the next surface crossing.
    ///
    /// # Arguments
    /// * `origin` - Start of the ray in world space
    /// * `direction` - Normalized ray direction
    /// * `max_distance` - Crossings further than this are ignored
    ///
    /// # Returns
    /// Distance to the first crossing, or None if the ray crosses no surface
    fn cast_surface(&self, origin: Vec3, direction: Dir3, max_distance: f32) -> Option<f32>;
}

/// Slab intersection of a ray with an axis-aligned box.
///
/// Returns `(near, far)` or None when the ray misses or the box is behind it.
pub fn slab_intersection(min: Vec3, max: Vec3, origin: Vec3, direction: Vec3) -> Option<(f32, f32)> {
    let a = (min - origin) / direction;
    let b = (max - origin) / direction;
    let near = a.min(b).max_element();
    let far = a.max(b).min_element();

    (far >= 0.0 && near <= far).then_some((near, far))
}

/// Axis-aligned solid box.
#[derive(Clone, Copy, Debug, PartialEq, Reflect)]
pub struct SolidBox {
    pub center: Vec3,
    pub half_extents: Vec3,
}

impl SolidBox {
    pub fn new(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            center,
            half_extents,
        }
    }

    pub fn min(&self) -> Vec3 {
        self.center - self.half_extents
    }

    pub fn max(&self) -> Vec3 {
        self.center + self.half_extents
    }
}

impl ExitRayShape for SolidBox {
    fn cast_surface(&self, origin: Vec3, direction: Dir3, max_distance: f32) -> Option<f32> {
        let (near, far) = slab_intersection(self.min(), self.max(), origin, *direction)?;
        let distance = if near > 0.0 { near } else { far };
        (distance <= max_distance).then_some(distance)
    }
}

/// Solid sphere.
#[derive(Clone, Copy, Debug, PartialEq, Reflect)]
pub struct SolidSphere {
    pub center: Vec3,
    pub radius: f32,
}

impl ExitRayShape for SolidSphere {
    fn cast_surface(&self, origin: Vec3, direction: Dir3, max_distance: f32) -> Option<f32> {
        let offset = origin - self.center;
        let b = offset.dot(*direction);
        let c = offset.length_squared() - self.radius * self.radius;
        let discriminant = b * b - c;
        if discriminant < 0.0 {
            return None;
        }

        let root = discriminant.sqrt();
        let near = -b - root;
        let far = -b + root;
        let distance = if near > 0.0 {
            near
        } else if far > 0.0 {
            far
        } else {
            return None;
        };
        (distance <= max_distance).then_some(distance)
    }
}

/// Primitive part of a [`CompoundShape`].
#[derive(Clone, Copy, Debug, PartialEq, Reflect)]
pub enum SolidPart {
    Box(SolidBox),
    Sphere(SolidSphere),
}

impl ExitRayShape for SolidPart {
    fn cast_surface(&self, origin: Vec3, direction: Dir3, max_distance: f32) -> Option<f32> {
        match self {
            SolidPart::Box(part) => part.cast_surface(origin, direction, max_distance),
            SolidPart::Sphere(part) => part.cast_surface(origin, direction, max_distance),
        }
    }
}

/// Non-convex solid made of disjoint primitive parts.
///
/// Overlapping parts report their internal boundaries as crossings.
#[derive(Clone, Debug, Default, PartialEq, Reflect)]
pub struct CompoundShape {
    pub parts: Vec<SolidPart>,
}

impl CompoundShape {
    pub fn new(parts: impl IntoIterator<Item = SolidPart>) -> Self {
        Self {
            parts: parts.into_iter().collect(),
        }
    }

    /// Axis-aligned bounds of all parts, or None for an empty shape.
    pub fn bounds(&self) -> Option<bevy::math::bounding::Aabb3d> {
        let mut parts = self.parts.iter().map(|part| match part {
            SolidPart::Box(b) => (b.min(), b.max()),
            SolidPart::Sphere(s) => (s.center - Vec3::splat(s.radius), s.center + Vec3::splat(s.radius)),
        });
        let (mut min, mut max) = parts.next()?;
        for (part_min, part_max) in parts {
            min = min.min(part_min);
            max = max.max(part_max);
        }
        Some(bevy::math::bounding::Aabb3d {
            min: min.into(),
            max: max.into(),
        })
    }
}

impl ExitRayShape for CompoundShape {
    fn cast_surface(&self, origin: Vec3, direction: Dir3, max_distance: f32) -> Option<f32> {
        self.parts
            .iter()
            .filter_map(|part| part.cast_surface(origin, direction, max_distance))
            .min_by(|a, b| a.total_cmp(b))
    }
}

/// An avian3d collider placed in the world.
///
/// Casts with `solid = false`, so rays starting inside the collider report
/// where they leave it.
#[cfg(feature = "dim3")]
#[derive(Clone, Copy)]
pub struct PlacedCollider<'a> {
    pub collider: &'a avian3d::prelude::Collider,
    pub translation: Vec3,
    pub rotation: Quat,
}

#[cfg(feature = "dim3")]
impl<'a> PlacedCollider<'a> {
    pub fn new(collider: &'a avian3d::prelude::Collider, translation: Vec3, rotation: Quat) -> Self {
        Self {
            collider,
            translation,
            rotation,
        }
    }
}

#[cfg(feature = "dim3")]
impl ExitRayShape for PlacedCollider<'_> {
    fn cast_surface(&self, origin: Vec3, direction: Dir3, max_distance: f32) -> Option<f32> {
        use avian3d::prelude::{Position, Rotation};

        self.collider
            .cast_ray(
                Position(self.translation),
                Rotation(self.rotation),
                origin,
                *direction,
                max_distance,
                false,
            )
            .map(|(distance, _normal)| distance)
    }
}

/// Outcome of zeroing one target distance.
///
/// Unreachable targets carry `angle == 0.0` and `reachable == false`; use
/// [`ZeroingResult::elevation`] to avoid mistaking that for a flat shot.
#[derive(Clone, Copy, Debug, PartialEq, Reflect, Serialize, Deserialize)]
pub struct ZeroingResult {
    /// Requested distance (m)
    pub distance: f32,
    /// Launch elevation (radians)
    pub angle: f32,
    /// Whether the distance can be reached at all
    pub reachable: bool,
}

impl ZeroingResult {
    pub fn unreachable(distance: f32) -> Self {
        Self {
            distance,
            angle: 0.0,
            reachable: false,
        }
    }

    /// Elevation angle, or None when the distance is out of range.
    pub fn elevation(&self) -> Option<f32> {
        self.reachable.then_some(self.angle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_surface_from_outside_and_inside() {
        let solid = SolidBox::new(Vec3::ZERO, Vec3::splat(1.0));

        let outside = solid.cast_surface(Vec3::new(-5.0, 0.0, 0.0), Dir3::X, 100.0);
        assert!((outside.unwrap() - 4.0).abs() < 1e-5);

        let inside = solid.cast_surface(Vec3::ZERO, Dir3::X, 100.0);
        assert!((inside.unwrap() - 1.0).abs() < 1e-5);

        assert!(solid.cast_surface(Vec3::new(-5.0, 0.0, 0.0), Dir3::X, 3.0).is_none());
        assert!(solid.cast_surface(Vec3::new(5.0, 0.0, 0.0), Dir3::X, 100.0).is_none());
    }

    #[test]
    fn test_sphere_misses_and_hits() {
        let sphere = SolidSphere {
            center: Vec3::new(0.0, 0.0, 10.0),
            radius: 2.0,
        };
        let hit = sphere.cast_surface(Vec3::ZERO, Dir3::Z, 100.0);
        assert!((hit.unwrap() - 8.0).abs() < 1e-4);
        assert!(sphere.cast_surface(Vec3::new(5.0, 0.0, 0.0), Dir3::Z, 100.0).is_none());
    }

    #[test]
    fn test_compound_picks_nearest_part() {
        let shape = CompoundShape::new([
            SolidPart::Box(SolidBox::new(Vec3::new(0.5, 0.0, 0.0), Vec3::splat(0.5))),
            SolidPart::Box(SolidBox::new(Vec3::new(2.5, 0.0, 0.0), Vec3::splat(0.5))),
        ]);
        let hit = shape.cast_surface(Vec3::new(4.0, 0.0, 0.0), Dir3::NEG_X, 100.0);
        assert!((hit.unwrap() - 1.0).abs() < 1e-5);

        let bounds = shape.bounds().unwrap();
        assert_eq!(Vec3::from(bounds.min), Vec3::new(0.0, -0.5, -0.5));
        assert_eq!(Vec3::from(bounds.max), Vec3::new(3.0, 0.5, 0.5));
    }

    #[test]
    fn test_unreachable_result_has_no_elevation() {
        let result = ZeroingResult::unreachable(1.0e7);
        assert_eq!(result.angle, 0.0);
        assert_eq!(result.elevation(), None);
    }
}
