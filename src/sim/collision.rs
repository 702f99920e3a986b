//! Collision detection for spheres against spheres, the floor and wall slabs
//!
//! Every test returns a `CollisionResult` whose normal points toward the
//! first sphere's center, so pushing the sphere along `normal` by
//! `penetration` separates the pair.

use glam::Vec3;

use super::container::WallSlab;

/// Result of a collision check
#[derive(Debug, Clone)]
pub struct CollisionResult {
    /// Whether a collision occurred
    pub hit: bool,
    /// Surface normal at collision (pointing toward the sphere center)
    pub normal: Vec3,
    /// Penetration depth (for position correction)
    pub penetration: f32,
}

impl CollisionResult {
    pub fn miss() -> Self {
        Self {
            hit: false,
            normal: Vec3::ZERO,
            penetration: 0.0,
        }
    }

    fn hit(normal: Vec3, penetration: f32) -> Self {
        Self {
            hit: true,
            normal,
            penetration,
        }
    }
}

/// Check collision between two spheres
///
/// The normal points from `b` toward `a`. Coincident centers fall back to +Y
/// so the pair still separates.
pub fn sphere_sphere_collision(a: Vec3, radius_a: f32, b: Vec3, radius_b: f32) -> CollisionResult {
    let delta = a - b;
    let dist_sq = delta.length_squared();
    let sum = radius_a + radius_b;
    if dist_sq >= sum * sum {
        return CollisionResult::miss();
    }

    let dist = dist_sq.sqrt();
    let normal = if dist > 1e-6 { delta / dist } else { Vec3::Y };
    CollisionResult::hit(normal, sum - dist)
}

/// Check collision with the ground plane (y = 0, normal +Y)
pub fn sphere_ground_collision(center: Vec3, radius: f32) -> CollisionResult {
    let gap = center.y - radius;
    if gap < 0.0 {
        return CollisionResult::hit(Vec3::Y, -gap);
    }
    CollisionResult::miss()
}

/// Check collision with a wall slab (oriented box)
///
/// Uses the closest point on the box. A center already inside the box is
/// pushed out through the inner face, back toward the jar.
pub fn sphere_slab_collision(center: Vec3, radius: f32, slab: &WallSlab) -> CollisionResult {
    let local = slab.to_local(center);
    let h = slab.half_extents;
    let closest = local.clamp(-h, h);
    let delta = local - closest;
    let dist_sq = delta.length_squared();

    if dist_sq >= radius * radius {
        return CollisionResult::miss();
    }

    if dist_sq > 1e-12 {
        let dist = dist_sq.sqrt();
        let normal = slab.dir_to_world(delta / dist);
        return CollisionResult::hit(normal, radius - dist);
    }

    // Center inside the slab - shouldn't happen with proper substepping
    let depth_past_inner_face = local.x + h.x;
    CollisionResult::hit(slab.inward, radius + depth_past_inner_face)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::container::Container;
    use crate::tuning::ContainerTuning;

    #[test]
    fn test_sphere_sphere_overlap() {
        let result = sphere_sphere_collision(
            Vec3::new(0.5, 0.0, 0.0),
            0.3,
            Vec3::ZERO,
            0.3,
        );
        assert!(result.hit);
        assert!((result.penetration - 0.1).abs() < 1e-5);
        assert!((result.normal - Vec3::X).length() < 1e-5);
    }

    #[test]
    fn test_sphere_sphere_touching_is_miss() {
        let result = sphere_sphere_collision(Vec3::new(0.6, 0.0, 0.0), 0.3, Vec3::ZERO, 0.3);
        assert!(!result.hit);
    }

    #[test]
    fn test_sphere_sphere_coincident() {
        let result = sphere_sphere_collision(Vec3::ONE, 0.3, Vec3::ONE, 0.4);
        assert!(result.hit);
        assert_eq!(result.normal, Vec3::Y);
        assert!((result.penetration - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_ground_collision() {
        assert!(!sphere_ground_collision(Vec3::new(0.0, 0.5, 0.0), 0.3).hit);

        let result = sphere_ground_collision(Vec3::new(0.0, 0.25, 0.0), 0.3);
        assert!(result.hit);
        assert_eq!(result.normal, Vec3::Y);
        assert!((result.penetration - 0.05).abs() < 1e-6);
    }

    #[test]
    fn test_slab_face_collision() {
        let container = Container::new(&ContainerTuning::default());
        let slab = &container.walls[0];
        // Slab 0 faces -X; its inner face is at x = inner_radius
        let center = Vec3::new(container.inner_radius - 0.25, 1.0, 0.0);

        let result = sphere_slab_collision(center, 0.3, slab);
        assert!(result.hit);
        assert!((result.normal - slab.inward).length() < 1e-5);
        assert!((result.penetration - 0.05).abs() < 1e-4);
    }

    #[test]
    fn test_slab_miss_inside_jar() {
        let container = Container::new(&ContainerTuning::default());
        for slab in &container.walls {
            assert!(!sphere_slab_collision(Vec3::new(0.0, 1.0, 0.0), 0.82, slab).hit);
        }
    }

    #[test]
    fn test_slab_center_inside_pushes_inward() {
        let container = Container::new(&ContainerTuning::default());
        let slab = &container.walls[0];
        let result = sphere_slab_collision(slab.center, 0.3, slab);
        assert!(result.hit);
        assert!((result.normal - slab.inward).length() < 1e-5);
        assert!(result.penetration > 0.3);
    }
}
