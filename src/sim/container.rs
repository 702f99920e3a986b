//! Jar geometry: a ground plane plus flat wall slabs around a circle
//!
//! The cylinder is approximated by `segments` boxes whose inner faces are
//! tangent to the nominal inner circle, so the polygon's inscribed circle is
//! exactly the inner radius and resting spheres are never clipped.

use glam::Vec3;

use crate::tuning::ContainerTuning;

/// One static wall slab (oriented box)
#[derive(Debug, Clone, PartialEq)]
pub struct WallSlab {
    /// Box center
    pub center: Vec3,
    /// Unit normal of the inner face, pointing toward the jar axis
    pub inward: Vec3,
    /// Unit horizontal direction along the slab's width
    pub tangent: Vec3,
    /// Half extents along (outward normal, up, tangent)
    pub half_extents: Vec3,
}

impl WallSlab {
    /// Express a world point in slab space (x = outward, y = up, z = tangent)
    #[inline]
    pub fn to_local(&self, p: Vec3) -> Vec3 {
        let d = p - self.center;
        Vec3::new(-d.dot(self.inward), d.y, d.dot(self.tangent))
    }

    /// Rotate a slab-space direction back to world space
    #[inline]
    pub fn dir_to_world(&self, v: Vec3) -> Vec3 {
        -self.inward * v.x + Vec3::Y * v.y + self.tangent * v.z
    }
}

/// Immutable container geometry
#[derive(Debug, Clone)]
pub struct Container {
    pub inner_radius: f32,
    pub height: f32,
    pub spawn_y: f32,
    pub warn_y: f32,
    pub walls: Vec<WallSlab>,
}

impl Container {
    pub fn new(tuning: &ContainerTuning) -> Self {
        let r = tuning.inner_radius();
        let h = tuning.height;
        let n = tuning.segments.max(3);
        let half_thick = tuning.wall_thickness;
        let half_width = r * std::f32::consts::PI / n as f32;

        let walls = (0..n)
            .map(|i| {
                let theta = i as f32 / n as f32 * std::f32::consts::TAU;
                let outward = Vec3::new(theta.cos(), 0.0, theta.sin());
                WallSlab {
                    // Push the box out by its half thickness so the inner face sits on the circle
                    center: outward * (r + half_thick) + Vec3::Y * (h / 2.0),
                    inward: -outward,
                    tangent: Vec3::new(-theta.sin(), 0.0, theta.cos()),
                    half_extents: Vec3::new(half_thick, h / 2.0, half_width),
                }
            })
            .collect();

        Self {
            inner_radius: r,
            height: h,
            spawn_y: tuning.spawn_y,
            warn_y: tuning.warn_y,
            walls,
        }
    }

    /// Whether a sphere at `p` lies inside every wall's inner face
    pub fn contains_horizontally(&self, p: Vec3, radius: f32) -> bool {
        self.walls
            .iter()
            .all(|w| p.dot(-w.inward) + radius <= self.inner_radius + 1e-3)
    }
}
