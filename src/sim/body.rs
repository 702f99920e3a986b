//! Rigid sphere bodies and the game metadata attached to them by id

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::tuning::Tier;

/// Stable body identifier, assigned monotonically from 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BodyId(pub u32);

/// An unordered body pair, stored as (lower id, higher id)
pub type BodyPair = (BodyId, BodyId);

/// Normalize a pair so (a, b) and (b, a) compare equal
#[inline]
pub fn ordered_pair(a: BodyId, b: BodyId) -> BodyPair {
    if a <= b { (a, b) } else { (b, a) }
}

/// Sleep state of a dynamic body
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SleepState {
    Awake,
    /// Below the speed limits for `for_secs`
    Sleepy { for_secs: f32 },
    /// Settled; excluded from integration until woken
    Asleep,
}

/// A simulated sphere
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RigidBody {
    pub id: BodyId,
    pub radius: f32,
    pub mass: f32,
    pub position: Vec3,
    pub velocity: Vec3,
    pub orientation: Quat,
    pub angular_velocity: Vec3,
    pub sleep: SleepState,
}

impl RigidBody {
    pub fn new(id: BodyId, radius: f32, mass: f32, position: Vec3) -> Self {
        Self {
            id,
            radius,
            mass,
            position,
            velocity: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            angular_velocity: Vec3::ZERO,
            sleep: SleepState::Awake,
        }
    }

    #[inline]
    pub fn is_asleep(&self) -> bool {
        matches!(self.sleep, SleepState::Asleep)
    }

    /// Inverse mass as seen by the solver (sleeping bodies act static)
    #[inline]
    pub fn solver_inv_mass(&self) -> f32 {
        if self.is_asleep() { 0.0 } else { 1.0 / self.mass }
    }

    /// Inverse moment of inertia of a solid sphere, 1 / (2/5·m·r²)
    #[inline]
    pub fn solver_inv_inertia(&self) -> f32 {
        if self.is_asleep() {
            0.0
        } else {
            1.0 / (0.4 * self.mass * self.radius * self.radius)
        }
    }

    pub fn wake(&mut self) {
        self.sleep = SleepState::Awake;
    }

    /// Kinetic "activity" used for waking neighbours
    #[inline]
    pub fn speed_squared(&self) -> f32 {
        self.velocity.length_squared() + self.angular_velocity.length_squared()
    }

    /// Lowest point of the sphere
    #[inline]
    pub fn bottom(&self) -> f32 {
        self.position.y - self.radius
    }

    /// Highest point of the sphere
    #[inline]
    pub fn top(&self) -> f32 {
        self.position.y + self.radius
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.velocity.is_finite() && self.angular_velocity.is_finite()
    }
}

/// Game-side metadata kept next to each body, looked up by id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BodyMeta {
    pub tier: Tier,
    /// World time (seconds) when the body was created
    pub born_at: f64,
    /// Set once the body's bottom has dropped below the warning line
    pub entered_warning_zone: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordered_pair() {
        assert_eq!(ordered_pair(BodyId(7), BodyId(3)), (BodyId(3), BodyId(7)));
        assert_eq!(ordered_pair(BodyId(3), BodyId(7)), (BodyId(3), BodyId(7)));
    }

    #[test]
    fn test_sleeping_body_is_static_for_solver() {
        let mut body = RigidBody::new(BodyId(1), 0.3, 1.0, Vec3::ZERO);
        assert!((body.solver_inv_mass() - 1.0).abs() < 1e-6);
        body.sleep = SleepState::Asleep;
        assert_eq!(body.solver_inv_mass(), 0.0);
        assert_eq!(body.solver_inv_inertia(), 0.0);
        body.wake();
        assert!(!body.is_asleep());
    }

    #[test]
    fn test_extents() {
        let body = RigidBody::new(BodyId(1), 0.3, 1.0, Vec3::new(0.0, 1.0, 0.0));
        assert!((body.bottom() - 0.7).abs() < 1e-6);
        assert!((body.top() - 1.3).abs() < 1e-6);
    }
}
