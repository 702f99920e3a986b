//! Suika3D - a physics-driven merge puzzle in a cylindrical jar
//!
//! Core modules:
//! - `sim`: Simulation (rigid bodies, container, merges, spawning, session loop)
//! - `tuning`: Data-driven tier table, container dimensions and physics constants
//! - `platform`: Browser/native logging setup

pub mod platform;
pub mod sim;
pub mod tuning;

pub use tuning::{ConfigError, GameConfig, Tier, TierTable};

use glam::Vec3;

/// Reference simulation constants
pub mod consts {
    /// Fixed simulation timestep (60 Hz)
    pub const SIM_DT: f32 = 1.0 / 60.0;
    /// Maximum substeps per `step` call to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 3;

    /// Gravity along Y (m/s²)
    pub const GRAVITY_Y: f32 = -9.81;
    /// Body density used for mass = 4/3·π·r³·density
    pub const DENSITY: f32 = 1.0;

    /// Container defaults
    pub const CONTAINER_INNER_DIAMETER: f32 = 2.6;
    pub const CONTAINER_HEIGHT: f32 = 3.6;
    pub const CONTAINER_SPAWN_Y: f32 = 2.9;
    pub const CONTAINER_WARN_Y: f32 = 1.9;
    pub const CONTAINER_SEGMENTS: u32 = 24;
    /// Half thickness of a wall slab
    pub const WALL_THICKNESS: f32 = 0.05;

    /// Contact material
    pub const RESTITUTION: f32 = 0.25;
    pub const FRICTION: f32 = 0.3;

    /// Sleep thresholds (speed limits and time below them before sleeping)
    pub const SLEEP_LINEAR: f32 = 0.05;
    pub const SLEEP_ANGULAR: f32 = 0.05;
    pub const SLEEP_TIME: f32 = 0.6;

    /// Merge tuning
    pub const MERGE_COOLDOWN: f64 = 0.05;
    pub const MERGE_LIFT: f32 = 0.01;
    pub const PROXIMITY_SLACK: f32 = 1.02;

    /// Drop position margin inside the wall
    pub const SPAWN_MARGIN: f32 = 0.05;

    /// Game over: body is "settled" below this speed
    pub const SETTLED_SPEED: f32 = 0.02;
    /// Game over: seconds a body may stay above the warning line
    pub const DANGER_LIMIT: f32 = 1.5;
    /// A body has entered the jar once its bottom is this far below the line
    pub const WARN_ENTER_MARGIN: f32 = 0.02;
}

/// Volume of a sphere times density
#[inline]
pub fn sphere_mass(radius: f32, density: f32) -> f32 {
    (4.0 / 3.0) * std::f32::consts::PI * radius * radius * radius * density
}

/// Mass-weighted average of two vectors
#[inline]
pub fn mass_weighted(a: Vec3, mass_a: f32, b: Vec3, mass_b: f32) -> Vec3 {
    (a * mass_a + b * mass_b) / (mass_a + mass_b)
}

/// Horizontal (x, z) length
#[inline]
pub fn horizontal_len(x: f32, z: f32) -> f32 {
    x.hypot(z)
}
