//! Data-driven game balance
//!
//! Tier table (radius, merge score, spawn weight), container dimensions and
//! physics constants. Everything is plain serde data with reference defaults;
//! `GameConfig::validate` rejects degenerate setups before any simulation
//! object is built.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::*;
use crate::sphere_mass;

/// Size class of a sphere, 1-based and totally ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Tier(u8);

impl Tier {
    /// Smallest tier
    pub const MIN: Tier = Tier(1);

    /// Returns `None` for 0
    pub fn new(ordinal: u8) -> Option<Self> {
        (ordinal > 0).then_some(Self(ordinal))
    }

    #[inline]
    pub fn get(self) -> u8 {
        self.0
    }

    #[inline]
    fn index(self) -> usize {
        self.0 as usize - 1
    }
}

impl TryFrom<u8> for Tier {
    type Error = ConfigError;

    fn try_from(ordinal: u8) -> Result<Self, Self::Error> {
        Self::new(ordinal).ok_or(ConfigError::ZeroTier)
    }
}

impl From<Tier> for u8 {
    fn from(tier: Tier) -> u8 {
        tier.0
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// Per-tier attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierSpec {
    pub name: String,
    pub radius: f32,
    /// Points for fusing two bodies of this tier (absent for the top tier)
    #[serde(default)]
    pub merge_score: Option<u32>,
    /// Relative spawn probability, need not sum to 1 (absent = merge only)
    #[serde(default)]
    pub spawn_weight: Option<f32>,
}

impl TierSpec {
    pub fn new(name: &str, radius: f32, merge_score: Option<u32>, spawn_weight: Option<f32>) -> Self {
        Self {
            name: name.to_string(),
            radius,
            merge_score,
            spawn_weight,
        }
    }
}

/// Ordered tier table; entry `i` describes tier `i + 1`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TierTable {
    tiers: Vec<TierSpec>,
}

impl Default for TierTable {
    fn default() -> Self {
        Self::new(vec![
            TierSpec::new("Skull", 0.30, Some(5), Some(0.5)),
            TierSpec::new("Haniwa", 0.40, Some(12), Some(0.3)),
            TierSpec::new("Pixel", 0.52, Some(28), Some(0.2)),
            TierSpec::new("Punk", 0.66, Some(64), None),
            TierSpec::new("Punike", 0.82, None, None),
        ])
    }
}

impl TierTable {
    pub fn new(tiers: Vec<TierSpec>) -> Self {
        Self { tiers }
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    /// Highest tier in the table
    pub fn max_tier(&self) -> Tier {
        Tier(self.tiers.len().max(1) as u8)
    }

    /// All tiers in ascending order
    pub fn iter(&self) -> impl Iterator<Item = (Tier, &TierSpec)> {
        self.tiers
            .iter()
            .enumerate()
            .map(|(i, spec)| (Tier(i as u8 + 1), spec))
    }

    pub fn spec(&self, tier: Tier) -> Option<&TierSpec> {
        self.tiers.get(tier.index())
    }

    pub fn contains(&self, tier: Tier) -> bool {
        tier.index() < self.tiers.len()
    }

    pub fn radius(&self, tier: Tier) -> Option<f32> {
        self.spec(tier).map(|s| s.radius)
    }

    /// Mass of a body of this tier
    pub fn mass(&self, tier: Tier, density: f32) -> Option<f32> {
        self.radius(tier).map(|r| sphere_mass(r, density))
    }

    /// Score for fusing two bodies of `tier` (0 when unset)
    pub fn merge_score(&self, tier: Tier) -> u32 {
        self.spec(tier).and_then(|s| s.merge_score).unwrap_or(0)
    }

    /// The tier a fusion of `tier` produces, `None` at the top
    pub fn next(&self, tier: Tier) -> Option<Tier> {
        let next = Tier(tier.0.checked_add(1)?);
        self.contains(next).then_some(next)
    }

    /// Spawnable prefix as (tier, weight)
    pub fn spawn_weights(&self) -> Vec<(Tier, f32)> {
        self.iter()
            .map_while(|(tier, spec)| spec.spawn_weight.map(|w| (tier, w)))
            .collect()
    }

    pub fn smallest_radius(&self) -> f32 {
        self.tiers.iter().map(|s| s.radius).fold(f32::INFINITY, f32::min)
    }

    pub fn largest_radius(&self) -> f32 {
        self.tiers.iter().map(|s| s.radius).fold(0.0, f32::max)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.tiers.is_empty() {
            return Err(ConfigError::EmptyTierTable);
        }
        if self.tiers.len() > u8::MAX as usize {
            return Err(ConfigError::TooManyTiers(self.tiers.len()));
        }

        let mut prefix_ended = false;
        let mut total_weight = 0.0;
        for (tier, spec) in self.iter() {
            if !(spec.radius.is_finite() && spec.radius > 0.0) {
                return Err(ConfigError::InvalidRadius {
                    tier,
                    radius: spec.radius,
                });
            }
            match spec.spawn_weight {
                Some(w) if !(w.is_finite() && w >= 0.0) => {
                    return Err(ConfigError::InvalidSpawnWeight { tier, weight: w });
                }
                Some(_) if prefix_ended => return Err(ConfigError::SpawnWeightsNotPrefix { tier }),
                Some(w) => total_weight += w,
                None => prefix_ended = true,
            }
        }
        if total_weight <= 0.0 {
            return Err(ConfigError::NoSpawnableTier);
        }
        Ok(())
    }
}

/// Jar dimensions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerTuning {
    pub inner_diameter: f32,
    pub height: f32,
    /// Drop height for new spheres
    pub spawn_y: f32,
    /// Warning / game-over line
    pub warn_y: f32,
    /// Number of flat wall slabs approximating the cylinder
    pub segments: u32,
    /// Half thickness of each slab
    pub wall_thickness: f32,
}

impl Default for ContainerTuning {
    fn default() -> Self {
        Self {
            inner_diameter: CONTAINER_INNER_DIAMETER,
            height: CONTAINER_HEIGHT,
            spawn_y: CONTAINER_SPAWN_Y,
            warn_y: CONTAINER_WARN_Y,
            segments: CONTAINER_SEGMENTS,
            wall_thickness: WALL_THICKNESS,
        }
    }
}

impl ContainerTuning {
    #[inline]
    pub fn inner_radius(&self) -> f32 {
        self.inner_diameter / 2.0
    }

    /// Widest opening between neighbouring slabs at the inner face
    pub fn corner_gap(&self) -> f32 {
        let n = self.segments.max(1) as f32;
        let half_angle = std::f32::consts::PI / n;
        2.0 * self.inner_radius() * (half_angle.tan() - half_angle)
    }
}

/// Integration and contact material parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsTuning {
    pub gravity: glam::Vec3,
    pub restitution: f32,
    pub friction: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub density: f32,
    pub fixed_dt: f32,
    pub max_substeps: u32,
    pub solver_iterations: u32,
    pub position_iterations: u32,
    pub sleep_linear: f32,
    pub sleep_angular: f32,
    pub sleep_time: f32,
}

impl Default for PhysicsTuning {
    fn default() -> Self {
        Self {
            gravity: glam::Vec3::new(0.0, GRAVITY_Y, 0.0),
            restitution: RESTITUTION,
            friction: FRICTION,
            linear_damping: 0.01,
            angular_damping: 0.01,
            density: DENSITY,
            fixed_dt: SIM_DT,
            max_substeps: MAX_SUBSTEPS,
            solver_iterations: 10,
            position_iterations: 3,
            sleep_linear: SLEEP_LINEAR,
            sleep_angular: SLEEP_ANGULAR,
            sleep_time: SLEEP_TIME,
        }
    }
}

/// Merge detection parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeTuning {
    /// Seconds a source body is ineligible after a merge decision
    pub cooldown: f64,
    /// Upward nudge applied to the fused position
    pub lift: f32,
    /// Sum-of-radii tolerance for the proximity contact scan
    pub proximity_slack: f32,
}

impl Default for MergeTuning {
    fn default() -> Self {
        Self {
            cooldown: MERGE_COOLDOWN,
            lift: MERGE_LIFT,
            proximity_slack: PROXIMITY_SLACK,
        }
    }
}

/// Drop position parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnerTuning {
    /// Gap kept between the drop disk and the wall
    pub margin: f32,
}

impl Default for SpawnerTuning {
    fn default() -> Self {
        Self {
            margin: SPAWN_MARGIN,
        }
    }
}

/// Game-over rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionTuning {
    pub settled_speed: f32,
    pub danger_limit: f32,
    pub warn_enter_margin: f32,
}

impl Default for SessionTuning {
    fn default() -> Self {
        Self {
            settled_speed: SETTLED_SPEED,
            danger_limit: DANGER_LIMIT,
            warn_enter_margin: WARN_ENTER_MARGIN,
        }
    }
}

/// Complete static configuration consumed at construction
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub tiers: TierTable,
    pub container: ContainerTuning,
    pub physics: PhysicsTuning,
    pub merge: MergeTuning,
    pub spawner: SpawnerTuning,
    pub session: SessionTuning,
}

/// Configuration rejected at construction
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("tier table must contain at least one tier")]
    EmptyTierTable,
    #[error("tier table has {0} tiers, at most 255 are supported")]
    TooManyTiers(usize),
    #[error("tier {tier} radius {radius} must be finite and positive")]
    InvalidRadius { tier: Tier, radius: f32 },
    #[error("tier {tier} spawn weight {weight} must be finite and non-negative")]
    InvalidSpawnWeight { tier: Tier, weight: f32 },
    #[error("tier {tier} has a spawn weight but a lower tier does not")]
    SpawnWeightsNotPrefix { tier: Tier },
    #[error("no tier has a positive spawn weight")]
    NoSpawnableTier,
    #[error("container inner diameter {inner_diameter} must exceed the largest tier diameter {largest}")]
    ContainerTooSmall { inner_diameter: f32, largest: f32 },
    #[error("container needs at least 3 wall segments, got {0}")]
    TooFewSegments(u32),
    #[error("wall corner gap {gap} must be smaller than the smallest radius {min_radius}")]
    WallGapTooWide { gap: f32, min_radius: f32 },
    #[error("container height {0} and wall thickness must be positive")]
    InvalidHeight(f32),
    #[error("warn line {warn_y} and spawn height {spawn_y} must satisfy 0 < warn_y < spawn_y <= height {height}")]
    InvalidHeights { warn_y: f32, spawn_y: f32, height: f32 },
    #[error("spawn margin {margin} must be in [0, inner radius {inner_radius})")]
    InvalidMargin { margin: f32, inner_radius: f32 },
    #[error("fixed timestep {0} must be finite and positive")]
    InvalidTimestep(f32),
    #[error("max substeps and solver iterations must be non-zero")]
    InvalidSubsteps,
    #[error("density {0} must be finite and positive")]
    InvalidDensity(f32),
    #[error("proximity slack {0} must be finite and positive")]
    InvalidSlack(f32),
    #[error("{name} {value} must be finite and non-negative")]
    InvalidParameter { name: &'static str, value: f64 },
    #[error("{name} {value} must lie in [0, 1]")]
    OutOfUnitRange { name: &'static str, value: f32 },
    #[error("gravity {0} must be finite")]
    InvalidGravity(glam::Vec3),
    #[error("tier 0 does not exist, tiers start at 1")]
    ZeroTier,
    #[error("tier {0} is not in the tier table")]
    UnknownTier(Tier),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
}

impl GameConfig {
    /// Parse and validate a JSON config; missing sections fall back to defaults
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: GameConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json_str(&json)?;
        log::info!(
            "Loaded config from {} ({} tiers)",
            path.as_ref().display(),
            config.tiers.len()
        );
        Ok(config)
    }

    /// Reject configs that would produce degenerate geometry or sampling
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tiers.validate()?;

        let c = &self.container;
        if !(c.height.is_finite() && c.height > 0.0 && c.wall_thickness > 0.0) {
            return Err(ConfigError::InvalidHeight(c.height));
        }
        let largest = self.tiers.largest_radius() * 2.0;
        if !(c.inner_diameter.is_finite() && c.inner_diameter > largest) {
            return Err(ConfigError::ContainerTooSmall {
                inner_diameter: c.inner_diameter,
                largest,
            });
        }
        if c.segments < 3 {
            return Err(ConfigError::TooFewSegments(c.segments));
        }
        let gap = c.corner_gap();
        let min_radius = self.tiers.smallest_radius();
        if gap >= min_radius {
            return Err(ConfigError::WallGapTooWide { gap, min_radius });
        }
        if !(c.warn_y > 0.0 && c.warn_y < c.spawn_y && c.spawn_y <= c.height) {
            return Err(ConfigError::InvalidHeights {
                warn_y: c.warn_y,
                spawn_y: c.spawn_y,
                height: c.height,
            });
        }
        let margin = self.spawner.margin;
        if !(margin >= 0.0 && margin < c.inner_radius()) {
            return Err(ConfigError::InvalidMargin {
                margin,
                inner_radius: c.inner_radius(),
            });
        }

        let p = &self.physics;
        if !(p.fixed_dt.is_finite() && p.fixed_dt > 0.0) {
            return Err(ConfigError::InvalidTimestep(p.fixed_dt));
        }
        if p.max_substeps == 0 || p.solver_iterations == 0 {
            return Err(ConfigError::InvalidSubsteps);
        }
        if !(p.density.is_finite() && p.density > 0.0) {
            return Err(ConfigError::InvalidDensity(p.density));
        }

        if !p.gravity.is_finite() {
            return Err(ConfigError::InvalidGravity(p.gravity));
        }
        unit_range("restitution", p.restitution)?;
        unit_range("linear damping", p.linear_damping)?;
        unit_range("angular damping", p.angular_damping)?;
        non_negative("friction", p.friction as f64)?;
        non_negative("sleep linear threshold", p.sleep_linear as f64)?;
        non_negative("sleep angular threshold", p.sleep_angular as f64)?;
        non_negative("sleep time", p.sleep_time as f64)?;

        let m = &self.merge;
        if !(m.proximity_slack.is_finite() && m.proximity_slack > 0.0) {
            return Err(ConfigError::InvalidSlack(m.proximity_slack));
        }
        non_negative("merge cooldown", m.cooldown)?;
        non_negative("merge lift", m.lift as f64)?;

        let s = &self.session;
        non_negative("settled speed", s.settled_speed as f64)?;
        non_negative("danger limit", s.danger_limit as f64)?;
        non_negative("warning entry margin", s.warn_enter_margin as f64)?;
        Ok(())
    }
}

fn non_negative(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidParameter { name, value })
    }
}

fn unit_range(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfUnitRange { name, value })
    }
}
