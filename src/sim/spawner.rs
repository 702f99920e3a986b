//! Next-tier sequencer and drop position
//!
//! Tiers come from a seeded PCG stream so a run can be replayed from its seed;
//! the drop position is independent of the seed and always starts at the jar
//! axis.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use crate::tuning::{GameConfig, Tier};

/// Inverse-CDF walk over `(tier, weight)`: first tier with `sample ≤ cumulative`
///
/// Weights are relative; the unit `sample` is scaled by their total first.
/// Falls back to the last entry when rounding leaves the sample unmatched.
/// Returns `None` only for an empty table.
pub fn pick_weighted(weights: &[(Tier, f32)], sample: f64) -> Option<Tier> {
    let total: f32 = weights.iter().map(|&(_, w)| w).sum();
    let target = sample * total as f64;
    let mut acc = 0.0_f64;
    for &(tier, w) in weights {
        acc += w as f64;
        if target <= acc {
            return Some(tier);
        }
    }
    weights.last().map(|&(tier, _)| tier)
}

/// FNV-1a, used to turn opaque seed strings into a stable `u64`
fn fnv1a64(text: &str) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0100_0000_01b3;
    text.bytes()
        .fold(OFFSET, |hash, byte| (hash ^ byte as u64).wrapping_mul(PRIME))
}

fn drop_limit(config: &GameConfig) -> f32 {
    (config.container.inner_radius() - config.spawner.margin).max(0.0)
}

/// Seeded tier sequencer plus clamped (x, z) drop position
#[derive(Debug, Clone)]
pub struct Spawner {
    seed: u64,
    rng: Pcg32,
    weights: Vec<(Tier, f32)>,
    /// Radius of the disk the drop position is clamped to
    limit: f32,
    x: f32,
    z: f32,
}

impl Spawner {
    /// `None` draws a fresh seed, so unseeded runs differ
    pub fn new(seed: Option<u64>, config: &GameConfig) -> Self {
        let seed = seed.unwrap_or_else(rand::random);
        let weights = config.tiers.spawn_weights();
        log::info!("Spawner seed {seed} ({} spawnable tiers)", weights.len());
        Self {
            seed,
            rng: Pcg32::seed_from_u64(seed),
            weights,
            limit: drop_limit(config),
            x: 0.0,
            z: 0.0,
        }
    }

    /// Adopt another config's weights and drop disk, keeping the random stream
    ///
    /// The current position is clamped onto the new disk.
    pub fn reconfigure(&mut self, config: &GameConfig) {
        self.weights = config.tiers.spawn_weights();
        self.limit = drop_limit(config);
        self.set_xz_absolute(self.x, self.z);
    }

    /// Seed from an external string (e.g. a URL parameter)
    ///
    /// Decimal numbers are used as-is, anything else is hashed.
    pub fn from_seed_str(seed: &str, config: &GameConfig) -> Self {
        let seed = seed
            .trim()
            .parse::<u64>()
            .unwrap_or_else(|_| fnv1a64(seed));
        Self::new(Some(seed), config)
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Draw the next tier to drop
    pub fn next_tier(&mut self) -> Tier {
        let sample: f64 = self.rng.random();
        pick_weighted(&self.weights, sample).unwrap_or(Tier::MIN)
    }

    /// Current drop position (x, z)
    pub fn xz(&self) -> (f32, f32) {
        (self.x, self.z)
    }

    /// Radius of the allowed drop disk
    pub fn limit(&self) -> f32 {
        self.limit
    }

    /// Move to (x, z), scaling radially back onto the disk if outside
    pub fn set_xz_absolute(&mut self, x: f32, z: f32) {
        let len = crate::horizontal_len(x, z);
        if !len.is_finite() {
            return;
        }
        if len > self.limit {
            let s = self.limit / len;
            self.x = x * s;
            self.z = z * s;
        } else {
            self.x = x;
            self.z = z;
        }
    }

    pub fn nudge(&mut self, dx: f32, dz: f32) {
        self.set_xz_absolute(self.x + dx, self.z + dz);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuning::{TierSpec, TierTable};
    use proptest::prelude::*;

    fn tier(n: u8) -> Tier {
        Tier::new(n).unwrap()
    }

    fn reference_weights() -> Vec<(Tier, f32)> {
        vec![(tier(1), 0.5), (tier(2), 0.3), (tier(3), 0.2)]
    }

    #[test]
    fn test_pick_boundary_is_inclusive() {
        let w = reference_weights();
        assert_eq!(pick_weighted(&w, 0.0), Some(tier(1)));
        assert_eq!(pick_weighted(&w, 0.5), Some(tier(1)));
        assert_eq!(pick_weighted(&w, 0.5000001), Some(tier(2)));
        assert_eq!(pick_weighted(&w, 0.79), Some(tier(2)));
        assert_eq!(pick_weighted(&w, 0.81), Some(tier(3)));
    }

    #[test]
    fn test_pick_relative_weights() {
        let w = vec![(tier(1), 1.0), (tier(2), 1.0)];
        assert_eq!(pick_weighted(&w, 0.25), Some(tier(1)));
        assert_eq!(pick_weighted(&w, 0.5), Some(tier(1)));
        assert_eq!(pick_weighted(&w, 0.75), Some(tier(2)));

        let w = vec![(tier(1), 5.0), (tier(2), 3.0), (tier(3), 2.0)];
        assert_eq!(pick_weighted(&w, 0.5), Some(tier(1)));
        assert_eq!(pick_weighted(&w, 0.79), Some(tier(2)));
        assert_eq!(pick_weighted(&w, 0.81), Some(tier(3)));
    }

    #[test]
    fn test_unnormalised_table_spawns_every_tier() {
        let mut config = GameConfig::default();
        config.tiers = TierTable::new(vec![
            TierSpec::new("a", 0.3, Some(1), Some(1.0)),
            TierSpec::new("b", 0.4, Some(2), Some(1.0)),
            TierSpec::new("c", 0.5, None, None),
        ]);
        let mut spawner = Spawner::new(Some(5), &config);
        let draws = 100_000;
        let mut counts = [0usize; 3];
        for _ in 0..draws {
            counts[spawner.next_tier().get() as usize - 1] += 1;
        }
        assert_eq!(counts[2], 0);
        for count in &counts[..2] {
            let freq = *count as f64 / draws as f64;
            assert!((freq - 0.5).abs() < 0.01, "counts {counts:?}");
        }
    }

    #[test]
    fn test_pick_fallback_to_last() {
        let w = vec![(tier(1), 0.25), (tier(2), 0.25)];
        assert_eq!(pick_weighted(&w, 0.99), Some(tier(2)));
        assert_eq!(pick_weighted(&[], 0.3), None);
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let config = GameConfig::default();
        let mut a = Spawner::new(Some(42), &config);
        let mut b = Spawner::new(Some(42), &config);
        let seq_a: Vec<_> = (0..200).map(|_| a.next_tier()).collect();
        let seq_b: Vec<_> = (0..200).map(|_| b.next_tier()).collect();
        assert_eq!(seq_a, seq_b);
    }

    #[test]
    fn test_seed_does_not_move_position() {
        let config = GameConfig::default();
        assert_eq!(Spawner::new(Some(1), &config).xz(), (0.0, 0.0));
        assert_eq!(Spawner::new(Some(999), &config).xz(), (0.0, 0.0));
        assert_eq!(Spawner::new(None, &config).xz(), (0.0, 0.0));
    }

    #[test]
    fn test_seed_strings() {
        let config = GameConfig::default();
        assert_eq!(Spawner::from_seed_str("1234", &config).seed(), 1234);
        let a = Spawner::from_seed_str("hello", &config).seed();
        let b = Spawner::from_seed_str("hello", &config).seed();
        assert_eq!(a, b);
        assert_ne!(a, Spawner::from_seed_str("hellp", &config).seed());
    }

    #[test]
    fn test_only_spawnable_tiers_drawn() {
        let config = GameConfig::default();
        let mut spawner = Spawner::new(Some(7), &config);
        for _ in 0..5000 {
            assert!(spawner.next_tier() <= tier(3));
        }
    }

    #[test]
    fn test_frequencies_match_weights() {
        let config = GameConfig::default();
        let mut spawner = Spawner::new(Some(2024), &config);
        let draws = 100_000;
        let mut counts = [0usize; 3];
        for _ in 0..draws {
            counts[spawner.next_tier().get() as usize - 1] += 1;
        }
        for (count, expected) in counts.iter().zip([0.5, 0.3, 0.2]) {
            let freq = *count as f64 / draws as f64;
            // 5 sigma for p(1-p)/n
            let sigma = (expected * (1.0 - expected) / draws as f64).sqrt();
            assert!((freq - expected).abs() < 5.0 * sigma, "freq {freq} vs {expected}");
        }
    }

    #[test]
    fn test_clamp_exact_radius() {
        let config = GameConfig::default();
        let mut spawner = Spawner::new(Some(1), &config);
        spawner.set_xz_absolute(3.0, 4.0);
        let (x, z) = spawner.xz();
        assert!((x.hypot(z) - 1.25).abs() < 1e-5);
        assert!((x / z - 0.75).abs() < 1e-5);
    }

    #[test]
    fn test_nudge_accumulates_and_clamps() {
        let config = GameConfig::default();
        let mut spawner = Spawner::new(Some(1), &config);
        spawner.nudge(0.2, -0.1);
        spawner.nudge(0.2, -0.1);
        let (x, z) = spawner.xz();
        assert!((x - 0.4).abs() < 1e-6 && (z + 0.2).abs() < 1e-6);

        for _ in 0..100 {
            spawner.nudge(0.1, 0.0);
        }
        let (x, z) = spawner.xz();
        assert!(x.hypot(z) <= spawner.limit() + 1e-5);
    }

    #[test]
    fn test_reconfigure_keeps_stream() {
        let config = GameConfig::default();
        let mut narrow = GameConfig::default();
        narrow.container.inner_diameter = 2.0;
        narrow.tiers = TierTable::new(vec![
            TierSpec::new("a", 0.3, Some(1), Some(1.0)),
            TierSpec::new("b", 0.4, None, None),
        ]);

        let mut spawner = Spawner::new(Some(9), &config);
        let mut reference = Spawner::new(Some(9), &config);
        spawner.set_xz_absolute(1.2, 0.0);
        spawner.reconfigure(&narrow);

        assert!((spawner.limit() - 0.95).abs() < 1e-6);
        assert!((spawner.xz().0 - 0.95).abs() < 1e-6);
        for _ in 0..50 {
            reference.next_tier();
            assert_eq!(spawner.next_tier(), tier(1));
        }
        assert_eq!(spawner.seed(), reference.seed());
    }

    #[test]
    fn test_non_finite_input_ignored() {
        let config = GameConfig::default();
        let mut spawner = Spawner::new(Some(1), &config);
        spawner.set_xz_absolute(0.3, 0.1);
        spawner.set_xz_absolute(f32::NAN, 0.0);
        assert_eq!(spawner.xz(), (0.3, 0.1));
    }

    proptest! {
        #[test]
        fn prop_position_stays_in_disk(x in -50.0f32..50.0, z in -50.0f32..50.0) {
            let config = GameConfig::default();
            let mut spawner = Spawner::new(Some(3), &config);
            spawner.set_xz_absolute(x, z);
            let (cx, cz) = spawner.xz();
            prop_assert!(cx * cx + cz * cz <= spawner.limit() * spawner.limit() * (1.0 + 1e-5));
        }

        #[test]
        fn prop_outside_points_land_on_rim_same_direction(
            angle in 0.0f32..std::f32::consts::TAU,
            dist in 1.3f32..100.0,
        ) {
            let config = GameConfig::default();
            let mut spawner = Spawner::new(Some(3), &config);
            let (x, z) = (dist * angle.cos(), dist * angle.sin());
            spawner.set_xz_absolute(x, z);
            let (cx, cz) = spawner.xz();
            prop_assert!((cx.hypot(cz) - spawner.limit()).abs() < 1e-4);
            // Same direction: parallel and pointing the same way
            prop_assert!((cx * z - cz * x).abs() < 1e-3 * dist);
            prop_assert!(cx * x + cz * z > 0.0);
        }

        #[test]
        fn prop_inside_points_unchanged(x in -0.8f32..0.8, z in -0.8f32..0.8) {
            let config = GameConfig::default();
            let mut spawner = Spawner::new(Some(3), &config);
            spawner.set_xz_absolute(x, z);
            prop_assert_eq!(spawner.xz(), (x, z));
        }
    }
}
