//! Same-tier fusion detection
//!
//! Each `update` collects touching same-tier ball pairs, sorts them by center
//! distance (closest first, then by id) and greedily accepts pairs whose
//! bodies are still unused in this pass. Accepted pairs become `MergeEvent`s;
//! the world itself is never modified here. The caller drains the queue with
//! `consume` and applies the events.

use std::collections::{BTreeMap, BTreeSet};

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::body::{BodyId, BodyPair, ordered_pair};
use super::contacts::{ContactProvider, ProximityContacts};
use super::world::PhysicsWorld;
use crate::mass_weighted;
use crate::tuning::{MergeTuning, Tier, TierTable};

/// One fusion decision: two sources of `source_tier` become one `result_tier`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeEvent {
    pub source_a: BodyId,
    pub source_b: BodyId,
    pub source_tier: Tier,
    pub result_tier: Tier,
    /// Mass-weighted center, nudged up slightly
    pub result_position: Vec3,
    /// Mass-weighted (momentum-conserving) velocity
    pub result_velocity: Vec3,
    pub score: u32,
}

/// A candidate pair with its squared center distance
#[derive(Debug, Clone, Copy)]
struct Candidate {
    pair: BodyPair,
    tier: Tier,
    dist_sq: f32,
}

/// Merge detector with per-body cooldowns and an outgoing event queue
#[derive(Debug, Clone)]
pub struct MergeSystem {
    tiers: TierTable,
    tuning: MergeTuning,
    /// Seconds of merge-clock time, advanced by `update`
    clock: f64,
    /// Body id -> time until which it cannot merge
    cooldowns: BTreeMap<BodyId, f64>,
    events: Vec<MergeEvent>,
}

impl MergeSystem {
    pub fn new(tiers: TierTable, tuning: MergeTuning) -> Self {
        Self {
            tiers,
            tuning,
            clock: 0.0,
            cooldowns: BTreeMap::new(),
            events: Vec::new(),
        }
    }

    /// Detect merges from the world's own contact list
    pub fn update(&mut self, dt: f32, world: &PhysicsWorld) {
        self.update_with(dt, world, world);
    }

    /// Detect merges by distance scan instead of solver contacts
    pub fn update_by_proximity(&mut self, dt: f32, world: &PhysicsWorld) {
        let provider = ProximityContacts::new(world, self.tuning.proximity_slack);
        self.update_with(dt, world, &provider);
    }

    /// Detect merges using any contact source
    pub fn update_with(&mut self, dt: f32, world: &PhysicsWorld, contacts: &dyn ContactProvider) {
        if dt.is_finite() && dt > 0.0 {
            self.clock += dt as f64;
        }
        let now = self.clock;
        self.cooldowns
            .retain(|id, until| *until > now && world.body(*id).is_some());

        let mut candidates = self.collect_candidates(world, contacts);
        candidates.sort_by(|p, q| p.dist_sq.total_cmp(&q.dist_sq).then(p.pair.cmp(&q.pair)));

        let mut used: BTreeSet<BodyId> = BTreeSet::new();
        for candidate in candidates {
            let (a, b) = candidate.pair;
            if used.contains(&a) || used.contains(&b) {
                continue;
            }
            // Top tier never merges: no event, no score, no cooldown
            let Some(result_tier) = self.tiers.next(candidate.tier) else {
                continue;
            };
            let (Some(body_a), Some(body_b)) = (world.body(a), world.body(b)) else {
                continue;
            };
            used.insert(a);
            used.insert(b);

            let position =
                mass_weighted(body_a.position, body_a.mass, body_b.position, body_b.mass);
            let velocity =
                mass_weighted(body_a.velocity, body_a.mass, body_b.velocity, body_b.mass);
            let event = MergeEvent {
                source_a: a,
                source_b: b,
                source_tier: candidate.tier,
                result_tier,
                result_position: position + Vec3::Y * self.tuning.lift,
                result_velocity: velocity,
                score: self.tiers.merge_score(candidate.tier),
            };
            log::debug!(
                "Merge {:?}+{:?}: {} -> {} (+{})",
                a,
                b,
                event.source_tier,
                event.result_tier,
                event.score
            );
            self.events.push(event);

            let until = now + self.tuning.cooldown;
            self.cooldowns.insert(a, until);
            self.cooldowns.insert(b, until);
        }
    }

    /// Drain all pending events
    pub fn consume(&mut self) -> Vec<MergeEvent> {
        std::mem::take(&mut self.events)
    }

    /// Events queued but not yet consumed
    pub fn pending(&self) -> &[MergeEvent] {
        &self.events
    }

    /// Whether `id` is currently inside its post-merge cooldown
    pub fn is_cooling(&self, id: BodyId) -> bool {
        self.cooldowns.get(&id).is_some_and(|until| *until > self.clock)
    }

    fn collect_candidates(
        &self,
        world: &PhysicsWorld,
        contacts: &dyn ContactProvider,
    ) -> Vec<Candidate> {
        let mut pairs = contacts.active_contacts();
        for pair in pairs.iter_mut() {
            *pair = ordered_pair(pair.0, pair.1);
        }
        pairs.sort_unstable();
        pairs.dedup();

        pairs
            .into_iter()
            .filter(|(a, b)| a != b && !self.is_cooling(*a) && !self.is_cooling(*b))
            .filter_map(|pair| {
                // Bodies without metadata are never candidates
                let tier_a = world.meta(pair.0)?.tier;
                let tier_b = world.meta(pair.1)?.tier;
                if tier_a != tier_b {
                    return None;
                }
                let pa = world.body(pair.0)?.position;
                let pb = world.body(pair.1)?.position;
                let dist_sq = (pa - pb).length_squared();
                dist_sq.is_finite().then_some(Candidate {
                    pair,
                    tier: tier_a,
                    dist_sq,
                })
            })
            .collect()
    }
}
