//! Contact sources for merge detection
//!
//! `MergeSystem` only asks "which ball pairs are touching?". The world answers
//! from its solver contact list; `ProximityContacts` answers from a distance
//! scan for backends without contact data. Both feed the exact same merge
//! selection code.

use super::body::{BodyPair, ordered_pair};
use super::world::PhysicsWorld;

/// Anything that can list touching ball pairs
pub trait ContactProvider {
    /// Unordered ball pairs currently in contact, as (lower id, higher id)
    fn active_contacts(&self) -> Vec<BodyPair>;
}

impl ContactProvider for PhysicsWorld {
    fn active_contacts(&self) -> Vec<BodyPair> {
        self.contact_pairs().to_vec()
    }
}

/// Distance-based contact scan: `d² ≤ (rA + rB)² · slack`
#[derive(Debug, Clone, Copy)]
pub struct ProximityContacts<'a> {
    world: &'a PhysicsWorld,
    slack: f32,
}

impl<'a> ProximityContacts<'a> {
    pub fn new(world: &'a PhysicsWorld, slack: f32) -> Self {
        Self { world, slack }
    }
}

impl ContactProvider for ProximityContacts<'_> {
    fn active_contacts(&self) -> Vec<BodyPair> {
        let bodies = self.world.bodies();
        let mut pairs = Vec::new();
        for (i, a) in bodies.iter().enumerate() {
            for b in &bodies[i + 1..] {
                let reach = a.radius + b.radius;
                if (a.position - b.position).length_squared() <= reach * reach * self.slack {
                    pairs.push(ordered_pair(a.id, b.id));
                }
            }
        }
        pairs
    }
}
