//! Fixed timestep rigid-body world
//!
//! Spheres under gravity inside the jar. Each `step` advances a bounded
//! number of fixed substeps; every substep runs gravity, contact generation,
//! a sequential-impulse velocity solve (restitution + Coulomb friction),
//! integration, positional projection and sleep bookkeeping.
//!
//! Bodies are kept sorted by id and all pair loops run in index order, so a
//! given sequence of calls always produces the same state.

use std::collections::{BTreeMap, VecDeque};

use glam::{Quat, Vec3};

use super::body::{BodyId, BodyMeta, BodyPair, RigidBody, SleepState, ordered_pair};
use super::collision::{
    CollisionResult, sphere_ground_collision, sphere_slab_collision, sphere_sphere_collision,
};
use super::container::Container;
use crate::tuning::{ConfigError, GameConfig, PhysicsTuning, Tier, TierTable};

/// Penetration left in place by positional projection (keeps resting contacts alive)
const PENETRATION_SLOP: f32 = 0.002;
/// Fraction of the remaining penetration removed per projection pass
const PROJECTION_FACTOR: f32 = 0.8;
/// Approach speed below which contacts do not bounce
const RESTITUTION_THRESHOLD: f32 = 0.2;
/// Extra distance under which removed bodies wake their neighbours
const WAKE_MARGIN: f32 = 0.01;

/// The other side of a contact
#[derive(Debug, Clone, Copy, PartialEq)]
enum Other {
    Body(usize),
    Static,
}

/// A solver contact between body `a` and `other`
#[derive(Debug, Clone)]
struct Contact {
    a: usize,
    other: Other,
    /// Points toward `a`
    normal: Vec3,
    penetration: f32,
    bounce: f32,
    normal_impulse: f32,
    tangent_impulse: Vec3,
}

impl Contact {
    fn new(a: usize, other: Other, result: CollisionResult) -> Self {
        Self {
            a,
            other,
            normal: result.normal,
            penetration: result.penetration,
            bounce: 0.0,
            normal_impulse: 0.0,
            tangent_impulse: Vec3::ZERO,
        }
    }
}

/// Rigid-body simulation owning every ball and its game metadata
#[derive(Debug, Clone)]
pub struct PhysicsWorld {
    tiers: TierTable,
    tuning: PhysicsTuning,
    warn_enter_margin: f32,
    container: Container,
    /// Sorted by id (ids only grow, removal preserves order)
    bodies: Vec<RigidBody>,
    meta: BTreeMap<BodyId, BodyMeta>,
    next_id: u32,
    accumulator: f32,
    time: f64,
    active_contacts: Vec<BodyPair>,
}

impl PhysicsWorld {
    /// Build an empty jar; the config is validated first
    pub fn new(config: &GameConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let container = Container::new(&config.container);
        log::info!(
            "Physics world ready: jar r={:.2} h={:.2}, {} wall slabs, {} tiers",
            container.inner_radius,
            container.height,
            container.walls.len(),
            config.tiers.len()
        );

        Ok(Self {
            tiers: config.tiers.clone(),
            tuning: config.physics.clone(),
            warn_enter_margin: config.session.warn_enter_margin,
            container,
            bodies: Vec::new(),
            meta: BTreeMap::new(),
            next_id: 1,
            accumulator: 0.0,
            time: 0.0,
            active_contacts: Vec::new(),
        })
    }

    /// Advance the simulation by `dt` seconds of wall time
    ///
    /// Runs at most `max_substeps` fixed substeps; time beyond the cap is
    /// dropped (the game slows down instead of spiralling). Returns the
    /// number of substeps taken.
    pub fn step(&mut self, dt: f32) -> u32 {
        if !dt.is_finite() || dt < 0.0 {
            log::warn!("Ignoring invalid physics dt {dt}");
            return 0;
        }

        let fixed = self.tuning.fixed_dt;
        self.accumulator += dt;

        let mut substeps = 0;
        while self.accumulator >= fixed && substeps < self.tuning.max_substeps {
            self.substep(fixed);
            self.accumulator -= fixed;
            substeps += 1;
        }
        // Drop whatever the capped loop could not absorb
        self.accumulator %= fixed;

        if substeps > 0 {
            self.update_warning_flags();
        }
        substeps
    }

    /// Create a ball of `tier` at (x, y, z)
    pub fn add_ball(&mut self, tier: Tier, x: f32, y: f32, z: f32) -> Result<BodyId, ConfigError> {
        let radius = self.tiers.radius(tier).ok_or(ConfigError::UnknownTier(tier))?;
        let mass = crate::sphere_mass(radius, self.tuning.density);

        let id = BodyId(self.next_id);
        self.next_id += 1;

        self.bodies
            .push(RigidBody::new(id, radius, mass, Vec3::new(x, y, z)));
        self.meta.insert(
            id,
            BodyMeta {
                tier,
                born_at: self.time,
                entered_warning_zone: false,
            },
        );
        log::debug!("Added ball {:?} tier {} at ({x:.2}, {y:.2}, {z:.2})", id, tier);
        Ok(id)
    }

    /// Remove a body; the id is invalid afterwards
    ///
    /// Bodies resting on (or transitively touching) the removed one are woken
    /// so piles do not hang in the air.
    pub fn remove_body(&mut self, id: BodyId) -> Option<RigidBody> {
        let index = self.index_of(id)?;
        let body = self.bodies.remove(index);
        self.meta.remove(&id);
        self.active_contacts.retain(|&(a, b)| a != id && b != id);
        self.wake_island(body.position, body.radius);
        log::debug!("Removed ball {:?}", id);
        Some(body)
    }

    /// Overwrite a body's linear velocity (wakes it)
    pub fn set_velocity(&mut self, id: BodyId, velocity: Vec3) -> bool {
        match self.body_mut(id) {
            Some(body) => {
                body.velocity = velocity;
                body.wake();
                true
            }
            None => false,
        }
    }

    pub fn body(&self, id: BodyId) -> Option<&RigidBody> {
        self.index_of(id).map(|i| &self.bodies[i])
    }

    fn body_mut(&mut self, id: BodyId) -> Option<&mut RigidBody> {
        self.index_of(id).map(move |i| &mut self.bodies[i])
    }

    pub fn meta(&self, id: BodyId) -> Option<&BodyMeta> {
        self.meta.get(&id)
    }

    /// Live bodies in ascending id order
    pub fn bodies(&self) -> &[RigidBody] {
        &self.bodies
    }

    /// Live balls paired with their metadata
    pub fn balls(&self) -> impl Iterator<Item = (&RigidBody, &BodyMeta)> {
        self.bodies
            .iter()
            .filter_map(|b| self.meta.get(&b.id).map(|m| (b, m)))
    }

    pub fn ball_count(&self) -> usize {
        self.bodies.len()
    }

    /// Simulated seconds elapsed
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn tiers(&self) -> &TierTable {
        &self.tiers
    }

    /// Ball pairs touching during the most recent substep
    pub fn contact_pairs(&self) -> &[BodyPair] {
        &self.active_contacts
    }

    fn index_of(&self, id: BodyId) -> Option<usize> {
        self.bodies.binary_search_by_key(&id, |b| b.id).ok()
    }

    fn substep(&mut self, h: f32) {
        let gravity = self.tuning.gravity;
        let lin_keep = (1.0 - self.tuning.linear_damping).clamp(0.0, 1.0).powf(h);
        let ang_keep = (1.0 - self.tuning.angular_damping).clamp(0.0, 1.0).powf(h);
        for body in self.bodies.iter_mut().filter(|b| !b.is_asleep()) {
            body.velocity = (body.velocity + gravity * h) * lin_keep;
            body.angular_velocity *= ang_keep;
        }

        let mut contacts = self.detect_contacts();
        self.wake_touched(&contacts);

        self.active_contacts = contacts
            .iter()
            .filter_map(|c| match c.other {
                Other::Body(b) => Some(ordered_pair(self.bodies[c.a].id, self.bodies[b].id)),
                Other::Static => None,
            })
            .collect();
        self.active_contacts.sort_unstable();
        self.active_contacts.dedup();

        let restitution = self.tuning.restitution;
        for contact in contacts.iter_mut() {
            let approach = self.relative_velocity(contact).dot(contact.normal);
            if approach < -RESTITUTION_THRESHOLD {
                contact.bounce = -restitution * approach;
            }
        }
        for _ in 0..self.tuning.solver_iterations {
            for contact in contacts.iter_mut() {
                self.solve_contact(contact);
            }
        }

        for body in self.bodies.iter_mut().filter(|b| !b.is_asleep()) {
            body.position += body.velocity * h;
            let spin = Quat::from_scaled_axis(body.angular_velocity * h);
            body.orientation = (spin * body.orientation).normalize();
        }

        for _ in 0..self.tuning.position_iterations {
            let contacts = self.detect_contacts();
            if contacts.is_empty() {
                break;
            }
            for contact in &contacts {
                self.project_contact(contact);
            }
        }

        self.update_sleep(h);
        self.sanitize();
        self.time += h as f64;
    }

    fn detect_contacts(&self) -> Vec<Contact> {
        let mut contacts = Vec::new();
        for (i, body) in self.bodies.iter().enumerate() {
            if !body.is_asleep() {
                let ground = sphere_ground_collision(body.position, body.radius);
                if ground.hit {
                    contacts.push(Contact::new(i, Other::Static, ground));
                }
                for wall in &self.container.walls {
                    let result = sphere_slab_collision(body.position, body.radius, wall);
                    if result.hit {
                        contacts.push(Contact::new(i, Other::Static, result));
                    }
                }
            }

            for (j, other) in self.bodies.iter().enumerate().skip(i + 1) {
                let result =
                    sphere_sphere_collision(body.position, body.radius, other.position, other.radius);
                if result.hit {
                    contacts.push(Contact::new(i, Other::Body(j), result));
                }
            }
        }
        contacts
    }

    /// Wake sleeping bodies struck by sufficiently fast awake ones
    fn wake_touched(&mut self, contacts: &[Contact]) {
        let limit_sq = 2.0 * self.tuning.sleep_linear * self.tuning.sleep_linear;
        let mut to_wake = Vec::new();
        for contact in contacts {
            let Other::Body(b) = contact.other else {
                continue;
            };
            let (body_a, body_b) = (&self.bodies[contact.a], &self.bodies[b]);
            if body_a.is_asleep() && !body_b.is_asleep() && body_b.speed_squared() >= limit_sq {
                to_wake.push(contact.a);
            }
            if body_b.is_asleep() && !body_a.is_asleep() && body_a.speed_squared() >= limit_sq {
                to_wake.push(b);
            }
        }
        for index in to_wake {
            self.bodies[index].wake();
        }
    }

    /// Wake every body connected through contacts to a sphere at `position`
    fn wake_island(&mut self, position: Vec3, radius: f32) {
        let touches = |p: Vec3, r: f32, body: &RigidBody| {
            let reach = r + body.radius + WAKE_MARGIN;
            (body.position - p).length_squared() <= reach * reach
        };

        let mut queue: VecDeque<usize> = VecDeque::new();
        let mut visited = vec![false; self.bodies.len()];
        for (i, body) in self.bodies.iter().enumerate() {
            if touches(position, radius, body) {
                visited[i] = true;
                queue.push_back(i);
            }
        }
        while let Some(i) = queue.pop_front() {
            let (p, r) = (self.bodies[i].position, self.bodies[i].radius);
            self.bodies[i].wake();
            for (j, body) in self.bodies.iter().enumerate() {
                if !visited[j] && touches(p, r, body) {
                    visited[j] = true;
                    queue.push_back(j);
                }
            }
        }
    }

    /// Velocity of `a` relative to the other side at the contact point
    fn relative_velocity(&self, contact: &Contact) -> Vec3 {
        let a = &self.bodies[contact.a];
        let ra = -contact.normal * a.radius;
        let mut v = a.velocity + a.angular_velocity.cross(ra);
        if let Other::Body(b) = contact.other {
            let b = &self.bodies[b];
            let rb = contact.normal * b.radius;
            v -= b.velocity + b.angular_velocity.cross(rb);
        }
        v
    }

    /// (inverse mass, inverse inertia, lever arm) for both sides
    fn solver_terms(&self, contact: &Contact) -> ((f32, f32, Vec3), (f32, f32, Vec3)) {
        let a = &self.bodies[contact.a];
        let side_a = (
            a.solver_inv_mass(),
            a.solver_inv_inertia(),
            -contact.normal * a.radius,
        );
        let side_b = match contact.other {
            Other::Body(b) => {
                let b = &self.bodies[b];
                (
                    b.solver_inv_mass(),
                    b.solver_inv_inertia(),
                    contact.normal * b.radius,
                )
            }
            Other::Static => (0.0, 0.0, Vec3::ZERO),
        };
        (side_a, side_b)
    }

    fn apply_impulse(&mut self, contact: &Contact, impulse: Vec3) {
        let ((inv_ma, inv_ia, ra), (inv_mb, inv_ib, rb)) = self.solver_terms(contact);
        let a = &mut self.bodies[contact.a];
        a.velocity += impulse * inv_ma;
        a.angular_velocity += ra.cross(impulse) * inv_ia;
        if let Other::Body(b) = contact.other {
            let b = &mut self.bodies[b];
            b.velocity -= impulse * inv_mb;
            b.angular_velocity -= rb.cross(impulse) * inv_ib;
        }
    }

    fn solve_contact(&mut self, contact: &mut Contact) {
        let ((inv_ma, inv_ia, ra), (inv_mb, inv_ib, rb)) = self.solver_terms(contact);
        let k_normal = inv_ma + inv_mb;
        if k_normal <= 0.0 {
            return;
        }
        let n = contact.normal;

        // Normal impulse, accumulated and clamped non-negative
        let vn = self.relative_velocity(contact).dot(n);
        let lambda = (contact.bounce - vn) / k_normal;
        let previous = contact.normal_impulse;
        contact.normal_impulse = (previous + lambda).max(0.0);
        let applied = contact.normal_impulse - previous;
        self.apply_impulse(contact, n * applied);

        // Friction inside the Coulomb disk
        let v = self.relative_velocity(contact);
        let vt = v - n * v.dot(n);
        let k_tangent =
            k_normal + inv_ia * ra.length_squared() + inv_ib * rb.length_squared();
        let previous = contact.tangent_impulse;
        let max_friction = self.tuning.friction * contact.normal_impulse;
        contact.tangent_impulse = (previous - vt / k_tangent).clamp_length_max(max_friction);
        let applied = contact.tangent_impulse - previous;
        self.apply_impulse(contact, applied);
    }

    fn project_contact(&mut self, contact: &Contact) {
        let excess = contact.penetration - PENETRATION_SLOP;
        if excess <= 0.0 {
            return;
        }
        let ((inv_ma, _, _), (inv_mb, _, _)) = self.solver_terms(contact);
        let k = inv_ma + inv_mb;
        if k <= 0.0 {
            return;
        }
        let correction = contact.normal * (excess * PROJECTION_FACTOR / k);
        self.bodies[contact.a].position += correction * inv_ma;
        if let Other::Body(b) = contact.other {
            self.bodies[b].position -= correction * inv_mb;
        }
    }

    fn update_sleep(&mut self, h: f32) {
        let lin_sq = self.tuning.sleep_linear * self.tuning.sleep_linear;
        let ang_sq = self.tuning.sleep_angular * self.tuning.sleep_angular;
        let sleep_time = self.tuning.sleep_time;

        for body in self.bodies.iter_mut() {
            let slow = body.velocity.length_squared() < lin_sq
                && body.angular_velocity.length_squared() < ang_sq;
            body.sleep = match (slow, body.sleep) {
                (_, SleepState::Asleep) => SleepState::Asleep,
                (false, _) => SleepState::Awake,
                (true, SleepState::Awake) => SleepState::Sleepy { for_secs: h },
                (true, SleepState::Sleepy { for_secs }) if for_secs + h >= sleep_time => {
                    body.velocity = Vec3::ZERO;
                    body.angular_velocity = Vec3::ZERO;
                    SleepState::Asleep
                }
                (true, SleepState::Sleepy { for_secs }) => SleepState::Sleepy {
                    for_secs: for_secs + h,
                },
            };
        }
    }

    /// Recover bodies whose state went non-finite (bad input, extreme overlap)
    fn sanitize(&mut self) {
        let respawn = Vec3::new(0.0, self.container.spawn_y, 0.0);
        for body in self.bodies.iter_mut().filter(|b| !b.is_finite()) {
            log::warn!("Ball {:?} went non-finite; resetting its motion", body.id);
            if !body.position.is_finite() {
                body.position = respawn;
            }
            body.velocity = Vec3::ZERO;
            body.angular_velocity = Vec3::ZERO;
            body.wake();
        }
    }

    fn update_warning_flags(&mut self) {
        let line = self.container.warn_y - self.warn_enter_margin;
        for body in &self.bodies {
            if let Some(meta) = self.meta.get_mut(&body.id) {
                if !meta.entered_warning_zone && body.bottom() < line {
                    meta.entered_warning_zone = true;
                }
            }
        }
    }
}
