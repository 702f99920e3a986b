//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (by body ID)
//! - No rendering or platform dependencies

pub mod body;
pub mod collision;
pub mod container;
pub mod contacts;
pub mod merge;
pub mod session;
pub mod spawner;
pub mod world;

pub use body::{BodyId, BodyMeta, BodyPair, RigidBody, SleepState};
pub use collision::{CollisionResult, sphere_ground_collision, sphere_slab_collision, sphere_sphere_collision};
pub use container::{Container, WallSlab};
pub use contacts::{ContactProvider, ProximityContacts};
pub use merge::{MergeEvent, MergeSystem};
pub use session::{AppliedMerge, FrameReport, Session, SessionPhase};
pub use spawner::{Spawner, pick_weighted};
pub use world::PhysicsWorld;
