//! Rigid-body physics core for tumble
//!
//! This crate provides:
//! - Immutable collision shapes (box, sphere, triangle) with mass properties
//! - Rigid bodies with spatial momentum and a midpoint integrator
//! - Separating-axis contact generation with a per-pair agent cache
//! - A sequential-impulse contact solver with Coulomb friction
//! - A [`PhysicsWorld`] tying the per-step pipeline together

pub mod agent_cache;
pub mod body;
pub mod collision;
pub mod contact;
pub mod debug_dump;
pub mod integrator;
pub mod mass;
pub mod material;
pub mod shapes;
pub mod solver;
pub mod world;

// Re-export commonly used types
pub use agent_cache::{AgentCache, BodyRef, CacheStats, CollisionAgent, LookupOutcome};
pub use body::{BodyKey, BodyType, RigidBody};
pub use collision::{collide, project_box, project_tri, Projection};
pub use contact::{Contact, ContactPoint, Feature, MAX_CONTACT_POINTS};
pub use debug_dump::{dump_pair, DumpError, PairDump};
pub use integrator::{evolve, Integrator};
pub use mass::MassProperties;
pub use material::{MaterialId, MaterialTable, PhysicsMaterial};
pub use shapes::{BBox, Shape, ShapeError, ShapeFlags, ShapeKind, ShapeType, VertexId};
pub use solver::{ConstraintSolver, SolveStats, SolverConfig};
pub use world::{PhysicsConfig, PhysicsWorld};
