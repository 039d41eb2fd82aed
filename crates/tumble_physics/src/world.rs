//! Physics world and simulation

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use tumble_math::{SpatialVector, Transform, Vec3};

use crate::agent_cache::{AgentCache, BodyRef, CollisionAgent};
use crate::body::{BodyKey, RigidBody};
use crate::collision::collide;
use crate::contact::Contact;
use crate::debug_dump::{dump_pair, DumpError};
use crate::integrator::Integrator;
use crate::material::MaterialTable;
use crate::shapes::ShapeFlags;
use crate::solver::{ConstraintSolver, SolveStats, SolverConfig};

/// Configuration for the physics simulation
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Gravity acceleration applied to bodies with gravity enabled
    pub gravity: Vec3,
    /// Gap below which contacts are generated ahead of touching
    pub contact_margin: f64,
    /// Number of slots in the collision agent cache
    pub agent_cache_capacity: usize,
    /// Mid-step inertia refinement passes in the integrator
    pub refinement_iterations: u32,
    pub solver: SolverConfig,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.81, 0.0),
            contact_margin: 0.2,
            agent_cache_capacity: 256,
            refinement_iterations: 1,
            solver: SolverConfig::default(),
        }
    }
}

impl PhysicsConfig {
    /// Create a new physics config with the given gravity
    pub fn new(gravity: Vec3) -> Self {
        Self {
            gravity,
            ..Default::default()
        }
    }
}

/// The physics world containing all rigid bodies
///
/// Each call to [`PhysicsWorld::step`] runs contact detection through the
/// agent cache, solves the contacts and then integrates every body.
pub struct PhysicsWorld {
    /// All rigid bodies in the world (using generational keys)
    bodies: SlotMap<BodyKey, RigidBody>,
    materials: MaterialTable,
    agent_cache: AgentCache,
    integrator: Integrator,
    solver: ConstraintSolver,
    /// Contacts generated by the last step
    contacts: Vec<Contact>,
    last_solve: SolveStats,
    frame: u64,
    config: PhysicsConfig,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsWorld {
    /// Create a new physics world with default configuration
    pub fn new() -> Self {
        Self::with_config(PhysicsConfig::default())
    }

    /// Create a new physics world with custom configuration
    pub fn with_config(config: PhysicsConfig) -> Self {
        Self {
            bodies: SlotMap::with_key(),
            materials: MaterialTable::new(),
            agent_cache: AgentCache::new(config.agent_cache_capacity),
            integrator: Integrator::new(config.refinement_iterations),
            solver: ConstraintSolver::new(config.solver),
            contacts: Vec::new(),
            last_solve: SolveStats::default(),
            frame: 0,
            config,
        }
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// Add a body to the world and return its key
    pub fn add_body(&mut self, body: RigidBody) -> BodyKey {
        self.bodies.insert(body)
    }

    /// Remove a body from the world and return it
    ///
    /// Any cached collision state referring to the body is dropped.
    pub fn remove_body(&mut self, key: BodyKey) -> Option<RigidBody> {
        let body = self.bodies.remove(key)?;
        self.agent_cache.invalidate(key);
        self.contacts.retain(|c| c.body_a != key && c.body_b != key);
        Some(body)
    }

    /// Get an immutable reference to a body by key
    pub fn get_body(&self, key: BodyKey) -> Option<&RigidBody> {
        self.bodies.get(key)
    }

    /// Get a mutable reference to a body by key
    pub fn get_body_mut(&mut self, key: BodyKey) -> Option<&mut RigidBody> {
        self.bodies.get_mut(key)
    }

    /// Get the number of bodies in the world
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Iterate over all body keys
    pub fn body_keys(&self) -> impl Iterator<Item = BodyKey> + '_ {
        self.bodies.keys()
    }

    /// Accumulate a force and torque on a body for the next step
    pub fn apply_force(&mut self, key: BodyKey, force: SpatialVector) {
        match self.bodies.get_mut(key) {
            Some(body) => body.apply_force(force),
            None => log::warn!("Ignoring force applied to missing body {:?}", key),
        }
    }

    pub fn pose(&self, key: BodyKey) -> Option<Transform> {
        self.bodies.get(key).map(|b| *b.pose())
    }

    pub fn velocity(&self, key: BodyKey) -> Option<SpatialVector> {
        self.bodies.get(key).map(RigidBody::velocity)
    }

    pub fn kinetic_energy(&self, key: BodyKey) -> Option<f64> {
        self.bodies.get(key).map(RigidBody::kinetic_energy)
    }

    /// Contacts generated by the most recent step
    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    pub fn last_solve(&self) -> SolveStats {
        self.last_solve
    }

    /// Number of completed steps
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn materials(&self) -> &MaterialTable {
        &self.materials
    }

    pub fn materials_mut(&mut self) -> &mut MaterialTable {
        &mut self.materials
    }

    pub fn agent_cache(&self) -> &AgentCache {
        &self.agent_cache
    }

    /// Step the physics simulation forward by dt seconds
    ///
    /// This performs:
    /// 1. Gravity accumulation on dynamic bodies with gravity enabled
    /// 2. Contact detection for every pair whose bounding boxes overlap
    /// 3. Contact resolution into body momenta
    /// 4. Integration of every body
    pub fn step(&mut self, dt: f64) {
        if !dt.is_finite() || dt == 0.0 {
            log::warn!("Ignoring physics step with dt = {}", dt);
            return;
        }
        self.frame += 1;

        // Phase 1: Gravity
        let gravity = self.config.gravity;
        for body in self.bodies.values_mut() {
            if body.is_dynamic() && body.affected_by_gravity() {
                let weight = gravity * body.mass();
                body.apply_force(SpatialVector::linear(weight));
            }
        }

        // Phase 2: Detection
        self.detect_contacts();

        // Phase 3: Resolution
        self.last_solve = self.solver.solve(&mut self.bodies, &self.contacts, &self.materials, dt);

        // Phase 4: Integration
        for body in self.bodies.values_mut() {
            self.integrator.evolve(body, dt);
        }

        log::trace!(
            "Frame {}: {} bodies, {} contacts, {} solver sweeps",
            self.frame,
            self.bodies.len(),
            self.contacts.len(),
            self.last_solve.iterations
        );
    }

    /// Run the broad and narrow phase, replacing the contact list
    fn detect_contacts(&mut self) {
        self.contacts.clear();
        let margin = self.config.contact_margin;
        let candidates: Vec<(BodyKey, _)> = self
            .bodies
            .iter()
            .filter(|(_, body)| !body.shape().flags().contains(ShapeFlags::NO_CONTACT))
            .map(|(key, body)| (key, body.world_bounding_box().expanded(margin)))
            .collect();

        for (i, &(key_i, bbox_i)) in candidates.iter().enumerate() {
            for &(key_j, bbox_j) in &candidates[i + 1..] {
                let (body_i, body_j) = (&self.bodies[key_i], &self.bodies[key_j]);
                if (body_i.is_static() && body_j.is_static()) || !bbox_i.overlaps(&bbox_j) {
                    continue;
                }

                let (agent, _) = self.agent_cache.get_agent(
                    BodyRef::new(key_i, body_i.shape().shape_type()),
                    BodyRef::new(key_j, body_j.shape().shape_type()),
                    self.frame,
                );
                let (a, b) = if agent.pair.0 == key_i { (body_i, body_j) } else { (body_j, body_i) };

                if let Some(mut contact) = collide(a.shape(), a.pose(), b.shape(), b.pose(), margin, agent) {
                    contact.relative_velocity = relative_velocity(a, b, &contact);
                    self.contacts.push(contact);
                }
            }
        }
    }

    /// Serialize two bodies and their current contact for offline inspection
    ///
    /// Uses a throwaway agent so the cache is left untouched.
    pub fn debug_dump(&self, a: BodyKey, b: BodyKey) -> Result<String, DumpError> {
        let body_a = self.bodies.get(a).ok_or(DumpError::MissingBody(a))?;
        let body_b = self.bodies.get(b).ok_or(DumpError::MissingBody(b))?;
        let mut agent = CollisionAgent::new((a, b), self.frame);
        let contact = collide(
            body_a.shape(),
            body_a.pose(),
            body_b.shape(),
            body_b.pose(),
            self.config.contact_margin,
            &mut agent,
        );
        dump_pair(body_a, body_b, contact.as_ref())
    }
}

/// Velocity of B relative to A at the first contact point, in A's frame
fn relative_velocity(a: &RigidBody, b: &RigidBody, contact: &Contact) -> SpatialVector {
    let pose_a = a.pose();
    let Some(point) = contact.world_points(pose_a).next() else {
        return SpatialVector::ZERO;
    };
    let linear = b.velocity_at(point) - a.velocity_at(point);
    let angular = b.velocity().angular - a.velocity().angular;
    SpatialVector::new(
        pose_a.inverse_transform_direction(linear),
        pose_a.inverse_transform_direction(angular),
    )
}
