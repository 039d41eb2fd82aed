//! Sequential-impulse contact solver
//!
//! Every contact point contributes one non-penetration row and two friction
//! rows. A row only knows the two bodies it couples and their Jacobian
//! coefficients; no system matrix is ever assembled. Rows are swept in a
//! fixed order (Gauss-Seidel) until the impulse change per sweep drops below
//! the tolerance or the iteration budget runs out.
//!
//! The rows act on mid-step velocities (momentum plus half of this step's
//! accumulated force), which is the velocity the integrator moves bodies
//! with. The accumulated impulses are added to the bodies' momenta.

use serde::{Deserialize, Serialize};
use slotmap::{SecondaryMap, SlotMap};
use tumble_math::{Mat3, SpatialVector, Vec3};

use crate::body::{BodyKey, RigidBody};
use crate::contact::Contact;
use crate::material::MaterialTable;

/// Solver tuning
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Maximum Gauss-Seidel sweeps per step
    pub iterations: usize,
    /// Summed impulse change per sweep below which the solve stops early
    pub tolerance: f64,
    /// Fraction of penetration removed per step
    pub baumgarte: f64,
    /// Penetration left uncorrected to keep resting contacts stable
    pub slop: f64,
    /// Approach speed above which restitution applies
    pub restitution_threshold: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            iterations: 20,
            tolerance: 1e-6,
            baumgarte: 0.2,
            slop: 0.005,
            restitution_threshold: 1.0,
        }
    }
}

/// Summary of one solve
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolveStats {
    pub rows: usize,
    pub iterations: usize,
    /// Summed impulse change in the final sweep
    pub residual: f64,
    pub converged: bool,
}

impl Default for SolveStats {
    fn default() -> Self {
        Self {
            rows: 0,
            iterations: 0,
            residual: 0.0,
            converged: true,
        }
    }
}

/// Velocity state of one body while solving
#[derive(Clone, Debug)]
struct SolverBody {
    key: BodyKey,
    inv_mass: f64,
    inv_inertia: Mat3,
    centre_of_mass: Vec3,
    velocity: SpatialVector,
    impulse: SpatialVector,
}

impl SolverBody {
    fn apply(&mut self, linear: Vec3, angular: Vec3, lambda: f64) {
        self.velocity.linear += linear * (self.inv_mass * lambda);
        self.velocity.angular += self.inv_inertia.mul_vec3(angular * lambda);
        self.impulse += SpatialVector::new(linear * lambda, angular * lambda);
    }
}

/// One scalar velocity constraint between two bodies
#[derive(Clone, Debug)]
struct ConstraintRow {
    body_a: usize,
    body_b: usize,
    linear_a: Vec3,
    angular_a: Vec3,
    linear_b: Vec3,
    angular_b: Vec3,
    effective_mass: f64,
    /// Relative velocity along the row the solver drives towards
    target: f64,
    impulse: f64,
    /// For friction rows: the normal row bounding this one and the
    /// friction coefficient
    friction: Option<(usize, f64)>,
}

impl ConstraintRow {
    fn new(bodies: &[SolverBody], body_a: usize, body_b: usize, point: Vec3, direction: Vec3) -> Self {
        let arm_a = point - bodies[body_a].centre_of_mass;
        let arm_b = point - bodies[body_b].centre_of_mass;
        let linear_a = -direction;
        let angular_a = -arm_a.cross(direction);
        let linear_b = direction;
        let angular_b = arm_b.cross(direction);

        let (a, b) = (&bodies[body_a], &bodies[body_b]);
        let k = a.inv_mass * linear_a.length_squared()
            + angular_a.dot(a.inv_inertia.mul_vec3(angular_a))
            + b.inv_mass * linear_b.length_squared()
            + angular_b.dot(b.inv_inertia.mul_vec3(angular_b));
        let effective_mass = if k > f64::EPSILON { 1.0 / k } else { 0.0 };

        Self {
            body_a,
            body_b,
            linear_a,
            angular_a,
            linear_b,
            angular_b,
            effective_mass,
            target: 0.0,
            impulse: 0.0,
            friction: None,
        }
    }

    /// Current relative velocity along the row
    fn velocity(&self, bodies: &[SolverBody]) -> f64 {
        let (a, b) = (&bodies[self.body_a], &bodies[self.body_b]);
        self.linear_a.dot(a.velocity.linear)
            + self.angular_a.dot(a.velocity.angular)
            + self.linear_b.dot(b.velocity.linear)
            + self.angular_b.dot(b.velocity.angular)
    }
}

/// Resolves a contact set into body impulses
#[derive(Clone, Copy, Debug, Default)]
pub struct ConstraintSolver {
    pub config: SolverConfig,
}

impl ConstraintSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    /// Solve `contacts` for a step of length `dt` and add the resulting
    /// impulses to the bodies' momenta
    ///
    /// Contacts naming a body that no longer exists are skipped. Running out
    /// of iterations is not an error; the partial result is applied.
    pub fn solve(
        &self,
        bodies: &mut SlotMap<BodyKey, RigidBody>,
        contacts: &[Contact],
        materials: &MaterialTable,
        dt: f64,
    ) -> SolveStats {
        if contacts.is_empty() || dt <= 0.0 {
            return SolveStats::default();
        }

        let mut index: SecondaryMap<BodyKey, usize> = SecondaryMap::new();
        let mut solver_bodies: Vec<SolverBody> = Vec::new();
        let mut rows: Vec<ConstraintRow> = Vec::new();

        for contact in contacts {
            let (Some(body_a), Some(body_b)) = (bodies.get(contact.body_a), bodies.get(contact.body_b)) else {
                log::warn!("Skipping contact with a removed body");
                continue;
            };
            let ia = solver_body(&mut index, &mut solver_bodies, contact.body_a, body_a, dt);
            let ib = solver_body(&mut index, &mut solver_bodies, contact.body_b, body_b, dt);

            let pose_a = *body_a.pose();
            let normal = contact.world_normal(&pose_a);
            let material = materials.combined(contact.materials.0, contact.materials.1);
            let (tangent_1, tangent_2) = normal.orthonormal_pair();

            for point in contact.points() {
                let position = pose_a.transform_point(point.position);
                let mut row = ConstraintRow::new(&solver_bodies, ia, ib, position, normal);

                let approach = row.velocity(&solver_bodies);
                let depth = point.penetration;
                row.target = if depth < 0.0 {
                    // Speculative: the gap may close but not invert this step
                    depth / dt
                } else {
                    self.config.baumgarte * (depth - self.config.slop).max(0.0) / dt
                };
                let closes_this_step = -approach * dt >= (-depth).max(0.0);
                let bouncing = material.restitution > 0.0 && -approach > self.config.restitution_threshold;
                if bouncing && closes_this_step {
                    row.target = row.target.max(-material.restitution * approach);
                }
                let normal_row = rows.len();
                rows.push(row);

                for tangent in [tangent_1, tangent_2] {
                    let mut row = ConstraintRow::new(&solver_bodies, ia, ib, position, tangent);
                    row.friction = Some((normal_row, material.friction));
                    rows.push(row);
                }
            }
        }

        let mut stats = SolveStats {
            rows: rows.len(),
            iterations: 0,
            residual: 0.0,
            converged: false,
        };

        for sweep in 0..self.config.iterations {
            let mut residual = 0.0;
            for i in 0..rows.len() {
                let (lower, upper) = match rows[i].friction {
                    Some((normal_row, mu)) => {
                        let limit = mu * rows[normal_row].impulse;
                        (-limit, limit)
                    }
                    None => (0.0, f64::INFINITY),
                };

                let row = &mut rows[i];
                let error = row.target - row.velocity(&solver_bodies);
                let accumulated = (row.impulse + error * row.effective_mass).clamp(lower, upper);
                let delta = accumulated - row.impulse;
                row.impulse = accumulated;

                solver_bodies[row.body_a].apply(row.linear_a, row.angular_a, delta);
                solver_bodies[row.body_b].apply(row.linear_b, row.angular_b, delta);
                residual += delta.abs();
            }

            stats.iterations = sweep + 1;
            stats.residual = residual;
            if residual <= self.config.tolerance {
                stats.converged = true;
                break;
            }
        }

        if !stats.converged {
            log::debug!(
                "Contact solve stopped after {} sweeps over {} rows (residual {:.3e})",
                stats.iterations,
                stats.rows,
                stats.residual
            );
        }

        for solved in &solver_bodies {
            if let Some(body) = bodies.get_mut(solved.key) {
                body.apply_impulse(solved.impulse);
            }
        }
        stats
    }
}

/// Index of `key`'s solver state, creating it on first use
fn solver_body(
    index: &mut SecondaryMap<BodyKey, usize>,
    solver_bodies: &mut Vec<SolverBody>,
    key: BodyKey,
    body: &RigidBody,
    dt: f64,
) -> usize {
    if let Some(&i) = index.get(key) {
        return i;
    }
    let mid_momentum = body.momentum() + body.accumulated_force() * (0.5 * dt);
    let velocity = if body.is_static() {
        SpatialVector::ZERO
    } else {
        body.velocity_for(mid_momentum)
    };
    solver_bodies.push(SolverBody {
        key,
        inv_mass: body.inverse_mass(),
        inv_inertia: *body.inverse_inertia_world(),
        centre_of_mass: body.centre_of_mass(),
        velocity,
        impulse: SpatialVector::ZERO,
    });
    let i = solver_bodies.len() - 1;
    index.insert(key, i);
    i
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_cache::CollisionAgent;
    use crate::collision::collide;
    use crate::material::PhysicsMaterial;
    use crate::shapes::Shape;
    use std::sync::Arc;
    use tumble_math::Transform;

    const DT: f64 = 1.0 / 60.0;

    fn sphere(bodies: &mut SlotMap<BodyKey, RigidBody>, x: f64, vx: f64) -> BodyKey {
        let body = RigidBody::new(Arc::new(Shape::sphere(1.0).unwrap()), Transform::from_translation(Vec3::new(x, 0.0, 0.0)))
            .unwrap()
            .with_velocity(SpatialVector::linear(Vec3::new(vx, 0.0, 0.0)));
        bodies.insert(body)
    }

    fn contact_between(bodies: &SlotMap<BodyKey, RigidBody>, a: BodyKey, b: BodyKey) -> Contact {
        let (ba, bb) = (&bodies[a], &bodies[b]);
        let mut agent = CollisionAgent::new((a, b), 1);
        collide(ba.shape(), ba.pose(), bb.shape(), bb.pose(), 0.2, &mut agent).unwrap()
    }

    fn total_momentum(bodies: &SlotMap<BodyKey, RigidBody>) -> Vec3 {
        bodies.values().map(|b| b.momentum().linear).fold(Vec3::ZERO, |acc, p| acc + p)
    }

    #[test]
    fn test_empty_contact_set() {
        let mut bodies = SlotMap::with_key();
        let stats = ConstraintSolver::default().solve(&mut bodies, &[], &MaterialTable::new(), DT);
        assert_eq!(stats, SolveStats::default());
    }

    #[test]
    fn test_inelastic_head_on() {
        let mut bodies = SlotMap::with_key();
        let a = sphere(&mut bodies, 0.0, 1.0);
        let b = sphere(&mut bodies, 2.0, 0.0);
        let contact = contact_between(&bodies, a, b);
        let before = total_momentum(&bodies);

        let stats = ConstraintSolver::default().solve(&mut bodies, &[contact], &MaterialTable::new(), DT);
        assert!(stats.converged);
        assert_eq!(stats.rows, 3);

        let va = bodies[a].velocity().linear;
        let vb = bodies[b].velocity().linear;
        assert!((va.x - 0.5).abs() < 1e-9);
        assert!((vb.x - 0.5).abs() < 1e-9);
        assert!((total_momentum(&bodies) - before).length() < 1e-9);
    }

    #[test]
    fn test_elastic_exchange() {
        let mut bodies = SlotMap::with_key();
        let a = sphere(&mut bodies, 0.0, 2.0);
        let b = sphere(&mut bodies, 2.0, 0.0);
        let mut materials = MaterialTable::new();
        materials.set_default(PhysicsMaterial::new(0.0, 1.0));
        let contact = contact_between(&bodies, a, b);

        ConstraintSolver::default().solve(&mut bodies, &[contact], &materials, DT);
        assert!(bodies[a].velocity().linear.x.abs() < 1e-9);
        assert!((bodies[b].velocity().linear.x - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_speculative_gap_gives_no_impulse() {
        let mut bodies = SlotMap::with_key();
        let a = sphere(&mut bodies, 0.0, 1.0);
        let b = sphere(&mut bodies, 2.1, 0.0);
        let contact = contact_between(&bodies, a, b);
        assert!(contact.penetration < 0.0);

        let stats = ConstraintSolver::default().solve(&mut bodies, &[contact], &MaterialTable::new(), DT);
        assert!(stats.converged);
        assert_eq!(stats.iterations, 1);
        assert_eq!(bodies[a].velocity().linear, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(bodies[b].velocity().linear, Vec3::ZERO);
    }

    #[test]
    fn test_speculative_gap_limits_closing_speed() {
        let mut bodies = SlotMap::with_key();
        let a = sphere(&mut bodies, 0.0, 20.0);
        let b = sphere(&mut bodies, 2.1, 0.0);
        let contact = contact_between(&bodies, a, b);

        ConstraintSolver::default().solve(&mut bodies, &[contact], &MaterialTable::new(), DT);
        let closing = bodies[a].velocity().linear.x - bodies[b].velocity().linear.x;
        assert!((closing - 0.1 / DT).abs() < 1e-9);
    }

    #[test]
    fn test_static_body_is_unmoved() {
        let mut bodies = SlotMap::with_key();
        let ground = bodies.insert(
            RigidBody::new(Arc::new(Shape::cuboid(Vec3::new(5.0, 1.0, 5.0)).unwrap()), Transform::IDENTITY)
                .unwrap()
                .with_static(true),
        );
        let ball = bodies.insert(
            RigidBody::new(Arc::new(Shape::sphere(0.5).unwrap()), Transform::from_translation(Vec3::new(0.0, 1.5, 0.0)))
                .unwrap()
                .with_velocity(SpatialVector::linear(Vec3::new(0.0, -3.0, 0.0))),
        );
        let contact = contact_between(&bodies, ball, ground);

        ConstraintSolver::default().solve(&mut bodies, &[contact], &MaterialTable::new(), DT);
        assert_eq!(bodies[ground].momentum(), SpatialVector::ZERO);
        assert!(bodies[ball].velocity().linear.y.abs() < 1e-9);
    }

    #[test]
    fn test_friction_is_coulomb_bounded() {
        let mut bodies = SlotMap::with_key();
        let ground = bodies.insert(
            RigidBody::new(Arc::new(Shape::cuboid(Vec3::new(5.0, 1.0, 5.0)).unwrap()), Transform::IDENTITY)
                .unwrap()
                .with_static(true),
        );
        let ball = bodies.insert(
            RigidBody::new(Arc::new(Shape::sphere(0.5).unwrap()), Transform::from_translation(Vec3::new(0.0, 1.5, 0.0)))
                .unwrap()
                .with_velocity(SpatialVector::linear(Vec3::new(4.0, -1.0, 0.0))),
        );
        let mut materials = MaterialTable::new();
        materials.set_default(PhysicsMaterial::new(0.2, 0.0));
        let contact = contact_between(&bodies, ball, ground);
        let before = bodies[ball].momentum();

        ConstraintSolver::default().solve(&mut bodies, &[contact], &materials, DT);
        let impulse = bodies[ball].momentum() - before;
        // Normal impulse stops the fall; friction can take at most mu times that
        let normal = impulse.linear.y;
        assert!(normal > 0.0);
        assert!(impulse.linear.x < 0.0);
        assert!(impulse.linear.x.abs() <= 0.2 * normal + 1e-9);
    }
}
