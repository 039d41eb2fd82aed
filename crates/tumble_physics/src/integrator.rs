//! Midpoint time integration of rigid body pose and momentum

use serde::{Deserialize, Serialize};
use tumble_math::{Mat3, SpatialVector};

use crate::body::RigidBody;

/// Relative tolerance (per second of step) for the kinetic energy check
pub const ENERGY_TOLERANCE: f64 = 0.5;

/// Advances bodies with a midpoint rule
///
/// The mid-step inverse inertia is refined `refinement_iterations` times by
/// rotating the body half a step with the current angular velocity estimate.
/// One pass is usually enough; zero uses the start-of-step inertia.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Integrator {
    pub refinement_iterations: u32,
}

impl Default for Integrator {
    fn default() -> Self {
        Self {
            refinement_iterations: 1,
        }
    }
}

impl Integrator {
    pub fn new(refinement_iterations: u32) -> Self {
        Self {
            refinement_iterations,
        }
    }

    /// Advance `body` by `dt`, consuming its accumulated force
    ///
    /// Negative `dt` runs the step backwards.
    pub fn evolve(&self, body: &mut RigidBody, dt: f64) {
        if body.is_static() {
            body.clear_force();
            body.last_mid_velocity = SpatialVector::ZERO;
            return;
        }

        let force = body.force;
        let h0 = body.momentum;
        let h_mid = h0 + force * (0.5 * dt);
        let r0 = body.pose.rotation;

        let mut inv_inertia = body.inv_inertia_world;
        for _ in 0..self.refinement_iterations {
            let omega = inv_inertia.mul_vec3(h_mid.angular);
            let half_step = Mat3::from_scaled_axis(omega * (0.5 * dt)).mul_mat3(&r0);
            inv_inertia = body.inverse_inertia_at(&half_step);
        }

        let v_mid = SpatialVector::new(
            h_mid.linear * body.inverse_mass(),
            inv_inertia.mul_vec3(h_mid.angular),
        );
        let com = body.centre_of_mass() + v_mid.linear * dt;
        let rotation = Mat3::from_scaled_axis(v_mid.angular * dt).mul_mat3(&r0);
        let h1 = h0 + force * dt;

        // Checked before orthonormalizing, which perturbs the energy itself
        if cfg!(debug_assertions) {
            let ke0 = 0.5 * body.velocity_for(h0).dot(h0);
            let inv_inertia_1 = body.inverse_inertia_at(&rotation);
            let v1 = SpatialVector::new(h1.linear * body.inverse_mass(), inv_inertia_1.mul_vec3(h1.angular));
            let ke1 = 0.5 * v1.dot(h1);
            let work = v_mid.dot(force) * dt;
            let scale = (ke0.abs() + ke1.abs() + work.abs()) * (1.0 + v_mid.angular.length());
            let error = (ke1 - ke0 - work).abs();
            debug_assert!(
                error <= ENERGY_TOLERANCE * dt.abs() * scale + 1e-9,
                "kinetic energy drift {} exceeds tolerance (ke0 {}, ke1 {}, work {}, dt {})",
                error,
                ke0,
                ke1,
                work,
                dt
            );
        }

        body.set_com_pose(rotation.orthonormalized(), com);
        body.momentum = h1;
        body.clear_force();
        body.last_mid_velocity = v_mid;
    }
}

/// Advance `body` with the default single-refinement integrator
pub fn evolve(body: &mut RigidBody, dt: f64) {
    Integrator::default().evolve(body, dt);
}
