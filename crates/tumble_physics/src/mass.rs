//! Mass properties derived from a shape and a density

use tumble_math::{Mat3, Transform, Vec3};

/// Mass, centre of mass and inertia tensor of a body
///
/// The inertia tensor is taken about the centre of mass, in the axes of the
/// frame the properties are expressed in (body frame once attached to a
/// [`RigidBody`](crate::RigidBody)).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MassProperties {
    pub mass: f64,
    pub centre_of_mass: Vec3,
    pub inertia: Mat3,
}

impl MassProperties {
    pub fn new(mass: f64, centre_of_mass: Vec3, inertia: Mat3) -> Self {
        Self {
            mass,
            centre_of_mass,
            inertia,
        }
    }

    /// Properties of an immovable body: infinite mass, no rotation
    pub fn infinite() -> Self {
        Self {
            mass: f64::INFINITY,
            centre_of_mass: Vec3::ZERO,
            inertia: Mat3::ZERO,
        }
    }

    pub fn is_infinite(&self) -> bool {
        self.mass.is_infinite()
    }

    pub fn inverse_mass(&self) -> f64 {
        if self.mass.is_finite() && self.mass > 0.0 {
            1.0 / self.mass
        } else {
            0.0
        }
    }

    /// Inverse inertia tensor, zero for infinite or singular inertia
    pub fn inverse_inertia(&self) -> Mat3 {
        if self.is_infinite() {
            return Mat3::ZERO;
        }
        self.inertia.inverse().unwrap_or(Mat3::ZERO)
    }

    /// Re-express these properties through `transform` (shape → body)
    pub fn transformed(&self, transform: &Transform) -> Self {
        Self {
            mass: self.mass,
            centre_of_mass: transform.transform_point(self.centre_of_mass),
            inertia: self.inertia.rotated_by(&transform.rotation),
        }
    }

    /// Symmetric with every principal minor non-negative (within a tolerance
    /// scaled to the tensor's magnitude)
    pub fn is_positive_semi_definite(&self) -> bool {
        let m = &self.inertia;
        let scale = m.trace().abs().max(f64::MIN_POSITIVE);
        let tol = scale * 1e-9;
        if !m.is_symmetric(tol) {
            return false;
        }
        let a = |r: usize, c: usize| m.col(c).get(r);
        let diagonal_ok = (0..3).all(|i| a(i, i) >= -tol);
        let minors_ok = [(0, 1), (0, 2), (1, 2)]
            .iter()
            .all(|&(i, j)| a(i, i) * a(j, j) - a(i, j) * a(j, i) >= -tol * scale);
        diagonal_ok && minors_ok && m.determinant() >= -tol * scale * scale
    }
}

/// Solid box with half extents `h`
pub(crate) fn box_properties(half_extents: Vec3, density: f64) -> MassProperties {
    let size = half_extents * 2.0;
    let mass = density * size.x * size.y * size.z;
    let sq = size.component_mul(size);
    let inertia = Mat3::from_diagonal(Vec3::new(sq.y + sq.z, sq.x + sq.z, sq.x + sq.y) * (mass / 12.0));
    MassProperties::new(mass, Vec3::ZERO, inertia)
}

/// Sphere of radius `r`; a hollow sphere keeps the enclosed-volume mass but
/// has all of it on the surface
pub(crate) fn sphere_properties(radius: f64, density: f64, hollow: bool) -> MassProperties {
    let mass = density * 4.0 / 3.0 * std::f64::consts::PI * radius.powi(3);
    let factor = if hollow { 2.0 / 3.0 } else { 2.0 / 5.0 };
    let inertia = Mat3::from_diagonal(Vec3::splat(factor * mass * radius * radius));
    MassProperties::new(mass, Vec3::ZERO, inertia)
}

/// Thin-shell triangle: surface density times area, inertia from the vertex
/// second moments, moved to the centroid with the parallel-axis theorem
pub(crate) fn triangle_properties(vertices: &[Vec3; 3], density: f64) -> MassProperties {
    let [a, b, c] = *vertices;
    let area = 0.5 * (b - a).cross(c - a).length();
    let mass = density * area;
    let sum = a + b + c;
    let centroid = sum / 3.0;

    // ∫ x xᵀ dA over the triangle, about the local origin
    let second_moment = (Mat3::outer(a, a) + Mat3::outer(b, b) + Mat3::outer(c, c) + Mat3::outer(sum, sum))
        * (density * area / 12.0);
    let about_origin = Mat3::IDENTITY * second_moment.trace() - second_moment;
    let shift = Mat3::IDENTITY * centroid.length_squared() - Mat3::outer(centroid, centroid);
    let inertia = about_origin - shift * mass;

    MassProperties::new(mass, centroid, inertia)
}
