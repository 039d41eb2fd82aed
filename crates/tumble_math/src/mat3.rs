//! 3x3 matrix for rotations and inertia tensors
//!
//! Stored column-major like the rest of the math crate: `x_axis`, `y_axis`
//! and `z_axis` are the images of the basis vectors. For a rotation these are
//! the body axes expressed in world space.

use serde::{Deserialize, Serialize};

use crate::Vec3;

/// 3x3 matrix (column-major)
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Mat3 {
    pub x_axis: Vec3,
    pub y_axis: Vec3,
    pub z_axis: Vec3,
}

impl Default for Mat3 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mat3 {
    pub const IDENTITY: Self = Self {
        x_axis: Vec3::X,
        y_axis: Vec3::Y,
        z_axis: Vec3::Z,
    };

    pub const ZERO: Self = Self {
        x_axis: Vec3::ZERO,
        y_axis: Vec3::ZERO,
        z_axis: Vec3::ZERO,
    };

    /// Build from three column vectors
    #[inline]
    pub const fn from_cols(x_axis: Vec3, y_axis: Vec3, z_axis: Vec3) -> Self {
        Self { x_axis, y_axis, z_axis }
    }

    /// Diagonal matrix
    #[inline]
    pub const fn from_diagonal(d: Vec3) -> Self {
        Self {
            x_axis: Vec3::new(d.x, 0.0, 0.0),
            y_axis: Vec3::new(0.0, d.y, 0.0),
            z_axis: Vec3::new(0.0, 0.0, d.z),
        }
    }

    /// Rotation of `angle` radians about a unit `axis` (Rodrigues' formula)
    pub fn from_axis_angle(axis: Vec3, angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        let t = 1.0 - c;
        let Vec3 { x, y, z } = axis;
        Self::from_cols(
            Vec3::new(t * x * x + c, t * x * y + s * z, t * x * z - s * y),
            Vec3::new(t * x * y - s * z, t * y * y + c, t * y * z + s * x),
            Vec3::new(t * x * z + s * y, t * y * z - s * x, t * z * z + c),
        )
    }

    /// Rotation by a rotation vector (axis scaled by angle)
    ///
    /// Returns identity for a zero vector.
    pub fn from_scaled_axis(v: Vec3) -> Self {
        let angle = v.length();
        if angle > 0.0 {
            Self::from_axis_angle(v / angle, angle)
        } else {
            Self::IDENTITY
        }
    }

    /// Outer product `a bᵀ`
    #[inline]
    pub fn outer(a: Vec3, b: Vec3) -> Self {
        Self::from_cols(a * b.x, a * b.y, a * b.z)
    }

    /// Skew-symmetric cross-product matrix, `skew(a) * b == a × b`
    #[inline]
    pub fn skew(a: Vec3) -> Self {
        Self::from_cols(
            Vec3::new(0.0, a.z, -a.y),
            Vec3::new(-a.z, 0.0, a.x),
            Vec3::new(a.y, -a.x, 0.0),
        )
    }

    /// Column by index
    #[inline]
    pub fn col(&self, i: usize) -> Vec3 {
        match i {
            0 => self.x_axis,
            1 => self.y_axis,
            _ => self.z_axis,
        }
    }

    /// Row by index
    #[inline]
    pub fn row(&self, i: usize) -> Vec3 {
        Vec3::new(self.x_axis.get(i), self.y_axis.get(i), self.z_axis.get(i))
    }

    /// Diagonal entries
    #[inline]
    pub fn diagonal(&self) -> Vec3 {
        Vec3::new(self.x_axis.x, self.y_axis.y, self.z_axis.z)
    }

    #[inline]
    pub fn trace(&self) -> f64 {
        self.x_axis.x + self.y_axis.y + self.z_axis.z
    }

    /// Matrix-vector product `M v`
    #[inline]
    pub fn mul_vec3(&self, v: Vec3) -> Vec3 {
        self.x_axis * v.x + self.y_axis * v.y + self.z_axis * v.z
    }

    /// Transposed product `Mᵀ v` (inverse rotation for orthonormal matrices)
    #[inline]
    pub fn transpose_mul_vec3(&self, v: Vec3) -> Vec3 {
        Vec3::new(self.x_axis.dot(v), self.y_axis.dot(v), self.z_axis.dot(v))
    }

    /// Matrix product `self * other`
    #[inline]
    pub fn mul_mat3(&self, other: &Self) -> Self {
        Self::from_cols(
            self.mul_vec3(other.x_axis),
            self.mul_vec3(other.y_axis),
            self.mul_vec3(other.z_axis),
        )
    }

    pub fn transpose(&self) -> Self {
        Self::from_cols(self.row(0), self.row(1), self.row(2))
    }

    pub fn determinant(&self) -> f64 {
        self.x_axis.dot(self.y_axis.cross(self.z_axis))
    }

    /// General inverse, `None` if the matrix is singular
    pub fn inverse(&self) -> Option<Self> {
        let det = self.determinant();
        if det.abs() < f64::MIN_POSITIVE || !det.is_finite() {
            return None;
        }
        let inv_det = 1.0 / det;
        // Rows of the inverse are the cross products of the columns
        let r0 = self.y_axis.cross(self.z_axis) * inv_det;
        let r1 = self.z_axis.cross(self.x_axis) * inv_det;
        let r2 = self.x_axis.cross(self.y_axis) * inv_det;
        Some(Self::from_cols(r0, r1, r2).transpose())
    }

    /// Similarity transform `R M Rᵀ` (rotates a tensor into another frame)
    #[inline]
    pub fn rotated_by(&self, rotation: &Self) -> Self {
        rotation.mul_mat3(self).mul_mat3(&rotation.transpose())
    }

    /// Re-orthonormalize a rotation matrix that has drifted (Gram-Schmidt)
    ///
    /// The x axis keeps its direction, y is made orthogonal to it, and z is
    /// rebuilt as `x × y` so the result is right-handed.
    pub fn orthonormalized(&self) -> Self {
        let x = self.x_axis.normalized();
        let y = (self.y_axis - x * x.dot(self.y_axis)).normalized();
        let z = x.cross(y);
        Self::from_cols(x, y, z)
    }

    /// Largest deviation of `self * selfᵀ` from identity
    pub fn orthonormality_error(&self) -> f64 {
        let p = self.mul_mat3(&self.transpose());
        let mut err: f64 = 0.0;
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                err = err.max((p.col(j).get(i) - expected).abs());
            }
        }
        err
    }

    /// Whether the matrix equals its transpose within `tolerance`
    pub fn is_symmetric(&self, tolerance: f64) -> bool {
        (self.x_axis.y - self.y_axis.x).abs() <= tolerance
            && (self.x_axis.z - self.z_axis.x).abs() <= tolerance
            && (self.y_axis.z - self.z_axis.y).abs() <= tolerance
    }

    /// Whether all entries are within `tolerance` of `other`
    pub fn abs_diff_eq(&self, other: &Self, tolerance: f64) -> bool {
        (0..3).all(|c| {
            let d = (self.col(c) - other.col(c)).abs();
            d.max_element() <= tolerance
        })
    }
}

impl std::ops::Add for Mat3 {
    type Output = Self;
    #[inline]
    fn add(self, other: Self) -> Self {
        Self::from_cols(
            self.x_axis + other.x_axis,
            self.y_axis + other.y_axis,
            self.z_axis + other.z_axis,
        )
    }
}

impl std::ops::Sub for Mat3 {
    type Output = Self;
    #[inline]
    fn sub(self, other: Self) -> Self {
        Self::from_cols(
            self.x_axis - other.x_axis,
            self.y_axis - other.y_axis,
            self.z_axis - other.z_axis,
        )
    }
}

impl std::ops::Mul<f64> for Mat3 {
    type Output = Self;
    #[inline]
    fn mul(self, s: f64) -> Self {
        Self::from_cols(self.x_axis * s, self.y_axis * s, self.z_axis * s)
    }
}

impl std::ops::Mul<Vec3> for Mat3 {
    type Output = Vec3;
    #[inline]
    fn mul(self, v: Vec3) -> Vec3 {
        self.mul_vec3(v)
    }
}

impl std::ops::Mul for Mat3 {
    type Output = Self;
    #[inline]
    fn mul(self, other: Self) -> Self {
        self.mul_mat3(&other)
    }
}
