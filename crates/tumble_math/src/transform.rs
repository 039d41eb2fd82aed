//! Rigid transform (rotation + translation)
//!
//! A `Transform` maps points from an object's local frame into its parent
//! frame ("object-to-world" when the parent is the world). There is no scale:
//! physics shapes carry their dimensions explicitly.

use serde::{Deserialize, Serialize};

use crate::{Mat3, Vec3};

/// A rigid transform: `p_parent = rotation * p_local + translation`
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// Orthonormal rotation; columns are the local axes in parent space
    pub rotation: Mat3,
    /// Position of the local origin in parent space
    pub translation: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        rotation: Mat3::IDENTITY,
        translation: Vec3::ZERO,
    };

    /// Create a transform from rotation and translation
    pub const fn new(rotation: Mat3, translation: Vec3) -> Self {
        Self { rotation, translation }
    }

    /// Create a transform with just a translation
    pub const fn from_translation(translation: Vec3) -> Self {
        Self {
            rotation: Mat3::IDENTITY,
            translation,
        }
    }

    /// Create a transform with just a rotation
    pub const fn from_rotation(rotation: Mat3) -> Self {
        Self {
            rotation,
            translation: Vec3::ZERO,
        }
    }

    /// Transform a point from local space to parent space
    #[inline]
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        self.rotation.mul_vec3(p) + self.translation
    }

    /// Transform a direction from local space to parent space (no translation)
    #[inline]
    pub fn transform_direction(&self, d: Vec3) -> Vec3 {
        self.rotation.mul_vec3(d)
    }

    /// Transform a point from parent space back into local space
    #[inline]
    pub fn inverse_transform_point(&self, p: Vec3) -> Vec3 {
        self.rotation.transpose_mul_vec3(p - self.translation)
    }

    /// Transform a direction from parent space back into local space
    #[inline]
    pub fn inverse_transform_direction(&self, d: Vec3) -> Vec3 {
        self.rotation.transpose_mul_vec3(d)
    }

    /// Compute the inverse transform
    pub fn inverse(&self) -> Self {
        let inv_rotation = self.rotation.transpose();
        Self {
            rotation: inv_rotation,
            translation: -inv_rotation.mul_vec3(self.translation),
        }
    }

    /// Compose transforms: `(self * other)(p) == self(other(p))`
    pub fn mul_transform(&self, other: &Self) -> Self {
        Self {
            rotation: self.rotation.mul_mat3(&other.rotation),
            translation: self.transform_point(other.translation),
        }
    }

    /// `self⁻¹ * other`: `other` expressed in this transform's local frame
    ///
    /// Computed without forming the inverse so large world translations
    /// cancel before they are rotated.
    pub fn inverse_mul(&self, other: &Self) -> Self {
        Self {
            rotation: self.rotation.transpose().mul_mat3(&other.rotation),
            translation: self.inverse_transform_point(other.translation),
        }
    }

    /// Whether rotation and translation are within `tolerance` of `other`
    pub fn abs_diff_eq(&self, other: &Self, tolerance: f64) -> bool {
        self.rotation.abs_diff_eq(&other.rotation, tolerance)
            && (self.translation - other.translation).abs().max_element() <= tolerance
    }
}

impl std::ops::Mul for Transform {
    type Output = Self;
    #[inline]
    fn mul(self, other: Self) -> Self {
        self.mul_transform(&other)
    }
}
