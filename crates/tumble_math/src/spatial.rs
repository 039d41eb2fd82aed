//! Six-component spatial vectors
//!
//! A spatial vector pairs a linear and an angular 3-vector evaluated at a
//! fixed reference point. The same type carries momentum (linear momentum,
//! angular momentum), force (force, torque) and velocity (linear velocity,
//! angular velocity); which one it holds is given by context.

use serde::{Deserialize, Serialize};

use crate::Vec3;

/// Linear + angular pair (six scalars)
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SpatialVector {
    pub linear: Vec3,
    pub angular: Vec3,
}

impl SpatialVector {
    pub const ZERO: Self = Self {
        linear: Vec3::ZERO,
        angular: Vec3::ZERO,
    };

    #[inline]
    pub const fn new(linear: Vec3, angular: Vec3) -> Self {
        Self { linear, angular }
    }

    /// Pure linear part (force without torque, velocity without spin)
    #[inline]
    pub const fn linear(linear: Vec3) -> Self {
        Self {
            linear,
            angular: Vec3::ZERO,
        }
    }

    /// Pure angular part
    #[inline]
    pub const fn angular(angular: Vec3) -> Self {
        Self {
            linear: Vec3::ZERO,
            angular,
        }
    }

    /// Pairing of a motion vector with a force vector (power, or twice the
    /// kinetic energy for velocity · momentum)
    #[inline]
    pub fn dot(self, other: Self) -> f64 {
        self.linear.dot(other.linear) + self.angular.dot(other.angular)
    }

    /// Move the reference point of a force-like vector by `offset`
    ///
    /// The torque about the new point `q = p + offset` is `τ_p - offset × f`.
    #[inline]
    pub fn shift_force(self, offset: Vec3) -> Self {
        Self {
            linear: self.linear,
            angular: self.angular - offset.cross(self.linear),
        }
    }

    /// Linear velocity of the point at `offset` from the reference point
    #[inline]
    pub fn velocity_at(self, offset: Vec3) -> Vec3 {
        self.linear + self.angular.cross(offset)
    }

    pub fn is_finite(self) -> bool {
        self.linear.is_finite() && self.angular.is_finite()
    }
}

impl std::ops::Add for SpatialVector {
    type Output = Self;
    #[inline]
    fn add(self, other: Self) -> Self {
        Self::new(self.linear + other.linear, self.angular + other.angular)
    }
}

impl std::ops::AddAssign for SpatialVector {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.linear += other.linear;
        self.angular += other.angular;
    }
}

impl std::ops::Sub for SpatialVector {
    type Output = Self;
    #[inline]
    fn sub(self, other: Self) -> Self {
        Self::new(self.linear - other.linear, self.angular - other.angular)
    }
}

impl std::ops::Mul<f64> for SpatialVector {
    type Output = Self;
    #[inline]
    fn mul(self, s: f64) -> Self {
        Self::new(self.linear * s, self.angular * s)
    }
}

impl std::ops::Neg for SpatialVector {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.linear, -self.angular)
    }
}
