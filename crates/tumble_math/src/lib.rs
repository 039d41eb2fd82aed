//! 3D Mathematics Library
//!
//! This crate provides the vector, matrix and transform types used by the
//! tumble physics core. All scalars are `f64`.
//!
//! ## Core Types
//!
//! - [`Vec3`] - 3D vector with x, y, z components
//! - [`Mat3`] - 3x3 matrix for rotations and inertia tensors
//! - [`Transform`] - Rigid transform (rotation + translation)
//! - [`SpatialVector`] - Linear + angular pair for momentum, force and velocity

mod vec3;
mod mat3;
mod spatial;
pub mod transform;

pub use vec3::Vec3;
pub use mat3::Mat3;
pub use spatial::SpatialVector;
pub use transform::Transform;
