//! Contact value type
//!
//! Contacts are expressed in body A's local frame so that two bodies far from
//! the world origin still get full precision for their relative geometry.

use serde::{Deserialize, Serialize};
use tumble_math::{SpatialVector, Transform, Vec3};

use crate::body::BodyKey;
use crate::material::MaterialId;

/// Most points a single contact can carry (the corners of a box face)
pub const MAX_CONTACT_POINTS: usize = 4;

/// Kind of geometric feature touching at a contact
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Feature {
    Vertex,
    Edge,
    Face,
}

/// One point of a contact
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactPoint {
    /// Midway between the two surfaces, in body A's frame
    pub position: Vec3,
    /// Overlap along the normal (positive = penetrating)
    pub penetration: f64,
}

/// A candidate or confirmed contact between two bodies
#[derive(Clone, Debug, PartialEq)]
pub struct Contact {
    pub body_a: BodyKey,
    pub body_b: BodyKey,
    pub feature: Feature,
    points: [ContactPoint; MAX_CONTACT_POINTS],
    point_count: usize,
    /// Unit normal from A towards B, in body A's frame
    pub normal: Vec3,
    /// Deepest penetration over the contact points
    pub penetration: f64,
    pub materials: (MaterialId, MaterialId),
    /// Body B's pose in body A's frame
    pub b_in_a: Transform,
    /// Velocity of B relative to A at the first contact point, in A's frame
    pub relative_velocity: SpatialVector,
    /// Time offset within the step (0 = now, negative = earlier)
    ///
    /// Contacts are only generated at the start of a step, so this is always
    /// zero and the solver does not order rows by it.
    pub time: f64,
}

impl Contact {
    /// Build a contact from at least one point
    ///
    /// Points beyond [`MAX_CONTACT_POINTS`] are dropped.
    pub fn new(
        bodies: (BodyKey, BodyKey),
        feature: Feature,
        normal: Vec3,
        points: &[ContactPoint],
        materials: (MaterialId, MaterialId),
        b_in_a: Transform,
    ) -> Self {
        debug_assert!(!points.is_empty(), "contact needs at least one point");
        let mut stored = [ContactPoint::default(); MAX_CONTACT_POINTS];
        let point_count = points.len().min(MAX_CONTACT_POINTS);
        stored[..point_count].copy_from_slice(&points[..point_count]);
        let penetration = stored[..point_count]
            .iter()
            .map(|p| p.penetration)
            .fold(f64::NEG_INFINITY, f64::max);
        Self {
            body_a: bodies.0,
            body_b: bodies.1,
            feature,
            points: stored,
            point_count,
            normal,
            penetration,
            materials,
            b_in_a,
            relative_velocity: SpatialVector::ZERO,
            time: 0.0,
        }
    }

    pub fn points(&self) -> &[ContactPoint] {
        &self.points[..self.point_count]
    }

    pub fn is_penetrating(&self) -> bool {
        self.penetration > 0.0
    }

    pub fn world_normal(&self, pose_a: &Transform) -> Vec3 {
        pose_a.transform_direction(self.normal)
    }

    pub fn world_points(&self, pose_a: &Transform) -> impl Iterator<Item = Vec3> + '_ {
        let pose = *pose_a;
        self.points().iter().map(move |p| pose.transform_point(p.position))
    }

    /// The same contact seen from body B
    pub fn swapped(&self) -> Self {
        let a_in_b = self.b_in_a.inverse();
        let mut swapped = self.clone();
        swapped.body_a = self.body_b;
        swapped.body_b = self.body_a;
        swapped.materials = (self.materials.1, self.materials.0);
        swapped.normal = -a_in_b.transform_direction(self.normal);
        for p in swapped.points[..self.point_count].iter_mut() {
            p.position = a_in_b.transform_point(p.position);
        }
        swapped.b_in_a = a_in_b;
        swapped.relative_velocity = SpatialVector::new(
            -a_in_b.transform_direction(self.relative_velocity.linear),
            -a_in_b.transform_direction(self.relative_velocity.angular),
        );
        swapped
    }
}
