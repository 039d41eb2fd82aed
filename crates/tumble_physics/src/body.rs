//! Rigid body state

use std::sync::Arc;

use slotmap::new_key_type;
use tumble_math::{Mat3, SpatialVector, Transform, Vec3};

use crate::mass::MassProperties;
use crate::shapes::{BBox, Shape, ShapeError};

// Define generational key type for rigid bodies
new_key_type! {
    /// Key to a rigid body in the physics world
    ///
    /// Uses generational indexing to prevent the ABA problem where a handle
    /// could point to a reused slot. If a body is removed and its slot reused,
    /// old keys will return None instead of pointing to the wrong body.
    pub struct BodyKey;
}

/// Type of rigid body, determining how it participates in physics
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BodyType {
    /// Moved by forces, impulses and the integrator
    #[default]
    Dynamic,
    /// Never moves; infinite mass for contact resolution
    Static,
}

/// A rigid body: one shared shape plus its dynamic state
///
/// Momentum, force and the cached inverse inertia are all in world axes.
/// The angular parts are taken about the centre of mass, which coincides
/// with the body origin for every shape centred on it.
#[derive(Clone, Debug)]
pub struct RigidBody {
    shape: Arc<Shape>,
    pub(crate) pose: Transform,
    body_type: BodyType,
    affected_by_gravity: bool,
    density: f64,
    mass_properties: MassProperties,
    pub(crate) momentum: SpatialVector,
    pub(crate) force: SpatialVector,
    pub(crate) inv_inertia_world: Mat3,
    pub(crate) last_mid_velocity: SpatialVector,
}

impl RigidBody {
    /// Create a dynamic body with density 1, at rest at `pose`
    pub fn new(shape: Arc<Shape>, pose: Transform) -> Result<Self, ShapeError> {
        let mass_properties = shape.mass_properties(1.0)?;
        let mut body = Self {
            shape,
            pose,
            body_type: BodyType::Dynamic,
            affected_by_gravity: true,
            density: 1.0,
            mass_properties,
            momentum: SpatialVector::ZERO,
            force: SpatialVector::ZERO,
            inv_inertia_world: Mat3::ZERO,
            last_mid_velocity: SpatialVector::ZERO,
        };
        body.update_inverse_inertia();
        Ok(body)
    }

    /// Recompute mass properties for a new density
    pub fn with_density(mut self, density: f64) -> Result<Self, ShapeError> {
        self.mass_properties = self.shape.mass_properties(density)?;
        self.density = density;
        self.update_inverse_inertia();
        Ok(self)
    }

    pub fn with_momentum(mut self, momentum: SpatialVector) -> Self {
        if self.is_dynamic() {
            self.momentum = momentum;
        }
        self
    }

    /// Set the momentum that produces `velocity` (linear velocity of the
    /// centre of mass, angular velocity)
    pub fn with_velocity(mut self, velocity: SpatialVector) -> Self {
        if self.is_dynamic() {
            let inertia = self.mass_properties.inertia.rotated_by(&self.pose.rotation);
            self.momentum = SpatialVector::new(
                velocity.linear * self.mass_properties.mass,
                inertia.mul_vec3(velocity.angular),
            );
        }
        self
    }

    /// Set whether this body is affected by gravity
    pub fn with_gravity(mut self, affected: bool) -> Self {
        self.affected_by_gravity = affected;
        self
    }

    /// Set whether this body is static
    pub fn with_static(mut self, is_static: bool) -> Self {
        if is_static {
            self.body_type = BodyType::Static;
            self.affected_by_gravity = false;
            self.momentum = SpatialVector::ZERO;
        } else {
            self.body_type = BodyType::Dynamic;
        }
        self.update_inverse_inertia();
        self
    }

    pub fn shape(&self) -> &Arc<Shape> {
        &self.shape
    }

    pub fn body_type(&self) -> BodyType {
        self.body_type
    }

    pub fn is_static(&self) -> bool {
        self.body_type == BodyType::Static
    }

    pub fn is_dynamic(&self) -> bool {
        self.body_type == BodyType::Dynamic
    }

    pub fn affected_by_gravity(&self) -> bool {
        self.affected_by_gravity
    }

    pub fn density(&self) -> f64 {
        self.density
    }

    /// Object-to-world transform
    pub fn pose(&self) -> &Transform {
        &self.pose
    }

    pub fn position(&self) -> Vec3 {
        self.pose.translation
    }

    pub fn orientation(&self) -> &Mat3 {
        &self.pose.rotation
    }

    /// Shape frame to world
    pub fn shape_to_world(&self) -> Transform {
        self.pose.mul_transform(self.shape.shape_to_body())
    }

    /// Body-frame mass properties
    pub fn mass_properties(&self) -> &MassProperties {
        &self.mass_properties
    }

    pub fn mass(&self) -> f64 {
        self.mass_properties.mass
    }

    pub fn inverse_mass(&self) -> f64 {
        match self.body_type {
            BodyType::Static => 0.0,
            BodyType::Dynamic => self.mass_properties.inverse_mass(),
        }
    }

    /// World-space inverse inertia about the centre of mass
    pub fn inverse_inertia_world(&self) -> &Mat3 {
        &self.inv_inertia_world
    }

    pub fn centre_of_mass(&self) -> Vec3 {
        self.pose.transform_point(self.mass_properties.centre_of_mass)
    }

    pub fn momentum(&self) -> SpatialVector {
        self.momentum
    }

    /// Force and torque accumulated since the last step
    pub fn accumulated_force(&self) -> SpatialVector {
        self.force
    }

    /// Velocity of the centre of mass and angular velocity
    pub fn velocity(&self) -> SpatialVector {
        self.velocity_for(self.momentum)
    }

    /// Velocity produced by `momentum` at the current orientation
    pub(crate) fn velocity_for(&self, momentum: SpatialVector) -> SpatialVector {
        SpatialVector::new(
            momentum.linear * self.inverse_mass(),
            self.inv_inertia_world.mul_vec3(momentum.angular),
        )
    }

    /// Linear velocity of a world-space point moving with the body
    pub fn velocity_at(&self, point: Vec3) -> Vec3 {
        self.velocity().velocity_at(point - self.centre_of_mass())
    }

    /// Mid-step velocity used by the most recent integration step
    pub fn last_mid_velocity(&self) -> SpatialVector {
        self.last_mid_velocity
    }

    pub fn kinetic_energy(&self) -> f64 {
        0.5 * self.velocity().dot(self.momentum)
    }

    pub fn world_bounding_box(&self) -> BBox {
        self.shape.world_bounding_box(&self.shape_to_world())
    }

    /// Add a force and torque about the centre of mass (world axes)
    pub fn apply_force(&mut self, force: SpatialVector) {
        self.force += force;
    }

    /// Add a force acting at a world-space point
    pub fn apply_force_at(&mut self, force: Vec3, point: Vec3) {
        let arm = point - self.centre_of_mass();
        self.force += SpatialVector::new(force, arm.cross(force));
    }

    /// Change momentum instantly; ignored by static bodies
    pub fn apply_impulse(&mut self, impulse: SpatialVector) {
        if self.is_dynamic() {
            self.momentum += impulse;
        }
    }

    /// Apply a linear impulse at a world-space point
    pub fn apply_impulse_at(&mut self, impulse: Vec3, point: Vec3) {
        let arm = point - self.centre_of_mass();
        self.apply_impulse(SpatialVector::new(impulse, arm.cross(impulse)));
    }

    pub fn clear_force(&mut self) {
        self.force = SpatialVector::ZERO;
    }

    /// Teleport the body; momentum is kept in world axes
    pub fn set_pose(&mut self, pose: Transform) {
        self.pose = pose;
        self.update_inverse_inertia();
    }

    /// Place the centre of mass at `com` with orientation `rotation`
    pub(crate) fn set_com_pose(&mut self, rotation: Mat3, com: Vec3) {
        let translation = com - rotation.mul_vec3(self.mass_properties.centre_of_mass);
        self.set_pose(Transform::new(rotation, translation));
    }

    /// Inverse inertia rotated into world axes at `rotation`
    pub(crate) fn inverse_inertia_at(&self, rotation: &Mat3) -> Mat3 {
        match self.body_type {
            BodyType::Static => Mat3::ZERO,
            BodyType::Dynamic => self.mass_properties.inverse_inertia().rotated_by(rotation),
        }
    }

    fn update_inverse_inertia(&mut self) {
        self.inv_inertia_world = self.inverse_inertia_at(&self.pose.rotation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-10;

    fn unit_cube() -> Arc<Shape> {
        Arc::new(Shape::cuboid(Vec3::splat(0.5)).unwrap())
    }

    #[test]
    fn test_new_body_at_rest() {
        let pose = Transform::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let body = RigidBody::new(unit_cube(), pose).unwrap();

        assert_eq!(body.position(), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(body.momentum(), SpatialVector::ZERO);
        assert_eq!(body.velocity(), SpatialVector::ZERO);
        assert_eq!(body.kinetic_energy(), 0.0);
        assert!((body.mass() - 1.0).abs() < EPSILON);
        assert!(body.is_dynamic());
        assert!(body.affected_by_gravity());
    }

    #[test]
    fn test_with_density_scales_mass() {
        let body = RigidBody::new(unit_cube(), Transform::IDENTITY)
            .unwrap()
            .with_density(8.0)
            .unwrap();
        assert!((body.mass() - 8.0).abs() < EPSILON);
        assert!((body.inverse_mass() - 0.125).abs() < EPSILON);

        let err = RigidBody::new(unit_cube(), Transform::IDENTITY)
            .unwrap()
            .with_density(0.0);
        assert!(matches!(err, Err(ShapeError::InvalidDensity(_))));
    }

    #[test]
    fn test_static_body() {
        let body = RigidBody::new(unit_cube(), Transform::IDENTITY)
            .unwrap()
            .with_static(true)
            .with_velocity(SpatialVector::linear(Vec3::X));

        assert!(body.is_static());
        assert!(!body.affected_by_gravity());
        assert_eq!(body.inverse_mass(), 0.0);
        assert_eq!(*body.inverse_inertia_world(), Mat3::ZERO);
        assert_eq!(body.momentum(), SpatialVector::ZERO);
    }

    #[test]
    fn test_velocity_round_trip() {
        let shape = Arc::new(Shape::cuboid(Vec3::new(1.0, 0.5, 0.25)).unwrap());
        let pose = Transform::from_rotation(Mat3::from_axis_angle(Vec3::new(1.0, 1.0, 0.0).normalized(), 0.7));
        let velocity = SpatialVector::new(Vec3::new(1.0, -2.0, 0.5), Vec3::new(0.3, 0.1, -0.4));
        let body = RigidBody::new(shape, pose).unwrap().with_velocity(velocity);

        let v = body.velocity();
        assert!((v.linear - velocity.linear).length() < 1e-9);
        assert!((v.angular - velocity.angular).length() < 1e-9);
    }

    #[test]
    fn test_kinetic_energy() {
        let shape = Arc::new(Shape::sphere(1.0).unwrap());
        let body = RigidBody::new(shape, Transform::IDENTITY)
            .unwrap()
            .with_velocity(SpatialVector::new(Vec3::new(3.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 2.0)));
        let m = body.mass();
        let i = body.mass_properties().inertia.diagonal().z;
        let expected = 0.5 * m * 9.0 + 0.5 * i * 4.0;
        assert!((body.kinetic_energy() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_force_at_point_adds_torque() {
        let mut body = RigidBody::new(unit_cube(), Transform::from_translation(Vec3::new(5.0, 0.0, 0.0))).unwrap();
        body.apply_force_at(Vec3::Y, Vec3::new(6.0, 0.0, 0.0));
        let f = body.accumulated_force();
        assert_eq!(f.linear, Vec3::Y);
        assert_eq!(f.angular, Vec3::Z);

        body.clear_force();
        assert_eq!(body.accumulated_force(), SpatialVector::ZERO);
    }

    #[test]
    fn test_impulse_ignored_by_static_body() {
        let mut body = RigidBody::new(unit_cube(), Transform::IDENTITY)
            .unwrap()
            .with_static(true);
        body.apply_impulse(SpatialVector::linear(Vec3::X));
        assert_eq!(body.momentum(), SpatialVector::ZERO);
    }

    #[test]
    fn test_set_pose_updates_inverse_inertia() {
        let shape = Arc::new(Shape::cuboid(Vec3::new(2.0, 1.0, 1.0)).unwrap());
        let mut body = RigidBody::new(shape, Transform::IDENTITY).unwrap();
        let before = body.inverse_inertia_world().diagonal();

        body.set_pose(Transform::from_rotation(Mat3::from_axis_angle(Vec3::Z, std::f64::consts::FRAC_PI_2)));
        let after = body.inverse_inertia_world().diagonal();
        assert!((after.x - before.y).abs() < 1e-9);
        assert!((after.y - before.x).abs() < 1e-9);
    }

    #[test]
    fn test_velocity_at_point() {
        let body = RigidBody::new(unit_cube(), Transform::IDENTITY)
            .unwrap()
            .with_velocity(SpatialVector::angular(Vec3::Z));
        let v = body.velocity_at(Vec3::X);
        assert!((v - Vec3::Y).length() < 1e-9);
    }
}
