//! SceneBuilder - Declarative scene construction
//!
//! Provides a fluent API for filling a physics world with a ground and
//! dynamic bodies.

use std::fmt;
use std::sync::Arc;

use tumble_math::{Transform, Vec3};
use tumble_physics::{BodyKey, PhysicsConfig, PhysicsMaterial, PhysicsWorld, RigidBody, Shape, ShapeError};

use crate::config::AppConfig;

/// Vertical gap left between stacked boxes so they settle instead of starting in contact
const STACK_GAP: f64 = 0.01;

/// Error raised while building a scene
#[derive(Debug)]
pub enum SceneError {
    /// A shape or density was rejected
    Shape(ShapeError),
    /// A material name didn't match any preset
    UnknownMaterial(String),
}

impl From<ShapeError> for SceneError {
    fn from(e: ShapeError) -> Self {
        SceneError::Shape(e)
    }
}

impl fmt::Display for SceneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SceneError::Shape(e) => write!(f, "Invalid shape: {}", e),
            SceneError::UnknownMaterial(name) => write!(f, "Unknown material preset: {}", name),
        }
    }
}

impl std::error::Error for SceneError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SceneError::Shape(e) => Some(e),
            SceneError::UnknownMaterial(_) => None,
        }
    }
}

/// A populated world plus handles to the bodies in it
pub struct Scene {
    pub world: PhysicsWorld,
    pub ground: Option<BodyKey>,
    pub dynamic_bodies: Vec<BodyKey>,
}

/// Builder for constructing physics scenes
///
/// # Example
/// ```ignore
/// let scene = SceneBuilder::new()
///     .add_ground(Vec3::new(10.0, 1.0, 10.0), PhysicsMaterial::CONCRETE)?
///     .add_stack(Vec3::ZERO, 3, 0.5, 1.0, PhysicsMaterial::WOOD)?
///     .add_sphere(Vec3::new(2.0, 4.0, 0.0), 0.4, 1.0, PhysicsMaterial::RUBBER)?
///     .build();
/// ```
pub struct SceneBuilder {
    world: PhysicsWorld,
    ground: Option<BodyKey>,
    dynamic_bodies: Vec<BodyKey>,
}

impl SceneBuilder {
    /// Create a new scene builder with the default physics configuration
    pub fn new() -> Self {
        Self::with_physics(PhysicsConfig::default())
    }

    /// Create a scene builder with a custom physics configuration
    pub fn with_physics(config: PhysicsConfig) -> Self {
        Self {
            world: PhysicsWorld::with_config(config),
            ground: None,
            dynamic_bodies: Vec::new(),
        }
    }

    /// Build the demo scene described by the application config
    pub fn from_config(config: &AppConfig) -> Result<Scene, SceneError> {
        let scene = &config.scene;
        let ground_material = material_named(&scene.ground_material)?;
        let body_material = material_named(&scene.body_material)?;

        let mut builder = Self::with_physics(config.physics.to_physics_config())
            .add_ground(Vec3::from_array(scene.ground_half_extents), ground_material)?
            .add_stack(Vec3::ZERO, scene.stack_height, scene.box_half_extent, scene.density, body_material)?;

        // Spheres drop beside the stack, each a little higher than the last
        let offset = 2.0 * (scene.box_half_extent + scene.sphere_radius);
        for i in 0..scene.sphere_count {
            let position = Vec3::new(offset, scene.drop_height + i as f64 * 3.0 * scene.sphere_radius, 0.0);
            builder = builder.add_sphere(position, scene.sphere_radius, scene.density, body_material)?;
        }
        Ok(builder.build())
    }

    /// Add a static ground box whose top face lies at y = 0
    pub fn add_ground(mut self, half_extents: Vec3, material: PhysicsMaterial) -> Result<Self, SceneError> {
        let id = self.world.materials_mut().add(material);
        let shape = Shape::cuboid(half_extents)?.with_material(id);
        let pose = Transform::from_translation(Vec3::new(0.0, -half_extents.y, 0.0));
        let body = RigidBody::new(Arc::new(shape), pose)?.with_static(true);
        self.ground = Some(self.world.add_body(body));
        Ok(self)
    }

    /// Add a dynamic box
    pub fn add_box(
        mut self,
        position: Vec3,
        half_extents: Vec3,
        density: f64,
        material: PhysicsMaterial,
    ) -> Result<Self, SceneError> {
        let id = self.world.materials_mut().add(material);
        let shape = Shape::cuboid(half_extents)?.with_material(id);
        let body = RigidBody::new(Arc::new(shape), Transform::from_translation(position))?.with_density(density)?;
        self.dynamic_bodies.push(self.world.add_body(body));
        Ok(self)
    }

    /// Add a dynamic sphere
    pub fn add_sphere(
        mut self,
        position: Vec3,
        radius: f64,
        density: f64,
        material: PhysicsMaterial,
    ) -> Result<Self, SceneError> {
        let id = self.world.materials_mut().add(material);
        let shape = Shape::sphere(radius)?.with_material(id);
        let body = RigidBody::new(Arc::new(shape), Transform::from_translation(position))?.with_density(density)?;
        self.dynamic_bodies.push(self.world.add_body(body));
        Ok(self)
    }

    /// Add `count` cubes stacked upwards from `base` (the bottom face of the lowest cube)
    pub fn add_stack(
        mut self,
        base: Vec3,
        count: u32,
        half_extent: f64,
        density: f64,
        material: PhysicsMaterial,
    ) -> Result<Self, SceneError> {
        let pitch = 2.0 * half_extent + STACK_GAP;
        for i in 0..count {
            let centre = base + Vec3::new(0.0, half_extent + STACK_GAP + i as f64 * pitch, 0.0);
            self = self.add_box(centre, Vec3::splat(half_extent), density, material)?;
        }
        Ok(self)
    }

    /// Build the scene
    pub fn build(self) -> Scene {
        log::info!(
            "Built scene with {} dynamic bodies{}",
            self.dynamic_bodies.len(),
            if self.ground.is_some() { " on a ground box" } else { "" }
        );
        Scene {
            world: self.world,
            ground: self.ground,
            dynamic_bodies: self.dynamic_bodies,
        }
    }
}

impl Default for SceneBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn material_named(name: &str) -> Result<PhysicsMaterial, SceneError> {
    PhysicsMaterial::preset(name).ok_or_else(|| SceneError::UnknownMaterial(name.to_string()))
}
