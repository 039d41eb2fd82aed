//! Physical material properties for collision response
//!
//! Shapes carry a [`MaterialId`]; the world's [`MaterialTable`] resolves ids
//! to [`PhysicsMaterial`] values when contacts are solved.

use serde::{Deserialize, Serialize};

/// Index of a material in a [`MaterialTable`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MaterialId(pub u16);

impl MaterialId {
    /// The id every shape gets unless told otherwise
    pub const DEFAULT: Self = Self(0);
}

/// Physical material properties for collision response
///
/// Materials define how objects interact during collisions, including
/// friction (how much objects resist sliding) and restitution (bounciness).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhysicsMaterial {
    /// Coulomb friction coefficient (0.0 = ice, 1.0 = rubber)
    pub friction: f64,
    /// Restitution/bounciness (0.0 = no bounce, 1.0 = perfect bounce)
    pub restitution: f64,
}

impl Default for PhysicsMaterial {
    fn default() -> Self {
        Self {
            friction: 0.5,
            restitution: 0.0,
        }
    }
}

impl PhysicsMaterial {
    /// Ice-like material: very low friction, slight bounce
    pub const ICE: Self = Self {
        friction: 0.05,
        restitution: 0.1,
    };

    /// Rubber-like material: high friction, very bouncy
    pub const RUBBER: Self = Self {
        friction: 0.9,
        restitution: 0.8,
    };

    /// Metal-like material: moderate friction and bounce
    pub const METAL: Self = Self {
        friction: 0.3,
        restitution: 0.3,
    };

    /// Wood-like material: moderate friction, low bounce
    pub const WOOD: Self = Self {
        friction: 0.5,
        restitution: 0.2,
    };

    /// Concrete-like material: high friction, very low bounce
    pub const CONCRETE: Self = Self {
        friction: 0.7,
        restitution: 0.1,
    };

    /// Look up a preset by its lowercase name
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "default" => Some(Self::default()),
            "ice" => Some(Self::ICE),
            "rubber" => Some(Self::RUBBER),
            "metal" => Some(Self::METAL),
            "wood" => Some(Self::WOOD),
            "concrete" => Some(Self::CONCRETE),
            _ => None,
        }
    }

    /// Create a new physics material with custom friction and restitution
    ///
    /// Friction is clamped to be non-negative, restitution to [0.0, 1.0].
    pub fn new(friction: f64, restitution: f64) -> Self {
        Self {
            friction: friction.max(0.0),
            restitution: restitution.clamp(0.0, 1.0),
        }
    }

    /// Combine two materials for collision response
    ///
    /// Geometric mean for friction, maximum for restitution.
    pub fn combine(&self, other: &Self) -> Self {
        Self {
            friction: (self.friction * other.friction).sqrt(),
            restitution: self.restitution.max(other.restitution),
        }
    }
}

/// Lookup table from [`MaterialId`] to [`PhysicsMaterial`]
///
/// Unknown ids resolve to the table's default material.
#[derive(Clone, Debug, Default)]
pub struct MaterialTable {
    materials: Vec<PhysicsMaterial>,
    fallback: PhysicsMaterial,
}

impl MaterialTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a material and return its id
    pub fn add(&mut self, material: PhysicsMaterial) -> MaterialId {
        // Id 0 is the fallback slot so user materials start at 1
        if self.materials.is_empty() {
            self.materials.push(self.fallback);
        }
        self.materials.push(material);
        MaterialId((self.materials.len() - 1) as u16)
    }

    /// Replace the material returned for [`MaterialId::DEFAULT`] and unknown ids
    pub fn set_default(&mut self, material: PhysicsMaterial) {
        self.fallback = material;
        if let Some(slot) = self.materials.first_mut() {
            *slot = material;
        }
    }

    pub fn get(&self, id: MaterialId) -> PhysicsMaterial {
        self.materials
            .get(id.0 as usize)
            .copied()
            .unwrap_or(self.fallback)
    }

    /// Combined material for a contact between two surfaces
    pub fn combined(&self, a: MaterialId, b: MaterialId) -> PhysicsMaterial {
        self.get(a).combine(&self.get(b))
    }

    pub fn len(&self) -> usize {
        self.materials.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
