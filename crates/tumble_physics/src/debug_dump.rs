//! Human-readable snapshots of a body pair for offline inspection
//!
//! The output is RON describing both shapes, their poses, B's pose in A's
//! frame and the contact between them, if any. Nothing reads it back at
//! runtime.

use std::fmt;

use serde::{Deserialize, Serialize};
use tumble_math::{Transform, Vec3};

use crate::body::{BodyKey, RigidBody};
use crate::contact::{Contact, ContactPoint, Feature};
use crate::material::MaterialId;
use crate::shapes::ShapeKind;

/// One body of a dumped pair
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BodyDump {
    pub shape: ShapeKind,
    pub shape_to_body: Transform,
    pub material: MaterialId,
    pub flags: u32,
    pub pose: Transform,
    pub is_static: bool,
}

impl BodyDump {
    fn from_body(body: &RigidBody) -> Self {
        let shape = body.shape();
        Self {
            shape: *shape.kind(),
            shape_to_body: *shape.shape_to_body(),
            material: shape.material(),
            flags: shape.flags().bits(),
            pose: *body.pose(),
            is_static: body.is_static(),
        }
    }
}

/// Contact geometry in body A's frame
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContactDump {
    pub feature: Feature,
    pub normal: Vec3,
    pub penetration: f64,
    pub points: Vec<ContactPoint>,
}

impl From<&Contact> for ContactDump {
    fn from(contact: &Contact) -> Self {
        Self {
            feature: contact.feature,
            normal: contact.normal,
            penetration: contact.penetration,
            points: contact.points().to_vec(),
        }
    }
}

/// A body pair and their contact
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PairDump {
    pub body_a: BodyDump,
    pub body_b: BodyDump,
    pub b_in_a: Transform,
    pub contact: Option<ContactDump>,
}

/// Error type for debug dumps
#[derive(Debug)]
pub enum DumpError {
    /// The key does not name a body in the world
    MissingBody(BodyKey),
    /// RON serialization failed
    Serialize(ron::Error),
}

impl From<ron::Error> for DumpError {
    fn from(e: ron::Error) -> Self {
        DumpError::Serialize(e)
    }
}

impl fmt::Display for DumpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DumpError::MissingBody(key) => write!(f, "No body for key {:?}", key),
            DumpError::Serialize(e) => write!(f, "Serialize error: {}", e),
        }
    }
}

impl std::error::Error for DumpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DumpError::MissingBody(_) => None,
            DumpError::Serialize(e) => Some(e),
        }
    }
}

/// Describe two bodies and their contact as pretty RON
pub fn dump_pair(a: &RigidBody, b: &RigidBody, contact: Option<&Contact>) -> Result<String, DumpError> {
    let dump = PairDump {
        body_a: BodyDump::from_body(a),
        body_b: BodyDump::from_body(b),
        b_in_a: a.pose().inverse_mul(b.pose()),
        contact: contact.map(ContactDump::from),
    };
    let pretty = ron::ser::PrettyConfig::new()
        .struct_names(true)
        .enumerate_arrays(false);
    Ok(ron::ser::to_string_pretty(&dump, pretty)?)
}
