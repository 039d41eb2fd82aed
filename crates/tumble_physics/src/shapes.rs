//! Collision shapes
//!
//! Shapes are immutable value data: once built, their local geometry never
//! changes. Bodies share them through `Arc<Shape>`; "mutating" a shape means
//! building a new one (see [`Shape::shift_centre`]).
//!
//! Every operation matches exhaustively on [`ShapeKind`] rather than going
//! through a trait object.

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use tumble_math::{Transform, Vec3};

use crate::mass::{self, MassProperties};
use crate::material::MaterialId;

/// Directions handed to [`Shape::support_vertex`] on a sphere are snapped to
/// this many steps per unit before use.
pub const SUPPORT_QUANTIZATION: f64 = 1024.0;

bitflags! {
    /// Per-shape behaviour switches
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ShapeFlags: u32 {
        /// Sphere mass is concentrated on the surface (`2/3 m r²`)
        const HOLLOW = 1 << 0;
        /// Shape moves with its body but never generates contacts
        const NO_CONTACT = 1 << 1;
    }
}

/// Axis-aligned bounding box
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BBox {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create a box centered at a position with given half-extents
    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// Tight box around a set of points
    pub fn from_points(points: &[Vec3]) -> Self {
        let mut min = Vec3::splat(f64::INFINITY);
        let mut max = Vec3::splat(f64::NEG_INFINITY);
        for &p in points {
            min = min.min_components(p);
            max = max.max_components(p);
        }
        Self { min, max }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Check if a point is inside or within `tolerance` of the box
    pub fn contains(&self, point: Vec3, tolerance: f64) -> bool {
        point.x >= self.min.x - tolerance
            && point.x <= self.max.x + tolerance
            && point.y >= self.min.y - tolerance
            && point.y <= self.max.y + tolerance
            && point.z >= self.min.z - tolerance
            && point.z <= self.max.z + tolerance
    }

    pub fn overlaps(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Grow every face outward by `margin`
    pub fn expanded(&self, margin: f64) -> Self {
        Self {
            min: self.min - Vec3::splat(margin),
            max: self.max + Vec3::splat(margin),
        }
    }

    /// Axis-aligned box enclosing this box after `transform`
    pub fn transformed(&self, transform: &Transform) -> Self {
        let center = transform.transform_point(self.center());
        let h = self.half_extents();
        let r = &transform.rotation;
        let half = Vec3::new(
            r.row(0).abs().dot(h),
            r.row(1).abs().dot(h),
            r.row(2).abs().dot(h),
        );
        Self::from_center_half_extents(center, half)
    }
}

/// Shape variant ordering used to canonicalize shape pairs
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ShapeType {
    Sphere,
    Box,
    Triangle,
}

/// Geometry of a shape in its own local frame
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum ShapeKind {
    /// Solid box centred on the local origin
    Box { half_extents: Vec3 },
    /// Sphere centred on the local origin
    Sphere { radius: f64 },
    /// Single triangle with explicit vertices
    Triangle { vertices: [Vec3; 3] },
}

impl ShapeKind {
    pub fn shape_type(&self) -> ShapeType {
        match self {
            ShapeKind::Box { .. } => ShapeType::Box,
            ShapeKind::Sphere { .. } => ShapeType::Sphere,
            ShapeKind::Triangle { .. } => ShapeType::Triangle,
        }
    }
}

/// Identifier of a support vertex
///
/// Box: 3-bit mask of negative axes. Triangle: vertex index. Sphere: packed
/// quantized direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VertexId(pub u64);

/// Errors raised while constructing shapes or deriving their mass
#[derive(Clone, Debug, PartialEq)]
pub enum ShapeError {
    /// Box half extents must be finite and positive
    InvalidHalfExtents(Vec3),
    /// Sphere radius must be finite and positive
    InvalidRadius(f64),
    /// Triangle vertices must be finite and span a non-zero area
    DegenerateTriangle,
    /// Density must be finite and positive
    InvalidDensity(f64),
    /// Derived mass came out non-finite or non-positive
    DegenerateMass(f64),
    /// Box and sphere origins are fixed by definition
    ImplicitShapeShift(ShapeType),
}

impl fmt::Display for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShapeError::InvalidHalfExtents(h) => write!(f, "Invalid box half extents: {:?}", h),
            ShapeError::InvalidRadius(r) => write!(f, "Invalid sphere radius: {}", r),
            ShapeError::DegenerateTriangle => write!(f, "Degenerate triangle"),
            ShapeError::InvalidDensity(d) => write!(f, "Invalid density: {}", d),
            ShapeError::DegenerateMass(m) => write!(f, "Degenerate mass: {}", m),
            ShapeError::ImplicitShapeShift(t) => {
                write!(f, "Cannot shift the centre of an implicit {:?} shape", t)
            }
        }
    }
}

impl std::error::Error for ShapeError {}

/// An immutable collision shape
#[derive(Clone, Debug, PartialEq)]
pub struct Shape {
    kind: ShapeKind,
    shape_to_body: Transform,
    material: MaterialId,
    flags: ShapeFlags,
    bbox: BBox,
}

impl Shape {
    /// Create a shape, validating its dimensions
    pub fn new(
        kind: ShapeKind,
        shape_to_body: Transform,
        material: MaterialId,
        flags: ShapeFlags,
    ) -> Result<Self, ShapeError> {
        validate(&kind)?;
        Ok(Self {
            bbox: local_bounding_box(&kind),
            kind,
            shape_to_body,
            material,
            flags,
        })
    }

    /// Box with the given half extents, centred on the body origin
    pub fn cuboid(half_extents: Vec3) -> Result<Self, ShapeError> {
        Self::new(
            ShapeKind::Box { half_extents },
            Transform::IDENTITY,
            MaterialId::DEFAULT,
            ShapeFlags::empty(),
        )
    }

    /// Solid sphere centred on the body origin
    pub fn sphere(radius: f64) -> Result<Self, ShapeError> {
        Self::new(
            ShapeKind::Sphere { radius },
            Transform::IDENTITY,
            MaterialId::DEFAULT,
            ShapeFlags::empty(),
        )
    }

    /// Triangle with vertices in the body frame
    pub fn triangle(a: Vec3, b: Vec3, c: Vec3) -> Result<Self, ShapeError> {
        Self::new(
            ShapeKind::Triangle { vertices: [a, b, c] },
            Transform::IDENTITY,
            MaterialId::DEFAULT,
            ShapeFlags::empty(),
        )
    }

    /// Place the shape within its body
    pub fn with_transform(mut self, shape_to_body: Transform) -> Self {
        self.shape_to_body = shape_to_body;
        self
    }

    pub fn with_material(mut self, material: MaterialId) -> Self {
        self.material = material;
        self
    }

    pub fn with_flags(mut self, flags: ShapeFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn kind(&self) -> &ShapeKind {
        &self.kind
    }

    pub fn shape_type(&self) -> ShapeType {
        self.kind.shape_type()
    }

    pub fn shape_to_body(&self) -> &Transform {
        &self.shape_to_body
    }

    pub fn material(&self) -> MaterialId {
        self.material
    }

    pub fn flags(&self) -> ShapeFlags {
        self.flags
    }

    /// Exact axis-aligned bounds in the shape's local frame
    pub fn bounding_box(&self) -> BBox {
        self.bbox
    }

    /// World-space bounds given the shape-to-world transform
    pub fn world_bounding_box(&self, shape_to_world: &Transform) -> BBox {
        match self.kind {
            // Rotation doesn't change a sphere's extent
            ShapeKind::Sphere { radius } => {
                BBox::from_center_half_extents(shape_to_world.translation, Vec3::splat(radius))
            }
            ShapeKind::Triangle { vertices } => BBox::from_points(&vertices.map(|v| shape_to_world.transform_point(v))),
            ShapeKind::Box { .. } => self.bbox.transformed(shape_to_world),
        }
    }

    /// Mass properties in the body frame for a uniform `density`
    ///
    /// Triangles are thin shells, so `density` is per unit area for them.
    pub fn mass_properties(&self, density: f64) -> Result<MassProperties, ShapeError> {
        if !(density.is_finite() && density > 0.0) {
            return Err(ShapeError::InvalidDensity(density));
        }
        let local = match &self.kind {
            ShapeKind::Box { half_extents } => mass::box_properties(*half_extents, density),
            ShapeKind::Sphere { radius } => {
                mass::sphere_properties(*radius, density, self.flags.contains(ShapeFlags::HOLLOW))
            }
            ShapeKind::Triangle { vertices } => mass::triangle_properties(vertices, density),
        };
        if !(local.mass.is_finite() && local.mass > 0.0) {
            return Err(ShapeError::DegenerateMass(local.mass));
        }
        Ok(local.transformed(&self.shape_to_body))
    }

    /// Point of the shape furthest along `direction` (shape-local frame)
    pub fn support_vertex(&self, direction: Vec3) -> (Vec3, VertexId) {
        match &self.kind {
            ShapeKind::Box { half_extents } => {
                let mut id = 0u64;
                if direction.x < 0.0 {
                    id |= 1;
                }
                if direction.y < 0.0 {
                    id |= 2;
                }
                if direction.z < 0.0 {
                    id |= 4;
                }
                (half_extents.component_mul(direction.sign()), VertexId(id))
            }
            ShapeKind::Sphere { radius } => {
                let (dir, id) = quantize_direction(direction);
                (dir * *radius, id)
            }
            ShapeKind::Triangle { vertices } => {
                let mut best = 0;
                let mut best_dot = vertices[0].dot(direction);
                for (i, v) in vertices.iter().enumerate().skip(1) {
                    let d = v.dot(direction);
                    // Strict comparison: ties go to the lower index
                    if d > best_dot {
                        best = i;
                        best_dot = d;
                    }
                }
                (vertices[best], VertexId(best as u64))
            }
        }
    }

    /// Distance from `point` to the shape surface and the closest surface
    /// point (shape-local frame)
    ///
    /// Points inside a solid box or sphere measure to the nearest surface,
    /// so the distance is never negative.
    pub fn closest_point(&self, point: Vec3) -> (f64, Vec3) {
        match &self.kind {
            ShapeKind::Box { half_extents } => closest_point_on_box(*half_extents, point),
            ShapeKind::Sphere { radius } => {
                let dist = point.length();
                if dist > 0.0 {
                    ((dist - radius).abs(), point * (radius / dist))
                } else {
                    (*radius, Vec3::new(*radius, 0.0, 0.0))
                }
            }
            ShapeKind::Triangle { vertices } => {
                let closest = closest_point_on_triangle(point, vertices);
                ((point - closest).length(), closest)
            }
        }
    }

    /// New shape whose local origin sits at `shift` in the old local frame
    ///
    /// Only shapes with explicit vertex data can move their origin; a
    /// non-zero shift on a box or sphere is an error.
    pub fn shift_centre(&self, shift: Vec3) -> Result<Self, ShapeError> {
        match &self.kind {
            ShapeKind::Triangle { vertices } => {
                let kind = ShapeKind::Triangle {
                    vertices: vertices.map(|v| v - shift),
                };
                Ok(Self {
                    bbox: local_bounding_box(&kind),
                    kind,
                    ..self.clone()
                })
            }
            ShapeKind::Box { .. } | ShapeKind::Sphere { .. } => {
                if shift == Vec3::ZERO {
                    Ok(self.clone())
                } else {
                    Err(ShapeError::ImplicitShapeShift(self.shape_type()))
                }
            }
        }
    }
}

fn validate(kind: &ShapeKind) -> Result<(), ShapeError> {
    match kind {
        ShapeKind::Box { half_extents } => {
            let h = *half_extents;
            if !(h.is_finite() && h.x > 0.0 && h.y > 0.0 && h.z > 0.0) {
                return Err(ShapeError::InvalidHalfExtents(h));
            }
        }
        ShapeKind::Sphere { radius } => {
            if !(radius.is_finite() && *radius > 0.0) {
                return Err(ShapeError::InvalidRadius(*radius));
            }
        }
        ShapeKind::Triangle { vertices } => {
            let [a, b, c] = *vertices;
            let finite = vertices.iter().all(|v| v.is_finite());
            let scale = (b - a).length_squared().max((c - a).length_squared());
            let twice_area = (b - a).cross(c - a).length();
            if !finite || twice_area <= scale * 1e-12 {
                return Err(ShapeError::DegenerateTriangle);
            }
        }
    }
    Ok(())
}

fn local_bounding_box(kind: &ShapeKind) -> BBox {
    match kind {
        ShapeKind::Box { half_extents } => BBox::from_center_half_extents(Vec3::ZERO, *half_extents),
        ShapeKind::Sphere { radius } => BBox::from_center_half_extents(Vec3::ZERO, Vec3::splat(*radius)),
        ShapeKind::Triangle { vertices } => BBox::from_points(vertices),
    }
}

/// Snap a direction to the quantization lattice and normalize it
///
/// Nearby directions produce the same support point, which keeps iterative
/// algorithms from chasing sub-lattice jitter on a smooth surface.
fn quantize_direction(direction: Vec3) -> (Vec3, VertexId) {
    let unit = direction.normalized();
    let q = |c: f64| (c * SUPPORT_QUANTIZATION).round();
    let (qx, qy, qz) = (q(unit.x), q(unit.y), q(unit.z));
    let snapped = Vec3::new(qx, qy, qz).normalized();
    if snapped == Vec3::ZERO {
        return (Vec3::X, VertexId(0));
    }
    // Each lattice coordinate lies in [-Q, Q]; offset into 12 unsigned bits
    let pack = |c: f64| (c + SUPPORT_QUANTIZATION) as u64 & 0xFFF;
    let id = pack(qx) | (pack(qy) << 12) | (pack(qz) << 24);
    (snapped, VertexId(id))
}

fn closest_point_on_box(half_extents: Vec3, point: Vec3) -> (f64, Vec3) {
    let clamped = point.clamp_components(-half_extents, half_extents);
    if clamped != point {
        return ((point - clamped).length(), clamped);
    }

    // Inside: push out through the nearest face
    let gap = half_extents - point.abs();
    let mut axis = 0;
    for i in 1..3 {
        if gap.get(i) < gap.get(axis) {
            axis = i;
        }
    }
    let mut closest = point.to_array();
    let h = half_extents.get(axis);
    closest[axis] = if point.get(axis) >= 0.0 { h } else { -h };
    (gap.get(axis), Vec3::from_array(closest))
}

/// Closest point on a triangle (Ericson, Real-Time Collision Detection 5.1.5)
pub(crate) fn closest_point_on_triangle(p: Vec3, tri: &[Vec3; 3]) -> Vec3 {
    let [a, b, c] = *tri;
    let ab = b - a;
    let ac = c - a;
    let ap = p - a;
    let d1 = ab.dot(ap);
    let d2 = ac.dot(ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return a;
    }

    let bp = p - b;
    let d3 = ab.dot(bp);
    let d4 = ac.dot(bp);
    if d3 >= 0.0 && d4 <= d3 {
        return b;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return a + ab * v;
    }

    let cp = p - c;
    let d5 = ab.dot(cp);
    let d6 = ac.dot(cp);
    if d6 >= 0.0 && d5 <= d6 {
        return c;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return a + ac * w;
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return b + (c - b) * w;
    }

    let denom = 1.0 / (va + vb + vc);
    let v = vb * denom;
    let w = vc * denom;
    a + ab * v + ac * w
}
