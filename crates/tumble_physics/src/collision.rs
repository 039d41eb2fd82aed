//! Narrow-phase collision detection
//!
//! Pairs involving a sphere are solved with closest-point queries. Box and
//! triangle pairs use the separating-axis test: every face normal and every
//! edge-edge cross product is a candidate axis, and the axis of greatest
//! separation wins. When that separation is within the contact margin the
//! extremal features of both shapes along the axis (found with
//! [`project_box`] / [`project_tri`]) are clipped against each other to give
//! up to [`MAX_CONTACT_POINTS`] points.
//!
//! All geometry is worked in shape A's frame and converted to body A's frame
//! on the way out.

use tumble_math::{Transform, Vec3};

use crate::agent_cache::CollisionAgent;
use crate::body::BodyKey;
use crate::contact::{Contact, ContactPoint, Feature, MAX_CONTACT_POINTS};
use crate::shapes::{closest_point_on_triangle, Shape, ShapeKind};

/// Cosine below which a box axis counts as perpendicular to the projection
/// axis, and the relative spread under which triangle vertices tie
pub const FEATURE_TOLERANCE: f64 = 1e-2;

/// Allowed deviation of `|axis|²` from one
const UNIT_TOLERANCE: f64 = 1e-6;

/// Edge pairs closer to parallel than this give no candidate axis
const PARALLEL_EPSILON: f64 = 1e-6;

/// Edge axes must beat face axes by this much to be chosen
const EDGE_PREFERENCE: f64 = 1e-6;

/// Result of projecting a shape onto an axis
///
/// `point` is the extremal point along the axis (averaged over tied
/// vertices) and `distance` is `axis · point`, so projecting `point` again
/// reproduces `distance`. Both are measured from the origin of the frame the
/// shape was given in, not from the shape's centre: for a box the signed
/// distance from its centre is `distance - axis · centre`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projection {
    pub distance: f64,
    pub point: Vec3,
    pub feature: Feature,
    free_axes: [Vec3; 2],
    free_count: usize,
    vertices: [Vec3; 4],
    vertex_count: usize,
}

impl Projection {
    /// Half-extent vectors spanning the extremal edge or face
    pub fn free_axes(&self) -> &[Vec3] {
        &self.free_axes[..self.free_count]
    }

    /// Vertices of the extremal feature, in polygon order
    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices[..self.vertex_count]
    }
}

fn feature_for(free_count: usize) -> Feature {
    match free_count {
        0 => Feature::Vertex,
        1 => Feature::Edge,
        _ => Feature::Face,
    }
}

/// Project an oriented box onto a unit `axis`
///
/// `centre` and `radii` (the box's half-extent vectors) are in a shared
/// working frame, and the result is absolute in that frame. A radius nearly perpendicular
/// to `axis` is a free direction of the extremal feature (up to two), every
/// other radius is pushed to the side `axis` points to.
pub fn project_box(centre: Vec3, radii: &[Vec3; 3], axis: Vec3) -> Projection {
    debug_assert!(axis.is_unit(UNIT_TOLERANCE), "projection axis {:?} is not unit length", axis);

    let mut point = centre;
    let mut free_axes = [Vec3::ZERO; 2];
    let mut free_count = 0;
    for &r in radii {
        let c = axis.dot(r);
        if free_count < 2 && c.abs() <= FEATURE_TOLERANCE * r.length() {
            free_axes[free_count] = r;
            free_count += 1;
        } else if c >= 0.0 {
            point += r;
        } else {
            point -= r;
        }
    }

    let mut vertices = [point; 4];
    let vertex_count = match free_count {
        0 => 1,
        1 => {
            vertices[0] = point - free_axes[0];
            vertices[1] = point + free_axes[0];
            2
        }
        _ => {
            let (f, g) = (free_axes[0], free_axes[1]);
            vertices = [point + f + g, point - f + g, point - f - g, point + f - g];
            4
        }
    };

    Projection {
        distance: axis.dot(point),
        point,
        feature: feature_for(free_count),
        free_axes,
        free_count,
        vertices,
        vertex_count,
    }
}

/// Project a triangle onto a unit `axis`
///
/// Vertices within a tolerance of the maximum tie; the extremal point is the
/// average of the tied vertices.
pub fn project_tri(vertices: &[Vec3; 3], axis: Vec3) -> Projection {
    debug_assert!(axis.is_unit(UNIT_TOLERANCE), "projection axis {:?} is not unit length", axis);

    let [a, b, c] = *vertices;
    let dots = vertices.map(|v| axis.dot(v));
    let max = dots[0].max(dots[1]).max(dots[2]);
    let scale = (b - a).length().max((c - b).length()).max((a - c).length());
    let tolerance = FEATURE_TOLERANCE * scale;

    let mut tied = [Vec3::ZERO; 4];
    let mut count = 0;
    for (v, d) in vertices.iter().zip(dots) {
        if d >= max - tolerance {
            tied[count] = *v;
            count += 1;
        }
    }

    let mut sum = Vec3::ZERO;
    for v in &tied[..count] {
        sum += *v;
    }
    let point = sum / count as f64;

    let mut free_axes = [Vec3::ZERO; 2];
    for i in 1..count {
        free_axes[i - 1] = (tied[i] - tied[0]) * 0.5;
    }
    let free_count = count - 1;

    Projection {
        distance: axis.dot(point),
        point,
        feature: feature_for(free_count),
        free_axes,
        free_count,
        vertices: tied,
        vertex_count: count,
    }
}

/// A shape placed in the working frame
#[derive(Clone, Copy, Debug)]
enum Posed {
    Sphere { centre: Vec3, radius: f64 },
    Box { centre: Vec3, radii: [Vec3; 3] },
    Triangle { vertices: [Vec3; 3] },
}

impl Posed {
    fn new(kind: &ShapeKind, to_frame: &Transform) -> Self {
        match *kind {
            ShapeKind::Sphere { radius } => Posed::Sphere {
                centre: to_frame.translation,
                radius,
            },
            ShapeKind::Box { half_extents } => {
                let r = &to_frame.rotation;
                Posed::Box {
                    centre: to_frame.translation,
                    radii: [
                        r.col(0) * half_extents.x,
                        r.col(1) * half_extents.y,
                        r.col(2) * half_extents.z,
                    ],
                }
            }
            ShapeKind::Triangle { vertices } => Posed::Triangle {
                vertices: vertices.map(|v| to_frame.transform_point(v)),
            },
        }
    }

    /// `(min, max)` of the shape projected on `axis`
    fn interval(&self, axis: Vec3) -> (f64, f64) {
        match self {
            Posed::Sphere { centre, radius } => {
                let c = axis.dot(*centre);
                (c - radius, c + radius)
            }
            Posed::Box { centre, radii } => {
                let c = axis.dot(*centre);
                let extent: f64 = radii.iter().map(|r| axis.dot(*r).abs()).sum();
                (c - extent, c + extent)
            }
            Posed::Triangle { vertices } => {
                let d = vertices.map(|v| axis.dot(v));
                (d[0].min(d[1]).min(d[2]), d[0].max(d[1]).max(d[2]))
            }
        }
    }

    fn project(&self, axis: Vec3) -> Projection {
        match self {
            Posed::Sphere { centre, radius } => {
                let point = *centre + axis * *radius;
                Projection {
                    distance: axis.dot(point),
                    point,
                    feature: Feature::Vertex,
                    free_axes: [Vec3::ZERO; 2],
                    free_count: 0,
                    vertices: [point; 4],
                    vertex_count: 1,
                }
            }
            Posed::Box { centre, radii } => project_box(*centre, radii, axis),
            Posed::Triangle { vertices } => project_tri(vertices, axis),
        }
    }

    fn face_normals(&self) -> ([Vec3; 3], usize) {
        match self {
            Posed::Sphere { .. } => ([Vec3::ZERO; 3], 0),
            Posed::Box { radii, .. } => (radii.map(|r| r.normalized()), 3),
            Posed::Triangle { vertices } => {
                let [a, b, c] = *vertices;
                ([(b - a).cross(c - a).normalized(), Vec3::ZERO, Vec3::ZERO], 1)
            }
        }
    }

    fn edge_directions(&self) -> ([Vec3; 3], usize) {
        match self {
            Posed::Sphere { .. } => ([Vec3::ZERO; 3], 0),
            Posed::Box { radii, .. } => (radii.map(|r| r.normalized()), 3),
            Posed::Triangle { vertices } => {
                let [a, b, c] = *vertices;
                ([(b - a).normalized(), (c - b).normalized(), (a - c).normalized()], 3)
            }
        }
    }
}

/// Signed gap between two shapes along an axis oriented from A to B
#[derive(Clone, Copy, Debug)]
struct Separation {
    axis: Vec3,
    distance: f64,
}

/// Gap along `axis`, choosing whichever orientation separates more
fn separation_along(a: &Posed, b: &Posed, axis: Vec3) -> Separation {
    let (a_min, a_max) = a.interval(axis);
    let (b_min, b_max) = b.interval(axis);
    let forward = b_min - a_max;
    let backward = a_min - b_max;
    if forward >= backward {
        Separation { axis, distance: forward }
    } else {
        Separation {
            axis: -axis,
            distance: backward,
        }
    }
}

/// Candidate axis with the greatest separation (least penetration)
fn greatest_separation(a: &Posed, b: &Posed) -> Separation {
    let mut best = Separation {
        axis: Vec3::X,
        distance: f64::NEG_INFINITY,
    };

    let (faces_a, count_a) = a.face_normals();
    let (faces_b, count_b) = b.face_normals();
    for &axis in faces_a[..count_a].iter().chain(&faces_b[..count_b]) {
        let candidate = separation_along(a, b, axis);
        if candidate.distance > best.distance {
            best = candidate;
        }
    }

    let (edges_a, count_a) = a.edge_directions();
    let (edges_b, count_b) = b.edge_directions();
    for &ea in &edges_a[..count_a] {
        for &eb in &edges_b[..count_b] {
            let Some(axis) = ea.cross(eb).try_normalized(PARALLEL_EPSILON) else {
                continue;
            };
            let candidate = separation_along(a, b, axis);
            if candidate.distance > best.distance + EDGE_PREFERENCE {
                best = candidate;
            }
        }
    }
    best
}

/// Contact geometry in shape A's frame
#[derive(Clone, Debug)]
struct Manifold {
    feature: Feature,
    normal: Vec3,
    points: Vec<ContactPoint>,
}

enum NarrowPhase {
    /// Apart by more than the margin along this axis (A to B)
    Separated(Vec3),
    Touching(Manifold),
}

/// Test two shapes for contact
///
/// `shape_a` must belong to `agent.pair.0` and `shape_b` to `agent.pair.1`.
/// Returns contacts up to `margin` apart (with negative penetration) so the
/// solver can stop a gap from closing. The agent's cached separating axis
/// is tried first and refreshed from the result.
pub fn collide(
    shape_a: &Shape,
    pose_a: &Transform,
    shape_b: &Shape,
    pose_b: &Transform,
    margin: f64,
    agent: &mut CollisionAgent,
) -> Option<Contact> {
    let bodies = agent.pair;
    collide_ordered(shape_a, pose_a, shape_b, pose_b, margin, agent, bodies)
}

/// [`collide`] with the body labels passed alongside the shapes, so the
/// swapped dispatch keeps each shape paired with its own body
fn collide_ordered(
    shape_a: &Shape,
    pose_a: &Transform,
    shape_b: &Shape,
    pose_b: &Transform,
    margin: f64,
    agent: &mut CollisionAgent,
    bodies: (BodyKey, BodyKey),
) -> Option<Contact> {
    if shape_b.shape_type() < shape_a.shape_type() {
        return collide_ordered(shape_b, pose_b, shape_a, pose_a, margin, agent, (bodies.1, bodies.0))
            .map(|c| c.swapped());
    }

    let world_a = pose_a.mul_transform(shape_a.shape_to_body());
    let world_b = pose_b.mul_transform(shape_b.shape_to_body());
    let a = Posed::new(shape_a.kind(), &Transform::IDENTITY);
    let b = Posed::new(shape_b.kind(), &world_a.inverse_mul(&world_b));

    if let Some(axis) = agent.separating_axis {
        if separation_along(&a, &b, axis).distance > margin {
            agent.frames_in_contact = 0;
            return None;
        }
    }

    let result = match (a, b) {
        (Posed::Sphere { centre: ca, radius: ra }, Posed::Sphere { centre: cb, radius: rb }) => {
            sphere_sphere(ca, ra, cb, rb, margin)
        }
        (Posed::Sphere { centre, radius }, Posed::Box { .. }) => {
            sphere_box(centre, radius, shape_b, &world_a.inverse_mul(&world_b), margin)
        }
        (Posed::Sphere { centre, radius }, Posed::Triangle { vertices }) => {
            sphere_triangle(centre, radius, &vertices, margin)
        }
        _ => polytope_pair(&a, &b, margin),
    };

    match result {
        NarrowPhase::Separated(axis) => {
            agent.separating_axis = Some(axis);
            agent.frames_in_contact = 0;
            None
        }
        NarrowPhase::Touching(manifold) => {
            agent.separating_axis = None;
            agent.frames_in_contact += 1;

            let to_body = shape_a.shape_to_body();
            let points: Vec<ContactPoint> = manifold
                .points
                .iter()
                .map(|p| ContactPoint {
                    position: to_body.transform_point(p.position),
                    penetration: p.penetration,
                })
                .collect();
            Some(Contact::new(
                bodies,
                manifold.feature,
                to_body.transform_direction(manifold.normal),
                &points,
                (shape_a.material(), shape_b.material()),
                pose_a.inverse_mul(pose_b),
            ))
        }
    }
}

fn sphere_sphere(ca: Vec3, ra: f64, cb: Vec3, rb: f64, margin: f64) -> NarrowPhase {
    let offset = cb - ca;
    let dist = offset.length();
    let normal = offset.try_normalized(f64::EPSILON).unwrap_or(Vec3::X);
    let penetration = ra + rb - dist;
    if -penetration > margin {
        return NarrowPhase::Separated(normal);
    }
    NarrowPhase::Touching(Manifold {
        feature: Feature::Vertex,
        normal,
        points: vec![ContactPoint {
            position: ca + normal * (ra - 0.5 * penetration),
            penetration,
        }],
    })
}

/// Sphere at `centre` against a box whose shape frame sits at `box_to_frame`
fn sphere_box(centre: Vec3, radius: f64, box_shape: &Shape, box_to_frame: &Transform, margin: f64) -> NarrowPhase {
    let ShapeKind::Box { half_extents } = *box_shape.kind() else {
        return NarrowPhase::Separated(Vec3::X);
    };
    let local = box_to_frame.inverse_transform_point(centre);
    let clamped = local.clamp_components(-half_extents, half_extents);

    let (normal_local, penetration, feature) = if clamped != local {
        // Outside: towards the closest surface point
        let offset = clamped - local;
        let dist = offset.length();
        let pinned = (0..3)
            .filter(|&i| clamped.get(i).abs() >= half_extents.get(i))
            .count();
        let feature = match pinned {
            1 => Feature::Face,
            2 => Feature::Edge,
            _ => Feature::Vertex,
        };
        (offset / dist, radius - dist, feature)
    } else {
        // Inside: out through the nearest face
        let gap = half_extents - local.abs();
        let mut axis = 0;
        for i in 1..3 {
            if gap.get(i) < gap.get(axis) {
                axis = i;
            }
        }
        let mut outward = [0.0; 3];
        outward[axis] = if local.get(axis) >= 0.0 { 1.0 } else { -1.0 };
        (-Vec3::from_array(outward), radius + gap.get(axis), Feature::Face)
    };

    let normal = box_to_frame.transform_direction(normal_local);
    if -penetration > margin {
        return NarrowPhase::Separated(normal);
    }
    NarrowPhase::Touching(Manifold {
        feature,
        normal,
        points: vec![ContactPoint {
            position: centre + normal * (radius - 0.5 * penetration),
            penetration,
        }],
    })
}

fn sphere_triangle(centre: Vec3, radius: f64, vertices: &[Vec3; 3], margin: f64) -> NarrowPhase {
    let closest = closest_point_on_triangle(centre, vertices);
    let offset = closest - centre;
    let dist = offset.length();
    let normal = match offset.try_normalized(1e-12) {
        Some(n) => n,
        None => {
            // Centre lies on the triangle: push the sphere off the front face
            let [a, b, c] = *vertices;
            -(b - a).cross(c - a).normalized()
        }
    };
    let penetration = radius - dist;
    if -penetration > margin {
        return NarrowPhase::Separated(normal);
    }
    NarrowPhase::Touching(Manifold {
        feature: triangle_feature(closest, vertices),
        normal,
        points: vec![ContactPoint {
            position: centre + normal * (radius - 0.5 * penetration),
            penetration,
        }],
    })
}

/// Which part of a triangle a surface point lies on
fn triangle_feature(point: Vec3, vertices: &[Vec3; 3]) -> Feature {
    let [a, b, c] = *vertices;
    let scale = (b - a).length().max((c - a).length());
    let eps = 1e-9 * scale.max(1.0);
    if vertices.iter().any(|v| (point - *v).length() <= eps) {
        return Feature::Vertex;
    }
    let edges = [(a, b), (b, c), (c, a)];
    let on_edge = edges.iter().any(|&(p, q)| {
        let (on_segment, _) = closest_points_on_segments(p, q, point, point);
        (on_segment - point).length() <= eps
    });
    if on_edge {
        Feature::Edge
    } else {
        Feature::Face
    }
}

fn polytope_pair(a: &Posed, b: &Posed, margin: f64) -> NarrowPhase {
    let separation = greatest_separation(a, b);
    if separation.distance > margin {
        return NarrowPhase::Separated(separation.axis);
    }

    let n = separation.axis;
    let proj_a = a.project(n);
    let proj_b = b.project(-n);

    // The richer feature is the reference; ties go to A
    let (reference, incident, outward, reference_is_a) = if proj_b.vertex_count > proj_a.vertex_count {
        (proj_b, proj_a, -n, false)
    } else {
        (proj_a, proj_b, n, true)
    };

    let (normal, mut points) = feature_points(&reference, &incident, outward);
    reduce_points(&mut points, margin);

    NarrowPhase::Touching(Manifold {
        feature: reference.feature,
        normal: if reference_is_a { normal } else { -normal },
        points,
    })
}

/// Contact points between the reference feature and the incident feature
///
/// Returns the reference's outward normal and the unfiltered points.
fn feature_points(reference: &Projection, incident: &Projection, outward: Vec3) -> (Vec3, Vec<ContactPoint>) {
    let ref_verts = reference.vertices();
    let inc_verts = incident.vertices();

    let midpoint = |on_ref: Vec3, on_inc: Vec3| ContactPoint {
        position: (on_ref + on_inc) * 0.5,
        penetration: outward.dot(on_ref - on_inc),
    };

    match ref_verts.len() {
        1 => (outward, vec![midpoint(reference.point, incident.point)]),
        2 => {
            let (q0, q1) = if inc_verts.len() >= 2 {
                (inc_verts[0], inc_verts[1])
            } else {
                (incident.point, incident.point)
            };
            let (on_ref, on_inc) = closest_points_on_segments(ref_verts[0], ref_verts[1], q0, q1);
            (outward, vec![midpoint(on_ref, on_inc)])
        }
        _ => {
            let normal = (ref_verts[1] - ref_verts[0])
                .cross(ref_verts[2] - ref_verts[0])
                .try_normalized(f64::EPSILON)
                .map(|m| if m.dot(outward) < 0.0 { -m } else { m })
                .unwrap_or(outward);
            let mut clipped = clip_to_polygon(inc_verts, ref_verts, normal);
            if clipped.is_empty() {
                clipped.push(incident.point);
            }
            let points = clipped
                .into_iter()
                .map(|q| {
                    let depth = normal.dot(ref_verts[0] - q);
                    ContactPoint {
                        position: q + normal * (0.5 * depth),
                        penetration: depth,
                    }
                })
                .collect();
            (normal, points)
        }
    }
}

/// Clip a polygon (or segment, or point) to the prism over a convex
/// reference polygon with the given normal
fn clip_to_polygon(polygon: &[Vec3], reference: &[Vec3], normal: Vec3) -> Vec<Vec3> {
    let mut centroid = Vec3::ZERO;
    for v in reference {
        centroid += *v;
    }
    let centroid = centroid / reference.len() as f64;

    let mut output: Vec<Vec3> = polygon.to_vec();
    for i in 0..reference.len() {
        if output.is_empty() {
            break;
        }
        let a = reference[i];
        let b = reference[(i + 1) % reference.len()];
        let mut side = (b - a).cross(normal);
        if side.dot(centroid - a) > 0.0 {
            side = -side;
        }

        let input = std::mem::take(&mut output);
        if input.len() == 1 {
            if side.dot(input[0] - a) <= 0.0 {
                output = input;
            }
            continue;
        }
        for j in 0..input.len() {
            let p = input[j];
            let q = input[(j + 1) % input.len()];
            let dp = side.dot(p - a);
            let dq = side.dot(q - a);
            if dp <= 0.0 {
                output.push(p);
            }
            if (dp <= 0.0) != (dq <= 0.0) {
                let t = dp / (dp - dq);
                output.push(p + (q - p) * t);
            }
        }
    }
    output
}

/// Drop points further apart than `margin` and duplicates, keeping at least
/// the deepest point and at most [`MAX_CONTACT_POINTS`] spread-out points
fn reduce_points(points: &mut Vec<ContactPoint>, margin: f64) {
    let Some(deepest) = points
        .iter()
        .copied()
        .max_by(|p, q| p.penetration.total_cmp(&q.penetration))
    else {
        return;
    };

    let mut kept: Vec<ContactPoint> = Vec::with_capacity(points.len());
    for p in points.iter() {
        let duplicate = kept
            .iter()
            .any(|k| (k.position - p.position).length_squared() < 1e-18);
        if p.penetration >= -margin && !duplicate {
            kept.push(*p);
        }
    }
    if kept.is_empty() {
        kept.push(deepest);
    }

    if kept.len() > MAX_CONTACT_POINTS {
        // Deepest first, then whichever point is furthest from those chosen
        let mut chosen = vec![deepest];
        while chosen.len() < MAX_CONTACT_POINTS {
            let next = kept
                .iter()
                .copied()
                .map(|p| {
                    let spread = chosen
                        .iter()
                        .map(|c| (c.position - p.position).length_squared())
                        .fold(f64::INFINITY, f64::min);
                    (p, spread)
                })
                .max_by(|x, y| x.1.total_cmp(&y.1));
            match next {
                Some((p, spread)) if spread > 0.0 => chosen.push(p),
                _ => break,
            }
        }
        kept = chosen;
    }
    *points = kept;
}

/// Closest points between segments `p1q1` and `p2q2`
/// (Ericson, Real-Time Collision Detection 5.1.9)
fn closest_points_on_segments(p1: Vec3, q1: Vec3, p2: Vec3, q2: Vec3) -> (Vec3, Vec3) {
    let d1 = q1 - p1;
    let d2 = q2 - p2;
    let r = p1 - p2;
    let a = d1.length_squared();
    let e = d2.length_squared();
    let f = d2.dot(r);

    let (s, t) = if a <= f64::EPSILON && e <= f64::EPSILON {
        (0.0, 0.0)
    } else if a <= f64::EPSILON {
        (0.0, (f / e).clamp(0.0, 1.0))
    } else {
        let c = d1.dot(r);
        if e <= f64::EPSILON {
            ((-c / a).clamp(0.0, 1.0), 0.0)
        } else {
            let b = d1.dot(d2);
            let denom = a * e - b * b;
            let mut s = if denom > 0.0 {
                ((b * f - c * e) / denom).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let mut t = (b * s + f) / e;
            if t < 0.0 {
                t = 0.0;
                s = (-c / a).clamp(0.0, 1.0);
            } else if t > 1.0 {
                t = 1.0;
                s = ((b - c) / a).clamp(0.0, 1.0);
            }
            (s, t)
        }
    };
    (p1 + d1 * s, p2 + d2 * t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;
    use tumble_math::Mat3;

    const EPSILON: f64 = 1e-9;

    fn agent() -> CollisionAgent {
        let mut keys: SlotMap<BodyKey, ()> = SlotMap::with_key();
        CollisionAgent::new((keys.insert(()), keys.insert(())), 1)
    }

    fn at(x: f64, y: f64, z: f64) -> Transform {
        Transform::from_translation(Vec3::new(x, y, z))
    }

    fn sample_axes() -> Vec<Vec3> {
        vec![
            Vec3::X,
            -Vec3::Y,
            Vec3::new(1.0, 1.0, 0.0).normalized(),
            Vec3::new(1.0, -1.0, 1.0).normalized(),
            Vec3::new(0.3, 0.8, -0.52).normalized(),
        ]
    }

    #[test]
    fn test_project_box_features() {
        let radii = [Vec3::X, Vec3::Y * 2.0, Vec3::Z * 3.0];

        let face = project_box(Vec3::ZERO, &radii, Vec3::X);
        assert_eq!(face.feature, Feature::Face);
        assert_eq!(face.free_axes().len(), 2);
        assert_eq!(face.vertices().len(), 4);
        assert!((face.distance - 1.0).abs() < EPSILON);

        let edge = project_box(Vec3::ZERO, &radii, Vec3::new(1.0, 1.0, 0.0).normalized());
        assert_eq!(edge.feature, Feature::Edge);
        assert_eq!(edge.point, Vec3::new(1.0, 2.0, 0.0));

        let vertex = project_box(Vec3::new(5.0, 0.0, 0.0), &radii, Vec3::new(-1.0, 1.0, -1.0).normalized());
        assert_eq!(vertex.feature, Feature::Vertex);
        assert_eq!(vertex.point, Vec3::new(4.0, 2.0, -3.0));
    }

    #[test]
    fn test_projection_is_idempotent() {
        let rotation = Mat3::from_axis_angle(Vec3::new(1.0, 2.0, 3.0).normalized(), 0.4);
        let centre = Vec3::new(1.0, -2.0, 0.5);
        let radii = [rotation.col(0) * 0.5, rotation.col(1) * 1.5, rotation.col(2)];
        let tri = [Vec3::new(0.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 1.0), Vec3::new(0.5, 3.0, -1.0)];

        for axis in sample_axes() {
            let p = project_box(centre, &radii, axis);
            assert!((axis.dot(p.point) - p.distance).abs() < EPSILON);
            let again = project_box(centre, &radii, axis);
            assert_eq!(p, again);

            let t = project_tri(&tri, axis);
            assert!((axis.dot(t.point) - t.distance).abs() < EPSILON);
        }
    }

    #[test]
    fn test_project_box_distance_is_support() {
        let radii = [Vec3::X, Vec3::Y * 2.0, Vec3::Z * 3.0];
        let axis = Vec3::new(1.0, -1.0, 1.0).normalized();
        let p = project_box(Vec3::ZERO, &radii, axis);
        let expected = (1.0 + 2.0 + 3.0) / 3.0_f64.sqrt();
        assert!((p.distance - expected).abs() < EPSILON);

        // Offsetting the box shifts the distance by the centre's projection
        let centre = Vec3::new(4.0, -1.0, 2.0);
        let offset = project_box(centre, &radii, axis);
        assert!((offset.distance - axis.dot(centre) - expected).abs() < EPSILON);
        assert!((offset.point - centre - p.point).length() < EPSILON);
    }

    #[test]
    fn test_project_tri_ties() {
        let tri = [Vec3::new(0.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0), Vec3::new(0.0, 2.0, 0.0)];

        let face = project_tri(&tri, Vec3::Z);
        assert_eq!(face.feature, Feature::Face);
        assert!((face.point - Vec3::new(2.0 / 3.0, 2.0 / 3.0, 0.0)).length() < EPSILON);

        let edge = project_tri(&tri, -Vec3::Y);
        assert_eq!(edge.feature, Feature::Edge);
        assert_eq!(edge.vertices(), &[tri[0], tri[1]]);
        assert!((edge.point - Vec3::new(1.0, 0.0, 0.0)).length() < EPSILON);

        let vertex = project_tri(&tri, Vec3::X);
        assert_eq!(vertex.feature, Feature::Vertex);
        assert_eq!(vertex.point, tri[1]);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "not unit length")]
    fn test_project_box_rejects_non_unit_axis() {
        let radii = [Vec3::X, Vec3::Y, Vec3::Z];
        project_box(Vec3::ZERO, &radii, Vec3::new(2.0, 0.0, 0.0));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "not unit length")]
    fn test_project_tri_rejects_non_unit_axis() {
        let tri = [Vec3::ZERO, Vec3::X, Vec3::Y];
        project_tri(&tri, Vec3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn test_spheres_within_margin() {
        let sphere = Shape::sphere(1.0).unwrap();
        let mut agent = agent();

        let contact = collide(&sphere, &at(0.0, 0.0, 0.0), &sphere, &at(2.1, 0.0, 0.0), 0.2, &mut agent).unwrap();
        assert!((contact.penetration + 0.1).abs() < EPSILON);
        assert!((contact.normal - Vec3::X).length() < EPSILON);
        assert!((contact.points()[0].position - Vec3::new(1.05, 0.0, 0.0)).length() < EPSILON);
        assert!(!contact.is_penetrating());
        assert_eq!(agent.frames_in_contact, 1);

        assert!(collide(&sphere, &at(0.0, 0.0, 0.0), &sphere, &at(2.1, 0.0, 0.0), 0.05, &mut agent).is_none());
        let axis = agent.separating_axis.unwrap();
        assert!((axis - Vec3::X).length() < EPSILON);
        assert_eq!(agent.frames_in_contact, 0);
    }

    #[test]
    fn test_cached_axis_refreshed() {
        let sphere = Shape::sphere(1.0).unwrap();
        let mut agent = agent();
        assert!(collide(&sphere, &at(0.0, 0.0, 0.0), &sphere, &at(5.0, 0.0, 0.0), 0.1, &mut agent).is_none());
        assert!(agent.separating_axis.is_some());

        let contact = collide(&sphere, &at(0.0, 0.0, 0.0), &sphere, &at(1.5, 0.0, 0.0), 0.1, &mut agent);
        assert!(contact.is_some());
        assert_eq!(agent.separating_axis, None);
    }

    #[test]
    fn test_box_resting_on_box() {
        let ground = Shape::cuboid(Vec3::new(5.0, 1.0, 5.0)).unwrap();
        let cube = Shape::cuboid(Vec3::ONE).unwrap();

        let contact = collide(&ground, &at(0.0, 0.0, 0.0), &cube, &at(0.0, 2.0, 0.0), 0.1, &mut agent()).unwrap();
        assert_eq!(contact.feature, Feature::Face);
        assert_eq!(contact.points().len(), 4);
        assert!((contact.normal - Vec3::Y).length() < EPSILON);
        for p in contact.points() {
            assert!(p.penetration.abs() < EPSILON);
            assert!((p.position.y - 1.0).abs() < EPSILON);
            assert!((p.position.x.abs() - 1.0).abs() < EPSILON);
        }

        // Same pair seen from the cube: corners clipped out of the ground face
        let contact = collide(&cube, &at(0.0, 2.0, 0.0), &ground, &at(0.0, 0.0, 0.0), 0.1, &mut agent()).unwrap();
        assert_eq!(contact.points().len(), 4);
        assert!((contact.normal + Vec3::Y).length() < EPSILON);
        for p in contact.points() {
            assert!((p.position.y + 1.0).abs() < EPSILON);
        }
    }

    #[test]
    fn test_box_penetration_depth() {
        let cube = Shape::cuboid(Vec3::ONE).unwrap();
        let contact = collide(&cube, &at(0.0, 0.0, 0.0), &cube, &at(1.8, 0.3, 0.0), 0.1, &mut agent()).unwrap();
        assert!((contact.penetration - 0.2).abs() < EPSILON);
        assert!((contact.normal - Vec3::X).length() < EPSILON);
        assert!(contact.points().len() >= 2);
    }

    #[test]
    fn test_tilted_box_touches_with_edge() {
        let cube = Shape::cuboid(Vec3::ONE).unwrap();
        let ground = Shape::cuboid(Vec3::new(5.0, 1.0, 5.0)).unwrap();
        let tilt = Mat3::from_axis_angle(Vec3::Z, std::f64::consts::FRAC_PI_4);
        let height = 1.0 + 2.0_f64.sqrt() - 0.05;
        let pose = Transform::new(tilt, Vec3::new(0.0, height, 0.0));

        let contact = collide(&ground, &at(0.0, 0.0, 0.0), &cube, &pose, 0.1, &mut agent()).unwrap();
        assert!((contact.penetration - 0.05).abs() < 1e-9);
        assert!((contact.normal - Vec3::Y).length() < EPSILON);
        assert_eq!(contact.points().len(), 2);
        for p in contact.points() {
            assert!(p.position.x.abs() < 1e-9);
        }
    }

    #[test]
    fn test_separated_boxes() {
        let cube = Shape::cuboid(Vec3::ONE).unwrap();
        let mut agent = agent();
        let rotated = Transform::new(Mat3::from_axis_angle(Vec3::Y, 0.3), Vec3::new(0.0, 0.0, 3.0));
        assert!(collide(&cube, &at(0.0, 0.0, 0.0), &cube, &rotated, 0.1, &mut agent).is_none());
        let axis = agent.separating_axis.unwrap();
        assert!(axis.is_unit(1e-9));
        assert!(axis.z > 0.0);
    }

    #[test]
    fn test_sphere_on_box() {
        let sphere = Shape::sphere(0.5).unwrap();
        let cube = Shape::cuboid(Vec3::ONE).unwrap();

        let contact = collide(&sphere, &at(0.0, 1.4, 0.0), &cube, &at(0.0, 0.0, 0.0), 0.1, &mut agent()).unwrap();
        assert_eq!(contact.feature, Feature::Face);
        assert!((contact.normal + Vec3::Y).length() < EPSILON);
        assert!((contact.penetration - 0.1).abs() < EPSILON);

        // Centre inside the box: pushed out through the nearest face
        let contact = collide(&sphere, &at(0.8, 0.0, 0.0), &cube, &at(0.0, 0.0, 0.0), 0.1, &mut agent()).unwrap();
        assert!((contact.normal + Vec3::X).length() < EPSILON);
        assert!((contact.penetration - 0.7).abs() < EPSILON);

        // Off a corner
        let contact = collide(&sphere, &at(1.2, 1.2, 1.2), &cube, &at(0.0, 0.0, 0.0), 0.1, &mut agent()).unwrap();
        assert_eq!(contact.feature, Feature::Vertex);
    }

    #[test]
    fn test_box_first_order_is_swapped() {
        let sphere = Shape::sphere(0.5).unwrap();
        let cube = Shape::cuboid(Vec3::ONE).unwrap();
        let mut agent = agent();
        let contact = collide(&cube, &at(0.0, 0.0, 0.0), &sphere, &at(0.0, 1.4, 0.0), 0.1, &mut agent).unwrap();
        // Normal from the box towards the sphere, in the box's frame
        assert!((contact.normal - Vec3::Y).length() < EPSILON);
        assert!((contact.points()[0].position.y - 0.95).abs() < EPSILON);
        assert_eq!(contact.body_a, agent.pair.0);
        assert_eq!(contact.body_b, agent.pair.1);
        assert!((contact.b_in_a.translation - Vec3::new(0.0, 1.4, 0.0)).length() < EPSILON);
    }

    #[test]
    fn test_argument_order_only_flips_the_frame() {
        let sphere = Shape::sphere(0.5).unwrap();
        let cube = Shape::cuboid(Vec3::ONE).unwrap();
        let mut agent = agent();
        let (box_key, sphere_key) = agent.pair;

        let from_box = collide(&cube, &at(0.0, 0.0, 0.0), &sphere, &at(0.0, 1.4, 0.0), 0.1, &mut agent).unwrap();
        agent.pair = (sphere_key, box_key);
        let from_sphere = collide(&sphere, &at(0.0, 1.4, 0.0), &cube, &at(0.0, 0.0, 0.0), 0.1, &mut agent).unwrap();

        assert_eq!(from_box.body_a, box_key);
        assert_eq!(from_sphere.body_a, sphere_key);
        let back = from_sphere.swapped();
        assert_eq!(back.body_a, from_box.body_a);
        assert!((back.normal - from_box.normal).length() < EPSILON);
        assert!((back.points()[0].position - from_box.points()[0].position).length() < EPSILON);
    }

    #[test]
    fn test_sphere_on_triangle() {
        let sphere = Shape::sphere(1.0).unwrap();
        let tri = Shape::triangle(Vec3::new(-5.0, 0.0, -5.0), Vec3::new(5.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 5.0)).unwrap();
        let contact = collide(&sphere, &at(0.0, 0.95, 0.0), &tri, &Transform::IDENTITY, 0.1, &mut agent()).unwrap();
        assert_eq!(contact.feature, Feature::Face);
        assert!((contact.normal + Vec3::Y).length() < EPSILON);
        assert!((contact.penetration - 0.05).abs() < EPSILON);
    }

    #[test]
    fn test_box_on_triangle() {
        let cube = Shape::cuboid(Vec3::ONE).unwrap();
        let tri = Shape::triangle(Vec3::new(-10.0, 0.0, -10.0), Vec3::new(10.0, 0.0, -10.0), Vec3::new(0.0, 0.0, 10.0)).unwrap();
        let contact = collide(&cube, &at(0.0, 0.98, 0.0), &tri, &Transform::IDENTITY, 0.1, &mut agent()).unwrap();
        assert!((contact.normal + Vec3::Y).length() < EPSILON);
        assert_eq!(contact.points().len(), 4);
        for p in contact.points() {
            assert!((p.penetration - 0.02).abs() < 1e-9);
        }
    }

    #[test]
    fn test_crossing_triangles() {
        let flat = Shape::triangle(Vec3::new(-2.0, 0.0, -2.0), Vec3::new(2.0, 0.0, -2.0), Vec3::new(0.0, 0.0, 2.0)).unwrap();
        let upright = Shape::triangle(Vec3::new(0.0, -0.1, 0.0), Vec3::new(1.0, 2.0, 0.0), Vec3::new(-1.0, 2.0, 0.0)).unwrap();
        let contact = collide(&flat, &Transform::IDENTITY, &upright, &Transform::IDENTITY, 0.05, &mut agent()).unwrap();
        assert!(contact.penetration > 0.0);
        assert!(contact.normal.is_unit(1e-9));

        let lifted = at(0.0, 1.0, 0.0);
        assert!(collide(&flat, &Transform::IDENTITY, &upright, &lifted, 0.05, &mut agent()).is_none());
    }

    #[test]
    fn test_contact_frame_is_body_a() {
        let sphere = Shape::sphere(1.0).unwrap();
        let far = 1.0e6;
        let contact = collide(&sphere, &at(far, 0.0, 0.0), &sphere, &at(far + 1.9, 0.0, 0.0), 0.1, &mut agent()).unwrap();
        assert!((contact.points()[0].position - Vec3::new(0.95, 0.0, 0.0)).length() < 1e-9);
        assert!((contact.b_in_a.translation - Vec3::new(1.9, 0.0, 0.0)).length() < 1e-9);
    }

    #[test]
    fn test_segment_closest_points() {
        let (a, b) = closest_points_on_segments(
            Vec3::new(-1.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, -1.0),
            Vec3::new(0.0, 1.0, 1.0),
        );
        assert!((a - Vec3::ZERO).length() < EPSILON);
        assert!((b - Vec3::new(0.0, 1.0, 0.0)).length() < EPSILON);
    }
}
