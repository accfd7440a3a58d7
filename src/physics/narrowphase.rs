//! Narrowphase collision detection: GJK, EPA, and specialized tests.
//!
//! GJK runs on the margin-inclusive Minkowski difference `A - B` and starts
//! from the separating axis cached on the pair. Intersecting simplices are
//! expanded by EPA into a contact normal, a depth and one witness point per
//! shape.

use glam::Vec3;

use super::contact::ContactInfo;
use super::math::{Transform, MACHINE_EPSILON};
use super::shape::ConvexShape;

const GJK_MAX_ITERATIONS: usize = 64;
const EPA_MAX_ITERATIONS: usize = 64;
const EPA_TOLERANCE: f32 = 1e-4;
const DEGENERATE_SQ: f32 = 1e-10;

/// A vertex of the Minkowski difference with the shape points it came from.
#[derive(Debug, Clone, Copy)]
pub struct SupportPoint {
    /// `a - b`.
    pub point: Vec3,
    /// Support point of shape A.
    pub a: Vec3,
    /// Support point of shape B.
    pub b: Vec3,
}

/// A simplex used by the GJK algorithm (up to 4 vertices in 3D).
#[derive(Debug, Clone)]
pub struct Simplex {
    pub points: Vec<SupportPoint>,
}

impl Simplex {
    fn new() -> Self {
        Self {
            points: Vec::with_capacity(4),
        }
    }

    fn push(&mut self, point: SupportPoint) {
        self.points.push(point);
    }
}

/// Outcome of a GJK query.
#[derive(Debug, Clone)]
pub enum GjkResult {
    /// The shapes are disjoint; `axis` separates them and seeds the next query.
    Separated { axis: Vec3 },
    /// The simplex encloses (or touches) the origin.
    Intersecting(Simplex),
}

/// Borrowed view of one shape in world space.
#[derive(Debug, Clone, Copy)]
struct Posed<'a> {
    shape: &'a ConvexShape,
    transform: &'a Transform,
}

/// Minkowski difference support function.
fn minkowski_support(a: Posed<'_>, b: Posed<'_>, direction: Vec3) -> SupportPoint {
    let pa = a.shape.support_point(direction, a.transform);
    let pb = b.shape.support_point(-direction, b.transform);
    SupportPoint {
        point: pa - pb,
        a: pa,
        b: pb,
    }
}

/// GJK intersection test seeded with `initial_axis`.
pub fn gjk_intersection(
    shape_a: &ConvexShape,
    transform_a: &Transform,
    shape_b: &ConvexShape,
    transform_b: &Transform,
    initial_axis: Vec3,
) -> GjkResult {
    let a = Posed {
        shape: shape_a,
        transform: transform_a,
    };
    let b = Posed {
        shape: shape_b,
        transform: transform_b,
    };

    let mut direction = if initial_axis.length_squared() > MACHINE_EPSILON * MACHINE_EPSILON {
        initial_axis
    } else {
        Vec3::X
    };

    let mut simplex = Simplex::new();

    let first = minkowski_support(a, b, direction);
    if first.point.dot(direction) < 0.0 {
        // Cached axis still separates.
        return GjkResult::Separated { axis: direction };
    }
    simplex.push(first);
    direction = -first.point;

    if direction.length_squared() < DEGENERATE_SQ {
        // Shapes overlap at exactly one point
        return GjkResult::Intersecting(simplex);
    }

    let second = minkowski_support(a, b, direction);
    if second.point.dot(direction) < 0.0 {
        return GjkResult::Separated { axis: direction };
    }
    simplex.push(second);
    let ab = second.point - first.point;
    direction = triple_cross_product(ab, -first.point, ab);
    if direction.length_squared() < DEGENERATE_SQ {
        direction = ab.any_orthonormal_vector();
    }

    for _ in 0..GJK_MAX_ITERATIONS {
        let new_point = minkowski_support(a, b, direction);
        if new_point.point.dot(direction) < 0.0 {
            return GjkResult::Separated { axis: direction };
        }
        simplex.push(new_point);

        if do_simplex(&mut simplex, &mut direction) {
            return GjkResult::Intersecting(simplex);
        }

        if direction.length_squared() < DEGENERATE_SQ {
            return GjkResult::Intersecting(simplex);
        }
    }

    // Not converged: report no contact rather than a bogus one.
    GjkResult::Separated { axis: direction }
}

/// Triple cross product: (a x b) x c
fn triple_cross_product(a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    a.cross(b).cross(c)
}

/// Process the simplex and update the search direction.
/// Returns true if the origin is contained in the simplex.
fn do_simplex(simplex: &mut Simplex, direction: &mut Vec3) -> bool {
    match simplex.points.len() {
        2 => do_simplex_line(simplex, direction),
        3 => do_simplex_triangle(simplex, direction),
        4 => do_simplex_tetrahedron(simplex, direction),
        _ => false,
    }
}

fn do_simplex_line(simplex: &mut Simplex, direction: &mut Vec3) -> bool {
    let a = simplex.points[1]; // Most recently added
    let b = simplex.points[0];
    let ab = b.point - a.point;
    let ao = -a.point;

    if ab.dot(ao) > 0.0 {
        *direction = triple_cross_product(ab, ao, ab);
    } else {
        simplex.points = vec![a];
        *direction = ao;
    }
    false
}

fn do_simplex_triangle(simplex: &mut Simplex, direction: &mut Vec3) -> bool {
    let a = simplex.points[2]; // Most recently added
    let b = simplex.points[1];
    let c = simplex.points[0];
    let ab = b.point - a.point;
    let ac = c.point - a.point;
    let ao = -a.point;
    let abc = ab.cross(ac);

    if abc.cross(ac).dot(ao) > 0.0 {
        if ac.dot(ao) > 0.0 {
            simplex.points = vec![c, a];
            *direction = triple_cross_product(ac, ao, ac);
        } else {
            simplex.points = vec![b, a];
            return do_simplex_line(simplex, direction);
        }
    } else if ab.cross(abc).dot(ao) > 0.0 {
        simplex.points = vec![b, a];
        return do_simplex_line(simplex, direction);
    } else if abc.dot(ao) > 0.0 {
        *direction = abc;
    } else {
        simplex.points = vec![b, c, a];
        *direction = -abc;
    }
    false
}

fn do_simplex_tetrahedron(simplex: &mut Simplex, direction: &mut Vec3) -> bool {
    let a = simplex.points[3]; // Most recently added
    let b = simplex.points[2];
    let c = simplex.points[1];
    let d = simplex.points[0];
    let ab = b.point - a.point;
    let ac = c.point - a.point;
    let ad = d.point - a.point;
    let ao = -a.point;

    let abc = ab.cross(ac);
    let acd = ac.cross(ad);
    let adb = ad.cross(ab);

    if abc.dot(ao) > 0.0 {
        simplex.points = vec![c, b, a];
        *direction = abc;
        return do_simplex_triangle(simplex, direction);
    }
    if acd.dot(ao) > 0.0 {
        simplex.points = vec![d, c, a];
        *direction = acd;
        return do_simplex_triangle(simplex, direction);
    }
    if adb.dot(ao) > 0.0 {
        simplex.points = vec![b, d, a];
        *direction = adb;
        return do_simplex_triangle(simplex, direction);
    }

    // Origin is inside the tetrahedron
    true
}

/// Grow a degenerate GJK simplex into a tetrahedron with non-zero volume.
fn blow_up_simplex(polytope: &mut Vec<SupportPoint>, a: Posed<'_>, b: Posed<'_>) -> bool {
    const AXES: [Vec3; 6] = [
        Vec3::X,
        Vec3::NEG_X,
        Vec3::Y,
        Vec3::NEG_Y,
        Vec3::Z,
        Vec3::NEG_Z,
    ];

    if polytope.len() == 1 {
        let origin = polytope[0].point;
        let found = AXES.iter().map(|&d| minkowski_support(a, b, d)).find(|p| {
            (p.point - origin).length_squared() > DEGENERATE_SQ
        });
        match found {
            Some(p) => polytope.push(p),
            None => return false,
        }
    }

    if polytope.len() == 2 {
        let p0 = polytope[0].point;
        let line = (polytope[1].point - p0).normalize();
        let u = line.any_orthonormal_vector();
        let v = line.cross(u);
        let found = [u, -u, v, -v]
            .into_iter()
            .map(|d| minkowski_support(a, b, d))
            .find(|p| (p.point - p0).cross(line).length_squared() > DEGENERATE_SQ);
        match found {
            Some(p) => polytope.push(p),
            None => return false,
        }
    }

    if polytope.len() == 3 {
        let p0 = polytope[0].point;
        let normal = (polytope[1].point - p0)
            .cross(polytope[2].point - p0)
            .normalize_or_zero();
        if normal == Vec3::ZERO {
            return false;
        }
        let found = [normal, -normal]
            .into_iter()
            .map(|d| minkowski_support(a, b, d))
            .find(|p| (p.point - p0).dot(normal).abs() > 1e-5);
        match found {
            Some(p) => polytope.push(p),
            None => return false,
        }
    }

    polytope.len() >= 4
}

/// Outward-wound faces of the initial tetrahedron.
fn tetrahedron_faces(polytope: &[SupportPoint]) -> Vec<[usize; 3]> {
    let mut faces = vec![[0, 1, 2], [0, 3, 1], [0, 2, 3], [1, 3, 2]];
    let opposite = [3, 2, 1, 0];
    for (face, &other) in faces.iter_mut().zip(opposite.iter()) {
        let a = polytope[face[0]].point;
        let normal = (polytope[face[1]].point - a).cross(polytope[face[2]].point - a);
        if normal.dot(polytope[other].point - a) > 0.0 {
            face.swap(1, 2);
        }
    }
    faces
}

/// EPA (Expanding Polytope Algorithm) to compute penetration depth, contact
/// normal and witness points.
pub fn epa_penetration(
    simplex: &Simplex,
    shape_a: &ConvexShape,
    transform_a: &Transform,
    shape_b: &ConvexShape,
    transform_b: &Transform,
) -> Option<ContactInfo> {
    let a = Posed {
        shape: shape_a,
        transform: transform_a,
    };
    let b = Posed {
        shape: shape_b,
        transform: transform_b,
    };

    let mut polytope = simplex.points.clone();
    polytope.truncate(4);
    if polytope.len() < 4 && !blow_up_simplex(&mut polytope, a, b) {
        return None;
    }

    let mut faces = tetrahedron_faces(&polytope);

    for _ in 0..EPA_MAX_ITERATIONS {
        // Find the face closest to the origin
        let mut min_dist = f32::MAX;
        let mut min_face = None;
        let mut min_normal = Vec3::ZERO;

        for (i, face) in faces.iter().enumerate() {
            let p0 = polytope[face[0]].point;
            let normal = (polytope[face[1]].point - p0).cross(polytope[face[2]].point - p0);
            let len = normal.length();
            if len < 1e-10 {
                continue;
            }
            let normal = normal / len;
            let dist = normal.dot(p0);
            if dist < min_dist {
                min_dist = dist;
                min_face = Some(i);
                min_normal = normal;
            }
        }

        let min_face = min_face?;

        // Get a new support point along the closest face's normal
        let new_point = minkowski_support(a, b, min_normal);
        let new_dist = new_point.point.dot(min_normal);

        if new_dist - min_dist < EPA_TOLERANCE {
            let face = faces[min_face];
            let (p0, p1, p2) = (polytope[face[0]], polytope[face[1]], polytope[face[2]]);
            let closest = min_normal * min_dist;
            let (u, v, w) = barycentric(closest, p0.point, p1.point, p2.point);
            return Some(ContactInfo {
                normal: min_normal,
                penetration: min_dist.max(0.0),
                point_a: p0.a * u + p1.a * v + p2.a * w,
                point_b: p0.b * u + p1.b * v + p2.b * w,
            });
        }

        // Expand the polytope
        let new_idx = polytope.len();
        polytope.push(new_point);

        // Remove faces that can see the new point
        let mut edges: Vec<[usize; 2]> = Vec::new();
        let mut i = 0;
        while i < faces.len() {
            let face = faces[i];
            let p0 = polytope[face[0]].point;
            let normal = (polytope[face[1]].point - p0).cross(polytope[face[2]].point - p0);
            if normal.dot(new_point.point - p0) > 0.0 {
                add_edge(&mut edges, face[0], face[1]);
                add_edge(&mut edges, face[1], face[2]);
                add_edge(&mut edges, face[2], face[0]);
                faces.swap_remove(i);
            } else {
                i += 1;
            }
        }

        // Create new faces from the edges to the new point
        for edge in &edges {
            faces.push([edge[0], edge[1], new_idx]);
        }

        if faces.is_empty() {
            return None;
        }
    }

    None
}

/// Add an edge to the edge list, removing duplicates (shared edges).
fn add_edge(edges: &mut Vec<[usize; 2]>, a: usize, b: usize) {
    // Check if the reverse edge already exists
    if let Some(pos) = edges.iter().position(|e| e[0] == b && e[1] == a) {
        edges.swap_remove(pos);
    } else {
        edges.push([a, b]);
    }
}

/// Barycentric coordinates of `p` (assumed in the plane) in triangle `abc`.
fn barycentric(p: Vec3, a: Vec3, b: Vec3, c: Vec3) -> (f32, f32, f32) {
    let v0 = b - a;
    let v1 = c - a;
    let v2 = p - a;
    let d00 = v0.dot(v0);
    let d01 = v0.dot(v1);
    let d11 = v1.dot(v1);
    let d20 = v2.dot(v0);
    let d21 = v2.dot(v1);
    let denom = d00 * d11 - d01 * d01;
    if denom.abs() < 1e-12 {
        return (1.0, 0.0, 0.0);
    }
    let v = (d11 * d20 - d01 * d21) / denom;
    let w = (d00 * d21 - d01 * d20) / denom;
    (1.0 - v - w, v, w)
}

/// Specialized sphere-sphere intersection test.
pub fn sphere_sphere(
    shape_a: &ConvexShape,
    transform_a: &Transform,
    shape_b: &ConvexShape,
    transform_b: &Transform,
) -> Option<ContactInfo> {
    let (radius_a, radius_b) = match (shape_a, shape_b) {
        (ConvexShape::Sphere(a), ConvexShape::Sphere(b)) => (a.radius(), b.radius()),
        _ => return None,
    };

    let center_a = transform_a.position;
    let center_b = transform_b.position;

    let diff = center_b - center_a;
    let dist_sq = diff.length_squared();
    let min_dist = radius_a + radius_b;

    if dist_sq >= min_dist * min_dist {
        return None;
    }

    let dist = dist_sq.sqrt();
    let normal = if dist > 1e-6 { diff / dist } else { Vec3::Y };

    Some(ContactInfo {
        normal,
        penetration: min_dist - dist,
        point_a: center_a + normal * radius_a,
        point_b: center_b - normal * radius_b,
    })
}

/// Detect collision between two shapes, dispatching to specialized tests where possible.
///
/// `separating_axis` is the pair's cached axis: it seeds GJK and receives the
/// new axis when the shapes are found disjoint.
pub fn detect_collision(
    shape_a: &ConvexShape,
    transform_a: &Transform,
    shape_b: &ConvexShape,
    transform_b: &Transform,
    separating_axis: &mut Vec3,
) -> Option<ContactInfo> {
    if let (ConvexShape::Sphere(_), ConvexShape::Sphere(_)) = (shape_a, shape_b) {
        return sphere_sphere(shape_a, transform_a, shape_b, transform_b);
    }

    match gjk_intersection(shape_a, transform_a, shape_b, transform_b, *separating_axis) {
        GjkResult::Separated { axis } => {
            *separating_axis = axis;
            None
        }
        GjkResult::Intersecting(simplex) => {
            epa_penetration(&simplex, shape_a, transform_a, shape_b, transform_b)
        }
    }
}
