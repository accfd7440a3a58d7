//! Contact data structures for collision response.
//!
//! A [`ContactManifold`] keeps up to four points per body pair across steps so
//! that the contact solver can warm-start from last step's impulses.

use glam::Vec3;

use super::broadphase::BodyIndexPair;
use super::constraint::ContactConstraint;
use super::math::Transform;

/// Distance under which a new point is considered the same as a cached one,
/// and past which a cached point is dropped.
pub const PERSISTENT_CONTACT_DIST: f32 = 0.03;

/// Maximum number of points kept in a manifold.
pub const MAX_CONTACT_POINTS: usize = 4;

/// Result of a narrow-phase query between two shapes.
#[derive(Debug, Clone, Copy)]
pub struct ContactInfo {
    /// Contact normal (from shape A to shape B).
    pub normal: Vec3,
    /// Penetration depth.
    pub penetration: f32,
    /// Deepest point of shape A inside shape B, in world space.
    pub point_a: Vec3,
    /// Deepest point of shape B inside shape A, in world space.
    pub point_b: Vec3,
}

/// A single contact point with accumulated impulse data.
#[derive(Debug, Clone, Copy)]
pub struct ContactPoint {
    /// Witness point on body 1, in body 1's local frame.
    pub local_point1: Vec3,
    /// Witness point on body 2, in body 2's local frame.
    pub local_point2: Vec3,
    pub world_point1: Vec3,
    pub world_point2: Vec3,
    /// Contact normal (from body 1 to body 2).
    pub normal: Vec3,
    pub penetration_depth: f32,
    /// Accumulated normal impulse.
    pub normal_impulse: f32,
    /// Accumulated tangent impulses (two friction directions).
    pub friction_impulses: [f32; 2],
    /// Friction directions the impulses above were accumulated along.
    pub friction_vectors: [Vec3; 2],
}

impl ContactPoint {
    /// New point from a narrow-phase result, with zero impulses.
    pub fn new(info: &ContactInfo, transform1: &Transform, transform2: &Transform) -> Self {
        Self {
            local_point1: transform1.inverse_transform_point(info.point_a),
            local_point2: transform2.inverse_transform_point(info.point_b),
            world_point1: info.point_a,
            world_point2: info.point_b,
            normal: info.normal,
            penetration_depth: info.penetration,
            normal_impulse: 0.0,
            friction_impulses: [0.0; 2],
            friction_vectors: [Vec3::ZERO; 2],
        }
    }
}

/// Persistent contact points between two bodies.
#[derive(Debug, Clone)]
pub struct ContactManifold {
    key: BodyIndexPair,
    points: Vec<ContactPoint>,
}

impl ContactManifold {
    pub fn new(key: BodyIndexPair) -> Self {
        Self {
            key,
            points: Vec::with_capacity(MAX_CONTACT_POINTS),
        }
    }

    pub fn key(&self) -> BodyIndexPair {
        self.key
    }

    pub fn points(&self) -> &[ContactPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// Refresh world points and depths for the new body poses and drop the
    /// points that no longer describe the contact.
    pub fn update(&mut self, transform1: &Transform, transform2: &Transform) {
        const DIST_SQ: f32 = PERSISTENT_CONTACT_DIST * PERSISTENT_CONTACT_DIST;

        for point in &mut self.points {
            point.world_point1 = transform1.transform_point(point.local_point1);
            point.world_point2 = transform2.transform_point(point.local_point2);
            point.penetration_depth = (point.world_point1 - point.world_point2).dot(point.normal);
        }

        self.points.retain(|point| {
            let distance_normal = -point.penetration_depth;
            if distance_normal > PERSISTENT_CONTACT_DIST {
                return false;
            }
            // Tangential drift between the two witness points.
            let projected = point.world_point1 + point.normal * distance_normal;
            (point.world_point2 - projected).length_squared() <= DIST_SQ
        });
    }

    /// Add a new point, merging it into a cached one when close enough.
    pub fn add_contact(&mut self, point: ContactPoint) {
        const DIST_SQ: f32 = PERSISTENT_CONTACT_DIST * PERSISTENT_CONTACT_DIST;

        if let Some(existing) = self
            .points
            .iter_mut()
            .find(|p| (p.world_point1 - point.world_point1).length_squared() <= DIST_SQ)
        {
            let normal_impulse = existing.normal_impulse;
            let friction_impulses = existing.friction_impulses;
            let friction_vectors = existing.friction_vectors;
            *existing = ContactPoint {
                normal_impulse,
                friction_impulses,
                friction_vectors,
                ..point
            };
            return;
        }

        if self.points.len() == MAX_CONTACT_POINTS {
            let deepest = self.deepest_index(point.penetration_depth);
            let remove = self.index_to_remove(deepest, point.local_point1);
            self.points.swap_remove(remove);
        }
        self.points.push(point);
    }

    /// Copy the impulses of a solved constraint back for warm-starting.
    pub fn store_impulses(&mut self, solved: &ContactConstraint) {
        for (point, solved) in self.points.iter_mut().zip(solved.solved_points()) {
            point.normal_impulse = solved.normal_impulse;
            point.friction_impulses = solved.friction_impulses;
            point.friction_vectors = solved.friction_vectors;
        }
    }

    /// Index of the deepest cached point, or `None` if the incoming point is
    /// deeper than all of them.
    fn deepest_index(&self, new_depth: f32) -> Option<usize> {
        let mut deepest = None;
        let mut max_depth = new_depth;
        for (i, p) in self.points.iter().enumerate() {
            if p.penetration_depth > max_depth {
                max_depth = p.penetration_depth;
                deepest = Some(i);
            }
        }
        deepest
    }

    /// Pick the cached point whose removal leaves the largest contact area.
    fn index_to_remove(&self, deepest: Option<usize>, new_local: Vec3) -> usize {
        let mut best = 0;
        let mut best_area = f32::NEG_INFINITY;
        for i in 0..self.points.len() {
            if Some(i) == deepest {
                continue;
            }
            let mut quad = [new_local; 4];
            let mut n = 0;
            for (j, p) in self.points.iter().enumerate() {
                if j != i {
                    quad[n] = p.local_point1;
                    n += 1;
                }
            }
            let area = quad_area_squared(&quad);
            if area > best_area {
                best_area = area;
                best = i;
            }
        }
        best
    }
}

/// Largest squared diagonal cross product over the three quad orderings.
fn quad_area_squared(q: &[Vec3; 4]) -> f32 {
    let a = (q[0] - q[1]).cross(q[2] - q[3]).length_squared();
    let b = (q[0] - q[2]).cross(q[1] - q[3]).length_squared();
    let c = (q[0] - q[3]).cross(q[1] - q[2]).length_squared();
    a.max(b).max(c)
}
