//! Non-penetration and Coulomb friction for the points of one manifold.

use glam::Vec3;

use super::{ConstraintBase, ConstraintSolverData, PositionCorrection, BETA};
use crate::physics::broadphase::BodyIndexPair;
use crate::physics::contact::ContactManifold;
use crate::physics::rigid_body::RigidBody;

/// Penetration allowed before position correction kicks in.
pub const PENETRATION_SLOP: f32 = 0.005;

/// Largest position correction applied by one NGS pass.
const MAX_LINEAR_CORRECTION: f32 = 0.2;

/// Solver state of one contact point.
#[derive(Debug, Clone, Copy)]
pub struct ContactPointConstraint {
    local_point1: Vec3,
    local_point2: Vec3,
    normal: Vec3,
    penetration_depth: f32,
    r1: Vec3,
    r2: Vec3,
    inverse_normal_mass: f32,
    inverse_friction_mass: [f32; 2],
    restitution_bias: f32,
    position_bias: f32,
    /// Accumulated normal impulse.
    pub normal_impulse: f32,
    /// Accumulated friction impulses along `friction_vectors`.
    pub friction_impulses: [f32; 2],
    pub friction_vectors: [Vec3; 2],
}

/// Contact constraint built from a [`ContactManifold`] for one step.
#[derive(Debug, Clone)]
pub struct ContactConstraint {
    pub(crate) base: ConstraintBase,
    key: BodyIndexPair,
    friction: f32,
    restitution: f32,
    restitution_velocity_threshold: f32,
    points: Vec<ContactPointConstraint>,
}

impl ContactConstraint {
    /// `body1` and `body2` must be the first and second bodies of the manifold key.
    pub fn new(
        manifold: &ContactManifold,
        body1: &RigidBody,
        body2: &RigidBody,
        position_correction: PositionCorrection,
        restitution_velocity_threshold: f32,
    ) -> Self {
        let points = manifold
            .points()
            .iter()
            .map(|p| ContactPointConstraint {
                local_point1: p.local_point1,
                local_point2: p.local_point2,
                normal: p.normal,
                penetration_depth: p.penetration_depth,
                r1: Vec3::ZERO,
                r2: Vec3::ZERO,
                inverse_normal_mass: 0.0,
                inverse_friction_mass: [0.0; 2],
                restitution_bias: 0.0,
                position_bias: 0.0,
                normal_impulse: p.normal_impulse,
                friction_impulses: p.friction_impulses,
                friction_vectors: p.friction_vectors,
            })
            .collect();
        let mut base = ConstraintBase::new(body1.id(), body2.id(), position_correction);
        base.collide_connected = true;
        Self {
            base,
            key: manifold.key(),
            friction: mix_friction(body1.friction, body2.friction),
            restitution: mix_restitution(body1.restitution, body2.restitution),
            restitution_velocity_threshold,
            points,
        }
    }

    pub fn key(&self) -> BodyIndexPair {
        self.key
    }

    pub fn friction(&self) -> f32 {
        self.friction
    }

    pub fn restitution(&self) -> f32 {
        self.restitution
    }

    /// Solved points, in manifold order.
    pub fn solved_points(&self) -> impl Iterator<Item = &ContactPointConstraint> {
        self.points.iter()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub(crate) fn init_before_solve(&mut self, data: &ConstraintSolverData) -> bool {
        if self.points.is_empty() || !self.base.resolve(data) {
            return false;
        }
        let slots = self.base.slots;
        let (i1, i2) = (slots.index1, slots.index2);
        let q1 = data.orientations[i1];
        let q2 = data.orientations[i2];
        let (v1, w1) = (data.linear_velocities[i1], data.angular_velocities[i1]);
        let (v2, w2) = (data.linear_velocities[i2], data.angular_velocities[i2]);
        let bias_factor = self.base.bias_factor(data);
        let warm = data.is_warm_starting_active;

        for point in &mut self.points {
            point.r1 = q1 * point.local_point1;
            point.r2 = q2 * point.local_point2;
            let n = point.normal;

            let r1_cross_n = point.r1.cross(n);
            let r2_cross_n = point.r2.cross(n);
            let k = slots.inverse_mass_sum()
                + r1_cross_n.dot(slots.i1 * r1_cross_n)
                + r2_cross_n.dot(slots.i2 * r2_cross_n);
            point.inverse_normal_mass = if k > 0.0 { 1.0 / k } else { 0.0 };

            let dv = v2 + w2.cross(point.r2) - v1 - w1.cross(point.r1);
            let approach = dv.dot(n);
            point.restitution_bias = if approach < -self.restitution_velocity_threshold {
                self.restitution * approach
            } else {
                0.0
            };
            point.position_bias =
                -bias_factor * (point.penetration_depth - PENETRATION_SLOP).max(0.0);

            // Keep last step's friction basis if it still fits the normal.
            let keep_basis = warm
                && point.friction_vectors[0].length_squared() > 0.5
                && point.friction_vectors[0].dot(n).abs() < 0.1;
            if !keep_basis {
                point.friction_vectors = friction_basis(dv, n);
                point.friction_impulses = [0.0; 2];
            }

            for (t, inverse_mass) in point
                .friction_vectors
                .iter()
                .zip(point.inverse_friction_mass.iter_mut())
            {
                let r1_cross_t = point.r1.cross(*t);
                let r2_cross_t = point.r2.cross(*t);
                let k = slots.inverse_mass_sum()
                    + r1_cross_t.dot(slots.i1 * r1_cross_t)
                    + r2_cross_t.dot(slots.i2 * r2_cross_t);
                *inverse_mass = if k > 0.0 { 1.0 / k } else { 0.0 };
            }

            if !warm {
                point.normal_impulse = 0.0;
                point.friction_impulses = [0.0; 2];
            }
        }
        true
    }

    pub(crate) fn warmstart(&mut self, data: &mut ConstraintSolverData) {
        let slots = self.base.slots;
        for point in &self.points {
            let p = point.normal * point.normal_impulse
                + point.friction_vectors[0] * point.friction_impulses[0]
                + point.friction_vectors[1] * point.friction_impulses[1];
            slots.apply_velocity_impulse(data, -p, -point.r1.cross(p), p, point.r2.cross(p));
        }
    }

    pub(crate) fn solve_velocity_constraint(&mut self, data: &mut ConstraintSolverData) {
        let slots = self.base.slots;
        let (i1, i2) = (slots.index1, slots.index2);
        let friction = self.friction;

        for point in &mut self.points {
            let (r1, r2) = (point.r1, point.r2);
            let relative_velocity = |data: &ConstraintSolverData| {
                data.linear_velocities[i2] + data.angular_velocities[i2].cross(r2)
                    - data.linear_velocities[i1]
                    - data.angular_velocities[i1].cross(r1)
            };

            // Normal row.
            let jv = relative_velocity(data).dot(point.normal);
            let mut delta = -point.inverse_normal_mass
                * (jv + point.restitution_bias + point.position_bias);
            let previous = point.normal_impulse;
            point.normal_impulse = (previous + delta).max(0.0);
            delta = point.normal_impulse - previous;
            let p = point.normal * delta;
            slots.apply_velocity_impulse(data, -p, -r1.cross(p), p, r2.cross(p));

            // Friction rows, bounded by the normal impulse.
            let max_friction = friction * point.normal_impulse;
            for k in 0..2 {
                let t = point.friction_vectors[k];
                let jv = relative_velocity(data).dot(t);
                let mut delta = -point.inverse_friction_mass[k] * jv;
                let previous = point.friction_impulses[k];
                point.friction_impulses[k] = (previous + delta).clamp(-max_friction, max_friction);
                delta = point.friction_impulses[k] - previous;
                let p = t * delta;
                slots.apply_velocity_impulse(data, -p, -r1.cross(p), p, r2.cross(p));
            }
        }
    }

    pub(crate) fn solve_position_constraint(&mut self, data: &mut ConstraintSolverData) {
        self.base.slots.refresh_inertia(data);
        let slots = self.base.slots;
        let (i1, i2) = (slots.index1, slots.index2);

        for point in &self.points {
            let q1 = data.orientations[i1];
            let q2 = data.orientations[i2];
            let r1 = q1 * point.local_point1;
            let r2 = q2 * point.local_point2;
            let p1 = data.positions[i1] + r1;
            let p2 = data.positions[i2] + r2;
            let n = point.normal;

            let depth = (p1 - p2).dot(n);
            let error = (PENETRATION_SLOP - depth).clamp(-MAX_LINEAR_CORRECTION, 0.0);
            if error >= 0.0 {
                continue;
            }

            let r1_cross_n = r1.cross(n);
            let r2_cross_n = r2.cross(n);
            let k = slots.inverse_mass_sum()
                + r1_cross_n.dot(slots.i1 * r1_cross_n)
                + r2_cross_n.dot(slots.i2 * r2_cross_n);
            if k <= 0.0 {
                continue;
            }
            let lambda = -BETA * error / k;
            let p = n * lambda;
            slots.apply_position_impulse(data, -p, -r1.cross(p), p, r2.cross(p));
        }
    }

    /// Deepest current penetration at the context's poses.
    pub fn max_penetration(&self, data: &ConstraintSolverData) -> f32 {
        let (Some(i1), Some(i2)) = (
            data.index_of(self.base.body1),
            data.index_of(self.base.body2),
        ) else {
            return 0.0;
        };
        self.points
            .iter()
            .map(|point| {
                let p1 = data.positions[i1] + data.orientations[i1] * point.local_point1;
                let p2 = data.positions[i2] + data.orientations[i2] * point.local_point2;
                (p1 - p2).dot(point.normal)
            })
            .fold(f32::NEG_INFINITY, f32::max)
    }
}

/// Tangent basis along the sliding direction, or any basis when not sliding.
fn friction_basis(relative_velocity: Vec3, normal: Vec3) -> [Vec3; 2] {
    let tangent_velocity = relative_velocity - normal * relative_velocity.dot(normal);
    let t1 = if tangent_velocity.length_squared() > 1e-12 {
        tangent_velocity.normalize()
    } else {
        normal.any_orthonormal_vector()
    };
    [t1, normal.cross(t1)]
}

/// Combined friction coefficient of two bodies.
pub fn mix_friction(friction1: f32, friction2: f32) -> f32 {
    (friction1 * friction2).max(0.0).sqrt()
}

/// Combined restitution of two bodies.
pub fn mix_restitution(restitution1: f32, restitution2: f32) -> f32 {
    restitution1.max(restitution2)
}
