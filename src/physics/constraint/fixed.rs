//! Fixed joint: no relative motion at all.

use glam::{Mat3, Quat, Vec3};

use super::{ConstraintBase, ConstraintSolverData, PositionCorrection};
use crate::physics::math::{inverse_or_zero, Transform};
use crate::physics::rigid_body::BodyId;

#[derive(Debug, Clone)]
pub struct FixedJoint {
    pub(crate) base: ConstraintBase,
    local_anchor1: Vec3,
    local_anchor2: Vec3,
    init_orientation_difference_inv: Quat,

    r1: Vec3,
    r2: Vec3,
    inverse_mass_matrix_translation: Mat3,
    inverse_mass_matrix_rotation: Mat3,
    bias_translation: Vec3,
    bias_rotation: Vec3,

    impulse_translation: Vec3,
    impulse_rotation: Vec3,
}

impl FixedJoint {
    pub(crate) fn new(
        body1: BodyId,
        body2: BodyId,
        transform1: &Transform,
        transform2: &Transform,
        anchor: Vec3,
        position_correction: PositionCorrection,
    ) -> Self {
        let q1 = transform1.orientation;
        let q2 = transform2.orientation;
        Self {
            base: ConstraintBase::new(body1, body2, position_correction),
            local_anchor1: transform1.inverse_transform_point(anchor),
            local_anchor2: transform2.inverse_transform_point(anchor),
            init_orientation_difference_inv: (q2 * q1.inverse()).normalize().inverse(),
            r1: Vec3::ZERO,
            r2: Vec3::ZERO,
            inverse_mass_matrix_translation: Mat3::ZERO,
            inverse_mass_matrix_rotation: Mat3::ZERO,
            bias_translation: Vec3::ZERO,
            bias_rotation: Vec3::ZERO,
            impulse_translation: Vec3::ZERO,
            impulse_rotation: Vec3::ZERO,
        }
    }

    fn rotation_error(&self, q1: Quat, q2: Quat) -> Vec3 {
        let mut q_error = q2 * self.init_orientation_difference_inv * q1.inverse();
        if q_error.w < 0.0 {
            q_error = -q_error;
        }
        Vec3::new(q_error.x, q_error.y, q_error.z) * 2.0
    }

    pub(crate) fn init_before_solve(&mut self, data: &ConstraintSolverData) -> bool {
        if !self.base.resolve(data) {
            return false;
        }
        let slots = self.base.slots;
        let x1 = data.positions[slots.index1];
        let x2 = data.positions[slots.index2];
        let q1 = data.orientations[slots.index1];
        let q2 = data.orientations[slots.index2];

        self.r1 = q1 * self.local_anchor1;
        self.r2 = q2 * self.local_anchor2;

        self.inverse_mass_matrix_translation =
            inverse_or_zero(slots.point_mass_matrix(self.r1, self.r2));
        self.inverse_mass_matrix_rotation = inverse_or_zero(slots.i1 + slots.i2);

        let bias_factor = self.base.bias_factor(data);
        self.bias_translation = (x2 + self.r2 - x1 - self.r1) * bias_factor;
        self.bias_rotation = self.rotation_error(q1, q2) * bias_factor;

        if !data.is_warm_starting_active {
            self.impulse_translation = Vec3::ZERO;
            self.impulse_rotation = Vec3::ZERO;
        }
        true
    }

    pub(crate) fn warmstart(&mut self, data: &mut ConstraintSolverData) {
        let t = self.impulse_translation;
        let r = self.impulse_rotation;
        self.base.slots.apply_velocity_impulse(
            data,
            -t,
            t.cross(self.r1) - r,
            t,
            -t.cross(self.r2) + r,
        );
    }

    pub(crate) fn solve_velocity_constraint(&mut self, data: &mut ConstraintSolverData) {
        let slots = self.base.slots;
        let (i1, i2) = (slots.index1, slots.index2);

        let jv = data.linear_velocities[i2] + data.angular_velocities[i2].cross(self.r2)
            - data.linear_velocities[i1]
            - data.angular_velocities[i1].cross(self.r1);
        let delta = self.inverse_mass_matrix_translation * (-jv - self.bias_translation);
        self.impulse_translation += delta;
        slots.apply_velocity_impulse(
            data,
            -delta,
            delta.cross(self.r1),
            delta,
            -delta.cross(self.r2),
        );

        let jv = data.angular_velocities[i2] - data.angular_velocities[i1];
        let delta = self.inverse_mass_matrix_rotation * (-jv - self.bias_rotation);
        self.impulse_rotation += delta;
        slots.apply_velocity_impulse(data, Vec3::ZERO, -delta, Vec3::ZERO, delta);
    }

    pub(crate) fn solve_position_constraint(&mut self, data: &mut ConstraintSolverData) {
        self.base.slots.refresh_inertia(data);
        let slots = self.base.slots;
        let x1 = data.positions[slots.index1];
        let x2 = data.positions[slots.index2];
        let q1 = data.orientations[slots.index1];
        let q2 = data.orientations[slots.index2];

        self.r1 = q1 * self.local_anchor1;
        self.r2 = q2 * self.local_anchor2;

        let inverse_mass = inverse_or_zero(slots.point_mass_matrix(self.r1, self.r2));
        let error = x2 + self.r2 - x1 - self.r1;
        let lambda = inverse_mass * -error;
        slots.apply_position_impulse(
            data,
            -lambda,
            lambda.cross(self.r1),
            lambda,
            -lambda.cross(self.r2),
        );

        // Orientations moved: reload before the rotation rows.
        let q1 = data.orientations[slots.index1];
        let q2 = data.orientations[slots.index2];
        let inverse_rotation = inverse_or_zero(slots.i1 + slots.i2);
        let lambda = inverse_rotation * -self.rotation_error(q1, q2);
        slots.apply_position_impulse(data, Vec3::ZERO, -lambda, Vec3::ZERO, lambda);
    }
}
