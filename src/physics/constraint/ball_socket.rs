//! Ball-and-socket joint: three translation rows pinning one anchor point.

use glam::{Mat3, Vec3};

use super::{ConstraintBase, ConstraintSolverData, PositionCorrection};
use crate::physics::math::{inverse_or_zero, Transform};
use crate::physics::rigid_body::BodyId;

/// Keeps an anchor point of body 1 on the same anchor point of body 2.
/// Rotation is free on all three axes.
#[derive(Debug, Clone)]
pub struct BallAndSocketJoint {
    pub(crate) base: ConstraintBase,
    local_anchor1: Vec3,
    local_anchor2: Vec3,
    r1: Vec3,
    r2: Vec3,
    inverse_mass_matrix: Mat3,
    bias: Vec3,
    impulse: Vec3,
}

impl BallAndSocketJoint {
    pub(crate) fn new(
        body1: BodyId,
        body2: BodyId,
        transform1: &Transform,
        transform2: &Transform,
        anchor: Vec3,
        position_correction: PositionCorrection,
    ) -> Self {
        Self {
            base: ConstraintBase::new(body1, body2, position_correction),
            local_anchor1: transform1.inverse_transform_point(anchor),
            local_anchor2: transform2.inverse_transform_point(anchor),
            r1: Vec3::ZERO,
            r2: Vec3::ZERO,
            inverse_mass_matrix: Mat3::ZERO,
            bias: Vec3::ZERO,
            impulse: Vec3::ZERO,
        }
    }

    pub fn local_anchor1(&self) -> Vec3 {
        self.local_anchor1
    }

    pub fn local_anchor2(&self) -> Vec3 {
        self.local_anchor2
    }

    /// Accumulated impulse carried across steps.
    pub fn impulse(&self) -> Vec3 {
        self.impulse
    }

    pub(crate) fn init_before_solve(&mut self, data: &ConstraintSolverData) -> bool {
        if !self.base.resolve(data) {
            return false;
        }
        let slots = self.base.slots;
        let x1 = data.positions[slots.index1];
        let x2 = data.positions[slots.index2];

        self.r1 = data.orientations[slots.index1] * self.local_anchor1;
        self.r2 = data.orientations[slots.index2] * self.local_anchor2;

        self.inverse_mass_matrix = inverse_or_zero(slots.point_mass_matrix(self.r1, self.r2));

        self.bias = (x2 + self.r2 - x1 - self.r1) * self.base.bias_factor(data);

        if !data.is_warm_starting_active {
            self.impulse = Vec3::ZERO;
        }
        true
    }

    pub(crate) fn warmstart(&mut self, data: &mut ConstraintSolverData) {
        let lambda = self.impulse;
        self.base.slots.apply_velocity_impulse(
            data,
            -lambda,
            lambda.cross(self.r1),
            lambda,
            -lambda.cross(self.r2),
        );
    }

    pub(crate) fn solve_velocity_constraint(&mut self, data: &mut ConstraintSolverData) {
        let slots = self.base.slots;
        let v1 = data.linear_velocities[slots.index1];
        let v2 = data.linear_velocities[slots.index2];
        let w1 = data.angular_velocities[slots.index1];
        let w2 = data.angular_velocities[slots.index2];

        let jv = v2 + w2.cross(self.r2) - v1 - w1.cross(self.r1);
        let delta_lambda = self.inverse_mass_matrix * (-jv - self.bias);
        self.impulse += delta_lambda;

        slots.apply_velocity_impulse(
            data,
            -delta_lambda,
            delta_lambda.cross(self.r1),
            delta_lambda,
            -delta_lambda.cross(self.r2),
        );
    }

    pub(crate) fn solve_position_constraint(&mut self, data: &mut ConstraintSolverData) {
        let slots = &mut self.base.slots;
        slots.refresh_inertia(data);
        let x1 = data.positions[slots.index1];
        let x2 = data.positions[slots.index2];

        self.r1 = data.orientations[slots.index1] * self.local_anchor1;
        self.r2 = data.orientations[slots.index2] * self.local_anchor2;

        let inverse_mass_matrix = inverse_or_zero(slots.point_mass_matrix(self.r1, self.r2));
        let error = x2 + self.r2 - x1 - self.r1;
        let lambda = inverse_mass_matrix * -error;

        slots.apply_position_impulse(
            data,
            -lambda,
            lambda.cross(self.r1),
            lambda,
            -lambda.cross(self.r2),
        );
    }

    /// World-space distance between the two anchors at the context's poses.
    pub fn position_error(&self, data: &ConstraintSolverData) -> f32 {
        let Some(i1) = data.index_of(self.base.body1) else {
            return 0.0;
        };
        let Some(i2) = data.index_of(self.base.body2) else {
            return 0.0;
        };
        let p1 = data.positions[i1] + data.orientations[i1] * self.local_anchor1;
        let p2 = data.positions[i2] + data.orientations[i2] * self.local_anchor2;
        (p2 - p1).length()
    }
}
