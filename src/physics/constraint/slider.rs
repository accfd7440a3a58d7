//! Slider (prismatic) joint with optional translation limits and motor.

use glam::{Mat3, Quat, Vec3};

use super::{ConstraintBase, ConstraintSolverData, JointLimits, JointMotor, PositionCorrection};
use crate::physics::math::{inverse_2x2_or_zero, inverse_or_zero, mul_2x2, Transform};
use crate::physics::rigid_body::BodyId;

/// One translational degree of freedom along the slider axis.
#[derive(Debug, Clone)]
pub struct SliderJoint {
    pub(crate) base: ConstraintBase,
    local_anchor1: Vec3,
    local_anchor2: Vec3,
    local_axis1: Vec3,
    init_orientation_difference_inv: Quat,
    limits: Option<JointLimits>,
    motor: Option<JointMotor>,

    // Per-step data.
    r1: Vec3,
    r2: Vec3,
    axis: Vec3,
    n1: Vec3,
    n2: Vec3,
    r2_cross_n1: Vec3,
    r2_cross_n2: Vec3,
    r2_cross_axis: Vec3,
    r1_plus_u_cross_n1: Vec3,
    r1_plus_u_cross_n2: Vec3,
    r1_plus_u_cross_axis: Vec3,
    inverse_mass_matrix_translation: [[f32; 2]; 2],
    inverse_mass_matrix_rotation: Mat3,
    inverse_mass_limit: f32,
    inverse_mass_motor: f32,
    bias_translation: (f32, f32),
    bias_rotation: Vec3,
    bias_lower_limit: f32,
    bias_upper_limit: f32,
    is_lower_limit_violated: bool,
    is_upper_limit_violated: bool,

    // Accumulated impulses.
    impulse_translation: (f32, f32),
    impulse_rotation: Vec3,
    impulse_lower_limit: f32,
    impulse_upper_limit: f32,
    impulse_motor: f32,
}

/// Geometry of the slider at one pair of poses.
struct SliderFrame {
    u: Vec3,
    axis: Vec3,
    n1: Vec3,
    n2: Vec3,
}

impl SliderJoint {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        body1: BodyId,
        body2: BodyId,
        transform1: &Transform,
        transform2: &Transform,
        anchor: Vec3,
        axis: Vec3,
        limits: Option<JointLimits>,
        motor: Option<JointMotor>,
        position_correction: PositionCorrection,
    ) -> Self {
        let q1 = transform1.orientation;
        let q2 = transform2.orientation;
        Self {
            base: ConstraintBase::new(body1, body2, position_correction),
            local_anchor1: transform1.inverse_transform_point(anchor),
            local_anchor2: transform2.inverse_transform_point(anchor),
            local_axis1: transform1.inverse_rotate(axis).normalize(),
            init_orientation_difference_inv: (q2 * q1.inverse()).normalize().inverse(),
            limits,
            motor,
            r1: Vec3::ZERO,
            r2: Vec3::ZERO,
            axis: Vec3::ZERO,
            n1: Vec3::ZERO,
            n2: Vec3::ZERO,
            r2_cross_n1: Vec3::ZERO,
            r2_cross_n2: Vec3::ZERO,
            r2_cross_axis: Vec3::ZERO,
            r1_plus_u_cross_n1: Vec3::ZERO,
            r1_plus_u_cross_n2: Vec3::ZERO,
            r1_plus_u_cross_axis: Vec3::ZERO,
            inverse_mass_matrix_translation: [[0.0; 2]; 2],
            inverse_mass_matrix_rotation: Mat3::ZERO,
            inverse_mass_limit: 0.0,
            inverse_mass_motor: 0.0,
            bias_translation: (0.0, 0.0),
            bias_rotation: Vec3::ZERO,
            bias_lower_limit: 0.0,
            bias_upper_limit: 0.0,
            is_lower_limit_violated: false,
            is_upper_limit_violated: false,
            impulse_translation: (0.0, 0.0),
            impulse_rotation: Vec3::ZERO,
            impulse_lower_limit: 0.0,
            impulse_upper_limit: 0.0,
            impulse_motor: 0.0,
        }
    }

    pub fn limits(&self) -> Option<JointLimits> {
        self.limits
    }

    pub fn motor(&self) -> Option<JointMotor> {
        self.motor
    }

    pub fn set_motor(&mut self, motor: Option<JointMotor>) {
        self.motor = motor;
        self.impulse_motor = 0.0;
    }

    /// Signed displacement of anchor 2 from anchor 1 along the slider axis.
    pub fn translation(&self, data: &ConstraintSolverData) -> f32 {
        let (Some(i1), Some(i2)) = (
            data.index_of(self.base.body1),
            data.index_of(self.base.body2),
        ) else {
            return 0.0;
        };
        let frame = self.frame(data, i1, i2);
        frame.u.dot(frame.axis)
    }

    fn frame(&self, data: &ConstraintSolverData, i1: usize, i2: usize) -> SliderFrame {
        let q1 = data.orientations[i1];
        let q2 = data.orientations[i2];
        let r1 = q1 * self.local_anchor1;
        let r2 = q2 * self.local_anchor2;
        let u = data.positions[i2] + r2 - data.positions[i1] - r1;
        let axis = (q1 * self.local_axis1).normalize();
        let n1 = axis.any_orthonormal_vector();
        let n2 = axis.cross(n1);
        SliderFrame { u, axis, n1, n2 }
    }

    /// Recompute lever arms and the cross terms of every row.
    fn compute_geometry(&mut self, data: &ConstraintSolverData) -> Vec3 {
        let (i1, i2) = (self.base.slots.index1, self.base.slots.index2);
        self.r1 = data.orientations[i1] * self.local_anchor1;
        self.r2 = data.orientations[i2] * self.local_anchor2;
        let frame = self.frame(data, i1, i2);
        self.axis = frame.axis;
        self.n1 = frame.n1;
        self.n2 = frame.n2;

        let r1_plus_u = self.r1 + frame.u;
        self.r2_cross_n1 = self.r2.cross(self.n1);
        self.r2_cross_n2 = self.r2.cross(self.n2);
        self.r2_cross_axis = self.r2.cross(self.axis);
        self.r1_plus_u_cross_n1 = r1_plus_u.cross(self.n1);
        self.r1_plus_u_cross_n2 = r1_plus_u.cross(self.n2);
        self.r1_plus_u_cross_axis = r1_plus_u.cross(self.axis);
        frame.u
    }

    fn translation_mass_matrix(&self) -> [[f32; 2]; 2] {
        let slots = &self.base.slots;
        let sum = slots.inverse_mass_sum();
        let i1_n1 = slots.i1 * self.r1_plus_u_cross_n1;
        let i1_n2 = slots.i1 * self.r1_plus_u_cross_n2;
        let i2_n1 = slots.i2 * self.r2_cross_n1;
        let i2_n2 = slots.i2 * self.r2_cross_n2;
        inverse_2x2_or_zero(
            sum + self.r1_plus_u_cross_n1.dot(i1_n1) + self.r2_cross_n1.dot(i2_n1),
            self.r1_plus_u_cross_n1.dot(i1_n2) + self.r2_cross_n1.dot(i2_n2),
            self.r1_plus_u_cross_n2.dot(i1_n1) + self.r2_cross_n2.dot(i2_n1),
            sum + self.r1_plus_u_cross_n2.dot(i1_n2) + self.r2_cross_n2.dot(i2_n2),
        )
    }

    fn limit_mass(&self) -> f32 {
        let slots = &self.base.slots;
        let k = slots.inverse_mass_sum()
            + self.r1_plus_u_cross_axis.dot(slots.i1 * self.r1_plus_u_cross_axis)
            + self.r2_cross_axis.dot(slots.i2 * self.r2_cross_axis);
        if k > 0.0 {
            1.0 / k
        } else {
            0.0
        }
    }

    /// Orientation error `2 * vec(q2 * q0^-1 * q1^-1)`.
    fn rotation_error(&self, q1: Quat, q2: Quat) -> Vec3 {
        let mut q_error = q2 * self.init_orientation_difference_inv * q1.inverse();
        if q_error.w < 0.0 {
            q_error = -q_error;
        }
        Vec3::new(q_error.x, q_error.y, q_error.z) * 2.0
    }

    fn reset_impulses(&mut self) {
        self.impulse_translation = (0.0, 0.0);
        self.impulse_rotation = Vec3::ZERO;
        self.impulse_lower_limit = 0.0;
        self.impulse_upper_limit = 0.0;
        self.impulse_motor = 0.0;
    }

    /// Linear impulse on body 2 and angular impulses on both bodies for the
    /// two translation rows. Body 1 receives the opposite linear impulse.
    fn translation_impulse(&self, lambda: (f32, f32)) -> (Vec3, Vec3, Vec3) {
        let linear = self.n1 * lambda.0 + self.n2 * lambda.1;
        let angular1 = -self.r1_plus_u_cross_n1 * lambda.0 - self.r1_plus_u_cross_n2 * lambda.1;
        let angular2 = self.r2_cross_n1 * lambda.0 + self.r2_cross_n2 * lambda.1;
        (linear, angular1, angular2)
    }

    /// Jacobian row along the slider axis applied to the context velocities.
    fn axis_jv(&self, data: &ConstraintSolverData) -> f32 {
        let (i1, i2) = (self.base.slots.index1, self.base.slots.index2);
        self.axis.dot(data.linear_velocities[i2])
            + self.r2_cross_axis.dot(data.angular_velocities[i2])
            - self.axis.dot(data.linear_velocities[i1])
            - self.r1_plus_u_cross_axis.dot(data.angular_velocities[i1])
    }

    pub(crate) fn init_before_solve(&mut self, data: &ConstraintSolverData) -> bool {
        if !self.base.resolve(data) {
            return false;
        }
        let slots = self.base.slots;
        let q1 = data.orientations[slots.index1];
        let q2 = data.orientations[slots.index2];

        let u = self.compute_geometry(data);
        let u_dot_axis = u.dot(self.axis);

        if let Some(limits) = self.limits {
            let lower_violated = u_dot_axis - limits.lower <= 0.0;
            let upper_violated = limits.upper - u_dot_axis <= 0.0;
            if lower_violated != self.is_lower_limit_violated {
                self.impulse_lower_limit = 0.0;
            }
            if upper_violated != self.is_upper_limit_violated {
                self.impulse_upper_limit = 0.0;
            }
            self.is_lower_limit_violated = lower_violated;
            self.is_upper_limit_violated = upper_violated;
        }

        self.inverse_mass_matrix_translation = self.translation_mass_matrix();
        self.inverse_mass_matrix_rotation = inverse_or_zero(slots.i1 + slots.i2);

        let bias_factor = self.base.bias_factor(data);
        self.bias_translation = (u.dot(self.n1) * bias_factor, u.dot(self.n2) * bias_factor);
        self.bias_rotation = self.rotation_error(q1, q2) * bias_factor;

        if let Some(limits) = self.limits {
            self.inverse_mass_limit = self.limit_mass();
            self.bias_lower_limit = (u_dot_axis - limits.lower) * bias_factor;
            self.bias_upper_limit = (limits.upper - u_dot_axis) * bias_factor;
        }
        if self.motor.is_some() {
            let sum = slots.inverse_mass_sum();
            self.inverse_mass_motor = if sum > 0.0 { 1.0 / sum } else { 0.0 };
        }

        if !data.is_warm_starting_active {
            self.reset_impulses();
        }
        true
    }

    pub(crate) fn warmstart(&mut self, data: &mut ConstraintSolverData) {
        let (linear, angular1, angular2) = self.translation_impulse(self.impulse_translation);
        let limit = self.impulse_lower_limit - self.impulse_upper_limit;
        let motor = self.impulse_motor;

        let linear2 = linear + self.axis * (limit + motor);
        let linear1 = -linear - self.axis * (limit + motor);
        let angular1 =
            angular1 - self.impulse_rotation - self.r1_plus_u_cross_axis * limit;
        let angular2 = angular2 + self.impulse_rotation + self.r2_cross_axis * limit;

        self.base
            .slots
            .apply_velocity_impulse(data, linear1, angular1, linear2, angular2);
    }

    pub(crate) fn solve_velocity_constraint(&mut self, data: &mut ConstraintSolverData) {
        let slots = self.base.slots;
        let (i1, i2) = (slots.index1, slots.index2);

        // Translation rows.
        let (v1, w1) = (data.linear_velocities[i1], data.angular_velocities[i1]);
        let (v2, w2) = (data.linear_velocities[i2], data.angular_velocities[i2]);
        let jv1 = self.n1.dot(v2) + self.r2_cross_n1.dot(w2)
            - self.n1.dot(v1)
            - self.r1_plus_u_cross_n1.dot(w1);
        let jv2 = self.n2.dot(v2) + self.r2_cross_n2.dot(w2)
            - self.n2.dot(v1)
            - self.r1_plus_u_cross_n2.dot(w1);
        let delta = mul_2x2(
            &self.inverse_mass_matrix_translation,
            -jv1 - self.bias_translation.0,
            -jv2 - self.bias_translation.1,
        );
        self.impulse_translation.0 += delta.0;
        self.impulse_translation.1 += delta.1;
        let (linear, angular1, angular2) = self.translation_impulse(delta);
        slots.apply_velocity_impulse(data, -linear, angular1, linear, angular2);

        // Rotation rows.
        let jv = data.angular_velocities[i2] - data.angular_velocities[i1];
        let delta = self.inverse_mass_matrix_rotation * (-jv - self.bias_rotation);
        self.impulse_rotation += delta;
        slots.apply_velocity_impulse(data, Vec3::ZERO, -delta, Vec3::ZERO, delta);

        if self.limits.is_some() {
            if self.is_lower_limit_violated {
                let jv = self.axis_jv(data);
                let mut delta = self.inverse_mass_limit * (-jv - self.bias_lower_limit);
                let previous = self.impulse_lower_limit;
                self.impulse_lower_limit = (previous + delta).max(0.0);
                delta = self.impulse_lower_limit - previous;
                slots.apply_velocity_impulse(
                    data,
                    -self.axis * delta,
                    -self.r1_plus_u_cross_axis * delta,
                    self.axis * delta,
                    self.r2_cross_axis * delta,
                );
            }
            if self.is_upper_limit_violated {
                let jv = -self.axis_jv(data);
                let mut delta = self.inverse_mass_limit * (-jv - self.bias_upper_limit);
                let previous = self.impulse_upper_limit;
                self.impulse_upper_limit = (previous + delta).max(0.0);
                delta = self.impulse_upper_limit - previous;
                slots.apply_velocity_impulse(
                    data,
                    self.axis * delta,
                    self.r1_plus_u_cross_axis * delta,
                    -self.axis * delta,
                    -self.r2_cross_axis * delta,
                );
            }
        }

        if let Some(motor) = self.motor {
            let jv = self.axis.dot(data.linear_velocities[i2] - data.linear_velocities[i1]);
            let max_impulse = motor.max_force * data.time_step;
            let mut delta = self.inverse_mass_motor * (motor.speed - jv);
            let previous = self.impulse_motor;
            self.impulse_motor = (previous + delta).clamp(-max_impulse, max_impulse);
            delta = self.impulse_motor - previous;
            slots.apply_velocity_impulse(
                data,
                -self.axis * delta,
                Vec3::ZERO,
                self.axis * delta,
                Vec3::ZERO,
            );
        }
    }

    pub(crate) fn solve_position_constraint(&mut self, data: &mut ConstraintSolverData) {
        self.base.slots.refresh_inertia(data);
        let slots = self.base.slots;
        let q1 = data.orientations[slots.index1];
        let q2 = data.orientations[slots.index2];

        let u = self.compute_geometry(data);
        let u_dot_axis = u.dot(self.axis);

        // Translation.
        let inverse_translation = self.translation_mass_matrix();
        let lambda = mul_2x2(&inverse_translation, -u.dot(self.n1), -u.dot(self.n2));
        let (linear, angular1, angular2) = self.translation_impulse(lambda);
        slots.apply_position_impulse(data, -linear, angular1, linear, angular2);

        // Rotation.
        let inverse_rotation = inverse_or_zero(slots.i1 + slots.i2);
        let lambda = inverse_rotation * -self.rotation_error(q1, q2);
        slots.apply_position_impulse(data, Vec3::ZERO, -lambda, Vec3::ZERO, lambda);

        // Limits.
        if let Some(limits) = self.limits {
            let lower_violated = u_dot_axis - limits.lower <= 0.0;
            let upper_violated = limits.upper - u_dot_axis <= 0.0;
            if lower_violated || upper_violated {
                let inverse_limit = self.limit_mass();
                if lower_violated {
                    let lambda = inverse_limit * -(u_dot_axis - limits.lower);
                    slots.apply_position_impulse(
                        data,
                        -self.axis * lambda,
                        -self.r1_plus_u_cross_axis * lambda,
                        self.axis * lambda,
                        self.r2_cross_axis * lambda,
                    );
                }
                if upper_violated {
                    let lambda = inverse_limit * -(limits.upper - u_dot_axis);
                    slots.apply_position_impulse(
                        data,
                        self.axis * lambda,
                        self.r1_plus_u_cross_axis * lambda,
                        -self.axis * lambda,
                        -self.r2_cross_axis * lambda,
                    );
                }
            }
        }
    }
}
