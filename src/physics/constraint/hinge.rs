//! Hinge (revolute) joint with optional angle limits and motor.

use std::f32::consts::TAU;

use glam::{Mat3, Quat, Vec3};

use super::{ConstraintBase, ConstraintSolverData, JointLimits, JointMotor, PositionCorrection};
use crate::physics::math::{
    inverse_2x2_or_zero, inverse_or_zero, mul_2x2, normalize_angle, Transform,
};
use crate::physics::rigid_body::BodyId;

/// One rotational degree of freedom around the hinge axis.
#[derive(Debug, Clone)]
pub struct HingeJoint {
    pub(crate) base: ConstraintBase,
    local_anchor1: Vec3,
    local_anchor2: Vec3,
    local_axis1: Vec3,
    local_axis2: Vec3,
    init_orientation_difference_inv: Quat,
    limits: Option<JointLimits>,
    motor: Option<JointMotor>,

    // Per-step data.
    r1: Vec3,
    r2: Vec3,
    a1: Vec3,
    b2_cross_a1: Vec3,
    c2_cross_a1: Vec3,
    inverse_mass_matrix_translation: Mat3,
    inverse_mass_matrix_rotation: [[f32; 2]; 2],
    inverse_mass_limit_motor: f32,
    bias_translation: Vec3,
    bias_rotation: (f32, f32),
    bias_lower_limit: f32,
    bias_upper_limit: f32,
    is_lower_limit_violated: bool,
    is_upper_limit_violated: bool,

    // Accumulated impulses.
    impulse_translation: Vec3,
    impulse_rotation: (f32, f32),
    impulse_lower_limit: f32,
    impulse_upper_limit: f32,
    impulse_motor: f32,
}

impl HingeJoint {
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
            local_axis2: transform2.inverse_rotate(axis).normalize(),
            init_orientation_difference_inv: (q2 * q1.inverse()).normalize().inverse(),
            limits,
            motor,
            r1: Vec3::ZERO,
            r2: Vec3::ZERO,
            a1: Vec3::ZERO,
            b2_cross_a1: Vec3::ZERO,
            c2_cross_a1: Vec3::ZERO,
            inverse_mass_matrix_translation: Mat3::ZERO,
            inverse_mass_matrix_rotation: [[0.0; 2]; 2],
            inverse_mass_limit_motor: 0.0,
            bias_translation: Vec3::ZERO,
            bias_rotation: (0.0, 0.0),
            bias_lower_limit: 0.0,
            bias_upper_limit: 0.0,
            is_lower_limit_violated: false,
            is_upper_limit_violated: false,
            impulse_translation: Vec3::ZERO,
            impulse_rotation: (0.0, 0.0),
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

    /// Current hinge angle at the given orientations, relative to the
    /// orientation difference at creation.
    pub fn hinge_angle(&self, q1: Quat, q2: Quat) -> f32 {
        let a1 = (q1 * self.local_axis1).normalize();
        let current = (q2 * q1.inverse()).normalize();
        let relative = (current * self.init_orientation_difference_inv).normalize();

        let cos_half = relative.w;
        let axis_part = Vec3::new(relative.x, relative.y, relative.z);
        let sin_half_abs = axis_part.length();

        // q and -q are the same rotation: pick the one turning around +a1.
        let angle = if axis_part.dot(a1) >= 0.0 {
            2.0 * sin_half_abs.atan2(cos_half)
        } else {
            2.0 * sin_half_abs.atan2(-cos_half)
        };

        let angle = normalize_angle(angle);
        match self.limits {
            Some(limits) => angle_near_limits(angle, limits.lower, limits.upper),
            None => angle,
        }
    }

    fn reset_impulses(&mut self) {
        self.impulse_translation = Vec3::ZERO;
        self.impulse_rotation = (0.0, 0.0);
        self.impulse_lower_limit = 0.0;
        self.impulse_upper_limit = 0.0;
        self.impulse_motor = 0.0;
    }

    /// World axes from the current orientations.
    fn compute_axes(&mut self, q1: Quat, q2: Quat) {
        self.a1 = (q1 * self.local_axis1).normalize();
        let a2 = (q2 * self.local_axis2).normalize();
        let b2 = a2.any_orthonormal_vector();
        let c2 = a2.cross(b2);
        self.b2_cross_a1 = b2.cross(self.a1);
        self.c2_cross_a1 = c2.cross(self.a1);
    }

    /// Rotation error `(a1 . b2, a1 . c2)` recomputed from the cross terms.
    fn rotation_error(&self, q2: Quat) -> (f32, f32) {
        let a2 = (q2 * self.local_axis2).normalize();
        let b2 = a2.any_orthonormal_vector();
        let c2 = a2.cross(b2);
        (self.a1.dot(b2), self.a1.dot(c2))
    }

    fn rotation_mass_matrix(&self) -> [[f32; 2]; 2] {
        let slots = &self.base.slots;
        let (b, c) = (self.b2_cross_a1, self.c2_cross_a1);
        let (i1b, i1c) = (slots.i1 * b, slots.i1 * c);
        let (i2b, i2c) = (slots.i2 * b, slots.i2 * c);
        inverse_2x2_or_zero(
            b.dot(i1b) + b.dot(i2b),
            b.dot(i1c) + b.dot(i2c),
            c.dot(i1b) + c.dot(i2b),
            c.dot(i1c) + c.dot(i2c),
        )
    }

    fn limit_motor_mass(&self) -> f32 {
        let slots = &self.base.slots;
        let k = self.a1.dot(slots.i1 * self.a1) + self.a1.dot(slots.i2 * self.a1);
        if k > 0.0 {
            1.0 / k
        } else {
            0.0
        }
    }

    /// Angular impulse on body 1 for the two rotation rows.
    fn rotation_impulse(&self, lambda: (f32, f32)) -> Vec3 {
        -self.b2_cross_a1 * lambda.0 - self.c2_cross_a1 * lambda.1
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

        let hinge_angle = self.hinge_angle(q1, q2);
        if let Some(limits) = self.limits {
            let lower_violated = hinge_angle - limits.lower <= 0.0;
            let upper_violated = limits.upper - hinge_angle <= 0.0;
            if lower_violated != self.is_lower_limit_violated {
                self.impulse_lower_limit = 0.0;
            }
            if upper_violated != self.is_upper_limit_violated {
                self.impulse_upper_limit = 0.0;
            }
            self.is_lower_limit_violated = lower_violated;
            self.is_upper_limit_violated = upper_violated;
        }

        self.compute_axes(q1, q2);

        self.inverse_mass_matrix_translation =
            inverse_or_zero(slots.point_mass_matrix(self.r1, self.r2));
        self.inverse_mass_matrix_rotation = self.rotation_mass_matrix();

        let bias_factor = self.base.bias_factor(data);
        self.bias_translation = (x2 + self.r2 - x1 - self.r1) * bias_factor;
        let (e1, e2) = self.rotation_error(q2);
        self.bias_rotation = (e1 * bias_factor, e2 * bias_factor);

        if !data.is_warm_starting_active {
            self.reset_impulses();
        }

        if self.limits.is_some() || self.motor.is_some() {
            self.inverse_mass_limit_motor = self.limit_motor_mass();
        }
        if let Some(limits) = self.limits {
            self.bias_lower_limit = (hinge_angle - limits.lower) * bias_factor;
            self.bias_upper_limit = (limits.upper - hinge_angle) * bias_factor;
        }
        true
    }

    pub(crate) fn warmstart(&mut self, data: &mut ConstraintSolverData) {
        let rotation = self.rotation_impulse(self.impulse_rotation);
        let limits = self.a1 * (self.impulse_upper_limit - self.impulse_lower_limit);
        let motor = -self.a1 * self.impulse_motor;
        let angular1 = self.impulse_translation.cross(self.r1) + rotation + limits + motor;
        let angular2 = -self.impulse_translation.cross(self.r2) - rotation - limits - motor;

        self.base.slots.apply_velocity_impulse(
            data,
            -self.impulse_translation,
            angular1,
            self.impulse_translation,
            angular2,
        );
    }

    pub(crate) fn solve_velocity_constraint(&mut self, data: &mut ConstraintSolverData) {
        let slots = self.base.slots;
        let (i1, i2) = (slots.index1, slots.index2);

        // Translation rows.
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

        // Rotation rows.
        let dw = data.angular_velocities[i2] - data.angular_velocities[i1];
        let jv = (self.b2_cross_a1.dot(dw), self.c2_cross_a1.dot(dw));
        let delta = mul_2x2(
            &self.inverse_mass_matrix_rotation,
            -jv.0 - self.bias_rotation.0,
            -jv.1 - self.bias_rotation.1,
        );
        self.impulse_rotation.0 += delta.0;
        self.impulse_rotation.1 += delta.1;
        let angular = self.rotation_impulse(delta);
        slots.apply_velocity_impulse(data, Vec3::ZERO, angular, Vec3::ZERO, -angular);

        if self.limits.is_some() {
            if self.is_lower_limit_violated {
                let dw = data.angular_velocities[i2] - data.angular_velocities[i1];
                let jv = dw.dot(self.a1);
                let mut delta = self.inverse_mass_limit_motor * (-jv - self.bias_lower_limit);
                let previous = self.impulse_lower_limit;
                self.impulse_lower_limit = (previous + delta).max(0.0);
                delta = self.impulse_lower_limit - previous;
                let angular = self.a1 * delta;
                slots.apply_velocity_impulse(data, Vec3::ZERO, -angular, Vec3::ZERO, angular);
            }
            if self.is_upper_limit_violated {
                let dw = data.angular_velocities[i2] - data.angular_velocities[i1];
                let jv = -dw.dot(self.a1);
                let mut delta = self.inverse_mass_limit_motor * (-jv - self.bias_upper_limit);
                let previous = self.impulse_upper_limit;
                self.impulse_upper_limit = (previous + delta).max(0.0);
                delta = self.impulse_upper_limit - previous;
                let angular = self.a1 * delta;
                slots.apply_velocity_impulse(data, Vec3::ZERO, angular, Vec3::ZERO, -angular);
            }
        }

        if let Some(motor) = self.motor {
            let dw = data.angular_velocities[i2] - data.angular_velocities[i1];
            let jv = dw.dot(self.a1);
            let max_impulse = motor.max_force * data.time_step;
            let mut delta = self.inverse_mass_limit_motor * (motor.speed - jv);
            let previous = self.impulse_motor;
            self.impulse_motor = (previous + delta).clamp(-max_impulse, max_impulse);
            delta = self.impulse_motor - previous;
            let angular = self.a1 * delta;
            slots.apply_velocity_impulse(data, Vec3::ZERO, -angular, Vec3::ZERO, angular);
        }
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
        let hinge_angle = self.hinge_angle(q1, q2);
        self.compute_axes(q1, q2);

        // Translation.
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

        // Rotation.
        let inverse_rotation = self.rotation_mass_matrix();
        let (e1, e2) = self.rotation_error(q2);
        let lambda = mul_2x2(&inverse_rotation, -e1, -e2);
        let angular = self.rotation_impulse(lambda);
        slots.apply_position_impulse(data, Vec3::ZERO, angular, Vec3::ZERO, -angular);

        // Limits.
        if let Some(limits) = self.limits {
            let lower_violated = hinge_angle - limits.lower <= 0.0;
            let upper_violated = limits.upper - hinge_angle <= 0.0;
            if lower_violated || upper_violated {
                let inverse_limit = self.limit_motor_mass();
                if lower_violated {
                    let lambda = inverse_limit * -(hinge_angle - limits.lower);
                    let angular = self.a1 * lambda;
                    slots.apply_position_impulse(data, Vec3::ZERO, -angular, Vec3::ZERO, angular);
                }
                if upper_violated {
                    let lambda = inverse_limit * -(limits.upper - hinge_angle);
                    let angular = self.a1 * lambda;
                    slots.apply_position_impulse(data, Vec3::ZERO, angular, Vec3::ZERO, -angular);
                }
            }
        }
    }
}

/// Pick between `angle` and `angle -+ 2 pi`, whichever is closer to the limits.
fn angle_near_limits(angle: f32, lower: f32, upper: f32) -> f32 {
    if upper <= lower {
        angle
    } else if angle > upper {
        let to_upper = normalize_angle(angle - upper).abs();
        let to_lower = normalize_angle(angle - lower).abs();
        if to_upper > to_lower {
            angle - TAU
        } else {
            angle
        }
    } else if angle < lower {
        let to_upper = normalize_angle(upper - angle).abs();
        let to_lower = normalize_angle(lower - angle).abs();
        if to_upper > to_lower {
            angle
        } else {
            angle + TAU
        }
    } else {
        angle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::constraint::{Constraint, JointInfo};
    use crate::physics::rigid_body::{BodySet, RigidBodyDesc};
    use crate::physics::shape::ConvexShape;
    use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI};

    fn hinge_setup(info: impl FnOnce(BodyId, BodyId) -> JointInfo) -> (BodySet, Constraint) {
        let mut bodies = BodySet::new();
        let shape = ConvexShape::cuboid(Vec3::splat(0.5)).unwrap();
        let a = bodies.insert(RigidBodyDesc::fixed().with_shape(shape.clone())).unwrap();
        let b = bodies
            .insert(
                RigidBodyDesc::dynamic(1.0)
                    .with_position(Vec3::new(1.0, 0.0, 0.0))
                    .with_shape(shape),
            )
            .unwrap();
        let joint = Constraint::from_joint_info(&info(a, b), &bodies).unwrap();
        (bodies, joint)
    }

    fn as_hinge(c: &Constraint) -> &HingeJoint {
        match c {
            Constraint::Hinge(h) => h,
            _ => panic!("not a hinge"),
        }
    }

    #[test]
    fn test_hinge_angle_sign() {
        let (_bodies, joint) =
            hinge_setup(|a, b| JointInfo::hinge(a, b, Vec3::new(0.5, 0.0, 0.0), Vec3::Z));
        let hinge = as_hinge(&joint);
        let q1 = Quat::IDENTITY;
        assert!(hinge.hinge_angle(q1, q1).abs() < 1e-5);
        let turned = Quat::from_rotation_z(0.4);
        assert!((hinge.hinge_angle(q1, turned) - 0.4).abs() < 1e-4);
        let back = Quat::from_rotation_z(-0.7);
        assert!((hinge.hinge_angle(q1, back) + 0.7).abs() < 1e-4);
    }

    #[test]
    fn test_angle_near_limits_unwraps() {
        // Just past +pi with limits around pi: stays positive.
        let a = angle_near_limits(-PI + 0.1, -0.5, PI - 0.05);
        assert!((a - (PI + 0.1)).abs() < 1e-4);
        // Inside the limits: untouched.
        assert_eq!(angle_near_limits(0.2, -1.0, 1.0), 0.2);
        // No limits configured.
        assert_eq!(angle_near_limits(3.0, 0.0, 0.0), 3.0);
    }

    #[test]
    fn test_axis_rotation_is_free() {
        let (bodies, mut joint) =
            hinge_setup(|a, b| JointInfo::hinge(a, b, Vec3::new(0.5, 0.0, 0.0), Vec3::Z));
        let ids = [joint.body1(), joint.body2()];
        let mut data = ConstraintSolverData::new(&bodies, ids, 1.0 / 60.0, false);
        // Spin around the hinge axis and wobble around X.
        data.angular_velocities[1] = Vec3::new(2.0, 0.0, 3.0);
        data.linear_velocities[1] = Vec3::new(0.0, 1.5, 0.0);
        assert!(joint.init_before_solve(&data));
        for _ in 0..20 {
            joint.solve_velocity_constraint(&mut data);
        }
        let w = data.angular_velocities[1];
        assert!(w.x.abs() < 1e-3, "{w}");
        assert!(w.y.abs() < 1e-3, "{w}");
        assert!(w.z.abs() > 0.1, "{w}");
        // Anchor at rest relative to the static body.
        let hinge = as_hinge(&joint);
        let anchor_velocity = data.linear_velocities[1] + w.cross(hinge.r2);
        assert!(anchor_velocity.length() < 1e-3, "{anchor_velocity}");
    }

    #[test]
    fn test_motor_drives_speed() {
        let (bodies, mut joint) = hinge_setup(|a, b| {
            JointInfo::hinge(a, b, Vec3::new(1.0, 0.0, 0.0), Vec3::X).with_motor(2.0, 100.0)
        });
        let ids = [joint.body1(), joint.body2()];
        let mut data = ConstraintSolverData::new(&bodies, ids, 1.0 / 60.0, false);
        joint.init_before_solve(&data);
        for _ in 0..20 {
            joint.solve_velocity_constraint(&mut data);
        }
        assert!((data.angular_velocities[1].x - 2.0).abs() < 1e-2);
    }

    #[test]
    fn test_motor_impulse_is_capped() {
        let (bodies, mut joint) = hinge_setup(|a, b| {
            JointInfo::hinge(a, b, Vec3::new(1.0, 0.0, 0.0), Vec3::X).with_motor(100.0, 0.6)
        });
        let ids = [joint.body1(), joint.body2()];
        let dt = 1.0 / 60.0;
        let mut data = ConstraintSolverData::new(&bodies, ids, dt, false);
        joint.init_before_solve(&data);
        for _ in 0..20 {
            joint.solve_velocity_constraint(&mut data);
        }
        assert!(as_hinge(&joint).impulse_motor <= 0.6 * dt + 1e-6);
        assert!(data.angular_velocities[1].x < 100.0);
    }

    #[test]
    fn test_lower_limit_stops_rotation() {
        let (mut bodies, _) =
            hinge_setup(|a, b| JointInfo::hinge(a, b, Vec3::new(0.5, 0.0, 0.0), Vec3::Z));
        let b = bodies.iter().nth(1).unwrap().id();
        let a = bodies.iter().next().unwrap().id();
        // Body 2 already turned past the lower limit.
        let mut joint = Constraint::from_joint_info(
            &JointInfo::hinge(a, b, Vec3::new(0.5, 0.0, 0.0), Vec3::Z)
                .with_limits(-FRAC_PI_4, FRAC_PI_2),
            &bodies,
        )
        .unwrap();
        let body = bodies.get_mut(b).unwrap();
        body.transform.orientation = Quat::from_rotation_z(-FRAC_PI_2);
        body.transform.position = Vec3::new(0.5, -0.5, 0.0);

        let mut data = ConstraintSolverData::new(&bodies, [a, b], 1.0 / 60.0, false);
        data.angular_velocities[1] = Vec3::new(0.0, 0.0, -1.0);
        joint.init_before_solve(&data);
        assert!(as_hinge(&joint).is_lower_limit_violated);
        for _ in 0..20 {
            joint.solve_velocity_constraint(&mut data);
        }
        // No further rotation towards the limit.
        assert!(data.angular_velocities[1].z >= -1e-4);

        let before = as_hinge(&joint).hinge_angle(data.orientations[0], data.orientations[1]);
        joint.solve_position_constraint(&mut data);
        let after = as_hinge(&joint).hinge_angle(data.orientations[0], data.orientations[1]);
        assert!(after > before);
    }
}
