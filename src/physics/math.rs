//! Thin helpers on top of glam used by the shapes and the solver.

use glam::{Mat3, Quat, Vec3};

/// Squared-length threshold below which a direction is treated as zero.
pub const MACHINE_EPSILON: f32 = f32::EPSILON;

/// Rigid transform: a position and a unit orientation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub orientation: Quat,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        orientation: Quat::IDENTITY,
    };

    pub fn new(position: Vec3, orientation: Quat) -> Self {
        Self {
            position,
            orientation,
        }
    }

    /// Create a transform from a position.
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            orientation: Quat::IDENTITY,
        }
    }

    /// Map a local point to world space.
    #[inline]
    pub fn transform_point(&self, local: Vec3) -> Vec3 {
        self.position + self.orientation * local
    }

    /// Map a world point to local space.
    #[inline]
    pub fn inverse_transform_point(&self, world: Vec3) -> Vec3 {
        self.orientation.inverse() * (world - self.position)
    }

    /// Rotate a local direction into world space.
    #[inline]
    pub fn rotate(&self, local: Vec3) -> Vec3 {
        self.orientation * local
    }

    /// Rotate a world direction into local space.
    #[inline]
    pub fn inverse_rotate(&self, world: Vec3) -> Vec3 {
        self.orientation.inverse() * world
    }

    /// Rotation part as a 3x3 matrix.
    #[inline]
    pub fn rotation_matrix(&self) -> Mat3 {
        Mat3::from_quat(self.orientation)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Skew-symmetric matrix `[v]x` such that `[v]x * u == v.cross(u)`.
#[inline]
pub fn skew_symmetric(v: Vec3) -> Mat3 {
    Mat3::from_cols(
        Vec3::new(0.0, v.z, -v.y),
        Vec3::new(-v.z, 0.0, v.x),
        Vec3::new(v.y, -v.x, 0.0),
    )
}

/// Inverse of `m`, or the zero matrix when `m` is singular.
#[inline]
pub fn inverse_or_zero(m: Mat3) -> Mat3 {
    let det = m.determinant();
    if det.abs() <= MACHINE_EPSILON * MACHINE_EPSILON || !det.is_finite() {
        Mat3::ZERO
    } else {
        m.inverse()
    }
}

/// Inverse of a 2x2 system given by its elements, or zero when singular.
#[inline]
pub fn inverse_2x2_or_zero(m11: f32, m12: f32, m21: f32, m22: f32) -> [[f32; 2]; 2] {
    let det = m11 * m22 - m12 * m21;
    if det.abs() <= MACHINE_EPSILON * MACHINE_EPSILON || !det.is_finite() {
        return [[0.0; 2]; 2];
    }
    let inv = 1.0 / det;
    [[m22 * inv, -m12 * inv], [-m21 * inv, m11 * inv]]
}

/// Multiply a row-major 2x2 matrix by the vector `(x, y)`.
#[inline]
pub fn mul_2x2(m: &[[f32; 2]; 2], x: f32, y: f32) -> (f32, f32) {
    (m[0][0] * x + m[0][1] * y, m[1][0] * x + m[1][1] * y)
}

/// World-space inverse inertia `R * I_local^-1 * R^T`.
#[inline]
pub fn world_inverse_inertia(orientation: Quat, local_inverse_inertia: Mat3) -> Mat3 {
    let rotation = Mat3::from_quat(orientation);
    rotation * local_inverse_inertia * rotation.transpose()
}

/// Displace an orientation by an angular pseudo-velocity over a unit step:
/// `q + 0.5 * (w, 0) * q`, renormalized.
#[inline]
pub fn apply_angular_displacement(orientation: Quat, w: Vec3) -> Quat {
    let omega = Quat::from_xyzw(w.x, w.y, w.z, 0.0);
    (orientation + omega * orientation * 0.5).normalize()
}

/// Wrap an angle into `[-pi, pi]`.
pub fn normalize_angle(angle: f32) -> f32 {
    use std::f32::consts::{PI, TAU};
    let mut a = angle % TAU;
    if a < -PI {
        a += TAU;
    } else if a > PI {
        a -= TAU;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skew_matches_cross() {
        let v = Vec3::new(1.0, -2.0, 3.0);
        let u = Vec3::new(0.5, 4.0, -1.0);
        assert!((skew_symmetric(v) * u - v.cross(u)).length() < 1e-5);
    }

    #[test]
    fn test_inverse_or_zero_singular() {
        assert_eq!(inverse_or_zero(Mat3::ZERO), Mat3::ZERO);
        let m = Mat3::from_diagonal(Vec3::new(2.0, 4.0, 8.0));
        let inv = inverse_or_zero(m);
        assert!((inv * m - Mat3::IDENTITY).abs_diff_eq(Mat3::ZERO, 1e-6));
    }

    #[test]
    fn test_transform_round_trip_point() {
        let tf = Transform::new(
            Vec3::new(1.0, 2.0, 3.0),
            Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
        );
        let p = Vec3::new(0.3, -0.2, 5.0);
        let back = tf.inverse_transform_point(tf.transform_point(p));
        assert!((back - p).length() < 1e-5);
    }

    #[test]
    fn test_angular_displacement_stays_unit() {
        let q = Quat::from_rotation_x(0.3);
        let q2 = apply_angular_displacement(q, Vec3::new(0.5, 1.0, -2.0));
        assert!((q2.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_normalize_angle() {
        use std::f32::consts::PI;
        let wrapped = normalize_angle(3.0 * PI);
        assert!((wrapped - PI).abs() < 1e-4 || (wrapped + PI).abs() < 1e-4);
        assert!((normalize_angle(-0.5) + 0.5).abs() < 1e-6);
        assert!((normalize_angle(2.0 * PI + 0.25) - 0.25).abs() < 1e-5);
    }
}
