//! Cone aligned with the Y axis, apex up.

use glam::{Mat3, Vec3};

use crate::error::Result;
use crate::physics::collider::PhysicsAabb;
use crate::physics::math::MACHINE_EPSILON;

use super::{check_dimension, check_margin, ShapeType, DEFAULT_MARGIN};

/// Cone centered at half its height, apex at `+half_height`.
///
/// The margin lies outside the geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct ConeShape {
    radius: f32,
    half_height: f32,
    /// Sine of the semi-angle at the apex.
    sin_theta: f32,
    margin: f32,
}

impl ConeShape {
    pub fn new(radius: f32, height: f32) -> Result<Self> {
        Self::with_margin(radius, height, DEFAULT_MARGIN)
    }

    pub fn with_margin(radius: f32, height: f32, margin: f32) -> Result<Self> {
        check_dimension(ShapeType::Cone, "radius", radius)?;
        check_dimension(ShapeType::Cone, "height", height)?;
        check_margin(ShapeType::Cone, margin)?;
        Ok(Self {
            radius,
            half_height: height * 0.5,
            sin_theta: radius / (radius * radius + height * height).sqrt(),
            margin,
        })
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn height(&self) -> f32 {
        2.0 * self.half_height
    }

    pub fn margin(&self) -> f32 {
        self.margin
    }

    pub fn local_support_point_without_margin(&self, direction: Vec3) -> Vec3 {
        let v = direction;
        if v.y > self.sin_theta * v.length() {
            return Vec3::new(0.0, self.half_height, 0.0);
        }
        let projected_length = (v.x * v.x + v.z * v.z).sqrt();
        if projected_length > MACHINE_EPSILON {
            let d = self.radius / projected_length;
            Vec3::new(v.x * d, -self.half_height, v.z * d)
        } else {
            Vec3::new(0.0, -self.half_height, 0.0)
        }
    }

    pub fn compute_local_inertia_tensor(&self, mass: f32) -> Mat3 {
        let r_sq = self.radius * self.radius;
        let diag_xz = 0.15 * mass * (r_sq + self.half_height * self.half_height);
        Mat3::from_diagonal(Vec3::new(diag_xz, 0.3 * mass * r_sq, diag_xz))
    }

    pub fn local_bounds(&self) -> PhysicsAabb {
        let max = Vec3::new(
            self.radius + self.margin,
            self.half_height + self.margin,
            self.radius + self.margin,
        );
        PhysicsAabb { min: -max, max }
    }

    pub fn is_equal_to(&self, other: &ConeShape) -> bool {
        self.radius == other.radius && self.half_height == other.half_height
    }
}
