//! Cylinder aligned with the Y axis.

use glam::{Mat3, Vec3};

use crate::error::Result;
use crate::physics::collider::PhysicsAabb;
use crate::physics::math::MACHINE_EPSILON;

use super::{check_dimension, check_margin, ShapeType, DEFAULT_MARGIN};

#[derive(Debug, Clone, PartialEq)]
pub struct CylinderShape {
    radius: f32,
    half_height: f32,
    margin: f32,
}

impl CylinderShape {
    pub fn new(radius: f32, height: f32) -> Result<Self> {
        Self::with_margin(radius, height, DEFAULT_MARGIN)
    }

    pub fn with_margin(radius: f32, height: f32, margin: f32) -> Result<Self> {
        check_dimension(ShapeType::Cylinder, "radius", radius)?;
        check_dimension(ShapeType::Cylinder, "height", height)?;
        check_margin(ShapeType::Cylinder, margin)?;
        Ok(Self {
            radius,
            half_height: height * 0.5,
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
        let y = if direction.y < 0.0 {
            -self.half_height
        } else {
            self.half_height
        };
        let projected_length = (direction.x * direction.x + direction.z * direction.z).sqrt();
        if projected_length > MACHINE_EPSILON {
            let d = self.radius / projected_length;
            Vec3::new(direction.x * d, y, direction.z * d)
        } else {
            Vec3::new(0.0, y, 0.0)
        }
    }

    pub fn compute_local_inertia_tensor(&self, mass: f32) -> Mat3 {
        let height = 2.0 * self.half_height;
        let r_sq = self.radius * self.radius;
        let diag_xz = mass / 12.0 * (3.0 * r_sq + height * height);
        Mat3::from_diagonal(Vec3::new(diag_xz, 0.5 * mass * r_sq, diag_xz))
    }

    pub fn local_bounds(&self) -> PhysicsAabb {
        let max = Vec3::new(
            self.radius + self.margin,
            self.half_height + self.margin,
            self.radius + self.margin,
        );
        PhysicsAabb { min: -max, max }
    }

    pub fn is_equal_to(&self, other: &CylinderShape) -> bool {
        self.radius == other.radius && self.half_height == other.half_height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cylinder_rim_support() {
        let c = CylinderShape::new(2.0, 4.0).unwrap();
        let p = c.local_support_point_without_margin(Vec3::new(0.0, -1.0, 3.0));
        assert!((p - Vec3::new(0.0, -2.0, 2.0)).length() < 1e-6);
    }

    #[test]
    fn test_cylinder_axis_support() {
        let c = CylinderShape::new(2.0, 4.0).unwrap();
        assert_eq!(
            c.local_support_point_without_margin(Vec3::Y),
            Vec3::new(0.0, 2.0, 0.0)
        );
    }
}
