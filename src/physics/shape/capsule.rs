//! Capsule aligned with the Y axis: a segment core with the radius as margin.

use glam::{Mat3, Vec3};

use crate::error::Result;
use crate::physics::collider::PhysicsAabb;

use super::{check_dimension, ShapeType};

/// Capsule whose hemisphere centers sit at `+-height / 2` on the Y axis.
#[derive(Debug, Clone, PartialEq)]
pub struct CapsuleShape {
    radius: f32,
    half_height: f32,
}

impl CapsuleShape {
    /// `height` is the distance between the centers of the two hemispheres.
    pub fn new(radius: f32, height: f32) -> Result<Self> {
        check_dimension(ShapeType::Capsule, "radius", radius)?;
        check_dimension(ShapeType::Capsule, "height", height)?;
        Ok(Self {
            radius,
            half_height: height * 0.5,
        })
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn height(&self) -> f32 {
        2.0 * self.half_height
    }

    pub fn margin(&self) -> f32 {
        self.radius
    }

    #[inline]
    pub fn local_support_point_without_margin(&self, direction: Vec3) -> Vec3 {
        if direction.y < 0.0 {
            Vec3::new(0.0, -self.half_height, 0.0)
        } else {
            Vec3::new(0.0, self.half_height, 0.0)
        }
    }

    /// Cylinder plus two hemispheres, weighted by their volume share.
    pub fn compute_local_inertia_tensor(&self, mass: f32) -> Mat3 {
        let height = 2.0 * self.half_height;
        let r = self.radius;
        let r_sq = r * r;
        let h_sq = height * height;
        let r_sq_double = 2.0 * r_sq;
        let factor1 = 2.0 * r / (4.0 * r + 3.0 * height);
        let factor2 = 3.0 * height / (4.0 * r + 3.0 * height);
        let sum1 = 0.4 * r_sq_double;
        let sum2 = 0.75 * height * r + 0.5 * h_sq;
        let sum3 = 0.25 * r_sq + h_sq / 12.0;
        let diag_xz = factor1 * mass * (sum1 + sum2) + factor2 * mass * sum3;
        let diag_y = factor1 * mass * sum1 + factor2 * mass * 0.25 * r_sq_double;
        Mat3::from_diagonal(Vec3::new(diag_xz, diag_y, diag_xz))
    }

    pub fn local_bounds(&self) -> PhysicsAabb {
        let max = Vec3::new(self.radius, self.half_height + self.radius, self.radius);
        PhysicsAabb { min: -max, max }
    }

    pub fn is_equal_to(&self, other: &CapsuleShape) -> bool {
        self.radius == other.radius && self.half_height == other.half_height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capsule_support_on_hemisphere() {
        let c = crate::physics::shape::ConvexShape::capsule(0.5, 2.0).unwrap();
        let p = c.local_support_point_with_margin(Vec3::new(1.0, 1.0, 0.0));
        let expected = Vec3::new(0.0, 1.0, 0.0) + Vec3::new(1.0, 1.0, 0.0).normalize() * 0.5;
        assert!((p - expected).length() < 1e-6);
    }

    #[test]
    fn test_capsule_inertia_between_sphere_and_cylinder_limits() {
        let c = CapsuleShape::new(1.0, 2.0).unwrap();
        let tensor = c.compute_local_inertia_tensor(1.0);
        // Taller than wide: spinning about the long axis is easiest.
        assert!(tensor.y_axis.y < tensor.x_axis.x);
        assert_eq!(tensor.x_axis.x, tensor.z_axis.z);
    }
}
