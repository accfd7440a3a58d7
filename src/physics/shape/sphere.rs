//! Sphere: a point core with the radius carried as the margin.

use glam::{Mat3, Vec3};

use crate::error::Result;
use crate::physics::collider::PhysicsAabb;

use super::{check_dimension, ShapeType};

/// Sphere centered on the origin.
///
/// The margin is the radius itself, so the margin-less support is always the
/// center and the margin-inclusive support lies on the surface.
#[derive(Debug, Clone, PartialEq)]
pub struct SphereShape {
    radius: f32,
}

impl SphereShape {
    pub fn new(radius: f32) -> Result<Self> {
        check_dimension(ShapeType::Sphere, "radius", radius)?;
        Ok(Self { radius })
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn margin(&self) -> f32 {
        self.radius
    }

    #[inline]
    pub fn local_support_point_without_margin(&self, _direction: Vec3) -> Vec3 {
        Vec3::ZERO
    }

    pub fn compute_local_inertia_tensor(&self, mass: f32) -> Mat3 {
        let diag = 0.4 * mass * self.radius * self.radius;
        Mat3::from_diagonal(Vec3::splat(diag))
    }

    pub fn local_bounds(&self) -> PhysicsAabb {
        PhysicsAabb {
            min: Vec3::splat(-self.radius),
            max: Vec3::splat(self.radius),
        }
    }

    pub fn is_equal_to(&self, other: &SphereShape) -> bool {
        self.radius == other.radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sphere_surface_support() {
        let sphere = crate::physics::shape::ConvexShape::sphere(2.0).unwrap();
        let p = sphere.local_support_point_with_margin(Vec3::new(0.0, 3.0, 0.0));
        assert!((p - Vec3::new(0.0, 2.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_sphere_inertia() {
        let sphere = SphereShape::new(1.0).unwrap();
        let tensor = sphere.compute_local_inertia_tensor(5.0);
        assert!((tensor.x_axis.x - 2.0).abs() < 1e-6);
    }
}
