//! Box shape with the margin carved out of its extents.

use glam::{Mat3, Vec3};

use crate::error::{PhysicsError, Result};
use crate::physics::collider::PhysicsAabb;

use super::{box_inertia, check_dimension, check_margin, ShapeType, DEFAULT_MARGIN};

/// Axis-aligned box centered on the origin.
///
/// `half_extents` is the full size of the box. The margin lies inside it, so
/// the margin-less core is `half_extents - margin` on every axis.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxShape {
    half_extents: Vec3,
    core_extents: Vec3,
    margin: f32,
}

impl BoxShape {
    pub fn new(half_extents: Vec3) -> Result<Self> {
        Self::with_margin(half_extents, DEFAULT_MARGIN)
    }

    pub fn with_margin(half_extents: Vec3, margin: f32) -> Result<Self> {
        check_dimension(ShapeType::Box, "half_extents.x", half_extents.x)?;
        check_dimension(ShapeType::Box, "half_extents.y", half_extents.y)?;
        check_dimension(ShapeType::Box, "half_extents.z", half_extents.z)?;
        check_margin(ShapeType::Box, margin)?;
        if half_extents.min_element() <= margin {
            return Err(PhysicsError::InvalidMargin {
                shape: ShapeType::Box,
                margin,
                reason: "must be smaller than every half extent",
            });
        }
        Ok(Self {
            half_extents,
            core_extents: half_extents - Vec3::splat(margin),
            margin,
        })
    }

    pub fn half_extents(&self) -> Vec3 {
        self.half_extents
    }

    pub fn margin(&self) -> f32 {
        self.margin
    }

    #[inline]
    pub fn local_support_point_without_margin(&self, direction: Vec3) -> Vec3 {
        let e = self.core_extents;
        Vec3::new(
            if direction.x < 0.0 { -e.x } else { e.x },
            if direction.y < 0.0 { -e.y } else { e.y },
            if direction.z < 0.0 { -e.z } else { e.z },
        )
    }

    pub fn compute_local_inertia_tensor(&self, mass: f32) -> Mat3 {
        box_inertia(mass, self.half_extents)
    }

    pub fn local_bounds(&self) -> PhysicsAabb {
        PhysicsAabb {
            min: -self.half_extents,
            max: self.half_extents,
        }
    }

    pub fn is_equal_to(&self, other: &BoxShape) -> bool {
        self.half_extents == other.half_extents
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_corner_support() {
        let b = BoxShape::with_margin(Vec3::new(1.0, 2.0, 3.0), 0.1).unwrap();
        let p = b.local_support_point_without_margin(Vec3::new(1.0, -1.0, 1.0));
        assert!((p - Vec3::new(0.9, -1.9, 2.9)).length() < 1e-6);
    }

    #[test]
    fn test_box_margin_too_large() {
        let err = BoxShape::with_margin(Vec3::splat(0.05), 0.1).unwrap_err();
        assert!(matches!(err, PhysicsError::InvalidMargin { .. }));
    }

    #[test]
    fn test_box_inertia() {
        let b = BoxShape::new(Vec3::new(1.0, 2.0, 3.0)).unwrap();
        let tensor = b.compute_local_inertia_tensor(3.0);
        assert!((tensor.x_axis.x - 13.0).abs() < 1e-5);
        assert!((tensor.y_axis.y - 10.0).abs() < 1e-5);
        assert!((tensor.z_axis.z - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_box_equality_ignores_margin() {
        let a = BoxShape::with_margin(Vec3::ONE, 0.01).unwrap();
        let b = BoxShape::with_margin(Vec3::ONE, 0.2).unwrap();
        assert!(a.is_equal_to(&b));
    }
}
