//! World-space collider queries for broad and narrow phase.

use glam::Vec3;

use super::math::Transform;
use super::shape::ConvexShape;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicsAabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl PhysicsAabb {
    /// Test whether two AABBs overlap.
    #[inline]
    pub fn overlaps(&self, other: &PhysicsAabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }
}

impl ConvexShape {
    /// GJK/EPA support function in world space, margin included.
    #[inline]
    pub fn support_point(&self, direction: Vec3, transform: &Transform) -> Vec3 {
        let local_dir = transform.inverse_rotate(direction);
        transform.transform_point(self.local_support_point_with_margin(local_dir))
    }

    /// World-space AABB of the local bounds under `transform`.
    pub fn compute_aabb(&self, transform: &Transform) -> PhysicsAabb {
        let local = self.local_bounds();
        let rotation = transform.rotation_matrix();
        let center = transform.transform_point(local.center());
        let half = local.half_extents();

        // Project the rotated local box axes onto each world axis.
        let extent = rotation.x_axis.abs() * half.x
            + rotation.y_axis.abs() * half.y
            + rotation.z_axis.abs() * half.z;

        PhysicsAabb {
            min: center - extent,
            max: center + extent,
        }
    }
}
