//! Convex collision shapes.
//!
//! Every shape is a closed variant of [`ConvexShape`] and exposes the same
//! capability set: a support mapping (with and without the collision margin),
//! a local inertia tensor, local bounds, and a geometry equality test.
//!
//! Shapes live in their own local frame. Sphere, cone, cylinder and capsule are
//! centered on the origin and aligned with the Y axis.

mod box_shape;
mod capsule;
mod cone;
mod convex_mesh;
mod cylinder;
mod sphere;

pub use box_shape::BoxShape;
pub use capsule::CapsuleShape;
pub use cone::ConeShape;
pub use convex_mesh::ConvexMeshShape;
pub use cylinder::CylinderShape;
pub use sphere::SphereShape;

use glam::{Mat3, Vec3};

use crate::error::{PhysicsError, Result};

use super::collider::PhysicsAabb;
use super::math::MACHINE_EPSILON;

/// Default collision margin (4 cm at meter scale).
pub const DEFAULT_MARGIN: f32 = 0.04;

/// Type tag of a convex shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeType {
    Sphere,
    Box,
    Cone,
    Cylinder,
    Capsule,
    ConvexMesh,
}

/// A convex collision shape.
#[derive(Debug, Clone)]
pub enum ConvexShape {
    Sphere(SphereShape),
    Box(BoxShape),
    Cone(ConeShape),
    Cylinder(CylinderShape),
    Capsule(CapsuleShape),
    ConvexMesh(ConvexMeshShape),
}

impl ConvexShape {
    pub fn sphere(radius: f32) -> Result<Self> {
        SphereShape::new(radius).map(Self::Sphere)
    }

    /// Box from its half extents. The margin is carved out of the extents.
    pub fn cuboid(half_extents: Vec3) -> Result<Self> {
        BoxShape::new(half_extents).map(Self::Box)
    }

    pub fn cone(radius: f32, height: f32) -> Result<Self> {
        ConeShape::new(radius, height).map(Self::Cone)
    }

    pub fn cylinder(radius: f32, height: f32) -> Result<Self> {
        CylinderShape::new(radius, height).map(Self::Cylinder)
    }

    pub fn capsule(radius: f32, height: f32) -> Result<Self> {
        CapsuleShape::new(radius, height).map(Self::Capsule)
    }

    pub fn convex_mesh(points: Vec<Vec3>) -> Result<Self> {
        ConvexMeshShape::new(points).map(Self::ConvexMesh)
    }

    pub fn shape_type(&self) -> ShapeType {
        match self {
            Self::Sphere(_) => ShapeType::Sphere,
            Self::Box(_) => ShapeType::Box,
            Self::Cone(_) => ShapeType::Cone,
            Self::Cylinder(_) => ShapeType::Cylinder,
            Self::Capsule(_) => ShapeType::Capsule,
            Self::ConvexMesh(_) => ShapeType::ConvexMesh,
        }
    }

    /// Collision margin around the margin-less core of the shape.
    pub fn margin(&self) -> f32 {
        match self {
            Self::Sphere(s) => s.margin(),
            Self::Box(s) => s.margin(),
            Self::Cone(s) => s.margin(),
            Self::Cylinder(s) => s.margin(),
            Self::Capsule(s) => s.margin(),
            Self::ConvexMesh(s) => s.margin(),
        }
    }

    /// Direction used for the margin offset when the query direction is zero.
    fn default_margin_direction(&self) -> Vec3 {
        match self {
            Self::Cone(_) => Vec3::NEG_Y,
            _ => Vec3::Y,
        }
    }

    /// Farthest point of the margin-less core along `direction`.
    pub fn local_support_point_without_margin(&self, direction: Vec3) -> Vec3 {
        match self {
            Self::Sphere(s) => s.local_support_point_without_margin(direction),
            Self::Box(s) => s.local_support_point_without_margin(direction),
            Self::Cone(s) => s.local_support_point_without_margin(direction),
            Self::Cylinder(s) => s.local_support_point_without_margin(direction),
            Self::Capsule(s) => s.local_support_point_without_margin(direction),
            Self::ConvexMesh(s) => s.local_support_point_without_margin(direction),
        }
    }

    /// Farthest point of the shape including its margin along `direction`.
    pub fn local_support_point_with_margin(&self, direction: Vec3) -> Vec3 {
        let support = self.local_support_point_without_margin(direction);
        let unit = if direction.length_squared() > MACHINE_EPSILON * MACHINE_EPSILON {
            direction.normalize()
        } else {
            self.default_margin_direction()
        };
        support + unit * self.margin()
    }

    /// Local inertia tensor for a body of the given mass.
    pub fn compute_local_inertia_tensor(&self, mass: f32) -> Mat3 {
        match self {
            Self::Sphere(s) => s.compute_local_inertia_tensor(mass),
            Self::Box(s) => s.compute_local_inertia_tensor(mass),
            Self::Cone(s) => s.compute_local_inertia_tensor(mass),
            Self::Cylinder(s) => s.compute_local_inertia_tensor(mass),
            Self::Capsule(s) => s.compute_local_inertia_tensor(mass),
            Self::ConvexMesh(s) => s.compute_local_inertia_tensor(mass),
        }
    }

    /// Axis-aligned local bounds, margin included.
    pub fn local_bounds(&self) -> PhysicsAabb {
        match self {
            Self::Sphere(s) => s.local_bounds(),
            Self::Box(s) => s.local_bounds(),
            Self::Cone(s) => s.local_bounds(),
            Self::Cylinder(s) => s.local_bounds(),
            Self::Capsule(s) => s.local_bounds(),
            Self::ConvexMesh(s) => s.local_bounds(),
        }
    }

    /// Compare the defining dimensions of two shapes of the same type.
    ///
    /// Margins and derived fields are ignored. Comparing shapes of different
    /// types is a [`PhysicsError::ShapeTypeMismatch`].
    pub fn is_equal_to(&self, other: &ConvexShape) -> Result<bool> {
        match (self, other) {
            (Self::Sphere(a), Self::Sphere(b)) => Ok(a.is_equal_to(b)),
            (Self::Box(a), Self::Box(b)) => Ok(a.is_equal_to(b)),
            (Self::Cone(a), Self::Cone(b)) => Ok(a.is_equal_to(b)),
            (Self::Cylinder(a), Self::Cylinder(b)) => Ok(a.is_equal_to(b)),
            (Self::Capsule(a), Self::Capsule(b)) => Ok(a.is_equal_to(b)),
            (Self::ConvexMesh(a), Self::ConvexMesh(b)) => Ok(a.is_equal_to(b)),
            _ => Err(PhysicsError::ShapeTypeMismatch {
                expected: self.shape_type(),
                found: other.shape_type(),
            }),
        }
    }
}

/// Reject non-positive or non-finite dimensions.
fn check_dimension(shape: ShapeType, parameter: &'static str, value: f32) -> Result<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(PhysicsError::InvalidShapeDimension {
            shape,
            parameter,
            value,
        })
    }
}

/// Reject negative or non-finite margins.
fn check_margin(shape: ShapeType, margin: f32) -> Result<()> {
    if margin >= 0.0 && margin.is_finite() {
        Ok(())
    } else {
        Err(PhysicsError::InvalidMargin {
            shape,
            margin,
            reason: "must be finite and >= 0",
        })
    }
}

/// Diagonal inertia of a solid box with the given half extents.
fn box_inertia(mass: f32, half_extents: Vec3) -> Mat3 {
    let factor = mass / 3.0;
    let sq = half_extents * half_extents;
    Mat3::from_diagonal(Vec3::new(
        factor * (sq.y + sq.z),
        factor * (sq.x + sq.z),
        factor * (sq.x + sq.y),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_shapes() -> Vec<ConvexShape> {
        vec![
            ConvexShape::sphere(0.5).unwrap(),
            ConvexShape::cuboid(Vec3::new(1.0, 0.5, 2.0)).unwrap(),
            ConvexShape::cone(1.0, 2.0).unwrap(),
            ConvexShape::cylinder(0.7, 1.5).unwrap(),
            ConvexShape::capsule(0.3, 1.0).unwrap(),
            ConvexShape::convex_mesh(vec![
                Vec3::new(-1.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
                Vec3::new(0.0, 0.0, 1.0),
            ])
            .unwrap(),
        ]
    }

    #[test]
    fn test_margin_offset_along_direction() {
        let d = Vec3::new(0.3, -1.2, 0.8);
        for shape in all_shapes() {
            let without = shape.local_support_point_without_margin(d);
            let with = shape.local_support_point_with_margin(d);
            let expected = without + d.normalize() * shape.margin();
            assert!(
                (with - expected).length() < 1e-5,
                "{:?}: {with} vs {expected}",
                shape.shape_type()
            );
        }
    }

    #[test]
    fn test_zero_direction_uses_default() {
        for shape in all_shapes() {
            let without = shape.local_support_point_without_margin(Vec3::ZERO);
            let with = shape.local_support_point_with_margin(Vec3::ZERO);
            let expected = without + shape.default_margin_direction() * shape.margin();
            assert!((with - expected).length() < 1e-6);
            assert!(with.is_finite());
        }
    }

    #[test]
    fn test_bounds_contain_support_points() {
        let dirs = [
            Vec3::X,
            Vec3::NEG_X,
            Vec3::Y,
            Vec3::NEG_Y,
            Vec3::Z,
            Vec3::NEG_Z,
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(-1.0, 0.5, -0.2),
        ];
        for shape in all_shapes() {
            let bounds = shape.local_bounds();
            for d in dirs {
                let p = shape.local_support_point_with_margin(d);
                assert!(
                    p.cmpge(bounds.min - Vec3::splat(1e-5)).all()
                        && p.cmple(bounds.max + Vec3::splat(1e-5)).all(),
                    "{:?}: {p} outside {bounds:?}",
                    shape.shape_type()
                );
            }
        }
    }

    #[test]
    fn test_equality_type_mismatch() {
        let sphere = ConvexShape::sphere(1.0).unwrap();
        let cone = ConvexShape::cone(1.0, 2.0).unwrap();
        assert_eq!(
            sphere.is_equal_to(&cone),
            Err(PhysicsError::ShapeTypeMismatch {
                expected: ShapeType::Sphere,
                found: ShapeType::Cone,
            })
        );
        assert_eq!(sphere.is_equal_to(&sphere.clone()), Ok(true));
    }

    #[test]
    fn test_inertia_is_diagonal_and_positive() {
        for shape in all_shapes() {
            let tensor = shape.compute_local_inertia_tensor(2.0);
            let diag = Vec3::new(tensor.x_axis.x, tensor.y_axis.y, tensor.z_axis.z);
            assert!(diag.cmpgt(Vec3::ZERO).all(), "{:?}", shape.shape_type());
            assert_eq!(tensor.x_axis.y, 0.0);
            assert_eq!(tensor.y_axis.z, 0.0);
            assert_eq!(tensor.z_axis.x, 0.0);
        }
    }

    #[test]
    fn test_rejects_bad_dimensions() {
        assert!(matches!(
            ConvexShape::sphere(0.0),
            Err(PhysicsError::InvalidShapeDimension { parameter: "radius", .. })
        ));
        assert!(ConvexShape::cone(-1.0, 2.0).is_err());
        assert!(ConvexShape::cylinder(1.0, f32::NAN).is_err());
        assert!(ConvexShape::capsule(1.0, 0.0).is_err());
        assert!(ConvexShape::cuboid(Vec3::new(1.0, 0.0, 1.0)).is_err());
        assert_eq!(
            ConvexShape::convex_mesh(Vec::new()).unwrap_err(),
            PhysicsError::EmptyConvexMesh
        );
    }
}
