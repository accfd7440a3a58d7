//! Convex mesh given by its vertices.

use glam::{Mat3, Vec3};

use crate::error::{PhysicsError, Result};
use crate::physics::collider::PhysicsAabb;

use super::{box_inertia, check_margin, ShapeType, DEFAULT_MARGIN};

/// Convex hull of a point set, supported by brute-force vertex search.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvexMeshShape {
    vertices: Vec<Vec3>,
    // Derived from `vertices`, margin excluded.
    min_bounds: Vec3,
    max_bounds: Vec3,
    margin: f32,
}

impl ConvexMeshShape {
    pub fn new(vertices: Vec<Vec3>) -> Result<Self> {
        Self::with_margin(vertices, DEFAULT_MARGIN)
    }

    pub fn with_margin(vertices: Vec<Vec3>, margin: f32) -> Result<Self> {
        if vertices.is_empty() {
            return Err(PhysicsError::EmptyConvexMesh);
        }
        if let Some(bad) = vertices.iter().find(|v| !v.is_finite()) {
            return Err(PhysicsError::InvalidShapeDimension {
                shape: ShapeType::ConvexMesh,
                parameter: "vertex",
                value: bad.max_element(),
            });
        }
        check_margin(ShapeType::ConvexMesh, margin)?;

        let (min_bounds, max_bounds) = vertices.iter().fold(
            (Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)),
            |(min, max), v| (min.min(*v), max.max(*v)),
        );
        Ok(Self {
            vertices,
            min_bounds,
            max_bounds,
            margin,
        })
    }

    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    pub fn margin(&self) -> f32 {
        self.margin
    }

    pub fn local_support_point_without_margin(&self, direction: Vec3) -> Vec3 {
        let mut best = self.vertices[0];
        let mut best_dot = best.dot(direction);
        for p in &self.vertices[1..] {
            let d = p.dot(direction);
            if d > best_dot {
                best_dot = d;
                best = *p;
            }
        }
        best
    }

    /// Approximated by the inertia of the bounding box.
    pub fn compute_local_inertia_tensor(&self, mass: f32) -> Mat3 {
        let bounds = self.local_bounds();
        box_inertia(mass, (bounds.max - bounds.min) * 0.5)
    }

    pub fn local_bounds(&self) -> PhysicsAabb {
        PhysicsAabb {
            min: self.min_bounds - Vec3::splat(self.margin),
            max: self.max_bounds + Vec3::splat(self.margin),
        }
    }

    pub fn is_equal_to(&self, other: &ConvexMeshShape) -> bool {
        self.vertices == other.vertices
    }
}
