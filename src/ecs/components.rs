//! Physics components for ECS entities.

use glam::{Quat, Vec3};

use crate::physics::rigid_body::BodyId;

/// Links an entity to its body in the physics world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PhysicsBody(pub BodyId);

/// Entity pose, written back from the physics world.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }
}

impl From<&crate::physics::math::Transform> for Transform {
    fn from(transform: &crate::physics::math::Transform) -> Self {
        Self {
            position: transform.position,
            rotation: transform.orientation,
        }
    }
}
