//! Bridge between the physics world and ECS entities.

use crate::ecs::components::{PhysicsBody, Transform};
use crate::error::Result;
use crate::physics::rigid_body::RigidBodyDesc;
use crate::physics::PhysicsWorld;

/// Create a physics body and an entity linked to it.
///
/// The entity gets a [`PhysicsBody`] handle and a [`Transform`] matching the
/// body's initial pose. Nothing is spawned when the body is rejected.
pub fn spawn_body(
    world: &mut hecs::World,
    physics: &mut PhysicsWorld,
    desc: RigidBodyDesc,
) -> Result<hecs::Entity> {
    let transform = Transform::from(&desc.transform);
    let id = physics.create_body(desc)?;
    Ok(world.spawn((PhysicsBody(id), transform)))
}
