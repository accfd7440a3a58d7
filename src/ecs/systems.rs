//! ECS systems driven by the physics world.

use crate::ecs::components::{PhysicsBody, Transform};
use crate::physics::PhysicsWorld;

/// Copy solved body poses into the entity transforms.
///
/// Entities whose body no longer exists are left untouched.
pub fn sync_transforms(world: &mut hecs::World, physics: &PhysicsWorld) {
    for (_, (body, transform)) in world.query_mut::<(&PhysicsBody, &mut Transform)>() {
        if let Some(rb) = physics.body(body.0) {
            *transform = Transform::from(&rb.transform);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::bridge::spawn_body;
    use crate::physics::rigid_body::RigidBodyDesc;
    use glam::Vec3;

    #[test]
    fn test_sync_follows_falling_body() {
        let mut world = hecs::World::new();
        let mut physics = PhysicsWorld::default();
        let entity = spawn_body(
            &mut world,
            &mut physics,
            RigidBodyDesc::dynamic(1.0).with_position(Vec3::new(0.0, 10.0, 0.0)),
        )
        .unwrap();

        for _ in 0..30 {
            physics.step(1.0 / 60.0);
        }
        sync_transforms(&mut world, &physics);

        let y = world.get::<&Transform>(entity).unwrap().position.y;
        assert!(y < 10.0, "Entity should follow its body: y = {y}");
    }

    #[test]
    fn test_sync_skips_removed_bodies() {
        let mut world = hecs::World::new();
        let mut physics = PhysicsWorld::default();
        let entity = spawn_body(&mut world, &mut physics, RigidBodyDesc::dynamic(1.0)).unwrap();
        let body = world.get::<&PhysicsBody>(entity).unwrap().0;
        physics.remove_body(body).unwrap();
        physics.step(1.0 / 60.0);

        sync_transforms(&mut world, &physics);
        assert_eq!(*world.get::<&Transform>(entity).unwrap(), Transform::default());
    }
}
