use glam::Vec3;
use rein_physics::{ConvexShape, JointInfo, PhysicsWorld, RigidBodyDesc};

const DT: f64 = 1.0 / 60.0;

#[test]
fn pendulum_stays_attached_to_its_pivot() {
    let mut physics = PhysicsWorld::default();
    let pivot = physics
        .create_body(RigidBodyDesc::fixed().with_position(Vec3::new(0.0, 5.0, 0.0)))
        .unwrap();
    let bob = physics
        .create_body(
            RigidBodyDesc::dynamic(1.0)
                .with_position(Vec3::new(1.0, 5.0, 0.0))
                .with_shape(ConvexShape::sphere(0.2).unwrap()),
        )
        .unwrap();
    physics
        .create_joint(JointInfo::ball_and_socket(pivot, bob, Vec3::new(0.0, 5.0, 0.0)))
        .unwrap();

    for _ in 0..120 {
        physics.step(DT);
    }

    let offset = physics.body(bob).unwrap().position() - Vec3::new(0.0, 5.0, 0.0);
    assert!((offset.length() - 1.0).abs() < 0.05, "rope length {}", offset.length());
    assert!(offset.y < -0.1, "bob should swing down: {offset}");
}

#[test]
fn hinge_motor_spins_body_at_target_speed() {
    let mut physics = PhysicsWorld::default();
    let frame = physics
        .create_body(
            RigidBodyDesc::fixed().with_shape(ConvexShape::cuboid(Vec3::splat(0.2)).unwrap()),
        )
        .unwrap();
    let wheel = physics
        .create_body(
            RigidBodyDesc::dynamic(1.0).with_shape(ConvexShape::cylinder(1.0, 0.2).unwrap()),
        )
        .unwrap();
    physics
        .create_joint(JointInfo::hinge(frame, wheel, Vec3::ZERO, Vec3::Y).with_motor(2.0, 100.0))
        .unwrap();

    for _ in 0..60 {
        physics.step(DT);
    }

    let body = physics.body(wheel).unwrap();
    assert!((body.angular_velocity.y - 2.0).abs() < 0.05, "w = {}", body.angular_velocity);
    assert!(body.position().length() < 0.05, "wheel drifted to {}", body.position());
    // Jointed bodies do not collide with each other.
    assert!(physics.pairs().is_empty());
}

#[test]
fn slider_limits_hold_a_falling_body() {
    let mut physics = PhysicsWorld::default();
    let rail = physics.create_body(RigidBodyDesc::fixed()).unwrap();
    let carriage = physics
        .create_body(
            RigidBodyDesc::dynamic(1.0)
                .with_shape(ConvexShape::cuboid(Vec3::splat(0.25)).unwrap()),
        )
        .unwrap();
    physics
        .create_joint(JointInfo::slider(rail, carriage, Vec3::ZERO, Vec3::Y).with_limits(-1.0, 1.0))
        .unwrap();

    for _ in 0..180 {
        physics.step(DT);
    }

    let position = physics.body(carriage).unwrap().position();
    assert!(position.y > -1.1 && position.y < -0.8, "carriage at {position}");
    assert!(position.x.abs() < 1e-2 && position.z.abs() < 1e-2);
}
