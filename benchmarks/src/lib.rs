//! Scene builders shared by the physics benchmarks.

use std::f32::consts::TAU;

use glam::{Quat, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rein_physics::physics::rigid_body::{BodyId, BodySet, RigidBodyDesc};
use rein_physics::{ConvexShape, JointInfo, PhysicsConfig, PhysicsWorld};

fn grid_position(i: usize, side: usize, spacing: f32) -> Vec3 {
    let x = (i % side) as f32;
    let z = ((i / side) % side) as f32;
    let y = (i / (side * side)) as f32;
    Vec3::new(x, y, z) * spacing
}

fn side_for(n: usize) -> usize {
    ((n as f32).cbrt().ceil() as usize).max(1)
}

/// `n` unit spheres packed closely enough for neighbors to overlap.
pub fn setup_sphere_world(n: usize) -> BodySet {
    let mut bodies = BodySet::new();
    let side = side_for(n);
    for i in 0..n {
        bodies
            .insert(
                RigidBodyDesc::dynamic(1.0)
                    .with_position(grid_position(i, side, 1.8))
                    .with_shape(sphere(1.0)),
            )
            .expect("valid body");
    }
    bodies
}

/// Every shape type, randomly oriented.
pub fn setup_mixed_world(n: usize) -> BodySet {
    let mut bodies = BodySet::new();
    let mut rng = StdRng::seed_from_u64(7);
    let side = side_for(n);
    for i in 0..n {
        let orientation = Quat::from_euler(
            glam::EulerRot::XYZ,
            rng.gen::<f32>() * TAU,
            rng.gen::<f32>() * TAU,
            rng.gen::<f32>() * TAU,
        );
        bodies
            .insert(
                RigidBodyDesc::dynamic(1.0)
                    .with_position(grid_position(i, side, 1.8))
                    .with_orientation(orientation)
                    .with_shape(mixed_shape(i)),
            )
            .expect("valid body");
    }
    bodies
}

/// Spheres spread far apart: few or no overlaps.
pub fn setup_sparse_world(n: usize) -> BodySet {
    let mut bodies = BodySet::new();
    let side = side_for(n);
    for i in 0..n {
        bodies
            .insert(
                RigidBodyDesc::dynamic(1.0)
                    .with_position(grid_position(i, side, 10.0))
                    .with_shape(sphere(1.0)),
            )
            .expect("valid body");
    }
    bodies
}

fn ground(physics: &mut PhysicsWorld) {
    physics
        .create_body(
            RigidBodyDesc::fixed()
                .with_position(Vec3::new(0.0, -0.5, 0.0))
                .with_shape(cuboid(Vec3::new(1000.0, 0.5, 1000.0))),
        )
        .expect("static ground");
}

/// `n` boxes resting slightly inside a static ground, with contacts generated.
pub fn setup_contact_scene(n: usize) -> PhysicsWorld {
    let mut physics = PhysicsWorld::new(PhysicsConfig::default());
    ground(&mut physics);
    for i in 0..n {
        let x = (i % 32) as f32 * 2.0;
        let z = (i / 32) as f32 * 2.0;
        physics
            .create_body(
                RigidBodyDesc::dynamic(1.0)
                    .with_position(Vec3::new(x, 0.48, z))
                    .with_shape(cuboid(Vec3::splat(0.5))),
            )
            .expect("valid body");
    }
    physics.update_broad_phase_pairs();
    physics.run_narrow_phase();
    physics
}

/// Mixed bodies dropped onto a ground plane.
pub fn setup_scene(n: usize) -> PhysicsWorld {
    let mut physics = PhysicsWorld::new(PhysicsConfig::default());
    ground(&mut physics);
    let side = side_for(n);
    for i in 0..n {
        physics
            .create_body(
                RigidBodyDesc::dynamic(1.0)
                    .with_position(grid_position(i, side, 2.5) + Vec3::new(0.0, 1.0, 0.0))
                    .with_shape(mixed_shape(i)),
            )
            .expect("valid body");
    }
    physics
}

/// A hanging chain of `n` spheres linked by ball-and-socket joints.
pub fn setup_chain(n: usize) -> (PhysicsWorld, Vec<BodyId>) {
    let mut physics = PhysicsWorld::new(PhysicsConfig::default());
    let anchor = physics
        .create_body(RigidBodyDesc::fixed().with_position(Vec3::new(0.0, 10.0, 0.0)))
        .expect("static anchor");
    let mut links = Vec::with_capacity(n);
    let mut previous = anchor;
    for i in 0..n {
        let position = Vec3::new((i + 1) as f32, 10.0, 0.0);
        let link = physics
            .create_body(
                RigidBodyDesc::dynamic(1.0)
                    .with_position(position)
                    .with_shape(sphere(0.25)),
            )
            .expect("valid body");
        physics
            .create_joint(JointInfo::ball_and_socket(
                previous,
                link,
                position - Vec3::new(1.0, 0.0, 0.0),
            ))
            .expect("distinct bodies");
        links.push(link);
        previous = link;
    }
    (physics, links)
}

fn mixed_shape(i: usize) -> ConvexShape {
    let shape = match i % 5 {
        0 => ConvexShape::sphere(0.5),
        1 => ConvexShape::cuboid(Vec3::splat(0.5)),
        2 => ConvexShape::cone(0.5, 1.0),
        3 => ConvexShape::cylinder(0.5, 1.0),
        _ => ConvexShape::capsule(0.4, 1.0),
    };
    shape.unwrap_or_else(|_| sphere(0.5))
}

fn sphere(radius: f32) -> ConvexShape {
    ConvexShape::sphere(radius).expect("positive radius")
}

fn cuboid(half_extents: Vec3) -> ConvexShape {
    ConvexShape::cuboid(half_extents).expect("positive half extents")
}
