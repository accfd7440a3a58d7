//! Physics engine benchmarks (criterion - wall-clock time).
//!
//! Run all:    cargo bench --manifest-path benchmarks/Cargo.toml --bench physics
//! Filter:     cargo bench --manifest-path benchmarks/Cargo.toml --bench physics -- broadphase

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::{Quat, Vec3};
use rein_physics::physics::broadphase::{SweepAndPrune, DEFAULT_SEPARATING_AXIS};
use rein_physics::physics::math::Transform;
use rein_physics::physics::narrowphase::{detect_collision, gjk_intersection, sphere_sphere};
use rein_physics::{BodySet, ConvexShape};
use rein_physics_bench::*;

// ---------------------------------------------------------------------------
// Broadphase
// ---------------------------------------------------------------------------

fn bench_broadphase(c: &mut Criterion) {
    let scenes: [(&str, fn(usize) -> BodySet); 3] = [
        ("broadphase/uniform_spheres", setup_sphere_world),
        ("broadphase/mixed_shapes", setup_mixed_world),
        ("broadphase/sparse", setup_sparse_world),
    ];
    for (name, setup) in scenes {
        let mut group = c.benchmark_group(name);
        for &n in &[100, 500, 1000, 2000] {
            let bodies = setup(n);
            let mut broadphase = SweepAndPrune::new();
            group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
                b.iter(|| broadphase.update_pairs(&bodies, |_| false));
            });
        }
        group.finish();
    }
}

// ---------------------------------------------------------------------------
// Narrowphase
// ---------------------------------------------------------------------------

fn at(x: f32) -> Transform {
    Transform::from_position(Vec3::new(x, 0.0, 0.0))
}

fn bench_narrowphase(c: &mut Criterion) {
    let sphere = ConvexShape::sphere(1.0).unwrap();
    let bbox = ConvexShape::cuboid(Vec3::splat(1.0)).unwrap();
    let cone = ConvexShape::cone(1.0, 2.0).unwrap();

    {
        let mut group = c.benchmark_group("narrowphase/sphere_sphere");
        group.bench_function("intersecting", |b| {
            b.iter(|| sphere_sphere(&sphere, &at(0.0), &sphere, &at(1.5)));
        });
        group.bench_function("separated", |b| {
            b.iter(|| sphere_sphere(&sphere, &at(0.0), &sphere, &at(5.0)));
        });
        group.finish();
    }

    {
        let mut group = c.benchmark_group("narrowphase/gjk");
        group.bench_function("intersecting", |b| {
            b.iter(|| gjk_intersection(&bbox, &at(0.0), &cone, &at(1.5), DEFAULT_SEPARATING_AXIS));
        });
        group.bench_function("separated_cold", |b| {
            b.iter(|| gjk_intersection(&bbox, &at(0.0), &cone, &at(5.0), DEFAULT_SEPARATING_AXIS));
        });
        group.bench_function("separated_cached_axis", |b| {
            b.iter(|| gjk_intersection(&bbox, &at(0.0), &cone, &at(5.0), -Vec3::X));
        });
        group.finish();
    }

    {
        let mut group = c.benchmark_group("narrowphase/dispatch");
        let rotated = Transform::new(Vec3::new(1.5, 0.0, 0.0), Quat::from_rotation_y(0.785));
        group.bench_function("box_box", |b| {
            b.iter(|| {
                let mut axis = DEFAULT_SEPARATING_AXIS;
                detect_collision(&bbox, &at(0.0), &bbox, &at(1.5), &mut axis)
            });
        });
        group.bench_function("box_box_rotated", |b| {
            b.iter(|| {
                let mut axis = DEFAULT_SEPARATING_AXIS;
                detect_collision(&bbox, &at(0.0), &bbox, &rotated, &mut axis)
            });
        });
        group.bench_function("sphere_box", |b| {
            b.iter(|| {
                let mut axis = DEFAULT_SEPARATING_AXIS;
                detect_collision(&sphere, &at(0.0), &bbox, &at(1.5), &mut axis)
            });
        });
        group.bench_function("cone_box", |b| {
            b.iter(|| {
                let mut axis = DEFAULT_SEPARATING_AXIS;
                detect_collision(&cone, &at(0.0), &bbox, &at(1.5), &mut axis)
            });
        });
        group.finish();
    }
}

// ---------------------------------------------------------------------------
// Solver
// ---------------------------------------------------------------------------

fn bench_solver(c: &mut Criterion) {
    {
        let mut group = c.benchmark_group("solver/contact_count");
        for &n in &[10, 50, 100, 500] {
            group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
                b.iter_batched(
                    || setup_contact_scene(n),
                    |mut physics| physics.solve_constraints(1.0 / 60.0, true),
                    criterion::BatchSize::LargeInput,
                );
            });
        }
        group.finish();
    }

    {
        let mut group = c.benchmark_group("solver/velocity_iterations");
        for &iters in &[1, 4, 10, 20] {
            group.bench_with_input(BenchmarkId::from_parameter(iters), &iters, |b, &iters| {
                b.iter_batched(
                    || {
                        let mut physics = setup_contact_scene(100);
                        physics.config_mut().velocity_iterations = iters;
                        physics
                    },
                    |mut physics| physics.solve_constraints(1.0 / 60.0, true),
                    criterion::BatchSize::LargeInput,
                );
            });
        }
        group.finish();
    }

    {
        let mut group = c.benchmark_group("solver/joint_chain");
        for &n in &[10, 50, 200] {
            group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
                b.iter_batched(
                    || setup_chain(n).0,
                    |mut physics| physics.solve_constraints(1.0 / 60.0, true),
                    criterion::BatchSize::LargeInput,
                );
            });
        }
        group.finish();
    }
}

// ---------------------------------------------------------------------------
// Full pipeline
// ---------------------------------------------------------------------------

fn bench_pipeline(c: &mut Criterion) {
    {
        let mut group = c.benchmark_group("pipeline/step");
        group.sample_size(30);
        for &n in &[50, 100, 500, 1000] {
            group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
                b.iter_batched(
                    || setup_scene(n),
                    |mut physics| physics.fixed_step(1.0 / 60.0),
                    criterion::BatchSize::LargeInput,
                );
            });
        }
        group.finish();
    }

    {
        let mut group = c.benchmark_group("pipeline/sustained_10steps");
        group.sample_size(20);
        for &n in &[100, 500] {
            group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
                b.iter_batched(
                    || setup_scene(n),
                    |mut physics| {
                        for _ in 0..10 {
                            physics.fixed_step(1.0 / 60.0);
                        }
                    },
                    criterion::BatchSize::LargeInput,
                );
            });
        }
        group.finish();
    }
}

criterion_group!(
    benches,
    bench_broadphase,
    bench_narrowphase,
    bench_solver,
    bench_pipeline
);
criterion_main!(benches);
