use glam::Vec3;
use proptest::prelude::*;
use rein_physics::{BodyId, BodyIndexPair, ConvexShape, PhysicsError};

fn shape_strategy() -> impl Strategy<Value = ConvexShape> {
    prop_oneof![
        (0.1f32..5.0).prop_map(|r| ConvexShape::sphere(r).unwrap()),
        (0.1f32..5.0, 0.1f32..5.0, 0.1f32..5.0)
            .prop_map(|(x, y, z)| ConvexShape::cuboid(Vec3::new(x, y, z)).unwrap()),
        (0.1f32..5.0, 0.1f32..5.0).prop_map(|(r, h)| ConvexShape::cone(r, h).unwrap()),
        (0.1f32..5.0, 0.1f32..5.0).prop_map(|(r, h)| ConvexShape::cylinder(r, h).unwrap()),
        (0.1f32..5.0, 0.1f32..5.0).prop_map(|(r, h)| ConvexShape::capsule(r, h).unwrap()),
        prop::collection::vec((-3.0f32..3.0, -3.0f32..3.0, -3.0f32..3.0), 1..16).prop_map(
            |points| {
                let points = points.into_iter().map(|(x, y, z)| Vec3::new(x, y, z)).collect();
                ConvexShape::convex_mesh(points).unwrap()
            }
        ),
    ]
}

fn direction_strategy() -> impl Strategy<Value = Vec3> {
    (-1.0f32..1.0, -1.0f32..1.0, -1.0f32..1.0)
        .prop_map(|(x, y, z)| Vec3::new(x, y, z))
        .prop_filter("non-zero direction", |d| d.length() > 1e-2)
}

proptest! {
    #[test]
    fn support_point_dominates_shape_points(
        shape in shape_strategy(),
        d in direction_strategy(),
        others in prop::collection::vec((direction_strategy(), 0.0f32..1.0), 1..8),
    ) {
        let best = shape.local_support_point_without_margin(d).dot(d);
        let tolerance = 1e-4 * (1.0 + best.abs());

        // Support points along other directions lie on the shape, and so do
        // their convex combinations.
        let mut total_weight = 0.0;
        let mut combination = Vec3::ZERO;
        for (e, weight) in &others {
            let p = shape.local_support_point_without_margin(*e);
            prop_assert!(p.dot(d) <= best + tolerance, "{p} beats support along {d}");
            combination += p * *weight;
            total_weight += *weight;
        }
        if total_weight > 1e-3 {
            let p = combination / total_weight;
            prop_assert!(p.dot(d) <= best + tolerance);
        }
    }

    #[test]
    fn margin_offsets_support_along_direction(
        shape in shape_strategy(),
        d in direction_strategy(),
    ) {
        let with_margin = shape.local_support_point_with_margin(d);
        let without_margin = shape.local_support_point_without_margin(d);
        let expected = without_margin + d.normalize() * shape.margin();
        prop_assert!((with_margin - expected).length() < 1e-4);
    }

    #[test]
    fn pair_key_is_symmetric(a in 0u32..1000, b in 0u32..1000) {
        prop_assume!(a != b);
        let ab = BodyIndexPair::new(BodyId(a), BodyId(b)).unwrap();
        let ba = BodyIndexPair::new(BodyId(b), BodyId(a)).unwrap();
        prop_assert_eq!(ab, ba);
        prop_assert!(ab.first() < ab.second());
    }

    #[test]
    fn pair_key_rejects_same_body(a in 0u32..1000) {
        prop_assert_eq!(
            BodyIndexPair::new(BodyId(a), BodyId(a)),
            Err(PhysicsError::CoincidentBodies(BodyId(a)))
        );
    }
}

#[test]
fn zero_direction_uses_default_margin_direction() {
    let shape = ConvexShape::cuboid(Vec3::ONE).unwrap();
    let support = shape.local_support_point_with_margin(Vec3::ZERO);
    let core = shape.local_support_point_without_margin(Vec3::ZERO);
    assert!((support - core - Vec3::Y * shape.margin()).length() < 1e-6);

    let cone = ConvexShape::cone(1.0, 2.0).unwrap();
    let support = cone.local_support_point_with_margin(Vec3::ZERO);
    let core = cone.local_support_point_without_margin(Vec3::ZERO);
    assert!((support - core - Vec3::NEG_Y * cone.margin()).length() < 1e-6);
}

#[test]
fn cone_support_points() {
    let cone = ConvexShape::cone(1.0, 2.0).unwrap();
    let eps = 1e-6;
    let support = |d: Vec3| cone.local_support_point_without_margin(d);
    assert!((support(Vec3::Y) - Vec3::new(0.0, 1.0, 0.0)).length() < eps);
    assert!((support(Vec3::X) - Vec3::new(1.0, -1.0, 0.0)).length() < eps);
    assert!((support(Vec3::NEG_Y) - Vec3::new(0.0, -1.0, 0.0)).length() < eps);
}
