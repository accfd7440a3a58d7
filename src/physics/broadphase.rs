//! Broad phase: AABB sort-and-sweep feeding a persistent pair registry.

use std::collections::{BTreeMap, BTreeSet};

use glam::Vec3;
use tracing::trace;

use crate::error::{PhysicsError, Result};

use super::collider::PhysicsAabb;
use super::contact::ContactManifold;
use super::rigid_body::{BodyId, BodySet};

/// Initial cached separating axis of a new pair.
pub const DEFAULT_SEPARATING_AXIS: Vec3 = Vec3::ONE;

/// Order-independent key of a body pair: lower id first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BodyIndexPair {
    first: BodyId,
    second: BodyId,
}

impl BodyIndexPair {
    /// Canonical key for two distinct bodies.
    pub fn new(a: BodyId, b: BodyId) -> Result<Self> {
        if a == b {
            return Err(PhysicsError::CoincidentBodies(a));
        }
        Ok(if a < b {
            Self {
                first: a,
                second: b,
            }
        } else {
            Self {
                first: b,
                second: a,
            }
        })
    }

    pub fn first(&self) -> BodyId {
        self.first
    }

    pub fn second(&self) -> BodyId {
        self.second
    }

    pub fn contains(&self, id: BodyId) -> bool {
        self.first == id || self.second == id
    }
}

/// A candidate colliding pair.
#[derive(Debug, Clone)]
pub struct BroadPhasePair {
    key: BodyIndexPair,
    /// Separating axis found by the last narrow-phase query of this pair.
    /// Only a hint for the next query.
    pub previous_separating_axis: Vec3,
    /// Contact points persisted across steps for warm-starting.
    pub manifold: ContactManifold,
}

impl BroadPhasePair {
    fn new(key: BodyIndexPair) -> Self {
        Self {
            key,
            previous_separating_axis: DEFAULT_SEPARATING_AXIS,
            manifold: ContactManifold::new(key),
        }
    }

    pub fn key(&self) -> BodyIndexPair {
        self.key
    }

    pub fn body1(&self) -> BodyId {
        self.key.first
    }

    pub fn body2(&self) -> BodyId {
        self.key.second
    }

    /// Drop the narrow-phase caches (separating axis and contacts).
    pub fn reset_cache(&mut self) {
        self.previous_separating_axis = DEFAULT_SEPARATING_AXIS;
        self.manifold.clear();
    }
}

/// Pairs keyed by [`BodyIndexPair`], iterated in key order.
#[derive(Debug, Default, Clone)]
pub struct PairRegistry {
    pairs: BTreeMap<BodyIndexPair, BroadPhasePair>,
}

impl PairRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the pair if absent. Returns its key.
    pub fn upsert_pair(&mut self, a: BodyId, b: BodyId) -> Result<BodyIndexPair> {
        let key = BodyIndexPair::new(a, b)?;
        self.insert_key(key);
        Ok(key)
    }

    fn insert_key(&mut self, key: BodyIndexPair) {
        self.pairs.entry(key).or_insert_with(|| {
            trace!(?key, "broad-phase pair created");
            BroadPhasePair::new(key)
        });
    }

    pub fn remove_pair(&mut self, key: BodyIndexPair) -> Option<BroadPhasePair> {
        let removed = self.pairs.remove(&key);
        if removed.is_some() {
            trace!(?key, "broad-phase pair removed");
        }
        removed
    }

    /// Remove every pair involving `id`.
    pub fn remove_body(&mut self, id: BodyId) {
        self.pairs.retain(|key, _| !key.contains(id));
    }

    pub fn pair(&self, key: BodyIndexPair) -> Option<&BroadPhasePair> {
        self.pairs.get(&key)
    }

    pub fn pair_mut(&mut self, key: BodyIndexPair) -> Option<&mut BroadPhasePair> {
        self.pairs.get_mut(&key)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BroadPhasePair> {
        self.pairs.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut BroadPhasePair> {
        self.pairs.values_mut()
    }

    fn retain(&mut self, mut keep: impl FnMut(&BodyIndexPair) -> bool) {
        self.pairs.retain(|key, _| {
            let kept = keep(key);
            if !kept {
                trace!(?key, "broad-phase pair removed");
            }
            kept
        });
    }
}

/// Sweep-and-prune broad phase along the X axis.
#[derive(Debug, Default)]
pub struct SweepAndPrune {
    registry: PairRegistry,
    // Scratch buffer reused between steps.
    entries: Vec<(BodyId, PhysicsAabb, bool)>,
}

impl SweepAndPrune {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pairs(&self) -> &PairRegistry {
        &self.registry
    }

    pub fn pairs_mut(&mut self) -> &mut PairRegistry {
        &mut self.registry
    }

    /// Find every overlapping pair, register new ones and drop stale ones.
    ///
    /// Only pairs where at least one body has motion enabled are kept.
    /// `exclude` filters pairs that must never collide (e.g. jointed bodies).
    pub fn update_pairs(
        &mut self,
        bodies: &BodySet,
        exclude: impl Fn(BodyIndexPair) -> bool,
    ) {
        self.entries.clear();
        for body in bodies.iter() {
            if let Some(shape) = body.shape() {
                let aabb = shape.compute_aabb(&body.transform);
                self.entries.push((body.id(), aabb, body.is_motion_enabled()));
            }
        }
        self.entries
            .sort_by(|a, b| a.1.min.x.total_cmp(&b.1.min.x).then(a.0.cmp(&b.0)));

        let mut overlapping = BTreeSet::new();
        for i in 0..self.entries.len() {
            let (id_a, aabb_a, moving_a) = self.entries[i];
            for &(id_b, aabb_b, moving_b) in &self.entries[i + 1..] {
                if aabb_b.min.x > aabb_a.max.x {
                    break;
                }
                // Skip pairs that can never move relative to each other.
                if !moving_a && !moving_b {
                    continue;
                }
                if !aabb_a.overlaps(&aabb_b) {
                    continue;
                }
                let Ok(key) = BodyIndexPair::new(id_a, id_b) else {
                    continue;
                };
                if exclude(key) {
                    continue;
                }
                overlapping.insert(key);
            }
        }

        self.registry.retain(|key| overlapping.contains(key));
        for key in overlapping {
            self.registry.insert_key(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::rigid_body::RigidBodyDesc;
    use crate::physics::shape::ConvexShape;

    fn sphere_body(bodies: &mut BodySet, desc: RigidBodyDesc, x: f32, radius: f32) -> BodyId {
        bodies
            .insert(
                desc.with_position(Vec3::new(x, 0.0, 0.0))
                    .with_shape(ConvexShape::sphere(radius).unwrap()),
            )
            .unwrap()
    }

    #[test]
    fn test_pair_key_is_order_independent() {
        let a = BodyId(3);
        let b = BodyId(7);
        let ab = BodyIndexPair::new(a, b).unwrap();
        let ba = BodyIndexPair::new(b, a).unwrap();
        assert_eq!(ab, ba);
        assert_eq!(ab.first(), a);
        assert_eq!(ab.second(), b);
    }

    #[test]
    fn test_pair_key_rejects_same_body() {
        assert_eq!(
            BodyIndexPair::new(BodyId(1), BodyId(1)),
            Err(PhysicsError::CoincidentBodies(BodyId(1)))
        );
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let mut registry = PairRegistry::new();
        let key = registry.upsert_pair(BodyId(2), BodyId(1)).unwrap();
        registry.pair_mut(key).unwrap().previous_separating_axis = Vec3::X;

        let again = registry.upsert_pair(BodyId(1), BodyId(2)).unwrap();
        assert_eq!(key, again);
        assert_eq!(registry.len(), 1);
        // Existing pair untouched.
        assert_eq!(registry.pair(key).unwrap().previous_separating_axis, Vec3::X);

        assert!(registry.remove_pair(key).is_some());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_new_pair_has_default_axis() {
        let mut registry = PairRegistry::new();
        let key = registry.upsert_pair(BodyId(0), BodyId(1)).unwrap();
        assert_eq!(
            registry.pair(key).unwrap().previous_separating_axis,
            Vec3::new(1.0, 1.0, 1.0)
        );
    }

    #[test]
    fn test_broadphase_overlapping() {
        let mut bodies = BodySet::new();
        sphere_body(&mut bodies, RigidBodyDesc::dynamic(1.0), 0.0, 1.0);
        sphere_body(&mut bodies, RigidBodyDesc::dynamic(1.0), 1.0, 1.0);

        let mut broadphase = SweepAndPrune::new();
        broadphase.update_pairs(&bodies, |_| false);
        assert_eq!(broadphase.pairs().len(), 1);
    }

    #[test]
    fn test_broadphase_no_overlap() {
        let mut bodies = BodySet::new();
        sphere_body(&mut bodies, RigidBodyDesc::dynamic(1.0), 0.0, 0.5);
        sphere_body(&mut bodies, RigidBodyDesc::dynamic(1.0), 10.0, 0.5);

        let mut broadphase = SweepAndPrune::new();
        broadphase.update_pairs(&bodies, |_| false);
        assert!(broadphase.pairs().is_empty());
    }

    #[test]
    fn test_broadphase_static_static_skipped() {
        let mut bodies = BodySet::new();
        sphere_body(&mut bodies, RigidBodyDesc::fixed(), 0.0, 1.0);
        sphere_body(&mut bodies, RigidBodyDesc::fixed(), 0.5, 1.0);

        let mut broadphase = SweepAndPrune::new();
        broadphase.update_pairs(&bodies, |_| false);
        assert!(broadphase.pairs().is_empty());
    }

    #[test]
    fn test_pair_removed_when_aabbs_separate() {
        let mut bodies = BodySet::new();
        let a = sphere_body(&mut bodies, RigidBodyDesc::dynamic(1.0), 0.0, 1.0);
        sphere_body(&mut bodies, RigidBodyDesc::dynamic(1.0), 1.5, 1.0);

        let mut broadphase = SweepAndPrune::new();
        broadphase.update_pairs(&bodies, |_| false);
        assert_eq!(broadphase.pairs().len(), 1);

        bodies.get_mut(a).unwrap().transform.position.x = -10.0;
        broadphase.update_pairs(&bodies, |_| false);
        assert!(broadphase.pairs().is_empty());
    }

    #[test]
    fn test_update_keeps_cache_of_persisting_pair() {
        let mut bodies = BodySet::new();
        let a = sphere_body(&mut bodies, RigidBodyDesc::dynamic(1.0), 0.0, 1.0);
        let b = sphere_body(&mut bodies, RigidBodyDesc::dynamic(1.0), 1.5, 1.0);

        let mut broadphase = SweepAndPrune::new();
        broadphase.update_pairs(&bodies, |_| false);
        let key = BodyIndexPair::new(a, b).unwrap();
        broadphase.pairs_mut().pair_mut(key).unwrap().previous_separating_axis = Vec3::X;

        broadphase.update_pairs(&bodies, |_| false);
        assert_eq!(broadphase.pairs().len(), 1);
        assert_eq!(broadphase.pairs().pair(key).unwrap().previous_separating_axis, Vec3::X);
    }

    #[test]
    fn test_excluded_pairs_are_not_registered() {
        let mut bodies = BodySet::new();
        sphere_body(&mut bodies, RigidBodyDesc::dynamic(1.0), 0.0, 1.0);
        sphere_body(&mut bodies, RigidBodyDesc::dynamic(1.0), 1.0, 1.0);

        let mut broadphase = SweepAndPrune::new();
        broadphase.update_pairs(&bodies, |_| true);
        assert!(broadphase.pairs().is_empty());
    }

    #[test]
    fn test_broadphase_many_bodies() {
        let mut bodies = BodySet::new();
        for i in 0..10 {
            for j in 0..10 {
                let pos = Vec3::new(i as f32 * 1.5, 0.0, j as f32 * 1.5);
                bodies
                    .insert(
                        RigidBodyDesc::dynamic(1.0)
                            .with_position(pos)
                            .with_shape(ConvexShape::sphere(1.0).unwrap()),
                    )
                    .unwrap();
            }
        }

        let mut broadphase = SweepAndPrune::new();
        broadphase.update_pairs(&bodies, |_| false);
        // Each sphere touches its grid neighbours: 2 * 10 * 9 edges plus diagonals.
        assert!(broadphase.pairs().len() >= 180);
        let keys: Vec<_> = broadphase.pairs().iter().map(|p| p.key()).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted, "iteration is in key order");
    }
}
