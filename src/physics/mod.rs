//! CPU rigid-body physics: convex collision detection and constraint solving.
//!
//! # Architecture
//!
//! The physics pipeline runs in a fixed timestep loop:
//!
//! 1. Apply forces (gravity)
//! 2. Integrate velocities
//! 3. Broad phase (sweep-and-prune over AABBs, persistent pair registry)
//! 4. Narrow phase (GJK seeded by the cached separating axis, EPA, sphere fast path)
//! 5. Solve joints and contacts (sequential impulses, warm-started)
//! 6. Integrate positions, then optional NGS position correction
//! 7. Clear force accumulators

pub mod broadphase;
pub mod collider;
pub mod constraint;
pub mod contact;
pub mod math;
pub mod narrowphase;
pub mod rigid_body;
pub mod shape;
pub mod solver;

use std::collections::BTreeSet;

use glam::Vec3;
use tracing::{debug, warn};

use crate::error::{PhysicsError, Result};

use self::broadphase::{BodyIndexPair, PairRegistry, SweepAndPrune};
use self::constraint::{Constraint, ContactConstraint, JointInfo, PositionCorrection};
use self::contact::ContactPoint;
use self::narrowphase::detect_collision;
use self::rigid_body::{BodyId, BodySet, RigidBody, RigidBodyDesc};
use self::shape::ConvexShape;
use self::solver::ConstraintSolver;

/// Configuration for the physics simulation.
#[derive(Debug, Clone)]
pub struct PhysicsConfig {
    /// Gravity vector. Default: (0, -9.81, 0).
    pub gravity: Vec3,
    /// Fixed timestep for physics updates in seconds. Default: 1/60.
    pub fixed_timestep: f64,
    /// Maximum number of sub-steps per frame. Default: 4.
    pub max_substeps: u32,
    /// Velocity solver iterations. Default: 10.
    pub velocity_iterations: u32,
    /// Position solver iterations, used by NGS constraints. Default: 5.
    pub position_iterations: u32,
    /// Reuse last step's impulses as the starting guess. Default: true.
    pub warm_starting: bool,
    /// Position correction of contact constraints. Default: Baumgarte.
    pub contacts_position_correction: PositionCorrection,
    /// Approach speed above which restitution applies. Default: 1.0.
    pub restitution_velocity_threshold: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.81, 0.0),
            fixed_timestep: 1.0 / 60.0,
            max_substeps: 4,
            velocity_iterations: 10,
            position_iterations: 5,
            warm_starting: true,
            contacts_position_correction: PositionCorrection::Baumgarte,
            restitution_velocity_threshold: 1.0,
        }
    }
}

/// Handle of a joint created in a [`PhysicsWorld`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JointId(pub usize);

/// The main physics world managing simulation state.
pub struct PhysicsWorld {
    config: PhysicsConfig,
    accumulator: f64,
    bodies: BodySet,
    broadphase: SweepAndPrune,
    joints: Vec<Constraint>,
    joint_ids: Vec<JointId>,
    next_joint: usize,
}

impl PhysicsWorld {
    /// Create a new physics world with the given configuration.
    pub fn new(config: PhysicsConfig) -> Self {
        Self {
            config,
            accumulator: 0.0,
            bodies: BodySet::new(),
            broadphase: SweepAndPrune::new(),
            joints: Vec::new(),
            joint_ids: Vec::new(),
            next_joint: 0,
        }
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut PhysicsConfig {
        &mut self.config
    }

    pub fn bodies(&self) -> &BodySet {
        &self.bodies
    }

    pub fn body(&self, id: BodyId) -> Option<&RigidBody> {
        self.bodies.get(id)
    }

    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut RigidBody> {
        self.bodies.get_mut(id)
    }

    /// Candidate pairs with their cached separating axes and manifolds.
    pub fn pairs(&self) -> &PairRegistry {
        self.broadphase.pairs()
    }

    pub fn joint(&self, id: JointId) -> Option<&Constraint> {
        let slot = self.joint_ids.iter().position(|&j| j == id)?;
        self.joints.get(slot)
    }

    pub fn joints(&self) -> impl Iterator<Item = (JointId, &Constraint)> {
        self.joint_ids.iter().copied().zip(self.joints.iter())
    }

    /// Total number of cached contact points over all pairs.
    pub fn contact_count(&self) -> usize {
        self.broadphase.pairs().iter().map(|p| p.manifold.len()).sum()
    }

    /// Add a body. Fails with [`PhysicsError::InvalidMass`] for a dynamic
    /// body without a finite, positive mass.
    pub fn create_body(&mut self, desc: RigidBodyDesc) -> Result<BodyId> {
        let body_type = desc.body_type;
        let id = self.bodies.insert(desc)?;
        debug!(?id, ?body_type, "body created");
        Ok(id)
    }

    /// Remove a body together with its pairs and every joint attached to it.
    pub fn remove_body(&mut self, id: BodyId) -> Result<RigidBody> {
        let body = self.bodies.remove(id).ok_or(PhysicsError::UnknownBody(id))?;
        self.broadphase.pairs_mut().remove_body(id);

        let mut slot = 0;
        while slot < self.joints.len() {
            let joint = &self.joints[slot];
            if joint.body1() == id || joint.body2() == id {
                let joint_id = self.joint_ids.remove(slot);
                self.joints.remove(slot);
                debug!(?joint_id, body = ?id, "joint removed with its body");
            } else {
                slot += 1;
            }
        }
        debug!(?id, "body removed");
        Ok(body)
    }

    /// Replace the collision shape of a body.
    ///
    /// Pair caches survive when the new shape has the same type and
    /// dimensions as the old one; otherwise they are reset.
    pub fn set_collider_shape(&mut self, id: BodyId, shape: ConvexShape) -> Result<()> {
        let body = self.bodies.get_mut(id).ok_or(PhysicsError::UnknownBody(id))?;
        let unchanged = body
            .shape()
            .is_some_and(|old| matches!(old.is_equal_to(&shape), Ok(true)));
        body.set_shape(Some(shape));

        if !unchanged {
            for pair in self.broadphase.pairs_mut().iter_mut() {
                if pair.key().contains(id) {
                    pair.reset_cache();
                }
            }
            debug!(?id, "collider shape changed, pair caches reset");
        }
        Ok(())
    }

    /// Create a joint. Bodies joined without `collide_connected` stop colliding.
    pub fn create_joint(&mut self, info: JointInfo) -> Result<JointId> {
        let constraint = Constraint::from_joint_info(&info, &self.bodies)?;
        if !info.collide_connected {
            let key = BodyIndexPair::new(info.body1, info.body2)?;
            self.broadphase.pairs_mut().remove_pair(key);
        }

        let id = JointId(self.next_joint);
        self.next_joint += 1;
        self.joints.push(constraint);
        self.joint_ids.push(id);
        debug!(?id, body1 = ?info.body1, body2 = ?info.body2, kind = ?info.kind, "joint created");
        Ok(id)
    }

    pub fn destroy_joint(&mut self, id: JointId) -> Result<Constraint> {
        let slot = self
            .joint_ids
            .iter()
            .position(|&j| j == id)
            .ok_or(PhysicsError::UnknownJoint(id.0))?;
        self.joint_ids.remove(slot);
        let joint = self.joints.remove(slot);
        debug!(?id, "joint destroyed");
        Ok(joint)
    }

    /// Refresh the candidate pairs from the current body AABBs.
    pub fn update_broad_phase_pairs(&mut self) {
        let excluded: BTreeSet<BodyIndexPair> = self
            .joints
            .iter()
            .filter(|joint| !joint.collide_connected())
            .filter_map(|joint| BodyIndexPair::new(joint.body1(), joint.body2()).ok())
            .collect();
        self.broadphase
            .update_pairs(&self.bodies, |key| excluded.contains(&key));
    }

    /// Run the narrow phase on every candidate pair, updating its manifold
    /// and cached separating axis.
    pub fn run_narrow_phase(&mut self) {
        for pair in self.broadphase.pairs_mut().iter_mut() {
            let (Some(body1), Some(body2)) =
                (self.bodies.get(pair.body1()), self.bodies.get(pair.body2()))
            else {
                continue;
            };
            let (Some(shape1), Some(shape2)) = (body1.shape(), body2.shape()) else {
                pair.reset_cache();
                continue;
            };
            let (tf1, tf2) = (&body1.transform, &body2.transform);

            pair.manifold.update(tf1, tf2);
            match detect_collision(shape1, tf1, shape2, tf2, &mut pair.previous_separating_axis) {
                Some(info) => pair.manifold.add_contact(ContactPoint::new(&info, tf1, tf2)),
                None => pair.manifold.clear(),
            }
        }
    }

    /// Solve joints and contacts over `time_step`, integrating positions.
    ///
    /// A non-positive time step is ignored.
    pub fn solve_constraints(&mut self, time_step: f32, warm_starting_active: bool) {
        if time_step <= 0.0 || !time_step.is_finite() {
            warn!(time_step, "ignoring constraint solve with non-positive time step");
            return;
        }

        let mut contacts: Vec<Constraint> = self
            .broadphase
            .pairs()
            .iter()
            .filter(|pair| !pair.manifold.is_empty())
            .filter_map(|pair| {
                let body1 = self.bodies.get(pair.body1())?;
                let body2 = self.bodies.get(pair.body2())?;
                Some(Constraint::Contact(ContactConstraint::new(
                    &pair.manifold,
                    body1,
                    body2,
                    self.config.contacts_position_correction,
                    self.config.restitution_velocity_threshold,
                )))
            })
            .collect();

        let solver =
            ConstraintSolver::new(self.config.velocity_iterations, self.config.position_iterations);
        solver.solve_constraints(
            &mut self.bodies,
            &mut self.joints,
            &mut contacts,
            time_step,
            warm_starting_active,
        );

        let registry = self.broadphase.pairs_mut();
        for constraint in &contacts {
            if let Constraint::Contact(solved) = constraint {
                if let Some(pair) = registry.pair_mut(solved.key()) {
                    pair.manifold.store_impulses(solved);
                }
            }
        }
        debug!(
            pairs = registry.len(),
            contacts = contacts.len(),
            joints = self.joints.len(),
            "constraints solved"
        );
    }

    /// Step the physics simulation forward by `delta_time` seconds.
    ///
    /// Uses a fixed timestep accumulator to ensure deterministic simulation.
    /// Returns the number of fixed steps taken.
    pub fn step(&mut self, delta_time: f64) -> u32 {
        if self.config.fixed_timestep <= 0.0 {
            warn!(
                fixed_timestep = self.config.fixed_timestep,
                "ignoring step with non-positive fixed timestep"
            );
            return 0;
        }
        self.accumulator += delta_time.max(0.0);

        let mut substeps = 0u32;
        while self.accumulator >= self.config.fixed_timestep && substeps < self.config.max_substeps
        {
            self.fixed_step(self.config.fixed_timestep as f32);
            self.accumulator -= self.config.fixed_timestep;
            substeps += 1;
        }

        // Clamp accumulator to avoid spiral of death
        if self.accumulator > self.config.fixed_timestep * self.config.max_substeps as f64 {
            warn!(
                accumulator = self.accumulator,
                "physics falling behind, dropping accumulated time"
            );
            self.accumulator = 0.0;
        }
        substeps
    }

    /// Advance the simulation by exactly one step of `dt` seconds.
    pub fn fixed_step(&mut self, dt: f32) {
        if dt <= 0.0 || !dt.is_finite() {
            warn!(dt, "ignoring step with non-positive time step");
            return;
        }

        // 1. Apply forces (gravity)
        rigid_body::apply_gravity(&mut self.bodies, self.config.gravity);

        // 2. Integrate velocities
        rigid_body::integrate_velocities(&mut self.bodies, dt);

        // 3. Broad phase
        self.update_broad_phase_pairs();

        // 4. Narrow phase
        self.run_narrow_phase();

        // 5-6. Solve constraints, integrate positions
        self.solve_constraints(dt, self.config.warm_starting);

        // 7. Clear force accumulators
        rigid_body::clear_forces(&mut self.bodies);
    }
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new(PhysicsConfig::default())
    }
}
