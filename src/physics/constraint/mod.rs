//! Constraints solved by sequential impulses.
//!
//! Every constraint goes through the same four phases each step:
//! `init_before_solve`, `warmstart`, `solve_velocity_constraint` and
//! `solve_position_constraint`. All phases read and write body state through a
//! [`ConstraintSolverData`] built for the step, never through the bodies
//! themselves.

mod ball_socket;
mod contact;
mod fixed;
mod hinge;
mod slider;

pub use ball_socket::BallAndSocketJoint;
pub use contact::{ContactConstraint, ContactPointConstraint};
pub use fixed::FixedJoint;
pub use hinge::HingeJoint;
pub use slider::SliderJoint;

use std::collections::HashMap;

use glam::{Mat3, Quat, Vec3};
use tracing::trace;

use crate::error::{PhysicsError, Result};

use super::math::{apply_angular_displacement, world_inverse_inertia, MACHINE_EPSILON};
use super::rigid_body::{BodyId, BodySet};

/// Baumgarte stabilization factor.
pub const BETA: f32 = 0.2;

/// How position drift of a constraint is corrected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PositionCorrection {
    /// Velocity bias proportional to the position error.
    Baumgarte,
    /// Separate position pass after integration.
    #[default]
    NonLinearGaussSeidel,
}

/// Where a constraint is in the current step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConstraintPhase {
    #[default]
    Uninitialized,
    Initialized,
    WarmStarted,
    VelocitySolved,
    PositionSolved,
    /// Skipped for this step.
    Inactive,
}

/// Per-step solver view of the constrained bodies.
///
/// Arrays are indexed by a dense slot assigned when the context is built.
/// Bodies without motion still get a slot, with zero inverse mass and inertia.
#[derive(Debug, Clone, Default)]
pub struct ConstraintSolverData {
    pub time_step: f32,
    pub is_warm_starting_active: bool,
    pub linear_velocities: Vec<Vec3>,
    pub angular_velocities: Vec<Vec3>,
    pub positions: Vec<Vec3>,
    pub orientations: Vec<Quat>,
    inverse_masses: Vec<f32>,
    local_inverse_inertias: Vec<Mat3>,
    motion_enabled: Vec<bool>,
    body_ids: Vec<BodyId>,
    body_to_index: HashMap<BodyId, usize>,
}

impl ConstraintSolverData {
    /// Build the context over the given bodies. Unknown and repeated ids are skipped.
    pub fn new(
        bodies: &BodySet,
        ids: impl IntoIterator<Item = BodyId>,
        time_step: f32,
        is_warm_starting_active: bool,
    ) -> Self {
        let mut data = Self {
            time_step,
            is_warm_starting_active,
            ..Self::default()
        };
        for id in ids {
            if data.body_to_index.contains_key(&id) {
                continue;
            }
            let Some(body) = bodies.get(id) else {
                continue;
            };
            let motion = body.is_motion_enabled();
            data.body_to_index.insert(id, data.body_ids.len());
            data.body_ids.push(id);
            data.linear_velocities.push(body.linear_velocity);
            data.angular_velocities.push(body.angular_velocity);
            data.positions.push(body.transform.position);
            data.orientations.push(body.transform.orientation);
            data.inverse_masses
                .push(if motion { body.inverse_mass() } else { 0.0 });
            data.local_inverse_inertias.push(if motion {
                body.local_inverse_inertia()
            } else {
                Mat3::ZERO
            });
            data.motion_enabled.push(motion);
        }
        data
    }

    pub fn index_of(&self, id: BodyId) -> Option<usize> {
        self.body_to_index.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.body_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body_ids.is_empty()
    }

    pub fn is_motion_enabled(&self, index: usize) -> bool {
        self.motion_enabled[index]
    }

    pub fn inverse_mass(&self, index: usize) -> f32 {
        self.inverse_masses[index]
    }

    /// World inverse inertia from the slot's current orientation.
    pub fn world_inverse_inertia(&self, index: usize) -> Mat3 {
        world_inverse_inertia(self.orientations[index], self.local_inverse_inertias[index])
    }

    /// Write the solved velocities back into the bodies.
    pub fn store_velocities(&self, bodies: &mut BodySet) {
        for (i, id) in self.body_ids.iter().enumerate() {
            if !self.motion_enabled[i] {
                continue;
            }
            if let Some(body) = bodies.get_mut(*id) {
                body.linear_velocity = self.linear_velocities[i];
                body.angular_velocity = self.angular_velocities[i];
            }
        }
    }

    /// Reload positions and orientations after integration.
    pub fn load_positions(&mut self, bodies: &BodySet) {
        for (i, id) in self.body_ids.iter().enumerate() {
            if let Some(body) = bodies.get(*id) {
                self.positions[i] = body.transform.position;
                self.orientations[i] = body.transform.orientation;
            }
        }
    }

    /// Write the corrected poses back into the bodies.
    pub fn store_positions(&self, bodies: &mut BodySet) {
        for (i, id) in self.body_ids.iter().enumerate() {
            if !self.motion_enabled[i] {
                continue;
            }
            if let Some(body) = bodies.get_mut(*id) {
                body.transform.position = self.positions[i];
                body.transform.orientation = self.orientations[i];
            }
        }
    }
}

/// Context slots and mass data of the two bodies of a constraint.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct BodySlots {
    pub index1: usize,
    pub index2: usize,
    pub motion1: bool,
    pub motion2: bool,
    pub inverse_mass1: f32,
    pub inverse_mass2: f32,
    /// World inverse inertia of body 1.
    pub i1: Mat3,
    /// World inverse inertia of body 2.
    pub i2: Mat3,
}

impl BodySlots {
    /// `None` when a body is missing from the context or neither can move.
    pub fn resolve(data: &ConstraintSolverData, body1: BodyId, body2: BodyId) -> Option<Self> {
        let index1 = data.index_of(body1)?;
        let index2 = data.index_of(body2)?;
        let motion1 = data.is_motion_enabled(index1);
        let motion2 = data.is_motion_enabled(index2);
        if !motion1 && !motion2 {
            return None;
        }
        Some(Self {
            index1,
            index2,
            motion1,
            motion2,
            inverse_mass1: data.inverse_mass(index1),
            inverse_mass2: data.inverse_mass(index2),
            i1: data.world_inverse_inertia(index1),
            i2: data.world_inverse_inertia(index2),
        })
    }

    pub fn refresh_inertia(&mut self, data: &ConstraintSolverData) {
        self.i1 = data.world_inverse_inertia(self.index1);
        self.i2 = data.world_inverse_inertia(self.index2);
    }

    /// Sum of the inverse masses of the moving bodies.
    pub fn inverse_mass_sum(&self) -> f32 {
        let mut sum = 0.0;
        if self.motion1 {
            sum += self.inverse_mass1;
        }
        if self.motion2 {
            sum += self.inverse_mass2;
        }
        sum
    }

    /// `K = (m1 + m2) I + [r1]x I1 [r1]x^T + [r2]x I2 [r2]x^T` for a point constraint.
    pub fn point_mass_matrix(&self, r1: Vec3, r2: Vec3) -> Mat3 {
        use super::math::skew_symmetric;
        let mut k = Mat3::from_diagonal(Vec3::splat(self.inverse_mass_sum()));
        if self.motion1 {
            let u1 = skew_symmetric(r1);
            k += u1 * self.i1 * u1.transpose();
        }
        if self.motion2 {
            let u2 = skew_symmetric(r2);
            k += u2 * self.i2 * u2.transpose();
        }
        k
    }

    /// Apply linear and angular impulses to the velocities of the moving bodies.
    pub fn apply_velocity_impulse(
        &self,
        data: &mut ConstraintSolverData,
        linear1: Vec3,
        angular1: Vec3,
        linear2: Vec3,
        angular2: Vec3,
    ) {
        if self.motion1 {
            data.linear_velocities[self.index1] += linear1 * self.inverse_mass1;
            data.angular_velocities[self.index1] += self.i1 * angular1;
        }
        if self.motion2 {
            data.linear_velocities[self.index2] += linear2 * self.inverse_mass2;
            data.angular_velocities[self.index2] += self.i2 * angular2;
        }
    }

    /// Apply pseudo-impulses directly to positions and orientations.
    pub fn apply_position_impulse(
        &self,
        data: &mut ConstraintSolverData,
        linear1: Vec3,
        angular1: Vec3,
        linear2: Vec3,
        angular2: Vec3,
    ) {
        if self.motion1 {
            data.positions[self.index1] += linear1 * self.inverse_mass1;
            let q = data.orientations[self.index1];
            data.orientations[self.index1] = apply_angular_displacement(q, self.i1 * angular1);
        }
        if self.motion2 {
            data.positions[self.index2] += linear2 * self.inverse_mass2;
            let q = data.orientations[self.index2];
            data.orientations[self.index2] = apply_angular_displacement(q, self.i2 * angular2);
        }
    }
}

/// State shared by every constraint.
#[derive(Debug, Clone)]
pub(crate) struct ConstraintBase {
    pub body1: BodyId,
    pub body2: BodyId,
    pub position_correction: PositionCorrection,
    pub collide_connected: bool,
    pub phase: ConstraintPhase,
    pub slots: BodySlots,
}

impl ConstraintBase {
    pub fn new(body1: BodyId, body2: BodyId, position_correction: PositionCorrection) -> Self {
        Self {
            body1,
            body2,
            position_correction,
            collide_connected: false,
            phase: ConstraintPhase::Uninitialized,
            slots: BodySlots::default(),
        }
    }

    /// Resolve the slots for this step. Returns false if the constraint is inactive.
    pub fn resolve(&mut self, data: &ConstraintSolverData) -> bool {
        match BodySlots::resolve(data, self.body1, self.body2) {
            Some(slots) => {
                self.slots = slots;
                true
            }
            None => false,
        }
    }

    pub fn uses_ngs(&self) -> bool {
        self.position_correction == PositionCorrection::NonLinearGaussSeidel
    }

    /// Baumgarte bias factor `beta / dt`, or zero under NGS.
    pub fn bias_factor(&self, data: &ConstraintSolverData) -> f32 {
        if self.uses_ngs() || data.time_step <= 0.0 {
            0.0
        } else {
            BETA / data.time_step
        }
    }
}

/// Angle limits (radians) or translation limits (meters) of a joint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointLimits {
    pub lower: f32,
    pub upper: f32,
}

/// Velocity motor of a hinge or slider joint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointMotor {
    /// Target velocity of body 2 relative to body 1 along the joint axis.
    pub speed: f32,
    /// Maximum torque (hinge) or force (slider) the motor can apply.
    pub max_force: f32,
}

/// Joint-specific construction data, in world space.
#[derive(Debug, Clone, PartialEq)]
pub enum JointKind {
    BallAndSocket {
        anchor: Vec3,
    },
    Hinge {
        anchor: Vec3,
        axis: Vec3,
        limits: Option<JointLimits>,
        motor: Option<JointMotor>,
    },
    Slider {
        anchor: Vec3,
        axis: Vec3,
        limits: Option<JointLimits>,
        motor: Option<JointMotor>,
    },
    Fixed {
        anchor: Vec3,
    },
}

/// Description of a joint between two bodies.
#[derive(Debug, Clone, PartialEq)]
pub struct JointInfo {
    pub body1: BodyId,
    pub body2: BodyId,
    pub kind: JointKind,
    /// Whether the two bodies still collide with each other.
    pub collide_connected: bool,
    pub position_correction: PositionCorrection,
}

impl JointInfo {
    fn new(body1: BodyId, body2: BodyId, kind: JointKind) -> Self {
        Self {
            body1,
            body2,
            kind,
            collide_connected: false,
            position_correction: PositionCorrection::default(),
        }
    }

    pub fn ball_and_socket(body1: BodyId, body2: BodyId, anchor: Vec3) -> Self {
        Self::new(body1, body2, JointKind::BallAndSocket { anchor })
    }

    pub fn hinge(body1: BodyId, body2: BodyId, anchor: Vec3, axis: Vec3) -> Self {
        Self::new(
            body1,
            body2,
            JointKind::Hinge {
                anchor,
                axis,
                limits: None,
                motor: None,
            },
        )
    }

    pub fn slider(body1: BodyId, body2: BodyId, anchor: Vec3, axis: Vec3) -> Self {
        Self::new(
            body1,
            body2,
            JointKind::Slider {
                anchor,
                axis,
                limits: None,
                motor: None,
            },
        )
    }

    pub fn fixed(body1: BodyId, body2: BodyId, anchor: Vec3) -> Self {
        Self::new(body1, body2, JointKind::Fixed { anchor })
    }

    /// Limits for hinge and slider joints. Ignored by other kinds.
    pub fn with_limits(mut self, lower: f32, upper: f32) -> Self {
        if let JointKind::Hinge { limits, .. } | JointKind::Slider { limits, .. } = &mut self.kind {
            *limits = Some(JointLimits { lower, upper });
        }
        self
    }

    /// Motor for hinge and slider joints. Ignored by other kinds.
    pub fn with_motor(mut self, speed: f32, max_force: f32) -> Self {
        if let JointKind::Hinge { motor, .. } | JointKind::Slider { motor, .. } = &mut self.kind {
            *motor = Some(JointMotor { speed, max_force });
        }
        self
    }

    pub fn with_collide_connected(mut self, collide_connected: bool) -> Self {
        self.collide_connected = collide_connected;
        self
    }

    pub fn with_position_correction(mut self, position_correction: PositionCorrection) -> Self {
        self.position_correction = position_correction;
        self
    }
}

fn check_axis(axis: Vec3) -> Result<Vec3> {
    if !axis.is_finite() || axis.length_squared() <= MACHINE_EPSILON * MACHINE_EPSILON {
        return Err(PhysicsError::InvalidJointAxis);
    }
    Ok(axis.normalize())
}

/// Limits must bracket the rest configuration.
fn check_limits(limits: Option<JointLimits>) -> Result<()> {
    match limits {
        Some(JointLimits { lower, upper }) if !(lower <= 0.0 && upper >= 0.0) => {
            Err(PhysicsError::InvalidLimits { lower, upper })
        }
        _ => Ok(()),
    }
}

/// Any constraint handled by the solver.
#[derive(Debug, Clone)]
pub enum Constraint {
    BallAndSocket(BallAndSocketJoint),
    Hinge(HingeJoint),
    Slider(SliderJoint),
    Fixed(FixedJoint),
    Contact(ContactConstraint),
}

macro_rules! dispatch {
    ($self:expr, $c:ident => $body:expr) => {
        match $self {
            Constraint::BallAndSocket($c) => $body,
            Constraint::Hinge($c) => $body,
            Constraint::Slider($c) => $body,
            Constraint::Fixed($c) => $body,
            Constraint::Contact($c) => $body,
        }
    };
}

impl Constraint {
    /// Build a joint from world-space info against the current body poses.
    pub fn from_joint_info(info: &JointInfo, bodies: &BodySet) -> Result<Self> {
        if info.body1 == info.body2 {
            return Err(PhysicsError::CoincidentBodies(info.body1));
        }
        let body1 = bodies
            .get(info.body1)
            .ok_or(PhysicsError::UnknownBody(info.body1))?;
        let body2 = bodies
            .get(info.body2)
            .ok_or(PhysicsError::UnknownBody(info.body2))?;
        let tf1 = &body1.transform;
        let tf2 = &body2.transform;

        let mut constraint = match &info.kind {
            JointKind::BallAndSocket { anchor } => Self::BallAndSocket(BallAndSocketJoint::new(
                info.body1,
                info.body2,
                tf1,
                tf2,
                *anchor,
                info.position_correction,
            )),
            JointKind::Hinge {
                anchor,
                axis,
                limits,
                motor,
            } => {
                let axis = check_axis(*axis)?;
                check_limits(*limits)?;
                Self::Hinge(HingeJoint::new(
                    info.body1,
                    info.body2,
                    tf1,
                    tf2,
                    *anchor,
                    axis,
                    *limits,
                    *motor,
                    info.position_correction,
                ))
            }
            JointKind::Slider {
                anchor,
                axis,
                limits,
                motor,
            } => {
                let axis = check_axis(*axis)?;
                check_limits(*limits)?;
                Self::Slider(SliderJoint::new(
                    info.body1,
                    info.body2,
                    tf1,
                    tf2,
                    *anchor,
                    axis,
                    *limits,
                    *motor,
                    info.position_correction,
                ))
            }
            JointKind::Fixed { anchor } => Self::Fixed(FixedJoint::new(
                info.body1,
                info.body2,
                tf1,
                tf2,
                *anchor,
                info.position_correction,
            )),
        };
        constraint.base_mut().collide_connected = info.collide_connected;
        Ok(constraint)
    }

    pub(crate) fn base(&self) -> &ConstraintBase {
        dispatch!(self, c => &c.base)
    }

    pub(crate) fn base_mut(&mut self) -> &mut ConstraintBase {
        dispatch!(self, c => &mut c.base)
    }

    pub fn body1(&self) -> BodyId {
        self.base().body1
    }

    pub fn body2(&self) -> BodyId {
        self.base().body2
    }

    pub fn phase(&self) -> ConstraintPhase {
        self.base().phase
    }

    pub fn position_correction(&self) -> PositionCorrection {
        self.base().position_correction
    }

    pub fn collide_connected(&self) -> bool {
        self.base().collide_connected
    }

    pub fn is_active(&self) -> bool {
        self.phase() != ConstraintPhase::Inactive
    }

    /// Compute the per-step solver data. Returns false (and marks the
    /// constraint inactive for the step) if it cannot act on its bodies.
    pub fn init_before_solve(&mut self, data: &ConstraintSolverData) -> bool {
        let active = dispatch!(self, c => c.init_before_solve(data));
        let base = self.base_mut();
        if active {
            base.phase = ConstraintPhase::Initialized;
        } else {
            trace!(body1 = ?base.body1, body2 = ?base.body2, "constraint inactive this step");
            base.phase = ConstraintPhase::Inactive;
        }
        active
    }

    /// Apply last step's accumulated impulses.
    pub fn warmstart(&mut self, data: &mut ConstraintSolverData) {
        if !self.is_active() {
            return;
        }
        dispatch!(self, c => c.warmstart(data));
        self.base_mut().phase = ConstraintPhase::WarmStarted;
    }

    pub fn solve_velocity_constraint(&mut self, data: &mut ConstraintSolverData) {
        if !self.is_active() {
            return;
        }
        dispatch!(self, c => c.solve_velocity_constraint(data));
        self.base_mut().phase = ConstraintPhase::VelocitySolved;
    }

    /// Position pass. Only acts under [`PositionCorrection::NonLinearGaussSeidel`].
    pub fn solve_position_constraint(&mut self, data: &mut ConstraintSolverData) {
        if !self.is_active() {
            return;
        }
        if self.base().uses_ngs() {
            dispatch!(self, c => c.solve_position_constraint(data));
        }
        self.base_mut().phase = ConstraintPhase::PositionSolved;
    }
}
