//! Sequential impulse constraint solver.
//!
//! Drives every constraint through its phases against one shared
//! [`ConstraintSolverData`], in a fixed order: joints first, then contacts.

use tracing::trace;

use super::constraint::{Constraint, ConstraintSolverData};
use super::rigid_body::{integrate_positions, BodySet};

/// Iteration counts of the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstraintSolver {
    pub velocity_iterations: u32,
    pub position_iterations: u32,
}

impl Default for ConstraintSolver {
    fn default() -> Self {
        Self {
            velocity_iterations: 10,
            position_iterations: 5,
        }
    }
}

impl ConstraintSolver {
    pub fn new(velocity_iterations: u32, position_iterations: u32) -> Self {
        Self {
            velocity_iterations,
            position_iterations,
        }
    }

    /// Solve one step of constraints and integrate body positions.
    ///
    /// Velocities are corrected first, then written back to the bodies, whose
    /// positions are integrated over `time_step`. Position iterations then
    /// correct the integrated poses of constraints using NGS.
    pub fn solve_constraints(
        &self,
        bodies: &mut BodySet,
        joints: &mut [Constraint],
        contacts: &mut [Constraint],
        time_step: f32,
        warm_starting_active: bool,
    ) {
        let ids = joints
            .iter()
            .chain(contacts.iter())
            .flat_map(|c| [c.body1(), c.body2()]);
        let mut data = ConstraintSolverData::new(bodies, ids, time_step, warm_starting_active);

        let mut active = 0usize;
        for constraint in joints.iter_mut().chain(contacts.iter_mut()) {
            if constraint.init_before_solve(&data) {
                active += 1;
            }
        }
        trace!(
            bodies = data.len(),
            constraints = joints.len() + contacts.len(),
            active,
            "constraint solver context built"
        );

        if warm_starting_active {
            for constraint in joints.iter_mut().chain(contacts.iter_mut()) {
                constraint.warmstart(&mut data);
            }
        }

        for _ in 0..self.velocity_iterations {
            for constraint in joints.iter_mut().chain(contacts.iter_mut()) {
                constraint.solve_velocity_constraint(&mut data);
            }
        }

        data.store_velocities(bodies);
        integrate_positions(bodies, time_step);
        data.load_positions(bodies);

        for _ in 0..self.position_iterations {
            for constraint in joints.iter_mut().chain(contacts.iter_mut()) {
                constraint.solve_position_constraint(&mut data);
            }
        }

        data.store_positions(bodies);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::constraint::{JointInfo, PositionCorrection};
    use crate::physics::rigid_body::{BodyId, RigidBodyDesc};
    use crate::physics::shape::ConvexShape;
    use glam::Vec3;

    fn pendulum(correction: PositionCorrection) -> (BodySet, Vec<Constraint>, BodyId) {
        let mut bodies = BodySet::new();
        let pivot = bodies.insert(RigidBodyDesc::fixed()).unwrap();
        let bob = bodies
            .insert(
                RigidBodyDesc::dynamic(1.0)
                    .with_position(Vec3::new(1.0, 0.0, 0.0))
                    .with_shape(ConvexShape::sphere(0.2).unwrap())
                    .with_damping(0.0, 0.0),
            )
            .unwrap();
        let joint = Constraint::from_joint_info(
            &JointInfo::ball_and_socket(pivot, bob, Vec3::ZERO)
                .with_position_correction(correction),
            &bodies,
        )
        .unwrap();
        (bodies, vec![joint], bob)
    }

    fn anchor_distance(bodies: &BodySet, joints: &[Constraint]) -> f32 {
        let Constraint::BallAndSocket(joint) = &joints[0] else {
            unreachable!()
        };
        let ids = [joints[0].body1(), joints[0].body2()];
        let data = ConstraintSolverData::new(bodies, ids, 1.0, false);
        joint.position_error(&data)
    }

    #[test]
    fn test_pendulum_keeps_length() {
        let corrections = [
            PositionCorrection::Baumgarte,
            PositionCorrection::NonLinearGaussSeidel,
        ];
        for correction in corrections {
            let (mut bodies, mut joints, bob) = pendulum(correction);
            let solver = ConstraintSolver::default();
            let dt = 1.0 / 60.0;
            for _ in 0..120 {
                bodies.get_mut(bob).unwrap().linear_velocity += Vec3::new(0.0, -9.81, 0.0) * dt;
                solver.solve_constraints(&mut bodies, &mut joints, &mut [], dt, true);
            }
            let distance = anchor_distance(&bodies, &joints);
            assert!(distance < 0.05, "{correction:?}: {distance}");
            // The bob swung down.
            assert!(bodies.get(bob).unwrap().position().y < -0.1);
        }
    }

    #[test]
    fn test_integrates_without_constraints() {
        let mut bodies = BodySet::new();
        let id = bodies.insert(RigidBodyDesc::dynamic(1.0).with_linear_velocity(Vec3::X)).unwrap();
        ConstraintSolver::default().solve_constraints(&mut bodies, &mut [], &mut [], 0.5, true);
        assert!((bodies.get(id).unwrap().position() - Vec3::new(0.5, 0.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_warm_start_needs_fewer_iterations() {
        // Steady load: after a few warm steps one iteration is enough.
        let (mut bodies, _, bob) = pendulum(PositionCorrection::NonLinearGaussSeidel);
        let solver = ConstraintSolver::new(1, 0);
        let dt = 1.0 / 60.0;
        // Hang the bob straight down.
        {
            let body = bodies.get_mut(bob).unwrap();
            body.transform.position = Vec3::new(0.0, -1.0, 0.0);
        }
        let mut joints = vec![Constraint::from_joint_info(
            &JointInfo::ball_and_socket(BodyId(0), bob, Vec3::ZERO),
            &bodies,
        )
        .unwrap()];
        for _ in 0..10 {
            bodies.get_mut(bob).unwrap().linear_velocity += Vec3::new(0.0, -9.81, 0.0) * dt;
            solver.solve_constraints(&mut bodies, &mut joints, &mut [], dt, true);
        }
        bodies.get_mut(bob).unwrap().linear_velocity += Vec3::new(0.0, -9.81, 0.0) * dt;
        solver.solve_constraints(&mut bodies, &mut joints, &mut [], dt, true);
        assert!(bodies.get(bob).unwrap().linear_velocity.length() < 1e-3);
    }
}
