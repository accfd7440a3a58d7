//! Rein physics
//!
//! Collision and constraint core of a rigid-body simulator.
//!
//! # Architecture
//!
//! The library is organized into layers:
//!
//! 1. **physics::shape** - Convex shapes and their support mappings
//! 2. **physics::broadphase** - Sweep-and-prune with a persistent pair registry
//! 3. **physics::narrowphase** - GJK/EPA contact generation
//! 4. **physics::constraint** - Joints, contacts and the solver context
//! 5. **physics::solver** - Sequential impulse driver
//! 6. **ecs** - hecs ECS integration (feature = "ecs")

pub mod error;
pub mod physics;

#[cfg(feature = "ecs")]
pub mod ecs;

// Re-export commonly used types
pub use error::{PhysicsError, Result};

pub use physics::broadphase::{BodyIndexPair, PairRegistry};
pub use physics::constraint::{
    Constraint, ConstraintPhase, ConstraintSolverData, JointInfo, PositionCorrection,
};
pub use physics::rigid_body::{BodyId, BodySet, RigidBody, RigidBodyDesc, RigidBodyType};
pub use physics::shape::{ConvexShape, ShapeType};
pub use physics::{JointId, PhysicsConfig, PhysicsWorld};

#[cfg(feature = "ecs")]
pub use ecs::prelude::*;

// Re-export glam for convenience
pub use glam;
