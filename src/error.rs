//! Error type for configuration and construction failures.
//!
//! Only contract violations surface here (bad shape dimensions, joints between
//! a body and itself, unknown bodies). Numerical edge cases inside a step are
//! resolved locally and never produce an error.

use thiserror::Error;

use crate::physics::rigid_body::BodyId;
use crate::physics::shape::ShapeType;

/// Errors reported when building shapes, pairs, bodies or joints.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PhysicsError {
    #[error("invalid {shape:?} dimension `{parameter}`: {value} (must be > 0)")]
    InvalidShapeDimension {
        shape: ShapeType,
        parameter: &'static str,
        value: f32,
    },

    #[error("invalid collision margin {margin} for {shape:?}: {reason}")]
    InvalidMargin {
        shape: ShapeType,
        margin: f32,
        reason: &'static str,
    },

    #[error("convex mesh needs at least one finite vertex")]
    EmptyConvexMesh,

    #[error("body {0:?} cannot be paired or jointed with itself")]
    CoincidentBodies(BodyId),

    #[error("invalid mass {0} for a dynamic body (must be finite and > 0)")]
    InvalidMass(f32),

    #[error("unknown body {0:?}")]
    UnknownBody(BodyId),

    #[error("unknown joint {0}")]
    UnknownJoint(usize),

    #[error("shape type mismatch: expected {expected:?}, found {found:?}")]
    ShapeTypeMismatch { expected: ShapeType, found: ShapeType },

    #[error("joint axis must have non-zero length")]
    InvalidJointAxis,

    #[error("joint limits [{lower}, {upper}] must bracket the rest position (lower <= 0 <= upper)")]
    InvalidLimits { lower: f32, upper: f32 },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PhysicsError>;
