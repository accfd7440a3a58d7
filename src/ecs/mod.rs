//! hecs ECS integration.
//!
//! Entities carry a [`PhysicsBody`] handle into a [`PhysicsWorld`](crate::physics::PhysicsWorld)
//! and a [`Transform`] that [`sync_transforms`] refreshes after each step.

pub mod bridge;
pub mod components;
pub mod systems;

pub use bridge::spawn_body;
pub use components::{PhysicsBody, Transform};
pub use systems::sync_transforms;

pub mod prelude {
    pub use super::bridge::spawn_body;
    pub use super::components::{PhysicsBody, Transform};
    pub use super::systems::sync_transforms;
}
