//! Rigid bodies, their storage, and integration functions.

use std::collections::HashMap;

use glam::{Mat3, Quat, Vec3};

use crate::error::{PhysicsError, Result};

use super::math::{inverse_or_zero, world_inverse_inertia, Transform};
use super::shape::ConvexShape;

/// Permanent body identifier. Allocated once, never reused by a world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BodyId(pub u32);

/// Rigid body type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RigidBodyType {
    /// Affected by forces, contacts and joints.
    Dynamic,
    /// Immovable.
    Static,
    /// Moved by the user through its velocity; unaffected by impulses.
    Kinematic,
}

/// Parameters for creating a body.
#[derive(Debug, Clone)]
pub struct RigidBodyDesc {
    pub body_type: RigidBodyType,
    pub transform: Transform,
    pub mass: f32,
    pub shape: Option<ConvexShape>,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
    /// Linear damping factor (default: 0.01).
    pub linear_damping: f32,
    /// Angular damping factor (default: 0.01).
    pub angular_damping: f32,
    /// Coefficient of restitution (0.0 - 1.0).
    pub restitution: f32,
    /// Friction coefficient.
    pub friction: f32,
    /// Gravity scale (default: 1.0).
    pub gravity_scale: f32,
}

impl RigidBodyDesc {
    /// Create a dynamic body description with the given mass.
    pub fn dynamic(mass: f32) -> Self {
        Self {
            body_type: RigidBodyType::Dynamic,
            transform: Transform::IDENTITY,
            mass,
            shape: None,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            linear_damping: 0.01,
            angular_damping: 0.01,
            restitution: 0.3,
            friction: 0.5,
            gravity_scale: 1.0,
        }
    }

    /// Create a static body description.
    pub fn fixed() -> Self {
        Self {
            body_type: RigidBodyType::Static,
            mass: 0.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
            gravity_scale: 0.0,
            ..Self::dynamic(0.0)
        }
    }

    /// Create a kinematic body description.
    pub fn kinematic() -> Self {
        Self {
            body_type: RigidBodyType::Kinematic,
            ..Self::fixed()
        }
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.transform.position = position;
        self
    }

    pub fn with_orientation(mut self, orientation: Quat) -> Self {
        self.transform.orientation = orientation.normalize();
        self
    }

    pub fn with_shape(mut self, shape: ConvexShape) -> Self {
        self.shape = Some(shape);
        self
    }

    pub fn with_linear_velocity(mut self, velocity: Vec3) -> Self {
        self.linear_velocity = velocity;
        self
    }

    pub fn with_angular_velocity(mut self, velocity: Vec3) -> Self {
        self.angular_velocity = velocity;
        self
    }

    pub fn with_damping(mut self, linear: f32, angular: f32) -> Self {
        self.linear_damping = linear;
        self.angular_damping = angular;
        self
    }

    pub fn with_material(mut self, restitution: f32, friction: f32) -> Self {
        self.restitution = restitution;
        self.friction = friction;
        self
    }
}

/// A rigid body.
#[derive(Debug, Clone)]
pub struct RigidBody {
    id: BodyId,
    pub body_type: RigidBodyType,
    pub transform: Transform,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
    pub force_accumulator: Vec3,
    pub torque_accumulator: Vec3,
    mass: f32,
    inverse_mass: f32,
    local_inertia: Mat3,
    local_inverse_inertia: Mat3,
    shape: Option<ConvexShape>,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub restitution: f32,
    pub friction: f32,
    pub gravity_scale: f32,
}

impl RigidBody {
    pub(crate) fn new(id: BodyId, desc: RigidBodyDesc) -> Self {
        let mut body = Self {
            id,
            body_type: desc.body_type,
            transform: desc.transform,
            linear_velocity: desc.linear_velocity,
            angular_velocity: desc.angular_velocity,
            force_accumulator: Vec3::ZERO,
            torque_accumulator: Vec3::ZERO,
            mass: desc.mass.max(0.0),
            inverse_mass: 0.0,
            local_inertia: Mat3::ZERO,
            local_inverse_inertia: Mat3::ZERO,
            shape: desc.shape,
            linear_damping: desc.linear_damping,
            angular_damping: desc.angular_damping,
            restitution: desc.restitution,
            friction: desc.friction,
            gravity_scale: desc.gravity_scale,
        };
        body.update_mass_properties();
        body
    }

    pub fn id(&self) -> BodyId {
        self.id
    }

    /// True for dynamic bodies: only they respond to impulses.
    #[inline]
    pub fn is_motion_enabled(&self) -> bool {
        self.body_type == RigidBodyType::Dynamic
    }

    pub fn mass(&self) -> f32 {
        self.mass
    }

    /// Inverse mass, zero when motion is disabled.
    #[inline]
    pub fn inverse_mass(&self) -> f32 {
        self.inverse_mass
    }

    pub fn local_inertia_tensor(&self) -> Mat3 {
        self.local_inertia
    }

    /// Local-space inverse inertia, zero when motion is disabled.
    pub fn local_inverse_inertia(&self) -> Mat3 {
        self.local_inverse_inertia
    }

    /// World-space inverse inertia for the current orientation.
    pub fn world_inverse_inertia(&self) -> Mat3 {
        world_inverse_inertia(self.transform.orientation, self.local_inverse_inertia)
    }

    pub fn shape(&self) -> Option<&ConvexShape> {
        self.shape.as_ref()
    }

    pub fn position(&self) -> Vec3 {
        self.transform.position
    }

    pub fn orientation(&self) -> Quat {
        self.transform.orientation
    }

    /// Replace the collision shape and recompute the inertia tensor.
    pub(crate) fn set_shape(&mut self, shape: Option<ConvexShape>) {
        self.shape = shape;
        self.update_mass_properties();
    }

    /// Override the local inertia tensor.
    pub fn set_local_inertia_tensor(&mut self, tensor: Mat3) {
        self.local_inertia = tensor;
        self.local_inverse_inertia = if self.is_motion_enabled() {
            inverse_or_zero(tensor)
        } else {
            Mat3::ZERO
        };
    }

    /// Apply a force at the center of mass.
    pub fn apply_force(&mut self, force: Vec3) {
        self.force_accumulator += force;
    }

    pub fn apply_torque(&mut self, torque: Vec3) {
        self.torque_accumulator += torque;
    }

    fn update_mass_properties(&mut self) {
        if !self.is_motion_enabled() || self.mass <= 0.0 {
            self.inverse_mass = 0.0;
            self.local_inertia = Mat3::ZERO;
            self.local_inverse_inertia = Mat3::ZERO;
            return;
        }
        self.inverse_mass = 1.0 / self.mass;
        // Without a shape, use the unit sphere approximation: identity * mass.
        let tensor = match &self.shape {
            Some(shape) => shape.compute_local_inertia_tensor(self.mass),
            None => Mat3::from_diagonal(Vec3::splat(self.mass)),
        };
        self.set_local_inertia_tensor(tensor);
    }
}

/// Dense body storage with a permanent id -> slot map.
#[derive(Debug, Default, Clone)]
pub struct BodySet {
    bodies: Vec<RigidBody>,
    index: HashMap<BodyId, usize>,
    next_id: u32,
}

impl BodySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a body. Dynamic bodies need a finite, positive mass.
    pub fn insert(&mut self, desc: RigidBodyDesc) -> Result<BodyId> {
        let valid_mass = desc.mass > 0.0 && desc.mass.is_finite();
        if desc.body_type == RigidBodyType::Dynamic && !valid_mass {
            return Err(PhysicsError::InvalidMass(desc.mass));
        }
        let id = BodyId(self.next_id);
        self.next_id += 1;
        self.index.insert(id, self.bodies.len());
        self.bodies.push(RigidBody::new(id, desc));
        Ok(id)
    }

    /// Remove a body. Insertion order of the remaining bodies is preserved.
    pub fn remove(&mut self, id: BodyId) -> Option<RigidBody> {
        let slot = self.index.remove(&id)?;
        let body = self.bodies.remove(slot);
        for moved in &self.bodies[slot..] {
            if let Some(i) = self.index.get_mut(&moved.id) {
                *i -= 1;
            }
        }
        Some(body)
    }

    pub fn get(&self, id: BodyId) -> Option<&RigidBody> {
        self.index.get(&id).map(|&i| &self.bodies[i])
    }

    pub fn get_mut(&mut self, id: BodyId) -> Option<&mut RigidBody> {
        match self.index.get(&id) {
            Some(&i) => Some(&mut self.bodies[i]),
            None => None,
        }
    }

    pub fn contains(&self, id: BodyId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RigidBody> {
        self.bodies.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut RigidBody> {
        self.bodies.iter_mut()
    }
}

/// Apply gravity force to all dynamic rigid bodies.
pub fn apply_gravity(bodies: &mut BodySet, gravity: Vec3) {
    for rb in bodies.iter_mut() {
        if rb.is_motion_enabled() && rb.mass > 0.0 {
            rb.force_accumulator += gravity * rb.mass * rb.gravity_scale;
        }
    }
}

/// Integrate velocities using semi-implicit Euler: v += (F/m) * dt.
pub fn integrate_velocities(bodies: &mut BodySet, dt: f32) {
    for rb in bodies.iter_mut() {
        if !rb.is_motion_enabled() {
            continue;
        }

        rb.linear_velocity += rb.force_accumulator * rb.inverse_mass * dt;
        rb.angular_velocity += rb.world_inverse_inertia() * rb.torque_accumulator * dt;

        rb.linear_velocity *= (1.0 - rb.linear_damping).max(0.0);
        rb.angular_velocity *= (1.0 - rb.angular_damping).max(0.0);
    }
}

/// Integrate positions: p += v * dt, q += 0.5 * omega * q * dt.
///
/// Kinematic bodies follow their user-set velocities; static bodies never move.
pub fn integrate_positions(bodies: &mut BodySet, dt: f32) {
    for rb in bodies.iter_mut() {
        if rb.body_type == RigidBodyType::Static {
            continue;
        }
        let (position, orientation) = integrate_transform(
            rb.transform.position,
            rb.transform.orientation,
            rb.linear_velocity,
            rb.angular_velocity,
            dt,
        );
        rb.transform.position = position;
        rb.transform.orientation = orientation;
    }
}

/// Advance one pose by its velocities over `dt`.
#[inline]
pub fn integrate_transform(
    position: Vec3,
    orientation: Quat,
    linear_velocity: Vec3,
    angular_velocity: Vec3,
    dt: f32,
) -> (Vec3, Quat) {
    let position = position + linear_velocity * dt;
    let omega = angular_velocity;
    if omega.length_squared() <= 1e-10 {
        return (position, orientation);
    }
    let omega_quat = Quat::from_xyzw(omega.x, omega.y, omega.z, 0.0);
    let q_dot = omega_quat * orientation * 0.5;
    (position, (orientation + q_dot * dt).normalize())
}

/// Clear force and torque accumulators on all rigid bodies.
pub fn clear_forces(bodies: &mut BodySet) {
    for rb in bodies.iter_mut() {
        rb.force_accumulator = Vec3::ZERO;
        rb.torque_accumulator = Vec3::ZERO;
    }
}
