//! Physics backend interface
//!
//! Components never talk to a physics library directly. They create shapes,
//! bodies and characters through [`PhysicsBackend`] and read transforms back
//! after each fixed step.

use super::PhysicsResult;
use crate::foundation::aabb::Aabb;
use crate::foundation::math::{Quat, Vec3};
use crate::foundation::pool::Handle;
use serde::{Deserialize, Serialize};

/// Tag type for shape handles
#[derive(Debug)]
pub enum ShapeSlot {}
/// Tag type for body handles
#[derive(Debug)]
pub enum BodySlot {}
/// Tag type for character handles
#[derive(Debug)]
pub enum CharacterSlot {}

/// Collision shape handle
pub type ShapeId = Handle<ShapeSlot>;
/// Rigid body handle
pub type BodyId = Handle<BodySlot>;
/// Character controller handle
pub type CharacterId = Handle<CharacterSlot>;

/// Broad collision class of a body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectLayer {
    /// Never moves
    Static,
    /// Moved by the simulation
    Dynamic,
}

/// Whether bodies on layers `a` and `b` can collide
///
/// Static pairs never collide; every pair involving a dynamic body does.
pub const fn layers_collide(a: ObjectLayer, b: ObjectLayer) -> bool {
    !matches!((a, b), (ObjectLayer::Static, ObjectLayer::Static))
}

/// How a body moves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotionType {
    /// Fixed in place
    Static,
    /// Integrated by the simulation
    Dynamic,
}

impl MotionType {
    /// Layer a body with this motion goes on
    pub const fn default_layer(self) -> ObjectLayer {
        match self {
            Self::Static => ObjectLayer::Static,
            Self::Dynamic => ObjectLayer::Dynamic,
        }
    }
}

/// Collision shape geometry
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeDesc {
    /// Box with the given half extents
    Box {
        /// Half size along each axis
        half_extents: Vec3,
    },
    /// Sphere
    Sphere {
        /// Radius
        radius: f32,
    },
    /// Y-aligned capsule
    Capsule {
        /// Half length of the cylinder part
        half_height: f32,
        /// Radius
        radius: f32,
    },
    /// Triangle mesh, static bodies only
    Mesh {
        /// Vertex positions
        vertices: Vec<Vec3>,
        /// Triangle indices, three per face
        indices: Vec<u32>,
    },
}

impl ShapeDesc {
    /// Local-space bounds of the shape
    pub fn bounds(&self) -> Aabb {
        match self {
            Self::Box { half_extents } => Aabb::new(Vec3::zeros(), *half_extents),
            Self::Sphere { radius } => Aabb::new(Vec3::zeros(), Vec3::repeat(*radius)),
            Self::Capsule {
                half_height,
                radius,
            } => Aabb::new(Vec3::zeros(), Vec3::new(*radius, half_height + radius, *radius)),
            Self::Mesh { vertices, .. } => Aabb::from_points(vertices),
        }
    }

    /// Whether the shape may be used on a dynamic body
    pub fn supports_dynamic(&self) -> bool {
        !matches!(self, Self::Mesh { .. })
    }
}

/// Parameters of a new rigid body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyDesc {
    /// Collision shape
    pub shape: ShapeId,
    /// Static or dynamic
    pub motion: MotionType,
    /// Collision layer
    pub layer: ObjectLayer,
    /// World position
    pub position: Vec3,
    /// World rotation
    pub rotation: Quat,
    /// Coulomb friction, 0..1
    pub friction: f32,
    /// Start simulating immediately
    pub activate: bool,
}

impl BodyDesc {
    /// Body of `motion` on its default layer, identity rotation, friction 0.5
    pub fn new(shape: ShapeId, motion: MotionType, position: Vec3) -> Self {
        Self {
            shape,
            motion,
            layer: motion.default_layer(),
            position,
            rotation: Quat::identity(),
            friction: 0.5,
            activate: motion == MotionType::Dynamic,
        }
    }
}

/// Parameters of a new character controller
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CharacterDesc {
    /// Feet position
    pub position: Vec3,
    /// Total height
    pub height: f32,
    /// Capsule radius
    pub radius: f32,
    /// Highest ledge the character steps onto without jumping
    pub max_step: f32,
}

impl Default for CharacterDesc {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            height: 1.8,
            radius: 0.3,
            max_step: 0.3,
        }
    }
}

/// Body/shape/character creation and simulation stepping
pub trait PhysicsBackend {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    /// Set world gravity
    fn set_gravity(&mut self, gravity: Vec3);

    /// Register a collision shape
    fn create_shape(&mut self, shape: ShapeDesc) -> PhysicsResult<ShapeId>;

    /// Register a triangle mesh shape
    fn create_mesh_shape(&mut self, vertices: Vec<Vec3>, indices: Vec<u32>) -> PhysicsResult<ShapeId> {
        self.create_shape(ShapeDesc::Mesh { vertices, indices })
    }

    /// Release a shape no body uses any more
    fn remove_shape(&mut self, shape: ShapeId) -> PhysicsResult<()>;

    /// Create a body and add it to the world
    fn create_body(&mut self, desc: &BodyDesc) -> PhysicsResult<BodyId>;

    /// Remove a body from the world
    fn remove_body(&mut self, body: BodyId) -> PhysicsResult<()>;

    /// World position and rotation of a body
    fn body_transform(&self, body: BodyId) -> PhysicsResult<(Vec3, Quat)>;

    /// Teleport a body
    fn set_body_transform(&mut self, body: BodyId, position: Vec3, rotation: Quat) -> PhysicsResult<()>;

    /// Linear velocity of a body
    fn linear_velocity(&self, body: BodyId) -> PhysicsResult<Vec3>;

    /// Set the linear velocity of a dynamic body, waking it up
    fn set_linear_velocity(&mut self, body: BodyId, velocity: Vec3) -> PhysicsResult<()>;

    /// Create a character controller
    fn create_character(&mut self, desc: &CharacterDesc) -> PhysicsResult<CharacterId>;

    /// Remove a character controller
    fn remove_character(&mut self, character: CharacterId) -> PhysicsResult<()>;

    /// Feet position of a character
    fn character_position(&self, character: CharacterId) -> PhysicsResult<Vec3>;

    /// Desired horizontal velocity; vertical motion is owned by the simulation
    fn set_character_velocity(&mut self, character: CharacterId, velocity: Vec3) -> PhysicsResult<()>;

    /// Launch a grounded character upwards; ignored while airborne
    fn character_jump(&mut self, character: CharacterId, speed: f32) -> PhysicsResult<()>;

    /// Whether the character stood on something after the last step
    fn character_on_ground(&self, character: CharacterId) -> PhysicsResult<bool>;

    /// Advance the simulation by one fixed step
    fn update(&mut self, timestep: f32);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_table() {
        use ObjectLayer::{Dynamic, Static};
        assert!(!layers_collide(Static, Static));
        assert!(layers_collide(Static, Dynamic));
        assert!(layers_collide(Dynamic, Static));
        assert!(layers_collide(Dynamic, Dynamic));
    }

    #[test]
    fn test_capsule_bounds() {
        let bounds = ShapeDesc::Capsule {
            half_height: 0.5,
            radius: 0.25,
        }
        .bounds();
        assert_eq!(bounds.extent, Vec3::new(0.25, 0.75, 0.25));
    }
}
