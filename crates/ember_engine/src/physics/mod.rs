//! Physics binding layer
//!
//! [`PhysicsBackend`] is the seam between components and whatever simulates
//! the world. [`BasicBackend`] is the built-in implementation and
//! [`FixedStepper`] drives any backend at a fixed rate.

pub mod backend;
pub mod basic;
pub mod stepper;

pub use backend::{
    layers_collide, BodyDesc, BodyId, CharacterDesc, CharacterId, MotionType, ObjectLayer,
    PhysicsBackend, ShapeDesc, ShapeId,
};
pub use basic::BasicBackend;
pub use stepper::FixedStepper;

use crate::foundation::pool::PoolError;
use thiserror::Error;

/// Physics errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PhysicsError {
    /// Shape handle does not refer to a live shape
    #[error("Unknown shape {0:#x}")]
    UnknownShape(u32),

    /// Body handle does not refer to a live body
    #[error("Unknown body {0:#x}")]
    UnknownBody(u32),

    /// Character handle does not refer to a live character
    #[error("Unknown character {0:#x}")]
    UnknownCharacter(u32),

    /// Shape geometry is unusable
    #[error("Invalid shape: {0}")]
    InvalidShape(String),

    /// Shape still referenced by bodies
    #[error("Shape {0:#x} still used by {1} bodies")]
    ShapeInUse(u32, u32),

    /// Operation needs a dynamic body
    #[error("Body {0:#x} is static")]
    StaticBody(u32),

    /// Backend storage is full
    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// Result type for physics operations
pub type PhysicsResult<T> = Result<T, PhysicsError>;

/// The backend as components see it
pub type PhysicsContext = dyn PhysicsBackend;
