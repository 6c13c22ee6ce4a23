//! Application trait and lifecycle management

use crate::engine::{EngineContext, EngineError};
use thiserror::Error;

/// Application lifecycle trait
///
/// Implement this trait to create your game or application using the engine.
pub trait Application {
    /// Initialize the application
    ///
    /// Called once after the engine is initialized. Load scenes and input
    /// actions here.
    fn initialize(&mut self, ctx: &mut EngineContext) -> Result<(), AppError>;

    /// Update the application
    ///
    /// Called every frame after input is ticked and before the scene
    /// updates.
    ///
    /// # Arguments
    /// * `ctx` - The engine context
    /// * `delta_time` - Time since last frame in seconds
    fn update(&mut self, ctx: &mut EngineContext, delta_time: f32) -> Result<(), AppError>;

    /// Cleanup the application
    ///
    /// Called once the GPU is idle, before the scene and renderer are torn down.
    fn cleanup(&mut self, _ctx: &mut EngineContext) {}
}

/// Application-level errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Engine error propagated to application level
    #[error("Engine error: {0}")]
    Engine(Box<EngineError>),

    /// Custom application error
    #[error("Application error: {0}")]
    Custom(String),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),
}
