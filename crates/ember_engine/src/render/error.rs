//! Renderer error types

use super::vulkan::VulkanError;
use crate::foundation::pool::PoolError;
use thiserror::Error;

/// Errors surfaced by the renderer and the GPU upload path
#[derive(Error, Debug)]
pub enum RenderError {
    /// Low-level Vulkan failure
    #[error(transparent)]
    Vulkan(#[from] VulkanError),

    /// GPU resource pool failure
    #[error("Resource pool error: {0}")]
    Pool(#[from] PoolError),

    /// Swapchain no longer matches the surface; recreate and retry
    #[error("Swapchain out of date")]
    SwapchainOutOfDate,

    /// No swapchain image became available in time
    #[error("Timed out acquiring a swapchain image")]
    AcquireTimeout,

    /// Operation not allowed in the current renderer state
    #[error("Invalid renderer state: {reason}")]
    InvalidState {
        /// What was attempted and why it is not allowed
        reason: String,
    },

    /// Shader file could not be read
    #[error("Failed to load shader {name}: {reason}")]
    Shader {
        /// Shader file name
        name: String,
        /// Underlying failure
        reason: String,
    },

    /// Handle does not name a live GPU resource
    #[error("Unknown GPU resource: {0}")]
    UnknownResource(String),
}

/// Result type for renderer operations
pub type RenderResult<T> = Result<T, RenderError>;
