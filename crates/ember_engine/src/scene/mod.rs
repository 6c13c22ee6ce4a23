//! Scene graph and scene file loading
//!
//! The [`Scene`] is an arena of nodes with components attached. Scene files
//! are generic data trees ([`crate::assets::DataNode`]) turned into nodes by
//! the [`SceneLoader`].

mod graph;
mod loader;

pub use graph::{ComponentSlot, Node, NodeId, Scene};
pub use loader::{transform_from_data, SceneLoader, MAX_INCLUDE_DEPTH};

use crate::assets::{DataError, ResourceError};
use crate::foundation::pool::PoolError;
use thiserror::Error;

/// Scene errors
#[derive(Error, Debug)]
pub enum SceneError {
    /// Node id does not refer to a live node
    #[error("Unknown node {0:#x}")]
    UnknownNode(u32),

    /// Reparenting would make a node its own ancestor
    #[error("Reparenting would create a cycle")]
    Cycle,

    /// The root cannot be removed or moved
    #[error("Cannot {0} the root node")]
    RootOperation(&'static str),

    /// Node storage is full
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// Scene data is malformed
    #[error("Scene data: {0}")]
    Data(#[from] DataError),

    /// Scene file could not be loaded
    #[error("Scene file: {0}")]
    Resource(#[from] ResourceError),

    /// Includes nested too deeply, most likely a file including itself
    #[error("Include of '{path}' exceeds depth {limit}")]
    IncludeDepth {
        /// File that would have been included
        path: String,
        /// Depth limit
        limit: usize,
    },
}

/// Result type for scene operations
pub type SceneResult<T> = Result<T, SceneError>;
