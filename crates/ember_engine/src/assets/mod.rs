//! Asset management system
//!
//! Data loaders produce CPU-side data ([`MeshData`], [`TextureData`],
//! [`DataNode`]); the resource caches in [`resources`] turn ids into
//! reference-counted, GPU-resident resources.

pub mod data;
pub mod mesh_data;
pub mod resource_manager;
pub mod resources;
pub mod texture_data;

pub use data::{DataError, DataNode, FromData};
pub use mesh_data::{MeshData, MeshDataError, Vertex};
pub use resource_manager::{LoadStatus, Resource, ResourceError, ResourceManager, Usage};
pub use resources::{
    MaterialResource, MeshResource, MeshSource, Resources, SceneResource, TextureResource,
    TextureSource,
};
pub use texture_data::{TextureData, TextureDataError};
