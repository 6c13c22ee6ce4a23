//! Node components
//!
//! A [`Component`] is a behavior attached to a scene node. Each one declares
//! which hooks it implements through [`Capabilities`] and the scene only
//! calls those. Components are created from scene data by name through the
//! [`ComponentRegistry`].

pub mod billboard;
pub mod bodies;
pub mod camera;
pub mod character;
pub mod gizmo;
pub mod light;
pub mod mesh;
pub mod registry;
pub mod spin;

pub use billboard::Billboard;
pub use bodies::{RigidBody, StaticBody};
pub use camera::Camera;
pub use character::Character;
pub use gizmo::{AabbGizmo, Gizmo};
pub use light::PointLight;
pub use mesh::{Mesh, Model};
pub use registry::{ComponentFactory, ComponentRegistry};
pub use spin::Spin;

use crate::assets::{DataError, DataNode, ResourceError, Resources};
use crate::foundation::math::Transform;
use crate::input::Input;
use crate::physics::{PhysicsContext, PhysicsError};
use crate::render::{DrawQueues, GpuContext};
use crate::scene::{NodeId, Scene, SceneError};
use bitflags::bitflags;
use std::any::Any;
use std::fmt;
use thiserror::Error;

bitflags! {
    /// Hooks a component implements
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Capabilities: u8 {
        /// Called once after the component is attached and the scene is built
        const INITIALIZE = 1 << 0;
        /// Called every tick
        const UPDATE = 1 << 1;
        /// Called during the draw traversal while the node is visible
        const DRAW = 1 << 2;
        /// Called before the component is destroyed
        const SHUTDOWN = 1 << 3;
    }
}

/// Component errors
#[derive(Error, Debug)]
pub enum ComponentError {
    /// No factory registered under that name
    #[error("Unknown component type '{0}'")]
    UnknownType(String),

    /// A factory with that name already exists
    #[error("Component type '{0}' already registered")]
    DuplicateType(String),

    /// Component data had a bad field
    #[error("Component data: {0}")]
    Data(#[from] DataError),

    /// Initialization failed
    #[error("Failed to initialize {component}: {reason}")]
    Init {
        /// Component type name
        component: &'static str,
        /// What went wrong
        reason: String,
    },

    /// A resource the component needs did not load
    #[error("Resource: {0}")]
    Resource(#[from] ResourceError),

    /// Physics backend refused the request
    #[error("Physics: {0}")]
    Physics(#[from] PhysicsError),

    /// Scene edit made by the component failed
    #[error("Scene: {0}")]
    Scene(#[from] SceneError),
}

/// Result type for component operations
pub type ComponentResult<T> = Result<T, ComponentError>;

/// Engine services handed to the scene for one pass over its components
pub struct Services<'a> {
    /// Resource caches
    pub resources: &'a mut Resources,
    /// GPU upload seam
    pub gpu: &'a mut GpuContext,
    /// Physics backend
    pub physics: &'a mut PhysicsContext,
    /// Input state and actions
    pub input: &'a Input,
    /// Seconds since the last tick
    pub delta: f32,
}

/// What a component sees in `initialize`, `update` and `shutdown`
///
/// The component being called is detached from its node for the duration of
/// the call, so it may freely mutate the scene, including its own node.
pub struct ComponentContext<'a> {
    /// Node the component is attached to
    pub node: NodeId,
    /// The scene
    pub scene: &'a mut Scene,
    /// Resource caches
    pub resources: &'a mut Resources,
    /// GPU upload seam
    pub gpu: &'a mut GpuContext,
    /// Physics backend
    pub physics: &'a mut PhysicsContext,
    /// Input state and actions
    pub input: &'a Input,
    /// Seconds since the last tick
    pub delta: f32,
}

impl ComponentContext<'_> {
    /// Global transform of the owning node as of the last refresh
    pub fn global_transform(&self) -> Transform {
        self.scene.global_transform(self.node).unwrap_or_default()
    }

    /// Local transform of the owning node
    pub fn local_transform(&self) -> Transform {
        self.scene.local_transform(self.node).unwrap_or_default()
    }

    /// Replace the owning node's local transform
    pub fn set_local_transform(&mut self, transform: Transform) {
        if let Err(e) = self.scene.set_local_transform(self.node, transform) {
            log::warn!("set_local_transform on {:?}: {}", self.node, e);
        }
    }

    /// Place the owning node at a world transform, given its parent's last global
    pub fn set_global_transform(&mut self, transform: Transform) {
        let parent = self
            .scene
            .parent(self.node)
            .and_then(|p| self.scene.global_transform(p))
            .unwrap_or_default();
        self.set_local_transform(parent.inverse() * transform);
    }

    /// Remove a node and its subtree, shutting their components down.
    /// Removing the owning node also shuts down its other components.
    pub fn remove_node(&mut self, id: NodeId) -> Result<(), SceneError> {
        let mut services = Services {
            resources: &mut *self.resources,
            gpu: &mut *self.gpu,
            physics: &mut *self.physics,
            input: self.input,
            delta: self.delta,
        };
        self.scene.remove_node(id, &mut services)
    }
}

/// What a component sees in `draw`
pub struct DrawContext<'a> {
    /// Node the component is attached to
    pub node: NodeId,
    /// Global transform of that node
    pub global: Transform,
    /// The scene, read only
    pub scene: &'a Scene,
    /// Resource caches, read only
    pub resources: &'a Resources,
    /// Queues to push draw requests into
    pub queues: &'a mut DrawQueues,
    /// Swapchain width over height
    pub aspect_ratio: f32,
}

impl DrawContext<'_> {
    /// Picking id of the owning node
    pub fn node_id(&self) -> u32 {
        self.node.to_bits()
    }
}

/// Downcasting support for components
pub trait AsAny: Any {
    /// `&self` as `&dyn Any`
    fn as_any(&self) -> &dyn Any;
    /// `&mut self` as `&mut dyn Any`
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Behavior attached to a scene node
pub trait Component: AsAny + fmt::Debug {
    /// Registered type name
    fn type_name(&self) -> &'static str;

    /// Hooks the scene should call
    fn capabilities(&self) -> Capabilities;

    /// Acquire resources, physics bodies and the like
    ///
    /// An error detaches the component from its node; the rest of the scene
    /// carries on.
    fn initialize(&mut self, _ctx: &mut ComponentContext<'_>) -> ComponentResult<()> {
        Ok(())
    }

    /// Per-tick logic
    fn update(&mut self, _ctx: &mut ComponentContext<'_>) {}

    /// Push draw requests
    fn draw(&self, _ctx: &mut DrawContext<'_>) {}

    /// Release what `initialize` acquired
    fn shutdown(&mut self, _ctx: &mut ComponentContext<'_>) {}
}

impl dyn Component {
    /// Downcast to a concrete component type
    pub fn downcast_ref<T: Component>(&self) -> Option<&T> {
        self.as_any().downcast_ref()
    }

    /// Mutable downcast to a concrete component type
    pub fn downcast_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut()
    }
}

/// Parse a `[f32; 4]` color field that may also be given as RGB
pub(crate) fn color_field(
    data: &DataNode,
    key: &str,
    default: [f32; 4],
) -> Result<[f32; 4], DataError> {
    if let Ok(Some(rgb)) = data.field_opt::<[f32; 3]>(key) {
        return Ok([rgb[0], rgb[1], rgb[2], 1.0]);
    }
    data.field_or(key, default)
}
