//! # Ember Engine
//!
//! A small 3D engine: a scene graph of nodes carrying data-driven
//! components, reference-counted resources in generational pools, and a
//! Vulkan 1.3 renderer fed by per-pass draw queues.
//!
//! ## Features
//!
//! - **Pools and handles**: generational handles catch use after free
//! - **Resource caches**: meshes, textures, materials and scene files by id
//! - **Scene graph**: arena nodes, explicit transform refresh, RON scene files
//! - **Components**: cameras, meshes, lights, bodies and characters by name
//! - **Vulkan rendering**: frames in flight, dynamic rendering, push constants
//! - **Physics and input**: a backend trait with a built-in solver, named actions
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ember_engine::prelude::*;
//!
//! struct MyApp;
//!
//! impl Application for MyApp {
//!     fn initialize(&mut self, ctx: &mut EngineContext) -> Result<(), AppError> {
//!         ctx.load_scene("scenes/demo.ron")?;
//!         Ok(())
//!     }
//!
//!     fn update(&mut self, ctx: &mut EngineContext, delta_time: f32) -> Result<(), AppError> {
//!         Ok(())
//!     }
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EngineConfig::default();
//!     let mut app = MyApp;
//!     Engine::run(config, &mut app)?;
//!     Ok(())
//! }
//! ```

pub mod assets;
pub mod components;
pub mod config;
pub mod foundation;
pub mod input;
pub mod physics;
pub mod render;
pub mod scene;
pub mod window;
pub mod world;

mod application;
mod engine;

pub use application::{AppError, Application};
pub use config::EngineConfig;
pub use engine::{Engine, EngineContext, EngineError};
pub use world::World;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        assets::{DataNode, Resources},
        components::{Component, ComponentContext, ComponentRegistry, DrawContext},
        config::Config,
        foundation::{
            aabb::Aabb,
            math::{Mat4, Quat, Transform, Vec3},
            pool::{Handle, Pool},
            string_id::StringId,
        },
        input::{KeyCode, MouseButton},
        render::{DrawQueues, GpuUpload, HeadlessGpu},
        scene::{NodeId, Scene},
        AppError, Application, Engine, EngineConfig, EngineContext, EngineError, World,
    };
}
