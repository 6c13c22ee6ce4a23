//! # Rendering
//!
//! Vulkan 1.3 renderer built on dynamic rendering.
//!
//! - [`draw`]: per-frame draw queues filled by components
//! - [`gpu`]: the upload seam resource loaders talk to, plus a headless implementation
//! - [`frame`]: frame-in-flight state machine
//! - [`layout`]: the legal image layout transitions and their barriers
//! - [`passes`]: pbr, gizmo, aabb, line and billboard passes
//! - [`renderer`]: device, swapchain and frame submission
//! - [`vulkan`]: thin RAII wrappers over `ash`

pub mod draw;
pub mod error;
pub mod frame;
pub mod gpu;
pub mod gpu_types;
pub mod layout;
pub mod passes;
pub mod renderer;
pub mod vulkan;

pub use draw::{
    AabbDraw, BillboardDraw, CameraData, DrawQueue, DrawQueues, GizmoDraw, GizmoShape, LineDraw,
    MeshDraw, PointLightData,
};
pub use error::{RenderError, RenderResult};
pub use frame::{FrameRing, FrameState};
pub use gpu::{
    GpuContext, GpuUpload, HeadlessGpu, MaterialDesc, MaterialHandle, MeshHandle, TextureHandle,
};
pub use renderer::{FrameOutcome, Renderer};
