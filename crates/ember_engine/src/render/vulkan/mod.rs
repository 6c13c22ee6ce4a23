//! Vulkan backend
//!
//! RAII wrappers over the ash API. Every `unsafe` call in the engine lives
//! under this module; the passes and the renderer only see safe wrappers.

pub mod buffer;
pub mod commands;
pub mod context;
pub mod descriptors;
pub mod error;
pub mod idle;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod texture;

pub use buffer::Buffer;
pub use commands::{CommandPool, CommandRecorder};
pub use context::{QueueFamilies, VulkanContext};
pub use descriptors::{DescriptorPool, DescriptorSetLayout, DescriptorSetLayoutBuilder};
pub use error::{VulkanError, VulkanResult};
pub use idle::DeviceIdle;
pub use shader::{Blend, GraphicsPipeline, PipelineDesc, ShaderModule, VertexInput};
pub use swapchain::Swapchain;
pub use sync::{Fence, FrameSync, Semaphore};
pub use texture::{Image, Sampler, Texture};
