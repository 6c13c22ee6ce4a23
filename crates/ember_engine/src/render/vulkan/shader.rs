//! SPIR-V shader modules and graphics pipeline construction

use super::error::{VulkanError, VulkanResult};
use crate::assets::mesh_data::Vertex;
use ash::{vk, Device};
use std::ffi::CStr;
use std::io::Cursor;
use std::path::Path;

const ENTRY_POINT: &CStr = unsafe { CStr::from_bytes_with_nul_unchecked(b"main\0") };

/// Compiled shader stage
pub struct ShaderModule {
    device: Device,
    module: vk::ShaderModule,
}

impl ShaderModule {
    /// Create a module from SPIR-V bytes
    pub fn from_bytes(device: Device, bytes: &[u8]) -> VulkanResult<Self> {
        let code = ash::util::read_spv(&mut Cursor::new(bytes))
            .map_err(|e| VulkanError::InitializationFailed(format!("Invalid SPIR-V: {e}")))?;
        let create_info = vk::ShaderModuleCreateInfo::builder().code(&code);
        let module = unsafe { device.create_shader_module(&create_info, None) }?;
        Ok(Self { device, module })
    }

    /// Read and create a module from a `.spv` file
    pub fn from_file(device: Device, path: impl AsRef<Path>) -> VulkanResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            VulkanError::InitializationFailed(format!("Failed to read shader {}: {e}", path.display()))
        })?;
        Self::from_bytes(device, &bytes)
    }

    /// Raw handle
    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }

    fn stage_info(&self, stage: vk::ShaderStageFlags) -> vk::PipelineShaderStageCreateInfo {
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(stage)
            .module(self.module)
            .name(ENTRY_POINT)
            .build()
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe { self.device.destroy_shader_module(self.module, None) };
    }
}

/// Vertex buffer layout a pipeline consumes
#[derive(Debug, Clone, Default)]
pub struct VertexInput {
    bindings: Vec<vk::VertexInputBindingDescription>,
    attributes: Vec<vk::VertexInputAttributeDescription>,
}

impl VertexInput {
    /// No vertex buffers; geometry comes from `gl_VertexIndex` and push constants
    pub fn none() -> Self {
        Self::default()
    }

    /// Interleaved [`Vertex`] at binding 0
    pub fn mesh() -> Self {
        let attribute = |location, format, offset| vk::VertexInputAttributeDescription {
            location,
            binding: 0,
            format,
            offset,
        };
        Self {
            bindings: vec![vk::VertexInputBindingDescription {
                binding: 0,
                stride: std::mem::size_of::<Vertex>() as u32,
                input_rate: vk::VertexInputRate::VERTEX,
            }],
            attributes: vec![
                attribute(0, vk::Format::R32G32B32_SFLOAT, 0),
                attribute(1, vk::Format::R32G32_SFLOAT, 12),
                attribute(2, vk::Format::R32G32B32_SFLOAT, 20),
                attribute(3, vk::Format::R32G32B32A32_SFLOAT, 32),
            ],
        }
    }

    /// Attribute descriptions
    pub fn attributes(&self) -> &[vk::VertexInputAttributeDescription] {
        &self.attributes
    }
}

/// Color blending mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Blend {
    /// Overwrite
    Opaque,
    /// Standard alpha blending
    Alpha,
}

/// Everything needed to build one graphics pipeline
#[derive(Debug, Clone)]
pub struct PipelineDesc<'a> {
    /// Vertex shader file
    pub vertex_shader: &'a Path,
    /// Fragment shader file
    pub fragment_shader: &'a Path,
    /// Vertex buffer layout
    pub vertex_input: VertexInput,
    /// Primitive topology
    pub topology: vk::PrimitiveTopology,
    /// Face culling
    pub cull_mode: vk::CullModeFlags,
    /// Depth test on
    pub depth_test: bool,
    /// Depth writes on
    pub depth_write: bool,
    /// Blending
    pub blend: Blend,
    /// Descriptor set layouts, in set order
    pub set_layouts: &'a [vk::DescriptorSetLayout],
    /// Push constant block size in bytes
    pub push_constant_size: u32,
    /// Color attachment format
    pub color_format: vk::Format,
    /// Depth attachment format
    pub depth_format: vk::Format,
}

/// Pipeline plus its layout
pub struct GraphicsPipeline {
    device: Device,
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
}

/// Stages that see the push constant block
pub const PUSH_STAGES: vk::ShaderStageFlags = vk::ShaderStageFlags::from_raw(
    vk::ShaderStageFlags::VERTEX.as_raw() | vk::ShaderStageFlags::FRAGMENT.as_raw(),
);

impl GraphicsPipeline {
    /// Build a pipeline for dynamic rendering with viewport and scissor left dynamic
    pub fn new(device: &Device, desc: &PipelineDesc<'_>) -> VulkanResult<Self> {
        let vertex = ShaderModule::from_file(device.clone(), desc.vertex_shader)?;
        let fragment = ShaderModule::from_file(device.clone(), desc.fragment_shader)?;
        let stages = [
            vertex.stage_info(vk::ShaderStageFlags::VERTEX),
            fragment.stage_info(vk::ShaderStageFlags::FRAGMENT),
        ];

        let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&desc.vertex_input.bindings)
            .vertex_attribute_descriptions(&desc.vertex_input.attributes);
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(desc.topology)
            .primitive_restart_enable(false);
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1);
        let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(desc.cull_mode)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE);
        let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);
        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder()
            .depth_test_enable(desc.depth_test)
            .depth_write_enable(desc.depth_write)
            .depth_compare_op(vk::CompareOp::LESS_OR_EQUAL);

        let blend_attachment = match desc.blend {
            Blend::Opaque => vk::PipelineColorBlendAttachmentState::builder()
                .color_write_mask(vk::ColorComponentFlags::RGBA)
                .blend_enable(false)
                .build(),
            Blend::Alpha => vk::PipelineColorBlendAttachmentState::builder()
                .color_write_mask(vk::ColorComponentFlags::RGBA)
                .blend_enable(true)
                .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
                .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
                .color_blend_op(vk::BlendOp::ADD)
                .src_alpha_blend_factor(vk::BlendFactor::ONE)
                .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
                .alpha_blend_op(vk::BlendOp::ADD)
                .build(),
        };
        let blend_attachments = [blend_attachment];
        let color_blending =
            vk::PipelineColorBlendStateCreateInfo::builder().attachments(&blend_attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

        let push_ranges = [vk::PushConstantRange {
            stage_flags: PUSH_STAGES,
            offset: 0,
            size: desc.push_constant_size,
        }];
        let layout_info = vk::PipelineLayoutCreateInfo::builder()
            .set_layouts(desc.set_layouts)
            .push_constant_ranges(if desc.push_constant_size > 0 {
                &push_ranges[..]
            } else {
                &[]
            });
        let layout = unsafe { device.create_pipeline_layout(&layout_info, None) }?;

        let color_formats = [desc.color_format];
        let mut rendering_info = vk::PipelineRenderingCreateInfo::builder()
            .color_attachment_formats(&color_formats)
            .depth_attachment_format(desc.depth_format);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blending)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .push_next(&mut rendering_info)
            .build();

        let pipelines = unsafe {
            device.create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
        };
        match pipelines {
            Ok(pipelines) => Ok(Self {
                device: device.clone(),
                pipeline: pipelines[0],
                layout,
            }),
            Err((_, err)) => {
                unsafe { device.destroy_pipeline_layout(layout, None) };
                Err(VulkanError::Api(err))
            }
        }
    }

    /// Pipeline handle
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    /// Layout handle
    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for GraphicsPipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
            self.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mesh_input_matches_vertex_layout() {
        let input = VertexInput::mesh();
        let offsets: Vec<u32> = input.attributes().iter().map(|a| a.offset).collect();
        assert_eq!(
            offsets,
            vec![
                std::mem::offset_of!(Vertex, position) as u32,
                std::mem::offset_of!(Vertex, uv) as u32,
                std::mem::offset_of!(Vertex, normal) as u32,
                std::mem::offset_of!(Vertex, tangent) as u32,
            ]
        );
        assert_eq!(input.bindings[0].stride, 48);
    }

    #[test]
    fn test_push_stages() {
        assert!(PUSH_STAGES.contains(vk::ShaderStageFlags::VERTEX));
        assert!(PUSH_STAGES.contains(vk::ShaderStageFlags::FRAGMENT));
    }
}
