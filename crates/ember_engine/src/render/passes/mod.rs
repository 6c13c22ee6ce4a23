//! Render passes
//!
//! A pass owns one graphics pipeline and knows how to turn its draw queue
//! into commands. Every pass binds the shared descriptor sets (set 0:
//! materials and textures, set 1: the current frame's uniforms), binds its
//! pipeline and then emits one draw per request, passing per-draw data as a
//! push constant block instead of rebinding descriptors.
//!
//! Passes are recorded in the order of [`Passes::record`]: opaque meshes,
//! then helper geometry, then alpha-blended billboards.

pub mod aabb;
pub mod billboard;
pub mod gizmo;
pub mod line;
pub mod pbr;

pub use aabb::AabbPass;
pub use billboard::BillboardPass;
pub use gizmo::GizmoPass;
pub use line::LinePass;
pub use pbr::PbrPass;

use super::draw::DrawQueues;
use super::gpu::MaterialDesc;
use super::gpu_types::GpuMesh;
use super::vulkan::{
    Blend, CommandRecorder, DeviceIdle, GraphicsPipeline, PipelineDesc, Texture, VertexInput,
    VulkanResult,
};
use crate::foundation::pool::Pool;
use ash::vk;
use std::path::{Path, PathBuf};

/// Attachment formats and shared layouts every pipeline is built against
#[derive(Debug, Clone, Copy)]
pub struct PassTargets<'a> {
    /// Swapchain color format
    pub color_format: vk::Format,
    /// Depth buffer format
    pub depth_format: vk::Format,
    /// Global and per-frame set layouts, in set order
    pub set_layouts: &'a [vk::DescriptorSetLayout],
    /// Directory holding compiled `.spv` files
    pub shader_dir: &'a Path,
}

/// What a pass may read while recording
pub struct RecordContext<'a> {
    /// Command buffer of the current frame slot
    pub cmd: &'a CommandRecorder,
    /// Global set then the current frame's set
    pub descriptor_sets: [vk::DescriptorSet; 2],
    /// Live meshes
    pub meshes: &'a Pool<GpuMesh>,
    /// Live textures
    pub textures: &'a Pool<Texture>,
    /// Live materials
    pub materials: &'a Pool<MaterialDesc>,
}

/// Fixed pipeline state of a pass
#[derive(Debug, Clone, Copy)]
pub struct PipelineSpec {
    /// Shader base name; `<name>.vert.spv` and `<name>.frag.spv` are loaded
    pub shader: &'static str,
    /// Whether the pipeline reads [`crate::assets::mesh_data::Vertex`] buffers
    pub mesh_vertices: bool,
    /// Primitive topology
    pub topology: vk::PrimitiveTopology,
    /// Culling
    pub cull_mode: vk::CullModeFlags,
    /// Depth test
    pub depth_test: bool,
    /// Depth write
    pub depth_write: bool,
    /// Blending
    pub blend: Blend,
    /// Push constant block size
    pub push_constant_size: u32,
}

impl PipelineSpec {
    /// Vertex and fragment shader paths under `shader_dir`
    pub fn shader_paths(&self, shader_dir: &Path) -> (PathBuf, PathBuf) {
        (
            shader_dir.join(format!("{}.vert.spv", self.shader)),
            shader_dir.join(format!("{}.frag.spv", self.shader)),
        )
    }

    fn build(&self, device: &ash::Device, targets: &PassTargets<'_>) -> VulkanResult<GraphicsPipeline> {
        let (vertex_shader, fragment_shader) = self.shader_paths(targets.shader_dir);
        GraphicsPipeline::new(
            device,
            &PipelineDesc {
                vertex_shader: &vertex_shader,
                fragment_shader: &fragment_shader,
                vertex_input: if self.mesh_vertices {
                    VertexInput::mesh()
                } else {
                    VertexInput::none()
                },
                topology: self.topology,
                cull_mode: self.cull_mode,
                depth_test: self.depth_test,
                depth_write: self.depth_write,
                blend: self.blend,
                set_layouts: targets.set_layouts,
                push_constant_size: self.push_constant_size,
                color_format: targets.color_format,
                depth_format: targets.depth_format,
            },
        )
    }
}

/// A pass's pipeline slot
///
/// Empty when building failed; the pass then records nothing.
pub struct PassPipeline {
    spec: PipelineSpec,
    pipeline: Option<GraphicsPipeline>,
}

impl PassPipeline {
    /// Build the pipeline for `spec`
    pub fn new(spec: PipelineSpec, device: &ash::Device, targets: &PassTargets<'_>) -> VulkanResult<Self> {
        let pipeline = spec.build(device, targets)?;
        Ok(Self {
            spec,
            pipeline: Some(pipeline),
        })
    }

    /// Slot without a pipeline
    pub fn disabled(spec: PipelineSpec) -> Self {
        Self {
            spec,
            pipeline: None,
        }
    }

    /// Destroy and rebuild; the slot stays empty if the rebuild fails
    pub fn reload(&mut self, idle: &DeviceIdle<'_>, targets: &PassTargets<'_>) -> VulkanResult<()> {
        self.pipeline = None;
        self.pipeline = Some(self.spec.build(idle.device(), targets)?);
        Ok(())
    }

    /// Whether a pipeline is available
    pub fn is_ready(&self) -> bool {
        self.pipeline.is_some()
    }

    /// Static state
    pub fn spec(&self) -> &PipelineSpec {
        &self.spec
    }

    /// Bind the pipeline and the shared sets; returns the layout for push constants
    pub fn bind(&self, ctx: &RecordContext<'_>) -> Option<vk::PipelineLayout> {
        let pipeline = self.pipeline.as_ref()?;
        ctx.cmd.bind_pipeline(pipeline.handle());
        ctx.cmd
            .bind_descriptor_sets(pipeline.layout(), &ctx.descriptor_sets);
        Some(pipeline.layout())
    }
}

/// One stage of the frame
pub trait Pass {
    /// Name used in logs
    fn name(&self) -> &'static str;

    /// Pipeline slot
    fn pipeline(&self) -> &PassPipeline;

    /// Mutable pipeline slot
    fn pipeline_mut(&mut self) -> &mut PassPipeline;

    /// Record this pass's queue; returns the number of draws issued
    fn record(&self, ctx: &RecordContext<'_>, queues: &DrawQueues) -> usize;

    /// Rebuild the pipeline while the device is idle
    fn reload(&mut self, idle: &DeviceIdle<'_>, targets: &PassTargets<'_>) -> VulkanResult<()> {
        self.pipeline_mut().reload(idle, targets)
    }
}

/// Build a pass pipeline, or disable the pass if `optional` and it fails
fn build_or_disable(
    spec: PipelineSpec,
    device: &ash::Device,
    targets: &PassTargets<'_>,
    optional: bool,
) -> VulkanResult<PassPipeline> {
    match PassPipeline::new(spec, device, targets) {
        Ok(pipeline) => Ok(pipeline),
        Err(e) if optional => {
            log::warn!("Pass '{}' disabled: {}", spec.shader, e);
            Ok(PassPipeline::disabled(spec))
        }
        Err(e) => Err(e),
    }
}

/// All passes in recording order
pub struct Passes {
    passes: Vec<Box<dyn Pass>>,
}

impl Passes {
    /// Build every pass; only the PBR pass is required
    pub fn new(device: &ash::Device, targets: &PassTargets<'_>) -> VulkanResult<Self> {
        let passes: Vec<Box<dyn Pass>> = vec![
            Box::new(PbrPass::new(build_or_disable(pbr::SPEC, device, targets, false)?)),
            Box::new(GizmoPass::new(build_or_disable(gizmo::SPEC, device, targets, true)?)),
            Box::new(AabbPass::new(build_or_disable(aabb::SPEC, device, targets, true)?)),
            Box::new(LinePass::new(build_or_disable(line::SPEC, device, targets, true)?)),
            Box::new(BillboardPass::new(build_or_disable(billboard::SPEC, device, targets, true)?)),
        ];
        Ok(Self { passes })
    }

    /// Record every pass; returns the total number of draws
    pub fn record(&self, ctx: &RecordContext<'_>, queues: &DrawQueues) -> usize {
        self.passes
            .iter()
            .map(|pass| {
                let draws = pass.record(ctx, queues);
                log::trace!("Pass '{}': {} draws", pass.name(), draws);
                draws
            })
            .sum()
    }

    /// Rebuild every pipeline; passes that fail stay disabled
    ///
    /// Returns the names of the passes that failed.
    pub fn reload(&mut self, idle: &DeviceIdle<'_>, targets: &PassTargets<'_>) -> Vec<&'static str> {
        let mut failed = Vec::new();
        for pass in &mut self.passes {
            if let Err(e) = pass.reload(idle, targets) {
                log::error!("Reloading pass '{}' failed: {}", pass.name(), e);
                failed.push(pass.name());
            }
        }
        failed
    }

    /// Pass names in recording order
    pub fn names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_blocks_fit_guaranteed_limit() {
        for spec in [pbr::SPEC, gizmo::SPEC, aabb::SPEC, line::SPEC, billboard::SPEC] {
            assert!(spec.push_constant_size <= 128, "{} push block too large", spec.shader);
            assert_eq!(spec.push_constant_size % 4, 0);
        }
    }

    #[test]
    fn test_shader_paths() {
        let (vert, frag) = pbr::SPEC.shader_paths(Path::new("target/shaders"));
        assert_eq!(vert, Path::new("target/shaders/pbr.vert.spv"));
        assert_eq!(frag, Path::new("target/shaders/pbr.frag.spv"));
    }

    #[test]
    fn test_only_billboards_blend() {
        assert_eq!(billboard::SPEC.blend, Blend::Alpha);
        assert_eq!(pbr::SPEC.blend, Blend::Opaque);
        assert!(pbr::SPEC.mesh_vertices);
        assert!(!line::SPEC.mesh_vertices);
    }
}
