//! Lit, textured meshes

use super::{Pass, PassPipeline, PipelineSpec, RecordContext};
use crate::render::draw::{DrawQueues, MeshDraw};
use crate::render::vulkan::shader::PUSH_STAGES;
use crate::render::vulkan::Blend;
use ash::vk;

/// Per-draw push block
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PbrPush {
    /// Model matrix
    pub model: [[f32; 4]; 4],
    /// Slot in the material buffer
    pub material: u32,
    /// Owning node
    pub node_id: u32,
    _pad: [u32; 2],
}

// SAFETY: repr(C), f32/u32 only, padded to 80 bytes.
unsafe impl bytemuck::Pod for PbrPush {}
// SAFETY: all-zero is a valid value.
unsafe impl bytemuck::Zeroable for PbrPush {}

impl PbrPush {
    /// Push block for `draw` using material slot `material`
    pub fn new(draw: &MeshDraw, material: u32) -> Self {
        Self {
            model: draw.transform.into(),
            material,
            node_id: draw.node_id,
            _pad: [0; 2],
        }
    }
}

/// Pipeline state
pub const SPEC: PipelineSpec = PipelineSpec {
    shader: "pbr",
    mesh_vertices: true,
    topology: vk::PrimitiveTopology::TRIANGLE_LIST,
    cull_mode: vk::CullModeFlags::BACK,
    depth_test: true,
    depth_write: true,
    blend: Blend::Opaque,
    push_constant_size: std::mem::size_of::<PbrPush>() as u32,
};

/// Material slot used when a draw names a dead material
pub const FALLBACK_MATERIAL: u32 = 0;

/// Physically based mesh pass
pub struct PbrPass {
    pipeline: PassPipeline,
}

impl PbrPass {
    /// Wrap a built pipeline
    pub fn new(pipeline: PassPipeline) -> Self {
        Self { pipeline }
    }
}

impl Pass for PbrPass {
    fn name(&self) -> &'static str {
        "pbr"
    }

    fn pipeline(&self) -> &PassPipeline {
        &self.pipeline
    }

    fn pipeline_mut(&mut self) -> &mut PassPipeline {
        &mut self.pipeline
    }

    fn record(&self, ctx: &RecordContext<'_>, queues: &DrawQueues) -> usize {
        if queues.meshes.is_empty() {
            return 0;
        }
        let Some(layout) = self.pipeline.bind(ctx) else {
            return 0;
        };

        let mut draws = 0;
        for draw in &queues.meshes {
            let Some(mesh) = ctx.meshes.get(draw.mesh.cast()) else {
                log::warn!("Node {}: mesh {:?} no longer exists", draw.node_id, draw.mesh);
                continue;
            };
            let material = if ctx.materials.contains(draw.material.cast()) {
                u32::from(draw.material.index())
            } else {
                FALLBACK_MATERIAL
            };

            ctx.cmd.bind_vertex_buffer(mesh.vertices.handle());
            ctx.cmd.bind_index_buffer(mesh.indices.handle());
            ctx.cmd
                .push_constants(layout, PUSH_STAGES, &PbrPush::new(draw, material));
            ctx.cmd.draw_indexed(mesh.index_count);
            draws += 1;
        }
        draws
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Mat4, Vec3};
    use crate::foundation::pool::Handle;

    #[test]
    fn test_push_layout() {
        assert_eq!(std::mem::size_of::<PbrPush>(), 80);

        let draw = MeshDraw {
            mesh: Handle::from_raw(0, 0),
            material: Handle::from_raw(3, 1),
            transform: Mat4::new_translation(&Vec3::new(1.0, 2.0, 3.0)),
            node_id: 42,
        };
        let push = PbrPush::new(&draw, 3);
        // column-major: translation lives in the last column
        assert_eq!(push.model[3], [1.0, 2.0, 3.0, 1.0]);
        assert_eq!(push.material, 3);
        assert_eq!(push.node_id, 42);
    }
}
