//! Procedural helper shapes (axes, crosses, circles)

use super::{Pass, PassPipeline, PipelineSpec, RecordContext};
use crate::render::draw::{DrawQueues, GizmoDraw};
use crate::render::vulkan::shader::PUSH_STAGES;
use crate::render::vulkan::Blend;
use ash::vk;

/// Per-draw push block
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GizmoPush {
    /// Model matrix
    pub model: [[f32; 4]; 4],
    /// Line color
    pub color: [f32; 4],
    /// Shape selector, see [`crate::render::draw::GizmoShape::shader_id`]
    pub shape: u32,
    /// Vertices the shader spreads the shape over
    pub vertex_count: u32,
    /// Owning node
    pub node_id: u32,
    _pad: u32,
}

// SAFETY: repr(C), f32/u32 only, padded to 96 bytes.
unsafe impl bytemuck::Pod for GizmoPush {}
// SAFETY: all-zero is a valid value.
unsafe impl bytemuck::Zeroable for GizmoPush {}

impl From<&GizmoDraw> for GizmoPush {
    fn from(draw: &GizmoDraw) -> Self {
        Self {
            model: draw.transform.into(),
            color: draw.color,
            shape: draw.shape.shader_id(),
            vertex_count: draw.shape.vertex_count(),
            node_id: draw.node_id,
            _pad: 0,
        }
    }
}

/// Pipeline state
pub const SPEC: PipelineSpec = PipelineSpec {
    shader: "gizmo",
    mesh_vertices: false,
    topology: vk::PrimitiveTopology::LINE_LIST,
    cull_mode: vk::CullModeFlags::NONE,
    depth_test: true,
    depth_write: false,
    blend: Blend::Opaque,
    push_constant_size: std::mem::size_of::<GizmoPush>() as u32,
};

/// Gizmo pass
pub struct GizmoPass {
    pipeline: PassPipeline,
}

impl GizmoPass {
    /// Wrap a pipeline slot
    pub fn new(pipeline: PassPipeline) -> Self {
        Self { pipeline }
    }
}

impl Pass for GizmoPass {
    fn name(&self) -> &'static str {
        "gizmo"
    }

    fn pipeline(&self) -> &PassPipeline {
        &self.pipeline
    }

    fn pipeline_mut(&mut self) -> &mut PassPipeline {
        &mut self.pipeline
    }

    fn record(&self, ctx: &RecordContext<'_>, queues: &DrawQueues) -> usize {
        if queues.gizmos.is_empty() {
            return 0;
        }
        let Some(layout) = self.pipeline.bind(ctx) else {
            return 0;
        };
        for draw in &queues.gizmos {
            let push = GizmoPush::from(draw);
            ctx.cmd.push_constants(layout, PUSH_STAGES, &push);
            ctx.cmd.draw(push.vertex_count);
        }
        queues.gizmos.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Mat4;
    use crate::render::draw::GizmoShape;

    #[test]
    fn test_push_carries_shape() {
        assert_eq!(std::mem::size_of::<GizmoPush>(), 96);
        let push = GizmoPush::from(&GizmoDraw {
            shape: GizmoShape::Circle,
            transform: Mat4::identity(),
            color: [1.0, 0.0, 0.0, 1.0],
            node_id: 9,
        });
        assert_eq!(push.shape, 2);
        assert_eq!(push.vertex_count, 64);
        assert_eq!(push.node_id, 9);
    }
}
