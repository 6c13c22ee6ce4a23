//! Camera-facing textured quads

use super::{Pass, PassPipeline, PipelineSpec, RecordContext};
use crate::render::draw::{BillboardDraw, DrawQueues};
use crate::render::vulkan::shader::PUSH_STAGES;
use crate::render::vulkan::Blend;
use ash::vk;

/// Per-quad push block
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BillboardPush {
    /// xyz center, w edge length
    pub position_size: [f32; 4],
    /// Tint
    pub color: [f32; 4],
    /// Texture array slot, or -1 for untextured
    pub texture: i32,
    /// Owning node
    pub node_id: u32,
    _pad: [u32; 2],
}

// SAFETY: repr(C), f32/i32/u32 only, padded to 48 bytes.
unsafe impl bytemuck::Pod for BillboardPush {}
// SAFETY: all-zero is a valid value.
unsafe impl bytemuck::Zeroable for BillboardPush {}

impl BillboardPush {
    /// Push block with the texture slot already resolved
    pub fn new(draw: &BillboardDraw, texture: i32) -> Self {
        Self {
            position_size: [draw.position.x, draw.position.y, draw.position.z, draw.size],
            color: draw.color,
            texture,
            node_id: draw.node_id,
            _pad: [0; 2],
        }
    }
}

/// Pipeline state
pub const SPEC: PipelineSpec = PipelineSpec {
    shader: "billboard",
    mesh_vertices: false,
    topology: vk::PrimitiveTopology::TRIANGLE_LIST,
    cull_mode: vk::CullModeFlags::NONE,
    depth_test: true,
    depth_write: false,
    blend: Blend::Alpha,
    push_constant_size: std::mem::size_of::<BillboardPush>() as u32,
};

/// Billboard pass
pub struct BillboardPass {
    pipeline: PassPipeline,
}

impl BillboardPass {
    /// Wrap a pipeline slot
    pub fn new(pipeline: PassPipeline) -> Self {
        Self { pipeline }
    }
}

impl Pass for BillboardPass {
    fn name(&self) -> &'static str {
        "billboard"
    }

    fn pipeline(&self) -> &PassPipeline {
        &self.pipeline
    }

    fn pipeline_mut(&mut self) -> &mut PassPipeline {
        &mut self.pipeline
    }

    fn record(&self, ctx: &RecordContext<'_>, queues: &DrawQueues) -> usize {
        if queues.billboards.is_empty() {
            return 0;
        }
        let Some(layout) = self.pipeline.bind(ctx) else {
            return 0;
        };
        for draw in &queues.billboards {
            let texture = draw
                .texture
                .filter(|&t| ctx.textures.contains(t.cast()))
                .map_or(-1, |t| i32::from(t.index()));
            ctx.cmd
                .push_constants(layout, PUSH_STAGES, &BillboardPush::new(draw, texture));
            ctx.cmd.draw(6);
        }
        queues.billboards.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;

    #[test]
    fn test_push_packs_size() {
        let push = BillboardPush::new(
            &BillboardDraw {
                position: Vec3::new(1.0, 2.0, 3.0),
                size: 0.5,
                color: [1.0; 4],
                texture: None,
                node_id: 4,
            },
            -1,
        );
        assert_eq!(push.position_size, [1.0, 2.0, 3.0, 0.5]);
        assert_eq!(push.texture, -1);
        assert_eq!(std::mem::size_of::<BillboardPush>(), 48);
    }
}
