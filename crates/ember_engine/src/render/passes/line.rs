//! Debug line segments

use super::{Pass, PassPipeline, PipelineSpec, RecordContext};
use crate::render::draw::{DrawQueues, LineDraw};
use crate::render::vulkan::shader::PUSH_STAGES;
use crate::render::vulkan::Blend;
use ash::vk;

/// Per-line push block
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinePush {
    /// Start point, w = 1
    pub start: [f32; 4],
    /// End point, w = 1
    pub end: [f32; 4],
    /// Color
    pub color: [f32; 4],
}

// SAFETY: repr(C) over f32 arrays, 48 bytes, no padding.
unsafe impl bytemuck::Pod for LinePush {}
// SAFETY: all-zero is a valid value.
unsafe impl bytemuck::Zeroable for LinePush {}

impl From<&LineDraw> for LinePush {
    fn from(line: &LineDraw) -> Self {
        Self {
            start: [line.start.x, line.start.y, line.start.z, 1.0],
            end: [line.end.x, line.end.y, line.end.z, 1.0],
            color: line.color,
        }
    }
}

/// Pipeline state
pub const SPEC: PipelineSpec = PipelineSpec {
    shader: "line",
    mesh_vertices: false,
    topology: vk::PrimitiveTopology::LINE_LIST,
    cull_mode: vk::CullModeFlags::NONE,
    depth_test: true,
    depth_write: false,
    blend: Blend::Opaque,
    push_constant_size: std::mem::size_of::<LinePush>() as u32,
};

/// Debug line pass
pub struct LinePass {
    pipeline: PassPipeline,
}

impl LinePass {
    /// Wrap a pipeline slot
    pub fn new(pipeline: PassPipeline) -> Self {
        Self { pipeline }
    }
}

impl Pass for LinePass {
    fn name(&self) -> &'static str {
        "line"
    }

    fn pipeline(&self) -> &PassPipeline {
        &self.pipeline
    }

    fn pipeline_mut(&mut self) -> &mut PassPipeline {
        &mut self.pipeline
    }

    fn record(&self, ctx: &RecordContext<'_>, queues: &DrawQueues) -> usize {
        if queues.lines.is_empty() {
            return 0;
        }
        let Some(layout) = self.pipeline.bind(ctx) else {
            return 0;
        };
        for line in &queues.lines {
            ctx.cmd
                .push_constants(layout, PUSH_STAGES, &LinePush::from(line));
            ctx.cmd.draw(2);
        }
        queues.lines.len()
    }
}
