//! Box outlines

use super::{Pass, PassPipeline, PipelineSpec, RecordContext};
use crate::render::draw::{AabbDraw, DrawQueues};
use crate::render::vulkan::shader::PUSH_STAGES;
use crate::render::vulkan::Blend;
use ash::vk;

/// Twelve edges, two vertices each
pub const AABB_VERTEX_COUNT: u32 = 24;

/// Per-draw push block
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AabbPush {
    /// World-space minimum corner
    pub min: [f32; 4],
    /// World-space maximum corner
    pub max: [f32; 4],
    /// Line color
    pub color: [f32; 4],
    /// Owning node
    pub node_id: u32,
    _pad: [u32; 3],
}

// SAFETY: repr(C), f32/u32 only, padded to 64 bytes.
unsafe impl bytemuck::Pod for AabbPush {}
// SAFETY: all-zero is a valid value.
unsafe impl bytemuck::Zeroable for AabbPush {}

impl AabbPush {
    /// Push block for a valid box
    pub fn new(draw: &AabbDraw) -> Option<Self> {
        if !draw.aabb.valid {
            return None;
        }
        let (min, max) = (draw.aabb.min(), draw.aabb.max());
        Some(Self {
            min: [min.x, min.y, min.z, 1.0],
            max: [max.x, max.y, max.z, 1.0],
            color: draw.color,
            node_id: draw.node_id,
            _pad: [0; 3],
        })
    }
}

/// Pipeline state
pub const SPEC: PipelineSpec = PipelineSpec {
    shader: "aabb",
    mesh_vertices: false,
    topology: vk::PrimitiveTopology::LINE_LIST,
    cull_mode: vk::CullModeFlags::NONE,
    depth_test: true,
    depth_write: false,
    blend: Blend::Opaque,
    push_constant_size: std::mem::size_of::<AabbPush>() as u32,
};

/// AABB outline pass
pub struct AabbPass {
    pipeline: PassPipeline,
}

impl AabbPass {
    /// Wrap a pipeline slot
    pub fn new(pipeline: PassPipeline) -> Self {
        Self { pipeline }
    }
}

impl Pass for AabbPass {
    fn name(&self) -> &'static str {
        "aabb"
    }

    fn pipeline(&self) -> &PassPipeline {
        &self.pipeline
    }

    fn pipeline_mut(&mut self) -> &mut PassPipeline {
        &mut self.pipeline
    }

    fn record(&self, ctx: &RecordContext<'_>, queues: &DrawQueues) -> usize {
        if queues.aabbs.is_empty() {
            return 0;
        }
        let Some(layout) = self.pipeline.bind(ctx) else {
            return 0;
        };
        let mut draws = 0;
        for push in queues.aabbs.iter().filter_map(AabbPush::new) {
            ctx.cmd.push_constants(layout, PUSH_STAGES, &push);
            ctx.cmd.draw(AABB_VERTEX_COUNT);
            draws += 1;
        }
        draws
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::aabb::Aabb;
    use crate::foundation::math::Vec3;

    #[test]
    fn test_invalid_box_skipped() {
        let draw = AabbDraw {
            aabb: Aabb::INVALID,
            color: [1.0; 4],
            node_id: 0,
        };
        assert!(AabbPush::new(&draw).is_none());
    }

    #[test]
    fn test_corners() {
        let draw = AabbDraw {
            aabb: Aabb::from_min_max(Vec3::new(-1.0, 0.0, 2.0), Vec3::new(1.0, 4.0, 3.0)),
            color: [1.0; 4],
            node_id: 5,
        };
        let push = AabbPush::new(&draw).unwrap();
        assert_eq!(push.min, [-1.0, 0.0, 2.0, 1.0]);
        assert_eq!(push.max, [1.0, 4.0, 3.0, 1.0]);
        assert_eq!(std::mem::size_of::<AabbPush>(), 64);
    }
}
