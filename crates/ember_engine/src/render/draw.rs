//! Per-frame draw requests
//!
//! Components push requests into [`DrawQueues`] while the scene is traversed.
//! The renderer consumes them once per frame and the queues are cleared
//! afterwards no matter how recording went, so a failed frame never leaves
//! requests behind to be drawn twice.

use super::gpu::{MaterialHandle, MeshHandle, TextureHandle};
use crate::foundation::aabb::Aabb;
use crate::foundation::math::{Mat4, Vec3};

/// Upper bound of point lights sent to the GPU per frame
pub const MAX_POINT_LIGHTS: usize = 16;

/// Indexed mesh draw for the PBR pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshDraw {
    /// Mesh to draw
    pub mesh: MeshHandle,
    /// Material slot
    pub material: MaterialHandle,
    /// Model matrix
    pub transform: Mat4,
    /// Owning node, for picking and debugging
    pub node_id: u32,
}

/// Camera-facing quad
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BillboardDraw {
    /// World position of the quad center
    pub position: Vec3,
    /// Edge length in world units
    pub size: f32,
    /// Tint
    pub color: [f32; 4],
    /// Texture, or untextured when `None`
    pub texture: Option<TextureHandle>,
    /// Owning node
    pub node_id: u32,
}

/// Procedural helper shapes, generated in the vertex shader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GizmoShape {
    /// RGB coordinate axes
    Axes,
    /// Three-axis cross
    Cross,
    /// Circle in the local XZ plane
    Circle,
}

impl GizmoShape {
    /// Line-list vertex count the shader expects
    pub const fn vertex_count(self) -> u32 {
        match self {
            Self::Axes | Self::Cross => 6,
            Self::Circle => 64,
        }
    }

    /// Shape id pushed to the shader
    pub const fn shader_id(self) -> u32 {
        match self {
            Self::Axes => 0,
            Self::Cross => 1,
            Self::Circle => 2,
        }
    }
}

/// Helper shape draw
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GizmoDraw {
    /// Shape to generate
    pub shape: GizmoShape,
    /// Model matrix
    pub transform: Mat4,
    /// Color, ignored by `Axes`
    pub color: [f32; 4],
    /// Owning node
    pub node_id: u32,
}

/// Single debug line segment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineDraw {
    /// Start point in world space
    pub start: Vec3,
    /// End point in world space
    pub end: Vec3,
    /// Color
    pub color: [f32; 4],
}

/// World-space box outline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AabbDraw {
    /// Box to outline
    pub aabb: Aabb,
    /// Color
    pub color: [f32; 4],
    /// Owning node
    pub node_id: u32,
}

/// Active camera for this frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraData {
    /// World to view
    pub view: Mat4,
    /// View to clip, including the Vulkan axis flip
    pub projection: Mat4,
    /// World position
    pub position: Vec3,
}

/// Point light for this frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLightData {
    /// World position
    pub position: Vec3,
    /// Linear RGB color
    pub color: [f32; 3],
    /// Intensity multiplier
    pub intensity: f32,
    /// Distance where the light fades out
    pub range: f32,
}

/// Transient list of draw requests for one pass
#[derive(Debug, Clone)]
pub struct DrawQueue<T> {
    items: Vec<T>,
}

impl<T> Default for DrawQueue<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> DrawQueue<T> {
    /// Append a request
    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    /// Requests in submission order
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Iterate requests
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Number of requests
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether there is nothing to draw
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drop all requests, keeping the allocation
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<'a, T> IntoIterator for &'a DrawQueue<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Everything the scene asked to draw this frame
#[derive(Debug, Default)]
pub struct DrawQueues {
    /// PBR meshes
    pub meshes: DrawQueue<MeshDraw>,
    /// Billboards
    pub billboards: DrawQueue<BillboardDraw>,
    /// Helper shapes
    pub gizmos: DrawQueue<GizmoDraw>,
    /// Debug lines
    pub lines: DrawQueue<LineDraw>,
    /// Box outlines
    pub aabbs: DrawQueue<AabbDraw>,
    camera: Option<CameraData>,
    lights: Vec<PointLightData>,
}

impl DrawQueues {
    /// Empty queues
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the camera, replacing one set earlier in the frame
    pub fn set_camera(&mut self, camera: CameraData) {
        self.camera = Some(camera);
    }

    /// Camera for this frame, if any component provided one
    pub fn camera(&self) -> Option<&CameraData> {
        self.camera.as_ref()
    }

    /// Add a point light; lights past [`MAX_POINT_LIGHTS`] are dropped
    pub fn push_light(&mut self, light: PointLightData) {
        if self.lights.len() < MAX_POINT_LIGHTS {
            self.lights.push(light);
        } else {
            log::trace!("Point light dropped, limit {} reached", MAX_POINT_LIGHTS);
        }
    }

    /// Lights for this frame
    pub fn lights(&self) -> &[PointLightData] {
        &self.lights
    }

    /// Add a debug line
    pub fn line(&mut self, start: Vec3, end: Vec3, color: [f32; 4]) {
        self.lines.push(LineDraw { start, end, color });
    }

    /// Total number of queued draw requests across passes
    pub fn total_len(&self) -> usize {
        self.meshes.len()
            + self.billboards.len()
            + self.gizmos.len()
            + self.lines.len()
            + self.aabbs.len()
    }

    /// Whether no pass has anything queued
    pub fn is_empty(&self) -> bool {
        self.total_len() == 0
    }

    /// Hand the queues to `f`, then clear them whatever `f` returned
    pub fn consume<R>(&mut self, f: impl FnOnce(&Self) -> R) -> R {
        let result = f(self);
        self.clear();
        result
    }

    /// Drop every request, the camera and the lights
    pub fn clear(&mut self) {
        self.meshes.clear();
        self.billboards.clear();
        self.gizmos.clear();
        self.lines.clear();
        self.aabbs.clear();
        self.lights.clear();
        self.camera = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::pool::Handle;

    fn mesh_draw() -> MeshDraw {
        MeshDraw {
            mesh: Handle::from_raw(0, 0),
            material: Handle::from_raw(0, 0),
            transform: Mat4::identity(),
            node_id: 1,
        }
    }

    #[test]
    fn test_consume_clears_on_error() {
        let mut queues = DrawQueues::new();
        queues.meshes.push(mesh_draw());
        queues.line(Vec3::zeros(), Vec3::x(), [1.0; 4]);

        let result: Result<(), &str> = queues.consume(|q| {
            assert_eq!(q.total_len(), 2);
            Err("recording failed")
        });

        assert!(result.is_err());
        assert!(queues.is_empty());
    }

    #[test]
    fn test_clear_resets_camera_and_lights() {
        let mut queues = DrawQueues::new();
        queues.set_camera(CameraData {
            view: Mat4::identity(),
            projection: Mat4::identity(),
            position: Vec3::zeros(),
        });
        queues.push_light(PointLightData {
            position: Vec3::zeros(),
            color: [1.0; 3],
            intensity: 1.0,
            range: 5.0,
        });
        queues.clear();
        assert!(queues.camera().is_none());
        assert!(queues.lights().is_empty());
    }

    #[test]
    fn test_light_limit() {
        let mut queues = DrawQueues::new();
        for _ in 0..MAX_POINT_LIGHTS + 4 {
            queues.push_light(PointLightData {
                position: Vec3::zeros(),
                color: [1.0; 3],
                intensity: 1.0,
                range: 1.0,
            });
        }
        assert_eq!(queues.lights().len(), MAX_POINT_LIGHTS);
    }
}
