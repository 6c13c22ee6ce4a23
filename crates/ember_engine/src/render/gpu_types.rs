//! GPU-side data layouts
//!
//! Plain-old-data mirrors of the blocks declared in the GLSL sources under
//! `resources/shaders/`. Field order and padding follow std140 for uniform
//! blocks and std430 for storage buffers.

use super::draw::{CameraData, PointLightData, MAX_POINT_LIGHTS};
use super::gpu::MaterialDesc;
use super::vulkan::Buffer;
use crate::foundation::aabb::Aabb;
use crate::foundation::math::Mat4;

/// Material slots in the global material buffer
pub const MAX_MATERIALS: usize = 1024;
/// Texture slots in the global texture array
pub const MAX_TEXTURES: usize = 256;

/// Uploaded mesh buffers
pub struct GpuMesh {
    /// Interleaved vertices
    pub vertices: Buffer,
    /// `u32` indices
    pub indices: Buffer,
    /// Number of indices to draw
    pub index_count: u32,
    /// Object space bounds
    pub bounds: Aabb,
}

/// One entry of the material storage buffer
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpuMaterial {
    /// Linear RGBA base color
    pub base_color: [f32; 4],
    /// Linear RGB emission
    pub emissive: [f32; 3],
    /// Metalness
    pub metallic: f32,
    /// Roughness
    pub roughness: f32,
    /// Texture array slot, or -1
    pub texture: i32,
    _pad: [u32; 2],
}

// SAFETY: repr(C), only f32/i32/u32 fields, explicit padding to 48 bytes.
unsafe impl bytemuck::Pod for GpuMaterial {}
// SAFETY: all-zero is a valid value.
unsafe impl bytemuck::Zeroable for GpuMaterial {}

impl From<&MaterialDesc> for GpuMaterial {
    fn from(desc: &MaterialDesc) -> Self {
        Self {
            base_color: desc.base_color,
            emissive: desc.emissive,
            metallic: desc.metallic,
            roughness: desc.roughness,
            texture: desc
                .base_color_texture
                .map_or(-1, |texture| i32::from(texture.index())),
            _pad: [0; 2],
        }
    }
}

/// Point light as laid out in the frame uniform block
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GpuPointLight {
    /// xyz position, w range
    pub position_range: [f32; 4],
    /// rgb color, w intensity
    pub color_intensity: [f32; 4],
}

// SAFETY: repr(C) over f32 arrays, no padding.
unsafe impl bytemuck::Pod for GpuPointLight {}
// SAFETY: all-zero is a valid value.
unsafe impl bytemuck::Zeroable for GpuPointLight {}

/// Per-frame uniform block, one copy per frame slot
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameUniforms {
    /// World to view
    pub view: [[f32; 4]; 4],
    /// View to clip
    pub projection: [[f32; 4]; 4],
    /// Camera world position, w unused
    pub camera_position: [f32; 4],
    /// Ambient RGB, w unused
    pub ambient: [f32; 4],
    /// x: active light count
    pub light_count: [u32; 4],
    /// Active lights first
    pub lights: [GpuPointLight; MAX_POINT_LIGHTS],
}

// SAFETY: repr(C), every field is 16-byte sized and Pod.
unsafe impl bytemuck::Pod for FrameUniforms {}
// SAFETY: all-zero is a valid value.
unsafe impl bytemuck::Zeroable for FrameUniforms {}

impl FrameUniforms {
    /// Fill from this frame's camera and lights; no camera means identity matrices
    pub fn new(camera: Option<&CameraData>, lights: &[PointLightData], ambient: [f32; 3]) -> Self {
        let (view, projection, position) = camera.map_or_else(
            || (Mat4::identity(), Mat4::identity(), [0.0; 4]),
            |c| (c.view, c.projection, [c.position.x, c.position.y, c.position.z, 1.0]),
        );

        let mut gpu_lights = [GpuPointLight::default(); MAX_POINT_LIGHTS];
        let count = lights.len().min(MAX_POINT_LIGHTS);
        for (dst, light) in gpu_lights.iter_mut().zip(lights) {
            *dst = GpuPointLight {
                position_range: [light.position.x, light.position.y, light.position.z, light.range],
                color_intensity: [light.color[0], light.color[1], light.color[2], light.intensity],
            };
        }

        Self {
            view: view.into(),
            projection: projection.into(),
            camera_position: position,
            ambient: [ambient[0], ambient[1], ambient[2], 0.0],
            light_count: [count as u32, 0, 0, 0],
            lights: gpu_lights,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::foundation::pool::Handle;

    #[test]
    fn test_layout_sizes() {
        assert_eq!(std::mem::size_of::<GpuMaterial>(), 48);
        assert_eq!(std::mem::size_of::<GpuPointLight>(), 32);
        assert_eq!(
            std::mem::size_of::<FrameUniforms>(),
            64 * 2 + 16 * 3 + 32 * MAX_POINT_LIGHTS
        );
    }

    #[test]
    fn test_material_texture_slot() {
        let mut desc = MaterialDesc::default();
        assert_eq!(GpuMaterial::from(&desc).texture, -1);
        desc.base_color_texture = Some(Handle::from_raw(7, 3));
        assert_eq!(GpuMaterial::from(&desc).texture, 7);
    }

    #[test]
    fn test_frame_uniforms_light_count() {
        let light = PointLightData {
            position: Vec3::new(1.0, 2.0, 3.0),
            color: [1.0, 0.5, 0.25],
            intensity: 4.0,
            range: 10.0,
        };
        let uniforms = FrameUniforms::new(None, &[light, light], [0.1; 3]);
        assert_eq!(uniforms.light_count[0], 2);
        assert_eq!(uniforms.lights[1].position_range, [1.0, 2.0, 3.0, 10.0]);
        assert_eq!(uniforms.lights[2], GpuPointLight::default());
    }
}
