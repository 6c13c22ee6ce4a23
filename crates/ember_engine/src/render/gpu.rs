//! GPU upload seam
//!
//! Resource loaders talk to the GPU only through [`GpuUpload`]. The Vulkan
//! renderer implements it for real; [`HeadlessGpu`] implements it with plain
//! bookkeeping so resource and scene code can run without a device.

use super::error::{RenderError, RenderResult};
use crate::assets::mesh_data::MeshData;
use crate::assets::texture_data::TextureData;
use crate::foundation::aabb::Aabb;
use crate::foundation::pool::{Handle, Pool};

/// Tag type for mesh handles
#[derive(Debug)]
pub enum MeshSlot {}
/// Tag type for texture handles
#[derive(Debug)]
pub enum TextureSlot {}
/// Tag type for material handles
#[derive(Debug)]
pub enum MaterialSlot {}

/// GPU mesh handle
pub type MeshHandle = Handle<MeshSlot>;
/// GPU texture handle
pub type TextureHandle = Handle<TextureSlot>;
/// GPU material handle; its index is the slot in the material buffer
pub type MaterialHandle = Handle<MaterialSlot>;

/// PBR material parameters as seen by the GPU
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialDesc {
    /// Linear RGBA base color
    pub base_color: [f32; 4],
    /// Metalness 0..1
    pub metallic: f32,
    /// Roughness 0..1
    pub roughness: f32,
    /// Linear RGB emission
    pub emissive: [f32; 3],
    /// Optional base color texture
    pub base_color_texture: Option<TextureHandle>,
}

impl Default for MaterialDesc {
    fn default() -> Self {
        Self {
            base_color: [1.0, 1.0, 1.0, 1.0],
            metallic: 0.0,
            roughness: 0.5,
            emissive: [0.0; 3],
            base_color_texture: None,
        }
    }
}

/// Upload and release of GPU-resident resources
pub trait GpuUpload {
    /// Upload vertex and index buffers
    fn upload_mesh(&mut self, name: &str, data: &MeshData) -> RenderResult<MeshHandle>;

    /// Release a mesh; unknown handles are ignored with a warning
    fn free_mesh(&mut self, mesh: MeshHandle);

    /// Object space bounds of an uploaded mesh
    fn mesh_bounds(&self, mesh: MeshHandle) -> Option<Aabb>;

    /// Upload an RGBA8 texture
    fn upload_texture(&mut self, name: &str, data: &TextureData) -> RenderResult<TextureHandle>;

    /// Release a texture; unknown handles are ignored with a warning
    fn free_texture(&mut self, texture: TextureHandle);

    /// Allocate a material slot and write its parameters
    fn create_material(&mut self, material: &MaterialDesc) -> RenderResult<MaterialHandle>;

    /// Release a material slot
    fn free_material(&mut self, material: MaterialHandle);
}

/// Upload context passed to GPU-backed resources
///
/// Spelled as an alias so the trait object is `'static`, matching the
/// resource kinds' associated context type.
pub type GpuContext = dyn GpuUpload;

struct HeadlessMesh {
    name: String,
    index_count: usize,
    bounds: Aabb,
}

/// Device-free [`GpuUpload`] that only records what is alive
#[derive(Default)]
pub struct HeadlessGpu {
    meshes: Pool<HeadlessMesh>,
    textures: Pool<(String, u32, u32)>,
    materials: Pool<MaterialDesc>,
}

impl HeadlessGpu {
    /// Empty device
    pub fn new() -> Self {
        Self::default()
    }

    /// Live mesh count
    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    /// Live texture count
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Live material count
    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    /// Name a mesh was uploaded under
    pub fn mesh_name(&self, mesh: MeshHandle) -> Option<&str> {
        self.meshes.get(mesh.cast()).map(|m| m.name.as_str())
    }

    /// Index count of an uploaded mesh
    pub fn mesh_index_count(&self, mesh: MeshHandle) -> Option<usize> {
        self.meshes.get(mesh.cast()).map(|m| m.index_count)
    }

    /// Parameters of a live material
    pub fn material(&self, material: MaterialHandle) -> Option<&MaterialDesc> {
        self.materials.get(material.cast())
    }
}

impl GpuUpload for HeadlessGpu {
    fn upload_mesh(&mut self, name: &str, data: &MeshData) -> RenderResult<MeshHandle> {
        if data.vertices.is_empty() {
            return Err(RenderError::UnknownResource(format!("empty mesh {name}")));
        }
        let handle = self.meshes.allocate(HeadlessMesh {
            name: name.to_string(),
            index_count: data.indices.len(),
            bounds: data.bounds(),
        })?;
        Ok(handle.cast())
    }

    fn free_mesh(&mut self, mesh: MeshHandle) {
        if let Err(e) = self.meshes.free(mesh.cast()) {
            log::warn!("free_mesh({:?}): {}", mesh, e);
        }
    }

    fn mesh_bounds(&self, mesh: MeshHandle) -> Option<Aabb> {
        self.meshes.get(mesh.cast()).map(|m| m.bounds)
    }

    fn upload_texture(&mut self, name: &str, data: &TextureData) -> RenderResult<TextureHandle> {
        let handle = self
            .textures
            .allocate((name.to_string(), data.width, data.height))?;
        Ok(handle.cast())
    }

    fn free_texture(&mut self, texture: TextureHandle) {
        if let Err(e) = self.textures.free(texture.cast()) {
            log::warn!("free_texture({:?}): {}", texture, e);
        }
    }

    fn create_material(&mut self, material: &MaterialDesc) -> RenderResult<MaterialHandle> {
        Ok(self.materials.allocate(*material)?.cast())
    }

    fn free_material(&mut self, material: MaterialHandle) {
        if let Err(e) = self.materials.free(material.cast()) {
            log::warn!("free_material({:?}): {}", material, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headless_tracks_lifetimes() {
        let mut gpu = HeadlessGpu::new();
        let mesh = gpu.upload_mesh("cube", &MeshData::cube()).unwrap();
        assert_eq!(gpu.mesh_count(), 1);
        assert_eq!(gpu.mesh_name(mesh), Some("cube"));
        assert_eq!(gpu.mesh_index_count(mesh), Some(36));
        assert!(gpu.mesh_bounds(mesh).is_some());

        gpu.free_mesh(mesh);
        assert_eq!(gpu.mesh_count(), 0);
        assert!(gpu.mesh_bounds(mesh).is_none());
        // second free only warns
        gpu.free_mesh(mesh);
    }

    #[test]
    fn test_empty_mesh_rejected() {
        let mut gpu = HeadlessGpu::new();
        assert!(gpu.upload_mesh("empty", &MeshData::default()).is_err());
    }
}
