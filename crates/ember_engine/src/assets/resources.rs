//! Concrete resource kinds and the aggregate cache the engine owns
//!
//! Ids follow a small naming scheme:
//! - `mesh:<primitive>` builds a primitive (`cube`, `quad`, `plane`),
//!   anything else is an OBJ path
//! - `texture:white`, `texture:black`, `texture:checker` are generated,
//!   anything else is an image path
//! - `material:default` is a plain white material, anything else is a
//!   `.ron`/`.toml` material file
//! - scene ids are `.ron`/`.toml` file paths

use super::data::DataNode;
use super::mesh_data::MeshData;
use super::resource_manager::{Resource, ResourceError, ResourceManager};
use super::texture_data::TextureData;
use crate::config::AssetConfig;
use crate::foundation::aabb::Aabb;
use crate::foundation::pool::Handle;
use crate::foundation::string_id::StringId;
use crate::render::gpu::{GpuContext, MaterialDesc, MaterialHandle, MeshHandle, TextureHandle};
use std::path::PathBuf;

/// Where mesh data comes from
pub enum MeshSource {
    /// Already built data
    Data(MeshData),
    /// Named built-in primitive
    Primitive(String),
    /// OBJ file
    File(PathBuf),
}

/// Mesh resident on the GPU
#[derive(Debug)]
pub struct MeshResource {
    /// GPU handle used in draw requests
    pub gpu: MeshHandle,
    /// Object space bounds
    pub bounds: Aabb,
    /// Triangle index count
    pub index_count: usize,
}

impl Resource for MeshResource {
    type Context = GpuContext;
    type Args = MeshSource;
    const KIND: &'static str = "mesh";

    fn load(id: StringId, gpu: &mut GpuContext, source: MeshSource) -> Result<Self, ResourceError> {
        let data = match source {
            MeshSource::Data(data) => data,
            MeshSource::Primitive(name) => {
                MeshData::primitive(&name).ok_or_else(|| ResourceError::LoadFailed {
                    id,
                    reason: format!("unknown primitive '{name}'"),
                })?
            }
            MeshSource::File(path) => MeshData::load_obj(&path).map_err(|e| ResourceError::LoadFailed {
                id,
                reason: e.to_string(),
            })?,
        };
        data.validate().map_err(|e| ResourceError::LoadFailed {
            id,
            reason: e.to_string(),
        })?;

        let gpu_handle = gpu.upload_mesh(&id.as_str(), &data)?;
        Ok(Self {
            gpu: gpu_handle,
            bounds: data.bounds(),
            index_count: data.indices.len(),
        })
    }

    fn unload(&mut self, gpu: &mut GpuContext) {
        gpu.free_mesh(self.gpu);
    }
}

/// Where texture pixels come from
pub enum TextureSource {
    /// Already decoded pixels
    Data(TextureData),
    /// Image file
    File(PathBuf),
}

/// Texture resident on the GPU
#[derive(Debug)]
pub struct TextureResource {
    /// GPU handle
    pub gpu: TextureHandle,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Resource for TextureResource {
    type Context = GpuContext;
    type Args = TextureSource;
    const KIND: &'static str = "texture";

    fn load(id: StringId, gpu: &mut GpuContext, source: TextureSource) -> Result<Self, ResourceError> {
        let data = match source {
            TextureSource::Data(data) => data,
            TextureSource::File(path) => {
                TextureData::from_file(&path).map_err(|e| ResourceError::LoadFailed {
                    id,
                    reason: e.to_string(),
                })?
            }
        };
        let gpu_handle = gpu.upload_texture(&id.as_str(), &data)?;
        Ok(Self {
            gpu: gpu_handle,
            width: data.width,
            height: data.height,
        })
    }

    fn unload(&mut self, gpu: &mut GpuContext) {
        gpu.free_texture(self.gpu);
    }
}

/// Material with the texture it depends on
#[derive(Debug)]
pub struct MaterialResource {
    /// GPU handle; the index addresses the material buffer
    pub gpu: MaterialHandle,
    /// Parameters as uploaded
    pub desc: MaterialDesc,
    /// Texture id held by this material
    pub texture: Option<StringId>,
}

/// Arguments for creating a material
pub struct MaterialArgs {
    /// Parameters, texture already resolved
    pub desc: MaterialDesc,
    /// Texture id the material keeps referenced
    pub texture: Option<StringId>,
}

impl Resource for MaterialResource {
    type Context = GpuContext;
    type Args = MaterialArgs;
    const KIND: &'static str = "material";

    fn load(_id: StringId, gpu: &mut GpuContext, args: MaterialArgs) -> Result<Self, ResourceError> {
        let handle = gpu.create_material(&args.desc)?;
        Ok(Self {
            gpu: handle,
            desc: args.desc,
            texture: args.texture,
        })
    }

    fn unload(&mut self, gpu: &mut GpuContext) {
        gpu.free_material(self.gpu);
    }
}

/// Parsed scene file, cached so repeated includes parse once
#[derive(Debug)]
pub struct SceneResource {
    /// Root of the data tree
    pub root: DataNode,
}

impl Resource for SceneResource {
    type Context = ();
    type Args = PathBuf;
    const KIND: &'static str = "scene";

    fn load(id: StringId, _ctx: &mut (), path: PathBuf) -> Result<Self, ResourceError> {
        let root = DataNode::load_file(&path).map_err(|e| ResourceError::LoadFailed {
            id,
            reason: e.to_string(),
        })?;
        Ok(Self { root })
    }

    fn unload(&mut self, _ctx: &mut ()) {}
}

/// All resource caches
#[derive(Default)]
pub struct Resources {
    /// Meshes
    pub meshes: ResourceManager<MeshResource>,
    /// Textures
    pub textures: ResourceManager<TextureResource>,
    /// Materials
    pub materials: ResourceManager<MaterialResource>,
    /// Parsed scene files
    pub scenes: ResourceManager<SceneResource>,
    assets: AssetConfig,
}

impl Resources {
    /// Caches resolving relative paths through `assets`
    pub fn new(assets: AssetConfig) -> Self {
        Self {
            assets,
            ..Self::default()
        }
    }

    /// Path lookup settings
    pub fn asset_config(&self) -> &AssetConfig {
        &self.assets
    }

    /// Load or reference a mesh by id
    pub fn load_mesh(
        &mut self,
        id: &str,
        gpu: &mut GpuContext,
    ) -> Result<Handle<MeshResource>, ResourceError> {
        let key = StringId::try_new(id)?;
        if self.meshes.contains(key) {
            return self.meshes.reference(key).ok_or(ResourceError::NotLoaded(key));
        }
        let source = match id.strip_prefix("mesh:") {
            Some(primitive) => MeshSource::Primitive(primitive.to_string()),
            None => MeshSource::File(self.assets.resolve(id)),
        };
        self.meshes.load(key, gpu, source)
    }

    /// Register procedurally built mesh data under `id`
    pub fn insert_mesh(
        &mut self,
        id: &str,
        data: MeshData,
        gpu: &mut GpuContext,
    ) -> Result<Handle<MeshResource>, ResourceError> {
        self.meshes.load(StringId::try_new(id)?, gpu, MeshSource::Data(data))
    }

    /// Drop one mesh reference
    pub fn release_mesh(&mut self, id: StringId, gpu: &mut GpuContext) -> bool {
        self.meshes.unreference(id, gpu)
    }

    /// Load or reference a texture by id
    pub fn load_texture(
        &mut self,
        id: &str,
        gpu: &mut GpuContext,
    ) -> Result<Handle<TextureResource>, ResourceError> {
        let key = StringId::try_new(id)?;
        if self.textures.contains(key) {
            return self.textures.reference(key).ok_or(ResourceError::NotLoaded(key));
        }
        let source = match id {
            "texture:white" => TextureSource::Data(TextureData::solid_color(1, 1, [255; 4])),
            "texture:black" => TextureSource::Data(TextureData::solid_color(1, 1, [0, 0, 0, 255])),
            "texture:checker" => TextureSource::Data(TextureData::checkerboard(
                64,
                8,
                [230, 230, 230, 255],
                [40, 40, 40, 255],
            )),
            path => TextureSource::File(self.assets.resolve(path)),
        };
        self.textures.load(key, gpu, source)
    }

    /// Drop one texture reference
    pub fn release_texture(&mut self, id: StringId, gpu: &mut GpuContext) -> bool {
        self.textures.unreference(id, gpu)
    }

    /// Load or reference a material, loading its texture with it
    pub fn load_material(
        &mut self,
        id: &str,
        gpu: &mut GpuContext,
    ) -> Result<Handle<MaterialResource>, ResourceError> {
        let key = StringId::try_new(id)?;
        if self.materials.contains(key) {
            return self.materials.reference(key).ok_or(ResourceError::NotLoaded(key));
        }

        let (mut desc, texture) = if id == "material:default" {
            (MaterialDesc::default(), None)
        } else {
            self.read_material_file(id)?
        };

        let texture_id = match texture {
            Some(texture) => {
                let handle = self.load_texture(&texture, gpu)?;
                desc.base_color_texture = self.textures.get(handle).map(|t| t.gpu);
                Some(StringId::new(&texture))
            }
            None => None,
        };

        let args = MaterialArgs {
            desc,
            texture: texture_id,
        };
        match self.materials.load(key, gpu, args) {
            Ok(handle) => Ok(handle),
            Err(err) => {
                if let Some(texture) = texture_id {
                    self.textures.unreference(texture, gpu);
                }
                Err(err)
            }
        }
    }

    /// Drop one material reference, releasing its texture when evicted
    pub fn release_material(&mut self, id: StringId, gpu: &mut GpuContext) -> bool {
        let texture = self.materials.get_by_id(id).and_then(|m| m.texture);
        let evicted = self.materials.unreference(id, gpu);
        if evicted {
            if let Some(texture) = texture {
                self.textures.unreference(texture, gpu);
            }
        }
        evicted
    }

    /// Load or reference a parsed scene file
    pub fn load_scene(&mut self, path: &str) -> Result<Handle<SceneResource>, ResourceError> {
        let key = StringId::try_new(path)?;
        if self.scenes.contains(key) {
            return self.scenes.reference(key).ok_or(ResourceError::NotLoaded(key));
        }
        let resolved = self.assets.resolve(path);
        self.scenes.load(key, &mut (), resolved)
    }

    /// Drop one scene reference
    pub fn release_scene(&mut self, id: StringId) -> bool {
        self.scenes.unreference(id, &mut ())
    }

    /// Unload every cache; materials go before the textures they use
    pub fn unload_all(&mut self, gpu: &mut GpuContext) {
        let counts = (self.meshes.len(), self.materials.len(), self.textures.len());
        self.materials.unload_all(gpu);
        self.textures.unload_all(gpu);
        self.meshes.unload_all(gpu);
        self.scenes.unload_all(&mut ());
        log::info!(
            "Unloaded {} meshes, {} materials, {} textures",
            counts.0,
            counts.1,
            counts.2
        );
    }

    fn read_material_file(&self, id: &str) -> Result<(MaterialDesc, Option<String>), ResourceError> {
        let node = DataNode::load_file(self.assets.resolve(id))?;
        let defaults = MaterialDesc::default();
        let desc = MaterialDesc {
            base_color: node.field_or("base_color", defaults.base_color)?,
            metallic: node.field_or("metallic", defaults.metallic)?,
            roughness: node.field_or("roughness", defaults.roughness)?,
            emissive: node.field_or("emissive", defaults.emissive)?,
            base_color_texture: None,
        };
        Ok((desc, node.field_opt::<String>("texture")?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::gpu::HeadlessGpu;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ember_{}_{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_primitive_mesh_shared() {
        let mut gpu = HeadlessGpu::new();
        let mut resources = Resources::default();

        let a = resources.load_mesh("mesh:cube", &mut gpu).unwrap();
        let b = resources.load_mesh("mesh:cube", &mut gpu).unwrap();
        assert_eq!(a, b);
        assert_eq!(gpu.mesh_count(), 1);
        assert_eq!(resources.meshes.get(a).unwrap().index_count, 36);
    }

    #[test]
    fn test_unknown_primitive_fails() {
        let mut gpu = HeadlessGpu::new();
        let mut resources = Resources::default();
        assert!(matches!(
            resources.load_mesh("mesh:dodecahedron", &mut gpu),
            Err(ResourceError::LoadFailed { .. })
        ));
        assert_eq!(gpu.mesh_count(), 0);
    }

    #[test]
    fn test_material_holds_texture_until_evicted() {
        let dir = temp_dir("material");
        std::fs::write(
            dir.join("stone.ron"),
            r#"(base_color: (0.5, 0.5, 0.5, 1.0), roughness: 0.9, texture: "texture:checker")"#,
        )
        .unwrap();

        let mut gpu = HeadlessGpu::new();
        let mut resources = Resources::new(AssetConfig {
            search_paths: vec![dir.clone()],
        });

        let handle = resources.load_material("stone.ron", &mut gpu).unwrap();
        let material = resources.materials.get(handle).unwrap();
        assert_eq!(material.desc.roughness, 0.9);
        assert!(material.desc.base_color_texture.is_some());
        assert_eq!(gpu.texture_count(), 1);

        resources.load_material("stone.ron", &mut gpu).unwrap();
        let id = StringId::new("stone.ron");
        assert!(!resources.release_material(id, &mut gpu));
        assert_eq!(gpu.texture_count(), 1);
        assert!(resources.release_material(id, &mut gpu));
        assert_eq!(gpu.texture_count(), 0);
        assert_eq!(gpu.material_count(), 0);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_bad_material_field_fails_load() {
        let dir = temp_dir("bad_material");
        std::fs::write(dir.join("bad.ron"), r#"(roughness: "very")"#).unwrap();

        let mut gpu = HeadlessGpu::new();
        let mut resources = Resources::new(AssetConfig {
            search_paths: vec![dir.clone()],
        });
        assert!(matches!(
            resources.load_material("bad.ron", &mut gpu),
            Err(ResourceError::Data(_))
        ));
        assert_eq!(gpu.material_count(), 0);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unload_all_empties_gpu() {
        let mut gpu = HeadlessGpu::new();
        let mut resources = Resources::default();
        resources.load_mesh("mesh:quad", &mut gpu).unwrap();
        resources.load_material("material:default", &mut gpu).unwrap();
        resources.load_texture("texture:white", &mut gpu).unwrap();

        resources.unload_all(&mut gpu);
        assert_eq!(gpu.mesh_count(), 0);
        assert_eq!(gpu.material_count(), 0);
        assert_eq!(gpu.texture_count(), 0);
    }
}
