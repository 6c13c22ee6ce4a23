//! Mesh and model components
//!
//! A `mesh` draws one cached mesh with one material. A `model` spawns a
//! child node with a `mesh` for each part listed inline or in a model file.

use super::{Capabilities, Component, ComponentContext, ComponentError, ComponentResult, DrawContext};
use crate::assets::{DataNode, Resources};
use crate::foundation::aabb::Aabb;
use crate::foundation::string_id::StringId;
use crate::render::{MaterialHandle, MeshDraw, MeshHandle};
use crate::scene::transform_from_data;

const DEFAULT_MATERIAL: &str = "material:default";

/// Draws one mesh with one material through the PBR pass
#[derive(Debug, Clone)]
pub struct Mesh {
    /// Mesh resource id, a file path or `mesh:<primitive>`
    pub mesh: String,
    /// Material resource id
    pub material: String,
    loaded: Option<LoadedMesh>,
}

#[derive(Debug, Clone, Copy)]
struct LoadedMesh {
    mesh_id: StringId,
    material_id: StringId,
    mesh: MeshHandle,
    material: MaterialHandle,
}

impl Mesh {
    /// Mesh component for the given resource ids
    pub fn new(mesh: impl Into<String>, material: impl Into<String>) -> Self {
        Self {
            mesh: mesh.into(),
            material: material.into(),
            loaded: None,
        }
    }

    /// Fields: `mesh` (required), `material`
    pub fn from_data(data: &DataNode) -> ComponentResult<Self> {
        Ok(Self::new(
            data.field::<String>("mesh")?,
            data.field_or("material", DEFAULT_MATERIAL.to_string())?,
        ))
    }

    /// Whether the resources are resident
    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    /// Object space bounds of the loaded mesh
    pub fn bounds(&self, resources: &Resources) -> Option<Aabb> {
        let loaded = self.loaded?;
        resources.meshes.get_by_id(loaded.mesh_id).map(|m| m.bounds)
    }
}

impl Component for Mesh {
    fn type_name(&self) -> &'static str {
        "mesh"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::INITIALIZE | Capabilities::DRAW | Capabilities::SHUTDOWN
    }

    fn initialize(&mut self, ctx: &mut ComponentContext<'_>) -> ComponentResult<()> {
        let mesh_handle = ctx.resources.load_mesh(&self.mesh, ctx.gpu)?;
        let mesh_id = StringId::new(&self.mesh);
        let material_handle = match ctx.resources.load_material(&self.material, ctx.gpu) {
            Ok(handle) => handle,
            Err(e) => {
                ctx.resources.release_mesh(mesh_id, ctx.gpu);
                return Err(e.into());
            }
        };
        let mesh = ctx.resources.meshes.get(mesh_handle).map(|m| m.gpu);
        let material = ctx.resources.materials.get(material_handle).map(|m| m.gpu);
        let (Some(mesh), Some(material)) = (mesh, material) else {
            return Err(ComponentError::Init {
                component: "mesh",
                reason: format!("{} or {} vanished after loading", self.mesh, self.material),
            });
        };
        self.loaded = Some(LoadedMesh {
            mesh_id,
            material_id: StringId::new(&self.material),
            mesh,
            material,
        });
        Ok(())
    }

    fn draw(&self, ctx: &mut DrawContext<'_>) {
        if let Some(loaded) = self.loaded {
            ctx.queues.meshes.push(MeshDraw {
                mesh: loaded.mesh,
                material: loaded.material,
                transform: ctx.global.to_matrix(),
                node_id: ctx.node_id(),
            });
        }
    }

    fn shutdown(&mut self, ctx: &mut ComponentContext<'_>) {
        if let Some(loaded) = self.loaded.take() {
            ctx.resources.release_material(loaded.material_id, ctx.gpu);
            ctx.resources.release_mesh(loaded.mesh_id, ctx.gpu);
        }
    }
}

/// Multi-part model: spawns one child node with a [`Mesh`] per part
///
/// Parts come from the `file` field (a data file with a `parts` list) or
/// from an inline `parts` list. Each part has `mesh`, optional `material`,
/// `name` and the usual node transform fields.
#[derive(Debug, Clone)]
pub struct Model {
    /// Model description file
    pub file: Option<String>,
    parts: Vec<DataNode>,
    spawned: usize,
}

impl Model {
    /// Fields: `file` or `parts`
    pub fn from_data(data: &DataNode) -> ComponentResult<Self> {
        let file: Option<String> = data.field_opt("file")?;
        let parts = data.list("parts")?.to_vec();
        if file.is_none() && parts.is_empty() {
            return Err(ComponentError::Init {
                component: "model",
                reason: "needs a file or a parts list".to_string(),
            });
        }
        Ok(Self {
            file,
            parts,
            spawned: 0,
        })
    }

    /// Child nodes spawned by the last initialize
    pub fn spawned(&self) -> usize {
        self.spawned
    }

    fn read_parts(&self, resources: &mut Resources) -> ComponentResult<Vec<DataNode>> {
        let mut parts = self.parts.clone();
        if let Some(file) = &self.file {
            let handle = resources.load_scene(file)?;
            let listed = resources
                .scenes
                .get(handle)
                .map(|s| s.root.list("parts").map(<[DataNode]>::to_vec))
                .transpose();
            resources.release_scene(StringId::new(file));
            parts.extend(listed?.unwrap_or_default());
        }
        Ok(parts)
    }
}

impl Component for Model {
    fn type_name(&self) -> &'static str {
        "model"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::INITIALIZE
    }

    fn initialize(&mut self, ctx: &mut ComponentContext<'_>) -> ComponentResult<()> {
        let parts = self.read_parts(ctx.resources)?;
        self.spawned = 0;
        for (i, part) in parts.iter().enumerate() {
            // every field of a part is read before any node exists for it
            let parsed = Mesh::from_data(part).and_then(|mesh| {
                let name = part.field_or("name", format!("part{i}"))?;
                Ok((mesh, name, transform_from_data(part)?))
            });
            let (mesh, name, local) = match parsed {
                Ok(parsed) => parsed,
                Err(e) => {
                    log::warn!("Skipping model part {}: {}", i, e);
                    continue;
                }
            };
            let child = ctx.scene.create_node(ctx.node, name, local)?;
            ctx.scene.attach_component(child, Box::new(mesh))?;
            self.spawned += 1;
        }
        log::debug!("Model spawned {} parts under {:?}", self.spawned, ctx.node);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::foundation::math::Transform;
    use crate::render::HeadlessGpu;
    use crate::world::World;

    fn model_node(world: &mut World, parts: &str) -> crate::scene::NodeId {
        let data = DataNode::from_ron_str(parts).unwrap();
        let root = world.scene.root();
        let node = world.scene.create_node(root, "model", Transform::IDENTITY).unwrap();
        let model = Model::from_data(&data).unwrap();
        world.scene.attach_component(node, Box::new(model)).unwrap();
        node
    }

    #[test]
    fn test_model_skips_malformed_part() {
        let mut gpu = HeadlessGpu::new();
        let mut world = World::new(&EngineConfig::default());
        let node = model_node(
            &mut world,
            r#"(parts: [
                (mesh: "mesh:cube", name: "ok"),
                (mesh: "mesh:cube", name: 5),
                (mesh: "mesh:quad", position: "up"),
                (mesh: "mesh:plane"),
            ])"#,
        );

        let (scene, mut services) = world.split(&mut gpu);
        scene.initialize_components(&mut services);

        let model = world.scene.find_component::<Model>(node).unwrap();
        assert_eq!(model.spawned(), 2);
        let children = world.scene.node(node).unwrap().children().to_vec();
        assert_eq!(children.len(), 2);
        assert_eq!(world.scene.node(children[0]).unwrap().name, "ok");
        assert_eq!(world.scene.node(children[1]).unwrap().name, "part3");
        assert_eq!(world.resources.meshes.ref_count(StringId::new("mesh:cube")), Some(1));
        assert!(!world.resources.meshes.contains(StringId::new("mesh:quad")));
    }

    #[test]
    fn test_mesh_shutdown_releases_resources() {
        let mut gpu = HeadlessGpu::new();
        let mut world = World::new(&EngineConfig::default());
        let root = world.scene.root();
        let node = world.scene.create_node(root, "cube", Transform::IDENTITY).unwrap();
        world
            .scene
            .attach_component(node, Box::new(Mesh::new("mesh:cube", DEFAULT_MATERIAL)))
            .unwrap();

        let (scene, mut services) = world.split(&mut gpu);
        scene.initialize_components(&mut services);
        assert!(world.scene.find_component::<Mesh>(node).unwrap().is_loaded());
        assert_eq!(gpu.mesh_count(), 1);

        let (scene, mut services) = world.split(&mut gpu);
        scene.shutdown_components(&mut services);
        assert!(!world.resources.meshes.contains(StringId::new("mesh:cube")));
        assert!(world.resources.materials.is_empty());
        assert_eq!(gpu.mesh_count(), 0);
        assert_eq!(gpu.material_count(), 0);
    }
}
