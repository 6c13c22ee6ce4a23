//! Builds scene nodes from data trees
//!
//! A node entry looks like this:
//!
//! ```ron
//! (
//!     name: "crate",
//!     alias: "player",
//!     position: (0.0, 1.0, 0.0),
//!     rotation: (0.0, 45.0, 0.0),
//!     scale: 1.0,
//!     visible: true,
//!     components: [(type: "mesh", mesh: "mesh:cube")],
//!     children: [
//!         (name: "child"),
//!         (scene: "scenes/lamp.ron", position: (2.0, 0.0, 0.0)),
//!     ],
//! )
//! ```
//!
//! Every field is optional. A bad field falls back to its default, an
//! unknown component type is skipped, and a broken child is skipped; each
//! is logged. An entry with a `scene` field includes another file, with the
//! entry's other fields overriding the included root's.

use super::{NodeId, Scene, SceneError, SceneResult};
use crate::assets::{DataError, DataNode, FromData, ResourceError, Resources};
use crate::components::ComponentRegistry;
use crate::foundation::math::{utils, Transform, Vec3};
use crate::foundation::string_id::StringId;

/// How deeply scene files may include each other
pub const MAX_INCLUDE_DEPTH: usize = 16;

/// Node transform from `position`, `rotation` (euler degrees) and `scale`
pub fn transform_from_data(data: &DataNode) -> Result<Transform, DataError> {
    let rotation: [f32; 3] = data.field_or("rotation", [0.0; 3])?;
    Ok(Transform::new(
        data.field_or("position", Vec3::zeros())?,
        utils::quat_from_euler_degrees(rotation[0], rotation[1], rotation[2]),
        data.field_or("scale", 1.0)?,
    ))
}

/// Field with a logged fallback instead of an error
fn lenient<T: FromData>(data: &DataNode, key: &str, default: T) -> T {
    match data.field_opt(key) {
        Ok(value) => value.unwrap_or(default),
        Err(e) => {
            log::warn!("{}, using the default", e);
            default
        }
    }
}

/// Included root with the including entry's fields laid over it
fn merge_include(included: &DataNode, entry: &DataNode) -> DataNode {
    match (included, entry) {
        (DataNode::Map(base), DataNode::Map(overrides)) => {
            let mut merged = base.clone();
            for (key, value) in overrides {
                if key != "scene" {
                    merged.insert(key.clone(), value.clone());
                }
            }
            DataNode::Map(merged)
        }
        _ => included.clone(),
    }
}

/// Turns data trees into nodes and components
///
/// Included files are kept referenced in the scene cache while the loader
/// lives, so a file included many times is parsed once.
pub struct SceneLoader<'a> {
    registry: &'a ComponentRegistry,
    resources: &'a mut Resources,
    held: Vec<StringId>,
    nodes_created: usize,
    components_created: usize,
    components_skipped: usize,
}

impl<'a> SceneLoader<'a> {
    /// Loader creating components through `registry`
    pub fn new(registry: &'a ComponentRegistry, resources: &'a mut Resources) -> Self {
        Self {
            registry,
            resources,
            held: Vec::new(),
            nodes_created: 0,
            components_created: 0,
            components_skipped: 0,
        }
    }

    /// Load a scene file under `parent`; returns the new subtree root
    pub fn load_file(&mut self, scene: &mut Scene, parent: NodeId, path: &str) -> SceneResult<NodeId> {
        let root = self.read_file(path)?;
        let id = self.build(scene, parent, &root, 1)?;
        log::info!(
            "Loaded scene '{}': {} nodes, {} components, {} skipped",
            path,
            self.nodes_created,
            self.components_created,
            self.components_skipped
        );
        Ok(id)
    }

    /// Build nodes from an in-memory tree under `parent`
    pub fn load_data(&mut self, scene: &mut Scene, parent: NodeId, data: &DataNode) -> SceneResult<NodeId> {
        self.build(scene, parent, data, 0)
    }

    /// Nodes created so far
    pub fn nodes_created(&self) -> usize {
        self.nodes_created
    }

    /// Components created so far
    pub fn components_created(&self) -> usize {
        self.components_created
    }

    /// Component entries that failed to create
    pub fn components_skipped(&self) -> usize {
        self.components_skipped
    }

    fn read_file(&mut self, path: &str) -> SceneResult<DataNode> {
        let handle = self.resources.load_scene(path)?;
        let id = StringId::new(path);
        self.held.push(id);
        self.resources
            .scenes
            .get(handle)
            .map(|s| s.root.clone())
            .ok_or_else(|| SceneError::Resource(ResourceError::NotLoaded(id)))
    }

    fn build(&mut self, scene: &mut Scene, parent: NodeId, data: &DataNode, depth: usize) -> SceneResult<NodeId> {
        if data.as_map().is_none() {
            return Err(DataError::WrongType {
                key: "node".to_string(),
                expected: "a map",
            }
            .into());
        }

        if let Some(path) = data.field_opt::<String>("scene")? {
            if depth >= MAX_INCLUDE_DEPTH {
                return Err(SceneError::IncludeDepth {
                    path,
                    limit: MAX_INCLUDE_DEPTH,
                });
            }
            let included = self.read_file(&path)?;
            return self.build(scene, parent, &merge_include(&included, data), depth + 1);
        }

        let name = lenient(data, "name", "node".to_string());
        let local = transform_from_data(data).unwrap_or_else(|e| {
            log::warn!("Node '{}' transform: {}", name, e);
            Transform::IDENTITY
        });
        let id = scene.create_node(parent, name, local)?;
        self.nodes_created += 1;
        scene.set_visible(id, lenient(data, "visible", true))?;
        let alias = lenient(data, "alias", String::new());
        if !alias.is_empty() {
            scene.set_alias(alias, id)?;
        }

        for entry in lenient_list(data, "components") {
            self.create_component(scene, id, entry)?;
        }
        for child in lenient_list(data, "children") {
            if let Err(e) = self.build(scene, id, child, depth) {
                log::warn!("Skipping child of {:?}: {}", id, e);
            }
        }
        Ok(id)
    }

    fn create_component(&mut self, scene: &mut Scene, node: NodeId, entry: &DataNode) -> SceneResult<()> {
        let type_name = match entry.field::<String>("type") {
            Ok(type_name) => type_name,
            Err(e) => {
                log::warn!("Component entry on {:?}: {}", node, e);
                self.components_skipped += 1;
                return Ok(());
            }
        };
        match self.registry.create(&type_name, entry) {
            Ok(component) => {
                scene.attach_component(node, component)?;
                self.components_created += 1;
            }
            Err(e) => {
                log::warn!("Skipping {} component on {:?}: {}", type_name, node, e);
                self.components_skipped += 1;
            }
        }
        Ok(())
    }
}

impl Drop for SceneLoader<'_> {
    fn drop(&mut self) {
        for id in self.held.drain(..) {
            self.resources.release_scene(id);
        }
    }
}

fn lenient_list<'d>(data: &'d DataNode, key: &str) -> &'d [DataNode] {
    data.list(key).unwrap_or_else(|e| {
        log::warn!("{}", e);
        &[]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Mesh, Spin};
    use crate::config::AssetConfig;
    use approx::assert_relative_eq;
    use std::path::PathBuf;

    fn temp_assets(name: &str, files: &[(&str, &str)]) -> (PathBuf, Resources) {
        let dir = std::env::temp_dir().join(format!("ember_loader_{}_{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        for (file, text) in files {
            std::fs::write(dir.join(file), text).unwrap();
        }
        let assets = AssetConfig {
            search_paths: vec![dir.clone()],
        };
        (dir, Resources::new(assets))
    }

    #[test]
    fn test_builds_nodes_and_components() {
        let registry = ComponentRegistry::with_builtin();
        let mut resources = Resources::default();
        let mut scene = Scene::new();
        let data = DataNode::from_ron_str(
            r#"(
                name: "spinner",
                alias: "player",
                position: (1.0, 2.0, 3.0),
                rotation: (0.0, 90.0, 0.0),
                scale: 2.0,
                components: [
                    (type: "spin", degrees_per_second: 10.0),
                    (type: "mesh", mesh: "mesh:cube"),
                    (type: "teleporter"),
                    (mesh: "no type"),
                ],
                children: [(name: "child", visible: false), 42],
            )"#,
        )
        .unwrap();

        let root = scene.root();
        let mut loader = SceneLoader::new(&registry, &mut resources);
        let id = loader.load_data(&mut scene, root, &data).unwrap();
        assert_eq!(loader.nodes_created(), 2);
        assert_eq!(loader.components_created(), 2);
        assert_eq!(loader.components_skipped(), 2);
        drop(loader);

        let node = scene.node(id).unwrap();
        assert_eq!(node.name, "spinner");
        assert_eq!(node.local_transform().position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(node.local_transform().scale, 2.0);
        assert_eq!(scene.alias("player"), Some(id));
        assert!(scene.find_component::<Spin>(id).is_some());
        assert_eq!(scene.find_component::<Mesh>(id).unwrap().mesh, "mesh:cube");

        let child = scene.find_by_name("child").unwrap();
        assert!(!scene.node(child).unwrap().visible);
    }

    #[test]
    fn test_bad_fields_fall_back() {
        let registry = ComponentRegistry::with_builtin();
        let mut resources = Resources::default();
        let mut scene = Scene::new();
        let data = DataNode::from_ron_str(r#"(name: 5, position: "up", visible: "yes")"#).unwrap();
        let root = scene.root();
        let id = SceneLoader::new(&registry, &mut resources)
            .load_data(&mut scene, root, &data)
            .unwrap();
        let node = scene.node(id).unwrap();
        assert_eq!(node.name, "node");
        assert_eq!(node.local_transform(), Transform::IDENTITY);
        assert!(node.visible);
    }

    #[test]
    fn test_includes_are_cached_and_overridden() {
        let (dir, mut resources) = temp_assets(
            "include",
            &[
                ("lamp.ron", r#"(name: "lamp", position: (0.0, 3.0, 0.0), components: [(type: "point_light")])"#),
                (
                    "room.ron",
                    r#"(name: "room", children: [
                        (scene: "lamp.ron"),
                        (scene: "lamp.ron", name: "lamp2", position: (5.0, 0.0, 0.0)),
                    ])"#,
                ),
            ],
        );
        let registry = ComponentRegistry::with_builtin();
        let mut scene = Scene::new();
        let root = scene.root();
        {
            let mut loader = SceneLoader::new(&registry, &mut resources);
            loader.load_file(&mut scene, root, "room.ron").unwrap();
            assert_eq!(loader.nodes_created(), 3);
            assert_eq!(loader.components_created(), 2);
        }
        // References held during loading are released afterwards
        assert_eq!(resources.scenes.len(), 0);

        let lamp = scene.find_by_name("lamp").unwrap();
        let lamp2 = scene.find_by_name("lamp2").unwrap();
        assert_eq!(scene.local_transform(lamp).unwrap().position, Vec3::new(0.0, 3.0, 0.0));
        assert_eq!(scene.local_transform(lamp2).unwrap().position, Vec3::new(5.0, 0.0, 0.0));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_self_include_stops_at_depth_limit() {
        let (dir, mut resources) = temp_assets(
            "recursive",
            &[("loop.ron", r#"(name: "loop", children: [(scene: "loop.ron")])"#)],
        );
        let registry = ComponentRegistry::with_builtin();
        let mut scene = Scene::new();
        let root = scene.root();
        SceneLoader::new(&registry, &mut resources)
            .load_file(&mut scene, root, "loop.ron")
            .unwrap();
        assert_eq!(scene.node_count(), MAX_INCLUDE_DEPTH + 1);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let registry = ComponentRegistry::with_builtin();
        let mut resources = Resources::default();
        let mut scene = Scene::new();
        let root = scene.root();
        let result = SceneLoader::new(&registry, &mut resources).load_file(&mut scene, root, "missing/scene.ron");
        assert!(matches!(result, Err(SceneError::Resource(_))));
        assert_eq!(scene.node_count(), 1);
    }

    #[test]
    fn test_transform_from_data() {
        let data = DataNode::from_ron_str("(rotation: (0.0, 90.0, 0.0), scale: 0.5)").unwrap();
        let t = transform_from_data(&data).unwrap();
        assert_eq!(t.scale, 0.5);
        let p = t.transform_vector(&Vec3::new(2.0, 0.0, 0.0));
        assert_relative_eq!(p, Vec3::new(0.0, 0.0, -1.0), epsilon = 1e-6);
    }
}
