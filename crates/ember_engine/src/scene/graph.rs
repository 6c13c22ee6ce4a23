//! Arena scene graph
//!
//! Nodes live in a [`Pool`]; parents hold child ids and children hold a
//! parent id, so the graph has no ownership cycles. Global transforms are
//! derived state: they are only brought up to date by
//! [`Scene::refresh_transforms`] (or [`Scene::refresh_subtree`]), never
//! automatically when a local transform changes.

use super::{SceneError, SceneResult};
use crate::assets::Resources;
use crate::components::{
    Capabilities, Component, ComponentContext, DrawContext, Services,
};
use crate::foundation::math::Transform;
use crate::foundation::pool::{Handle, Pool};
use crate::render::DrawQueues;
use std::collections::HashMap;

/// Node handle
pub type NodeId = Handle<Node>;

/// Initialization passes before giving up on components that keep spawning more
const MAX_INIT_PASSES: usize = 16;

/// A component plus its per-node flags
#[derive(Debug)]
pub struct ComponentSlot {
    component: Box<dyn Component>,
    /// Whether `draw` is called for this component
    pub visible: bool,
    initialized: bool,
}

impl ComponentSlot {
    /// The component
    pub fn component(&self) -> &dyn Component {
        self.component.as_ref()
    }

    /// The component, mutably
    pub fn component_mut(&mut self) -> &mut dyn Component {
        self.component.as_mut()
    }

    /// Whether `initialize` has run successfully
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn has(&self, capability: Capabilities) -> bool {
        self.component.capabilities().contains(capability)
    }
}

/// Scene graph element
#[derive(Debug)]
pub struct Node {
    /// Display name, not required to be unique
    pub name: String,
    /// Invisible nodes skip drawing for their whole subtree
    pub visible: bool,
    local: Transform,
    global: Transform,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    components: Vec<ComponentSlot>,
}

impl Node {
    fn new(name: String, local: Transform, parent: Option<NodeId>) -> Self {
        Self {
            name,
            visible: true,
            local,
            global: local,
            parent,
            children: Vec::new(),
            components: Vec::new(),
        }
    }

    /// Transform relative to the parent
    pub fn local_transform(&self) -> Transform {
        self.local
    }

    /// World transform as of the last refresh
    pub fn global_transform(&self) -> Transform {
        self.global
    }

    /// Parent node, `None` for the root
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Child nodes in insertion order
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Attached components
    pub fn components(&self) -> &[ComponentSlot] {
        &self.components
    }

    /// Attached components, mutably
    pub fn components_mut(&mut self) -> &mut [ComponentSlot] {
        &mut self.components
    }
}

/// Scene graph with a single root
#[derive(Debug)]
pub struct Scene {
    nodes: Pool<Node>,
    root: NodeId,
    aliases: HashMap<String, NodeId>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    /// Scene holding only a root node
    pub fn new() -> Self {
        let mut nodes = Pool::new();
        let root = nodes
            .allocate(Node::new("root".to_string(), Transform::IDENTITY, None))
            .unwrap_or_else(|_| unreachable!("an empty pool always has room"));
        Self {
            nodes,
            root,
            aliases: HashMap::new(),
        }
    }

    /// The root node
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Live node count, root included
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Add a node under `parent`
    pub fn create_node(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        local: Transform,
    ) -> SceneResult<NodeId> {
        let parent_global = self.node_ref(parent)?.global;
        let mut node = Node::new(name.into(), local, Some(parent));
        node.global = parent_global * local;
        let id = self.nodes.allocate(node)?;
        self.node_mut_ref(parent)?.children.push(id);
        Ok(id)
    }

    /// Node by id
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Node by id, mutably
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    /// Whether `id` refers to a live node
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains(id)
    }

    /// Parent of `id`
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|n| n.parent)
    }

    /// Local transform of `id`
    pub fn local_transform(&self, id: NodeId) -> Option<Transform> {
        self.nodes.get(id).map(|n| n.local)
    }

    /// Global transform of `id` as of the last refresh
    pub fn global_transform(&self, id: NodeId) -> Option<Transform> {
        self.nodes.get(id).map(|n| n.global)
    }

    /// Replace the local transform; globals update on the next refresh
    pub fn set_local_transform(&mut self, id: NodeId, local: Transform) -> SceneResult<()> {
        self.node_mut_ref(id)?.local = local;
        Ok(())
    }

    /// Show or hide a node and its subtree
    pub fn set_visible(&mut self, id: NodeId, visible: bool) -> SceneResult<()> {
        self.node_mut_ref(id)?.visible = visible;
        Ok(())
    }

    /// First node named `name` in depth-first order
    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.depth_first(self.root)
            .into_iter()
            .find(|&id| self.nodes.get(id).is_some_and(|n| n.name == name))
    }

    /// Register an extra name for a node, e.g. `player`
    pub fn set_alias(&mut self, alias: impl Into<String>, id: NodeId) -> SceneResult<()> {
        self.node_ref(id)?;
        self.aliases.insert(alias.into(), id);
        Ok(())
    }

    /// Node registered under `alias`, if it is still alive
    pub fn alias(&self, alias: &str) -> Option<NodeId> {
        self.aliases
            .get(alias)
            .copied()
            .filter(|&id| self.nodes.contains(id))
    }

    /// Move `id` under `new_parent`, keeping its local transform
    pub fn reparent(&mut self, id: NodeId, new_parent: NodeId) -> SceneResult<()> {
        if id == self.root {
            return Err(SceneError::RootOperation("reparent"));
        }
        self.node_ref(new_parent)?;
        if self.is_ancestor(id, new_parent) {
            return Err(SceneError::Cycle);
        }
        let old_parent = self.node_ref(id)?.parent;
        if let Some(old) = old_parent.and_then(|p| self.nodes.get_mut(p)) {
            old.children.retain(|&c| c != id);
        }
        self.node_mut_ref(id)?.parent = Some(new_parent);
        self.node_mut_ref(new_parent)?.children.push(id);
        Ok(())
    }

    /// Whether `ancestor` is `id` or lies on the path from `id` to the root
    pub fn is_ancestor(&self, ancestor: NodeId, mut id: NodeId) -> bool {
        loop {
            if id == ancestor {
                return true;
            }
            match self.parent(id) {
                Some(parent) => id = parent,
                None => return false,
            }
        }
    }

    /// Attach a component; it is initialized by the next
    /// [`Scene::initialize_components`]
    pub fn attach_component(&mut self, id: NodeId, component: Box<dyn Component>) -> SceneResult<()> {
        self.node_mut_ref(id)?.components.push(ComponentSlot {
            component,
            visible: true,
            initialized: false,
        });
        Ok(())
    }

    /// First component of type `T` on `id`
    pub fn find_component<T: Component>(&self, id: NodeId) -> Option<&T> {
        self.nodes
            .get(id)?
            .components
            .iter()
            .find_map(|slot| slot.component.downcast_ref::<T>())
    }

    /// First component of type `T` on `id`, mutably
    pub fn find_component_mut<T: Component>(&mut self, id: NodeId) -> Option<&mut T> {
        self.nodes
            .get_mut(id)?
            .components
            .iter_mut()
            .find_map(|slot| slot.component.downcast_mut::<T>())
    }

    /// Node ids of the subtree at `from`, parents before children
    pub fn depth_first(&self, from: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            order.push(id);
            stack.extend(node.children.iter().rev());
        }
        order
    }

    /// Recompute every global transform from the root down
    pub fn refresh_transforms(&mut self) {
        self.refresh_from(self.root, Transform::IDENTITY);
    }

    /// Recompute global transforms of the subtree at `id` from its parent's current global
    pub fn refresh_subtree(&mut self, id: NodeId) -> SceneResult<()> {
        let parent_global = match self.node_ref(id)?.parent {
            Some(parent) => self.node_ref(parent)?.global,
            None => Transform::IDENTITY,
        };
        self.refresh_from(id, parent_global);
        Ok(())
    }

    fn refresh_from(&mut self, id: NodeId, parent_global: Transform) {
        let mut stack = vec![(id, parent_global)];
        while let Some((id, parent_global)) = stack.pop() {
            let Some(node) = self.nodes.get_mut(id) else {
                continue;
            };
            node.global = parent_global * node.local;
            let global = node.global;
            stack.extend(node.children.iter().rev().map(|&child| (child, global)));
        }
    }

    /// Initialize every component that has not been initialized yet
    ///
    /// Components that fail are logged and detached. Components attached
    /// while this runs (say, a model spawning child meshes) are picked up in
    /// the same call.
    pub fn initialize_components(&mut self, services: &mut Services<'_>) -> usize {
        let mut total = 0;
        for pass in 0..MAX_INIT_PASSES {
            let pending: Vec<NodeId> = self
                .depth_first(self.root)
                .into_iter()
                .filter(|&id| {
                    self.nodes
                        .get(id)
                        .is_some_and(|n| n.components.iter().any(|s| !s.initialized))
                })
                .collect();
            if pending.is_empty() {
                return total;
            }
            if pass > 0 {
                log::debug!("Initialization pass {} for {} nodes", pass + 1, pending.len());
            }
            for id in pending {
                self.run_components(id, services, |slot, ctx| {
                    if slot.initialized {
                        return true;
                    }
                    if slot.has(Capabilities::INITIALIZE) {
                        if let Err(e) = slot.component.initialize(ctx) {
                            log::warn!(
                                "Dropping {} component on node {:?}: {}",
                                slot.component.type_name(),
                                ctx.node,
                                e
                            );
                            return false;
                        }
                    }
                    slot.initialized = true;
                    total += 1;
                    true
                });
            }
        }
        log::warn!(
            "Components still pending after {} initialization passes",
            MAX_INIT_PASSES
        );
        total
    }

    /// Run `update` on every initialized component, parents before children
    pub fn update(&mut self, services: &mut Services<'_>) {
        for id in self.depth_first(self.root) {
            let wants_update = self.nodes.get(id).is_some_and(|n| {
                n.components
                    .iter()
                    .any(|s| s.initialized && s.has(Capabilities::UPDATE))
            });
            if !wants_update {
                continue;
            }
            self.run_components(id, services, |slot, ctx| {
                if slot.initialized && slot.has(Capabilities::UPDATE) {
                    slot.component.update(ctx);
                }
                true
            });
        }
    }

    /// Let visible components push draw requests; returns how many components drew
    ///
    /// An invisible node hides its whole subtree.
    pub fn draw(&self, queues: &mut DrawQueues, resources: &Resources, aspect_ratio: f32) -> usize {
        let mut drawn = 0;
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            if !node.visible {
                continue;
            }
            let mut ctx = DrawContext {
                node: id,
                global: node.global,
                scene: self,
                resources,
                queues: &mut *queues,
                aspect_ratio,
            };
            for slot in &node.components {
                if slot.visible && slot.initialized && slot.has(Capabilities::DRAW) {
                    slot.component.draw(&mut ctx);
                    drawn += 1;
                }
            }
            stack.extend(node.children.iter().rev());
        }
        drawn
    }

    /// Shut down every initialized component, children before parents
    pub fn shutdown_components(&mut self, services: &mut Services<'_>) {
        let order = self.depth_first(self.root);
        for id in order.into_iter().rev() {
            self.shutdown_node(id, services);
        }
    }

    /// Remove `id` and its subtree, shutting their components down first
    pub fn remove_node(&mut self, id: NodeId, services: &mut Services<'_>) -> SceneResult<()> {
        if id == self.root {
            return Err(SceneError::RootOperation("remove"));
        }
        self.node_ref(id)?;
        let subtree = self.depth_first(id);
        for &node in subtree.iter().rev() {
            self.shutdown_node(node, services);
        }
        if let Some(parent) = self.parent(id).and_then(|p| self.nodes.get_mut(p)) {
            parent.children.retain(|&c| c != id);
        }
        for node in subtree.into_iter().rev() {
            self.nodes.free(node)?;
        }
        self.aliases.retain(|_, target| self.nodes.contains(*target));
        Ok(())
    }

    fn shutdown_node(&mut self, id: NodeId, services: &mut Services<'_>) {
        self.run_components(id, services, |slot, ctx| {
            if slot.initialized && slot.has(Capabilities::SHUTDOWN) {
                slot.component.shutdown(ctx);
            }
            slot.initialized = false;
            true
        });
    }

    /// Detach the node's components, run `f` on each with a context that
    /// borrows the whole scene, then put back the ones `f` kept
    fn run_components(
        &mut self,
        id: NodeId,
        services: &mut Services<'_>,
        mut f: impl FnMut(&mut ComponentSlot, &mut ComponentContext<'_>) -> bool,
    ) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        let mut slots = std::mem::take(&mut node.components);
        {
            let mut ctx = self.component_context(id, services);
            slots.retain_mut(|slot| f(slot, &mut ctx));
        }
        match self.nodes.get_mut(id) {
            Some(node) => {
                // keep components attached during the call, after the existing ones
                slots.append(&mut node.components);
                node.components = slots;
            }
            None => {
                // the node went away mid-call, so its own shutdown saw no components
                log::debug!(
                    "Node {:?} removed by its own component, shutting down {} detached components",
                    id,
                    slots.len()
                );
                let mut ctx = self.component_context(id, services);
                for slot in &mut slots {
                    if slot.initialized && slot.has(Capabilities::SHUTDOWN) {
                        slot.component.shutdown(&mut ctx);
                    }
                    slot.initialized = false;
                }
            }
        }
    }

    fn component_context<'s>(
        &'s mut self,
        id: NodeId,
        services: &'s mut Services<'_>,
    ) -> ComponentContext<'s> {
        ComponentContext {
            node: id,
            scene: self,
            resources: &mut *services.resources,
            gpu: &mut *services.gpu,
            physics: &mut *services.physics,
            input: services.input,
            delta: services.delta,
        }
    }

    fn node_ref(&self, id: NodeId) -> SceneResult<&Node> {
        self.nodes.get(id).ok_or(SceneError::UnknownNode(id.to_bits()))
    }

    fn node_mut_ref(&mut self, id: NodeId) -> SceneResult<&mut Node> {
        self.nodes
            .get_mut(id)
            .ok_or(SceneError::UnknownNode(id.to_bits()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Mesh;
    use crate::config::EngineConfig;
    use crate::foundation::math::{utils, Quat, Vec3};
    use crate::foundation::string_id::StringId;
    use crate::render::HeadlessGpu;
    use crate::world::World;
    use approx::assert_relative_eq;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Removes its own node on the first update
    #[derive(Debug)]
    struct SelfRemover {
        shutdowns: Rc<Cell<u32>>,
    }

    impl Component for SelfRemover {
        fn type_name(&self) -> &'static str {
            "self_remover"
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities::UPDATE | Capabilities::SHUTDOWN
        }

        fn update(&mut self, ctx: &mut ComponentContext<'_>) {
            ctx.remove_node(ctx.node).unwrap();
        }

        fn shutdown(&mut self, _ctx: &mut ComponentContext<'_>) {
            self.shutdowns.set(self.shutdowns.get() + 1);
        }
    }

    fn mesh_node(world: &mut World, parent: NodeId, name: &str, mesh: &str) -> NodeId {
        let node = world.scene.create_node(parent, name, Transform::IDENTITY).unwrap();
        world
            .scene
            .attach_component(node, Box::new(Mesh::new(mesh, "material:default")))
            .unwrap();
        node
    }

    fn translate(x: f32, y: f32, z: f32) -> Transform {
        Transform::from_position(Vec3::new(x, y, z))
    }

    #[test]
    fn test_chain_refresh() {
        let mut scene = Scene::new();
        let t_r = Transform::new(Vec3::new(1.0, 0.0, 0.0), utils::quat_from_euler_degrees(0.0, 90.0, 0.0), 2.0);
        let t_a = Transform::new(Vec3::new(0.0, 1.0, 0.0), utils::quat_from_euler_degrees(30.0, 0.0, 0.0), 0.5);
        let t_b = translate(0.0, 0.0, 3.0);

        let root = scene.root();
        scene.set_local_transform(root, t_r).unwrap();
        let a = scene.create_node(root, "a", t_a).unwrap();
        let b = scene.create_node(a, "b", t_b).unwrap();
        scene.refresh_transforms();

        let expected = t_r * t_a * t_b;
        let global = scene.global_transform(b).unwrap();
        assert_relative_eq!(global.position, expected.position, epsilon = 1e-5);
        assert_relative_eq!(global.scale, expected.scale, epsilon = 1e-6);
    }

    #[test]
    fn test_refresh_is_explicit() {
        let mut scene = Scene::new();
        let a = scene.create_node(scene.root(), "a", translate(1.0, 0.0, 0.0)).unwrap();
        let b = scene.create_node(a, "b", translate(0.0, 1.0, 0.0)).unwrap();
        let sibling = scene.create_node(scene.root(), "sibling", translate(5.0, 0.0, 0.0)).unwrap();
        scene.refresh_transforms();

        scene.set_local_transform(a, translate(2.0, 0.0, 0.0)).unwrap();
        assert_eq!(scene.global_transform(b).unwrap().position, Vec3::new(1.0, 1.0, 0.0));

        scene.refresh_subtree(a).unwrap();
        assert_eq!(scene.global_transform(b).unwrap().position, Vec3::new(2.0, 1.0, 0.0));
        assert_eq!(scene.global_transform(sibling).unwrap().position, Vec3::new(5.0, 0.0, 0.0));
    }

    #[test]
    fn test_reparent_rejects_cycles() {
        let mut scene = Scene::new();
        let a = scene.create_node(scene.root(), "a", Transform::IDENTITY).unwrap();
        let b = scene.create_node(a, "b", Transform::IDENTITY).unwrap();
        assert!(matches!(scene.reparent(a, b), Err(SceneError::Cycle)));
        assert!(matches!(scene.reparent(scene.root(), a), Err(SceneError::RootOperation(_))));

        let c = scene.create_node(scene.root(), "c", translate(0.0, 2.0, 0.0)).unwrap();
        scene.reparent(b, c).unwrap();
        scene.refresh_transforms();
        assert_eq!(scene.parent(b), Some(c));
        assert!(scene.node(a).unwrap().children().is_empty());
        assert_eq!(scene.global_transform(b).unwrap().position, Vec3::new(0.0, 2.0, 0.0));
    }

    #[test]
    fn test_find_and_alias() {
        let mut scene = Scene::new();
        let a = scene.create_node(scene.root(), "ship", Transform::IDENTITY).unwrap();
        assert_eq!(scene.find_by_name("ship"), Some(a));
        assert_eq!(scene.find_by_name("missing"), None);
        scene.set_alias("player", a).unwrap();
        assert_eq!(scene.alias("player"), Some(a));
    }

    #[test]
    fn test_depth_first_order() {
        let mut scene = Scene::new();
        let root = scene.root();
        let a = scene.create_node(root, "a", Transform::IDENTITY).unwrap();
        let a1 = scene.create_node(a, "a1", Transform::IDENTITY).unwrap();
        let b = scene.create_node(root, "b", Transform::IDENTITY).unwrap();
        assert_eq!(scene.depth_first(root), vec![root, a, a1, b]);
    }

    #[test]
    fn test_rotation_composes_into_children() {
        let mut scene = Scene::new();
        let spun = Transform::from_position_rotation(Vec3::zeros(), Quat::from_axis_angle(&Vec3::y_axis(), std::f32::consts::FRAC_PI_2));
        let a = scene.create_node(scene.root(), "a", spun).unwrap();
        let b = scene.create_node(a, "b", translate(1.0, 0.0, 0.0)).unwrap();
        scene.refresh_transforms();
        let p = scene.global_transform(b).unwrap().position;
        assert_relative_eq!(p, Vec3::new(0.0, 0.0, -1.0), epsilon = 1e-6);
    }

    #[test]
    fn test_self_removal_shuts_down_siblings() {
        let mut gpu = HeadlessGpu::new();
        let mut world = World::new(&EngineConfig::default());
        let root = world.scene.root();
        let node = mesh_node(&mut world, root, "doomed", "mesh:cube");
        let shutdowns = Rc::new(Cell::new(0));
        world
            .scene
            .attach_component(node, Box::new(SelfRemover { shutdowns: shutdowns.clone() }))
            .unwrap();

        let (scene, mut services) = world.split(&mut gpu);
        assert_eq!(scene.initialize_components(&mut services), 2);
        assert_eq!(gpu.mesh_count(), 1);

        let (scene, mut services) = world.split(&mut gpu);
        scene.update(&mut services);
        assert!(!world.scene.contains(node));
        assert_eq!(shutdowns.get(), 1);
        assert!(!world.resources.meshes.contains(StringId::new("mesh:cube")));
        assert_eq!(gpu.mesh_count(), 0);
    }

    #[test]
    fn test_hidden_component_skips_draw() {
        let mut gpu = HeadlessGpu::new();
        let mut world = World::new(&EngineConfig::default());
        let root = world.scene.root();
        let node = mesh_node(&mut world, root, "cube", "mesh:cube");
        let (scene, mut services) = world.split(&mut gpu);
        scene.initialize_components(&mut services);

        let mut queues = DrawQueues::new();
        assert_eq!(world.collect(&mut queues, 1.0), 1);
        assert_eq!(queues.meshes.len(), 1);

        queues.clear();
        world.scene.node_mut(node).unwrap().components_mut()[0].visible = false;
        assert_eq!(world.collect(&mut queues, 1.0), 0);
        assert!(queues.meshes.is_empty());
    }

    #[test]
    fn test_remove_node_releases_subtree_resources() {
        let mut gpu = HeadlessGpu::new();
        let mut world = World::new(&EngineConfig::default());
        let root = world.scene.root();
        let parent = mesh_node(&mut world, root, "parent", "mesh:cube");
        let child = mesh_node(&mut world, parent, "child", "mesh:quad");
        let (scene, mut services) = world.split(&mut gpu);
        scene.initialize_components(&mut services);
        assert_eq!(gpu.mesh_count(), 2);

        let (scene, mut services) = world.split(&mut gpu);
        scene.remove_node(parent, &mut services).unwrap();
        assert!(!world.scene.contains(parent));
        assert!(!world.scene.contains(child));
        assert!(!world.resources.meshes.contains(StringId::new("mesh:cube")));
        assert!(!world.resources.meshes.contains(StringId::new("mesh:quad")));
        assert_eq!(gpu.mesh_count(), 0);
        assert!(world.scene.node(root).unwrap().children().is_empty());
    }

    #[test]
    fn test_failed_initialize_detaches_only_that_component() {
        let mut gpu = HeadlessGpu::new();
        let mut world = World::new(&EngineConfig::default());
        let root = world.scene.root();
        let node = mesh_node(&mut world, root, "mixed", "mesh:dodecahedron");
        world
            .scene
            .attach_component(node, Box::new(Mesh::new("mesh:cube", "material:default")))
            .unwrap();

        let (scene, mut services) = world.split(&mut gpu);
        assert_eq!(scene.initialize_components(&mut services), 1);

        let components = world.scene.node(node).unwrap().components();
        assert_eq!(components.len(), 1);
        assert!(components[0].is_initialized());
        let mesh = components[0].component().downcast_ref::<Mesh>().unwrap();
        assert!(mesh.is_loaded());
        assert_eq!(gpu.mesh_count(), 1);
    }
}
