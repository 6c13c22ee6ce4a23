//! CPU side of the frame loop without a GPU
//!
//! Loads the demo scene through a [`World`] backed by [`HeadlessGpu`] and
//! drives update, refresh and draw collection the way the engine does.

use approx::assert_relative_eq;
use ember_engine::assets::{LoadStatus, Resources};
use ember_engine::components::{Mesh, Model, RigidBody};
use ember_engine::config::{AssetConfig, EngineConfig};
use ember_engine::foundation::logging;
use ember_engine::foundation::math::{Transform, Vec3};
use ember_engine::foundation::string_id::StringId;
use ember_engine::input::KeyCode;
use ember_engine::render::{DrawQueues, HeadlessGpu};
use ember_engine::World;
use std::path::PathBuf;

const STEP: f32 = 1.0 / 60.0;

fn demo_config() -> EngineConfig {
    let assets = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../ember_app/assets");
    EngineConfig {
        assets: AssetConfig {
            search_paths: vec![assets],
        },
        ..EngineConfig::default()
    }
}

fn demo_world(gpu: &mut HeadlessGpu) -> World {
    logging::init_for_tests();
    let mut world = World::new(&demo_config());
    world.load_scene("scenes/demo.ron", gpu).unwrap();
    world
}

/// Advance `frames` ticks of [`STEP`] seconds
fn run_frames(world: &mut World, gpu: &mut HeadlessGpu, frames: u32) {
    for frame in 0..frames {
        world.begin_tick(f64::from(frame) * f64::from(STEP));
        world.update(gpu, STEP);
    }
}

#[test]
fn test_cube_reference_counting() {
    let mut gpu = HeadlessGpu::new();
    let mut resources = Resources::default();
    let cube = StringId::new("mesh:cube");

    let first = resources.load_mesh("mesh:cube", &mut gpu).unwrap();
    assert_eq!(resources.meshes.ref_count(cube), Some(1));
    let second = resources.load_mesh("mesh:cube", &mut gpu).unwrap();
    assert_eq!(first, second);
    assert_eq!(resources.meshes.ref_count(cube), Some(2));
    assert_eq!(gpu.mesh_count(), 1);

    assert!(resources.release_mesh(cube, &mut gpu));
    assert_eq!(resources.meshes.status(cube), LoadStatus::Loaded);
    assert!(resources.release_mesh(cube, &mut gpu));
    assert_eq!(resources.meshes.status(cube), LoadStatus::Unloaded);
    assert!(resources.meshes.get(first).is_none());
    assert_eq!(gpu.mesh_count(), 0);

    assert!(!resources.release_mesh(cube, &mut gpu));
}

#[test]
fn test_demo_scene_loads() {
    let mut gpu = HeadlessGpu::new();
    let world = demo_world(&mut gpu);
    let scene = &world.scene;

    for name in ["camera", "floor", "player", "stack", "falling_crate", "lamp", "lamp_blue"] {
        assert!(scene.find_by_name(name).is_some(), "missing node {name}");
    }
    assert_eq!(scene.alias("player"), scene.find_by_name("player"));

    let stack = scene.find_by_name("stack").unwrap();
    assert_eq!(scene.find_component::<Model>(stack).unwrap().spawned(), 3);
    assert_eq!(scene.node(stack).unwrap().children().len(), 3);
    let top = scene.find_by_name("top").unwrap();
    assert!(scene.find_component::<Mesh>(top).unwrap().is_loaded());

    // player body, three stack parts and the crate
    assert_eq!(world.resources.meshes.ref_count(StringId::new("mesh:cube")), Some(5));
    // both lamps came from one cached file, released once the load finished
    assert!(world.resources.scenes.is_empty());
}

#[test]
fn test_included_scene_takes_overrides() {
    let mut gpu = HeadlessGpu::new();
    let world = demo_world(&mut gpu);
    let scene = &world.scene;

    let lamp = scene.find_by_name("lamp").unwrap();
    let blue = scene.find_by_name("lamp_blue").unwrap();
    assert_eq!(scene.local_transform(lamp).unwrap().position, Vec3::new(0.0, 4.0, 0.0));
    assert_eq!(scene.local_transform(blue).unwrap().position, Vec3::new(-4.0, 3.0, -3.0));
    assert_eq!(
        scene.node(lamp).unwrap().components().len(),
        scene.node(blue).unwrap().components().len()
    );
}

#[test]
fn test_draw_queue_lifecycle() {
    let mut gpu = HeadlessGpu::new();
    let mut world = demo_world(&mut gpu);
    run_frames(&mut world, &mut gpu, 1);

    let mut queues = DrawQueues::new();
    world.collect(&mut queues, 16.0 / 9.0);
    assert!(queues.camera().is_some());
    assert_eq!(queues.lights().len(), 2);
    assert_eq!(queues.meshes.len(), 6);
    assert_eq!(queues.billboards.len(), 2);
    assert!(!queues.aabbs.is_empty());

    let submitted = queues.consume(|q| q.total_len());
    assert!(submitted > 0);
    assert!(queues.is_empty());
    assert!(queues.camera().is_none());
    assert!(queues.lights().is_empty());
}

#[test]
fn test_invisible_node_hides_subtree() {
    let mut gpu = HeadlessGpu::new();
    let mut world = demo_world(&mut gpu);
    let mut queues = DrawQueues::new();

    world.collect(&mut queues, 1.0);
    let all_meshes = queues.meshes.len();
    queues.clear();

    // the stack node itself draws nothing, its three parts do
    let stack = world.scene.find_by_name("stack").unwrap();
    world.scene.set_visible(stack, false).unwrap();
    world.collect(&mut queues, 1.0);
    assert_eq!(queues.meshes.len(), all_meshes - 3);
    queues.clear();

    let root = world.scene.root();
    world.scene.set_visible(root, false).unwrap();
    assert_eq!(world.collect(&mut queues, 1.0), 0);
    assert!(queues.is_empty());
    assert!(queues.camera().is_none());
}

#[test]
fn test_transform_chain_after_refresh() {
    let mut gpu = HeadlessGpu::new();
    let mut world = demo_world(&mut gpu);

    let player = world.scene.find_by_name("player").unwrap();
    let body = world.scene.find_by_name("body").unwrap();
    let moved = Transform::from_position(Vec3::new(10.0, 0.0, 0.0));
    world.scene.set_local_transform(player, moved).unwrap();

    let stale = world.scene.global_transform(body).unwrap();
    assert_relative_eq!(stale.position.x, -3.0, epsilon = 1e-5);

    world.scene.refresh_transforms();
    let root = world.scene.global_transform(world.scene.root()).unwrap();
    let expected = root * moved * world.scene.local_transform(body).unwrap();
    let global = world.scene.global_transform(body).unwrap();
    assert_relative_eq!(global.position, expected.position, epsilon = 1e-5);
    assert_relative_eq!(global.scale, expected.scale, epsilon = 1e-6);
}

#[test]
fn test_rigid_body_falls_onto_floor() {
    let mut gpu = HeadlessGpu::new();
    let mut world = demo_world(&mut gpu);
    let crate_node = world.scene.find_by_name("falling_crate").unwrap();
    assert!(world.scene.find_component::<RigidBody>(crate_node).is_some());
    let start = world.scene.global_transform(crate_node).unwrap().position.y;

    run_frames(&mut world, &mut gpu, 60);
    let after_one_second = world.scene.global_transform(crate_node).unwrap().position.y;
    assert!(after_one_second < start - 1.0);

    run_frames(&mut world, &mut gpu, 240);
    let resting = world.scene.global_transform(crate_node).unwrap().position.y;
    assert!(resting > 0.0);
    assert!(resting < 1.5);
}

#[test]
fn test_character_walks_forward() {
    let mut gpu = HeadlessGpu::new();
    let mut world = demo_world(&mut gpu);
    let actions = std::fs::read_to_string(world.resources.asset_config().resolve("input/actions.ron")).unwrap();
    world.input.actions.load_ron(&actions).unwrap();

    let player = world.scene.alias("player").unwrap();
    let start = world.scene.global_transform(player).unwrap().position;

    world.input.state.press_key(KeyCode::W, 0.0);
    run_frames(&mut world, &mut gpu, 30);
    let walked = world.scene.global_transform(player).unwrap().position;
    assert!(walked.z < start.z - 0.5);
    assert_relative_eq!(walked.x, start.x, epsilon = 1e-3);
}

#[test]
fn test_shutdown_releases_everything() {
    let mut gpu = HeadlessGpu::new();
    let mut world = demo_world(&mut gpu);
    run_frames(&mut world, &mut gpu, 5);
    assert!(gpu.mesh_count() > 0);
    assert!(gpu.material_count() > 0);

    world.shutdown(&mut gpu);
    assert!(world.resources.meshes.is_empty());
    assert!(world.resources.materials.is_empty());
    assert!(world.resources.textures.is_empty());
    assert_eq!(gpu.mesh_count(), 0);
    assert_eq!(gpu.texture_count(), 0);
    assert_eq!(gpu.material_count(), 0);
}
