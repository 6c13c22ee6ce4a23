//! Ember demo application
//!
//! Loads `scenes/demo.ron`: a floor, a walking character, a spinning model,
//! a falling crate and two lamps. WASD walks, Space jumps, right-drag turns
//! the camera, Tab toggles bounding boxes, F5 reloads shaders, Escape quits.

use ember_engine::components::AabbGizmo;
use ember_engine::config::{Config, EngineConfig};
use ember_engine::foundation::logging;
use ember_engine::foundation::math::{utils, Quat, Unit, Vec3};
use ember_engine::scene::NodeId;
use ember_engine::{AppError, Application, Engine, EngineContext};
use std::path::PathBuf;

const DEFAULT_CONFIG: &str = "ember_app/ember.toml";

#[derive(Default)]
struct DemoApp {
    camera: Option<NodeId>,
    show_bounds: bool,
}

impl DemoApp {
    /// True on the tick a bool action went active
    fn just_pressed(ctx: &EngineContext, key: &str) -> bool {
        let now = ctx.clock().now();
        ctx.world
            .input
            .actions
            .action(key)
            .is_ok_and(|action| action.value().is_active() && action.started_at() == Some(now))
    }

    fn set_bounds_visible(ctx: &mut EngineContext, visible: bool) {
        let scene = &mut ctx.world.scene;
        for id in scene.depth_first(scene.root()) {
            let Some(node) = scene.node_mut(id) else {
                continue;
            };
            for slot in node.components_mut() {
                if slot.component().downcast_ref::<AabbGizmo>().is_some() {
                    slot.visible = visible;
                }
            }
        }
    }

    fn turn_camera(&self, ctx: &mut EngineContext) -> Result<(), AppError> {
        let Some(camera) = self.camera else {
            return Ok(());
        };
        let look = ctx
            .world
            .input
            .actions
            .axis2d("player/look")
            .map_err(|e| AppError::Config(e.to_string()))?;
        if look.x == 0.0 {
            return Ok(());
        }
        let scene = &mut ctx.world.scene;
        if let Some(mut local) = scene.local_transform(camera) {
            let yaw = Quat::from_axis_angle(&Unit::new_normalize(Vec3::y()), utils::deg_to_rad(-look.x));
            local.position = yaw * local.position;
            local.rotation = yaw * local.rotation;
            scene
                .set_local_transform(camera, local)
                .map_err(|e| AppError::Custom(e.to_string()))?;
        }
        Ok(())
    }
}

impl Application for DemoApp {
    fn initialize(&mut self, ctx: &mut EngineContext) -> Result<(), AppError> {
        let actions_path = ctx.world.resources.asset_config().resolve("input/actions.ron");
        let actions = std::fs::read_to_string(&actions_path)
            .map_err(|e| AppError::Config(format!("{}: {}", actions_path.display(), e)))?;
        ctx.load_actions(&actions)?;

        ctx.load_scene("scenes/demo.ron")?;
        self.camera = ctx.world.scene.find_by_name("camera");
        self.show_bounds = true;
        log::info!(
            "Demo ready: {} nodes, {} meshes resident",
            ctx.world.scene.node_count(),
            ctx.world.resources.meshes.len()
        );
        Ok(())
    }

    fn update(&mut self, ctx: &mut EngineContext, _delta_time: f32) -> Result<(), AppError> {
        if ctx.world.input.actions.bool("debug/quit").unwrap_or(false) {
            ctx.quit();
            return Ok(());
        }

        if Self::just_pressed(ctx, "debug/reload_shaders") {
            match ctx.renderer.reload_shaders() {
                Ok(failed) if failed.is_empty() => log::info!("Shaders reloaded"),
                Ok(failed) => log::warn!("Shaders failed to reload: {:?}", failed),
                Err(e) => log::error!("Shader reload: {}", e),
            }
        }

        if Self::just_pressed(ctx, "debug/toggle_bounds") {
            self.show_bounds = !self.show_bounds;
            Self::set_bounds_visible(ctx, self.show_bounds);
        }

        self.turn_camera(ctx)
    }

    fn cleanup(&mut self, ctx: &mut EngineContext) {
        let (meshes, textures, materials) = ctx.renderer.resource_counts();
        log::info!(
            "Shutting down with {} meshes, {} textures, {} materials on the GPU",
            meshes,
            textures,
            materials
        );
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG), PathBuf::from);
    let config = EngineConfig::load_or_default(&config_path)?;
    logging::init(config.log_level.as_deref().unwrap_or("info"));
    log::info!("Using config {}", config_path.display());

    let mut app = DemoApp::default();
    Engine::run(config, &mut app)?;
    Ok(())
}
