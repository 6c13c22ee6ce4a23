//! Everything the frame loop simulates, minus the window and the GPU
//!
//! [`World`] owns the scene, resource caches, physics, input and component
//! registry. It takes the GPU as a [`GpuContext`] argument, so it runs the
//! same against the Vulkan renderer and against [`crate::render::HeadlessGpu`].

use crate::assets::Resources;
use crate::components::{ComponentRegistry, Services};
use crate::config::EngineConfig;
use crate::foundation::math::Vec3;
use crate::foundation::time::Stopwatch;
use crate::input::Input;
use crate::physics::{BasicBackend, FixedStepper, PhysicsBackend, PhysicsContext};
use crate::render::{DrawQueues, GpuContext};
use crate::scene::{NodeId, Scene, SceneLoader, SceneResult};

/// Scene plus the services its components use
///
/// Fields drop in declaration order: the scene first, then the caches its
/// components referenced, then physics and input.
pub struct World {
    /// Scene graph
    pub scene: Scene,
    /// Resource caches
    pub resources: Resources,
    /// Physics backend
    pub physics: Box<PhysicsContext>,
    stepper: FixedStepper,
    /// Input state and actions
    pub input: Input,
    /// Component factories
    pub registry: ComponentRegistry,
    delta: f32,
}

impl World {
    /// Empty world with the built-in physics backend and components
    pub fn new(config: &EngineConfig) -> Self {
        let mut physics = BasicBackend::default();
        physics.set_gravity(Vec3::from(config.physics.gravity));
        Self::with_backend(config, Box::new(physics))
    }

    /// Empty world over a caller-provided physics backend
    pub fn with_backend(config: &EngineConfig, physics: Box<PhysicsContext>) -> Self {
        log::info!("Physics backend: {}", physics.name());
        Self {
            scene: Scene::new(),
            resources: Resources::new(config.assets.clone()),
            physics,
            stepper: FixedStepper::from_config(&config.physics),
            input: Input::new(),
            registry: ComponentRegistry::with_builtin(),
            delta: 0.0,
        }
    }

    /// Scene and services split for a component pass
    pub fn split<'a>(&'a mut self, gpu: &'a mut GpuContext) -> (&'a mut Scene, Services<'a>) {
        (
            &mut self.scene,
            Services {
                resources: &mut self.resources,
                gpu,
                physics: self.physics.as_mut(),
                input: &self.input,
                delta: self.delta,
            },
        )
    }

    /// Load a scene file under the root and initialize its components
    pub fn load_scene(&mut self, path: &str, gpu: &mut GpuContext) -> SceneResult<NodeId> {
        let stopwatch = Stopwatch::start_new();
        let root = self.scene.root();
        let id = SceneLoader::new(&self.registry, &mut self.resources).load_file(&mut self.scene, root, path)?;
        self.scene.refresh_transforms();
        let (scene, mut services) = self.split(gpu);
        let initialized = scene.initialize_components(&mut services);
        log::info!(
            "Loaded {} in {:.1} ms ({} components initialized)",
            path,
            stopwatch.elapsed_millis(),
            initialized
        );
        Ok(id)
    }

    /// Fold raw input into action values for this tick
    pub fn begin_tick(&mut self, now: f64) {
        self.input.tick(now);
    }

    /// Run component updates, physics steps and the transform refresh
    ///
    /// Components attached since the last tick are initialized first.
    /// Returns the number of physics steps taken.
    pub fn update(&mut self, gpu: &mut GpuContext, delta: f32) -> u32 {
        self.delta = delta;
        let (scene, mut services) = self.split(gpu);
        scene.initialize_components(&mut services);
        scene.update(&mut services);
        let steps = self.stepper.advance(self.physics.as_mut(), delta);
        self.scene.refresh_transforms();
        steps
    }

    /// Collect draw requests from the scene; returns how many components drew
    pub fn collect(&self, queues: &mut DrawQueues, aspect_ratio: f32) -> usize {
        self.scene.draw(queues, &self.resources, aspect_ratio)
    }

    /// Fraction of a physics step left over, for interpolation
    pub fn physics_alpha(&self) -> f32 {
        self.stepper.alpha()
    }

    /// Shut every component down and drop all cached resources
    pub fn shutdown(&mut self, gpu: &mut GpuContext) {
        let (scene, mut services) = self.split(gpu);
        scene.shutdown_components(&mut services);
        self.resources.unload_all(gpu);
    }
}
