//! Main loop and application context

use crate::application::{AppError, Application};
use crate::config::{ConfigError, EngineConfig};
use crate::foundation::time::FrameClock;
use crate::input::InputError;
use crate::render::{DrawQueues, FrameOutcome, RenderError, Renderer};
use crate::scene::SceneError;
use crate::window::{Window, WindowError};
use crate::world::World;
use thiserror::Error;

/// Longest frame delta handed to gameplay and physics
const MAX_FRAME_DELTA: f32 = 0.25;

/// Engine errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// Window or GLFW failure
    #[error("Window: {0}")]
    Window(#[from] WindowError),

    /// Renderer failure
    #[error("Renderer: {0}")]
    Render(#[from] RenderError),

    /// Configuration failure
    #[error("Config: {0}")]
    Config(#[from] ConfigError),

    /// Scene failed to load
    #[error("Scene: {0}")]
    Scene(#[from] SceneError),

    /// Input action setup failed
    #[error("Input: {0}")]
    Input(#[from] InputError),

    /// The application returned an error
    #[error("Application: {0}")]
    Application(String),
}

/// Everything the application can reach
///
/// Fields drop in declaration order: the world (scene, resources, physics,
/// input, registry) goes before the renderer, and the renderer before the
/// window its surface belongs to.
pub struct EngineContext {
    /// Scene and its services
    pub world: World,
    /// Draw requests collected this frame
    pub queues: DrawQueues,
    /// Vulkan renderer
    pub renderer: Renderer,
    /// GLFW window
    pub window: Window,
    clock: FrameClock,
    running: bool,
    config: EngineConfig,
}

impl EngineContext {
    /// Open the window, bring up the renderer and create an empty world
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        log::info!("Initializing engine...");
        let window = Window::new(&config.window.title, config.window.width, config.window.height)?;
        let renderer = Renderer::new(&window, &config.renderer, &config.window.title)?;
        let world = World::new(&config);
        Ok(Self {
            world,
            queues: DrawQueues::new(),
            renderer,
            window,
            clock: FrameClock::new(MAX_FRAME_DELTA),
            running: true,
            config,
        })
    }

    /// Load a scene file into the world
    pub fn load_scene(&mut self, path: &str) -> Result<(), EngineError> {
        self.world.load_scene(path, &mut self.renderer)?;
        Ok(())
    }

    /// Load input action sets from RON text
    pub fn load_actions(&mut self, text: &str) -> Result<(), EngineError> {
        self.world.input.actions.load_ron(text)?;
        Ok(())
    }

    /// Ask the loop to stop after this frame
    pub fn quit(&mut self) {
        log::info!("Engine shutdown requested");
        self.running = false;
    }

    /// Whether the loop keeps going
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Frame timing
    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    /// Configuration the engine started with
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn poll(&mut self) {
        self.world.input.state.begin_tick();
        let events = self.window.poll_events(&mut self.world.input.state);
        if let Some((width, height)) = events.resized {
            self.renderer.resize(width, height);
        }
        if events.focus_lost {
            self.world.input.state.release_all(self.clock.now());
        }
        if events.close_requested || self.window.should_close() {
            self.running = false;
        }
    }

    fn frame<A: Application>(&mut self, app: &mut A) -> Result<(), EngineError> {
        self.poll();
        let delta = self.clock.tick();
        self.world.begin_tick(self.clock.now());

        app.update(self, delta)
            .map_err(|e| EngineError::Application(format!("update: {e}")))?;

        self.world.update(&mut self.renderer, delta);
        self.world.collect(&mut self.queues, self.renderer.aspect_ratio());
        if self.renderer.draw_frame(&mut self.queues)? == FrameOutcome::Skipped {
            log::trace!("Frame {} skipped", self.clock.frame_count());
        }
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), EngineError> {
        self.renderer.wait_idle()?;
        self.world.shutdown(&mut self.renderer);
        self.renderer.shutdown()?;
        Ok(())
    }
}

/// Entry point driving an [`Application`]
pub struct Engine;

impl Engine {
    /// Run `app` until the window closes or the app quits
    ///
    /// Per frame: poll events, tick input, `app.update`, component updates,
    /// fixed-step physics, transform refresh, draw collection, then the
    /// renderer. GPU work is drained before anything is torn down, also when
    /// the loop ends in an error.
    pub fn run<A: Application>(config: EngineConfig, app: &mut A) -> Result<(), EngineError> {
        let mut ctx = EngineContext::new(config)?;

        app.initialize(&mut ctx)
            .map_err(|e| EngineError::Application(format!("initialize: {e}")))?;

        log::info!("Starting main loop...");
        let mut result = Ok(());
        while ctx.running {
            if let Err(e) = ctx.frame(app) {
                log::error!("Frame failed: {}", e);
                result = Err(e);
                break;
            }
        }

        if let Err(e) = ctx.renderer.wait_idle() {
            log::error!("Waiting for the GPU: {}", e);
        }
        app.cleanup(&mut ctx);
        ctx.shutdown()?;
        log::info!(
            "Engine shutdown complete after {} frames ({:.1} fps average)",
            ctx.clock.frame_count(),
            ctx.clock.average_fps()
        );
        result
    }
}

impl From<EngineError> for AppError {
    fn from(e: EngineError) -> Self {
        AppError::Engine(Box::new(e))
    }
}
