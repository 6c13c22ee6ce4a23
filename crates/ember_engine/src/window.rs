//! Window management using GLFW
//!
//! Provides window creation, Vulkan surface creation and translation of GLFW
//! events into [`InputState`].

use crate::input::{InputState, KeyCode, MouseButton};
use ash::vk;
use thiserror::Error;

/// Window management errors
#[derive(Error, Debug)]
pub enum WindowError {
    /// GLFW could not be initialized
    #[error("GLFW initialization failed: {0}")]
    InitializationFailed(String),

    /// GLFW refused to create the window
    #[error("Window creation failed")]
    CreationFailed,

    /// GLFW has no Vulkan loader or the surface could not be created
    #[error("GLFW Vulkan error: {0}")]
    Vulkan(String),
}

/// Result type for window operations
pub type WindowResult<T> = Result<T, WindowError>;

/// Events the engine reacts to beyond input
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WindowEvents {
    /// New framebuffer size, if it changed
    pub resized: Option<(u32, u32)>,
    /// Close was requested
    pub close_requested: bool,
    /// Focus was lost
    pub focus_lost: bool,
}

/// GLFW window wrapper
pub struct Window {
    glfw: glfw::Glfw,
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, glfw::WindowEvent)>,
}

impl Window {
    /// Create a resizable window with no client API, ready for a Vulkan surface
    pub fn new(title: &str, width: u32, height: u32) -> WindowResult<Self> {
        let mut glfw = glfw::init(glfw::log_errors)
            .map_err(|e| WindowError::InitializationFailed(format!("{e:?}")))?;

        if !glfw.vulkan_supported() {
            return Err(WindowError::Vulkan("no Vulkan loader found".to_string()));
        }

        glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::NoApi));
        glfw.window_hint(glfw::WindowHint::Resizable(true));

        let (mut window, events) = glfw
            .create_window(width, height, title, glfw::WindowMode::Windowed)
            .ok_or(WindowError::CreationFailed)?;

        window.set_key_polling(true);
        window.set_mouse_button_polling(true);
        window.set_cursor_pos_polling(true);
        window.set_scroll_polling(true);
        window.set_close_polling(true);
        window.set_focus_polling(true);
        window.set_framebuffer_size_polling(true);

        log::info!("Created window {:?} ({}x{})", title, width, height);
        Ok(Self {
            glfw,
            window,
            events,
        })
    }

    /// Whether close was requested
    pub fn should_close(&self) -> bool {
        self.window.should_close()
    }

    /// Request or cancel closing
    pub fn set_should_close(&mut self, should_close: bool) {
        self.window.set_should_close(should_close);
    }

    /// Pump GLFW and feed the pending events into `input`
    pub fn poll_events(&mut self, input: &mut InputState) -> WindowEvents {
        self.glfw.poll_events();
        let mut out = WindowEvents::default();
        for (time, event) in glfw::flush_messages(&self.events) {
            match event {
                glfw::WindowEvent::Key(key, _, action, _) => {
                    let Some(key) = map_key(key) else { continue };
                    match action {
                        glfw::Action::Press => input.press_key(key, time),
                        glfw::Action::Release => input.release_key(key, time),
                        glfw::Action::Repeat => {}
                    }
                }
                glfw::WindowEvent::MouseButton(button, action, _) => {
                    let Some(button) = map_mouse_button(button) else { continue };
                    match action {
                        glfw::Action::Press => input.press_button(button, time),
                        glfw::Action::Release => input.release_button(button, time),
                        glfw::Action::Repeat => {}
                    }
                }
                glfw::WindowEvent::CursorPos(x, y) => input.move_cursor(x as f32, y as f32),
                glfw::WindowEvent::Scroll(dx, dy) => input.add_scroll(dx as f32, dy as f32),
                glfw::WindowEvent::FramebufferSize(w, h) => {
                    out.resized = Some((w.max(0) as u32, h.max(0) as u32));
                }
                glfw::WindowEvent::Focus(false) => {
                    input.release_all(time);
                    out.focus_lost = true;
                }
                glfw::WindowEvent::Close => out.close_requested = true,
                _ => {}
            }
        }
        out
    }

    /// Framebuffer size in pixels
    pub fn framebuffer_size(&self) -> (u32, u32) {
        let (width, height) = self.window.get_framebuffer_size();
        (width.max(0) as u32, height.max(0) as u32)
    }

    /// Seconds since GLFW was initialized, the time base of input timestamps
    pub fn time(&self) -> f64 {
        self.glfw.get_time()
    }

    /// Vulkan instance extensions GLFW needs for surface creation
    pub fn required_instance_extensions(&self) -> WindowResult<Vec<String>> {
        self.glfw
            .get_required_instance_extensions()
            .ok_or_else(|| WindowError::Vulkan("no required instance extensions reported".to_string()))
    }

    /// Create a surface for this window on `instance`
    pub fn create_vulkan_surface(&self, instance: vk::Instance) -> WindowResult<vk::SurfaceKHR> {
        let mut surface = vk::SurfaceKHR::null();
        let result = self
            .window
            .create_window_surface(instance, std::ptr::null(), &mut surface);
        if result == vk::Result::SUCCESS {
            Ok(surface)
        } else {
            Err(WindowError::Vulkan(format!("surface creation failed: {result:?}")))
        }
    }
}

fn map_key(key: glfw::Key) -> Option<KeyCode> {
    use glfw::Key as G;
    Some(match key {
        G::A => KeyCode::A,
        G::B => KeyCode::B,
        G::C => KeyCode::C,
        G::D => KeyCode::D,
        G::E => KeyCode::E,
        G::F => KeyCode::F,
        G::G => KeyCode::G,
        G::H => KeyCode::H,
        G::I => KeyCode::I,
        G::J => KeyCode::J,
        G::K => KeyCode::K,
        G::L => KeyCode::L,
        G::M => KeyCode::M,
        G::N => KeyCode::N,
        G::O => KeyCode::O,
        G::P => KeyCode::P,
        G::Q => KeyCode::Q,
        G::R => KeyCode::R,
        G::S => KeyCode::S,
        G::T => KeyCode::T,
        G::U => KeyCode::U,
        G::V => KeyCode::V,
        G::W => KeyCode::W,
        G::X => KeyCode::X,
        G::Y => KeyCode::Y,
        G::Z => KeyCode::Z,
        G::Num0 => KeyCode::Key0,
        G::Num1 => KeyCode::Key1,
        G::Num2 => KeyCode::Key2,
        G::Num3 => KeyCode::Key3,
        G::Num4 => KeyCode::Key4,
        G::Num5 => KeyCode::Key5,
        G::Num6 => KeyCode::Key6,
        G::Num7 => KeyCode::Key7,
        G::Num8 => KeyCode::Key8,
        G::Num9 => KeyCode::Key9,
        G::F1 => KeyCode::F1,
        G::F2 => KeyCode::F2,
        G::F3 => KeyCode::F3,
        G::F4 => KeyCode::F4,
        G::F5 => KeyCode::F5,
        G::F6 => KeyCode::F6,
        G::F7 => KeyCode::F7,
        G::F8 => KeyCode::F8,
        G::F9 => KeyCode::F9,
        G::F10 => KeyCode::F10,
        G::F11 => KeyCode::F11,
        G::F12 => KeyCode::F12,
        G::Space => KeyCode::Space,
        G::Enter => KeyCode::Enter,
        G::Escape => KeyCode::Escape,
        G::Tab => KeyCode::Tab,
        G::Backspace => KeyCode::Backspace,
        G::LeftShift => KeyCode::LeftShift,
        G::RightShift => KeyCode::RightShift,
        G::LeftControl => KeyCode::LeftControl,
        G::RightControl => KeyCode::RightControl,
        G::LeftAlt => KeyCode::LeftAlt,
        G::RightAlt => KeyCode::RightAlt,
        G::Up => KeyCode::Up,
        G::Down => KeyCode::Down,
        G::Left => KeyCode::Left,
        G::Right => KeyCode::Right,
        _ => return None,
    })
}

fn map_mouse_button(button: glfw::MouseButton) -> Option<MouseButton> {
    match button {
        glfw::MouseButton::Button1 => Some(MouseButton::Left),
        glfw::MouseButton::Button2 => Some(MouseButton::Right),
        glfw::MouseButton::Button3 => Some(MouseButton::Middle),
        _ => None,
    }
}
