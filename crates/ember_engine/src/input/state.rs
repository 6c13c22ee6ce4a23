//! Raw device state
//!
//! [`InputState`] holds what the window layer reported: which keys and mouse
//! buttons are down, when they last changed, and how far the mouse moved
//! since the last tick. It knows nothing about actions.

use crate::foundation::math::Vec2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Keyboard keys the engine maps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum KeyCode {
    A, B, C, D, E, F, G, H, I, J, K, L, M,
    N, O, P, Q, R, S, T, U, V, W, X, Y, Z,
    Key0, Key1, Key2, Key3, Key4, Key5, Key6, Key7, Key8, Key9,
    F1, F2, F3, F4, F5, F6, F7, F8, F9, F10, F11, F12,
    Space,
    Enter,
    Escape,
    Tab,
    Backspace,
    LeftShift,
    RightShift,
    LeftControl,
    RightControl,
    LeftAlt,
    RightAlt,
    Up,
    Down,
    Left,
    Right,
}

/// Mouse buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseButton {
    /// Primary button
    Left,
    /// Secondary button
    Right,
    /// Wheel button
    Middle,
}

/// Down flag plus the times of the last press and release, in seconds
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ButtonTimes {
    /// Currently held
    pub down: bool,
    /// Time of the last press
    pub pressed_at: Option<f64>,
    /// Time of the last release
    pub released_at: Option<f64>,
}

impl ButtonTimes {
    fn press(&mut self, time: f64) {
        if !self.down {
            self.down = true;
            self.pressed_at = Some(time);
        }
    }

    fn release(&mut self, time: f64) {
        if self.down {
            self.down = false;
            self.released_at = Some(time);
        }
    }
}

/// Keyboard and mouse state for the current tick
#[derive(Debug, Clone, Default)]
pub struct InputState {
    keys: HashMap<KeyCode, ButtonTimes>,
    buttons: HashMap<MouseButton, ButtonTimes>,
    mouse_position: Option<Vec2>,
    mouse_delta: Vec2,
    scroll_delta: Vec2,
}

impl InputState {
    /// Empty state: nothing held, no motion
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear per-tick motion; call before feeding the tick's events
    pub fn begin_tick(&mut self) {
        self.mouse_delta = Vec2::zeros();
        self.scroll_delta = Vec2::zeros();
    }

    /// Record a key press at `time`; repeats while held are ignored
    pub fn press_key(&mut self, key: KeyCode, time: f64) {
        self.keys.entry(key).or_default().press(time);
    }

    /// Record a key release at `time`
    pub fn release_key(&mut self, key: KeyCode, time: f64) {
        self.keys.entry(key).or_default().release(time);
    }

    /// Record a mouse button press at `time`
    pub fn press_button(&mut self, button: MouseButton, time: f64) {
        self.buttons.entry(button).or_default().press(time);
    }

    /// Record a mouse button release at `time`
    pub fn release_button(&mut self, button: MouseButton, time: f64) {
        self.buttons.entry(button).or_default().release(time);
    }

    /// Record an absolute cursor position; the first sample produces no delta
    pub fn move_cursor(&mut self, x: f32, y: f32) {
        let position = Vec2::new(x, y);
        if let Some(previous) = self.mouse_position {
            self.mouse_delta += position - previous;
        }
        self.mouse_position = Some(position);
    }

    /// Add relative mouse motion directly
    pub fn add_mouse_delta(&mut self, dx: f32, dy: f32) {
        self.mouse_delta += Vec2::new(dx, dy);
    }

    /// Add scroll wheel motion
    pub fn add_scroll(&mut self, dx: f32, dy: f32) {
        self.scroll_delta += Vec2::new(dx, dy);
    }

    /// Release everything, e.g. when the window loses focus
    pub fn release_all(&mut self, time: f64) {
        for times in self.keys.values_mut() {
            times.release(time);
        }
        for times in self.buttons.values_mut() {
            times.release(time);
        }
    }

    /// Whether `key` is held
    pub fn key_down(&self, key: KeyCode) -> bool {
        self.keys.get(&key).is_some_and(|t| t.down)
    }

    /// Press/release times of `key`
    pub fn key_times(&self, key: KeyCode) -> ButtonTimes {
        self.keys.get(&key).copied().unwrap_or_default()
    }

    /// Whether `button` is held
    pub fn button_down(&self, button: MouseButton) -> bool {
        self.buttons.get(&button).is_some_and(|t| t.down)
    }

    /// Press/release times of `button`
    pub fn button_times(&self, button: MouseButton) -> ButtonTimes {
        self.buttons.get(&button).copied().unwrap_or_default()
    }

    /// Cursor motion accumulated this tick
    pub fn mouse_delta(&self) -> Vec2 {
        self.mouse_delta
    }

    /// Scroll motion accumulated this tick
    pub fn scroll_delta(&self) -> Vec2 {
        self.scroll_delta
    }

    /// Last cursor position, if any was reported
    pub fn mouse_position(&self) -> Option<Vec2> {
        self.mouse_position
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_press_keeps_first_timestamp() {
        let mut state = InputState::new();
        state.press_key(KeyCode::W, 1.0);
        state.press_key(KeyCode::W, 1.5);
        assert!(state.key_down(KeyCode::W));
        assert_eq!(state.key_times(KeyCode::W).pressed_at, Some(1.0));

        state.release_key(KeyCode::W, 2.0);
        assert!(!state.key_down(KeyCode::W));
        assert_eq!(state.key_times(KeyCode::W).released_at, Some(2.0));
    }

    #[test]
    fn test_first_cursor_sample_has_no_delta() {
        let mut state = InputState::new();
        state.move_cursor(100.0, 100.0);
        assert_eq!(state.mouse_delta(), Vec2::zeros());
        state.move_cursor(110.0, 95.0);
        assert_eq!(state.mouse_delta(), Vec2::new(10.0, -5.0));

        state.begin_tick();
        assert_eq!(state.mouse_delta(), Vec2::zeros());
    }

    #[test]
    fn test_release_all() {
        let mut state = InputState::new();
        state.press_key(KeyCode::A, 0.0);
        state.press_button(MouseButton::Left, 0.0);
        state.release_all(3.0);
        assert!(!state.key_down(KeyCode::A));
        assert!(!state.button_down(MouseButton::Left));
        assert_eq!(state.button_times(MouseButton::Left).released_at, Some(3.0));
    }
}
