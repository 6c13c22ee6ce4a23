//! Input state and named actions
//!
//! The window layer feeds raw events into [`InputState`]; once per tick
//! [`InputActions::tick`] folds that state into action values that
//! components read by `"set/action"` key.

pub mod actions;
pub mod state;

pub use actions::{Action, ActionKind, ActionSet, ActionValue, Binding, InputActions};
pub use state::{ButtonTimes, InputState, KeyCode, MouseButton};

use thiserror::Error;

/// Input lookup and configuration errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
    /// Key is not of the form `set/action`
    #[error("Invalid action key {0:?}, expected \"set/action\"")]
    InvalidKey(String),

    /// No set with that name
    #[error("Unknown action set {0}")]
    UnknownSet(String),

    /// Set exists but has no such action
    #[error("Unknown action {0}")]
    UnknownAction(String),

    /// A set with that name is already registered
    #[error("Action set {0} already registered")]
    DuplicateSet(String),

    /// Two actions in one set share a name
    #[error("Action {0} defined twice")]
    DuplicateAction(String),

    /// Action read as the wrong value type
    #[error("Action {key} is {actual:?}, read as {expected:?}")]
    WrongKind {
        /// `set/action` key
        key: String,
        /// Kind the caller asked for
        expected: ActionKind,
        /// Kind the action has
        actual: ActionKind,
    },

    /// Action set file failed to parse
    #[error("Failed to parse action sets: {0}")]
    Parse(String),
}

/// Result type for input operations
pub type InputResult<T> = Result<T, InputError>;

/// Raw state plus actions, owned by the engine context
#[derive(Debug, Default)]
pub struct Input {
    /// Raw device state, written by the window layer
    pub state: InputState,
    /// Named actions, re-evaluated every tick
    pub actions: InputActions,
}

impl Input {
    /// Empty input with no action sets
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold the current raw state into action values
    pub fn tick(&mut self, now: f64) {
        self.actions.tick(&self.state, now);
    }
}
