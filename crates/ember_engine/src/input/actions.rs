//! Named input actions
//!
//! An [`ActionSet`] groups [`Action`]s; each action aggregates one or more
//! [`Binding`]s into a typed [`ActionValue`] once per tick. Game code reads
//! actions through [`InputActions`] with a `"set/action"` key and sees only
//! the current tick's value plus the times the action last started and
//! stopped being active.

use super::state::{InputState, KeyCode, MouseButton};
use super::{InputError, InputResult};
use crate::foundation::math::Vec2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Value type an action produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    /// On/off
    Bool,
    /// Two axes, e.g. movement or look
    Axis2D,
    /// One axis
    Scalar,
}

/// Current value of an action
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActionValue {
    /// On/off value
    Bool(bool),
    /// Two-axis value
    Axis2D(Vec2),
    /// Single-axis value
    Scalar(f32),
}

impl ActionValue {
    /// Zero value of `kind`
    pub fn zero(kind: ActionKind) -> Self {
        match kind {
            ActionKind::Bool => Self::Bool(false),
            ActionKind::Axis2D => Self::Axis2D(Vec2::zeros()),
            ActionKind::Scalar => Self::Scalar(0.0),
        }
    }

    /// Kind of this value
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Bool(_) => ActionKind::Bool,
            Self::Axis2D(_) => ActionKind::Axis2D,
            Self::Scalar(_) => ActionKind::Scalar,
        }
    }

    /// Whether the value is non-zero
    pub fn is_active(&self) -> bool {
        match *self {
            Self::Bool(on) => on,
            Self::Axis2D(v) => v != Vec2::zeros(),
            Self::Scalar(s) => s != 0.0,
        }
    }

    fn from_raw(kind: ActionKind, raw: Vec2) -> Self {
        match kind {
            ActionKind::Bool => Self::Bool(raw != Vec2::zeros()),
            ActionKind::Axis2D => Self::Axis2D(raw),
            ActionKind::Scalar => Self::Scalar(raw.x),
        }
    }
}

/// A source of input contributing to an action
///
/// Every binding evaluates to a 2D contribution; scalar actions read its x
/// component and bool actions test it for non-zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Binding {
    /// 1 on x while the key is held
    Key(KeyCode),
    /// -1/+1 on x from a pair of keys
    KeyAxis {
        /// Key producing -1
        negative: KeyCode,
        /// Key producing +1
        positive: KeyCode,
    },
    /// Four keys as a 2D direction, y up
    KeyAxis2D {
        /// -x
        left: KeyCode,
        /// +x
        right: KeyCode,
        /// -y
        down: KeyCode,
        /// +y
        up: KeyCode,
    },
    /// Mouse motion this tick, multiplied by `scale`
    MouseDelta {
        /// Sensitivity
        scale: f32,
    },
    /// 1 on x while the button is held
    MouseButton(MouseButton),
    /// `binding` contributes only while `gate` is active
    Combination {
        /// Activation gate, e.g. a modifier key
        gate: Box<Binding>,
        /// Gated binding
        binding: Box<Binding>,
    },
}

impl Binding {
    /// Contribution of this binding for the current tick
    pub fn evaluate(&self, state: &InputState) -> Vec2 {
        let key = |k: KeyCode| if state.key_down(k) { 1.0 } else { 0.0 };
        match self {
            Self::Key(k) => Vec2::new(key(*k), 0.0),
            Self::KeyAxis { negative, positive } => Vec2::new(key(*positive) - key(*negative), 0.0),
            Self::KeyAxis2D {
                left,
                right,
                down,
                up,
            } => Vec2::new(key(*right) - key(*left), key(*up) - key(*down)),
            Self::MouseDelta { scale } => state.mouse_delta() * *scale,
            Self::MouseButton(b) => Vec2::new(if state.button_down(*b) { 1.0 } else { 0.0 }, 0.0),
            Self::Combination { gate, binding } => {
                if gate.evaluate(state) != Vec2::zeros() {
                    binding.evaluate(state)
                } else {
                    Vec2::zeros()
                }
            }
        }
    }
}

/// One named action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    /// Action name, unique within its set
    pub name: String,
    /// Value type
    pub kind: ActionKind,
    /// Sources summed into the value
    pub bindings: Vec<Binding>,
    #[serde(skip)]
    state: ActionTimes,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct ActionTimes {
    value: Option<ActionValue>,
    started_at: Option<f64>,
    stopped_at: Option<f64>,
}

impl Action {
    /// Action with no bindings
    pub fn new(name: impl Into<String>, kind: ActionKind) -> Self {
        Self {
            name: name.into(),
            kind,
            bindings: Vec::new(),
            state: ActionTimes::default(),
        }
    }

    /// Builder-style binding addition
    pub fn with_binding(mut self, binding: Binding) -> Self {
        self.bindings.push(binding);
        self
    }

    /// Value as of the last tick
    pub fn value(&self) -> ActionValue {
        self.state.value.unwrap_or_else(|| ActionValue::zero(self.kind))
    }

    /// When the action last became active
    pub fn started_at(&self) -> Option<f64> {
        self.state.started_at
    }

    /// When the action last became inactive
    pub fn stopped_at(&self) -> Option<f64> {
        self.state.stopped_at
    }

    fn tick(&mut self, state: &InputState, now: f64) {
        let mut raw = self
            .bindings
            .iter()
            .fold(Vec2::zeros(), |acc, b| acc + b.evaluate(state));
        if self.kind == ActionKind::Axis2D && self.bindings.iter().all(is_digital) && raw.norm() > 1.0 {
            raw = raw.normalize();
        }
        let value = ActionValue::from_raw(self.kind, raw);

        let was_active = self.value().is_active();
        if value.is_active() && !was_active {
            self.state.started_at = Some(now);
        } else if !value.is_active() && was_active {
            self.state.stopped_at = Some(now);
        }
        self.state.value = Some(value);
    }

    fn reset(&mut self, now: f64) {
        if self.value().is_active() {
            self.state.stopped_at = Some(now);
        }
        self.state.value = None;
    }
}

fn is_digital(binding: &Binding) -> bool {
    match binding {
        Binding::MouseDelta { .. } => false,
        Binding::Combination { binding, .. } => is_digital(binding),
        _ => true,
    }
}

/// A group of actions enabled and disabled together
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionSet {
    /// Set name
    pub name: String,
    /// Disabled sets keep their bindings but report zero values
    #[serde(default = "enabled_default")]
    pub enabled: bool,
    /// Actions in this set
    pub actions: Vec<Action>,
}

fn enabled_default() -> bool {
    true
}

impl ActionSet {
    /// Empty, enabled set
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            actions: Vec::new(),
        }
    }

    /// Builder-style action addition
    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    /// Action by name
    pub fn action(&self, name: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.name == name)
    }
}

/// All registered action sets, addressed by `"set/action"`
#[derive(Debug, Clone, Default)]
pub struct InputActions {
    sets: BTreeMap<String, ActionSet>,
}

impl InputActions {
    /// No sets registered
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a set; names must be unique
    pub fn add_set(&mut self, set: ActionSet) -> InputResult<()> {
        if self.sets.contains_key(&set.name) {
            return Err(InputError::DuplicateSet(set.name));
        }
        for (i, action) in set.actions.iter().enumerate() {
            if set.actions[..i].iter().any(|a| a.name == action.name) {
                return Err(InputError::DuplicateAction(format!("{}/{}", set.name, action.name)));
            }
        }
        log::debug!("Registered action set {} ({} actions)", set.name, set.actions.len());
        self.sets.insert(set.name.clone(), set);
        Ok(())
    }

    /// Load sets from a RON list of [`ActionSet`]
    pub fn load_ron(&mut self, text: &str) -> InputResult<()> {
        let sets: Vec<ActionSet> =
            ron::from_str(text).map_err(|e| InputError::Parse(e.to_string()))?;
        for set in sets {
            self.add_set(set)?;
        }
        Ok(())
    }

    /// Enable or disable a whole set
    pub fn set_enabled(&mut self, set: &str, enabled: bool) -> InputResult<()> {
        let set = self
            .sets
            .get_mut(set)
            .ok_or_else(|| InputError::UnknownSet(set.to_string()))?;
        set.enabled = enabled;
        Ok(())
    }

    /// Re-evaluate every action of every enabled set
    pub fn tick(&mut self, state: &InputState, now: f64) {
        for set in self.sets.values_mut() {
            for action in &mut set.actions {
                if set.enabled {
                    action.tick(state, now);
                } else {
                    action.reset(now);
                }
            }
        }
    }

    /// Look up an action by `"set/action"`
    pub fn action(&self, key: &str) -> InputResult<&Action> {
        let (set_name, action_name) = split_key(key)?;
        let set = self
            .sets
            .get(set_name)
            .ok_or_else(|| InputError::UnknownSet(set_name.to_string()))?;
        set.action(action_name)
            .ok_or_else(|| InputError::UnknownAction(key.to_string()))
    }

    /// Current value of `"set/action"`
    pub fn value(&self, key: &str) -> InputResult<ActionValue> {
        self.action(key).map(Action::value)
    }

    /// Bool action value; errors on other kinds
    pub fn bool(&self, key: &str) -> InputResult<bool> {
        match self.value(key)? {
            ActionValue::Bool(on) => Ok(on),
            other => Err(wrong_kind(key, ActionKind::Bool, other)),
        }
    }

    /// 2D action value; errors on other kinds
    pub fn axis2d(&self, key: &str) -> InputResult<Vec2> {
        match self.value(key)? {
            ActionValue::Axis2D(v) => Ok(v),
            other => Err(wrong_kind(key, ActionKind::Axis2D, other)),
        }
    }

    /// Scalar action value; errors on other kinds
    pub fn scalar(&self, key: &str) -> InputResult<f32> {
        match self.value(key)? {
            ActionValue::Scalar(s) => Ok(s),
            other => Err(wrong_kind(key, ActionKind::Scalar, other)),
        }
    }

    /// Registered set names
    pub fn set_names(&self) -> impl Iterator<Item = &str> {
        self.sets.keys().map(String::as_str)
    }
}

fn split_key(key: &str) -> InputResult<(&str, &str)> {
    match key.split_once('/') {
        Some((set, action)) if !set.is_empty() && !action.is_empty() => Ok((set, action)),
        _ => Err(InputError::InvalidKey(key.to_string())),
    }
}

fn wrong_kind(key: &str, expected: ActionKind, actual: ActionValue) -> InputError {
    InputError::WrongKind {
        key: key.to_string(),
        expected,
        actual: actual.kind(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn player_actions() -> InputActions {
        let mut actions = InputActions::new();
        actions
            .add_set(
                ActionSet::new("player")
                    .with_action(Action::new("jump", ActionKind::Bool).with_binding(Binding::Key(KeyCode::Space)))
                    .with_action(Action::new("move", ActionKind::Axis2D).with_binding(Binding::KeyAxis2D {
                        left: KeyCode::A,
                        right: KeyCode::D,
                        down: KeyCode::S,
                        up: KeyCode::W,
                    }))
                    .with_action(
                        Action::new("look", ActionKind::Axis2D).with_binding(Binding::Combination {
                            gate: Box::new(Binding::MouseButton(MouseButton::Right)),
                            binding: Box::new(Binding::MouseDelta { scale: 0.5 }),
                        }),
                    )
                    .with_action(Action::new("zoom", ActionKind::Scalar).with_binding(Binding::KeyAxis {
                        negative: KeyCode::Q,
                        positive: KeyCode::E,
                    })),
            )
            .unwrap();
        actions
    }

    #[test]
    fn test_bool_action_timestamps() {
        let mut actions = player_actions();
        let mut state = InputState::new();

        actions.tick(&state, 0.0);
        assert!(!actions.bool("player/jump").unwrap());

        state.press_key(KeyCode::Space, 0.9);
        actions.tick(&state, 1.0);
        assert!(actions.bool("player/jump").unwrap());
        assert_eq!(actions.action("player/jump").unwrap().started_at(), Some(1.0));

        actions.tick(&state, 1.1);
        assert_eq!(actions.action("player/jump").unwrap().started_at(), Some(1.0));

        state.release_key(KeyCode::Space, 1.15);
        actions.tick(&state, 1.2);
        assert!(!actions.bool("player/jump").unwrap());
        assert_eq!(actions.action("player/jump").unwrap().stopped_at(), Some(1.2));
    }

    #[test]
    fn test_diagonal_movement_normalized() {
        let mut actions = player_actions();
        let mut state = InputState::new();
        state.press_key(KeyCode::W, 0.0);
        state.press_key(KeyCode::D, 0.0);
        actions.tick(&state, 0.0);
        let v = actions.axis2d("player/move").unwrap();
        assert_relative_eq!(v.norm(), 1.0, epsilon = 1e-6);
        assert!(v.x > 0.0 && v.y > 0.0);
    }

    #[test]
    fn test_combination_gate() {
        let mut actions = player_actions();
        let mut state = InputState::new();
        state.add_mouse_delta(10.0, -4.0);
        actions.tick(&state, 0.0);
        assert_eq!(actions.axis2d("player/look").unwrap(), Vec2::zeros());

        state.press_button(MouseButton::Right, 0.0);
        actions.tick(&state, 0.1);
        assert_eq!(actions.axis2d("player/look").unwrap(), Vec2::new(5.0, -2.0));
    }

    #[test]
    fn test_key_axis_scalar() {
        let mut actions = player_actions();
        let mut state = InputState::new();
        state.press_key(KeyCode::Q, 0.0);
        actions.tick(&state, 0.0);
        assert_eq!(actions.scalar("player/zoom").unwrap(), -1.0);
        state.press_key(KeyCode::E, 0.0);
        actions.tick(&state, 0.0);
        assert_eq!(actions.scalar("player/zoom").unwrap(), 0.0);
    }

    #[test]
    fn test_lookup_errors() {
        let actions = player_actions();
        assert!(matches!(actions.value("jump"), Err(InputError::InvalidKey(_))));
        assert!(matches!(actions.value("vehicle/jump"), Err(InputError::UnknownSet(_))));
        assert!(matches!(actions.value("player/fly"), Err(InputError::UnknownAction(_))));
        assert!(matches!(actions.axis2d("player/jump"), Err(InputError::WrongKind { .. })));
    }

    #[test]
    fn test_disabled_set_reads_zero() {
        let mut actions = player_actions();
        let mut state = InputState::new();
        state.press_key(KeyCode::Space, 0.0);
        actions.tick(&state, 0.0);
        actions.set_enabled("player", false).unwrap();
        actions.tick(&state, 0.5);
        assert!(!actions.bool("player/jump").unwrap());
        assert_eq!(actions.action("player/jump").unwrap().stopped_at(), Some(0.5));
    }

    #[test]
    fn test_duplicate_set_rejected() {
        let mut actions = player_actions();
        assert!(matches!(
            actions.add_set(ActionSet::new("player")),
            Err(InputError::DuplicateSet(_))
        ));
    }

    #[test]
    fn test_load_ron() {
        let mut actions = InputActions::new();
        actions
            .load_ron(
                r#"[(
                    name: "debug",
                    actions: [(name: "reload", kind: Bool, bindings: [Key(F5)])],
                )]"#,
            )
            .unwrap();
        let mut state = InputState::new();
        state.press_key(KeyCode::F5, 0.0);
        actions.tick(&state, 0.0);
        assert!(actions.bool("debug/reload").unwrap());
    }
}
