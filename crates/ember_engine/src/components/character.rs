//! Player character driven by input actions
//!
//! Reads `player/move` as a 2D direction relative to the node and jumps on
//! `player/jump`; the physics backend owns vertical motion.

use super::{Capabilities, Component, ComponentContext, ComponentResult};
use crate::assets::DataNode;
use crate::foundation::math::{Transform, Vec3};
use crate::physics::{CharacterDesc, CharacterId};

/// Player-style controller steered by input actions
///
/// `move` is a 2D axis where +Y walks along the node's forward direction;
/// `jump` is a bool action. The node follows the controller's feet.
#[derive(Debug, Clone)]
pub struct Character {
    /// Capsule height
    pub height: f32,
    /// Capsule radius
    pub radius: f32,
    /// Step-up height
    pub max_step: f32,
    /// Walk speed in units per second
    pub speed: f32,
    /// Upward launch speed
    pub jump_speed: f32,
    /// `set/action` key of the move axis
    pub move_action: String,
    /// `set/action` key of the jump button
    pub jump_action: String,
    character: Option<CharacterId>,
    reported_input_error: bool,
}

impl Character {
    /// Fields: `height`, `radius`, `max_step`, `speed`, `jump_speed`, `move_action`, `jump_action`
    pub fn from_data(data: &DataNode) -> ComponentResult<Self> {
        let defaults = CharacterDesc::default();
        Ok(Self {
            height: data.field_or("height", defaults.height)?,
            radius: data.field_or("radius", defaults.radius)?,
            max_step: data.field_or("max_step", defaults.max_step)?,
            speed: data.field_or("speed", 4.0)?,
            jump_speed: data.field_or("jump_speed", 5.0)?,
            move_action: data.field_or("move_action", "player/move".to_string())?,
            jump_action: data.field_or("jump_action", "player/jump".to_string())?,
            character: None,
            reported_input_error: false,
        })
    }

    /// Backend controller, once initialized
    pub fn character(&self) -> Option<CharacterId> {
        self.character
    }

    fn read_input(&mut self, ctx: &ComponentContext<'_>) -> (Vec3, bool) {
        let actions = &ctx.input.actions;
        let result = actions
            .axis2d(&self.move_action)
            .and_then(|axis| Ok((axis, actions.bool(&self.jump_action)?)));
        match result {
            Ok((axis, jump)) => {
                let global = ctx.global_transform();
                let forward = global.forward();
                let flat_forward = Vec3::new(forward.x, 0.0, forward.z)
                    .try_normalize(f32::EPSILON)
                    .unwrap_or_else(|| -Vec3::z());
                let right = flat_forward.cross(&Vec3::y());
                ((flat_forward * axis.y + right * axis.x) * self.speed, jump)
            }
            Err(e) => {
                if !self.reported_input_error {
                    log::warn!("Character input unavailable: {}", e);
                    self.reported_input_error = true;
                }
                (Vec3::zeros(), false)
            }
        }
    }
}

impl Component for Character {
    fn type_name(&self) -> &'static str {
        "character"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::INITIALIZE | Capabilities::UPDATE | Capabilities::SHUTDOWN
    }

    fn initialize(&mut self, ctx: &mut ComponentContext<'_>) -> ComponentResult<()> {
        let desc = CharacterDesc {
            position: ctx.global_transform().position,
            height: self.height,
            radius: self.radius,
            max_step: self.max_step,
        };
        self.character = Some(ctx.physics.create_character(&desc)?);
        Ok(())
    }

    fn update(&mut self, ctx: &mut ComponentContext<'_>) {
        let Some(character) = self.character else {
            return;
        };
        let (velocity, jump) = self.read_input(ctx);
        let result = ctx
            .physics
            .set_character_velocity(character, velocity)
            .and_then(|()| {
                if jump {
                    ctx.physics.character_jump(character, self.jump_speed)?;
                }
                ctx.physics.character_position(character)
            });
        match result {
            Ok(position) => {
                let global = ctx.global_transform();
                ctx.set_global_transform(Transform::new(position, global.rotation, global.scale));
            }
            Err(e) => log::warn!("Character on {:?}: {}", ctx.node, e),
        }
    }

    fn shutdown(&mut self, ctx: &mut ComponentContext<'_>) {
        if let Some(character) = self.character.take() {
            if let Err(e) = ctx.physics.remove_character(character) {
                log::warn!("Removing character: {}", e);
            }
        }
    }
}
