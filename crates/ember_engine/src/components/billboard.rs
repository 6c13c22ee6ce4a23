//! Camera-facing quads

use super::{color_field, Capabilities, Component, ComponentContext, ComponentResult, DrawContext};
use crate::assets::DataNode;
use crate::foundation::string_id::StringId;
use crate::render::{BillboardDraw, TextureHandle};

/// Camera-facing quad at the node's position
#[derive(Debug, Clone)]
pub struct Billboard {
    /// Edge length in world units, multiplied by the node scale
    pub size: f32,
    /// Tint
    pub color: [f32; 4],
    texture_id: Option<String>,
    texture: Option<(StringId, TextureHandle)>,
}

impl Billboard {
    /// Fields: `size`, `color`, `texture`
    pub fn from_data(data: &DataNode) -> ComponentResult<Self> {
        Ok(Self {
            size: data.field_or("size", 1.0)?,
            color: color_field(data, "color", [1.0; 4])?,
            texture_id: data.field_opt("texture")?,
            texture: None,
        })
    }
}

impl Component for Billboard {
    fn type_name(&self) -> &'static str {
        "billboard"
    }

    fn capabilities(&self) -> Capabilities {
        let mut caps = Capabilities::DRAW;
        if self.texture_id.is_some() {
            caps |= Capabilities::INITIALIZE | Capabilities::SHUTDOWN;
        }
        caps
    }

    fn initialize(&mut self, ctx: &mut ComponentContext<'_>) -> ComponentResult<()> {
        if let Some(id) = &self.texture_id {
            let handle = ctx.resources.load_texture(id, ctx.gpu)?;
            self.texture = ctx
                .resources
                .textures
                .get(handle)
                .map(|t| (StringId::new(id), t.gpu));
        }
        Ok(())
    }

    fn draw(&self, ctx: &mut DrawContext<'_>) {
        ctx.queues.billboards.push(BillboardDraw {
            position: ctx.global.position,
            size: self.size * ctx.global.scale,
            color: self.color,
            texture: self.texture.map(|(_, gpu)| gpu),
            node_id: ctx.node_id(),
        });
    }

    fn shutdown(&mut self, ctx: &mut ComponentContext<'_>) {
        if let Some((id, _)) = self.texture.take() {
            ctx.resources.release_texture(id, ctx.gpu);
        }
    }
}
