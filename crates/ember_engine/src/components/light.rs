//! Point lights

use super::{Capabilities, Component, ComponentResult, DrawContext};
use crate::assets::DataNode;
use crate::render::PointLightData;

/// Omnidirectional light at the node's position
#[derive(Debug, Clone, PartialEq)]
pub struct PointLight {
    /// Linear RGB color
    pub color: [f32; 3],
    /// Intensity multiplier
    pub intensity: f32,
    /// Fade-out distance
    pub range: f32,
}

impl PointLight {
    /// Fields: `color`, `intensity`, `range`
    pub fn from_data(data: &DataNode) -> ComponentResult<Self> {
        Ok(Self {
            color: data.field_or("color", [1.0, 1.0, 1.0])?,
            intensity: data.field_or("intensity", 1.0)?,
            range: data.field_or("range", 10.0)?,
        })
    }
}

impl Component for PointLight {
    fn type_name(&self) -> &'static str {
        "point_light"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::DRAW
    }

    fn draw(&self, ctx: &mut DrawContext<'_>) {
        ctx.queues.push_light(PointLightData {
            position: ctx.global.position,
            color: self.color,
            intensity: self.intensity,
            range: self.range,
        });
    }
}
