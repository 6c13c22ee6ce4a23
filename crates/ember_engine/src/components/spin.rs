//! Constant rotation about an axis

use super::{Capabilities, Component, ComponentContext, ComponentResult};
use crate::assets::DataNode;
use crate::foundation::math::{utils, Quat, Vec3};
use nalgebra::Unit;

/// Rotates its node around a local axis at a constant rate
#[derive(Debug, Clone, PartialEq)]
pub struct Spin {
    /// Rotation axis, normalized on creation
    pub axis: Vec3,
    /// Angular speed
    pub degrees_per_second: f32,
}

impl Spin {
    /// Fields: `axis` (default Y), `degrees_per_second` (default 90)
    pub fn from_data(data: &DataNode) -> ComponentResult<Self> {
        let axis: Vec3 = data.field_or("axis", Vec3::y())?;
        Ok(Self {
            axis: axis.try_normalize(f32::EPSILON).unwrap_or_else(Vec3::y),
            degrees_per_second: data.field_or("degrees_per_second", 90.0)?,
        })
    }
}

impl Component for Spin {
    fn type_name(&self) -> &'static str {
        "spin"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::UPDATE
    }

    fn update(&mut self, ctx: &mut ComponentContext<'_>) {
        let angle = utils::deg_to_rad(self.degrees_per_second) * ctx.delta;
        let step = Quat::from_axis_angle(&Unit::new_unchecked(self.axis), angle);
        let mut local = ctx.local_transform();
        local.rotation = local.rotation * step;
        ctx.set_local_transform(local);
    }
}
