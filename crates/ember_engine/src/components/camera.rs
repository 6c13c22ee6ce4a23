//! Perspective camera

use super::{Capabilities, Component, ComponentResult, DrawContext};
use crate::assets::DataNode;
use crate::foundation::math::{utils, Mat4, Mat4Ext};
use crate::render::CameraData;

/// Perspective camera looking down the node's forward axis
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// Vertical field of view in degrees
    pub fov_degrees: f32,
    /// Near plane distance
    pub near: f32,
    /// Far plane distance
    pub far: f32,
    /// Only active cameras submit; the first one reached in the traversal wins
    pub active: bool,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            fov_degrees: 60.0,
            near: 0.1,
            far: 500.0,
            active: true,
        }
    }
}

impl Camera {
    /// Fields: `fov`, `near`, `far`, `active`
    pub fn from_data(data: &DataNode) -> ComponentResult<Self> {
        let defaults = Self::default();
        Ok(Self {
            fov_degrees: data.field_or("fov", defaults.fov_degrees)?,
            near: data.field_or("near", defaults.near)?,
            far: data.field_or("far", defaults.far)?,
            active: data.field_or("active", defaults.active)?,
        })
    }

    /// Projection including the Vulkan clip space flip
    pub fn projection(&self, aspect_ratio: f32) -> Mat4 {
        let fov = utils::deg_to_rad(self.fov_degrees);
        Mat4::perspective(fov, aspect_ratio.max(f32::EPSILON), self.near, self.far)
            * Mat4::vulkan_coordinate_transform()
    }
}

impl Component for Camera {
    fn type_name(&self) -> &'static str {
        "camera"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::DRAW
    }

    fn draw(&self, ctx: &mut DrawContext<'_>) {
        if !self.active || ctx.queues.camera().is_some() {
            return;
        }
        ctx.queues.set_camera(CameraData {
            view: ctx.global.inverse().to_matrix(),
            projection: self.projection(ctx.aspect_ratio),
            position: ctx.global.position,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec4;
    use approx::assert_relative_eq;

    #[test]
    fn test_forward_point_lands_in_depth_range() {
        let camera = Camera::default();
        let projection = camera.projection(16.0 / 9.0);
        // The camera looks down -Z in view space
        let clip = projection * Vec4::new(0.0, 0.0, -10.0, 1.0);
        let depth = clip.z / clip.w;
        assert!(clip.w > 0.0);
        assert!((0.0..=1.0).contains(&depth));
        assert_relative_eq!(clip.x / clip.w, 0.0);
    }

    #[test]
    fn test_fields_from_data() {
        let data = DataNode::from_ron_str("(fov: 45.0, active: false)").unwrap();
        let camera = Camera::from_data(&data).unwrap();
        assert_eq!(camera.fov_degrees, 45.0);
        assert!(!camera.active);
        assert_eq!(camera.near, 0.1);
    }
}
