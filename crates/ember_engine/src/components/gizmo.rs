//! Debug helpers: axis arrows and mesh bounds

use super::{color_field, Capabilities, Component, ComponentResult, DrawContext, Mesh};
use crate::assets::{DataError, DataNode};
use crate::foundation::aabb::Aabb;
use crate::foundation::math::{Mat4, Vec3};
use crate::render::{AabbDraw, GizmoDraw, GizmoShape};

/// Procedural helper shape drawn at the node
#[derive(Debug, Clone)]
pub struct Gizmo {
    /// Shape to draw
    pub shape: GizmoShape,
    /// Extra scale on top of the node transform
    pub size: f32,
    /// Color, ignored by axes
    pub color: [f32; 4],
}

impl Gizmo {
    /// Fields: `shape` (`axes`, `cross` or `circle`), `size`, `color`
    pub fn from_data(data: &DataNode) -> ComponentResult<Self> {
        let shape = match data.field_or("shape", String::from("axes"))?.as_str() {
            "axes" => GizmoShape::Axes,
            "cross" => GizmoShape::Cross,
            "circle" => GizmoShape::Circle,
            _ => {
                return Err(DataError::WrongType {
                    key: "shape".to_string(),
                    expected: "axes, cross or circle",
                }
                .into())
            }
        };
        Ok(Self {
            shape,
            size: data.field_or("size", 1.0)?,
            color: color_field(data, "color", [1.0, 1.0, 0.0, 1.0])?,
        })
    }
}

impl Component for Gizmo {
    fn type_name(&self) -> &'static str {
        "gizmo"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::DRAW
    }

    fn draw(&self, ctx: &mut DrawContext<'_>) {
        let transform = ctx.global.to_matrix() * Mat4::new_scaling(self.size);
        ctx.queues.gizmos.push(GizmoDraw {
            shape: self.shape,
            transform,
            color: self.color,
            node_id: ctx.node_id(),
        });
    }
}

/// World-space outline around the meshes on the node
#[derive(Debug, Clone)]
pub struct AabbGizmo {
    /// Outline color
    pub color: [f32; 4],
    /// Also draw the node's local axes as debug lines
    pub axes: bool,
}

impl AabbGizmo {
    /// Fields: `color`, `axes`
    pub fn from_data(data: &DataNode) -> ComponentResult<Self> {
        Ok(Self {
            color: color_field(data, "color", [0.0, 1.0, 0.0, 1.0])?,
            axes: data.field_or("axes", false)?,
        })
    }

    fn node_bounds(ctx: &DrawContext<'_>) -> Aabb {
        let mut bounds = Aabb::INVALID;
        let Some(node) = ctx.scene.node(ctx.node) else {
            return bounds;
        };
        for slot in node.components() {
            if let Some(mesh) = slot.component().downcast_ref::<Mesh>() {
                if let Some(local) = mesh.bounds(ctx.resources) {
                    bounds.grow_aabb(&local.transformed(&ctx.global));
                }
            }
        }
        bounds
    }
}

impl Component for AabbGizmo {
    fn type_name(&self) -> &'static str {
        "aabb_gizmo"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::DRAW
    }

    fn draw(&self, ctx: &mut DrawContext<'_>) {
        let bounds = Self::node_bounds(ctx);
        if !bounds.valid {
            return;
        }
        ctx.queues.aabbs.push(AabbDraw {
            aabb: bounds,
            color: self.color,
            node_id: ctx.node_id(),
        });
        if self.axes {
            let origin = ctx.global.position;
            let length = bounds.extent.max().max(0.5);
            let axes = [
                (Vec3::x(), [1.0, 0.0, 0.0, 1.0]),
                (Vec3::y(), [0.0, 1.0, 0.0, 1.0]),
                (Vec3::z(), [0.0, 0.0, 1.0, 1.0]),
            ];
            for (axis, color) in axes {
                let tip = origin + ctx.global.rotation * axis * length;
                ctx.queues.line(origin, tip, color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gizmo_shape_names() {
        let circle = Gizmo::from_data(&DataNode::from_ron_str("(shape: \"circle\")").unwrap()).unwrap();
        assert_eq!(circle.shape, GizmoShape::Circle);
        assert!(Gizmo::from_data(&DataNode::from_ron_str("(shape: \"star\")").unwrap()).is_err());
    }

    #[test]
    fn test_rgb_color_gets_alpha() {
        let data = DataNode::from_ron_str("(color: (0.5, 0.5, 0.5))").unwrap();
        assert_eq!(AabbGizmo::from_data(&data).unwrap().color, [0.5, 0.5, 0.5, 1.0]);
    }
}
