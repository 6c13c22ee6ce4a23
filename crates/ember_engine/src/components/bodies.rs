//! Rigid body components
//!
//! Both read the same shape fields:
//!
//! ```ron
//! (type: "rigid_body", shape: "box", half_extents: (0.5, 0.5, 0.5), friction: 0.4)
//! (type: "static_body", shape: "mesh", mesh: "mesh:plane")
//! ```
//!
//! Shape dimensions are multiplied by the node's global scale at creation.

use super::{Capabilities, Component, ComponentContext, ComponentError, ComponentResult};
use crate::assets::{DataError, DataNode, MeshData};
use crate::foundation::math::{Transform, Vec3};
use crate::physics::{BodyDesc, BodyId, MotionType, PhysicsContext, ShapeDesc, ShapeId};

/// Shape fields as read from scene data, before scaling
#[derive(Debug, Clone, PartialEq)]
enum ShapeSource {
    Box(Vec3),
    Sphere(f32),
    Capsule { half_height: f32, radius: f32 },
    Mesh(String),
}

impl ShapeSource {
    fn from_data(data: &DataNode) -> Result<Self, DataError> {
        let kind: String = data.field_or("shape", "box".to_string())?;
        Ok(match kind.as_str() {
            "box" => Self::Box(data.field_or("half_extents", Vec3::repeat(0.5))?),
            "sphere" => Self::Sphere(data.field_or("radius", 0.5)?),
            "capsule" => Self::Capsule {
                half_height: data.field_or("half_height", 0.5)?,
                radius: data.field_or("radius", 0.5)?,
            },
            "mesh" => Self::Mesh(data.field("mesh")?),
            _ => {
                return Err(DataError::WrongType {
                    key: "shape".to_string(),
                    expected: "box, sphere, capsule or mesh",
                })
            }
        })
    }

    fn build(&self, scale: f32, ctx: &ComponentContext<'_>) -> ComponentResult<ShapeDesc> {
        Ok(match self {
            Self::Box(half_extents) => ShapeDesc::Box {
                half_extents: half_extents * scale,
            },
            Self::Sphere(radius) => ShapeDesc::Sphere {
                radius: radius * scale,
            },
            Self::Capsule {
                half_height,
                radius,
            } => ShapeDesc::Capsule {
                half_height: half_height * scale,
                radius: radius * scale,
            },
            Self::Mesh(id) => {
                let data = match id.strip_prefix("mesh:") {
                    Some(primitive) => MeshData::primitive(primitive),
                    None => MeshData::load_obj(ctx.resources.asset_config().resolve(id)).ok(),
                };
                let data = data.ok_or_else(|| ComponentError::Init {
                    component: "body",
                    reason: format!("no collision mesh '{id}'"),
                })?;
                ShapeDesc::Mesh {
                    vertices: data
                        .vertices
                        .iter()
                        .map(|v| Vec3::from(v.position) * scale)
                        .collect(),
                    indices: data.indices,
                }
            }
        })
    }
}

/// Body and shape owned by one component
#[derive(Debug, Clone, Copy)]
struct BodyParts {
    shape: ShapeId,
    body: BodyId,
}

impl BodyParts {
    fn create(
        source: &ShapeSource,
        motion: MotionType,
        friction: f32,
        ctx: &mut ComponentContext<'_>,
    ) -> ComponentResult<Self> {
        let global = ctx.global_transform();
        let desc = source.build(global.scale, ctx)?;
        let shape = ctx.physics.create_shape(desc)?;
        let mut body_desc = BodyDesc::new(shape, motion, global.position);
        body_desc.rotation = global.rotation;
        body_desc.friction = friction;
        match ctx.physics.create_body(&body_desc) {
            Ok(body) => Ok(Self { shape, body }),
            Err(e) => {
                if let Err(err) = ctx.physics.remove_shape(shape) {
                    log::warn!("Removing shape: {}", err);
                }
                Err(e.into())
            }
        }
    }

    fn destroy(self, physics: &mut PhysicsContext) {
        if let Err(e) = physics.remove_body(self.body) {
            log::warn!("Removing body: {}", e);
        }
        if let Err(e) = physics.remove_shape(self.shape) {
            log::warn!("Removing shape: {}", e);
        }
    }
}

/// Immovable collider at the node's initial transform
#[derive(Debug, Clone)]
pub struct StaticBody {
    source: ShapeSource,
    /// Surface friction
    pub friction: f32,
    parts: Option<BodyParts>,
}

impl StaticBody {
    /// Fields: shape fields plus `friction`
    pub fn from_data(data: &DataNode) -> ComponentResult<Self> {
        Ok(Self {
            source: ShapeSource::from_data(data)?,
            friction: data.field_or("friction", 0.5)?,
            parts: None,
        })
    }

    /// Backend body, once initialized
    pub fn body(&self) -> Option<BodyId> {
        self.parts.map(|p| p.body)
    }
}

impl Component for StaticBody {
    fn type_name(&self) -> &'static str {
        "static_body"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::INITIALIZE | Capabilities::SHUTDOWN
    }

    fn initialize(&mut self, ctx: &mut ComponentContext<'_>) -> ComponentResult<()> {
        self.parts = Some(BodyParts::create(&self.source, MotionType::Static, self.friction, ctx)?);
        Ok(())
    }

    fn shutdown(&mut self, ctx: &mut ComponentContext<'_>) {
        if let Some(parts) = self.parts.take() {
            parts.destroy(ctx.physics);
        }
    }
}

/// Simulated body that drives its node's transform
#[derive(Debug, Clone)]
pub struct RigidBody {
    source: ShapeSource,
    /// Surface friction
    pub friction: f32,
    /// Velocity applied at creation
    pub initial_velocity: Vec3,
    parts: Option<BodyParts>,
}

impl RigidBody {
    /// Fields: shape fields plus `friction` and `velocity`
    pub fn from_data(data: &DataNode) -> ComponentResult<Self> {
        Ok(Self {
            source: ShapeSource::from_data(data)?,
            friction: data.field_or("friction", 0.5)?,
            initial_velocity: data.field_or("velocity", Vec3::zeros())?,
            parts: None,
        })
    }

    /// Backend body, once initialized
    pub fn body(&self) -> Option<BodyId> {
        self.parts.map(|p| p.body)
    }
}

impl Component for RigidBody {
    fn type_name(&self) -> &'static str {
        "rigid_body"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::INITIALIZE | Capabilities::UPDATE | Capabilities::SHUTDOWN
    }

    fn initialize(&mut self, ctx: &mut ComponentContext<'_>) -> ComponentResult<()> {
        let parts = BodyParts::create(&self.source, MotionType::Dynamic, self.friction, ctx)?;
        if self.initial_velocity != Vec3::zeros() {
            if let Err(e) = ctx.physics.set_linear_velocity(parts.body, self.initial_velocity) {
                parts.destroy(ctx.physics);
                return Err(e.into());
            }
        }
        self.parts = Some(parts);
        Ok(())
    }

    fn update(&mut self, ctx: &mut ComponentContext<'_>) {
        let Some(parts) = self.parts else {
            return;
        };
        match ctx.physics.body_transform(parts.body) {
            Ok((position, rotation)) => {
                let scale = ctx.global_transform().scale;
                ctx.set_global_transform(Transform::new(position, rotation, scale));
            }
            Err(e) => log::warn!("Rigid body on {:?}: {}", ctx.node, e),
        }
    }

    fn shutdown(&mut self, ctx: &mut ComponentContext<'_>) {
        if let Some(parts) = self.parts.take() {
            parts.destroy(ctx.physics);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_fields() {
        let data = DataNode::from_ron_str("(shape: \"capsule\", radius: 0.25)").unwrap();
        assert_eq!(
            ShapeSource::from_data(&data).unwrap(),
            ShapeSource::Capsule {
                half_height: 0.5,
                radius: 0.25
            }
        );
        let data = DataNode::from_ron_str("(shape: \"mesh\")").unwrap();
        assert!(matches!(ShapeSource::from_data(&data), Err(DataError::Missing(_))));
        let data = DataNode::from_ron_str("(shape: \"cone\")").unwrap();
        assert!(ShapeSource::from_data(&data).is_err());
    }

    #[test]
    fn test_defaults() {
        let body = RigidBody::from_data(&DataNode::from_ron_str("()").unwrap()).unwrap();
        assert_eq!(body.source, ShapeSource::Box(Vec3::repeat(0.5)));
        assert_eq!(body.initial_velocity, Vec3::zeros());
        assert!(body.body().is_none());
    }

    #[test]
    fn test_failed_body_releases_shape() {
        use crate::assets::Resources;
        use crate::config::AssetConfig;
        use crate::input::Input;
        use crate::physics::BasicBackend;
        use crate::render::HeadlessGpu;
        use crate::scene::Scene;

        let mut scene = Scene::new();
        let node = scene.create_node(scene.root(), "floor", Transform::IDENTITY).unwrap();
        let mut resources = Resources::new(AssetConfig::default());
        let mut gpu = HeadlessGpu::new();
        let mut physics = BasicBackend::default();
        let input = Input::new();
        // mesh shapes are static only, so the dynamic body is refused
        let data = DataNode::from_ron_str(r#"(shape: "mesh", mesh: "mesh:cube")"#).unwrap();
        let mut body = RigidBody::from_data(&data).unwrap();

        let mut ctx = ComponentContext {
            node,
            scene: &mut scene,
            resources: &mut resources,
            gpu: &mut gpu,
            physics: &mut physics,
            input: &input,
            delta: 0.0,
        };
        assert!(body.initialize(&mut ctx).is_err());
        assert!(body.body().is_none());
        assert_eq!(physics.shape_count(), 0);
        assert_eq!(physics.body_count(), 0);
    }
}
