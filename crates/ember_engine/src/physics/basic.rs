//! Built-in physics backend
//!
//! Enough simulation for demos and tests: dynamic bodies fall under gravity
//! and come to rest on static geometry, characters walk and are clamped to
//! the ground. Contacts are resolved against axis-aligned world bounds only,
//! so rotated shapes collide as their enclosing boxes.

use super::backend::{
    layers_collide, BodyDesc, BodyId, CharacterDesc, CharacterId, MotionType, ObjectLayer,
    PhysicsBackend, ShapeDesc, ShapeId,
};
use super::{PhysicsError, PhysicsResult};
use crate::foundation::aabb::Aabb;
use crate::foundation::math::{Quat, Transform, Vec3};
use crate::foundation::pool::Pool;

/// Speed under which a dynamic body counts as resting
const SLEEP_SPEED: f32 = 0.05;
/// Resting steps before a body is deactivated
const SLEEP_STEPS: u32 = 30;

#[derive(Debug)]
struct Shape {
    desc: ShapeDesc,
    bounds: Aabb,
    users: u32,
}

#[derive(Debug)]
struct Body {
    shape: ShapeId,
    motion: MotionType,
    layer: ObjectLayer,
    position: Vec3,
    rotation: Quat,
    velocity: Vec3,
    friction: f32,
    active: bool,
    resting_steps: u32,
}

impl Body {
    fn world_bounds(&self, shape: &Aabb) -> Aabb {
        shape.transformed(&Transform::from_position_rotation(self.position, self.rotation))
    }
}

#[derive(Debug)]
struct Character {
    position: Vec3,
    desired_velocity: Vec3,
    vertical_speed: f32,
    height: f32,
    radius: f32,
    max_step: f32,
    on_ground: bool,
}

impl Character {
    fn bounds(&self) -> Aabb {
        Aabb::from_min_max(
            self.position - Vec3::new(self.radius, 0.0, self.radius),
            self.position + Vec3::new(self.radius, self.height, self.radius),
        )
    }
}

/// Small built-in backend
#[derive(Debug)]
pub struct BasicBackend {
    gravity: Vec3,
    shapes: Pool<Shape>,
    bodies: Pool<Body>,
    characters: Pool<Character>,
}

impl Default for BasicBackend {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, -9.81, 0.0))
    }
}

impl BasicBackend {
    /// Empty world with the given gravity
    pub fn new(gravity: Vec3) -> Self {
        Self {
            gravity,
            shapes: Pool::new(),
            bodies: Pool::new(),
            characters: Pool::new(),
        }
    }

    /// Number of registered shapes
    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    /// Number of bodies in the world
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Whether a body is currently simulated
    pub fn is_active(&self, body: BodyId) -> bool {
        self.bodies.get(body.cast()).is_some_and(|b| b.active)
    }

    fn body(&self, body: BodyId) -> PhysicsResult<&Body> {
        self.bodies
            .get(body.cast())
            .ok_or(PhysicsError::UnknownBody(body.to_bits()))
    }

    fn body_mut(&mut self, body: BodyId) -> PhysicsResult<&mut Body> {
        self.bodies
            .get_mut(body.cast())
            .ok_or(PhysicsError::UnknownBody(body.to_bits()))
    }

    fn character(&self, character: CharacterId) -> PhysicsResult<&Character> {
        self.characters
            .get(character.cast())
            .ok_or(PhysicsError::UnknownCharacter(character.to_bits()))
    }

    fn character_mut(&mut self, character: CharacterId) -> PhysicsResult<&mut Character> {
        self.characters
            .get_mut(character.cast())
            .ok_or(PhysicsError::UnknownCharacter(character.to_bits()))
    }

    fn static_bounds(&self) -> Vec<Aabb> {
        self.bodies
            .iter()
            .filter(|(_, body)| body.motion == MotionType::Static)
            .filter_map(|(_, body)| {
                let shape = self.shapes.get(body.shape.cast())?;
                Some(body.world_bounds(&shape.bounds))
            })
            .collect()
    }

    fn step_bodies(&mut self, timestep: f32, statics: &[Aabb]) {
        let gravity = self.gravity;
        let shapes = &self.shapes;
        for (_, body) in self.bodies.iter_mut() {
            if body.motion != MotionType::Dynamic || !body.active {
                continue;
            }
            let Some(shape) = shapes.get(body.shape.cast()) else {
                continue;
            };

            body.velocity += gravity * timestep;
            body.position += body.velocity * timestep;

            if layers_collide(body.layer, ObjectLayer::Static) {
                for other in statics {
                    let bounds = body.world_bounds(&shape.bounds);
                    if let Some(push) = penetration(&bounds, other) {
                        body.position += push;
                        let normal = push.normalize();
                        let into = body.velocity.dot(&normal);
                        if into < 0.0 {
                            body.velocity -= normal * into;
                        }
                        let tangent = body.velocity - normal * body.velocity.dot(&normal);
                        body.velocity -= tangent * body.friction.clamp(0.0, 1.0);
                    }
                }
            }

            if body.velocity.norm() < SLEEP_SPEED {
                body.resting_steps += 1;
                if body.resting_steps >= SLEEP_STEPS {
                    body.active = false;
                    body.velocity = Vec3::zeros();
                }
            } else {
                body.resting_steps = 0;
            }
        }
    }

    fn step_characters(&mut self, timestep: f32, statics: &[Aabb]) {
        let gravity = self.gravity.y;
        for (_, character) in self.characters.iter_mut() {
            character.vertical_speed += gravity * timestep;
            let horizontal = Vec3::new(character.desired_velocity.x, 0.0, character.desired_velocity.z);
            character.position += horizontal * timestep;
            character.position.y += character.vertical_speed * timestep;

            // Highest supporting top under the character, within step reach
            let feet = character.bounds();
            let reach = character.position.y + character.max_step;
            let ground = statics
                .iter()
                .filter(|s| overlaps_xz(&feet, s) && s.max().y <= reach)
                .map(|s| s.max().y)
                .fold(None, |best: Option<f32>, y| Some(best.map_or(y, |b| b.max(y))));

            character.on_ground = false;
            if let Some(ground) = ground {
                if character.position.y <= ground && character.vertical_speed <= 0.0 {
                    character.position.y = ground;
                    character.vertical_speed = 0.0;
                    character.on_ground = true;
                }
            }
        }
    }
}

/// Minimal translation moving `a` out of `b`, if they overlap
fn penetration(a: &Aabb, b: &Aabb) -> Option<Vec3> {
    if !a.valid || !b.valid {
        return None;
    }
    let delta = a.position - b.position;
    let overlap = a.extent + b.extent - delta.abs();
    if overlap.x <= 0.0 || overlap.y <= 0.0 || overlap.z <= 0.0 {
        return None;
    }
    let axis = overlap.imin();
    let mut push = Vec3::zeros();
    push[axis] = if delta[axis] >= 0.0 {
        overlap[axis]
    } else {
        -overlap[axis]
    };
    Some(push)
}

fn overlaps_xz(a: &Aabb, b: &Aabb) -> bool {
    let (amin, amax, bmin, bmax) = (a.min(), a.max(), b.min(), b.max());
    amin.x < bmax.x && amax.x > bmin.x && amin.z < bmax.z && amax.z > bmin.z
}

impl PhysicsBackend for BasicBackend {
    fn name(&self) -> &'static str {
        "basic"
    }

    fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = gravity;
    }

    fn create_shape(&mut self, shape: ShapeDesc) -> PhysicsResult<ShapeId> {
        if let ShapeDesc::Mesh { vertices, indices } = &shape {
            if indices.len() % 3 != 0 || indices.iter().any(|&i| i as usize >= vertices.len()) {
                return Err(PhysicsError::InvalidShape(format!(
                    "mesh with {} vertices has malformed index list of {}",
                    vertices.len(),
                    indices.len()
                )));
            }
        }
        let bounds = shape.bounds();
        if !bounds.valid {
            return Err(PhysicsError::InvalidShape("shape has no extent".to_string()));
        }
        let handle = self.shapes.allocate(Shape {
            desc: shape,
            bounds,
            users: 0,
        })?;
        Ok(handle.cast())
    }

    fn remove_shape(&mut self, shape: ShapeId) -> PhysicsResult<()> {
        let users = self
            .shapes
            .get(shape.cast())
            .ok_or(PhysicsError::UnknownShape(shape.to_bits()))?
            .users;
        if users > 0 {
            return Err(PhysicsError::ShapeInUse(shape.to_bits(), users));
        }
        self.shapes.free(shape.cast())?;
        Ok(())
    }

    fn create_body(&mut self, desc: &BodyDesc) -> PhysicsResult<BodyId> {
        let shape = self
            .shapes
            .get_mut(desc.shape.cast())
            .ok_or(PhysicsError::UnknownShape(desc.shape.to_bits()))?;
        if desc.motion == MotionType::Dynamic && !shape.desc.supports_dynamic() {
            return Err(PhysicsError::InvalidShape(
                "mesh shapes can only be used on static bodies".to_string(),
            ));
        }
        shape.users += 1;
        let result = self.bodies.allocate(Body {
            shape: desc.shape,
            motion: desc.motion,
            layer: desc.layer,
            position: desc.position,
            rotation: desc.rotation,
            velocity: Vec3::zeros(),
            friction: desc.friction,
            active: desc.activate && desc.motion == MotionType::Dynamic,
            resting_steps: 0,
        });
        match result {
            Ok(handle) => Ok(handle.cast()),
            Err(e) => {
                shape.users -= 1;
                Err(e.into())
            }
        }
    }

    fn remove_body(&mut self, body: BodyId) -> PhysicsResult<()> {
        let removed = self
            .bodies
            .free(body.cast())
            .map_err(|_| PhysicsError::UnknownBody(body.to_bits()))?;
        if let Some(shape) = self.shapes.get_mut(removed.shape.cast()) {
            shape.users = shape.users.saturating_sub(1);
        }
        Ok(())
    }

    fn body_transform(&self, body: BodyId) -> PhysicsResult<(Vec3, Quat)> {
        let body = self.body(body)?;
        Ok((body.position, body.rotation))
    }

    fn set_body_transform(&mut self, body: BodyId, position: Vec3, rotation: Quat) -> PhysicsResult<()> {
        let body = self.body_mut(body)?;
        body.position = position;
        body.rotation = rotation;
        if body.motion == MotionType::Dynamic {
            body.active = true;
            body.resting_steps = 0;
        }
        Ok(())
    }

    fn linear_velocity(&self, body: BodyId) -> PhysicsResult<Vec3> {
        Ok(self.body(body)?.velocity)
    }

    fn set_linear_velocity(&mut self, body: BodyId, velocity: Vec3) -> PhysicsResult<()> {
        let id = body.to_bits();
        let body = self.body_mut(body)?;
        if body.motion != MotionType::Dynamic {
            return Err(PhysicsError::StaticBody(id));
        }
        body.velocity = velocity;
        body.active = true;
        body.resting_steps = 0;
        Ok(())
    }

    fn create_character(&mut self, desc: &CharacterDesc) -> PhysicsResult<CharacterId> {
        if desc.height <= 0.0 || desc.radius <= 0.0 {
            return Err(PhysicsError::InvalidShape(format!(
                "character height {} radius {}",
                desc.height, desc.radius
            )));
        }
        let handle = self.characters.allocate(Character {
            position: desc.position,
            desired_velocity: Vec3::zeros(),
            vertical_speed: 0.0,
            height: desc.height,
            radius: desc.radius,
            max_step: desc.max_step.max(0.0),
            on_ground: false,
        })?;
        Ok(handle.cast())
    }

    fn remove_character(&mut self, character: CharacterId) -> PhysicsResult<()> {
        self.characters
            .free(character.cast())
            .map_err(|_| PhysicsError::UnknownCharacter(character.to_bits()))?;
        Ok(())
    }

    fn character_position(&self, character: CharacterId) -> PhysicsResult<Vec3> {
        Ok(self.character(character)?.position)
    }

    fn set_character_velocity(&mut self, character: CharacterId, velocity: Vec3) -> PhysicsResult<()> {
        self.character_mut(character)?.desired_velocity = velocity;
        Ok(())
    }

    fn character_jump(&mut self, character: CharacterId, speed: f32) -> PhysicsResult<()> {
        let character = self.character_mut(character)?;
        if character.on_ground {
            character.vertical_speed = speed;
            character.on_ground = false;
        }
        Ok(())
    }

    fn character_on_ground(&self, character: CharacterId) -> PhysicsResult<bool> {
        Ok(self.character(character)?.on_ground)
    }

    fn update(&mut self, timestep: f32) {
        if timestep <= 0.0 {
            return;
        }
        let statics = self.static_bounds();
        self.step_bodies(timestep, &statics);
        self.step_characters(timestep, &statics);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const DT: f32 = 1.0 / 60.0;

    fn world_with_floor() -> BasicBackend {
        let mut world = BasicBackend::default();
        let floor = world
            .create_shape(ShapeDesc::Box {
                half_extents: Vec3::new(10.0, 0.5, 10.0),
            })
            .unwrap();
        world
            .create_body(&BodyDesc::new(floor, MotionType::Static, Vec3::new(0.0, -0.5, 0.0)))
            .unwrap();
        world
    }

    #[test]
    fn test_dynamic_body_falls_and_rests_on_floor() {
        let mut world = world_with_floor();
        let cube = world
            .create_shape(ShapeDesc::Box {
                half_extents: Vec3::repeat(0.5),
            })
            .unwrap();
        let body = world
            .create_body(&BodyDesc::new(cube, MotionType::Dynamic, Vec3::new(0.0, 3.0, 0.0)))
            .unwrap();

        for _ in 0..600 {
            world.update(DT);
        }
        let (position, _) = world.body_transform(body).unwrap();
        assert_relative_eq!(position.y, 0.5, epsilon = 0.05);
        assert!(!world.is_active(body));
    }

    #[test]
    fn test_static_body_never_moves() {
        let mut world = BasicBackend::default();
        let shape = world.create_shape(ShapeDesc::Sphere { radius: 1.0 }).unwrap();
        let body = world
            .create_body(&BodyDesc::new(shape, MotionType::Static, Vec3::new(0.0, 5.0, 0.0)))
            .unwrap();
        world.update(DT);
        assert_eq!(world.body_transform(body).unwrap().0, Vec3::new(0.0, 5.0, 0.0));
        assert!(matches!(
            world.set_linear_velocity(body, Vec3::x()),
            Err(PhysicsError::StaticBody(_))
        ));
    }

    #[test]
    fn test_mesh_shape_rejected_on_dynamic_body() {
        let mut world = BasicBackend::default();
        let mesh = world
            .create_mesh_shape(
                vec![Vec3::zeros(), Vec3::x(), Vec3::z()],
                vec![0, 1, 2],
            )
            .unwrap();
        assert!(world
            .create_body(&BodyDesc::new(mesh, MotionType::Dynamic, Vec3::zeros()))
            .is_err());
        assert!(world
            .create_mesh_shape(vec![Vec3::zeros()], vec![0, 1, 2])
            .is_err());
    }

    #[test]
    fn test_shape_in_use_cannot_be_removed() {
        let mut world = BasicBackend::default();
        let shape = world.create_shape(ShapeDesc::Sphere { radius: 1.0 }).unwrap();
        let body = world
            .create_body(&BodyDesc::new(shape, MotionType::Static, Vec3::zeros()))
            .unwrap();
        assert!(matches!(world.remove_shape(shape), Err(PhysicsError::ShapeInUse(_, 1))));
        world.remove_body(body).unwrap();
        world.remove_shape(shape).unwrap();
        assert!(world.body_transform(body).is_err());
    }

    #[test]
    fn test_character_walks_and_stays_grounded() {
        let mut world = world_with_floor();
        let character = world
            .create_character(&CharacterDesc {
                position: Vec3::new(0.0, 1.0, 0.0),
                ..CharacterDesc::default()
            })
            .unwrap();

        for _ in 0..120 {
            world.update(DT);
        }
        assert!(world.character_on_ground(character).unwrap());
        assert_relative_eq!(world.character_position(character).unwrap().y, 0.0, epsilon = 1e-4);

        world
            .set_character_velocity(character, Vec3::new(2.0, 0.0, 0.0))
            .unwrap();
        for _ in 0..60 {
            world.update(DT);
        }
        let position = world.character_position(character).unwrap();
        assert_relative_eq!(position.x, 2.0, epsilon = 1e-3);
        assert!(world.character_on_ground(character).unwrap());

        world.character_jump(character, 5.0).unwrap();
        world.update(DT);
        assert!(!world.character_on_ground(character).unwrap());
        assert!(world.character_position(character).unwrap().y > 0.0);
    }
}
