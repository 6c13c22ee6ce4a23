//! Math utilities and types
//!
//! Provides fundamental math types for 3D graphics and game development.

pub use nalgebra::{
    Vector2, Vector3, Vector4,
    Matrix3, Matrix4,
    Quaternion,
    Unit,
    UnitQuaternion,
};
use std::ops::Mul;

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Quaternion type for rotations
pub type Quat = UnitQuaternion<f32>;

/// Position, rotation and uniform scale
///
/// Composition `a * b` applies `b` first and then `a`: `b`'s position is
/// scaled and rotated by `a` before `a`'s position is added. Uniform scale
/// keeps the composition closed (no shear).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Translation
    pub position: Vec3,

    /// Rotation quaternion
    pub rotation: Quat,

    /// Uniform scale factor
    pub scale: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    /// The identity transform
    pub const IDENTITY: Self = Self {
        position: Vec3::new(0.0, 0.0, 0.0),
        rotation: Unit::new_unchecked(Quaternion::new(1.0, 0.0, 0.0, 0.0)),
        scale: 1.0,
    };

    /// Create a new transform
    pub fn new(position: Vec3, rotation: Quat, scale: f32) -> Self {
        Self {
            position,
            rotation,
            scale,
        }
    }

    /// Create a transform with only position
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    /// Create a transform with position and rotation
    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            scale: 1.0,
        }
    }

    /// Convert to a transformation matrix (T * R * S)
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.position)
            * self.rotation.to_homogeneous()
            * Mat4::new_scaling(self.scale)
    }

    /// Apply this transform to a point
    pub fn transform_point(&self, point: &Vec3) -> Vec3 {
        self.position + self.rotation * (point * self.scale)
    }

    /// Apply this transform to a direction (no translation)
    pub fn transform_vector(&self, vector: &Vec3) -> Vec3 {
        self.rotation * (vector * self.scale)
    }

    /// Get the inverse transform
    pub fn inverse(&self) -> Self {
        let inv_scale = if self.scale.abs() > f32::EPSILON {
            1.0 / self.scale
        } else {
            0.0
        };
        let inv_rotation = self.rotation.inverse();
        Self {
            position: inv_rotation * (-self.position * inv_scale),
            rotation: inv_rotation,
            scale: inv_scale,
        }
    }

    /// Direction the local -Z axis points to
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::new(0.0, 0.0, -1.0)
    }
}

impl Mul for Transform {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self {
            position: self.position + self.rotation * (rhs.position * self.scale),
            rotation: self.rotation * rhs.rotation,
            scale: self.scale * rhs.scale,
        }
    }
}

impl Mul<&Transform> for &Transform {
    type Output = Transform;

    fn mul(self, rhs: &Transform) -> Transform {
        *self * *rhs
    }
}

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;
}

/// Math utility functions
pub mod utils {
    use super::{constants, Quat};

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * constants::DEG_TO_RAD
    }

    /// Rotation from euler angles in degrees (applied X, then Y, then Z)
    pub fn quat_from_euler_degrees(x: f32, y: f32, z: f32) -> Quat {
        Quat::from_euler_angles(deg_to_rad(x), deg_to_rad(y), deg_to_rad(z))
    }
}

/// Extension trait for Mat4 with projection helpers
pub trait Mat4Ext {
    /// Create a perspective projection matrix (depth 0..1)
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4;

    /// Axis flip from the Y-up right-handed world into Vulkan clip conventions
    fn vulkan_coordinate_transform() -> Mat4;
}

impl Mat4Ext for Mat4 {
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        // P from https://johannesugb.github.io/gpu-programming/setting-up-a-proper-vulkan-projection-matrix/
        let tan_half_fovy = (fov_y * 0.5).tan();

        let mut result = Mat4::zeros();
        result[(0, 0)] = 1.0 / (aspect * tan_half_fovy);
        result[(1, 1)] = 1.0 / tan_half_fovy;
        result[(2, 2)] = far / (far - near);
        result[(2, 3)] = -(near * far) / (far - near);
        result[(3, 2)] = 1.0;

        result
    }

    fn vulkan_coordinate_transform() -> Mat4 {
        Mat4::new(
            1.0,  0.0,  0.0, 0.0,
            0.0, -1.0,  0.0, 0.0,
            0.0,  0.0, -1.0, 0.0,
            0.0,  0.0,  0.0, 1.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::{Rng, SeedableRng};

    const EPSILON: f32 = 1e-4;

    fn random_transform(rng: &mut impl Rng) -> Transform {
        let axis = Vec3::new(
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
        );
        let rotation = Unit::try_new(axis, 1e-3)
            .map_or(Quat::identity(), |axis| {
                Quat::from_axis_angle(&axis, rng.gen_range(-3.0..3.0))
            });
        Transform::new(
            Vec3::new(
                rng.gen_range(-10.0..10.0),
                rng.gen_range(-10.0..10.0),
                rng.gen_range(-10.0..10.0),
            ),
            rotation,
            rng.gen_range(0.25..4.0),
        )
    }

    #[test]
    fn test_identity_is_exact_neutral_element() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(11);
        for _ in 0..64 {
            let a = random_transform(&mut rng);
            assert_eq!(Transform::IDENTITY * a, a);
            assert_eq!(a * Transform::IDENTITY, a);
        }
    }

    #[test]
    fn test_composition_is_associative() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        for _ in 0..256 {
            let a = random_transform(&mut rng);
            let b = random_transform(&mut rng);
            let c = random_transform(&mut rng);

            let left = (a * b) * c;
            let right = a * (b * c);

            assert_relative_eq!(left.position, right.position, epsilon = 1e-2, max_relative = EPSILON);
            assert_relative_eq!(left.rotation, right.rotation, epsilon = EPSILON);
            assert_relative_eq!(left.scale, right.scale, max_relative = EPSILON);
        }
    }

    #[test]
    fn test_composition_matches_matrix_product() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(3);
        let a = random_transform(&mut rng);
        let b = random_transform(&mut rng);

        let composed = (a * b).to_matrix();
        let multiplied = a.to_matrix() * b.to_matrix();
        assert_relative_eq!(composed, multiplied, epsilon = 1e-3);
    }

    #[test]
    fn test_inverse_roundtrip() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(5);
        let a = random_transform(&mut rng);
        let point = Vec3::new(1.0, -2.0, 0.5);

        let back = a.inverse().transform_point(&a.transform_point(&point));
        assert_relative_eq!(back, point, epsilon = 1e-3);
    }

    #[test]
    fn test_forward_points_down_negative_z() {
        let t = Transform::IDENTITY;
        assert_relative_eq!(t.forward(), Vec3::new(0.0, 0.0, -1.0));
    }
}
