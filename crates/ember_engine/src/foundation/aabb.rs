//! Axis-aligned bounding boxes stored as center and half-extent

use super::math::{Transform, Vec3};

/// Axis-aligned bounding box
///
/// An invalid box contains nothing; growing it by a point snaps it onto that
/// point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Center of the box
    pub position: Vec3,
    /// Half size along each axis
    pub extent: Vec3,
    /// False until the box has been grown by at least one point
    pub valid: bool,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::INVALID
    }
}

impl Aabb {
    /// Empty box
    pub const INVALID: Self = Self {
        position: Vec3::new(0.0, 0.0, 0.0),
        extent: Vec3::new(0.0, 0.0, 0.0),
        valid: false,
    };

    /// Box from center and half-extent
    pub fn new(position: Vec3, extent: Vec3) -> Self {
        Self {
            position,
            extent: extent.abs(),
            valid: true,
        }
    }

    /// Box spanning two corners
    pub fn from_min_max(min: Vec3, max: Vec3) -> Self {
        let lo = min.inf(&max);
        let hi = min.sup(&max);
        Self::new((lo + hi) * 0.5, (hi - lo) * 0.5)
    }

    /// Box tightly enclosing all points, invalid when empty
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Vec3>) -> Self {
        let mut aabb = Self::INVALID;
        for point in points {
            aabb.grow_point(point);
        }
        aabb
    }

    /// Minimum corner
    pub fn min(&self) -> Vec3 {
        self.position - self.extent
    }

    /// Maximum corner
    pub fn max(&self) -> Vec3 {
        self.position + self.extent
    }

    /// Grow to include `point`
    pub fn grow_point(&mut self, point: &Vec3) {
        if !self.valid {
            *self = Self::new(*point, Vec3::zeros());
            return;
        }

        let min = self.min();
        let max = self.max();
        let new_min = min.inf(point);
        let new_max = max.sup(point);
        if new_min != min || new_max != max {
            *self = Self::from_min_max(new_min, new_max);
        }
    }

    /// Grow to include every corner of `other`
    pub fn grow_aabb(&mut self, other: &Self) {
        if !other.valid {
            return;
        }
        for corner in other.corners() {
            self.grow_point(&corner);
        }
    }

    /// The eight corners of the box
    pub fn corners(&self) -> [Vec3; 8] {
        let e = self.extent;
        let p = self.position;
        [
            p + Vec3::new(-e.x, -e.y, -e.z),
            p + Vec3::new(e.x, -e.y, -e.z),
            p + Vec3::new(-e.x, e.y, -e.z),
            p + Vec3::new(e.x, e.y, -e.z),
            p + Vec3::new(-e.x, -e.y, e.z),
            p + Vec3::new(e.x, -e.y, e.z),
            p + Vec3::new(-e.x, e.y, e.z),
            p + Vec3::new(e.x, e.y, e.z),
        ]
    }

    /// Whether `point` lies inside or on the boundary
    pub fn contains(&self, point: &Vec3) -> bool {
        if !self.valid {
            return false;
        }
        let d = (point - self.position).abs();
        d.x <= self.extent.x && d.y <= self.extent.y && d.z <= self.extent.z
    }

    /// World-space box enclosing this box after `transform`
    pub fn transformed(&self, transform: &Transform) -> Self {
        if !self.valid {
            return *self;
        }
        let rotation = transform.rotation.to_rotation_matrix();
        let abs_rotation = rotation.matrix().abs();
        Self::new(
            transform.transform_point(&self.position),
            abs_rotation * (self.extent * transform.scale.abs()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Quat;
    use approx::assert_relative_eq;

    #[test]
    fn test_invalid_snaps_to_first_point() {
        let mut aabb = Aabb::INVALID;
        aabb.grow_point(&Vec3::new(1.0, 2.0, 3.0));
        assert!(aabb.valid);
        assert_eq!(aabb.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(aabb.extent, Vec3::zeros());
    }

    #[test]
    fn test_grow_contains_all_points() {
        let points = [
            Vec3::new(-1.0, 0.0, 2.0),
            Vec3::new(3.0, -4.0, 0.5),
            Vec3::new(0.0, 1.0, -2.0),
        ];
        let aabb = Aabb::from_points(points.iter());
        for p in &points {
            assert!(aabb.contains(p));
        }
        assert_relative_eq!(aabb.min(), Vec3::new(-1.0, -4.0, -2.0));
        assert_relative_eq!(aabb.max(), Vec3::new(3.0, 1.0, 2.0));
    }

    #[test]
    fn test_inside_point_leaves_box_unchanged() {
        let mut aabb = Aabb::new(Vec3::new(0.3, 0.1, -0.7), Vec3::new(1.0, 2.0, 3.0));
        let before = aabb;
        aabb.grow_point(&Vec3::new(0.5, 0.5, 0.5));
        assert_eq!(aabb, before);
    }

    #[test]
    fn test_grow_by_invalid_is_noop() {
        let mut aabb = Aabb::new(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0));
        let before = aabb;
        aabb.grow_aabb(&Aabb::INVALID);
        assert_eq!(aabb, before);
    }

    #[test]
    fn test_transformed_rotation_expands_extent() {
        let aabb = Aabb::new(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0));
        let rotation = Quat::from_axis_angle(&Vec3::y_axis(), std::f32::consts::FRAC_PI_4);
        let t = Transform::new(Vec3::new(5.0, 0.0, 0.0), rotation, 2.0);

        let world = aabb.transformed(&t);
        assert_relative_eq!(world.position, Vec3::new(5.0, 0.0, 0.0), epsilon = 1e-5);
        let diag = 2.0 * std::f32::consts::SQRT_2;
        assert_relative_eq!(world.extent, Vec3::new(diag, 2.0, diag), epsilon = 1e-4);
    }
}
