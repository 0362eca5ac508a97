//! Planar geometry used by the junction classifier and rule predicates.
//!
//! World coordinates follow the simulator convention: `x` forward at zero
//! yaw, `y` to the right, `z` up. Yaw is measured in degrees.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Lengths below this are treated as zero
pub const EPSILON: f64 = 1e-9;

/// 2D vector
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    /// X component
    pub x: f64,
    /// Y component
    pub y: f64,
}

impl Vec2 {
    /// Create a new vector
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Zero vector
    #[must_use]
    pub const fn zero() -> Self {
        Self { x: 0.0, y: 0.0 }
    }

    /// Dot product
    #[must_use]
    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Euclidean length
    #[must_use]
    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Distance to another point
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        (self - other).length()
    }

    /// Unit vector in the same direction, or `None` for a degenerate vector
    #[must_use]
    pub fn normalized(self) -> Option<Self> {
        let len = self.length();
        if len < EPSILON || !len.is_finite() {
            None
        } else {
            Some(self / len)
        }
    }

    /// `self × ẑ`, i.e. the vector rotated a quarter turn clockwise
    #[must_use]
    pub const fn cross_up(self) -> Self {
        Self {
            x: self.y,
            y: -self.x,
        }
    }
}

impl Add for Vec2 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

impl Div<f64> for Vec2 {
    type Output = Self;
    fn div(self, rhs: f64) -> Self {
        Self::new(self.x / rhs, self.y / rhs)
    }
}

impl Neg for Vec2 {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

/// 3D vector (locations, velocities, extents)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    /// X component
    pub x: f64,
    /// Y component
    pub y: f64,
    /// Z component
    #[serde(default)]
    pub z: f64,
}

impl Vec3 {
    /// Create a new vector
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Zero vector
    #[must_use]
    pub const fn zero() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
        }
    }

    /// Euclidean length
    #[must_use]
    pub fn length(self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Distance to another point
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        (self - other).length()
    }

    /// Projection onto the ground plane
    #[must_use]
    pub const fn xy(self) -> Vec2 {
        Vec2 {
            x: self.x,
            y: self.y,
        }
    }
}

impl Add for Vec3 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl From<Vec2> for Vec3 {
    fn from(v: Vec2) -> Self {
        Self::new(v.x, v.y, 0.0)
    }
}

/// Location plus heading
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Transform {
    /// Position in world coordinates
    pub location: Vec3,
    /// Heading in degrees
    #[serde(default)]
    pub yaw_deg: f64,
}

impl Transform {
    /// Create a transform
    #[must_use]
    pub const fn new(location: Vec3, yaw_deg: f64) -> Self {
        Self { location, yaw_deg }
    }

    /// Unit vector pointing forward
    #[must_use]
    pub fn forward_vector(&self) -> Vec2 {
        let yaw = self.yaw_deg.to_radians();
        Vec2::new(yaw.cos(), yaw.sin())
    }

    /// Unit vector pointing to the right of the heading
    #[must_use]
    pub fn right_vector(&self) -> Vec2 {
        let yaw = self.yaw_deg.to_radians();
        Vec2::new(-yaw.sin(), yaw.cos())
    }
}

/// Oriented box: centre, half-extents and yaw
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Box centre
    pub location: Vec3,
    /// Half-extents along the box's own axes
    pub extent: Vec3,
    /// Yaw of the box in degrees
    #[serde(default)]
    pub yaw_deg: f64,
}

impl BoundingBox {
    /// Create an oriented box
    #[must_use]
    pub const fn new(location: Vec3, extent: Vec3, yaw_deg: f64) -> Self {
        Self {
            location,
            extent,
            yaw_deg,
        }
    }

    /// Grow the half-extents by `margin`
    #[must_use]
    pub fn expanded(self, margin: Vec3) -> Self {
        Self {
            extent: self.extent + margin,
            ..self
        }
    }

    /// Whether a point lies inside the box (inclusive)
    #[must_use]
    pub fn contains(&self, point: Vec3) -> bool {
        let frame = Transform::new(self.location, self.yaw_deg);
        let rel = point - self.location;
        let local_x = rel.xy().dot(frame.forward_vector());
        let local_y = rel.xy().dot(frame.right_vector());
        local_x.abs() <= self.extent.x
            && local_y.abs() <= self.extent.y
            && rel.z.abs() <= self.extent.z
    }
}

/// Intersect the lines `b1 + t·v1` and `b2 + s·v2`.
///
/// Returns `None` when the lines are parallel or either direction is
/// degenerate.
#[must_use]
pub fn line_intersection(b1: Vec2, v1: Vec2, b2: Vec2, v2: Vec2) -> Option<Vec2> {
    // | v1.x  -v2.x | |t|   |b2.x - b1.x|
    // | v1.y  -v2.y | |s| = |b2.y - b1.y|
    let det = -v1.x * v2.y + v2.x * v1.y;
    if det.abs() < EPSILON {
        return None;
    }
    let d = b2 - b1;
    let s = (v1.x * d.y - v1.y * d.x) / det;
    let point = b2 + v2 * s;
    if point.x.is_finite() && point.y.is_finite() {
        Some(point)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec2, b: Vec2) -> bool {
        a.distance(b) < 1e-9
    }

    #[test]
    fn test_normalized_rejects_zero() {
        assert!(Vec2::zero().normalized().is_none());
        let unit = Vec2::new(3.0, 4.0).normalized().unwrap();
        assert!((unit.length() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_cross_up_is_perpendicular() {
        let v = Vec2::new(2.0, 5.0);
        assert_eq!(v.dot(v.cross_up()), 0.0);
        assert_eq!(Vec2::new(1.0, 0.0).cross_up(), Vec2::new(0.0, -1.0));
    }

    #[test]
    fn test_line_intersection_axes() {
        let p = line_intersection(
            Vec2::new(0.0, 3.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(5.0, 0.0),
            Vec2::new(0.0, 1.0),
        )
        .unwrap();
        assert!(approx(p, Vec2::new(5.0, 3.0)));
    }

    #[test]
    fn test_line_intersection_oblique() {
        // y = x and y = -x + 4 meet at (2, 2)
        let p = line_intersection(
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 4.0),
            Vec2::new(1.0, -1.0),
        )
        .unwrap();
        assert!(approx(p, Vec2::new(2.0, 2.0)));
    }

    #[test]
    fn test_line_intersection_parallel() {
        assert!(line_intersection(
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 1.0),
            Vec2::new(2.0, 0.0),
        )
        .is_none());
    }

    #[test]
    fn test_transform_vectors() {
        let t = Transform::new(Vec3::zero(), 90.0);
        assert!(approx(t.forward_vector(), Vec2::new(0.0, 1.0)));
        assert!(approx(t.right_vector(), Vec2::new(-1.0, 0.0)));
    }

    #[test]
    fn test_bounding_box_contains_rotated() {
        let bb = BoundingBox::new(Vec3::new(10.0, 0.0, 0.0), Vec3::new(4.0, 1.0, 1.0), 90.0);
        assert!(bb.contains(Vec3::new(10.0, 3.5, 0.0)));
        assert!(!bb.contains(Vec3::new(13.5, 0.0, 0.0)));
        assert!(!bb.contains(Vec3::new(10.0, 0.0, 2.0)));
    }
}
