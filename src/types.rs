//! Common types and traits for 3D geometry.
//!
//! All lengths inside the engine are millimeters. The axis convention is the one
//! used by the loading pipeline: `x` runs along the container length (from the
//! back wall to the door), `y` is vertical and `z` runs across the container width.

use std::ops::Add;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Global numerical tolerance for floating-point comparisons (in millimeters).
///
/// Two faces closer than this are considered touching, never overlapping.
pub const EPSILON: f64 = 1e-6;

/// Tolerance for matching top and bottom faces when reasoning about support.
pub const EPSILON_HEIGHT: f64 = 1e-3;

/// Number of integer steps per millimeter used for hash keys.
pub const QUANTUM_PER_MM: f64 = 1000.0;

/// Converts a length into an integer key with micrometer resolution.
///
/// Used wherever a length takes part in hashing or equality grouping, so that
/// `490.99999999` and `491.0` land on the same key.
#[inline]
pub fn quantize(value: f64) -> i64 {
    (value * QUANTUM_PER_MM).round() as i64
}

/// One of the three container axes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    /// Along the container length (`x`).
    Length,
    /// Vertical (`y`).
    Height,
    /// Across the container width (`z`).
    Width,
}

/// Represents a 3D vector or point in space.
///
/// Used for positions and extents.
///
/// # Examples
/// ```
/// use load_it_now::types::Vec3;
///
/// let position = Vec3::new(1.0, 2.0, 3.0);
/// let extent = Vec3::new(10.0, 20.0, 30.0);
/// let far_corner = position + extent;
/// assert_eq!(far_corner, Vec3::new(11.0, 22.0, 33.0));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize, ToSchema)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    /// Creates a new 3D vector.
    ///
    /// # Parameters
    /// * `x` - Length component
    /// * `y` - Height component
    /// * `z` - Width component
    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Creates a zero vector (origin).
    #[inline]
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Returns the component along `axis`.
    #[inline]
    pub const fn get(&self, axis: Axis) -> f64 {
        match axis {
            Axis::Length => self.x,
            Axis::Height => self.y,
            Axis::Width => self.z,
        }
    }

    /// Returns a copy with the component along `axis` replaced.
    #[inline]
    pub const fn with(mut self, axis: Axis, value: f64) -> Self {
        match axis {
            Axis::Length => self.x = value,
            Axis::Height => self.y = value,
            Axis::Width => self.z = value,
        }
        self
    }

    /// Calculates the volume (product of all components).
    #[inline]
    pub fn volume(&self) -> f64 {
        self.x * self.y * self.z
    }

    /// Checks if the vector fits within another vector (component-wise <=).
    ///
    /// # Parameters
    /// * `outer` - The outer vector (e.g., container extents)
    /// * `tolerance` - Numerical tolerance for the comparison
    #[inline]
    pub fn fits_within(&self, outer: &Self, tolerance: f64) -> bool {
        self.x <= outer.x + tolerance && self.y <= outer.y + tolerance && self.z <= outer.z + tolerance
    }
}

impl Add for Vec3 {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

/// Trait for objects with 3D extents along the container axes.
pub trait Dimensional {
    /// Returns the extents as (length, height, width).
    fn dimensions(&self) -> Vec3;

    /// Calculates the volume.
    fn volume(&self) -> f64 {
        self.dimensions().volume()
    }
}

/// Axis-Aligned Bounding Box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    /// Minimum corner (position)
    pub min: Vec3,
    /// Maximum corner (position + extents)
    pub max: Vec3,
}

impl Aabb {
    #[inline]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Creates a bounding box from position and extents.
    #[inline]
    pub fn from_position_and_size(position: Vec3, size: Vec3) -> Self {
        Self {
            min: position,
            max: position + size,
        }
    }

    /// Checks if two bounding boxes intersect with positive volume.
    ///
    /// Intervals are half-open: boxes that merely share a face do not intersect.
    #[inline]
    pub fn intersects(&self, other: &Self) -> bool {
        self.min.x < other.max.x - EPSILON
            && other.min.x < self.max.x - EPSILON
            && self.min.y < other.max.y - EPSILON
            && other.min.y < self.max.y - EPSILON
            && self.min.z < other.max.z - EPSILON
            && other.min.z < self.max.z - EPSILON
    }

    /// Checks if this box lies completely inside `outer`.
    #[inline]
    pub fn is_within(&self, outer: &Self) -> bool {
        self.min.x >= outer.min.x - EPSILON
            && self.min.y >= outer.min.y - EPSILON
            && self.min.z >= outer.min.z - EPSILON
            && self.max.x <= outer.max.x + EPSILON
            && self.max.y <= outer.max.y + EPSILON
            && self.max.z <= outer.max.z + EPSILON
    }
}
