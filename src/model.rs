//! Data models for the loading optimizer.
//!
//! This module defines the fundamental data structures:
//! - `BoxSpec`: The box type to be loaded, with optional weight and value
//! - `ContainerSpec`: The container with its load capacity
//! - `Orientation`: One assignment of the box extents to the container axes
//! - `Placement`: A box anchored at a position with an orientation
//! - `PackResult`: The final, validated layout
//!
//! All lengths are millimeters, weights are kilograms.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::types::{Aabb, Axis, Dimensional, EPSILON, Vec3, quantize};

/// Validation error for box and container data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Invalid dimension: {0}")]
    InvalidDimension(String),
    #[error("Invalid weight: {0}")]
    InvalidWeight(String),
    #[error("Invalid value: {0}")]
    InvalidValue(String),
    #[error("Invalid load capacity: {0}")]
    InvalidLoad(String),
}

fn is_positive_finite(value: f64) -> bool {
    value > 0.0 && value.is_finite()
}

fn validate_dimension(value: f64, name: &str) -> Result<(), ValidationError> {
    if !is_positive_finite(value) {
        return Err(ValidationError::InvalidDimension(format!(
            "{} must be positive, got: {}",
            name, value
        )));
    }
    Ok(())
}

/// Represents the box type to be loaded.
///
/// # Fields
/// * `length` - Extent along the container length when loaded as given
/// * `width` - Extent across the container width when loaded as given
/// * `height` - Vertical extent when loaded as given
/// * `weight` - Optional unit weight in kg (carried through, not used by geometry)
/// * `value` - Optional unit value (carried through, not used by geometry)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BoxSpec {
    pub length: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub value: Option<f64>,
}

impl BoxSpec {
    /// Creates a new box with validation.
    ///
    /// # Examples
    /// ```
    /// use load_it_now::model::BoxSpec;
    ///
    /// assert!(BoxSpec::new(1000.0, 800.0, 500.0).is_ok());
    /// assert!(BoxSpec::new(-10.0, 800.0, 500.0).is_err());
    /// ```
    pub fn new(length: f64, width: f64, height: f64) -> Result<Self, ValidationError> {
        let item = Self {
            length,
            width,
            height,
            weight: None,
            value: None,
        };
        item.validate()?;
        Ok(item)
    }

    /// Sets the unit weight in kg.
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    /// Sets the unit value.
    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    /// Checks all fields, including the optional ones when present.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_dimension(self.length, "Box length")?;
        validate_dimension(self.width, "Box width")?;
        validate_dimension(self.height, "Box height")?;
        if let Some(weight) = self.weight {
            if !(weight >= 0.0 && weight.is_finite()) {
                return Err(ValidationError::InvalidWeight(format!(
                    "Weight must not be negative, got: {}",
                    weight
                )));
            }
        }
        if let Some(value) = self.value {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(ValidationError::InvalidValue(format!(
                    "Value must not be negative, got: {}",
                    value
                )));
            }
        }
        Ok(())
    }

    /// The orientation in which the box is loaded as given: length along the
    /// container length, height up.
    pub fn upright(&self) -> Orientation {
        Orientation::new(self.length, self.height, self.width)
    }

    /// Smallest of the three edges.
    pub fn min_edge(&self) -> f64 {
        self.length.min(self.width).min(self.height)
    }
}

impl Dimensional for BoxSpec {
    fn dimensions(&self) -> Vec3 {
        self.upright().extent()
    }
}

/// Represents a container with a load capacity.
///
/// # Fields
/// * `length` - Inner length (x axis)
/// * `width` - Inner width (z axis)
/// * `height` - Inner height (y axis)
/// * `max_load` - Maximum payload in kg
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ContainerSpec {
    pub length: f64,
    pub width: f64,
    pub height: f64,
    pub max_load: f64,
}

impl ContainerSpec {
    /// Creates a new container with validation.
    pub fn new(length: f64, width: f64, height: f64, max_load: f64) -> Result<Self, ValidationError> {
        let container = Self {
            length,
            width,
            height,
            max_load,
        };
        container.validate()?;
        Ok(container)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_dimension(self.length, "Container length")?;
        validate_dimension(self.width, "Container width")?;
        validate_dimension(self.height, "Container height")?;
        if !(self.max_load >= 0.0 && self.max_load.is_finite()) {
            return Err(ValidationError::InvalidLoad(format!(
                "Maximum load must not be negative, got: {}",
                self.max_load
            )));
        }
        Ok(())
    }

    /// Inner space as a bounding box anchored at the origin.
    pub fn bounds(&self) -> Aabb {
        Aabb::from_position_and_size(Vec3::zero(), self.dimensions())
    }
}

impl Dimensional for ContainerSpec {
    fn dimensions(&self) -> Vec3 {
        Vec3::new(self.length, self.height, self.width)
    }
}

/// Extents of a box along the container's length, height and width axes.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Orientation {
    pub length: f64,
    pub height: f64,
    pub width: f64,
}

impl Orientation {
    #[inline]
    pub const fn new(length: f64, height: f64, width: f64) -> Self {
        Self {
            length,
            height,
            width,
        }
    }

    /// All six axis assignments of these three extents, starting with `self`.
    pub fn permutations(&self) -> [Orientation; 6] {
        let (a, b, c) = (self.length, self.height, self.width);
        [
            Orientation::new(a, b, c),
            Orientation::new(a, c, b),
            Orientation::new(b, a, c),
            Orientation::new(b, c, a),
            Orientation::new(c, a, b),
            Orientation::new(c, b, a),
        ]
    }

    #[inline]
    pub fn extent(&self) -> Vec3 {
        Vec3::new(self.length, self.height, self.width)
    }

    /// Area in the height × width plane (the wall cross-section).
    #[inline]
    pub fn cross_section(&self) -> f64 {
        self.height * self.width
    }

    /// Checks whether the orientation fits the container on every axis.
    #[inline]
    pub fn fits(&self, container: &ContainerSpec) -> bool {
        self.extent().fits_within(&container.dimensions(), EPSILON)
    }

    /// Integer key for equality grouping and hashing.
    #[inline]
    pub fn key(&self) -> (i64, i64, i64) {
        (quantize(self.length), quantize(self.height), quantize(self.width))
    }

    #[inline]
    pub fn same_as(&self, other: &Orientation) -> bool {
        self.key() == other.key()
    }
}

impl Dimensional for Orientation {
    fn dimensions(&self) -> Vec3 {
        self.extent()
    }
}

/// A placed box: anchor position (the corner closest to the origin) plus orientation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Placement {
    pub position: Vec3,
    pub rotation: Orientation,
}

impl Placement {
    #[inline]
    pub const fn new(position: Vec3, rotation: Orientation) -> Self {
        Self { position, rotation }
    }

    /// Bounding box of the placed box.
    #[inline]
    pub fn aabb(&self) -> Aabb {
        Aabb::from_position_and_size(self.position, self.rotation.extent())
    }

    /// Far corner (position + extents).
    #[inline]
    pub fn end(&self) -> Vec3 {
        self.position + self.rotation.extent()
    }

    /// Top surface height.
    #[inline]
    pub fn top(&self) -> f64 {
        self.position.y + self.rotation.height
    }

    /// Returns a copy moved to `value` along `axis`.
    #[inline]
    pub fn moved_to(&self, axis: Axis, value: f64) -> Self {
        Self::new(self.position.with(axis, value), self.rotation)
    }
}

/// Final layout of one packing run.
///
/// # Fields
/// * `placements` - Validated, non-overlapping placements
/// * `total_boxes` - Number of placements
/// * `loaded_weight` - `total_boxes × unit weight` when the box has a weight
/// * `loaded_value` - `total_boxes × unit value` when the box has a value
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct PackResult {
    pub placements: Vec<Placement>,
    pub total_boxes: usize,
    pub loaded_weight: Option<f64>,
    pub loaded_value: Option<f64>,
}

impl PackResult {
    /// Builds the result from validated placements of `item`.
    pub fn new(placements: Vec<Placement>, item: &BoxSpec) -> Self {
        let total_boxes = placements.len();
        Self {
            placements,
            total_boxes,
            loaded_weight: item.weight.map(|w| w * total_boxes as f64),
            loaded_value: item.value.map(|v| v * total_boxes as f64),
        }
    }

    /// A result without any boxes; a valid answer for infeasible inputs.
    pub fn empty(item: &BoxSpec) -> Self {
        Self::new(Vec::new(), item)
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    /// Sum of the volumes of all placed boxes.
    pub fn loaded_volume(&self) -> f64 {
        self.placements.iter().map(|p| p.rotation.volume()).sum()
    }

    /// Volumetric utilization of the container in percent (0.0 to 100.0).
    pub fn volume_utilization(&self, container: &ContainerSpec) -> f64 {
        let total = container.volume();
        if total <= 0.0 {
            return 0.0;
        }
        (self.loaded_volume() / total) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_validation_rejects_non_positive_dimensions() {
        assert!(matches!(
            BoxSpec::new(0.0, 10.0, 10.0),
            Err(ValidationError::InvalidDimension(_))
        ));
        assert!(BoxSpec::new(10.0, f64::NAN, 10.0).is_err());
        assert!(BoxSpec::new(10.0, 10.0, f64::INFINITY).is_err());
    }

    #[test]
    fn box_validation_checks_optional_fields() {
        let item = BoxSpec::new(10.0, 10.0, 10.0).unwrap().with_weight(-1.0);
        assert!(matches!(item.validate(), Err(ValidationError::InvalidWeight(_))));

        let item = BoxSpec::new(10.0, 10.0, 10.0).unwrap().with_value(f64::NAN);
        assert!(matches!(item.validate(), Err(ValidationError::InvalidValue(_))));
    }

    #[test]
    fn container_validation_rejects_zero_extent() {
        assert!(ContainerSpec::new(5900.0, 0.0, 2390.0, 28000.0).is_err());
        assert!(matches!(
            ContainerSpec::new(5900.0, 2340.0, 2390.0, -1.0),
            Err(ValidationError::InvalidLoad(_))
        ));
    }

    #[test]
    fn upright_maps_height_to_vertical_axis() {
        let item = BoxSpec::new(1000.0, 800.0, 500.0).unwrap();
        let upright = item.upright();
        assert_eq!(upright.length, 1000.0);
        assert_eq!(upright.height, 500.0);
        assert_eq!(upright.width, 800.0);
    }

    #[test]
    fn permutations_cover_all_assignments() {
        let o = Orientation::new(1.0, 2.0, 3.0);
        let perms = o.permutations();
        assert_eq!(perms[0], o);
        let mut keys: Vec<_> = perms.iter().map(|p| p.key()).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), 6);
    }

    #[test]
    fn result_carries_weight_and_value() {
        let item = BoxSpec::new(10.0, 10.0, 10.0)
            .unwrap()
            .with_weight(2.5)
            .with_value(4.0);
        let placements = vec![
            Placement::new(Vec3::zero(), item.upright()),
            Placement::new(Vec3::new(10.0, 0.0, 0.0), item.upright()),
        ];
        let result = PackResult::new(placements, &item);
        assert_eq!(result.total_boxes, 2);
        assert_eq!(result.loaded_weight, Some(5.0));
        assert_eq!(result.loaded_value, Some(8.0));

        let container = ContainerSpec::new(20.0, 10.0, 10.0, 100.0).unwrap();
        assert!((result.volume_utilization(&container) - 100.0).abs() < 1e-9);
    }
}
