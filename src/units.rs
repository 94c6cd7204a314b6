//! Length units at the service boundary.
//!
//! The engine only ever sees millimeters. Requests usually arrive in centimeters,
//! the visualization wants meters and batch reports are written in millimeters.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum LengthUnit {
    #[serde(rename = "mm")]
    Millimeter,
    #[default]
    #[serde(rename = "cm")]
    Centimeter,
    #[serde(rename = "m")]
    Meter,
}

impl LengthUnit {
    /// Millimeters per one unit.
    pub const fn millimeters(self) -> f64 {
        match self {
            LengthUnit::Millimeter => 1.0,
            LengthUnit::Centimeter => 10.0,
            LengthUnit::Meter => 1000.0,
        }
    }

    /// Converts a value given in this unit to millimeters.
    #[inline]
    pub fn to_mm(self, value: f64) -> f64 {
        value * self.millimeters()
    }

    /// Converts a value given in millimeters to this unit.
    #[inline]
    pub fn from_mm(self, value: f64) -> f64 {
        value / self.millimeters()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centimeters_convert_to_millimeters() {
        assert_eq!(LengthUnit::Centimeter.to_mm(79.5), 795.0);
        assert_eq!(LengthUnit::Meter.from_mm(12030.0), 12.03);
        assert_eq!(LengthUnit::Millimeter.to_mm(5.0), 5.0);
    }

    #[test]
    fn units_parse_from_symbols() {
        let unit: LengthUnit = serde_json::from_str("\"m\"").expect("valid unit");
        assert_eq!(unit, LengthUnit::Meter);
        assert_eq!(LengthUnit::default(), LengthUnit::Centimeter);
        assert!(serde_json::from_str::<LengthUnit>("\"inch\"").is_err());
    }
}
