//! Type-safe wrappers for physical units
//!
//! Newtype wrappers around f32 to prevent unit confusion between adapters
//! that report the same quantity in different units.
//!
//! All unit types serialize with 4 decimal places to keep preview/config
//! JSON payloads small.

use serde::{Deserialize, Serialize};

/// Round f32 to 4 decimal places for compact JSON serialization
fn round4<S: serde::Serializer>(val: &f32, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f32((*val * 10000.0).round() / 10000.0)
}

/// Meters
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Meters(#[serde(serialize_with = "round4")] pub f32);

/// Meters per second
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetersPerSecond(#[serde(serialize_with = "round4")] pub f32);

/// Kilometers per hour
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KilometersPerHour(#[serde(serialize_with = "round4")] pub f32);

impl MetersPerSecond {
    pub fn to_kmh(self) -> KilometersPerHour {
        KilometersPerHour(self.0 * 3.6)
    }
}

/// Radians
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Radians(#[serde(serialize_with = "round4")] pub f32);

/// Revolutions per minute
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rpm(#[serde(serialize_with = "round4")] pub f32);

impl Rpm {
    pub fn from_rps(rps: f32) -> Self {
        Self(rps * 60.0 / (2.0 * std::f32::consts::PI))
    }
}

/// Celsius
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Celsius(#[serde(serialize_with = "round4")] pub f32);

/// Kilopascals (tyre pressure)
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Kilopascals(#[serde(serialize_with = "round4")] pub f32);

/// Percentage (0.0 to 1.0)
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Percentage(#[serde(serialize_with = "round4")] pub f32);

impl Percentage {
    /// Create a new percentage, clamping to [0.0, 1.0]
    pub fn new(value: f32) -> Self {
        Self(value.clamp(0.0, 1.0))
    }

    /// Get as percentage (0-100)
    pub fn as_percent(&self) -> f32 {
        self.0 * 100.0
    }
}

/// Seconds (timestamps, durations)
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Seconds(#[serde(serialize_with = "round4")] pub f32);

/// Liters (fuel)
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Liters(#[serde(serialize_with = "round4")] pub f32);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_clamp() {
        let p = Percentage::new(1.5);
        assert_eq!(p.0, 1.0);

        let p = Percentage::new(-0.5);
        assert_eq!(p.0, 0.0);

        let p = Percentage::new(0.5);
        assert_eq!(p.0, 0.5);
    }

    #[test]
    fn test_percentage_as_percent() {
        let p = Percentage::new(0.75);
        assert!((p.as_percent() - 75.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_mps_to_kmh() {
        let v = MetersPerSecond(10.0);
        assert!((v.to_kmh().0 - 36.0).abs() < 1e-5);
    }

    #[test]
    fn test_rpm_from_rps() {
        // 2*pi rad/s is one revolution per second, i.e. 60 rpm
        let rpm = Rpm::from_rps(2.0 * std::f32::consts::PI);
        assert!((rpm.0 - 60.0).abs() < 1e-3);
    }
}
