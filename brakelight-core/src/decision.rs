//! Threshold decisions evaluated on fresh samples.
//!
//! - intensity: Z reading against the active [`SensitivityProfile`] table
//! - tipover: X reading against a fixed window
//! - temperature warning: raw temperature byte against a configurable threshold

use core::fmt;

use crate::sample::{AxisValue, TemperatureSample};

/// Readings at or above this bound are outside the declared range.
pub const INTENSITY_UPPER_BOUND: u16 = 4_000;

/// Lower edge of the tilt window on the X axis.
pub const TIPOVER_LOW: u16 = 3_000;
/// Upper (exclusive) edge of the tilt window on the X axis.
pub const TIPOVER_HIGH: u16 = 13_384;

/// Largest raw temperature byte that still reads as non-negative.
pub const TEMPERATURE_POSITIVE_MAX: u8 = 0x7F;
/// Default warning threshold, raw register units.
pub const DEFAULT_TEMPERATURE_THRESHOLD: u8 = 50;

/// Externally selected sensitivity.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum SensitivityProfile {
    Low,
    #[default]
    Medium,
    High,
    Disabled,
}

impl SensitivityProfile {
    /// Decodes the 2-bit selector input.
    #[must_use]
    pub const fn from_selector(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => SensitivityProfile::Disabled,
            0b01 => SensitivityProfile::Low,
            0b10 => SensitivityProfile::Medium,
            _ => SensitivityProfile::High,
        }
    }

    #[must_use]
    pub const fn selector(self) -> u8 {
        match self {
            SensitivityProfile::Disabled => 0b00,
            SensitivityProfile::Low => 0b01,
            SensitivityProfile::Medium => 0b10,
            SensitivityProfile::High => 0b11,
        }
    }

    /// Threshold pair for the profile; `None` when disabled.
    #[must_use]
    pub const fn thresholds(self) -> Option<IntensityThresholds> {
        match self {
            SensitivityProfile::Low => Some(LOW_PROFILE),
            SensitivityProfile::Medium => Some(MEDIUM_PROFILE),
            SensitivityProfile::High => Some(HIGH_PROFILE),
            SensitivityProfile::Disabled => None,
        }
    }
}

impl fmt::Display for SensitivityProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SensitivityProfile::Low => "low",
            SensitivityProfile::Medium => "medium",
            SensitivityProfile::High => "high",
            SensitivityProfile::Disabled => "off",
        })
    }
}

/// Deceleration level, 2-bit encoded.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum IntensityCode {
    #[default]
    None,
    Low,
    High,
    /// `0b11`; never produced by [`intensity`].
    Reserved,
}

impl IntensityCode {
    #[must_use]
    pub const fn bits(self) -> u8 {
        match self {
            IntensityCode::None => 0b00,
            IntensityCode::Low => 0b01,
            IntensityCode::High => 0b10,
            IntensityCode::Reserved => 0b11,
        }
    }

    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => IntensityCode::None,
            0b01 => IntensityCode::Low,
            0b10 => IntensityCode::High,
            _ => IntensityCode::Reserved,
        }
    }

    /// LOW bit of the encoding.
    #[must_use]
    pub const fn low_bit(self) -> bool {
        self.bits() & 0b01 != 0
    }

    /// HIGH bit of the encoding.
    #[must_use]
    pub const fn high_bit(self) -> bool {
        self.bits() & 0b10 != 0
    }
}

impl fmt::Display for IntensityCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IntensityCode::None => "none",
            IntensityCode::Low => "low",
            IntensityCode::High => "high",
            IntensityCode::Reserved => "reserved",
        })
    }
}

/// Ordered threshold pair, `low < high < INTENSITY_UPPER_BOUND`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct IntensityThresholds {
    pub low: u16,
    pub high: u16,
}

impl IntensityThresholds {
    #[must_use]
    pub const fn new(low: u16, high: u16) -> Self {
        Self { low, high }
    }

    #[must_use]
    pub const fn classify(self, z: u16) -> IntensityCode {
        if z >= INTENSITY_UPPER_BOUND || z < self.low {
            IntensityCode::None
        } else if z < self.high {
            IntensityCode::Low
        } else {
            IntensityCode::High
        }
    }
}

pub const LOW_PROFILE: IntensityThresholds = IntensityThresholds::new(1_025, 1_640);
pub const MEDIUM_PROFILE: IntensityThresholds = IntensityThresholds::new(820, 1_435);
pub const HIGH_PROFILE: IntensityThresholds = IntensityThresholds::new(615, 1_230);

/// Classifies a Z reading. `Disabled` always yields [`IntensityCode::None`].
#[must_use]
pub const fn intensity(profile: SensitivityProfile, z: AxisValue) -> IntensityCode {
    match profile.thresholds() {
        Some(table) => table.classify(z.raw()),
        None => IntensityCode::None,
    }
}

/// Unfiltered tilt flag for an X reading.
#[must_use]
pub const fn tipover(x: AxisValue) -> bool {
    let raw = x.raw();
    raw >= TIPOVER_LOW && raw < TIPOVER_HIGH
}

/// `true` iff `threshold <= raw <= 127`, comparing raw register bytes.
///
/// Negative readings occupy `128..=255` and therefore never warn, whatever
/// the threshold.
#[must_use]
pub const fn temperature_warning(threshold: u8, reading: TemperatureSample) -> bool {
    let raw = reading.raw();
    raw >= threshold && raw <= TEMPERATURE_POSITIVE_MAX
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_round_trip() {
        for bits in 0..4 {
            assert_eq!(SensitivityProfile::from_selector(bits).selector(), bits);
        }
        assert_eq!(
            SensitivityProfile::from_selector(0),
            SensitivityProfile::Disabled
        );
    }

    #[test]
    fn medium_profile_boundaries() {
        let at = |raw| intensity(SensitivityProfile::Medium, AxisValue::new(raw));
        assert_eq!(at(819), IntensityCode::None);
        assert_eq!(at(820), IntensityCode::Low);
        assert_eq!(at(1_434), IntensityCode::Low);
        assert_eq!(at(1_435), IntensityCode::High);
        assert_eq!(at(3_999), IntensityCode::High);
        assert_eq!(at(4_000), IntensityCode::None);
    }

    #[test]
    fn profiles_are_ordered_by_sensitivity() {
        let z = AxisValue::new(700);
        assert_eq!(intensity(SensitivityProfile::Low, z), IntensityCode::None);
        assert_eq!(intensity(SensitivityProfile::Medium, z), IntensityCode::None);
        assert_eq!(intensity(SensitivityProfile::High, z), IntensityCode::Low);
    }

    #[test]
    fn disabled_profile_suppresses_everything() {
        for raw in [0, 900, 1_500, 3_000] {
            assert_eq!(
                intensity(SensitivityProfile::Disabled, AxisValue::new(raw)),
                IntensityCode::None
            );
        }
    }

    #[test]
    fn intensity_bits_encode_two_levels() {
        assert!(IntensityCode::Low.low_bit());
        assert!(!IntensityCode::Low.high_bit());
        assert!(IntensityCode::High.high_bit());
        assert_eq!(IntensityCode::from_bits(0b11), IntensityCode::Reserved);
    }

    #[test]
    fn tipover_window_edges() {
        assert!(!tipover(AxisValue::new(TIPOVER_LOW - 1)));
        assert!(tipover(AxisValue::new(TIPOVER_LOW)));
        assert!(tipover(AxisValue::new(TIPOVER_HIGH - 1)));
        assert!(!tipover(AxisValue::new(TIPOVER_HIGH)));
    }

    #[test]
    fn temperature_band_excludes_negative_encodings() {
        let warn = |raw| temperature_warning(40, TemperatureSample::new(raw));
        assert!(!warn(39));
        assert!(warn(40));
        assert!(warn(127));
        assert!(!warn(128));
        assert!(!warn(255));
    }
}
