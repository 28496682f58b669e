//! Sample containers filled by the polling sequencer.
//!
//! An axis reading arrives as two bus transactions. [`AxisSample`] only hands
//! out a value once both halves of the same reading are stored, so a
//! half-updated value cannot be observed as valid.

use core::fmt;

/// Accelerometer axis.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        })
    }
}

/// 14-bit reading as reassembled from the low/high register pair.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct AxisValue(u16);

impl AxisValue {
    pub const MAX: u16 = 0x3FFF;

    /// Masks `raw` to 14 bits.
    #[must_use]
    pub const fn new(raw: u16) -> Self {
        Self(raw & Self::MAX)
    }

    /// Combines the high register with the six data bits of the low register.
    #[must_use]
    pub fn from_bytes(low6: u8, high: u8) -> Self {
        Self::new((u16::from(high) << 6) | u16::from(low6 & 0x3F))
    }

    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Two's-complement interpretation of the 14-bit value.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn signed(self) -> i16 {
        // Shift the sign bit into bit 15 and back down arithmetically.
        ((self.0 << 2) as i16) >> 2
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Stage {
    Empty,
    AwaitingHigh { low6: u8 },
    Complete(AxisValue),
}

/// Two-phase builder for one axis: low byte, then high byte, then valid.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AxisSample {
    stage: Stage,
}

impl AxisSample {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            stage: Stage::Empty,
        }
    }

    /// Stores the low register (data in bits 7:2). Invalidates any previous value.
    pub fn low_byte(&mut self, byte: u8) {
        self.stage = Stage::AwaitingHigh { low6: byte >> 2 };
    }

    /// Stores the high register. Ignored unless a low byte is outstanding.
    ///
    /// Returns the completed value.
    pub fn high_byte(&mut self, byte: u8) -> Option<AxisValue> {
        if let Stage::AwaitingHigh { low6 } = self.stage {
            let value = AxisValue::from_bytes(low6, byte);
            self.stage = Stage::Complete(value);
            Some(value)
        } else {
            None
        }
    }

    /// The reading, present only when both halves are stored.
    #[must_use]
    pub const fn value(&self) -> Option<AxisValue> {
        match self.stage {
            Stage::Complete(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self.stage, Stage::Complete(_))
    }

    /// `true` while the high byte of a started reading is outstanding.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self.stage, Stage::AwaitingHigh { .. })
    }

    pub fn clear(&mut self) {
        self.stage = Stage::Empty;
    }
}

impl Default for AxisSample {
    fn default() -> Self {
        Self::new()
    }
}

/// Raw temperature register, two's complement.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TemperatureSample(u8);

impl TemperatureSample {
    #[must_use]
    pub const fn new(raw: u8) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u8 {
        self.0
    }

    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn signed(self) -> i8 {
        self.0 as i8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_appears_only_after_high_byte() {
        let mut sample = AxisSample::new();
        assert_eq!(sample.value(), None);

        sample.low_byte(0xFD);
        assert!(sample.is_pending());
        assert_eq!(sample.value(), None);

        let value = sample.high_byte(0xFF).expect("high byte completes the sample");
        assert_eq!(value.raw(), 0x3FFF);
        assert_eq!(sample.value(), Some(value));
    }

    #[test]
    fn new_low_byte_invalidates_previous_value() {
        let mut sample = AxisSample::new();
        sample.low_byte(0x04);
        sample.high_byte(0x10);
        assert!(sample.is_valid());

        sample.low_byte(0x08);
        assert!(!sample.is_valid());
        assert_eq!(sample.value(), None);
        assert_eq!(sample.high_byte(0x00).map(AxisValue::raw), Some(2));
    }

    #[test]
    fn stray_high_byte_is_ignored() {
        let mut sample = AxisSample::new();
        assert_eq!(sample.high_byte(0x12), None);
        assert!(!sample.is_valid());
    }

    #[test]
    fn signed_views_use_twos_complement() {
        assert_eq!(AxisValue::new(0x3FFF).signed(), -1);
        assert_eq!(AxisValue::new(0x2000).signed(), -8192);
        assert_eq!(AxisValue::new(0x1FFF).signed(), 8191);
        assert_eq!(TemperatureSample::new(0x80).signed(), -128);
        assert_eq!(TemperatureSample::new(0x7F).signed(), 127);
    }
}
