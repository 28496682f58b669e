//! Accelerometer register map and configuration encodings.
//!
//! Offsets and bit positions follow the BMA180 data sheet: axis readings are
//! 14-bit values split across an LSB register (bits 7:2, bit 0 = new data)
//! and an MSB register, and the temperature register holds a
//! two's-complement byte.

use core::fmt;

pub mod registers {
    //! Register offsets consumed by the polling program.

    use crate::sample::Axis;

    pub const ACC_X_LSB: u8 = 0x02;
    pub const ACC_X_MSB: u8 = 0x03;
    pub const ACC_Y_LSB: u8 = 0x04;
    pub const ACC_Y_MSB: u8 = 0x05;
    pub const ACC_Z_LSB: u8 = 0x06;
    pub const ACC_Z_MSB: u8 = 0x07;
    pub const TEMP: u8 = 0x08;
    /// Bandwidth (bits 7:4) and temperature-compensation register.
    pub const BW_TCS: u8 = 0x20;
    /// Full-scale range lives in bits 3:1.
    pub const OFFSET_LSB1: u8 = 0x35;

    /// `(low, high)` register pair for an axis.
    #[must_use]
    pub const fn axis_registers(axis: Axis) -> (u8, u8) {
        match axis {
            Axis::X => (ACC_X_LSB, ACC_X_MSB),
            Axis::Y => (ACC_Y_LSB, ACC_Y_MSB),
            Axis::Z => (ACC_Z_LSB, ACC_Z_MSB),
        }
    }
}

/// Digital low-pass filter bandwidth.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum Bandwidth {
    #[default]
    Hz10,
    Hz20,
    Hz40,
    Hz75,
    Hz150,
    Hz300,
    Hz600,
    Hz1200,
}

impl Bandwidth {
    const fn code(self) -> u8 {
        match self {
            Bandwidth::Hz10 => 0,
            Bandwidth::Hz20 => 1,
            Bandwidth::Hz40 => 2,
            Bandwidth::Hz75 => 3,
            Bandwidth::Hz150 => 4,
            Bandwidth::Hz300 => 5,
            Bandwidth::Hz600 => 6,
            Bandwidth::Hz1200 => 7,
        }
    }

    /// Value written to [`registers::BW_TCS`].
    #[must_use]
    pub const fn register_value(self) -> u8 {
        self.code() << 4
    }

    #[must_use]
    pub const fn hertz(self) -> u16 {
        match self {
            Bandwidth::Hz10 => 10,
            Bandwidth::Hz20 => 20,
            Bandwidth::Hz40 => 40,
            Bandwidth::Hz75 => 75,
            Bandwidth::Hz150 => 150,
            Bandwidth::Hz300 => 300,
            Bandwidth::Hz600 => 600,
            Bandwidth::Hz1200 => 1200,
        }
    }
}

/// Full-scale measurement range.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum Range {
    G1,
    G1_5,
    #[default]
    G2,
    G3,
    G4,
    G8,
    G16,
}

impl Range {
    const fn code(self) -> u8 {
        match self {
            Range::G1 => 0,
            Range::G1_5 => 1,
            Range::G2 => 2,
            Range::G3 => 3,
            Range::G4 => 4,
            Range::G8 => 5,
            Range::G16 => 6,
        }
    }

    /// Value written to [`registers::OFFSET_LSB1`].
    #[must_use]
    pub const fn register_value(self) -> u8 {
        self.code() << 1
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Range::G1 => "1g",
            Range::G1_5 => "1.5g",
            Range::G2 => "2g",
            Range::G3 => "3g",
            Range::G4 => "4g",
            Range::G8 => "8g",
            Range::G16 => "16g",
        })
    }
}
