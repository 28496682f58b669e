//! Pin-level adapters between the STM32 GPIO and `brakelight-core`.
//!
//! [`PinBus`] bit-bangs the sensor bus on two open-drain pins,
//! [`IndicatorLights`] drives the lamp outputs and [`ControlInputs`] samples
//! the enable switch and the two-bit profile selector.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use brakelight_core::output::{LightPattern, channel};

/// Lamp channels in output pin order.
pub const LAMP_CHANNELS: [u8; 4] = [
    channel::RUNNING,
    channel::BRAKE,
    channel::BOOST,
    channel::WARNING,
];

/// Level of every lamp for `pattern`, in [`LAMP_CHANNELS`] order.
#[must_use]
pub fn lamp_levels(pattern: LightPattern) -> [bool; 4] {
    let mask = pattern.channels();
    LAMP_CHANNELS.map(|bit| mask & bit != 0)
}

/// Selector code from the two selector pins, bit 0 first.
#[must_use]
pub fn selector_code(bit0: bool, bit1: bool) -> u8 {
    u8::from(bit0) | (u8::from(bit1) << 1)
}

#[cfg(target_os = "none")]
mod pins {
    use brakelight_core::bus::{BusDrive, BusLink, SclDrive, SdaDrive};
    use brakelight_core::controller::ControllerInputs;
    use brakelight_core::decision::SensitivityProfile;
    use brakelight_core::output::{LightPattern, OutputSink};
    use embassy_stm32::gpio::{Input, Level, Output, OutputOpenDrain};

    use super::{lamp_levels, selector_code};

    /// Core cycles spent in each half of a clock pulse (about 5 us at 64 MHz).
    const PHASE_CYCLES: u32 = 320;

    /// Sensor bus on two open-drain pins with external pull-ups.
    pub struct PinBus<'d> {
        scl: OutputOpenDrain<'d>,
        sda: OutputOpenDrain<'d>,
    }

    impl<'d> PinBus<'d> {
        pub fn new(scl: OutputOpenDrain<'d>, sda: OutputOpenDrain<'d>) -> Self {
            Self { scl, sda }
        }

        fn drive_sda(&mut self, drive: SdaDrive) {
            match drive {
                SdaDrive::Low => self.sda.set_low(),
                SdaDrive::Released => self.sda.set_high(),
            }
        }
    }

    impl BusLink for PinBus<'_> {
        fn period(&mut self, drive: BusDrive) -> bool {
            match drive.scl {
                SclDrive::Pulse => {
                    self.scl.set_low();
                    self.drive_sda(drive.sda);
                    cortex_m::asm::delay(PHASE_CYCLES);
                    let sampled = self.sda.is_high();
                    self.scl.set_high();
                    cortex_m::asm::delay(PHASE_CYCLES);
                    sampled
                }
                SclDrive::Low => {
                    self.scl.set_low();
                    self.drive_sda(drive.sda);
                    cortex_m::asm::delay(PHASE_CYCLES);
                    self.sda.is_high()
                }
                SclDrive::High => {
                    // With SCL already high this edge is a START or STOP.
                    self.drive_sda(drive.sda);
                    cortex_m::asm::delay(PHASE_CYCLES);
                    self.scl.set_high();
                    cortex_m::asm::delay(PHASE_CYCLES);
                    self.sda.is_high()
                }
            }
        }
    }

    /// Running, brake, boost and warning lamps.
    pub struct IndicatorLights<'d> {
        lamps: [Output<'d>; 4],
    }

    impl<'d> IndicatorLights<'d> {
        pub fn new(
            running: Output<'d>,
            brake: Output<'d>,
            boost: Output<'d>,
            warning: Output<'d>,
        ) -> Self {
            Self {
                lamps: [running, brake, boost, warning],
            }
        }
    }

    impl OutputSink for IndicatorLights<'_> {
        fn apply(&mut self, pattern: LightPattern) {
            for (lamp, on) in self.lamps.iter_mut().zip(lamp_levels(pattern)) {
                lamp.set_level(Level::from(on));
            }
        }
    }

    /// Enable switch plus the two profile selector pins.
    pub struct ControlInputs<'d> {
        enable: Input<'d>,
        select0: Input<'d>,
        select1: Input<'d>,
    }

    impl<'d> ControlInputs<'d> {
        pub fn new(enable: Input<'d>, select0: Input<'d>, select1: Input<'d>) -> Self {
            Self {
                enable,
                select0,
                select1,
            }
        }

        pub fn read(&self) -> ControllerInputs {
            ControllerInputs {
                enable: self.enable.is_high(),
                sensitivity: SensitivityProfile::from_selector(selector_code(
                    self.select0.is_high(),
                    self.select1.is_high(),
                )),
            }
        }
    }
}

#[cfg(target_os = "none")]
pub use pins::{ControlInputs, IndicatorLights, PinBus};

#[cfg(test)]
mod tests {
    use super::*;
    use brakelight_core::decision::SensitivityProfile;

    #[test]
    fn hard_brake_lights_three_lamps() {
        assert_eq!(
            lamp_levels(LightPattern::HardBrake),
            [true, true, true, false]
        );
        assert_eq!(lamp_levels(LightPattern::Off), [false; 4]);
    }

    #[test]
    fn selector_pins_map_to_profiles() {
        let profile = |b0, b1| SensitivityProfile::from_selector(selector_code(b0, b1));
        assert_eq!(profile(false, false), SensitivityProfile::Disabled);
        assert_eq!(profile(true, false), SensitivityProfile::Low);
        assert_eq!(profile(false, true), SensitivityProfile::Medium);
        assert_eq!(profile(true, true), SensitivityProfile::High);
    }
}
