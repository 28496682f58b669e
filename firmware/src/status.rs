#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Shared status storage for the firmware target.
//!
//! The controller task publishes a few counters after every tick; the light
//! task reads them for its periodic heartbeat without touching the
//! controller itself.

use brakelight_core::bus::BusLink;
use brakelight_core::controller::Controller;
use brakelight_core::output::LightPattern;
use portable_atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

/// Channel mask of the pattern last selected by the controller.
static LIGHT_CHANNELS: AtomicU8 = AtomicU8::new(0);
/// Completed sensor read cycles.
static CYCLES: AtomicU32 = AtomicU32::new(0);
/// Acknowledge slots the sensor left unanswered.
static MISSED_ACKS: AtomicU32 = AtomicU32::new(0);
/// Bus engine is waiting on an acknowledge that never came.
static STALLED: AtomicBool = AtomicBool::new(false);

/// Copy of the published counters.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FirmwareStatus {
    pub channels: u8,
    pub cycles: u32,
    pub missed_acks: u32,
    pub stalled: bool,
}

/// Publishes the controller state after a tick.
pub fn record<L: BusLink>(controller: &Controller<L>) {
    let pattern = LightPattern::select(&controller.outputs());
    LIGHT_CHANNELS.store(pattern.channels(), Ordering::Relaxed);
    CYCLES.store(controller.sequencer().cycles(), Ordering::Relaxed);
    MISSED_ACKS.store(controller.engine().missed_acks(), Ordering::Relaxed);
    STALLED.store(controller.is_stalled(), Ordering::Relaxed);
}

pub fn snapshot() -> FirmwareStatus {
    FirmwareStatus {
        channels: LIGHT_CHANNELS.load(Ordering::Relaxed),
        cycles: CYCLES.load(Ordering::Relaxed),
        missed_acks: MISSED_ACKS.load(Ordering::Relaxed),
        stalled: STALLED.load(Ordering::Relaxed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brakelight_core::bus::IdleBusLink;
    use brakelight_core::controller::{ControllerConfig, ControllerInputs};
    use brakelight_core::decision::SensitivityProfile;
    use brakelight_core::output::channel;

    #[test]
    fn publishes_stalled_controller() {
        let mut controller = Controller::new(ControllerConfig::DEFAULT, IdleBusLink).unwrap();
        for _ in 0..100 {
            controller.tick(ControllerInputs::powered(SensitivityProfile::Medium));
        }
        record(&controller);

        let status = snapshot();
        assert!(status.stalled);
        assert!(status.missed_acks > 0);
        assert_eq!(status.cycles, 0);
        assert_eq!(status.channels, channel::RUNNING);
    }
}
