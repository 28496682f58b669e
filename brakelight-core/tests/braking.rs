use brakelight_core::bus::emulated::{EmulatedBus, EmulatedSensor};
use brakelight_core::controller::{Controller, ControllerConfig, ControllerInputs};
use brakelight_core::decision::{IntensityCode, SensitivityProfile};
use brakelight_core::output::LightPattern;
use brakelight_core::repl::commands::BenchController;
use brakelight_core::sample::Axis;
use brakelight_core::telemetry::{FilterId, TelemetryEventKind};

const MEDIUM: ControllerInputs = ControllerInputs {
    enable: true,
    sensitivity: SensitivityProfile::Medium,
};

/// Tick on which the first Z reading completes.
const Z_HIGH_DONE: u64 = 240;
/// Debounce confirm window in ticks.
const CONFIRM: u64 = 521;

fn controller_with(x: u16, z: u16, temperature: u8) -> BenchController {
    let config = ControllerConfig::DEFAULT;
    let mut sensor = EmulatedSensor::new(config.address);
    sensor.set_axis(Axis::X, x);
    sensor.set_axis(Axis::Z, z);
    sensor.set_temperature(temperature);
    Controller::new(config, EmulatedBus::new(sensor)).unwrap()
}

fn run_until(controller: &mut BenchController, inputs: ControllerInputs, tick: u64) -> LightPattern {
    while controller.ticks() < tick {
        controller.tick(inputs);
    }
    LightPattern::select(&controller.outputs())
}

#[test]
fn level_ride_shows_running_lights() {
    let mut controller = controller_with(120, 300, 0x19);
    assert_eq!(run_until(&mut controller, MEDIUM, 5_000), LightPattern::Running);
    assert_eq!(controller.outputs().intensity, IntensityCode::None);
    assert!(controller.outputs().x_valid);
}

#[test]
fn moderate_braking_raises_after_confirm_window() {
    let mut controller = controller_with(120, 1_000, 0x19);

    run_until(&mut controller, MEDIUM, Z_HIGH_DONE);
    assert_eq!(controller.outputs().intensity, IntensityCode::Low);
    assert!(!controller.outputs().decel_low);

    // Filters see the decision one tick late, the synchroniser adds two and
    // the output rises the tick after the window closes.
    let rise = Z_HIGH_DONE + CONFIRM + 3;
    run_until(&mut controller, MEDIUM, rise - 1);
    assert!(!controller.outputs().decel_low);
    assert_eq!(run_until(&mut controller, MEDIUM, rise), LightPattern::Brake);
    assert!(controller.outputs().decel_low);
    assert!(controller.outputs().decel);
    assert!(!controller.outputs().decel_boost);
}

#[test]
fn hard_braking_adds_boost() {
    let mut controller = controller_with(120, 1_500, 0x19);

    assert_eq!(
        run_until(&mut controller, MEDIUM, Z_HIGH_DONE + CONFIRM + 3),
        LightPattern::Brake
    );
    assert!(!controller.outputs().decel_low);

    assert_eq!(
        run_until(&mut controller, MEDIUM, Z_HIGH_DONE + 2 * CONFIRM + 10),
        LightPattern::HardBrake
    );
}

#[test]
fn brake_light_holds_after_release() {
    let mut controller = controller_with(120, 1_000, 0x19);
    run_until(&mut controller, MEDIUM, Z_HIGH_DONE + CONFIRM + 3);
    assert!(controller.outputs().decel);

    // Release: the next Z reading is level again.
    controller.link_mut().device_mut().set_axis(Axis::Z, 300);
    let released = controller.ticks() + 220;
    run_until(&mut controller, MEDIUM, released);
    assert_eq!(controller.outputs().intensity, IntensityCode::None);

    // Still lit for the minimum hold.
    assert_eq!(
        run_until(&mut controller, MEDIUM, released + 1_000),
        LightPattern::Brake
    );
    assert_eq!(
        run_until(&mut controller, MEDIUM, released + 1_563 + CONFIRM + 10),
        LightPattern::Running
    );
}

#[test]
fn disabled_profile_keeps_sampling_without_braking() {
    let mut controller = controller_with(120, 1_500, 0x19);
    let disabled = ControllerInputs::powered(SensitivityProfile::Disabled);
    assert_eq!(run_until(&mut controller, disabled, 3_000), LightPattern::Running);
    assert!(controller.outputs().z_valid);
    assert_eq!(controller.outputs().intensity, IntensityCode::None);
}

#[test]
fn tipover_wins_over_braking() {
    let mut controller = controller_with(5_000, 1_500, 0x19);
    assert_eq!(run_until(&mut controller, MEDIUM, 3_000), LightPattern::TiltWarning);
    assert!(controller.outputs().decel);
    assert!(
        controller
            .telemetry()
            .oldest_first()
            .any(|r| r.event == TelemetryEventKind::FilterChanged(FilterId::Tilt))
    );
}

#[test]
fn hot_sensor_warns_without_debounce() {
    let mut controller = controller_with(120, 300, 0x40);
    assert_eq!(run_until(&mut controller, MEDIUM, 284), LightPattern::TempWarning);
    assert!(controller.outputs().temperature_warning);
}

#[test]
fn silent_device_recovers_after_power_cycle() {
    let mut controller = controller_with(120, 1_000, 0x19);
    run_until(&mut controller, MEDIUM, 1_000);
    assert!(controller.outputs().decel);

    controller.link_mut().device_mut().set_acknowledge(false);
    run_until(&mut controller, MEDIUM, 1_200);
    assert!(controller.is_stalled());
    // Decisions freeze while the bus is stuck.
    assert!(controller.outputs().decel);

    controller.link_mut().device_mut().set_acknowledge(true);
    run_until(&mut controller, MEDIUM, 1_400);
    assert!(controller.is_stalled());

    controller.tick(ControllerInputs::OFF);
    assert_eq!(LightPattern::select(&controller.outputs()), LightPattern::Off);

    let restart = controller.ticks();
    run_until(&mut controller, MEDIUM, restart + 300);
    assert!(!controller.is_stalled());
    assert!(controller.outputs().z_valid);
    assert!(controller.sequencer().cycles() >= 1);
}
