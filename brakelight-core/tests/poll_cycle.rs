use brakelight_core::bus::emulated::{EmulatedBus, EmulatedSensor};
use brakelight_core::controller::{Controller, ControllerConfig, ControllerInputs};
use brakelight_core::decision::SensitivityProfile;
use brakelight_core::repl::commands::BenchController;
use brakelight_core::sample::Axis;
use brakelight_core::sensor::{Range, registers};
use brakelight_core::sequencer::PollStep;
use brakelight_core::telemetry::TelemetryEventKind;

// Completion ticks of the first pass through the program.
const CONFIG_DONE: u64 = 64;
const X_HIGH_DONE: u64 = 152;
const Z_HIGH_DONE: u64 = 240;
const CYCLE_DONE: u64 = 284;
const CYCLE_TICKS: u64 = 220;

fn controller() -> BenchController {
    let config = ControllerConfig::DEFAULT;
    let mut sensor = EmulatedSensor::new(config.address);
    sensor.set_axis(Axis::X, 120);
    sensor.set_axis(Axis::Z, 300);
    sensor.set_temperature(0x19);
    Controller::new(config, EmulatedBus::new(sensor)).unwrap()
}

fn run_until(controller: &mut BenchController, tick: u64) {
    let inputs = ControllerInputs::powered(SensitivityProfile::Medium);
    while controller.ticks() < tick {
        controller.tick(inputs);
    }
}

#[test]
fn configuration_is_written_once() {
    let mut controller = controller();
    run_until(&mut controller, CONFIG_DONE);

    let sensor = controller.link().device();
    assert_eq!(sensor.writes(), 2);
    assert_eq!(
        sensor.register(registers::OFFSET_LSB1),
        Range::G2.register_value()
    );
    assert_eq!(controller.sequencer().step(), PollStep::CYCLE_START);

    run_until(&mut controller, CONFIG_DONE + 3 * CYCLE_TICKS);
    assert_eq!(controller.link().device().writes(), 2);
    assert_eq!(controller.sequencer().cycles(), 3);
}

#[test]
fn axis_validity_window() {
    let mut controller = controller();

    run_until(&mut controller, X_HIGH_DONE - 1);
    assert!(!controller.outputs().x_valid);
    run_until(&mut controller, X_HIGH_DONE);
    assert!(controller.outputs().x_valid);

    run_until(&mut controller, Z_HIGH_DONE);
    assert!(controller.outputs().z_valid);
    assert_eq!(
        controller.sequencer().axis(Axis::Z).value().map(|v| v.raw()),
        Some(300)
    );

    // The next X low byte drops validity until its high byte arrives.
    let x_low_again = CYCLE_DONE + 44;
    run_until(&mut controller, x_low_again - 1);
    assert!(controller.outputs().x_valid);
    run_until(&mut controller, x_low_again);
    assert!(!controller.outputs().x_valid);
    assert!(controller.outputs().z_valid);
    run_until(&mut controller, x_low_again + 44);
    assert!(controller.outputs().x_valid);
}

#[test]
fn y_axis_is_skipped_unless_enabled() {
    let mut controller = controller();
    run_until(&mut controller, CONFIG_DONE + 2 * CYCLE_TICKS);
    assert!(!controller.sequencer().axis(Axis::Y).is_valid());

    let mut config = ControllerConfig::DEFAULT;
    config.sequencer.sample_y_axis = true;
    let mut sensor = EmulatedSensor::new(config.address);
    sensor.set_axis(Axis::Y, 77);
    let mut controller = Controller::new(config, EmulatedBus::new(sensor)).unwrap();
    run_until(&mut controller, CONFIG_DONE + CYCLE_TICKS + 2 * 44);
    assert_eq!(
        controller.sequencer().axis(Axis::Y).value().map(|v| v.raw()),
        Some(77)
    );
}

#[test]
fn telemetry_follows_program_order() {
    let mut controller = controller();
    run_until(&mut controller, CYCLE_DONE);

    let samples: Vec<TelemetryEventKind> = controller
        .telemetry()
        .oldest_first()
        .map(|record| record.event)
        .filter(|event| {
            matches!(
                event,
                TelemetryEventKind::SampleReady(_) | TelemetryEventKind::TemperatureSampled
            )
        })
        .collect();
    assert_eq!(
        samples,
        vec![
            TelemetryEventKind::SampleReady(Axis::X),
            TelemetryEventKind::SampleReady(Axis::Z),
            TelemetryEventKind::TemperatureSampled,
        ]
    );

    let temperature = controller
        .telemetry()
        .latest()
        .map(|record| (record.tick, record.event));
    assert_eq!(
        temperature,
        Some((CYCLE_DONE, TelemetryEventKind::TemperatureSampled))
    );
}
