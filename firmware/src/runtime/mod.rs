use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::gpio::{Input, Level, Output, OutputOpenDrain, Pull, Speed};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use static_cell::StaticCell;

use brakelight_core::controller::{Controller, ControllerConfig};
use brakelight_core::output::{LightPattern, OutputSink};

use crate::hw::{ControlInputs, IndicatorLights, PinBus};

mod controller_task;
mod lights_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

pub(super) type FirmwareController = Controller<PinBus<'static>>;
pub(super) type PatternSignal = Signal<CriticalSectionRawMutex, LightPattern>;

/// Latest light pattern, handed from the controller task to the light task.
pub(super) static PATTERN: PatternSignal = Signal::new();
static CONTROLLER: StaticCell<FirmwareController> = StaticCell::new();

/// Output sink that forwards pattern changes to [`PATTERN`].
pub(super) struct SignalSink(&'static PatternSignal);

impl OutputSink for SignalSink {
    fn apply(&mut self, pattern: LightPattern) {
        self.0.signal(pattern);
    }
}

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PA0,
        PA2,
        PA3,
        PA4,
        PA5,
        PA6,
        PA7,
        PB8,
        PB9,
        ..
    } = hal::init(config);

    let bus = PinBus::new(
        OutputOpenDrain::new(PB8, Level::High, Speed::Low),
        OutputOpenDrain::new(PB9, Level::High, Speed::Low),
    );
    let controls = ControlInputs::new(
        Input::new(PA0, Pull::Down),
        Input::new(PA6, Pull::Down),
        Input::new(PA7, Pull::Down),
    );
    let lights = IndicatorLights::new(
        Output::new(PA2, Level::Low, Speed::Low),
        Output::new(PA3, Level::Low, Speed::Low),
        Output::new(PA4, Level::Low, Speed::Low),
        Output::new(PA5, Level::Low, Speed::Low),
    );

    let controller = match Controller::new(ControllerConfig::DEFAULT, bus) {
        Ok(controller) => CONTROLLER.init(controller),
        Err(err) => {
            defmt::error!("controller config rejected: {}", defmt::Display2Format(&err));
            return;
        }
    };

    spawner
        .spawn(controller_task::run(controller, controls, SignalSink(&PATTERN)))
        .expect("failed to spawn controller task");
    spawner
        .spawn(lights_task::run(lights, &PATTERN))
        .expect("failed to spawn light task");

    core::future::pending::<()>().await;
}
