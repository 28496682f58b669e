use brakelight_core::output::PatternLatch;
use embassy_time::{Duration, Ticker};

use super::{FirmwareController, SignalSink};
use crate::hw::ControlInputs;
use crate::status;
use crate::telemetry::TelemetryDrain;

#[embassy_executor::task]
pub async fn run(
    controller: &'static mut FirmwareController,
    controls: ControlInputs<'static>,
    sink: SignalSink,
) -> ! {
    let period = controller.config().tick_period;
    let micros = u64::try_from(period.as_micros()).unwrap_or(u64::MAX);
    let mut ticker = Ticker::every(Duration::from_micros(micros));
    let mut latch = PatternLatch::new(sink);
    let mut drain = TelemetryDrain::new();

    defmt::info!("controller: tick period {}us", micros);

    loop {
        let outputs = controller.tick(controls.read());
        latch.update(&outputs);
        drain.drain(controller.telemetry());
        status::record(controller);
        ticker.next().await;
    }
}
