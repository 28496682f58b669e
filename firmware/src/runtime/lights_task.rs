use brakelight_core::output::OutputSink;
use embassy_futures::select::{Either, select};
use embassy_time::{Duration, Timer};

use super::PatternSignal;
use crate::hw::IndicatorLights;
use crate::status;

/// Interval between status heartbeats while the pattern is steady.
const HEARTBEAT: Duration = Duration::from_secs(5);

#[embassy_executor::task]
pub async fn run(mut lights: IndicatorLights<'static>, pattern: &'static PatternSignal) -> ! {
    loop {
        match select(pattern.wait(), Timer::after(HEARTBEAT)).await {
            Either::First(next) => {
                lights.apply(next);
                defmt::info!("lights: {}", defmt::Display2Format(&next));
            }
            Either::Second(()) => {
                let status = status::snapshot();
                if status.stalled {
                    defmt::warn!(
                        "heartbeat: bus stalled, missed acks={}",
                        status.missed_acks
                    );
                } else {
                    defmt::info!(
                        "heartbeat: cycles={} channels={=u8:#x}",
                        status.cycles,
                        status.channels
                    );
                }
            }
        }
    }
}
