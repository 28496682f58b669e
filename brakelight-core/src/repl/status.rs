//! Shared status surface for the console.
//!
//! [`StatusSnapshot`] captures the controller state a front-end shows for
//! the `status` command, and [`StatusFormatter`] keeps the textual rendering
//! consistent across front-ends.

use core::fmt;
use core::time::Duration;

use crate::bus::{BusLink, EnginePhase};
use crate::controller::{Controller, ControllerInputs, ControllerOutputs};
use crate::filter::FilterState;
use crate::output::LightPattern;
use crate::sample::{Axis, AxisValue, TemperatureSample};
use crate::sequencer::PollStep;
use crate::telemetry::{FilterId, TickStamp};

/// Point-in-time view of a controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub ticks: TickStamp,
    pub elapsed: Duration,
    pub inputs: ControllerInputs,
    pub outputs: ControllerOutputs,
    pub pattern: LightPattern,
    pub phase: EnginePhase,
    pub step: PollStep,
    pub cycles: u32,
    pub missed_acks: u32,
    pub stalled: bool,
    pub x: Option<AxisValue>,
    pub z: Option<AxisValue>,
    pub temperature: Option<TemperatureSample>,
    pub filters: [(FilterId, FilterState); 3],
}

impl StatusSnapshot {
    /// Captures the controller as of its last tick.
    #[must_use]
    pub fn capture<L: BusLink>(controller: &Controller<L>, inputs: ControllerInputs) -> Self {
        let sequencer = controller.sequencer();
        let outputs = controller.outputs();
        let period = controller.config().tick_period;
        let ticks = controller.ticks();
        Self {
            ticks,
            elapsed: period.saturating_mul(u32::try_from(ticks).unwrap_or(u32::MAX)),
            inputs,
            outputs,
            pattern: LightPattern::select(&outputs),
            phase: controller.engine().phase(),
            step: sequencer.step(),
            cycles: sequencer.cycles(),
            missed_acks: controller.engine().missed_acks(),
            stalled: controller.is_stalled(),
            x: sequencer.axis(Axis::X).value(),
            z: sequencer.axis(Axis::Z).value(),
            temperature: sequencer.temperature(),
            filters: FilterId::ALL.map(|id| (id, controller.filter(id).state())),
        }
    }
}

/// Helper that renders a [`StatusSnapshot`] into human-readable lines.
#[derive(Clone, Copy, Debug)]
pub struct StatusFormatter<'a> {
    snapshot: &'a StatusSnapshot,
}

impl<'a> StatusFormatter<'a> {
    #[must_use]
    pub const fn new(snapshot: &'a StatusSnapshot) -> Self {
        Self { snapshot }
    }

    /// Writes the clock line (e.g. `clock ticks=2084 elapsed=+1.0s power=on profile=medium`).
    pub fn write_clock_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        let snapshot = self.snapshot;
        write!(writer, "clock ticks={} elapsed=", snapshot.ticks)?;
        write_duration(writer, snapshot.elapsed)?;
        write!(
            writer,
            " power={} profile={}",
            on_off(snapshot.inputs.enable),
            snapshot.inputs.sensitivity
        )
    }

    /// Writes the bus line (e.g. `bus phase=receive step=z-high cycles=3 missed=0`).
    pub fn write_bus_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        let snapshot = self.snapshot;
        write!(
            writer,
            "bus phase={} step={} cycles={} missed={}",
            snapshot.phase.label(),
            snapshot.step,
            snapshot.cycles,
            snapshot.missed_acks
        )?;
        if snapshot.stalled {
            writer.write_str(" stalled")?;
        }
        Ok(())
    }

    /// Writes the sample line (e.g. `samples x=120 z=1500 temp=0x32`).
    pub fn write_samples_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        let snapshot = self.snapshot;
        writer.write_str("samples x=")?;
        write_axis(writer, snapshot.x)?;
        writer.write_str(" z=")?;
        write_axis(writer, snapshot.z)?;
        writer.write_str(" temp=")?;
        match snapshot.temperature {
            Some(reading) => write!(writer, "{:#04x}", reading.raw()),
            None => writer.write_str("n/a"),
        }
    }

    /// Writes the decision line (e.g. `decision intensity=high tilt=off temp-warning=off`).
    pub fn write_decision_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        let outputs = &self.snapshot.outputs;
        write!(
            writer,
            "decision intensity={} decel-low={} decel={} boost={} tilt={} temp-warning={}",
            outputs.intensity,
            on_off(outputs.decel_low),
            on_off(outputs.decel),
            on_off(outputs.decel_boost),
            on_off(outputs.tilt),
            on_off(outputs.temperature_warning)
        )
    }

    /// Writes the filter line (e.g. `filters decel-low=hold-high/412 ...`).
    pub fn write_filters_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        writer.write_str("filters")?;
        for (id, state) in &self.snapshot.filters {
            write!(writer, " {id}={}", state.phase.label())?;
            if state.countdown > 0 {
                write!(writer, "/{}", state.countdown)?;
            }
        }
        Ok(())
    }

    /// Writes the light line (e.g. `lights pattern=brake`).
    pub fn write_lights_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        write!(writer, "lights pattern={}", self.snapshot.pattern)
    }

    /// Runs every line writer, handing each finished line to `emit`.
    pub fn for_each_line<W, F>(&self, mut emit: F) -> fmt::Result
    where
        W: fmt::Write + Default,
        F: FnMut(W),
    {
        type LineWriter<'f, W> = fn(&StatusFormatter<'f>, &mut W) -> fmt::Result;
        let writers: [LineWriter<'a, W>; 6] = [
            Self::write_clock_line,
            Self::write_bus_line,
            Self::write_samples_line,
            Self::write_decision_line,
            Self::write_filters_line,
            Self::write_lights_line,
        ];
        for write in writers {
            let mut line = W::default();
            write(self, &mut line)?;
            emit(line);
        }
        Ok(())
    }
}

const fn on_off(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}

fn write_axis<W: fmt::Write>(writer: &mut W, value: Option<AxisValue>) -> fmt::Result {
    match value {
        Some(value) => write!(writer, "{}", value.raw()),
        None => writer.write_str("n/a"),
    }
}

fn write_duration<W: fmt::Write>(writer: &mut W, duration: Duration) -> fmt::Result {
    if duration >= Duration::from_secs(1) {
        let millis = duration.as_millis();
        let seconds = millis / 1_000;
        let tenths = (millis % 1_000) / 100;
        write!(writer, "+{seconds}.{tenths}s")
    } else if duration >= Duration::from_millis(1) {
        write!(writer, "+{}ms", duration.as_millis())
    } else {
        write!(writer, "+{}us", duration.as_micros())
    }
}
