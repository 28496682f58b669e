//! Console command dispatcher for the emulated bench.
//!
//! A [`Bench`] is a controller wired to an emulated sensor on an emulated
//! bus plus the external inputs a front-end toggles. Parsed commands move
//! the bench forward in time or change the sensor and the inputs; the
//! front-end renders the returned [`CommandOutcome`].

use core::fmt;
use core::time::Duration;

use crate::bus::emulated::{EmulatedBus, EmulatedSensor};
use crate::controller::{ConfigError, Controller, ControllerConfig, ControllerInputs};
use crate::decision::SensitivityProfile;
use crate::filter::{self, FilterConfigError};
use crate::output::{LightPattern, NoopOutputSink, OutputSink, PatternLatch};
use crate::sample::{Axis, AxisValue};
use crate::telemetry::EventId;

use super::grammar::{self, Command};
use super::status::StatusSnapshot;

/// Controller type the bench drives.
pub type BenchController = Controller<EmulatedBus<EmulatedSensor>>;

/// Command execution successes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandOutcome<'a> {
    /// Time advanced; `pattern` is the light pattern after the last tick.
    Advanced {
        ticks: u32,
        pattern: LightPattern,
        pattern_changes: u32,
    },
    Accel(Axis, AxisValue),
    Temp(u8),
    Profile(SensitivityProfile),
    Power(bool),
    Nack(bool),
    Status(StatusSnapshot),
    /// Telemetry recorded at or after `since` is pending display.
    Trace { since: EventId },
    Help(Option<&'a str>),
}

/// Errors surfaced while executing a command line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandError<'a> {
    Parse(grammar::ParseError<'a>),
    /// `run` duration cannot be expressed in ticks.
    Duration(FilterConfigError),
}

impl<'a> From<grammar::ParseError<'a>> for CommandError<'a> {
    fn from(error: grammar::ParseError<'a>) -> Self {
        Self::Parse(error)
    }
}

impl fmt::Display for CommandError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Parse(err) => err.fmt(f),
            CommandError::Duration(err) => write!(f, "run duration: {err}"),
        }
    }
}

/// Controller plus emulated sensor, driven from console commands.
pub struct Bench<S = NoopOutputSink> {
    controller: BenchController,
    inputs: ControllerInputs,
    lights: PatternLatch<S>,
    trace_cursor: EventId,
}

impl Bench<NoopOutputSink> {
    /// Powered bench at the medium profile with a level, room-temperature sensor.
    pub fn new(config: ControllerConfig) -> Result<Self, ConfigError> {
        Self::with_sink(config, NoopOutputSink)
    }
}

impl<S: OutputSink> Bench<S> {
    pub fn with_sink(config: ControllerConfig, sink: S) -> Result<Self, ConfigError> {
        let mut sensor = EmulatedSensor::new(config.address);
        sensor.set_axis(Axis::X, 0);
        sensor.set_axis(Axis::Z, 0);
        sensor.set_temperature(0x19);

        Ok(Self {
            controller: Controller::new(config, EmulatedBus::new(sensor))?,
            inputs: ControllerInputs::powered(SensitivityProfile::Medium),
            lights: PatternLatch::new(sink),
            trace_cursor: 0,
        })
    }

    #[must_use]
    pub const fn controller(&self) -> &BenchController {
        &self.controller
    }

    pub const fn controller_mut(&mut self) -> &mut BenchController {
        &mut self.controller
    }

    #[must_use]
    pub const fn inputs(&self) -> ControllerInputs {
        self.inputs
    }

    #[must_use]
    pub fn sensor(&self) -> &EmulatedSensor {
        self.controller.link().device()
    }

    pub fn sensor_mut(&mut self) -> &mut EmulatedSensor {
        self.controller.link_mut().device_mut()
    }

    pub const fn sink_mut(&mut self) -> &mut S {
        self.lights.sink_mut()
    }

    #[must_use]
    pub const fn pattern(&self) -> Option<LightPattern> {
        self.lights.current()
    }

    /// Runs `ticks` controller ticks and feeds every result to the lights.
    pub fn advance(&mut self, ticks: u32) -> CommandOutcome<'static> {
        let mut pattern_changes = 0;
        for _ in 0..ticks {
            let outputs = self.controller.tick(self.inputs);
            if self.lights.update(&outputs).is_some() {
                pattern_changes += 1;
            }
        }
        CommandOutcome::Advanced {
            ticks,
            pattern: LightPattern::select(&self.controller.outputs()),
            pattern_changes,
        }
    }

    /// Parses and executes one console line.
    pub fn execute_line<'a>(&mut self, line: &'a str) -> Result<CommandOutcome<'a>, CommandError<'a>> {
        let command = grammar::parse(line)?;
        self.execute(command)
    }

    pub fn execute<'a>(&mut self, command: Command<'a>) -> Result<CommandOutcome<'a>, CommandError<'a>> {
        let outcome = match command {
            Command::Tick(count) => self.advance(count),
            Command::Run(duration) => {
                let ticks = self.ticks_for(duration).map_err(CommandError::Duration)?;
                self.advance(ticks)
            }
            Command::Accel(axis, value) => {
                self.sensor_mut().set_axis(axis, value.raw());
                CommandOutcome::Accel(axis, value)
            }
            Command::Temp(raw) => {
                self.sensor_mut().set_temperature(raw);
                CommandOutcome::Temp(raw)
            }
            Command::Profile(profile) => {
                self.inputs.sensitivity = profile;
                CommandOutcome::Profile(profile)
            }
            Command::Power(enable) => {
                self.inputs.enable = enable;
                CommandOutcome::Power(enable)
            }
            Command::Nack(enabled) => {
                self.sensor_mut().set_acknowledge(!enabled);
                CommandOutcome::Nack(enabled)
            }
            Command::Status => {
                CommandOutcome::Status(StatusSnapshot::capture(&self.controller, self.inputs))
            }
            Command::Trace => {
                let since = self.trace_cursor;
                self.trace_cursor = self.controller.telemetry().next_id();
                CommandOutcome::Trace { since }
            }
            Command::Help(topic) => CommandOutcome::Help(topic),
        };
        Ok(outcome)
    }

    fn ticks_for(&self, duration: Duration) -> Result<u32, FilterConfigError> {
        filter::ticks(duration, self.controller.config().tick_period)
    }
}

const COMMAND_SUMMARIES: [&str; 10] = [
    "tick [n] - advance the controller by n ticks (default 1)",
    "run <duration> - advance by wall-clock time, e.g. run 250ms",
    "accel <x|y|z> <raw> - load a 14-bit reading into the sensor",
    "temp <raw> - load the raw temperature byte, e.g. temp 0x32",
    "profile <off|low|medium|high> - select the sensitivity profile",
    "power <on|off> - drive the enable input",
    "nack <on|off> - make the sensor stop acknowledging",
    "status - show bus, sample, decision and filter state",
    "trace - print telemetry recorded since the last trace",
    "help [command] - show this list or one command",
];

/// One-line summary for a console command keyword (case-insensitive).
#[must_use]
pub fn command_summary(keyword: &str) -> Option<&'static str> {
    grammar::COMMAND_KEYWORDS
        .iter()
        .position(|name| name.eq_ignore_ascii_case(keyword))
        .map(|index| COMMAND_SUMMARIES[index])
}

/// Every command summary in keyword order.
pub fn command_summaries() -> impl Iterator<Item = &'static str> {
    COMMAND_SUMMARIES.iter().copied()
}
