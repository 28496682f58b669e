//! Register polling program.
//!
//! The sequencer owns the fixed list of register accesses the controller
//! performs: two configuration writes once after reset, then an endless
//! read cycle over the axis pairs and the temperature register. It never
//! blocks; the controller hands it the engine's completions and it moves
//! to the next step only when the transaction it requested has finished.

use core::fmt;

use crate::bus::{Completion, RegisterTransaction};
use crate::decision::{
    self, DEFAULT_TEMPERATURE_THRESHOLD, IntensityCode, SensitivityProfile,
};
use crate::sample::{Axis, AxisSample, AxisValue, TemperatureSample};
use crate::sensor::{Bandwidth, Range, registers};

/// One step of the polling program.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PollStep {
    ConfigureBandwidth,
    ConfigureRange,
    AxisLow(Axis),
    AxisHigh(Axis),
    Temperature,
}

impl PollStep {
    /// First step of every read cycle.
    pub const CYCLE_START: Self = PollStep::AxisLow(Axis::X);

    #[must_use]
    pub const fn is_configuration(self) -> bool {
        matches!(self, PollStep::ConfigureBandwidth | PollStep::ConfigureRange)
    }
}

impl fmt::Display for PollStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollStep::ConfigureBandwidth => f.write_str("config-bandwidth"),
            PollStep::ConfigureRange => f.write_str("config-range"),
            PollStep::AxisLow(axis) => write!(f, "{axis}-low"),
            PollStep::AxisHigh(axis) => write!(f, "{axis}-high"),
            PollStep::Temperature => f.write_str("temperature"),
        }
    }
}

/// Static parameters of the polling program.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SequencerConfig {
    pub bandwidth: Bandwidth,
    pub range: Range,
    /// Reads the Y pair between X and Z. Off in the stock build.
    pub sample_y_axis: bool,
    /// Raw temperature byte at which the warning starts.
    pub temperature_threshold: u8,
}

impl SequencerConfig {
    pub const DEFAULT: Self = Self {
        bandwidth: Bandwidth::Hz10,
        range: Range::G2,
        sample_y_axis: false,
        temperature_threshold: DEFAULT_TEMPERATURE_THRESHOLD,
    };
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Decision outputs derived from the latest samples.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Decisions {
    pub intensity: IntensityCode,
    /// Unfiltered tipover flag.
    pub tilt: bool,
    pub temperature_warning: bool,
}

/// What a completed step changed.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SequencerUpdate {
    pub completed: PollStep,
    /// Axis value that became valid on this step.
    pub sample: Option<(Axis, AxisValue)>,
    pub temperature: Option<TemperatureSample>,
    /// New intensity, only when it differs from the previous one.
    pub intensity: Option<IntensityCode>,
    pub tilt: Option<bool>,
    pub temperature_warning: Option<bool>,
}

impl SequencerUpdate {
    const fn new(completed: PollStep) -> Self {
        Self {
            completed,
            sample: None,
            temperature: None,
            intensity: None,
            tilt: None,
            temperature_warning: None,
        }
    }
}

/// Drives the register program and assembles samples.
#[derive(Clone, Debug)]
pub struct SamplePollSequencer {
    config: SequencerConfig,
    step: PollStep,
    x: AxisSample,
    y: AxisSample,
    z: AxisSample,
    temperature: Option<TemperatureSample>,
    decisions: Decisions,
    cycles: u32,
}

impl SamplePollSequencer {
    #[must_use]
    pub const fn new(config: SequencerConfig) -> Self {
        Self {
            config,
            step: PollStep::ConfigureBandwidth,
            x: AxisSample::new(),
            y: AxisSample::new(),
            z: AxisSample::new(),
            temperature: None,
            decisions: Decisions {
                intensity: IntensityCode::None,
                tilt: false,
                temperature_warning: false,
            },
            cycles: 0,
        }
    }

    #[must_use]
    pub const fn config(&self) -> SequencerConfig {
        self.config
    }

    /// Step whose transaction is currently requested.
    #[must_use]
    pub const fn step(&self) -> PollStep {
        self.step
    }

    #[must_use]
    pub const fn decisions(&self) -> Decisions {
        self.decisions
    }

    #[must_use]
    pub const fn axis(&self, axis: Axis) -> &AxisSample {
        match axis {
            Axis::X => &self.x,
            Axis::Y => &self.y,
            Axis::Z => &self.z,
        }
    }

    #[must_use]
    pub const fn temperature(&self) -> Option<TemperatureSample> {
        self.temperature
    }

    /// Completed read cycles since reset.
    #[must_use]
    pub const fn cycles(&self) -> u32 {
        self.cycles
    }

    /// Restarts the program at the configuration writes and drops all samples.
    pub fn reset(&mut self) {
        *self = Self::new(self.config);
    }

    /// Transaction for the current step.
    #[must_use]
    pub const fn request(&self) -> RegisterTransaction {
        match self.step {
            PollStep::ConfigureBandwidth => {
                RegisterTransaction::write(registers::BW_TCS, self.config.bandwidth.register_value())
            }
            PollStep::ConfigureRange => RegisterTransaction::write(
                registers::OFFSET_LSB1,
                self.config.range.register_value(),
            ),
            PollStep::AxisLow(axis) => RegisterTransaction::read(registers::axis_registers(axis).0),
            PollStep::AxisHigh(axis) => {
                RegisterTransaction::read(registers::axis_registers(axis).1)
            }
            PollStep::Temperature => RegisterTransaction::read(registers::TEMP),
        }
    }

    /// Consumes a bus completion for the current step.
    ///
    /// A completion for any other transaction is ignored and yields `None`.
    pub fn complete(
        &mut self,
        completion: &Completion,
        profile: SensitivityProfile,
    ) -> Option<SequencerUpdate> {
        if completion.transaction != self.request() {
            return None;
        }

        let completed = self.step;
        let mut update = SequencerUpdate::new(completed);
        let data = completion.data.unwrap_or(0);

        match completed {
            PollStep::ConfigureBandwidth | PollStep::ConfigureRange => {}
            PollStep::AxisLow(axis) => self.axis_mut(axis).low_byte(data),
            PollStep::AxisHigh(axis) => {
                if let Some(value) = self.axis_mut(axis).high_byte(data) {
                    update.sample = Some((axis, value));
                    match axis {
                        Axis::X => {
                            let tilt = decision::tipover(value);
                            if tilt != self.decisions.tilt {
                                self.decisions.tilt = tilt;
                                update.tilt = Some(tilt);
                            }
                        }
                        Axis::Z => {
                            let intensity = decision::intensity(profile, value);
                            if intensity != self.decisions.intensity {
                                self.decisions.intensity = intensity;
                                update.intensity = Some(intensity);
                            }
                        }
                        Axis::Y => {}
                    }
                }
            }
            PollStep::Temperature => {
                let reading = TemperatureSample::new(data);
                self.temperature = Some(reading);
                update.temperature = Some(reading);
                let warning =
                    decision::temperature_warning(self.config.temperature_threshold, reading);
                if warning != self.decisions.temperature_warning {
                    self.decisions.temperature_warning = warning;
                    update.temperature_warning = Some(warning);
                }
                self.cycles = self.cycles.wrapping_add(1);
            }
        }

        self.step = self.next_step(completed);
        Some(update)
    }

    const fn next_step(&self, step: PollStep) -> PollStep {
        match step {
            PollStep::ConfigureBandwidth => PollStep::ConfigureRange,
            PollStep::ConfigureRange | PollStep::Temperature => PollStep::CYCLE_START,
            PollStep::AxisLow(axis) => PollStep::AxisHigh(axis),
            PollStep::AxisHigh(Axis::X) if self.config.sample_y_axis => {
                PollStep::AxisLow(Axis::Y)
            }
            PollStep::AxisHigh(Axis::X | Axis::Y) => PollStep::AxisLow(Axis::Z),
            PollStep::AxisHigh(Axis::Z) => PollStep::Temperature,
        }
    }

    fn axis_mut(&mut self, axis: Axis) -> &mut AxisSample {
        match axis {
            Axis::X => &mut self.x,
            Axis::Y => &mut self.y,
            Axis::Z => &mut self.z,
        }
    }
}

impl Default for SamplePollSequencer {
    fn default() -> Self {
        Self::new(SequencerConfig::DEFAULT)
    }
}
