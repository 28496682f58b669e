//! Tick driver tying the bus engine, the polling program and the filters
//! together.
//!
//! Every call to [`Controller::tick`] is one global time step. Components
//! update in a fixed order and the filters only ever see the decisions that
//! were committed on the previous tick, so no component observes another
//! one half-way through its own update.

use core::fmt;
use core::time::Duration;

use crate::bus::{BusLink, BusProtocolEngine, Completion, SlaveAddress};
use crate::decision::{IntensityCode, SensitivityProfile};
use crate::filter::{
    BoostTiming, DebounceFilter, FilterConfigError, FilterOutput, FilterTiming,
};
use crate::sample::Axis;
use crate::sequencer::{SamplePollSequencer, SequencerConfig, SequencerUpdate};
use crate::telemetry::{
    FilterId, TelemetryEventKind, TelemetryPayload, TelemetryRecorder, TickStamp,
};

/// Tick period the default filter timings are converted with.
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_micros(480);

/// Construction failure: a filter rejected its timing.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ConfigError {
    pub filter: FilterId,
    pub error: FilterConfigError,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} filter: {}", self.filter, self.error)
    }
}

/// Static controller configuration.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ControllerConfig {
    pub address: SlaveAddress,
    pub tick_period: Duration,
    pub sequencer: SequencerConfig,
    pub decel_low: FilterTiming,
    pub decel_high: FilterTiming,
    pub decel_boost: BoostTiming,
    pub tilt: FilterTiming,
}

impl ControllerConfig {
    pub const DEFAULT: Self = Self {
        address: SlaveAddress::BMA180_PRIMARY,
        tick_period: DEFAULT_TICK_PERIOD,
        sequencer: SequencerConfig::DEFAULT,
        decel_low: FilterTiming::new(
            Duration::from_millis(250),
            Duration::from_millis(250),
            Duration::from_millis(750),
        )
        .with_restart(),
        decel_high: FilterTiming::new(
            Duration::from_millis(250),
            Duration::from_millis(250),
            Duration::from_millis(750),
        )
        .with_restart(),
        decel_boost: BoostTiming::new(
            Duration::from_millis(250),
            Duration::from_millis(250),
            Duration::from_millis(750),
        ),
        tilt: FilterTiming::new(
            Duration::from_secs(1),
            Duration::from_millis(500),
            Duration::from_secs(2),
        ),
    };

    #[must_use]
    pub const fn with_tick_period(mut self, tick_period: Duration) -> Self {
        self.tick_period = tick_period;
        self
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// External inputs sampled once per tick.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ControllerInputs {
    /// Power enable. `false` holds every component in its initial state.
    pub enable: bool,
    pub sensitivity: SensitivityProfile,
}

impl ControllerInputs {
    #[must_use]
    pub const fn powered(sensitivity: SensitivityProfile) -> Self {
        Self {
            enable: true,
            sensitivity,
        }
    }

    pub const OFF: Self = Self {
        enable: false,
        sensitivity: SensitivityProfile::Disabled,
    };
}

/// Signals handed to the output stage after a tick.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ControllerOutputs {
    pub powered: bool,
    /// Unfiltered intensity decision.
    pub intensity: IntensityCode,
    pub decel_low: bool,
    pub decel: bool,
    pub decel_boost: bool,
    pub tilt: bool,
    pub temperature_warning: bool,
    pub x_valid: bool,
    pub z_valid: bool,
}

/// The whole core, driven one tick at a time over a [`BusLink`].
pub struct Controller<L> {
    config: ControllerConfig,
    link: L,
    engine: BusProtocolEngine,
    sequencer: SamplePollSequencer,
    decel_low: DebounceFilter,
    decel_high: DebounceFilter,
    tilt: DebounceFilter,
    telemetry: TelemetryRecorder,
    outputs: ControllerOutputs,
    ticks: TickStamp,
    powered: bool,
    stalled: bool,
}

impl<L: BusLink> Controller<L> {
    /// Converts the filter timings and assembles the controller.
    pub fn new(config: ControllerConfig, link: L) -> Result<Self, ConfigError> {
        let period = config.tick_period;
        let filter_error =
            |filter: FilterId| move |error: FilterConfigError| ConfigError { filter, error };

        let decel_low = config
            .decel_low
            .to_ticks(period)
            .and_then(DebounceFilter::simple)
            .map_err(filter_error(FilterId::DecelLow))?;
        let decel_high = config
            .decel_high
            .to_ticks(period)
            .and_then(|primary| {
                let boost = config.decel_boost.to_ticks(period)?;
                DebounceFilter::with_boost(primary, boost)
            })
            .map_err(filter_error(FilterId::DecelHigh))?;
        let tilt = config
            .tilt
            .to_ticks(period)
            .and_then(DebounceFilter::simple)
            .map_err(filter_error(FilterId::Tilt))?;

        Ok(Self {
            config,
            link,
            engine: BusProtocolEngine::new(config.address),
            sequencer: SamplePollSequencer::new(config.sequencer),
            decel_low,
            decel_high,
            tilt,
            telemetry: TelemetryRecorder::new(),
            outputs: ControllerOutputs::default(),
            ticks: 0,
            powered: false,
            stalled: false,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &ControllerConfig {
        &self.config
    }

    #[must_use]
    pub const fn link(&self) -> &L {
        &self.link
    }

    pub const fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    #[must_use]
    pub const fn engine(&self) -> &BusProtocolEngine {
        &self.engine
    }

    #[must_use]
    pub const fn sequencer(&self) -> &SamplePollSequencer {
        &self.sequencer
    }

    #[must_use]
    pub const fn filter(&self, id: FilterId) -> &DebounceFilter {
        match id {
            FilterId::DecelLow => &self.decel_low,
            FilterId::DecelHigh => &self.decel_high,
            FilterId::Tilt => &self.tilt,
        }
    }

    #[must_use]
    pub const fn telemetry(&self) -> &TelemetryRecorder {
        &self.telemetry
    }

    pub const fn telemetry_mut(&mut self) -> &mut TelemetryRecorder {
        &mut self.telemetry
    }

    /// Outputs published by the most recent tick.
    #[must_use]
    pub const fn outputs(&self) -> ControllerOutputs {
        self.outputs
    }

    /// Ticks executed since construction.
    #[must_use]
    pub const fn ticks(&self) -> TickStamp {
        self.ticks
    }

    /// `true` while the device has left an acknowledge slot unanswered since
    /// the last completed transaction.
    #[must_use]
    pub const fn is_stalled(&self) -> bool {
        self.stalled
    }

    /// Runs one global time step.
    pub fn tick(&mut self, inputs: ControllerInputs) -> ControllerOutputs {
        self.ticks = self.ticks.wrapping_add(1);

        if !inputs.enable {
            self.hold_reset();
            return self.outputs;
        }
        self.powered = true;

        // Filters consume the decisions committed on the previous tick.
        let previous = self.sequencer.decisions();
        let before = self.filter_outputs();

        let missed_before = self.engine.missed_acks();
        let request = self.sequencer.request();
        match self.engine.tick(Some(request), &mut self.link) {
            Some(completion) => self.on_completion(&completion, inputs.sensitivity),
            None => {
                let missed = self.engine.missed_acks();
                if missed != missed_before && !self.stalled {
                    self.stalled = true;
                    self.record(
                        TelemetryEventKind::AcknowledgeMissed,
                        TelemetryPayload::MissedAcks(missed),
                    );
                }
            }
        }

        let low = self.decel_low.step(previous.intensity.low_bit(), false);
        let high = self.decel_high.step(
            previous.intensity != IntensityCode::None,
            previous.intensity.high_bit(),
        );
        let tilt = self.tilt.step(previous.tilt, false);

        for (id, old, new) in [
            (FilterId::DecelLow, before[0], low),
            (FilterId::DecelHigh, before[1], high),
            (FilterId::Tilt, before[2], tilt),
        ] {
            if old != new {
                self.record(
                    TelemetryEventKind::FilterChanged(id),
                    TelemetryPayload::Filter {
                        stable: new.stable,
                        boost: new.boost,
                    },
                );
            }
        }

        let decisions = self.sequencer.decisions();
        self.outputs = ControllerOutputs {
            powered: true,
            intensity: decisions.intensity,
            decel_low: low.stable,
            decel: high.stable,
            decel_boost: high.boost,
            tilt: tilt.stable,
            temperature_warning: decisions.temperature_warning,
            x_valid: self.sequencer.axis(Axis::X).is_valid(),
            z_valid: self.sequencer.axis(Axis::Z).is_valid(),
        };
        self.outputs
    }

    fn on_completion(&mut self, completion: &Completion, profile: SensitivityProfile) {
        self.stalled = false;
        self.record(
            TelemetryEventKind::TransactionComplete(completion.transaction.direction()),
            TelemetryPayload::Transaction {
                register: completion.transaction.register(),
                data: completion.data,
            },
        );

        if let Some(update) = self.sequencer.complete(completion, profile) {
            self.record_update(update);
        }
    }

    fn record_update(&mut self, update: SequencerUpdate) {
        if let Some((axis, value)) = update.sample {
            self.record(
                TelemetryEventKind::SampleReady(axis),
                TelemetryPayload::Sample(value.raw()),
            );
        }
        if let Some(reading) = update.temperature {
            self.record(
                TelemetryEventKind::TemperatureSampled,
                TelemetryPayload::Temperature(reading.raw()),
            );
        }
        if let Some(code) = update.intensity {
            self.record(
                TelemetryEventKind::IntensityChanged,
                TelemetryPayload::Intensity(code),
            );
        }
        if let Some(tilt) = update.tilt {
            self.record(TelemetryEventKind::TiltChanged, TelemetryPayload::Flag(tilt));
        }
        if let Some(warning) = update.temperature_warning {
            self.record(
                TelemetryEventKind::TemperatureWarning,
                TelemetryPayload::Flag(warning),
            );
        }
    }

    fn hold_reset(&mut self) {
        if self.powered {
            self.record(TelemetryEventKind::ControllerReset, TelemetryPayload::None);
        }
        self.powered = false;
        self.stalled = false;
        self.engine.tick(None, &mut self.link);
        self.sequencer.reset();
        self.decel_low.reset();
        self.decel_high.reset();
        self.tilt.reset();
        self.outputs = ControllerOutputs::default();
    }

    fn filter_outputs(&self) -> [FilterOutput; 3] {
        [
            self.decel_low.output(),
            self.decel_high.output(),
            self.tilt.output(),
        ]
    }

    fn record(&mut self, event: TelemetryEventKind, details: TelemetryPayload) {
        self.telemetry.record(event, details, self.ticks);
    }
}
