//! Mapping from controller outputs to indicator patterns.

use core::fmt;

use crate::controller::ControllerOutputs;

/// Indicator channel bits.
pub mod channel {
    pub const RUNNING: u8 = 1 << 0;
    pub const BRAKE: u8 = 1 << 1;
    pub const BOOST: u8 = 1 << 2;
    pub const WARNING: u8 = 1 << 3;
}

/// Pattern shown on the indicator lights.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum LightPattern {
    #[default]
    Off,
    Running,
    Brake,
    HardBrake,
    TiltWarning,
    TempWarning,
}

impl LightPattern {
    /// Highest-priority pattern for the given outputs.
    ///
    /// Tilt wins over braking, braking over the temperature warning.
    #[must_use]
    pub const fn select(outputs: &ControllerOutputs) -> Self {
        if !outputs.powered {
            LightPattern::Off
        } else if outputs.tilt {
            LightPattern::TiltWarning
        } else if outputs.decel_boost {
            LightPattern::HardBrake
        } else if outputs.decel || outputs.decel_low {
            LightPattern::Brake
        } else if outputs.temperature_warning {
            LightPattern::TempWarning
        } else {
            LightPattern::Running
        }
    }

    /// Channel mask driven for this pattern.
    #[must_use]
    pub const fn channels(self) -> u8 {
        match self {
            LightPattern::Off => 0,
            LightPattern::Running => channel::RUNNING,
            LightPattern::Brake => channel::RUNNING | channel::BRAKE,
            LightPattern::HardBrake => channel::RUNNING | channel::BRAKE | channel::BOOST,
            LightPattern::TiltWarning => channel::BRAKE | channel::WARNING,
            LightPattern::TempWarning => channel::RUNNING | channel::WARNING,
        }
    }
}

impl fmt::Display for LightPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LightPattern::Off => "off",
            LightPattern::Running => "running",
            LightPattern::Brake => "brake",
            LightPattern::HardBrake => "hard-brake",
            LightPattern::TiltWarning => "tilt-warning",
            LightPattern::TempWarning => "temp-warning",
        })
    }
}

/// Consumer that turns a pattern into physical light levels.
pub trait OutputSink {
    fn apply(&mut self, pattern: LightPattern);
}

impl<T: OutputSink + ?Sized> OutputSink for &mut T {
    fn apply(&mut self, pattern: LightPattern) {
        (**self).apply(pattern);
    }
}

/// Sink that discards every pattern.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopOutputSink;

impl OutputSink for NoopOutputSink {
    fn apply(&mut self, _: LightPattern) {}
}

/// Forwards a pattern to `sink` only when it differs from the last one.
#[derive(Debug)]
pub struct PatternLatch<S> {
    sink: S,
    current: Option<LightPattern>,
}

impl<S: OutputSink> PatternLatch<S> {
    pub const fn new(sink: S) -> Self {
        Self {
            sink,
            current: None,
        }
    }

    /// Selects and applies the pattern for `outputs`; returns it when it changed.
    pub fn update(&mut self, outputs: &ControllerOutputs) -> Option<LightPattern> {
        let pattern = LightPattern::select(outputs);
        if self.current == Some(pattern) {
            return None;
        }
        self.current = Some(pattern);
        self.sink.apply(pattern);
        Some(pattern)
    }

    #[must_use]
    pub const fn current(&self) -> Option<LightPattern> {
        self.current
    }

    pub const fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn powered() -> ControllerOutputs {
        ControllerOutputs {
            powered: true,
            ..ControllerOutputs::default()
        }
    }

    #[test]
    fn unpowered_is_dark_whatever_else_is_set() {
        let outputs = ControllerOutputs {
            tilt: true,
            decel: true,
            ..ControllerOutputs::default()
        };
        assert_eq!(LightPattern::select(&outputs), LightPattern::Off);
        assert_eq!(LightPattern::Off.channels(), 0);
    }

    #[test]
    fn priority_order() {
        let mut outputs = powered();
        assert_eq!(LightPattern::select(&outputs), LightPattern::Running);

        outputs.temperature_warning = true;
        assert_eq!(LightPattern::select(&outputs), LightPattern::TempWarning);

        outputs.decel = true;
        assert_eq!(LightPattern::select(&outputs), LightPattern::Brake);

        outputs.decel_boost = true;
        assert_eq!(LightPattern::select(&outputs), LightPattern::HardBrake);

        outputs.tilt = true;
        assert_eq!(LightPattern::select(&outputs), LightPattern::TiltWarning);
    }

    #[derive(Default)]
    struct Counting(u32);

    impl OutputSink for Counting {
        fn apply(&mut self, _: LightPattern) {
            self.0 += 1;
        }
    }

    #[test]
    fn latch_only_forwards_changes() {
        let mut latch = PatternLatch::new(Counting::default());
        let outputs = powered();
        assert_eq!(latch.update(&outputs), Some(LightPattern::Running));
        assert_eq!(latch.update(&outputs), None);
        assert_eq!(latch.update(&ControllerOutputs::default()), Some(LightPattern::Off));
        assert_eq!(latch.sink_mut().0, 2);
    }
}
