//! Debounce and minimum-hold filter.
//!
//! A [`DebounceFilter`] turns a noisy threshold flag into a stable output:
//! the input must stay high for a confirm window before the output rises,
//! the output then stays up for a minimum hold period, and it only falls
//! after the input has stayed low for its own confirm window.
//!
//! The boost-capable variant layers a second confirm/hold/release cycle for
//! a secondary input on top of the primary hold phase:
//!
//! ```text
//! Idle -> ConfirmHigh -> HoldHigh -> ConfirmLow -> Idle
//!                          |   ^
//!                          v   |
//!              ConfirmBoost -> HoldWithBoost -> ConfirmNoBoost
//! ```
//!
//! Inputs pass through a [`SYNC_STAGES`]-deep synchroniser first, so the
//! filter reacts to what was sampled two steps earlier. A confirm window of
//! N ticks is counted in synchronised samples: the step that consumes the
//! N-th consecutive high sample arms the output and it rises on the next
//! step, whatever that step samples. A raw pulse on steps `1..=N` therefore
//! raises the output on step `N + SYNC_STAGES + 1`. The boost output follows
//! the same rule and is only ever asserted on top of a high stable output.

use core::fmt;
use core::time::Duration;

/// Depth of the input synchroniser.
pub const SYNC_STAGES: usize = 2;

/// Rejected filter configuration.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FilterConfigError {
    /// `cutoff_after_hold` and `restart_hold_on_pulse` were both requested.
    CutoffWithRestart,
    /// A confirm window of zero ticks cannot debounce anything.
    ZeroConfirmWindow,
    /// Durations cannot be converted with a zero tick period.
    ZeroTickPeriod,
    /// A window does not fit into the tick counter.
    WindowTooLong,
}

impl fmt::Display for FilterConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterConfigError::CutoffWithRestart => {
                f.write_str("cutoff after hold cannot be combined with hold restart")
            }
            FilterConfigError::ZeroConfirmWindow => f.write_str("confirm window must be non-zero"),
            FilterConfigError::ZeroTickPeriod => f.write_str("tick period must be non-zero"),
            FilterConfigError::WindowTooLong => f.write_str("window exceeds the tick counter"),
        }
    }
}

/// Primary path parameters, in ticks.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FilterConfig {
    pub confirm_high_ticks: u32,
    pub confirm_low_ticks: u32,
    pub min_hold_ticks: u32,
    /// Force the output low once the hold period has elapsed.
    pub cutoff_after_hold: bool,
    /// Restart the hold countdown on every high sample while held.
    pub restart_hold_on_pulse: bool,
}

impl FilterConfig {
    #[must_use]
    pub const fn new(confirm_high_ticks: u32, confirm_low_ticks: u32, min_hold_ticks: u32) -> Self {
        Self {
            confirm_high_ticks,
            confirm_low_ticks,
            min_hold_ticks,
            cutoff_after_hold: false,
            restart_hold_on_pulse: false,
        }
    }

    #[must_use]
    pub const fn with_cutoff(mut self) -> Self {
        self.cutoff_after_hold = true;
        self
    }

    #[must_use]
    pub const fn with_restart(mut self) -> Self {
        self.restart_hold_on_pulse = true;
        self
    }

    pub const fn validate(&self) -> Result<(), FilterConfigError> {
        if self.cutoff_after_hold && self.restart_hold_on_pulse {
            return Err(FilterConfigError::CutoffWithRestart);
        }
        if self.confirm_high_ticks == 0 || self.confirm_low_ticks == 0 {
            return Err(FilterConfigError::ZeroConfirmWindow);
        }
        Ok(())
    }
}

/// Secondary (boost) path parameters, in ticks.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BoostConfig {
    pub confirm_high_ticks: u32,
    pub confirm_low_ticks: u32,
    pub min_hold_ticks: u32,
    pub cutoff_after_hold: bool,
}

impl BoostConfig {
    #[must_use]
    pub const fn new(confirm_high_ticks: u32, confirm_low_ticks: u32, min_hold_ticks: u32) -> Self {
        Self {
            confirm_high_ticks,
            confirm_low_ticks,
            min_hold_ticks,
            cutoff_after_hold: false,
        }
    }

    #[must_use]
    pub const fn with_cutoff(mut self) -> Self {
        self.cutoff_after_hold = true;
        self
    }

    pub const fn validate(&self) -> Result<(), FilterConfigError> {
        if self.confirm_high_ticks == 0 || self.confirm_low_ticks == 0 {
            Err(FilterConfigError::ZeroConfirmWindow)
        } else {
            Ok(())
        }
    }
}

/// [`FilterConfig`] expressed in wall-clock time.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FilterTiming {
    pub confirm_high: Duration,
    pub confirm_low: Duration,
    pub min_hold: Duration,
    pub cutoff_after_hold: bool,
    pub restart_hold_on_pulse: bool,
}

impl FilterTiming {
    #[must_use]
    pub const fn new(confirm_high: Duration, confirm_low: Duration, min_hold: Duration) -> Self {
        Self {
            confirm_high,
            confirm_low,
            min_hold,
            cutoff_after_hold: false,
            restart_hold_on_pulse: false,
        }
    }

    #[must_use]
    pub const fn with_cutoff(mut self) -> Self {
        self.cutoff_after_hold = true;
        self
    }

    #[must_use]
    pub const fn with_restart(mut self) -> Self {
        self.restart_hold_on_pulse = true;
        self
    }

    /// Converts to tick counts, rounding every window up.
    pub fn to_ticks(&self, tick_period: Duration) -> Result<FilterConfig, FilterConfigError> {
        let config = FilterConfig {
            confirm_high_ticks: ticks(self.confirm_high, tick_period)?,
            confirm_low_ticks: ticks(self.confirm_low, tick_period)?,
            min_hold_ticks: ticks(self.min_hold, tick_period)?,
            cutoff_after_hold: self.cutoff_after_hold,
            restart_hold_on_pulse: self.restart_hold_on_pulse,
        };
        config.validate()?;
        Ok(config)
    }
}

/// [`BoostConfig`] expressed in wall-clock time.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BoostTiming {
    pub confirm_high: Duration,
    pub confirm_low: Duration,
    pub min_hold: Duration,
    pub cutoff_after_hold: bool,
}

impl BoostTiming {
    #[must_use]
    pub const fn new(confirm_high: Duration, confirm_low: Duration, min_hold: Duration) -> Self {
        Self {
            confirm_high,
            confirm_low,
            min_hold,
            cutoff_after_hold: false,
        }
    }

    #[must_use]
    pub const fn with_cutoff(mut self) -> Self {
        self.cutoff_after_hold = true;
        self
    }

    pub fn to_ticks(&self, tick_period: Duration) -> Result<BoostConfig, FilterConfigError> {
        let config = BoostConfig {
            confirm_high_ticks: ticks(self.confirm_high, tick_period)?,
            confirm_low_ticks: ticks(self.confirm_low, tick_period)?,
            min_hold_ticks: ticks(self.min_hold, tick_period)?,
            cutoff_after_hold: self.cutoff_after_hold,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Number of whole ticks covering `window`.
pub fn ticks(window: Duration, tick_period: Duration) -> Result<u32, FilterConfigError> {
    if tick_period.is_zero() {
        return Err(FilterConfigError::ZeroTickPeriod);
    }
    let count = window.as_nanos().div_ceil(tick_period.as_nanos());
    u32::try_from(count).map_err(|_| FilterConfigError::WindowTooLong)
}

/// Filter state machine phase.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FilterPhase {
    Idle,
    ConfirmHigh,
    HoldHigh,
    ConfirmBoost,
    HoldWithBoost,
    ConfirmNoBoost,
    ConfirmLow,
}

impl FilterPhase {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            FilterPhase::Idle => "idle",
            FilterPhase::ConfirmHigh => "confirm-high",
            FilterPhase::HoldHigh => "hold-high",
            FilterPhase::ConfirmBoost => "confirm-boost",
            FilterPhase::HoldWithBoost => "hold-boost",
            FilterPhase::ConfirmNoBoost => "confirm-no-boost",
            FilterPhase::ConfirmLow => "confirm-low",
        }
    }

    const fn in_boost_path(self) -> bool {
        matches!(
            self,
            FilterPhase::ConfirmBoost | FilterPhase::HoldWithBoost | FilterPhase::ConfirmNoBoost
        )
    }
}

/// Snapshot of one filter instance.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FilterState {
    pub phase: FilterPhase,
    /// Remaining ticks of the primary confirm or hold window.
    pub countdown: u32,
    /// Remaining ticks of the boost confirm or hold window.
    pub boost_countdown: u32,
    pub stable_output: bool,
    pub boost_output: bool,
}

impl FilterState {
    pub const INITIAL: Self = Self {
        phase: FilterPhase::Idle,
        countdown: 0,
        boost_countdown: 0,
        stable_output: false,
        boost_output: false,
    };
}

/// Filter outputs after one step.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct FilterOutput {
    pub stable: bool,
    pub boost: bool,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
struct Synchronizer {
    stages: [bool; SYNC_STAGES],
}

impl Synchronizer {
    fn shift(&mut self, input: bool) -> bool {
        let out = self.stages[SYNC_STAGES - 1];
        self.stages.copy_within(0..SYNC_STAGES - 1, 1);
        self.stages[0] = input;
        out
    }
}

/// Hysteresis filter with optional boost path.
#[derive(Clone, Debug)]
pub struct DebounceFilter {
    config: FilterConfig,
    boost: Option<BoostConfig>,
    state: FilterState,
    sync: Synchronizer,
    boost_sync: Synchronizer,
}

impl DebounceFilter {
    /// Primary path only; the boost input of [`step`](Self::step) is ignored.
    pub const fn simple(config: FilterConfig) -> Result<Self, FilterConfigError> {
        if let Err(err) = config.validate() {
            return Err(err);
        }
        Ok(Self::build(config, None))
    }

    pub const fn with_boost(
        config: FilterConfig,
        boost: BoostConfig,
    ) -> Result<Self, FilterConfigError> {
        if let Err(err) = config.validate() {
            return Err(err);
        }
        if let Err(err) = boost.validate() {
            return Err(err);
        }
        Ok(Self::build(config, Some(boost)))
    }

    const fn build(config: FilterConfig, boost: Option<BoostConfig>) -> Self {
        Self {
            config,
            boost,
            state: FilterState::INITIAL,
            sync: Synchronizer {
                stages: [false; SYNC_STAGES],
            },
            boost_sync: Synchronizer {
                stages: [false; SYNC_STAGES],
            },
        }
    }

    #[must_use]
    pub const fn config(&self) -> FilterConfig {
        self.config
    }

    #[must_use]
    pub const fn boost_config(&self) -> Option<BoostConfig> {
        self.boost
    }

    #[must_use]
    pub const fn state(&self) -> FilterState {
        self.state
    }

    #[must_use]
    pub const fn output(&self) -> FilterOutput {
        FilterOutput {
            stable: self.state.stable_output,
            boost: self.state.boost_output,
        }
    }

    /// Back to `Idle` with both outputs low and the synchronisers flushed.
    pub fn reset(&mut self) {
        self.state = FilterState::INITIAL;
        self.sync = Synchronizer::default();
        self.boost_sync = Synchronizer::default();
    }

    /// Advances one tick.
    pub fn step(&mut self, input: bool, boost_input: bool) -> FilterOutput {
        let high = self.sync.shift(input);
        let boost_high = self.boost_sync.shift(boost_input);

        match self.state.phase {
            FilterPhase::Idle => {
                if high {
                    self.enter_confirm_high();
                }
            }
            FilterPhase::ConfirmHigh => {
                if self.state.countdown == 0 {
                    self.raise();
                } else if !high {
                    self.state.phase = FilterPhase::Idle;
                    self.state.countdown = 0;
                } else {
                    self.state.countdown -= 1;
                }
            }
            FilterPhase::HoldHigh => {
                self.run_hold(high);
                if self.state.countdown == 0 && !high {
                    self.enter_confirm_low();
                } else if let Some(boost) =
                    self.boost.filter(|_| boost_high && self.state.stable_output)
                {
                    self.enter_confirm_boost(boost);
                }
            }
            FilterPhase::ConfirmLow => {
                if high {
                    // Cancel the pending drop; the hold window has already run out.
                    self.state.phase = FilterPhase::HoldHigh;
                    self.state.countdown = 0;
                } else if self.state.countdown <= 1 {
                    self.state = FilterState::INITIAL;
                } else {
                    self.state.countdown -= 1;
                }
            }
            phase => {
                debug_assert!(phase.in_boost_path());
                self.run_hold(high);
                if !self.state.stable_output {
                    // Cut off underneath the boost.
                    self.leave_boost();
                } else if let Some(boost) = self.boost {
                    self.step_boost(boost, boost_high);
                }
            }
        }

        self.output()
    }

    /// Counts the first high sample; a countdown of zero means armed.
    fn enter_confirm_high(&mut self) {
        self.state.phase = FilterPhase::ConfirmHigh;
        self.state.countdown = self.config.confirm_high_ticks - 1;
    }

    fn raise(&mut self) {
        self.state.phase = FilterPhase::HoldHigh;
        self.state.countdown = self.config.min_hold_ticks;
        self.state.stable_output = true;
    }

    fn enter_confirm_low(&mut self) {
        if self.config.confirm_low_ticks <= 1 {
            self.state = FilterState::INITIAL;
        } else {
            self.state.phase = FilterPhase::ConfirmLow;
            self.state.countdown = self.config.confirm_low_ticks - 1;
        }
    }

    /// Primary hold countdown; runs in `HoldHigh` and throughout the boost path.
    fn run_hold(&mut self, high: bool) {
        let config = self.config;
        if config.restart_hold_on_pulse && high {
            self.state.countdown = config.min_hold_ticks;
        } else {
            self.state.countdown = self.state.countdown.saturating_sub(1);
        }
        if config.cutoff_after_hold && self.state.countdown == 0 {
            self.state.stable_output = false;
        }
    }

    fn enter_confirm_boost(&mut self, boost: BoostConfig) {
        self.state.phase = FilterPhase::ConfirmBoost;
        self.state.boost_countdown = boost.confirm_high_ticks - 1;
    }

    fn raise_boost(&mut self, boost: BoostConfig) {
        self.state.phase = FilterPhase::HoldWithBoost;
        self.state.boost_countdown = boost.min_hold_ticks;
        self.state.boost_output = true;
    }

    fn leave_boost(&mut self) {
        self.state.phase = FilterPhase::HoldHigh;
        self.state.boost_countdown = 0;
        self.state.boost_output = false;
    }

    fn step_boost(&mut self, boost: BoostConfig, boost_high: bool) {
        match self.state.phase {
            FilterPhase::ConfirmBoost => {
                if self.state.boost_countdown == 0 {
                    self.raise_boost(boost);
                } else if !boost_high {
                    self.leave_boost();
                } else {
                    self.state.boost_countdown -= 1;
                }
            }
            FilterPhase::HoldWithBoost => {
                self.state.boost_countdown = self.state.boost_countdown.saturating_sub(1);
                if boost.cutoff_after_hold && self.state.boost_countdown == 0 {
                    self.state.boost_output = false;
                }
                if self.state.boost_countdown == 0 && !boost_high {
                    if boost.confirm_low_ticks <= 1 {
                        self.leave_boost();
                    } else {
                        self.state.phase = FilterPhase::ConfirmNoBoost;
                        self.state.boost_countdown = boost.confirm_low_ticks - 1;
                    }
                }
            }
            FilterPhase::ConfirmNoBoost => {
                if boost_high {
                    self.state.phase = FilterPhase::HoldWithBoost;
                    self.state.boost_countdown = 0;
                } else if self.state.boost_countdown <= 1 {
                    self.leave_boost();
                } else {
                    self.state.boost_countdown -= 1;
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(filter: &mut DebounceFilter, input: bool, steps: u32) -> FilterOutput {
        let mut out = FilterOutput::default();
        for _ in 0..steps {
            out = filter.step(input, false);
        }
        out
    }

    #[test]
    fn cutoff_with_restart_is_rejected() {
        let config = FilterConfig::new(4, 4, 8).with_cutoff().with_restart();
        assert_eq!(
            DebounceFilter::simple(config).err(),
            Some(FilterConfigError::CutoffWithRestart)
        );
    }

    #[test]
    fn zero_windows_are_rejected() {
        assert_eq!(
            FilterConfig::new(0, 4, 8).validate(),
            Err(FilterConfigError::ZeroConfirmWindow)
        );
        assert_eq!(
            ticks(Duration::from_millis(1), Duration::ZERO),
            Err(FilterConfigError::ZeroTickPeriod)
        );
    }

    #[test]
    fn durations_round_up_to_whole_ticks() {
        let period = Duration::from_micros(480);
        assert_eq!(ticks(Duration::from_millis(250), period), Ok(521));
        assert_eq!(ticks(Duration::from_millis(750), period), Ok(1563));
        assert_eq!(ticks(Duration::from_micros(960), period), Ok(2));
    }

    #[test]
    fn synchroniser_delays_by_two_steps() {
        let mut sync = Synchronizer::default();
        assert!(!sync.shift(true));
        assert!(!sync.shift(false));
        assert!(sync.shift(false));
        assert!(!sync.shift(false));
    }

    #[test]
    fn single_tick_confirm_raises_on_the_next_step() {
        let mut filter = DebounceFilter::simple(FilterConfig::new(1, 1, 3)).unwrap();
        filter.step(true, false);
        filter.step(false, false);
        assert!(!filter.step(false, false).stable);
        assert_eq!(filter.state().phase, FilterPhase::ConfirmHigh);
        assert!(filter.step(false, false).stable);
        assert_eq!(filter.state().phase, FilterPhase::HoldHigh);
    }

    #[test]
    fn short_glitch_returns_to_idle() {
        let mut filter = DebounceFilter::simple(FilterConfig::new(5, 5, 10)).unwrap();
        run(&mut filter, true, 4);
        run(&mut filter, false, 4);
        assert_eq!(filter.state().phase, FilterPhase::Idle);
        assert!(!filter.output().stable);
    }

    #[test]
    fn confirm_low_cancelled_by_high_sample() {
        let mut filter = DebounceFilter::simple(FilterConfig::new(2, 8, 2)).unwrap();
        run(&mut filter, true, 6);
        run(&mut filter, false, 5);
        assert_eq!(filter.state().phase, FilterPhase::ConfirmLow);

        run(&mut filter, true, 3);
        assert_eq!(filter.state().phase, FilterPhase::HoldHigh);
        assert!(filter.output().stable);
    }

    #[test]
    fn cutoff_drops_output_when_hold_expires() {
        let mut filter = DebounceFilter::simple(FilterConfig::new(2, 2, 4).with_cutoff()).unwrap();
        run(&mut filter, true, 5);
        assert!(filter.output().stable);

        let out = run(&mut filter, true, 4);
        assert!(!out.stable);
        assert_eq!(filter.state().phase, FilterPhase::HoldHigh);

        // Staying high never re-raises; a full low period is required.
        assert!(!run(&mut filter, true, 20).stable);
    }

    #[test]
    fn restart_extends_hold_while_input_pulses() {
        let mut filter = DebounceFilter::simple(FilterConfig::new(2, 2, 4).with_restart()).unwrap();
        run(&mut filter, true, 4);
        for _ in 0..10 {
            run(&mut filter, false, 3);
            run(&mut filter, true, 1);
        }
        assert!(filter.output().stable);
        assert_eq!(filter.state().phase, FilterPhase::HoldHigh);
    }

    #[test]
    fn reset_clears_state_and_synchroniser() {
        let mut filter = DebounceFilter::simple(FilterConfig::new(1, 1, 3)).unwrap();
        run(&mut filter, true, 4);
        filter.step(true, false);
        filter.reset();
        assert_eq!(filter.state(), FilterState::INITIAL);
        assert!(!filter.step(false, false).stable);
        assert!(!filter.step(false, false).stable);
        assert!(!filter.step(false, false).stable);
    }

    #[test]
    fn boost_path_raises_and_releases() {
        let mut filter =
            DebounceFilter::with_boost(FilterConfig::new(2, 2, 50), BoostConfig::new(3, 2, 4))
                .unwrap();
        run(&mut filter, true, 5);
        assert_eq!(filter.state().phase, FilterPhase::HoldHigh);

        for _ in 0..6 {
            filter.step(true, true);
        }
        assert_eq!(filter.state().phase, FilterPhase::HoldWithBoost);
        assert!(filter.output().boost);
        assert!(filter.output().stable);

        for _ in 0..10 {
            filter.step(true, false);
        }
        assert_eq!(filter.state().phase, FilterPhase::HoldHigh);
        assert!(!filter.output().boost);
        assert!(filter.output().stable);
    }

    #[test]
    fn boost_never_outlives_a_cut_off_primary() {
        let mut filter = DebounceFilter::with_boost(
            FilterConfig::new(2, 2, 6).with_cutoff(),
            BoostConfig::new(1, 2, 50),
        )
        .unwrap();

        let mut boosted = false;
        for step in 0..20 {
            let out = filter.step(true, true);
            assert!(out.stable || !out.boost, "boost without stable at step {step}");
            boosted |= out.boost;
        }
        assert!(boosted);
        assert_eq!(filter.output(), FilterOutput::default());
        assert_eq!(filter.state().phase, FilterPhase::HoldHigh);
    }

    #[test]
    fn boost_is_not_confirmed_after_cutoff() {
        let mut filter = DebounceFilter::with_boost(
            FilterConfig::new(2, 2, 4).with_cutoff(),
            BoostConfig::new(2, 2, 50),
        )
        .unwrap();
        assert!(!run(&mut filter, true, 20).stable);

        for _ in 0..10 {
            assert_eq!(filter.step(true, true), FilterOutput::default());
        }
        assert_eq!(filter.state().phase, FilterPhase::HoldHigh);
    }

    #[test]
    fn boost_cutoff_drops_boost_and_keeps_primary() {
        let mut filter = DebounceFilter::with_boost(
            FilterConfig::new(1, 1, 100),
            BoostConfig::new(1, 1, 4).with_cutoff(),
        )
        .unwrap();

        let mut boosted = false;
        for _ in 0..30 {
            boosted |= filter.step(true, true).boost;
        }
        assert!(boosted);
        assert_eq!(filter.output(), FilterOutput { stable: true, boost: false });
        assert_eq!(filter.state().phase, FilterPhase::HoldWithBoost);

        // A boost input that stays high never re-raises the boost.
        for _ in 0..20 {
            assert!(!filter.step(true, true).boost);
        }

        // A full low period on the boost input re-arms it.
        for _ in 0..4 {
            filter.step(true, false);
        }
        assert_eq!(filter.state().phase, FilterPhase::HoldHigh);
        let reraised = (0..5).any(|_| filter.step(true, true).boost);
        assert!(reraised);
        assert!(filter.output().stable);
    }

    #[test]
    fn simple_filter_ignores_boost_input() {
        let mut filter = DebounceFilter::simple(FilterConfig::new(1, 1, 100)).unwrap();
        for _ in 0..20 {
            filter.step(true, true);
        }
        assert_eq!(filter.state().phase, FilterPhase::HoldHigh);
        assert!(!filter.output().boost);
    }
}
