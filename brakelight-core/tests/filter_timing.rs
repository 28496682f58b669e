use core::time::Duration;

use brakelight_core::controller::{ControllerConfig, DEFAULT_TICK_PERIOD};
use brakelight_core::filter::{
    BoostConfig, BoostTiming, DebounceFilter, FilterConfig, FilterConfigError, FilterOutput,
    FilterPhase, FilterTiming, SYNC_STAGES,
};

const CONFIRM: u32 = 521;
const HOLD: u32 = 1_563;

fn decel_filter() -> DebounceFilter {
    let config = ControllerConfig::DEFAULT
        .decel_low
        .to_ticks(DEFAULT_TICK_PERIOD)
        .unwrap();
    DebounceFilter::simple(config).unwrap()
}

/// Feeds a pulse of `width` high samples followed by low samples and returns
/// the step (1-based) on which the output first rose.
fn first_rise(filter: &mut DebounceFilter, width: u32, total: u32) -> Option<u32> {
    (1..=total).find(|&step| filter.step(step <= width, false).stable)
}

#[test]
fn default_windows_round_up() {
    let config = ControllerConfig::DEFAULT
        .decel_low
        .to_ticks(DEFAULT_TICK_PERIOD)
        .unwrap();
    assert_eq!(config.confirm_high_ticks, CONFIRM);
    assert_eq!(config.confirm_low_ticks, CONFIRM);
    assert_eq!(config.min_hold_ticks, HOLD);
}

#[test]
fn pulse_one_tick_short_never_raises() {
    let mut filter = decel_filter();
    assert_eq!(first_rise(&mut filter, CONFIRM - 1, 4 * CONFIRM), None);
    assert_eq!(filter.state().phase, FilterPhase::Idle);
}

#[test]
fn full_width_pulse_raises_one_tick_after_the_window() {
    let mut filter = decel_filter();
    let lag = u32::try_from(SYNC_STAGES).unwrap();
    // The window closes on the step that consumes the last synchronised
    // high sample.
    let window_closes = CONFIRM + lag;
    assert_eq!(
        first_rise(&mut filter, CONFIRM, 4 * CONFIRM),
        Some(window_closes + 1)
    );
}

#[test]
fn output_holds_for_the_minimum_after_a_short_pulse() {
    let mut filter = decel_filter();
    let rise = first_rise(&mut filter, CONFIRM, 4 * CONFIRM).unwrap();

    let mut high_steps = 1;
    let mut step = rise;
    while filter.step(false, false).stable {
        high_steps += 1;
        step += 1;
        assert!(step < rise + 2 * HOLD, "output never dropped");
    }

    assert!(high_steps >= HOLD);
    // The first low sample after the hold already counts toward the drop.
    assert_eq!(high_steps, HOLD + CONFIRM - 1);
}

#[test]
fn restart_extends_hold_while_input_pulses() {
    let mut filter = decel_filter();
    first_rise(&mut filter, u32::MAX, CONFIRM + 3).unwrap();

    // Short blips inside the hold window keep pushing the drop out.
    for _ in 0..4 {
        for _ in 0..HOLD / 2 {
            assert!(filter.step(false, false).stable);
        }
        filter.step(true, false);
    }
    assert!(filter.state().countdown > HOLD / 2);
}

#[test]
fn boost_pulse_shorter_than_its_confirm_never_asserts() {
    let primary = FilterConfig::new(4, 4, 20);
    let boost = BoostConfig::new(10, 4, 20);
    let mut filter = DebounceFilter::with_boost(primary, boost).unwrap();

    for step in 0..200 {
        let boost_input = (20..29).contains(&step);
        let out = filter.step(true, boost_input);
        assert!(!out.boost, "boost asserted at step {step}");
    }
    assert!(filter.output().stable);
}

#[test]
fn boost_rises_and_releases_inside_primary_hold() {
    let primary = FilterConfig::new(4, 4, 20);
    let boost = BoostConfig::new(3, 3, 5);
    let mut filter = DebounceFilter::with_boost(primary, boost).unwrap();

    let mut boosted = false;
    for _ in 0..30 {
        boosted |= filter.step(true, true).boost;
    }
    assert!(boosted);
    assert_eq!(filter.state().phase, FilterPhase::HoldWithBoost);

    for _ in 0..30 {
        filter.step(true, false);
    }
    assert!(!filter.output().boost);
    assert!(filter.output().stable);
    assert_eq!(filter.state().phase, FilterPhase::HoldHigh);
}

#[test]
fn boost_timing_carries_its_own_cutoff() {
    let timing = BoostTiming::new(
        Duration::from_millis(250),
        Duration::from_millis(250),
        Duration::from_millis(5),
    )
    .with_cutoff();
    let boost = timing.to_ticks(DEFAULT_TICK_PERIOD).unwrap();
    assert!(boost.cutoff_after_hold);
    assert_eq!(boost.min_hold_ticks, 11);

    let primary = FilterConfig::new(4, 4, 2_000);
    let mut filter = DebounceFilter::with_boost(primary, boost).unwrap();
    let mut boosted_at = None;
    for step in 0..1_000 {
        let out = filter.step(true, true);
        if out.boost && boosted_at.is_none() {
            boosted_at = Some(step);
        }
    }
    assert!(boosted_at.is_some());
    assert_eq!(filter.output(), FilterOutput { stable: true, boost: false });
}

#[test]
fn cutoff_with_restart_is_rejected_from_timing() {
    let timing = FilterTiming::new(
        Duration::from_millis(250),
        Duration::from_millis(250),
        Duration::from_millis(750),
    )
    .with_cutoff()
    .with_restart();
    assert_eq!(
        timing.to_ticks(DEFAULT_TICK_PERIOD),
        Err(FilterConfigError::CutoffWithRestart)
    );
}
