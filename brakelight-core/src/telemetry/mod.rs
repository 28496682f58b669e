//! Telemetry event catalog shared by firmware and host targets.
//!
//! The controller records what changed on each tick into a fixed-size ring.
//! Event kinds serialize to compact numeric codes so the firmware can ship
//! them over `defmt` and the emulator can print them into its transcript;
//! the payload carries the value that changed.

use core::fmt;

use heapless::{HistoryBuf, OldestOrdered};

use crate::bus::Direction;
use crate::decision::IntensityCode;
use crate::sample::Axis;

/// Monotonic identifier assigned to every record.
pub type EventId = u32;

/// Controller tick at which an event was recorded.
pub type TickStamp = u64;

/// Filter instance an event refers to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FilterId {
    DecelLow,
    DecelHigh,
    Tilt,
}

impl FilterId {
    pub const ALL: [FilterId; 3] = [FilterId::DecelLow, FilterId::DecelHigh, FilterId::Tilt];

    const fn index(self) -> u16 {
        match self {
            FilterId::DecelLow => 0,
            FilterId::DecelHigh => 1,
            FilterId::Tilt => 2,
        }
    }

    fn from_index(index: u16) -> Option<Self> {
        Self::ALL.get(usize::from(index)).copied()
    }
}

impl fmt::Display for FilterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FilterId::DecelLow => "decel-low",
            FilterId::DecelHigh => "decel-high",
            FilterId::Tilt => "tilt",
        })
    }
}

/// Discriminated telemetry events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryEventKind {
    TransactionComplete(Direction),
    SampleReady(Axis),
    TemperatureSampled,
    IntensityChanged,
    TiltChanged,
    TemperatureWarning,
    FilterChanged(FilterId),
    /// First missed acknowledge of a stall.
    AcknowledgeMissed,
    ControllerReset,
    Custom(u16),
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::TransactionComplete(direction) => {
                write!(f, "transaction-complete {direction}")
            }
            TelemetryEventKind::SampleReady(axis) => write!(f, "sample-ready {axis}"),
            TelemetryEventKind::TemperatureSampled => f.write_str("temperature-sampled"),
            TelemetryEventKind::IntensityChanged => f.write_str("intensity-changed"),
            TelemetryEventKind::TiltChanged => f.write_str("tilt-changed"),
            TelemetryEventKind::TemperatureWarning => f.write_str("temperature-warning"),
            TelemetryEventKind::FilterChanged(id) => write!(f, "filter-changed {id}"),
            TelemetryEventKind::AcknowledgeMissed => f.write_str("acknowledge-missed"),
            TelemetryEventKind::ControllerReset => f.write_str("controller-reset"),
            TelemetryEventKind::Custom(code) => write!(f, "custom({code})"),
        }
    }
}

impl TelemetryEventKind {
    const TRANSACTION_BASE: u16 = 0x0000;
    const SAMPLE_BASE: u16 = 0x0004;
    const TEMPERATURE_CODE: u16 = 0x0008;
    const INTENSITY_CODE: u16 = 0x0009;
    const TILT_CODE: u16 = 0x000A;
    const TEMPERATURE_WARNING_CODE: u16 = 0x000B;
    const ACK_MISSED_CODE: u16 = 0x000C;
    const RESET_CODE: u16 = 0x000D;
    const FILTER_BASE: u16 = 0x0010;
    const FILTER_END: u16 = Self::FILTER_BASE + 3;

    /// Encodes the event into a compact transport-friendly discriminant.
    #[must_use]
    pub const fn to_raw(self) -> u16 {
        match self {
            TelemetryEventKind::TransactionComplete(Direction::Write) => Self::TRANSACTION_BASE,
            TelemetryEventKind::TransactionComplete(Direction::Read) => Self::TRANSACTION_BASE + 1,
            TelemetryEventKind::SampleReady(axis) => Self::SAMPLE_BASE + axis_index(axis),
            TelemetryEventKind::TemperatureSampled => Self::TEMPERATURE_CODE,
            TelemetryEventKind::IntensityChanged => Self::INTENSITY_CODE,
            TelemetryEventKind::TiltChanged => Self::TILT_CODE,
            TelemetryEventKind::TemperatureWarning => Self::TEMPERATURE_WARNING_CODE,
            TelemetryEventKind::FilterChanged(id) => Self::FILTER_BASE + id.index(),
            TelemetryEventKind::AcknowledgeMissed => Self::ACK_MISSED_CODE,
            TelemetryEventKind::ControllerReset => Self::RESET_CODE,
            TelemetryEventKind::Custom(code) => code,
        }
    }

    /// Decodes a raw discriminant, falling back to [`TelemetryEventKind::Custom`].
    #[must_use]
    pub fn from_raw(code: u16) -> Self {
        match code {
            0x0000 => TelemetryEventKind::TransactionComplete(Direction::Write),
            0x0001 => TelemetryEventKind::TransactionComplete(Direction::Read),
            Self::TEMPERATURE_CODE => TelemetryEventKind::TemperatureSampled,
            Self::INTENSITY_CODE => TelemetryEventKind::IntensityChanged,
            Self::TILT_CODE => TelemetryEventKind::TiltChanged,
            Self::TEMPERATURE_WARNING_CODE => TelemetryEventKind::TemperatureWarning,
            Self::ACK_MISSED_CODE => TelemetryEventKind::AcknowledgeMissed,
            Self::RESET_CODE => TelemetryEventKind::ControllerReset,
            value if (Self::SAMPLE_BASE..Self::TEMPERATURE_CODE).contains(&value) => {
                axis_from_index(value - Self::SAMPLE_BASE).map_or(
                    TelemetryEventKind::Custom(value),
                    TelemetryEventKind::SampleReady,
                )
            }
            value if (Self::FILTER_BASE..Self::FILTER_END).contains(&value) => {
                FilterId::from_index(value - Self::FILTER_BASE).map_or(
                    TelemetryEventKind::Custom(value),
                    TelemetryEventKind::FilterChanged,
                )
            }
            other => TelemetryEventKind::Custom(other),
        }
    }
}

/// Value carried alongside an event.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TelemetryPayload {
    None,
    Transaction { register: u8, data: Option<u8> },
    /// Raw 14-bit axis value.
    Sample(u16),
    /// Raw temperature register.
    Temperature(u8),
    Intensity(IntensityCode),
    Flag(bool),
    Filter { stable: bool, boost: bool },
    /// Missed acknowledges counted so far.
    MissedAcks(u32),
}

impl fmt::Display for TelemetryPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryPayload::None => Ok(()),
            TelemetryPayload::Transaction {
                register,
                data: Some(data),
            } => write!(f, "reg={register:#04x} data={data:#04x}"),
            TelemetryPayload::Transaction {
                register,
                data: None,
            } => write!(f, "reg={register:#04x}"),
            TelemetryPayload::Sample(raw) => write!(f, "raw={raw}"),
            TelemetryPayload::Temperature(raw) => write!(f, "raw={raw:#04x}"),
            TelemetryPayload::Intensity(code) => write!(f, "{code}"),
            TelemetryPayload::Flag(value) => f.write_str(if *value { "on" } else { "off" }),
            TelemetryPayload::Filter { stable, boost } => {
                write!(f, "stable={stable} boost={boost}")
            }
            TelemetryPayload::MissedAcks(count) => write!(f, "missed={count}"),
        }
    }
}

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 64;

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TelemetryRecord {
    pub id: EventId,
    pub tick: TickStamp,
    pub event: TelemetryEventKind,
    pub details: TelemetryPayload,
}

impl fmt::Display for TelemetryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} @{} {}", self.id, self.tick, self.event)?;
        if self.details != TelemetryPayload::None {
            write!(f, " {}", self.details)?;
        }
        Ok(())
    }
}

/// Records telemetry events into a fixed-size ring buffer.
pub struct TelemetryRecorder<const CAPACITY: usize = TELEMETRY_RING_CAPACITY> {
    ring: HistoryBuf<TelemetryRecord, CAPACITY>,
    next_event_id: EventId,
}

impl<const CAPACITY: usize> TelemetryRecorder<CAPACITY> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
        }
    }

    /// Returns an iterator over the recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord> {
        self.ring.oldest_ordered()
    }

    /// Records with an id at or after `cursor` that are still retained.
    ///
    /// Pass [`next_id`](Self::next_id) from the previous drain to receive
    /// only what was recorded since.
    pub fn records_since(&self, cursor: EventId) -> impl Iterator<Item = &TelemetryRecord> {
        let next = self.next_event_id;
        let window = next.wrapping_sub(cursor);
        self.ring
            .oldest_ordered()
            .filter(move |record| next.wrapping_sub(record.id) <= window)
    }

    pub fn latest(&self) -> Option<&TelemetryRecord> {
        self.ring.recent()
    }

    /// Identifier the next record will receive.
    #[must_use]
    pub const fn next_id(&self) -> EventId {
        self.next_event_id
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Drops every record; identifiers keep counting.
    pub fn clear(&mut self) {
        self.ring.clear();
    }

    pub fn record(
        &mut self,
        event: TelemetryEventKind,
        details: TelemetryPayload,
        tick: TickStamp,
    ) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(TelemetryRecord {
            id,
            tick,
            event,
            details,
        });

        id
    }
}

impl<const CAPACITY: usize> Default for TelemetryRecorder<CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}

const fn axis_index(axis: Axis) -> u16 {
    match axis {
        Axis::X => 0,
        Axis::Y => 1,
        Axis::Z => 2,
    }
}

fn axis_from_index(index: u16) -> Option<Axis> {
    match index {
        0 => Some(Axis::X),
        1 => Some(Axis::Y),
        2 => Some(Axis::Z),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_codes_round_trip() {
        let fixtures = [
            TelemetryEventKind::TransactionComplete(Direction::Read),
            TelemetryEventKind::SampleReady(Axis::Z),
            TelemetryEventKind::TemperatureSampled,
            TelemetryEventKind::FilterChanged(FilterId::Tilt),
            TelemetryEventKind::AcknowledgeMissed,
            TelemetryEventKind::ControllerReset,
        ];
        for event in fixtures {
            assert_eq!(TelemetryEventKind::from_raw(event.to_raw()), event);
        }
        assert_eq!(
            TelemetryEventKind::from_raw(0x0007),
            TelemetryEventKind::Custom(0x0007)
        );
    }

    #[test]
    fn ids_increase_and_ring_keeps_newest() {
        let mut recorder = TelemetryRecorder::<4>::new();
        for tick in 0..6 {
            recorder.record(
                TelemetryEventKind::TiltChanged,
                TelemetryPayload::Flag(tick % 2 == 0),
                tick,
            );
        }

        assert_eq!(recorder.len(), 4);
        assert_eq!(recorder.next_id(), 6);
        let ids: heapless::Vec<EventId, 4> = recorder.oldest_first().map(|r| r.id).collect();
        assert_eq!(ids.as_slice(), &[2, 3, 4, 5]);
        assert_eq!(recorder.latest().map(|r| r.tick), Some(5));
    }

    #[test]
    fn records_since_returns_only_new_entries() {
        let mut recorder = TelemetryRecorder::<8>::new();
        recorder.record(TelemetryEventKind::ControllerReset, TelemetryPayload::None, 0);
        let cursor = recorder.next_id();
        recorder.record(
            TelemetryEventKind::IntensityChanged,
            TelemetryPayload::Intensity(IntensityCode::Low),
            10,
        );
        recorder.record(
            TelemetryEventKind::IntensityChanged,
            TelemetryPayload::Intensity(IntensityCode::High),
            20,
        );

        let ticks: heapless::Vec<TickStamp, 8> =
            recorder.records_since(cursor).map(|r| r.tick).collect();
        assert_eq!(ticks.as_slice(), &[10, 20]);
        assert_eq!(recorder.records_since(recorder.next_id()).count(), 0);
    }
}
