//! Telemetry forwarding for the firmware target.
//!
//! The controller keeps its own bounded ring of events. This module drains
//! whatever was recorded since the previous drain and mirrors it to defmt
//! (or stdout on the host) so bring-up sessions see bus traffic, decision
//! changes and filter transitions as they happen.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use brakelight_core::telemetry::{
    EventId, TelemetryEventKind, TelemetryRecord, TelemetryRecorder,
};

/// Cursor into a [`TelemetryRecorder`] that remembers what was already logged.
pub struct TelemetryDrain {
    cursor: EventId,
}

impl TelemetryDrain {
    pub const fn new() -> Self {
        Self { cursor: 0 }
    }

    /// Logs every record newer than the previous drain and returns how many
    /// were emitted. Records that fell out of the ring are skipped.
    pub fn drain<const N: usize>(&mut self, recorder: &TelemetryRecorder<N>) -> usize {
        let mut emitted = 0;
        for record in recorder.records_since(self.cursor) {
            emit_log(record);
            emitted += 1;
        }
        self.cursor = recorder.next_id();
        emitted
    }

    #[cfg(test)]
    pub const fn cursor(&self) -> EventId {
        self.cursor
    }
}

impl Default for TelemetryDrain {
    fn default() -> Self {
        Self::new()
    }
}

const fn is_fault(event: TelemetryEventKind) -> bool {
    matches!(
        event,
        TelemetryEventKind::AcknowledgeMissed | TelemetryEventKind::ControllerReset
    )
}

#[cfg(target_os = "none")]
fn emit_log(record: &TelemetryRecord) {
    if is_fault(record.event) {
        defmt::warn!("telemetry {}", defmt::Display2Format(record));
    } else {
        defmt::info!("telemetry {}", defmt::Display2Format(record));
    }
}

#[cfg(not(target_os = "none"))]
fn emit_log(record: &TelemetryRecord) {
    if is_fault(record.event) {
        println!("telemetry! {record}");
    } else {
        println!("telemetry {record}");
    }
}
