#![no_std]

// Brake-light controller logic shared by the firmware and the host emulator.
//
// Everything here is `no_std` so the same bus engine, poll sequencer, filters
// and decision tables run on the MCU and inside host tests.

pub mod bus;
pub mod controller;
pub mod decision;
pub mod filter;
pub mod output;
pub mod repl;
pub mod sample;
pub mod sensor;
pub mod sequencer;
pub mod telemetry;
