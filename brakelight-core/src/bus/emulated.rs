//! Emulated open-drain bus with a register-file sensor attached.
//!
//! Host tooling and tests drive the [`BusProtocolEngine`](super::BusProtocolEngine)
//! against [`EmulatedBus`], which resolves every tick into clock edges, feeds
//! them to an [`EmulatedSensor`] and records the decoded traffic in a
//! [`BusMonitor`].

use heapless::{HistoryBuf, OldestOrdered};

use super::{BusDrive, BusLink, SclDrive, SdaDrive, SlaveAddress};
use crate::sample::Axis;
use crate::sensor::registers;

/// Events retained by a [`BusMonitor`].
pub const MONITOR_CAPACITY: usize = 256;

/// Size of the emulated register file.
pub const REGISTER_COUNT: usize = 256;

/// Bit 0 of an axis low byte: set when a fresh sample was latched.
pub const NEW_DATA_FLAG: u8 = 0x01;

/// Decoded bus activity.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BusEvent {
    Start,
    Stop,
    /// A completed clock pulse and the SDA level latched on its rising edge.
    Bit(bool),
}

/// Passive observer that decodes START, STOP and data bits.
///
/// A bit is recorded once its clock pulse completes (SCL falls again). A
/// rising edge interrupted by a START or STOP is part of that condition and
/// is not reported as a bit.
pub struct BusMonitor {
    events: HistoryBuf<BusEvent, MONITOR_CAPACITY>,
    pending: Option<bool>,
}

impl BusMonitor {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            events: HistoryBuf::new(),
            pending: None,
        }
    }

    /// Recorded events, oldest first.
    pub fn events(&self) -> OldestOrdered<'_, BusEvent> {
        self.events.oldest_ordered()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events = HistoryBuf::new();
        self.pending = None;
    }

    fn condition(&mut self, event: BusEvent) {
        self.pending = None;
        self.events.write(event);
    }

    fn rise(&mut self, level: bool) {
        self.pending = Some(level);
    }

    fn fall(&mut self) {
        if let Some(bit) = self.pending.take() {
            self.events.write(BusEvent::Bit(bit));
        }
    }
}

impl Default for BusMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Slave-side view of the bus edges.
pub trait BusDevice {
    fn on_start(&mut self);
    fn on_stop(&mut self);
    /// SCL went low; the device may change its SDA drive.
    fn on_scl_fall(&mut self);
    /// SCL went high; `sda` is the wired level the device latches.
    fn on_scl_rise(&mut self, sda: bool);
    /// Current SDA drive of the device.
    fn sda(&self) -> SdaDrive;
}

/// Wired-AND bus between the master, one device, and a monitor.
pub struct EmulatedBus<D> {
    device: D,
    monitor: BusMonitor,
    scl: bool,
    master_sda: SdaDrive,
}

impl<D: BusDevice> EmulatedBus<D> {
    #[must_use]
    pub const fn new(device: D) -> Self {
        Self {
            device,
            monitor: BusMonitor::new(),
            scl: true,
            master_sda: SdaDrive::Released,
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn monitor(&self) -> &BusMonitor {
        &self.monitor
    }

    pub fn monitor_mut(&mut self) -> &mut BusMonitor {
        &mut self.monitor
    }

    /// Current SCL level.
    #[must_use]
    pub const fn scl(&self) -> bool {
        self.scl
    }

    /// Current resolved SDA level.
    pub fn sda(&self) -> bool {
        self.master_sda.level() && self.device.sda().level()
    }

    fn fall(&mut self) {
        if self.scl {
            self.scl = false;
            self.device.on_scl_fall();
            self.monitor.fall();
        }
    }

    fn rise(&mut self) {
        if !self.scl {
            self.scl = true;
            let level = self.sda();
            self.device.on_scl_rise(level);
            self.monitor.rise(level);
        }
    }

    /// Changes the master drive while SCL is high and reports conditions.
    fn drive_high_phase(&mut self, sda: SdaDrive) {
        let before = self.sda();
        self.master_sda = sda;
        let after = self.sda();
        if before && !after {
            self.device.on_start();
            self.monitor.condition(BusEvent::Start);
        } else if !before && after {
            self.device.on_stop();
            self.monitor.condition(BusEvent::Stop);
        }
    }
}

impl<D: BusDevice> BusLink for EmulatedBus<D> {
    fn period(&mut self, drive: BusDrive) -> bool {
        match drive.scl {
            SclDrive::Pulse => {
                self.fall();
                self.master_sda = drive.sda;
                let sampled = self.sda();
                self.rise();
                sampled
            }
            SclDrive::Low => {
                self.fall();
                self.master_sda = drive.sda;
                self.sda()
            }
            SclDrive::High if !self.scl => {
                self.master_sda = drive.sda;
                let sampled = self.sda();
                self.rise();
                sampled
            }
            SclDrive::High => {
                self.drive_high_phase(drive.sda);
                self.sda()
            }
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum AfterAck {
    Register,
    Data,
    Transmit,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum SlaveState {
    Idle,
    Address,
    Register,
    Data,
    Ack(AfterAck),
    Transmit { bit: u8 },
    AwaitMasterAck { acked: bool },
    /// Addressed to someone else, or out of sync; wait for START/STOP.
    Ignore,
}

/// Register-file accelerometer answering at one address.
pub struct EmulatedSensor {
    address: SlaveAddress,
    registers: [u8; REGISTER_COUNT],
    pointer: u8,
    state: SlaveState,
    shift: u8,
    bits: u8,
    sda: SdaDrive,
    acknowledge: bool,
    writes: u32,
    reads: u32,
}

impl EmulatedSensor {
    #[must_use]
    pub const fn new(address: SlaveAddress) -> Self {
        Self {
            address,
            registers: [0; REGISTER_COUNT],
            pointer: 0,
            state: SlaveState::Idle,
            shift: 0,
            bits: 0,
            sda: SdaDrive::Released,
            acknowledge: true,
            writes: 0,
            reads: 0,
        }
    }

    #[must_use]
    pub const fn address(&self) -> SlaveAddress {
        self.address
    }

    #[must_use]
    pub const fn register(&self, register: u8) -> u8 {
        self.registers[register as usize]
    }

    pub fn set_register(&mut self, register: u8, value: u8) {
        self.registers[register as usize] = value;
    }

    /// Packs a 14-bit reading into the axis low/high registers.
    pub fn set_axis(&mut self, axis: Axis, raw: u16) {
        let (low, high) = registers::axis_registers(axis);
        let raw = raw & 0x3FFF;
        let [lsb, _] = ((raw & 0x3F) << 2).to_le_bytes();
        let [msb, _] = (raw >> 6).to_le_bytes();
        self.registers[low as usize] = lsb | NEW_DATA_FLAG;
        self.registers[high as usize] = msb;
    }

    /// Writes the raw two's-complement temperature register.
    pub fn set_temperature(&mut self, raw: u8) {
        self.registers[registers::TEMP as usize] = raw;
    }

    /// When disabled the device never drives an acknowledge.
    pub fn set_acknowledge(&mut self, enabled: bool) {
        self.acknowledge = enabled;
    }

    #[must_use]
    pub const fn acknowledges(&self) -> bool {
        self.acknowledge
    }

    /// Number of data bytes accepted by register writes.
    #[must_use]
    pub const fn writes(&self) -> u32 {
        self.writes
    }

    /// Number of bytes shifted out to the master.
    #[must_use]
    pub const fn reads(&self) -> u32 {
        self.reads
    }

    fn accept(&mut self, byte: u8) {
        match self.state {
            SlaveState::Address => {
                if byte >> 1 == self.address.get() && self.acknowledge {
                    self.sda = SdaDrive::Low;
                    self.state = SlaveState::Ack(if byte & 1 == 1 {
                        AfterAck::Transmit
                    } else {
                        AfterAck::Register
                    });
                } else {
                    self.state = SlaveState::Ignore;
                }
            }
            SlaveState::Register => {
                self.pointer = byte;
                self.sda = SdaDrive::Low;
                self.state = SlaveState::Ack(AfterAck::Data);
            }
            SlaveState::Data => {
                self.registers[self.pointer as usize] = byte;
                self.pointer = self.pointer.wrapping_add(1);
                self.writes = self.writes.saturating_add(1);
                self.sda = SdaDrive::Low;
                self.state = SlaveState::Ack(AfterAck::Data);
            }
            _ => {}
        }
    }

    fn load_transmit(&mut self) {
        self.shift = self.registers[self.pointer as usize];
        self.reads = self.reads.saturating_add(1);
        self.state = SlaveState::Transmit { bit: 0 };
        self.sda = SdaDrive::from_bit(self.shift & 0x80 != 0);
    }
}

impl BusDevice for EmulatedSensor {
    fn on_start(&mut self) {
        self.state = SlaveState::Address;
        self.shift = 0;
        self.bits = 0;
        self.sda = SdaDrive::Released;
    }

    fn on_stop(&mut self) {
        self.state = SlaveState::Idle;
        self.sda = SdaDrive::Released;
    }

    fn on_scl_fall(&mut self) {
        match self.state {
            SlaveState::Address | SlaveState::Register | SlaveState::Data if self.bits == 8 => {
                let byte = self.shift;
                self.shift = 0;
                self.bits = 0;
                self.accept(byte);
            }
            SlaveState::Ack(after) => {
                self.sda = SdaDrive::Released;
                match after {
                    AfterAck::Register => self.state = SlaveState::Register,
                    AfterAck::Data => self.state = SlaveState::Data,
                    AfterAck::Transmit => self.load_transmit(),
                }
            }
            SlaveState::Transmit { bit } if bit < 7 => {
                let next = bit + 1;
                self.state = SlaveState::Transmit { bit: next };
                self.sda = SdaDrive::from_bit(self.shift & (0x80 >> next) != 0);
            }
            SlaveState::Transmit { .. } => {
                self.state = SlaveState::AwaitMasterAck { acked: false };
                self.sda = SdaDrive::Released;
            }
            SlaveState::AwaitMasterAck { acked: true } => {
                self.pointer = self.pointer.wrapping_add(1);
                self.load_transmit();
            }
            SlaveState::AwaitMasterAck { acked: false } => self.state = SlaveState::Ignore,
            _ => {}
        }
    }

    fn on_scl_rise(&mut self, sda: bool) {
        match self.state {
            SlaveState::Address | SlaveState::Register | SlaveState::Data if self.bits < 8 => {
                self.shift = (self.shift << 1) | u8::from(sda);
                self.bits += 1;
            }
            SlaveState::AwaitMasterAck { .. } => {
                self.state = SlaveState::AwaitMasterAck { acked: !sda };
            }
            _ => {}
        }
    }

    fn sda(&self) -> SdaDrive {
        self.sda
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{BusProtocolEngine, RegisterTransaction};

    fn bus() -> EmulatedBus<EmulatedSensor> {
        EmulatedBus::new(EmulatedSensor::new(SlaveAddress::BMA180_PRIMARY))
    }

    #[test]
    fn axis_packing_keeps_six_low_bits_in_the_top_of_lsb() {
        let mut sensor = EmulatedSensor::new(SlaveAddress::BMA180_PRIMARY);
        sensor.set_axis(Axis::Z, 0x3FFF);
        assert_eq!(sensor.register(registers::ACC_Z_LSB), 0xFD);
        assert_eq!(sensor.register(registers::ACC_Z_MSB), 0xFF);

        sensor.set_axis(Axis::X, 0x0041);
        assert_eq!(sensor.register(registers::ACC_X_LSB), 0x05);
        assert_eq!(sensor.register(registers::ACC_X_MSB), 0x01);
    }

    #[test]
    fn write_lands_in_register_file() {
        let mut bus = bus();
        let mut engine = BusProtocolEngine::new(SlaveAddress::BMA180_PRIMARY);
        let request = RegisterTransaction::write(0x20, 0x5A);

        let mut completion = None;
        for _ in 0..64 {
            completion = engine.tick(Some(request), &mut bus);
            if completion.is_some() {
                break;
            }
        }

        assert!(completion.is_some());
        assert_eq!(bus.device().register(0x20), 0x5A);
        assert_eq!(bus.device().writes(), 1);
    }

    #[test]
    fn foreign_address_is_ignored() {
        let mut bus = EmulatedBus::new(EmulatedSensor::new(SlaveAddress::BMA180_SECONDARY));
        let mut engine = BusProtocolEngine::new(SlaveAddress::BMA180_PRIMARY);
        let request = RegisterTransaction::write(0x20, 0x5A);

        for _ in 0..200 {
            assert!(engine.tick(Some(request), &mut bus).is_none());
        }
        assert_eq!(bus.device().register(0x20), 0);
        assert!(engine.missed_acks() > 0);
    }

    #[test]
    fn monitor_discards_rise_cut_short_by_stop() {
        let mut monitor = BusMonitor::new();
        monitor.rise(false);
        monitor.condition(BusEvent::Stop);
        monitor.fall();
        let events: heapless::Vec<BusEvent, 4> = monitor.events().copied().collect();
        assert_eq!(events.as_slice(), &[BusEvent::Stop]);
    }
}
