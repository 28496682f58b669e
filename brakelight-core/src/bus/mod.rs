//! Bit-level two-wire bus master.
//!
//! The engine executes exactly one single-byte register write or register
//! read per request. Every call to [`BusProtocolEngine::tick`] asserts one
//! clock period on the bus through a [`BusLink`] and then advances the state
//! machine from the data level sampled during that period, so the lines a
//! tick drives are always a function of the state committed on the previous
//! tick.
//!
//! Wire framing produced by the engine:
//!
//! - write: START, address + W, ACK, register, ACK, data, ACK, STOP
//! - read: START, address + W, ACK, register, ACK, STOP, START, address + R,
//!   ACK, data, STOP (the master drives the stop instead of acknowledging)

use core::fmt;

pub mod emulated;

/// Ticks needed for a register write, counted from the idle `Reset` phase.
pub const WRITE_TRANSACTION_TICKS: u32 = 32;
/// Ticks needed for a register read, counted from the idle `Reset` phase.
pub const READ_TRANSACTION_TICKS: u32 = 44;

/// Seven-bit address of the single device the engine talks to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SlaveAddress(u8);

impl SlaveAddress {
    /// Accelerometer address with the SDO pin tied low.
    pub const BMA180_PRIMARY: Self = Self(0x40);
    /// Accelerometer address with the SDO pin tied high.
    pub const BMA180_SECONDARY: Self = Self(0x41);

    /// Validates a raw 7-bit address.
    pub const fn new(address: u8) -> Result<Self, AddressError> {
        if address > 0x7F {
            Err(AddressError(address))
        } else {
            Ok(Self(address))
        }
    }

    /// Returns the raw 7-bit address.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Address byte as shifted onto the wire, direction bit in the LSB.
    #[must_use]
    pub const fn frame(self, direction: Direction) -> u8 {
        (self.0 << 1) | direction.bit()
    }
}

/// Raised when an address does not fit into seven bits.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AddressError(pub u8);

impl fmt::Display for AddressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bus address {:#04x} exceeds seven bits", self.0)
    }
}

/// Transfer direction encoded in the address byte.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Direction {
    Write,
    Read,
}

impl Direction {
    /// Value of the R/W bit on the wire.
    #[must_use]
    pub const fn bit(self) -> u8 {
        match self {
            Direction::Write => 0,
            Direction::Read => 1,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Write => "write",
            Direction::Read => "read",
        })
    }
}

/// One single-byte register access. Immutable once handed to the engine.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RegisterTransaction {
    register: u8,
    payload: Option<u8>,
}

impl RegisterTransaction {
    /// Writes `value` into `register`.
    #[must_use]
    pub const fn write(register: u8, value: u8) -> Self {
        Self {
            register,
            payload: Some(value),
        }
    }

    /// Reads one byte from `register`.
    #[must_use]
    pub const fn read(register: u8) -> Self {
        Self {
            register,
            payload: None,
        }
    }

    #[must_use]
    pub const fn register(&self) -> u8 {
        self.register
    }

    #[must_use]
    pub const fn direction(&self) -> Direction {
        match self.payload {
            Some(_) => Direction::Write,
            None => Direction::Read,
        }
    }

    /// Byte written by a write transaction; `None` for reads.
    #[must_use]
    pub const fn payload(&self) -> Option<u8> {
        self.payload
    }
}

/// Clock line behaviour for one tick.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SclDrive {
    /// Clock released high; SDA edges during this tick are START/STOP conditions.
    High,
    /// Clock held low; used as the setup tick before a stop.
    Low,
    /// One full clock pulse: low phase, then high phase. Carries one bit.
    Pulse,
}

/// Open-drain data line drive.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SdaDrive {
    Low,
    /// High impedance; the pull-up (or another device) sets the level.
    Released,
}

impl SdaDrive {
    #[must_use]
    pub const fn from_bit(bit: bool) -> Self {
        if bit { SdaDrive::Released } else { SdaDrive::Low }
    }

    /// Level this drive contributes to the wired-AND bus.
    #[must_use]
    pub const fn level(self) -> bool {
        matches!(self, SdaDrive::Released)
    }
}

/// Line drive asserted by the master for a single tick.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BusDrive {
    pub scl: SclDrive,
    pub sda: SdaDrive,
}

impl BusDrive {
    /// Both lines released.
    pub const IDLE: Self = Self::new(SclDrive::High, SdaDrive::Released);

    #[must_use]
    pub const fn new(scl: SclDrive, sda: SdaDrive) -> Self {
        Self { scl, sda }
    }

    const fn pulse(bit: bool) -> Self {
        Self::new(SclDrive::Pulse, SdaDrive::from_bit(bit))
    }
}

/// Physical (or emulated) pair of bus lines driven by the engine.
pub trait BusLink {
    /// Runs one clock period with the given drive and returns the SDA level
    /// sampled in the middle of the clock's low phase.
    ///
    /// Slaves change SDA right after the falling edge, so a mid-low sample
    /// sees the bit a slave presents for this period while writes are set up
    /// well before the rising edge.
    fn period(&mut self, drive: BusDrive) -> bool;
}

impl<T: BusLink + ?Sized> BusLink for &mut T {
    fn period(&mut self, drive: BusDrive) -> bool {
        (**self).period(drive)
    }
}

/// Bus with nothing attached: the pull-up always wins.
#[derive(Copy, Clone, Debug, Default)]
pub struct IdleBusLink;

impl BusLink for IdleBusLink {
    fn period(&mut self, _: BusDrive) -> bool {
        true
    }
}

/// Result of a finished transaction.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Completion {
    pub transaction: RegisterTransaction,
    /// Byte received by a read transaction.
    pub data: Option<u8>,
}

/// Phase the engine resumes after an acknowledge slot.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Resume {
    RegisterAddress,
    Data,
    Receive,
    Setup { last: bool },
}

impl Resume {
    const fn phase(self) -> EnginePhase {
        match self {
            Resume::RegisterAddress => EnginePhase::RegisterAddress { bit: 0 },
            Resume::Data => EnginePhase::Data { bit: 0 },
            Resume::Receive => EnginePhase::Receive { bit: 0 },
            Resume::Setup { last } => EnginePhase::Setup { last },
        }
    }
}

/// State of the protocol engine. `bit` counts MSB-first positions 0..=7.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EnginePhase {
    Reset,
    /// SDA falls while SCL is high. `repeated` marks the read-phase start.
    Start { repeated: bool },
    SlaveAddress { bit: u8, direction: Direction },
    RegisterAddress { bit: u8 },
    Data { bit: u8 },
    /// SDA released for the device's acknowledge bit.
    Acknowledge { resume: Resume },
    Receive { bit: u8 },
    /// SCL held low while SDA is pulled low ahead of a stop.
    Setup { last: bool },
    /// SCL rises with SDA still low.
    StopRise { last: bool },
    /// SDA rises while SCL is high. `last` ends the transaction.
    Stop { last: bool },
}

impl EnginePhase {
    /// Short label used in status output and telemetry.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            EnginePhase::Reset => "reset",
            EnginePhase::Start { repeated: false } => "start",
            EnginePhase::Start { repeated: true } => "repeated-start",
            EnginePhase::SlaveAddress { .. } => "slave-address",
            EnginePhase::RegisterAddress { .. } => "register-address",
            EnginePhase::Data { .. } => "data",
            EnginePhase::Acknowledge { .. } => "acknowledge",
            EnginePhase::Receive { .. } => "receive",
            EnginePhase::Setup { .. } => "stop-setup",
            EnginePhase::StopRise { .. } | EnginePhase::Stop { last: false } => "stop",
            EnginePhase::Stop { last: true } => "stop-final",
        }
    }
}

/// Bit-banged master for single-byte register transactions.
#[derive(Clone, Debug)]
pub struct BusProtocolEngine {
    address: SlaveAddress,
    phase: EnginePhase,
    active: Option<RegisterTransaction>,
    received: u8,
    done: bool,
    missed_acks: u32,
}

impl BusProtocolEngine {
    #[must_use]
    pub const fn new(address: SlaveAddress) -> Self {
        Self {
            address,
            phase: EnginePhase::Reset,
            active: None,
            received: 0,
            done: false,
            missed_acks: 0,
        }
    }

    #[must_use]
    pub const fn address(&self) -> SlaveAddress {
        self.address
    }

    #[must_use]
    pub const fn phase(&self) -> EnginePhase {
        self.phase
    }

    /// Transaction latched at the last start, if one is in flight.
    #[must_use]
    pub const fn active(&self) -> Option<RegisterTransaction> {
        self.active
    }

    /// Completion flag; only set on the tick that finished a transaction.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        self.done
    }

    /// Acknowledge slots in which the device left SDA high.
    #[must_use]
    pub const fn missed_acks(&self) -> u32 {
        self.missed_acks
    }

    /// Returns to `Reset` and clears the completion flag.
    pub fn reset(&mut self) {
        self.phase = EnginePhase::Reset;
        self.active = None;
        self.received = 0;
        self.done = false;
    }

    /// Runs one clock period.
    ///
    /// `request` models the start input: `None` forces `Reset` and idles the
    /// lines. The request is latched when leaving `Reset` and ignored for the
    /// rest of the transaction. Returns the completion on the tick that
    /// finished the final stop.
    pub fn tick<L: BusLink + ?Sized>(
        &mut self,
        request: Option<RegisterTransaction>,
        link: &mut L,
    ) -> Option<Completion> {
        let Some(request) = request else {
            self.reset();
            link.period(BusDrive::IDLE);
            return None;
        };

        self.done = false;
        let sampled = link.period(self.drive());
        self.advance(request, sampled)
    }

    fn drive(&self) -> BusDrive {
        match self.phase {
            EnginePhase::Reset | EnginePhase::Stop { .. } => BusDrive::IDLE,
            EnginePhase::Start { .. } => BusDrive::new(SclDrive::High, SdaDrive::Low),
            EnginePhase::SlaveAddress { bit, direction } => {
                BusDrive::pulse(msb_bit(self.address.frame(direction), bit))
            }
            EnginePhase::RegisterAddress { bit } => {
                let register = self.active.map_or(0, |txn| txn.register());
                BusDrive::pulse(msb_bit(register, bit))
            }
            EnginePhase::Data { bit } => {
                let payload = self.active.and_then(|txn| txn.payload()).unwrap_or(0);
                BusDrive::pulse(msb_bit(payload, bit))
            }
            EnginePhase::Acknowledge { .. } | EnginePhase::Receive { .. } => {
                BusDrive::new(SclDrive::Pulse, SdaDrive::Released)
            }
            EnginePhase::Setup { .. } => BusDrive::new(SclDrive::Low, SdaDrive::Low),
            EnginePhase::StopRise { .. } => BusDrive::new(SclDrive::High, SdaDrive::Low),
        }
    }

    fn advance(&mut self, request: RegisterTransaction, sda: bool) -> Option<Completion> {
        let direction = self.active.map_or(Direction::Write, |txn| txn.direction());
        let mut completion = None;

        self.phase = match self.phase {
            EnginePhase::Reset => {
                self.active = Some(request);
                self.received = 0;
                EnginePhase::Start { repeated: false }
            }
            EnginePhase::Start { repeated } => EnginePhase::SlaveAddress {
                bit: 0,
                direction: if repeated {
                    Direction::Read
                } else {
                    Direction::Write
                },
            },
            EnginePhase::SlaveAddress { bit, direction } if bit < 7 => EnginePhase::SlaveAddress {
                bit: bit + 1,
                direction,
            },
            EnginePhase::SlaveAddress { direction, .. } => EnginePhase::Acknowledge {
                resume: match direction {
                    Direction::Write => Resume::RegisterAddress,
                    Direction::Read => Resume::Receive,
                },
            },
            EnginePhase::RegisterAddress { bit } if bit < 7 => {
                EnginePhase::RegisterAddress { bit: bit + 1 }
            }
            EnginePhase::RegisterAddress { .. } => EnginePhase::Acknowledge {
                resume: match direction {
                    Direction::Write => Resume::Data,
                    Direction::Read => Resume::Setup { last: false },
                },
            },
            EnginePhase::Data { bit } if bit < 7 => EnginePhase::Data { bit: bit + 1 },
            EnginePhase::Data { .. } => EnginePhase::Acknowledge {
                resume: Resume::Setup { last: true },
            },
            EnginePhase::Acknowledge { resume } => {
                if sda {
                    // No acknowledge: keep clocking the slot. There is no
                    // timeout; only reset or a dropped request leaves this.
                    self.missed_acks = self.missed_acks.saturating_add(1);
                    EnginePhase::Acknowledge { resume }
                } else {
                    resume.phase()
                }
            }
            EnginePhase::Receive { bit } => {
                self.received = (self.received << 1) | u8::from(sda);
                if bit < 7 {
                    EnginePhase::Receive { bit: bit + 1 }
                } else {
                    EnginePhase::Setup { last: true }
                }
            }
            EnginePhase::Setup { last } => EnginePhase::StopRise { last },
            EnginePhase::StopRise { last } => EnginePhase::Stop { last },
            EnginePhase::Stop { last: false } => EnginePhase::Start { repeated: true },
            EnginePhase::Stop { last: true } => {
                completion = self.active.take().map(|transaction| Completion {
                    transaction,
                    data: match transaction.direction() {
                        Direction::Read => Some(self.received),
                        Direction::Write => None,
                    },
                });
                self.done = completion.is_some();
                EnginePhase::Reset
            }
        };

        completion
    }
}

const fn msb_bit(byte: u8, index: u8) -> bool {
    byte & (0x80 >> index) != 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_rejects_eight_bit_values() {
        assert_eq!(SlaveAddress::new(0x80), Err(AddressError(0x80)));
        assert_eq!(SlaveAddress::new(0x40), Ok(SlaveAddress::BMA180_PRIMARY));
    }

    #[test]
    fn address_frame_carries_direction_bit() {
        let address = SlaveAddress::BMA180_PRIMARY;
        assert_eq!(address.frame(Direction::Write), 0x80);
        assert_eq!(address.frame(Direction::Read), 0x81);
    }

    #[test]
    fn transaction_direction_follows_payload() {
        assert_eq!(RegisterTransaction::write(0x20, 1).direction(), Direction::Write);
        assert_eq!(RegisterTransaction::read(0x08).direction(), Direction::Read);
        assert_eq!(RegisterTransaction::read(0x08).payload(), None);
    }

    #[test]
    fn missing_device_stalls_in_acknowledge() {
        let mut engine = BusProtocolEngine::new(SlaveAddress::BMA180_PRIMARY);
        let mut link = IdleBusLink;
        let request = RegisterTransaction::read(0x02);

        for _ in 0..500 {
            assert!(engine.tick(Some(request), &mut link).is_none());
        }

        assert!(matches!(engine.phase(), EnginePhase::Acknowledge { .. }));
        assert!(engine.missed_acks() > 400);
        assert!(!engine.is_done());
    }

    #[test]
    fn dropping_start_returns_to_reset() {
        let mut engine = BusProtocolEngine::new(SlaveAddress::BMA180_PRIMARY);
        let mut link = IdleBusLink;
        let request = RegisterTransaction::write(0x20, 0x10);

        for _ in 0..5 {
            engine.tick(Some(request), &mut link);
        }
        assert!(matches!(engine.phase(), EnginePhase::SlaveAddress { .. }));

        engine.tick(None, &mut link);
        assert_eq!(engine.phase(), EnginePhase::Reset);
        assert_eq!(engine.active(), None);
        assert!(!engine.is_done());
    }
}
