//! CANopen transport core data types
//!
//! This crate provides basic data type definitions used by other Emcanopen crates.
//! Emcanopen users should not depend on this crate directly. Use `emcanopen::core` reexport instead.
#![no_std]

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InvalidValue;

const fn lsb_mask(n: u32) -> u16 {
    if n > 0 {
        u16::MAX >> (u16::BITS - n)
    } else {
        0
    }
}

/// Standard (11-bit) CAN identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StdId(u16);

impl StdId {
    pub const MAX_VALUE: u16 = lsb_mask(11);
    pub const ZERO: Self = Self(0);
    pub const MAX: Self = Self(Self::MAX_VALUE);

    pub const fn new(value: u16) -> Option<Self> {
        if value <= Self::MAX_VALUE {
            Some(Self(value))
        } else {
            None
        }
    }

    pub const fn from_truncating(value: u16) -> Self {
        Self(value & Self::MAX_VALUE)
    }

    pub const fn into_u16(self) -> u16 {
        self.0
    }
}

impl From<StdId> for u16 {
    fn from(value: StdId) -> Self {
        value.into_u16()
    }
}

impl TryFrom<u16> for StdId {
    type Error = InvalidValue;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(InvalidValue)
    }
}

const PACKED_ID_OFFSET: u32 = 2;
const PACKED_RTR_FLAG: u16 = 1 << 1;

/// Identifier and remote-request flag packed into a single word
///
/// Layout: `id << 2 | rtr << 1`. Bit 0 is always clear. The same layout is used for
/// identifiers of transmit slots, receive slots and incoming frames, so masked
/// comparison works on the packed value directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PackedId(u16);

impl PackedId {
    pub const fn new(id: StdId, rtr: bool) -> Self {
        let mut bits = id.into_u16() << PACKED_ID_OFFSET;
        if rtr {
            bits |= PACKED_RTR_FLAG;
        }
        Self(bits)
    }

    pub const fn id(self) -> StdId {
        StdId::from_truncating(self.0 >> PACKED_ID_OFFSET)
    }

    pub const fn rtr(self) -> bool {
        self.0 & PACKED_RTR_FLAG != 0
    }

    pub const fn into_bits(self) -> u16 {
        self.0
    }
}

impl From<PackedId> for u16 {
    fn from(value: PackedId) -> Self {
        value.into_bits()
    }
}

/// Identifier/mask pattern in the packed layout
///
/// A mask bit of 1 means "must match", 0 means "don't care". The RTR bit is always
/// discriminated: a data-frame pattern never matches a remote request and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IdPattern {
    ident: PackedId,
    mask: u16,
}

impl IdPattern {
    /// Pattern of an unbound slot. It accepts everything, so matchers must skip unbound slots.
    pub const EMPTY: Self = Self {
        ident: PackedId(0),
        mask: 0,
    };

    /// Creates a pattern. Mask bits above the 11-bit identifier range are ignored.
    pub const fn new(id: StdId, mask: u16, rtr: bool) -> Self {
        Self {
            ident: PackedId::new(id, rtr),
            mask: ((mask & StdId::MAX_VALUE) << PACKED_ID_OFFSET) | PACKED_RTR_FLAG,
        }
    }

    /// Pattern accepting exactly one identifier.
    pub const fn exact(id: StdId, rtr: bool) -> Self {
        Self::new(id, StdId::MAX_VALUE, rtr)
    }

    pub const fn ident(&self) -> PackedId {
        self.ident
    }

    pub const fn mask(&self) -> u16 {
        self.mask
    }

    pub const fn matches(&self, packed: PackedId) -> bool {
        (packed.0 ^ self.ident.0) & self.mask == 0
    }
}

/// Fault conditions raised towards the fault-reporting collaborator
///
/// Codes follow the CANopen emergency error status bit numbering.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Fault {
    /// Error counters reached the warning level.
    BusWarning = 0x01,
    /// Receiver entered the error passive state.
    ///
    /// Not raised by the transport, which only sees the combined passive flag. Reserved for
    /// fault sinks and drivers that track the receive error counter separately.
    RxBusPassive = 0x06,
    /// Transmitter entered the error passive state.
    TxBusPassive = 0x07,
    /// Transmitter is bus off.
    TxBusOff = 0x12,
    /// A receive FIFO overran; frames were lost.
    RxBufferOverflow = 0x13,
    /// A producer sent into a slot that was still queued.
    TxOverflow = 0x14,
    /// Synchronous frames were withdrawn because the synchronization window closed.
    SyncOutsideWindow = 0x15,
}

impl Fault {
    pub const fn into_u8(self) -> u8 {
        self as u8
    }

    pub const fn try_from_u8(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Fault::BusWarning),
            0x06 => Some(Fault::RxBusPassive),
            0x07 => Some(Fault::TxBusPassive),
            0x12 => Some(Fault::TxBusOff),
            0x13 => Some(Fault::RxBufferOverflow),
            0x14 => Some(Fault::TxOverflow),
            0x15 => Some(Fault::SyncOutsideWindow),
            _ => None,
        }
    }
}

impl From<Fault> for u8 {
    fn from(value: Fault) -> Self {
        value.into_u8()
    }
}

impl TryFrom<u8> for Fault {
    type Error = InvalidValue;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::try_from_u8(value).ok_or(InvalidValue)
    }
}

/// CANopen emergency error code attached to a fault report
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum EmergencyCode {
    NoError = 0x0000,
    Communication = 0x8100,
    CanOverrun = 0x8110,
    CanPassive = 0x8120,
    BusOffRecovered = 0x8140,
}

impl EmergencyCode {
    pub const fn into_u16(self) -> u16 {
        self as u16
    }
}

impl From<EmergencyCode> for u16 {
    fn from(value: EmergencyCode) -> Self {
        value.into_u16()
    }
}
