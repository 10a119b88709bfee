//! Hardware controller interface
//!
//! The transport core drives the controller exclusively through the `Can` trait. Methods take
//! `&self`: an implementation is a thin register-access handle, and the core serializes
//! transmit hand-offs with its own critical section. Receive and error-register accesses may
//! run concurrently with transmit ones.

use crate::config::{BitTiming, Config};
use crate::frame::{Data, Frame, TxHeader};

/// Hardware call failed or was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HalError;

/// Receive FIFO selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxFifo {
    Fifo0,
    Fifo1,
}

impl From<RxFifo> for usize {
    fn from(value: RxFifo) -> Self {
        match value {
            RxFifo::Fifo0 => 0,
            RxFifo::Fifo1 => 1,
        }
    }
}

/// Hardware transmit mailbox index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MailboxId(u8);

impl MailboxId {
    pub const fn new(value: u8) -> Self {
        Self(value)
    }
}

impl From<MailboxId> for u8 {
    fn from(value: MailboxId) -> u8 {
        value.0
    }
}

impl From<MailboxId> for usize {
    fn from(value: MailboxId) -> usize {
        value.0.into()
    }
}

/// Set of controller events that raise an interrupt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Notifications(u32);

impl Notifications {
    pub const NONE: Self = Self(0);
    pub const TX_MAILBOX_EMPTY: Self = Self(1 << 0);
    pub const RX_FIFO0_PENDING: Self = Self(1 << 1);
    pub const RX_FIFO1_PENDING: Self = Self(1 << 4);

    pub const fn into_bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl core::ops::BitOr for Notifications {
    type Output = Notifications;
    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// Controller link-error bitmask
///
/// Bits are independent flags; several may be set at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkErrors(u32);

impl LinkErrors {
    pub const NONE: Self = Self(0);
    /// Error counter reached the warning limit
    pub const WARNING: Self = Self(1 << 0);
    /// Error counter reached the passive limit
    pub const PASSIVE: Self = Self(1 << 1);
    pub const BUS_OFF: Self = Self(1 << 2);
    pub const STUFF: Self = Self(1 << 3);
    pub const FORM: Self = Self(1 << 4);
    pub const ACKNOWLEDGMENT: Self = Self(1 << 5);
    pub const BIT_RECESSIVE: Self = Self(1 << 6);
    pub const BIT_DOMINANT: Self = Self(1 << 7);
    pub const CRC: Self = Self(1 << 8);
    pub const RX_FIFO0_OVERRUN: Self = Self(1 << 9);
    pub const RX_FIFO1_OVERRUN: Self = Self(1 << 10);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn into_bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }
}

impl core::ops::BitOr for LinkErrors {
    type Output = LinkErrors;
    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// Hardware primitives of a classic CAN controller with transmit mailboxes and receive FIFOs
pub trait Can {
    /// Applies bit timing and controller options. Called while the controller is stopped.
    fn configure(&self, timing: &BitTiming, config: &Config) -> Result<(), HalError>;

    /// Programs one acceptance filter that passes every standard frame into `fifo`.
    fn configure_pass_all_filter(&self, fifo: RxFifo) -> Result<(), HalError>;

    fn start(&self) -> Result<(), HalError>;

    fn stop(&self) -> Result<(), HalError>;

    fn enable_notifications(&self, events: Notifications) -> Result<(), HalError>;

    fn free_mailbox_count(&self) -> u32;

    /// Places a frame into a free mailbox and requests its transmission.
    fn add_message(&self, header: &TxHeader, data: &Data) -> Result<MailboxId, HalError>;

    /// Withdraws a pending transmit request.
    ///
    /// Returns `true` if the request was withdrawn before it reached the bus. Controllers
    /// without abort support keep the default.
    fn abort_message(&self, _mailbox: MailboxId) -> bool {
        false
    }

    /// Pops the oldest frame from `fifo`, if any.
    fn receive(&self, fifo: RxFifo) -> Option<Frame>;

    /// Current link-error bitmask.
    fn link_errors(&self) -> LinkErrors;
}

impl<T: Can + ?Sized> Can for &T {
    fn configure(&self, timing: &BitTiming, config: &Config) -> Result<(), HalError> {
        T::configure(self, timing, config)
    }

    fn configure_pass_all_filter(&self, fifo: RxFifo) -> Result<(), HalError> {
        T::configure_pass_all_filter(self, fifo)
    }

    fn start(&self) -> Result<(), HalError> {
        T::start(self)
    }

    fn stop(&self) -> Result<(), HalError> {
        T::stop(self)
    }

    fn enable_notifications(&self, events: Notifications) -> Result<(), HalError> {
        T::enable_notifications(self, events)
    }

    fn free_mailbox_count(&self) -> u32 {
        T::free_mailbox_count(self)
    }

    fn add_message(&self, header: &TxHeader, data: &Data) -> Result<MailboxId, HalError> {
        T::add_message(self, header, data)
    }

    fn abort_message(&self, mailbox: MailboxId) -> bool {
        T::abort_message(self, mailbox)
    }

    fn receive(&self, fifo: RxFifo) -> Option<Frame> {
        T::receive(self, fifo)
    }

    fn link_errors(&self) -> LinkErrors {
        T::link_errors(self)
    }
}
