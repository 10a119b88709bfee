//! # Emcanopen
//!
//! This library is the transport core of a CANopen stack for no_std targets. It multiplexes the
//! few transmit mailboxes and the receive FIFOs of a classic CAN controller across many logical
//! message producers and consumers. All slot storage is provided by the user; no dynamic memory
//! allocation is required.
//!
//! ## Architecture
//!
//! ```text
//!  Producer ──► send ──► ┌──────────┐   free mailbox   ┌──────────┐
//!                        │ TX queue ├─────────────────►│          │
//!  mailbox-empty IRQ ──► └──────────┘                  │   Can    │
//!                                                      │ (driver) │
//!  Consumer ◄── handler ◄── ┌─────────┐  FIFO pending  │          │
//!                           │ Matcher │◄───────────────┤          │
//!                           └─────────┘                └────┬─────┘
//!                                                           │ error bitmask
//!  FaultSink ◄───────────────── Link monitor ◄──────────────┘
//! ```
//! Components:
//! * _Module_ owns the state of one controller: receive and transmit slot registries, the
//!   transmit queue, the link monitor and the controller mode.
//! * _RX slot_ binds an identifier/mask pattern to a user handler. Received frames go to the
//!   lowest-index slot whose pattern accepts them; unmatched frames are dropped silently.
//! * _TX slot_ holds one outgoing frame. A frame is handed straight to the hardware when nothing
//!   is queued and a mailbox is free, otherwise the slot is queued until a mailbox-empty signal
//!   drains it.
//! * _Link monitor_ turns changes of the controller error bitmask into bus-health faults.
//! * _Dispatcher_ maps interrupt vectors to bound modules.
//!
//! Hardware access goes through the [`hal::Can`] trait. Bus-health and overflow conditions are
//! reported to a user-provided [`fault::FaultSink`].
//!
//! ## Concurrency model
//!
//! The module uses separate mutexes for receive, transmit and link state. With
//! _CriticalSectionRawMutex_ the interrupt handlers and the polled task may call into the same
//! module concurrently. The transmit lock covers the pending-count check and a single mailbox
//! hand-off, so critical sections stay short. Receive handlers are invoked outside of any lock,
//! but must not block.
//!
//! Queued frames only move when a mailbox-empty signal arrives, either from the interrupt or a
//! polled [`module::Module::drain_tx`] call. The surrounding system must deliver at least one
//! signal per freed mailbox.
//!
//! ## Limitations
//!
//! * Only standard (11-bit) identifiers are supported.
//! * Hardware acceptance filtering is limited to a single pass-all filter.
//! * Bus-off recovery is left to the controller or the link layer.
#![no_std]

pub use emcanopen_core as core;
pub use emcanopen_driver::{config, fault, frame, hal};

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod dispatch;
mod filter;
mod health;
pub mod module;
pub mod registry;
mod tx_queue;

pub use tx_queue::{DrainStatus, InFlightCancel, Withdrawal};

/// Transport core error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Slot index out of range.
    InvalidArgument,
    /// Bit rate not supported with the configured kernel clock.
    InvalidBaudrate,
    /// A hardware call failed.
    HardwareError,
    /// The transmit slot is still queued.
    TxOverflow,
    /// Operation not allowed in the current module mode.
    InvalidState,
}

impl From<hal::HalError> for Error {
    fn from(_: hal::HalError) -> Self {
        Error::HardwareError
    }
}

impl From<config::InvalidBaudrate> for Error {
    fn from(_: config::InvalidBaudrate) -> Self {
        Error::InvalidBaudrate
    }
}
