//! Emcanopen driver interface
//!
//! The crate defines the collaborators the transport core talks to. Limited scope facilitates
//! compatibility across versions. Controller driver crates should depend on this crate.
//! Emcanopen stack users should depend on the `emcanopen` crate instead.
//!
//! * `hal::Can` is the controller: bit timing, start/stop, notifications, transmit mailboxes,
//!   receive FIFOs and the link-error register.
//! * `fault::FaultSink` is the emergency subsystem that records fault conditions.
//! * `frame` holds the classic (up to 8 bytes, 11-bit identifier) frame objects.
//! * `config` holds the bit rate table and controller options.
//!
//! Extended (29-bit) identifiers and FD frames are not part of the interface.

#![no_std]

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod config;
pub mod fault;
pub mod frame;
pub mod hal;
