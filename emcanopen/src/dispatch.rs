//! Interrupt dispatch table
//!
//! Interrupt vectors carry no user argument, so handlers find their module through a
//! [`Dispatcher`] placed in a `static`. The application binds each controller instance once
//! its module is in place, and the vector shims forward to the bound target:
//!
//! ```ignore
//! static DISPATCH: Dispatcher<CriticalSectionRawMutex, 1> = Dispatcher::new();
//!
//! #[interrupt]
//! fn CAN1_RX0() {
//!     DISPATCH.rx_pending(0, RxFifo::Fifo0);
//! }
//! ```

use core::cell::Cell;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::Error;
use crate::fault::FaultSink;
use crate::hal::{Can, RxFifo};
use crate::module::Module;

/// Receiver of controller interrupt events
pub trait InterruptTarget {
    /// A receive FIFO holds at least one frame.
    fn on_rx_pending(&self, fifo: RxFifo);

    /// A transmit mailbox completed or was aborted.
    fn on_tx_mailbox_empty(&self);
}

impl<M: RawMutex, C: Can, F: FaultSink + ?Sized> InterruptTarget for Module<'_, M, C, F> {
    fn on_rx_pending(&self, fifo: RxFifo) {
        Module::on_rx_pending(self, fifo)
    }

    fn on_tx_mailbox_empty(&self) {
        self.drain_tx();
    }
}

type Target = &'static (dyn InterruptTarget + Sync);

/// Table of `N` controller instances, addressed by instance index
pub struct Dispatcher<M: RawMutex, const N: usize> {
    targets: Mutex<M, [Cell<Option<Target>>; N]>,
}

impl<M: RawMutex, const N: usize> Dispatcher<M, N> {
    pub const fn new() -> Self {
        Self {
            targets: Mutex::new([const { Cell::new(None) }; N]),
        }
    }

    /// Binds `target` to `instance`, replacing any previous binding.
    pub fn bind(&self, instance: usize, target: Target) -> Result<(), Error> {
        self.targets.lock(|targets| {
            let entry = targets.get(instance).ok_or(Error::InvalidArgument)?;
            entry.set(Some(target));
            Ok(())
        })
    }

    /// Removes the binding of `instance` and returns it.
    pub fn unbind(&self, instance: usize) -> Option<Target> {
        self.targets
            .lock(|targets| targets.get(instance).and_then(Cell::take))
    }

    pub fn is_bound(&self, instance: usize) -> bool {
        self.target(instance).is_some()
    }

    /// Receive FIFO interrupt entry.
    pub fn rx_pending(&self, instance: usize, fifo: RxFifo) {
        match self.target(instance) {
            Some(target) => target.on_rx_pending(fifo),
            None => trace!("Rx interrupt for unbound CAN instance {}", instance),
        }
    }

    /// Mailbox-empty interrupt entry.
    pub fn tx_mailbox_empty(&self, instance: usize) {
        match self.target(instance) {
            Some(target) => target.on_tx_mailbox_empty(),
            None => trace!("Tx interrupt for unbound CAN instance {}", instance),
        }
    }

    fn target(&self, instance: usize) -> Option<Target> {
        self.targets
            .lock(|targets| targets.get(instance).and_then(Cell::get))
    }
}

impl<M: RawMutex, const N: usize> Default for Dispatcher<M, N> {
    fn default() -> Self {
        Self::new()
    }
}
