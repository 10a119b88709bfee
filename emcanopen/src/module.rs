//! CAN module facade
//!
//! A [`Module`] owns the state of one CAN controller instance: the borrowed slot registries,
//! the transmit queue, the link-error monitor and the controller mode. Every method takes
//! `&self`, so one module may be shared between the polled task and interrupt handlers.
//!
//! Receive, transmit and link state sit behind separate mutexes. Receive handlers run with
//! no module lock held. Link-health faults are raised with the link lock held.

use core::cell::{Cell, RefCell};
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::Error;
use crate::config::Config;
use crate::core::{EmergencyCode, Fault, IdPattern, PackedId, StdId};
use crate::fault::FaultSink;
use crate::frame::{DataLength, Frame};
use crate::hal::{Can, LinkErrors, Notifications, RxFifo};
use crate::health::{self, LinkMonitor};
use crate::registry::{RxHandler, RxRegistry, RxSlot, TxSlot, TxSlotId};
use crate::tx_queue::{DrainStatus, SendError, TxQueue, Withdrawal};

/// Controller mode as seen by the module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// Created, controller untouched.
    Uninitialized,
    /// Configured and stopped. Slots may be registered.
    Configured,
    /// Started with interrupts enabled.
    Normal,
    /// Stopped by [`Module::disable`]. Registries are kept until the next `init`.
    Disabled,
}

/// CAN transport for a single controller
///
/// Slot storage is provided by the caller and lent to the module for its lifetime.
pub struct Module<'a, M: RawMutex, C: Can, F: FaultSink + ?Sized> {
    can: C,
    faults: &'a F,
    mode: Mutex<M, Cell<Mode>>,
    rx: Mutex<M, RefCell<RxRegistry<'a>>>,
    tx: Mutex<M, RefCell<TxQueue<'a>>>,
    link: LinkMonitor<M>,
}

impl<'a, M: RawMutex, C: Can, F: FaultSink + ?Sized> Module<'a, M, C, F> {
    pub fn new(
        can: C,
        faults: &'a F,
        rx_slots: &'a mut [RxSlot<'a>],
        tx_slots: &'a mut [TxSlot],
    ) -> Self {
        Self {
            can,
            faults,
            mode: Mutex::new(Cell::new(Mode::Uninitialized)),
            rx: Mutex::new(RefCell::new(RxRegistry::new(rx_slots))),
            tx: Mutex::new(RefCell::new(TxQueue::new(tx_slots))),
            link: LinkMonitor::new(),
        }
    }

    pub fn can(&self) -> &C {
        &self.can
    }

    pub fn mode(&self) -> Mode {
        self.mode.lock(|cell| cell.get())
    }

    fn set_mode(&self, mode: Mode) {
        self.mode.lock(|cell| cell.set(mode));
    }

    pub fn rx_capacity(&self) -> usize {
        self.rx.lock(|cell| cell.borrow().capacity())
    }

    pub fn tx_capacity(&self) -> usize {
        self.tx.lock(|cell| cell.borrow().capacity())
    }

    /// Resets all slots and configures the stopped controller.
    ///
    /// Allowed in any mode except `Normal`. Slot registrations made before this call are lost.
    pub fn init(&self, config: &Config) -> Result<(), Error> {
        if self.mode() == Mode::Normal {
            return Err(Error::InvalidState);
        }
        let timing = config.bit_timing()?;

        self.rx.lock(|cell| cell.borrow_mut().reset());
        self.tx.lock(|cell| cell.borrow_mut().reset());
        self.link.reset();

        if self.can.stop().is_err() {
            debug!("CAN stop rejected before configuration");
        }
        self.can.configure(&timing, config)?;
        self.set_mode(Mode::Configured);
        info!(
            "CAN configured: {} kbit/s, prescaler {}",
            config.bitrate_kbps,
            timing.prescaler.get()
        );
        Ok(())
    }

    /// Starts the controller and enables receive and mailbox-empty interrupts.
    ///
    /// On failure the controller is stopped again and the module stays `Configured`.
    pub fn enter_normal_mode(&self) -> Result<(), Error> {
        match self.mode() {
            Mode::Configured => {}
            Mode::Normal => return Ok(()),
            Mode::Uninitialized | Mode::Disabled => return Err(Error::InvalidState),
        }

        let events = Notifications::RX_FIFO0_PENDING
            | Notifications::RX_FIFO1_PENDING
            | Notifications::TX_MAILBOX_EMPTY;
        let started = self
            .can
            .start()
            .and_then(|()| self.can.enable_notifications(events));
        if let Err(err) = started {
            warn!("CAN start failed, staying in configuration mode");
            if self.can.stop().is_err() {
                warn!("CAN stop failed after aborted start");
            }
            return Err(err.into());
        }

        self.set_mode(Mode::Normal);
        info!("CAN in normal mode");
        Ok(())
    }

    /// Stops the controller. Registries stay intact until the next `init`.
    pub fn disable(&self) {
        if self.can.stop().is_err() {
            warn!("CAN stop failed on disable");
        }
        self.set_mode(Mode::Disabled);
    }

    /// Binds receive slot `index` to frames matching `id` under `mask`.
    ///
    /// `mask` uses the 11-bit identifier layout: 1 bits must match, 0 bits are ignored. The RTR
    /// flag always has to match. The first registration also programs a pass-all hardware filter.
    pub fn init_rx_slot(
        &self,
        index: usize,
        id: StdId,
        mask: u16,
        rtr: bool,
        handler: &'a (dyn RxHandler + Sync),
    ) -> Result<(), Error> {
        let pattern = IdPattern::new(id, mask, rtr);
        self.rx.lock(|cell| {
            let mut rx = cell.borrow_mut();
            if index >= rx.capacity() {
                return Err(Error::InvalidArgument);
            }
            if !rx.filter_programmed() {
                self.can.configure_pass_all_filter(RxFifo::Fifo0)?;
                rx.set_filter_programmed();
            }
            rx.bind(index, pattern, handler)
                .map_err(|_| Error::InvalidArgument)
        })
    }

    /// Prepares transmit slot `index`. Returns `None` if the index is out of range.
    ///
    /// A slot that is still queued is dropped from the queue.
    pub fn init_tx_slot(
        &self,
        index: usize,
        id: StdId,
        rtr: bool,
        length: DataLength,
        sync_gated: bool,
    ) -> Option<TxSlotId> {
        let ident = PackedId::new(id, rtr);
        self.tx
            .lock(|cell| cell.borrow_mut().prepare(index, ident, length, sync_gated))
    }

    /// Gives `f` the payload of a transmit slot, trimmed to its length.
    ///
    /// Runs under the transmit lock. Updating a queued slot changes the frame that will be
    /// drained.
    pub fn with_tx_data<T>(
        &self,
        slot: TxSlotId,
        f: impl FnOnce(&mut [u8]) -> T,
    ) -> Result<T, Error> {
        self.tx
            .lock(|cell| cell.borrow_mut().with_data(slot, f))
            .ok_or(Error::InvalidArgument)
    }

    /// Hands the slot's frame to a free mailbox or queues it.
    ///
    /// Sending a slot that is still queued fails with `TxOverflow` and raises the overflow
    /// fault, except before the first mailbox-empty signal after `init`.
    pub fn send(&self, slot: TxSlotId) -> Result<(), Error> {
        let res = self.tx.lock(|cell| cell.borrow_mut().send(&self.can, slot));
        match res {
            Ok(()) => Ok(()),
            Err(SendError::Overflow { ident, report }) => {
                if report {
                    let info = u32::from(ident.into_bits());
                    self.faults
                        .report(Fault::TxOverflow, EmergencyCode::CanOverrun, info);
                }
                Err(Error::TxOverflow)
            }
            Err(SendError::Hardware) => Err(Error::HardwareError),
            Err(SendError::InvalidSlot) => Err(Error::InvalidArgument),
        }
    }

    /// Moves at most one queued frame into a free mailbox.
    pub fn drain_tx(&self) -> DrainStatus {
        self.tx.lock(|cell| cell.borrow_mut().drain(&self.can))
    }

    /// Drops every queued sync-gated frame and tries to recall one already in a mailbox.
    ///
    /// Raises the sync-window fault if anything was withdrawn.
    pub fn withdraw_sync_gated(&self) -> Withdrawal {
        let withdrawal = self
            .tx
            .lock(|cell| cell.borrow_mut().withdraw_sync_gated(&self.can));
        if !withdrawal.is_empty() {
            debug!(
                "Sync frames withdrawn: {} queued, cause {}",
                withdrawal.dequeued,
                withdrawal.cause()
            );
            self.faults.report(
                Fault::SyncOutsideWindow,
                EmergencyCode::Communication,
                withdrawal.cause(),
            );
        }
        withdrawal
    }

    pub fn pending_count(&self) -> u32 {
        self.tx.lock(|cell| cell.borrow().pending())
    }

    /// Returns `true` if the slot's frame waits for a mailbox.
    pub fn is_pending(&self, slot: TxSlotId) -> bool {
        self.tx
            .lock(|cell| cell.borrow().slot(slot).is_some_and(TxSlot::is_full))
    }

    pub fn tx_slot(&self, slot: TxSlotId) -> Option<TxSlot> {
        self.tx.lock(|cell| cell.borrow().slot(slot).copied())
    }

    pub fn rx_slot(&self, index: usize) -> Option<RxSlot<'a>> {
        self.rx.lock(|cell| cell.borrow().slot(index))
    }

    /// Evaluates a link-error bitmask. Does nothing if it equals the previous one.
    pub fn poll_link_errors(&self, errors: LinkErrors) {
        let first_message_pending = self.tx.lock(|cell| cell.borrow().first_message_pending());
        self.link.track(errors, |current| {
            debug!("Link errors evaluated: {}", current.into_bits());
            health::evaluate(self.faults, current, first_message_pending);
        });
    }

    /// Last evaluated link-error bitmask.
    pub fn link_errors(&self) -> LinkErrors {
        self.link.last()
    }

    /// Reads the controller link-error bitmask and evaluates it.
    pub fn process_errors(&self) {
        self.poll_link_errors(self.can.link_errors());
    }

    /// Drains `fifo` and routes every frame to its receive slot.
    pub fn on_rx_pending(&self, fifo: RxFifo) {
        while let Some(frame) = self.can.receive(fifo) {
            self.process_rx_frame(&frame);
        }
    }

    /// Routes a received frame. Returns `false` if no slot accepts it.
    pub fn process_rx_frame(&self, frame: &Frame) -> bool {
        let found = self.rx.lock(|cell| cell.borrow().find(frame.packed_id()));
        match found {
            Some((index, handler)) => {
                trace!(
                    "Frame {} delivered to rx slot {}",
                    frame.id().into_u16(),
                    index
                );
                handler.on_frame(frame);
                true
            }
            None => false,
        }
    }
}

impl<M: RawMutex, C: Can, F: FaultSink + ?Sized> Drop for Module<'_, M, C, F> {
    fn drop(&mut self) {
        if self.mode() == Mode::Normal && self.can.stop().is_err() {
            warn!("CAN stop failed on teardown");
        }
    }
}
