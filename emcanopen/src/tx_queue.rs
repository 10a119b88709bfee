//! Transmit queue and mailbox arbitration
//!
//! A frame goes straight to a hardware mailbox when nothing is queued ahead of it and a mailbox
//! is free. Otherwise its slot is marked full and waits for a mailbox-empty signal. Each drain
//! hands over at most one queued frame, the lowest slot index first.

use crate::core::PackedId;
use crate::frame::{DataLength, TxHeader};
use crate::hal::{Can, MailboxId};
use crate::registry::{TxSlot, TxSlotId};

/// Result of a single drain step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DrainStatus {
    /// Hardware reports no free mailbox; nothing changed.
    NoMailbox,
    /// A mailbox is free but no frame is queued.
    Idle,
    /// The queued frame of the slot was handed to a mailbox.
    Sent(TxSlotId),
    /// Hardware rejected the queued frame of the slot. It stays queued.
    Rejected(TxSlotId),
}

/// Fate of the sync-gated frame that had already reached a mailbox
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InFlightCancel {
    /// Hardware withdrew the request before it reached the bus.
    Aborted,
    /// The frame could not be recalled and may still appear on the bus.
    AlreadyInFlight,
}

/// Summary of a sync-gated frame withdrawal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Withdrawal {
    /// Present if a sync-gated frame was sitting in a mailbox.
    pub in_flight: Option<InFlightCancel>,
    /// Number of queued sync-gated frames removed.
    pub dequeued: u32,
}

impl Withdrawal {
    pub fn is_empty(&self) -> bool {
        self.in_flight.is_none() && self.dequeued == 0
    }

    /// Fault auxiliary code: bit 0 for the in-flight frame, bit 1 for queued frames.
    pub fn cause(&self) -> u32 {
        let mut cause = 0;
        if self.in_flight.is_some() {
            cause |= 1;
        }
        if self.dequeued != 0 {
            cause |= 2;
        }
        cause
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SendError {
    InvalidSlot,
    /// The slot is still queued. `report` is false during the startup grace period.
    Overflow { ident: PackedId, report: bool },
    Hardware,
}

/// Transmit side of the module state
pub(crate) struct TxQueue<'a> {
    slots: &'a mut [TxSlot],
    pending: u32,
    first_message: bool,
    // Mailbox holding the last handed-over frame, if that frame is sync-gated
    inhibited: Option<MailboxId>,
}

impl<'a> TxQueue<'a> {
    pub fn new(slots: &'a mut [TxSlot]) -> Self {
        let mut queue = Self {
            slots,
            pending: 0,
            first_message: true,
            inhibited: None,
        };
        queue.reset();
        queue
    }

    pub fn reset(&mut self) {
        self.slots.fill(TxSlot::EMPTY);
        self.pending = 0;
        self.first_message = true;
        self.inhibited = None;
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn pending(&self) -> u32 {
        self.pending
    }

    /// True until the first mailbox-empty signal after reset.
    pub fn first_message_pending(&self) -> bool {
        self.first_message
    }

    pub fn slot(&self, slot: TxSlotId) -> Option<&TxSlot> {
        self.slots.get(slot.index())
    }

    pub fn prepare(
        &mut self,
        index: usize,
        ident: PackedId,
        length: DataLength,
        sync_gated: bool,
    ) -> Option<TxSlotId> {
        let slot = self.slots.get_mut(index)?;
        if slot.is_full() {
            debug!("Queued tx slot {} dropped by re-preparation", index);
            self.pending = self.pending.saturating_sub(1);
        }
        slot.prepare(ident, length, sync_gated);
        Some(TxSlotId::new(index))
    }

    pub fn with_data<T>(&mut self, slot: TxSlotId, f: impl FnOnce(&mut [u8]) -> T) -> Option<T> {
        let slot = self.slots.get_mut(slot.index())?;
        Some(f(&mut slot.data_mut()[..]))
    }

    pub fn send<C: Can>(&mut self, can: &C, slot: TxSlotId) -> Result<(), SendError> {
        let index = slot.index();
        let entry = self.slots.get(index).ok_or(SendError::InvalidSlot)?;
        if entry.is_full() {
            return Err(SendError::Overflow {
                ident: entry.ident(),
                report: !self.first_message,
            });
        }

        if self.pending == 0 && can.free_mailbox_count() > 0 {
            let header = TxHeader::new(entry.ident(), entry.data().length());
            let mailbox = can
                .add_message(&header, entry.data())
                .map_err(|_| SendError::Hardware)?;
            self.inhibited = entry.is_sync_gated().then_some(mailbox);
            trace!("Tx slot {} sent to mailbox {}", index, u8::from(mailbox));
        } else {
            self.slots[index].set_full(true);
            self.pending += 1;
            trace!("Tx slot {} queued, {} pending", index, self.pending);
        }
        Ok(())
    }

    pub fn drain<C: Can>(&mut self, can: &C) -> DrainStatus {
        if can.free_mailbox_count() == 0 {
            return DrainStatus::NoMailbox;
        }
        self.first_message = false;
        self.inhibited = None;
        if self.pending == 0 {
            return DrainStatus::Idle;
        }

        let Some(index) = self.slots.iter().position(TxSlot::is_full) else {
            warn!("{} tx frames pending but no slot is queued", self.pending);
            self.pending = 0;
            return DrainStatus::Idle;
        };

        let slot = TxSlotId::new(index);
        let entry = &mut self.slots[index];
        let header = TxHeader::new(entry.ident(), entry.data().length());
        match can.add_message(&header, entry.data()) {
            Ok(mailbox) => {
                entry.set_full(false);
                self.pending -= 1;
                self.inhibited = entry.is_sync_gated().then_some(mailbox);
                trace!("Tx slot {} drained to mailbox {}", index, u8::from(mailbox));
                DrainStatus::Sent(slot)
            }
            Err(_) => {
                trace!("Tx slot {} rejected by hardware, retry on next drain", index);
                DrainStatus::Rejected(slot)
            }
        }
    }

    pub fn withdraw_sync_gated<C: Can>(&mut self, can: &C) -> Withdrawal {
        let in_flight = self.inhibited.take().map(|mailbox| {
            if can.abort_message(mailbox) {
                InFlightCancel::Aborted
            } else {
                InFlightCancel::AlreadyInFlight
            }
        });

        let mut dequeued = 0;
        if self.pending != 0 {
            for slot in self.slots.iter_mut() {
                if slot.is_full() && slot.is_sync_gated() {
                    slot.set_full(false);
                    dequeued += 1;
                }
            }
            self.pending = self.pending.saturating_sub(dequeued);
        }

        Withdrawal {
            in_flight,
            dequeued,
        }
    }
}
