//! Link health monitoring
//!
//! Translates the controller link-error bitmask into bus-health faults. Evaluation only runs when
//! the bitmask differs from the last observed one, so repeated polls of a steady state report
//! nothing. The conditions are independent flags, several may hold at once.

use core::cell::Cell;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::core::{EmergencyCode, Fault};
use crate::fault::FaultSink;
use crate::hal::LinkErrors;

const RX_OVERRUN: LinkErrors = LinkErrors::from_bits(
    LinkErrors::RX_FIFO0_OVERRUN.into_bits() | LinkErrors::RX_FIFO1_OVERRUN.into_bits(),
);

pub(crate) struct LinkMonitor<M: RawMutex> {
    last: Mutex<M, Cell<LinkErrors>>,
}

impl<M: RawMutex> LinkMonitor<M> {
    pub fn new() -> Self {
        Self {
            last: Mutex::new(Cell::new(LinkErrors::NONE)),
        }
    }

    pub fn reset(&self) {
        self.last.lock(|cell| cell.set(LinkErrors::NONE));
    }

    /// Stores `errors` and runs `evaluate` for it if it differs from the previous bitmask.
    ///
    /// Runs under the link lock. A poll nested inside `evaluate` stores a newer bitmask, which is
    /// evaluated again before returning so the raised faults follow the stored value.
    /// Returns `false` if nothing changed.
    pub fn track(&self, errors: LinkErrors, mut evaluate: impl FnMut(LinkErrors)) -> bool {
        self.last.lock(|cell| {
            if cell.replace(errors) == errors {
                return false;
            }
            let mut current = errors;
            loop {
                evaluate(current);
                let latest = cell.get();
                if latest == current {
                    return true;
                }
                current = latest;
            }
        })
    }

    pub fn last(&self) -> LinkErrors {
        self.last.lock(|cell| cell.get())
    }
}

/// Raises and clears bus-health faults for a changed link-error bitmask.
///
/// Passive state is not reported while the first transmission after start-up is outstanding.
pub(crate) fn evaluate<F: FaultSink + ?Sized>(
    faults: &F,
    errors: LinkErrors,
    first_message_pending: bool,
) {
    let info = errors.into_bits();

    if errors.contains(LinkErrors::BUS_OFF) {
        faults.report(Fault::TxBusOff, EmergencyCode::BusOffRecovered, info);
    } else {
        faults.reset(Fault::TxBusOff, info);

        if errors.contains(LinkErrors::WARNING) {
            faults.report(Fault::BusWarning, EmergencyCode::NoError, info);
        }

        if errors.contains(LinkErrors::PASSIVE) {
            if !first_message_pending {
                faults.report(Fault::TxBusPassive, EmergencyCode::CanPassive, info);
            }
        } else if faults.is_active(Fault::TxBusPassive) {
            faults.reset(Fault::TxBusPassive, info);
            faults.reset(Fault::TxOverflow, info);
        }

        if errors.is_empty() {
            faults.reset(Fault::BusWarning, info);
        }
    }

    if errors.intersects(RX_OVERRUN) {
        faults.report(Fault::RxBufferOverflow, EmergencyCode::CanOverrun, info);
    }
}
