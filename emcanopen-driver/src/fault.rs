//! Fault-reporting collaborator interface

use emcanopen_core::{EmergencyCode, Fault};

/// Receiver of bus-health and transport fault conditions
///
/// Conditions are level-triggered: `report` raises a condition, `reset` clears it. The
/// implementation is expected to deduplicate repeated reports of an active condition.
/// Calls may arrive from interrupt context and must not block.
pub trait FaultSink {
    fn report(&self, fault: Fault, code: EmergencyCode, info: u32);

    fn reset(&self, fault: Fault, info: u32);

    fn is_active(&self, fault: Fault) -> bool;
}

impl<T: FaultSink + ?Sized> FaultSink for &T {
    fn report(&self, fault: Fault, code: EmergencyCode, info: u32) {
        T::report(self, fault, code, info)
    }

    fn reset(&self, fault: Fault, info: u32) {
        T::reset(self, fault, info)
    }

    fn is_active(&self, fault: Fault) -> bool {
        T::is_active(self, fault)
    }
}
