//! Receive and transmit slot registries
//!
//! Slot arrays are caller-owned storage lent to a [`Module`](crate::module::Module) for its
//! whole lifetime. The module addresses slots by the index the caller picked at registration.

use crate::core::{IdPattern, PackedId, StdId};
use crate::filter;
use crate::frame::{Data, DataLength, Frame};

/// Consumer of frames delivered to a receive slot
///
/// Called from the receive interrupt, outside of any module lock. Implementations should only
/// copy data or raise a flag.
pub trait RxHandler {
    fn on_frame(&self, frame: &Frame);
}

impl<F: Fn(&Frame)> RxHandler for F {
    fn on_frame(&self, frame: &Frame) {
        self(frame)
    }
}

/// Receive slot: an identifier/mask pattern bound to a handler
#[derive(Clone, Copy, Default)]
pub struct RxSlot<'a> {
    pattern: IdPattern,
    handler: Option<&'a (dyn RxHandler + Sync)>,
}

impl<'a> RxSlot<'a> {
    pub const EMPTY: Self = Self {
        pattern: IdPattern::EMPTY,
        handler: None,
    };

    pub fn pattern(&self) -> IdPattern {
        self.pattern
    }

    pub fn is_bound(&self) -> bool {
        self.handler.is_some()
    }

    pub(crate) fn handler(&self) -> Option<&'a (dyn RxHandler + Sync)> {
        self.handler
    }
}

impl core::fmt::Debug for RxSlot<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RxSlot")
            .field("pattern", &self.pattern)
            .field("bound", &self.is_bound())
            .finish()
    }
}

/// Transmit slot: one outgoing message source
///
/// The slot is `full` while its frame waits for a hardware mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TxSlot {
    ident: PackedId,
    data: Data,
    full: bool,
    sync_gated: bool,
}

impl TxSlot {
    pub const EMPTY: Self = Self {
        ident: PackedId::new(StdId::ZERO, false),
        data: Data::EMPTY,
        full: false,
        sync_gated: false,
    };

    pub fn ident(&self) -> PackedId {
        self.ident
    }

    pub fn data(&self) -> &Data {
        &self.data
    }

    pub fn is_full(&self) -> bool {
        self.full
    }

    pub fn is_sync_gated(&self) -> bool {
        self.sync_gated
    }

    /// Rebinds identifier, length and sync flag. Payload bytes are kept.
    pub(crate) fn prepare(&mut self, ident: PackedId, length: DataLength, sync_gated: bool) {
        self.ident = ident;
        self.data = Data::from_raw(length, *self.data.raw());
        self.full = false;
        self.sync_gated = sync_gated;
    }

    pub(crate) fn data_mut(&mut self) -> &mut Data {
        &mut self.data
    }

    pub(crate) fn set_full(&mut self, full: bool) {
        self.full = full;
    }
}

/// Handle to a prepared transmit slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TxSlotId(usize);

impl TxSlotId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct OutOfRange;

/// Receive side of the module state
pub(crate) struct RxRegistry<'a> {
    slots: &'a mut [RxSlot<'a>],
    filter_programmed: bool,
}

impl<'a> RxRegistry<'a> {
    pub fn new(slots: &'a mut [RxSlot<'a>]) -> Self {
        let mut registry = Self {
            slots,
            filter_programmed: false,
        };
        registry.reset();
        registry
    }

    /// Unbinds every slot. The acceptance filter must be programmed again afterwards.
    pub fn reset(&mut self) {
        self.slots.fill(RxSlot::EMPTY);
        self.filter_programmed = false;
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn bind(
        &mut self,
        index: usize,
        pattern: IdPattern,
        handler: &'a (dyn RxHandler + Sync),
    ) -> Result<(), OutOfRange> {
        let slot = self.slots.get_mut(index).ok_or(OutOfRange)?;
        *slot = RxSlot {
            pattern,
            handler: Some(handler),
        };
        Ok(())
    }

    pub fn filter_programmed(&self) -> bool {
        self.filter_programmed
    }

    pub fn set_filter_programmed(&mut self) {
        self.filter_programmed = true;
    }

    pub fn find(&self, ident: PackedId) -> Option<(usize, &'a (dyn RxHandler + Sync))> {
        filter::find_match(self.slots, ident)
    }

    pub fn slot(&self, index: usize) -> Option<RxSlot<'a>> {
        self.slots.get(index).copied()
    }
}
