//! Identifier/mask matching of received frames

use crate::core::PackedId;
use crate::registry::{RxHandler, RxSlot};

/// Returns the lowest-index bound slot whose pattern accepts `ident`.
///
/// Unbound slots are skipped. Overlapping patterns are allowed; the lower index takes priority.
pub(crate) fn find_match<'a>(
    slots: &[RxSlot<'a>],
    ident: PackedId,
) -> Option<(usize, &'a (dyn RxHandler + Sync))> {
    slots.iter().enumerate().find_map(|(index, slot)| {
        let handler = slot.handler()?;
        slot.pattern().matches(ident).then_some((index, handler))
    })
}
