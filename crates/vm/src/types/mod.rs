mod registry;
mod slot;
mod slot_defs;
mod slot_table;

pub use registry::{BUILTIN_CALL_TARGETS, CallTarget, CallTargetIndex, CallTargetRegistry};
pub use slot::*;
pub use slot_defs::{
    PythonSlotShape, SLOT_COUNT, SLOT_DEFS, SlotDef, SlotGroup, SlotKind, WrapperTag,
};
pub use slot_table::{SlotTable, SlotTableBuilder, SlotTableCell, SlotTableGuard};
pub(crate) use slot_table::{compute_for_type, recompute_all, update_slot};
