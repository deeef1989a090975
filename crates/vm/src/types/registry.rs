//! Process-wide table of builtin call targets.
//!
//! Every [`BuiltinSlot`] gets an index here during startup. Interpreter contexts size their
//! per-target arrays by [`CallTargetRegistry::len`], which freezes the registry: allocating
//! after the count was observed would index past those arrays.

use super::slot::BuiltinSlot;
use crate::{PyResult, VirtualMachine, function::FuncArgs};
use pyslot_common::lock::PyRwLock;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallTargetIndex(u32);

impl CallTargetIndex {
    #[inline]
    pub fn get(self) -> usize {
        self.0 as usize
    }
}

pub struct CallTargetRegistry {
    entries: PyRwLock<Vec<&'static BuiltinSlot>>,
    count_read: AtomicBool,
}

pub static BUILTIN_CALL_TARGETS: CallTargetRegistry = CallTargetRegistry::new();

impl CallTargetRegistry {
    pub const fn new() -> Self {
        Self {
            entries: parking_lot::const_rwlock(Vec::new()),
            count_read: AtomicBool::new(false),
        }
    }

    /// Append `slot`. Panics once the entry count has been read.
    pub fn allocate(&self, slot: &'static BuiltinSlot) -> CallTargetIndex {
        assert!(
            !self.count_read.load(Ordering::Acquire),
            "call target for {slot:?} allocated after the registry size was read"
        );
        let mut entries = self.entries.write();
        let Ok(index) = u32::try_from(entries.len()) else {
            panic!("too many builtin call targets");
        };
        entries.push(slot);
        log::trace!("call target #{index} -> {slot:?}");
        CallTargetIndex(index)
    }

    /// Number of entries. Freezes the registry.
    pub fn len(&self) -> usize {
        if !self.count_read.swap(true, Ordering::AcqRel) {
            log::debug!("builtin call target registry frozen");
        }
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forbid further allocation without reading the count.
    pub fn freeze(&self) {
        let _ = self.len();
    }

    pub fn is_frozen(&self) -> bool {
        self.count_read.load(Ordering::Acquire)
    }

    pub fn get(&self, index: CallTargetIndex) -> Option<&'static BuiltinSlot> {
        self.entries.read().get(index.get()).copied()
    }

    /// Give every slot in `slots` an index. Already registered slots keep theirs.
    pub fn register_all(&self, slots: &[&'static BuiltinSlot]) {
        for slot in slots {
            slot.register(self);
        }
    }
}

impl Default for CallTargetRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Boxed-argument entry point for one builtin slot, built lazily per interpreter.
pub struct CallTarget {
    slot: &'static BuiltinSlot,
    qualname: String,
    calls: AtomicUsize,
}

impl CallTarget {
    pub(crate) fn new(slot: &'static BuiltinSlot) -> Self {
        Self {
            slot,
            qualname: format!("{}.{}", slot.owner(), slot.kind().name()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn qualname(&self) -> &str {
        &self.qualname
    }

    pub fn slot(&self) -> &'static BuiltinSlot {
        self.slot
    }

    /// How many times the boxed entry point ran.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn invoke(&self, args: FuncArgs, vm: &VirtualMachine) -> PyResult {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.slot.func().call_boxed(args, vm)
    }
}

impl core::fmt::Debug for CallTarget {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "<call target {}>", self.qualname)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PyObjectRef, common::hash::PyHash, types::{BuiltinSlotFunc, SlotKind}};

    fn zero_hash(_: &PyObjectRef, _: &VirtualMachine) -> PyResult<PyHash> {
        Ok(0)
    }

    static FIRST: BuiltinSlot =
        BuiltinSlot::new("first", SlotKind::TpHash, BuiltinSlotFunc::Hash(zero_hash));
    static SECOND: BuiltinSlot =
        BuiltinSlot::new("second", SlotKind::TpHash, BuiltinSlotFunc::Hash(zero_hash));

    #[test]
    fn allocation_is_append_only() {
        let registry = CallTargetRegistry::new();
        let a = registry.allocate(&FIRST);
        let b = registry.allocate(&SECOND);
        assert_eq!(a.get(), 0);
        assert_eq!(b.get(), 1);
        assert!(!registry.is_frozen());
        assert_eq!(registry.len(), 2);
        assert!(registry.is_frozen());
        assert!(core::ptr::eq(registry.get(b).unwrap(), &SECOND));
    }

    #[test]
    #[should_panic(expected = "allocated after the registry size was read")]
    fn allocation_after_count_read_panics() {
        let registry = CallTargetRegistry::new();
        registry.allocate(&FIRST);
        let _ = registry.len();
        registry.allocate(&SECOND);
    }

    #[test]
    fn freeze_without_reading() {
        let registry = CallTargetRegistry::new();
        registry.allocate(&FIRST);
        registry.freeze();
        assert!(registry.is_frozen());
        assert_eq!(registry.len(), 1);
    }
}
