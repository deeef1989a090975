//! Per-type slot tables: layout, publication, inheritance and recomputation.

use super::{
    slot::{PythonSlot, PyTypeFlags, SlotValue},
    slot_defs::{SLOT_COUNT, SlotGroup, SlotKind},
};
use crate::{
    PyObjectRef,
    builtins::{PyNone, PySlotWrapper, PyTypeRef, object},
};
use arc_swap::{ArcSwap, Guard};
use core::{
    fmt,
    sync::atomic::{AtomicUsize, Ordering},
};
use std::sync::Arc;
use strum::IntoEnumIterator;

/// One immutable snapshot of a type's slots.
#[derive(Clone)]
pub struct SlotTable {
    slots: [Option<SlotValue>; SLOT_COUNT],
    combined_sq_mp_length: Option<SlotValue>,
    combined_mp_sq_length: Option<SlotValue>,
    combined_tp_getattro_getattr: Option<SlotValue>,
    combined_tp_setattro_setattr: Option<SlotValue>,
    has_as_number: bool,
    has_as_sequence: bool,
    has_as_mapping: bool,
    has_as_async: bool,
}

impl SlotTable {
    pub fn empty() -> Self {
        SlotTableBuilder::new().build()
    }

    #[inline]
    pub fn get(&self, kind: SlotKind) -> Option<&SlotValue> {
        self.slots[kind.index()].as_ref()
    }

    /// `sq_length`, else `mp_length`.
    #[inline]
    pub fn combined_sq_mp_length(&self) -> Option<&SlotValue> {
        self.combined_sq_mp_length.as_ref()
    }

    /// `mp_length`, else `sq_length`.
    #[inline]
    pub fn combined_mp_sq_length(&self) -> Option<&SlotValue> {
        self.combined_mp_sq_length.as_ref()
    }

    #[inline]
    pub fn combined_tp_getattro_getattr(&self) -> Option<&SlotValue> {
        self.combined_tp_getattro_getattr.as_ref()
    }

    #[inline]
    pub fn combined_tp_setattro_setattr(&self) -> Option<&SlotValue> {
        self.combined_tp_setattro_setattr.as_ref()
    }

    pub fn has_as_number(&self) -> bool {
        self.has_as_number
    }

    pub fn has_as_sequence(&self) -> bool {
        self.has_as_sequence
    }

    pub fn has_as_mapping(&self) -> bool {
        self.has_as_mapping
    }

    pub fn has_as_async(&self) -> bool {
        self.has_as_async
    }

    pub fn iter(&self) -> impl Iterator<Item = (SlotKind, &SlotValue)> {
        SlotKind::iter().filter_map(|kind| self.get(kind).map(|v| (kind, v)))
    }

    pub fn to_builder(&self) -> SlotTableBuilder {
        SlotTableBuilder {
            slots: self.slots.clone(),
        }
    }
}

impl Default for SlotTable {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for SlotTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|(kind, value)| (kind.name(), value)))
            .finish()
    }
}

#[derive(Clone)]
pub struct SlotTableBuilder {
    slots: [Option<SlotValue>; SLOT_COUNT],
}

impl SlotTableBuilder {
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| None),
        }
    }

    #[inline]
    pub fn get(&self, kind: SlotKind) -> Option<&SlotValue> {
        self.slots[kind.index()].as_ref()
    }

    pub fn set(&mut self, kind: SlotKind, value: Option<SlotValue>) -> &mut Self {
        self.slots[kind.index()] = value;
        self
    }

    fn has_group(&self, group: SlotGroup) -> bool {
        SlotKind::iter()
            .filter(|kind| kind.group() == group)
            .any(|kind| self.get(kind).is_some())
    }

    pub fn build(self) -> SlotTable {
        let first = |a: SlotKind, b: SlotKind| self.get(a).or_else(|| self.get(b)).cloned();
        let combined_sq_mp_length = first(SlotKind::SqLength, SlotKind::MpLength);
        let combined_mp_sq_length = first(SlotKind::MpLength, SlotKind::SqLength);
        let combined_tp_getattro_getattr = first(SlotKind::TpGetattro, SlotKind::TpGetattr);
        let combined_tp_setattro_setattr = first(SlotKind::TpSetattro, SlotKind::TpSetattr);
        SlotTable {
            combined_sq_mp_length,
            combined_mp_sq_length,
            combined_tp_getattro_getattr,
            combined_tp_setattro_setattr,
            has_as_number: self.has_group(SlotGroup::Number),
            has_as_sequence: self.has_group(SlotGroup::Sequence),
            has_as_mapping: self.has_group(SlotGroup::Mapping),
            has_as_async: self.has_group(SlotGroup::Async),
            slots: self.slots,
        }
    }
}

impl Default for SlotTableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Borrowed view of the table a type had when it was loaded.
pub type SlotTableGuard = Guard<Arc<SlotTable>>;

/// Published slot table of one type.
///
/// Readers load the current table without locking. Writers publish a complete new table; a
/// replaced table is freed once the last reader holding it lets go.
pub struct SlotTableCell {
    current: ArcSwap<SlotTable>,
    generation: AtomicUsize,
}

impl SlotTableCell {
    pub fn new(table: SlotTable) -> Self {
        Self {
            current: ArcSwap::from_pointee(table),
            generation: AtomicUsize::new(1),
        }
    }

    #[inline]
    pub fn load(&self) -> SlotTableGuard {
        self.current.load()
    }

    pub fn load_full(&self) -> Arc<SlotTable> {
        self.current.load_full()
    }

    pub fn publish(&self, table: SlotTable) {
        self.current.store(Arc::new(table));
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// How many tables were published so far, the initial one included.
    pub fn generation(&self) -> usize {
        self.generation.load(Ordering::Acquire)
    }
}

impl Default for SlotTableCell {
    fn default() -> Self {
        Self::new(SlotTable::empty())
    }
}

impl fmt::Debug for SlotTableCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self.load(), f)
    }
}

/// Build the slot table of `typ` from its declared slots, its namespace and its bases.
pub(crate) fn compute_for_type(typ: &PyTypeRef) -> SlotTable {
    let table = if typ.flags.has_feature(PyTypeFlags::HEAPTYPE) {
        compute_for_heap_type(typ)
    } else {
        compute_for_static_type(typ)
    };
    log::debug!(
        "computed slots of '{}': {} filled",
        typ.name(),
        table.iter().count()
    );
    table
}

fn compute_for_heap_type(typ: &PyTypeRef) -> SlotTable {
    let mut builder = SlotTableBuilder::new();
    inherit_slots(typ, &mut builder);
    for kind in SlotKind::iter().filter(|kind| kind.has_magic_names()) {
        let value = update_one_slot(typ, kind, &builder);
        builder.set(kind, value);
    }
    builder.build()
}

/// Builtin and native types: the declared slots win, everything else is inherited.
fn compute_for_static_type(typ: &PyTypeRef) -> SlotTable {
    let mut builder = SlotTableBuilder::new();
    for (kind, value) in typ.declared_slots() {
        builder.set(*kind, Some(value.clone()));
    }
    inherit_slots(typ, &mut builder);
    if typ.flags.has_feature(PyTypeFlags::NATIVE) {
        for kind in SlotKind::iter() {
            if let Some(SlotValue::Python(python)) = builder.get(kind) {
                let revalidated = SlotValue::Python(python.for_new_type(typ));
                builder.set(kind, Some(revalidated));
            }
        }
    }
    builder.build()
}

/// Copy absent slots from the bases, in MRO order.
pub(crate) fn inherit_slots(typ: &PyTypeRef, builder: &mut SlotTableBuilder) {
    use SlotKind::*;

    if builder.get(TpNew).is_none()
        && let Some(base) = typ.base()
    {
        builder.set(TpNew, base.slot(TpNew));
    }
    let overrides_hash = typ.has_own_attr("__eq__") || typ.has_own_attr("__hash__");

    for base in typ.mro() {
        let base_slots = base.slots();
        let inherit_pair = |a: SlotKind, b: SlotKind, builder: &mut SlotTableBuilder| {
            if builder.get(a).is_none() && builder.get(b).is_none() {
                builder.set(a, base_slots.get(a).cloned());
                builder.set(b, base_slots.get(b).cloned());
            }
        };
        inherit_pair(TpGetattr, TpGetattro, builder);
        inherit_pair(TpSetattr, TpSetattro, builder);
        if !overrides_hash {
            inherit_pair(TpRichcompare, TpHash, builder);
        }
        for kind in SlotKind::iter() {
            if matches!(
                kind,
                TpGetattr | TpGetattro | TpSetattr | TpSetattro | TpRichcompare | TpHash
            ) {
                continue;
            }
            if builder.get(kind).is_none() {
                builder.set(kind, base_slots.get(kind).cloned());
            }
        }
    }
}

/// The only kind `name` fills on the table being built, or `None` when zero or several do.
fn resolve_slotdups(builder: &SlotTableBuilder, name: &str) -> Option<SlotKind> {
    let mut found = None;
    for kind in SlotKind::for_magic_name(name) {
        if builder.get(kind).is_some() {
            if found.is_some() {
                return None;
            }
            found = Some(kind);
        }
    }
    found
}

/// Decide the value of one slot of a type from what its magic names resolve to along the MRO.
///
/// When every name resolves to a slot wrapper of the same builtin or native implementation,
/// that implementation is installed directly. Anything else user-defined installs a Python
/// slot over all the looked-up callables.
pub(crate) fn update_one_slot(
    typ: &PyTypeRef,
    kind: SlotKind,
    builder: &SlotTableBuilder,
) -> Option<SlotValue> {
    let mut use_generic = false;
    let mut generic = false;
    let mut specific: Option<SlotValue> = None;
    let mut found: Vec<Option<PyObjectRef>> = Vec::new();

    for def in kind.defs() {
        let descr = typ.lookup(def.name);
        found.push(descr.clone());
        let Some(descr) = descr else {
            if kind == SlotKind::TpIternext {
                specific = Some(SlotValue::Builtin(&object::NEXT_NOT_IMPLEMENTED));
            }
            continue;
        };

        if let Some(wrapper) = descr.payload::<PySlotWrapper>() {
            let dup = resolve_slotdups(builder, def.name);
            if dup.is_none() || dup == Some(kind) {
                generic = true;
            }
            let wrapped = wrapper.slot();
            let can_set_specific = specific.as_ref().is_none_or(|s| s.is(wrapped));
            let owner_ok = wrapper
                .owner()
                .is_some_and(|owner| typ.fast_issubclass(&owner));
            if can_set_specific && wrapper.tag() == def.tag && owner_ok {
                specific = Some(wrapped.clone());
            } else {
                use_generic = true;
            }
        } else if descr.payload_is::<PyNone>() && kind == SlotKind::TpHash {
            specific = Some(SlotValue::Builtin(&object::HASH_NOT_IMPLEMENTED));
        } else if descr.payload_is::<PyNone>() && kind == SlotKind::TpIter {
            specific = Some(SlotValue::Builtin(&object::ITER_NOT_IMPLEMENTED));
        } else if descr.payload_is::<PyNone>() && kind == SlotKind::TpIternext {
            specific = Some(SlotValue::Builtin(&object::NEXT_NOT_IMPLEMENTED));
        } else {
            use_generic = true;
            generic = true;
        }
    }

    match specific {
        Some(specific) if !use_generic => Some(specific),
        _ if generic => {
            let reused = match builder.get(kind) {
                Some(SlotValue::Python(prev)) if prev.kind() == kind => {
                    prev.with_callables(&found, typ)
                }
                _ => Arc::new(PythonSlot::new(kind, &found, typ)),
            };
            Some(SlotValue::Python(reused))
        }
        _ => None,
    }
}

/// Recompute the slots `name` fills on `typ` and, recursively, on its live subclasses.
pub(crate) fn update_slot(typ: &PyTypeRef, name: &str) {
    let kinds: Vec<SlotKind> = SlotKind::for_magic_name(name).collect();
    if kinds.is_empty() {
        return;
    }
    update_kinds(typ, &kinds);
}

fn update_kinds(typ: &PyTypeRef, kinds: &[SlotKind]) {
    let mut builder = typ.slots().to_builder();
    for &kind in kinds {
        let value = update_one_slot(typ, kind, &builder);
        builder.set(kind, value);
    }
    typ.publish_slots(builder.build());
    for sub in typ.subclasses() {
        update_kinds(&sub, kinds);
    }
}

/// Full recomputation after the bases of `typ` changed.
pub(crate) fn recompute_all(typ: &PyTypeRef) {
    typ.publish_slots(compute_for_type(typ));
    for sub in typ.subclasses() {
        recompute_all(&sub);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        PyResult, VirtualMachine,
        common::hash::PyHash,
        native::{NativeAbi, NativePtr},
        types::{BuiltinSlot, BuiltinSlotFunc},
    };

    fn zero_hash(_: &PyObjectRef, _: &VirtualMachine) -> PyResult<PyHash> {
        Ok(0)
    }

    static HASH: BuiltinSlot =
        BuiltinSlot::new("test", SlotKind::TpHash, BuiltinSlotFunc::Hash(zero_hash));

    #[test]
    fn derived_fields_prefer_the_named_group() {
        let sq = SlotValue::native(NativePtr::from_addr(0x10), NativeAbi::CExt);
        let mp = SlotValue::native(NativePtr::from_addr(0x20), NativeAbi::CExt);
        let mut builder = SlotTableBuilder::new();
        builder.set(SlotKind::SqLength, Some(sq.clone()));
        builder.set(SlotKind::MpLength, Some(mp.clone()));
        let table = builder.build();
        assert!(table.combined_sq_mp_length().unwrap().is(&sq));
        assert!(table.combined_mp_sq_length().unwrap().is(&mp));
        assert!(table.has_as_sequence());
        assert!(table.has_as_mapping());
        assert!(!table.has_as_number());
        assert!(table.combined_tp_getattro_getattr().is_none());
    }

    #[test]
    fn getattr_falls_back_to_native_only_slot() {
        let getattr = SlotValue::native(NativePtr::from_addr(0x30), NativeAbi::CExt);
        let mut builder = SlotTableBuilder::new();
        builder.set(SlotKind::TpGetattr, Some(getattr.clone()));
        let table = builder.build();
        assert!(table.combined_tp_getattro_getattr().unwrap().is(&getattr));
    }

    #[test]
    fn publish_keeps_old_tables_readable() {
        let cell = SlotTableCell::default();
        let before = cell.load();
        assert!(before.get(SlotKind::TpHash).is_none());

        let mut builder = SlotTableBuilder::new();
        builder.set(SlotKind::TpHash, Some(SlotValue::Builtin(&HASH)));
        cell.publish(builder.build());

        assert!(before.get(SlotKind::TpHash).is_none());
        let after = cell.load();
        assert!(after.get(SlotKind::TpHash).unwrap().is_builtin(&HASH));
        assert!(!Arc::ptr_eq(&*before, &*after));
        assert_eq!(cell.generation(), 2);
    }

    #[test]
    fn replaced_tables_are_freed() {
        let cell = SlotTableCell::default();
        let first = Arc::downgrade(&cell.load_full());
        for _ in 0..10_000 {
            let mut builder = SlotTableBuilder::new();
            builder.set(SlotKind::TpHash, Some(SlotValue::Builtin(&HASH)));
            cell.publish(builder.build());
        }
        assert!(first.upgrade().is_none());
        assert_eq!(cell.generation(), 10_001);
        assert_eq!(Arc::strong_count(&cell.load_full()), 2);
    }

    #[test]
    fn concurrent_readers_see_whole_tables() {
        let cell = Arc::new(SlotTableCell::default());
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cell = Arc::clone(&cell);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        let table = cell.load();
                        // both fields are written together
                        assert_eq!(
                            table.get(SlotKind::TpHash).is_some(),
                            table.get(SlotKind::TpRichcompare).is_some()
                        );
                    }
                })
            })
            .collect();
        for _ in 0..100 {
            let mut builder = SlotTableBuilder::new();
            builder.set(SlotKind::TpHash, Some(SlotValue::Builtin(&HASH)));
            builder.set(SlotKind::TpRichcompare, Some(SlotValue::Builtin(&HASH)));
            cell.publish(builder.build());
        }
        for reader in readers {
            reader.join().unwrap();
        }
    }
}
