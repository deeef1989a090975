//! Per-operation slot dispatch.
//!
//! Each node takes a [`SlotValue`] read from the receiver type's slot table plus the operands
//! and runs it: a builtin admitted by the node's [`InlineCache`] is called directly; a Python
//! slot calls the user callable bound to the receiver; a native slot crosses the ABI with the
//! GIL released; a builtin rejected by a megamorphic cache goes through its registry entry
//! with boxed arguments. Nodes never mutate slot tables or slot values.

mod binary;
mod descr;
mod getattr;
mod inquiry;
mod iternext;
mod richcmp;
mod sequence;
mod setattr;
mod ternary;
mod unary;
mod varargs;

pub use binary::{CallSlotBinaryFunc, CallSlotBinaryOp};
pub use descr::{CallSlotDescrGet, CallSlotDescrSet};
pub use getattr::CallSlotGetAttr;
pub use inquiry::{CallSlotHashFun, CallSlotLen, CallSlotNbBool};
pub use iternext::CallSlotTpIterNext;
pub use richcmp::{CallSlotRichCompare, CallSlotSqContains};
pub use sequence::{CallSlotMpAssSubscript, CallSlotSizeArgFunc, CallSlotSqAssItem};
pub use setattr::CallSlotSetAttr;
pub use ternary::CallSlotNbPower;
pub use unary::CallSlotUnaryFunc;
pub use varargs::{CallSlotTpCall, CallSlotTpInit, CallSlotTpNew};

use crate::{
    PyObjectRef, PyResult, VirtualMachine,
    builtins::{PyBaseExceptionRef, PyFunction, PySlotWrapper},
    common::lock::PyMutex,
    function::FuncArgs,
    native::{NativeAbiError, NativeWord, abi_violation},
    protocol::PyIterReturn,
    types::{BuiltinSlot, NativeSlot, SLOT_COUNT, SlotKind, SlotValue},
};
use core::{
    ptr,
    sync::atomic::{AtomicBool, Ordering},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Uninitialized,
    /// Number of distinct builtins cached so far.
    Polymorphic(usize),
    Megamorphic,
}

/// Identities of the builtin slots a call site has seen, up to a fixed limit. Past the limit
/// the site turns megamorphic for good and builtins are called through the registry.
pub struct InlineCache {
    entries: PyMutex<Vec<&'static BuiltinSlot>>,
    limit: usize,
    megamorphic: AtomicBool,
}

impl InlineCache {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: PyMutex::new(Vec::with_capacity(limit)),
            limit,
            megamorphic: AtomicBool::new(false),
        }
    }

    /// Whether `slot` may be called directly from this site. Records it when there is room.
    pub fn admit(&self, slot: &'static BuiltinSlot) -> bool {
        if self.megamorphic.load(Ordering::Relaxed) {
            return false;
        }
        let mut entries = self.entries.lock();
        if entries.iter().any(|cached| ptr::eq(*cached, slot)) {
            return true;
        }
        if entries.len() < self.limit {
            entries.push(slot);
            log::trace!("inline cache admitted {slot:?} ({} of {})", entries.len(), self.limit);
            return true;
        }
        entries.clear();
        self.megamorphic.store(true, Ordering::Relaxed);
        log::warn!(
            "call site for {} went megamorphic after {} builtins",
            slot.kind().name(),
            self.limit
        );
        false
    }

    pub fn state(&self) -> CacheState {
        if self.megamorphic.load(Ordering::Relaxed) {
            return CacheState::Megamorphic;
        }
        match self.entries.lock().len() {
            0 => CacheState::Uninitialized,
            n => CacheState::Polymorphic(n),
        }
    }

    #[inline]
    pub fn is_megamorphic(&self) -> bool {
        self.megamorphic.load(Ordering::Relaxed)
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

/// One node per slot kind of a family, indexed by [`SlotKind::index`].
pub struct KindSites<T> {
    sites: Box<[Option<T>]>,
}

impl<T> KindSites<T> {
    pub fn new(kinds: impl IntoIterator<Item = SlotKind>, mut make: impl FnMut(SlotKind) -> T) -> Self {
        let mut sites: Vec<Option<T>> = (0..SLOT_COUNT).map(|_| None).collect();
        for kind in kinds {
            sites[kind.index()] = Some(make(kind));
        }
        Self {
            sites: sites.into_boxed_slice(),
        }
    }

    /// The node for `kind`. Asking a family for a kind it does not dispatch is a caller bug.
    #[track_caller]
    pub fn get(&self, kind: SlotKind) -> &T {
        match &self.sites[kind.index()] {
            Some(site) => site,
            None => panic!("no call site for {} in this family", kind.name()),
        }
    }
}

/// The VM-wide call sites used by the operator entry points of [`VirtualMachine`].
pub struct CallSites {
    pub unary: KindSites<CallSlotUnaryFunc>,
    pub binary_func: KindSites<CallSlotBinaryFunc>,
    pub binary_op: KindSites<CallSlotBinaryOp>,
    pub size_arg: KindSites<CallSlotSizeArgFunc>,
    pub power: CallSlotNbPower,
    pub len: KindSites<CallSlotLen>,
    pub getattr: KindSites<CallSlotGetAttr>,
    pub setattr: KindSites<CallSlotSetAttr>,
    pub bool: CallSlotNbBool,
    pub hash: CallSlotHashFun,
    pub richcompare: CallSlotRichCompare,
    pub contains: CallSlotSqContains,
    pub descr_get: CallSlotDescrGet,
    pub descr_set: CallSlotDescrSet,
    pub mp_ass_subscript: CallSlotMpAssSubscript,
    pub sq_ass_item: CallSlotSqAssItem,
    pub iternext: CallSlotTpIterNext,
    pub init: CallSlotTpInit,
    pub new: CallSlotTpNew,
    pub call: CallSlotTpCall,
}

impl CallSites {
    pub fn new(limit: usize) -> Self {
        use SlotKind::*;
        let binary_ops = [
            NbAdd,
            NbSubtract,
            NbMultiply,
            NbRemainder,
            NbDivmod,
            NbLshift,
            NbRshift,
            NbAnd,
            NbXor,
            NbOr,
            NbFloorDivide,
            NbTrueDivide,
            NbMatrixMultiply,
        ];
        let binary_funcs = [
            MpSubscript,
            SqConcat,
            SqInplaceConcat,
            NbInplaceAdd,
            NbInplaceSubtract,
            NbInplaceMultiply,
            NbInplaceRemainder,
            NbInplacePower,
            NbInplaceLshift,
            NbInplaceRshift,
            NbInplaceAnd,
            NbInplaceXor,
            NbInplaceOr,
            NbInplaceFloorDivide,
            NbInplaceTrueDivide,
            NbInplaceMatrixMultiply,
        ];
        let unary = [
            TpIter, TpRepr, TpStr, NbNegative, NbPositive, NbAbsolute, NbInvert, NbIndex, NbInt,
            NbFloat, AmAwait, AmAiter, AmAnext,
        ];
        Self {
            unary: KindSites::new(unary, |kind| CallSlotUnaryFunc::new(kind, limit)),
            binary_func: KindSites::new(binary_funcs, |kind| CallSlotBinaryFunc::new(kind, limit)),
            binary_op: KindSites::new(binary_ops, |kind| CallSlotBinaryOp::new(kind, limit)),
            size_arg: KindSites::new([SqItem, SqRepeat, SqInplaceRepeat], |kind| {
                CallSlotSizeArgFunc::new(kind, limit)
            }),
            power: CallSlotNbPower::new(limit),
            len: KindSites::new([MpLength, SqLength], |kind| CallSlotLen::new(kind, limit)),
            getattr: KindSites::new([TpGetattro, TpGetattr], |kind| {
                CallSlotGetAttr::new(kind, limit)
            }),
            setattr: KindSites::new([TpSetattro, TpSetattr], |kind| {
                CallSlotSetAttr::new(kind, limit)
            }),
            bool: CallSlotNbBool::new(limit),
            hash: CallSlotHashFun::new(limit),
            richcompare: CallSlotRichCompare::new(limit),
            contains: CallSlotSqContains::new(limit),
            descr_get: CallSlotDescrGet::new(limit),
            descr_set: CallSlotDescrSet::new(limit),
            mp_ass_subscript: CallSlotMpAssSubscript::new(limit),
            sq_ass_item: CallSlotSqAssItem::new(limit),
            iternext: CallSlotTpIterNext::new(limit),
            init: CallSlotTpInit::new(limit),
            new: CallSlotTpNew::new(limit),
            call: CallSlotTpCall::new(limit),
        }
    }
}

/// Call a builtin with boxed arguments through its registry entry.
pub(crate) fn call_builtin_boxed(
    slot: &'static BuiltinSlot,
    args: FuncArgs,
    vm: &VirtualMachine,
) -> PyResult {
    match slot.call_target() {
        Some(index) => vm.call_target(index).invoke(args, vm),
        None => slot.func().call_boxed(args, vm),
    }
}

/// A builtin whose calling shape cannot fill `kind` made it into a slot table.
#[cold]
#[track_caller]
pub(crate) fn wrong_shape(slot: &'static BuiltinSlot, kind: SlotKind) -> ! {
    panic!("{slot:?} cannot fill {}", kind.name())
}

pub(crate) fn trace_dispatch(vm: &VirtualMachine, kind: SlotKind, slot: &SlotValue) {
    if cfg!(feature = "vm-tracing-logging") || vm.settings.trace_dispatch {
        log::trace!("dispatch {} to {slot:?}", kind.name());
    }
}

/// First magic name of `kind`, for messages.
pub(crate) fn primary_name(kind: SlotKind) -> &'static str {
    kind.magic_names().next().unwrap_or_else(|| kind.name())
}

/// Call a user callable found in a slot with `receiver` bound as its first argument.
pub(crate) fn call_bound(
    vm: &VirtualMachine,
    callable: &PyObjectRef,
    receiver: &PyObjectRef,
    args: &[PyObjectRef],
) -> PyResult {
    if let Some(func) = callable.payload::<PyFunction>() {
        let mut all = Vec::with_capacity(args.len() + 1);
        all.push(receiver.clone());
        all.extend_from_slice(args);
        if func.signature().matches_exactly(all.len()) {
            return func.invoke_exact(&all, vm);
        }
        return func.invoke(FuncArgs::from(all), vm);
    }
    call_bound_args(vm, callable, receiver, FuncArgs::from(args.to_vec()))
}

/// Like [`call_bound`] for variadic slots. The exact-arity shapes of up to three arguments
/// after the receiver skip argument binding.
pub(crate) fn call_bound_args(
    vm: &VirtualMachine,
    callable: &PyObjectRef,
    receiver: &PyObjectRef,
    mut args: FuncArgs,
) -> PyResult {
    if let Some(func) = callable.payload::<PyFunction>() {
        if !args.has_kwargs() && func.signature().matches_exactly(args.args.len() + 1) {
            let zelf = receiver.clone();
            match args.args.as_slice() {
                [] => return func.invoke_exact(&[zelf], vm),
                [a] => return func.invoke_exact(&[zelf, a.clone()], vm),
                [a, b] => return func.invoke_exact(&[zelf, a.clone(), b.clone()], vm),
                [a, b, c] => {
                    return func.invoke_exact(&[zelf, a.clone(), b.clone(), c.clone()], vm);
                }
                _ => {}
            }
        }
        args.prepend_arg(receiver.clone());
        return func.invoke(args, vm);
    }
    if callable.payload_is::<PySlotWrapper>() {
        args.prepend_arg(receiver.clone());
        return vm.call(callable, args);
    }
    let bound = match callable.class().slots().get(SlotKind::TpDescrGet) {
        Some(get) => vm.sites.descr_get.execute(
            vm,
            get,
            callable,
            Some(receiver.clone()),
            Some(receiver.class().to_object()),
        )?,
        None => callable.clone(),
    };
    vm.call(&bound, args)
}

/// Invoke a native slot function with the GIL released.
pub(crate) fn invoke_native(
    vm: &VirtualMachine,
    kind: SlotKind,
    native: &NativeSlot,
    args: &[NativeWord],
) -> NativeWord {
    let bridge = vm.native_bridge();
    // SAFETY: the extension that installed this slot declared a function of the slot's
    // signature, which takes exactly these words.
    let result = vm.allow_threads(|| unsafe { bridge.invoke(native.abi(), native.callable(), args) });
    match result {
        Ok(word) => word,
        Err(err) => abi_violation(kind.name(), err),
    }
}

pub(crate) fn to_native(vm: &VirtualMachine, obj: &PyObjectRef) -> NativeWord {
    vm.native_bridge().to_native(obj, vm)
}

pub(crate) fn to_native_opt(vm: &VirtualMachine, obj: Option<&PyObjectRef>) -> NativeWord {
    obj.map_or(NativeWord::NULL, |obj| to_native(vm, obj))
}

/// The managed value of an object-returning native slot. NULL must come with a pending error.
pub(crate) fn native_object_result(
    vm: &VirtualMachine,
    kind: SlotKind,
    word: NativeWord,
) -> PyResult {
    let bridge = vm.native_bridge();
    if word.is_null() {
        return match bridge.take_pending_error(vm) {
            Some(err) => Err(err),
            None => abi_violation(
                kind.name(),
                NativeAbiError::NullWithoutError { slot: kind.name() },
            ),
        };
    }
    if vm.settings.check_native_results
        && let Some(err) = bridge.take_pending_error(vm)
    {
        log::error!(
            "{} returned a result with an exception set: {}",
            kind.name(),
            err.to_report()
        );
        return Err(vm.new_system_error(format!(
            "{} returned a result with an exception set",
            kind.name()
        )));
    }
    Ok(bridge.to_managed(word, vm))
}

/// A native `int` status or size result: negative means failure with a pending error.
pub(crate) fn native_status_result(
    vm: &VirtualMachine,
    kind: SlotKind,
    word: NativeWord,
) -> PyResult<isize> {
    if word.0 >= 0 {
        return Ok(word.0);
    }
    match vm.native_bridge().take_pending_error(vm) {
        Some(err) => Err(err),
        None => abi_violation(
            kind.name(),
            NativeAbiError::ErrorStatusWithoutError { slot: kind.name() },
        ),
    }
}

/// Native `tp_iternext`: NULL without an error, or with a pending `StopIteration`, means
/// exhausted.
pub(crate) fn native_iternext_result(
    vm: &VirtualMachine,
    word: NativeWord,
) -> PyResult<PyIterReturn> {
    let bridge = vm.native_bridge();
    if !word.is_null() {
        return Ok(PyIterReturn::Return(bridge.to_managed(word, vm)));
    }
    match bridge.take_pending_error(vm) {
        None => Ok(PyIterReturn::StopIteration(None)),
        Some(err) if err.fast_isinstance(&vm.ctx.exceptions.stop_iteration) => {
            Ok(PyIterReturn::StopIteration(err.get_arg(0)))
        }
        Some(err) => Err(err),
    }
}

/// Varargs for a native `init`/`new`/`call`: an argument tuple, no keywords.
pub(crate) fn native_varargs(
    vm: &VirtualMachine,
    kind: SlotKind,
    args: FuncArgs,
) -> PyResult<NativeWord> {
    if args.has_kwargs() {
        return Err(vm.new_type_error(format!(
            "native {} does not take keyword arguments",
            kind.name()
        )));
    }
    let tuple: PyObjectRef = vm.ctx.new_tuple(args.args).into();
    Ok(to_native(vm, &tuple))
}

/// A Python slot whose callable for this operation is missing.
pub(crate) fn missing_callable(
    vm: &VirtualMachine,
    obj: &PyObjectRef,
    name: &str,
) -> PyBaseExceptionRef {
    vm.new_attribute_error(format!(
        "'{}' object has no attribute '{name}'",
        obj.class().name()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        common::hash::PyHash,
        types::BuiltinSlotFunc,
    };

    fn zero(_: &PyObjectRef, _: &VirtualMachine) -> PyResult<PyHash> {
        Ok(0)
    }

    static A: BuiltinSlot = BuiltinSlot::new("a", SlotKind::TpHash, BuiltinSlotFunc::Hash(zero));
    static B: BuiltinSlot = BuiltinSlot::new("b", SlotKind::TpHash, BuiltinSlotFunc::Hash(zero));
    static C: BuiltinSlot = BuiltinSlot::new("c", SlotKind::TpHash, BuiltinSlotFunc::Hash(zero));

    #[test]
    fn cache_admits_up_to_limit() {
        let cache = InlineCache::new(2);
        assert_eq!(cache.state(), CacheState::Uninitialized);
        assert!(cache.admit(&A));
        assert!(cache.admit(&A));
        assert_eq!(cache.state(), CacheState::Polymorphic(1));
        assert!(cache.admit(&B));
        assert_eq!(cache.state(), CacheState::Polymorphic(2));
        assert!(!cache.admit(&C));
        assert_eq!(cache.state(), CacheState::Megamorphic);
        // megamorphic is terminal, even for previously cached builtins
        assert!(!cache.admit(&A));
    }

    #[test]
    fn zero_limit_cache_is_megamorphic_on_first_builtin() {
        let cache = InlineCache::new(0);
        assert!(!cache.admit(&A));
        assert!(cache.is_megamorphic());
    }

    #[test]
    #[should_panic(expected = "no call site")]
    fn kind_sites_reject_foreign_kinds() {
        let sites = KindSites::new([SlotKind::MpLength], |kind| kind);
        assert_eq!(*sites.get(SlotKind::MpLength), SlotKind::MpLength);
        sites.get(SlotKind::TpHash);
    }
}
