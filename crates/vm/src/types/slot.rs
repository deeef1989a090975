//! The slot value model: who implements an operation for a type.

use super::{
    registry::{CallTargetIndex, CallTargetRegistry},
    slot_defs::{PythonSlotShape, SlotKind},
};
use crate::{
    PyObjectRef, PyResult, PyWeak, VirtualMachine,
    builtins::{PyStrRef, PyTypeRef},
    common::hash::PyHash,
    function::{FuncArgs, PySetterValue},
    native::{NativeAbi, NativePtr},
    protocol::PyIterReturn,
};
use bitflags::bitflags;
use core::{cmp::Ordering, fmt, ptr};
use std::sync::{Arc, OnceLock};

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    #[non_exhaustive]
    pub struct PyTypeFlags: u64 {
        const IMMUTABLETYPE = 1 << 8;
        const HEAPTYPE = 1 << 9;
        const BASETYPE = 1 << 10;
        /// Type object allocated by a native extension.
        const NATIVE = 1 << 12;
        const HAS_DICT = 1 << 40;
    }
}

impl PyTypeFlags {
    pub const DEFAULT: Self = Self::empty();

    /// Used for types created by a class statement.
    pub fn heap_type_flags() -> Self {
        Self::HEAPTYPE | Self::BASETYPE | Self::HAS_DICT
    }

    pub fn has_feature(self, flag: Self) -> bool {
        self.contains(flag)
    }
}

pub type UnaryFunc = fn(&PyObjectRef, &VirtualMachine) -> PyResult;
pub type BinaryFunc = fn(&PyObjectRef, &PyObjectRef, &VirtualMachine) -> PyResult;
pub type TernaryFunc = fn(&PyObjectRef, &PyObjectRef, &PyObjectRef, &VirtualMachine) -> PyResult;
pub type LenFunc = fn(&PyObjectRef, &VirtualMachine) -> PyResult<usize>;
pub type HashFunc = fn(&PyObjectRef, &VirtualMachine) -> PyResult<PyHash>;
pub type InquiryFunc = fn(&PyObjectRef, &VirtualMachine) -> PyResult<bool>;
pub type RichCompareFunc =
    fn(&PyObjectRef, &PyObjectRef, PyComparisonOp, &VirtualMachine) -> PyResult;
pub type GetattroFunc = fn(&PyObjectRef, &PyStrRef, &VirtualMachine) -> PyResult;
pub type SetattroFunc = fn(&PyObjectRef, &PyStrRef, PySetterValue, &VirtualMachine) -> PyResult<()>;
pub type IterNextFunc = fn(&PyObjectRef, &VirtualMachine) -> PyResult<PyIterReturn>;
pub type DescrGetFunc =
    fn(PyObjectRef, Option<PyObjectRef>, Option<PyObjectRef>, &VirtualMachine) -> PyResult;
pub type DescrSetFunc =
    fn(&PyObjectRef, PyObjectRef, PySetterValue, &VirtualMachine) -> PyResult<()>;
pub type SqItemFunc = fn(&PyObjectRef, isize, &VirtualMachine) -> PyResult;
pub type SqAssItemFunc = fn(&PyObjectRef, isize, PySetterValue, &VirtualMachine) -> PyResult<()>;
pub type MpAssSubscriptFunc =
    fn(&PyObjectRef, &PyObjectRef, PySetterValue, &VirtualMachine) -> PyResult<()>;
pub type ContainsFunc = fn(&PyObjectRef, &PyObjectRef, &VirtualMachine) -> PyResult<bool>;
pub type InitFunc = fn(PyObjectRef, FuncArgs, &VirtualMachine) -> PyResult<()>;
pub type NewFunc = fn(PyTypeRef, FuncArgs, &VirtualMachine) -> PyResult;
pub type CallFunc = fn(&PyObjectRef, FuncArgs, &VirtualMachine) -> PyResult;

/// A compiled-in slot function, tagged by calling shape.
#[derive(Clone, Copy)]
pub enum BuiltinSlotFunc {
    Unary(UnaryFunc),
    Binary(BinaryFunc),
    Ternary(TernaryFunc),
    Len(LenFunc),
    Hash(HashFunc),
    Inquiry(InquiryFunc),
    RichCompare(RichCompareFunc),
    GetAttro(GetattroFunc),
    SetAttro(SetattroFunc),
    IterNext(IterNextFunc),
    DescrGet(DescrGetFunc),
    DescrSet(DescrSetFunc),
    SqItem(SqItemFunc),
    SqAssItem(SqAssItemFunc),
    MpAssSubscript(MpAssSubscriptFunc),
    Contains(ContainsFunc),
    Init(InitFunc),
    New(NewFunc),
    Call(CallFunc),
}

impl BuiltinSlotFunc {
    pub fn shape_name(&self) -> &'static str {
        match self {
            Self::Unary(_) => "unary",
            Self::Binary(_) => "binary",
            Self::Ternary(_) => "ternary",
            Self::Len(_) => "len",
            Self::Hash(_) => "hash",
            Self::Inquiry(_) => "inquiry",
            Self::RichCompare(_) => "richcompare",
            Self::GetAttro(_) => "getattro",
            Self::SetAttro(_) => "setattro",
            Self::IterNext(_) => "iternext",
            Self::DescrGet(_) => "descr_get",
            Self::DescrSet(_) => "descr_set",
            Self::SqItem(_) => "sq_item",
            Self::SqAssItem(_) => "sq_ass_item",
            Self::MpAssSubscript(_) => "mp_ass_subscript",
            Self::Contains(_) => "contains",
            Self::Init(_) => "init",
            Self::New(_) => "new",
            Self::Call(_) => "call",
        }
    }

    /// Whether this calling shape can sit in a slot of `kind`.
    pub fn fits(&self, kind: SlotKind) -> bool {
        use SlotKind::*;
        match self {
            Self::Unary(_) => matches!(
                kind,
                TpIter
                    | TpRepr
                    | TpStr
                    | NbNegative
                    | NbPositive
                    | NbAbsolute
                    | NbInvert
                    | NbIndex
                    | NbInt
                    | NbFloat
                    | AmAwait
                    | AmAiter
                    | AmAnext
            ),
            Self::Binary(_) => {
                kind.reflected_names().is_some() && kind != NbPower
                    || kind.inplace_counterpart().is_some() && kind != NbInplacePower
                    || matches!(kind, MpSubscript | SqConcat | SqInplaceConcat)
            }
            Self::Ternary(_) => matches!(kind, NbPower | NbInplacePower),
            Self::Len(_) => matches!(kind, MpLength | SqLength),
            Self::Hash(_) => kind == TpHash,
            Self::Inquiry(_) => kind == NbBool,
            Self::RichCompare(_) => kind == TpRichcompare,
            Self::GetAttro(_) => matches!(kind, TpGetattro | TpGetattr),
            Self::SetAttro(_) => matches!(kind, TpSetattro | TpSetattr),
            Self::IterNext(_) => kind == TpIternext,
            Self::DescrGet(_) => kind == TpDescrGet,
            Self::DescrSet(_) => kind == TpDescrSet,
            Self::SqItem(_) => matches!(kind, SqItem | SqRepeat | SqInplaceRepeat),
            Self::SqAssItem(_) => kind == SqAssItem,
            Self::MpAssSubscript(_) => kind == MpAssSubscript,
            Self::Contains(_) => kind == SqContains,
            Self::Init(_) => kind == TpInit,
            Self::New(_) => kind == TpNew,
            Self::Call(_) => kind == TpCall,
        }
    }
}

impl BuiltinSlotFunc {
    /// Call with boxed arguments, the receiver first.
    ///
    /// Setter shapes take one argument less for deletion. `RichCompare` takes the operator as
    /// its [`PyComparisonOp::index`]; `New` takes the class first. Unboxed results are boxed:
    /// lengths and hashes as `int`, inquiries as `bool`, and an exhausted iterator raises
    /// `StopIteration`.
    pub fn call_boxed(&self, args: FuncArgs, vm: &VirtualMachine) -> PyResult {
        let name = self.shape_name();
        match *self {
            Self::Unary(f) => {
                let [a] = args.positional::<1>(name, vm)?;
                f(a, vm)
            }
            Self::Binary(f) => {
                let [a, b] = args.positional::<2>(name, vm)?;
                f(a, b, vm)
            }
            Self::Ternary(f) => {
                let [a, b, c] = args.positional::<3>(name, vm)?;
                f(a, b, c, vm)
            }
            Self::Len(f) => {
                let [a] = args.positional::<1>(name, vm)?;
                f(a, vm).map(|len| vm.ctx.new_int(len).into())
            }
            Self::Hash(f) => {
                let [a] = args.positional::<1>(name, vm)?;
                f(a, vm).map(|hash| vm.ctx.new_int(hash).into())
            }
            Self::Inquiry(f) => {
                let [a] = args.positional::<1>(name, vm)?;
                f(a, vm).map(|b| vm.ctx.new_bool(b))
            }
            Self::RichCompare(f) => {
                let [a, b, op] = args.positional::<3>(name, vm)?;
                let op = vm
                    .to_isize(op)
                    .ok()
                    .and_then(|i| usize::try_from(i).ok())
                    .and_then(PyComparisonOp::from_index)
                    .ok_or_else(|| vm.new_value_error("invalid comparison operator"))?;
                f(a, b, op, vm)
            }
            Self::GetAttro(f) => {
                let [obj, attr] = args.positional::<2>(name, vm)?;
                let attr = vm.attribute_name(attr)?;
                f(obj, &attr, vm)
            }
            Self::SetAttro(f) => {
                let (obj, attr, value) = setter_args(&args, name, vm)?;
                let attr = vm.attribute_name(attr)?;
                f(obj, &attr, value, vm).map(|()| vm.ctx.none())
            }
            Self::IterNext(f) => {
                let [a] = args.positional::<1>(name, vm)?;
                f(a, vm)?.into_result(vm)
            }
            Self::DescrGet(f) => {
                let (descr, obj, cls) = match args.args.as_slice() {
                    [descr, obj] => (descr, obj, None),
                    [descr, obj, cls] => (descr, obj, vm.none_to_option(cls)),
                    _ => {
                        return Err(vm.new_type_error(format!(
                            "{name} expected 2 or 3 arguments, got {}",
                            args.args.len()
                        )));
                    }
                };
                f(descr.clone(), vm.none_to_option(obj), cls, vm)
            }
            Self::DescrSet(f) => {
                let (descr, obj, value) = setter_args(&args, name, vm)?;
                f(descr, obj.clone(), value, vm).map(|()| vm.ctx.none())
            }
            Self::SqItem(f) => {
                let [seq, index] = args.positional::<2>(name, vm)?;
                let index = vm.to_isize(index)?;
                f(seq, index, vm)
            }
            Self::SqAssItem(f) => {
                let (seq, index, value) = setter_args(&args, name, vm)?;
                let index = vm.to_isize(index)?;
                f(seq, index, value, vm).map(|()| vm.ctx.none())
            }
            Self::MpAssSubscript(f) => {
                let (obj, key, value) = setter_args(&args, name, vm)?;
                f(obj, key, value, vm).map(|()| vm.ctx.none())
            }
            Self::Contains(f) => {
                let [container, item] = args.positional::<2>(name, vm)?;
                f(container, item, vm).map(|b| vm.ctx.new_bool(b))
            }
            Self::Init(f) => {
                let mut args = args;
                let zelf = take_receiver(&mut args, name, vm)?;
                f(zelf, args, vm).map(|()| vm.ctx.none())
            }
            Self::New(f) => {
                let mut args = args;
                let cls = take_receiver(&mut args, name, vm)?;
                let cls = cls.downcast::<crate::builtins::PyType>().map_err(|cls| {
                    vm.new_type_error(format!(
                        "{name}(X): X is not a type object ({})",
                        cls.class().name()
                    ))
                })?;
                f(cls, args, vm)
            }
            Self::Call(f) => {
                let mut args = args;
                let zelf = take_receiver(&mut args, name, vm)?;
                f(&zelf, args, vm)
            }
        }
    }
}

fn take_receiver(args: &mut FuncArgs, name: &str, vm: &VirtualMachine) -> PyResult<PyObjectRef> {
    args.take_positional()
        .ok_or_else(|| vm.new_type_error(format!("{name} needs an argument")))
}

/// `(receiver, key)` means delete, `(receiver, key, value)` means assign.
fn setter_args<'a>(
    args: &'a FuncArgs,
    name: &str,
    vm: &VirtualMachine,
) -> PyResult<(&'a PyObjectRef, &'a PyObjectRef, PySetterValue)> {
    if let Some(err) = args.check_kwargs_empty(vm) {
        return Err(err);
    }
    match args.args.as_slice() {
        [obj, key] => Ok((obj, key, PySetterValue::Delete)),
        [obj, key, value] => Ok((obj, key, PySetterValue::Assign(value.clone()))),
        other => Err(vm.new_type_error(format!(
            "{name} expected 2 or 3 arguments, got {}",
            other.len()
        ))),
    }
}

/// A process-wide builtin slot implementation. Always used through a `&'static` reference, so
/// identity is address identity.
pub struct BuiltinSlot {
    owner: &'static str,
    kind: SlotKind,
    func: BuiltinSlotFunc,
    call_target: OnceLock<CallTargetIndex>,
    native_wrapper: OnceLock<NativePtr>,
}

impl BuiltinSlot {
    pub const fn new(owner: &'static str, kind: SlotKind, func: BuiltinSlotFunc) -> Self {
        Self {
            owner,
            kind,
            func,
            call_target: OnceLock::new(),
            native_wrapper: OnceLock::new(),
        }
    }

    #[inline]
    pub fn kind(&self) -> SlotKind {
        self.kind
    }

    #[inline]
    pub fn func(&self) -> BuiltinSlotFunc {
        self.func
    }

    /// Name of the builtin type that defines this slot.
    #[inline]
    pub fn owner(&self) -> &'static str {
        self.owner
    }

    /// Assign the call-target index. Only done during startup registration.
    pub(crate) fn register(&'static self, registry: &CallTargetRegistry) -> CallTargetIndex {
        *self.call_target.get_or_init(|| registry.allocate(self))
    }

    pub fn call_target(&self) -> Option<CallTargetIndex> {
        self.call_target.get().copied()
    }
}

impl fmt::Debug for BuiltinSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<builtin {} slot of '{}' ({})>",
            self.kind.name(),
            self.owner,
            self.func.shape_name()
        )
    }
}

/// User-defined slot: the magic methods found along the MRO, held weakly, in
/// [`SlotKind::magic_names`] order.
pub struct PythonSlot {
    kind: SlotKind,
    callables: Box<[Option<PyWeak>]>,
    owner: PyWeak,
    native_wrapper: OnceLock<NativePtr>,
}

impl PythonSlot {
    pub fn new(kind: SlotKind, callables: &[Option<PyObjectRef>], owner: &PyTypeRef) -> Self {
        debug_assert_eq!(callables.len(), kind.magic_names().count());
        Self {
            kind,
            callables: callables
                .iter()
                .map(|c| c.as_ref().map(|c| c.downgrade()))
                .collect(),
            owner: owner.downgrade(),
            native_wrapper: OnceLock::new(),
        }
    }

    #[inline]
    pub fn kind(&self) -> SlotKind {
        self.kind
    }

    #[inline]
    pub fn shape(&self) -> PythonSlotShape {
        self.kind.python_shape()
    }

    /// The `i`th callable. A collected callable while the slot is in use is a broken
    /// ownership invariant, not an absent method.
    pub fn callable(&self, i: usize) -> Option<PyObjectRef> {
        let weak = self.callables.get(i)?.as_ref()?;
        match weak.upgrade() {
            Some(obj) => Some(obj),
            None => panic!(
                "callable #{i} of {} slot was collected while the slot is reachable",
                self.kind.name()
            ),
        }
    }

    /// `__op__` of a reversible slot, `__getattribute__`, `__setattr__`, `__set__`,
    /// `__setitem__`, or the only callable of a single slot.
    #[inline]
    pub fn primary(&self) -> Option<PyObjectRef> {
        self.callable(0)
    }

    /// `__rop__`, `__getattr__`, `__delattr__`, `__delete__` or `__delitem__`.
    #[inline]
    pub fn secondary(&self) -> Option<PyObjectRef> {
        self.callable(1)
    }

    pub fn left(&self) -> Option<PyObjectRef> {
        debug_assert_eq!(self.shape(), PythonSlotShape::Reversible);
        self.primary()
    }

    pub fn right(&self) -> Option<PyObjectRef> {
        debug_assert_eq!(self.shape(), PythonSlotShape::Reversible);
        self.secondary()
    }

    pub fn comparison(&self, op: PyComparisonOp) -> Option<PyObjectRef> {
        debug_assert_eq!(self.shape(), PythonSlotShape::RichCmp);
        self.callable(op.index())
    }

    pub fn owner(&self) -> PyTypeRef {
        let owner = self
            .owner
            .upgrade()
            .and_then(|obj| obj.downcast::<crate::builtins::PyType>().ok());
        match owner {
            Some(owner) => owner,
            None => panic!("owner type of a live {} slot was collected", self.kind.name()),
        }
    }

    /// Re-resolve every name along `klass`'s MRO. Returns `self` when nothing changed.
    pub fn for_new_type(self: &Arc<Self>, klass: &PyTypeRef) -> Arc<Self> {
        let found: Vec<Option<PyObjectRef>> =
            self.kind.magic_names().map(|name| klass.lookup(name)).collect();
        self.with_callables(&found, klass)
    }

    /// `self` if it already holds exactly `found`, else a new slot for `klass`.
    pub fn with_callables(
        self: &Arc<Self>,
        found: &[Option<PyObjectRef>],
        klass: &PyTypeRef,
    ) -> Arc<Self> {
        let unchanged = found.len() == self.callables.len()
            && found
                .iter()
                .zip(self.callables.iter())
                .all(|(new, old)| match (new, old) {
                    (None, None) => true,
                    (Some(new), Some(old)) => old.refers_to(new),
                    _ => false,
                });
        if unchanged {
            self.clone()
        } else {
            Arc::new(Self::new(self.kind, found, klass))
        }
    }

    pub(crate) fn holds(&self, i: usize, obj: &PyObjectRef) -> bool {
        matches!(self.callables.get(i), Some(Some(weak)) if weak.refers_to(obj))
    }
}

impl fmt::Debug for PythonSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self
            .kind
            .magic_names()
            .zip(self.callables.iter())
            .filter(|(_, c)| c.is_some())
            .map(|(name, _)| name)
            .collect();
        write!(f, "<python {} slot {:?}>", self.kind.name(), names)
    }
}

/// Slot implemented by a native extension function.
pub struct NativeSlot {
    callable: NativePtr,
    abi: NativeAbi,
}

impl NativeSlot {
    pub fn new(callable: NativePtr, abi: NativeAbi) -> Self {
        Self { callable, abi }
    }

    #[inline]
    pub fn callable(&self) -> NativePtr {
        self.callable
    }

    #[inline]
    pub fn abi(&self) -> NativeAbi {
        self.abi
    }

    pub fn is_same_callable(&self, other: &Self) -> bool {
        self.callable == other.callable && self.abi == other.abi
    }
}

impl fmt::Debug for NativeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native {:?} slot {:?}>", self.abi, self.callable)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotCategory {
    Builtin,
    Python,
    Native,
}

/// The implementation installed in one slot of a [`super::SlotTable`].
#[derive(Clone)]
pub enum SlotValue {
    Builtin(&'static BuiltinSlot),
    Python(Arc<PythonSlot>),
    Native(Arc<NativeSlot>),
}

impl SlotValue {
    pub fn native(callable: NativePtr, abi: NativeAbi) -> Self {
        Self::Native(Arc::new(NativeSlot::new(callable, abi)))
    }

    pub fn category(&self) -> SlotCategory {
        match self {
            Self::Builtin(_) => SlotCategory::Builtin,
            Self::Python(_) => SlotCategory::Python,
            Self::Native(_) => SlotCategory::Native,
        }
    }

    /// Same implementation. Native values also match when they wrap the same function.
    pub fn is(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Builtin(a), Self::Builtin(b)) => ptr::eq(*a, *b),
            (Self::Python(a), Self::Python(b)) => Arc::ptr_eq(a, b),
            (Self::Native(a), Self::Native(b)) => Arc::ptr_eq(a, b) || a.is_same_callable(b),
            _ => false,
        }
    }

    pub fn is_builtin(&self, slot: &'static BuiltinSlot) -> bool {
        matches!(self, Self::Builtin(b) if ptr::eq(*b, slot))
    }

    pub fn as_python(&self) -> Option<&Arc<PythonSlot>> {
        match self {
            Self::Python(p) => Some(p),
            _ => None,
        }
    }

    pub fn for_new_type(&self, klass: &PyTypeRef) -> Self {
        match self {
            Self::Python(p) => Self::Python(p.for_new_type(klass)),
            other => other.clone(),
        }
    }

    /// Native function pointer for this slot, creating and caching a wrapper for managed
    /// implementations on first use.
    pub fn to_native(&self, kind: SlotKind, vm: &VirtualMachine) -> NativePtr {
        let cell = match self {
            Self::Native(n) => return n.callable(),
            Self::Builtin(b) => &b.native_wrapper,
            Self::Python(p) => &p.native_wrapper,
        };
        *cell.get_or_init(|| {
            debug_assert!(
                vm.gil().owned_by_current_thread(),
                "native wrappers are created with the GIL held"
            );
            let ptr = vm.native_bridge().wrap_managed_slot(kind, self, vm);
            log::debug!("created native wrapper {ptr:?} for {self:?}");
            ptr
        })
    }
}

impl fmt::Debug for SlotValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Builtin(b) => b.fmt(f),
            Self::Python(p) => p.fmt(f),
            Self::Native(n) => n.fmt(f),
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum PyComparisonOp {
    // be intentional with bits so that we can do eval_ord with just a bitwise and
    // bits: | Equal | Greater | Less |
    Lt = 0b001,
    Gt = 0b010,
    Ne = 0b011,
    Eq = 0b100,
    Le = 0b101,
    Ge = 0b110,
}

use PyComparisonOp::*;

impl PyComparisonOp {
    /// Operator order of the `tp_richcompare` magic names.
    pub const ALL: [Self; 6] = [Lt, Le, Eq, Ne, Gt, Ge];

    pub fn index(self) -> usize {
        match self {
            Lt => 0,
            Le => 1,
            Eq => 2,
            Ne => 3,
            Gt => 4,
            Ge => 5,
        }
    }

    pub fn from_index(i: usize) -> Option<Self> {
        Self::ALL.get(i).copied()
    }

    pub fn eval_ord(self, ord: Ordering) -> bool {
        let bit = match ord {
            Ordering::Less => Lt,
            Ordering::Equal => Eq,
            Ordering::Greater => Gt,
        };
        self as u8 & bit as u8 != 0
    }

    pub fn swapped(self) -> Self {
        match self {
            Lt => Gt,
            Le => Ge,
            Eq => Eq,
            Ne => Ne,
            Ge => Le,
            Gt => Lt,
        }
    }

    pub fn method_name(self) -> &'static str {
        match self {
            Lt => "__lt__",
            Le => "__le__",
            Eq => "__eq__",
            Ne => "__ne__",
            Ge => "__ge__",
            Gt => "__gt__",
        }
    }

    pub fn operator_token(self) -> &'static str {
        match self {
            Lt => "<",
            Le => "<=",
            Eq => "==",
            Ne => "!=",
            Ge => ">=",
            Gt => ">",
        }
    }

    /// `Some(true)` for `==` and `Some(false)` for `!=` when `f()` holds.
    #[inline]
    pub fn map_eq(self, f: impl FnOnce() -> bool) -> Option<bool> {
        match self {
            Self::Eq => f().then_some(true),
            Self::Ne => f().then_some(false),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparison_ops_round_trip_through_index() {
        for op in PyComparisonOp::ALL {
            assert_eq!(PyComparisonOp::from_index(op.index()), Some(op));
            assert_eq!(op.swapped().swapped(), op);
        }
        assert_eq!(PyComparisonOp::from_index(6), None);
    }

    #[test]
    fn eval_ord_matches_operators() {
        assert!(Le.eval_ord(Ordering::Equal));
        assert!(Le.eval_ord(Ordering::Less));
        assert!(!Lt.eval_ord(Ordering::Equal));
        assert!(Ne.eval_ord(Ordering::Greater));
        assert!(!Ne.eval_ord(Ordering::Equal));
        assert_eq!(Eq.map_eq(|| true), Some(true));
        assert_eq!(Ne.map_eq(|| true), Some(false));
        assert_eq!(Lt.map_eq(|| true), None);
    }

    #[test]
    fn map_eq_consults_the_predicate_once() {
        let calls = core::cell::Cell::new(0);
        let answer_with = |answer: bool| {
            calls.set(calls.get() + 1);
            answer
        };
        assert_eq!(Eq.map_eq(|| answer_with(false)), None);
        assert_eq!(Ne.map_eq(|| answer_with(false)), None);
        assert_eq!(calls.get(), 2);
        assert_eq!(Gt.map_eq(|| answer_with(true)), None);
        assert_eq!(calls.get(), 2);
    }

    fn dummy_hash(_: &PyObjectRef, _: &VirtualMachine) -> PyResult<PyHash> {
        Ok(0)
    }

    static DUMMY: BuiltinSlot =
        BuiltinSlot::new("dummy", SlotKind::TpHash, BuiltinSlotFunc::Hash(dummy_hash));
    static OTHER: BuiltinSlot =
        BuiltinSlot::new("dummy", SlotKind::TpHash, BuiltinSlotFunc::Hash(dummy_hash));

    #[test]
    fn builtin_identity_is_address_identity() {
        let a = SlotValue::Builtin(&DUMMY);
        let b = SlotValue::Builtin(&DUMMY);
        assert!(a.is(&b));
        assert!(!a.is(&SlotValue::Builtin(&OTHER)));
        assert!(a.is_builtin(&DUMMY));
        assert_eq!(a.category(), SlotCategory::Builtin);
    }

    #[test]
    fn native_identity_falls_back_to_pointer() {
        let a = SlotValue::native(NativePtr::from_addr(0x1000), NativeAbi::CExt);
        let b = SlotValue::native(NativePtr::from_addr(0x1000), NativeAbi::CExt);
        let c = SlotValue::native(NativePtr::from_addr(0x1000), NativeAbi::HPy);
        assert!(a.is(&b));
        assert!(!a.is(&c));
    }

    #[test]
    fn builtin_shapes_fit_their_kinds() {
        assert!(BuiltinSlotFunc::Hash(dummy_hash).fits(SlotKind::TpHash));
        assert!(!BuiltinSlotFunc::Hash(dummy_hash).fits(SlotKind::MpLength));
    }
}
