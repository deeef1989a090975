use super::{PyInt, PyTypeRef};
use crate::{
    Context, PyObjectRef, PyPayload, PyRef, PyResult, VirtualMachine,
    common::{hash::PyHash, lock::PyMutex},
    protocol::PyIterReturn,
    types::{BuiltinSlot, BuiltinSlotFunc, PyComparisonOp, SlotKind},
};
use core::fmt;

pub struct PyTuple {
    elements: Box<[PyObjectRef]>,
}

pub type PyTupleRef = PyRef<PyTuple>;

impl fmt::Debug for PyTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("tuple")
    }
}

impl From<Vec<PyObjectRef>> for PyTuple {
    fn from(elements: Vec<PyObjectRef>) -> Self {
        Self {
            elements: elements.into_boxed_slice(),
        }
    }
}

impl PyPayload for PyTuple {
    #[inline]
    fn class(ctx: &Context) -> &PyTypeRef {
        &ctx.types.tuple_type
    }
}

impl PyTuple {
    #[inline]
    pub fn as_slice(&self) -> &[PyObjectRef] {
        &self.elements
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

fn downcast_tuple<'a>(
    obj: &'a PyObjectRef,
    op: &str,
    vm: &VirtualMachine,
) -> PyResult<&'a PyTuple> {
    obj.payload::<PyTuple>().ok_or_else(|| {
        vm.new_type_error(format!(
            "descriptor '{op}' requires a 'tuple' object but received a '{}'",
            obj.class().name()
        ))
    })
}

fn tuple_len(zelf: &PyObjectRef, vm: &VirtualMachine) -> PyResult<usize> {
    downcast_tuple(zelf, "__len__", vm).map(PyTuple::len)
}

fn tuple_item(zelf: &PyObjectRef, index: isize, vm: &VirtualMachine) -> PyResult {
    let tuple = downcast_tuple(zelf, "__getitem__", vm)?;
    let len = tuple.len() as isize;
    let i = if index < 0 { index + len } else { index };
    usize::try_from(i)
        .ok()
        .and_then(|i| tuple.as_slice().get(i))
        .cloned()
        .ok_or_else(|| vm.new_index_error("tuple index out of range"))
}

fn tuple_subscript(zelf: &PyObjectRef, key: &PyObjectRef, vm: &VirtualMachine) -> PyResult {
    if key.payload::<PyInt>().is_none() {
        return Err(vm.new_type_error(format!(
            "tuple indices must be integers, not {}",
            key.class().name()
        )));
    }
    tuple_item(zelf, vm.to_isize(key)?, vm)
}

fn tuple_concat(a: &PyObjectRef, b: &PyObjectRef, vm: &VirtualMachine) -> PyResult {
    let a = downcast_tuple(a, "__add__", vm)?;
    let Some(b) = b.payload::<PyTuple>() else {
        return Err(vm.new_type_error(format!(
            "can only concatenate tuple (not \"{}\") to tuple",
            b.class().name()
        )));
    };
    let elements = a.as_slice().iter().chain(b.as_slice()).cloned().collect();
    Ok(vm.ctx.new_tuple(elements).into())
}

fn tuple_contains(zelf: &PyObjectRef, needle: &PyObjectRef, vm: &VirtualMachine) -> PyResult<bool> {
    let tuple = downcast_tuple(zelf, "__contains__", vm)?;
    for element in tuple.as_slice() {
        if element.is(needle) || vm.eq(element, needle)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn tuple_hash(zelf: &PyObjectRef, vm: &VirtualMachine) -> PyResult<PyHash> {
    let tuple = downcast_tuple(zelf, "__hash__", vm)?;
    // xxHash-style lane mixing over the element hashes
    const PRIME_1: u64 = 11400714785074694791;
    const PRIME_2: u64 = 14029467366897019727;
    const PRIME_5: u64 = 2870177450012600261;
    let mut acc = PRIME_5;
    for element in tuple.as_slice() {
        let lane = vm.hash(element)? as u64;
        acc = acc.wrapping_add(lane.wrapping_mul(PRIME_2));
        acc = acc.rotate_left(31);
        acc = acc.wrapping_mul(PRIME_1);
    }
    acc = acc.wrapping_add(tuple.len() as u64 ^ (PRIME_5 ^ 3527539));
    let hash = acc as PyHash;
    Ok(if hash == -1 { 1546275796 } else { hash })
}

fn tuple_richcompare(
    a: &PyObjectRef,
    b: &PyObjectRef,
    op: PyComparisonOp,
    vm: &VirtualMachine,
) -> PyResult {
    let (Some(a), Some(b)) = (a.payload::<PyTuple>(), b.payload::<PyTuple>()) else {
        return Ok(vm.ctx.not_implemented());
    };
    if !matches!(op, PyComparisonOp::Eq | PyComparisonOp::Ne) {
        return Ok(vm.ctx.not_implemented());
    }
    let mut equal = a.len() == b.len();
    if equal {
        for (x, y) in a.as_slice().iter().zip(b.as_slice()) {
            if !(x.is(y) || vm.eq(x, y)?) {
                equal = false;
                break;
            }
        }
    }
    Ok(vm.ctx.new_bool(equal == (op == PyComparisonOp::Eq)))
}

fn tuple_repr(zelf: &PyObjectRef, vm: &VirtualMachine) -> PyResult {
    let tuple = downcast_tuple(zelf, "__repr__", vm)?;
    let mut parts = Vec::with_capacity(tuple.len());
    for element in tuple.as_slice() {
        parts.push(vm.repr(element)?.as_str().to_owned());
    }
    let body = parts.join(", ");
    let repr = if tuple.len() == 1 {
        format!("({body},)")
    } else {
        format!("({body})")
    };
    Ok(vm.ctx.new_str(repr).into())
}

fn tuple_iter(zelf: &PyObjectRef, vm: &VirtualMachine) -> PyResult {
    let tuple = zelf
        .clone()
        .downcast::<PyTuple>()
        .map_err(|_| vm.new_type_error("descriptor '__iter__' requires a 'tuple' object"))?;
    Ok(PyTupleIterator {
        status: PyMutex::new(Some((tuple, 0))),
    }
    .into_pyobject(&vm.ctx))
}

/// Iterator over a tuple. The tuple is released once exhausted.
#[derive(Debug)]
pub struct PyTupleIterator {
    status: PyMutex<Option<(PyTupleRef, usize)>>,
}

impl PyPayload for PyTupleIterator {
    #[inline]
    fn class(ctx: &Context) -> &PyTypeRef {
        &ctx.types.tuple_iterator_type
    }
}

fn tuple_iterator_iter(zelf: &PyObjectRef, _vm: &VirtualMachine) -> PyResult {
    Ok(zelf.clone())
}

fn tuple_iterator_next(zelf: &PyObjectRef, vm: &VirtualMachine) -> PyResult<PyIterReturn> {
    let Some(iter) = zelf.payload::<PyTupleIterator>() else {
        return Err(vm.new_type_error("descriptor '__next__' requires a 'tuple_iterator' object"));
    };
    let mut status = iter.status.lock();
    let Some((tuple, position)) = status.as_mut() else {
        return Ok(PyIterReturn::StopIteration(None));
    };
    match tuple.as_slice().get(*position).cloned() {
        Some(item) => {
            *position += 1;
            Ok(PyIterReturn::Return(item))
        }
        None => {
            *status = None;
            Ok(PyIterReturn::StopIteration(None))
        }
    }
}

pub static TUPLE_SQ_LENGTH: BuiltinSlot =
    BuiltinSlot::new("tuple", SlotKind::SqLength, BuiltinSlotFunc::Len(tuple_len));
pub static TUPLE_MP_LENGTH: BuiltinSlot =
    BuiltinSlot::new("tuple", SlotKind::MpLength, BuiltinSlotFunc::Len(tuple_len));
pub static TUPLE_ITEM: BuiltinSlot =
    BuiltinSlot::new("tuple", SlotKind::SqItem, BuiltinSlotFunc::SqItem(tuple_item));
pub static TUPLE_SUBSCRIPT: BuiltinSlot = BuiltinSlot::new(
    "tuple",
    SlotKind::MpSubscript,
    BuiltinSlotFunc::Binary(tuple_subscript),
);
pub static TUPLE_CONCAT: BuiltinSlot = BuiltinSlot::new(
    "tuple",
    SlotKind::SqConcat,
    BuiltinSlotFunc::Binary(tuple_concat),
);
pub static TUPLE_CONTAINS: BuiltinSlot = BuiltinSlot::new(
    "tuple",
    SlotKind::SqContains,
    BuiltinSlotFunc::Contains(tuple_contains),
);
pub static TUPLE_HASH: BuiltinSlot =
    BuiltinSlot::new("tuple", SlotKind::TpHash, BuiltinSlotFunc::Hash(tuple_hash));
pub static TUPLE_RICHCOMPARE: BuiltinSlot = BuiltinSlot::new(
    "tuple",
    SlotKind::TpRichcompare,
    BuiltinSlotFunc::RichCompare(tuple_richcompare),
);
pub static TUPLE_REPR: BuiltinSlot =
    BuiltinSlot::new("tuple", SlotKind::TpRepr, BuiltinSlotFunc::Unary(tuple_repr));
pub static TUPLE_ITER: BuiltinSlot =
    BuiltinSlot::new("tuple", SlotKind::TpIter, BuiltinSlotFunc::Unary(tuple_iter));

pub static TUPLE_ITERATOR_ITER: BuiltinSlot = BuiltinSlot::new(
    "tuple_iterator",
    SlotKind::TpIter,
    BuiltinSlotFunc::Unary(tuple_iterator_iter),
);
pub static TUPLE_ITERATOR_NEXT: BuiltinSlot = BuiltinSlot::new(
    "tuple_iterator",
    SlotKind::TpIternext,
    BuiltinSlotFunc::IterNext(tuple_iterator_next),
);

pub(crate) static TUPLE_SLOTS: [&BuiltinSlot; 10] = [
    &TUPLE_SQ_LENGTH,
    &TUPLE_MP_LENGTH,
    &TUPLE_ITEM,
    &TUPLE_SUBSCRIPT,
    &TUPLE_CONCAT,
    &TUPLE_CONTAINS,
    &TUPLE_HASH,
    &TUPLE_RICHCOMPARE,
    &TUPLE_REPR,
    &TUPLE_ITER,
];

pub(crate) static TUPLE_ITERATOR_SLOTS: [&BuiltinSlot; 2] =
    [&TUPLE_ITERATOR_ITER, &TUPLE_ITERATOR_NEXT];
