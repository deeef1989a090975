use super::{PyStrRef, PyTypeRef};
use crate::{
    Context, PyObjectRef, PyPayload, PyRef, PyResult, VirtualMachine,
    common::hash::{self, PyHash},
    function::{FuncArgs, PySetterValue},
    protocol::PyIterReturn,
    types::{BuiltinSlot, BuiltinSlotFunc, PyComparisonOp, PyTypeFlags, SlotKind, SlotValue},
};

/// Payload of plain instances. Their state lives in the instance dict.
#[derive(Debug)]
pub struct PyBaseObject;

impl PyPayload for PyBaseObject {
    fn class(ctx: &Context) -> &PyTypeRef {
        &ctx.types.object_type
    }
}

fn has_slot(cls: &PyTypeRef, kind: SlotKind, slot: &'static BuiltinSlot) -> bool {
    cls.slots().get(kind).is_some_and(|v| v.is_builtin(slot))
}

/// `object.__getattribute__`: data descriptors, then the instance dict, then other class
/// attributes.
pub fn generic_getattr(obj: &PyObjectRef, name: &str, vm: &VirtualMachine) -> PyResult {
    let cls = obj.class().clone();
    let descr = cls.lookup(name);
    if let Some(descr) = &descr
        && vm.is_data_descriptor(descr)
        && let Some(result) = vm.get_descriptor(descr, Some(obj.clone()), Some(cls.to_object()))
    {
        return result;
    }
    if let Some(value) = obj.get_dict_item(name) {
        return Ok(value);
    }
    if let Some(descr) = descr {
        return vm
            .get_descriptor(&descr, Some(obj.clone()), Some(cls.to_object()))
            .unwrap_or(Ok(descr));
    }
    Err(vm.new_no_attribute_error(obj, name))
}

/// `object.__setattr__` / `object.__delattr__`.
pub fn generic_setattr(
    obj: &PyObjectRef,
    name: &str,
    value: PySetterValue,
    vm: &VirtualMachine,
) -> PyResult<()> {
    if let Some(descr) = obj.class().lookup(name)
        && let Some(slot) = descr.class().slot(SlotKind::TpDescrSet)
    {
        return vm.call_descr_set(&slot, &descr, obj.clone(), value);
    }
    let Some(dict) = obj.dict() else {
        return Err(vm.new_no_attribute_error(obj, name));
    };
    match value {
        PySetterValue::Assign(value) => {
            dict.write().insert(name.to_owned(), value);
        }
        PySetterValue::Delete => {
            if dict.write().shift_remove(name).is_none() {
                return Err(vm.new_no_attribute_error(obj, name));
            }
        }
    }
    Ok(())
}

fn object_getattro(obj: &PyObjectRef, name: &PyStrRef, vm: &VirtualMachine) -> PyResult {
    generic_getattr(obj, name.as_str(), vm)
}

fn object_setattro(
    obj: &PyObjectRef,
    name: &PyStrRef,
    value: PySetterValue,
    vm: &VirtualMachine,
) -> PyResult<()> {
    generic_setattr(obj, name.as_str(), value, vm)
}

fn object_hash(obj: &PyObjectRef, _vm: &VirtualMachine) -> PyResult<PyHash> {
    Ok(hash::hash_pointer(obj.get_id()))
}

fn object_richcompare(
    a: &PyObjectRef,
    b: &PyObjectRef,
    op: PyComparisonOp,
    vm: &VirtualMachine,
) -> PyResult {
    match op {
        PyComparisonOp::Eq if a.is(b) => Ok(vm.ctx.new_bool(true)),
        PyComparisonOp::Ne => {
            // the inverse of whatever `==` of a's type says
            let Some(slot) = a.class().slot(SlotKind::TpRichcompare) else {
                return Ok(vm.ctx.not_implemented());
            };
            let eq = vm.call_richcompare_slot(&slot, a, b, PyComparisonOp::Eq)?;
            if vm.is_not_implemented(&eq) {
                Ok(eq)
            } else {
                Ok(vm.ctx.new_bool(!vm.is_true(&eq)?))
            }
        }
        _ => Ok(vm.ctx.not_implemented()),
    }
}

fn object_repr(obj: &PyObjectRef, vm: &VirtualMachine) -> PyResult {
    Ok(vm
        .ctx
        .new_str(format!("<{} object at {:#x}>", obj.class().name(), obj.get_id()))
        .into())
}

fn object_str(obj: &PyObjectRef, vm: &VirtualMachine) -> PyResult {
    vm.repr(obj).map(Into::into)
}

fn object_init(obj: PyObjectRef, args: FuncArgs, vm: &VirtualMachine) -> PyResult<()> {
    if args.is_empty() {
        return Ok(());
    }
    let cls = obj.class();
    if !has_slot(cls, SlotKind::TpInit, &OBJECT_INIT) {
        return Err(vm.new_type_error(
            "object.__init__() takes exactly one argument (the instance to initialize)",
        ));
    }
    if has_slot(cls, SlotKind::TpNew, &OBJECT_NEW) {
        return Err(vm.new_type_error(format!("{}() takes no arguments", cls.name())));
    }
    Ok(())
}

fn object_new(cls: PyTypeRef, args: FuncArgs, vm: &VirtualMachine) -> PyResult {
    if !args.is_empty() {
        if !has_slot(&cls, SlotKind::TpNew, &OBJECT_NEW) {
            return Err(vm.new_type_error(
                "object.__new__() takes exactly one argument (the type to instantiate)",
            ));
        }
        if has_slot(&cls, SlotKind::TpInit, &OBJECT_INIT) {
            return Err(vm.new_type_error(format!("{}() takes no arguments", cls.name())));
        }
    }
    let dict = cls
        .flags
        .has_feature(PyTypeFlags::HAS_DICT)
        .then(Default::default);
    Ok(PyRef::new_ref(PyBaseObject, cls, dict).into())
}

fn hash_not_implemented(obj: &PyObjectRef, vm: &VirtualMachine) -> PyResult<PyHash> {
    Err(vm.new_type_error(format!("unhashable type: '{}'", obj.class().name())))
}

fn next_not_implemented(obj: &PyObjectRef, vm: &VirtualMachine) -> PyResult<PyIterReturn> {
    Err(vm.new_type_error(format!(
        "'{}' object is not an iterator",
        obj.class().name()
    )))
}

fn iter_not_implemented(obj: &PyObjectRef, vm: &VirtualMachine) -> PyResult {
    Err(vm.new_type_error(format!(
        "'{}' object is not iterable",
        obj.class().name()
    )))
}

pub static OBJECT_GETATTRO: BuiltinSlot = BuiltinSlot::new(
    "object",
    SlotKind::TpGetattro,
    BuiltinSlotFunc::GetAttro(object_getattro),
);
pub static OBJECT_SETATTRO: BuiltinSlot = BuiltinSlot::new(
    "object",
    SlotKind::TpSetattro,
    BuiltinSlotFunc::SetAttro(object_setattro),
);
pub static OBJECT_HASH: BuiltinSlot =
    BuiltinSlot::new("object", SlotKind::TpHash, BuiltinSlotFunc::Hash(object_hash));
pub static OBJECT_RICHCOMPARE: BuiltinSlot = BuiltinSlot::new(
    "object",
    SlotKind::TpRichcompare,
    BuiltinSlotFunc::RichCompare(object_richcompare),
);
pub static OBJECT_REPR: BuiltinSlot =
    BuiltinSlot::new("object", SlotKind::TpRepr, BuiltinSlotFunc::Unary(object_repr));
pub static OBJECT_STR: BuiltinSlot =
    BuiltinSlot::new("object", SlotKind::TpStr, BuiltinSlotFunc::Unary(object_str));
pub static OBJECT_INIT: BuiltinSlot =
    BuiltinSlot::new("object", SlotKind::TpInit, BuiltinSlotFunc::Init(object_init));
pub static OBJECT_NEW: BuiltinSlot =
    BuiltinSlot::new("object", SlotKind::TpNew, BuiltinSlotFunc::New(object_new));

/// Installed by `__hash__ = None`.
pub static HASH_NOT_IMPLEMENTED: BuiltinSlot = BuiltinSlot::new(
    "object",
    SlotKind::TpHash,
    BuiltinSlotFunc::Hash(hash_not_implemented),
);
/// `tp_iternext` of classes without `__next__`.
pub static NEXT_NOT_IMPLEMENTED: BuiltinSlot = BuiltinSlot::new(
    "object",
    SlotKind::TpIternext,
    BuiltinSlotFunc::IterNext(next_not_implemented),
);
/// Installed by `__iter__ = None`.
pub static ITER_NOT_IMPLEMENTED: BuiltinSlot = BuiltinSlot::new(
    "object",
    SlotKind::TpIter,
    BuiltinSlotFunc::Unary(iter_not_implemented),
);

pub(crate) static OBJECT_SLOTS: [&BuiltinSlot; 8] = [
    &OBJECT_GETATTRO,
    &OBJECT_SETATTRO,
    &OBJECT_HASH,
    &OBJECT_RICHCOMPARE,
    &OBJECT_REPR,
    &OBJECT_STR,
    &OBJECT_INIT,
    &OBJECT_NEW,
];

pub(crate) static NOT_IMPLEMENTED_SLOTS: [&BuiltinSlot; 3] = [
    &HASH_NOT_IMPLEMENTED,
    &NEXT_NOT_IMPLEMENTED,
    &ITER_NOT_IMPLEMENTED,
];

pub(crate) fn is_hash_not_implemented(value: &SlotValue) -> bool {
    value.is_builtin(&HASH_NOT_IMPLEMENTED)
}
