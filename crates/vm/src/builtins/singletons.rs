use super::PyTypeRef;
use crate::{
    Context, PyObjectRef, PyPayload, PyResult, VirtualMachine,
    types::{BuiltinSlot, BuiltinSlotFunc, SlotKind},
};

#[derive(Debug)]
pub struct PyNone;

impl PyPayload for PyNone {
    #[inline]
    fn class(ctx: &Context) -> &PyTypeRef {
        &ctx.types.none_type
    }
}

fn none_repr(_zelf: &PyObjectRef, vm: &VirtualMachine) -> PyResult {
    Ok(vm.ctx.new_str("None").into())
}

fn none_bool(_zelf: &PyObjectRef, _vm: &VirtualMachine) -> PyResult<bool> {
    Ok(false)
}

#[derive(Debug)]
pub struct PyNotImplemented;

impl PyPayload for PyNotImplemented {
    #[inline]
    fn class(ctx: &Context) -> &PyTypeRef {
        &ctx.types.not_implemented_type
    }
}

fn not_implemented_repr(_zelf: &PyObjectRef, vm: &VirtualMachine) -> PyResult {
    Ok(vm.ctx.new_str("NotImplemented").into())
}

pub static NONE_REPR: BuiltinSlot =
    BuiltinSlot::new("NoneType", SlotKind::TpRepr, BuiltinSlotFunc::Unary(none_repr));
pub static NONE_BOOL: BuiltinSlot =
    BuiltinSlot::new("NoneType", SlotKind::NbBool, BuiltinSlotFunc::Inquiry(none_bool));
pub static NOT_IMPLEMENTED_REPR: BuiltinSlot = BuiltinSlot::new(
    "NotImplementedType",
    SlotKind::TpRepr,
    BuiltinSlotFunc::Unary(not_implemented_repr),
);

pub(crate) static NONE_SLOTS: [&BuiltinSlot; 2] = [&NONE_REPR, &NONE_BOOL];
pub(crate) static NOT_IMPLEMENTED_TYPE_SLOTS: [&BuiltinSlot; 1] = [&NOT_IMPLEMENTED_REPR];
