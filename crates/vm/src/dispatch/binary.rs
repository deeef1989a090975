use super::{
    InlineCache, call_bound, call_builtin_boxed, invoke_native, missing_callable,
    native_object_result, primary_name, to_native, trace_dispatch, wrong_shape,
};
use crate::{
    PyObjectRef, PyResult, VirtualMachine,
    types::{BuiltinSlotFunc, PythonSlot, SlotKind, SlotValue},
};
use std::sync::Arc;

/// Non-reflected binary slots: `mp_subscript`, the in-place number slots and `sq_concat`.
pub struct CallSlotBinaryFunc {
    kind: SlotKind,
    cache: InlineCache,
}

impl CallSlotBinaryFunc {
    pub fn new(kind: SlotKind, cache_limit: usize) -> Self {
        Self {
            kind,
            cache: InlineCache::new(cache_limit),
        }
    }

    #[inline]
    pub fn cache(&self) -> &InlineCache {
        &self.cache
    }

    pub fn execute(
        &self,
        vm: &VirtualMachine,
        slot: &SlotValue,
        a: &PyObjectRef,
        b: &PyObjectRef,
    ) -> PyResult {
        trace_dispatch(vm, self.kind, slot);
        match slot {
            SlotValue::Builtin(builtin) if self.cache.admit(builtin) => match builtin.func() {
                BuiltinSlotFunc::Binary(f) => f(a, b, vm),
                // nb_inplace_power ignores the modulus
                BuiltinSlotFunc::Ternary(f) => f(a, b, &vm.ctx.none(), vm),
                _ => wrong_shape(builtin, self.kind),
            },
            SlotValue::Builtin(builtin) => {
                let mut args = vec![a.clone(), b.clone()];
                if matches!(builtin.func(), BuiltinSlotFunc::Ternary(_)) {
                    args.push(vm.ctx.none());
                }
                call_builtin_boxed(builtin, args.into(), vm)
            }
            SlotValue::Python(python) => {
                let Some(callable) = python.primary() else {
                    return Err(missing_callable(vm, a, primary_name(self.kind)));
                };
                call_bound(vm, &callable, a, &[b.clone()])
            }
            SlotValue::Native(native) => {
                let mut args = vec![to_native(vm, a), to_native(vm, b)];
                if self.kind == SlotKind::NbInplacePower {
                    args.push(to_native(vm, &vm.ctx.none()));
                }
                let result = invoke_native(vm, self.kind, native, &args);
                native_object_result(vm, self.kind, result)
            }
        }
    }
}

/// Reflected binary number slots, called as `slot(a, b)` from either operand's type.
pub struct CallSlotBinaryOp {
    kind: SlotKind,
    cache: InlineCache,
}

impl CallSlotBinaryOp {
    pub fn new(kind: SlotKind, cache_limit: usize) -> Self {
        debug_assert!(kind.reflected_names().is_some());
        Self {
            kind,
            cache: InlineCache::new(cache_limit),
        }
    }

    #[inline]
    pub fn kind(&self) -> SlotKind {
        self.kind
    }

    #[inline]
    pub fn cache(&self) -> &InlineCache {
        &self.cache
    }

    /// `same_types` tells whether `a` and `b` have the same type, which a user-defined slot
    /// needs to decide whether the reflected method may run.
    pub fn execute(
        &self,
        vm: &VirtualMachine,
        slot: &SlotValue,
        a: &PyObjectRef,
        b: &PyObjectRef,
        same_types: bool,
    ) -> PyResult {
        trace_dispatch(vm, self.kind, slot);
        match slot {
            SlotValue::Builtin(builtin) if self.cache.admit(builtin) => match builtin.func() {
                BuiltinSlotFunc::Binary(f) => f(a, b, vm),
                _ => wrong_shape(builtin, self.kind),
            },
            SlotValue::Builtin(builtin) => {
                call_builtin_boxed(builtin, vec![a.clone(), b.clone()].into(), vm)
            }
            SlotValue::Python(_) => call_python_binary(vm, self.kind, a, b, same_types),
            SlotValue::Native(native) => {
                let args = [to_native(vm, a), to_native(vm, b)];
                let result = invoke_native(vm, self.kind, native, &args);
                native_object_result(vm, self.kind, result)
            }
        }
    }
}

fn python_slot_of(obj: &PyObjectRef, kind: SlotKind) -> Option<Arc<PythonSlot>> {
    obj.class().slots().get(kind)?.as_python().cloned()
}

/// Whether the reflected method of `other` overrides the one of `zelf`'s type.
fn method_is_overloaded(zelf: &PythonSlot, other: &PythonSlot) -> bool {
    match (zelf.right(), other.right()) {
        (_, None) => false,
        (None, Some(_)) => true,
        (Some(left), Some(right)) => !left.is(&right),
    }
}

fn call_reflected(
    vm: &VirtualMachine,
    other_slot: &PythonSlot,
    b: &PyObjectRef,
    a: &PyObjectRef,
) -> PyResult {
    match other_slot.right() {
        Some(rop) => call_bound(vm, &rop, b, &[a.clone()]),
        None => Ok(vm.ctx.not_implemented()),
    }
}

/// `a.__op__(b)` and `b.__rop__(a)` in the order a user-defined binary slot tries them.
pub(crate) fn call_python_binary(
    vm: &VirtualMachine,
    kind: SlotKind,
    a: &PyObjectRef,
    b: &PyObjectRef,
    same_types: bool,
) -> PyResult {
    let self_slot = python_slot_of(a, kind);
    let other_slot = if same_types {
        None
    } else {
        python_slot_of(b, kind)
    };
    let mut do_other = other_slot.is_some();

    if let Some(self_slot) = &self_slot {
        if let Some(other_slot) = &other_slot
            && b.class().fast_issubclass(a.class())
            && method_is_overloaded(self_slot, other_slot)
        {
            let result = call_reflected(vm, other_slot, b, a)?;
            if !vm.is_not_implemented(&result) {
                return Ok(result);
            }
            do_other = false;
        }
        if let Some(op) = self_slot.left() {
            let result = call_bound(vm, &op, a, &[b.clone()])?;
            if !vm.is_not_implemented(&result) || same_types {
                return Ok(result);
            }
        }
    }
    match &other_slot {
        Some(other_slot) if do_other => call_reflected(vm, other_slot, b, a),
        _ => Ok(vm.ctx.not_implemented()),
    }
}
