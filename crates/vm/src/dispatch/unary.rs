use super::{
    InlineCache, call_bound, call_builtin_boxed, invoke_native, missing_callable,
    native_object_result, primary_name, to_native, trace_dispatch, wrong_shape,
};
use crate::{
    PyObjectRef, PyResult, VirtualMachine,
    types::{BuiltinSlotFunc, SlotKind, SlotValue},
};

/// `repr`, `str`, `iter`, the unary number slots and the async slots.
pub struct CallSlotUnaryFunc {
    kind: SlotKind,
    cache: InlineCache,
}

impl CallSlotUnaryFunc {
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

    pub fn execute(&self, vm: &VirtualMachine, slot: &SlotValue, obj: &PyObjectRef) -> PyResult {
        trace_dispatch(vm, self.kind, slot);
        match slot {
            SlotValue::Builtin(builtin) if self.cache.admit(builtin) => match builtin.func() {
                BuiltinSlotFunc::Unary(f) => f(obj, vm),
                _ => wrong_shape(builtin, self.kind),
            },
            SlotValue::Builtin(builtin) => call_builtin_boxed(builtin, vec![obj.clone()].into(), vm),
            SlotValue::Python(python) => {
                let Some(callable) = python.primary() else {
                    return Err(missing_callable(vm, obj, primary_name(self.kind)));
                };
                call_bound(vm, &callable, obj, &[])
            }
            SlotValue::Native(native) => {
                let result = invoke_native(vm, self.kind, native, &[to_native(vm, obj)]);
                native_object_result(vm, self.kind, result)
            }
        }
    }
}
