use super::{
    InlineCache, call_bound, call_builtin_boxed, invoke_native, missing_callable,
    native_iternext_result, to_native, trace_dispatch, wrong_shape,
};
use crate::{
    PyObjectRef, PyResult, VirtualMachine,
    protocol::PyIterReturn,
    types::{BuiltinSlotFunc, SlotKind, SlotValue},
};

/// `tp_iternext`. Exhaustion comes back as [`PyIterReturn::StopIteration`], never as an
/// exception, whichever kind of slot produced it.
pub struct CallSlotTpIterNext {
    cache: InlineCache,
}

impl CallSlotTpIterNext {
    const KIND: SlotKind = SlotKind::TpIternext;

    pub fn new(cache_limit: usize) -> Self {
        Self {
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
        iter: &PyObjectRef,
    ) -> PyResult<PyIterReturn> {
        trace_dispatch(vm, Self::KIND, slot);
        match slot {
            SlotValue::Builtin(builtin) if self.cache.admit(builtin) => match builtin.func() {
                BuiltinSlotFunc::IterNext(f) => f(iter, vm),
                _ => wrong_shape(builtin, Self::KIND),
            },
            SlotValue::Builtin(builtin) => {
                let result = call_builtin_boxed(builtin, vec![iter.clone()].into(), vm);
                PyIterReturn::from_pyresult(result, vm)
            }
            SlotValue::Python(python) => {
                let Some(next) = python.primary() else {
                    return Err(missing_callable(vm, iter, "__next__"));
                };
                PyIterReturn::from_pyresult(call_bound(vm, &next, iter, &[]), vm)
            }
            SlotValue::Native(native) => {
                let result = invoke_native(vm, Self::KIND, native, &[to_native(vm, iter)]);
                native_iternext_result(vm, result)
            }
        }
    }
}
