use super::{
    InlineCache, call_bound, call_builtin_boxed, invoke_native, missing_callable,
    native_object_result, native_status_result, to_native, trace_dispatch, wrong_shape,
};
use crate::{
    PyObjectRef, PyResult, VirtualMachine,
    native::NativeWord,
    types::{BuiltinSlotFunc, PyComparisonOp, SlotKind, SlotValue},
};

/// `tp_richcompare`. A user-defined slot only calls the method of the requested operator.
pub struct CallSlotRichCompare {
    cache: InlineCache,
}

impl CallSlotRichCompare {
    const KIND: SlotKind = SlotKind::TpRichcompare;

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
        a: &PyObjectRef,
        b: &PyObjectRef,
        op: PyComparisonOp,
    ) -> PyResult {
        trace_dispatch(vm, Self::KIND, slot);
        match slot {
            SlotValue::Builtin(builtin) if self.cache.admit(builtin) => match builtin.func() {
                BuiltinSlotFunc::RichCompare(f) => f(a, b, op, vm),
                _ => wrong_shape(builtin, Self::KIND),
            },
            SlotValue::Builtin(builtin) => {
                let args = vec![a.clone(), b.clone(), vm.ctx.new_int(op.index()).into()];
                call_builtin_boxed(builtin, args.into(), vm)
            }
            SlotValue::Python(python) => match python.comparison(op) {
                Some(method) => call_bound(vm, &method, a, &[b.clone()]),
                None => Ok(vm.ctx.not_implemented()),
            },
            SlotValue::Native(native) => {
                let args = [to_native(vm, a), to_native(vm, b), NativeWord(op.index() as isize)];
                let result = invoke_native(vm, Self::KIND, native, &args);
                native_object_result(vm, Self::KIND, result)
            }
        }
    }
}

/// `sq_contains`; the result of a user `__contains__` is truth-tested.
pub struct CallSlotSqContains {
    cache: InlineCache,
}

impl CallSlotSqContains {
    const KIND: SlotKind = SlotKind::SqContains;

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
        container: &PyObjectRef,
        item: &PyObjectRef,
    ) -> PyResult<bool> {
        trace_dispatch(vm, Self::KIND, slot);
        match slot {
            SlotValue::Builtin(builtin) if self.cache.admit(builtin) => match builtin.func() {
                BuiltinSlotFunc::Contains(f) => f(container, item, vm),
                _ => wrong_shape(builtin, Self::KIND),
            },
            SlotValue::Builtin(builtin) => {
                let args = vec![container.clone(), item.clone()];
                let result = call_builtin_boxed(builtin, args.into(), vm)?;
                vm.is_true(&result)
            }
            SlotValue::Python(python) => {
                let Some(contains) = python.primary() else {
                    return Err(missing_callable(vm, container, "__contains__"));
                };
                let result = call_bound(vm, &contains, container, &[item.clone()])?;
                vm.is_true(&result)
            }
            SlotValue::Native(native) => {
                let args = [to_native(vm, container), to_native(vm, item)];
                let result = invoke_native(vm, Self::KIND, native, &args);
                native_status_result(vm, Self::KIND, result).map(|found| found != 0)
            }
        }
    }
}
