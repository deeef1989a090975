use super::{
    InlineCache, call_bound, call_builtin_boxed, invoke_native, missing_callable,
    native_object_result, native_status_result, to_native, to_native_opt, trace_dispatch,
    wrong_shape,
};
use crate::{
    PyObjectRef, PyResult, VirtualMachine,
    function::PySetterValue,
    types::{BuiltinSlotFunc, SlotKind, SlotValue},
};

/// `tp_descr_get`: `descr.__get__(obj, type)`.
pub struct CallSlotDescrGet {
    cache: InlineCache,
}

impl CallSlotDescrGet {
    const KIND: SlotKind = SlotKind::TpDescrGet;

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
        descr: &PyObjectRef,
        obj: Option<PyObjectRef>,
        cls: Option<PyObjectRef>,
    ) -> PyResult {
        trace_dispatch(vm, Self::KIND, slot);
        match slot {
            SlotValue::Builtin(builtin) if self.cache.admit(builtin) => match builtin.func() {
                BuiltinSlotFunc::DescrGet(f) => f(descr.clone(), obj, cls, vm),
                _ => wrong_shape(builtin, Self::KIND),
            },
            SlotValue::Builtin(builtin) => {
                let args = vec![
                    descr.clone(),
                    vm.unwrap_or_none(obj),
                    vm.unwrap_or_none(cls),
                ];
                call_builtin_boxed(builtin, args.into(), vm)
            }
            SlotValue::Python(python) => {
                let Some(get) = python.primary() else {
                    return Err(missing_callable(vm, descr, "__get__"));
                };
                call_bound(vm, &get, descr, &[vm.unwrap_or_none(obj), vm.unwrap_or_none(cls)])
            }
            SlotValue::Native(native) => {
                let args = [
                    to_native(vm, descr),
                    to_native_opt(vm, obj.as_ref()),
                    to_native_opt(vm, cls.as_ref()),
                ];
                let result = invoke_native(vm, Self::KIND, native, &args);
                native_object_result(vm, Self::KIND, result)
            }
        }
    }
}

/// `tp_descr_set`: `__set__` to assign, `__delete__` to delete.
pub struct CallSlotDescrSet {
    cache: InlineCache,
}

impl CallSlotDescrSet {
    const KIND: SlotKind = SlotKind::TpDescrSet;

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
        descr: &PyObjectRef,
        obj: &PyObjectRef,
        value: PySetterValue,
    ) -> PyResult<()> {
        trace_dispatch(vm, Self::KIND, slot);
        match slot {
            SlotValue::Builtin(builtin) if self.cache.admit(builtin) => match builtin.func() {
                BuiltinSlotFunc::DescrSet(f) => f(descr, obj.clone(), value, vm),
                _ => wrong_shape(builtin, Self::KIND),
            },
            SlotValue::Builtin(builtin) => {
                let mut args = vec![descr.clone(), obj.clone()];
                if let PySetterValue::Assign(value) = value {
                    args.push(value);
                }
                call_builtin_boxed(builtin, args.into(), vm).map(drop)
            }
            SlotValue::Python(python) => {
                let result = match value {
                    PySetterValue::Assign(value) => match python.primary() {
                        Some(set) => call_bound(vm, &set, descr, &[obj.clone(), value]),
                        None => Err(missing_callable(vm, descr, "__set__")),
                    },
                    PySetterValue::Delete => match python.secondary() {
                        Some(delete) => call_bound(vm, &delete, descr, &[obj.clone()]),
                        None => Err(missing_callable(vm, descr, "__delete__")),
                    },
                };
                result.map(drop)
            }
            SlotValue::Native(native) => {
                let args = [
                    to_native(vm, descr),
                    to_native(vm, obj),
                    to_native_opt(vm, value.as_option()),
                ];
                let result = invoke_native(vm, Self::KIND, native, &args);
                native_status_result(vm, Self::KIND, result).map(drop)
            }
        }
    }
}
