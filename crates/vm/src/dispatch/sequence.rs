use super::{
    InlineCache, call_bound, call_builtin_boxed, invoke_native, missing_callable,
    native_object_result, native_status_result, primary_name, to_native, to_native_opt,
    trace_dispatch, wrong_shape,
};
use crate::{
    PyObjectRef, PyResult, VirtualMachine,
    function::PySetterValue,
    native::NativeWord,
    types::{BuiltinSlotFunc, PythonSlot, SlotKind, SlotValue},
};

/// `sq_item`, `sq_repeat` and `sq_inplace_repeat`: a receiver and a machine-sized integer.
pub struct CallSlotSizeArgFunc {
    kind: SlotKind,
    cache: InlineCache,
}

impl CallSlotSizeArgFunc {
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
        obj: &PyObjectRef,
        index: isize,
    ) -> PyResult {
        trace_dispatch(vm, self.kind, slot);
        match slot {
            SlotValue::Builtin(builtin) if self.cache.admit(builtin) => match builtin.func() {
                BuiltinSlotFunc::SqItem(f) => f(obj, index, vm),
                _ => wrong_shape(builtin, self.kind),
            },
            SlotValue::Builtin(builtin) => {
                let args = vec![obj.clone(), vm.ctx.new_int(index).into()];
                call_builtin_boxed(builtin, args.into(), vm)
            }
            SlotValue::Python(python) => {
                let Some(method) = python.primary() else {
                    return Err(missing_callable(vm, obj, primary_name(self.kind)));
                };
                call_bound(vm, &method, obj, &[vm.ctx.new_int(index).into()])
            }
            SlotValue::Native(native) => {
                let args = [to_native(vm, obj), NativeWord(index)];
                let result = invoke_native(vm, self.kind, native, &args);
                native_object_result(vm, self.kind, result)
            }
        }
    }
}

/// `__setitem__` for assignment, `__delitem__` for deletion.
fn call_python_setter(
    vm: &VirtualMachine,
    python: &PythonSlot,
    obj: &PyObjectRef,
    key: PyObjectRef,
    value: PySetterValue,
) -> PyResult<()> {
    let result = match value {
        PySetterValue::Assign(value) => match python.primary() {
            Some(setitem) => call_bound(vm, &setitem, obj, &[key, value]),
            None => Err(missing_callable(vm, obj, "__setitem__")),
        },
        PySetterValue::Delete => match python.secondary() {
            Some(delitem) => call_bound(vm, &delitem, obj, &[key]),
            None => Err(missing_callable(vm, obj, "__delitem__")),
        },
    };
    result.map(drop)
}

fn boxed_setter_args(obj: &PyObjectRef, key: PyObjectRef, value: PySetterValue) -> Vec<PyObjectRef> {
    let mut args = vec![obj.clone(), key];
    if let PySetterValue::Assign(value) = value {
        args.push(value);
    }
    args
}

/// `mp_ass_subscript`.
pub struct CallSlotMpAssSubscript {
    cache: InlineCache,
}

impl CallSlotMpAssSubscript {
    const KIND: SlotKind = SlotKind::MpAssSubscript;

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
        obj: &PyObjectRef,
        key: &PyObjectRef,
        value: PySetterValue,
    ) -> PyResult<()> {
        trace_dispatch(vm, Self::KIND, slot);
        match slot {
            SlotValue::Builtin(builtin) if self.cache.admit(builtin) => match builtin.func() {
                BuiltinSlotFunc::MpAssSubscript(f) => f(obj, key, value, vm),
                _ => wrong_shape(builtin, Self::KIND),
            },
            SlotValue::Builtin(builtin) => {
                let args = boxed_setter_args(obj, key.clone(), value);
                call_builtin_boxed(builtin, args.into(), vm).map(drop)
            }
            SlotValue::Python(python) => call_python_setter(vm, python, obj, key.clone(), value),
            SlotValue::Native(native) => {
                let args = [
                    to_native(vm, obj),
                    to_native(vm, key),
                    to_native_opt(vm, value.as_option()),
                ];
                let result = invoke_native(vm, Self::KIND, native, &args);
                native_status_result(vm, Self::KIND, result).map(drop)
            }
        }
    }
}

/// `sq_ass_item`.
pub struct CallSlotSqAssItem {
    cache: InlineCache,
}

impl CallSlotSqAssItem {
    const KIND: SlotKind = SlotKind::SqAssItem;

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
        obj: &PyObjectRef,
        index: isize,
        value: PySetterValue,
    ) -> PyResult<()> {
        trace_dispatch(vm, Self::KIND, slot);
        match slot {
            SlotValue::Builtin(builtin) if self.cache.admit(builtin) => match builtin.func() {
                BuiltinSlotFunc::SqAssItem(f) => f(obj, index, value, vm),
                _ => wrong_shape(builtin, Self::KIND),
            },
            SlotValue::Builtin(builtin) => {
                let args = boxed_setter_args(obj, vm.ctx.new_int(index).into(), value);
                call_builtin_boxed(builtin, args.into(), vm).map(drop)
            }
            SlotValue::Python(python) => {
                call_python_setter(vm, python, obj, vm.ctx.new_int(index).into(), value)
            }
            SlotValue::Native(native) => {
                let args = [
                    to_native(vm, obj),
                    NativeWord(index),
                    to_native_opt(vm, value.as_option()),
                ];
                let result = invoke_native(vm, Self::KIND, native, &args);
                native_status_result(vm, Self::KIND, result).map(drop)
            }
        }
    }
}
