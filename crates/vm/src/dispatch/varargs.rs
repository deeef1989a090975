//! Slots taking arbitrary call arguments: `tp_init`, `tp_new` and `tp_call`.

use super::{
    InlineCache, call_bound_args, call_builtin_boxed, invoke_native, missing_callable,
    native_object_result, native_status_result, native_varargs, to_native, trace_dispatch,
    wrong_shape,
};
use crate::{
    PyObjectRef, PyResult, VirtualMachine,
    builtins::{PyStaticMethod, PyTypeRef},
    function::FuncArgs,
    native::NativeWord,
    types::{BuiltinSlotFunc, SlotKind, SlotValue},
};

pub struct CallSlotTpInit {
    cache: InlineCache,
}

impl CallSlotTpInit {
    const KIND: SlotKind = SlotKind::TpInit;

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
        mut args: FuncArgs,
    ) -> PyResult<()> {
        trace_dispatch(vm, Self::KIND, slot);
        match slot {
            SlotValue::Builtin(builtin) if self.cache.admit(builtin) => match builtin.func() {
                BuiltinSlotFunc::Init(f) => f(obj.clone(), args, vm),
                _ => wrong_shape(builtin, Self::KIND),
            },
            SlotValue::Builtin(builtin) => {
                args.prepend_arg(obj.clone());
                call_builtin_boxed(builtin, args, vm).map(drop)
            }
            SlotValue::Python(python) => {
                let Some(init) = python.primary() else {
                    return Err(missing_callable(vm, obj, "__init__"));
                };
                let result = call_bound_args(vm, &init, obj, args)?;
                if vm.is_none(&result) {
                    Ok(())
                } else {
                    Err(vm.new_type_error(format!(
                        "__init__() should return None, not '{}'",
                        result.class().name()
                    )))
                }
            }
            SlotValue::Native(native) => {
                let words = [
                    to_native(vm, obj),
                    native_varargs(vm, Self::KIND, args)?,
                    NativeWord::NULL,
                ];
                let result = invoke_native(vm, Self::KIND, native, &words);
                native_status_result(vm, Self::KIND, result).map(drop)
            }
        }
    }
}

/// `tp_new`. The class is an explicit first argument, never a bound receiver, so a
/// `__new__` wrapped in `staticmethod` is unwrapped and called directly.
pub struct CallSlotTpNew {
    cache: InlineCache,
}

impl CallSlotTpNew {
    const KIND: SlotKind = SlotKind::TpNew;

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
        cls: &PyTypeRef,
        mut args: FuncArgs,
    ) -> PyResult {
        trace_dispatch(vm, Self::KIND, slot);
        match slot {
            SlotValue::Builtin(builtin) if self.cache.admit(builtin) => match builtin.func() {
                BuiltinSlotFunc::New(f) => f(cls.clone(), args, vm),
                _ => wrong_shape(builtin, Self::KIND),
            },
            SlotValue::Builtin(builtin) => {
                args.prepend_arg(cls.to_object());
                call_builtin_boxed(builtin, args, vm)
            }
            SlotValue::Python(python) => {
                let Some(new) = python.primary() else {
                    return Err(missing_callable(vm, &cls.to_object(), "__new__"));
                };
                let new = match new.payload::<PyStaticMethod>() {
                    Some(staticmethod) => staticmethod.callable(),
                    None => new,
                };
                args.prepend_arg(cls.to_object());
                vm.call(&new, args)
            }
            SlotValue::Native(native) => {
                let words = [
                    to_native(vm, &cls.to_object()),
                    native_varargs(vm, Self::KIND, args)?,
                    NativeWord::NULL,
                ];
                let result = invoke_native(vm, Self::KIND, native, &words);
                native_object_result(vm, Self::KIND, result)
            }
        }
    }
}

pub struct CallSlotTpCall {
    cache: InlineCache,
}

impl CallSlotTpCall {
    const KIND: SlotKind = SlotKind::TpCall;

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
        mut args: FuncArgs,
    ) -> PyResult {
        trace_dispatch(vm, Self::KIND, slot);
        match slot {
            SlotValue::Builtin(builtin) if self.cache.admit(builtin) => match builtin.func() {
                BuiltinSlotFunc::Call(f) => f(obj, args, vm),
                _ => wrong_shape(builtin, Self::KIND),
            },
            SlotValue::Builtin(builtin) => {
                args.prepend_arg(obj.clone());
                call_builtin_boxed(builtin, args, vm)
            }
            SlotValue::Python(python) => {
                let Some(call) = python.primary() else {
                    return Err(missing_callable(vm, obj, "__call__"));
                };
                call_bound_args(vm, &call, obj, args)
            }
            SlotValue::Native(native) => {
                let words = [
                    to_native(vm, obj),
                    native_varargs(vm, Self::KIND, args)?,
                    NativeWord::NULL,
                ];
                let result = invoke_native(vm, Self::KIND, native, &words);
                native_object_result(vm, Self::KIND, result)
            }
        }
    }
}
