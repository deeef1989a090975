use super::{
    InlineCache, call_bound, call_builtin_boxed, invoke_native, native_status_result, to_native,
    to_native_opt, trace_dispatch, wrong_shape,
};
use crate::{
    PyObjectRef, PyResult, VirtualMachine,
    builtins::PyStrRef,
    function::PySetterValue,
    types::{BuiltinSlotFunc, SlotKind, SlotValue},
};

/// `tp_setattro` / `tp_setattr`: `__setattr__` to assign, `__delattr__` to delete.
pub struct CallSlotSetAttr {
    kind: SlotKind,
    cache: InlineCache,
}

impl CallSlotSetAttr {
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
        name: &PyStrRef,
        value: PySetterValue,
    ) -> PyResult<()> {
        trace_dispatch(vm, self.kind, slot);
        match slot {
            SlotValue::Builtin(builtin) if self.cache.admit(builtin) => match builtin.func() {
                BuiltinSlotFunc::SetAttro(f) => f(obj, name, value, vm),
                _ => wrong_shape(builtin, self.kind),
            },
            SlotValue::Builtin(builtin) => {
                let mut args = vec![obj.clone(), name.clone().into()];
                if let PySetterValue::Assign(value) = value {
                    args.push(value);
                }
                call_builtin_boxed(builtin, args.into(), vm).map(drop)
            }
            SlotValue::Python(python) => {
                let name_obj: PyObjectRef = name.clone().into();
                let (callable, args, method) = match value {
                    PySetterValue::Assign(value) => {
                        (python.primary(), vec![name_obj, value], "__setattr__")
                    }
                    PySetterValue::Delete => (python.secondary(), vec![name_obj], "__delattr__"),
                };
                let Some(callable) = callable else {
                    return Err(vm.new_no_attribute_error(obj, method));
                };
                call_bound(vm, &callable, obj, &args).map(drop)
            }
            SlotValue::Native(native) => {
                let name: PyObjectRef = name.clone().into();
                let args = [
                    to_native(vm, obj),
                    to_native(vm, &name),
                    to_native_opt(vm, value.as_option()),
                ];
                let result = invoke_native(vm, self.kind, native, &args);
                native_status_result(vm, self.kind, result).map(drop)
            }
        }
    }
}
