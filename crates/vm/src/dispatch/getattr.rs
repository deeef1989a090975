use super::{
    InlineCache, call_bound, call_builtin_boxed, invoke_native, native_object_result, to_native,
    trace_dispatch, wrong_shape,
};
use crate::{
    PyObjectRef, PyResult, VirtualMachine,
    builtins::{PyStrRef, object},
    types::{BuiltinSlotFunc, SlotKind, SlotValue},
};

/// `tp_getattro` / `tp_getattr`.
///
/// A user-defined slot runs `__getattribute__` (or the generic lookup when only `__getattr__`
/// is defined) and falls back to `__getattr__` on `AttributeError` only.
pub struct CallSlotGetAttr {
    kind: SlotKind,
    cache: InlineCache,
}

impl CallSlotGetAttr {
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
    ) -> PyResult {
        trace_dispatch(vm, self.kind, slot);
        match slot {
            SlotValue::Builtin(builtin) if self.cache.admit(builtin) => match builtin.func() {
                BuiltinSlotFunc::GetAttro(f) => f(obj, name, vm),
                _ => wrong_shape(builtin, self.kind),
            },
            SlotValue::Builtin(builtin) => {
                let args = vec![obj.clone(), name.clone().into()];
                call_builtin_boxed(builtin, args.into(), vm)
            }
            SlotValue::Python(python) => {
                // the hook is read before the primary lookup can rebind it
                let hook = python.secondary();
                let result = match python.primary() {
                    Some(getattribute) => call_bound(vm, &getattribute, obj, &[name.clone().into()]),
                    None => object::generic_getattr(obj, name.as_str(), vm),
                };
                match (result, hook) {
                    (Err(err), Some(hook))
                        if err.fast_isinstance(&vm.ctx.exceptions.attribute_error) =>
                    {
                        call_bound(vm, &hook, obj, &[name.clone().into()])
                    }
                    (result, _) => result,
                }
            }
            SlotValue::Native(native) => {
                let name: PyObjectRef = name.clone().into();
                let args = [to_native(vm, obj), to_native(vm, &name)];
                let result = invoke_native(vm, self.kind, native, &args);
                native_object_result(vm, self.kind, result)
            }
        }
    }
}
