use super::{
    InlineCache, binary::call_python_binary, call_bound, call_builtin_boxed, invoke_native,
    native_object_result, to_native, trace_dispatch, wrong_shape,
};
use crate::{
    PyObjectRef, PyResult, VirtualMachine,
    types::{BuiltinSlotFunc, SlotKind, SlotValue},
};

/// `nb_power`, called as `slot(a, b, modulus)` with `None` for the two-argument form.
pub struct CallSlotNbPower {
    cache: InlineCache,
}

impl CallSlotNbPower {
    const KIND: SlotKind = SlotKind::NbPower;

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
        modulus: &PyObjectRef,
        same_types: bool,
    ) -> PyResult {
        trace_dispatch(vm, Self::KIND, slot);
        match slot {
            SlotValue::Builtin(builtin) if self.cache.admit(builtin) => match builtin.func() {
                BuiltinSlotFunc::Ternary(f) => f(a, b, modulus, vm),
                _ => wrong_shape(builtin, Self::KIND),
            },
            SlotValue::Builtin(builtin) => call_builtin_boxed(
                builtin,
                vec![a.clone(), b.clone(), modulus.clone()].into(),
                vm,
            ),
            SlotValue::Python(_) if vm.is_none(modulus) => {
                call_python_binary(vm, Self::KIND, a, b, same_types)
            }
            SlotValue::Python(_) => {
                // the three-argument form never tries __rpow__
                let own = a
                    .class()
                    .slots()
                    .get(Self::KIND)
                    .and_then(SlotValue::as_python)
                    .and_then(|python| python.left());
                match own {
                    Some(pow) => call_bound(vm, &pow, a, &[b.clone(), modulus.clone()]),
                    None => Ok(vm.ctx.not_implemented()),
                }
            }
            SlotValue::Native(native) => {
                let args = [to_native(vm, a), to_native(vm, b), to_native(vm, modulus)];
                let result = invoke_native(vm, Self::KIND, native, &args);
                native_object_result(vm, Self::KIND, result)
            }
        }
    }
}
