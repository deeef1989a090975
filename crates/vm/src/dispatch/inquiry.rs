use super::{
    InlineCache, call_bound, call_builtin_boxed, invoke_native, missing_callable,
    native_status_result, primary_name, to_native, trace_dispatch, wrong_shape,
};
use crate::{
    PyObjectRef, PyResult, VirtualMachine,
    builtins::PyInt,
    common::hash::{self, PyHash},
    native::{NativeAbiError, NativeWord, abi_violation},
    types::{BuiltinSlotFunc, SlotKind, SlotValue},
};
use num_traits::ToPrimitive;

/// `mp_length` / `sq_length`.
pub struct CallSlotLen {
    kind: SlotKind,
    cache: InlineCache,
}

impl CallSlotLen {
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
    ) -> PyResult<usize> {
        trace_dispatch(vm, self.kind, slot);
        match slot {
            SlotValue::Builtin(builtin) if self.cache.admit(builtin) => match builtin.func() {
                BuiltinSlotFunc::Len(f) => f(obj, vm),
                _ => wrong_shape(builtin, self.kind),
            },
            SlotValue::Builtin(builtin) => {
                let result = call_builtin_boxed(builtin, vec![obj.clone()].into(), vm)?;
                coerce_len(vm, &result)
            }
            SlotValue::Python(python) => {
                let Some(len) = python.primary() else {
                    return Err(missing_callable(vm, obj, primary_name(self.kind)));
                };
                let result = call_bound(vm, &len, obj, &[])?;
                coerce_len(vm, &result)
            }
            SlotValue::Native(native) => {
                let result = invoke_native(vm, self.kind, native, &[to_native(vm, obj)]);
                native_status_result(vm, self.kind, result).map(|len| len as usize)
            }
        }
    }
}

/// Check what a user `__len__` returned: an integer, index-sized, and not negative.
pub(crate) fn coerce_len(vm: &VirtualMachine, result: &PyObjectRef) -> PyResult<usize> {
    let index = vm.to_index(result)?;
    let Some(len) = index.as_bigint().to_isize() else {
        return Err(vm.new_overflow_error(format!(
            "cannot fit '{}' into an index-sized integer",
            result.class().name()
        )));
    };
    usize::try_from(len).map_err(|_| vm.new_value_error("__len__() should return >= 0"))
}

/// `nb_bool`.
pub struct CallSlotNbBool {
    cache: InlineCache,
}

impl CallSlotNbBool {
    const KIND: SlotKind = SlotKind::NbBool;

    pub fn new(cache_limit: usize) -> Self {
        Self {
            cache: InlineCache::new(cache_limit),
        }
    }

    #[inline]
    pub fn cache(&self) -> &InlineCache {
        &self.cache
    }

    pub fn execute(&self, vm: &VirtualMachine, slot: &SlotValue, obj: &PyObjectRef) -> PyResult<bool> {
        trace_dispatch(vm, Self::KIND, slot);
        match slot {
            SlotValue::Builtin(builtin) if self.cache.admit(builtin) => match builtin.func() {
                BuiltinSlotFunc::Inquiry(f) => f(obj, vm),
                _ => wrong_shape(builtin, Self::KIND),
            },
            SlotValue::Builtin(builtin) => {
                let result = call_builtin_boxed(builtin, vec![obj.clone()].into(), vm)?;
                coerce_bool(vm, &result)
            }
            SlotValue::Python(python) => {
                let Some(bool_) = python.primary() else {
                    return Err(missing_callable(vm, obj, "__bool__"));
                };
                let result = call_bound(vm, &bool_, obj, &[])?;
                coerce_bool(vm, &result)
            }
            SlotValue::Native(native) => {
                let result = invoke_native(vm, Self::KIND, native, &[to_native(vm, obj)]);
                match native_status_result(vm, Self::KIND, result)? {
                    0 => Ok(false),
                    1 => Ok(true),
                    _ if !vm.settings.check_native_results => Ok(true),
                    _ => abi_violation(
                        Self::KIND.name(),
                        NativeAbiError::InvalidResult {
                            slot: Self::KIND.name(),
                            word: result,
                        },
                    ),
                }
            }
        }
    }
}

/// `__bool__` must return exactly a `bool`.
pub(crate) fn coerce_bool(vm: &VirtualMachine, result: &PyObjectRef) -> PyResult<bool> {
    if !result.class().is(&vm.ctx.types.bool_type) {
        return Err(vm.new_type_error(format!(
            "__bool__ should return bool, returned {}",
            result.class().name()
        )));
    }
    Ok(result.is(&vm.ctx.true_value))
}

/// `tp_hash`.
pub struct CallSlotHashFun {
    cache: InlineCache,
}

impl CallSlotHashFun {
    const KIND: SlotKind = SlotKind::TpHash;

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
    ) -> PyResult<PyHash> {
        trace_dispatch(vm, Self::KIND, slot);
        match slot {
            SlotValue::Builtin(builtin) if self.cache.admit(builtin) => match builtin.func() {
                BuiltinSlotFunc::Hash(f) => f(obj, vm),
                _ => wrong_shape(builtin, Self::KIND),
            },
            SlotValue::Builtin(builtin) => {
                let result = call_builtin_boxed(builtin, vec![obj.clone()].into(), vm)?;
                coerce_hash(vm, &result)
            }
            SlotValue::Python(python) => {
                let Some(hash) = python.primary() else {
                    return Err(missing_callable(vm, obj, "__hash__"));
                };
                let result = call_bound(vm, &hash, obj, &[])?;
                coerce_hash(vm, &result)
            }
            SlotValue::Native(native) => {
                let result = invoke_native(vm, Self::KIND, native, &[to_native(vm, obj)]);
                if result == NativeWord::ERROR {
                    if let Some(err) = vm.native_bridge().take_pending_error(vm) {
                        return Err(err);
                    }
                    abi_violation(
                        Self::KIND.name(),
                        NativeAbiError::ErrorStatusWithoutError {
                            slot: Self::KIND.name(),
                        },
                    );
                }
                Ok(result.0 as PyHash)
            }
        }
    }
}

/// A `__hash__` result: an int, `-1` remapped to `-2`, big values reduced.
pub(crate) fn coerce_hash(vm: &VirtualMachine, result: &PyObjectRef) -> PyResult<PyHash> {
    let Some(int) = result.payload::<PyInt>() else {
        return Err(vm.new_type_error("__hash__ method should return an integer"));
    };
    Ok(match int.as_bigint().to_i64() {
        Some(-1) => -2,
        Some(value) => value,
        None => hash::hash_bigint(int.as_bigint()),
    })
}
