use super::{VirtualMachine, setting::Settings};
use crate::native::{NativeBridge, NoNativeBridge};
use std::sync::Arc;

/// The general interface for the VM
///
/// # Examples
/// Adds two ints through the `nb_add` slot of `int`.
/// ```
/// use pyslot_vm::Interpreter;
/// Interpreter::without_native().enter(|vm| {
///     let a = vm.ctx.new_int(2).into();
///     let b = vm.ctx.new_int(40).into();
///     let sum = vm.binary_op(&a, &b, pyslot_vm::types::SlotKind::NbAdd).unwrap();
///     assert_eq!(vm.repr(&sum).unwrap().as_str(), "42");
/// });
/// ```
pub struct Interpreter {
    vm: VirtualMachine,
}

impl Interpreter {
    /// An interpreter with default settings whose native slots cannot be called.
    pub fn without_native() -> Self {
        Self::with_settings(Settings::default(), Arc::new(NoNativeBridge))
    }

    /// An interpreter with default settings that calls native slots through `bridge`.
    pub fn with_native(bridge: Arc<dyn NativeBridge>) -> Self {
        Self::with_settings(Settings::default(), bridge)
    }

    pub fn with_settings(settings: Settings, bridge: Arc<dyn NativeBridge>) -> Self {
        let _gil = crate::gil::GIL.acquire();
        Self {
            vm: VirtualMachine::new(settings, bridge),
        }
    }

    /// Run a function with the virtual machine while holding the GIL.
    ///
    /// `enter` is reentrant and lightweight; it can be called any number of times.
    pub fn enter<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&VirtualMachine) -> R,
    {
        let _gil = self.vm.gil().acquire();
        f(&self.vm)
    }
}
