//! The interpreter state the slot machinery runs against.
//!
//! A [`VirtualMachine`] owns the builtin types ([`Context`]), the VM-wide dispatch call sites
//! used by its operator entry points, and the per-interpreter entry points of the builtin
//! call-target registry.

mod context;
mod interpreter;
mod setting;
mod vm_new;
mod vm_object;
mod vm_ops;

use crate::{
    dispatch::CallSites,
    gil::{GIL, GlobalInterpreterLock},
    native::NativeBridge,
    types::{BUILTIN_CALL_TARGETS, CallTarget, CallTargetIndex},
};
use std::sync::{Arc, OnceLock};

pub use context::{Context, TypeZoo};
pub use interpreter::Interpreter;
pub use setting::Settings;

/// Seed of the str hash when the settings do not name one.
pub const DEFAULT_HASH_SEED: u32 = 0;

/// Top level container of the runtime. Several can coexist; they share the builtin slot
/// functions and the process-wide registry, nothing else.
///
/// To construct this, please refer to the [`Interpreter`]
pub struct VirtualMachine {
    pub ctx: Context,
    pub settings: Settings,
    pub sites: CallSites,
    bridge: Arc<dyn NativeBridge>,
    call_targets: Box<[OnceLock<CallTarget>]>,
}

impl VirtualMachine {
    fn new(settings: Settings, bridge: Arc<dyn NativeBridge>) -> Self {
        let ctx = Context::new(settings.hash_seed.unwrap_or(DEFAULT_HASH_SEED));
        let target_count = BUILTIN_CALL_TARGETS.len();
        let call_targets = (0..target_count).map(|_| OnceLock::new()).collect();
        let sites = CallSites::new(settings.inline_cache_limit);
        log::debug!(
            "new virtual machine: {target_count} builtin call targets, inline cache limit {}",
            settings.inline_cache_limit
        );
        Self {
            ctx,
            settings,
            sites,
            bridge,
            call_targets,
        }
    }

    #[inline]
    pub fn gil(&self) -> &'static GlobalInterpreterLock {
        &GIL
    }

    #[inline]
    pub fn native_bridge(&self) -> &dyn NativeBridge {
        &*self.bridge
    }

    /// Run `f` with the GIL released; it is taken back afterwards, also when `f` unwinds.
    pub fn allow_threads<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let gil = self.gil();
        if !gil.owned_by_current_thread() {
            return f();
        }
        let depth = gil.release_all();
        scopeguard::defer! { gil.restore(depth); }
        f()
    }

    /// The boxed entry point of a registered builtin, created on first use.
    pub fn call_target(&self, index: CallTargetIndex) -> &CallTarget {
        let Some(cell) = self.call_targets.get(index.get()) else {
            panic!("call target #{} was allocated after this interpreter started", index.get());
        };
        cell.get_or_init(|| {
            let Some(slot) = BUILTIN_CALL_TARGETS.get(index) else {
                panic!("call target #{} is not in the registry", index.get());
            };
            CallTarget::new(slot)
        })
    }
}
