//! Boundary to native extension code.
//!
//! Marshalling between managed objects and machine words belongs to the embedder; this module
//! only fixes the shape of that collaborator ([`NativeBridge`]) and the raw call helpers.

use crate::{
    PyObjectRef, VirtualMachine,
    builtins::PyBaseExceptionRef,
    types::{SlotKind, SlotValue},
};
use core::fmt;

/// Calling convention of a native slot function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeAbi {
    /// CPython C API: `PyObject *f(PyObject *, ...)`.
    CExt,
    /// HPy: the context handle is passed first.
    HPy,
}

/// Raw address of a native function.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativePtr(usize);

impl NativePtr {
    pub const NULL: Self = Self(0);

    #[inline]
    pub const fn from_addr(addr: usize) -> Self {
        Self(addr)
    }

    #[inline]
    pub const fn addr(self) -> usize {
        self.0
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for NativePtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// One machine word crossing the ABI: an object handle, an integer result or a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct NativeWord(pub isize);

static_assertions::assert_eq_size!(NativeWord, isize);
static_assertions::assert_eq_size!(NativePtr, usize);

impl NativeWord {
    pub const NULL: Self = Self(0);
    pub const ERROR: Self = Self(-1);

    #[inline]
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// A broken native calling contract. Never surfaced as a Python exception.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NativeAbiError {
    #[error("native bridge does not support the {0:?} ABI")]
    UnsupportedAbi(NativeAbi),
    #[error("{abi:?} slot functions with {arity} arguments are not supported")]
    UnsupportedArity { abi: NativeAbi, arity: usize },
    #[error("call to null native function")]
    NullFunction,
    #[error("{slot} returned NULL without setting an exception")]
    NullWithoutError { slot: &'static str },
    #[error("{slot} returned an error status without setting an exception")]
    ErrorStatusWithoutError { slot: &'static str },
    #[error("{slot} returned {word:?}, which is not a valid result")]
    InvalidResult { slot: &'static str, word: NativeWord },
    #[error("no native bridge is installed")]
    NoBridge,
}

/// What the runtime needs from the native extension layer.
pub trait NativeBridge: Send + Sync {
    /// New native handle for `obj`.
    fn to_native(&self, obj: &PyObjectRef, vm: &VirtualMachine) -> NativeWord;

    /// Managed object for a non-null handle returned by native code.
    fn to_managed(&self, word: NativeWord, vm: &VirtualMachine) -> PyObjectRef;

    /// Take the exception native code left pending, if any.
    fn take_pending_error(&self, vm: &VirtualMachine) -> Option<PyBaseExceptionRef>;

    /// Call `func` with the `abi` convention.
    ///
    /// # Safety
    /// `func` must point to a function of that ABI taking exactly `args.len()` words.
    unsafe fn invoke(
        &self,
        abi: NativeAbi,
        func: NativePtr,
        args: &[NativeWord],
    ) -> Result<NativeWord, NativeAbiError>;

    /// Native entry point that calls back into a managed slot implementation.
    fn wrap_managed_slot(&self, kind: SlotKind, slot: &SlotValue, vm: &VirtualMachine)
    -> NativePtr;
}

/// Installed when the interpreter runs without native extensions. Any use is a defect.
#[derive(Debug, Default)]
pub struct NoNativeBridge;

impl NativeBridge for NoNativeBridge {
    fn to_native(&self, _obj: &PyObjectRef, _vm: &VirtualMachine) -> NativeWord {
        abi_violation("to_native", NativeAbiError::NoBridge)
    }

    fn to_managed(&self, _word: NativeWord, _vm: &VirtualMachine) -> PyObjectRef {
        abi_violation("to_managed", NativeAbiError::NoBridge)
    }

    fn take_pending_error(&self, _vm: &VirtualMachine) -> Option<PyBaseExceptionRef> {
        None
    }

    unsafe fn invoke(
        &self,
        _abi: NativeAbi,
        _func: NativePtr,
        _args: &[NativeWord],
    ) -> Result<NativeWord, NativeAbiError> {
        Err(NativeAbiError::NoBridge)
    }

    fn wrap_managed_slot(
        &self,
        kind: SlotKind,
        _slot: &SlotValue,
        _vm: &VirtualMachine,
    ) -> NativePtr {
        abi_violation(kind.name(), NativeAbiError::NoBridge)
    }
}

/// Log and abort on a broken native contract.
#[cold]
#[track_caller]
pub fn abi_violation(context: &str, err: NativeAbiError) -> ! {
    log::error!("native ABI violation in {context}: {err}");
    panic!("native ABI violation in {context}: {err}")
}

/// Call a C-API function of up to four word arguments.
///
/// # Safety
/// `func` must be a non-null `extern "C"` function taking `args.len()` word-sized arguments and
/// returning a word.
pub unsafe fn invoke_c_abi(func: NativePtr, args: &[NativeWord]) -> Result<NativeWord, NativeAbiError> {
    if func.is_null() {
        return Err(NativeAbiError::NullFunction);
    }
    type F1 = extern "C" fn(isize) -> isize;
    type F2 = extern "C" fn(isize, isize) -> isize;
    type F3 = extern "C" fn(isize, isize, isize) -> isize;
    type F4 = extern "C" fn(isize, isize, isize, isize) -> isize;
    let addr = func.addr();
    // SAFETY: the caller guarantees the signature matches the arity dispatched on below.
    let ret = unsafe {
        match *args {
            [a] => core::mem::transmute::<usize, F1>(addr)(a.0),
            [a, b] => core::mem::transmute::<usize, F2>(addr)(a.0, b.0),
            [a, b, c] => core::mem::transmute::<usize, F3>(addr)(a.0, b.0, c.0),
            [a, b, c, d] => core::mem::transmute::<usize, F4>(addr)(a.0, b.0, c.0, d.0),
            _ => {
                return Err(NativeAbiError::UnsupportedArity {
                    abi: NativeAbi::CExt,
                    arity: args.len(),
                });
            }
        }
    };
    Ok(NativeWord(ret))
}

/// Call an HPy function: `context` goes first, then up to three word arguments.
///
/// # Safety
/// Same contract as [`invoke_c_abi`] with the extra leading context argument.
pub unsafe fn invoke_hpy_abi(
    context: NativeWord,
    func: NativePtr,
    args: &[NativeWord],
) -> Result<NativeWord, NativeAbiError> {
    if args.len() > 3 {
        return Err(NativeAbiError::UnsupportedArity {
            abi: NativeAbi::HPy,
            arity: args.len(),
        });
    }
    let mut full = Vec::with_capacity(args.len() + 1);
    full.push(context);
    full.extend_from_slice(args);
    // SAFETY: forwarded from the caller.
    unsafe { invoke_c_abi(func, &full) }
}
