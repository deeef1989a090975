//! Native slots driven through a mock bridge whose handles index a table of live objects.

mod common;

use common::*;
use pyslot::pyslot_vm::{
    Interpreter, PyObjectRef, VirtualMachine,
    builtins::{PyBaseExceptionRef, PySlotWrapper, PyTypeRef},
    common::lock::PyMutex,
    function::FuncArgs,
    gil::GIL,
    native::{
        NativeAbi, NativeAbiError, NativeBridge, NativePtr, NativeWord, invoke_c_abi,
        invoke_hpy_abi,
    },
    protocol::PyIterReturn,
    types::{SlotCategory, SlotKind, SlotValue},
};
use std::{
    cell::Cell,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

thread_local! {
    static FAIL_RAISED: Cell<bool> = const { Cell::new(false) };
}

#[derive(Default)]
struct MockBridge {
    handles: PyMutex<Vec<PyObjectRef>>,
    calls: AtomicUsize,
    calls_without_gil: AtomicUsize,
    wrapped: AtomicUsize,
}

impl MockBridge {
    fn handle_of(&self, word: NativeWord) -> PyObjectRef {
        let index = usize::try_from(word.0 - 1).expect("valid handle");
        self.handles.lock()[index].clone()
    }
}

impl NativeBridge for MockBridge {
    fn to_native(&self, obj: &PyObjectRef, _vm: &VirtualMachine) -> NativeWord {
        let mut handles = self.handles.lock();
        handles.push(obj.clone());
        NativeWord(handles.len() as isize)
    }

    fn to_managed(&self, word: NativeWord, _vm: &VirtualMachine) -> PyObjectRef {
        self.handle_of(word)
    }

    fn take_pending_error(&self, vm: &VirtualMachine) -> Option<PyBaseExceptionRef> {
        FAIL_RAISED
            .replace(false)
            .then(|| vm.new_value_error("raised in native code"))
    }

    unsafe fn invoke(
        &self,
        abi: NativeAbi,
        func: NativePtr,
        args: &[NativeWord],
    ) -> Result<NativeWord, NativeAbiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !GIL.owned_by_current_thread() {
            self.calls_without_gil.fetch_add(1, Ordering::SeqCst);
        }
        // SAFETY: every slot installed by these tests matches its declared arity.
        unsafe {
            match abi {
                NativeAbi::CExt => invoke_c_abi(func, args),
                NativeAbi::HPy => invoke_hpy_abi(NativeWord(0), func, args),
            }
        }
    }

    fn wrap_managed_slot(&self, _kind: SlotKind, _slot: &SlotValue, _vm: &VirtualMachine) -> NativePtr {
        self.wrapped.fetch_add(1, Ordering::SeqCst);
        NativePtr::from_addr(managed_trampoline as usize)
    }
}

extern "C" fn managed_trampoline(_obj: isize) -> isize {
    0
}

extern "C" fn seven(_obj: isize) -> isize {
    7
}

extern "C" fn identity(obj: isize) -> isize {
    obj
}

extern "C" fn second(_a: isize, b: isize) -> isize {
    b
}

extern "C" fn hpy_second(_ctx: isize, _a: isize, b: isize) -> isize {
    b
}

extern "C" fn exhausted(_iter: isize) -> isize {
    0
}

extern "C" fn failing(_obj: isize) -> isize {
    FAIL_RAISED.set(true);
    0
}

extern "C" fn true_status(_obj: isize) -> isize {
    1
}

extern "C" fn bad_status(_obj: isize) -> isize {
    -1
}

fn native(func: usize, abi: NativeAbi) -> SlotValue {
    SlotValue::native(NativePtr::from_addr(func), abi)
}

fn native_type(vm: &VirtualMachine, name: &str, slots: Vec<(SlotKind, SlotValue)>) -> PyTypeRef {
    vm.new_native_type(name, &[], slots).unwrap()
}

fn with_bridge<R>(f: impl FnOnce(&VirtualMachine, &MockBridge) -> R) -> R {
    let bridge = Arc::new(MockBridge::default());
    let interp = Interpreter::with_native(bridge.clone());
    interp.enter(|vm| f(vm, &bridge))
}

#[test]
fn native_slots_run_without_the_gil() {
    with_bridge(|vm, bridge| {
        let cls = native_type(
            vm,
            "NativeBox",
            vec![
                (SlotKind::SqLength, native(seven as usize, NativeAbi::CExt)),
                (SlotKind::NbNegative, native(identity as usize, NativeAbi::CExt)),
                (SlotKind::NbBool, native(true_status as usize, NativeAbi::CExt)),
            ],
        );
        let obj = vm.construct(&cls, FuncArgs::default()).unwrap();

        assert_eq!(vm.len(&obj).unwrap(), 7);
        let neg = vm.call_unary_slot(SlotKind::NbNegative, &obj).unwrap();
        assert!(neg.is(&obj));
        assert!(vm.is_true(&obj).unwrap());

        assert_eq!(bridge.calls.load(Ordering::SeqCst), 3);
        assert_eq!(bridge.calls_without_gil.load(Ordering::SeqCst), 3);
        assert!(GIL.owned_by_current_thread());
    })
}

#[test]
fn native_binary_slots_for_both_abis() {
    with_bridge(|vm, _bridge| {
        let c_ext = native_type(
            vm,
            "CExt",
            vec![(SlotKind::NbAdd, native(second as usize, NativeAbi::CExt))],
        );
        let hpy = native_type(
            vm,
            "HPy",
            vec![(SlotKind::NbAdd, native(hpy_second as usize, NativeAbi::HPy))],
        );
        for cls in [c_ext, hpy] {
            let obj = vm.construct(&cls, FuncArgs::default()).unwrap();
            let other = int(vm, 5);
            let result = vm.binary_op(&obj, &other, SlotKind::NbAdd).unwrap();
            assert!(result.is(&other), "{}", cls.name());
        }
    })
}

#[test]
fn native_slots_get_slot_wrappers() {
    with_bridge(|vm, _bridge| {
        let cls = native_type(
            vm,
            "Sized",
            vec![(SlotKind::SqLength, native(seven as usize, NativeAbi::CExt))],
        );
        let len = cls.get_direct_attr("__len__").unwrap();
        assert!(len.payload_is::<PySlotWrapper>());
        let obj = vm.construct(&cls, FuncArgs::default()).unwrap();
        let seven = vm.call(&len, vec![obj]).unwrap();
        assert_eq!(str_of(vm, &seven), "7");

        // a heap subclass resolves `__len__` back to the native function
        let sub = class(vm, "Sub", &[cls.clone()], vec![]);
        let slot = sub.slot(SlotKind::SqLength).unwrap();
        assert_eq!(slot.category(), SlotCategory::Native);
        assert!(slot.is(&cls.slot(SlotKind::SqLength).unwrap()));
    })
}

#[test]
fn native_iternext_exhaustion_and_errors() {
    with_bridge(|vm, _bridge| {
        let done = native_type(
            vm,
            "Done",
            vec![(SlotKind::TpIternext, native(exhausted as usize, NativeAbi::CExt))],
        );
        let it = vm.construct(&done, FuncArgs::default()).unwrap();
        assert!(matches!(vm.next(&it).unwrap(), PyIterReturn::StopIteration(None)));

        let broken = native_type(
            vm,
            "Broken",
            vec![(SlotKind::TpIternext, native(failing as usize, NativeAbi::CExt))],
        );
        let it = vm.construct(&broken, FuncArgs::default()).unwrap();
        let err = vm.next(&it).unwrap_err();
        assert_eq!(err.to_report(), "ValueError: raised in native code");
    })
}

#[test]
fn native_null_result_carries_the_pending_error() {
    with_bridge(|vm, _bridge| {
        let cls = native_type(
            vm,
            "Raiser",
            vec![(SlotKind::NbNegative, native(failing as usize, NativeAbi::CExt))],
        );
        let obj = vm.construct(&cls, FuncArgs::default()).unwrap();
        let err = vm.call_unary_slot(SlotKind::NbNegative, &obj).unwrap_err();
        assert_eq!(err.to_report(), "ValueError: raised in native code");
    })
}

#[test]
#[should_panic(expected = "native ABI violation")]
fn native_error_status_without_exception_is_a_defect() {
    with_bridge(|vm, _bridge| {
        let cls = native_type(
            vm,
            "Liar",
            vec![(SlotKind::SqLength, native(bad_status as usize, NativeAbi::CExt))],
        );
        let obj = vm.construct(&cls, FuncArgs::default()).unwrap();
        let _ = vm.len(&obj);
    })
}

#[test]
#[should_panic(expected = "native ABI violation")]
fn native_hash_error_without_exception_is_a_defect() {
    with_bridge(|vm, _bridge| {
        let cls = native_type(
            vm,
            "BadHash",
            vec![(SlotKind::TpHash, native(bad_status as usize, NativeAbi::CExt))],
        );
        let obj = vm.construct(&cls, FuncArgs::default()).unwrap();
        let _ = vm.hash(&obj);
    })
}

#[test]
fn native_wrappers_for_managed_slots_are_cached() {
    with_bridge(|vm, bridge| {
        let int_hash = vm.ctx.types.int_type.slot(SlotKind::TpHash).unwrap();
        let first = int_hash.to_native(SlotKind::TpHash, vm);
        let second = int_hash.to_native(SlotKind::TpHash, vm);
        assert_eq!(first, second);
        assert_eq!(bridge.wrapped.load(Ordering::SeqCst), 1);

        let native = native(seven as usize, NativeAbi::CExt);
        assert_eq!(
            native.to_native(SlotKind::SqLength, vm),
            NativePtr::from_addr(seven as usize)
        );
        assert_eq!(bridge.wrapped.load(Ordering::SeqCst), 1);
    })
}

#[test]
fn native_types_reject_python_slots() {
    with_bridge(|vm, _bridge| {
        let plain = class(vm, "Plain", &[], vec![("__len__", tag(vm, "__len__", 1, "x"))]);
        let python = plain.slot(SlotKind::SqLength).unwrap();
        let err = vm
            .new_native_type("Mixed", &[], vec![(SlotKind::SqLength, python)])
            .unwrap_err();
        assert!(err.fast_isinstance(&vm.ctx.exceptions.system_error));
    })
}
