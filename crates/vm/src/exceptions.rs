//! The exception hierarchy raised from Rust code.

use crate::{
    Context, PyObjectRef, PyPayload, PyRef, PyResult, VirtualMachine,
    builtins::{PyInt, PyStr, PyType, PyTypeRef},
    common::lock::PyRwLock,
    function::FuncArgs,
    types::{BuiltinSlot, BuiltinSlotFunc, PyTypeFlags, SlotKind},
};
use core::fmt;

pub struct PyBaseException {
    args: PyRwLock<Vec<PyObjectRef>>,
}

pub type PyBaseExceptionRef = PyRef<PyBaseException>;

impl fmt::Debug for PyBaseException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PyBaseException")
    }
}

impl PyPayload for PyBaseException {
    #[inline]
    fn class(ctx: &Context) -> &PyTypeRef {
        &ctx.exceptions.base_exception_type
    }
}

impl PyBaseException {
    pub(crate) fn new(args: Vec<PyObjectRef>) -> Self {
        Self {
            args: PyRwLock::new(args),
        }
    }

    pub fn args(&self) -> Vec<PyObjectRef> {
        self.args.read().clone()
    }

    pub fn get_arg(&self, idx: usize) -> Option<PyObjectRef> {
        self.args.read().get(idx).cloned()
    }

    /// The first argument as text, or an empty string.
    pub fn message(&self) -> String {
        match self.get_arg(0) {
            Some(arg) => arg_to_string(&arg),
            None => String::new(),
        }
    }
}

fn arg_to_string(arg: &PyObjectRef) -> String {
    if let Some(s) = arg.payload::<PyStr>() {
        s.as_str().to_owned()
    } else if let Some(i) = arg.payload::<PyInt>() {
        i.to_string()
    } else {
        format!("<{} object>", arg.class().name())
    }
}

impl fmt::Display for PyBaseException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl PyRef<PyBaseException> {
    /// `"TypeError: message"`, the way an uncaught exception is reported.
    pub fn to_report(&self) -> String {
        let message = self.message();
        if message.is_empty() {
            self.class().name().to_owned()
        } else {
            format!("{}: {message}", self.class().name())
        }
    }
}

pub struct ExceptionZoo {
    pub base_exception_type: PyTypeRef,
    pub exception_type: PyTypeRef,
    pub stop_iteration: PyTypeRef,
    pub arithmetic_error: PyTypeRef,
    pub overflow_error: PyTypeRef,
    pub zero_division_error: PyTypeRef,
    pub attribute_error: PyTypeRef,
    pub lookup_error: PyTypeRef,
    pub index_error: PyTypeRef,
    pub runtime_error: PyTypeRef,
    pub system_error: PyTypeRef,
    pub type_error: PyTypeRef,
    pub value_error: PyTypeRef,
}

impl ExceptionZoo {
    pub(crate) fn init(object_type: &PyTypeRef, type_type: &PyTypeRef) -> Self {
        let flags = PyTypeFlags::BASETYPE | PyTypeFlags::HAS_DICT;
        let new = |name: &str, base: &PyTypeRef, declared: &[&'static BuiltinSlot]| {
            PyType::new_static(name, Some(base), declared, flags, Some(type_type))
        };

        let base_exception_type = new("BaseException", object_type, &BASE_EXCEPTION_SLOTS);

        // Sorted By Hierarchy then alphabetized.
        let exception_type = new("Exception", &base_exception_type, &[]);
        let stop_iteration = new("StopIteration", &exception_type, &[]);
        let arithmetic_error = new("ArithmeticError", &exception_type, &[]);
        let overflow_error = new("OverflowError", &arithmetic_error, &[]);
        let zero_division_error = new("ZeroDivisionError", &arithmetic_error, &[]);
        let attribute_error = new("AttributeError", &exception_type, &[]);
        let lookup_error = new("LookupError", &exception_type, &[]);
        let index_error = new("IndexError", &lookup_error, &[]);
        let runtime_error = new("RuntimeError", &exception_type, &[]);
        let system_error = new("SystemError", &exception_type, &[]);
        let type_error = new("TypeError", &exception_type, &[]);
        let value_error = new("ValueError", &exception_type, &[]);

        Self {
            base_exception_type,
            exception_type,
            stop_iteration,
            arithmetic_error,
            overflow_error,
            zero_division_error,
            attribute_error,
            lookup_error,
            index_error,
            runtime_error,
            system_error,
            type_error,
            value_error,
        }
    }

    /// Every exception type, bases before subclasses.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &PyTypeRef> {
        [
            &self.base_exception_type,
            &self.exception_type,
            &self.stop_iteration,
            &self.arithmetic_error,
            &self.overflow_error,
            &self.zero_division_error,
            &self.attribute_error,
            &self.lookup_error,
            &self.index_error,
            &self.runtime_error,
            &self.system_error,
            &self.type_error,
            &self.value_error,
        ]
        .into_iter()
    }
}

fn base_exception_new(cls: PyTypeRef, args: FuncArgs, vm: &VirtualMachine) -> PyResult {
    if let Some(err) = args.check_kwargs_empty(vm) {
        return Err(err);
    }
    let dict = cls
        .flags
        .has_feature(PyTypeFlags::HAS_DICT)
        .then(Default::default);
    Ok(PyRef::new_ref(PyBaseException::new(args.args), cls, dict).into())
}

fn base_exception_init(zelf: PyObjectRef, args: FuncArgs, vm: &VirtualMachine) -> PyResult<()> {
    let Some(exc) = zelf.payload::<PyBaseException>() else {
        return Err(vm.new_type_error("descriptor '__init__' requires a 'BaseException' object"));
    };
    *exc.args.write() = args.args;
    Ok(())
}

fn base_exception_repr(zelf: &PyObjectRef, vm: &VirtualMachine) -> PyResult {
    let Some(exc) = zelf.payload::<PyBaseException>() else {
        return Err(vm.new_type_error("descriptor '__repr__' requires a 'BaseException' object"));
    };
    let mut parts = Vec::new();
    for arg in exc.args() {
        parts.push(vm.repr(&arg)?.as_str().to_owned());
    }
    let repr = format!("{}({})", zelf.class().name(), parts.join(", "));
    Ok(vm.ctx.new_str(repr).into())
}

fn base_exception_str(zelf: &PyObjectRef, vm: &VirtualMachine) -> PyResult {
    let Some(exc) = zelf.payload::<PyBaseException>() else {
        return Err(vm.new_type_error("descriptor '__str__' requires a 'BaseException' object"));
    };
    let args = exc.args();
    match args.as_slice() {
        [] => Ok(vm.ctx.new_str("").into()),
        [arg] => vm.str(arg).map(Into::into),
        _ => {
            let tuple: PyObjectRef = vm.ctx.new_tuple(args).into();
            vm.repr(&tuple).map(Into::into)
        }
    }
}

pub static BASE_EXCEPTION_NEW: BuiltinSlot = BuiltinSlot::new(
    "BaseException",
    SlotKind::TpNew,
    BuiltinSlotFunc::New(base_exception_new),
);
pub static BASE_EXCEPTION_INIT: BuiltinSlot = BuiltinSlot::new(
    "BaseException",
    SlotKind::TpInit,
    BuiltinSlotFunc::Init(base_exception_init),
);
pub static BASE_EXCEPTION_REPR: BuiltinSlot = BuiltinSlot::new(
    "BaseException",
    SlotKind::TpRepr,
    BuiltinSlotFunc::Unary(base_exception_repr),
);
pub static BASE_EXCEPTION_STR: BuiltinSlot = BuiltinSlot::new(
    "BaseException",
    SlotKind::TpStr,
    BuiltinSlotFunc::Unary(base_exception_str),
);

pub(crate) static BASE_EXCEPTION_SLOTS: [&BuiltinSlot; 4] = [
    &BASE_EXCEPTION_NEW,
    &BASE_EXCEPTION_INIT,
    &BASE_EXCEPTION_REPR,
    &BASE_EXCEPTION_STR,
];
