use super::PyTypeRef;
use crate::{
    Context, PyObjectRef, PyPayload, PyRef, PyResult, VirtualMachine,
    function::{FuncArgs, Signature},
    types::{BuiltinSlot, BuiltinSlotFunc, SlotKind},
};
use core::fmt;
use std::sync::Arc;

/// Body of a user function: receives the bound positional parameters in declaration order.
pub type FunctionBody = dyn Fn(&VirtualMachine, &[PyObjectRef]) -> PyResult + Send + Sync;

/// A user-defined function of the managed language. The body stands in for compiled code.
pub struct PyFunction {
    signature: Signature,
    body: Arc<FunctionBody>,
}

impl fmt::Debug for PyFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<function {}>", self.signature.name())
    }
}

impl PyPayload for PyFunction {
    #[inline]
    fn class(ctx: &Context) -> &PyTypeRef {
        &ctx.types.function_type
    }
}

impl PyFunction {
    pub fn new<F>(signature: Signature, body: F) -> Self
    where
        F: Fn(&VirtualMachine, &[PyObjectRef]) -> PyResult + Send + Sync + 'static,
    {
        Self {
            signature,
            body: Arc::new(body),
        }
    }

    #[inline]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.signature.name()
    }

    /// Call with arguments that already match the signature exactly.
    #[inline]
    pub fn invoke_exact(&self, args: &[PyObjectRef], vm: &VirtualMachine) -> PyResult {
        debug_assert!(self.signature.matches_exactly(args.len()));
        (self.body)(vm, args)
    }

    /// Call with full argument binding.
    pub fn invoke(&self, args: FuncArgs, vm: &VirtualMachine) -> PyResult {
        if !args.has_kwargs() && self.signature.matches_exactly(args.args.len()) {
            return (self.body)(vm, &args.args);
        }
        let bound = self.signature.bind(vm, &args)?;
        (self.body)(vm, &bound)
    }
}

fn function_call(zelf: &PyObjectRef, args: FuncArgs, vm: &VirtualMachine) -> PyResult {
    match zelf.payload::<PyFunction>() {
        Some(func) => func.invoke(args, vm),
        None => Err(vm.new_type_error("descriptor '__call__' requires a 'function' object")),
    }
}

fn function_descr_get(
    zelf: PyObjectRef,
    obj: Option<PyObjectRef>,
    _cls: Option<PyObjectRef>,
    vm: &VirtualMachine,
) -> PyResult {
    match obj {
        None => Ok(zelf),
        Some(obj) if vm.is_none(&obj) => Ok(zelf),
        Some(obj) => Ok(PyBoundMethod::new(obj, zelf).into_pyobject(&vm.ctx)),
    }
}

fn function_repr(zelf: &PyObjectRef, vm: &VirtualMachine) -> PyResult {
    let name = zelf.payload::<PyFunction>().map_or("?", PyFunction::name);
    Ok(vm
        .ctx
        .new_str(format!("<function {name} at {:#x}>", zelf.get_id()))
        .into())
}

/// A callable with its receiver already bound as the first argument.
#[derive(Debug)]
pub struct PyBoundMethod {
    object: PyObjectRef,
    function: PyObjectRef,
}

impl PyPayload for PyBoundMethod {
    #[inline]
    fn class(ctx: &Context) -> &PyTypeRef {
        &ctx.types.bound_method_type
    }
}

impl PyBoundMethod {
    pub const fn new(object: PyObjectRef, function: PyObjectRef) -> Self {
        Self { object, function }
    }

    pub fn new_ref(object: PyObjectRef, function: PyObjectRef, ctx: &Context) -> PyRef<Self> {
        Self::new(object, function).into_ref(ctx)
    }

    #[inline]
    pub fn receiver(&self) -> &PyObjectRef {
        &self.object
    }

    #[inline]
    pub fn function(&self) -> &PyObjectRef {
        &self.function
    }
}

fn bound_method_call(zelf: &PyObjectRef, mut args: FuncArgs, vm: &VirtualMachine) -> PyResult {
    let Some(method) = zelf.payload::<PyBoundMethod>() else {
        return Err(vm.new_type_error("descriptor '__call__' requires a 'method' object"));
    };
    args.prepend_arg(method.object.clone());
    vm.call(&method.function, args)
}

fn bound_method_repr(zelf: &PyObjectRef, vm: &VirtualMachine) -> PyResult {
    let Some(method) = zelf.payload::<PyBoundMethod>() else {
        return Err(vm.new_type_error("descriptor '__repr__' requires a 'method' object"));
    };
    let func_name = match method.function.payload::<PyFunction>() {
        Some(func) => func.name().to_owned(),
        None => "?".to_owned(),
    };
    let receiver = vm.repr(&method.object)?;
    Ok(vm
        .ctx
        .new_str(format!("<bound method {func_name} of {}>", receiver.as_str()))
        .into())
}

pub static FUNCTION_CALL: BuiltinSlot =
    BuiltinSlot::new("function", SlotKind::TpCall, BuiltinSlotFunc::Call(function_call));
pub static FUNCTION_DESCR_GET: BuiltinSlot = BuiltinSlot::new(
    "function",
    SlotKind::TpDescrGet,
    BuiltinSlotFunc::DescrGet(function_descr_get),
);
pub static FUNCTION_REPR: BuiltinSlot =
    BuiltinSlot::new("function", SlotKind::TpRepr, BuiltinSlotFunc::Unary(function_repr));

pub static BOUND_METHOD_CALL: BuiltinSlot = BuiltinSlot::new(
    "method",
    SlotKind::TpCall,
    BuiltinSlotFunc::Call(bound_method_call),
);
pub static BOUND_METHOD_REPR: BuiltinSlot = BuiltinSlot::new(
    "method",
    SlotKind::TpRepr,
    BuiltinSlotFunc::Unary(bound_method_repr),
);

pub(crate) static FUNCTION_SLOTS: [&BuiltinSlot; 3] =
    [&FUNCTION_CALL, &FUNCTION_DESCR_GET, &FUNCTION_REPR];
pub(crate) static BOUND_METHOD_SLOTS: [&BuiltinSlot; 2] = [&BOUND_METHOD_CALL, &BOUND_METHOD_REPR];
