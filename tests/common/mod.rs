#![allow(dead_code)]

use pyslot::pyslot_vm::{
    PyAttributes, PyObjectRef, PyPayload, PyResult, VirtualMachine,
    builtins::{PyBaseExceptionRef, PyFunction, PyTypeRef},
    function::Signature,
};

pub fn func<F>(vm: &VirtualMachine, name: &str, params: &[&str], body: F) -> PyObjectRef
where
    F: Fn(&VirtualMachine, &[PyObjectRef]) -> PyResult + Send + Sync + 'static,
{
    PyFunction::new(Signature::new(name, params), body).into_pyobject(&vm.ctx)
}

/// A method returning a fixed string, to see which one ran.
pub fn tag(vm: &VirtualMachine, name: &str, nparams: usize, text: &'static str) -> PyObjectRef {
    let params = ["self", "a", "b", "c"];
    func(vm, name, &params[..nparams], move |vm, _args| {
        Ok(vm.ctx.new_str(text).into())
    })
}

pub fn class(
    vm: &VirtualMachine,
    name: &str,
    bases: &[PyTypeRef],
    methods: Vec<(&str, PyObjectRef)>,
) -> PyTypeRef {
    let namespace: PyAttributes = methods
        .into_iter()
        .map(|(name, value)| (name.to_owned(), value))
        .collect();
    vm.new_class(name, bases, namespace).unwrap()
}

pub fn instance(vm: &VirtualMachine, cls: &PyTypeRef) -> PyObjectRef {
    vm.call(&cls.to_object(), Vec::new()).unwrap()
}

pub fn int(vm: &VirtualMachine, value: i64) -> PyObjectRef {
    vm.ctx.new_int(value).into()
}

pub fn str_of(vm: &VirtualMachine, obj: &PyObjectRef) -> String {
    vm.str(obj).unwrap().as_str().to_owned()
}

pub fn assert_exc(vm: &VirtualMachine, err: &PyBaseExceptionRef, typ: &PyTypeRef, message: &str) {
    assert!(
        err.fast_isinstance(typ),
        "expected {}, got {}",
        typ.name(),
        err.to_report()
    );
    assert_eq!(err.message(), message);
    let _ = vm;
}
