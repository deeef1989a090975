use crate::{PyObjectRef, PyResult, VirtualMachine};

/// Result of advancing an iterator. `StopIteration` is the exhausted sentinel; it only becomes a
/// `StopIteration` exception through [`PyIterReturn::into_result`].
#[derive(Debug, Clone)]
pub enum PyIterReturn<T = PyObjectRef> {
    Return(T),
    StopIteration(Option<PyObjectRef>),
}

impl PyIterReturn {
    /// Treat a raised `StopIteration` as exhaustion; other errors propagate.
    pub fn from_pyresult(result: PyResult, vm: &VirtualMachine) -> PyResult<Self> {
        match result {
            Ok(obj) => Ok(Self::Return(obj)),
            Err(err) if err.fast_isinstance(&vm.ctx.exceptions.stop_iteration) => {
                Ok(Self::StopIteration(err.get_arg(0)))
            }
            Err(err) => Err(err),
        }
    }

    pub fn into_result(self, vm: &VirtualMachine) -> PyResult {
        match self {
            Self::Return(obj) => Ok(obj),
            Self::StopIteration(v) => Err(vm.new_stop_iteration(v)),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::StopIteration(_))
    }
}

impl<T> PyIterReturn<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> PyIterReturn<U> {
        match self {
            Self::Return(v) => PyIterReturn::Return(f(v)),
            Self::StopIteration(v) => PyIterReturn::StopIteration(v),
        }
    }
}

/// Rust iterator over a Python iterator, advancing through its `tp_iternext` slot.
pub struct PyIterIter<'a> {
    vm: &'a VirtualMachine,
    obj: PyObjectRef,
    done: bool,
}

impl<'a> PyIterIter<'a> {
    pub fn new(vm: &'a VirtualMachine, obj: PyObjectRef) -> Self {
        Self {
            vm,
            obj,
            done: false,
        }
    }
}

impl Iterator for PyIterIter<'_> {
    type Item = PyResult;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.vm.next(&self.obj) {
            Ok(PyIterReturn::Return(obj)) => Some(Ok(obj)),
            Ok(PyIterReturn::StopIteration(_)) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
