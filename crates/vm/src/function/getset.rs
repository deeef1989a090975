use crate::{PyObjectRef, VirtualMachine};

/// Value passed to a setter-shaped slot; `Delete` selects the deleting callable.
#[derive(Debug, Clone)]
pub enum PySetterValue<T = PyObjectRef> {
    Assign(T),
    Delete,
}

impl PySetterValue {
    pub fn unwrap_or_none(self, vm: &VirtualMachine) -> PyObjectRef {
        match self {
            Self::Assign(value) => value,
            Self::Delete => vm.ctx.none(),
        }
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, Self::Delete)
    }
}

impl<T> PySetterValue<T> {
    pub fn as_option(&self) -> Option<&T> {
        match self {
            Self::Assign(value) => Some(value),
            Self::Delete => None,
        }
    }
}

impl<T> From<Option<T>> for PySetterValue<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Self::Assign(value),
            None => Self::Delete,
        }
    }
}
