use super::core::{PyObjectRef, PyRef};
use crate::{builtins::PyTypeRef, vm::Context};
use core::{any::Any, fmt::Debug};

/// Object-safe view of a payload, used by the erased [`crate::PyObject`].
pub trait PyObjectPayload: Any + Send + Sync + Debug {
    fn as_any(&self) -> &dyn Any;
}

impl<T: PyPayload> PyObjectPayload for T {
    #[inline]
    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub trait PyPayload: Any + Send + Sync + Debug + Sized + 'static {
    fn class(ctx: &Context) -> &PyTypeRef;

    #[inline]
    fn into_ref(self, ctx: &Context) -> PyRef<Self> {
        PyRef::new_ref(self, Self::class(ctx).clone(), None)
    }

    #[inline]
    fn into_pyobject(self, ctx: &Context) -> PyObjectRef {
        self.into_ref(ctx).into()
    }
}
