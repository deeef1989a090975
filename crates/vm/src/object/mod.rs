mod core;
mod payload;

pub use self::core::{PyAttributes, PyInner, PyObject, PyObjectRef, PyRef, PyWeak};
pub use self::payload::{PyObjectPayload, PyPayload};

use crate::builtins::PyBaseExceptionRef;

pub type PyResult<T = PyObjectRef> = Result<T, PyBaseExceptionRef>;
