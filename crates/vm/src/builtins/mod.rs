//! The builtin types the slot machinery needs to run: the `type`/`object` pair, the few
//! value types operators are exercised on, and the callables user-defined slots hold.
//! 3 common PyRef type aliases are exposed - [`PyIntRef`], [`PyStrRef`], [`PyTupleRef`], plus
//! [`PyTypeRef`]. Do not add more PyRef type aliases.

pub(crate) mod descriptor;
pub use descriptor::PySlotWrapper;
pub(crate) mod function;
pub use function::{PyBoundMethod, PyFunction};
pub(crate) mod int;
pub use int::{PyInt, PyIntRef};
pub(crate) mod object;
pub use object::PyBaseObject;
#[path = "str.rs"]
pub(crate) mod pystr;
pub use pystr::{PyStr, PyStrRef};
#[path = "type.rs"]
pub(crate) mod type_;
pub use type_::{PyType, PyTypeRef};
pub(crate) mod singletons;
pub use singletons::{PyNone, PyNotImplemented};
pub(crate) mod staticmethod;
pub use staticmethod::PyStaticMethod;
pub(crate) mod tuple;
pub use tuple::{PyTuple, PyTupleIterator, PyTupleRef};

pub use crate::exceptions::{PyBaseException, PyBaseExceptionRef};
