//! Virtual method slot tables and their dispatch.
//!
//! Every type carries a [`types::SlotTable`]: one [`types::SlotValue`] per
//! [`types::SlotKind`], telling how the runtime performs that operation on the type's
//! instances. A slot is a builtin Rust function, a user callable found in the type's namespace,
//! or a native extension function. [`dispatch`] holds the per-operation call-site nodes that
//! run a slot of any of the three kinds, and [`VirtualMachine`] exposes the operator entry
//! points built on them.
//!
//! Slot tables are computed when a type is created and updated whenever a slot-relevant
//! attribute of the type or of one of its bases changes.

// to allow `mod foo {}` in foo.rs; clippy thinks this is a mistake/misunderstanding of
// how `mod` works, but we want this sometimes for pymodule declarations
#![allow(clippy::module_inception)]
// we want to mirror python naming conventions when defining python structs, so that does mean
// uppercase acronyms, e.g. TextIOWrapper instead of TextIoWrapper
#![allow(clippy::upper_case_acronyms)]


pub mod builtins;
pub mod dispatch;
pub mod exceptions;
pub mod function;
pub mod gil;
pub mod native;
pub mod object;
pub mod protocol;
pub mod types;
pub mod vm;

pub use self::object::{
    PyAttributes, PyObject, PyObjectPayload, PyObjectRef, PyPayload, PyRef, PyResult, PyWeak,
};
pub use self::vm::{Context, Interpreter, Settings, VirtualMachine};

pub use pyslot_common as common;
