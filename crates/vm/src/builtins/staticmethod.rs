use super::PyTypeRef;
use crate::{
    Context, PyObjectRef, PyPayload, PyRef, PyResult, VirtualMachine,
    common::lock::PyMutex,
    function::FuncArgs,
    types::{BuiltinSlot, BuiltinSlotFunc, PyTypeFlags, SlotKind},
};

#[derive(Debug)]
pub struct PyStaticMethod {
    pub callable: PyMutex<PyObjectRef>,
}

impl PyPayload for PyStaticMethod {
    #[inline]
    fn class(ctx: &Context) -> &PyTypeRef {
        &ctx.types.staticmethod_type
    }
}

impl From<PyObjectRef> for PyStaticMethod {
    fn from(callable: PyObjectRef) -> Self {
        Self {
            callable: PyMutex::new(callable),
        }
    }
}

impl PyStaticMethod {
    pub fn new(callable: PyObjectRef) -> Self {
        Self::from(callable)
    }

    pub fn callable(&self) -> PyObjectRef {
        self.callable.lock().clone()
    }
}

fn staticmethod_descr_get(
    zelf: PyObjectRef,
    _obj: Option<PyObjectRef>,
    _cls: Option<PyObjectRef>,
    vm: &VirtualMachine,
) -> PyResult {
    match zelf.payload::<PyStaticMethod>() {
        Some(sm) => Ok(sm.callable()),
        None => Err(vm.new_type_error("descriptor '__get__' requires a 'staticmethod' object")),
    }
}

fn staticmethod_new(cls: PyTypeRef, args: FuncArgs, vm: &VirtualMachine) -> PyResult {
    let [callable] = args.positional::<1>("staticmethod", vm)?;
    let dict = cls
        .flags
        .has_feature(PyTypeFlags::HAS_DICT)
        .then(Default::default);
    Ok(PyRef::new_ref(PyStaticMethod::new(callable.clone()), cls, dict).into())
}

pub static STATICMETHOD_DESCR_GET: BuiltinSlot = BuiltinSlot::new(
    "staticmethod",
    SlotKind::TpDescrGet,
    BuiltinSlotFunc::DescrGet(staticmethod_descr_get),
);
pub static STATICMETHOD_NEW: BuiltinSlot = BuiltinSlot::new(
    "staticmethod",
    SlotKind::TpNew,
    BuiltinSlotFunc::New(staticmethod_new),
);

pub(crate) static STATICMETHOD_SLOTS: [&BuiltinSlot; 2] =
    [&STATICMETHOD_DESCR_GET, &STATICMETHOD_NEW];
