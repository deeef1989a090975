use super::VirtualMachine;
use crate::{
    PyObjectRef, PyResult,
    builtins::{PyInt, PyIntRef, PyStr, PyStrRef},
    function::PySetterValue,
    types::{PyComparisonOp, SlotKind, SlotValue},
};

/// PyObject support
impl VirtualMachine {
    #[inline]
    pub fn is_none(&self, obj: &PyObjectRef) -> bool {
        obj.is(&self.ctx.none())
    }

    #[inline]
    pub fn is_not_implemented(&self, obj: &PyObjectRef) -> bool {
        obj.is(&self.ctx.not_implemented())
    }

    pub fn none_to_option(&self, obj: &PyObjectRef) -> Option<PyObjectRef> {
        (!self.is_none(obj)).then(|| obj.clone())
    }

    pub fn unwrap_or_none(&self, obj: Option<PyObjectRef>) -> PyObjectRef {
        obj.unwrap_or_else(|| self.ctx.none())
    }

    /// `operator.index(obj)`: an int as is, anything else through its `nb_index` slot.
    pub fn to_index(&self, obj: &PyObjectRef) -> PyResult<PyIntRef> {
        if let Some(int) = obj.downcast_ref::<PyInt>() {
            return Ok(int);
        }
        let Some(slot) = obj.class().slot(SlotKind::NbIndex) else {
            return Err(self.new_type_error(format!(
                "'{}' object cannot be interpreted as an integer",
                obj.class().name()
            )));
        };
        let result = self
            .sites
            .unary
            .get(SlotKind::NbIndex)
            .execute(self, &slot, obj)?;
        result.downcast::<PyInt>().map_err(|result| {
            self.new_type_error(format!(
                "__index__ returned non-int (type {})",
                result.class().name()
            ))
        })
    }

    pub fn to_isize(&self, obj: &PyObjectRef) -> PyResult<isize> {
        let index = self.to_index(obj)?;
        index.to_isize().ok_or_else(|| {
            self.new_overflow_error(format!(
                "cannot fit '{}' into an index-sized integer",
                obj.class().name()
            ))
        })
    }

    pub fn attribute_name(&self, obj: &PyObjectRef) -> PyResult<PyStrRef> {
        obj.downcast_ref::<PyStr>().ok_or_else(|| {
            self.new_type_error(format!(
                "attribute name must be string, not '{}'",
                obj.class().name()
            ))
        })
    }

    /// Whether `obj`'s type fills `tp_descr_set`.
    pub fn is_data_descriptor(&self, obj: &PyObjectRef) -> bool {
        obj.class().slots().get(SlotKind::TpDescrSet).is_some()
    }

    /// Bind `descr` through its type's `tp_descr_get`. `None` when it is not a descriptor.
    pub fn get_descriptor(
        &self,
        descr: &PyObjectRef,
        obj: Option<PyObjectRef>,
        cls: Option<PyObjectRef>,
    ) -> Option<PyResult> {
        let slot = descr.class().slot(SlotKind::TpDescrGet)?;
        Some(self.sites.descr_get.execute(self, &slot, descr, obj, cls))
    }

    pub fn call_descr_set(
        &self,
        slot: &SlotValue,
        descr: &PyObjectRef,
        obj: PyObjectRef,
        value: PySetterValue,
    ) -> PyResult<()> {
        self.sites.descr_set.execute(self, slot, descr, &obj, value)
    }

    pub fn call_richcompare_slot(
        &self,
        slot: &SlotValue,
        a: &PyObjectRef,
        b: &PyObjectRef,
        op: PyComparisonOp,
    ) -> PyResult {
        self.sites.richcompare.execute(self, slot, a, b, op)
    }

    /// Call a unary slot of `obj`'s type, like `-obj` or `abs(obj)`.
    pub fn call_unary_slot(&self, kind: SlotKind, obj: &PyObjectRef) -> PyResult {
        let Some(slot) = obj.class().slot(kind) else {
            return Err(self.new_unsupported_unary_error(obj, kind.operator_symbol()));
        };
        self.sites.unary.get(kind).execute(self, &slot, obj)
    }

    pub fn repr(&self, obj: &PyObjectRef) -> PyResult<PyStrRef> {
        self.string_slot(obj, SlotKind::TpRepr, "__repr__")
    }

    pub fn str(&self, obj: &PyObjectRef) -> PyResult<PyStrRef> {
        if obj.class().is(&self.ctx.types.str_type)
            && let Some(s) = obj.downcast_ref::<PyStr>()
        {
            return Ok(s);
        }
        if obj.class().slots().get(SlotKind::TpStr).is_none() {
            return self.repr(obj);
        }
        self.string_slot(obj, SlotKind::TpStr, "__str__")
    }

    fn string_slot(&self, obj: &PyObjectRef, kind: SlotKind, name: &str) -> PyResult<PyStrRef> {
        let Some(slot) = obj.class().slot(kind) else {
            return Ok(self.ctx.new_str(format!(
                "<{} object at {:#x}>",
                obj.class().name(),
                obj.get_id()
            )));
        };
        let result = self.sites.unary.get(kind).execute(self, &slot, obj)?;
        result.downcast::<PyStr>().map_err(|result| {
            self.new_type_error(format!(
                "{name} returned non-string (type {})",
                result.class().name()
            ))
        })
    }
}
