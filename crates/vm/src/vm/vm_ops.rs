use super::VirtualMachine;
use crate::{
    PyObjectRef, PyResult,
    builtins::{PyStrRef, PyTypeRef, object},
    common::hash::PyHash,
    function::{FuncArgs, PySetterValue},
    protocol::PyIterReturn,
    types::{PyComparisonOp, SlotKind, SlotValue},
};

/// Two user-defined slots of one operator are the same slot: either one already tries
/// `__op__` of the left operand and `__rop__` of the right one.
fn same_binary_slot(x: &SlotValue, y: &SlotValue) -> bool {
    matches!((x, y), (SlotValue::Python(_), SlotValue::Python(_))) || x.is(y)
}

/// Collection of operators
impl VirtualMachine {
    /// Resolution order shared by the reversible number slots:
    ///
    /// Order operations are tried until either a valid result or error:
    ///   `b.rop(b,a)[*], a.op(a,b), b.rop(b,a)`
    ///
    /// `[*]` - only when type(a) != type(b) && type(b) is a subclass of type(a)
    fn reflected_op<F>(&self, a: &PyObjectRef, b: &PyObjectRef, kind: SlotKind, call: F) -> PyResult
    where
        F: Fn(&SlotValue, bool) -> PyResult,
    {
        let class_a = a.class();
        let class_b = b.class();
        let same_types = class_a.is(class_b);

        // slots are inherited, direct access is O(1)
        let slots_a = class_a.slots();
        let slots_b = class_b.slots();
        let slot_a = slots_a.get(kind);
        let mut slot_b = None;

        if !same_types {
            let slot_bb = slots_b.get(kind);
            if !matches!((slot_a, slot_bb), (Some(x), Some(y)) if same_binary_slot(x, y)) {
                slot_b = slot_bb;
            }
        }

        if let Some(slot_a) = slot_a {
            if let Some(slot_bb) = slot_b
                && class_b.fast_issubclass(class_a)
            {
                let ret = call(slot_bb, same_types)?;
                if !self.is_not_implemented(&ret) {
                    return Ok(ret);
                }
                slot_b = None;
            }
            let ret = call(slot_a, same_types)?;
            if !self.is_not_implemented(&ret) {
                return Ok(ret);
            }
        }

        if let Some(slot_b) = slot_b {
            let ret = call(slot_b, same_types)?;
            if !self.is_not_implemented(&ret) {
                return Ok(ret);
            }
        }

        Ok(self.ctx.not_implemented())
    }

    /// A reversible binary number slot. `NotImplemented` when neither operand supports it.
    pub fn binary_op1(&self, a: &PyObjectRef, b: &PyObjectRef, kind: SlotKind) -> PyResult {
        if kind == SlotKind::NbPower {
            return self.power_op1(a, b, &self.ctx.none());
        }
        let node = self.sites.binary_op.get(kind);
        self.reflected_op(a, b, kind, |slot, same_types| {
            node.execute(self, slot, a, b, same_types)
        })
    }

    /// `a <op> b`, with the sequence fallbacks of `+` and `*`.
    pub fn binary_op(&self, a: &PyObjectRef, b: &PyObjectRef, kind: SlotKind) -> PyResult {
        let result = self.binary_op1(a, b, kind)?;
        if !self.is_not_implemented(&result) {
            return Ok(result);
        }
        let fallback = match kind {
            SlotKind::NbAdd => self.sequence_concat(a, b, SlotKind::SqConcat)?,
            SlotKind::NbMultiply => self.sequence_repeat(a, b, SlotKind::SqRepeat)?,
            _ => None,
        };
        match fallback {
            Some(result) => Ok(result),
            None => Err(self.new_unsupported_bin_op_error(a, b, kind.operator_symbol())),
        }
    }

    /// Binary in-place operators
    ///
    /// The in-place operators are defined to fall back to the 'normal',
    /// non in-place operations, if the in-place methods are not in place.
    ///
    /// - If the left hand object fills the in-place slot, call it and return the result
    ///   unless it is `NotImplemented`. No coercion is done on the arguments.
    ///
    /// - Otherwise, handle it exactly as a non in-place operation of the same kind.
    pub fn binary_iop(&self, a: &PyObjectRef, b: &PyObjectRef, iop: SlotKind) -> PyResult {
        let Some(op) = iop.inplace_counterpart() else {
            panic!("{} is not an in-place number slot", iop.name());
        };
        if let Some(slot) = a.class().slots().get(iop) {
            let x = self.sites.binary_func.get(iop).execute(self, slot, a, b)?;
            if !self.is_not_implemented(&x) {
                return Ok(x);
            }
        }
        let result = self.binary_op1(a, b, op)?;
        if !self.is_not_implemented(&result) {
            return Ok(result);
        }
        let fallback = match iop {
            SlotKind::NbInplaceAdd => match self.sequence_concat(a, b, SlotKind::SqInplaceConcat)? {
                Some(result) => Some(result),
                None => self.sequence_concat(a, b, SlotKind::SqConcat)?,
            },
            SlotKind::NbInplaceMultiply => {
                match self.sequence_repeat(a, b, SlotKind::SqInplaceRepeat)? {
                    Some(result) => Some(result),
                    None => self.sequence_repeat(a, b, SlotKind::SqRepeat)?,
                }
            }
            _ => None,
        };
        match fallback {
            Some(result) => Ok(result),
            None => Err(self.new_unsupported_bin_op_error(a, b, iop.operator_symbol())),
        }
    }

    fn power_op1(&self, a: &PyObjectRef, b: &PyObjectRef, modulus: &PyObjectRef) -> PyResult {
        let node = &self.sites.power;
        if self.is_none(modulus) {
            return self.reflected_op(a, b, SlotKind::NbPower, |slot, same_types| {
                node.execute(self, slot, a, b, modulus, same_types)
            });
        }
        // three-argument pow never reflects: type(b) only stands in when type(a) has no slot
        let same_types = a.class().is(b.class());
        let slot = a
            .class()
            .slot(SlotKind::NbPower)
            .or_else(|| b.class().slot(SlotKind::NbPower));
        match slot {
            Some(slot) => node.execute(self, &slot, a, b, modulus, same_types),
            None => Ok(self.ctx.not_implemented()),
        }
    }

    /// `pow(a, b, modulus)`; pass `None` for `a ** b`.
    pub fn ternary_op(&self, a: &PyObjectRef, b: &PyObjectRef, modulus: &PyObjectRef) -> PyResult {
        let result = self.power_op1(a, b, modulus)?;
        if !self.is_not_implemented(&result) {
            return Ok(result);
        }
        let op = SlotKind::NbPower.operator_symbol();
        Err(if self.is_none(modulus) {
            self.new_unsupported_bin_op_error(a, b, op)
        } else {
            self.new_unsupported_ternary_op_error(a, b, modulus, op)
        })
    }

    fn sequence_concat(
        &self,
        a: &PyObjectRef,
        b: &PyObjectRef,
        kind: SlotKind,
    ) -> PyResult<Option<PyObjectRef>> {
        let Some(slot) = a.class().slot(kind) else {
            return Ok(None);
        };
        let result = self.sites.binary_func.get(kind).execute(self, &slot, a, b)?;
        Ok((!self.is_not_implemented(&result)).then_some(result))
    }

    /// `seq * n` or `n * seq` through the sequence's repeat slot.
    fn sequence_repeat(
        &self,
        a: &PyObjectRef,
        b: &PyObjectRef,
        kind: SlotKind,
    ) -> PyResult<Option<PyObjectRef>> {
        let has_index = |obj: &PyObjectRef| obj.class().slots().get(SlotKind::NbIndex).is_some();
        let (seq, count) = match (a.class().slot(kind), b.class().slot(kind)) {
            (Some(slot), _) if has_index(b) => ((a, slot), b),
            // `n * seq` never repeats in place
            (_, Some(_)) if kind == SlotKind::SqInplaceRepeat => return Ok(None),
            (_, Some(slot)) if has_index(a) => ((b, slot), a),
            (Some(_), _) => {
                return Err(self.new_type_error(format!(
                    "can't multiply sequence by non-int of type '{}'",
                    b.class().name()
                )));
            }
            _ => return Ok(None),
        };
        let n = self.to_isize(count)?;
        let (seq, slot) = seq;
        self.sites.size_arg.get(kind).execute(self, &slot, seq, n).map(Some)
    }

    /// Rich comparison, `a <op> b`. `==` and `!=` fall back to identity.
    pub fn rich_compare(&self, a: &PyObjectRef, b: &PyObjectRef, op: PyComparisonOp) -> PyResult {
        let node = &self.sites.richcompare;
        let class_a = a.class();
        let class_b = b.class();
        let slots_a = class_a.slots();
        let slots_b = class_b.slots();
        let slot_a = slots_a.get(SlotKind::TpRichcompare);
        let slot_b = slots_b.get(SlotKind::TpRichcompare);

        let mut checked_reverse_op = false;
        if !class_a.is(class_b)
            && class_b.fast_issubclass(class_a)
            && let Some(slot_b) = slot_b
        {
            checked_reverse_op = true;
            let ret = node.execute(self, slot_b, b, a, op.swapped())?;
            if !self.is_not_implemented(&ret) {
                return Ok(ret);
            }
        }
        if let Some(slot_a) = slot_a {
            let ret = node.execute(self, slot_a, a, b, op)?;
            if !self.is_not_implemented(&ret) {
                return Ok(ret);
            }
        }
        if !checked_reverse_op && let Some(slot_b) = slot_b {
            let ret = node.execute(self, slot_b, b, a, op.swapped())?;
            if !self.is_not_implemented(&ret) {
                return Ok(ret);
            }
        }
        match op {
            PyComparisonOp::Eq => Ok(self.ctx.new_bool(a.is(b))),
            PyComparisonOp::Ne => Ok(self.ctx.new_bool(!a.is(b))),
            _ => Err(self.new_unsupported_comparison_error(a, b, op.operator_token())),
        }
    }

    pub fn rich_compare_bool(
        &self,
        a: &PyObjectRef,
        b: &PyObjectRef,
        op: PyComparisonOp,
    ) -> PyResult<bool> {
        // identity implies equality, as for containers
        if a.is(b) {
            match op {
                PyComparisonOp::Eq => return Ok(true),
                PyComparisonOp::Ne => return Ok(false),
                _ => {}
            }
        }
        let result = self.rich_compare(a, b, op)?;
        self.is_true(&result)
    }

    #[inline]
    pub fn eq(&self, a: &PyObjectRef, b: &PyObjectRef) -> PyResult<bool> {
        self.rich_compare_bool(a, b, PyComparisonOp::Eq)
    }

    pub fn hash(&self, obj: &PyObjectRef) -> PyResult<PyHash> {
        match obj.class().slots().get(SlotKind::TpHash) {
            Some(slot) => self.sites.hash.execute(self, slot, obj),
            None => Err(self.new_type_error(format!(
                "unhashable type: '{}'",
                obj.class().name()
            ))),
        }
    }

    /// `len(obj)`: the sequence length slot, then the mapping one.
    pub fn len(&self, obj: &PyObjectRef) -> PyResult<usize> {
        let slots = obj.class().slots();
        let found = [SlotKind::SqLength, SlotKind::MpLength]
            .into_iter()
            .find_map(|kind| Some((kind, slots.get(kind)?)));
        match found {
            Some((kind, slot)) => self.sites.len.get(kind).execute(self, slot, obj),
            None => Err(self.new_type_error(format!(
                "object of type '{}' has no len()",
                obj.class().name()
            ))),
        }
    }

    /// Truth value: `nb_bool`, then a length of zero, then true.
    pub fn is_true(&self, obj: &PyObjectRef) -> PyResult<bool> {
        if obj.is(&self.ctx.true_value) {
            return Ok(true);
        }
        if obj.is(&self.ctx.false_value) || self.is_none(obj) {
            return Ok(false);
        }
        let slots = obj.class().slots();
        if let Some(slot) = slots.get(SlotKind::NbBool) {
            return self.sites.bool.execute(self, slot, obj);
        }
        if slots.combined_mp_sq_length().is_some() {
            return Ok(self.len(obj)? != 0);
        }
        Ok(true)
    }

    pub fn get_attribute(&self, obj: &PyObjectRef, name: &PyStrRef) -> PyResult {
        let slots = obj.class().slots();
        let found = [SlotKind::TpGetattro, SlotKind::TpGetattr]
            .into_iter()
            .find_map(|kind| Some((kind, slots.get(kind)?)));
        match found {
            Some((kind, slot)) => self.sites.getattr.get(kind).execute(self, slot, obj, name),
            None => Err(self.new_no_attribute_error(obj, name.as_str())),
        }
    }

    /// [`Self::get_attribute`] with a Rust string name.
    pub fn get_attr(&self, obj: &PyObjectRef, name: &str) -> PyResult {
        self.get_attribute(obj, &self.ctx.new_str(name))
    }

    fn call_set_attr(&self, obj: &PyObjectRef, name: &PyStrRef, value: PySetterValue) -> PyResult<()> {
        let slots = obj.class().slots();
        let found = [SlotKind::TpSetattro, SlotKind::TpSetattr]
            .into_iter()
            .find_map(|kind| Some((kind, slots.get(kind)?)));
        match found {
            Some((kind, slot)) => self
                .sites
                .setattr
                .get(kind)
                .execute(self, slot, obj, name, value),
            None => {
                let action = if value.is_delete() { "del" } else { "assign to" };
                Err(self.new_type_error(format!(
                    "'{}' object has no attributes ({action} .{})",
                    obj.class().name(),
                    name.as_str()
                )))
            }
        }
    }

    pub fn set_attribute(&self, obj: &PyObjectRef, name: &PyStrRef, value: PyObjectRef) -> PyResult<()> {
        self.call_set_attr(obj, name, PySetterValue::Assign(value))
    }

    pub fn del_attribute(&self, obj: &PyObjectRef, name: &PyStrRef) -> PyResult<()> {
        self.call_set_attr(obj, name, PySetterValue::Delete)
    }

    /// `iter(obj)`.
    pub fn iter(&self, obj: &PyObjectRef) -> PyResult {
        let Some(slot) = obj.class().slot(SlotKind::TpIter) else {
            return Err(self.new_type_error(format!(
                "'{}' object is not iterable",
                obj.class().name()
            )));
        };
        let iter = self.sites.unary.get(SlotKind::TpIter).execute(self, &slot, obj)?;
        let is_iterator = iter
            .class()
            .slots()
            .get(SlotKind::TpIternext)
            .is_some_and(|next| !next.is_builtin(&object::NEXT_NOT_IMPLEMENTED));
        if !is_iterator {
            return Err(self.new_type_error(format!(
                "iter() returned non-iterator of type '{}'",
                iter.class().name()
            )));
        }
        Ok(iter)
    }

    /// Advance an iterator. Exhaustion is a value, not an exception.
    pub fn next(&self, iter: &PyObjectRef) -> PyResult<PyIterReturn> {
        match iter.class().slots().get(SlotKind::TpIternext) {
            Some(slot) => self.sites.iternext.execute(self, slot, iter),
            None => Err(self.new_type_error(format!(
                "'{}' object is not an iterator",
                iter.class().name()
            ))),
        }
    }

    pub fn call(&self, callable: &PyObjectRef, args: impl Into<FuncArgs>) -> PyResult {
        match callable.class().slots().get(SlotKind::TpCall) {
            Some(slot) => self.sites.call.execute(self, slot, callable, args.into()),
            None => Err(self.new_type_error(format!(
                "'{}' object is not callable",
                callable.class().name()
            ))),
        }
    }

    /// `cls(*args, **kwargs)`: `tp_new`, then `tp_init` when the result is an instance of `cls`.
    pub fn construct(&self, cls: &PyTypeRef, args: FuncArgs) -> PyResult {
        let Some(new) = cls.slot(SlotKind::TpNew) else {
            return Err(self.new_type_error(format!(
                "cannot create '{}' instances",
                cls.name()
            )));
        };
        let obj = self.sites.new.execute(self, &new, cls, args.clone())?;
        if !obj.fast_isinstance(cls) {
            return Ok(obj);
        }
        if let Some(init) = obj.class().slots().get(SlotKind::TpInit) {
            self.sites.init.execute(self, init, &obj, args)?;
        }
        Ok(obj)
    }

    /// `obj[key]`: the mapping slot, then the sequence slot with an index.
    pub fn get_item(&self, obj: &PyObjectRef, key: &PyObjectRef) -> PyResult {
        let slots = obj.class().slots();
        if let Some(slot) = slots.get(SlotKind::MpSubscript) {
            return self
                .sites
                .binary_func
                .get(SlotKind::MpSubscript)
                .execute(self, slot, obj, key);
        }
        if let Some(slot) = slots.get(SlotKind::SqItem) {
            let index = self.sequence_index(key)?;
            return self.sites.size_arg.get(SlotKind::SqItem).execute(self, slot, obj, index);
        }
        Err(self.new_type_error(format!(
            "'{}' object is not subscriptable",
            obj.class().name()
        )))
    }

    fn ass_item(&self, obj: &PyObjectRef, key: &PyObjectRef, value: PySetterValue) -> PyResult<()> {
        let slots = obj.class().slots();
        if let Some(slot) = slots.get(SlotKind::MpAssSubscript) {
            return self.sites.mp_ass_subscript.execute(self, slot, obj, key, value);
        }
        if let Some(slot) = slots.get(SlotKind::SqAssItem) {
            let index = self.sequence_index(key)?;
            return self.sites.sq_ass_item.execute(self, slot, obj, index, value);
        }
        let what = if value.is_delete() {
            "doesn't support item deletion"
        } else {
            "does not support item assignment"
        };
        Err(self.new_type_error(format!("'{}' object {what}", obj.class().name())))
    }

    pub fn set_item(&self, obj: &PyObjectRef, key: &PyObjectRef, value: PyObjectRef) -> PyResult<()> {
        self.ass_item(obj, key, PySetterValue::Assign(value))
    }

    pub fn del_item(&self, obj: &PyObjectRef, key: &PyObjectRef) -> PyResult<()> {
        self.ass_item(obj, key, PySetterValue::Delete)
    }

    fn sequence_index(&self, key: &PyObjectRef) -> PyResult<isize> {
        if key.class().slots().get(SlotKind::NbIndex).is_none() {
            return Err(self.new_type_error(format!(
                "sequence index must be integer, not '{}'",
                key.class().name()
            )));
        }
        self.to_isize(key)
    }

    /// `item in container`: `sq_contains`, else a linear search by iteration.
    pub fn contains(&self, container: &PyObjectRef, item: &PyObjectRef) -> PyResult<bool> {
        if let Some(slot) = container.class().slots().get(SlotKind::SqContains) {
            return self.sites.contains.execute(self, slot, container, item);
        }
        if container.class().slots().get(SlotKind::TpIter).is_none() {
            return Err(self.new_type_error(format!(
                "argument of type '{}' is not iterable",
                container.class().name()
            )));
        }
        let iter = self.iter(container)?;
        loop {
            match self.next(&iter)? {
                PyIterReturn::Return(element) => {
                    if self.eq(&element, item)? {
                        return Ok(true);
                    }
                }
                PyIterReturn::StopIteration(_) => return Ok(false),
            }
        }
    }
}
