use super::{PyBoundMethod, PyType, PyTypeRef};
use crate::{
    Context, PyObjectRef, PyPayload, PyResult, PyWeak, VirtualMachine,
    dispatch::call_builtin_boxed,
    function::{FuncArgs, PySetterValue},
    types::{BuiltinSlot, BuiltinSlotFunc, SlotDef, SlotKind, SlotValue, WrapperTag},
};

/// `wrapper_descriptor`: exposes one slot of a builtin or native type as a magic method.
///
/// Heap types that inherit the descriptor unchanged get the wrapped implementation back in
/// their own slot, so the descriptor keeps the exact [`SlotValue`] it was made from.
#[derive(Debug)]
pub struct PySlotWrapper {
    name: &'static str,
    kind: SlotKind,
    tag: WrapperTag,
    owner: PyWeak,
    owner_name: String,
    slot: SlotValue,
}

impl PyPayload for PySlotWrapper {
    fn class(ctx: &Context) -> &PyTypeRef {
        &ctx.types.slot_wrapper_type
    }
}

impl PySlotWrapper {
    pub fn new(def: &SlotDef, owner: &PyTypeRef, slot: SlotValue) -> Self {
        Self {
            name: def.name,
            kind: def.kind,
            tag: def.tag,
            owner: owner.downgrade(),
            owner_name: owner.name().to_owned(),
            slot,
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn kind(&self) -> SlotKind {
        self.kind
    }

    #[inline]
    pub fn tag(&self) -> WrapperTag {
        self.tag
    }

    #[inline]
    pub fn slot(&self) -> &SlotValue {
        &self.slot
    }

    /// The defining type, unless it was already collected.
    pub fn owner(&self) -> Option<PyTypeRef> {
        self.owner
            .upgrade()
            .and_then(|obj| obj.downcast::<PyType>().ok())
    }

    pub fn call(&self, mut args: FuncArgs, vm: &VirtualMachine) -> PyResult {
        let Some(zelf) = args.take_positional() else {
            return Err(vm.new_type_error(format!(
                "descriptor '{}' of '{}' object needs an argument",
                self.name, self.owner_name
            )));
        };
        self.check_receiver(&zelf, vm)?;
        match &self.slot {
            SlotValue::Builtin(builtin) => self.call_builtin(builtin, zelf, args, vm),
            slot => self.call_slot(slot, zelf, args, vm),
        }
    }

    fn check_receiver(&self, zelf: &PyObjectRef, vm: &VirtualMachine) -> PyResult<()> {
        let Some(owner) = self.owner() else {
            return Err(vm.new_type_error(format!(
                "descriptor '{}' outlived its type '{}'",
                self.name, self.owner_name
            )));
        };
        if self.tag == WrapperTag::New {
            let Some(cls) = zelf.payload::<PyType>() else {
                return Err(vm.new_type_error(format!(
                    "{}.__new__(X): X is not a type object ({})",
                    self.owner_name,
                    zelf.class().name()
                )));
            };
            if !cls.fast_issubclass(&owner) {
                return Err(vm.new_type_error(format!(
                    "{}.__new__({}): {} is not a subtype of {}",
                    self.owner_name,
                    cls.name(),
                    cls.name(),
                    self.owner_name
                )));
            }
            return Ok(());
        }
        if !zelf.fast_isinstance(&owner) {
            return Err(vm.new_type_error(format!(
                "descriptor '{}' requires a '{}' object but received a '{}'",
                self.name,
                self.owner_name,
                zelf.class().name()
            )));
        }
        Ok(())
    }

    /// Map the method arguments onto the boxed argument order of the builtin.
    fn call_builtin(
        &self,
        builtin: &'static BuiltinSlot,
        zelf: PyObjectRef,
        mut args: FuncArgs,
        vm: &VirtualMachine,
    ) -> PyResult {
        use WrapperTag as W;
        let boxed = match self.tag {
            W::Init | W::New | W::Call => {
                args.prepend_arg(zelf);
                return call_builtin_boxed(builtin, args, vm);
            }
            W::Unary | W::Len | W::Hash | W::Inquiry | W::Next => {
                let [] = self.arguments::<0>(&args, vm)?;
                vec![zelf]
            }
            W::BinaryL | W::GetAttr | W::DelAttr | W::Contains | W::SqItem | W::DelItem => {
                let [other] = self.arguments::<1>(&args, vm)?;
                vec![zelf, other.clone()]
            }
            W::DescrDelete => {
                let [obj] = self.arguments::<1>(&args, vm)?;
                vec![zelf, obj.clone()]
            }
            W::BinaryR => {
                let [other] = self.arguments::<1>(&args, vm)?;
                vec![other.clone(), zelf]
            }
            W::SetAttr | W::SetItem | W::DescrSet => {
                let [key, value] = self.arguments::<2>(&args, vm)?;
                vec![zelf, key.clone(), value.clone()]
            }
            W::RichCmp(op) => {
                let [other] = self.arguments::<1>(&args, vm)?;
                vec![zelf, other.clone(), vm.ctx.new_int(op.index()).into()]
            }
            W::Ternary | W::TernaryR => {
                let (other, modulus) = self.power_arguments(&args, vm)?;
                if self.tag == W::Ternary {
                    vec![zelf, other, modulus]
                } else {
                    vec![other, zelf, modulus]
                }
            }
            W::DescrGet => {
                let (obj, cls) = self.descr_get_arguments(&args, vm)?;
                vec![zelf, vm.unwrap_or_none(obj), vm.unwrap_or_none(cls)]
            }
        };
        call_builtin_boxed(builtin, boxed.into(), vm)
    }

    /// Native and user-defined slots go through the call sites, which know their conventions.
    fn call_slot(
        &self,
        slot: &SlotValue,
        zelf: PyObjectRef,
        args: FuncArgs,
        vm: &VirtualMachine,
    ) -> PyResult {
        use WrapperTag as W;
        let sites = &vm.sites;
        let kind = self.kind;
        match self.tag {
            W::Init => sites.init.execute(vm, slot, &zelf, args).map(|()| vm.ctx.none()),
            W::New => {
                let cls = zelf
                    .downcast::<PyType>()
                    .map_err(|_| vm.new_type_error("__new__ requires a type"))?;
                sites.new.execute(vm, slot, &cls, args)
            }
            W::Call => sites.call.execute(vm, slot, &zelf, args),
            W::Unary => {
                let [] = self.arguments::<0>(&args, vm)?;
                sites.unary.get(kind).execute(vm, slot, &zelf)
            }
            W::Len => {
                let [] = self.arguments::<0>(&args, vm)?;
                let len = sites.len.get(kind).execute(vm, slot, &zelf)?;
                Ok(vm.ctx.new_int(len).into())
            }
            W::Hash => {
                let [] = self.arguments::<0>(&args, vm)?;
                let hash = sites.hash.execute(vm, slot, &zelf)?;
                Ok(vm.ctx.new_int(hash).into())
            }
            W::Inquiry => {
                let [] = self.arguments::<0>(&args, vm)?;
                let value = sites.bool.execute(vm, slot, &zelf)?;
                Ok(vm.ctx.new_bool(value))
            }
            W::Next => {
                let [] = self.arguments::<0>(&args, vm)?;
                sites.iternext.execute(vm, slot, &zelf)?.into_result(vm)
            }
            W::BinaryL | W::BinaryR => {
                let [other] = self.arguments::<1>(&args, vm)?;
                let (a, b) = if self.tag == W::BinaryL {
                    (&zelf, other)
                } else {
                    (other, &zelf)
                };
                if kind.reflected_names().is_some() {
                    let same_types = a.class().is(b.class());
                    sites.binary_op.get(kind).execute(vm, slot, a, b, same_types)
                } else {
                    sites.binary_func.get(kind).execute(vm, slot, a, b)
                }
            }
            W::Ternary | W::TernaryR => {
                let (other, modulus) = self.power_arguments(&args, vm)?;
                let (a, b) = if self.tag == W::Ternary {
                    (&zelf, &other)
                } else {
                    (&other, &zelf)
                };
                let same_types = a.class().is(b.class());
                sites.power.execute(vm, slot, a, b, &modulus, same_types)
            }
            W::GetAttr => {
                let [name] = self.arguments::<1>(&args, vm)?;
                let name = vm.attribute_name(name)?;
                sites.getattr.get(kind).execute(vm, slot, &zelf, &name)
            }
            W::SetAttr | W::DelAttr => {
                let (name, value) = self.setter_arguments(&args, vm)?;
                let name = vm.attribute_name(&name)?;
                sites
                    .setattr
                    .get(kind)
                    .execute(vm, slot, &zelf, &name, value)
                    .map(|()| vm.ctx.none())
            }
            W::RichCmp(op) => {
                let [other] = self.arguments::<1>(&args, vm)?;
                sites.richcompare.execute(vm, slot, &zelf, other, op)
            }
            W::DescrGet => {
                let (obj, cls) = self.descr_get_arguments(&args, vm)?;
                sites.descr_get.execute(vm, slot, &zelf, obj, cls)
            }
            W::DescrSet | W::DescrDelete => {
                let (obj, value) = self.setter_arguments(&args, vm)?;
                sites
                    .descr_set
                    .execute(vm, slot, &zelf, &obj, value)
                    .map(|()| vm.ctx.none())
            }
            W::SqItem => {
                let [index] = self.arguments::<1>(&args, vm)?;
                let index = vm.to_isize(index)?;
                sites.size_arg.get(kind).execute(vm, slot, &zelf, index)
            }
            W::SetItem | W::DelItem => {
                let (key, value) = self.setter_arguments(&args, vm)?;
                let result = if kind == SlotKind::SqAssItem {
                    let index = vm.to_isize(&key)?;
                    sites.sq_ass_item.execute(vm, slot, &zelf, index, value)
                } else {
                    sites.mp_ass_subscript.execute(vm, slot, &zelf, &key, value)
                };
                result.map(|()| vm.ctx.none())
            }
            W::Contains => {
                let [item] = self.arguments::<1>(&args, vm)?;
                let found = sites.contains.execute(vm, slot, &zelf, item)?;
                Ok(vm.ctx.new_bool(found))
            }
        }
    }

    fn arguments<'a, const N: usize>(
        &self,
        args: &'a FuncArgs,
        vm: &VirtualMachine,
    ) -> PyResult<&'a [PyObjectRef; N]> {
        if args.has_kwargs() {
            return Err(vm.new_type_error(format!(
                "wrapper {}() takes no keyword arguments",
                self.name
            )));
        }
        <&[PyObjectRef; N]>::try_from(args.args.as_slice()).map_err(|_| {
            vm.new_type_error(format!(
                "expected {N} argument{}, got {}",
                if N == 1 { "" } else { "s" },
                args.args.len()
            ))
        })
    }

    /// `(other[, modulus])`, the modulus defaulting to `None`.
    fn power_arguments(
        &self,
        args: &FuncArgs,
        vm: &VirtualMachine,
    ) -> PyResult<(PyObjectRef, PyObjectRef)> {
        match args.args.as_slice() {
            [other] if !args.has_kwargs() => Ok((other.clone(), vm.ctx.none())),
            [other, modulus] if !args.has_kwargs() => Ok((other.clone(), modulus.clone())),
            _ => Err(vm.new_type_error(format!(
                "{} expected 1 or 2 arguments, got {}",
                self.name,
                args.args.len()
            ))),
        }
    }

    /// `(instance[, owner])`; both `None` is rejected.
    fn descr_get_arguments(
        &self,
        args: &FuncArgs,
        vm: &VirtualMachine,
    ) -> PyResult<(Option<PyObjectRef>, Option<PyObjectRef>)> {
        let (obj, cls) = match args.args.as_slice() {
            [obj] if !args.has_kwargs() => (vm.none_to_option(obj), None),
            [obj, cls] if !args.has_kwargs() => (vm.none_to_option(obj), vm.none_to_option(cls)),
            _ => {
                return Err(vm.new_type_error(format!(
                    "__get__ expected 1 or 2 arguments, got {}",
                    args.args.len()
                )));
            }
        };
        if obj.is_none() && cls.is_none() {
            return Err(vm.new_type_error("__get__(None, None) is invalid"));
        }
        Ok((obj, cls))
    }

    /// `(key, value)` for the assigning tags, `(key,)` for the deleting ones.
    fn setter_arguments(
        &self,
        args: &FuncArgs,
        vm: &VirtualMachine,
    ) -> PyResult<(PyObjectRef, PySetterValue)> {
        use WrapperTag as W;
        match self.tag {
            W::SetAttr | W::SetItem | W::DescrSet => {
                let [key, value] = self.arguments::<2>(args, vm)?;
                Ok((key.clone(), PySetterValue::Assign(value.clone())))
            }
            _ => {
                let [key] = self.arguments::<1>(args, vm)?;
                Ok((key.clone(), PySetterValue::Delete))
            }
        }
    }
}

fn slot_wrapper_call(zelf: &PyObjectRef, args: FuncArgs, vm: &VirtualMachine) -> PyResult {
    let Some(wrapper) = zelf.payload::<PySlotWrapper>() else {
        return Err(vm.new_type_error("descriptor '__call__' requires a 'wrapper_descriptor' object"));
    };
    wrapper.call(args, vm)
}

fn slot_wrapper_descr_get(
    zelf: PyObjectRef,
    obj: Option<PyObjectRef>,
    _cls: Option<PyObjectRef>,
    vm: &VirtualMachine,
) -> PyResult {
    match obj {
        None => Ok(zelf),
        Some(obj) => Ok(PyBoundMethod::new_ref(obj, zelf, &vm.ctx).into()),
    }
}

fn slot_wrapper_repr(zelf: &PyObjectRef, vm: &VirtualMachine) -> PyResult {
    let Some(wrapper) = zelf.payload::<PySlotWrapper>() else {
        return Err(vm.new_type_error("descriptor '__repr__' requires a 'wrapper_descriptor' object"));
    };
    Ok(vm
        .ctx
        .new_str(format!(
            "<slot wrapper '{}' of '{}' objects>",
            wrapper.name, wrapper.owner_name
        ))
        .into())
}

pub static SLOT_WRAPPER_CALL: BuiltinSlot = BuiltinSlot::new(
    "wrapper_descriptor",
    SlotKind::TpCall,
    BuiltinSlotFunc::Call(slot_wrapper_call),
);
pub static SLOT_WRAPPER_DESCR_GET: BuiltinSlot = BuiltinSlot::new(
    "wrapper_descriptor",
    SlotKind::TpDescrGet,
    BuiltinSlotFunc::DescrGet(slot_wrapper_descr_get),
);
pub static SLOT_WRAPPER_REPR: BuiltinSlot = BuiltinSlot::new(
    "wrapper_descriptor",
    SlotKind::TpRepr,
    BuiltinSlotFunc::Unary(slot_wrapper_repr),
);

pub(crate) static SLOT_WRAPPER_SLOTS: [&BuiltinSlot; 3] =
    [&SLOT_WRAPPER_CALL, &SLOT_WRAPPER_DESCR_GET, &SLOT_WRAPPER_REPR];
