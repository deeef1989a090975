use super::{PySlotWrapper, PyStaticMethod, PyStr, PyTuple};
use crate::{
    Context, PyAttributes, PyObjectRef, PyPayload, PyRef, PyResult, PyWeak, VirtualMachine,
    function::{FuncArgs, PySetterValue},
    types::{
        BuiltinSlot, BuiltinSlotFunc, PyTypeFlags, SLOT_DEFS, SlotKind, SlotTable, SlotTableCell,
        SlotTableGuard, SlotValue, compute_for_type, recompute_all, update_slot,
    },
};
use itertools::Itertools;
use pyslot_common::lock::PyRwLock;
use core::{fmt, ptr};

pub type PyTypeRef = PyRef<PyType>;

/// A class object. Its attribute storage owns every callable its slot table refers to.
pub struct PyType {
    name: String,
    base: PyRwLock<Option<PyTypeRef>>,
    bases: PyRwLock<Vec<PyTypeRef>>,
    /// Method resolution order without the type itself.
    mro: PyRwLock<Vec<PyTypeRef>>,
    subclasses: PyRwLock<Vec<PyWeak>>,
    attributes: PyRwLock<PyAttributes>,
    pub flags: PyTypeFlags,
    slots: SlotTableCell,
    declared_slots: Vec<(SlotKind, SlotValue)>,
}

impl fmt::Debug for PyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[PyType {}]", self.name)
    }
}

impl PyPayload for PyType {
    fn class(ctx: &Context) -> &PyTypeRef {
        &ctx.types.type_type
    }
}

impl PyType {
    fn new_payload(
        name: &str,
        bases: Vec<PyTypeRef>,
        mro: Vec<PyTypeRef>,
        attributes: PyAttributes,
        flags: PyTypeFlags,
        declared_slots: Vec<(SlotKind, SlotValue)>,
    ) -> Self {
        Self {
            name: name.to_owned(),
            base: PyRwLock::new(bases.first().cloned()),
            bases: PyRwLock::new(bases),
            mro: PyRwLock::new(mro),
            subclasses: PyRwLock::default(),
            attributes: PyRwLock::new(attributes),
            flags,
            slots: SlotTableCell::default(),
            declared_slots,
        }
    }

    /// A builtin type with a single base. Its slots are computed later by
    /// [`PyType::ready_static`], once every builtin type object exists.
    pub(crate) fn new_static(
        name: &str,
        base: Option<&PyTypeRef>,
        declared: &[&'static BuiltinSlot],
        flags: PyTypeFlags,
        metatype: Option<&PyTypeRef>,
    ) -> PyTypeRef {
        let bases: Vec<PyTypeRef> = base.into_iter().cloned().collect();
        let mro = match base {
            Some(base) => core::iter::once(base.clone()).chain(base.mro()).collect(),
            None => Vec::new(),
        };
        let declared = declared
            .iter()
            .map(|&slot| (slot.kind(), SlotValue::Builtin(slot)))
            .collect();
        let payload = Self::new_payload(
            name,
            bases,
            mro,
            PyAttributes::default(),
            flags | PyTypeFlags::IMMUTABLETYPE,
            declared,
        );
        let typ = match metatype {
            Some(metatype) => PyRef::new_ref(payload, metatype.clone(), None),
            None => PyRef::new_uninit(payload, None),
        };
        if let Some(base) = base {
            base.add_subclass(&typ);
        }
        typ
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base(&self) -> Option<PyTypeRef> {
        self.base.read().clone()
    }

    pub fn bases(&self) -> Vec<PyTypeRef> {
        self.bases.read().clone()
    }

    /// Method resolution order, excluding the type itself.
    pub fn mro(&self) -> Vec<PyTypeRef> {
        self.mro.read().clone()
    }

    #[inline]
    pub fn slots(&self) -> SlotTableGuard {
        self.slots.load()
    }

    /// The current value of one slot, independent of later publications.
    #[inline]
    pub fn slot(&self, kind: SlotKind) -> Option<SlotValue> {
        self.slots.load().get(kind).cloned()
    }

    pub fn slot_generation(&self) -> usize {
        self.slots.generation()
    }

    pub(crate) fn publish_slots(&self, table: SlotTable) {
        log::debug!("publishing slot table of '{}'", self.name);
        self.slots.publish(table);
    }

    pub fn declared_slots(&self) -> &[(SlotKind, SlotValue)] {
        &self.declared_slots
    }

    pub fn is_heap_type(&self) -> bool {
        self.flags.has_feature(PyTypeFlags::HEAPTYPE)
    }

    pub fn get_direct_attr(&self, name: &str) -> Option<PyObjectRef> {
        self.attributes.read().get(name).cloned()
    }

    pub fn has_own_attr(&self, name: &str) -> bool {
        self.attributes.read().contains_key(name)
    }

    /// Find `name` in the type's own namespace, then along its MRO. Descriptors are not invoked.
    pub fn lookup(&self, name: &str) -> Option<PyObjectRef> {
        self.get_direct_attr(name)
            .or_else(|| self.mro.read().iter().find_map(|cls| cls.get_direct_attr(name)))
    }

    #[inline]
    pub fn is_type(&self, other: &Self) -> bool {
        ptr::eq(self, other)
    }

    pub fn fast_issubclass(&self, other: &Self) -> bool {
        self.is_type(other) || self.mro.read().iter().any(|c| c.is_type(other))
    }

    /// Live direct subclasses. Dead entries are pruned.
    pub fn subclasses(&self) -> Vec<PyTypeRef> {
        let mut subclasses = self.subclasses.write();
        subclasses.retain(|weak| weak.upgrade().is_some());
        subclasses
            .iter()
            .filter_map(|weak| weak.upgrade()?.downcast::<Self>().ok())
            .collect()
    }

    fn add_subclass(&self, sub: &PyTypeRef) {
        self.subclasses.write().push(sub.downgrade());
    }

    fn remove_subclass(&self, sub: &Self) {
        self.subclasses.write().retain(|weak| {
            weak.upgrade()
                .and_then(|obj| obj.downcast::<Self>().ok())
                .is_some_and(|typ| !typ.is_type(sub))
        });
    }

    pub(crate) fn set_direct_attr(&self, name: &str, value: PyObjectRef) {
        self.attributes.write().insert(name.to_owned(), value);
    }
}

impl PyRef<PyType> {
    /// Insert slot wrapper descriptors for the declared builtin and native slots.
    pub(crate) fn add_operators(&self, ctx: &Context) {
        for def in &SLOT_DEFS {
            let Some((_, value)) = self.declared_slots.iter().find(|(k, _)| *k == def.kind)
            else {
                continue;
            };
            if self.has_own_attr(def.name) {
                continue;
            }
            let descr: PyObjectRef = match value {
                _ if super::object::is_hash_not_implemented(value) => ctx.none(),
                SlotValue::Builtin(_) | SlotValue::Native(_) => {
                    PySlotWrapper::new(def, self, value.clone())
                        .into_ref(ctx)
                        .into()
                }
                SlotValue::Python(_) => continue,
            };
            self.set_direct_attr(def.name, descr);
        }
    }

    /// Compute and publish the slots of a builtin or native type.
    pub(crate) fn ready_static(&self, ctx: &Context) {
        self.add_operators(ctx);
        self.publish_slots(compute_for_type(self));
    }

    pub fn set_attr(&self, name: &str, value: PySetterValue, vm: &VirtualMachine) -> PyResult<()> {
        if self.flags.has_feature(PyTypeFlags::IMMUTABLETYPE) {
            return Err(vm.new_type_error(format!(
                "cannot set '{name}' attribute of immutable type '{}'",
                self.name()
            )));
        }
        let removed = match value {
            PySetterValue::Assign(value) => self.attributes.write().insert(name.to_owned(), value),
            PySetterValue::Delete => {
                let removed = self.attributes.write().shift_remove(name);
                if removed.is_none() {
                    return Err(vm.new_attribute_error(format!(
                        "type object '{}' has no attribute '{name}'",
                        self.name()
                    )));
                }
                removed
            }
        };
        update_slot(self, name);
        drop(removed);
        Ok(())
    }

    /// Re-parent a heap type; its MRO and every slot of it and its subclasses are recomputed.
    pub fn set_bases(&self, bases: Vec<PyTypeRef>, vm: &VirtualMachine) -> PyResult<()> {
        if !self.is_heap_type() {
            return Err(vm.new_type_error(format!(
                "cannot set '__bases__' attribute of immutable type '{}'",
                self.name()
            )));
        }
        if bases.is_empty() {
            return Err(vm.new_type_error(format!(
                "can only assign non-empty tuple to {}.__bases__, not ()",
                self.name()
            )));
        }
        if let Some(cyclic) = bases.iter().find(|b| b.fast_issubclass(self)) {
            return Err(vm.new_type_error(format!(
                "a __bases__ item causes an inheritance cycle ({})",
                cyclic.name()
            )));
        }
        let mro = linearise_mro(&bases).map_err(|msg| vm.new_type_error(msg))?;
        // every subclass must still linearise before anything changes
        let mut planned = Vec::new();
        self.plan_subclass_mros(self, &mro, &mut planned)
            .map_err(|msg| vm.new_type_error(msg))?;

        for old in self.bases() {
            old.remove_subclass(self);
        }
        for new in &bases {
            new.add_subclass(self);
        }
        *self.base.write() = bases.first().cloned();
        *self.bases.write() = bases;
        *self.mro.write() = mro;
        for (sub, mro) in planned {
            *sub.mro.write() = mro;
        }
        recompute_all(self);
        Ok(())
    }

    /// Collect the MRO every subclass of `self` gets once `root` takes `root_mro`.
    fn plan_subclass_mros(
        &self,
        root: &Self,
        root_mro: &[PyTypeRef],
        planned: &mut Vec<(PyTypeRef, Vec<PyTypeRef>)>,
    ) -> Result<(), String> {
        for sub in self.subclasses() {
            let mro = linearise_mro_with(&sub.bases(), |base| {
                if ptr::eq(&**base, &**root) {
                    return root_mro.to_vec();
                }
                planned
                    .iter()
                    .find(|(t, _)| t.is(base))
                    .map_or_else(|| base.mro(), |(_, mro)| mro.clone())
            })?;
            match planned.iter_mut().find(|(t, _)| t.is(&sub)) {
                Some(entry) => entry.1 = mro,
                None => planned.push((sub.clone(), mro)),
            }
            sub.plan_subclass_mros(root, root_mro, planned)?;
        }
        Ok(())
    }
}

impl VirtualMachine {
    /// Create a class the way a class statement does.
    pub fn new_class(
        &self,
        name: &str,
        bases: &[PyTypeRef],
        mut namespace: PyAttributes,
    ) -> PyResult<PyTypeRef> {
        let bases: Vec<PyTypeRef> = if bases.is_empty() {
            vec![self.ctx.types.object_type.clone()]
        } else {
            bases.to_vec()
        };
        if let Some(base) = bases
            .iter()
            .find(|b| !b.flags.has_feature(PyTypeFlags::BASETYPE))
        {
            return Err(self.new_type_error(format!(
                "type '{}' is not an acceptable base type",
                base.name()
            )));
        }
        let mro = linearise_mro(&bases).map_err(|msg| self.new_type_error(msg))?;

        if namespace.contains_key("__eq__") && !namespace.contains_key("__hash__") {
            namespace.insert("__hash__".to_owned(), self.ctx.none());
        }
        if let Some(new) = namespace.get_mut("__new__")
            && new.payload_is::<super::PyFunction>()
        {
            *new = PyStaticMethod::new(new.clone()).into_pyobject(&self.ctx);
        }

        let metatype = bases[0].class().clone();
        let payload = PyType::new_payload(
            name,
            bases.clone(),
            mro,
            namespace,
            PyTypeFlags::heap_type_flags(),
            Vec::new(),
        );
        let typ = PyRef::new_ref(payload, metatype, None);
        for base in &bases {
            base.add_subclass(&typ);
        }
        typ.publish_slots(compute_for_type(&typ));
        log::debug!(
            "new class '{name}' with mro [{}]",
            typ.mro().iter().map(|t| t.name()).join(", ")
        );
        Ok(typ)
    }

    /// Create a type whose slots are native functions of the given ABI.
    pub fn new_native_type(
        &self,
        name: &str,
        bases: &[PyTypeRef],
        declared: Vec<(SlotKind, SlotValue)>,
    ) -> PyResult<PyTypeRef> {
        let bases: Vec<PyTypeRef> = if bases.is_empty() {
            vec![self.ctx.types.object_type.clone()]
        } else {
            bases.to_vec()
        };
        if let Some((kind, value)) = declared
            .iter()
            .find(|(_, value)| matches!(value, SlotValue::Python(_)))
        {
            return Err(self.new_system_error(format!(
                "native type '{name}' cannot declare {value:?} for {}",
                kind.name()
            )));
        }
        let mro = linearise_mro(&bases).map_err(|msg| self.new_type_error(msg))?;
        let payload = PyType::new_payload(
            name,
            bases.clone(),
            mro,
            PyAttributes::default(),
            PyTypeFlags::NATIVE | PyTypeFlags::BASETYPE | PyTypeFlags::HAS_DICT,
            declared,
        );
        let typ = PyRef::new_ref(payload, self.ctx.types.type_type.clone(), None);
        for base in &bases {
            base.add_subclass(&typ);
        }
        typ.ready_static(&self.ctx);
        Ok(typ)
    }
}

fn take_next_base(bases: &mut [Vec<PyTypeRef>]) -> Option<PyTypeRef> {
    for base in bases.iter() {
        let head = base[0].clone();
        if !bases.iter().any(|x| x[1..].iter().any(|x| x.is(&head))) {
            for item in bases.iter_mut() {
                if item[0].is(&head) {
                    item.remove(0);
                }
            }
            return Some(head);
        }
    }
    None
}

/// C3 linearization of `bases`, excluding the new class.
fn linearise_mro(bases: &[PyTypeRef]) -> Result<Vec<PyTypeRef>, String> {
    linearise_mro_with(bases, |base| base.mro())
}

/// C3 linearisation, reading the MRO of each base through `mro_of`.
fn linearise_mro_with(
    bases: &[PyTypeRef],
    mro_of: impl Fn(&PyTypeRef) -> Vec<PyTypeRef>,
) -> Result<Vec<PyTypeRef>, String> {
    for (i, base) in bases.iter().enumerate() {
        if bases[i + 1..].iter().any(|b| b.is(base)) {
            return Err(format!("duplicate base class {}", base.name()));
        }
    }
    let mut seqs: Vec<Vec<PyTypeRef>> = bases
        .iter()
        .map(|base| core::iter::once(base.clone()).chain(mro_of(base)).collect())
        .collect();
    // local precedence ordering: no direct base may appear in the MRO of a later one
    for (i, base_mro) in seqs.iter().enumerate() {
        let base = &base_mro[0];
        if seqs[i + 1..].iter().any(|later| later[1..].iter().any(|c| c.is(base))) {
            return Err(
                "Cannot create a consistent method resolution order (MRO) for bases".to_owned(),
            );
        }
    }
    seqs.push(bases.to_vec());

    let mut result = Vec::new();
    seqs.retain(|x| !x.is_empty());
    while !seqs.is_empty() {
        let head = take_next_base(&mut seqs).ok_or_else(|| {
            format!(
                "Cannot create a consistent method resolution order (MRO) for bases {}",
                seqs.iter().filter_map(|x| x.first()).map(|t| t.name()).format(", ")
            )
        })?;
        result.push(head);
        seqs.retain(|x| !x.is_empty());
    }
    Ok(result)
}

fn type_getattro(zelf: &PyObjectRef, name: &PyRef<PyStr>, vm: &VirtualMachine) -> PyResult {
    let Some(cls) = zelf.downcast_ref::<PyType>() else {
        return Err(vm.new_type_error("descriptor requires a 'type' object"));
    };
    let name = name.as_str();
    match name {
        "__name__" => return Ok(vm.ctx.new_str(cls.name()).into()),
        "__mro__" => {
            let mro = core::iter::once(cls.to_object())
                .chain(cls.mro().into_iter().map(Into::into))
                .collect();
            return Ok(vm.ctx.new_tuple(mro).into());
        }
        "__bases__" => {
            let bases = cls.bases().into_iter().map(Into::into).collect();
            return Ok(vm.ctx.new_tuple(bases).into());
        }
        _ => {}
    }

    let meta = zelf.class().clone();
    let meta_attr = meta.lookup(name);
    if let Some(attr) = &meta_attr
        && vm.is_data_descriptor(attr)
        && let Some(result) = vm.get_descriptor(attr, Some(zelf.clone()), Some(meta.to_object()))
    {
        return result;
    }
    if let Some(attr) = cls.lookup(name) {
        return vm
            .get_descriptor(&attr, None, Some(cls.to_object()))
            .unwrap_or(Ok(attr));
    }
    if let Some(attr) = meta_attr {
        return vm
            .get_descriptor(&attr, Some(zelf.clone()), Some(meta.to_object()))
            .unwrap_or(Ok(attr));
    }
    Err(vm.new_attribute_error(format!(
        "type object '{}' has no attribute '{name}'",
        cls.name()
    )))
}

fn type_setattro(
    zelf: &PyObjectRef,
    name: &PyRef<PyStr>,
    value: PySetterValue,
    vm: &VirtualMachine,
) -> PyResult<()> {
    let Some(cls) = zelf.downcast_ref::<PyType>() else {
        return Err(vm.new_type_error("descriptor requires a 'type' object"));
    };
    if name.as_str() == "__bases__" {
        let PySetterValue::Assign(value) = value else {
            return Err(vm.new_type_error("cannot delete '__bases__' attribute"));
        };
        let Some(tuple) = value.payload::<PyTuple>() else {
            return Err(vm.new_type_error(format!(
                "can only assign tuple to {}.__bases__, not {}",
                cls.name(),
                value.class().name()
            )));
        };
        let bases = tuple
            .as_slice()
            .iter()
            .map(|b| {
                b.clone().downcast::<PyType>().map_err(|b| {
                    vm.new_type_error(format!(
                        "{}.__bases__ must be tuple of classes, not '{}'",
                        cls.name(),
                        b.class().name()
                    ))
                })
            })
            .collect::<PyResult<Vec<_>>>()?;
        return cls.set_bases(bases, vm);
    }
    cls.set_attr(name.as_str(), value, vm)
}

fn type_call(zelf: &PyObjectRef, args: FuncArgs, vm: &VirtualMachine) -> PyResult {
    let Some(cls) = zelf.downcast_ref::<PyType>() else {
        return Err(vm.new_type_error("descriptor '__call__' requires a 'type' object"));
    };
    if cls.is(&vm.ctx.types.type_type) && args.args.len() == 1 && !args.has_kwargs() {
        return Ok(args.args[0].class().to_object());
    }
    vm.construct(&cls, args)
}

fn type_new(cls: PyTypeRef, args: FuncArgs, vm: &VirtualMachine) -> PyResult {
    match args.args.as_slice() {
        [obj] if !args.has_kwargs() => Ok(obj.class().to_object()),
        _ => Err(vm.new_type_error(format!(
            "{}() takes 1 argument, class creation goes through new_class",
            cls.name()
        ))),
    }
}

fn type_repr(zelf: &PyObjectRef, vm: &VirtualMachine) -> PyResult {
    let name = zelf
        .payload::<PyType>()
        .map_or("?", |cls| cls.name())
        .to_owned();
    Ok(vm.ctx.new_str(format!("<class '{name}'>")).into())
}

pub static TYPE_GETATTRO: BuiltinSlot = BuiltinSlot::new(
    "type",
    SlotKind::TpGetattro,
    BuiltinSlotFunc::GetAttro(type_getattro),
);
pub static TYPE_SETATTRO: BuiltinSlot = BuiltinSlot::new(
    "type",
    SlotKind::TpSetattro,
    BuiltinSlotFunc::SetAttro(type_setattro),
);
pub static TYPE_CALL: BuiltinSlot =
    BuiltinSlot::new("type", SlotKind::TpCall, BuiltinSlotFunc::Call(type_call));
pub static TYPE_NEW: BuiltinSlot =
    BuiltinSlot::new("type", SlotKind::TpNew, BuiltinSlotFunc::New(type_new));
pub static TYPE_REPR: BuiltinSlot =
    BuiltinSlot::new("type", SlotKind::TpRepr, BuiltinSlotFunc::Unary(type_repr));

pub(crate) static TYPE_SLOTS: [&BuiltinSlot; 5] =
    [&TYPE_GETATTRO, &TYPE_SETATTRO, &TYPE_CALL, &TYPE_NEW, &TYPE_REPR];
