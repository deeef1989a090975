mod common;

use common::*;
use pyslot::pyslot_vm::{
    Interpreter, PyObjectRef,
    builtins::{PySlotWrapper, PyTypeRef},
    function::PySetterValue,
    types::{SlotCategory, SlotKind},
};
use std::sync::Arc;

fn slot_category(cls: &PyTypeRef, kind: SlotKind) -> Option<SlotCategory> {
    cls.slots().get(kind).map(|slot| slot.category())
}

#[test]
fn builtin_slots_are_shared_singletons() {
    Interpreter::without_native().enter(|vm| {
        let types = &vm.ctx.types;
        let int_add = types.int_type.slot(SlotKind::NbAdd).unwrap();
        let bool_add = types.bool_type.slot(SlotKind::NbAdd).unwrap();
        assert!(int_add.is(&bool_add));
        assert_eq!(int_add.category(), SlotCategory::Builtin);

        // a subclass without overrides resolves `__add__` to int's own slot wrapper
        let my_int = class(vm, "MyInt", &[types.int_type.clone()], vec![]);
        assert!(my_int.slot(SlotKind::NbAdd).unwrap().is(&int_add));

        let object_hash = types.object_type.slot(SlotKind::TpHash).unwrap();
        let plain = class(vm, "Plain", &[], vec![]);
        assert!(plain.slot(SlotKind::TpHash).unwrap().is(&object_hash));
    })
}

#[test]
fn slot_wrappers_expose_builtin_slots() {
    Interpreter::without_native().enter(|vm| {
        let int_type = vm.ctx.types.int_type.to_object();
        let add = vm.get_attr(&int_type, "__add__").unwrap();
        let wrapper = add.payload::<PySlotWrapper>().unwrap();
        assert_eq!(wrapper.name(), "__add__");
        assert_eq!(wrapper.kind(), SlotKind::NbAdd);

        let sum = vm.call(&add, vec![int(vm, 2), int(vm, 3)]).unwrap();
        assert_eq!(str_of(vm, &sum), "5");

        let bound = vm.get_attr(&int(vm, 10), "__sub__").unwrap();
        let diff = vm.call(&bound, vec![int(vm, 4)]).unwrap();
        assert_eq!(str_of(vm, &diff), "6");

        let radd = vm.get_attr(&int(vm, 10), "__radd__").unwrap();
        let r = vm.call(&radd, vec![int(vm, 1)]).unwrap();
        assert_eq!(str_of(vm, &r), "11");

        let err = vm
            .call(&add, vec![vm.ctx.new_str("x").into(), int(vm, 3)])
            .unwrap_err();
        assert!(err.fast_isinstance(&vm.ctx.exceptions.type_error));
    })
}

#[test]
fn user_methods_install_python_slots() {
    Interpreter::without_native().enter(|vm| {
        let cls = class(vm, "Sized", &[], vec![("__len__", func(vm, "__len__", &["self"], |vm, _| Ok(vm.ctx.new_int(2).into())))]);
        assert_eq!(slot_category(&cls, SlotKind::SqLength), Some(SlotCategory::Python));
        assert_eq!(slot_category(&cls, SlotKind::MpLength), Some(SlotCategory::Python));
        assert_eq!(slot_category(&cls, SlotKind::NbAdd), None);
        assert_eq!(vm.len(&instance(vm, &cls)).unwrap(), 2);
    })
}

#[test]
fn assigning_a_method_updates_the_class_and_its_subclasses() {
    Interpreter::without_native().enter(|vm| {
        let base = class(vm, "Base", &[], vec![]);
        let sub = class(vm, "Sub", &[base.clone()], vec![]);
        let obj: PyObjectRef = instance(vm, &sub);
        let err = vm.len(&obj).unwrap_err();
        assert_exc(
            vm,
            &err,
            &vm.ctx.exceptions.type_error,
            "object of type 'Sub' has no len()",
        );

        let generation = sub.slot_generation();
        let len = func(vm, "__len__", &["self"], |vm, _| Ok(vm.ctx.new_int(4).into()));
        base.set_attr("__len__", PySetterValue::Assign(len), vm).unwrap();
        assert!(sub.slot_generation() > generation);
        assert_eq!(vm.len(&obj).unwrap(), 4);

        // an override in the subclass wins over the base
        let len = func(vm, "__len__", &["self"], |vm, _| Ok(vm.ctx.new_int(9).into()));
        sub.set_attr("__len__", PySetterValue::Assign(len), vm).unwrap();
        assert_eq!(vm.len(&obj).unwrap(), 9);

        sub.set_attr("__len__", PySetterValue::Delete, vm).unwrap();
        assert_eq!(vm.len(&obj).unwrap(), 4);
        base.set_attr("__len__", PySetterValue::Delete, vm).unwrap();
        assert!(vm.len(&obj).is_err());
        assert_eq!(slot_category(&sub, SlotKind::SqLength), None);
    })
}

#[test]
fn non_slot_attributes_leave_the_table_alone() {
    Interpreter::without_native().enter(|vm| {
        let cls = class(vm, "Quiet", &[], vec![]);
        let generation = cls.slot_generation();
        cls.set_attr("value", PySetterValue::Assign(int(vm, 1)), vm)
            .unwrap();
        assert_eq!(cls.slot_generation(), generation);
    })
}

#[test]
fn republished_tables_are_released() {
    Interpreter::without_native().enter(|vm| {
        let cls = class(vm, "Churn", &[], vec![]);
        let first = Arc::downgrade(&*cls.slots());
        let generation = cls.slot_generation();
        for _ in 0..10_000 {
            let len = tag(vm, "__len__", 1, "churn");
            cls.set_attr("__len__", PySetterValue::Assign(len), vm).unwrap();
        }
        assert_eq!(cls.slot_generation(), generation + 10_000);
        assert!(first.upgrade().is_none());
        let live = Arc::clone(&*cls.slots());
        // the type and `live` are the only owners
        assert_eq!(Arc::strong_count(&live), 2);
    })
}

#[test]
fn hash_none_and_eq_without_hash() {
    Interpreter::without_native().enter(|vm| {
        let unhashable = class(vm, "NoHash", &[], vec![("__hash__", vm.ctx.none())]);
        let err = vm.hash(&instance(vm, &unhashable)).unwrap_err();
        assert_exc(vm, &err, &vm.ctx.exceptions.type_error, "unhashable type: 'NoHash'");

        let eq = func(vm, "__eq__", &["self", "other"], |vm, _| Ok(vm.ctx.new_bool(true)));
        let eq_only = class(vm, "EqOnly", &[], vec![("__eq__", eq)]);
        let err = vm.hash(&instance(vm, &eq_only)).unwrap_err();
        assert_exc(vm, &err, &vm.ctx.exceptions.type_error, "unhashable type: 'EqOnly'");

        let hash = func(vm, "__hash__", &["self"], |vm, _| Ok(vm.ctx.new_int(7).into()));
        let rehashed = class(vm, "Rehashed", &[eq_only], vec![("__hash__", hash)]);
        assert_eq!(vm.hash(&instance(vm, &rehashed)).unwrap(), 7);
    })
}

#[test]
fn reassigning_bases_recomputes_slots() {
    Interpreter::without_native().enter(|vm| {
        let a = class(vm, "A", &[], vec![("__neg__", tag(vm, "__neg__", 1, "A.neg"))]);
        let b = class(vm, "B", &[], vec![("__neg__", tag(vm, "__neg__", 1, "B.neg"))]);
        let c = class(vm, "C", &[a.clone()], vec![]);
        let d = class(vm, "D", &[c.clone()], vec![]);
        let obj = instance(vm, &d);
        let neg = |obj: &PyObjectRef| {
            let r = vm.call_unary_slot(SlotKind::NbNegative, obj).unwrap();
            str_of(vm, &r)
        };
        assert_eq!(neg(&obj), "A.neg");

        c.set_bases(vec![b.clone()], vm).unwrap();
        assert_eq!(neg(&obj), "B.neg");
        assert!(d.mro().iter().any(|t| t.is(&b)));
        assert!(!d.mro().iter().any(|t| t.is(&a)));

        let err = b.set_bases(vec![d.clone()], vm).unwrap_err();
        assert!(err.message().contains("inheritance cycle"));
    })
}

#[test]
fn failed_base_reassignment_changes_nothing() {
    Interpreter::without_native().enter(|vm| {
        let x = class(vm, "X", &[], vec![("__neg__", tag(vm, "__neg__", 1, "X.neg"))]);
        let y = class(vm, "Y", &[], vec![]);
        let c = class(vm, "C", &[x.clone()], vec![]);
        let d = class(vm, "D", &[y.clone(), c.clone()], vec![]);
        let names = |t: &PyTypeRef| t.mro().iter().map(|t| t.name().to_owned()).collect::<Vec<_>>();
        let before = (names(&c), names(&d));
        let generation = d.slot_generation();

        // D(Y, C) cannot linearise once C derives from Y
        let err = c.set_bases(vec![y.clone()], vm).unwrap_err();
        assert!(err.fast_isinstance(&vm.ctx.exceptions.type_error));
        assert!(err.message().contains("consistent method resolution order"), "{}", err.message());

        assert_eq!((names(&c), names(&d)), before);
        assert!(c.bases()[0].is(&x));
        assert!(x.subclasses().iter().any(|sub| sub.is(&c)));
        assert!(!y.subclasses().iter().any(|sub| sub.is(&c)));
        assert_eq!(d.slot_generation(), generation);
        let neg = vm.call_unary_slot(SlotKind::NbNegative, &instance(vm, &d)).unwrap();
        assert_eq!(str_of(vm, &neg), "X.neg");
    })
}

#[test]
fn invalid_class_definitions() {
    Interpreter::without_native().enter(|vm| {
        let err = vm
            .new_class("Bad", &[vm.ctx.types.bool_type.clone()], Default::default())
            .unwrap_err();
        assert_exc(
            vm,
            &err,
            &vm.ctx.exceptions.type_error,
            "type 'bool' is not an acceptable base type",
        );

        let base = class(vm, "Base", &[], vec![]);
        let err = vm
            .new_class("Twice", &[base.clone(), base.clone()], Default::default())
            .unwrap_err();
        assert_exc(vm, &err, &vm.ctx.exceptions.type_error, "duplicate base class Base");
    })
}
