mod common;

use common::*;
use pyslot::pyslot_vm::{
    Interpreter, PyObjectRef, VirtualMachine,
    types::{PyComparisonOp, SlotKind},
};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

/// A method that declines with `NotImplemented` and counts its calls.
fn declining(vm: &VirtualMachine, name: &str, calls: &Arc<AtomicUsize>) -> PyObjectRef {
    let calls = Arc::clone(calls);
    func(vm, name, &["self", "other"], move |vm, _| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(vm.ctx.not_implemented())
    })
}

#[test]
fn int_arithmetic_through_builtin_slots() {
    Interpreter::without_native().enter(|vm| {
        let a = int(vm, 7);
        let b = int(vm, 2);
        let cases = [
            (SlotKind::NbAdd, "9"),
            (SlotKind::NbSubtract, "5"),
            (SlotKind::NbMultiply, "14"),
            (SlotKind::NbFloorDivide, "3"),
            (SlotKind::NbRemainder, "1"),
            (SlotKind::NbLshift, "28"),
            (SlotKind::NbPower, "49"),
        ];
        for (kind, expected) in cases {
            let result = vm.binary_op(&a, &b, kind).unwrap();
            assert_eq!(str_of(vm, &result), expected, "{kind:?}");
        }
        let err = vm.binary_op(&a, &int(vm, 0), SlotKind::NbFloorDivide).unwrap_err();
        assert_exc(
            vm,
            &err,
            &vm.ctx.exceptions.zero_division_error,
            "integer division or modulo by zero",
        );
    })
}

#[test]
fn reflected_method_runs_when_left_declines() {
    Interpreter::without_native().enter(|vm| {
        let cls = class(vm, "R", &[], vec![("__radd__", tag(vm, "__radd__", 2, "radd"))]);
        let r = instance(vm, &cls);
        let result = vm.binary_op(&int(vm, 1), &r, SlotKind::NbAdd).unwrap();
        assert_eq!(str_of(vm, &result), "radd");

        let err = vm.binary_op(&r, &int(vm, 1), SlotKind::NbAdd).unwrap_err();
        assert_exc(
            vm,
            &err,
            &vm.ctx.exceptions.type_error,
            "unsupported operand type(s) for +: 'R' and 'int'",
        );
    })
}

#[test]
fn subclass_reflected_method_goes_first() {
    Interpreter::without_native().enter(|vm| {
        let base = class(
            vm,
            "Base",
            &[],
            vec![
                ("__add__", tag(vm, "__add__", 2, "Base.__add__")),
                ("__radd__", tag(vm, "__radd__", 2, "Base.__radd__")),
            ],
        );
        let derived = class(
            vm,
            "Derived",
            &[base.clone()],
            vec![("__radd__", tag(vm, "__radd__", 2, "Derived.__radd__"))],
        );
        let plain = class(vm, "Plain", &[base.clone()], vec![]);
        let b = instance(vm, &base);

        let result = vm.binary_op(&b, &instance(vm, &derived), SlotKind::NbAdd).unwrap();
        assert_eq!(str_of(vm, &result), "Derived.__radd__");

        // inheriting the same __radd__ is not an override
        let result = vm.binary_op(&b, &instance(vm, &plain), SlotKind::NbAdd).unwrap();
        assert_eq!(str_of(vm, &result), "Base.__add__");
    })
}

#[test]
fn declining_user_methods_run_once_each() {
    Interpreter::without_native().enter(|vm| {
        let add = Arc::new(AtomicUsize::new(0));
        let radd = Arc::new(AtomicUsize::new(0));
        let a_cls = class(vm, "A", &[], vec![("__add__", declining(vm, "__add__", &add))]);
        let b_cls = class(vm, "B", &[], vec![("__radd__", declining(vm, "__radd__", &radd))]);
        let err = vm
            .binary_op(&instance(vm, &a_cls), &instance(vm, &b_cls), SlotKind::NbAdd)
            .unwrap_err();
        assert_exc(
            vm,
            &err,
            &vm.ctx.exceptions.type_error,
            "unsupported operand type(s) for +: 'A' and 'B'",
        );
        assert_eq!((add.load(Ordering::SeqCst), radd.load(Ordering::SeqCst)), (1, 1));

        // a subclass overriding __radd__ goes first, and still only once
        let sub_radd = Arc::new(AtomicUsize::new(0));
        let sub = class(
            vm,
            "SubA",
            &[a_cls.clone()],
            vec![("__radd__", declining(vm, "__radd__", &sub_radd))],
        );
        let err = vm
            .binary_op(&instance(vm, &a_cls), &instance(vm, &sub), SlotKind::NbAdd)
            .unwrap_err();
        assert!(err.fast_isinstance(&vm.ctx.exceptions.type_error));
        assert_eq!((add.load(Ordering::SeqCst), sub_radd.load(Ordering::SeqCst)), (2, 1));
        assert_eq!(radd.load(Ordering::SeqCst), 1);
    })
}

#[test]
fn same_types_skip_the_reflected_method() {
    Interpreter::without_native().enter(|vm| {
        let not_impl = func(vm, "__add__", &["self", "other"], |vm, _| {
            Ok(vm.ctx.not_implemented())
        });
        let cls = class(
            vm,
            "Stubborn",
            &[],
            vec![
                ("__add__", not_impl),
                ("__radd__", tag(vm, "__radd__", 2, "radd")),
            ],
        );
        let a = instance(vm, &cls);
        let b = instance(vm, &cls);
        let err = vm.binary_op(&a, &b, SlotKind::NbAdd).unwrap_err();
        assert!(err.fast_isinstance(&vm.ctx.exceptions.type_error));
    })
}

#[test]
fn inplace_falls_back_to_binary() {
    Interpreter::without_native().enter(|vm| {
        let cls = class(
            vm,
            "Acc",
            &[],
            vec![
                ("__add__", tag(vm, "__add__", 2, "add")),
                ("__imul__", tag(vm, "__imul__", 2, "imul")),
            ],
        );
        let acc = instance(vm, &cls);
        let one = int(vm, 1);
        let result = vm.binary_iop(&acc, &one, SlotKind::NbInplaceAdd).unwrap();
        assert_eq!(str_of(vm, &result), "add");
        let result = vm.binary_iop(&acc, &one, SlotKind::NbInplaceMultiply).unwrap();
        assert_eq!(str_of(vm, &result), "imul");
        let err = vm.binary_iop(&acc, &one, SlotKind::NbInplaceSubtract).unwrap_err();
        assert_exc(
            vm,
            &err,
            &vm.ctx.exceptions.type_error,
            "unsupported operand type(s) for -=: 'Acc' and 'int'",
        );
    })
}

#[test]
fn sequence_concat_and_repeat() {
    Interpreter::without_native().enter(|vm| {
        let ab: PyObjectRef = vm.ctx.new_str("ab").into();
        let cd: PyObjectRef = vm.ctx.new_str("cd").into();
        let result = vm.binary_op(&ab, &cd, SlotKind::NbAdd).unwrap();
        assert_eq!(str_of(vm, &result), "abcd");
        let result = vm.binary_op(&ab, &int(vm, 3), SlotKind::NbMultiply).unwrap();
        assert_eq!(str_of(vm, &result), "ababab");
        let result = vm.binary_op(&int(vm, 2), &ab, SlotKind::NbMultiply).unwrap();
        assert_eq!(str_of(vm, &result), "abab");

        let err = vm.binary_op(&ab, &int(vm, 1), SlotKind::NbAdd).unwrap_err();
        assert!(err.fast_isinstance(&vm.ctx.exceptions.type_error));
        let err = vm.binary_op(&ab, &ab, SlotKind::NbMultiply).unwrap_err();
        assert_exc(
            vm,
            &err,
            &vm.ctx.exceptions.type_error,
            "can't multiply sequence by non-int of type 'str'",
        );

        let pair = vm.ctx.new_tuple(vec![int(vm, 1), int(vm, 2)]).into();
        let joined = vm.binary_op(&pair, &pair, SlotKind::NbAdd).unwrap();
        assert_eq!(vm.len(&joined).unwrap(), 4);
    })
}

#[test]
fn three_argument_power_uses_the_left_slot() {
    Interpreter::without_native().enter(|vm| {
        let result = vm
            .ternary_op(&int(vm, 3), &int(vm, 4), &int(vm, 5))
            .unwrap();
        assert_eq!(str_of(vm, &result), "1");

        let pow = func(vm, "__pow__", &["self", "exp", "mod"], |vm, args| {
            Ok(vm.ctx.new_str(format!("mod={}", vm.repr(&args[2])?.as_str())).into())
        });
        let cls = class(vm, "P", &[], vec![("__pow__", pow)]);
        let p = instance(vm, &cls);
        let result = vm.ternary_op(&p, &int(vm, 2), &int(vm, 9)).unwrap();
        assert_eq!(str_of(vm, &result), "mod=9");

        let err = vm
            .ternary_op(&vm.ctx.new_str("x").into(), &int(vm, 2), &int(vm, 9))
            .unwrap_err();
        assert_exc(
            vm,
            &err,
            &vm.ctx.exceptions.type_error,
            "unsupported operand type(s) for ** or pow(): 'str', 'int', 'int'",
        );
    })
}

#[test]
fn unary_slots() {
    Interpreter::without_native().enter(|vm| {
        let neg = vm.call_unary_slot(SlotKind::NbNegative, &int(vm, 5)).unwrap();
        assert_eq!(str_of(vm, &neg), "-5");
        let inv = vm.call_unary_slot(SlotKind::NbInvert, &int(vm, 5)).unwrap();
        assert_eq!(str_of(vm, &inv), "-6");

        let err = vm
            .call_unary_slot(SlotKind::NbNegative, &vm.ctx.new_str("s").into())
            .unwrap_err();
        assert_exc(
            vm,
            &err,
            &vm.ctx.exceptions.type_error,
            "bad operand type for unary -: 'str'",
        );
    })
}

#[test]
fn rich_comparison_reflects_and_falls_back_to_identity() {
    Interpreter::without_native().enter(|vm| {
        let lt = vm
            .rich_compare_bool(&int(vm, 1), &int(vm, 2), PyComparisonOp::Lt)
            .unwrap();
        assert!(lt);

        let gt = func(vm, "__gt__", &["self", "other"], |vm, _| Ok(vm.ctx.new_bool(true)));
        let cls = class(vm, "Big", &[], vec![("__gt__", gt)]);
        let big = instance(vm, &cls);
        // 1 < big has no answer from int, so big > 1 is asked
        assert!(
            vm.rich_compare_bool(&int(vm, 1), &big, PyComparisonOp::Lt)
                .unwrap()
        );

        let plain = class(vm, "Plain", &[], vec![]);
        let a = instance(vm, &plain);
        let b = instance(vm, &plain);
        assert!(vm.eq(&a, &a).unwrap());
        assert!(!vm.eq(&a, &b).unwrap());
        assert!(
            vm.rich_compare_bool(&a, &b, PyComparisonOp::Ne)
                .unwrap()
        );
        let err = vm.rich_compare(&a, &b, PyComparisonOp::Le).unwrap_err();
        assert_exc(
            vm,
            &err,
            &vm.ctx.exceptions.type_error,
            "'<=' not supported between instances of 'Plain' and 'Plain'",
        );
    })
}
