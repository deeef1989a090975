mod common;

use common::*;
use pyslot::pyslot_vm::{
    Interpreter, PyObjectRef,
    builtins::PyInt,
    function::FuncArgs,
    common::hash,
    protocol::{PyIterIter, PyIterReturn},
};
use malachite_bigint::BigInt;

fn returning(vm: &pyslot::pyslot_vm::VirtualMachine, name: &str, value: PyObjectRef) -> PyObjectRef {
    func(vm, name, &["self"], move |_vm, _args| Ok(value.clone()))
}

#[test]
fn len_results_are_checked() {
    Interpreter::without_native().enter(|vm| {
        let cases = [
            (int(vm, 3), Ok(3)),
            (int(vm, -1), Err("ValueError: __len__() should return >= 0")),
            (
                vm.ctx.new_str("3").into(),
                Err("TypeError: 'str' object cannot be interpreted as an integer"),
            ),
            (
                vm.ctx.new_int(1u128 << 100).into(),
                Err("OverflowError: cannot fit 'int' into an index-sized integer"),
            ),
            // too negative to be a size is an overflow, not a negative length
            (
                vm.ctx.new_int(-BigInt::from(1u128 << 100)).into(),
                Err("OverflowError: cannot fit 'int' into an index-sized integer"),
            ),
            (
                vm.ctx.new_int(1u64 << 63).into(),
                Err("OverflowError: cannot fit 'int' into an index-sized integer"),
            ),
        ];
        for (value, expected) in cases {
            let cls = class(vm, "L", &[], vec![("__len__", returning(vm, "__len__", value))]);
            let result = vm.len(&instance(vm, &cls)).map_err(|e| e.to_report());
            assert_eq!(result, expected.map_err(str::to_owned));
        }
    })
}

#[test]
fn truth_value_order() {
    Interpreter::without_native().enter(|vm| {
        assert!(!vm.is_true(&vm.ctx.none()).unwrap());
        assert!(!vm.is_true(&int(vm, 0)).unwrap());
        assert!(vm.is_true(&int(vm, -3)).unwrap());
        assert!(!vm.is_true(&vm.ctx.new_str("").into()).unwrap());
        assert!(vm.is_true(&vm.ctx.new_tuple(vec![int(vm, 0)]).into()).unwrap());

        let plain = class(vm, "Plain", &[], vec![]);
        assert!(vm.is_true(&instance(vm, &plain)).unwrap());

        let empty = class(vm, "Empty", &[], vec![("__len__", returning(vm, "__len__", int(vm, 0)))]);
        assert!(!vm.is_true(&instance(vm, &empty)).unwrap());

        // __bool__ is consulted before __len__
        let both = class(
            vm,
            "Both",
            &[],
            vec![
                ("__bool__", returning(vm, "__bool__", vm.ctx.new_bool(true))),
                ("__len__", returning(vm, "__len__", int(vm, 0))),
            ],
        );
        assert!(vm.is_true(&instance(vm, &both)).unwrap());

        let bad = class(vm, "Bad", &[], vec![("__bool__", returning(vm, "__bool__", int(vm, 1)))]);
        let err = vm.is_true(&instance(vm, &bad)).unwrap_err();
        assert_eq!(err.to_report(), "TypeError: __bool__ should return bool, returned int");
    })
}

#[test]
fn hash_results_are_normalized() {
    Interpreter::without_native().enter(|vm| {
        assert_eq!(vm.hash(&int(vm, -1)).unwrap(), -2);
        assert_eq!(vm.hash(&int(vm, 12)).unwrap(), 12);

        let minus_one = class(vm, "M", &[], vec![("__hash__", returning(vm, "__hash__", int(vm, -1)))]);
        assert_eq!(vm.hash(&instance(vm, &minus_one)).unwrap(), -2);

        let value = BigInt::from(u128::MAX) * BigInt::from(3);
        let huge: PyObjectRef = vm.ctx.new_int(value.clone()).into();
        let big = class(vm, "B", &[], vec![("__hash__", returning(vm, "__hash__", huge.clone()))]);
        assert_eq!(vm.hash(&instance(vm, &big)).unwrap(), hash::hash_bigint(&value));
        assert_eq!(vm.hash(&huge).unwrap(), hash::hash_bigint(&value));

        let text = class(vm, "T", &[], vec![("__hash__", returning(vm, "__hash__", vm.ctx.new_str("x").into()))]);
        let err = vm.hash(&instance(vm, &text)).unwrap_err();
        assert_eq!(err.to_report(), "TypeError: __hash__ method should return an integer");

        let a: PyObjectRef = vm.ctx.new_str("same").into();
        let b: PyObjectRef = vm.ctx.new_str("same").into();
        assert_eq!(vm.hash(&a).unwrap(), vm.hash(&b).unwrap());
    })
}

fn countdown_class(vm: &pyslot::pyslot_vm::VirtualMachine) -> pyslot::pyslot_vm::builtins::PyTypeRef {
    let init = func(vm, "__init__", &["self", "n"], |vm, args| {
        vm.set_attribute(&args[0], &vm.ctx.new_str("n"), args[1].clone())?;
        Ok(vm.ctx.none())
    });
    let iter = func(vm, "__iter__", &["self"], |_vm, args| Ok(args[0].clone()));
    let next = func(vm, "__next__", &["self"], |vm, args| {
        let n = vm.get_attr(&args[0], "n")?;
        if n.payload::<PyInt>().and_then(PyInt::to_isize) == Some(0) {
            return Err(vm.new_stop_iteration(Some(vm.ctx.new_str("done").into())));
        }
        let rest = vm.binary_op(&n, &int(vm, 1), pyslot::pyslot_vm::types::SlotKind::NbSubtract)?;
        vm.set_attribute(&args[0], &vm.ctx.new_str("n"), rest)?;
        Ok(n)
    });
    class(
        vm,
        "Countdown",
        &[],
        vec![("__init__", init), ("__iter__", iter), ("__next__", next)],
    )
}

#[test]
fn iteration_turns_stop_iteration_into_exhaustion() {
    Interpreter::without_native().enter(|vm| {
        let cls = countdown_class(vm);
        let it = vm.call(&cls.to_object(), vec![int(vm, 2)]).unwrap();
        let it = vm.iter(&it).unwrap();
        assert_eq!(str_of(vm, &vm.next(&it).unwrap().into_result(vm).unwrap()), "2");
        assert_eq!(str_of(vm, &vm.next(&it).unwrap().into_result(vm).unwrap()), "1");
        match vm.next(&it).unwrap() {
            PyIterReturn::StopIteration(Some(value)) => assert_eq!(str_of(vm, &value), "done"),
            other => panic!("expected exhaustion, got {other:?}"),
        }

        let tuple: PyObjectRef = vm.ctx.new_tuple(vec![int(vm, 4), int(vm, 5)]).into();
        let items: Vec<String> = PyIterIter::new(vm, vm.iter(&tuple).unwrap())
            .map(|item| str_of(vm, &item.unwrap()))
            .collect();
        assert_eq!(items, ["4", "5"]);

        let err = vm.iter(&int(vm, 1)).unwrap_err();
        assert_eq!(err.to_report(), "TypeError: 'int' object is not iterable");
        let err = vm.next(&tuple).unwrap_err();
        assert_eq!(err.to_report(), "TypeError: 'tuple' object is not an iterator");

        let bad_iter = class(vm, "BadIter", &[], vec![("__iter__", returning(vm, "__iter__", int(vm, 1)))]);
        let err = vm.iter(&instance(vm, &bad_iter)).unwrap_err();
        assert_eq!(err.to_report(), "TypeError: iter() returned non-iterator of type 'int'");

        // `__iter__` alone does not make an iterator
        let iter_self = func(vm, "__iter__", &["self"], |_vm, args| Ok(args[0].clone()));
        let half = class(vm, "HalfIter", &[], vec![("__iter__", iter_self)]);
        let err = vm.iter(&instance(vm, &half)).unwrap_err();
        assert_eq!(err.to_report(), "TypeError: iter() returned non-iterator of type 'HalfIter'");
    })
}

#[test]
fn next_errors_other_than_stop_iteration_propagate() {
    Interpreter::without_native().enter(|vm| {
        let next = func(vm, "__next__", &["self"], |vm, _| Err(vm.new_value_error("broken")));
        let cls = class(vm, "Broken", &[], vec![("__next__", next)]);
        let err = vm.next(&instance(vm, &cls)).unwrap_err();
        assert_eq!(err.to_report(), "ValueError: broken");
    })
}

#[test]
fn membership() {
    Interpreter::without_native().enter(|vm| {
        let tuple: PyObjectRef = vm.ctx.new_tuple(vec![int(vm, 1), vm.ctx.new_str("a").into()]).into();
        assert!(vm.contains(&tuple, &vm.ctx.new_str("a").into()).unwrap());
        assert!(!vm.contains(&tuple, &int(vm, 2)).unwrap());
        assert!(vm.contains(&vm.ctx.new_str("haystack").into(), &vm.ctx.new_str("st").into()).unwrap());

        let countdown = vm.call(&countdown_class(vm).to_object(), vec![int(vm, 3)]).unwrap();
        assert!(vm.contains(&countdown, &int(vm, 2)).unwrap());

        let err = vm.contains(&int(vm, 1), &int(vm, 1)).unwrap_err();
        assert_eq!(err.to_report(), "TypeError: argument of type 'int' is not iterable");
    })
}

#[test]
fn item_access() {
    Interpreter::without_native().enter(|vm| {
        let tuple: PyObjectRef = vm.ctx.new_tuple(vec![int(vm, 10), int(vm, 20)]).into();
        assert_eq!(str_of(vm, &vm.get_item(&tuple, &int(vm, -1)).unwrap()), "20");
        let err = vm.get_item(&tuple, &int(vm, 5)).unwrap_err();
        assert!(err.fast_isinstance(&vm.ctx.exceptions.index_error));
        let err = vm.set_item(&tuple, &int(vm, 0), int(vm, 1)).unwrap_err();
        assert_eq!(err.to_report(), "TypeError: 'tuple' object does not support item assignment");
        let err = vm.get_item(&int(vm, 1), &int(vm, 0)).unwrap_err();
        assert_eq!(err.to_report(), "TypeError: 'int' object is not subscriptable");

        let getitem = func(vm, "__getitem__", &["self", "key"], |vm, args| {
            Ok(vm.ctx.new_str(format!("item {}", vm.repr(&args[1])?.as_str())).into())
        });
        let setitem = func(vm, "__setitem__", &["self", "key", "value"], |vm, args| {
            vm.set_attribute(&args[0], &vm.ctx.new_str("last"), args[2].clone())?;
            Ok(vm.ctx.none())
        });
        let delitem = func(vm, "__delitem__", &["self", "key"], |vm, args| {
            vm.del_attribute(&args[0], &vm.ctx.new_str("last"))?;
            Ok(vm.ctx.none())
        });
        let cls = class(
            vm,
            "Map",
            &[],
            vec![("__getitem__", getitem), ("__setitem__", setitem), ("__delitem__", delitem)],
        );
        let map = instance(vm, &cls);
        let key: PyObjectRef = vm.ctx.new_str("k").into();
        assert_eq!(str_of(vm, &vm.get_item(&map, &key).unwrap()), "item 'k'");
        vm.set_item(&map, &key, int(vm, 7)).unwrap();
        assert_eq!(str_of(vm, &vm.get_attr(&map, "last").unwrap()), "7");
        vm.del_item(&map, &key).unwrap();
        assert!(vm.get_attr(&map, "last").is_err());
    })
}

#[test]
fn construction_runs_new_then_init() {
    Interpreter::without_native().enter(|vm| {
        let new = func(vm, "__new__", &["cls", "value"], |vm, args| {
            let object_new = vm.get_attr(&vm.ctx.types.object_type.to_object(), "__new__")?;
            let obj = vm.call(&object_new, vec![args[0].clone()])?;
            vm.set_attribute(&obj, &vm.ctx.new_str("from_new"), args[1].clone())?;
            Ok(obj)
        });
        let init = func(vm, "__init__", &["self", "value"], |vm, args| {
            let doubled = vm.binary_op(&args[1], &args[1], pyslot::pyslot_vm::types::SlotKind::NbAdd)?;
            vm.set_attribute(&args[0], &vm.ctx.new_str("from_init"), doubled)?;
            Ok(vm.ctx.none())
        });
        let cls = class(vm, "Made", &[], vec![("__new__", new), ("__init__", init)]);
        let obj = vm.call(&cls.to_object(), vec![int(vm, 21)]).unwrap();
        assert!(obj.class().is(&cls));
        assert_eq!(str_of(vm, &vm.get_attr(&obj, "from_new").unwrap()), "21");
        assert_eq!(str_of(vm, &vm.get_attr(&obj, "from_init").unwrap()), "42");

        let err = vm.call(&cls.to_object(), Vec::new()).unwrap_err();
        assert_eq!(err.to_report(), "TypeError: __new__() missing 1 required positional argument: 'value'");
    })
}

#[test]
fn init_must_return_none() {
    Interpreter::without_native().enter(|vm| {
        let cls = class(vm, "Loud", &[], vec![("__init__", returning(vm, "__init__", int(vm, 1)))]);
        let err = vm.call(&cls.to_object(), Vec::new()).unwrap_err();
        assert_eq!(err.to_report(), "TypeError: __init__() should return None, not 'int'");

        let plain = class(vm, "Plain", &[], vec![]);
        let err = vm.call(&plain.to_object(), vec![int(vm, 1)]).unwrap_err();
        assert_eq!(err.to_report(), "TypeError: Plain() takes no arguments");
    })
}

#[test]
fn call_slot_binds_keywords() {
    Interpreter::without_native().enter(|vm| {
        let call = func(vm, "__call__", &["self", "a", "b"], |vm, args| {
            let a = vm.str(&args[1])?;
            let b = vm.str(&args[2])?;
            Ok(vm.ctx.new_str(format!("{}-{}", a.as_str(), b.as_str())).into())
        });
        let cls = class(vm, "Callable", &[], vec![("__call__", call)]);
        let obj = instance(vm, &cls);
        let args = FuncArgs::with_kwargs(vec![int(vm, 1)], [("b", int(vm, 2))]);
        assert_eq!(str_of(vm, &vm.call(&obj, args).unwrap()), "1-2");

        let err = vm.call(&obj, vec![int(vm, 1)]).unwrap_err();
        assert_eq!(err.to_report(), "TypeError: __call__() missing 1 required positional argument: 'b'");
        let err = vm.call(&int(vm, 1), Vec::new()).unwrap_err();
        assert_eq!(err.to_report(), "TypeError: 'int' object is not callable");
    })
}

#[test]
fn repr_and_str() {
    Interpreter::without_native().enter(|vm| {
        assert_eq!(vm.repr(&vm.ctx.new_str("q").into()).unwrap().as_str(), "'q'");
        assert_eq!(str_of(vm, &vm.ctx.new_str("q").into()), "q");
        assert_eq!(str_of(vm, &vm.ctx.new_bool(true)), "True");
        assert_eq!(str_of(vm, &vm.ctx.none()), "None");
        let tuple: PyObjectRef = vm.ctx.new_tuple(vec![int(vm, 1)]).into();
        assert_eq!(str_of(vm, &tuple), "(1,)");

        let bad = class(vm, "Bad", &[], vec![("__repr__", returning(vm, "__repr__", int(vm, 1)))]);
        let err = vm.repr(&instance(vm, &bad)).unwrap_err();
        assert_eq!(err.to_report(), "TypeError: __repr__ returned non-string (type int)");
    })
}
