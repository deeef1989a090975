mod common;

use common::*;
use pyslot::pyslot_vm::{
    Interpreter, PyObjectRef, VirtualMachine,
    builtins::{PyBoundMethod, PyTypeRef},
    function::PySetterValue,
};

fn get(vm: &VirtualMachine, obj: &PyObjectRef, name: &str) -> String {
    match vm.get_attr(obj, name) {
        Ok(value) => str_of(vm, &value),
        Err(exc) => exc.to_report(),
    }
}

fn set(vm: &VirtualMachine, obj: &PyObjectRef, name: &str, value: PyObjectRef) {
    vm.set_attribute(obj, &vm.ctx.new_str(name), value).unwrap();
}

#[test]
fn instance_dict_and_missing_attribute() {
    Interpreter::without_native().enter(|vm| {
        let cls = class(vm, "Thing", &[], vec![]);
        let obj = instance(vm, &cls);
        set(vm, &obj, "x", int(vm, 1));
        assert_eq!(get(vm, &obj, "x"), "1");
        assert_eq!(
            get(vm, &obj, "y"),
            "AttributeError: 'Thing' object has no attribute 'y'"
        );
        vm.del_attribute(&obj, &vm.ctx.new_str("x")).unwrap();
        assert!(vm.get_attr(&obj, "x").is_err());
    })
}

#[test]
fn getattr_hook_only_after_attribute_error() {
    Interpreter::without_native().enter(|vm| {
        let hook = func(vm, "__getattr__", &["self", "name"], |vm, args| {
            let name = vm.attribute_name(&args[1])?;
            Ok(vm.ctx.new_str(format!("hook:{}", name.as_str())).into())
        });
        let cls = class(vm, "Lazy", &[], vec![("__getattr__", hook.clone())]);
        let obj = instance(vm, &cls);
        set(vm, &obj, "real", int(vm, 3));
        assert_eq!(get(vm, &obj, "real"), "3");
        assert_eq!(get(vm, &obj, "missing"), "hook:missing");

        let getattribute = func(vm, "__getattribute__", &["self", "name"], |vm, _| {
            Err(vm.new_value_error("not an attribute error"))
        });
        let strict = class(
            vm,
            "Strict",
            &[],
            vec![("__getattribute__", getattribute), ("__getattr__", hook)],
        );
        let obj = instance(vm, &strict);
        assert_eq!(get(vm, &obj, "anything"), "ValueError: not an attribute error");
    })
}

fn descriptor_class(vm: &VirtualMachine, data: bool) -> PyTypeRef {
    let getter = func(vm, "__get__", &["self", "obj", "owner"], |vm, args| {
        if vm.is_none(&args[1]) {
            return Ok(vm.ctx.new_str("from class").into());
        }
        Ok(vm.ctx.new_str("from descriptor").into())
    });
    let mut methods = vec![("__get__", getter)];
    if data {
        let setter = func(vm, "__set__", &["self", "obj", "value"], |vm, args| {
            vm.set_attribute(&args[1], &vm.ctx.new_str("_stored"), args[2].clone())?;
            Ok(vm.ctx.none())
        });
        methods.push(("__set__", setter));
    }
    class(vm, if data { "Data" } else { "NonData" }, &[], methods)
}

#[test]
fn data_descriptors_beat_the_instance_dict() {
    Interpreter::without_native().enter(|vm| {
        let data = instance(vm, &descriptor_class(vm, true));
        let non_data = instance(vm, &descriptor_class(vm, false));
        let owner = class(vm, "Owner", &[], vec![("d", data), ("n", non_data)]);
        let obj = instance(vm, &owner);

        assert_eq!(get(vm, &obj, "d"), "from descriptor");
        assert_eq!(get(vm, &obj, "n"), "from descriptor");
        assert_eq!(get(vm, &owner.to_object(), "n"), "from class");

        set(vm, &obj, "d", int(vm, 5));
        assert_eq!(get(vm, &obj, "_stored"), "5");
        assert_eq!(get(vm, &obj, "d"), "from descriptor");

        // the instance dict shadows a non-data descriptor
        set(vm, &obj, "n", int(vm, 6));
        assert_eq!(get(vm, &obj, "n"), "6");
    })
}

#[test]
fn functions_bind_as_methods() {
    Interpreter::without_native().enter(|vm| {
        let greet = func(vm, "greet", &["self", "who"], |vm, args| {
            let who = vm.str(&args[1])?;
            let me = vm.get_attr(&args[0], "name")?;
            let me = vm.str(&me)?;
            Ok(vm
                .ctx
                .new_str(format!("{} greets {}", me.as_str(), who.as_str()))
                .into())
        });
        let cls = class(vm, "Person", &[], vec![("greet", greet)]);
        let obj = instance(vm, &cls);
        set(vm, &obj, "name", vm.ctx.new_str("ann").into());

        let method = vm.get_attr(&obj, "greet").unwrap();
        let bound = method.payload::<PyBoundMethod>().unwrap();
        assert!(bound.receiver().is(&obj));
        let result = vm.call(&method, vec![vm.ctx.new_str("bob").into()]).unwrap();
        assert_eq!(str_of(vm, &result), "ann greets bob");
    })
}

#[test]
fn setattr_and_delattr_overrides() {
    Interpreter::without_native().enter(|vm| {
        let setattr = func(vm, "__setattr__", &["self", "name", "value"], |vm, args| {
            Err(vm.new_attribute_error(format!(
                "read-only: {}",
                vm.attribute_name(&args[1])?.as_str()
            )))
        });
        let delattr = func(vm, "__delattr__", &["self", "name"], |vm, _| {
            Err(vm.new_runtime_error("no deleting"))
        });
        let cls = class(
            vm,
            "Frozen",
            &[],
            vec![("__setattr__", setattr), ("__delattr__", delattr)],
        );
        let obj = instance(vm, &cls);
        let err = vm
            .set_attribute(&obj, &vm.ctx.new_str("x"), int(vm, 1))
            .unwrap_err();
        assert_eq!(err.to_report(), "AttributeError: read-only: x");
        let err = vm.del_attribute(&obj, &vm.ctx.new_str("x")).unwrap_err();
        assert_eq!(err.to_report(), "RuntimeError: no deleting");
    })
}

#[test]
fn type_attributes() {
    Interpreter::without_native().enter(|vm| {
        let base = class(vm, "Base", &[], vec![("kind", vm.ctx.new_str("base").into())]);
        let sub = class(vm, "Sub", &[base.clone()], vec![]);
        let sub_obj = sub.to_object();
        assert_eq!(get(vm, &sub_obj, "__name__"), "Sub");
        assert_eq!(get(vm, &sub_obj, "kind"), "base");
        assert_eq!(get(vm, &instance(vm, &sub), "kind"), "base");

        let int_type = vm.ctx.types.int_type.clone();
        let err = int_type
            .set_attr("kind", PySetterValue::Assign(vm.ctx.none()), vm)
            .unwrap_err();
        assert_exc(
            vm,
            &err,
            &vm.ctx.exceptions.type_error,
            "cannot set 'kind' attribute of immutable type 'int'",
        );
        let err = vm
            .set_attribute(&int(vm, 1), &vm.ctx.new_str("x"), int(vm, 2))
            .unwrap_err();
        assert!(err.fast_isinstance(&vm.ctx.exceptions.attribute_error));
    })
}

#[test]
fn non_string_attribute_names() {
    Interpreter::without_native().enter(|vm| {
        let err = vm.attribute_name(&int(vm, 1)).unwrap_err();
        assert_exc(
            vm,
            &err,
            &vm.ctx.exceptions.type_error,
            "attribute name must be string, not 'int'",
        );
    })
}
