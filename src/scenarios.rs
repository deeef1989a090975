//! Demonstration classes, each defined the way a class statement would define it and driven
//! through the operator entry points of the VM.

use pyslot_vm::{
    PyAttributes, PyObjectRef, PyPayload, PyResult, VirtualMachine,
    builtins::{PyFunction, PyInt, PyTypeRef},
    function::{FuncArgs, PySetterValue, Signature},
    protocol::PyIterIter,
    types::SlotKind,
};
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    Vec2,
    Radd,
    Len,
    Hash,
    Getattr,
    Iter,
}

impl Scenario {
    pub const ALL: [Self; 6] = [
        Self::Vec2,
        Self::Radd,
        Self::Len,
        Self::Hash,
        Self::Getattr,
        Self::Iter,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Vec2 => "vec2",
            Self::Radd => "radd",
            Self::Len => "len",
            Self::Hash => "hash",
            Self::Getattr => "getattr",
            Self::Iter => "iter",
        }
    }

    /// Run the scenario, returning one line per step.
    pub fn run(self, vm: &VirtualMachine) -> PyResult<Vec<String>> {
        match self {
            Self::Vec2 => vec2(vm),
            Self::Radd => radd(vm),
            Self::Len => len(vm),
            Self::Hash => hash(vm),
            Self::Getattr => getattr(vm),
            Self::Iter => iter(vm),
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scenario {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|scenario| scenario.name() == s).ok_or(())
    }
}

fn method<F>(vm: &VirtualMachine, name: &str, params: &[&str], body: F) -> PyObjectRef
where
    F: Fn(&VirtualMachine, &[PyObjectRef]) -> PyResult + Send + Sync + 'static,
{
    PyFunction::new(Signature::new(name, params), body).into_pyobject(&vm.ctx)
}

fn new_class(
    vm: &VirtualMachine,
    name: &str,
    bases: &[PyTypeRef],
    methods: Vec<(&str, PyObjectRef)>,
) -> PyResult<PyTypeRef> {
    let namespace: PyAttributes = methods
        .into_iter()
        .map(|(name, value)| (name.to_owned(), value))
        .collect();
    vm.new_class(name, bases, namespace)
}

fn int(vm: &VirtualMachine, value: i64) -> PyObjectRef {
    vm.ctx.new_int(value).into()
}

/// `repr()` of a successful result, the exception report of a failed one.
fn outcome(vm: &VirtualMachine, result: PyResult) -> String {
    match result.and_then(|value| vm.repr(&value)) {
        Ok(repr) => repr.as_str().to_owned(),
        Err(exc) => exc.to_report(),
    }
}

fn set_attr(vm: &VirtualMachine, obj: &PyObjectRef, name: &str, value: PyObjectRef) -> PyResult<()> {
    vm.set_attribute(obj, &vm.ctx.new_str(name), value)
}

fn vec2(vm: &VirtualMachine) -> PyResult<Vec<String>> {
    let init = method(vm, "__init__", &["self", "x", "y"], |vm, args| {
        set_attr(vm, &args[0], "x", args[1].clone())?;
        set_attr(vm, &args[0], "y", args[2].clone())?;
        Ok(vm.ctx.none())
    });
    let add = method(vm, "__add__", &["self", "other"], |vm, args| {
        let (zelf, other) = (&args[0], &args[1]);
        if !other.fast_isinstance(zelf.class()) {
            return Ok(vm.ctx.not_implemented());
        }
        let x = vm.binary_op(&vm.get_attr(zelf, "x")?, &vm.get_attr(other, "x")?, SlotKind::NbAdd)?;
        let y = vm.binary_op(&vm.get_attr(zelf, "y")?, &vm.get_attr(other, "y")?, SlotKind::NbAdd)?;
        vm.call(&zelf.class().to_object(), vec![x, y])
    });
    let neg = method(vm, "__neg__", &["self"], |vm, args| {
        let x = vm.call_unary_slot(SlotKind::NbNegative, &vm.get_attr(&args[0], "x")?)?;
        let y = vm.call_unary_slot(SlotKind::NbNegative, &vm.get_attr(&args[0], "y")?)?;
        vm.call(&args[0].class().to_object(), vec![x, y])
    });
    let repr = method(vm, "__repr__", &["self"], |vm, args| {
        let x = vm.repr(&vm.get_attr(&args[0], "x")?)?;
        let y = vm.repr(&vm.get_attr(&args[0], "y")?)?;
        Ok(vm.ctx.new_str(format!("Vec2({}, {})", x.as_str(), y.as_str())).into())
    });
    let cls = new_class(
        vm,
        "Vec2",
        &[],
        vec![("__init__", init), ("__add__", add), ("__neg__", neg), ("__repr__", repr)],
    )?;
    let cls_obj = cls.to_object();

    let a = vm.call(&cls_obj, vec![int(vm, 1), int(vm, 2)])?;
    let b = vm.call(&cls_obj, vec![int(vm, 3), int(vm, 4)])?;
    Ok(vec![
        format!("a + b -> {}", outcome(vm, vm.binary_op(&a, &b, SlotKind::NbAdd))),
        format!("-a -> {}", outcome(vm, vm.call_unary_slot(SlotKind::NbNegative, &a))),
        format!("a += b -> {}", outcome(vm, vm.binary_iop(&a, &b, SlotKind::NbInplaceAdd))),
        format!("a + 1 -> {}", outcome(vm, vm.binary_op(&a, &int(vm, 1), SlotKind::NbAdd))),
        format!("~a -> {}", outcome(vm, vm.call_unary_slot(SlotKind::NbInvert, &a))),
    ])
}

fn radd(vm: &VirtualMachine) -> PyResult<Vec<String>> {
    let init = method(vm, "__init__", &["self", "value"], |vm, args| {
        set_attr(vm, &args[0], "value", args[1].clone())?;
        Ok(vm.ctx.none())
    });
    let meters_radd = method(vm, "__radd__", &["self", "other"], |vm, args| {
        let value = vm.binary_op(&args[1], &vm.get_attr(&args[0], "value")?, SlotKind::NbAdd)?;
        Ok(vm.ctx.new_str(format!("Meters.__radd__ -> {}", vm.repr(&value)?.as_str())).into())
    });
    let meters_add = method(vm, "__add__", &["self", "other"], |vm, _args| {
        Ok(vm.ctx.new_str("Meters.__add__").into())
    });
    let meters = new_class(
        vm,
        "Meters",
        &[],
        vec![("__init__", init), ("__add__", meters_add), ("__radd__", meters_radd)],
    )?;
    let km_radd = method(vm, "__radd__", &["self", "other"], |vm, _args| {
        Ok(vm.ctx.new_str("Km.__radd__").into())
    });
    let km = new_class(vm, "Km", &[meters.clone()], vec![("__radd__", km_radd)])?;

    let m = vm.call(&meters.to_object(), vec![int(vm, 5)])?;
    let k = vm.call(&km.to_object(), vec![int(vm, 2)])?;
    Ok(vec![
        format!("1 + Meters(5) -> {}", outcome(vm, vm.binary_op(&int(vm, 1), &m, SlotKind::NbAdd))),
        format!("Meters(5) + 1 -> {}", outcome(vm, vm.binary_op(&m, &int(vm, 1), SlotKind::NbAdd))),
        format!("Meters(5) + Km(2) -> {}", outcome(vm, vm.binary_op(&m, &k, SlotKind::NbAdd))),
        format!("'a' + 1 -> {}", outcome(vm, vm.binary_op(&vm.ctx.new_str("a").into(), &int(vm, 1), SlotKind::NbAdd))),
    ])
}

fn len(vm: &VirtualMachine) -> PyResult<Vec<String>> {
    let classes = [("Bag", int(vm, 3)), ("Negative", int(vm, -1)), ("Text", vm.ctx.new_str("3").into())];
    let mut lines = Vec::new();
    for (name, result) in classes {
        let len = method(vm, "__len__", &["self"], move |_vm, _args| Ok(result.clone()));
        let cls = new_class(vm, name, &[], vec![("__len__", len)])?;
        let obj = vm.call(&cls.to_object(), FuncArgs::default())?;
        let line = match vm.len(&obj) {
            Ok(n) => format!("len({name}()) -> {n}, truthy: {}", vm.is_true(&obj)?),
            Err(exc) => format!("len({name}()) -> {}", exc.to_report()),
        };
        lines.push(line);
    }
    let words: PyObjectRef = vm.ctx.new_tuple(vec![int(vm, 1), int(vm, 2)]).into();
    lines.push(format!("len((1, 2)) -> {}", vm.len(&words)?));
    Ok(lines)
}

fn hash(vm: &VirtualMachine) -> PyResult<Vec<String>> {
    let eq = method(vm, "__eq__", &["self", "other"], |vm, args| {
        Ok(vm.ctx.new_bool(args[0].is(&args[1])))
    });
    let key = new_class(vm, "Key", &[], vec![("__eq__", eq)])?;
    let huge = method(vm, "__hash__", &["self"], |vm, _args| {
        Ok(vm.ctx.new_int(1u128 << 70).into())
    });
    let big = new_class(vm, "Big", &[], vec![("__hash__", huge)])?;
    let text = method(vm, "__hash__", &["self"], |vm, _args| Ok(vm.ctx.new_str("0").into()));
    let bad = new_class(vm, "Bad", &[], vec![("__hash__", text)])?;

    let mut lines = Vec::new();
    for cls in [key, big, bad] {
        let obj = vm.call(&cls.to_object(), FuncArgs::default())?;
        let line = match vm.hash(&obj) {
            Ok(h) => format!("hash({}()) -> {h}", cls.name()),
            Err(exc) => format!("hash({}()) -> {}", cls.name(), exc.to_report()),
        };
        lines.push(line);
    }
    lines.push(format!("hash(-1) -> {}", vm.hash(&int(vm, -1))?));
    Ok(lines)
}

fn getattr(vm: &VirtualMachine) -> PyResult<Vec<String>> {
    let hook = method(vm, "__getattr__", &["self", "name"], |vm, args| {
        let name = vm.attribute_name(&args[1])?;
        Ok(vm.ctx.new_str(format!("computed {}", name.as_str())).into())
    });
    let cls = new_class(vm, "Lazy", &[], vec![("__getattr__", hook)])?;
    let obj = vm.call(&cls.to_object(), FuncArgs::default())?;
    set_attr(vm, &obj, "x", int(vm, 1))?;

    let mut lines = vec![
        format!("lazy.x -> {}", outcome(vm, vm.get_attr(&obj, "x"))),
        format!("lazy.y -> {}", outcome(vm, vm.get_attr(&obj, "y"))),
    ];
    cls.set_attr("__getattr__", PySetterValue::Delete, vm)?;
    lines.push(format!(
        "after del Lazy.__getattr__, lazy.y -> {}",
        outcome(vm, vm.get_attr(&obj, "y"))
    ));
    lines.push(format!(
        "(1).real -> {}",
        outcome(vm, vm.get_attr(&int(vm, 1), "real"))
    ));
    Ok(lines)
}

fn iter(vm: &VirtualMachine) -> PyResult<Vec<String>> {
    let init = method(vm, "__init__", &["self", "start"], |vm, args| {
        set_attr(vm, &args[0], "n", args[1].clone())?;
        Ok(vm.ctx.none())
    });
    let iter = method(vm, "__iter__", &["self"], |_vm, args| Ok(args[0].clone()));
    let next = method(vm, "__next__", &["self"], |vm, args| {
        let n = vm.get_attr(&args[0], "n")?;
        if n.payload::<PyInt>().and_then(PyInt::to_isize) == Some(0) {
            return Err(vm.new_stop_iteration(None));
        }
        let rest = vm.binary_op(&n, &int(vm, 1), SlotKind::NbSubtract)?;
        set_attr(vm, &args[0], "n", rest)?;
        Ok(n)
    });
    let cls = new_class(
        vm,
        "Countdown",
        &[],
        vec![("__init__", init), ("__iter__", iter), ("__next__", next)],
    )?;
    let countdown = vm.call(&cls.to_object(), vec![int(vm, 3)])?;

    let it = vm.iter(&countdown)?;
    let values = PyIterIter::new(vm, it)
        .map(|item| Ok(vm.repr(&item?)?.as_str().to_owned()))
        .collect::<PyResult<Vec<_>>>()?;
    let tuple: PyObjectRef = vm.ctx.new_tuple(vec![int(vm, 7), int(vm, 8)]).into();
    let again = vm.call(&cls.to_object(), vec![int(vm, 3)])?;
    Ok(vec![
        format!("list(Countdown(3)) -> [{}]", values.join(", ")),
        format!("2 in Countdown(3) -> {}", vm.contains(&again, &int(vm, 2))?),
        format!("8 in (7, 8) -> {}", vm.contains(&tuple, &int(vm, 8))?),
        format!("iter(1) -> {}", outcome(vm, vm.iter(&int(vm, 1)))),
    ])
}
