use super::{PyStr, PyTypeRef};
use crate::{
    Context, PyObjectRef, PyPayload, PyRef, PyResult, VirtualMachine,
    common::hash::{self, PyHash},
    function::FuncArgs,
    types::{BuiltinSlot, BuiltinSlotFunc, PyComparisonOp, PyTypeFlags, SlotKind},
};
use core::fmt;
use malachite_bigint::BigInt;
use num_integer::Integer;
use num_traits::{Pow, Signed, ToPrimitive, Zero};

#[derive(Debug)]
pub struct PyInt {
    value: BigInt,
}

pub type PyIntRef = PyRef<PyInt>;

impl fmt::Display for PyInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        BigInt::fmt(&self.value, f)
    }
}

impl<T> From<T> for PyInt
where
    T: Into<BigInt>,
{
    fn from(v: T) -> Self {
        Self { value: v.into() }
    }
}

impl PyPayload for PyInt {
    #[inline]
    fn class(ctx: &Context) -> &PyTypeRef {
        &ctx.types.int_type
    }
}

impl PyInt {
    #[inline]
    pub fn as_bigint(&self) -> &BigInt {
        &self.value
    }

    pub fn to_isize(&self) -> Option<isize> {
        self.value.to_isize()
    }

    fn number_op<F>(a: &PyObjectRef, b: &PyObjectRef, op: F, vm: &VirtualMachine) -> PyResult
    where
        F: FnOnce(&BigInt, &BigInt, &VirtualMachine) -> PyResult,
    {
        match (a.payload::<Self>(), b.payload::<Self>()) {
            (Some(a), Some(b)) => op(&a.value, &b.value, vm),
            _ => Ok(vm.ctx.not_implemented()),
        }
    }

    fn unary_op<F>(a: &PyObjectRef, op: F, vm: &VirtualMachine) -> PyResult
    where
        F: FnOnce(&BigInt) -> BigInt,
    {
        match a.payload::<Self>() {
            Some(a) => Ok(vm.ctx.new_int(op(&a.value)).into()),
            None => Err(vm.new_type_error(format!(
                "descriptor requires a 'int' object but received a '{}'",
                a.class().name()
            ))),
        }
    }
}

fn inner_mod(int1: &BigInt, int2: &BigInt, vm: &VirtualMachine) -> PyResult {
    if int2.is_zero() {
        Err(vm.new_zero_division_error("integer modulo by zero"))
    } else {
        Ok(vm.ctx.new_int(int1.mod_floor(int2)).into())
    }
}

fn inner_floordiv(int1: &BigInt, int2: &BigInt, vm: &VirtualMachine) -> PyResult {
    if int2.is_zero() {
        Err(vm.new_zero_division_error("integer division or modulo by zero"))
    } else {
        Ok(vm.ctx.new_int(int1.div_floor(int2)).into())
    }
}

fn inner_divmod(int1: &BigInt, int2: &BigInt, vm: &VirtualMachine) -> PyResult {
    if int2.is_zero() {
        return Err(vm.new_zero_division_error("integer division or modulo by zero"));
    }
    let (div, modulo) = int1.div_mod_floor(int2);
    let items = vec![vm.ctx.new_int(div).into(), vm.ctx.new_int(modulo).into()];
    Ok(vm.ctx.new_tuple(items).into())
}

fn inner_pow(int1: &BigInt, int2: &BigInt, vm: &VirtualMachine) -> PyResult {
    if int2.is_negative() {
        // the result would be a float
        return Ok(vm.ctx.not_implemented());
    }
    match int2.to_u64() {
        Some(exp) => Ok(vm.ctx.new_int(Pow::pow(int1, exp)).into()),
        None => Err(vm.new_overflow_error("exponent too large")),
    }
}

fn inner_shift(base: &BigInt, bits: &BigInt, left: bool, vm: &VirtualMachine) -> PyResult {
    if bits.is_negative() {
        return Err(vm.new_value_error("negative shift count"));
    }
    let Some(bits) = bits.to_usize() else {
        return Err(vm.new_overflow_error("the number is too large to convert to int"));
    };
    let value = if left { base << bits } else { base >> bits };
    Ok(vm.ctx.new_int(value).into())
}

fn int_add(a: &PyObjectRef, b: &PyObjectRef, vm: &VirtualMachine) -> PyResult {
    PyInt::number_op(a, b, |a, b, vm| Ok(vm.ctx.new_int(a + b).into()), vm)
}

fn int_subtract(a: &PyObjectRef, b: &PyObjectRef, vm: &VirtualMachine) -> PyResult {
    PyInt::number_op(a, b, |a, b, vm| Ok(vm.ctx.new_int(a - b).into()), vm)
}

fn int_multiply(a: &PyObjectRef, b: &PyObjectRef, vm: &VirtualMachine) -> PyResult {
    PyInt::number_op(a, b, |a, b, vm| Ok(vm.ctx.new_int(a * b).into()), vm)
}

fn int_remainder(a: &PyObjectRef, b: &PyObjectRef, vm: &VirtualMachine) -> PyResult {
    PyInt::number_op(a, b, inner_mod, vm)
}

fn int_divmod(a: &PyObjectRef, b: &PyObjectRef, vm: &VirtualMachine) -> PyResult {
    PyInt::number_op(a, b, inner_divmod, vm)
}

fn int_floor_divide(a: &PyObjectRef, b: &PyObjectRef, vm: &VirtualMachine) -> PyResult {
    PyInt::number_op(a, b, inner_floordiv, vm)
}

fn int_lshift(a: &PyObjectRef, b: &PyObjectRef, vm: &VirtualMachine) -> PyResult {
    PyInt::number_op(a, b, |a, b, vm| inner_shift(a, b, true, vm), vm)
}

fn int_rshift(a: &PyObjectRef, b: &PyObjectRef, vm: &VirtualMachine) -> PyResult {
    PyInt::number_op(a, b, |a, b, vm| inner_shift(a, b, false, vm), vm)
}

fn int_and(a: &PyObjectRef, b: &PyObjectRef, vm: &VirtualMachine) -> PyResult {
    PyInt::number_op(a, b, |a, b, vm| Ok(vm.ctx.new_int(a & b).into()), vm)
}

fn int_xor(a: &PyObjectRef, b: &PyObjectRef, vm: &VirtualMachine) -> PyResult {
    PyInt::number_op(a, b, |a, b, vm| Ok(vm.ctx.new_int(a ^ b).into()), vm)
}

fn int_or(a: &PyObjectRef, b: &PyObjectRef, vm: &VirtualMachine) -> PyResult {
    PyInt::number_op(a, b, |a, b, vm| Ok(vm.ctx.new_int(a | b).into()), vm)
}

fn int_power(a: &PyObjectRef, b: &PyObjectRef, c: &PyObjectRef, vm: &VirtualMachine) -> PyResult {
    if vm.is_none(c) {
        return PyInt::number_op(a, b, inner_pow, vm);
    }
    let (Some(a), Some(b), Some(m)) = (
        a.payload::<PyInt>(),
        b.payload::<PyInt>(),
        c.payload::<PyInt>(),
    ) else {
        return Ok(vm.ctx.not_implemented());
    };
    if m.value.is_zero() {
        return Err(vm.new_value_error("pow() 3rd argument cannot be 0"));
    }
    if b.value.is_negative() {
        return Err(vm.new_value_error("negative exponent with modulus is not supported"));
    }
    Ok(vm
        .ctx
        .new_int(a.value.modpow(&b.value, &m.value).mod_floor(&m.value))
        .into())
}

fn int_negative(a: &PyObjectRef, vm: &VirtualMachine) -> PyResult {
    PyInt::unary_op(a, |v| -v, vm)
}

fn int_positive(a: &PyObjectRef, vm: &VirtualMachine) -> PyResult {
    PyInt::unary_op(a, Clone::clone, vm)
}

fn int_absolute(a: &PyObjectRef, vm: &VirtualMachine) -> PyResult {
    PyInt::unary_op(a, |v| v.abs(), vm)
}

fn int_invert(a: &PyObjectRef, vm: &VirtualMachine) -> PyResult {
    PyInt::unary_op(a, |v| !v, vm)
}

fn int_bool(a: &PyObjectRef, vm: &VirtualMachine) -> PyResult<bool> {
    match a.payload::<PyInt>() {
        Some(a) => Ok(!a.value.is_zero()),
        None => Err(vm.new_type_error("descriptor '__bool__' requires a 'int' object")),
    }
}

/// `__index__` and `__int__`: an exact int is returned as is.
fn int_index(a: &PyObjectRef, vm: &VirtualMachine) -> PyResult {
    if a.class().is(&vm.ctx.types.int_type) {
        return Ok(a.clone());
    }
    PyInt::unary_op(a, Clone::clone, vm)
}

fn int_hash(a: &PyObjectRef, vm: &VirtualMachine) -> PyResult<PyHash> {
    match a.payload::<PyInt>() {
        Some(a) => Ok(hash::hash_bigint(&a.value)),
        None => Err(vm.new_type_error("descriptor '__hash__' requires a 'int' object")),
    }
}

fn int_richcompare(
    a: &PyObjectRef,
    b: &PyObjectRef,
    op: PyComparisonOp,
    vm: &VirtualMachine,
) -> PyResult {
    match (a.payload::<PyInt>(), b.payload::<PyInt>()) {
        (Some(a), Some(b)) => Ok(vm.ctx.new_bool(op.eval_ord(a.value.cmp(&b.value)))),
        _ => Ok(vm.ctx.not_implemented()),
    }
}

fn int_repr(a: &PyObjectRef, vm: &VirtualMachine) -> PyResult {
    match a.payload::<PyInt>() {
        Some(a) => Ok(vm.ctx.new_str(a.value.to_string()).into()),
        None => Err(vm.new_type_error("descriptor '__repr__' requires a 'int' object")),
    }
}

fn int_new(cls: PyTypeRef, args: FuncArgs, vm: &VirtualMachine) -> PyResult {
    if let Some(err) = args.check_kwargs_empty(vm) {
        return Err(err);
    }
    let value = match args.args.as_slice() {
        [] => BigInt::zero(),
        [x] => int_from_object(x, vm)?,
        other => {
            return Err(vm.new_type_error(format!(
                "int() takes at most 1 argument ({} given)",
                other.len()
            )));
        }
    };
    if cls.is(&vm.ctx.types.int_type) {
        return Ok(vm.ctx.new_int(value).into());
    }
    let dict = cls
        .flags
        .has_feature(PyTypeFlags::HAS_DICT)
        .then(Default::default);
    Ok(PyRef::new_ref(PyInt::from(value), cls, dict).into())
}

fn int_from_object(x: &PyObjectRef, vm: &VirtualMachine) -> PyResult<BigInt> {
    if let Some(int) = x.payload::<PyInt>() {
        return Ok(int.value.clone());
    }
    if let Some(s) = x.payload::<PyStr>() {
        return s.as_str().trim().parse::<BigInt>().map_err(|_| {
            vm.new_value_error(format!(
                "invalid literal for int() with base 10: '{}'",
                s.as_str()
            ))
        });
    }
    let slots = x.class().slots();
    let kind = if slots.get(SlotKind::NbInt).is_some() {
        SlotKind::NbInt
    } else if slots.get(SlotKind::NbIndex).is_some() {
        SlotKind::NbIndex
    } else {
        return Err(vm.new_type_error(format!(
            "int() argument must be a string or a real number, not '{}'",
            x.class().name()
        )));
    };
    let result = vm.call_unary_slot(kind, x)?;
    match result.payload::<PyInt>() {
        Some(int) => Ok(int.value.clone()),
        None => Err(vm.new_type_error(format!(
            "__int__ returned non-int (type {})",
            result.class().name()
        ))),
    }
}

fn bool_repr(a: &PyObjectRef, vm: &VirtualMachine) -> PyResult {
    let value = a.payload::<PyInt>().is_some_and(|i| !i.value.is_zero());
    Ok(vm.ctx.new_str(if value { "True" } else { "False" }).into())
}

fn bool_new(_cls: PyTypeRef, args: FuncArgs, vm: &VirtualMachine) -> PyResult {
    if let Some(err) = args.check_kwargs_empty(vm) {
        return Err(err);
    }
    match args.args.as_slice() {
        [] => Ok(vm.ctx.new_bool(false)),
        [x] => Ok(vm.ctx.new_bool(vm.is_true(x)?)),
        other => Err(vm.new_type_error(format!(
            "bool expected at most 1 argument, got {}",
            other.len()
        ))),
    }
}

macro_rules! int_slots {
    ($($name:ident: $kind:ident => $func:expr;)*) => {
        $(
            pub static $name: BuiltinSlot = BuiltinSlot::new("int", SlotKind::$kind, $func);
        )*
        pub(crate) static INT_SLOTS: &[&BuiltinSlot] = &[$(&$name),*];
    };
}

int_slots! {
    INT_ADD: NbAdd => BuiltinSlotFunc::Binary(int_add);
    INT_SUBTRACT: NbSubtract => BuiltinSlotFunc::Binary(int_subtract);
    INT_MULTIPLY: NbMultiply => BuiltinSlotFunc::Binary(int_multiply);
    INT_REMAINDER: NbRemainder => BuiltinSlotFunc::Binary(int_remainder);
    INT_DIVMOD: NbDivmod => BuiltinSlotFunc::Binary(int_divmod);
    INT_POWER: NbPower => BuiltinSlotFunc::Ternary(int_power);
    INT_LSHIFT: NbLshift => BuiltinSlotFunc::Binary(int_lshift);
    INT_RSHIFT: NbRshift => BuiltinSlotFunc::Binary(int_rshift);
    INT_AND: NbAnd => BuiltinSlotFunc::Binary(int_and);
    INT_XOR: NbXor => BuiltinSlotFunc::Binary(int_xor);
    INT_OR: NbOr => BuiltinSlotFunc::Binary(int_or);
    INT_FLOOR_DIVIDE: NbFloorDivide => BuiltinSlotFunc::Binary(int_floor_divide);
    INT_NEGATIVE: NbNegative => BuiltinSlotFunc::Unary(int_negative);
    INT_POSITIVE: NbPositive => BuiltinSlotFunc::Unary(int_positive);
    INT_ABSOLUTE: NbAbsolute => BuiltinSlotFunc::Unary(int_absolute);
    INT_INVERT: NbInvert => BuiltinSlotFunc::Unary(int_invert);
    INT_BOOL: NbBool => BuiltinSlotFunc::Inquiry(int_bool);
    INT_INDEX: NbIndex => BuiltinSlotFunc::Unary(int_index);
    INT_INT: NbInt => BuiltinSlotFunc::Unary(int_index);
    INT_HASH: TpHash => BuiltinSlotFunc::Hash(int_hash);
    INT_RICHCOMPARE: TpRichcompare => BuiltinSlotFunc::RichCompare(int_richcompare);
    INT_REPR: TpRepr => BuiltinSlotFunc::Unary(int_repr);
    INT_NEW: TpNew => BuiltinSlotFunc::New(int_new);
}

pub static BOOL_REPR: BuiltinSlot =
    BuiltinSlot::new("bool", SlotKind::TpRepr, BuiltinSlotFunc::Unary(bool_repr));
pub static BOOL_NEW: BuiltinSlot =
    BuiltinSlot::new("bool", SlotKind::TpNew, BuiltinSlotFunc::New(bool_new));

pub(crate) static BOOL_SLOTS: [&BuiltinSlot; 2] = [&BOOL_REPR, &BOOL_NEW];
