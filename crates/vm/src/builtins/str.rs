use super::{PyInt, PyTypeRef};
use crate::{
    Context, PyObjectRef, PyPayload, PyRef, PyResult, VirtualMachine,
    common::hash::PyHash,
    types::{BuiltinSlot, BuiltinSlotFunc, PyComparisonOp, SlotKind},
};
use core::fmt;

/// An immutable string. Length and indexing count chars.
pub struct PyStr {
    value: Box<str>,
    char_len: usize,
}

pub type PyStrRef = PyRef<PyStr>;

impl fmt::Debug for PyStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.value, f)
    }
}

impl fmt::Display for PyStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl From<&str> for PyStr {
    fn from(s: &str) -> Self {
        s.to_owned().into()
    }
}

impl From<String> for PyStr {
    fn from(s: String) -> Self {
        let char_len = s.chars().count();
        Self {
            value: s.into_boxed_str(),
            char_len,
        }
    }
}

impl PyPayload for PyStr {
    #[inline]
    fn class(ctx: &Context) -> &PyTypeRef {
        &ctx.types.str_type
    }
}

impl PyStr {
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    #[inline]
    pub fn char_len(&self) -> usize {
        self.char_len
    }

    /// Single-quoted representation with the usual escapes.
    pub fn repr(&self) -> String {
        let quote = if self.value.contains('\'') && !self.value.contains('"') {
            '"'
        } else {
            '\''
        };
        let mut out = String::with_capacity(self.value.len() + 2);
        out.push(quote);
        for ch in self.value.chars() {
            match ch {
                '\\' => out.push_str("\\\\"),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                c if c == quote => {
                    out.push('\\');
                    out.push(c);
                }
                c if c.is_control() => out.push_str(&format!("\\x{:02x}", c as u32)),
                c => out.push(c),
            }
        }
        out.push(quote);
        out
    }
}

fn downcast_str<'a>(obj: &'a PyObjectRef, op: &str, vm: &VirtualMachine) -> PyResult<&'a PyStr> {
    obj.payload::<PyStr>().ok_or_else(|| {
        vm.new_type_error(format!(
            "descriptor '{op}' requires a 'str' object but received a '{}'",
            obj.class().name()
        ))
    })
}

fn str_hash(zelf: &PyObjectRef, vm: &VirtualMachine) -> PyResult<PyHash> {
    let s = downcast_str(zelf, "__hash__", vm)?;
    Ok(vm.ctx.hash_secret.hash_str(s.as_str()))
}

fn str_len(zelf: &PyObjectRef, vm: &VirtualMachine) -> PyResult<usize> {
    downcast_str(zelf, "__len__", vm).map(PyStr::char_len)
}

fn str_richcompare(
    a: &PyObjectRef,
    b: &PyObjectRef,
    op: PyComparisonOp,
    vm: &VirtualMachine,
) -> PyResult {
    match (a.payload::<PyStr>(), b.payload::<PyStr>()) {
        (Some(a), Some(b)) => Ok(vm.ctx.new_bool(op.eval_ord(a.as_str().cmp(b.as_str())))),
        _ => Ok(vm.ctx.not_implemented()),
    }
}

fn str_repr(zelf: &PyObjectRef, vm: &VirtualMachine) -> PyResult {
    let s = downcast_str(zelf, "__repr__", vm)?;
    Ok(vm.ctx.new_str(s.repr()).into())
}

fn str_str(zelf: &PyObjectRef, vm: &VirtualMachine) -> PyResult {
    let s = downcast_str(zelf, "__str__", vm)?;
    if zelf.class().is(&vm.ctx.types.str_type) {
        Ok(zelf.clone())
    } else {
        Ok(vm.ctx.new_str(s.as_str()).into())
    }
}

fn str_concat(a: &PyObjectRef, b: &PyObjectRef, vm: &VirtualMachine) -> PyResult {
    let a = downcast_str(a, "__add__", vm)?;
    let Some(b) = b.payload::<PyStr>() else {
        return Err(vm.new_type_error(format!(
            "can only concatenate str (not \"{}\") to str",
            b.class().name()
        )));
    };
    Ok(vm.ctx.new_str(format!("{a}{b}")).into())
}

fn str_repeat(zelf: &PyObjectRef, n: isize, vm: &VirtualMachine) -> PyResult {
    let s = downcast_str(zelf, "__mul__", vm)?;
    let n = usize::try_from(n).unwrap_or(0);
    if n.checked_mul(s.as_str().len()).is_none() {
        return Err(vm.new_overflow_error("repeated string is too long"));
    }
    Ok(vm.ctx.new_str(s.as_str().repeat(n)).into())
}

fn str_contains(zelf: &PyObjectRef, needle: &PyObjectRef, vm: &VirtualMachine) -> PyResult<bool> {
    let s = downcast_str(zelf, "__contains__", vm)?;
    match needle.payload::<PyStr>() {
        Some(needle) => Ok(s.as_str().contains(needle.as_str())),
        None => Err(vm.new_type_error(format!(
            "'in <string>' requires string as left operand, not {}",
            needle.class().name()
        ))),
    }
}

fn str_item(zelf: &PyObjectRef, index: isize, vm: &VirtualMachine) -> PyResult {
    let s = downcast_str(zelf, "__getitem__", vm)?;
    let len = s.char_len() as isize;
    let i = if index < 0 { index + len } else { index };
    if !(0..len).contains(&i) {
        return Err(vm.new_index_error("string index out of range"));
    }
    let ch = s.as_str().chars().nth(i as usize);
    Ok(vm.ctx.new_str(ch.map(String::from).unwrap_or_default()).into())
}

fn str_subscript(zelf: &PyObjectRef, key: &PyObjectRef, vm: &VirtualMachine) -> PyResult {
    if key.payload::<PyInt>().is_none() {
        return Err(vm.new_type_error(format!(
            "string indices must be integers, not '{}'",
            key.class().name()
        )));
    }
    str_item(zelf, vm.to_isize(key)?, vm)
}

pub static STR_HASH: BuiltinSlot =
    BuiltinSlot::new("str", SlotKind::TpHash, BuiltinSlotFunc::Hash(str_hash));
pub static STR_RICHCOMPARE: BuiltinSlot = BuiltinSlot::new(
    "str",
    SlotKind::TpRichcompare,
    BuiltinSlotFunc::RichCompare(str_richcompare),
);
pub static STR_REPR: BuiltinSlot =
    BuiltinSlot::new("str", SlotKind::TpRepr, BuiltinSlotFunc::Unary(str_repr));
pub static STR_STR: BuiltinSlot =
    BuiltinSlot::new("str", SlotKind::TpStr, BuiltinSlotFunc::Unary(str_str));
pub static STR_SQ_LENGTH: BuiltinSlot =
    BuiltinSlot::new("str", SlotKind::SqLength, BuiltinSlotFunc::Len(str_len));
pub static STR_MP_LENGTH: BuiltinSlot =
    BuiltinSlot::new("str", SlotKind::MpLength, BuiltinSlotFunc::Len(str_len));
pub static STR_CONCAT: BuiltinSlot =
    BuiltinSlot::new("str", SlotKind::SqConcat, BuiltinSlotFunc::Binary(str_concat));
pub static STR_REPEAT: BuiltinSlot =
    BuiltinSlot::new("str", SlotKind::SqRepeat, BuiltinSlotFunc::SqItem(str_repeat));
pub static STR_CONTAINS: BuiltinSlot = BuiltinSlot::new(
    "str",
    SlotKind::SqContains,
    BuiltinSlotFunc::Contains(str_contains),
);
pub static STR_ITEM: BuiltinSlot =
    BuiltinSlot::new("str", SlotKind::SqItem, BuiltinSlotFunc::SqItem(str_item));
pub static STR_SUBSCRIPT: BuiltinSlot = BuiltinSlot::new(
    "str",
    SlotKind::MpSubscript,
    BuiltinSlotFunc::Binary(str_subscript),
);

pub(crate) static STR_SLOTS: [&BuiltinSlot; 11] = [
    &STR_HASH,
    &STR_RICHCOMPARE,
    &STR_REPR,
    &STR_STR,
    &STR_SQ_LENGTH,
    &STR_MP_LENGTH,
    &STR_CONCAT,
    &STR_REPEAT,
    &STR_CONTAINS,
    &STR_ITEM,
    &STR_SUBSCRIPT,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repr_escapes_quotes_and_controls() {
        assert_eq!(PyStr::from("abc").repr(), "'abc'");
        assert_eq!(PyStr::from("it's").repr(), "\"it's\"");
        assert_eq!(PyStr::from("a\nb").repr(), "'a\\nb'");
        assert_eq!(PyStr::from("'\"").repr(), "'\\'\"'");
    }

    #[test]
    fn char_len_counts_chars() {
        assert_eq!(PyStr::from("héllo").char_len(), 5);
    }
}
