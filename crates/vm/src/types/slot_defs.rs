//! Slot kinds and the table mapping each kind to the magic method names that can fill it.
//!
//! [`SLOT_DEFS`] plays the role of CPython's `slotdefs[]`: it drives both the generation of
//! slot wrapper descriptors for builtin and native types and the lookup that recomputes a
//! heap type's slots.

use super::PyComparisonOp;
use strum::{EnumCount, IntoEnumIterator};
use strum_macros::{EnumCount as EnumCountMacro, EnumIter, IntoStaticStr};

/// One field of a [`super::SlotTable`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumCountMacro, EnumIter, IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
#[repr(u8)]
pub enum SlotKind {
    // type
    TpGetattr,
    TpGetattro,
    TpSetattr,
    TpSetattro,
    TpHash,
    TpRichcompare,
    TpIter,
    TpIternext,
    TpRepr,
    TpStr,
    TpCall,
    TpInit,
    TpNew,
    TpDescrGet,
    TpDescrSet,

    // number, binary
    NbAdd,
    NbSubtract,
    NbMultiply,
    NbRemainder,
    NbDivmod,
    NbPower,
    NbLshift,
    NbRshift,
    NbAnd,
    NbXor,
    NbOr,
    NbFloorDivide,
    NbTrueDivide,
    NbMatrixMultiply,

    // number, in-place
    NbInplaceAdd,
    NbInplaceSubtract,
    NbInplaceMultiply,
    NbInplaceRemainder,
    NbInplacePower,
    NbInplaceLshift,
    NbInplaceRshift,
    NbInplaceAnd,
    NbInplaceXor,
    NbInplaceOr,
    NbInplaceFloorDivide,
    NbInplaceTrueDivide,
    NbInplaceMatrixMultiply,

    // number, unary
    NbNegative,
    NbPositive,
    NbAbsolute,
    NbInvert,
    NbBool,
    NbIndex,
    NbInt,
    NbFloat,

    // mapping
    MpLength,
    MpSubscript,
    MpAssSubscript,

    // sequence
    SqLength,
    SqItem,
    SqAssItem,
    SqContains,
    SqConcat,
    SqRepeat,
    SqInplaceConcat,
    SqInplaceRepeat,

    // async
    AmAwait,
    AmAiter,
    AmAnext,
}

pub const SLOT_COUNT: usize = SlotKind::COUNT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotGroup {
    Type,
    Number,
    Mapping,
    Sequence,
    Async,
}

/// How a user-defined slot bundles its callables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PythonSlotShape {
    Single,
    /// `__op__`, `__rop__`
    Reversible,
    /// `__getattribute__`, `__getattr__`
    GetAttr,
    /// `__setattr__`, `__delattr__`
    SetAttr,
    /// `__set__`, `__delete__`
    DescrSet,
    /// `__setitem__`, `__delitem__`
    AssItem,
    /// one callable per comparison operator, in [`PyComparisonOp::ALL`] order
    RichCmp,
}

impl SlotKind {
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub fn name(self) -> &'static str {
        self.into()
    }

    pub fn group(self) -> SlotGroup {
        use SlotKind::*;
        match self {
            TpGetattr | TpGetattro | TpSetattr | TpSetattro | TpHash | TpRichcompare | TpIter
            | TpIternext | TpRepr | TpStr | TpCall | TpInit | TpNew | TpDescrGet | TpDescrSet => {
                SlotGroup::Type
            }
            MpLength | MpSubscript | MpAssSubscript => SlotGroup::Mapping,
            SqLength | SqItem | SqAssItem | SqContains | SqConcat | SqRepeat | SqInplaceConcat
            | SqInplaceRepeat => SlotGroup::Sequence,
            AmAwait | AmAiter | AmAnext => SlotGroup::Async,
            _ => SlotGroup::Number,
        }
    }

    pub fn python_shape(self) -> PythonSlotShape {
        use SlotKind::*;
        match self {
            TpGetattro => PythonSlotShape::GetAttr,
            TpSetattro => PythonSlotShape::SetAttr,
            TpDescrSet => PythonSlotShape::DescrSet,
            MpAssSubscript | SqAssItem => PythonSlotShape::AssItem,
            TpRichcompare => PythonSlotShape::RichCmp,
            _ if self.reflected_names().is_some() => PythonSlotShape::Reversible,
            _ => PythonSlotShape::Single,
        }
    }

    /// `(__op__, __rop__)` for binary number slots that have a reflected form.
    pub fn reflected_names(self) -> Option<(&'static str, &'static str)> {
        use SlotKind::*;
        Some(match self {
            NbAdd => ("__add__", "__radd__"),
            NbSubtract => ("__sub__", "__rsub__"),
            NbMultiply => ("__mul__", "__rmul__"),
            NbRemainder => ("__mod__", "__rmod__"),
            NbDivmod => ("__divmod__", "__rdivmod__"),
            NbPower => ("__pow__", "__rpow__"),
            NbLshift => ("__lshift__", "__rlshift__"),
            NbRshift => ("__rshift__", "__rrshift__"),
            NbAnd => ("__and__", "__rand__"),
            NbXor => ("__xor__", "__rxor__"),
            NbOr => ("__or__", "__ror__"),
            NbFloorDivide => ("__floordiv__", "__rfloordiv__"),
            NbTrueDivide => ("__truediv__", "__rtruediv__"),
            NbMatrixMultiply => ("__matmul__", "__rmatmul__"),
            _ => return None,
        })
    }

    /// The binary slot an in-place slot falls back to.
    pub fn inplace_counterpart(self) -> Option<SlotKind> {
        use SlotKind::*;
        Some(match self {
            NbInplaceAdd => NbAdd,
            NbInplaceSubtract => NbSubtract,
            NbInplaceMultiply => NbMultiply,
            NbInplaceRemainder => NbRemainder,
            NbInplacePower => NbPower,
            NbInplaceLshift => NbLshift,
            NbInplaceRshift => NbRshift,
            NbInplaceAnd => NbAnd,
            NbInplaceXor => NbXor,
            NbInplaceOr => NbOr,
            NbInplaceFloorDivide => NbFloorDivide,
            NbInplaceTrueDivide => NbTrueDivide,
            NbInplaceMatrixMultiply => NbMatrixMultiply,
            _ => return None,
        })
    }

    /// Operator spelling used in "unsupported operand" errors.
    pub fn operator_symbol(self) -> &'static str {
        use SlotKind::*;
        match self {
            NbAdd => "+",
            NbSubtract => "-",
            NbMultiply => "*",
            NbRemainder => "%",
            NbDivmod => "divmod()",
            NbPower => "** or pow()",
            NbLshift => "<<",
            NbRshift => ">>",
            NbAnd => "&",
            NbXor => "^",
            NbOr => "|",
            NbFloorDivide => "//",
            NbTrueDivide => "/",
            NbMatrixMultiply => "@",
            NbInplaceAdd => "+=",
            NbInplaceSubtract => "-=",
            NbInplaceMultiply => "*=",
            NbInplaceRemainder => "%=",
            NbInplacePower => "**=",
            NbInplaceLshift => "<<=",
            NbInplaceRshift => ">>=",
            NbInplaceAnd => "&=",
            NbInplaceXor => "^=",
            NbInplaceOr => "|=",
            NbInplaceFloorDivide => "//=",
            NbInplaceTrueDivide => "/=",
            NbInplaceMatrixMultiply => "@=",
            NbNegative => "unary -",
            NbPositive => "unary +",
            NbInvert => "unary ~",
            NbAbsolute => "abs()",
            other => other.name(),
        }
    }

    /// Magic names that can fill this slot, in lookup order. Empty for native-only slots.
    pub fn magic_names(self) -> impl Iterator<Item = &'static str> {
        self.defs().map(|def| def.name)
    }

    pub fn defs(self) -> impl Iterator<Item = &'static SlotDef> {
        SLOT_DEFS.iter().filter(move |def| def.kind == self)
    }

    pub fn has_magic_names(self) -> bool {
        self.defs().next().is_some()
    }

    /// All kinds a magic name participates in; `__len__` fills both `mp_length` and
    /// `sq_length`, for example.
    pub fn for_magic_name(name: &str) -> impl Iterator<Item = SlotKind> + '_ {
        SlotKind::iter().filter(move |kind| kind.magic_names().any(|n| n == name))
    }

    pub fn is_magic_name(name: &str) -> bool {
        SLOT_DEFS.iter().any(|def| def.name == name)
    }
}

/// Calling convention of a slot wrapper descriptor, i.e. how the Python-level arguments map
/// onto the slot function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapperTag {
    Unary,
    BinaryL,
    BinaryR,
    Ternary,
    TernaryR,
    Len,
    Hash,
    Inquiry,
    GetAttr,
    SetAttr,
    DelAttr,
    RichCmp(PyComparisonOp),
    Next,
    DescrGet,
    DescrSet,
    DescrDelete,
    Init,
    New,
    Call,
    SqItem,
    SetItem,
    DelItem,
    Contains,
}

#[derive(Debug, Clone, Copy)]
pub struct SlotDef {
    pub kind: SlotKind,
    pub name: &'static str,
    pub tag: WrapperTag,
}

const fn def(kind: SlotKind, name: &'static str, tag: WrapperTag) -> SlotDef {
    SlotDef { kind, name, tag }
}

macro_rules! binary_defs {
    ($($kind:ident => $l:literal, $r:literal;)*) => {
        [$(
            def(SlotKind::$kind, $l, WrapperTag::BinaryL),
            def(SlotKind::$kind, $r, WrapperTag::BinaryR),
        )*]
    };
}

const BINARY_DEFS: [SlotDef; 26] = binary_defs! {
    NbAdd => "__add__", "__radd__";
    NbSubtract => "__sub__", "__rsub__";
    NbMultiply => "__mul__", "__rmul__";
    NbRemainder => "__mod__", "__rmod__";
    NbDivmod => "__divmod__", "__rdivmod__";
    NbLshift => "__lshift__", "__rlshift__";
    NbRshift => "__rshift__", "__rrshift__";
    NbAnd => "__and__", "__rand__";
    NbXor => "__xor__", "__rxor__";
    NbOr => "__or__", "__ror__";
    NbFloorDivide => "__floordiv__", "__rfloordiv__";
    NbTrueDivide => "__truediv__", "__rtruediv__";
    NbMatrixMultiply => "__matmul__", "__rmatmul__";
};

const OTHER_DEFS: [SlotDef; 52] = {
    use SlotKind::*;
    use WrapperTag as W;
    [
        def(TpGetattro, "__getattribute__", W::GetAttr),
        def(TpGetattro, "__getattr__", W::GetAttr),
        def(TpSetattro, "__setattr__", W::SetAttr),
        def(TpSetattro, "__delattr__", W::DelAttr),
        def(TpHash, "__hash__", W::Hash),
        def(TpRichcompare, "__lt__", W::RichCmp(PyComparisonOp::Lt)),
        def(TpRichcompare, "__le__", W::RichCmp(PyComparisonOp::Le)),
        def(TpRichcompare, "__eq__", W::RichCmp(PyComparisonOp::Eq)),
        def(TpRichcompare, "__ne__", W::RichCmp(PyComparisonOp::Ne)),
        def(TpRichcompare, "__gt__", W::RichCmp(PyComparisonOp::Gt)),
        def(TpRichcompare, "__ge__", W::RichCmp(PyComparisonOp::Ge)),
        def(TpIter, "__iter__", W::Unary),
        def(TpIternext, "__next__", W::Next),
        def(TpRepr, "__repr__", W::Unary),
        def(TpStr, "__str__", W::Unary),
        def(TpCall, "__call__", W::Call),
        def(TpInit, "__init__", W::Init),
        def(TpNew, "__new__", W::New),
        def(TpDescrGet, "__get__", W::DescrGet),
        def(TpDescrSet, "__set__", W::DescrSet),
        def(TpDescrSet, "__delete__", W::DescrDelete),
        def(NbPower, "__pow__", W::Ternary),
        def(NbPower, "__rpow__", W::TernaryR),
        def(NbInplaceAdd, "__iadd__", W::BinaryL),
        def(NbInplaceSubtract, "__isub__", W::BinaryL),
        def(NbInplaceMultiply, "__imul__", W::BinaryL),
        def(NbInplaceRemainder, "__imod__", W::BinaryL),
        def(NbInplacePower, "__ipow__", W::BinaryL),
        def(NbInplaceLshift, "__ilshift__", W::BinaryL),
        def(NbInplaceRshift, "__irshift__", W::BinaryL),
        def(NbInplaceAnd, "__iand__", W::BinaryL),
        def(NbInplaceXor, "__ixor__", W::BinaryL),
        def(NbInplaceOr, "__ior__", W::BinaryL),
        def(NbInplaceFloorDivide, "__ifloordiv__", W::BinaryL),
        def(NbInplaceTrueDivide, "__itruediv__", W::BinaryL),
        def(NbInplaceMatrixMultiply, "__imatmul__", W::BinaryL),
        def(NbNegative, "__neg__", W::Unary),
        def(NbPositive, "__pos__", W::Unary),
        def(NbAbsolute, "__abs__", W::Unary),
        def(NbInvert, "__invert__", W::Unary),
        def(NbBool, "__bool__", W::Inquiry),
        def(NbIndex, "__index__", W::Unary),
        def(NbInt, "__int__", W::Unary),
        def(NbFloat, "__float__", W::Unary),
        def(MpLength, "__len__", W::Len),
        def(MpSubscript, "__getitem__", W::BinaryL),
        def(MpAssSubscript, "__setitem__", W::SetItem),
        def(MpAssSubscript, "__delitem__", W::DelItem),
        def(SqLength, "__len__", W::Len),
        def(SqItem, "__getitem__", W::SqItem),
        def(SqAssItem, "__setitem__", W::SetItem),
        def(SqAssItem, "__delitem__", W::DelItem),
    ]
};

const ASYNC_DEFS: [SlotDef; 4] = [
    def(SlotKind::SqContains, "__contains__", WrapperTag::Contains),
    def(SlotKind::AmAwait, "__await__", WrapperTag::Unary),
    def(SlotKind::AmAiter, "__aiter__", WrapperTag::Unary),
    def(SlotKind::AmAnext, "__anext__", WrapperTag::Unary),
];

const fn concat_defs() -> [SlotDef; BINARY_DEFS.len() + OTHER_DEFS.len() + ASYNC_DEFS.len()] {
    let mut out = [BINARY_DEFS[0]; BINARY_DEFS.len() + OTHER_DEFS.len() + ASYNC_DEFS.len()];
    let mut i = 0;
    while i < BINARY_DEFS.len() {
        out[i] = BINARY_DEFS[i];
        i += 1;
    }
    let mut j = 0;
    while j < OTHER_DEFS.len() {
        out[i + j] = OTHER_DEFS[j];
        j += 1;
    }
    let mut k = 0;
    while k < ASYNC_DEFS.len() {
        out[i + j + k] = ASYNC_DEFS[k];
        k += 1;
    }
    out
}

/// Every (slot kind, magic name, wrapper tag) triple. `sq_concat`, `sq_repeat`, their
/// in-place forms, `tp_getattr` and `tp_setattr` have no entry: only native code fills them.
pub static SLOT_DEFS: [SlotDef; BINARY_DEFS.len() + OTHER_DEFS.len() + ASYNC_DEFS.len()] =
    concat_defs();

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_are_snake_case() {
        assert_eq!(SlotKind::TpGetattro.name(), "tp_getattro");
        assert_eq!(SlotKind::NbInplaceFloorDivide.name(), "nb_inplace_floor_divide");
        assert_eq!(SlotKind::MpAssSubscript.name(), "mp_ass_subscript");
        assert_eq!(SlotKind::AmAnext.name(), "am_anext");
    }

    #[test]
    fn len_fills_two_slots() {
        let kinds: Vec<_> = SlotKind::for_magic_name("__len__").collect();
        assert_eq!(kinds, vec![SlotKind::MpLength, SlotKind::SqLength]);
        let kinds: Vec<_> = SlotKind::for_magic_name("__getitem__").collect();
        assert_eq!(kinds, vec![SlotKind::MpSubscript, SlotKind::SqItem]);
    }

    #[test]
    fn binary_slots_list_forward_then_reflected() {
        let names: Vec<_> = SlotKind::NbAdd.magic_names().collect();
        assert_eq!(names, vec!["__add__", "__radd__"]);
        let names: Vec<_> = SlotKind::NbPower.magic_names().collect();
        assert_eq!(names, vec!["__pow__", "__rpow__"]);
        assert_eq!(SlotKind::NbPower.python_shape(), PythonSlotShape::Reversible);
    }

    #[test]
    fn richcompare_names_follow_operator_order() {
        let names: Vec<_> = SlotKind::TpRichcompare.magic_names().collect();
        let expected: Vec<_> = PyComparisonOp::ALL.iter().map(|op| op.method_name()).collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn native_only_slots_have_no_names() {
        for kind in [
            SlotKind::SqConcat,
            SlotKind::SqRepeat,
            SlotKind::SqInplaceConcat,
            SlotKind::SqInplaceRepeat,
            SlotKind::TpGetattr,
            SlotKind::TpSetattr,
        ] {
            assert!(!kind.has_magic_names(), "{kind:?}");
        }
        assert!(!SlotKind::is_magic_name("__foo__"));
        assert!(SlotKind::is_magic_name("__rmatmul__"));
    }

    #[test]
    fn every_def_is_unique() {
        for (i, a) in SLOT_DEFS.iter().enumerate() {
            for b in &SLOT_DEFS[i + 1..] {
                assert!(!(a.kind == b.kind && a.name == b.name), "{a:?}");
            }
        }
        assert_eq!(SLOT_DEFS.len(), 82);
    }
}
