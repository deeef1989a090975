use crate::{
    PyObjectRef, PyPayload, PyRef,
    builtins::{
        PyInt, PyIntRef, PyNone, PyNotImplemented, PyStr, PyStrRef, PyTuple, PyTupleRef,
        PyType, PyTypeRef, descriptor, function, int, object, pystr, singletons, staticmethod,
        tuple, type_,
    },
    common::hash::HashSecret,
    exceptions::{self, ExceptionZoo},
    types::{BUILTIN_CALL_TARGETS, BuiltinSlot, PyTypeFlags},
};
use malachite_bigint::BigInt;
use std::sync::Once;

/// Holder of references to builtin types.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct TypeZoo {
    pub type_type: PyTypeRef,
    pub object_type: PyTypeRef,
    pub int_type: PyTypeRef,
    pub bool_type: PyTypeRef,
    pub str_type: PyTypeRef,
    pub tuple_type: PyTypeRef,
    pub tuple_iterator_type: PyTypeRef,
    pub none_type: PyTypeRef,
    pub not_implemented_type: PyTypeRef,
    pub function_type: PyTypeRef,
    pub bound_method_type: PyTypeRef,
    pub staticmethod_type: PyTypeRef,
    pub slot_wrapper_type: PyTypeRef,
}

impl TypeZoo {
    fn init() -> Self {
        // the order matters for type and object: neither has a class until both exist
        let object_type = PyType::new_static(
            "object",
            None,
            &object::OBJECT_SLOTS,
            PyTypeFlags::BASETYPE,
            None,
        );
        let type_type = PyType::new_static(
            "type",
            Some(&object_type),
            &type_::TYPE_SLOTS,
            PyTypeFlags::BASETYPE,
            None,
        );
        object_type.as_object().init_class(type_type.clone());
        type_type.as_object().init_class(type_type.clone());

        let new = |name: &str, base: &PyTypeRef, declared: &[&'static BuiltinSlot], flags| {
            PyType::new_static(name, Some(base), declared, flags, Some(&type_type))
        };
        let int_type = new("int", &object_type, int::INT_SLOTS, PyTypeFlags::BASETYPE);
        let bool_type = new("bool", &int_type, &int::BOOL_SLOTS, PyTypeFlags::DEFAULT);
        let str_type = new("str", &object_type, &pystr::STR_SLOTS, PyTypeFlags::BASETYPE);
        let tuple_type = new("tuple", &object_type, &tuple::TUPLE_SLOTS, PyTypeFlags::BASETYPE);
        let tuple_iterator_type = new(
            "tuple_iterator",
            &object_type,
            &tuple::TUPLE_ITERATOR_SLOTS,
            PyTypeFlags::DEFAULT,
        );
        let none_type = new(
            "NoneType",
            &object_type,
            &singletons::NONE_SLOTS,
            PyTypeFlags::DEFAULT,
        );
        let not_implemented_type = new(
            "NotImplementedType",
            &object_type,
            &singletons::NOT_IMPLEMENTED_TYPE_SLOTS,
            PyTypeFlags::DEFAULT,
        );
        let function_type = new(
            "function",
            &object_type,
            &function::FUNCTION_SLOTS,
            PyTypeFlags::DEFAULT,
        );
        let bound_method_type = new(
            "method",
            &object_type,
            &function::BOUND_METHOD_SLOTS,
            PyTypeFlags::DEFAULT,
        );
        let staticmethod_type = new(
            "staticmethod",
            &object_type,
            &staticmethod::STATICMETHOD_SLOTS,
            PyTypeFlags::BASETYPE,
        );
        let slot_wrapper_type = new(
            "wrapper_descriptor",
            &object_type,
            &descriptor::SLOT_WRAPPER_SLOTS,
            PyTypeFlags::DEFAULT,
        );

        Self {
            type_type,
            object_type,
            int_type,
            bool_type,
            str_type,
            tuple_type,
            tuple_iterator_type,
            none_type,
            not_implemented_type,
            function_type,
            bound_method_type,
            staticmethod_type,
            slot_wrapper_type,
        }
    }

    /// Every builtin type, bases before subclasses.
    pub fn iter(&self) -> impl Iterator<Item = &PyTypeRef> {
        [
            &self.object_type,
            &self.type_type,
            &self.int_type,
            &self.bool_type,
            &self.str_type,
            &self.tuple_type,
            &self.tuple_iterator_type,
            &self.none_type,
            &self.not_implemented_type,
            &self.function_type,
            &self.bound_method_type,
            &self.staticmethod_type,
            &self.slot_wrapper_type,
        ]
        .into_iter()
    }
}

/// Builtin types, exception types and the singletons shared by one interpreter.
pub struct Context {
    pub types: TypeZoo,
    pub exceptions: ExceptionZoo,
    pub true_value: PyObjectRef,
    pub false_value: PyObjectRef,
    pub hash_secret: HashSecret,
    none: PyObjectRef,
    not_implemented: PyObjectRef,
}

/// Give every builtin slot its call target. Runs before any interpreter reads the count.
fn register_builtin_slots() {
    static REGISTER: Once = Once::new();
    REGISTER.call_once(|| {
        let tables: [&[&'static BuiltinSlot]; 15] = [
            &object::OBJECT_SLOTS,
            &object::NOT_IMPLEMENTED_SLOTS,
            &type_::TYPE_SLOTS,
            int::INT_SLOTS,
            &int::BOOL_SLOTS,
            &pystr::STR_SLOTS,
            &tuple::TUPLE_SLOTS,
            &tuple::TUPLE_ITERATOR_SLOTS,
            &singletons::NONE_SLOTS,
            &singletons::NOT_IMPLEMENTED_TYPE_SLOTS,
            &function::FUNCTION_SLOTS,
            &function::BOUND_METHOD_SLOTS,
            &staticmethod::STATICMETHOD_SLOTS,
            &descriptor::SLOT_WRAPPER_SLOTS,
            &exceptions::BASE_EXCEPTION_SLOTS,
        ];
        for table in tables {
            BUILTIN_CALL_TARGETS.register_all(table);
        }
    });
}

impl Context {
    pub(crate) fn new(hash_seed: u32) -> Self {
        register_builtin_slots();

        let types = TypeZoo::init();
        let exceptions = ExceptionZoo::init(&types.object_type, &types.type_type);
        let none = PyRef::new_ref(PyNone, types.none_type.clone(), None).into();
        let not_implemented =
            PyRef::new_ref(PyNotImplemented, types.not_implemented_type.clone(), None).into();
        let true_value = PyRef::new_ref(PyInt::from(1), types.bool_type.clone(), None).into();
        let false_value = PyRef::new_ref(PyInt::from(0), types.bool_type.clone(), None).into();

        let ctx = Self {
            types,
            exceptions,
            true_value,
            false_value,
            hash_secret: HashSecret::new(hash_seed),
            none,
            not_implemented,
        };
        for typ in ctx.types.iter().chain(ctx.exceptions.iter()) {
            typ.ready_static(&ctx);
        }
        ctx
    }

    #[inline(always)]
    pub fn none(&self) -> PyObjectRef {
        self.none.clone()
    }

    #[inline(always)]
    pub fn not_implemented(&self) -> PyObjectRef {
        self.not_implemented.clone()
    }

    #[inline]
    pub fn new_int<T: Into<BigInt>>(&self, i: T) -> PyIntRef {
        PyInt::from(i).into_ref(self)
    }

    #[inline]
    pub fn new_bool(&self, b: bool) -> PyObjectRef {
        if b {
            self.true_value.clone()
        } else {
            self.false_value.clone()
        }
    }

    #[inline]
    pub fn new_str(&self, s: impl Into<PyStr>) -> PyStrRef {
        s.into().into_ref(self)
    }

    #[inline]
    pub fn new_tuple(&self, elements: Vec<PyObjectRef>) -> PyTupleRef {
        PyTuple::from(elements).into_ref(self)
    }
}
