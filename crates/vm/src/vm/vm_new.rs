use crate::{
    PyObjectRef, PyRef,
    builtins::{PyBaseException, PyBaseExceptionRef, PyTypeRef},
    vm::VirtualMachine,
};

macro_rules! define_exception_fn {
    (
        fn $fn_name:ident, $attr:ident, $python_repr:ident
    ) => {
        #[doc = concat!(
                    "Create a new python ",
                    stringify!($python_repr),
                    " object.\nUseful for raising errors from slot functions implemented in rust."
                )]
        pub fn $fn_name(&self, msg: impl Into<String>) -> PyBaseExceptionRef
        {
            let err = self.ctx.exceptions.$attr.clone();
            self.new_exception_msg(err, msg.into())
        }
    };
}

/// Collection of object creation helpers
impl VirtualMachine {
    /// Instantiate an exception with arguments.
    /// This function should only be used with builtin exception types; a user-defined
    /// exception class is not initialized by its `__init__` here.
    pub fn new_exception(&self, exc_type: PyTypeRef, args: Vec<PyObjectRef>) -> PyBaseExceptionRef {
        debug_assert!(exc_type.fast_issubclass(&self.ctx.exceptions.base_exception_type));
        PyRef::new_ref(PyBaseException::new(args), exc_type, Some(Default::default()))
    }

    /// Instantiate an exception with `msg` as the only argument.
    pub fn new_exception_msg(&self, exc_type: PyTypeRef, msg: String) -> PyBaseExceptionRef {
        self.new_exception(exc_type, vec![self.ctx.new_str(msg).into()])
    }

    /// `StopIteration`, carrying the iterator's return value if there is one.
    pub fn new_stop_iteration(&self, value: Option<PyObjectRef>) -> PyBaseExceptionRef {
        let args = value.into_iter().collect();
        self.new_exception(self.ctx.exceptions.stop_iteration.clone(), args)
    }

    pub fn new_no_attribute_error(&self, obj: &PyObjectRef, name: &str) -> PyBaseExceptionRef {
        self.new_attribute_error(format!(
            "'{}' object has no attribute '{name}'",
            obj.class().name()
        ))
    }

    pub fn new_unsupported_unary_error(&self, a: &PyObjectRef, op: &str) -> PyBaseExceptionRef {
        self.new_type_error(format!(
            "bad operand type for {}: '{}'",
            op,
            a.class().name()
        ))
    }

    pub fn new_unsupported_bin_op_error(
        &self,
        a: &PyObjectRef,
        b: &PyObjectRef,
        op: &str,
    ) -> PyBaseExceptionRef {
        self.new_type_error(format!(
            "unsupported operand type(s) for {}: '{}' and '{}'",
            op,
            a.class().name(),
            b.class().name()
        ))
    }

    pub fn new_unsupported_ternary_op_error(
        &self,
        a: &PyObjectRef,
        b: &PyObjectRef,
        c: &PyObjectRef,
        op: &str,
    ) -> PyBaseExceptionRef {
        self.new_type_error(format!(
            "unsupported operand type(s) for {}: '{}', '{}', '{}'",
            op,
            a.class().name(),
            b.class().name(),
            c.class().name()
        ))
    }

    pub fn new_unsupported_comparison_error(
        &self,
        a: &PyObjectRef,
        b: &PyObjectRef,
        op: &str,
    ) -> PyBaseExceptionRef {
        self.new_type_error(format!(
            "'{}' not supported between instances of '{}' and '{}'",
            op,
            a.class().name(),
            b.class().name()
        ))
    }

    define_exception_fn!(fn new_attribute_error, attribute_error, AttributeError);
    define_exception_fn!(fn new_type_error, type_error, TypeError);
    define_exception_fn!(fn new_system_error, system_error, SystemError);
    define_exception_fn!(fn new_value_error, value_error, ValueError);
    define_exception_fn!(fn new_index_error, index_error, IndexError);
    define_exception_fn!(fn new_zero_division_error, zero_division_error, ZeroDivisionError);
    define_exception_fn!(fn new_overflow_error, overflow_error, OverflowError);
    define_exception_fn!(fn new_runtime_error, runtime_error, RuntimeError);
}
