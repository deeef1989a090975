use crate::{PyObjectRef, VirtualMachine, builtins::PyBaseExceptionRef};
use indexmap::IndexMap;

/// Positional and keyword arguments of one call.
#[derive(Debug, Clone, Default)]
pub struct FuncArgs {
    pub args: Vec<PyObjectRef>,
    // sorted map, according to https://www.python.org/dev/peps/pep-0468/
    pub kwargs: IndexMap<String, PyObjectRef>,
}

impl From<Vec<PyObjectRef>> for FuncArgs {
    fn from(args: Vec<PyObjectRef>) -> Self {
        Self {
            args,
            kwargs: IndexMap::new(),
        }
    }
}

impl<const N: usize> From<[PyObjectRef; N]> for FuncArgs {
    fn from(args: [PyObjectRef; N]) -> Self {
        Vec::from(args).into()
    }
}

impl FuncArgs {
    pub fn new(args: Vec<PyObjectRef>, kwargs: IndexMap<String, PyObjectRef>) -> Self {
        Self { args, kwargs }
    }

    pub fn with_kwargs<'a>(
        args: Vec<PyObjectRef>,
        kwargs: impl IntoIterator<Item = (&'a str, PyObjectRef)>,
    ) -> Self {
        Self {
            args,
            kwargs: kwargs
                .into_iter()
                .map(|(k, v)| (k.to_owned(), v))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty() && self.kwargs.is_empty()
    }

    pub fn has_kwargs(&self) -> bool {
        !self.kwargs.is_empty()
    }

    pub fn prepend_arg(&mut self, item: PyObjectRef) {
        self.args.reserve_exact(1);
        self.args.insert(0, item)
    }

    pub fn take_positional(&mut self) -> Option<PyObjectRef> {
        if self.args.is_empty() {
            None
        } else {
            Some(self.args.remove(0))
        }
    }

    pub fn take_keyword(&mut self, name: &str) -> Option<PyObjectRef> {
        self.kwargs.shift_remove(name)
    }

    pub fn check_kwargs_empty(&self, vm: &VirtualMachine) -> Option<PyBaseExceptionRef> {
        self.kwargs
            .keys()
            .next()
            .map(|k| vm.new_type_error(format!("Unexpected keyword argument {k}")))
    }

    /// Positional arguments only, exactly `N` of them.
    pub fn positional<const N: usize>(
        &self,
        name: &str,
        vm: &VirtualMachine,
    ) -> Result<&[PyObjectRef; N], PyBaseExceptionRef> {
        if let Some(err) = self.check_kwargs_empty(vm) {
            return Err(err);
        }
        <&[PyObjectRef; N]>::try_from(self.args.as_slice()).map_err(|_| {
            vm.new_type_error(format!(
                "{name} expected {N} arguments, got {}",
                self.args.len()
            ))
        })
    }
}
