use super::FuncArgs;
use crate::{PyObjectRef, PyResult, VirtualMachine};
use itertools::Itertools;

/// Declared parameters of a user function: plain positional-or-keyword parameters, trailing
/// defaults and an optional `*args` collector.
#[derive(Debug, Clone)]
pub struct Signature {
    name: String,
    params: Vec<String>,
    defaults: Vec<PyObjectRef>,
    varargs: Option<String>,
}

impl Signature {
    pub fn new(name: impl Into<String>, params: &[&str]) -> Self {
        Self {
            name: name.into(),
            params: params.iter().map(|&p| p.to_owned()).collect(),
            defaults: Vec::new(),
            varargs: None,
        }
    }

    /// Defaults for the last `defaults.len()` parameters.
    pub fn with_defaults(mut self, defaults: Vec<PyObjectRef>) -> Self {
        assert!(defaults.len() <= self.params.len());
        self.defaults = defaults;
        self
    }

    pub fn with_varargs(mut self, name: impl Into<String>) -> Self {
        self.varargs = Some(name.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// No defaults and no `*args`: arguments can be passed through without binding.
    pub fn is_simple(&self) -> bool {
        self.defaults.is_empty() && self.varargs.is_none()
    }

    /// Whether a call with `nargs` positionals and no keywords can skip [`Self::bind`].
    #[inline]
    pub fn matches_exactly(&self, nargs: usize) -> bool {
        self.is_simple() && self.params.len() == nargs
    }

    /// One value per parameter, followed by the `*args` tuple when declared.
    pub fn bind(&self, vm: &VirtualMachine, args: &FuncArgs) -> PyResult<Vec<PyObjectRef>> {
        let nparams = self.params.len();
        let given = args.args.len();
        if given > nparams && self.varargs.is_none() {
            return Err(vm.new_type_error(self.too_many_positional(given)));
        }

        let mut bound: Vec<Option<PyObjectRef>> = vec![None; nparams];
        for (slot, arg) in bound.iter_mut().zip(&args.args) {
            *slot = Some(arg.clone());
        }

        for (key, value) in &args.kwargs {
            let Some(idx) = self.params.iter().position(|p| p == key) else {
                return Err(vm.new_type_error(format!(
                    "{}() got an unexpected keyword argument '{key}'",
                    self.name
                )));
            };
            if bound[idx].is_some() {
                return Err(vm.new_type_error(format!(
                    "{}() got multiple values for argument '{key}'",
                    self.name
                )));
            }
            bound[idx] = Some(value.clone());
        }

        let first_default = nparams - self.defaults.len();
        for (slot, default) in bound[first_default..].iter_mut().zip(&self.defaults) {
            if slot.is_none() {
                *slot = Some(default.clone());
            }
        }

        let missing: Vec<&str> = self
            .params
            .iter()
            .zip(&bound)
            .filter(|(_, v)| v.is_none())
            .map(|(name, _)| name.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(vm.new_type_error(self.missing_positional(&missing)));
        }

        let mut out: Vec<PyObjectRef> = bound.into_iter().flatten().collect();
        if self.varargs.is_some() {
            let extra = args.args.get(nparams..).unwrap_or_default().to_vec();
            out.push(vm.ctx.new_tuple(extra).into());
        }
        Ok(out)
    }

    fn too_many_positional(&self, given: usize) -> String {
        let max = self.params.len();
        let min = max - self.defaults.len();
        let takes = if min == max {
            format!(
                "{max} positional argument{}",
                if max == 1 { "" } else { "s" }
            )
        } else {
            format!("from {min} to {max} positional arguments")
        };
        let were = if given == 1 { "was" } else { "were" };
        format!("{}() takes {takes} but {given} {were} given", self.name)
    }

    fn missing_positional(&self, missing: &[&str]) -> String {
        let quoted: Vec<String> = missing.iter().map(|m| format!("'{m}'")).collect();
        let names = match quoted.as_slice() {
            [one] => one.clone(),
            [a, b] => format!("{a} and {b}"),
            [init @ .., last] => format!("{}, and {last}", init.iter().join(", ")),
            [] => String::new(),
        };
        format!(
            "{}() missing {} required positional argument{}: {names}",
            self.name,
            missing.len(),
            if missing.len() == 1 { "" } else { "s" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Interpreter;

    fn type_error_message(vm: &VirtualMachine, sig: &Signature, args: FuncArgs) -> String {
        let err = sig.bind(vm, &args).unwrap_err();
        assert!(err.fast_isinstance(&vm.ctx.exceptions.type_error));
        err.message()
    }

    #[test]
    fn arity_errors() {
        Interpreter::without_native().enter(|vm| {
            let sig = Signature::new("f", &["a", "b"]);
            let one = vm.ctx.new_int(1).into();
            let args = FuncArgs::from(vec![vm.ctx.none(), vm.ctx.none(), one]);
            assert_eq!(
                type_error_message(vm, &sig, args),
                "f() takes 2 positional arguments but 3 were given"
            );
            let args = FuncArgs::from(vec![vm.ctx.none()]);
            assert_eq!(
                type_error_message(vm, &sig, args),
                "f() missing 1 required positional argument: 'b'"
            );
            let args = FuncArgs::with_kwargs(vec![], [("z", vm.ctx.none())]);
            assert_eq!(
                type_error_message(vm, &sig, args),
                "f() got an unexpected keyword argument 'z'"
            );
            let three = Signature::new("g", &["a", "b", "c"]);
            assert_eq!(
                type_error_message(vm, &three, FuncArgs::default()),
                "g() missing 3 required positional arguments: 'a', 'b', and 'c'"
            );
        })
    }

    #[test]
    fn defaults_keywords_and_varargs() {
        Interpreter::without_native().enter(|vm| {
            let ten: PyObjectRef = vm.ctx.new_int(10).into();
            let sig = Signature::new("f", &["a", "b"])
                .with_defaults(vec![ten.clone()])
                .with_varargs("rest");
            assert!(!sig.is_simple());

            let one: PyObjectRef = vm.ctx.new_int(1).into();
            let bound = sig.bind(vm, &FuncArgs::from(vec![one.clone()])).unwrap();
            assert_eq!(bound.len(), 3);
            assert!(bound[0].is(&one));
            assert!(bound[1].is(&ten));

            let two: PyObjectRef = vm.ctx.new_int(2).into();
            let args = FuncArgs::with_kwargs(vec![], [("b", two.clone()), ("a", one.clone())]);
            let bound = sig.bind(vm, &args).unwrap();
            assert!(bound[0].is(&one));
            assert!(bound[1].is(&two));

            let args = FuncArgs::with_kwargs(vec![one.clone()], [("a", two)]);
            let err = sig.bind(vm, &args).unwrap_err();
            assert_eq!(err.message(), "f() got multiple values for argument 'a'");
        })
    }

    #[test]
    fn simple_signature_matches_exact_arity() {
        let sig = Signature::new("__add__", &["self", "other"]);
        assert!(sig.matches_exactly(2));
        assert!(!sig.matches_exactly(1));
    }
}
