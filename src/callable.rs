//! The three callable shapes a JSONata value can hold (spec §4.7).

use crate::ast::Node;
use crate::env::Environment;
use crate::error::Result;
use crate::value::Value;
use std::fmt;
use std::rc::Rc;

/// Signature every native (built-in) function implements. Arguments are
/// already evaluated; the environment is passed through so functions
/// like `$sift`/`$each` can call back into user-supplied lambdas.
pub type NativeFn = fn(&[Value], &Rc<Environment>) -> Result<Value>;

/// A user-defined lambda together with the environment it closed over
/// at definition time (spec §3.5: lexical, not dynamic, scoping).
#[derive(Clone)]
pub struct LambdaClosure {
    pub params: Vec<String>,
    pub body: Rc<Node>,
    pub closure_env: Rc<Environment>,
    /// Set when the lambda was bound by name (`$f := function(...){...}`)
    /// so that recursive calls and stack traces can refer to it.
    pub name: Option<String>,
}

/// A reference to a built-in, with the arity bounds used to validate a
/// call before it runs (spec §1's per-function signatures).
#[derive(Clone, Copy)]
pub struct NativeFunctionRef {
    pub name: &'static str,
    pub min_arity: usize,
    pub max_arity: Option<usize>,
    pub func: NativeFn,
}

/// The result of `fn(?, 2, ?)` style partial application: each argument
/// position is either pre-bound or still a hole to be filled at the
/// next call site (spec §4.5.7).
#[derive(Clone)]
pub struct PartialApplication {
    pub callee: Rc<Callable>,
    pub bound_args: Vec<Option<Value>>,
}

#[derive(Clone)]
pub enum Callable {
    Lambda(LambdaClosure),
    Native(NativeFunctionRef),
    Partial(PartialApplication),
}

impl Callable {
    /// Name used in diagnostics (`T1005`, stack-style error context).
    pub fn display_name(&self) -> String {
        match self {
            Callable::Lambda(l) => l.name.clone().unwrap_or_else(|| "<lambda>".to_string()),
            Callable::Native(n) => n.name.to_string(),
            Callable::Partial(p) => p.callee.display_name(),
        }
    }

    /// Number of arguments still required to fully apply this callable,
    /// counting through any partial-application wrapping.
    pub fn remaining_arity(&self) -> usize {
        match self {
            Callable::Lambda(l) => l.params.len(),
            Callable::Native(n) => n.min_arity,
            Callable::Partial(p) => p.bound_args.iter().filter(|a| a.is_none()).count(),
        }
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<function {}>", self.display_name())
    }
}
