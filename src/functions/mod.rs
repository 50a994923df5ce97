//! The standard function library (spec.md §1's out-of-scope collaborator,
//! SPEC_FULL §1), one file per category, grounded on the teacher's
//! `src/filter/builtins/` directory split. The core only requires the
//! registration/invocation contract in spec §6.3 — everything under this
//! module is the concrete library that satisfies it.

mod arrays;
mod booleans;
mod dates;
mod encoding;
mod hof;
mod numeric;
mod objects;
mod strings;
mod types;

use crate::callable::{Callable, NativeFn, NativeFunctionRef};
use crate::env::Environment;
use crate::value::Value;
use std::rc::Rc;

const UNDEF: Value = Value::Undefined;

/// Binds a native function into `env`'s variable scope under its bare
/// name (`$sum` -> `sum`), the same namespace `Program::bind` and
/// lambda parameters use — JSONata has no separate function namespace;
/// `$sum` is just a variable bound to a function value, looked up by
/// `NodeKind::Variable` like any other `$name` (spec §3.5, §6.3). The
/// native's own `NativeFunctionRef::name` keeps the `$` prefix, since
/// that's what error messages (`T0410`, etc.) should read back.
fn bind_native(env: &Rc<Environment>, f: NativeFunctionRef) {
    let key = f.name.trim_start_matches('$').to_string();
    env.bind_var(key, Value::Function(Rc::new(Callable::Native(f))));
}

/// Register every builtin onto `env` (always the root environment, per
/// spec §3.5 — "the function registry is additive and lives primarily
/// on the root environment").
pub fn register_builtins(env: &Rc<Environment>) {
    strings::register(env);
    numeric::register(env);
    arrays::register(env);
    objects::register(env);
    booleans::register(env);
    types::register(env);
    dates::register(env);
    hof::register(env);
    encoding::register(env);
}

fn native(
    name: &'static str,
    min_arity: usize,
    max_arity: Option<usize>,
    func: NativeFn,
) -> NativeFunctionRef {
    NativeFunctionRef {
        name,
        min_arity,
        max_arity,
        func,
    }
}

/// The argument at position `i`, or `Undefined` if the call omitted it
/// (native functions are invoked with exactly the arguments the caller
/// wrote — arity checking against `min_arity` already happened in
/// `call_callable`, so trailing optional parameters just read as
/// `Undefined` here).
fn arg(args: &[Value], i: usize) -> &Value {
    args.get(i).unwrap_or(&UNDEF)
}

/// As `arg`, but `None` when the argument is absent or explicitly
/// `Undefined` — used for genuinely optional trailing parameters where
/// the function needs to distinguish "not supplied" from "supplied as
/// `()`" without treating both as a meaningful default-triggering value.
fn arg_opt(args: &[Value], i: usize) -> Option<&Value> {
    args.get(i).filter(|v| !v.is_undefined())
}
