//! Boolean builtins (spec §4.4's truthiness rules, exposed as callables).

use std::rc::Rc;

use crate::callable::NativeFunctionRef;
use crate::env::Environment;
use crate::error::Result;
use crate::value::Value;

use super::{arg, native};

pub(super) fn register(env: &Rc<Environment>) {
    for f in [
        native("$boolean", 1, Some(1), boolean),
        native("$not", 1, Some(1), not),
        native("$exists", 1, Some(1), exists),
    ] {
        bind_native(env, f);
    }
}

fn boolean(args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    let v = arg(args, 0);
    if v.is_undefined() {
        return Ok(Value::Undefined);
    }
    Ok(Value::Bool(v.is_truthy()))
}

fn not(args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    let v = arg(args, 0);
    if v.is_undefined() {
        return Ok(Value::Undefined);
    }
    Ok(Value::Bool(!v.is_truthy()))
}

/// `$exists` distinguishes absence from falsy presence — `$exists(false)`
/// is `true`, only an `Undefined` argument yields `false`.
fn exists(args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    Ok(Value::Bool(!arg(args, 0).is_undefined()))
}
