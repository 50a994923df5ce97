//! Type-predicate builtins, grounded on the teacher's `filter/builtins/`
//! category split.

use std::rc::Rc;

use crate::callable::NativeFunctionRef;
use crate::env::Environment;
use crate::error::Result;
use crate::value::Value;

use super::{arg, native};

pub(super) fn register(env: &Rc<Environment>) {
    for f in [
        native("$isArray", 1, Some(1), is_array),
        native("$isObject", 1, Some(1), is_object),
        native("$isFunction", 1, Some(1), is_function),
        native("$isNumber", 1, Some(1), is_number),
        native("$isString", 1, Some(1), is_string),
        native("$isBoolean", 1, Some(1), is_boolean),
        native("$type", 1, Some(1), type_fn),
    ] {
        bind_native(env, f);
    }
}

fn is_array(args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    Ok(Value::Bool(matches!(
        arg(args, 0),
        Value::Array(_) | Value::Sequence(_)
    )))
}

fn is_object(args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    Ok(Value::Bool(matches!(arg(args, 0), Value::Object(_))))
}

fn is_function(args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    Ok(Value::Bool(matches!(arg(args, 0), Value::Function(_))))
}

fn is_number(args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    Ok(Value::Bool(matches!(arg(args, 0), Value::Number(_))))
}

fn is_string(args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    Ok(Value::Bool(matches!(arg(args, 0), Value::Str(_))))
}

fn is_boolean(args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    Ok(Value::Bool(matches!(arg(args, 0), Value::Bool(_))))
}

/// `$type` surfaces JSONata's own type vocabulary, not Rust's —
/// `Sequence` (the internal projection carrier) reports as `"array"`
/// just like a literal array, and `Undefined` reports as `"undefined"`
/// rather than being indistinguishable from absence.
fn type_fn(args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    let v = arg(args, 0);
    if v.is_undefined() {
        return Ok(Value::Undefined);
    }
    Ok(Value::str(v.type_name()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> Rc<Environment> {
        Environment::root(Value::Undefined, 256)
    }

    #[test]
    fn predicates_match_their_own_variant_only() {
        let e = env();
        let arr = Value::array(vec![]);
        assert!(matches!(is_array(&[arr], &e).unwrap(), Value::Bool(true)));
        assert!(matches!(is_object(&[Value::Number(1.0)], &e).unwrap(), Value::Bool(false)));
        assert!(matches!(is_number(&[Value::Number(1.0)], &e).unwrap(), Value::Bool(true)));
        assert!(matches!(is_string(&[Value::str("a")], &e).unwrap(), Value::Bool(true)));
        assert!(matches!(is_boolean(&[Value::Bool(true)], &e).unwrap(), Value::Bool(true)));
    }

    #[test]
    fn type_fn_reports_jsonata_vocabulary() {
        let e = env();
        let v = type_fn(&[Value::Number(1.0)], &e).unwrap();
        assert_eq!(v.as_str(), Some("number"));
    }

    #[test]
    fn type_fn_on_undefined_stays_undefined() {
        let e = env();
        assert!(type_fn(&[Value::Undefined], &e).unwrap().is_undefined());
    }
}
