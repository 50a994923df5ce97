//! Object builtins, grounded on the teacher's `filter/builtins/` category
//! split. `$each`/`$sift` invoke a supplied callable per entry the same
//! way the higher-order functions in `hof.rs` do.

use std::rc::Rc;

use crate::callable::NativeFunctionRef;
use crate::env::Environment;
use crate::error::{err, Result};
use crate::eval::call_callable;
use crate::value::Value;

use super::{arg, native};

pub(super) fn register(env: &Rc<Environment>) {
    for f in [
        native("$keys", 1, Some(1), keys),
        native("$lookup", 2, Some(2), lookup),
        native("$spread", 1, Some(1), spread),
        native("$merge", 1, Some(1), merge),
        native("$each", 2, Some(2), each),
        native("$sift", 2, Some(2), sift),
        native("$assert", 1, Some(2), assert_fn),
        native("$error", 0, Some(1), error_fn),
    ] {
        bind_native(env, f);
    }
}

/// `$keys` over an array of objects unions the keys seen across all of
/// them (first-encountered order), matching the reference
/// implementation's documented behavior for an array argument.
fn keys(args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    let mut out: Vec<Value> = Vec::new();
    let mut seen: Vec<&str> = Vec::new();
    let objects: Vec<&Value> = match arg(args, 0) {
        Value::Object(_) => vec![arg(args, 0)],
        other => other.as_array().map(|a| a.iter().collect()).unwrap_or_default(),
    };
    for obj in objects {
        if let Value::Object(pairs) = obj {
            for (k, _) in pairs.iter() {
                if !seen.contains(&k.as_str()) {
                    seen.push(k.as_str());
                    out.push(Value::str(k.clone()));
                }
            }
        }
    }
    Ok(Value::from_step_results(out, false))
}

fn lookup(args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    let key = match arg(args, 1) {
        Value::Str(s) => s.to_string(),
        _ => return Err(err::t0410(0, "$lookup")),
    };
    let objects: Vec<&Value> = match arg(args, 0) {
        Value::Object(_) => vec![arg(args, 0)],
        other => other.as_array().map(|a| a.iter().collect()).unwrap_or_default(),
    };
    let mut out = Vec::new();
    for obj in objects {
        if let Value::Object(pairs) = obj {
            if let Some((_, v)) = pairs.iter().find(|(k, _)| k == &key) {
                out.push(v.clone());
            }
        }
    }
    Ok(Value::from_step_results(out, false))
}

/// `$spread` turns each `{k: v}` pair of an object (or array of objects)
/// into its own single-pair object, e.g. `$spread({"a":1,"b":2})` ->
/// `[{"a":1},{"b":2}]`.
fn spread(args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    if arg(args, 0).is_undefined() {
        return Ok(Value::Undefined);
    }
    let objects: Vec<Value> = match arg(args, 0) {
        Value::Object(_) => vec![arg(args, 0).clone()],
        other => other.iter_items(),
    };
    let mut out = Vec::new();
    for obj in objects {
        if let Value::Object(pairs) = &obj {
            for (k, v) in pairs.iter() {
                out.push(Value::object(vec![(k.clone(), v.clone())]));
            }
        } else {
            out.push(obj);
        }
    }
    Ok(Value::from_step_results(out, false))
}

/// `$merge([o1, o2, ...])` — later objects' keys overwrite earlier ones,
/// preserving first-seen key order except when overwritten in place
/// (matching the reference implementation's "last value wins, key order
/// from first occurrence" behavior).
fn merge(args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    if arg(args, 0).is_undefined() {
        return Ok(Value::Undefined);
    }
    let objects = items_of(arg(args, 0));
    let mut out: Vec<(String, Value)> = Vec::new();
    for obj in objects {
        if let Value::Object(pairs) = obj {
            for (k, v) in pairs.iter() {
                if let Some(existing) = out.iter_mut().find(|(ek, _)| ek == k) {
                    existing.1 = v.clone();
                } else {
                    out.push((k.clone(), v.clone()));
                }
            }
        }
    }
    Ok(Value::object(out))
}

fn items_of(v: &Value) -> Vec<Value> {
    match v {
        Value::Undefined => vec![],
        other => other.iter_items(),
    }
}

/// `$each(object, function($v, $k) { ... })` maps a callable over every
/// key/value pair, collecting the (possibly-`Undefined`-dropping)
/// results as a sequence.
fn each(args: &[Value], env: &Rc<Environment>) -> Result<Value> {
    let obj = match arg(args, 0) {
        Value::Object(pairs) => pairs.clone(),
        Value::Undefined => return Ok(Value::Undefined),
        _ => return Err(err::t0410(0, "$each")),
    };
    let f = match arg(args, 1) {
        Value::Function(f) => f.clone(),
        _ => return Err(err::t0410(0, "$each")),
    };
    let mut out = Vec::with_capacity(obj.len());
    for (k, v) in obj.iter() {
        let result = call_callable(&f, vec![v.clone(), Value::str(k.clone())], env, 0)?;
        if !result.is_undefined() {
            out.push(result);
        }
    }
    Ok(Value::from_step_results(out, false))
}

/// `$sift(object, function($v, $k) { ... })` keeps only the key/value
/// pairs for which the predicate is truthy.
fn sift(args: &[Value], env: &Rc<Environment>) -> Result<Value> {
    let obj = match arg(args, 0) {
        Value::Object(pairs) => pairs.clone(),
        Value::Undefined => return Ok(Value::Undefined),
        _ => return Err(err::t0410(0, "$sift")),
    };
    let f = match arg(args, 1) {
        Value::Function(f) => f.clone(),
        _ => return Err(err::t0410(0, "$sift")),
    };
    let mut out = Vec::new();
    for (k, v) in obj.iter() {
        let keep = call_callable(&f, vec![v.clone(), Value::str(k.clone())], env, 0)?;
        if keep.is_truthy() {
            out.push((k.clone(), v.clone()));
        }
    }
    Ok(Value::object(out))
}

/// `$assert(condition, message)` raises `D3141` (the reference
/// implementation's assertion-failure code) with `message` when
/// `condition` is falsy; otherwise returns `Undefined`.
fn assert_fn(args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    if arg(args, 0).is_truthy() {
        return Ok(Value::Undefined);
    }
    let message = match args.get(1) {
        Some(Value::Str(s)) => s.to_string(),
        _ => "$assert() statement failed".to_string(),
    };
    Err(err::d3141(0, message))
}

/// `$error([message])` unconditionally raises a user error, `D3141`.
fn error_fn(args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    let message = match args.first() {
        Some(Value::Str(s)) => s.to_string(),
        _ => "$error() function evaluated".to_string(),
    };
    Err(err::d3141(0, message))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> Rc<Environment> {
        Environment::root(Value::Undefined, 256)
    }

    fn obj() -> Value {
        Value::object(vec![
            ("a".to_string(), Value::Number(1.0)),
            ("b".to_string(), Value::Number(2.0)),
        ])
    }

    #[test]
    fn keys_lists_object_keys_in_order() {
        let e = env();
        let v = keys(&[obj()], &e).unwrap();
        let names: Vec<&str> = v.iter_items().iter().map(|k| k.as_str().unwrap()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn lookup_finds_value_by_key() {
        let e = env();
        let v = lookup(&[obj(), Value::str("b")], &e).unwrap();
        assert_eq!(v.as_number(), Some(2.0));
    }

    #[test]
    fn lookup_missing_key_is_undefined() {
        let e = env();
        let v = lookup(&[obj(), Value::str("z")], &e).unwrap();
        assert!(v.is_undefined());
    }

    #[test]
    fn merge_overwrites_in_later_object_order() {
        let e = env();
        let a = Value::object(vec![("a".to_string(), Value::Number(1.0))]);
        let b = Value::object(vec![("a".to_string(), Value::Number(2.0))]);
        let arr = Value::array(vec![a, b]);
        let v = merge(&[arr], &e).unwrap();
        match v {
            Value::Object(pairs) => assert_eq!(pairs[0].1.as_number(), Some(2.0)),
            other => panic!("expected object, got {other:?}"),
        }
    }

    #[test]
    fn assert_passes_when_truthy() {
        let e = env();
        assert!(assert_fn(&[Value::Bool(true)], &e).unwrap().is_undefined());
    }

    #[test]
    fn assert_raises_d3141_when_falsy() {
        let e = env();
        let err = assert_fn(&[Value::Bool(false), Value::str("boom")], &e).unwrap_err();
        assert_eq!(err.code, "D3141");
        assert_eq!(err.message, "boom");
    }
}
