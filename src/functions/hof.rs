//! Higher-order functions (spec §6.3): each invokes its callable argument
//! with `(item, index, whole)` for mapping/filtering/single and
//! `(accumulator, item)` for reducing, matching the native-function
//! contract's callback convention.

use std::rc::Rc;

use crate::callable::Callable;
use crate::env::Environment;
use crate::error::{err, Result};
use crate::eval::call_callable;
use crate::value::Value;

use super::{arg, arg_opt, native};

pub(super) fn register(env: &Rc<Environment>) {
    for f in [
        native("$map", 2, Some(2), map_fn),
        native("$filter", 2, Some(2), filter_fn),
        native("$single", 1, Some(2), single_fn),
        native("$reduce", 2, Some(3), reduce_fn),
    ] {
        bind_native(env, f);
    }
}

fn items_of(v: &Value) -> Vec<Value> {
    match v {
        Value::Undefined => vec![],
        other => other.iter_items(),
    }
}

fn require_fn(v: &Value, fname: &str) -> Result<Rc<Callable>> {
    match v {
        Value::Function(f) => Ok(f.clone()),
        _ => Err(err::t0410(0, fname)),
    }
}

/// Calls `f` with as many of `(item, index, whole)` as its arity
/// accepts (a lambda with fewer parameters than supplied arguments
/// simply ignores the trailing ones — `call_callable` already drops
/// extras for lambdas via positional binding).
fn call_with_context(
    f: &Callable,
    item: Value,
    index: usize,
    whole: &Value,
    env: &Rc<Environment>,
) -> Result<Value> {
    call_callable(
        f,
        vec![item, Value::Number(index as f64), whole.clone()],
        env,
        0,
    )
}

fn map_fn(args: &[Value], env: &Rc<Environment>) -> Result<Value> {
    if arg(args, 0).is_undefined() {
        return Ok(Value::Undefined);
    }
    let whole = arg(args, 0).clone();
    let items = items_of(&whole);
    let f = require_fn(arg(args, 1), "$map")?;
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        let result = call_with_context(&f, item, i, &whole, env)?;
        if !result.is_undefined() {
            out.push(result);
        }
    }
    Ok(Value::from_step_results(out, false))
}

fn filter_fn(args: &[Value], env: &Rc<Environment>) -> Result<Value> {
    if arg(args, 0).is_undefined() {
        return Ok(Value::Undefined);
    }
    let whole = arg(args, 0).clone();
    let items = items_of(&whole);
    let f = require_fn(arg(args, 1), "$filter")?;
    let mut out = Vec::new();
    for (i, item) in items.into_iter().enumerate() {
        let keep = call_with_context(&f, item.clone(), i, &whole, env)?;
        if keep.is_truthy() {
            out.push(item);
        }
    }
    Ok(Value::from_step_results(out, false))
}

/// `$single(array, [predicate])` returns the sole matching item, or
/// raises `D3138` if none or more than one match (matching the
/// reference implementation's "exactly one" contract).
fn single_fn(args: &[Value], env: &Rc<Environment>) -> Result<Value> {
    if arg(args, 0).is_undefined() {
        return Ok(Value::Undefined);
    }
    let whole = arg(args, 0).clone();
    let items = items_of(&whole);
    let mut matches = Vec::new();
    match arg_opt(args, 1) {
        Some(Value::Function(f)) => {
            for (i, item) in items.into_iter().enumerate() {
                let keep = call_with_context(f, item.clone(), i, &whole, env)?;
                if keep.is_truthy() {
                    matches.push(item);
                    if matches.len() > 1 {
                        break;
                    }
                }
            }
        }
        _ => matches = items,
    }
    match matches.len() {
        1 => Ok(matches.pop().unwrap()),
        0 => Err(err::d3138(0, "no items matched the predicate")),
        _ => Err(err::d3138(0, "more than one item matched the predicate")),
    }
}

/// `$reduce(array, function($acc, $item [, $index, $whole]), [init])`.
/// The callback must accept at least two parameters (else `D3050`).
fn reduce_fn(args: &[Value], env: &Rc<Environment>) -> Result<Value> {
    if arg(args, 0).is_undefined() {
        return Ok(Value::Undefined);
    }
    let whole = arg(args, 0).clone();
    let items = items_of(&whole);
    let callable = match arg(args, 1) {
        Value::Function(f) => f.clone(),
        _ => return Err(err::t0410(0, "$reduce")),
    };
    if callable.remaining_arity() < 2 {
        return Err(err::d3050(0));
    }
    let mut iter = items.into_iter();
    let mut acc = match arg_opt(args, 2) {
        Some(v) => v.clone(),
        None => iter.next().unwrap_or(Value::Undefined),
    };
    for (i, item) in iter.enumerate() {
        acc = call_callable(
            &callable,
            vec![acc, item, Value::Number(i as f64), whole.clone()],
            env,
            0,
        )?;
    }
    Ok(acc)
}
