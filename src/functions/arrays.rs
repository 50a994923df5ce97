//! Array builtins, grounded on the teacher's `filter/builtins/` category
//! split. `$sort`'s comparator form reuses `eval::call_callable` the same
//! way `$replace`'s function-replacement form does in `strings.rs`.

use std::rc::Rc;

use crate::callable::NativeFunctionRef;
use crate::env::Environment;
use crate::error::{err, Result};
use crate::eval::call_callable;
use crate::value::Value;

use super::{arg, arg_opt, native};

pub(super) fn register(env: &Rc<Environment>) {
    for f in [
        native("$count", 1, Some(1), count),
        native("$append", 2, Some(2), append),
        native("$sort", 1, Some(2), sort),
        native("$reverse", 1, Some(1), reverse),
        native("$shuffle", 1, Some(1), shuffle),
        native("$distinct", 1, Some(1), distinct),
        native("$zip", 1, None, zip),
    ] {
        bind_native(env, f);
    }
}

fn items_of(v: &Value) -> Vec<Value> {
    match v {
        Value::Undefined => vec![],
        v => v.iter_items(),
    }
}

fn count(args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    Ok(Value::Number(items_of(arg(args, 0)).len() as f64))
}

fn append(args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    let a = arg(args, 0);
    let b = arg(args, 1);
    if a.is_undefined() {
        return Ok(b.clone());
    }
    if b.is_undefined() {
        return Ok(a.clone());
    }
    let mut out = a.iter_items();
    out.extend(b.iter_items());
    Ok(Value::array(out))
}

/// `$sort(array, [comparator])`. Without a comparator, falls back to the
/// same type rules as the `^(...)` sort operator (spec §4.5.5): numbers
/// compare numerically, strings lexically, mixing either is an error.
/// With one, it's invoked as `(a, b) -> boolean` — true means `a` should
/// sort after `b`, matching the reference implementation's contract.
fn sort(args: &[Value], env: &Rc<Environment>) -> Result<Value> {
    if arg(args, 0).is_undefined() {
        return Ok(Value::Undefined);
    }
    let mut items = items_of(arg(args, 0));
    match arg_opt(args, 1) {
        Some(Value::Function(f)) => {
            let mut err_slot: Option<crate::error::JsonataError> = None;
            items.sort_by(|a, b| {
                if err_slot.is_some() {
                    return std::cmp::Ordering::Equal;
                }
                match call_callable(f, vec![a.clone(), b.clone()], env, 0) {
                    Ok(v) if v.is_truthy() => std::cmp::Ordering::Greater,
                    Ok(_) => std::cmp::Ordering::Less,
                    Err(e) => {
                        err_slot = Some(e);
                        std::cmp::Ordering::Equal
                    }
                }
            });
            if let Some(e) = err_slot {
                return Err(e);
            }
        }
        Some(_) => return Err(err::t0410(0, "$sort")),
        None => {
            let mut err_slot: Option<crate::error::JsonataError> = None;
            items.sort_by(|a, b| match (a, b) {
                (Value::Number(x), Value::Number(y)) => {
                    x.partial_cmp(y).unwrap_or(std::cmp::Ordering::Equal)
                }
                (Value::Str(x), Value::Str(y)) => x.cmp(y),
                _ => {
                    err_slot.get_or_insert(err::t2008(0));
                    std::cmp::Ordering::Equal
                }
            });
            if let Some(e) = err_slot {
                return Err(e);
            }
        }
    }
    Ok(Value::array(items))
}

fn reverse(args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    if arg(args, 0).is_undefined() {
        return Ok(Value::Undefined);
    }
    let mut items = items_of(arg(args, 0));
    items.reverse();
    Ok(Value::array(items))
}

/// Fisher-Yates with a small wall-clock-seeded xorshift stream (the same
/// generator `$random` uses), since the crate has no dependency on a
/// full RNG library and `$shuffle` only needs unpredictable ordering.
fn shuffle(args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    if arg(args, 0).is_undefined() {
        return Ok(Value::Undefined);
    }
    let mut items = items_of(arg(args, 0));
    use std::time::{SystemTime, UNIX_EPOCH};
    let mut x = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0x9E3779B97F4A7C15)
        ^ 0xD1B54A32D192ED03;
    let mut next = || {
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        x
    };
    for i in (1..items.len()).rev() {
        let j = (next() % (i as u64 + 1)) as usize;
        items.swap(i, j);
    }
    Ok(Value::array(items))
}

fn distinct(args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    if arg(args, 0).is_undefined() {
        return Ok(Value::Undefined);
    }
    let items = items_of(arg(args, 0));
    let mut out: Vec<Value> = Vec::with_capacity(items.len());
    for item in items {
        if !out.iter().any(|existing| crate::eval::values_equal(existing, &item)) {
            out.push(item);
        }
    }
    Ok(Value::array(out))
}

fn zip(args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    let lists: Vec<Vec<Value>> = args.iter().map(items_of).collect();
    let min_len = lists.iter().map(|l| l.len()).min().unwrap_or(0);
    let mut out = Vec::with_capacity(min_len);
    for i in 0..min_len {
        out.push(Value::array(lists.iter().map(|l| l[i].clone()).collect()));
    }
    Ok(Value::array(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> Rc<Environment> {
        Environment::root(Value::Undefined, 256)
    }

    fn numbers(v: &Value) -> Vec<f64> {
        v.iter_items().iter().map(|n| n.as_number().unwrap()).collect()
    }

    #[test]
    fn count_counts_array_items() {
        let e = env();
        let arr = Value::array(vec![Value::Number(1.0), Value::Number(2.0)]);
        assert_eq!(count(&[arr], &e).unwrap().as_number(), Some(2.0));
    }

    #[test]
    fn append_concatenates_two_arrays() {
        let e = env();
        let a = Value::array(vec![Value::Number(1.0)]);
        let b = Value::array(vec![Value::Number(2.0), Value::Number(3.0)]);
        let v = append(&[a, b], &e).unwrap();
        assert_eq!(numbers(&v), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn sort_without_comparator_orders_numbers() {
        let e = env();
        let arr = Value::array(vec![Value::Number(3.0), Value::Number(1.0), Value::Number(2.0)]);
        let v = sort(&[arr], &e).unwrap();
        assert_eq!(numbers(&v), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn sort_mixed_types_is_t2008() {
        let e = env();
        let arr = Value::array(vec![Value::Number(1.0), Value::str("a")]);
        let err = sort(&[arr], &e).unwrap_err();
        assert_eq!(err.code, "T2008");
    }

    #[test]
    fn reverse_reverses_order() {
        let e = env();
        let arr = Value::array(vec![Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)]);
        let v = reverse(&[arr], &e).unwrap();
        assert_eq!(numbers(&v), vec![3.0, 2.0, 1.0]);
    }

    #[test]
    fn distinct_drops_duplicates() {
        let e = env();
        let arr = Value::array(vec![Value::Number(1.0), Value::Number(1.0), Value::Number(2.0)]);
        let v = distinct(&[arr], &e).unwrap();
        assert_eq!(numbers(&v), vec![1.0, 2.0]);
    }

    #[test]
    fn zip_truncates_to_shortest() {
        let e = env();
        let a = Value::array(vec![Value::Number(1.0), Value::Number(2.0)]);
        let b = Value::array(vec![Value::Number(10.0)]);
        let v = zip(&[a, b], &e).unwrap();
        let items = v.iter_items();
        assert_eq!(items.len(), 1);
        assert_eq!(numbers(&items[0]), vec![1.0, 10.0]);
    }
}
