//! Date/time builtins. `$now`/`$millis` read the per-evaluation clock
//! captured on `Environment` (spec §9's open question: both are stable
//! within one top-level `evaluate()` call), grounded on the teacher's
//! dependency on `jiff` for timestamp handling.

use std::rc::Rc;

use crate::callable::NativeFunctionRef;
use crate::env::Environment;
use crate::error::{err, Result};
use crate::value::Value;

use super::{arg, arg_opt, native};

pub(super) fn register(env: &Rc<Environment>) {
    for f in [
        native("$now", 0, Some(1), now),
        native("$millis", 0, Some(0), millis),
        native("$fromMillis", 1, Some(3), from_millis),
        native("$toMillis", 1, Some(2), to_millis),
    ] {
        bind_native(env, f);
    }
}

fn now(_args: &[Value], env: &Rc<Environment>) -> Result<Value> {
    let ts = jiff::Timestamp::from_millisecond(env.now_millis())
        .map_err(|_| err::d3030(0, "$now"))?;
    Ok(Value::str(ts.to_string()))
}

fn millis(_args: &[Value], env: &Rc<Environment>) -> Result<Value> {
    Ok(Value::Number(env.now_millis() as f64))
}

/// `$fromMillis` ignores the optional picture/timezone arguments beyond
/// rendering ISO 8601 — matching the core's ambient-stack scope, which
/// does not include the reference implementation's full XPath date
/// formatting mini-language (see `numeric.rs`'s `$formatNumber` note).
fn from_millis(args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    if arg(args, 0).is_undefined() {
        return Ok(Value::Undefined);
    }
    let ms = arg(args, 0).as_number().ok_or_else(|| err::t0410(0, "$fromMillis"))? as i64;
    let ts = jiff::Timestamp::from_millisecond(ms).map_err(|_| err::d3030(0, "$fromMillis"))?;
    Ok(Value::str(ts.to_string()))
}

fn to_millis(args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    if arg(args, 0).is_undefined() {
        return Ok(Value::Undefined);
    }
    let s = match arg(args, 0) {
        Value::Str(s) => s.to_string(),
        _ => return Err(err::t0410(0, "$toMillis")),
    };
    let _ = arg_opt(args, 1);
    let ts: jiff::Timestamp = s.parse().map_err(|_| err::d3030(0, s))?;
    Ok(Value::Number(
        (ts.as_second() * 1000 + i64::from(ts.subsec_nanosecond()) / 1_000_000) as f64,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> Rc<Environment> {
        Environment::root(Value::Undefined, 256)
    }

    #[test]
    fn millis_is_stable_within_one_evaluation() {
        let e = env();
        let a = millis(&[], &e).unwrap().as_number().unwrap();
        let b = millis(&[], &e).unwrap().as_number().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn from_millis_then_to_millis_round_trips() {
        let e = env();
        let ms = 1_700_000_000_000.0;
        let s = from_millis(&[Value::Number(ms)], &e).unwrap();
        let back = to_millis(&[s], &e).unwrap();
        assert_eq!(back.as_number(), Some(ms));
    }

    #[test]
    fn now_and_millis_agree() {
        let e = env();
        let now_str = now(&[], &e).unwrap();
        let ms = millis(&[], &e).unwrap();
        let parsed = to_millis(&[now_str], &e).unwrap();
        assert_eq!(parsed.as_number(), ms.as_number());
    }
}
