//! Base64 boundary helpers, using the teacher's existing `base64`
//! dependency.

use std::rc::Rc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::callable::NativeFunctionRef;
use crate::env::Environment;
use crate::error::{err, Result};
use crate::value::Value;

use super::{arg, native};

pub(super) fn register(env: &Rc<Environment>) {
    for f in [
        native("$base64encode", 1, Some(1), base64_encode),
        native("$base64decode", 1, Some(1), base64_decode),
    ] {
        bind_native(env, f);
    }
}

fn base64_encode(args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    if arg(args, 0).is_undefined() {
        return Ok(Value::Undefined);
    }
    let s = match arg(args, 0) {
        Value::Str(s) => s.as_ref(),
        _ => return Err(err::t0410(0, "$base64encode")),
    };
    Ok(Value::str(STANDARD.encode(s.as_bytes())))
}

fn base64_decode(args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    if arg(args, 0).is_undefined() {
        return Ok(Value::Undefined);
    }
    let s = match arg(args, 0) {
        Value::Str(s) => s.as_ref(),
        _ => return Err(err::t0410(0, "$base64decode")),
    };
    let bytes = STANDARD
        .decode(s)
        .map_err(|_| err::d3030(0, s.to_string()))?;
    let decoded =
        String::from_utf8(bytes).map_err(|_| err::d3030(0, "base64 payload is not valid UTF-8"))?;
    Ok(Value::str(decoded))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> Rc<Environment> {
        Environment::root(Value::Undefined, 256)
    }

    #[test]
    fn encode_then_decode_round_trips() {
        let e = env();
        let encoded = base64_encode(&[Value::str("hello world")], &e).unwrap();
        let decoded = base64_decode(&[encoded], &e).unwrap();
        assert_eq!(decoded.as_str(), Some("hello world"));
    }

    #[test]
    fn decode_of_invalid_base64_is_d3030() {
        let e = env();
        let err = base64_decode(&[Value::str("not valid base64!!")], &e).unwrap_err();
        assert_eq!(err.code, "D3030");
    }
}
