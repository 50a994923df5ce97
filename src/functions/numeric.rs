//! Numeric and aggregation builtins, grounded on the teacher's
//! `filter/builtins/` category split; arithmetic itself reuses
//! `Value::number_is_integral`/`format_number` from the value model so
//! rendering stays consistent with the `&` concatenation operator.

use std::rc::Rc;

use crate::callable::NativeFunctionRef;
use crate::env::Environment;
use crate::error::{err, Result};
use crate::value::Value;

use super::{arg, arg_opt, native};

pub(super) fn register(env: &Rc<Environment>) {
    for f in [
        native("$number", 1, Some(1), number_fn),
        native("$abs", 1, Some(1), abs),
        native("$floor", 1, Some(1), floor),
        native("$ceil", 1, Some(1), ceil),
        native("$round", 1, Some(2), round),
        native("$power", 2, Some(2), power),
        native("$sqrt", 1, Some(1), sqrt),
        native("$random", 0, Some(0), random),
        native("$formatNumber", 2, Some(3), format_number),
        native("$formatBase", 1, Some(2), format_base),
        native("$formatInteger", 2, Some(2), format_integer),
        native("$parseInteger", 2, Some(2), parse_integer),
        native("$sum", 1, Some(1), sum),
        native("$max", 1, Some(1), max_fn),
        native("$min", 1, Some(1), min_fn),
        native("$average", 1, Some(1), average),
    ] {
        bind_native(env, f);
    }
}

fn as_number(v: &Value, fname: &str) -> Result<f64> {
    v.as_number().ok_or_else(|| err::t0410(0, fname))
}

fn number_fn(args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    match arg(args, 0) {
        Value::Undefined => Ok(Value::Undefined),
        Value::Number(n) => Ok(Value::Number(*n)),
        Value::Bool(b) => Ok(Value::Number(if *b { 1.0 } else { 0.0 })),
        Value::Str(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Number)
            .map_err(|_| err::d3030(0, s.to_string())),
        _ => Err(err::t0410(0, "$number")),
    }
}

fn abs(args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    if arg(args, 0).is_undefined() {
        return Ok(Value::Undefined);
    }
    Ok(Value::Number(as_number(arg(args, 0), "$abs")?.abs()))
}

fn floor(args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    if arg(args, 0).is_undefined() {
        return Ok(Value::Undefined);
    }
    Ok(Value::Number(as_number(arg(args, 0), "$floor")?.floor()))
}

fn ceil(args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    if arg(args, 0).is_undefined() {
        return Ok(Value::Undefined);
    }
    Ok(Value::Number(as_number(arg(args, 0), "$ceil")?.ceil()))
}

/// Round-half-to-even ("banker's rounding"), matching the reference
/// implementation's documented `$round` behavior — `$round(2.5) = 2`,
/// not 3.
fn round(args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    if arg(args, 0).is_undefined() {
        return Ok(Value::Undefined);
    }
    let n = as_number(arg(args, 0), "$round")?;
    let precision = match arg_opt(args, 1) {
        Some(v) => as_number(v, "$round")? as i32,
        None => 0,
    };
    let scale = 10f64.powi(precision);
    let scaled = n * scale;
    let floor = scaled.floor();
    let diff = scaled - floor;
    let rounded = if (diff - 0.5).abs() < f64::EPSILON {
        if (floor as i64) % 2 == 0 {
            floor
        } else {
            floor + 1.0
        }
    } else {
        scaled.round()
    };
    Ok(Value::Number(rounded / scale))
}

fn power(args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    if arg(args, 0).is_undefined() {
        return Ok(Value::Undefined);
    }
    let base = as_number(arg(args, 0), "$power")?;
    let exp = as_number(arg(args, 1), "$power")?;
    let result = base.powf(exp);
    if !result.is_finite() {
        return Err(err::d3061(0));
    }
    Ok(Value::Number(result))
}

fn sqrt(args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    if arg(args, 0).is_undefined() {
        return Ok(Value::Undefined);
    }
    let n = as_number(arg(args, 0), "$sqrt")?;
    if n < 0.0 {
        return Err(err::d3060(0));
    }
    Ok(Value::Number(n.sqrt()))
}

/// `$random()` is documented as non-deterministic across calls (unlike
/// `$now`/`$millis`, which are pinned per evaluation — spec §9); each
/// call draws a fresh value.
fn random(_args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    use std::time::{SystemTime, UNIX_EPOCH};
    // A tiny xorshift seeded from the wall clock: the core has no
    // dependency on a full PRNG crate and `$random` only needs to be
    // unpredictable to the caller, not cryptographically secure.
    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0x9E3779B97F4A7C15);
    let mut x = seed ^ 0x2545F4914F6CDD1D;
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    Ok(Value::Number((x % 1_000_000_000) as f64 / 1_000_000_000.0))
}

/// A simplified subset of the XPath-style picture-string mini-language
/// the reference implementation ports for `$formatNumber`: digit
/// placeholders (`0`, `#`), one grouping separator, and one decimal
/// separator are honored; currency/percent mantissa tokens are not.
fn format_number(args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    if arg(args, 0).is_undefined() {
        return Ok(Value::Undefined);
    }
    let n = as_number(arg(args, 0), "$formatNumber")?;
    let picture = match arg(args, 1) {
        Value::Str(s) => s.to_string(),
        _ => return Err(err::t0410(0, "$formatNumber")),
    };
    let (grouping_sep, decimal_sep) = picture_separators(arg_opt(args, 2))?;
    Ok(Value::str(render_picture(n, &picture, grouping_sep, decimal_sep)))
}

fn picture_separators(options: Option<&Value>) -> Result<(char, char)> {
    let mut grouping = ',';
    let mut decimal = '.';
    if let Some(Value::Object(pairs)) = options {
        for (k, v) in pairs.iter() {
            let s = v.as_str().unwrap_or("");
            let c = s.chars().next().unwrap_or(' ');
            match k.as_str() {
                "groupingSeparator" => grouping = c,
                "decimalSeparator" => decimal = c,
                _ => {}
            }
        }
    }
    Ok((grouping, decimal))
}

fn render_picture(n: f64, picture: &str, grouping_sep: char, decimal_sep: char) -> String {
    let (int_pattern, frac_pattern) = match picture.split_once('.') {
        Some((i, f)) => (i, f),
        None => (picture, ""),
    };
    let min_frac_digits = frac_pattern.chars().filter(|c| *c == '0').count();
    let grouping_size = int_pattern
        .rsplit(',')
        .next()
        .map(|s| s.chars().filter(|c| *c == '0' || *c == '#').count())
        .filter(|n| *n > 0 && int_pattern.contains(','))
        .unwrap_or(0);
    let min_int_digits = int_pattern.chars().filter(|c| *c == '0').count().max(1);

    let negative = n < 0.0;
    let scaled = (n.abs() * 10f64.powi(min_frac_digits as i32)).round();
    let digits = format!("{scaled:.0}");
    let total_digits = min_int_digits + min_frac_digits;
    let digits = if digits.len() < total_digits.max(1) {
        format!("{}{}", "0".repeat(total_digits.max(1) - digits.len()), digits)
    } else {
        digits
    };
    let split_at = digits.len().saturating_sub(min_frac_digits);
    let (int_part, frac_part) = digits.split_at(split_at);

    let mut int_str = int_part.to_string();
    if grouping_size > 0 {
        let mut grouped = String::new();
        let chars: Vec<char> = int_str.chars().collect();
        for (i, c) in chars.iter().enumerate() {
            if i > 0 && (chars.len() - i) % grouping_size == 0 {
                grouped.push(grouping_sep);
            }
            grouped.push(*c);
        }
        int_str = grouped;
    }

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(&int_str);
    if min_frac_digits > 0 {
        out.push(decimal_sep);
        out.push_str(frac_part);
    }
    out
}

fn format_base(args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    if arg(args, 0).is_undefined() {
        return Ok(Value::Undefined);
    }
    let n = as_number(arg(args, 0), "$formatBase")? as i64;
    let radix = match arg_opt(args, 1) {
        Some(v) => as_number(v, "$formatBase")? as u32,
        None => 10,
    };
    if !(2..=36).contains(&radix) {
        return Err(err::d3100(0));
    }
    Ok(Value::str(to_radix(n, radix)))
}

fn to_radix(n: i64, radix: u32) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let negative = n < 0;
    let mut n = n.unsigned_abs();
    let mut digits = Vec::new();
    while n > 0 {
        let d = (n % radix as u64) as u32;
        digits.push(std::char::from_digit(d, radix).unwrap());
        n /= radix as u64;
    }
    if negative {
        digits.push('-');
    }
    digits.iter().rev().collect()
}

/// Zero-pads an integer to the picture's leading-zero width; does not
/// implement the full XPath ordinal/alphabetic/roman-numeral token set.
fn format_integer(args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    if arg(args, 0).is_undefined() {
        return Ok(Value::Undefined);
    }
    let n = as_number(arg(args, 0), "$formatInteger")? as i64;
    let picture = match arg(args, 1) {
        Value::Str(s) => s.to_string(),
        _ => return Err(err::t0410(0, "$formatInteger")),
    };
    let width = picture.chars().filter(|c| *c == '0').count().max(1);
    let negative = n < 0;
    let digits = format!("{}", n.abs());
    let padded = if digits.len() < width {
        format!("{}{}", "0".repeat(width - digits.len()), digits)
    } else {
        digits
    };
    Ok(Value::str(if negative {
        format!("-{padded}")
    } else {
        padded
    }))
}

fn parse_integer(args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    if arg(args, 0).is_undefined() {
        return Ok(Value::Undefined);
    }
    let s = match arg(args, 0) {
        Value::Str(s) => s.to_string(),
        _ => return Err(err::t0410(0, "$parseInteger")),
    };
    let cleaned: String = s.chars().filter(|c| c.is_ascii_digit() || *c == '-').collect();
    cleaned
        .parse::<i64>()
        .map(|n| Value::Number(n as f64))
        .map_err(|_| err::d3030(0, s))
}

fn numbers_of(v: &Value, fname: &str) -> Result<Vec<f64>> {
    v.as_array()
        .map(|items| {
            items
                .iter()
                .map(|it| as_number(it, fname))
                .collect::<Result<Vec<f64>>>()
        })
        .unwrap_or_else(|| Ok(vec![as_number(v, fname)?]))
}

fn sum(args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    if arg(args, 0).is_undefined() {
        return Ok(Value::Undefined);
    }
    let nums = numbers_of(arg(args, 0), "$sum")?;
    if nums.is_empty() {
        return Ok(Value::Undefined);
    }
    Ok(Value::Number(nums.iter().sum()))
}

fn max_fn(args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    if arg(args, 0).is_undefined() {
        return Ok(Value::Undefined);
    }
    let nums = numbers_of(arg(args, 0), "$max")?;
    Ok(nums
        .into_iter()
        .fold(None, |acc: Option<f64>, n| Some(acc.map_or(n, |a| a.max(n))))
        .map(Value::Number)
        .unwrap_or(Value::Undefined))
}

fn min_fn(args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    if arg(args, 0).is_undefined() {
        return Ok(Value::Undefined);
    }
    let nums = numbers_of(arg(args, 0), "$min")?;
    Ok(nums
        .into_iter()
        .fold(None, |acc: Option<f64>, n| Some(acc.map_or(n, |a| a.min(n))))
        .map(Value::Number)
        .unwrap_or(Value::Undefined))
}

fn average(args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    if arg(args, 0).is_undefined() {
        return Ok(Value::Undefined);
    }
    let nums = numbers_of(arg(args, 0), "$average")?;
    if nums.is_empty() {
        return Ok(Value::Undefined);
    }
    let total: f64 = nums.iter().sum();
    Ok(Value::Number(total / nums.len() as f64))
}
