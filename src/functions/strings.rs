//! String builtins (spec.md's out-of-scope function-library collaborator,
//! SPEC_FULL §1), grounded on the teacher's `filter/builtins/strings.rs`
//! category split and the `regex` crate it already depends on for the
//! library's own `test`/`match`/`sub` builtins.

use std::rc::Rc;

use crate::callable::NativeFunctionRef;
use crate::env::Environment;
use crate::error::{err, Result};
use crate::eval::call_callable;
use crate::value::Value;

use super::{arg, arg_opt, native};

pub(super) fn register(env: &Rc<Environment>) {
    for f in [
        native("$string", 1, Some(2), string_fn),
        native("$length", 1, Some(1), length),
        native("$substring", 2, Some(3), substring),
        native("$substringBefore", 2, Some(2), substring_before),
        native("$substringAfter", 2, Some(2), substring_after),
        native("$uppercase", 1, Some(1), uppercase),
        native("$lowercase", 1, Some(1), lowercase),
        native("$trim", 1, Some(1), trim),
        native("$pad", 2, Some(3), pad),
        native("$contains", 2, Some(2), contains),
        native("$split", 2, Some(3), split),
        native("$join", 1, Some(2), join),
        native("$replace", 3, Some(4), replace),
        native("$match", 2, Some(3), match_fn),
        native("$eval", 1, Some(2), eval_reserved),
    ] {
        bind_native(env, f);
    }
}

fn string_fn(args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    let v = arg(args, 0);
    if v.is_undefined() {
        return Ok(Value::Undefined);
    }
    let pretty = arg_opt(args, 1).map(|p| p.is_truthy()).unwrap_or(false);
    let rendered = match v {
        Value::Str(s) => s.to_string(),
        Value::Number(n) => Value::format_number(*n),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Function(_) => return Err(err::t0410(0, "$string")),
        _ if pretty => crate::json::to_json_string(v, false)?,
        _ => v.to_compact_json(),
    };
    Ok(Value::str(rendered))
}

fn length(args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    match arg(args, 0) {
        Value::Undefined => Ok(Value::Undefined),
        Value::Str(s) => Ok(Value::Number(s.chars().count() as f64)),
        _ => Err(err::t0410(0, "$length")),
    }
}

fn as_str_arg(v: &Value, fname: &str) -> Result<String> {
    match v {
        Value::Str(s) => Ok(s.to_string()),
        Value::Undefined => Ok(String::new()),
        _ => Err(err::t0410(0, fname)),
    }
}

fn substring(args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    if arg(args, 0).is_undefined() {
        return Ok(Value::Undefined);
    }
    let s: Vec<char> = as_str_arg(arg(args, 0), "$substring")?.chars().collect();
    let len = s.len() as i64;
    let start = arg(args, 1).as_number().ok_or_else(|| err::t0410(0, "$substring"))? as i64;
    let start = if start < 0 { (len + start).max(0) } else { start.min(len) };
    let count = match arg_opt(args, 2) {
        Some(v) if !v.is_undefined() => v.as_number().ok_or_else(|| err::t0410(0, "$substring"))? as i64,
        _ => len - start,
    };
    let end = (start + count.max(0)).clamp(start, len);
    Ok(Value::str(s[start as usize..end as usize].iter().collect::<String>()))
}

fn substring_before(args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    if arg(args, 0).is_undefined() {
        return Ok(Value::Undefined);
    }
    let s = as_str_arg(arg(args, 0), "$substringBefore")?;
    let sep = as_str_arg(arg(args, 1), "$substringBefore")?;
    match s.find(&sep) {
        Some(idx) => Ok(Value::str(&s[..idx])),
        None => Ok(Value::str(s)),
    }
}

fn substring_after(args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    if arg(args, 0).is_undefined() {
        return Ok(Value::Undefined);
    }
    let s = as_str_arg(arg(args, 0), "$substringAfter")?;
    let sep = as_str_arg(arg(args, 1), "$substringAfter")?;
    match s.find(&sep) {
        Some(idx) => Ok(Value::str(&s[idx + sep.len()..])),
        None => Ok(Value::str(s)),
    }
}

fn uppercase(args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    if arg(args, 0).is_undefined() {
        return Ok(Value::Undefined);
    }
    Ok(Value::str(as_str_arg(arg(args, 0), "$uppercase")?.to_uppercase()))
}

fn lowercase(args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    if arg(args, 0).is_undefined() {
        return Ok(Value::Undefined);
    }
    Ok(Value::str(as_str_arg(arg(args, 0), "$lowercase")?.to_lowercase()))
}

fn trim(args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    if arg(args, 0).is_undefined() {
        return Ok(Value::Undefined);
    }
    let s = as_str_arg(arg(args, 0), "$trim")?;
    let collapsed = s.split_whitespace().collect::<Vec<_>>().join(" ");
    Ok(Value::str(collapsed))
}

fn pad(args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    let s = as_str_arg(arg(args, 0), "$pad")?;
    let width = arg(args, 1).as_number().ok_or_else(|| err::t0410(0, "$pad"))? as i64;
    let fill = match arg_opt(args, 2) {
        Some(v) if !v.is_undefined() => as_str_arg(v, "$pad")?,
        _ => " ".to_string(),
    };
    if fill.is_empty() {
        return Ok(Value::str(s));
    }
    let current = s.chars().count() as i64;
    let pad_len = (width.abs() - current).max(0) as usize;
    let fill_chars: Vec<char> = fill.chars().collect();
    let padding: String = (0..pad_len).map(|i| fill_chars[i % fill_chars.len()]).collect();
    let out = if width < 0 {
        format!("{padding}{s}")
    } else {
        format!("{s}{padding}")
    };
    Ok(Value::str(out))
}

fn contains(args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    if arg(args, 0).is_undefined() {
        return Ok(Value::Undefined);
    }
    let s = as_str_arg(arg(args, 0), "$contains")?;
    match arg(args, 1) {
        Value::Str(pat) => Ok(Value::Bool(s.contains(pat.as_ref()))),
        Value::Regex(r) => {
            let re = compile_regex(r)?;
            Ok(Value::Bool(re.is_match(&s)))
        }
        _ => Err(err::t0410(0, "$contains")),
    }
}

fn split(args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    if arg(args, 0).is_undefined() {
        return Ok(Value::Undefined);
    }
    let s = as_str_arg(arg(args, 0), "$split")?;
    let limit = match arg_opt(args, 2) {
        Some(v) if !v.is_undefined() => Some(v.as_number().ok_or_else(|| err::t0410(0, "$split"))? as usize),
        _ => None,
    };
    let mut parts: Vec<Value> = match arg(args, 1) {
        Value::Str(sep) if sep.is_empty() => {
            s.chars().map(|c| Value::str(c.to_string())).collect()
        }
        Value::Str(sep) => s.split(sep.as_ref()).map(Value::str).collect(),
        Value::Regex(r) => {
            let re = compile_regex(r)?;
            re.split(&s).map(Value::str).collect()
        }
        _ => return Err(err::t0410(0, "$split")),
    };
    if let Some(limit) = limit {
        parts.truncate(limit);
    }
    Ok(Value::array(parts))
}

fn join(args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    let items = arg(args, 0).as_array().map(|a| a.to_vec()).unwrap_or_default();
    let sep = match arg_opt(args, 1) {
        Some(v) if !v.is_undefined() => as_str_arg(v, "$join")?,
        _ => String::new(),
    };
    let mut out = String::new();
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(&sep);
        }
        out.push_str(&as_str_arg(item, "$join")?);
    }
    Ok(Value::str(out))
}

/// `$replace(str, pattern, replacement [, limit])`. `replacement` may be
/// a literal string (with `$0`/`$1`… backreferences when `pattern` is a
/// regex) or a callable invoked per match with the match object produced
/// by `$match`.
fn replace(args: &[Value], env: &Rc<Environment>) -> Result<Value> {
    if arg(args, 0).is_undefined() {
        return Ok(Value::Undefined);
    }
    let s = as_str_arg(arg(args, 0), "$replace")?;
    let limit = match arg_opt(args, 3) {
        Some(v) if !v.is_undefined() => v.as_number().ok_or_else(|| err::t0410(0, "$replace"))? as usize,
        _ => usize::MAX,
    };

    let mut result = String::new();
    let mut last_end = 0;
    let mut count = 0;

    let matches: Vec<(usize, usize, Vec<Option<String>>)> = match arg(args, 1) {
        Value::Str(pat) => {
            let mut out = Vec::new();
            let mut start = 0;
            while let Some(idx) = s[start..].find(pat.as_ref()) {
                let begin = start + idx;
                let end = begin + pat.len();
                out.push((begin, end, vec![Some(pat.to_string())]));
                start = if pat.is_empty() { end + 1 } else { end };
                if start > s.len() {
                    break;
                }
            }
            out
        }
        Value::Regex(r) => {
            let re = compile_regex(r)?;
            re.captures_iter(&s)
                .map(|caps| {
                    let m = caps.get(0).unwrap();
                    let groups: Vec<Option<String>> = caps
                        .iter()
                        .map(|g| g.map(|m| m.as_str().to_string()))
                        .collect();
                    (m.start(), m.end(), groups)
                })
                .collect()
        }
        _ => return Err(err::t0410(0, "$replace")),
    };

    for (begin, end, groups) in matches {
        if count >= limit {
            break;
        }
        result.push_str(&s[last_end..begin]);
        match arg(args, 2) {
            Value::Function(f) => {
                let match_obj = build_match_object(&s, begin, end, &groups);
                let replaced = call_callable(f, vec![match_obj], env, 0)?;
                result.push_str(&as_str_arg(&replaced, "$replace")?);
            }
            Value::Str(template) => result.push_str(&expand_backrefs(template.as_ref(), &groups)),
            _ => return Err(err::t0410(0, "$replace")),
        }
        last_end = end;
        count += 1;
    }
    result.push_str(&s[last_end..]);
    Ok(Value::str(result))
}

fn expand_backrefs(template: &str, groups: &[Option<String>]) -> String {
    let mut out = String::new();
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '$' {
            if let Some(&d) = chars.peek() {
                if d.is_ascii_digit() {
                    let idx = d.to_digit(10).unwrap() as usize;
                    chars.next();
                    if let Some(Some(g)) = groups.get(idx) {
                        out.push_str(g);
                    }
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

fn match_fn(args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    if arg(args, 0).is_undefined() {
        return Ok(Value::Undefined);
    }
    let s = as_str_arg(arg(args, 0), "$match")?;
    let re = match arg(args, 1) {
        Value::Regex(r) => compile_regex(r)?,
        _ => return Err(err::t0410(0, "$match")),
    };
    let limit = match arg_opt(args, 2) {
        Some(v) if !v.is_undefined() => v.as_number().ok_or_else(|| err::t0410(0, "$match"))? as usize,
        _ => usize::MAX,
    };
    let mut out = Vec::new();
    for caps in re.captures_iter(&s).take(limit) {
        let m = caps.get(0).unwrap();
        let groups: Vec<Option<String>> = caps
            .iter()
            .map(|g| g.map(|m| m.as_str().to_string()))
            .collect();
        out.push(build_match_object(&s, m.start(), m.end(), &groups));
    }
    Ok(Value::from_step_results(out, false))
}

fn build_match_object(s: &str, begin: usize, end: usize, groups: &[Option<String>]) -> Value {
    let char_index = s[..begin].chars().count() as f64;
    let matched = s[begin..end].to_string();
    let group_values: Vec<Value> = groups
        .iter()
        .skip(1)
        .map(|g| g.clone().map(Value::str).unwrap_or(Value::Undefined))
        .collect();
    Value::object(vec![
        ("match".to_string(), Value::str(matched)),
        ("index".to_string(), Value::Number(char_index)),
        ("groups".to_string(), Value::array(group_values)),
    ])
}

fn compile_regex(r: &crate::value::RegexLiteral) -> Result<regex::Regex> {
    let mut builder = regex::RegexBuilder::new(&r.pattern);
    builder.case_insensitive(r.flags.contains('i'));
    builder.multi_line(r.flags.contains('m'));
    builder.dot_matches_new_line(r.flags.contains('s'));
    builder
        .build()
        .map_err(|_| err::s0301(0))
}

/// `$eval` is out of the core's scope per spec.md §1 ("treated as a
/// collaborator") — a full implementation would recursively compile and
/// run a sub-expression, which this crate's function library does not
/// provide; surfaced as an explicit `D3001` rather than silently
/// dropping the call.
fn eval_reserved(_args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
    Err(err::d3001(0, "$eval"))
}
