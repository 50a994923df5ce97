//! Coded diagnostics for every stage of compilation and evaluation.
//!
//! The taxonomy (`S0xxx` lex/parse, `T0xxx`/`T1xxx`/`T2xxx` type errors,
//! `D0xxx`/`D1xxx`/`D2xxx`/`D3xxx` dynamic errors) is adopted verbatim from
//! the JSONata reference implementation for boundary compatibility.

/// One coded diagnostic. Carries enough context for a host to report a
/// useful message without re-deriving it from the AST. `thiserror`
/// derives `Display`/`std::error::Error`, matching the library-grade
/// error convention SPEC_FULL §0.1 adopts from the reference pack; the
/// terser `{code}: {message}` rendering is the one-liner a caller sees
/// from `Display`, while `describe()` below adds position/token context
/// for the CLI's richer diagnostic output.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct JsonataError {
    pub code: &'static str,
    pub message: String,
    pub position: Option<usize>,
    pub token: Option<String>,
    pub value: Option<String>,
}

impl JsonataError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            position: None,
            token: None,
            value: None,
        }
    }

    pub fn at(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Full diagnostic, including position and offending token when
    /// present. Used by the CLI binary; library callers that want the
    /// terse form use `Display`/`to_string()`.
    pub fn describe(&self) -> String {
        let mut s = format!("{}: {}", self.code, self.message);
        if let Some(pos) = self.position {
            s.push_str(&format!(" (at position {pos})"));
        }
        if let Some(tok) = &self.token {
            s.push_str(&format!(" [token: {tok}]"));
        }
        s
    }
}

pub type Result<T> = std::result::Result<T, JsonataError>;

/// Convenience constructors, one per taxonomy code the core emits.
/// Named after the code rather than the English message so call sites
/// read as `err::s0201(pos, tok)` instead of repeating prose everywhere.
pub mod err {
    use super::JsonataError as E;

    pub fn s0101(pos: usize) -> E {
        E::new("S0101", "unterminated string literal").at(pos)
    }
    pub fn s0102(pos: usize) -> E {
        E::new("S0102", "number out of range").at(pos)
    }
    pub fn s0103(pos: usize, ch: char) -> E {
        E::new("S0103", format!("unsupported escape sequence: \\{ch}")).at(pos)
    }
    pub fn s0105(pos: usize) -> E {
        E::new("S0105", "unterminated backtick-quoted name").at(pos)
    }
    pub fn s0201(pos: usize, tok: impl Into<String>) -> E {
        E::new("S0201", "unexpected token").at(pos).with_token(tok)
    }
    pub fn s0202(pos: usize, expected: &str, got: impl Into<String>) -> E {
        E::new("S0202", format!("expected '{expected}' but got this token"))
            .at(pos)
            .with_token(got)
    }
    pub fn s0217(pos: usize) -> E {
        E::new(
            "S0217",
            "the parent operator % cannot be resolved to an ancestor step",
        )
        .at(pos)
    }
    pub fn s0301(pos: usize) -> E {
        E::new("S0301", "invalid regular expression").at(pos)
    }
    pub fn s0302(pos: usize) -> E {
        E::new("S0302", "unterminated regular expression").at(pos)
    }
    pub fn s0401(pos: usize) -> E {
        E::new("S0401", "invalid function parameter list").at(pos)
    }
    pub fn s0402(pos: usize) -> E {
        E::new(
            "S0402",
            "left-hand side of := must be a variable reference",
        )
        .at(pos)
    }
    pub fn s0403(pos: usize) -> E {
        E::new("S0403", "expected a variable name after @").at(pos)
    }
    pub fn s0404(pos: usize) -> E {
        E::new("S0404", "expected a variable name after #").at(pos)
    }
    pub fn s0500() -> E {
        E::new("S0500", "empty expression")
    }
    pub fn t0410(pos: usize, fname: &str) -> E {
        E::new(
            "T0410",
            format!("argument to function '{fname}' has the wrong shape"),
        )
        .at(pos)
    }
    pub fn t1003(pos: usize) -> E {
        E::new("T1003", "object key must evaluate to a string").at(pos)
    }
    pub fn t1005(pos: usize, name: impl Into<String>) -> E {
        E::new("T1005", "attempted to call a non-function value")
            .at(pos)
            .with_token(name)
    }
    pub fn t2001(pos: usize, op: &str) -> E {
        E::new(
            "T2001",
            format!("operands of '{op}' must both be numbers"),
        )
        .at(pos)
    }
    pub fn t2003(pos: usize) -> E {
        E::new("T2003", "the left side of the range operator must be an integer").at(pos)
    }
    pub fn t2004(pos: usize) -> E {
        E::new(
            "T2004",
            "the right side of the range operator must be an integer",
        )
        .at(pos)
    }
    pub fn t2006(pos: usize) -> E {
        E::new("T2006", "the right-hand side of ~> must be callable").at(pos)
    }
    pub fn t2007(pos: usize) -> E {
        E::new("T2007", "sort keys must be numbers compared to numbers").at(pos)
    }
    pub fn t2008(pos: usize) -> E {
        E::new("T2008", "sort keys must be strings or numbers").at(pos)
    }
    pub fn t2009(pos: usize) -> E {
        E::new(
            "T2009",
            "cannot compare a string to a number with this operator",
        )
        .at(pos)
    }
    pub fn t2010(pos: usize) -> E {
        E::new(
            "T2010",
            "comparison operators require both operands to be numbers or both strings",
        )
        .at(pos)
    }
    pub fn d1001(pos: usize) -> E {
        E::new("D1001", "arithmetic produced NaN or infinity").at(pos)
    }
    pub fn d1009(pos: usize, key: impl Into<String>) -> E {
        E::new("D1009", "duplicate key in constructed object")
            .at(pos)
            .with_value(key)
    }
    pub fn d2014(pos: usize) -> E {
        E::new("D2014", "range exceeds the maximum of 10,000,000 elements").at(pos)
    }
    pub fn d3013(pos: usize) -> E {
        E::new("D3013", "the transform operator is not implemented").at(pos)
    }
    pub fn d3001(pos: usize, name: &str) -> E {
        E::new("D3001", format!("function '{name}' is not implemented")).at(pos)
    }
    pub fn d3050(pos: usize) -> E {
        E::new(
            "D3050",
            "the callback for $reduce must accept at least two parameters",
        )
        .at(pos)
    }
    pub fn d2002(pos: usize) -> E {
        E::new("D2002", "maximum recursion depth exceeded").at(pos)
    }

    /// Raised by `$number`/`$parseInteger` when the input string cannot
    /// be parsed, matching the reference implementation's cast-failure
    /// code (not part of spec.md's core taxonomy, since `$number` is an
    /// out-of-scope library function — see SPEC_FULL §1).
    pub fn d3030(pos: usize, value: impl Into<String>) -> E {
        E::new("D3030", "unable to cast value to a number")
            .at(pos)
            .with_value(value)
    }
    /// `$sqrt` of a negative number.
    pub fn d3060(pos: usize) -> E {
        E::new("D3060", "the sqrt function cannot be applied to a negative number").at(pos)
    }
    /// `$power` producing a non-representable (NaN/∞) result.
    pub fn d3061(pos: usize) -> E {
        E::new("D3061", "the power function has resulted in a value that cannot be represented").at(pos)
    }
    /// `$formatBase` radix outside `[2, 36]`.
    pub fn d3100(pos: usize) -> E {
        E::new("D3100", "the radix of the formatBase function must be between 2 and 36").at(pos)
    }
    /// User-raised error from `$error()`/`$assert()`.
    pub fn d3141(pos: usize, message: impl Into<String>) -> E {
        E::new("D3141", message.into()).at(pos)
    }
    /// `$single` matched zero or more than one item.
    pub fn d3138(pos: usize, detail: impl Into<String>) -> E {
        E::new("D3138", format!("the single() function expected exactly one match: {}", detail.into())).at(pos)
    }

    /// Not part of the JSONata reference taxonomy (spec.md's core never
    /// parses JSON itself) — raised by the boundary module (`src/json.rs`)
    /// when the host hands the CLI/facade a string that isn't valid JSON.
    pub fn j0001(message: impl Into<String>) -> E {
        E::new("J0001", message.into())
    }
}
