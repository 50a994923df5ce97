//! `jsonata` — an embeddable interpreter for JSONata, a declarative
//! query-and-transformation language over JSON-shaped data (spec.md §1).
//!
//! The public surface is deliberately small (spec §6.1): [`compile`]
//! parses and statically resolves an expression once; the returned
//! [`Program`] evaluates it against any number of JSON inputs, can have
//! variables bound and functions registered onto it beforehand, and
//! exposes its AST for debugging.
//!
//! ```
//! use jsonata::compile;
//! use serde_json::json;
//!
//! let program = compile("Account.Order.Product.Price").unwrap();
//! let input = json!({ "Account": { "Order": { "Product": { "Price": 12.5 } } } });
//! assert_eq!(program.evaluate_json(&input).unwrap(), json!(12.5));
//! ```

pub mod ancestry;
pub mod ast;
pub mod callable;
pub mod env;
pub mod error;
pub mod eval;
pub mod functions;
pub mod json;
pub mod lexer;
pub mod parser;
pub mod value;

use std::rc::Rc;

use ast::Node;
use callable::{Callable, NativeFn, NativeFunctionRef};
use env::Environment;
use error::Result;
use value::Value;

/// Tunable limits a host can override at compile time (SPEC_FULL §0.3).
/// Defaults match the spec's own constants.
#[derive(Debug, Clone, Copy)]
pub struct Options {
    /// Maximum simultaneously active evaluation frames before `D2002`.
    /// Guards against stack overflow on untrusted/deeply recursive
    /// expressions (spec §5).
    pub max_depth: usize,
    /// Largest `a..b` range the evaluator will materialize before
    /// `D2014` (spec §4.5.6).
    pub max_range: i64,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            max_depth: 256,
            max_range: 10_000_000,
        }
    }
}

/// A compiled expression, ready to evaluate against any number of
/// inputs (spec §3.6: the AST and the root environment's function
/// registry are immutable/persistent for the program's lifetime; only
/// `bind`/`register_function` mutate the root environment's bindings).
pub struct Program {
    ast: Node,
    root_env: Rc<Environment>,
}

/// Parse `expression`, resolve its ancestry (`%`) references, and
/// register the standard function library onto a fresh root
/// environment. Fails with a coded [`error::JsonataError`] on any lex,
/// parse, or ancestry-resolution error (spec §6.1).
pub fn compile(expression: &str) -> Result<Program> {
    compile_with_options(expression, Options::default())
}

/// As [`compile`], with caller-tunable recursion/range limits.
pub fn compile_with_options(expression: &str, options: Options) -> Result<Program> {
    let parsed = parser::parse(expression)?;
    let resolved = ancestry::resolve(parsed)?;
    let root_env = Environment::root_with_max_range(Value::Undefined, options.max_depth, options.max_range);
    functions::register_builtins(&root_env);
    Ok(Program {
        ast: resolved,
        root_env,
    })
}

impl Program {
    /// Evaluate the compiled expression against `input`, returning a
    /// fully normalized `Value` (spec §4.6: no `Sequence`, no nested
    /// `Undefined`; a wholly-absent result normalizes to `Value::Null`
    /// at the top level, matching "null for no result" in spec §6.1).
    pub fn evaluate(&self, input: Value) -> Result<Value> {
        let eval_env = self.root_env.call_root(input);
        let result = eval::eval(&self.ast, &eval_env)?;
        Ok(result.normalize())
    }

    /// Convenience wrapper taking/returning `serde_json::Value` directly
    /// through [`json`] (SPEC_FULL §1).
    pub fn evaluate_json(&self, input: &serde_json::Value) -> Result<serde_json::Value> {
        let value = json::from_serde(input);
        let result = self.evaluate(value)?;
        Ok(json::to_serde(&result))
    }

    /// Bind a variable (name without the leading `$`) visible to every
    /// future evaluation of this program (spec §6.1).
    pub fn bind(&self, name: impl Into<String>, value: Value) {
        self.root_env.bind_var(name.into(), value);
    }

    /// As `bind`, but taking a `serde_json::Value` directly.
    pub fn bind_json(&self, name: impl Into<String>, value: &serde_json::Value) {
        self.bind(name, json::from_serde(value));
    }

    /// Register (or override) a native function, keyed by its full
    /// name including the leading `$` (spec §6.1, §6.3). Functions and
    /// variables share one lexical namespace (spec §3.5) — `$answer`
    /// becomes a variable bound to a function value, the same way
    /// `functions::register_builtins` wires up the standard library, so
    /// it's found by plain `$answer()` lookup/call.
    pub fn register_function(
        &self,
        name: impl Into<String>,
        min_arity: usize,
        max_arity: Option<usize>,
        func: NativeFn,
    ) {
        let name: String = name.into();
        let leaked: &'static str = Box::leak(name.into_boxed_str());
        let key = leaked.trim_start_matches('$');
        self.root_env.bind_var(
            key,
            Value::Function(Rc::new(Callable::Native(NativeFunctionRef {
                name: leaked,
                min_arity,
                max_arity,
                func,
            }))),
        );
    }

    /// The resolved AST, exposed as an opaque debug handle (spec §6.1).
    pub fn ast(&self) -> &Node {
        &self.ast
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn compiles_and_evaluates_a_path() {
        let program = compile("A.O.P").unwrap();
        let input = json!({"A": {"O": [{"P": "Hat"}, {"P": "Shoes"}]}});
        assert_eq!(program.evaluate_json(&input).unwrap(), json!(["Hat", "Shoes"]));
    }

    #[test]
    fn bind_is_visible_to_evaluate() {
        let program = compile("$tax").unwrap();
        program.bind("tax", Value::Number(1.1));
        assert_eq!(program.evaluate(Value::Null).unwrap(), Value::Number(1.1));
    }

    #[test]
    fn register_function_overrides_builtin_lookup() {
        fn always_42(_args: &[Value], _env: &Rc<Environment>) -> Result<Value> {
            Ok(Value::Number(42.0))
        }
        let program = compile("$answer()").unwrap();
        program.register_function("$answer", 0, Some(0), always_42);
        assert_eq!(program.evaluate(Value::Null).unwrap(), Value::Number(42.0));
    }

    #[test]
    fn no_result_normalizes_to_null() {
        let program = compile("missing.field").unwrap();
        assert_eq!(program.evaluate(Value::Null).unwrap(), Value::Null);
    }

    #[test]
    fn empty_expression_is_s0500() {
        let err = compile("").unwrap_err();
        assert_eq!(err.code, "S0500");
    }

    #[test]
    fn ast_is_exposed() {
        let program = compile("1 + 1").unwrap();
        assert!(matches!(program.ast().kind, ast::NodeKind::Binary(..)));
    }
}
