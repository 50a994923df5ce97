//! Lexical environment chain (spec §3.5).
//!
//! Every scope — the root, a lambda's closure, a path step's per-item
//! scope, a block's local scope — is one `Environment`, linked to its
//! parent by `Rc`. Variable and function lookups walk the chain toward
//! the root; bindings are local-first, matching lexical (not dynamic)
//! scoping for `:=` and lambda parameters.

use crate::error::{err, Result};
use crate::value::Value;
use std::cell::{Cell, OnceCell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

pub struct Environment {
    parent: Option<Rc<Environment>>,
    bindings: RefCell<HashMap<String, Value>>,
    /// What `$` resolves to in this scope.
    input: Value,
    /// What `$$` resolves to — the input the whole evaluation started
    /// with, unchanged by path navigation.
    root_input: Value,
    depth: Rc<Cell<usize>>,
    max_depth: usize,
    /// Largest `a..b` range the evaluator will materialize before
    /// raising `D2014` (spec §4.5.6). Caller-tunable via
    /// `Options::max_range` (SPEC_FULL §0.3), defaulting to the spec's
    /// 10,000,000.
    max_range: i64,
    /// Milliseconds-since-epoch captured lazily on first use of `$now`/
    /// `$millis` and shared by every environment descending from the
    /// same root, so repeated calls within one `evaluate()` see the
    /// same instant (spec §9's open question on `$now`/`$millis`
    /// stability).
    clock: Rc<OnceCell<i64>>,
}

impl Environment {
    pub fn root(input: Value, max_depth: usize) -> Rc<Environment> {
        Environment::root_with_max_range(input, max_depth, 10_000_000)
    }

    pub fn root_with_max_range(input: Value, max_depth: usize, max_range: i64) -> Rc<Environment> {
        Rc::new(Environment {
            parent: None,
            bindings: RefCell::new(HashMap::new()),
            input: input.clone(),
            root_input: input,
            depth: Rc::new(Cell::new(0)),
            max_depth,
            max_range,
            clock: Rc::new(OnceCell::new()),
        })
    }

    /// A fresh per-evaluation root: chained to `self` (the compiled
    /// program's persistent root, so `Program::bind`/`register_function`
    /// bindings and the standard library stay visible via chain lookup),
    /// but with its own `input`/`root_input` (this call's `$`/`$$`) and
    /// its own `clock`, so `$now`/`$millis` are stable within this call
    /// without being shared across unrelated calls to the same compiled
    /// `Program` (spec §9). Used once per `Program::evaluate` call.
    pub fn call_root(self: &Rc<Self>, input: Value) -> Rc<Environment> {
        Rc::new(Environment {
            parent: Some(Rc::clone(self)),
            bindings: RefCell::new(HashMap::new()),
            input: input.clone(),
            root_input: input,
            depth: Rc::new(Cell::new(0)),
            max_depth: self.max_depth,
            max_range: self.max_range,
            clock: Rc::new(OnceCell::new()),
        })
    }

    /// A child scope with its own bindings/function table, inheriting
    /// `$` from the parent unchanged (e.g. entering a `Block`).
    pub fn child(self: &Rc<Self>) -> Rc<Environment> {
        let input = self.input.clone();
        self.child_with_input(input)
    }

    /// A child scope whose `$` is rebound to `input` — used when a path
    /// step or lambda call advances the evaluation context.
    pub fn child_with_input(self: &Rc<Self>, input: Value) -> Rc<Environment> {
        Rc::new(Environment {
            parent: Some(Rc::clone(self)),
            bindings: RefCell::new(HashMap::new()),
            input,
            root_input: self.root_input.clone(),
            depth: Rc::clone(&self.depth),
            max_depth: self.max_depth,
            max_range: self.max_range,
            clock: Rc::clone(&self.clock),
        })
    }

    pub fn max_range(&self) -> i64 {
        self.max_range
    }

    /// Milliseconds since the Unix epoch, stable for the lifetime of
    /// this evaluation (see `clock` above).
    pub fn now_millis(&self) -> i64 {
        *self.clock.get_or_init(|| {
            let ts = jiff::Timestamp::now();
            ts.as_second() * 1000 + i64::from(ts.subsec_nanosecond()) / 1_000_000
        })
    }

    pub fn bind_var(&self, name: impl Into<String>, value: Value) {
        self.bindings.borrow_mut().insert(name.into(), value);
    }

    pub fn lookup_var(&self, name: &str) -> Value {
        if name == "$" {
            return self.root_input.clone();
        }
        if let Some(v) = self.bindings.borrow().get(name) {
            return v.clone();
        }
        match &self.parent {
            Some(p) => p.lookup_var(name),
            None => Value::Undefined,
        }
    }

    pub fn input(&self) -> Value {
        self.input.clone()
    }

    pub fn root_input(&self) -> Value {
        self.root_input.clone()
    }

    /// Guards one level of evaluation recursion (lambda call, nested
    /// path/block evaluation). Returns `D2002` once `max_depth` levels
    /// are active simultaneously.
    pub fn enter(&self, pos: usize) -> Result<DepthGuard> {
        let cur = self.depth.get();
        if cur >= self.max_depth {
            return Err(err::d2002(pos));
        }
        self.depth.set(cur + 1);
        Ok(DepthGuard {
            depth: Rc::clone(&self.depth),
        })
    }
}

/// RAII guard returned by `Environment::enter`; decrements the shared
/// depth counter when the evaluation frame it covers returns.
pub struct DepthGuard {
    depth: Rc<Cell<usize>>,
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variable_lookup_walks_to_parent() {
        let root = Environment::root(Value::Null, 256);
        root.bind_var("a", Value::Number(1.0));
        let child = root.child();
        child.bind_var("b", Value::Number(2.0));
        assert!(matches!(child.lookup_var("a"), Value::Number(n) if n == 1.0));
        assert!(matches!(child.lookup_var("b"), Value::Number(n) if n == 2.0));
        assert!(child.lookup_var("a").is_undefined() == false);
    }

    #[test]
    fn unbound_variable_is_undefined() {
        let root = Environment::root(Value::Null, 256);
        assert!(root.lookup_var("nope").is_undefined());
    }

    #[test]
    fn child_input_overrides_but_root_input_persists() {
        let root = Environment::root(Value::Number(1.0), 256);
        let child = root.child_with_input(Value::Number(2.0));
        assert!(matches!(child.input(), Value::Number(n) if n == 2.0));
        assert!(matches!(child.root_input(), Value::Number(n) if n == 1.0));
    }

    #[test]
    fn recursion_guard_trips_d2002() {
        let root = Environment::root(Value::Null, 2);
        let _g1 = root.enter(0).unwrap();
        let _g2 = root.enter(0).unwrap();
        let err = root.enter(0).unwrap_err();
        assert_eq!(err.code, "D2002");
    }

    #[test]
    fn recursion_guard_releases_on_drop() {
        let root = Environment::root(Value::Null, 1);
        {
            let _g = root.enter(0).unwrap();
        }
        assert!(root.enter(0).is_ok());
    }
}
