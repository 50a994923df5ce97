//! Tree-walking evaluator (spec §4.4–§4.6).
//!
//! Path navigation runs as a tuple stream: each step consumes a list of
//! `(value, environment)` tuples and produces the next one. The
//! environment carried alongside each tuple is what lets `%` (bound
//! during ancestry resolution to a label on the owning step) and `@$v`/
//! `#$i` resolve correctly even when several steps are chained.

use crate::ast::{BinOp, Node, NodeKind, SortDir, UnOp};
use crate::callable::{Callable, LambdaClosure, NativeFunctionRef, PartialApplication};
use crate::env::Environment;
use crate::error::{err, Result};
use crate::value::Value;
use std::rc::Rc;

/// One item flowing through a path's tuple stream (spec §4.5.1's
/// `{value, context, environment}` triple). `value` is what the next
/// step navigates from; `context` is what an ancestor-slot binding
/// captures for `%`. The two normally advance together, but a `Focus`
/// step (`@$v`) deliberately freezes `context` at the level it had
/// *before* the focused navigation ran while `value` moves on to the
/// focused item — that divergence is what lets `%` inside a focused
/// path still reach the outer object the focus was taken from.
#[derive(Clone)]
struct Tuple {
    value: Value,
    context: Value,
    env: Rc<Environment>,
}

/// Evaluate `node` against `env`, returning a fully collapsed `Value`
/// (never a bare `Sequence` escaping to a caller outside this module —
/// see `Value::from_step_results`).
pub fn eval(node: &Node, env: &Rc<Environment>) -> Result<Value> {
    let tuples = eval_tuples(node, env)?;
    Ok(collapse(tuples, is_keep_array(node)))
}

/// As `eval`, but exposes the raw tuple stream instead of collapsing it.
/// Used by object-grouping, which must re-evaluate its key/value
/// expressions once per item using *that item's own* environment (so
/// any ancestor (`%`) binding attached to the step that produced it is
/// still visible), not just the final collapsed value.
fn eval_tuples(node: &Node, env: &Rc<Environment>) -> Result<Vec<Tuple>> {
    let _guard = env.enter(node.pos)?;
    eval_steps(&collect_steps(node), vec![seed_tuple(env)])
}

fn seed_tuple(env: &Rc<Environment>) -> Tuple {
    let input = env.input();
    Tuple {
        value: input.clone(),
        context: input,
        env: Rc::clone(env),
    }
}

fn collapse(tuples: Vec<Tuple>, keep_array: bool) -> Value {
    let items: Vec<Value> = tuples.into_iter().map(|t| t.value).collect();
    Value::from_step_results(items, keep_array)
}

fn is_keep_array(node: &Node) -> bool {
    matches!(node.kind, NodeKind::KeepArray(_))
        || matches!(node.kind, NodeKind::Path(_, ref r) if is_keep_array(r))
}

/// Flatten a left-leaning `Path` chain into its ordered steps. A node
/// that is not a `Path` is a one-step "path".
fn collect_steps(node: &Node) -> Vec<&Node> {
    fn go<'a>(node: &'a Node, out: &mut Vec<&'a Node>) {
        match &node.kind {
            NodeKind::Path(left, right) => {
                go(left, out);
                go(right, out);
            }
            _ => out.push(node),
        }
    }
    let mut out = Vec::new();
    go(node, &mut out);
    out
}

fn eval_steps(steps: &[&Node], mut tuples: Vec<Tuple>) -> Result<Vec<Tuple>> {
    for step in steps {
        tuples = eval_step(step, tuples)?;
    }
    Ok(tuples)
}

/// Apply one path step to the incoming tuple stream.
fn eval_step(step: &Node, tuples: Vec<Tuple>) -> Result<Vec<Tuple>> {
    let mut out = match &step.kind {
        NodeKind::Filter(target, predicate) => {
            let base = eval_step(target, tuples)?;
            apply_filter(base, predicate)?
        }
        NodeKind::KeepArray(inner) => eval_step(inner, tuples)?,
        NodeKind::Sort(target, terms) => {
            let base = eval_step(target, tuples)?;
            apply_sort(base, terms)?
        }
        NodeKind::Focus(target, var) => {
            // Evaluate `target` once per incoming tuple (not as one
            // flat batch) so that each resulting item can be paired
            // back up with *its own* originating tuple's context —
            // that's what gets frozen rather than advanced, per spec
            // §4.5.1 ("bind using context, not value").
            let mut out = Vec::new();
            for t in tuples {
                let prior_context = t.context.clone();
                let base = eval_step(target, vec![t])?;
                for item_tuple in base {
                    let child = item_tuple.env.child();
                    child.bind_var(var.clone(), item_tuple.value.clone());
                    out.push(Tuple {
                        value: item_tuple.value,
                        context: prior_context.clone(),
                        env: child,
                    });
                }
            }
            out
        }
        NodeKind::IndexBind(target, var) => {
            let base = eval_step(target, tuples)?;
            let mut out = Vec::with_capacity(base.len());
            for (i, t) in base.into_iter().enumerate() {
                let child = t.env.child();
                child.bind_var(var.clone(), Value::Number(i as f64));
                out.push(Tuple {
                    value: t.value.clone(),
                    context: t.value,
                    env: child,
                });
            }
            out
        }
        _ => {
            let mut out = Vec::new();
            for t in tuples {
                out.extend(eval_structural_step(step, &t)?);
            }
            out
        }
    };

    // A slot may be attached to any kind of step (ancestry resolution
    // doesn't special-case which node shape becomes an ancestor), so
    // the binding happens once here rather than per step kind. Bind
    // using `context`, not `value` — this is what makes a `%` after a
    // `Focus` step still see the pre-focus ancestor (spec §4.5.1 step 1).
    if !step.slots.is_empty() {
        for t in out.iter_mut() {
            let child = t.env.child();
            for label in &step.slots {
                child.bind_var(label.clone(), t.context.clone());
            }
            t.env = child;
        }
    }
    Ok(out)
}

/// Per-item navigation and generic-expression steps: everything that
/// maps one incoming tuple to zero or more outgoing ones independently
/// of its neighbours.
fn eval_structural_step(step: &Node, t: &Tuple) -> Result<Vec<Tuple>> {
    match &step.kind {
        NodeKind::Name(name) => {
            let mut results = Vec::new();
            for item in t.value.iter_items() {
                let field = lookup_field(&item, name);
                for v in project(field) {
                    results.push(Tuple {
                        value: v.clone(),
                        context: v,
                        env: t.env.clone(),
                    });
                }
            }
            Ok(results)
        }
        NodeKind::Context => Ok(vec![Tuple {
            value: t.value.clone(),
            context: t.value.clone(),
            env: t.env.clone(),
        }]),
        NodeKind::Wildcard => {
            let mut out = Vec::new();
            for item in t.value.iter_items() {
                if let Value::Object(pairs) = &item {
                    for (_, v) in pairs.iter() {
                        for projected in project(v.clone()) {
                            out.push(Tuple {
                                value: projected.clone(),
                                context: projected,
                                env: t.env.clone(),
                            });
                        }
                    }
                }
            }
            Ok(out)
        }
        NodeKind::Descendant => {
            let mut out = Vec::new();
            for item in t.value.iter_items() {
                collect_descendants(&item, &mut out);
            }
            Ok(out
                .into_iter()
                .map(|v| Tuple {
                    value: v.clone(),
                    context: v,
                    env: t.env.clone(),
                })
                .collect())
        }
        NodeKind::Parent(Some(label)) => {
            let value = t.env.lookup_var(label);
            Ok(vec![Tuple {
                value: value.clone(),
                context: value,
                env: t.env.clone(),
            }])
        }
        NodeKind::Parent(None) => Err(err::s0217(step.pos)),
        NodeKind::Placeholder => Err(err::s0201(step.pos, "?")),
        _ => {
            // Generic expression step: evaluate once against this
            // tuple's own context (spec §4.5.1: "evaluate it with
            // input = context"), then re-project its result (so
            // `A.(1 + 2)` still yields one item per element of A).
            let child_env = t.env.child_with_input(t.context.clone());
            let value = eval_expr(step, &child_env)?;
            Ok(project(value)
                .into_iter()
                .map(|v| Tuple {
                    value: v.clone(),
                    context: v,
                    env: t.env.clone(),
                })
                .collect())
        }
    }
}

fn lookup_field(value: &Value, name: &str) -> Value {
    match value {
        Value::Object(pairs) => pairs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
            .unwrap_or(Value::Undefined),
        _ => Value::Undefined,
    }
}

/// Flatten one level of array/sequence nesting, the way every path step
/// projects its result (spec §4.5.1). A scalar or object passes through
/// as a single item; `Undefined` disappears entirely.
fn project(value: Value) -> Vec<Value> {
    match value {
        Value::Undefined => vec![],
        Value::Array(items) => items.as_ref().clone(),
        Value::Sequence(seq) => seq.items.clone(),
        other => vec![other],
    }
}

fn collect_descendants(value: &Value, out: &mut Vec<Value>) {
    out.push(value.clone());
    match value {
        Value::Array(items) => {
            for item in items.iter() {
                collect_descendants(item, out);
            }
        }
        Value::Object(pairs) => {
            for (_, v) in pairs.iter() {
                collect_descendants(v, out);
            }
        }
        _ => {}
    }
}

/// `expr[predicate]` dispatches on the predicate's runtime shape (spec
/// §4.5.2): a number selects by (possibly negative) index, anything
/// else is evaluated per item and keeps the item when truthy.
fn apply_filter(base: Vec<Tuple>, predicate: &Node) -> Result<Vec<Tuple>> {
    let len = base.len() as i64;
    let mut numeric_indices: Vec<i64> = Vec::new();
    let mut saw_non_numeric = false;

    // A predicate that is purely a literal/computed number (not
    // referencing `$` per item) behaves as a single array index applied
    // to the whole base list at once.
    if !references_context(predicate) {
        if let Some(root_env) = base.first().map(|t| t.env.clone()) {
            let idx_val = eval(predicate, &root_env)?;
            if let Value::Number(n) = idx_val {
                let idx = normalize_index(n, len);
                return Ok(idx
                    .and_then(|i| base.get(i as usize).cloned())
                    .into_iter()
                    .collect());
            }
        }
    }

    let mut out = Vec::new();
    for t in base.iter() {
        let child_env = t.env.child_with_input(t.value.clone());
        let result = eval(predicate, &child_env)?;
        match &result {
            Value::Number(n) => {
                if let Some(idx) = normalize_index(*n, len) {
                    numeric_indices.push(idx);
                }
            }
            other => {
                saw_non_numeric = true;
                if other.is_truthy() {
                    out.push(t.clone());
                }
            }
        }
    }

    if !numeric_indices.is_empty() && !saw_non_numeric {
        numeric_indices.sort_unstable();
        numeric_indices.dedup();
        return Ok(numeric_indices
            .into_iter()
            .filter_map(|i| base.get(i as usize).cloned())
            .collect());
    }
    Ok(out)
}

fn normalize_index(n: f64, len: i64) -> Option<i64> {
    let i = n.trunc() as i64;
    let resolved = if i < 0 { len + i } else { i };
    if resolved >= 0 && resolved < len {
        Some(resolved)
    } else {
        None
    }
}

/// True if `predicate` can only be evaluated once, independent of which
/// item of the base list is current (no `$`, no field names, nothing
/// that needs a per-item context).
fn references_context(node: &Node) -> bool {
    match &node.kind {
        NodeKind::Context | NodeKind::Name(_) | NodeKind::Wildcard | NodeKind::Descendant => true,
        NodeKind::Number(_)
        | NodeKind::Str(_)
        | NodeKind::Bool(_)
        | NodeKind::Null
        | NodeKind::Variable(_) => false,
        NodeKind::Unary(_, v) => references_context(v),
        NodeKind::Binary(_, l, r) => references_context(l) || references_context(r),
        _ => true,
    }
}

fn apply_sort(base: Vec<Tuple>, terms: &[crate::ast::SortTerm]) -> Result<Vec<Tuple>> {
    let mut keyed: Vec<(Tuple, Vec<Value>)> = Vec::with_capacity(base.len());
    for t in &base {
        let child = t.env.child_with_input(t.value.clone());
        let mut keys = Vec::with_capacity(terms.len());
        for term in terms {
            keys.push(eval(&term.expr, &child)?);
        }
        keyed.push((t.clone(), keys));
    }
    let mut err_slot: Option<crate::error::JsonataError> = None;
    keyed.sort_by(|a, b| {
        for (i, term) in terms.iter().enumerate() {
            let ord = match compare_sort_keys(&a.1[i], &b.1[i], term.expr.pos) {
                Ok(o) => o,
                Err(e) => {
                    err_slot.get_or_insert(e);
                    std::cmp::Ordering::Equal
                }
            };
            let ord = if term.dir == SortDir::Desc {
                ord.reverse()
            } else {
                ord
            };
            if ord != std::cmp::Ordering::Equal {
                return ord;
            }
        }
        std::cmp::Ordering::Equal
    });
    if let Some(e) = err_slot {
        return Err(e);
    }
    Ok(keyed.into_iter().map(|(t, _)| t).collect())
}

fn compare_sort_keys(a: &Value, b: &Value, pos: usize) -> Result<std::cmp::Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            Ok(x.partial_cmp(y).unwrap_or(std::cmp::Ordering::Equal))
        }
        (Value::Str(x), Value::Str(y)) => Ok(x.cmp(y)),
        (Value::Number(_), Value::Str(_)) | (Value::Str(_), Value::Number(_)) => {
            Err(err::t2007(pos))
        }
        _ => Err(err::t2008(pos)),
    }
}

// ---------------------------------------------------------------------
// Non-path expression evaluation
// ---------------------------------------------------------------------

/// Dispatches everything that is not a path-navigation step. Called
/// from `eval_structural_step`'s generic-expression arm and, directly,
/// wherever a node is known not to be part of a path (block contents,
/// operands of binary operators, ...).
fn eval_expr(node: &Node, env: &Rc<Environment>) -> Result<Value> {
    let _guard = env.enter(node.pos)?;
    match &node.kind {
        NodeKind::Number(n) => Ok(Value::Number(*n)),
        NodeKind::Str(s) => Ok(Value::str(s.as_str())),
        NodeKind::Bool(b) => Ok(Value::Bool(*b)),
        NodeKind::Null => Ok(Value::Null),
        NodeKind::RegexLit(pattern, flags) => Ok(Value::Regex(Rc::new(crate::value::RegexLiteral {
            pattern: pattern.clone(),
            flags: flags.clone(),
        }))),
        NodeKind::Variable(name) => Ok(env.lookup_var(name)),
        NodeKind::Placeholder => Err(err::s0201(node.pos, "?")),
        NodeKind::ArrayLit(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                for v in eval(item, env)?.iter_sequence_only() {
                    out.push(v);
                }
            }
            Ok(Value::array(out))
        }
        NodeKind::ObjectLit(pairs) => eval_object_literal(pairs, env),
        NodeKind::Block(exprs) => {
            let child = env.child();
            let mut result = Value::Undefined;
            for e in exprs {
                result = eval(e, &child)?;
            }
            Ok(result)
        }
        NodeKind::Assignment(name, value) => {
            let v = eval(value, env)?;
            env.bind_var(name.clone(), v.clone());
            Ok(v)
        }
        NodeKind::Conditional(cond, then_b, else_b) => {
            if eval(cond, env)?.is_truthy() {
                eval(then_b, env)
            } else if let Some(e) = else_b {
                eval(e, env)
            } else {
                Ok(Value::Undefined)
            }
        }
        NodeKind::Unary(UnOp::Neg, operand) => {
            let v = eval(operand, env)?;
            match v {
                Value::Number(n) => Ok(Value::Number(-n)),
                Value::Undefined => Ok(Value::Undefined),
                _ => Err(err::t2001(node.pos, "-")),
            }
        }
        NodeKind::Range(start, end) => eval_range(start, end, env, node.pos),
        NodeKind::Lambda(params, body) => Ok(Value::Function(Rc::new(Callable::Lambda(
            LambdaClosure {
                params: params.clone(),
                body: Rc::new((**body).clone()),
                closure_env: Rc::clone(env),
                name: None,
            },
        )))),
        NodeKind::FunctionCall(callee, args) => eval_call(callee, args, env, node.pos),
        NodeKind::Binary(BinOp::Chain, left, right) => eval_chain(left, right, env, node.pos),
        NodeKind::Binary(BinOp::ObjectGroup, left, right) => eval_object_group(left, right, env),
        NodeKind::Binary(op, l, r) => eval_binary(*op, l, r, env, node.pos),
        NodeKind::Transform(_, _, _) => Err(err::d3013(node.pos)),
        // Path-only node kinds reaching here means they were evaluated
        // standalone (no enclosing `Path`); `eval` already special-cases
        // them by routing through the one-step path machinery, so they
        // never reach this function directly.
        NodeKind::Name(_)
        | NodeKind::Context
        | NodeKind::Wildcard
        | NodeKind::Descendant
        | NodeKind::Parent(_)
        | NodeKind::Path(_, _)
        | NodeKind::Filter(_, _)
        | NodeKind::KeepArray(_)
        | NodeKind::Sort(_, _)
        | NodeKind::Focus(_, _)
        | NodeKind::IndexBind(_, _) => unreachable!("path-only node reached eval_expr"),
    }
}

fn eval_object_literal(pairs: &[(Node, Node)], env: &Rc<Environment>) -> Result<Value> {
    let mut out: Vec<(String, Value)> = Vec::with_capacity(pairs.len());
    for (k, v) in pairs {
        let key = eval(k, env)?;
        let key = key
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| err::t1003(k.pos))?;
        let value = eval(v, env)?;
        if value.is_undefined() {
            continue;
        }
        if out.iter().any(|(existing, _)| existing == &key) {
            return Err(err::d1009(k.pos, key));
        }
        out.push((key, value));
    }
    Ok(Value::object(out))
}

/// `expr{key: value}` groups the items produced by `expr`: each distinct
/// key's values are collected into an array (a singleton value if there
/// is only one), the key/value expressions evaluated once per item with
/// `$` bound to that item (spec §4.5.4).
fn eval_object_group(left: &Node, right: &Node, env: &Rc<Environment>) -> Result<Value> {
    let pairs = match &right.kind {
        NodeKind::ObjectLit(pairs) => pairs,
        _ => unreachable!("object-group RHS is always an ObjectLit"),
    };
    let tuples = eval_tuples(left, env)?;
    let mut groups: Vec<(String, Vec<Value>)> = Vec::new();
    for t in tuples {
        let child = t.env.child_with_input(t.value.clone());
        for (k, v) in pairs {
            let key = eval(k, &child)?;
            let key = key
                .as_str()
                .map(|s| s.to_string())
                .ok_or_else(|| err::t1003(k.pos))?;
            let value = eval(v, &child)?;
            if value.is_undefined() {
                continue;
            }
            if let Some(existing) = groups.iter_mut().find(|(gk, _)| gk == &key) {
                existing.1.push(value);
            } else {
                groups.push((key, vec![value]));
            }
        }
    }
    let out = groups
        .into_iter()
        .map(|(k, mut vs)| {
            let v = if vs.len() == 1 {
                vs.pop().unwrap()
            } else {
                Value::array(vs)
            };
            (k, v)
        })
        .collect();
    Ok(Value::object(out))
}

fn eval_range(start: &Node, end: &Node, env: &Rc<Environment>, pos: usize) -> Result<Value> {
    let a = eval(start, env)?;
    let b = eval(end, env)?;
    if a.is_undefined() || b.is_undefined() {
        return Ok(Value::Undefined);
    }
    let lo = a.as_number().ok_or_else(|| err::t2003(pos))?;
    let hi = b.as_number().ok_or_else(|| err::t2004(pos))?;
    if !Value::number_is_integral(lo) {
        return Err(err::t2003(pos));
    }
    if !Value::number_is_integral(hi) {
        return Err(err::t2004(pos));
    }
    let lo = lo as i64;
    let hi = hi as i64;
    if hi < lo {
        return Ok(Value::array(vec![]));
    }
    let count = (hi - lo + 1) as i64;
    if count > env.max_range() {
        return Err(err::d2014(pos));
    }
    Ok(Value::array(
        (lo..=hi).map(|n| Value::Number(n as f64)).collect(),
    ))
}

fn eval_binary(op: BinOp, l: &Node, r: &Node, env: &Rc<Environment>, pos: usize) -> Result<Value> {
    match op {
        BinOp::And => {
            let lv = eval(l, env)?;
            if !lv.is_truthy() {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(eval(r, env)?.is_truthy()))
        }
        BinOp::Or => {
            let lv = eval(l, env)?;
            if lv.is_truthy() {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(eval(r, env)?.is_truthy()))
        }
        BinOp::Coalesce => {
            let lv = eval(l, env)?;
            if lv.is_undefined() || lv.is_null() {
                eval(r, env)
            } else {
                Ok(lv)
            }
        }
        BinOp::Elvis => {
            let lv = eval(l, env)?;
            if lv.is_undefined() {
                eval(r, env)
            } else {
                Ok(lv)
            }
        }
        BinOp::Concat => {
            let lv = eval(l, env)?;
            let rv = eval(r, env)?;
            Ok(Value::str(format!(
                "{}{}",
                lv.concat_string(),
                rv.concat_string()
            )))
        }
        BinOp::In => {
            let lv = eval(l, env)?;
            let rv = eval(r, env)?;
            Ok(Value::Bool(value_in(&lv, &rv)))
        }
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => {
            let lv = eval(l, env)?;
            let rv = eval(r, env)?;
            if lv.is_undefined() || rv.is_undefined() {
                return Ok(Value::Undefined);
            }
            let (ln, rn) = (
                lv.as_number().ok_or_else(|| err::t2001(pos, op_symbol(op)))?,
                rv.as_number().ok_or_else(|| err::t2001(pos, op_symbol(op)))?,
            );
            let result = match op {
                BinOp::Add => ln + rn,
                BinOp::Sub => ln - rn,
                BinOp::Mul => ln * rn,
                BinOp::Div => ln / rn,
                BinOp::Mod => ln % rn,
                _ => unreachable!(),
            };
            if !result.is_finite() {
                return Err(err::d1001(pos));
            }
            Ok(Value::Number(result))
        }
        BinOp::Eq | BinOp::Ne => {
            let lv = eval(l, env)?;
            let rv = eval(r, env)?;
            let eq = values_equal(&lv, &rv);
            Ok(Value::Bool(if op == BinOp::Eq { eq } else { !eq }))
        }
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            let lv = eval(l, env)?;
            let rv = eval(r, env)?;
            if lv.is_undefined() || rv.is_undefined() {
                return Ok(Value::Undefined);
            }
            let ordering = match (&lv, &rv) {
                (Value::Number(x), Value::Number(y)) => {
                    x.partial_cmp(y).ok_or_else(|| err::t2010(pos))?
                }
                (Value::Str(x), Value::Str(y)) => x.cmp(y),
                (Value::Number(_), Value::Str(_)) | (Value::Str(_), Value::Number(_)) => {
                    return Err(err::t2009(pos));
                }
                _ => return Err(err::t2010(pos)),
            };
            use std::cmp::Ordering::*;
            let result = match (op, ordering) {
                (BinOp::Lt, Less) | (BinOp::Le, Less) | (BinOp::Le, Equal) => true,
                (BinOp::Gt, Greater) | (BinOp::Ge, Greater) | (BinOp::Ge, Equal) => true,
                _ => false,
            };
            Ok(Value::Bool(result))
        }
        BinOp::Chain | BinOp::ObjectGroup => unreachable!("handled before eval_binary"),
    }
}

fn op_symbol(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Mod => "%",
        _ => "?",
    }
}

fn value_in(needle: &Value, haystack: &Value) -> bool {
    match haystack {
        Value::Array(items) => items.iter().any(|v| values_equal(needle, v)),
        Value::Sequence(seq) => seq.items.iter().any(|v| values_equal(needle, v)),
        other => values_equal(needle, other),
    }
}

pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Undefined, Value::Undefined) => true,
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(a, b)| values_equal(a, b))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter().all(|(k, v)| {
                    y.iter()
                        .find(|(k2, _)| k2 == k)
                        .is_some_and(|(_, v2)| values_equal(v, v2))
                })
        }
        _ => false,
    }
}

fn eval_chain(left: &Node, right: &Node, env: &Rc<Environment>, pos: usize) -> Result<Value> {
    let lv = eval(left, env)?;
    let (callee_node, call_args): (&Node, &[Node]) = match &right.kind {
        NodeKind::FunctionCall(c, a) => (c, a.as_slice()),
        _ => (right, &[]),
    };
    let callee_value = eval(callee_node, env)?;
    let callable = match &callee_value {
        Value::Function(f) => (**f).clone(),
        _ => return Err(err::t2006(pos)),
    };

    let mut has_placeholder = false;
    let mut args = Vec::with_capacity(call_args.len());
    for a in call_args {
        if matches!(a.kind, NodeKind::Placeholder) {
            has_placeholder = true;
            args.push(lv.clone());
        } else {
            args.push(eval(a, env)?);
        }
    }
    if !has_placeholder {
        args.insert(0, lv);
    }
    call_callable(&callable, args, env, pos)
}

fn eval_call(callee: &Node, args: &[Node], env: &Rc<Environment>, pos: usize) -> Result<Value> {
    let callable = require_callable(eval(callee, env)?, pos)?;
    let mut has_placeholder = false;
    let mut bound: Vec<Option<Value>> = Vec::with_capacity(args.len());
    for a in args {
        if matches!(a.kind, NodeKind::Placeholder) {
            has_placeholder = true;
            bound.push(None);
        } else {
            bound.push(Some(eval(a, env)?));
        }
    }
    if has_placeholder {
        return Ok(Value::Function(Rc::new(Callable::Partial(
            PartialApplication {
                callee: Rc::new(callable),
                bound_args: bound,
            },
        ))));
    }
    let values: Vec<Value> = bound.into_iter().map(|v| v.unwrap()).collect();
    call_callable(&callable, values, env, pos)
}

fn require_callable(v: Value, pos: usize) -> Result<Callable> {
    match v {
        Value::Function(f) => Ok((*f).clone()),
        _ => Err(err::t1005(pos, v.type_name())),
    }
}

pub(crate) fn call_callable(
    callable: &Callable,
    args: Vec<Value>,
    env: &Rc<Environment>,
    pos: usize,
) -> Result<Value> {
    let _guard = env.enter(pos)?;
    match callable {
        Callable::Native(NativeFunctionRef {
            func,
            min_arity,
            name,
            ..
        }) => {
            if args.len() < *min_arity {
                return Err(err::t0410(pos, name));
            }
            func(&args, env)
        }
        Callable::Lambda(LambdaClosure {
            params,
            body,
            closure_env,
            ..
        }) => {
            let call_env = closure_env.child();
            for (i, param) in params.iter().enumerate() {
                call_env.bind_var(param.clone(), args.get(i).cloned().unwrap_or(Value::Undefined));
            }
            eval(body, &call_env)
        }
        Callable::Partial(PartialApplication {
            callee,
            bound_args,
        }) => {
            let mut merged = Vec::with_capacity(bound_args.len());
            let mut incoming = args.into_iter();
            for slot in bound_args {
                match slot {
                    Some(v) => merged.push(v.clone()),
                    None => merged.push(incoming.next().unwrap_or(Value::Undefined)),
                }
            }
            merged.extend(incoming);
            call_callable(callee, merged, env, pos)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ancestry;
    use crate::json;
    use crate::parser::parse;

    fn run(src: &str, input: Value) -> Result<Value> {
        let ast = ancestry::resolve(parse(src)?)?;
        let env = Environment::root(input, 256);
        Ok(eval(&ast, &env)?.normalize())
    }

    #[test]
    fn simple_field_access() {
        let input = json::from_json_str(r#"{"a": 1, "b": 2}"#).unwrap();
        let v = run("a", input).unwrap();
        assert!(matches!(v, Value::Number(n) if n == 1.0));
    }

    #[test]
    fn dotted_path_projects_arrays() {
        let input = json::from_json_str(r#"{"a": [{"b": 1}, {"b": 2}]}"#).unwrap();
        let v = run("a.b", input).unwrap();
        match v {
            Value::Array(items) => assert_eq!(items.len(), 2),
            other => panic!("expected array, got {other:?}"),
        }
    }

    #[test]
    fn numeric_filter_indexes() {
        let input = json::from_json_str(r#"{"a": [10, 20, 30]}"#).unwrap();
        let v = run("a[1]", input).unwrap();
        assert!(matches!(v, Value::Number(n) if n == 20.0));
    }

    #[test]
    fn negative_index_counts_from_end() {
        let input = json::from_json_str(r#"{"a": [10, 20, 30]}"#).unwrap();
        let v = run("a[-1]", input).unwrap();
        assert!(matches!(v, Value::Number(n) if n == 30.0));
    }

    #[test]
    fn boolean_predicate_keeps_matching_items() {
        let input = json::from_json_str(r#"{"a": [1, 2, 3, 4]}"#).unwrap();
        let v = run("a[$ > 2]", input).unwrap();
        match v {
            Value::Array(items) => assert_eq!(items.len(), 2),
            other => panic!("expected array, got {other:?}"),
        }
    }

    #[test]
    fn arithmetic() {
        let v = run("1 + 2 * 3", Value::Null).unwrap();
        assert!(matches!(v, Value::Number(n) if n == 7.0));
    }

    #[test]
    fn string_concat() {
        let v = run(r#""a" & "b""#, Value::Null).unwrap();
        assert_eq!(v.as_str(), Some("ab"));
    }

    #[test]
    fn conditional() {
        let v = run("1 > 0 ? \"yes\" : \"no\"", Value::Null).unwrap();
        assert_eq!(v.as_str(), Some("yes"));
    }

    #[test]
    fn range_builds_array() {
        let v = run("1..3", Value::Null).unwrap();
        match v {
            Value::Array(items) => assert_eq!(items.len(), 3),
            other => panic!("expected array, got {other:?}"),
        }
    }

    #[test]
    fn range_limit_exceeded_is_d2014() {
        let err = run("1..20000000", Value::Null).unwrap_err();
        assert_eq!(err.code, "D2014");
    }

    #[test]
    fn comparison_number_vs_string_is_t2009() {
        let err = run(r#"1 < "a""#, Value::Null).unwrap_err();
        assert_eq!(err.code, "T2009");
    }

    #[test]
    fn comparison_other_type_mismatch_is_t2010() {
        let err = run("1 < true", Value::Null).unwrap_err();
        assert_eq!(err.code, "T2010");
    }

    #[test]
    fn sort_key_number_vs_string_is_t2007() {
        let input = json::from_json_str(r#"{"a": [1, "a"]}"#).unwrap();
        let err = run("a^($)", input).unwrap_err();
        assert_eq!(err.code, "T2007");
    }

    #[test]
    fn sort_key_other_type_mismatch_is_t2008() {
        let input = json::from_json_str(r#"{"a": [1, true]}"#).unwrap();
        let err = run("a^($)", input).unwrap_err();
        assert_eq!(err.code, "T2008");
    }

    #[test]
    fn chain_non_callable_rhs_is_t2006() {
        let err = run("5 ~> 3", Value::Null).unwrap_err();
        assert_eq!(err.code, "T2006");
    }

    #[test]
    fn block_assignment_scopes_locally() {
        let v = run("($x := 5; $x + 1)", Value::Null).unwrap();
        assert!(matches!(v, Value::Number(n) if n == 6.0));
    }

    #[test]
    fn lambda_application() {
        let v = run("(($double := function($x){$x*2}); $double(21))", Value::Null).unwrap();
        assert!(matches!(v, Value::Number(n) if n == 42.0));
    }

    #[test]
    fn partial_application_fills_placeholder_later() {
        let v = run(
            "(($add := function($a, $b){$a + $b}); ($addFive := $add(5, ?)); $addFive(10))",
            Value::Null,
        )
        .unwrap();
        assert!(matches!(v, Value::Number(n) if n == 15.0));
    }

    #[test]
    fn object_construction() {
        let v = run(r#"{"x": 1, "y": 2}"#, Value::Null).unwrap();
        match v {
            Value::Object(pairs) => assert_eq!(pairs.len(), 2),
            other => panic!("expected object, got {other:?}"),
        }
    }

    #[test]
    fn object_grouping_collects_values_per_key() {
        let input = json::from_json_str(
            r#"{"items": [{"k": "a", "v": 1}, {"k": "a", "v": 2}, {"k": "b", "v": 3}]}"#,
        )
        .unwrap();
        let v = run("items{k: v}", input).unwrap();
        match v {
            Value::Object(pairs) => {
                let a = pairs.iter().find(|(k, _)| k == "a").unwrap();
                match &a.1 {
                    Value::Array(items) => assert_eq!(items.len(), 2),
                    other => panic!("expected array for grouped key, got {other:?}"),
                }
            }
            other => panic!("expected object, got {other:?}"),
        }
    }

    #[test]
    fn parent_reference_resolves_via_ancestry_slot() {
        let input = json::from_json_str(
            r#"{"data": {"Total": 100, "items": [{"price": 10}, {"price": 20}]}}"#,
        )
        .unwrap();
        let v = run(r#"data.items[price > 5]{"t": %.Total}"#, input).unwrap();
        match v {
            Value::Object(pairs) => {
                let t = &pairs.iter().find(|(k, _)| k == "t").unwrap().1;
                match t {
                    Value::Array(items) => {
                        assert!(items.iter().all(|v| matches!(v, Value::Number(n) if *n == 100.0)));
                    }
                    Value::Number(n) => assert_eq!(*n, 100.0),
                    other => panic!("unexpected {other:?}"),
                }
            }
            other => panic!("expected object, got {other:?}"),
        }
    }

    #[test]
    fn transform_operator_is_not_implemented() {
        let err = run("|Account|{\"x\": 1}|", Value::Null).unwrap_err();
        assert_eq!(err.code, "D3013");
    }

    #[test]
    fn chain_operator_applies_function() {
        let input = json::from_json_str(r#""hello""#).unwrap();
        let v = run(
            "$ ~> function($x){$x & \"!\"}",
            input,
        )
        .unwrap();
        assert_eq!(v.as_str(), Some("hello!"));
    }

    #[test]
    fn undefined_field_access_yields_undefined_result() {
        let input = json::from_json_str(r#"{"a": 1}"#).unwrap();
        let v = run("missing", input).unwrap();
        assert!(matches!(v, Value::Array(items) if items.is_empty()) || v.is_undefined());
    }

    fn invoice() -> Value {
        json::from_json_str(
            r#"{ "A": { "O": [ { "P":"Hat","N":2,"U":9.99 },
                              { "P":"Shoes","N":1,"U":49.99 },
                              { "P":"Shirt","N":3,"U":24.99 } ] } }"#,
        )
        .unwrap()
    }

    #[test]
    fn invoice_sort_by_unit_price_ascending() {
        let v = run("A.O^(>U).P", invoice()).unwrap();
        match v {
            Value::Array(items) => {
                let names: Vec<&str> = items.iter().map(|v| v.as_str().unwrap()).collect();
                assert_eq!(names, vec!["Shoes", "Shirt", "Hat"]);
            }
            other => panic!("expected array, got {other:?}"),
        }
    }

    #[test]
    fn invoice_focus_binding_interpolates_per_item() {
        let v = run(
            r#"A.O@$o.(P & ": " & $string($o.U))"#,
            invoice(),
        )
        .unwrap();
        match v {
            Value::Array(items) => {
                let strs: Vec<&str> = items.iter().map(|v| v.as_str().unwrap()).collect();
                assert_eq!(strs, vec!["Hat: 9.99", "Shoes: 49.99", "Shirt: 24.99"]);
            }
            other => panic!("expected array, got {other:?}"),
        }
    }

    #[test]
    fn invoice_index_bind_exposes_position() {
        let v = run(r#"A.O#$i.{"i":$i,"p":P}"#, invoice()).unwrap();
        match v {
            Value::Array(items) => {
                assert_eq!(items.len(), 3);
                for (idx, item) in items.iter().enumerate() {
                    match item {
                        Value::Object(pairs) => {
                            let i = pairs.iter().find(|(k, _)| k == "i").unwrap();
                            assert!(matches!(i.1, Value::Number(n) if n as usize == idx));
                        }
                        other => panic!("expected object, got {other:?}"),
                    }
                }
            }
            other => panic!("expected array, got {other:?}"),
        }
    }

    #[test]
    fn invoice_filter_and_sum_of_product() {
        let v = run("$sum(A.O.(U*N))", invoice()).unwrap();
        match v {
            Value::Number(n) => assert!((n - 144.94).abs() < 1e-9),
            other => panic!("expected number, got {other:?}"),
        }
    }

    #[test]
    fn bound_variable_used_in_arithmetic() {
        let ast = ancestry::resolve(parse("A.O[0].U * $tax").unwrap()).unwrap();
        let env = Environment::root(invoice(), 256);
        env.bind_var("tax".to_string(), Value::Number(1.1));
        let v = eval(&ast, &env).unwrap().normalize();
        match v {
            Value::Number(n) => assert!((n - 10.989).abs() < 1e-9),
            other => panic!("expected number, got {other:?}"),
        }
    }
}
