//! Ancestry resolution (spec §4.3): a static pass, run once after
//! parsing, that turns every `%` into a `Parent(Some(label))` and
//! records the matching label on the ancestor path step it refers to.
//!
//! A bare `%` refers to the step immediately enclosing the current one;
//! a chain `%.%.c` walks further up, one step per `%`, before `c`
//! becomes an ordinary field access relative to the elevated target.
//! Object-grouping (`expr{k:v}`) counts as one more implicit step: the
//! grouped values see the same ancestor chain the last step of `expr`
//! did. A lambda body is opaque: `%` inside a `function(){...}` can
//! only see ancestors established within that body, never the path the
//! lambda literal happened to be written inside of.

use crate::ast::{BinOp, Node, NodeKind};
use crate::error::{err, Result};

pub fn resolve(mut node: Node) -> Result<Node> {
    let mut next_id = 0usize;
    resolve_in_context(&mut node, &mut [], &mut next_id)?;
    Ok(node)
}

fn fresh_label(next_id: &mut usize) -> String {
    let label = format!("%{next_id}");
    *next_id += 1;
    label
}

fn attach_slot(target: &mut Node, label: &str) {
    if !target.slots.iter().any(|s| s == label) {
        target.slots.push(label.to_string());
    }
}

fn flatten_path(node: Node, out: &mut Vec<Node>) {
    match node.kind {
        NodeKind::Path(left, right) => {
            flatten_path(*left, out);
            flatten_path(*right, out);
        }
        _ => out.push(node),
    }
}

fn rebuild_path(mut steps: Vec<Node>) -> Node {
    let mut iter = steps.drain(..);
    let first = iter.next().expect("path always has at least one step");
    iter.fold(first, |acc, step| {
        let pos = step.pos;
        Node::new(NodeKind::Path(Box::new(acc), Box::new(step)), pos)
    })
}

/// Flattens `node` into its path steps (a single-element list if it is
/// not a `Path` at all) and resolves every `%` within, in order. Each
/// resolved step becomes an ancestor candidate for every step after it,
/// in addition to the outer `chain`. Returns the resolved steps so a
/// caller like object-grouping can reuse the chain state that existed
/// just before the final step, without rebuilding the node itself.
fn resolve_path_steps(node: Node, chain: &mut [Node], next_id: &mut usize) -> Result<Vec<Node>> {
    let mut steps = Vec::new();
    flatten_path(node, &mut steps);

    let mut resolved: Vec<Node> = Vec::new();
    let mut i = 0;
    while i < steps.len() {
        if matches!(steps[i].kind, NodeKind::Parent(None)) {
            let run_start = i;
            while i < steps.len() && matches!(steps[i].kind, NodeKind::Parent(None)) {
                i += 1;
            }
            let level = (i - run_start) - 1;
            let pos = steps[run_start].pos;
            let available = chain.len() + resolved.len();
            if level >= available {
                return Err(err::s0217(pos));
            }
            let label = fresh_label(next_id);
            let idx = available - 1 - level;
            if idx < chain.len() {
                attach_slot(&mut chain[idx], &label);
            } else {
                attach_slot(&mut resolved[idx - chain.len()], &label);
            }
            resolved.push(Node::new(NodeKind::Parent(Some(label)), pos));
        } else {
            let mut step =
                std::mem::replace(&mut steps[i], Node::new(NodeKind::Null, steps[i].pos));
            let mut combined: Vec<Node> = chain.to_vec();
            combined.extend(resolved.iter().cloned());
            resolve_generic(&mut step, &mut combined, next_id)?;
            for (dst, src) in chain.iter_mut().zip(combined.iter()) {
                *dst = src.clone();
            }
            for (dst, src) in resolved.iter_mut().zip(combined[chain.len()..].iter()) {
                *dst = src.clone();
            }
            resolved.push(step);
            i += 1;
        }
    }
    Ok(resolved)
}

/// Resolve a node that may itself be a `Path`, rebuilding it afterward.
fn resolve_in_context(node: &mut Node, chain: &mut [Node], next_id: &mut usize) -> Result<()> {
    if !matches!(node.kind, NodeKind::Path(_, _)) {
        return resolve_generic(node, chain, next_id);
    }
    let owned = std::mem::replace(node, Node::new(NodeKind::Null, node.pos));
    let resolved = resolve_path_steps(owned, chain, next_id)?;
    *node = rebuild_path(resolved);
    Ok(())
}

fn resolve_generic(node: &mut Node, chain: &mut [Node], next_id: &mut usize) -> Result<()> {
    if matches!(node.kind, NodeKind::Parent(None)) {
        if chain.is_empty() {
            return Err(err::s0217(node.pos));
        }
        let label = fresh_label(next_id);
        let idx = chain.len() - 1;
        attach_slot(&mut chain[idx], &label);
        *node = Node::new(NodeKind::Parent(Some(label)), node.pos);
        return Ok(());
    }

    if let NodeKind::Binary(BinOp::ObjectGroup, left, right) = &mut node.kind {
        let left_owned = std::mem::replace(&mut **left, Node::new(NodeKind::Null, left.pos));
        let mut left_steps = resolve_path_steps(left_owned, chain, next_id)?;

        let prefix_len = left_steps.len().saturating_sub(1);
        let mut value_chain: Vec<Node> = chain.to_vec();
        value_chain.extend(left_steps[..prefix_len].iter().cloned());

        if let NodeKind::ObjectLit(pairs) = &mut right.kind {
            for (k, v) in pairs {
                resolve_generic(k, &mut value_chain, next_id)?;
                resolve_generic(v, &mut value_chain, next_id)?;
            }
        }
        // `value_chain` is `chain` followed by a clone of `left_steps`'s
        // prefix; any slot resolution above mutated those clones, so
        // copy them back into both originals.
        for (dst, src) in chain.iter_mut().zip(value_chain.iter()) {
            *dst = src.clone();
        }
        for (dst, src) in left_steps[..prefix_len]
            .iter_mut()
            .zip(value_chain[chain.len()..].iter())
        {
            *dst = src.clone();
        }
        **left = rebuild_path(left_steps);
        return Ok(());
    }

    match &mut node.kind {
        NodeKind::Path(_, _) => resolve_in_context(node, chain, next_id),
        NodeKind::Filter(target, predicate) => {
            resolve_generic(target, chain, next_id)?;
            resolve_generic(predicate, chain, next_id)
        }
        NodeKind::KeepArray(inner) => resolve_generic(inner, chain, next_id),
        NodeKind::Binary(_, l, r) => {
            resolve_generic(l, chain, next_id)?;
            resolve_generic(r, chain, next_id)
        }
        NodeKind::Unary(_, v) => resolve_generic(v, chain, next_id),
        NodeKind::ArrayLit(items) => {
            for item in items {
                resolve_generic(item, chain, next_id)?;
            }
            Ok(())
        }
        NodeKind::ObjectLit(pairs) => {
            for (k, v) in pairs {
                resolve_generic(k, chain, next_id)?;
                resolve_generic(v, chain, next_id)?;
            }
            Ok(())
        }
        NodeKind::Block(exprs) => {
            for e in exprs {
                resolve_generic(e, chain, next_id)?;
            }
            Ok(())
        }
        NodeKind::Assignment(_, value) => resolve_generic(value, chain, next_id),
        NodeKind::Conditional(cond, then_b, else_b) => {
            resolve_generic(cond, chain, next_id)?;
            resolve_generic(then_b, chain, next_id)?;
            if let Some(e) = else_b {
                resolve_generic(e, chain, next_id)?;
            }
            Ok(())
        }
        NodeKind::FunctionCall(callee, args) => {
            resolve_generic(callee, chain, next_id)?;
            for a in args {
                resolve_generic(a, chain, next_id)?;
            }
            Ok(())
        }
        NodeKind::Lambda(_, body) => resolve_in_context(body, &mut [], next_id),
        NodeKind::Range(a, b) => {
            resolve_generic(a, chain, next_id)?;
            resolve_generic(b, chain, next_id)
        }
        NodeKind::Sort(target, terms) => {
            resolve_generic(target, chain, next_id)?;
            for term in terms {
                resolve_generic(&mut term.expr, chain, next_id)?;
            }
            Ok(())
        }
        NodeKind::Focus(target, _) => resolve_generic(target, chain, next_id),
        NodeKind::IndexBind(target, _) => resolve_generic(target, chain, next_id),
        NodeKind::Transform(target, update, delete) => {
            resolve_generic(target, chain, next_id)?;
            resolve_generic(update, chain, next_id)?;
            if let Some(d) = delete {
                resolve_generic(d, chain, next_id)?;
            }
            Ok(())
        }
        NodeKind::Number(_)
        | NodeKind::Str(_)
        | NodeKind::Bool(_)
        | NodeKind::Null
        | NodeKind::Name(_)
        | NodeKind::Variable(_)
        | NodeKind::Context
        | NodeKind::Wildcard
        | NodeKind::Descendant
        | NodeKind::Placeholder
        | NodeKind::RegexLit(_, _)
        | NodeKind::Parent(Some(_)) => Ok(()),
        NodeKind::Parent(None) => unreachable!("handled above"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn resolved(src: &str) -> Node {
        resolve(parse(src).unwrap()).unwrap()
    }

    #[test]
    fn single_parent_resolves_against_immediate_ancestor() {
        let node = resolved("A.O[U>20]{\"Total\": %.Total}");
        let dump = format!("{node:?}");
        assert!(dump.contains("Parent(Some("));
        assert!(!dump.contains("Parent(None)"));
    }

    #[test]
    fn unresolved_parent_at_root_is_s0217() {
        let err = resolve(parse("%").unwrap()).unwrap_err();
        assert_eq!(err.code, "S0217");
    }

    #[test]
    fn chained_parent_requires_two_ancestors() {
        let err = resolve(parse("A.O[%.%.X > 1]").unwrap()).unwrap_err();
        assert_eq!(err.code, "S0217");
    }

    #[test]
    fn chained_parent_with_enough_ancestors_resolves() {
        let node = resolved("A.O.P[%.%.X > 1]");
        let dump = format!("{node:?}");
        assert!(dump.contains("Parent(Some("));
    }

    #[test]
    fn lambda_body_is_opaque_to_outer_parent_slots() {
        let err = resolve(parse("A.O.(function(){%})()").unwrap()).unwrap_err();
        assert_eq!(err.code, "S0217");
    }

    #[test]
    fn bare_parent_inside_filter_target_resolves() {
        let node = resolved("A.O[%.Total > 0]");
        let dump = format!("{node:?}");
        assert!(dump.contains("Parent(Some("));
    }

    #[test]
    fn object_grouping_without_dots_has_no_ancestor() {
        let err = resolve(parse("A{\"X\": %.Y}").unwrap()).unwrap_err();
        assert_eq!(err.code, "S0217");
    }
}
