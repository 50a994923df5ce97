//! Pratt parser producing the AST (spec §4.2).
//!
//! Two kinds of rule: prefix (dispatched on the token kind found in a
//! value position) and infix (dispatched on the operator found after an
//! already-parsed left operand, using the precedence table below).

use crate::ast::{BinOp, Node, NodeKind, SortDir, SortTerm, UnOp};
use crate::error::{err, Result};
use crate::lexer::{Lexer, Spanned, Token};

struct Parser<'a> {
    lexer: Lexer<'a>,
}

/// (precedence, right-associative). Unlisted tokens are not infix
/// operators at all.
fn infix_binding(tok: &Token) -> Option<(u8, bool)> {
    use Token::*;
    Some(match tok {
        Assign => (10, true),
        Coalesce | Elvis | Question | DotDot => (20, false),
        Or => (25, false),
        And => (30, false),
        Eq | Ne | Lt | Le | Gt | Ge | In | Chain => (40, false),
        Amp | Plus | Minus => (50, false),
        Star | Slash | Percent => (60, false),
        LBrace => (70, false),
        Dot => (75, false),
        LBrack | LParen | At | Hash | Caret => (80, false),
        _ => return None,
    })
}

impl<'a> Parser<'a> {
    fn peek_op(&mut self) -> Result<Spanned> {
        let save = self.lexer.pos();
        let tok = self.lexer.scan(false)?;
        self.lexer.reset_pos(save);
        Ok(tok)
    }

    fn bump_op(&mut self) -> Result<Spanned> {
        self.lexer.scan(false)
    }

    fn next_value(&mut self) -> Result<Spanned> {
        self.lexer.scan(true)
    }

    fn expect(&mut self, expected: Token) -> Result<Spanned> {
        let tok = self.bump_op()?;
        if tok.token == expected {
            Ok(tok)
        } else {
            Err(err::s0202(
                tok.pos,
                &format!("{expected:?}"),
                format!("{:?}", tok.token),
            ))
        }
    }

    fn parse_expr(&mut self, min_prec: u8) -> Result<Node> {
        let mut left = self.parse_prefix()?;
        loop {
            let peeked = self.peek_op()?;
            let Some((prec, right_assoc)) = infix_binding(&peeked.token) else {
                break;
            };
            if prec < min_prec {
                break;
            }
            left = self.parse_infix(left, prec, right_assoc)?;
        }
        Ok(left)
    }

    fn parse_prefix(&mut self) -> Result<Node> {
        let tok = self.next_value()?;
        match tok.token {
            Token::Number(n) => Ok(Node::new(NodeKind::Number(n), tok.pos)),
            Token::Str(s) => Ok(Node::new(NodeKind::Str(s), tok.pos)),
            Token::True => Ok(Node::new(NodeKind::Bool(true), tok.pos)),
            Token::False => Ok(Node::new(NodeKind::Bool(false), tok.pos)),
            Token::Null => Ok(Node::new(NodeKind::Null, tok.pos)),
            Token::Name(s) => Ok(Node::new(NodeKind::Name(s), tok.pos)),
            // Keywords double as field names in value position.
            Token::And => Ok(Node::new(NodeKind::Name("and".into()), tok.pos)),
            Token::Or => Ok(Node::new(NodeKind::Name("or".into()), tok.pos)),
            Token::In => Ok(Node::new(NodeKind::Name("in".into()), tok.pos)),
            Token::Variable(name) if name.is_empty() => {
                Ok(Node::new(NodeKind::Context, tok.pos))
            }
            Token::Variable(name) => Ok(Node::new(NodeKind::Variable(name), tok.pos)),
            Token::Regex(pattern, flags) => {
                Ok(Node::new(NodeKind::RegexLit(pattern, flags), tok.pos))
            }
            Token::Star => Ok(Node::new(NodeKind::Wildcard, tok.pos)),
            Token::StarStar => Ok(Node::new(NodeKind::Descendant, tok.pos)),
            Token::Percent => Ok(Node::new(NodeKind::Parent(None), tok.pos)),
            Token::Question => Ok(Node::new(NodeKind::Placeholder, tok.pos)),
            Token::Minus => {
                let operand = self.parse_expr(70)?;
                Ok(Node::new(
                    NodeKind::Unary(UnOp::Neg, Box::new(operand)),
                    tok.pos,
                ))
            }
            Token::LParen => self.parse_block(tok.pos),
            Token::LBrack => self.parse_array(tok.pos),
            Token::LBrace => self.parse_object_body(tok.pos),
            Token::Function => self.parse_lambda(tok.pos),
            Token::Pipe => self.parse_transform(tok.pos),
            Token::Eof => Err(err::s0500()),
            other => Err(err::s0201(tok.pos, format!("{other:?}"))),
        }
    }

    fn parse_infix(&mut self, left: Node, prec: u8, right_assoc: bool) -> Result<Node> {
        let op = self.bump_op()?;
        let pos = op.pos;
        let next_min = if right_assoc { prec } else { prec + 1 };
        let bin = |this: &mut Self, kind: BinOp| -> Result<Node> {
            let right = this.parse_expr(next_min)?;
            Ok(Node::new(
                NodeKind::Binary(kind, Box::new(left.clone()), Box::new(right)),
                pos,
            ))
        };
        match op.token {
            Token::Assign => {
                let NodeKind::Variable(name) = left.kind else {
                    return Err(err::s0402(pos));
                };
                let value = self.parse_expr(next_min)?;
                Ok(Node::new(
                    NodeKind::Assignment(name, Box::new(value)),
                    pos,
                ))
            }
            Token::Coalesce => bin(self, BinOp::Coalesce),
            Token::Elvis => bin(self, BinOp::Elvis),
            Token::DotDot => {
                let right = self.parse_expr(next_min)?;
                Ok(Node::new(
                    NodeKind::Range(Box::new(left), Box::new(right)),
                    pos,
                ))
            }
            Token::Question => {
                let then_branch = self.parse_expr(0)?;
                let else_branch = if self.peek_op()?.token == Token::Colon {
                    self.bump_op()?;
                    Some(Box::new(self.parse_expr(next_min)?))
                } else {
                    None
                };
                Ok(Node::new(
                    NodeKind::Conditional(Box::new(left), Box::new(then_branch), else_branch),
                    pos,
                ))
            }
            Token::Or => bin(self, BinOp::Or),
            Token::And => bin(self, BinOp::And),
            Token::Eq => bin(self, BinOp::Eq),
            Token::Ne => bin(self, BinOp::Ne),
            Token::Lt => bin(self, BinOp::Lt),
            Token::Le => bin(self, BinOp::Le),
            Token::Gt => bin(self, BinOp::Gt),
            Token::Ge => bin(self, BinOp::Ge),
            Token::In => bin(self, BinOp::In),
            Token::Chain => bin(self, BinOp::Chain),
            Token::Amp => bin(self, BinOp::Concat),
            Token::Plus => bin(self, BinOp::Add),
            Token::Minus => bin(self, BinOp::Sub),
            Token::Star => bin(self, BinOp::Mul),
            Token::Slash => bin(self, BinOp::Div),
            Token::Percent => bin(self, BinOp::Mod),
            Token::Dot => {
                let right = self.parse_expr(next_min)?;
                Ok(Node::new(
                    NodeKind::Path(Box::new(left), Box::new(right)),
                    pos,
                ))
            }
            Token::LBrack => self.parse_bracket(left, pos),
            Token::LParen => self.parse_call(left, pos),
            Token::LBrace => {
                let obj = self.parse_object_body(pos)?;
                Ok(Node::new(
                    NodeKind::Binary(BinOp::ObjectGroup, Box::new(left), Box::new(obj)),
                    pos,
                ))
            }
            Token::At => {
                let name_tok = self.bump_op()?;
                let Token::Variable(name) = name_tok.token else {
                    return Err(err::s0403(pos));
                };
                Ok(Node::new(NodeKind::Focus(Box::new(left), name), pos))
            }
            Token::Hash => {
                let name_tok = self.bump_op()?;
                let Token::Variable(name) = name_tok.token else {
                    return Err(err::s0404(pos));
                };
                Ok(Node::new(NodeKind::IndexBind(Box::new(left), name), pos))
            }
            Token::Caret => {
                self.expect(Token::LParen)?;
                let terms = self.parse_sort_terms()?;
                self.expect(Token::RParen)?;
                Ok(Node::new(NodeKind::Sort(Box::new(left), terms), pos))
            }
            other => unreachable!("infix dispatch missing for {other:?}"),
        }
    }

    fn parse_block(&mut self, pos: usize) -> Result<Node> {
        let exprs = self.parse_semicolon_list(Token::RParen)?;
        self.expect(Token::RParen)?;
        Ok(Node::new(NodeKind::Block(exprs), pos))
    }

    fn parse_semicolon_list(&mut self, terminator: Token) -> Result<Vec<Node>> {
        let mut exprs = Vec::new();
        if self.peek_op()?.token == terminator {
            return Ok(exprs);
        }
        loop {
            exprs.push(self.parse_expr(0)?);
            if self.peek_op()?.token == Token::Semicolon {
                self.bump_op()?;
                if self.peek_op()?.token == terminator {
                    break;
                }
                continue;
            }
            break;
        }
        Ok(exprs)
    }

    fn parse_array(&mut self, pos: usize) -> Result<Node> {
        let mut items = Vec::new();
        if self.peek_op()?.token != Token::RBrack {
            loop {
                items.push(self.parse_expr(0)?);
                if self.peek_op()?.token == Token::Comma {
                    self.bump_op()?;
                    continue;
                }
                break;
            }
        }
        self.expect(Token::RBrack)?;
        Ok(Node::new(NodeKind::ArrayLit(items), pos))
    }

    /// Parses `key : value, ...}` assuming the opening `{` was already
    /// consumed by the caller (shared between the object-literal prefix
    /// rule and the object-grouping infix rule).
    fn parse_object_body(&mut self, pos: usize) -> Result<Node> {
        let mut pairs = Vec::new();
        if self.peek_op()?.token != Token::RBrace {
            loop {
                let key = self.parse_expr(0)?;
                self.expect(Token::Colon)?;
                let value = self.parse_expr(0)?;
                pairs.push((key, value));
                if self.peek_op()?.token == Token::Comma {
                    self.bump_op()?;
                    continue;
                }
                break;
            }
        }
        self.expect(Token::RBrace)?;
        Ok(Node::new(NodeKind::ObjectLit(pairs), pos))
    }

    fn parse_lambda(&mut self, pos: usize) -> Result<Node> {
        self.expect(Token::LParen)?;
        let mut params = Vec::new();
        if self.peek_op()?.token != Token::RParen {
            loop {
                let tok = self.bump_op()?;
                match tok.token {
                    Token::Variable(name) => params.push(name),
                    _ => return Err(err::s0401(tok.pos)),
                }
                if self.peek_op()?.token == Token::Comma {
                    self.bump_op()?;
                    continue;
                }
                break;
            }
        }
        self.expect(Token::RParen)?;
        self.expect(Token::LBrace)?;
        let body_exprs = self.parse_semicolon_list(Token::RBrace)?;
        self.expect(Token::RBrace)?;
        let body = Node::new(NodeKind::Block(body_exprs), pos);
        Ok(Node::new(NodeKind::Lambda(params, Box::new(body)), pos))
    }

    fn parse_transform(&mut self, pos: usize) -> Result<Node> {
        let target = self.parse_expr(0)?;
        self.expect(Token::Pipe)?;
        let update = self.parse_expr(0)?;
        let delete = if self.peek_op()?.token == Token::Comma {
            self.bump_op()?;
            Some(Box::new(self.parse_expr(0)?))
        } else {
            None
        };
        self.expect(Token::Pipe)?;
        Ok(Node::new(
            NodeKind::Transform(Box::new(target), Box::new(update), delete),
            pos,
        ))
    }

    fn parse_bracket(&mut self, left: Node, pos: usize) -> Result<Node> {
        if self.peek_op()?.token == Token::RBrack {
            self.bump_op()?;
            return Ok(Node::new(NodeKind::KeepArray(Box::new(left)), pos));
        }
        let inner = self.parse_expr(0)?;
        self.expect(Token::RBrack)?;
        Ok(Node::new(
            NodeKind::Filter(Box::new(left), Box::new(inner)),
            pos,
        ))
    }

    fn parse_call(&mut self, left: Node, pos: usize) -> Result<Node> {
        let mut args = Vec::new();
        if self.peek_op()?.token != Token::RParen {
            loop {
                args.push(self.parse_expr(0)?);
                if self.peek_op()?.token == Token::Comma {
                    self.bump_op()?;
                    continue;
                }
                break;
            }
        }
        self.expect(Token::RParen)?;
        Ok(Node::new(NodeKind::FunctionCall(Box::new(left), args), pos))
    }

    fn parse_sort_terms(&mut self) -> Result<Vec<SortTerm>> {
        let mut terms = Vec::new();
        loop {
            let dir = match self.peek_op()?.token {
                Token::Lt => {
                    self.bump_op()?;
                    SortDir::Asc
                }
                Token::Gt => {
                    self.bump_op()?;
                    SortDir::Desc
                }
                _ => SortDir::Asc,
            };
            let expr = self.parse_expr(0)?;
            terms.push(SortTerm {
                expr: Box::new(expr),
                dir,
            });
            if self.peek_op()?.token == Token::Comma {
                self.bump_op()?;
                continue;
            }
            break;
        }
        Ok(terms)
    }
}

/// Parse a JSONata expression string into an unresolved AST (parent
/// slots, if any, are attached later by `crate::ancestry::resolve`).
pub fn parse(src: &str) -> Result<Node> {
    if src.trim().is_empty() {
        return Err(err::s0500());
    }
    let mut parser = Parser {
        lexer: Lexer::new(src),
    };
    let node = parser.parse_expr(0)?;
    let trailing = parser.peek_op()?;
    if trailing.token != Token::Eof {
        return Err(err::s0201(trailing.pos, format!("{:?}", trailing.token)));
    }
    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(src: &str) -> Node {
        parse(src).unwrap()
    }

    #[test]
    fn simple_name() {
        assert_eq!(p("foo").kind, NodeKind::Name("foo".into()));
    }

    #[test]
    fn dotted_path_is_left_leaning() {
        let node = p("A.O.P");
        match node.kind {
            NodeKind::Path(left, right) => {
                assert_eq!(right.kind, NodeKind::Name("P".into()));
                match left.kind {
                    NodeKind::Path(l2, r2) => {
                        assert_eq!(l2.kind, NodeKind::Name("A".into()));
                        assert_eq!(r2.kind, NodeKind::Name("O".into()));
                    }
                    other => panic!("expected nested Path, got {other:?}"),
                }
            }
            other => panic!("expected Path, got {other:?}"),
        }
    }

    #[test]
    fn filter_predicate() {
        let node = p("A.O[U>20].P");
        // Outermost is Path(Path(A, Filter(O, U>20)), P)
        match node.kind {
            NodeKind::Path(_, right) => assert_eq!(right.kind, NodeKind::Name("P".into())),
            other => panic!("expected Path, got {other:?}"),
        }
    }

    #[test]
    fn keep_array() {
        let node = p("A.O[]");
        match node.kind {
            NodeKind::Path(_, right) => {
                assert!(matches!(right.kind, NodeKind::KeepArray(_)))
            }
            other => panic!("expected Path, got {other:?}"),
        }
    }

    #[test]
    fn arithmetic_precedence() {
        // 1 + 2 * 3 -> 1 + (2 * 3)
        let node = p("1 + 2 * 3");
        match node.kind {
            NodeKind::Binary(BinOp::Add, _, right) => {
                assert!(matches!(right.kind, NodeKind::Binary(BinOp::Mul, _, _)));
            }
            other => panic!("expected Add at top, got {other:?}"),
        }
    }

    #[test]
    fn assignment_is_right_associative() {
        let node = p("$a := $b := 1");
        match node.kind {
            NodeKind::Assignment(name, value) => {
                assert_eq!(name, "a");
                assert!(matches!(value.kind, NodeKind::Assignment(_, _)));
            }
            other => panic!("expected Assignment, got {other:?}"),
        }
    }

    #[test]
    fn assignment_requires_variable_lhs() {
        let err = parse("1 := 2").unwrap_err();
        assert_eq!(err.code, "S0402");
    }

    #[test]
    fn conditional_with_else() {
        let node = p("$x ? 1 : 2");
        assert!(matches!(node.kind, NodeKind::Conditional(_, _, Some(_))));
    }

    #[test]
    fn conditional_without_else() {
        let node = p("$x ? 1");
        assert!(matches!(node.kind, NodeKind::Conditional(_, _, None)));
    }

    #[test]
    fn lambda_parses_params_and_body() {
        let node = p("function($x){$x*2}");
        match node.kind {
            NodeKind::Lambda(params, body) => {
                assert_eq!(params, vec!["x".to_string()]);
                match body.kind {
                    NodeKind::Block(exprs) => assert_eq!(exprs.len(), 1),
                    other => panic!("expected Block body, got {other:?}"),
                }
            }
            other => panic!("expected Lambda, got {other:?}"),
        }
    }

    #[test]
    fn sort_terms_with_direction() {
        let node = p("A.O^(>U)");
        match node.kind {
            NodeKind::Sort(_, terms) => {
                assert_eq!(terms.len(), 1);
                assert_eq!(terms[0].dir, SortDir::Desc);
            }
            other => panic!("expected Sort, got {other:?}"),
        }
    }

    #[test]
    fn focus_and_index_bind() {
        let node = p("A.O@$o.P");
        assert!(matches!(node.kind, NodeKind::Path(_, _)));
        let node2 = p("A.O#$i");
        match node2.kind {
            NodeKind::Path(_, right) => {
                assert!(matches!(right.kind, NodeKind::IndexBind(_, _)))
            }
            other => panic!("expected Path, got {other:?}"),
        }
    }

    #[test]
    fn object_construction() {
        let node = p(r#"{"a": 1, "b": 2}"#);
        match node.kind {
            NodeKind::ObjectLit(pairs) => assert_eq!(pairs.len(), 2),
            other => panic!("expected ObjectLit, got {other:?}"),
        }
    }

    #[test]
    fn object_grouping_infix() {
        let node = p("A.O{P: U}");
        match node.kind {
            NodeKind::Binary(BinOp::ObjectGroup, _, rhs) => {
                assert!(matches!(rhs.kind, NodeKind::ObjectLit(_)))
            }
            other => panic!("expected ObjectGroup, got {other:?}"),
        }
    }

    #[test]
    fn range_operator() {
        let node = p("1..5");
        assert!(matches!(node.kind, NodeKind::Range(_, _)));
    }

    #[test]
    fn chain_operator() {
        let node = p("$x ~> $uppercase()");
        assert!(matches!(
            node.kind,
            NodeKind::Binary(BinOp::Chain, _, _)
        ));
    }

    #[test]
    fn placeholder_in_call() {
        let node = p("$replace(?, \"a\", \"b\")");
        match node.kind {
            NodeKind::FunctionCall(_, args) => {
                assert!(matches!(args[0].kind, NodeKind::Placeholder))
            }
            other => panic!("expected FunctionCall, got {other:?}"),
        }
    }

    #[test]
    fn descendant_is_leaf_not_power() {
        let node = p("**");
        assert_eq!(node.kind, NodeKind::Descendant);
    }

    #[test]
    fn parent_operator_parses_unresolved() {
        let node = p("A.O[U>20]{P: %.N}");
        // Just check it parses to something containing an unresolved Parent;
        // ancestry resolution is tested separately in ancestry.rs.
        assert!(format!("{node:?}").contains("Parent(None)"));
    }

    #[test]
    fn and_or_in_as_field_names() {
        let node = p("and");
        assert_eq!(node.kind, NodeKind::Name("and".into()));
    }

    #[test]
    fn transform_triad_parses() {
        let node = p("|Account.Order|{\"Price\": Price * 1.1}|");
        assert!(matches!(node.kind, NodeKind::Transform(_, _, _)));
    }

    #[test]
    fn empty_expression_is_s0500() {
        let err = parse("").unwrap_err();
        assert_eq!(err.code, "S0500");
    }

    #[test]
    fn block_with_semicolons() {
        let node = p("($a := 1; $a + 1)");
        match node.kind {
            NodeKind::Block(exprs) => assert_eq!(exprs.len(), 2),
            other => panic!("expected Block, got {other:?}"),
        }
    }

    #[test]
    fn lambda_application_scenario() {
        let node = p("(($d := function($x){$x*2}); $d(21))");
        assert!(matches!(node.kind, NodeKind::Block(_)));
    }
}
