//! Expression evaluator.
//!
//! Evaluation walks a compiled [`Expr`] against a [`Document`]. Every
//! expression is evaluated in a context of one node (or attribute), a
//! 1-based position and a size, held by [`XPathContext`].
//!
//! # Location steps
//!
//! A step expands each input node along its axis in the axis's natural
//! order (nearest first, so reverse for `ancestor`, `preceding` and
//! `preceding-sibling`), filters that per-node sequence by the node test
//! and then by each predicate in turn, with `position()` and `last()`
//! counting within it. The union over all input nodes is then sorted into
//! document order and deduplicated. Attributes sort directly after their
//! element and before its children.

use super::ast::{Axis, BinaryOp, Expr, Function, NodeTest, Step};
use super::types::{format_xpath_number, parse_xpath_number, Item, NodeSet, XPathValue};
use crate::error::{Error, Result};
use crate::parser::XML_NAMESPACE;
use crate::tree::{Attribute, AttrId, Document, Ix, NodeKind, NodeRef};

/// A node or an attribute, addressed by arena index. Attributes are
/// addressed by their position on the owning element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Hit {
    Node(Ix),
    Attr(Ix, usize),
}

/// Intermediate value; node-sets stay as arena indices until the result
/// leaves the evaluator.
#[derive(Debug, Clone)]
enum Value {
    Boolean(bool),
    Number(f64),
    String(String),
    Nodes(Vec<Hit>),
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Nodes(_) => "node-set",
        }
    }
}

/// Evaluates `expr` with `context` as the context node, position 1 of 1.
pub(crate) fn evaluate(doc: &Document, expr: &Expr, context: Ix) -> Result<XPathValue> {
    let ctx = XPathContext {
        doc,
        node: Hit::Node(context),
        position: 1,
        size: 1,
    };
    let value = ctx.eval_expr(expr)?;
    Ok(match value {
        Value::Boolean(b) => XPathValue::Boolean(b),
        Value::Number(n) => XPathValue::Number(n),
        Value::String(s) => XPathValue::String(s),
        Value::Nodes(hits) => XPathValue::NodeSet(ctx.into_node_set(hits)),
    })
}

/// Evaluation context: the document, the context node, and the context
/// position and size.
#[derive(Clone, Copy)]
struct XPathContext<'a> {
    doc: &'a Document,
    node: Hit,
    position: usize,
    size: usize,
}

impl<'a> XPathContext<'a> {
    fn with_node(self, node: Hit, position: usize, size: usize) -> Self {
        Self {
            node,
            position,
            size,
            ..self
        }
    }

    fn eval_expr(&self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::String(s) => Ok(Value::String(s.clone())),
            Expr::BinaryOp { .. } | Expr::Union(..) => self.eval_chain(expr),
            Expr::UnaryNeg(_) => {
                let mut inner = expr;
                let mut negate = false;
                while let Expr::UnaryNeg(operand) = inner {
                    negate = !negate;
                    inner = operand;
                }
                let n = self.to_number(&self.eval_expr(inner)?);
                Ok(Value::Number(if negate { -n } else { n }))
            }
            Expr::FunctionCall { function, args } => self.eval_function(*function, args),
            Expr::Path { absolute, steps } => {
                let start = if *absolute {
                    Hit::Node(self.tree_root())
                } else {
                    self.node
                };
                self.apply_steps(vec![start], steps).map(Value::Nodes)
            }
            Expr::Filter {
                expr,
                predicates,
                steps,
            } => {
                let mut hits = self.eval_node_set(expr)?;
                for predicate in predicates {
                    hits = self.apply_predicate(hits, predicate)?;
                }
                self.apply_steps(hits, steps).map(Value::Nodes)
            }
        }
    }

    fn eval_node_set(&self, expr: &Expr) -> Result<Vec<Hit>> {
        Self::into_hits(self.eval_expr(expr)?)
    }

    // -----------------------------------------------------------------------
    // Operators
    // -----------------------------------------------------------------------

    /// Evaluates a left-deep chain of binary operators and unions without
    /// recursing down its spine: `a + b - c` folds left to right over the
    /// right-hand operands.
    fn eval_chain(&self, expr: &Expr) -> Result<Value> {
        let mut links = Vec::new();
        let mut leftmost = expr;
        loop {
            match leftmost {
                Expr::BinaryOp { op, left, right } => {
                    links.push((Some(*op), &**right));
                    leftmost = left;
                }
                Expr::Union(left, right) => {
                    links.push((None, &**right));
                    leftmost = left;
                }
                _ => break,
            }
        }

        let mut acc = self.eval_expr(leftmost)?;
        for (op, right) in links.into_iter().rev() {
            acc = match op {
                Some(op) => self.eval_binary_op(op, &acc, right)?,
                None => {
                    let mut hits = Self::into_hits(acc)?;
                    hits.extend(self.eval_node_set(right)?);
                    self.sort_unique(&mut hits);
                    Value::Nodes(hits)
                }
            };
        }
        Ok(acc)
    }

    fn into_hits(value: Value) -> Result<Vec<Hit>> {
        match value {
            Value::Nodes(hits) => Ok(hits),
            other => Err(Error::QueryType {
                expected: "node-set",
                found: other.type_name(),
            }),
        }
    }

    fn eval_binary_op(&self, op: BinaryOp, lv: &Value, right: &Expr) -> Result<Value> {
        match op {
            BinaryOp::And => {
                if !self.to_boolean(lv) {
                    return Ok(Value::Boolean(false));
                }
                let rv = self.eval_expr(right)?;
                Ok(Value::Boolean(self.to_boolean(&rv)))
            }
            BinaryOp::Or => {
                if self.to_boolean(lv) {
                    return Ok(Value::Boolean(true));
                }
                let rv = self.eval_expr(right)?;
                Ok(Value::Boolean(self.to_boolean(&rv)))
            }
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                let ln = self.to_number(lv);
                let rn = self.to_number(&self.eval_expr(right)?);
                Ok(Value::Number(match op {
                    BinaryOp::Add => ln + rn,
                    BinaryOp::Sub => ln - rn,
                    BinaryOp::Mul => ln * rn,
                    BinaryOp::Div => ln / rn,
                    _ => ln % rn,
                }))
            }
            BinaryOp::Eq | BinaryOp::Neq => {
                let rv = self.eval_expr(right)?;
                let eq = self.compare(lv, &rv, |a, b| a == b, |a, b| a == b);
                let ne = self.compare(lv, &rv, |a, b| a != b, |a, b| a != b);
                Ok(Value::Boolean(if op == BinaryOp::Eq { eq } else { ne }))
            }
            BinaryOp::Lt | BinaryOp::Lte | BinaryOp::Gt | BinaryOp::Gte => {
                let rv = self.eval_expr(right)?;
                let cmp = move |a: f64, b: f64| match op {
                    BinaryOp::Lt => a < b,
                    BinaryOp::Lte => a <= b,
                    BinaryOp::Gt => a > b,
                    _ => a >= b,
                };
                Ok(Value::Boolean(self.compare_relational(lv, &rv, cmp)))
            }
        }
    }

    /// Equality comparison. When a node-set is involved, the comparison is
    /// true if it holds for any member; otherwise booleans win over
    /// numbers, and numbers over strings.
    fn compare(
        &self,
        lhs: &Value,
        rhs: &Value,
        num: impl Fn(f64, f64) -> bool,
        text: impl Fn(&str, &str) -> bool,
    ) -> bool {
        match (lhs, rhs) {
            (Value::Nodes(l), Value::Nodes(r)) => {
                let right: Vec<String> = r.iter().map(|&h| self.string_value(h)).collect();
                l.iter().any(|&h| {
                    let lsv = self.string_value(h);
                    right.iter().any(|rsv| text(&lsv, rsv))
                })
            }
            (Value::Nodes(ns), Value::Boolean(b)) => num(bool_num(!ns.is_empty()), bool_num(*b)),
            (Value::Boolean(b), Value::Nodes(ns)) => num(bool_num(*b), bool_num(!ns.is_empty())),
            (Value::Nodes(ns), Value::Number(n)) => ns
                .iter()
                .any(|&h| num(parse_xpath_number(&self.string_value(h)), *n)),
            (Value::Number(n), Value::Nodes(ns)) => ns
                .iter()
                .any(|&h| num(*n, parse_xpath_number(&self.string_value(h)))),
            (Value::Nodes(ns), Value::String(s)) => {
                ns.iter().any(|&h| text(&self.string_value(h), s))
            }
            (Value::String(s), Value::Nodes(ns)) => {
                ns.iter().any(|&h| text(s, &self.string_value(h)))
            }
            (Value::Boolean(_), _) | (_, Value::Boolean(_)) => num(
                bool_num(self.to_boolean(lhs)),
                bool_num(self.to_boolean(rhs)),
            ),
            (Value::Number(_), _) | (_, Value::Number(_)) => {
                num(self.to_number(lhs), self.to_number(rhs))
            }
            _ => text(&self.to_string(lhs), &self.to_string(rhs)),
        }
    }

    /// Relational comparison: both sides are compared as numbers, with
    /// node-sets compared member by member.
    fn compare_relational(&self, lhs: &Value, rhs: &Value, cmp: impl Fn(f64, f64) -> bool) -> bool {
        let numbers = |v: &Value| -> Vec<f64> {
            match v {
                Value::Nodes(ns) => ns
                    .iter()
                    .map(|&h| parse_xpath_number(&self.string_value(h)))
                    .collect(),
                other => vec![self.to_number(other)],
            }
        };
        match (lhs, rhs) {
            (Value::Nodes(ns), Value::Boolean(b)) => cmp(bool_num(!ns.is_empty()), bool_num(*b)),
            (Value::Boolean(b), Value::Nodes(ns)) => cmp(bool_num(*b), bool_num(!ns.is_empty())),
            _ => {
                let left = numbers(lhs);
                let right = numbers(rhs);
                left.iter().any(|&l| right.iter().any(|&r| cmp(l, r)))
            }
        }
    }

    // -----------------------------------------------------------------------
    // Location steps
    // -----------------------------------------------------------------------

    fn apply_steps(&self, mut hits: Vec<Hit>, steps: &[Step]) -> Result<Vec<Hit>> {
        for step in steps {
            hits = self.apply_step(&hits, step)?;
        }
        Ok(hits)
    }

    fn apply_step(&self, input: &[Hit], step: &Step) -> Result<Vec<Hit>> {
        let mut result = Vec::new();
        for &hit in input {
            let mut selected: Vec<Hit> = self
                .expand_axis(hit, step.axis)
                .into_iter()
                .filter(|&h| self.node_matches(h, &step.node_test, step.axis))
                .collect();
            for predicate in &step.predicates {
                selected = self.apply_predicate(selected, predicate)?;
            }
            result.extend(selected);
        }
        if input.len() > 1 || step.axis.is_reverse() {
            self.sort_unique(&mut result);
        }
        Ok(result)
    }

    /// Keeps the members for which `predicate` holds. A numeric result
    /// means `position() = n`.
    fn apply_predicate(&self, hits: Vec<Hit>, predicate: &Expr) -> Result<Vec<Hit>> {
        let size = hits.len();
        let mut kept = Vec::with_capacity(size);
        for (i, hit) in hits.into_iter().enumerate() {
            let ctx = self.with_node(hit, i + 1, size);
            let keep = match ctx.eval_expr(predicate)? {
                #[allow(clippy::cast_precision_loss, clippy::float_cmp)]
                Value::Number(n) => n == (i + 1) as f64,
                other => ctx.to_boolean(&other),
            };
            if keep {
                kept.push(hit);
            }
        }
        Ok(kept)
    }

    /// Expands `hit` along `axis`, nearest node first.
    fn expand_axis(&self, hit: Hit, axis: Axis) -> Vec<Hit> {
        let doc = self.doc;
        let ix = match hit {
            Hit::Node(ix) => ix,
            Hit::Attr(owner, _) => {
                return match axis {
                    Axis::Self_ | Axis::DescendantOrSelf => vec![hit],
                    Axis::Parent => vec![Hit::Node(owner)],
                    Axis::Ancestor => self.ancestors(owner, true),
                    Axis::AncestorOrSelf => {
                        let mut out = vec![hit];
                        out.extend(self.ancestors(owner, true));
                        out
                    }
                    Axis::Following => {
                        let mut out: Vec<Hit> =
                            doc.subtree_ix(owner).skip(1).map(Hit::Node).collect();
                        out.extend(self.following(owner));
                        out
                    }
                    Axis::Preceding => self.preceding(owner),
                    _ => Vec::new(),
                };
            }
        };

        match axis {
            Axis::Child => doc.children_ix(ix).map(Hit::Node).collect(),
            Axis::Descendant => doc.subtree_ix(ix).skip(1).map(Hit::Node).collect(),
            Axis::DescendantOrSelf => doc.subtree_ix(ix).map(Hit::Node).collect(),
            Axis::Parent => doc.data(ix).parent.map(Hit::Node).into_iter().collect(),
            Axis::Ancestor => self.ancestors(ix, false),
            Axis::AncestorOrSelf => self.ancestors(ix, true),
            Axis::FollowingSibling => {
                std::iter::successors(doc.data(ix).next_sibling, |&s| doc.data(s).next_sibling)
                    .map(Hit::Node)
                    .collect()
            }
            Axis::PrecedingSibling => {
                std::iter::successors(doc.data(ix).prev_sibling, |&s| doc.data(s).prev_sibling)
                    .map(Hit::Node)
                    .collect()
            }
            Axis::Following => self.following(ix),
            Axis::Preceding => self.preceding(ix),
            Axis::Attribute => match &doc.data(ix).kind {
                NodeKind::Element { attributes, .. } => attributes
                    .iter()
                    .enumerate()
                    .filter(|(_, a)| !a.is_namespace_declaration())
                    .map(|(i, _)| Hit::Attr(ix, i))
                    .collect(),
                _ => Vec::new(),
            },
            Axis::Self_ => vec![hit],
        }
    }

    fn ancestors(&self, ix: Ix, include_self: bool) -> Vec<Hit> {
        let first = if include_self {
            Some(ix)
        } else {
            self.doc.data(ix).parent
        };
        std::iter::successors(first, |&a| self.doc.data(a).parent)
            .map(Hit::Node)
            .collect()
    }

    /// Nodes after `ix` in document order, excluding its descendants.
    fn following(&self, ix: Ix) -> Vec<Hit> {
        let doc = self.doc;
        let mut out = Vec::new();
        for anchor in std::iter::successors(Some(ix), |&a| doc.data(a).parent) {
            let siblings =
                std::iter::successors(doc.data(anchor).next_sibling, |&s| doc.data(s).next_sibling);
            for sibling in siblings {
                out.extend(doc.subtree_ix(sibling).map(Hit::Node));
            }
        }
        out
    }

    /// Nodes before `ix` in reverse document order, excluding its
    /// ancestors.
    fn preceding(&self, ix: Ix) -> Vec<Hit> {
        let doc = self.doc;
        let mut out = Vec::new();
        for anchor in std::iter::successors(Some(ix), |&a| doc.data(a).parent) {
            let siblings =
                std::iter::successors(doc.data(anchor).prev_sibling, |&s| doc.data(s).prev_sibling);
            for sibling in siblings {
                let start = out.len();
                out.extend(doc.subtree_ix(sibling).map(Hit::Node));
                out[start..].reverse();
            }
        }
        out
    }

    /// Applies a node test. Name tests match the axis's principal node
    /// type: attributes on the attribute axis, elements elsewhere.
    fn node_matches(&self, hit: Hit, test: &NodeTest, axis: Axis) -> bool {
        match hit {
            Hit::Attr(owner, index) => {
                let Some(attr) = self.attribute(owner, index) else {
                    return false;
                };
                match test {
                    NodeTest::Node => true,
                    _ if axis != Axis::Attribute => false,
                    _ => name_matches(test, &attr.name, attr.namespace.as_deref()),
                }
            }
            Hit::Node(ix) => match (&self.doc.data(ix).kind, test) {
                (_, NodeTest::Node) => true,
                (NodeKind::Text { .. } | NodeKind::CData { .. }, NodeTest::Text)
                | (NodeKind::Comment { .. }, NodeTest::Comment) => true,
                (NodeKind::ProcessingInstruction { target, .. }, NodeTest::ProcessingInstruction(wanted)) => {
                    wanted.iter().all(|w| w == target)
                }
                (NodeKind::Element { name, namespace, .. }, _) if axis != Axis::Attribute => {
                    name_matches(test, name, namespace.as_deref())
                }
                _ => false,
            },
        }
    }

    // -----------------------------------------------------------------------
    // Functions
    // -----------------------------------------------------------------------

    #[allow(clippy::cast_precision_loss)]
    fn eval_function(&self, function: Function, args: &[Expr]) -> Result<Value> {
        let value = match function {
            Function::Last => Value::Number(self.size as f64),
            Function::Position => Value::Number(self.position as f64),
            Function::Count => Value::Number(self.node_set_arg(args, 0)?.len() as f64),
            Function::LocalName | Function::NamespaceUri | Function::Name => {
                let target = match args.first() {
                    Some(arg) => self.eval_node_set(arg)?.first().copied(),
                    None => Some(self.node),
                };
                Value::String(target.map_or_else(String::new, |h| self.name_of(function, h)))
            }
            Function::Id => {
                let keys = match self.eval_expr(&args[0])? {
                    Value::Nodes(hits) => hits
                        .iter()
                        .map(|&h| self.string_value(h))
                        .collect::<Vec<_>>()
                        .join(" "),
                    other => self.to_string(&other),
                };
                let mut hits: Vec<Hit> = keys
                    .split(is_xml_space)
                    .filter(|k| !k.is_empty())
                    .filter_map(|k| self.doc.element_by_id(k))
                    .map(|n| Hit::Node(n.ix()))
                    .collect();
                self.sort_unique(&mut hits);
                Value::Nodes(hits)
            }

            Function::String => Value::String(self.string_arg_or_context(args)?),
            Function::Concat => {
                let mut out = String::new();
                for arg in args {
                    out.push_str(&self.to_string(&self.eval_expr(arg)?));
                }
                Value::String(out)
            }
            Function::StartsWith => {
                let (s, prefix) = self.two_strings(args)?;
                Value::Boolean(s.starts_with(&prefix))
            }
            Function::Contains => {
                let (s, needle) = self.two_strings(args)?;
                Value::Boolean(s.contains(&needle))
            }
            Function::SubstringBefore => {
                let (s, needle) = self.two_strings(args)?;
                Value::String(s.find(&needle).map_or_else(String::new, |i| s[..i].to_string()))
            }
            Function::SubstringAfter => {
                let (s, needle) = self.two_strings(args)?;
                Value::String(
                    s.find(&needle)
                        .map_or_else(String::new, |i| s[i + needle.len()..].to_string()),
                )
            }
            Function::Substring => {
                let s = self.string_arg(args, 0)?;
                let start = xpath_round(self.number_arg(args, 1)?);
                let end = match args.get(2) {
                    Some(len) => start + xpath_round(self.to_number(&self.eval_expr(len)?)),
                    None => f64::INFINITY,
                };
                Value::String(
                    s.chars()
                        .enumerate()
                        .filter(|&(i, _)| {
                            let p = (i + 1) as f64;
                            p >= start && p < end
                        })
                        .map(|(_, c)| c)
                        .collect(),
                )
            }
            Function::StringLength => {
                Value::Number(self.string_arg_or_context(args)?.chars().count() as f64)
            }
            Function::NormalizeSpace => {
                let s = self.string_arg_or_context(args)?;
                Value::String(
                    s.split(is_xml_space)
                        .filter(|w| !w.is_empty())
                        .collect::<Vec<_>>()
                        .join(" "),
                )
            }
            Function::Translate => {
                let s = self.string_arg(args, 0)?;
                let from: Vec<char> = self.string_arg(args, 1)?.chars().collect();
                let to: Vec<char> = self.string_arg(args, 2)?.chars().collect();
                Value::String(
                    s.chars()
                        .filter_map(|c| match from.iter().position(|&f| f == c) {
                            Some(i) => to.get(i).copied(),
                            None => Some(c),
                        })
                        .collect(),
                )
            }

            Function::Boolean => Value::Boolean(self.to_boolean(&self.eval_expr(&args[0])?)),
            Function::Not => Value::Boolean(!self.to_boolean(&self.eval_expr(&args[0])?)),
            Function::True => Value::Boolean(true),
            Function::False => Value::Boolean(false),
            Function::Lang => {
                let wanted = self.string_arg(args, 0)?.to_ascii_lowercase();
                Value::Boolean(self.language().is_some_and(|lang| {
                    let lang = lang.to_ascii_lowercase();
                    lang == wanted
                        || lang
                            .strip_prefix(wanted.as_str())
                            .is_some_and(|rest| rest.starts_with('-'))
                }))
            }

            Function::Number => Value::Number(match args.first() {
                Some(arg) => self.to_number(&self.eval_expr(arg)?),
                None => parse_xpath_number(&self.string_value(self.node)),
            }),
            Function::Sum => Value::Number(
                self.node_set_arg(args, 0)?
                    .iter()
                    .map(|&h| parse_xpath_number(&self.string_value(h)))
                    .sum(),
            ),
            Function::Floor => Value::Number(self.number_arg(args, 0)?.floor()),
            Function::Ceiling => Value::Number(self.number_arg(args, 0)?.ceil()),
            Function::Round => Value::Number(xpath_round(self.number_arg(args, 0)?)),
        };
        Ok(value)
    }

    fn node_set_arg(&self, args: &[Expr], index: usize) -> Result<Vec<Hit>> {
        self.eval_node_set(&args[index])
    }

    fn string_arg(&self, args: &[Expr], index: usize) -> Result<String> {
        Ok(self.to_string(&self.eval_expr(&args[index])?))
    }

    fn number_arg(&self, args: &[Expr], index: usize) -> Result<f64> {
        Ok(self.to_number(&self.eval_expr(&args[index])?))
    }

    fn two_strings(&self, args: &[Expr]) -> Result<(String, String)> {
        Ok((self.string_arg(args, 0)?, self.string_arg(args, 1)?))
    }

    fn string_arg_or_context(&self, args: &[Expr]) -> Result<String> {
        if args.is_empty() {
            Ok(self.string_value(self.node))
        } else {
            self.string_arg(args, 0)
        }
    }

    fn name_of(&self, function: Function, hit: Hit) -> String {
        let (local, prefix, namespace) = match hit {
            Hit::Attr(owner, index) => match self.attribute(owner, index) {
                Some(a) => (a.name.as_str(), a.prefix.as_deref(), a.namespace.as_deref()),
                None => return String::new(),
            },
            Hit::Node(ix) => match &self.doc.data(ix).kind {
                NodeKind::Element {
                    name,
                    prefix,
                    namespace,
                    ..
                } => (name.as_str(), prefix.as_deref(), namespace.as_deref()),
                NodeKind::ProcessingInstruction { target, .. } => (target.as_str(), None, None),
                _ => return String::new(),
            },
        };
        match function {
            Function::LocalName => local.to_string(),
            Function::NamespaceUri => namespace.unwrap_or_default().to_string(),
            _ => match prefix {
                Some(p) => format!("{p}:{local}"),
                None => local.to_string(),
            },
        }
    }

    /// The `xml:lang` value in scope at the context node.
    fn language(&self) -> Option<&'a str> {
        let start = match self.node {
            Hit::Node(ix) | Hit::Attr(ix, _) => ix,
        };
        std::iter::successors(Some(start), |&a| self.doc.data(a).parent).find_map(|ix| {
            match &self.doc.data(ix).kind {
                NodeKind::Element { attributes, .. } => attributes
                    .iter()
                    .find(|a| a.name == "lang" && a.namespace.as_deref() == Some(XML_NAMESPACE))
                    .map(|a| a.value.as_str()),
                _ => None,
            }
        })
    }

    // -----------------------------------------------------------------------
    // Conversions
    // -----------------------------------------------------------------------

    fn to_boolean(&self, value: &Value) -> bool {
        match value {
            Value::Boolean(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Nodes(hits) => !hits.is_empty(),
        }
    }

    fn to_number(&self, value: &Value) -> f64 {
        match value {
            Value::Boolean(b) => bool_num(*b),
            Value::Number(n) => *n,
            Value::String(s) => parse_xpath_number(s),
            Value::Nodes(_) => parse_xpath_number(&self.to_string(value)),
        }
    }

    fn to_string(&self, value: &Value) -> String {
        match value {
            Value::Boolean(b) => b.to_string(),
            Value::Number(n) => format_xpath_number(*n),
            Value::String(s) => s.clone(),
            Value::Nodes(hits) => hits
                .first()
                .map_or_else(String::new, |&h| self.string_value(h)),
        }
    }

    fn string_value(&self, hit: Hit) -> String {
        match hit {
            Hit::Node(ix) => NodeRef::new(self.doc, ix).text(),
            Hit::Attr(owner, index) => self
                .attribute(owner, index)
                .map_or_else(String::new, |a| a.value.clone()),
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn attribute(&self, owner: Ix, index: usize) -> Option<&'a Attribute> {
        match &self.doc.data(owner).kind {
            NodeKind::Element { attributes, .. } => attributes.get(index),
            _ => None,
        }
    }

    /// The root of the tree holding the context node: the document node,
    /// or the top of a detached subtree.
    fn tree_root(&self) -> Ix {
        let start = match self.node {
            Hit::Node(ix) | Hit::Attr(ix, _) => ix,
        };
        std::iter::successors(Some(start), |&a| self.doc.data(a).parent)
            .last()
            .unwrap_or(start)
    }

    fn order_key(&self, hit: Hit) -> (u32, usize) {
        match hit {
            Hit::Node(ix) => (self.doc.rank(ix), 0),
            Hit::Attr(owner, index) => (self.doc.rank(owner), index + 1),
        }
    }

    fn sort_unique(&self, hits: &mut Vec<Hit>) {
        hits.sort_unstable_by_key(|&h| self.order_key(h));
        hits.dedup();
    }

    fn into_node_set(&self, hits: Vec<Hit>) -> NodeSet {
        let items = hits
            .into_iter()
            .filter_map(|hit| match hit {
                Hit::Node(ix) => Some(Item::Node(self.doc.handle(ix))),
                Hit::Attr(owner, index) => self.attribute(owner, index).map(|a| {
                    Item::Attribute(AttrId {
                        owner: self.doc.handle(owner),
                        serial: a.serial,
                    })
                }),
            })
            .collect();
        NodeSet::from_ordered(items)
    }
}

fn name_matches(test: &NodeTest, local: &str, namespace: Option<&str>) -> bool {
    match test {
        NodeTest::Wildcard => true,
        NodeTest::NamespaceWildcard(uri) => namespace == Some(uri.as_str()),
        NodeTest::Name {
            namespace: wanted,
            local: wanted_local,
        } => local == wanted_local && namespace == wanted.as_deref(),
        _ => false,
    }
}

fn bool_num(b: bool) -> f64 {
    f64::from(u8::from(b))
}

fn is_xml_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r')
}

/// Rounds half toward positive infinity: `round(-0.5)` is `-0`,
/// `round(2.5)` is `3`.
fn xpath_round(n: f64) -> f64 {
    if n.is_nan() || n.is_infinite() {
        return n;
    }
    let rounded = (n + 0.5).floor();
    if rounded == 0.0 && n.is_sign_negative() {
        -0.0
    } else {
        rounded
    }
}
