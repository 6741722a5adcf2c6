//! Query result types.
//!
//! An expression evaluates to one of four [`XPathValue`]s. Node-sets hold
//! [`Item`]s: plain handles that stay valid across later edits of unrelated
//! parts of the tree and fail with
//! [`Error::StaleReference`](crate::Error::StaleReference) once the node
//! they name is detached or removed.

use std::fmt;
use std::ops::Index;

use crate::tree::{AttrId, AttrRef, NodeId, NodeRef};

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// One member of a node-set: a tree node or an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Item {
    Node(NodeId),
    Attribute(AttrId),
}

impl Item {
    /// The node handle, if this item is a tree node.
    #[must_use]
    pub fn node_id(self) -> Option<NodeId> {
        match self {
            Self::Node(id) => Some(id),
            Self::Attribute(_) => None,
        }
    }

    /// The attribute handle, if this item is an attribute.
    #[must_use]
    pub fn attr_id(self) -> Option<AttrId> {
        match self {
            Self::Attribute(id) => Some(id),
            Self::Node(_) => None,
        }
    }
}

/// A dereferenced [`Item`], borrowed from its document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ItemRef<'a> {
    Node(NodeRef<'a>),
    Attribute(AttrRef<'a>),
}

impl<'a> ItemRef<'a> {
    /// The string-value: descendant text for elements and the document,
    /// content for other nodes, the value for attributes.
    #[must_use]
    pub fn text(self) -> String {
        match self {
            Self::Node(node) => node.text(),
            Self::Attribute(attr) => attr.value().to_string(),
        }
    }

    /// The node, if this is one.
    #[must_use]
    pub fn as_node(self) -> Option<NodeRef<'a>> {
        match self {
            Self::Node(node) => Some(node),
            Self::Attribute(_) => None,
        }
    }

    /// The handle this reference was resolved from.
    #[must_use]
    pub fn item(self) -> Item {
        match self {
            Self::Node(node) => Item::Node(node.id()),
            Self::Attribute(attr) => Item::Attribute(attr.id()),
        }
    }
}

// ---------------------------------------------------------------------------
// NodeSet
// ---------------------------------------------------------------------------

/// An ordered, duplicate-free set of items in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeSet {
    items: Vec<Item>,
}

impl NodeSet {
    /// Wraps items that are already ordered and deduplicated.
    pub(crate) fn from_ordered(items: Vec<Item>) -> Self {
        Self { items }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn first(&self) -> Option<Item> {
        self.items.first().copied()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<Item> {
        self.items.get(index).copied()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Item> {
        self.items.iter()
    }

    /// The node handles in the set, skipping attributes.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.items.iter().filter_map(|item| item.node_id())
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Item] {
        &self.items
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<Item> {
        self.items
    }
}

impl Index<usize> for NodeSet {
    type Output = Item;

    fn index(&self, index: usize) -> &Item {
        &self.items[index]
    }
}

impl IntoIterator for NodeSet {
    type Item = Item;
    type IntoIter = std::vec::IntoIter<Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a NodeSet {
    type Item = &'a Item;
    type IntoIter = std::slice::Iter<'a, Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

// ---------------------------------------------------------------------------
// XPathValue
// ---------------------------------------------------------------------------

/// The result of evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum XPathValue {
    Boolean(bool),
    /// An IEEE 754 double, including NaN, the infinities and negative zero.
    Number(f64),
    String(String),
    NodeSet(NodeSet),
}

impl XPathValue {
    /// Boolean conversion: zero, NaN, the empty string and the empty
    /// node-set are false.
    #[must_use]
    pub fn to_boolean(&self) -> bool {
        match self {
            Self::Boolean(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            Self::NodeSet(nodes) => !nodes.is_empty(),
        }
    }

    /// Number conversion. A node-set needs its document to be converted;
    /// here it yields NaN. Evaluation converts node-sets itself.
    #[must_use]
    pub fn to_number(&self) -> f64 {
        match self {
            Self::Number(n) => *n,
            Self::Boolean(b) => f64::from(u8::from(*b)),
            Self::String(s) => parse_xpath_number(s),
            Self::NodeSet(_) => f64::NAN,
        }
    }

    /// String conversion. A node-set yields the empty string here; resolve
    /// its first item through the document for its string-value.
    #[must_use]
    pub fn to_xpath_string(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            Self::Boolean(b) => b.to_string(),
            Self::Number(n) => format_xpath_number(*n),
            Self::NodeSet(_) => String::new(),
        }
    }

    #[must_use]
    pub fn as_node_set(&self) -> Option<&NodeSet> {
        match self {
            Self::NodeSet(nodes) => Some(nodes),
            _ => None,
        }
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::NodeSet(_) => "node-set",
        }
    }
}

impl fmt::Display for XPathValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NodeSet(nodes) => write!(f, "<node-set of {} items>", nodes.len()),
            other => f.write_str(&other.to_xpath_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Number conversions
// ---------------------------------------------------------------------------

/// Formats a number the way `string()` does.
///
/// - NaN is `NaN`, the infinities are `Infinity` and `-Infinity`
/// - both zeros are `0`
/// - integers have no decimal point
/// - other values use the shortest decimal form, never an exponent
#[must_use]
pub fn format_xpath_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_owned();
    }
    if n.is_infinite() {
        return if n.is_sign_positive() {
            "Infinity".to_owned()
        } else {
            "-Infinity".to_owned()
        };
    }
    if n == 0.0 {
        return "0".to_owned();
    }
    #[allow(clippy::cast_possible_truncation)]
    if n.fract() == 0.0 && n.abs() < 1e18 {
        return format!("{}", n as i64);
    }
    // Display for f64 never uses exponent notation.
    format!("{n}")
}

/// Parses a string the way `number()` does: optional surrounding
/// whitespace, an optional minus sign, and digits with at most one decimal
/// point. Anything else is NaN.
pub(crate) fn parse_xpath_number(s: &str) -> f64 {
    let trimmed = s.trim_matches(|c| matches!(c, ' ' | '\t' | '\n' | '\r'));
    let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
    let mut seen_digit = false;
    let mut seen_dot = false;
    for b in digits.bytes() {
        match b {
            b'0'..=b'9' => seen_digit = true,
            b'.' if !seen_dot => seen_dot = true,
            _ => return f64::NAN,
        }
    }
    if !seen_digit {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}
