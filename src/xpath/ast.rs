//! Compiled form of a path query.
//!
//! The parser resolves everything it can before evaluation: namespace
//! prefixes in name tests become URIs, function names become [`Function`]
//! values with checked arity, and abbreviations (`//`, `.`, `..`, `@`) are
//! expanded into explicit [`Step`]s. Evaluation never sees a name it has to
//! look up.

use std::fmt;

/// A query expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A numeric literal (e.g. `42`, `3.5`).
    Number(f64),

    /// A string literal (e.g. `"hello"` or `'world'`).
    String(String),

    /// A binary operation (e.g. `a + b`, `x = y`, `p and q`).
    BinaryOp {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Unary negation (e.g. `-x`).
    UnaryNeg(Box<Expr>),

    /// A call to a library function.
    FunctionCall { function: Function, args: Vec<Expr> },

    /// A location path. Relative paths start at the context node, absolute
    /// ones at the root of the context node's tree. An absolute path with
    /// no steps is the bare `/`.
    Path { absolute: bool, steps: Vec<Step> },

    /// A primary expression narrowed by predicates and optionally continued
    /// by a relative path, as in `(//a)[1]/b`.
    Filter {
        expr: Box<Expr>,
        predicates: Vec<Expr>,
        steps: Vec<Step>,
    },

    /// A union of two node-sets (`a | b`).
    Union(Box<Expr>, Box<Expr>),
}

/// A binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    And,
    Or,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "div",
            Self::Mod => "mod",
            Self::Eq => "=",
            Self::Neq => "!=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::And => "and",
            Self::Or => "or",
        })
    }
}

/// One step of a location path: an axis, a node test and zero or more
/// predicates.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub axis: Axis,
    pub node_test: NodeTest,
    pub predicates: Vec<Expr>,
}

impl Step {
    /// A step with no predicates.
    pub(crate) fn new(axis: Axis, node_test: NodeTest) -> Self {
        Self {
            axis,
            node_test,
            predicates: Vec::new(),
        }
    }
}

/// A traversal direction.
///
/// `namespace` is recognized by the parser only to report it as
/// unsupported, so it has no variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    Parent,
    Ancestor,
    AncestorOrSelf,
    FollowingSibling,
    PrecedingSibling,
    Following,
    Preceding,
    Attribute,
    Self_,
}

impl Axis {
    /// The axis name as written in a query.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Child => "child",
            Self::Descendant => "descendant",
            Self::DescendantOrSelf => "descendant-or-self",
            Self::Parent => "parent",
            Self::Ancestor => "ancestor",
            Self::AncestorOrSelf => "ancestor-or-self",
            Self::FollowingSibling => "following-sibling",
            Self::PrecedingSibling => "preceding-sibling",
            Self::Following => "following",
            Self::Preceding => "preceding",
            Self::Attribute => "attribute",
            Self::Self_ => "self",
        }
    }

    /// Parses an axis name. Returns `None` for unknown names and for
    /// `namespace`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "child" => Self::Child,
            "descendant" => Self::Descendant,
            "descendant-or-self" => Self::DescendantOrSelf,
            "parent" => Self::Parent,
            "ancestor" => Self::Ancestor,
            "ancestor-or-self" => Self::AncestorOrSelf,
            "following-sibling" => Self::FollowingSibling,
            "preceding-sibling" => Self::PrecedingSibling,
            "following" => Self::Following,
            "preceding" => Self::Preceding,
            "attribute" => Self::Attribute,
            "self" => Self::Self_,
            _ => return None,
        })
    }

    /// Reverse axes list nodes nearest-first, against document order.
    #[must_use]
    pub fn is_reverse(self) -> bool {
        matches!(
            self,
            Self::Ancestor | Self::AncestorOrSelf | Self::Preceding | Self::PrecedingSibling
        )
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node test, with any prefix already resolved to a namespace URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTest {
    /// An expanded name. `namespace` is `None` for an unprefixed test,
    /// which only matches names in no namespace.
    Name {
        namespace: Option<String>,
        local: String,
    },
    /// `prefix:*`: any name in the given namespace.
    NamespaceWildcard(String),
    /// `*`: any name.
    Wildcard,
    /// `node()`
    Node,
    /// `text()`, which also matches CDATA sections.
    Text,
    /// `comment()`
    Comment,
    /// `processing-instruction()`, optionally restricted to one target.
    ProcessingInstruction(Option<String>),
}

impl fmt::Display for NodeTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name {
                namespace: Some(ns),
                local,
            } => write!(f, "{{{ns}}}{local}"),
            Self::Name {
                namespace: None,
                local,
            } => f.write_str(local),
            Self::NamespaceWildcard(ns) => write!(f, "{{{ns}}}*"),
            Self::Wildcard => f.write_str("*"),
            Self::Node => f.write_str("node()"),
            Self::Text => f.write_str("text()"),
            Self::Comment => f.write_str("comment()"),
            Self::ProcessingInstruction(None) => f.write_str("processing-instruction()"),
            Self::ProcessingInstruction(Some(target)) => {
                write!(f, "processing-instruction('{target}')")
            }
        }
    }
}

/// The function library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    // node-set
    Last,
    Position,
    Count,
    LocalName,
    NamespaceUri,
    Name,
    Id,
    // string
    String,
    Concat,
    StartsWith,
    Contains,
    SubstringBefore,
    SubstringAfter,
    Substring,
    StringLength,
    NormalizeSpace,
    Translate,
    // boolean
    Boolean,
    Not,
    True,
    False,
    Lang,
    // number
    Number,
    Sum,
    Floor,
    Ceiling,
    Round,
}

impl Function {
    /// Looks up a function by name.
    #[must_use]
    pub fn lookup(name: &str) -> Option<Self> {
        Some(match name {
            "last" => Self::Last,
            "position" => Self::Position,
            "count" => Self::Count,
            "local-name" => Self::LocalName,
            "namespace-uri" => Self::NamespaceUri,
            "name" => Self::Name,
            "id" => Self::Id,
            "string" => Self::String,
            "concat" => Self::Concat,
            "starts-with" => Self::StartsWith,
            "contains" => Self::Contains,
            "substring-before" => Self::SubstringBefore,
            "substring-after" => Self::SubstringAfter,
            "substring" => Self::Substring,
            "string-length" => Self::StringLength,
            "normalize-space" => Self::NormalizeSpace,
            "translate" => Self::Translate,
            "boolean" => Self::Boolean,
            "not" => Self::Not,
            "true" => Self::True,
            "false" => Self::False,
            "lang" => Self::Lang,
            "number" => Self::Number,
            "sum" => Self::Sum,
            "floor" => Self::Floor,
            "ceiling" => Self::Ceiling,
            "round" => Self::Round,
            _ => return None,
        })
    }

    /// The function's name as written in a query.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Last => "last",
            Self::Position => "position",
            Self::Count => "count",
            Self::LocalName => "local-name",
            Self::NamespaceUri => "namespace-uri",
            Self::Name => "name",
            Self::Id => "id",
            Self::String => "string",
            Self::Concat => "concat",
            Self::StartsWith => "starts-with",
            Self::Contains => "contains",
            Self::SubstringBefore => "substring-before",
            Self::SubstringAfter => "substring-after",
            Self::Substring => "substring",
            Self::StringLength => "string-length",
            Self::NormalizeSpace => "normalize-space",
            Self::Translate => "translate",
            Self::Boolean => "boolean",
            Self::Not => "not",
            Self::True => "true",
            Self::False => "false",
            Self::Lang => "lang",
            Self::Number => "number",
            Self::Sum => "sum",
            Self::Floor => "floor",
            Self::Ceiling => "ceiling",
            Self::Round => "round",
        }
    }

    /// Accepted argument counts as `(min, max)`; `max` is `None` for
    /// variadic functions.
    #[must_use]
    pub fn arity(self) -> (usize, Option<usize>) {
        match self {
            Self::Last | Self::Position | Self::True | Self::False => (0, Some(0)),
            Self::LocalName
            | Self::NamespaceUri
            | Self::Name
            | Self::String
            | Self::StringLength
            | Self::NormalizeSpace
            | Self::Number => (0, Some(1)),
            Self::Count
            | Self::Id
            | Self::Boolean
            | Self::Not
            | Self::Lang
            | Self::Sum
            | Self::Floor
            | Self::Ceiling
            | Self::Round => (1, Some(1)),
            Self::StartsWith | Self::Contains | Self::SubstringBefore | Self::SubstringAfter => {
                (2, Some(2))
            }
            Self::Substring => (2, Some(3)),
            Self::Translate => (3, Some(3)),
            Self::Concat => (2, None),
        }
    }

    /// Returns `true` if `count` arguments are acceptable.
    #[must_use]
    pub fn accepts(self, count: usize) -> bool {
        let (min, max) = self.arity();
        count >= min && max.into_iter().all(|max| count <= max)
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
