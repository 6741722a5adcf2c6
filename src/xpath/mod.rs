//! `XPath` 1.0 query language implementation.
//!
//! This module compiles `XPath` 1.0 expressions
//! (<https://www.w3.org/TR/xpath-10/>) and evaluates them against a
//! [`Document`]. Node-set results are [`NodeSet`]s of handles in document
//! order.
//!
//! # Quick Start
//!
//! ```
//! use xmlsift::Document;
//! use xmlsift::xpath::{evaluate, XPathValue};
//!
//! let doc = Document::parse_str("<root><a>1</a><b>2</b></root>").unwrap();
//! let root = doc.root_element().unwrap().id();
//! let result = evaluate(&doc, root, "count(*)").unwrap();
//! assert_eq!(result, XPathValue::Number(2.0));
//! ```
//!
//! # Namespaces
//!
//! Prefixed name tests resolve through a [`Namespaces`] table given at
//! compile time, never through the document's own declarations. An
//! unprefixed name test matches only elements in no namespace, so elements
//! under a default namespace need a prefix bound to that namespace's URI.
//!
//! # Known Limitations
//!
//! - The `namespace::` axis is rejected at compile time.
//! - Variable references (`$name`) are rejected at compile time.
//!
//! # Submodules
//!
//! - [`ast`]: Abstract syntax tree types for compiled expressions.
//! - [`lexer`]: Tokenizer for expression strings.
//! - [`parser`]: Recursive descent parser for expressions.

pub mod ast;
mod eval;
pub mod lexer;
pub mod parser;
pub(crate) mod types;

pub use types::{format_xpath_number, Item, ItemRef, NodeSet, XPathValue};

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::error::{Error, Result};
use crate::parser::XML_NAMESPACE;
use crate::tree::{Document, NodeId};
use ast::Expr;

// ---------------------------------------------------------------------------
// Namespaces
// ---------------------------------------------------------------------------

/// Prefix bindings used to resolve prefixed name tests.
///
/// The `xml` prefix is always bound to the XML namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Namespaces {
    prefixes: HashMap<String, String>,
}

impl Namespaces {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `prefix` to `uri`, replacing any earlier binding. Rebinding
    /// `xml` has no effect.
    pub fn define(&mut self, prefix: &str, uri: &str) {
        if prefix != "xml" {
            self.prefixes.insert(prefix.to_string(), uri.to_string());
        }
    }

    /// The URI bound to `prefix`, if any.
    #[must_use]
    pub fn resolve(&self, prefix: &str) -> Option<&str> {
        if prefix == "xml" {
            return Some(XML_NAMESPACE);
        }
        self.prefixes.get(prefix).map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

/// A compiled expression, reusable against any document and context node.
///
/// # Examples
///
/// ```
/// use xmlsift::Document;
/// use xmlsift::xpath::Query;
///
/// let query = Query::compile("item[@on]").unwrap();
/// let doc = Document::parse_str(r#"<list><item on="1"/><item/></list>"#).unwrap();
/// let list = doc.root_element().unwrap().id();
/// assert_eq!(query.select(&doc, list).unwrap().len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    source: String,
    expr: Expr,
}

impl Query {
    /// Compiles `expr` with only the built-in `xml` prefix bound.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidQuerySyntax`] for malformed expressions and
    /// [`Error::UnknownFunction`] for calls to functions outside the core
    /// library.
    pub fn compile(expr: &str) -> Result<Self> {
        Self::compile_with(expr, &Namespaces::new())
    }

    /// Compiles `expr`, resolving prefixed name tests through `namespaces`.
    ///
    /// # Errors
    ///
    /// As for [`compile`](Self::compile); an unbound prefix is an
    /// [`Error::InvalidQuerySyntax`].
    pub fn compile_with(expr: &str, namespaces: &Namespaces) -> Result<Self> {
        let compiled = parser::parse(expr, namespaces)?;
        debug!(query = expr, "compiled xpath expression");
        Ok(Self {
            source: expr.to_string(),
            expr: compiled,
        })
    }

    /// The expression text this query was compiled from.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// The compiled syntax tree.
    #[must_use]
    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Evaluates the query with `context` as the context node.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleReference`] if `context` does not name a live
    /// node of `doc`, and [`Error::QueryType`] if a node-set operation is
    /// applied to another type.
    pub fn evaluate(&self, doc: &Document, context: NodeId) -> Result<XPathValue> {
        let ix = doc.check(context)?;
        eval::evaluate(doc, &self.expr, ix)
    }

    /// Evaluates the query and requires a node-set result.
    ///
    /// # Errors
    ///
    /// As for [`evaluate`](Self::evaluate), plus [`Error::QueryType`] when
    /// the result is not a node-set.
    pub fn select(&self, doc: &Document, context: NodeId) -> Result<NodeSet> {
        match self.evaluate(doc, context)? {
            XPathValue::NodeSet(nodes) => Ok(nodes),
            other => Err(Error::QueryType {
                expected: "node-set",
                found: other.type_name(),
            }),
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Compiles and evaluates `expression` in one call, with `context_node` as
/// the context node and the document's defined prefixes in scope.
///
/// For evaluating the same expression against many context nodes, compile
/// it once with [`Query::compile_with`].
///
/// # Examples
///
/// ```
/// use xmlsift::Document;
/// use xmlsift::xpath::{evaluate, XPathValue};
///
/// let doc = Document::parse_str("<root><child>Hello</child></root>").unwrap();
/// let root = doc.root_element().unwrap().id();
///
/// let result = evaluate(&doc, root, "string(child)").unwrap();
/// assert_eq!(result.to_xpath_string(), "Hello");
/// ```
///
/// # Errors
///
/// Returns compilation errors from [`Query::compile_with`] and evaluation
/// errors from [`Query::evaluate`].
pub fn evaluate(doc: &Document, context_node: NodeId, expression: &str) -> Result<XPathValue> {
    Query::compile_with(expression, doc.namespaces())?.evaluate(doc, context_node)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_xml_prefix_is_builtin() {
        let mut ns = Namespaces::new();
        assert_eq!(ns.resolve("xml"), Some(XML_NAMESPACE));
        ns.define("xml", "urn:other");
        assert_eq!(ns.resolve("xml"), Some(XML_NAMESPACE));
        assert_eq!(ns.resolve("p"), None);
        ns.define("p", "urn:p");
        ns.define("p", "urn:q");
        assert_eq!(ns.resolve("p"), Some("urn:q"));
    }

    #[test]
    fn test_query_reuse_across_documents() {
        let query = Query::compile("count(//x)").unwrap();
        assert_eq!(query.as_str(), "count(//x)");
        let one = Document::parse_str("<r><x/></r>").unwrap();
        let two = Document::parse_str("<r><x/><x/></r>").unwrap();
        assert_eq!(query.evaluate(&one, one.root()).unwrap(), XPathValue::Number(1.0));
        assert_eq!(query.evaluate(&two, two.root()).unwrap(), XPathValue::Number(2.0));
    }

    #[test]
    fn test_foreign_context_is_stale() {
        let one = Document::parse_str("<r/>").unwrap();
        let two = Document::parse_str("<r/>").unwrap();
        let query = Query::compile("/r").unwrap();
        assert!(matches!(
            query.select(&two, one.root()).unwrap_err(),
            Error::StaleReference { .. }
        ));
    }

    #[test]
    fn test_select_requires_node_set() {
        let doc = Document::parse_str("<r/>").unwrap();
        let err = Query::compile("'s'").unwrap().select(&doc, doc.root()).unwrap_err();
        assert!(matches!(
            err,
            Error::QueryType {
                expected: "node-set",
                found: "string"
            }
        ));
    }

    #[test]
    fn test_compile_errors() {
        assert!(matches!(
            Query::compile("//a[").unwrap_err(),
            Error::InvalidQuerySyntax { .. }
        ));
        assert!(matches!(
            Query::compile("frob(1)").unwrap_err(),
            Error::UnknownFunction { .. }
        ));
        assert!(matches!(
            Query::compile("//p:a").unwrap_err(),
            Error::InvalidQuerySyntax { .. }
        ));
    }

    #[test]
    fn test_convenience_uses_document_prefixes() {
        let mut doc = Document::parse_str(r#"<r xmlns="urn:d"><k>v</k></r>"#).unwrap();
        doc.define_prefix("d", "urn:d");
        let value = evaluate(&doc, doc.root(), "string(/d:r/d:k)").unwrap();
        assert_eq!(value, XPathValue::String("v".to_string()));
    }
}
