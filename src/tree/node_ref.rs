//! Borrowed read-only views of nodes and attributes.

use std::borrow::Cow;
use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};

use super::node::qualified;
use super::{Attribute, Document, Ix, NodeId, NodeKind, SubtreeIx};
use crate::error::{Error, Result};
use crate::xpath::types::parse_xpath_number;
use crate::xpath::{Item, ItemRef, NodeSet, Query, XPathValue};

/// A node borrowed from its [`Document`].
///
/// A `NodeRef` is always valid: it can only be obtained from a live handle
/// and it borrows the document, so the tree cannot change while it exists.
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    doc: &'a Document,
    ix: Ix,
}

impl<'a> NodeRef<'a> {
    pub(crate) fn new(doc: &'a Document, ix: Ix) -> Self {
        Self { doc, ix }
    }

    pub(crate) fn ix(self) -> Ix {
        self.ix
    }

    fn at(self, ix: Ix) -> Self {
        Self { doc: self.doc, ix }
    }

    fn links(self) -> &'a super::NodeData {
        self.doc.data(self.ix)
    }

    /// The document this node belongs to.
    #[must_use]
    pub fn document(self) -> &'a Document {
        self.doc
    }

    /// A handle to this node that can outlive the borrow.
    #[must_use]
    pub fn id(self) -> NodeId {
        self.doc.handle(self.ix)
    }

    #[must_use]
    pub fn kind(self) -> &'a NodeKind {
        &self.links().kind
    }

    #[must_use]
    pub fn is_element(self) -> bool {
        matches!(self.kind(), NodeKind::Element { .. })
    }

    /// The qualified name of an element, or the target of a processing
    /// instruction.
    #[must_use]
    pub fn name(self) -> Option<Cow<'a, str>> {
        match self.kind() {
            NodeKind::Element { name, prefix, .. } => Some(qualified(prefix.as_deref(), name)),
            NodeKind::ProcessingInstruction { target, .. } => Some(Cow::Borrowed(target)),
            _ => None,
        }
    }

    /// The local part of an element name.
    #[must_use]
    pub fn local_name(self) -> Option<&'a str> {
        match self.kind() {
            NodeKind::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    #[must_use]
    pub fn prefix(self) -> Option<&'a str> {
        match self.kind() {
            NodeKind::Element { prefix, .. } => prefix.as_deref(),
            _ => None,
        }
    }

    /// The namespace URI of an element.
    #[must_use]
    pub fn namespace(self) -> Option<&'a str> {
        match self.kind() {
            NodeKind::Element { namespace, .. } => namespace.as_deref(),
            _ => None,
        }
    }

    /// The attributes of an element in document order; empty for other
    /// node kinds. Namespace declarations are included.
    #[must_use]
    pub fn attributes(self) -> &'a [Attribute] {
        match self.kind() {
            NodeKind::Element { attributes, .. } => attributes,
            _ => &[],
        }
    }

    /// Looks up an attribute value by qualified name as written.
    ///
    /// # Examples
    ///
    /// ```
    /// use xmlsift::Document;
    ///
    /// let doc = Document::parse_str(r#"<a href="x" xml:lang="en"/>"#).unwrap();
    /// let a = doc.root_element().unwrap();
    /// assert_eq!(a.attr("href"), Some("x"));
    /// assert_eq!(a.attr("xml:lang"), Some("en"));
    /// assert_eq!(a.attr("lang"), None);
    /// ```
    #[must_use]
    pub fn attr(self, qname: &str) -> Option<&'a str> {
        self.attributes()
            .iter()
            .find(|a| a.matches_qname(qname))
            .map(|a| a.value.as_str())
    }

    /// Looks up an attribute value by local name and namespace URI.
    #[must_use]
    pub fn attr_ns(self, local: &str, namespace: Option<&str>) -> Option<&'a str> {
        self.attributes()
            .iter()
            .find(|a| a.name == local && a.namespace.as_deref() == namespace)
            .map(|a| a.value.as_str())
    }

    /// Views over this element's attributes.
    pub fn attribute_refs(self) -> impl Iterator<Item = AttrRef<'a>> + 'a {
        self.attributes()
            .iter()
            .map(move |attr| AttrRef { owner: self, attr })
    }

    /// The string value: the concatenated text of all descendant text and
    /// CDATA nodes for elements and the document, the content of other
    /// nodes.
    #[must_use]
    pub fn text(self) -> String {
        match self.kind() {
            NodeKind::Text { content } | NodeKind::CData { content } | NodeKind::Comment { content } => {
                content.clone()
            }
            NodeKind::ProcessingInstruction { data, .. } => data.clone(),
            NodeKind::Document | NodeKind::Element { .. } => {
                let mut out = String::new();
                for ix in self.doc.subtree_ix(self.ix) {
                    if let NodeKind::Text { content } | NodeKind::CData { content } =
                        &self.doc.data(ix).kind
                    {
                        out.push_str(content);
                    }
                }
                out
            }
        }
    }

    /// The string value read as an XPath number, or `None` when it is not
    /// one (`number()` would give NaN).
    ///
    /// ```
    /// use xmlsift::Document;
    ///
    /// let doc = Document::parse_str("<r><n> -1.5 </n><s>1e3</s></r>").unwrap();
    /// let r = doc.root_element().unwrap();
    /// let mut kids = r.element_children();
    /// assert_eq!(kids.next().unwrap().number_value(), Some(-1.5));
    /// assert_eq!(kids.next().unwrap().number_value(), None);
    /// ```
    #[must_use]
    pub fn number_value(self) -> Option<f64> {
        let n = parse_xpath_number(&self.text());
        (!n.is_nan()).then_some(n)
    }

    /// The trimmed string value parsed with the document's
    /// [`date_format`](Document::date_format).
    ///
    /// A format without an offset reads the time as UTC, and one without a
    /// time of day reads midnight.
    #[must_use]
    pub fn date_value(self) -> Option<DateTime<FixedOffset>> {
        let text = self.text();
        let text = text.trim();
        let format = self.doc.date_format();
        if let Ok(date) = DateTime::parse_from_str(text, format) {
            return Some(date);
        }
        let naive = NaiveDateTime::parse_from_str(text, format)
            .ok()
            .or_else(|| {
                NaiveDate::parse_from_str(text, format)
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })?;
        Some(naive.and_utc().fixed_offset())
    }

    /// Returns `true` for a text node holding only XML whitespace.
    #[must_use]
    pub fn is_blank(self) -> bool {
        match self.kind() {
            NodeKind::Text { content } => content
                .bytes()
                .all(|b| matches!(b, b' ' | b'\t' | b'\n' | b'\r')),
            _ => false,
        }
    }

    // ---------------------------------------------------------------------
    // Navigation
    // ---------------------------------------------------------------------

    #[must_use]
    pub fn parent(self) -> Option<Self> {
        self.links().parent.map(|p| self.at(p))
    }

    #[must_use]
    pub fn children(self) -> NodeChildren<'a> {
        NodeChildren {
            doc: self.doc,
            next: self.links().first_child,
        }
    }

    pub fn element_children(self) -> impl Iterator<Item = NodeRef<'a>> {
        self.children().filter(|n| n.is_element())
    }

    /// The first child element with local name `tag` in namespace `ns`
    /// (`None` for no namespace).
    #[must_use]
    pub fn first_child_by_tag(self, tag: &str, ns: Option<&str>) -> Option<Self> {
        self.children_by_tag(tag, ns).next()
    }

    pub fn children_by_tag<'t>(
        self,
        tag: &'t str,
        ns: Option<&'t str>,
    ) -> impl Iterator<Item = NodeRef<'a>> + 't
    where
        'a: 't,
    {
        self.element_children()
            .filter(move |n| n.local_name() == Some(tag) && n.namespace() == ns)
    }

    #[must_use]
    pub fn next_sibling(self) -> Option<Self> {
        self.links().next_sibling.map(|s| self.at(s))
    }

    #[must_use]
    pub fn previous_sibling(self) -> Option<Self> {
        self.links().prev_sibling.map(|s| self.at(s))
    }

    /// The next sibling that is an element.
    #[must_use]
    pub fn next_element(self) -> Option<Self> {
        let mut cur = self.next_sibling();
        while let Some(n) = cur {
            if n.is_element() {
                return Some(n);
            }
            cur = n.next_sibling();
        }
        None
    }

    /// The previous sibling that is an element.
    #[must_use]
    pub fn previous_element(self) -> Option<Self> {
        let mut cur = self.previous_sibling();
        while let Some(n) = cur {
            if n.is_element() {
                return Some(n);
            }
            cur = n.previous_sibling();
        }
        None
    }

    /// All descendants in document order, excluding this node.
    pub fn descendants(self) -> impl Iterator<Item = NodeRef<'a>> {
        let doc = self.doc;
        let walk: SubtreeIx<'a> = doc.subtree_ix(self.ix);
        walk.skip(1).map(move |ix| NodeRef::new(doc, ix))
    }

    /// Ancestors from the parent up to the topmost node.
    pub fn ancestors(self) -> impl Iterator<Item = NodeRef<'a>> {
        std::iter::successors(self.parent(), |n| n.parent())
    }

    /// The 1-based line where the node started in the source, if it was
    /// parsed rather than created.
    #[must_use]
    pub fn line_number(self) -> Option<u32> {
        match self.links().line {
            0 => None,
            line => Some(line),
        }
    }

    /// A location path identifying this node, e.g. `/root/item[2]/text()`.
    /// Nodes outside the tree get a path relative to their detached root.
    ///
    /// # Examples
    ///
    /// ```
    /// use xmlsift::Document;
    ///
    /// let doc = Document::parse_str("<a><b/><b>x</b></a>").unwrap();
    /// let text = doc.xpath("//text()").unwrap().node_ids().next().unwrap();
    /// assert_eq!(doc.get(text).unwrap().path(), "/a/b[2]/text()");
    /// ```
    #[must_use]
    pub fn path(self) -> String {
        let mut steps = Vec::new();
        let mut cur = self;
        while let Some(parent) = cur.parent() {
            steps.push(cur.step());
            cur = parent;
        }
        if cur.ix == self.doc.root_ix() {
            if steps.is_empty() {
                return "/".to_string();
            }
            steps.push(String::new());
        } else {
            steps.push(cur.step());
        }
        steps.reverse();
        steps.join("/")
    }

    fn step(self) -> String {
        let label = match self.kind() {
            NodeKind::Document => return String::new(),
            NodeKind::Element { .. } => self.name().map(Cow::into_owned).unwrap_or_default(),
            NodeKind::Text { .. } | NodeKind::CData { .. } => "text()".to_string(),
            NodeKind::Comment { .. } => "comment()".to_string(),
            NodeKind::ProcessingInstruction { target, .. } => {
                format!("processing-instruction('{target}')")
            }
        };
        let Some(parent) = self.parent() else {
            return label;
        };
        let mut position = 0;
        let mut total = 0;
        for sibling in parent.children().filter(|s| s.same_step(self)) {
            total += 1;
            if sibling.ix == self.ix {
                position = total;
            }
        }
        if total > 1 {
            format!("{label}[{position}]")
        } else {
            label
        }
    }

    /// Whether two siblings are counted together when numbering path steps.
    fn same_step(self, other: Self) -> bool {
        match (self.kind(), other.kind()) {
            (NodeKind::Element { .. }, NodeKind::Element { .. }) => {
                self.name() == other.name() && self.namespace() == other.namespace()
            }
            (
                NodeKind::Text { .. } | NodeKind::CData { .. },
                NodeKind::Text { .. } | NodeKind::CData { .. },
            )
            | (NodeKind::Comment { .. }, NodeKind::Comment { .. }) => true,
            (
                NodeKind::ProcessingInstruction { target: a, .. },
                NodeKind::ProcessingInstruction { target: b, .. },
            ) => a == b,
            _ => false,
        }
    }

    // ---------------------------------------------------------------------
    // Serialization and queries
    // ---------------------------------------------------------------------

    /// Serializes this node and its subtree as XML.
    #[must_use]
    pub fn raw_xml(self) -> String {
        crate::serial::write_node(self, &crate::serial::SerializeOptions::default())
    }

    /// Selects nodes with an XPath expression evaluated at this node, using
    /// the prefixes defined on the document.
    ///
    /// # Errors
    ///
    /// Returns query compilation errors, or [`Error::QueryType`] if the
    /// expression does not produce a node-set.
    pub fn xpath(self, expr: &str) -> Result<NodeSet> {
        Query::compile_with(expr, self.doc.namespaces())?.select(self.doc, self.id())
    }

    /// Evaluates an XPath expression at this node.
    ///
    /// # Errors
    ///
    /// Returns query compilation errors.
    pub fn eval(self, expr: &str) -> Result<XPathValue> {
        Query::compile_with(expr, self.doc.namespaces())?.evaluate(self.doc, self.id())
    }

    /// Selects the descendants of this node matching a CSS selector.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidQuerySyntax`] for malformed selectors.
    pub fn css(self, selector: &str) -> Result<NodeSet> {
        let expr = crate::css::to_xpath(selector)?;
        self.xpath(&expr)
    }
}

impl PartialEq for NodeRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.doc, other.doc) && self.ix == other.ix
    }
}

impl Eq for NodeRef<'_> {}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", &self.id())
            .field("kind", self.kind())
            .finish()
    }
}

/// Iterator over the children of a node.
#[derive(Clone)]
pub struct NodeChildren<'a> {
    doc: &'a Document,
    next: Option<Ix>,
}

impl<'a> Iterator for NodeChildren<'a> {
    type Item = NodeRef<'a>;

    fn next(&mut self) -> Option<NodeRef<'a>> {
        let ix = self.next?;
        self.next = self.doc.data(ix).next_sibling;
        Some(NodeRef::new(self.doc, ix))
    }
}

/// A handle to an attribute, valid while both its element is live and the
/// attribute has not been removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttrId {
    pub(crate) owner: NodeId,
    pub(crate) serial: u64,
}

impl AttrId {
    /// The element carrying the attribute.
    #[must_use]
    pub fn owner(&self) -> NodeId {
        self.owner
    }
}

/// An attribute borrowed from its element.
#[derive(Clone, Copy)]
pub struct AttrRef<'a> {
    owner: NodeRef<'a>,
    attr: &'a Attribute,
}

impl<'a> AttrRef<'a> {
    #[must_use]
    pub fn id(self) -> AttrId {
        AttrId {
            owner: self.owner.id(),
            serial: self.attr.serial,
        }
    }

    #[must_use]
    pub fn owner(self) -> NodeRef<'a> {
        self.owner
    }

    #[must_use]
    pub fn attribute(self) -> &'a Attribute {
        self.attr
    }

    #[must_use]
    pub fn name(self) -> Cow<'a, str> {
        self.attr.qualified_name()
    }

    #[must_use]
    pub fn local_name(self) -> &'a str {
        &self.attr.name
    }

    #[must_use]
    pub fn prefix(self) -> Option<&'a str> {
        self.attr.prefix.as_deref()
    }

    #[must_use]
    pub fn namespace(self) -> Option<&'a str> {
        self.attr.namespace.as_deref()
    }

    #[must_use]
    pub fn value(self) -> &'a str {
        &self.attr.value
    }
}

impl PartialEq for AttrRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.owner == other.owner && self.attr.serial == other.attr.serial
    }
}

impl fmt::Debug for AttrRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttrRef")
            .field("owner", &self.owner.id())
            .field("name", &self.name())
            .field("value", &self.value())
            .finish()
    }
}

// -------------------------------------------------------------------------
// Query entry points on the document
// -------------------------------------------------------------------------

impl Document {
    /// Selects nodes with an XPath expression evaluated at the document
    /// node.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidQuerySyntax`] or [`Error::UnknownFunction`]
    /// for malformed expressions, and [`Error::QueryType`] if the result is
    /// not a node-set.
    ///
    /// # Examples
    ///
    /// ```
    /// use xmlsift::Document;
    ///
    /// let doc = Document::parse_str(r#"<a><b id="1">x</b><b id="2">y</b></a>"#).unwrap();
    /// let hits = doc.xpath(r#"//b[@id="2"]"#).unwrap();
    /// assert_eq!(hits.len(), 1);
    /// assert_eq!(doc.resolve(&hits[0]).unwrap().text(), "y");
    /// ```
    pub fn xpath(&self, expr: &str) -> Result<NodeSet> {
        Query::compile_with(expr, self.namespaces())?.select(self, self.root())
    }

    /// Evaluates an XPath expression at the document node.
    ///
    /// # Errors
    ///
    /// As for [`xpath`](Self::xpath), except that any result type is
    /// accepted.
    pub fn eval(&self, expr: &str) -> Result<XPathValue> {
        Query::compile_with(expr, self.namespaces())?.evaluate(self, self.root())
    }

    /// Selects elements matching a CSS selector.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidQuerySyntax`] for malformed selectors.
    pub fn css(&self, selector: &str) -> Result<NodeSet> {
        let expr = crate::css::to_xpath(selector)?;
        self.xpath(&expr)
    }

    /// Dereferences an attribute handle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleReference`] if the element was detached or
    /// removed, or the attribute was removed.
    pub fn attribute(&self, id: AttrId) -> Result<AttrRef<'_>> {
        let owner = self.get(id.owner)?;
        owner
            .attributes()
            .iter()
            .find(|a| a.serial == id.serial)
            .map(|attr| AttrRef { owner, attr })
            .ok_or(Error::StaleReference { node: id.owner })
    }

    /// Dereferences a query result item.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleReference`] if the item no longer exists.
    pub fn resolve(&self, item: &Item) -> Result<ItemRef<'_>> {
        match *item {
            Item::Node(id) => self.get(id).map(ItemRef::Node),
            Item::Attribute(id) => self.attribute(id).map(ItemRef::Attribute),
        }
    }
}
