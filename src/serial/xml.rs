//! Markup serializer.
//!
//! Serializes a `Document` tree, or any subtree of it, into well-formed XML
//! (or HTML) text. Output is produced lazily by [`Fragments`], an iterator
//! that walks the tree with an explicit stack and yields borrowed slices
//! wherever the source text needs no escaping.

use std::borrow::Cow;
use std::collections::VecDeque;

use crate::error::Result;
use crate::html::{is_raw_text_element, is_void_element};
use crate::parser::XML_NAMESPACE;
use crate::tree::{Document, Ix, NodeId, NodeKind, NodeRef};

/// Options controlling serialization output.
///
/// # Examples
///
/// ```
/// use xmlsift::Document;
/// use xmlsift::serial::{serialize_with_options, SerializeOptions};
///
/// let doc = Document::parse_str("<root><child>Hello</child></root>").unwrap();
/// let xml = serialize_with_options(&doc, &SerializeOptions::default().indent(true));
/// assert!(xml.contains("  <child>"));
/// ```
#[derive(Debug, Clone)]
pub struct SerializeOptions {
    /// Whether to produce indented (pretty-printed) output.
    /// Defaults to `false`.
    pub indent: bool,
    /// The indentation string used for each level when `indent` is `true`.
    /// Defaults to two spaces.
    pub indent_str: String,
    /// Whether to start a whole-document serialization with an XML
    /// declaration. Defaults to `false`. Ignored for HTML output.
    pub xml_declaration: bool,
    /// Whether to write HTML syntax: void elements without a slash, empty
    /// elements with an end tag, unescaped `script` and `style` content.
    pub html: bool,
    /// Output encoding label for byte output. `None` means the document's
    /// declared encoding, or UTF-8 when it has none.
    pub encoding: Option<String>,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            indent: false,
            indent_str: "  ".to_string(),
            xml_declaration: false,
            html: false,
            encoding: None,
        }
    }
}

impl SerializeOptions {
    /// Enables or disables indented (pretty-printed) output.
    ///
    /// When enabled, the children of an element whose content is only
    /// elements, comments and processing instructions (plus whitespace) are
    /// placed on their own lines. Mixed-content elements are written as they
    /// are, so indentation never changes a text node.
    #[must_use]
    pub fn indent(mut self, indent: bool) -> Self {
        self.indent = indent;
        self
    }

    /// Sets the indentation string used for each nesting level.
    #[must_use]
    pub fn indent_str(mut self, s: &str) -> Self {
        self.indent_str = s.to_string();
        self
    }

    #[must_use]
    pub fn xml_declaration(mut self, on: bool) -> Self {
        self.xml_declaration = on;
        self
    }

    #[must_use]
    pub fn html(mut self, on: bool) -> Self {
        self.html = on;
        self
    }

    /// Sets the output encoding label used by byte output.
    #[must_use]
    pub fn encoding(mut self, label: &str) -> Self {
        self.encoding = Some(label.to_string());
        self
    }
}

/// Serializes a document to a string with default options.
///
/// # Examples
///
/// ```
/// use xmlsift::Document;
/// use xmlsift::serial::serialize;
///
/// let doc = Document::parse_str("<root><child>Hello</child></root>").unwrap();
/// assert_eq!(serialize(&doc), "<root><child>Hello</child></root>");
/// ```
#[must_use]
pub fn serialize(doc: &Document) -> String {
    serialize_with_options(doc, &SerializeOptions::default())
}

/// Serializes a document to a string with the given options.
#[must_use]
pub fn serialize_with_options(doc: &Document, options: &SerializeOptions) -> String {
    Fragments::new(doc, doc.root_ix(), options).collect()
}

/// Serializes the subtree rooted at `node`.
///
/// # Errors
///
/// Returns [`Error::StaleReference`](crate::Error::StaleReference) if
/// `node` does not name a live node of `doc`.
pub fn serialize_node(doc: &Document, node: NodeId) -> Result<String> {
    Ok(fragments(doc, node, &SerializeOptions::default())?.collect())
}

/// Returns the lazy fragment sequence for the subtree rooted at `node`.
///
/// Namespace declarations that the subtree relies on but that are made by
/// ancestors outside it are written on the elements that first need them,
/// so every fragment sequence is well-formed on its own.
///
/// # Errors
///
/// Returns [`Error::StaleReference`](crate::Error::StaleReference) if
/// `node` does not name a live node of `doc`.
///
/// # Examples
///
/// ```
/// use xmlsift::Document;
/// use xmlsift::serial::{fragments, SerializeOptions};
///
/// let doc = Document::parse_str(r#"<a xmlns:p="urn:p"><p:b>x</p:b></a>"#).unwrap();
/// let b = doc.xpath("//*[local-name() = 'b']").unwrap().node_ids().next().unwrap();
/// let parts: Vec<_> = fragments(&doc, b, &SerializeOptions::default()).unwrap().collect();
/// assert_eq!(parts.concat(), r#"<p:b xmlns:p="urn:p">x</p:b>"#);
/// ```
pub fn fragments<'a>(
    doc: &'a Document,
    node: NodeId,
    options: &SerializeOptions,
) -> Result<Fragments<'a>> {
    let ix = doc.check(node)?;
    Ok(Fragments::new(doc, ix, options))
}

pub(crate) fn write_node(node: NodeRef<'_>, options: &SerializeOptions) -> String {
    Fragments::new(node.document(), node.ix(), options).collect()
}

// ---------------------------------------------------------------------------
// Fragments
// ---------------------------------------------------------------------------

enum Task {
    /// Write a node. `block` is set when the parent lays its children out on
    /// separate lines.
    Node { ix: Ix, depth: usize, block: bool },
    /// Write an end tag and drop the bindings the element introduced.
    Close {
        name: String,
        depth: usize,
        block: bool,
        children_block: bool,
        mark: usize,
    },
    Newline,
}

/// A lazy sequence of serialized text fragments.
///
/// Created by [`fragments`]. Concatenating the fragments gives the
/// serialized markup. The document is only read.
pub struct Fragments<'a> {
    doc: &'a Document,
    indent: Option<String>,
    html: bool,
    tasks: Vec<Task>,
    ready: VecDeque<Cow<'a, str>>,
    /// In-scope namespace bindings, innermost last. An empty URI undeclares.
    bindings: Vec<(Option<Cow<'a, str>>, &'a str)>,
}

impl<'a> Fragments<'a> {
    fn new(doc: &'a Document, ix: Ix, options: &SerializeOptions) -> Self {
        let mut fragments = Self {
            doc,
            indent: options.indent.then(|| options.indent_str.clone()),
            html: options.html,
            tasks: Vec::new(),
            ready: VecDeque::new(),
            bindings: Vec::new(),
        };
        if matches!(doc.data(ix).kind, NodeKind::Document) {
            if options.xml_declaration && !options.html {
                fragments.ready.push_back(Cow::Owned(declaration(doc, options)));
                fragments.ready.push_back(Cow::Borrowed("\n"));
            }
            let block = fragments.indent.is_some();
            let children: Vec<Ix> = doc.children_ix(ix).collect();
            for (i, &child) in children.iter().enumerate().rev() {
                fragments.tasks.push(Task::Node {
                    ix: child,
                    depth: 0,
                    block,
                });
                if i > 0 && !block {
                    fragments.tasks.push(Task::Newline);
                }
            }
        } else {
            fragments.tasks.push(Task::Node {
                ix,
                depth: 0,
                block: false,
            });
        }
        fragments
    }

    fn push_indent(&mut self, depth: usize) {
        if let Some(unit) = &self.indent {
            if depth > 0 {
                self.ready.push_back(Cow::Owned(unit.repeat(depth)));
            }
        }
    }

    fn run(&mut self, task: Task) {
        match task {
            Task::Newline => self.ready.push_back(Cow::Borrowed("\n")),
            Task::Node { ix, depth, block } => {
                if block {
                    self.push_indent(depth);
                }
                if matches!(self.doc.data(ix).kind, NodeKind::Element { .. }) {
                    self.open_element(ix, depth, block);
                    return;
                }
                self.write_leaf(ix);
                if block {
                    self.ready.push_back(Cow::Borrowed("\n"));
                }
            }
            Task::Close {
                name,
                depth,
                block,
                children_block,
                mark,
            } => {
                if children_block {
                    self.push_indent(depth);
                }
                self.ready.push_back(Cow::Owned(format!("</{name}>")));
                if block {
                    self.ready.push_back(Cow::Borrowed("\n"));
                }
                self.bindings.truncate(mark);
            }
        }
    }

    fn open_element(&mut self, ix: Ix, depth: usize, block: bool) {
        let doc = self.doc;
        let NodeKind::Element {
            name,
            prefix,
            namespace,
            attributes,
        } = &doc.data(ix).kind
        else {
            return;
        };
        let mark = self.bindings.len();

        // The element's own declarations bind first, with the values it holds.
        let mut declared: Vec<Option<&'a str>> = Vec::new();
        for attr in attributes.iter().filter(|a| a.is_namespace_declaration()) {
            let declares = attr.prefix.is_some().then_some(attr.name.as_str());
            self.bindings.push((declares.map(Cow::Borrowed), attr.value.as_str()));
            declared.push(declares);
        }

        // Then the element's own name, then each prefixed attribute. A
        // prefix already bound to another URI on this element is replaced.
        let mut extra: Vec<(Option<Cow<'a, str>>, &'a str)> = Vec::new();
        let element_prefix = self.reconcile(
            prefix.as_deref(),
            namespace.as_deref().unwrap_or(""),
            &mut declared,
            &mut extra,
        );
        let mut attr_prefixes: Vec<Option<Cow<'a, str>>> = Vec::with_capacity(attributes.len());
        for attr in attributes {
            let written = match (attr.prefix.as_deref(), attr.namespace.as_deref()) {
                (Some(p), Some(uri)) if !attr.is_namespace_declaration() => {
                    self.reconcile(Some(p), uri, &mut declared, &mut extra)
                }
                (p, _) => p.map(Cow::Borrowed),
            };
            attr_prefixes.push(written);
        }

        let qualified = match &element_prefix {
            Some(p) => format!("{p}:{name}"),
            None => name.clone(),
        };
        let mut tag = String::with_capacity(qualified.len() + 2);
        tag.push('<');
        tag.push_str(&qualified);
        for (attr, written) in attributes.iter().zip(&attr_prefixes) {
            tag.push(' ');
            if let Some(p) = written {
                tag.push_str(p);
                tag.push(':');
            }
            tag.push_str(&attr.name);
            tag.push_str("=\"");
            tag.push_str(&escape_attribute(&attr.value));
            tag.push('"');
        }
        for (p, uri) in extra {
            tag.push_str(" xmlns");
            if let Some(p) = &p {
                tag.push(':');
                tag.push_str(p);
            }
            tag.push_str("=\"");
            tag.push_str(&escape_attribute(uri));
            tag.push('"');
        }

        let children_block = self.indent.is_some() && self.is_element_only(ix);
        let children: Vec<Ix> = doc
            .children_ix(ix)
            .filter(|&c| !(children_block && self.is_blank_text(c)))
            .collect();

        if children.is_empty() {
            if !self.html {
                tag.push_str("/>");
            } else if is_void_element(&name.to_ascii_lowercase()) {
                tag.push('>');
            } else {
                tag.push_str("></");
                tag.push_str(&qualified);
                tag.push('>');
            }
            self.ready.push_back(Cow::Owned(tag));
            if block {
                self.ready.push_back(Cow::Borrowed("\n"));
            }
            self.bindings.truncate(mark);
            return;
        }

        tag.push('>');
        self.ready.push_back(Cow::Owned(tag));
        if children_block {
            self.ready.push_back(Cow::Borrowed("\n"));
        }
        self.tasks.push(Task::Close {
            name: qualified,
            depth,
            block,
            children_block,
            mark,
        });
        for child in children.into_iter().rev() {
            self.tasks.push(Task::Node {
                ix: child,
                depth: depth + 1,
                block: children_block,
            });
        }
    }

    fn write_leaf(&mut self, ix: Ix) {
        let fragment = match &self.doc.data(ix).kind {
            NodeKind::Text { content } => {
                if self.html && self.in_raw_text_element(ix) {
                    Cow::Borrowed(content.as_str())
                } else {
                    escape_text(content)
                }
            }
            NodeKind::CData { content } => {
                Cow::Owned(format!("<![CDATA[{}]]>", content.replace("]]>", "]]]]><![CDATA[>")))
            }
            NodeKind::Comment { content } => Cow::Owned(format!("<!--{}-->", sanitize_comment(content))),
            NodeKind::ProcessingInstruction { target, data } => {
                let close = if self.html { ">" } else { "?>" };
                if data.is_empty() {
                    Cow::Owned(format!("<?{target}{close}"))
                } else {
                    Cow::Owned(format!("<?{target} {}{close}", data.replace("?>", "? >")))
                }
            }
            NodeKind::Document | NodeKind::Element { .. } => return,
        };
        self.ready.push_back(fragment);
    }

    /// The URI bound to `prefix` in the output so far; `""` when unbound.
    fn resolve(&self, prefix: Option<&str>) -> &'a str {
        if prefix == Some("xml") {
            return XML_NAMESPACE;
        }
        self.bindings
            .iter()
            .rev()
            .find(|(p, _)| p.as_deref() == prefix)
            .map_or("", |(_, uri)| *uri)
    }

    /// Picks the prefix under which a name in `uri` is written, declaring
    /// it in `extra` when the output does not bind it yet. The original
    /// prefix is kept unless this element already binds it to another URI;
    /// then an in-scope prefix for `uri` is reused or a fresh `nsN` made.
    fn reconcile(
        &mut self,
        prefix: Option<&'a str>,
        uri: &'a str,
        declared: &mut Vec<Option<&'a str>>,
        extra: &mut Vec<(Option<Cow<'a, str>>, &'a str)>,
    ) -> Option<Cow<'a, str>> {
        if prefix == Some("xml") || self.resolve(prefix) == uri {
            return prefix.map(Cow::Borrowed);
        }
        let taken = declared.contains(&prefix)
            || extra.iter().any(|(p, _)| p.as_deref() == prefix);
        if !taken {
            self.bindings.push((prefix.map(Cow::Borrowed), uri));
            extra.push((prefix.map(Cow::Borrowed), uri));
            return prefix.map(Cow::Borrowed);
        }
        if prefix.is_none() && uri.is_empty() {
            // No prefix can name "no namespace".
            return None;
        }
        if let Some(existing) = self.in_scope_prefix(uri) {
            return Some(existing);
        }
        let fresh = (1..)
            .map(|n| format!("ns{n}"))
            .find(|candidate| {
                self.resolve(Some(candidate.as_str())).is_empty()
                    && !declared.iter().any(|d| *d == Some(candidate.as_str()))
            })
            .unwrap_or_default();
        self.bindings.push((Some(Cow::Owned(fresh.clone())), uri));
        extra.push((Some(Cow::Owned(fresh.clone())), uri));
        Some(Cow::Owned(fresh))
    }

    /// A prefix currently bound to `uri` in the output, if any.
    fn in_scope_prefix(&self, uri: &str) -> Option<Cow<'a, str>> {
        if uri.is_empty() {
            return None;
        }
        self.bindings
            .iter()
            .rev()
            .filter_map(|(p, _)| p.as_ref())
            .find(|&p| self.resolve(Some(&**p)) == uri)
            .cloned()
    }

    fn is_blank_text(&self, ix: Ix) -> bool {
        matches!(&self.doc.data(ix).kind, NodeKind::Text { content } if is_blank(content))
    }

    /// `true` if the element has element children and otherwise only
    /// whitespace text, comments and processing instructions.
    fn is_element_only(&self, ix: Ix) -> bool {
        if self.html && self.is_raw_text(ix) {
            return false;
        }
        let mut has_element = false;
        for child in self.doc.children_ix(ix) {
            match &self.doc.data(child).kind {
                NodeKind::Element { .. } => has_element = true,
                NodeKind::Text { content } if is_blank(content) => {}
                NodeKind::Text { .. } | NodeKind::CData { .. } => return false,
                _ => {}
            }
        }
        has_element
    }

    fn is_raw_text(&self, ix: Ix) -> bool {
        match &self.doc.data(ix).kind {
            NodeKind::Element { name, .. } => is_raw_text_element(&name.to_ascii_lowercase()),
            _ => false,
        }
    }

    fn in_raw_text_element(&self, ix: Ix) -> bool {
        self.doc
            .data(ix)
            .parent
            .is_some_and(|parent| self.is_raw_text(parent))
    }
}

impl<'a> Iterator for Fragments<'a> {
    type Item = Cow<'a, str>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(fragment) = self.ready.pop_front() {
                return Some(fragment);
            }
            let task = self.tasks.pop()?;
            self.run(task);
        }
    }
}

// ---------------------------------------------------------------------------
// Escaping
// ---------------------------------------------------------------------------

fn declaration(doc: &Document, options: &SerializeOptions) -> String {
    let mut out = format!(
        "<?xml version=\"{}\"",
        doc.version.as_deref().unwrap_or("1.0")
    );
    if let Some(encoding) = options.encoding.as_deref().or(doc.encoding.as_deref()) {
        out.push_str(" encoding=\"");
        out.push_str(encoding);
        out.push('"');
    }
    if let Some(standalone) = doc.standalone {
        out.push_str(if standalone {
            " standalone=\"yes\""
        } else {
            " standalone=\"no\""
        });
    }
    out.push_str("?>");
    out
}

fn is_blank(s: &str) -> bool {
    s.bytes().all(|b| matches!(b, b' ' | b'\t' | b'\n' | b'\r'))
}

/// Escapes character data: `&`, `<` and `>` become entity references and
/// `\r` becomes `&#13;` so it survives end-of-line normalization.
pub(crate) fn escape_text(text: &str) -> Cow<'_, str> {
    let bytes = text.as_bytes();
    if memchr::memchr3(b'&', b'<', b'>', bytes).is_none() && memchr::memchr(b'\r', bytes).is_none()
    {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 16);
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#13;"),
            _ => out.push(ch),
        }
    }
    Cow::Owned(out)
}

/// Escapes an attribute value for a double-quoted attribute. Whitespace
/// other than the space is written as character references so attribute
/// value normalization on re-parse leaves it intact.
pub(crate) fn escape_attribute(value: &str) -> Cow<'_, str> {
    let needs_escape = value
        .bytes()
        .any(|b| matches!(b, b'&' | b'<' | b'>' | b'"' | b'\'' | b'\t' | b'\n' | b'\r'));
    if !needs_escape {
        return Cow::Borrowed(value);
    }
    let mut out = String::with_capacity(value.len() + 16);
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' => out.push_str("&#9;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            _ => out.push(ch),
        }
    }
    Cow::Owned(out)
}

/// Comments may not contain `--` or end with `-`.
fn sanitize_comment(content: &str) -> Cow<'_, str> {
    if !content.contains("--") && !content.ends_with('-') {
        return Cow::Borrowed(content);
    }
    let mut out = content.replace("--", "- -");
    while out.contains("--") {
        out = out.replace("--", "- -");
    }
    if out.ends_with('-') {
        out.push(' ');
    }
    Cow::Owned(out)
}
