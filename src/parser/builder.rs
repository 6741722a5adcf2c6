//! Token stream to document tree.
//!
//! The [`TreeBuilder`] keeps an explicit stack of open elements. Start tags
//! attach a new element to the top of the stack and, unless self-closing,
//! push it; end tags pop it. Namespace prefixes are resolved against a
//! binding stack that mirrors the element stack.
//!
//! # Recovery
//!
//! Recovery is opt-in through [`ParseOptions::recover`]. Each action below
//! is logged with `warn!` and recorded as a [`ParseDiagnostic`]:
//!
//! | Condition | Action |
//! |---|---|
//! | mismatched end tag | close the open elements above a matching one, or ignore the end tag |
//! | text outside the root | drop it |
//! | second root element | stop parsing, keep the first root |
//! | unclosed elements at end of input | close them |
//! | unbound namespace prefix | keep the qualified name with no namespace |
//! | empty prefix declaration (`xmlns:p=""`) | drop the declaration |
//!
//! In HTML mode void elements never open. With recovery the builder also
//! applies the HTML optional tag rules: auto-closing (`<p>` closes an open
//! `<p>`), implied `html`, `head` and `body` elements, and ignored end tags
//! for void elements.
//!
//! Lexer errors and security limits are fatal in every mode.

use std::io::Read;

use tracing::{debug, warn};

use super::lexer::{Lexeme, Lexer, Token};
use super::namespace::{declared_prefix, split_name, NamespaceResolver, XMLNS_NAMESPACE};
use super::{ParseMode, ParseOptions};
use crate::error::{Error, ErrorSeverity, ParseDiagnostic, Result, SourceLocation};
use crate::html::{auto_closes, is_head_content_element, is_void_element};
use crate::tree::{Attribute, Document, Ix, NodeKind, NodeRef};

/// Builds a [`Document`] from a token stream.
pub(crate) struct TreeBuilder<'o> {
    options: &'o ParseOptions,
    doc: Document,
    /// Open elements and their names as written in the start tag.
    open: Vec<(Ix, String)>,
    namespaces: NamespaceResolver,
    seen_root: bool,
    /// Set when recovery decides to stop consuming input.
    halted: bool,
    /// A `head` element the builder created without a start tag.
    implied_head: Option<Ix>,
}

impl<'o> TreeBuilder<'o> {
    pub(crate) fn new(options: &'o ParseOptions) -> Self {
        Self {
            options,
            doc: Document::new(),
            open: Vec::new(),
            namespaces: NamespaceResolver::new(),
            seen_root: false,
            halted: false,
            implied_head: None,
        }
    }

    /// Consumes the lexer and returns the finished document.
    pub(crate) fn build<R: Read>(mut self, mut lexer: Lexer<R>) -> Result<Document> {
        debug!(
            mode = ?self.options.mode,
            recover = self.options.recover,
            encoding = lexer.encoding().name(),
            "parse started"
        );
        while !self.halted {
            let Some(lexeme) = lexer.next() else {
                break;
            };
            let Lexeme { token, location } = lexeme?;
            match token {
                Token::StartTag {
                    name,
                    attributes,
                    self_closing,
                } => self.start_tag(name, attributes, self_closing, location)?,
                Token::EndTag { name } => self.end_tag(&name, location)?,
                Token::Text(content) => self.text(content, location)?,
                Token::CData(content) => self.cdata(content, location)?,
                Token::Comment(content) => {
                    let parent = self.insertion_point();
                    self.append(parent, NodeKind::Comment { content }, location)?;
                }
                Token::ProcessingInstruction { target, data } => {
                    if target == "xml" {
                        self.xml_declaration(&data);
                    } else {
                        let parent = self.insertion_point();
                        self.append(parent, NodeKind::ProcessingInstruction { target, data }, location)?;
                    }
                }
            }
        }
        self.finish(lexer.location())?;

        let mut doc = self.doc;
        if doc.encoding.is_none() {
            doc.encoding = Some(lexer.encoding().name().to_string());
        }
        doc.reindex_ids();
        debug!(
            nodes = doc.node_count(),
            diagnostics = doc.diagnostics.len(),
            "parse finished"
        );
        Ok(doc)
    }

    fn html(&self) -> bool {
        self.options.mode == ParseMode::Html
    }

    fn html_recover(&self) -> bool {
        self.html() && self.options.recover
    }

    fn insertion_point(&self) -> Ix {
        self.open.last().map_or_else(|| self.doc.root_ix(), |&(ix, _)| ix)
    }

    fn recovered(&mut self, message: String, location: SourceLocation) {
        warn!(line = location.line, column = location.column, "{message}");
        self.doc.diagnostics.push(ParseDiagnostic {
            severity: ErrorSeverity::Error,
            message,
            location,
        });
    }

    fn append(&mut self, parent: Ix, kind: NodeKind, location: SourceLocation) -> Result<Ix> {
        let ix = self.doc.alloc(kind, location.line)?;
        self.doc.link_last(parent, ix);
        Ok(ix)
    }

    // ---------------------------------------------------------------------
    // Start tags
    // ---------------------------------------------------------------------

    fn start_tag(
        &mut self,
        name: String,
        attributes: Vec<(String, String)>,
        self_closing: bool,
        location: SourceLocation,
    ) -> Result<()> {
        if self.html_recover() && self.html_structure(&name, &attributes, location)? {
            return Ok(());
        }

        if self.open.is_empty() && self.seen_root {
            if self.options.recover {
                self.recovered(
                    format!("second root element <{name}>; ignoring the rest of the input"),
                    location,
                );
                self.halted = true;
                return Ok(());
            }
            return Err(Error::ContentOutsideRoot { location });
        }
        if self.open.len() >= self.options.max_depth as usize {
            return Err(Error::LimitExceeded {
                limit: "maximum nesting depth",
                location,
            });
        }

        let kind = if self.html() {
            self.html_element(&name, attributes)
        } else {
            self.namespaces.push_scope();
            self.xml_element(&name, attributes, location)?
        };

        let parent = self.insertion_point();
        let ix = self.append(parent, kind, location)?;
        self.seen_root = true;

        let is_void = self.html() && is_void_element(&name);
        if self_closing || is_void {
            if !self.html() {
                self.namespaces.pop_scope();
            }
        } else {
            self.open.push((ix, name));
        }
        Ok(())
    }

    fn html_element(&mut self, name: &str, attributes: Vec<(String, String)>) -> NodeKind {
        let serial_base = self.reserve_serials(attributes.len());
        NodeKind::Element {
            name: name.to_string(),
            prefix: None,
            namespace: None,
            attributes: attributes
                .into_iter()
                .zip(serial_base..)
                .map(|((n, v), serial)| Attribute::new(None, n, None, v, serial))
                .collect(),
        }
    }

    fn xml_element(
        &mut self,
        name: &str,
        mut raw: Vec<(String, String)>,
        location: SourceLocation,
    ) -> Result<NodeKind> {
        let empty_declaration =
            |(n, v): &(String, String)| v.is_empty() && matches!(declared_prefix(n), Some(Some(_)));
        let empty = raw
            .iter()
            .find(|a| empty_declaration(*a))
            .map(|(n, _)| n.clone());
        if let Some(attr_name) = empty {
            let message = format!("prefix declaration {attr_name} on <{name}> has an empty namespace");
            if !self.options.recover {
                return Err(Error::syntax(message, location));
            }
            self.recovered(format!("{message}; dropping it"), location);
            raw.retain(|a| !empty_declaration(a));
        }
        for (attr_name, value) in &raw {
            if let Some(prefix) = declared_prefix(attr_name) {
                self.namespaces.bind(prefix, value);
            }
        }

        let (prefix, local) = split_name(name);
        let (element_prefix, element_name, namespace) =
            match self.resolve(prefix, name, location)? {
                Some(uri) => (prefix, local, uri),
                None => (None, name, None),
            };

        let serial_base = self.reserve_serials(raw.len());
        let mut attributes: Vec<Attribute> = Vec::with_capacity(raw.len());
        for ((attr_name, value), serial) in raw.into_iter().zip(serial_base..) {
            let attribute = if declared_prefix(&attr_name).is_some() {
                let (p, l) = split_name(&attr_name);
                Attribute::new(
                    p.map(str::to_string),
                    l.to_string(),
                    Some(XMLNS_NAMESPACE.to_string()),
                    value,
                    serial,
                )
            } else if let (Some(p), l) = split_name(&attr_name) {
                let (p, l) = (p.to_string(), l.to_string());
                match self.resolve(Some(&p), &attr_name, location)? {
                    Some(uri) => Attribute::new(Some(p), l, uri, value, serial),
                    None => Attribute::new(None, attr_name, None, value, serial),
                }
            } else {
                Attribute::new(None, attr_name, None, value, serial)
            };
            let bound_twice = attribute.prefix.is_some()
                && attribute.namespace.is_some()
                && attributes.iter().any(|a| {
                    a.prefix.is_some()
                        && a.name == attribute.name
                        && a.namespace == attribute.namespace
                });
            if bound_twice {
                let message = format!(
                    "attribute {} is bound twice on <{name}>",
                    attribute.qualified_name()
                );
                if !self.options.recover {
                    return Err(Error::syntax(message, location));
                }
                self.recovered(format!("{message}; keeping the first"), location);
                continue;
            }
            attributes.push(attribute);
        }

        Ok(NodeKind::Element {
            name: element_name.to_string(),
            prefix: element_prefix.map(str::to_string),
            namespace,
            attributes,
        })
    }

    /// Resolves `prefix` for the name `qname`.
    ///
    /// `Ok(Some(uri))` is a successful resolution (the URI may be `None` for
    /// an unprefixed name outside any default namespace). `Ok(None)` means
    /// the prefix was unbound and recovery keeps the qualified name as is.
    fn resolve(
        &mut self,
        prefix: Option<&str>,
        qname: &str,
        location: SourceLocation,
    ) -> Result<Option<Option<String>>> {
        let uri = self.namespaces.resolve(prefix).map(str::to_string);
        match prefix {
            Some(p) if uri.is_none() => {
                if !self.options.recover {
                    return Err(Error::UnboundNamespacePrefix {
                        prefix: p.to_string(),
                        location: Some(location),
                    });
                }
                self.recovered(
                    format!("namespace prefix {p} of {qname} is not bound; keeping the name without a namespace"),
                    location,
                );
                Ok(None)
            }
            _ => Ok(Some(uri)),
        }
    }

    fn reserve_serials(&mut self, count: usize) -> u64 {
        let base = self.doc.next_attribute_serial();
        for _ in 1..count {
            self.doc.next_attribute_serial();
        }
        base
    }

    // ---------------------------------------------------------------------
    // HTML structure
    // ---------------------------------------------------------------------

    /// Applies the implied-element and auto-close rules. Returns `true` if
    /// the start tag was fully handled (merged into an existing `html`,
    /// `head` or `body`).
    fn html_structure(
        &mut self,
        name: &str,
        attributes: &[(String, String)],
        location: SourceLocation,
    ) -> Result<bool> {
        match name {
            "html" => {
                let html = self.ensure_html(location)?;
                self.merge_attributes(html, attributes);
                return Ok(true);
            }
            "head" => {
                let head = self.ensure_head(location)?;
                if self.implied_head == Some(head) {
                    self.implied_head = None;
                }
                self.merge_attributes(head, attributes);
                if !self.is_open(head) {
                    self.open.push((head, "head".to_string()));
                }
                return Ok(true);
            }
            "body" => {
                self.close_head_if_open();
                let body = self.ensure_body(location)?;
                self.merge_attributes(body, attributes);
                return Ok(true);
            }
            _ => {}
        }

        while self
            .open
            .last()
            .is_some_and(|(_, open_tag)| auto_closes(open_tag, name))
        {
            self.open.pop();
        }

        if is_head_content_element(name) && !self.in_body() {
            let head = self.ensure_head(location)?;
            if !self.is_open(head) {
                self.open.push((head, "head".to_string()));
            }
        } else {
            self.close_head_if_open();
            self.ensure_body(location)?;
        }
        Ok(false)
    }

    fn find_child(&self, parent: Ix, tag: &str) -> Option<Ix> {
        self.doc
            .children_ix(parent)
            .find(|&ix| matches!(&self.doc.data(ix).kind, NodeKind::Element { name, .. } if name == tag))
    }

    fn is_open(&self, ix: Ix) -> bool {
        self.open.iter().any(|&(open, _)| open == ix)
    }

    fn in_body(&self) -> bool {
        self.open.iter().any(|(_, t)| t == "body")
    }

    fn close_head_if_open(&mut self) {
        if self.open.last().is_some_and(|(_, t)| t == "head") {
            self.open.pop();
        }
    }

    fn ensure_html(&mut self, location: SourceLocation) -> Result<Ix> {
        let root = self.doc.root_ix();
        if let Some(html) = self.find_child(root, "html") {
            return Ok(html);
        }
        let html = self.append(root, empty_element("html"), location)?;
        self.seen_root = true;
        self.open.insert(0, (html, "html".to_string()));
        Ok(html)
    }

    fn ensure_head(&mut self, location: SourceLocation) -> Result<Ix> {
        let html = self.ensure_html(location)?;
        if let Some(head) = self.find_child(html, "head") {
            return Ok(head);
        }
        let head = self.doc.alloc(empty_element("head"), location.line)?;
        match self.find_child(html, "body") {
            Some(body) => self.doc.link_before(body, head),
            None => self.doc.link_last(html, head),
        }
        self.implied_head = Some(head);
        Ok(head)
    }

    fn ensure_body(&mut self, location: SourceLocation) -> Result<Ix> {
        let html = self.ensure_html(location)?;
        if let Some(body) = self.find_child(html, "body") {
            return Ok(body);
        }
        let body = self.append(html, empty_element("body"), location)?;
        self.open.push((body, "body".to_string()));
        Ok(body)
    }

    fn merge_attributes(&mut self, ix: Ix, attributes: &[(String, String)]) {
        let serial_base = self.reserve_serials(attributes.len());
        if let NodeKind::Element {
            attributes: existing,
            ..
        } = &mut self.doc.data_mut(ix).kind
        {
            for ((name, value), serial) in attributes.iter().zip(serial_base..) {
                if !existing.iter().any(|a| &a.name == name) {
                    existing.push(Attribute::new(None, name.clone(), None, value.clone(), serial));
                }
            }
        }
    }

    // ---------------------------------------------------------------------
    // End tags
    // ---------------------------------------------------------------------

    fn end_tag(&mut self, name: &str, location: SourceLocation) -> Result<()> {
        if self.html_recover() && is_void_element(name) {
            self.recovered(format!("end tag for void element </{name}> ignored"), location);
            return Ok(());
        }
        if self.html_recover() && matches!(name, "html" | "body") {
            // Content after </body> still belongs in the body.
            return Ok(());
        }

        if self.open.last().is_some_and(|(_, open)| open == name) {
            self.pop();
            return Ok(());
        }

        let Some(&(top, ref expected)) = self.open.last() else {
            if self.options.recover {
                self.recovered(format!("stray end tag </{name}> ignored"), location);
                return Ok(());
            }
            return Err(Error::syntax(
                format!("end tag </{name}> with no open element"),
                location,
            ));
        };

        if !self.options.recover {
            return Err(Error::MismatchedTag {
                expected: expected.clone(),
                found: name.to_string(),
                path: NodeRef::new(&self.doc, top).path(),
                location,
            });
        }

        match self.open.iter().rposition(|(_, open)| open == name) {
            Some(depth) => {
                while self.open.len() > depth + 1 {
                    if let Some((_, closed)) = self.open.last() {
                        let message = format!("implicitly closing <{closed}> before </{name}>");
                        self.recovered(message, location);
                    }
                    self.pop();
                }
                self.pop();
            }
            None => self.recovered(format!("stray end tag </{name}> ignored"), location),
        }
        Ok(())
    }

    fn pop(&mut self) {
        if self.open.pop().is_some() && !self.html() {
            self.namespaces.pop_scope();
        }
    }

    // ---------------------------------------------------------------------
    // Character data
    // ---------------------------------------------------------------------

    fn text(&mut self, content: String, location: SourceLocation) -> Result<()> {
        let blank = is_blank(&content);
        if self.open.is_empty() {
            if blank {
                return Ok(());
            }
            if self.html_recover() {
                self.ensure_body(location)?;
            } else if self.options.recover {
                self.recovered("text outside the root element dropped".to_string(), location);
                return Ok(());
            } else {
                return Err(Error::ContentOutsideRoot { location });
            }
        } else if self.html_recover()
            && !blank
            && self.open.last().is_some_and(|(_, t)| t == "head" || t == "html")
        {
            self.close_head_if_open();
            self.ensure_body(location)?;
        }
        if blank && self.options.no_blanks {
            return Ok(());
        }

        let parent = self.insertion_point();
        if let Some(last) = self.doc.data(parent).last_child {
            if let NodeKind::Text { content: existing } = &mut self.doc.data_mut(last).kind {
                existing.push_str(&content);
                return Ok(());
            }
        }
        self.append(parent, NodeKind::Text { content }, location)?;
        Ok(())
    }

    fn cdata(&mut self, content: String, location: SourceLocation) -> Result<()> {
        if self.open.is_empty() {
            if self.options.recover {
                self.recovered("CDATA section outside the root element dropped".to_string(), location);
                return Ok(());
            }
            return Err(Error::ContentOutsideRoot { location });
        }
        let parent = self.insertion_point();
        self.append(parent, NodeKind::CData { content }, location)?;
        Ok(())
    }

    fn xml_declaration(&mut self, data: &str) {
        self.doc.version = pseudo_attribute(data, "version").map(str::to_string);
        self.doc.encoding = pseudo_attribute(data, "encoding").map(str::to_string);
        self.doc.standalone = pseudo_attribute(data, "standalone").map(|v| v == "yes");
    }

    // ---------------------------------------------------------------------
    // End of input
    // ---------------------------------------------------------------------

    fn finish(&mut self, location: SourceLocation) -> Result<()> {
        if let Some(&(top, ref name)) = self.open.last() {
            if !self.options.recover {
                return Err(Error::UnclosedElement {
                    name: name.clone(),
                    path: NodeRef::new(&self.doc, top).path(),
                    location,
                });
            }
        }
        let html = self.html();
        let unclosed: Vec<String> = self
            .open
            .drain(..)
            .rev()
            .map(|(_, name)| name)
            .filter(|name| !(html && matches!(name.as_str(), "html" | "head" | "body")))
            .collect();
        for name in unclosed {
            self.recovered(format!("unclosed element <{name}> closed at end of input"), location);
        }

        if let Some(head) = self.implied_head {
            if self.doc.data(head).first_child.is_none() {
                self.doc.unlink(head);
                self.doc.free_subtree(head);
            }
        }

        if self.doc.root_element().is_none() {
            return Err(Error::EmptyDocument);
        }
        Ok(())
    }
}

fn empty_element(name: &str) -> NodeKind {
    NodeKind::Element {
        name: name.to_string(),
        prefix: None,
        namespace: None,
        attributes: Vec::new(),
    }
}

fn is_blank(s: &str) -> bool {
    s.bytes().all(|b| matches!(b, b' ' | b'\t' | b'\n' | b'\r'))
}

/// Extracts a pseudo-attribute (`name="value"`) from XML declaration data.
fn pseudo_attribute<'a>(data: &'a str, name: &str) -> Option<&'a str> {
    let mut rest = data;
    while let Some(pos) = rest.find(name) {
        let after = rest[pos + name.len()..].trim_start();
        let preceded_ok = rest[..pos]
            .chars()
            .next_back()
            .map_or(true, char::is_whitespace);
        if let (true, Some(after_eq)) = (preceded_ok, after.strip_prefix('=')) {
            let after_eq = after_eq.trim_start();
            let quote = after_eq.chars().next()?;
            if quote == '"' || quote == '\'' {
                let value = &after_eq[1..];
                return value.find(quote).map(|end| &value[..end]);
            }
        }
        rest = &rest[pos + name.len()..];
    }
    None
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::parser::{parse_str, parse_str_with_options};
    use pretty_assertions::assert_eq;

    fn recover() -> ParseOptions {
        ParseOptions::default().recover(true)
    }

    fn names(doc: &Document) -> Vec<String> {
        doc.get(doc.root())
            .unwrap()
            .descendants()
            .filter_map(|n| n.name().map(std::borrow::Cow::into_owned))
            .collect()
    }

    #[test]
    fn test_builds_nested_tree() {
        let doc = parse_str("<a><b>x</b><c/></a>").unwrap();
        assert_eq!(names(&doc), ["a", "b", "c"]);
        assert_eq!(doc.root_element().unwrap().text(), "x");
    }

    #[test]
    fn test_xml_declaration_fields() {
        let doc = parse_str("<?xml version='1.0' encoding=\"UTF-8\" standalone='yes'?><a/>").unwrap();
        assert_eq!(doc.version.as_deref(), Some("1.0"));
        assert_eq!(doc.encoding.as_deref(), Some("UTF-8"));
        assert_eq!(doc.standalone, Some(true));
    }

    #[test]
    fn test_pseudo_attribute_requires_word_boundary() {
        assert_eq!(pseudo_attribute("xversion='2' version='1'", "version"), Some("1"));
        assert_eq!(pseudo_attribute("version = \"1.1\"", "version"), Some("1.1"));
        assert_eq!(pseudo_attribute("version='1.0'", "encoding"), None);
    }

    #[test]
    fn test_mismatched_tag_reports_expected_and_found() {
        let err = parse_str("<a></c>").unwrap_err();
        match err {
            Error::MismatchedTag {
                expected,
                found,
                path,
                ..
            } => {
                assert_eq!(expected, "a");
                assert_eq!(found, "c");
                assert_eq!(path, "/a");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_unclosed_element() {
        let err = parse_str("<a><b>").unwrap_err();
        assert!(matches!(err, Error::UnclosedElement { ref name, .. } if name == "b"));
    }

    #[test]
    fn test_content_outside_root() {
        assert!(matches!(
            parse_str("<a/>text").unwrap_err(),
            Error::ContentOutsideRoot { .. }
        ));
        assert!(matches!(
            parse_str("<a/><b/>").unwrap_err(),
            Error::ContentOutsideRoot { .. }
        ));
        // Whitespace, comments and PIs are fine.
        let doc = parse_str("<!-- c -->\n<?pi x?>\n<a/>\n<!-- d -->\n").unwrap();
        assert_eq!(doc.get(doc.root()).unwrap().children().count(), 4);
    }

    #[test]
    fn test_stray_end_tag_is_syntax_error() {
        assert!(matches!(parse_str("</a>").unwrap_err(), Error::Syntax { .. }));
    }

    #[test]
    fn test_empty_document() {
        assert!(matches!(parse_str("").unwrap_err(), Error::EmptyDocument));
        assert!(matches!(parse_str("  <!-- x -->  ").unwrap_err(), Error::EmptyDocument));
    }

    #[test]
    fn test_namespaces_are_resolved() {
        let doc = parse_str(r#"<r xmlns="urn:d" xmlns:x="urn:x"><x:a x:k="1" k="2"><b/></x:a></r>"#).unwrap();
        let r = doc.root_element().unwrap();
        assert_eq!(r.namespace(), Some("urn:d"));
        let a = r.children().next().unwrap();
        assert_eq!(a.namespace(), Some("urn:x"));
        assert_eq!(a.attr_ns("k", Some("urn:x")), Some("1"));
        assert_eq!(a.attr_ns("k", None), Some("2"));
        let b = a.children().next().unwrap();
        assert_eq!(b.namespace(), Some("urn:d"));
    }

    #[test]
    fn test_unbound_prefix_is_error() {
        let err = parse_str("<x:a/>").unwrap_err();
        assert!(matches!(err, Error::UnboundNamespacePrefix { ref prefix, location: Some(_) } if prefix == "x"));
        assert!(parse_str(r#"<a y:k="v"/>"#).is_err());
    }

    #[test]
    fn test_namespace_scope_ends_with_element() {
        let err = parse_str(r#"<r><a xmlns:p="urn:p"/><p:b/></r>"#).unwrap_err();
        assert!(matches!(err, Error::UnboundNamespacePrefix { .. }));
    }

    #[test]
    fn test_same_attribute_through_two_prefixes() {
        let input = r#"<a xmlns:p="urn:x" xmlns:q="urn:x" p:k="1" q:k="2"/>"#;
        assert!(matches!(parse_str(input).unwrap_err(), Error::Syntax { .. }));
    }

    #[test]
    fn test_xml_prefix_is_prebound() {
        let doc = parse_str(r#"<a xml:lang="en"/>"#).unwrap();
        assert_eq!(
            doc.root_element().unwrap().attr_ns("lang", Some(crate::parser::XML_NAMESPACE)),
            Some("en")
        );
    }

    #[test]
    fn test_no_blanks() {
        let opts = ParseOptions::default().no_blanks(true);
        let doc = parse_str_with_options("<a>\n  <b> x </b>\n</a>", &opts).unwrap();
        let a = doc.root_element().unwrap();
        assert_eq!(a.children().count(), 1);
        assert_eq!(a.text(), " x ");
    }

    #[test]
    fn test_depth_limit() {
        let opts = ParseOptions::default().max_depth(3);
        assert!(parse_str_with_options("<a><b><c/></b></a>", &opts).is_ok());
        let err = parse_str_with_options("<a><b><c><d/></c></b></a>", &opts).unwrap_err();
        assert!(matches!(err, Error::LimitExceeded { .. }));
        // Limits hold in recovery mode too.
        let err = parse_str_with_options("<a><b><c><d/></c></b></a>", &opts.recover(true)).unwrap_err();
        assert!(matches!(err, Error::LimitExceeded { .. }));
    }

    #[test]
    fn test_recover_mismatched_closes_intervening() {
        let doc = parse_str_with_options("<a><b><c></b><d/></a>", &recover()).unwrap();
        assert_eq!(doc.root_element().unwrap().raw_xml(), "<a><b><c/></b><d/></a>");
        assert_eq!(doc.diagnostics.len(), 1);
        assert!(doc.diagnostics[0].message.contains("implicitly closing <c>"));
    }

    #[test]
    fn test_recover_ignores_stray_end_tag() {
        let doc = parse_str_with_options("<a><b></x></b></a>", &recover()).unwrap();
        assert_eq!(doc.root_element().unwrap().raw_xml(), "<a><b/></a>");
        assert!(doc.diagnostics[0].message.contains("stray end tag </x>"));
    }

    #[test]
    fn test_recover_closes_unclosed_at_eof() {
        let doc = parse_str_with_options("<a><b>text", &recover()).unwrap();
        assert_eq!(doc.root_element().unwrap().raw_xml(), "<a><b>text</b></a>");
        assert_eq!(doc.diagnostics.len(), 2);
    }

    #[test]
    fn test_recover_second_root_stops() {
        let doc = parse_str_with_options("<a/>junk<b/><c/>", &recover()).unwrap();
        assert_eq!(names(&doc), ["a"]);
        assert_eq!(doc.diagnostics.len(), 2);
    }

    #[test]
    fn test_recover_unbound_prefix_keeps_name() {
        let doc = parse_str_with_options("<x:a/>", &recover()).unwrap();
        let a = doc.root_element().unwrap();
        assert_eq!(a.name().unwrap(), "x:a");
        assert_eq!(a.namespace(), None);
    }

    #[test]
    fn test_adjacent_text_is_merged() {
        let doc = parse_str("<a>x&amp;y<![CDATA[z]]>w</a>").unwrap();
        let a = doc.root_element().unwrap();
        assert_eq!(a.children().count(), 3);
        assert_eq!(a.children().next().unwrap().text(), "x&y");
    }

    #[test]
    fn test_html_implied_structure() {
        let doc = parse_str_with_options("<title>T</title><p>one<p>two", &ParseOptions::html()).unwrap();
        assert_eq!(names(&doc), ["html", "head", "title", "body", "p", "p"]);
    }

    #[test]
    fn test_html_void_and_auto_close() {
        let doc = parse_str_with_options("<ul><li>a<br>b<li>c</ul></br>", &ParseOptions::html()).unwrap();
        let ul = doc.css("ul").unwrap();
        let ul = doc.get(ul.node_ids().next().unwrap()).unwrap();
        assert_eq!(ul.raw_xml(), "<ul><li>a<br/>b</li><li>c</li></ul>");
    }

    #[test]
    fn test_void_end_tags_need_recovery() {
        let strict_html = ParseOptions::html().recover(false);
        let doc = parse_str_with_options("<p>a<br>b</p>", &strict_html).unwrap();
        assert!(doc.diagnostics.is_empty());
        assert_eq!(doc.root_element().unwrap().raw_xml(), "<p>a<br/>b</p>");
        assert!(matches!(
            parse_str_with_options("<p>a<br></br>b</p>", &strict_html),
            Err(Error::MismatchedTag { .. })
        ));

        let doc = parse_str_with_options("<p>a<br></br>b</p>", &ParseOptions::html()).unwrap();
        assert_eq!(doc.diagnostics.len(), 1);
        assert!(doc.diagnostics[0].message.contains("</br>"));
    }

    #[test]
    fn test_empty_prefix_declaration() {
        let err = parse_str("<a xmlns:p=''/>").unwrap_err();
        assert!(matches!(err, Error::Syntax { .. }), "{err}");
        // Undeclaring the default namespace is allowed.
        let doc = parse_str("<a xmlns='urn:d'><b xmlns=''/></a>").unwrap();
        let b = doc.root_element().unwrap().element_children().next().unwrap();
        assert_eq!(b.namespace(), None);

        let doc = parse_str_with_options(
            "<a xmlns:p='' k='1'/>",
            &ParseOptions::default().recover(true),
        )
        .unwrap();
        assert_eq!(doc.diagnostics.len(), 1);
        let a = doc.root_element().unwrap();
        assert_eq!(a.attr("xmlns:p"), None);
        assert_eq!(a.attr("k"), Some("1"));
    }

    #[test]
    fn test_html_empty_implied_head_removed() {
        let doc = parse_str_with_options("<p>x</p>", &ParseOptions::html()).unwrap();
        assert_eq!(names(&doc), ["html", "body", "p"]);
    }

    #[test]
    fn test_html_explicit_structure_merges_attributes() {
        let doc = parse_str_with_options(
            "<html lang=en><head></head><body class=main><p>hi</p></body></html>",
            &ParseOptions::html(),
        )
        .unwrap();
        assert_eq!(names(&doc), ["html", "head", "body", "p"]);
        let html = doc.root_element().unwrap();
        assert_eq!(html.attr("lang"), Some("en"));
    }

    #[test]
    fn test_html_content_after_body_stays_in_body() {
        let doc = parse_str_with_options("<body><p>a</p></body></html><p>b</p>", &ParseOptions::html()).unwrap();
        assert_eq!(doc.css("body > p").unwrap().len(), 2);
    }

    #[test]
    fn test_line_numbers_recorded() {
        let doc = parse_str("<a>\n<b/>\n\n<c/></a>").unwrap();
        let a = doc.root_element().unwrap();
        let lines: Vec<_> = a.element_children().map(|n| n.line_number()).collect();
        assert_eq!(lines, [Some(2), Some(4)]);
    }
}
