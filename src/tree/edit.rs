//! Node construction and checked tree edits.
//!
//! Every edit validates its arguments before touching the arena, so a call
//! that returns an error leaves the document exactly as it was.

use super::{is_id_attribute, Attribute, Document, Ix, NodeId, NodeKind, NodeRef};
use crate::error::{Error, Result};
use crate::parser::namespace::{declared_prefix, is_qname, split_name, XMLNS_NAMESPACE};

impl Document {
    // ---------------------------------------------------------------------
    // Construction
    // ---------------------------------------------------------------------

    /// Creates an orphan element with no namespace.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidName`] if `name` is not a valid XML name and
    /// [`Error::UnboundNamespacePrefix`] if it has a prefix: an orphan has no
    /// declarations in scope, so use
    /// [`create_element_ns`](Self::create_element_ns) for prefixed names.
    pub fn create_element(&mut self, name: &str) -> Result<NodeId> {
        validate_name(name)?;
        if let (Some(prefix), _) = split_name(name) {
            return Err(Error::UnboundNamespacePrefix {
                prefix: prefix.to_string(),
                location: None,
            });
        }
        self.create(NodeKind::Element {
            name: name.to_string(),
            prefix: None,
            namespace: None,
            attributes: Vec::new(),
        })
    }

    /// Creates an orphan element in namespace `uri`.
    ///
    /// The caller is responsible for the declaration: the serializer adds an
    /// `xmlns` attribute wherever the binding is not already in scope.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidName`] if `qname` is not a valid qualified
    /// name, or has a prefix but no namespace URI.
    ///
    /// # Examples
    ///
    /// ```
    /// use xmlsift::Document;
    ///
    /// let mut doc = Document::new();
    /// let svg = doc.create_element_ns("svg:svg", Some("http://www.w3.org/2000/svg")).unwrap();
    /// doc.append_child(doc.root(), svg).unwrap();
    /// assert_eq!(
    ///     xmlsift::serial::serialize(&doc),
    ///     r#"<svg:svg xmlns:svg="http://www.w3.org/2000/svg"/>"#
    /// );
    /// ```
    pub fn create_element_ns(&mut self, qname: &str, uri: Option<&str>) -> Result<NodeId> {
        validate_name(qname)?;
        let (prefix, local) = split_name(qname);
        let uri = uri.filter(|u| !u.is_empty());
        if prefix.is_some() && uri.is_none() {
            return Err(Error::InvalidName {
                name: qname.to_string(),
            });
        }
        self.create(NodeKind::Element {
            name: local.to_string(),
            prefix: prefix.map(str::to_string),
            namespace: uri.map(str::to_string),
            attributes: Vec::new(),
        })
    }

    /// Creates an orphan text node.
    ///
    /// # Errors
    ///
    /// Fails only if the arena is full.
    pub fn create_text(&mut self, content: &str) -> Result<NodeId> {
        self.create(NodeKind::Text {
            content: content.to_string(),
        })
    }

    /// Creates an orphan comment.
    ///
    /// # Errors
    ///
    /// Fails only if the arena is full.
    pub fn create_comment(&mut self, content: &str) -> Result<NodeId> {
        self.create(NodeKind::Comment {
            content: content.to_string(),
        })
    }

    /// Creates an orphan CDATA section.
    ///
    /// # Errors
    ///
    /// Fails only if the arena is full.
    pub fn create_cdata(&mut self, content: &str) -> Result<NodeId> {
        self.create(NodeKind::CData {
            content: content.to_string(),
        })
    }

    /// Creates an orphan processing instruction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidName`] if `target` is not a valid name or is
    /// a case variant of the reserved `xml`.
    pub fn create_processing_instruction(&mut self, target: &str, data: &str) -> Result<NodeId> {
        validate_name(target)?;
        if target.eq_ignore_ascii_case("xml") || target.contains(':') {
            return Err(Error::InvalidName {
                name: target.to_string(),
            });
        }
        self.create(NodeKind::ProcessingInstruction {
            target: target.to_string(),
            data: data.to_string(),
        })
    }

    fn create(&mut self, kind: NodeKind) -> Result<NodeId> {
        let ix = self.alloc(kind, 0)?;
        Ok(self.handle(ix))
    }

    // ---------------------------------------------------------------------
    // Structure
    // ---------------------------------------------------------------------

    /// Appends the orphan `child` as the last child of `parent`.
    ///
    /// # Errors
    ///
    /// * [`Error::StaleReference`] if either handle is stale.
    /// * [`Error::InvalidHierarchy`] if `child` already has a parent, is the
    ///   document node or an ancestor of `parent`; if `parent` cannot have
    ///   children; or if the edit would give the document node a second
    ///   element or a text child.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        let parent = self.check(parent)?;
        let child = self.check(child)?;
        self.check_attach(parent, child)?;
        self.link_last(parent, child);
        self.after_attach(child);
        Ok(())
    }

    /// Inserts the orphan `node` into `parent` immediately before
    /// `reference`, which must be a child of `parent`.
    ///
    /// # Errors
    ///
    /// As for [`append_child`](Self::append_child), plus
    /// [`Error::InvalidHierarchy`] if `reference` is not a child of `parent`.
    pub fn insert_before(&mut self, parent: NodeId, node: NodeId, reference: NodeId) -> Result<()> {
        let parent = self.check(parent)?;
        let node = self.check(node)?;
        let reference = self.check(reference)?;
        if self.data(reference).parent != Some(parent) {
            return Err(Error::hierarchy(format!(
                "{} is not a child of {}",
                self.describe(reference),
                self.describe(parent)
            )));
        }
        self.check_attach(parent, node)?;
        self.link_before(reference, node);
        self.after_attach(node);
        Ok(())
    }

    /// Removes `node` from `parent` and frees its whole subtree. Every
    /// handle into the subtree becomes stale.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleReference`] for stale handles and
    /// [`Error::InvalidHierarchy`] if `node` is not a child of `parent`.
    pub fn remove_child(&mut self, parent: NodeId, node: NodeId) -> Result<()> {
        let parent = self.check(parent)?;
        let node = self.check(node)?;
        if self.data(node).parent != Some(parent) {
            return Err(Error::hierarchy(format!(
                "{} is not a child of {}",
                self.describe(node),
                self.describe(parent)
            )));
        }
        let had_ids = self.is_connected(node) && self.subtree_has_ids(node);
        self.unlink(node);
        self.free_subtree(node);
        if had_ids {
            self.reindex_ids();
        }
        Ok(())
    }

    /// Unlinks `node` and its subtree from the tree.
    ///
    /// Every previously obtained handle into the subtree, including `node`
    /// itself and any query result entry, becomes stale. The returned handle
    /// designates the detached subtree root and can be passed to
    /// [`append_child`](Self::append_child) to re-attach it. Handles outside
    /// the subtree remain valid.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleReference`] for a stale handle and
    /// [`Error::InvalidHierarchy`] for the document node.
    ///
    /// # Examples
    ///
    /// ```
    /// use xmlsift::{Document, Error};
    ///
    /// let mut doc = Document::parse_str("<a><b/></a>").unwrap();
    /// let b = doc.xpath("/a/b").unwrap().node_ids().next().unwrap();
    /// let b2 = doc.detach(b).unwrap();
    /// assert!(matches!(doc.get(b), Err(Error::StaleReference { .. })));
    /// assert_eq!(doc.get(b2).unwrap().local_name(), Some("b"));
    /// ```
    pub fn detach(&mut self, node: NodeId) -> Result<NodeId> {
        let ix = self.check(node)?;
        if ix == self.root_ix() {
            return Err(Error::hierarchy("the document node cannot be detached"));
        }
        let had_ids = self.is_connected(ix) && self.subtree_has_ids(ix);
        self.unlink(ix);
        self.bump_generations(ix);
        if had_ids {
            self.reindex_ids();
        }
        Ok(self.handle(ix))
    }

    /// Frees an orphan subtree: one that was created and never attached, or
    /// that was detached. Every handle into it becomes stale and its slots
    /// are reused by later allocations.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleReference`] for a stale handle and
    /// [`Error::InvalidHierarchy`] if `node` has a parent or is the document
    /// node. Attached nodes are removed with
    /// [`remove_child`](Self::remove_child).
    ///
    /// # Examples
    ///
    /// ```
    /// use xmlsift::Document;
    ///
    /// let mut doc = Document::parse_str("<a><b><c/></b></a>").unwrap();
    /// let before = doc.node_count();
    /// let b = doc.xpath("/a/b").unwrap().node_ids().next().unwrap();
    /// let b = doc.detach(b).unwrap();
    /// doc.discard(b).unwrap();
    /// assert_eq!(doc.node_count(), before - 2);
    /// assert!(doc.get(b).is_err());
    /// ```
    pub fn discard(&mut self, node: NodeId) -> Result<()> {
        let ix = self.check(node)?;
        if ix == self.root_ix() {
            return Err(Error::hierarchy("the document node cannot be discarded"));
        }
        if let Some(parent) = self.data(ix).parent {
            return Err(Error::hierarchy(format!(
                "{} is still a child of {}",
                self.describe(ix),
                self.describe(parent)
            )));
        }
        self.free_subtree(ix);
        Ok(())
    }

    /// Replaces the content of `node`. For an element or the document node
    /// every child is removed and, unless `text` is empty, a single text
    /// node is appended. For text, CDATA and comment nodes the content is
    /// replaced; for a processing instruction, its data.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleReference`] for a stale handle and
    /// [`Error::InvalidHierarchy`] for the document node.
    pub fn set_text(&mut self, node: NodeId, text: &str) -> Result<()> {
        let ix = self.check(node)?;
        match &mut self.data_mut(ix).kind {
            NodeKind::Text { content } | NodeKind::CData { content } | NodeKind::Comment { content } => {
                text.clone_into(content);
                return Ok(());
            }
            NodeKind::ProcessingInstruction { data, .. } => {
                text.clone_into(data);
                return Ok(());
            }
            NodeKind::Document => {
                return Err(Error::hierarchy("the document node cannot contain text"));
            }
            NodeKind::Element { .. } => {}
        }
        let had_ids = self.is_connected(ix)
            && self.children_ix(ix).any(|c| self.subtree_has_ids(c));
        let children: Vec<Ix> = self.children_ix(ix).collect();
        for child in children {
            self.unlink(child);
            self.free_subtree(child);
        }
        if !text.is_empty() {
            let line = self.data(ix).line;
            let text_ix = self.alloc(
                NodeKind::Text {
                    content: text.to_string(),
                },
                line,
            )?;
            self.link_last(ix, text_ix);
        }
        if had_ids {
            self.reindex_ids();
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Attributes
    // ---------------------------------------------------------------------

    /// Sets attribute `name` on `element`. An existing attribute keeps its
    /// position; a new one is appended.
    ///
    /// A prefixed name is resolved through the `xmlns` declarations of the
    /// element and its ancestors. `xmlns` and `xmlns:p` declare namespaces
    /// for the element's subtree.
    ///
    /// # Errors
    ///
    /// * [`Error::StaleReference`] for a stale handle.
    /// * [`Error::InvalidHierarchy`] if `element` is not an element.
    /// * [`Error::InvalidName`] if `name` is not a valid qualified name.
    /// * [`Error::UnboundNamespacePrefix`] if the prefix is not declared.
    pub fn set_attribute(&mut self, element: NodeId, name: &str, value: &str) -> Result<()> {
        let ix = self.check(element)?;
        if !matches!(self.data(ix).kind, NodeKind::Element { .. }) {
            return Err(Error::hierarchy(format!(
                "cannot set attribute on {}",
                self.describe(ix)
            )));
        }
        validate_name(name)?;
        let (prefix, local) = split_name(name);
        let namespace = if declared_prefix(name).is_some() {
            Some(XMLNS_NAMESPACE.to_string())
        } else if let Some(p) = prefix {
            let uri = self
                .lookup_namespace(ix, Some(p))
                .ok_or_else(|| Error::UnboundNamespacePrefix {
                    prefix: p.to_string(),
                    location: None,
                })?;
            Some(uri.to_string())
        } else {
            None
        };

        let serial = self.next_attribute_serial();
        let NodeKind::Element { attributes, .. } = &mut self.data_mut(ix).kind else {
            return Ok(());
        };
        let is_id;
        if let Some(existing) = attributes.iter_mut().find(|a| a.matches_qname(name)) {
            value.clone_into(&mut existing.value);
            is_id = is_id_attribute(existing);
        } else {
            let attribute = Attribute::new(
                prefix.map(str::to_string),
                local.to_string(),
                namespace,
                value.to_string(),
                serial,
            );
            is_id = is_id_attribute(&attribute);
            attributes.push(attribute);
        }
        if is_id && self.is_connected(ix) {
            self.reindex_ids();
        }
        Ok(())
    }

    /// Removes attribute `name` from `element`. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleReference`] for a stale handle and
    /// [`Error::InvalidHierarchy`] if `element` is not an element.
    pub fn remove_attribute(&mut self, element: NodeId, name: &str) -> Result<bool> {
        let ix = self.check(element)?;
        let description = self.describe(ix);
        let NodeKind::Element { attributes, .. } = &mut self.data_mut(ix).kind else {
            return Err(Error::hierarchy(format!(
                "cannot remove attribute from {description}"
            )));
        };
        let Some(pos) = attributes.iter().position(|a| a.matches_qname(name)) else {
            return Ok(false);
        };
        let removed = attributes.remove(pos);
        if is_id_attribute(&removed) && self.is_connected(ix) {
            self.reindex_ids();
        }
        Ok(true)
    }

    // ---------------------------------------------------------------------
    // Validation
    // ---------------------------------------------------------------------

    fn check_attach(&self, parent: Ix, child: Ix) -> Result<()> {
        if child == self.root_ix() {
            return Err(Error::hierarchy("the document node cannot be a child"));
        }
        if self.data(child).parent.is_some() {
            return Err(Error::hierarchy(format!(
                "{} already has a parent; detach it first",
                self.describe(child)
            )));
        }
        let parent_kind = &self.data(parent).kind;
        if !parent_kind.is_container() {
            return Err(Error::hierarchy(format!(
                "{} cannot have children",
                self.describe(parent)
            )));
        }
        if self.is_ancestor_or_self(child, parent) {
            return Err(Error::hierarchy(format!(
                "inserting {} into {} would create a cycle",
                self.describe(child),
                self.describe(parent)
            )));
        }
        if parent == self.root_ix() {
            match &self.data(child).kind {
                NodeKind::Element { .. } => {
                    if self.root_element().is_some() {
                        return Err(Error::hierarchy("the document already has a root element"));
                    }
                }
                NodeKind::Text { .. } | NodeKind::CData { .. } => {
                    return Err(Error::hierarchy(
                        "character data cannot be a child of the document node",
                    ));
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn after_attach(&mut self, child: Ix) {
        if self.is_connected(child) && self.subtree_has_ids(child) {
            self.reindex_ids();
        }
    }

    /// Human-readable node description for error messages.
    fn describe(&self, ix: Ix) -> String {
        let node = NodeRef::new(self, ix);
        format!("{} {}", node.kind().type_name(), node.path())
    }
}

fn validate_name(name: &str) -> Result<()> {
    if is_qname(name) {
        Ok(())
    } else {
        Err(Error::InvalidName {
            name: name.to_string(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn first(doc: &Document, expr: &str) -> NodeId {
        doc.xpath(expr).unwrap().node_ids().next().unwrap()
    }

    #[test]
    fn test_build_tree_from_scratch() {
        let mut doc = Document::new();
        let root = doc.create_element("root").unwrap();
        doc.append_child(doc.root(), root).unwrap();
        let child = doc.create_element("child").unwrap();
        doc.append_child(root, child).unwrap();
        let text = doc.create_text("hi").unwrap();
        doc.append_child(child, text).unwrap();
        assert_eq!(doc.root_element().unwrap().text(), "hi");
        assert_eq!(doc.get(child).unwrap().parent().unwrap().id(), root);
    }

    #[test]
    fn test_append_rejects_cycle() {
        let mut doc = Document::parse_str("<a><b><c/></b></a>").unwrap();
        let b = first(&doc, "/a/b");
        let b = doc.detach(b).unwrap();
        let c = doc.get(b).unwrap().children().next().unwrap().id();
        let err = doc.append_child(c, b).unwrap_err();
        assert!(matches!(err, Error::InvalidHierarchy { .. }));
        assert!(doc.get(b).is_ok());
    }

    #[test]
    fn test_append_rejects_attached_child() {
        let mut doc = Document::parse_str("<a><b/><c/></a>").unwrap();
        let b = first(&doc, "/a/b");
        let c = first(&doc, "/a/c");
        let err = doc.append_child(c, b).unwrap_err();
        assert!(err.to_string().contains("already has a parent"));
    }

    #[test]
    fn test_document_allows_one_root_and_no_text() {
        let mut doc = Document::parse_str("<a/>").unwrap();
        let second = doc.create_element("b").unwrap();
        assert!(doc.append_child(doc.root(), second).is_err());
        let text = doc.create_text("x").unwrap();
        assert!(doc.append_child(doc.root(), text).is_err());
        let comment = doc.create_comment("ok").unwrap();
        doc.append_child(doc.root(), comment).unwrap();
    }

    #[test]
    fn test_leaf_cannot_have_children() {
        let mut doc = Document::parse_str("<a>t</a>").unwrap();
        let text = first(&doc, "/a/text()");
        let child = doc.create_element("x").unwrap();
        assert!(matches!(
            doc.append_child(text, child),
            Err(Error::InvalidHierarchy { .. })
        ));
    }

    #[test]
    fn test_insert_before_orders_children() {
        let mut doc = Document::parse_str("<a><c/></a>").unwrap();
        let a = first(&doc, "/a");
        let c = first(&doc, "/a/c");
        let b = doc.create_element("b").unwrap();
        doc.insert_before(a, b, c).unwrap();
        let names: Vec<_> = doc
            .get(a)
            .unwrap()
            .children()
            .filter_map(|n| n.local_name().map(str::to_string))
            .collect();
        assert_eq!(names, ["b", "c"]);
    }

    #[test]
    fn test_insert_before_requires_child_reference() {
        let mut doc = Document::parse_str("<a><b><c/></b></a>").unwrap();
        let a = first(&doc, "/a");
        let c = first(&doc, "//c");
        let x = doc.create_element("x").unwrap();
        assert!(doc.insert_before(a, x, c).is_err());
    }

    #[test]
    fn test_remove_child_frees_subtree() {
        let mut doc = Document::parse_str("<a><b><c/></b></a>").unwrap();
        let before = doc.node_count();
        let a = first(&doc, "/a");
        let b = first(&doc, "/a/b");
        let c = first(&doc, "//c");
        doc.remove_child(a, b).unwrap();
        assert_eq!(doc.node_count(), before - 2);
        assert!(doc.get(c).is_err());
        // Freed slots are reused without resurrecting old handles.
        let x = doc.create_element("x").unwrap();
        assert!(doc.get(b).is_err());
        assert!(doc.get(x).is_ok());
    }

    #[test]
    fn test_remove_child_requires_parent() {
        let mut doc = Document::parse_str("<a><b><c/></b></a>").unwrap();
        let a = first(&doc, "/a");
        let c = first(&doc, "//c");
        assert!(doc.remove_child(a, c).is_err());
        assert!(doc.get(c).is_ok());
    }

    #[test]
    fn test_detach_and_reattach() {
        let mut doc = Document::parse_str("<a><b/><c/></a>").unwrap();
        let b = first(&doc, "/a/b");
        let c = first(&doc, "/a/c");
        let b = doc.detach(b).unwrap();
        assert!(doc.get(c).is_ok());
        doc.append_child(c, b).unwrap();
        assert_eq!(doc.get(b).unwrap().path(), "/a/c/b");
    }

    #[test]
    fn test_discard_frees_orphans_only() {
        let mut doc = Document::parse_str("<a><b><c/></b></a>").unwrap();
        let before = doc.node_count();
        let b = first(&doc, "/a/b");
        assert!(matches!(doc.discard(b), Err(Error::InvalidHierarchy { .. })));
        assert!(matches!(doc.discard(doc.root()), Err(Error::InvalidHierarchy { .. })));

        let b = doc.detach(b).unwrap();
        let c = doc.get(b).unwrap().element_children().next().unwrap().id();
        // Only the root of an orphan subtree can be discarded.
        assert!(doc.discard(c).is_err());
        doc.discard(b).unwrap();
        assert_eq!(doc.node_count(), before - 2);
        assert!(doc.get(b).is_err());
        assert!(doc.get(c).is_err());
        assert!(matches!(doc.discard(b), Err(Error::StaleReference { .. })));

        // A created node that is never attached is reclaimed the same way.
        let x = doc.create_element("x").unwrap();
        assert_eq!(doc.node_count(), before - 1);
        doc.discard(x).unwrap();
        assert_eq!(doc.node_count(), before - 2);
        assert_eq!(crate::serial::serialize(&doc), "<a/>");
    }

    #[test]
    fn test_detach_document_node_fails() {
        let mut doc = Document::parse_str("<a/>").unwrap();
        assert!(doc.detach(doc.root()).is_err());
    }

    #[test]
    fn test_set_attribute_replaces_in_place() {
        let mut doc = Document::parse_str(r#"<a x="1" y="2"/>"#).unwrap();
        let a = first(&doc, "/a");
        doc.set_attribute(a, "x", "9").unwrap();
        doc.set_attribute(a, "z", "3").unwrap();
        let attrs: Vec<(String, String)> = doc
            .get(a)
            .unwrap()
            .attributes()
            .iter()
            .map(|at| (at.qualified_name().into_owned(), at.value.clone()))
            .collect();
        assert_eq!(
            attrs,
            [
                ("x".to_string(), "9".to_string()),
                ("y".to_string(), "2".to_string()),
                ("z".to_string(), "3".to_string())
            ]
        );
    }

    #[test]
    fn test_set_attribute_resolves_prefix() {
        let mut doc = Document::parse_str(r#"<a xmlns:p="urn:p"><b/></a>"#).unwrap();
        let b = first(&doc, "/a/b");
        doc.set_attribute(b, "p:k", "v").unwrap();
        assert_eq!(doc.get(b).unwrap().attr_ns("k", Some("urn:p")), Some("v"));
        let err = doc.set_attribute(b, "q:k", "v").unwrap_err();
        assert!(matches!(err, Error::UnboundNamespacePrefix { ref prefix, .. } if prefix == "q"));
        doc.set_attribute(b, "xml:lang", "en").unwrap();
    }

    #[test]
    fn test_set_attribute_on_text_fails() {
        let mut doc = Document::parse_str("<a>t</a>").unwrap();
        let t = first(&doc, "/a/text()");
        assert!(matches!(
            doc.set_attribute(t, "x", "1"),
            Err(Error::InvalidHierarchy { .. })
        ));
    }

    #[test]
    fn test_id_index_tracks_edits() {
        let mut doc = Document::parse_str(r#"<a><b id="k"/></a>"#).unwrap();
        let a = first(&doc, "/a");
        let b = first(&doc, "/a/b");
        assert_eq!(doc.element_by_id("k").unwrap().id(), b);
        let b = doc.detach(b).unwrap();
        assert!(doc.element_by_id("k").is_none());
        doc.append_child(a, b).unwrap();
        assert_eq!(doc.element_by_id("k").unwrap().id(), b);
        doc.set_attribute(b, "id", "m").unwrap();
        assert!(doc.element_by_id("k").is_none());
        assert!(doc.element_by_id("m").is_some());
        assert!(doc.remove_attribute(b, "id").unwrap());
        assert!(doc.element_by_id("m").is_none());
        assert!(!doc.remove_attribute(b, "id").unwrap());
    }

    #[test]
    fn test_id_index_ignores_orphans() {
        let mut doc = Document::parse_str("<a/>").unwrap();
        let x = doc.create_element("x").unwrap();
        doc.set_attribute(x, "id", "o").unwrap();
        assert!(doc.element_by_id("o").is_none());
        let a = first(&doc, "/a");
        doc.append_child(a, x).unwrap();
        assert!(doc.element_by_id("o").is_some());
    }

    #[test]
    fn test_set_text_replaces_children() {
        let mut doc = Document::parse_str("<a><b/>old<c/></a>").unwrap();
        let a = first(&doc, "/a");
        let b = first(&doc, "/a/b");
        doc.set_text(a, "new").unwrap();
        assert_eq!(doc.get(a).unwrap().text(), "new");
        assert_eq!(doc.get(a).unwrap().children().count(), 1);
        assert!(doc.get(b).is_err());
    }

    #[test]
    fn test_create_validates_names() {
        let mut doc = Document::new();
        assert!(matches!(doc.create_element("1x"), Err(Error::InvalidName { .. })));
        assert!(matches!(
            doc.create_element("p:x"),
            Err(Error::UnboundNamespacePrefix { .. })
        ));
        assert!(doc.create_element_ns("p:x", Some("urn:p")).is_ok());
        assert!(doc.create_element_ns("p:x", None).is_err());
        assert!(doc.create_processing_instruction("XML", "").is_err());
        assert!(doc.create_processing_instruction("pi", "d").is_ok());
    }
}
