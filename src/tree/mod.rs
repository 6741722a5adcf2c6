//! Arena-based document tree.
//!
//! All nodes live in a contiguous arena owned by the [`Document`]. Links
//! between nodes (parent, first and last child, siblings) are arena indices,
//! so the child-to-parent relation is a plain lookup and never a second
//! owner. Dropping the `Document` frees everything at once.
//!
//! # Handles and staleness
//!
//! Callers hold [`NodeId`] handles. A handle records which document it came
//! from, the arena slot, and the slot's *generation*. Detaching or removing
//! a subtree bumps the generation of every slot in it, so any handle that
//! was obtained earlier (including handles inside query results) fails with
//! [`Error::StaleReference`] instead of silently reading a different node.
//! Handles outside the affected subtree keep working.
//!
//! # Examples
//!
//! ```
//! use xmlsift::Document;
//!
//! let doc = Document::parse_str("<root><child>Hello</child></root>").unwrap();
//! let root = doc.root_element().unwrap();
//! assert_eq!(root.local_name(), Some("root"));
//! assert_eq!(root.text(), "Hello");
//! ```

mod edit;
mod node;
mod node_ref;

pub use node::{Attribute, NodeKind};
pub use node_ref::{AttrId, AttrRef, NodeChildren, NodeRef};

use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;

use crate::error::{Error, ParseDiagnostic, Result};
use crate::parser::namespace::XML_NAMESPACE;
use crate::parser::{self, ParseOptions};
use crate::xpath::Namespaces;

/// Source of per-document tags, so handles from one document are rejected
/// by another.
static NEXT_DOCUMENT_TAG: AtomicU32 = AtomicU32::new(1);

/// Raw arena index used for internal links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct Ix(NonZeroU32);

impl Ix {
    #[allow(clippy::cast_possible_truncation)]
    fn from_index(index: usize) -> Option<Self> {
        u32::try_from(index).ok().and_then(NonZeroU32::new).map(Self)
    }

    pub(crate) fn get(self) -> usize {
        self.0.get() as usize
    }
}

/// A checked handle to a node.
///
/// `NodeId` is `Copy` and cheap to store. It does not borrow the document;
/// resolve it with [`Document::get`], which fails with
/// [`Error::StaleReference`] if the node has been detached or removed since
/// the handle was obtained, or if the handle belongs to another document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    doc: u32,
    index: NonZeroU32,
    generation: u32,
}

impl NodeId {
    pub(crate) fn ix(self) -> Ix {
        Ix(self.index)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

/// Storage for a single node in the arena.
#[derive(Debug, Clone)]
pub(crate) struct NodeData {
    pub kind: NodeKind,
    pub parent: Option<Ix>,
    pub first_child: Option<Ix>,
    pub last_child: Option<Ix>,
    pub next_sibling: Option<Ix>,
    pub prev_sibling: Option<Ix>,
    /// 1-based source line, or 0 for nodes created programmatically.
    pub line: u32,
}

impl NodeData {
    fn new(kind: NodeKind, line: u32) -> Self {
        Self {
            kind,
            parent: None,
            first_child: None,
            last_child: None,
            next_sibling: None,
            prev_sibling: None,
            line,
        }
    }
}

#[derive(Debug, Clone)]
struct Slot {
    data: NodeData,
    generation: u32,
    live: bool,
}

/// An XML or HTML document.
///
/// The `Document` exclusively owns every node. Reads go through `&Document`
/// (see [`NodeRef`]); tree edits take `&mut Document` and preserve the
/// single-owner tree invariant.
///
/// # Examples
///
/// ```
/// use xmlsift::Document;
///
/// let mut doc = Document::parse_str("<list/>").unwrap();
/// let list = doc.root_element().unwrap().id();
/// let item = doc.create_element("item").unwrap();
/// doc.set_attribute(item, "id", "first").unwrap();
/// doc.append_child(list, item).unwrap();
///
/// assert_eq!(doc.element_by_id("first").unwrap().id(), item);
/// ```
#[derive(Debug)]
pub struct Document {
    tag: u32,
    /// The node arena. Index 0 is a placeholder so indices are non-zero.
    slots: Vec<Slot>,
    free: Vec<Ix>,
    root: Ix,
    /// XML version from the XML declaration (e.g., "1.0").
    pub version: Option<String>,
    /// Encoding from the XML declaration (e.g., "UTF-8"), or the encoding
    /// the input was actually decoded with when there was no declaration.
    pub encoding: Option<String>,
    /// Standalone flag from the XML declaration.
    pub standalone: Option<bool>,
    /// Recovery actions taken while parsing in lenient mode.
    pub diagnostics: Vec<ParseDiagnostic>,
    /// Prefixes available to queries on this document.
    prefixes: Namespaces,
    /// `id`/`xml:id` value to the first connected element carrying it.
    id_map: HashMap<String, Ix>,
    /// Document-order rank per slot, computed on demand.
    order: OnceLock<Vec<u32>>,
    next_serial: u64,
    /// `chrono` format used by [`NodeRef::date_value`].
    date_format: String,
}

/// ISO 8601 timestamps with a numeric offset, e.g. `2024-05-01T12:00:00+0200`.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

impl Clone for Document {
    fn clone(&self) -> Self {
        Self {
            tag: NEXT_DOCUMENT_TAG.fetch_add(1, Ordering::Relaxed),
            slots: self.slots.clone(),
            free: self.free.clone(),
            root: self.root,
            version: self.version.clone(),
            encoding: self.encoding.clone(),
            standalone: self.standalone,
            diagnostics: self.diagnostics.clone(),
            prefixes: self.prefixes.clone(),
            id_map: self.id_map.clone(),
            order: OnceLock::new(),
            next_serial: self.next_serial,
            date_format: self.date_format.clone(),
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Creates a new empty document containing only the document node.
    #[must_use]
    pub fn new() -> Self {
        let placeholder = Slot {
            data: NodeData::new(NodeKind::Document, 0),
            generation: 0,
            live: false,
        };
        let root_slot = Slot {
            data: NodeData::new(NodeKind::Document, 0),
            generation: 0,
            live: true,
        };
        let mut slots = Vec::with_capacity(64);
        slots.push(placeholder);
        slots.push(root_slot);
        Self {
            tag: NEXT_DOCUMENT_TAG.fetch_add(1, Ordering::Relaxed),
            slots,
            free: Vec::new(),
            root: Ix(NonZeroU32::MIN),
            version: None,
            encoding: None,
            standalone: None,
            diagnostics: Vec::new(),
            prefixes: Namespaces::new(),
            id_map: HashMap::new(),
            order: OnceLock::new(),
            next_serial: 1,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }

    /// Parses an XML string with default (strict) options.
    ///
    /// # Errors
    ///
    /// Returns the first lexing or well-formedness error.
    ///
    /// # Examples
    ///
    /// ```
    /// use xmlsift::{Document, Error};
    ///
    /// assert!(Document::parse_str("<root><child/></root>").is_ok());
    /// assert!(matches!(
    ///     Document::parse_str("<a></c>"),
    ///     Err(Error::MismatchedTag { .. })
    /// ));
    /// ```
    pub fn parse_str(input: &str) -> Result<Self> {
        parser::parse_str(input)
    }

    /// Parses a string with the given options.
    ///
    /// # Errors
    ///
    /// See [`parse_str`](Self::parse_str).
    pub fn parse_str_with_options(input: &str, options: &ParseOptions) -> Result<Self> {
        parser::parse_str_with_options(input, options)
    }

    /// Parses raw bytes, selecting the encoding from a BOM, the options, or
    /// the document's own declaration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] for undecodable input, otherwise see
    /// [`parse_str`](Self::parse_str).
    pub fn parse_bytes(input: &[u8], options: &ParseOptions) -> Result<Self> {
        parser::parse_bytes(input, options)
    }

    /// Parses from a streaming reader without buffering the whole input.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the reader fails, otherwise see
    /// [`parse_bytes`](Self::parse_bytes).
    pub fn parse_reader<R: Read>(reader: R, options: &ParseOptions) -> Result<Self> {
        parser::parse_reader(reader, options)
    }

    // ---------------------------------------------------------------------
    // Handles
    // ---------------------------------------------------------------------

    /// Returns the handle of the document node.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.handle(self.root)
    }

    /// Returns the root element, if the document has one.
    #[must_use]
    pub fn root_element(&self) -> Option<NodeRef<'_>> {
        self.children_ix(self.root)
            .find(|&ix| matches!(self.data(ix).kind, NodeKind::Element { .. }))
            .map(|ix| NodeRef::new(self, ix))
    }

    /// Resolves a handle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleReference`] if the node was detached or removed
    /// after the handle was obtained, or the handle is from another document.
    pub fn get(&self, id: NodeId) -> Result<NodeRef<'_>> {
        self.check(id).map(|ix| NodeRef::new(self, ix))
    }

    /// Returns `true` if `id` still designates a live node of this document.
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.check(id).is_ok()
    }

    /// Looks up an element by its `id` or `xml:id` attribute in O(1).
    ///
    /// Only elements reachable from the document node are indexed; when a
    /// value repeats, the first element in document order wins.
    #[must_use]
    pub fn element_by_id(&self, id: &str) -> Option<NodeRef<'_>> {
        self.id_map.get(id).map(|&ix| NodeRef::new(self, ix))
    }

    /// Number of live nodes, including the document node.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.slots.iter().filter(|s| s.live).count()
    }

    /// Makes `prefix` usable in queries on this document for namespace
    /// `uri`. This is how elements in a default namespace are selected.
    ///
    /// # Examples
    ///
    /// ```
    /// use xmlsift::Document;
    ///
    /// let mut doc = Document::parse_str(r#"<feed xmlns="urn:atom"><title>t</title></feed>"#).unwrap();
    /// assert!(doc.xpath("/feed/title").unwrap().is_empty());
    /// doc.define_prefix("atom", "urn:atom");
    /// assert_eq!(doc.xpath("/atom:feed/atom:title").unwrap().len(), 1);
    /// ```
    pub fn define_prefix(&mut self, prefix: &str, uri: &str) {
        self.prefixes.define(prefix, uri);
    }

    /// The prefixes defined with [`define_prefix`](Self::define_prefix).
    #[must_use]
    pub fn namespaces(&self) -> &Namespaces {
        &self.prefixes
    }

    /// The format [`NodeRef::date_value`] parses with, in `chrono`
    /// `strftime` syntax. Defaults to [`DEFAULT_DATE_FORMAT`].
    #[must_use]
    pub fn date_format(&self) -> &str {
        &self.date_format
    }

    /// Replaces the format used by [`NodeRef::date_value`].
    ///
    /// ```
    /// use xmlsift::Document;
    ///
    /// let mut doc = Document::parse_str("<d>01/05/2024</d>").unwrap();
    /// assert!(doc.root_element().unwrap().date_value().is_none());
    /// doc.set_date_format("%d/%m/%Y");
    /// let date = doc.root_element().unwrap().date_value().unwrap();
    /// assert_eq!(date.to_rfc3339(), "2024-05-01T00:00:00+00:00");
    /// ```
    pub fn set_date_format(&mut self, format: &str) {
        self.date_format = format.to_string();
    }

    // ---------------------------------------------------------------------
    // Internal access
    // ---------------------------------------------------------------------

    pub(crate) fn check(&self, id: NodeId) -> Result<Ix> {
        let stale = || Error::StaleReference { node: id };
        if id.doc != self.tag {
            return Err(stale());
        }
        let slot = self.slots.get(id.index.get() as usize).ok_or_else(stale)?;
        if !slot.live || slot.generation != id.generation {
            return Err(stale());
        }
        Ok(Ix(id.index))
    }

    pub(crate) fn handle(&self, ix: Ix) -> NodeId {
        NodeId {
            doc: self.tag,
            index: ix.0,
            generation: self.slots[ix.get()].generation,
        }
    }

    pub(crate) fn root_ix(&self) -> Ix {
        self.root
    }

    pub(crate) fn data(&self, ix: Ix) -> &NodeData {
        &self.slots[ix.get()].data
    }

    pub(crate) fn data_mut(&mut self, ix: Ix) -> &mut NodeData {
        &mut self.slots[ix.get()].data
    }

    pub(crate) fn children_ix(&self, ix: Ix) -> ChildrenIx<'_> {
        ChildrenIx {
            doc: self,
            next: self.data(ix).first_child,
        }
    }

    /// Pre-order walk of `ix` and its descendants.
    pub(crate) fn subtree_ix(&self, ix: Ix) -> SubtreeIx<'_> {
        SubtreeIx {
            doc: self,
            root: ix,
            next: Some(ix),
        }
    }

    pub(crate) fn is_ancestor_or_self(&self, ancestor: Ix, mut ix: Ix) -> bool {
        loop {
            if ix == ancestor {
                return true;
            }
            match self.data(ix).parent {
                Some(p) => ix = p,
                None => return false,
            }
        }
    }

    pub(crate) fn is_connected(&self, ix: Ix) -> bool {
        self.is_ancestor_or_self(self.root, ix)
    }

    pub(crate) fn next_attribute_serial(&mut self) -> u64 {
        let serial = self.next_serial;
        self.next_serial += 1;
        serial
    }

    /// Allocates a node, reusing a freed slot when one is available.
    pub(crate) fn alloc(&mut self, kind: NodeKind, line: u32) -> Result<Ix> {
        let data = NodeData::new(kind, line);
        if let Some(ix) = self.free.pop() {
            let slot = &mut self.slots[ix.get()];
            slot.data = data;
            slot.live = true;
            self.invalidate_order();
            return Ok(ix);
        }
        let ix = Ix::from_index(self.slots.len()).ok_or_else(|| Error::LimitExceeded {
            limit: "node count limit",
            location: crate::error::SourceLocation::default(),
        })?;
        self.slots.push(Slot {
            data,
            generation: 0,
            live: true,
        });
        self.invalidate_order();
        Ok(ix)
    }

    /// Links an orphan as the last child of `parent` without validation.
    pub(crate) fn link_last(&mut self, parent: Ix, child: Ix) {
        self.data_mut(child).parent = Some(parent);
        if let Some(last) = self.data(parent).last_child {
            self.data_mut(last).next_sibling = Some(child);
            self.data_mut(child).prev_sibling = Some(last);
        } else {
            self.data_mut(parent).first_child = Some(child);
        }
        self.data_mut(parent).last_child = Some(child);
        self.invalidate_order();
    }

    /// Links an orphan before `reference` without validation.
    pub(crate) fn link_before(&mut self, reference: Ix, child: Ix) {
        let Some(parent) = self.data(reference).parent else {
            return;
        };
        self.data_mut(child).parent = Some(parent);
        match self.data(reference).prev_sibling {
            Some(prev) => {
                self.data_mut(prev).next_sibling = Some(child);
                self.data_mut(child).prev_sibling = Some(prev);
            }
            None => self.data_mut(parent).first_child = Some(child),
        }
        self.data_mut(child).next_sibling = Some(reference);
        self.data_mut(reference).prev_sibling = Some(child);
        self.invalidate_order();
    }

    /// Unlinks `ix` from its parent and siblings.
    pub(crate) fn unlink(&mut self, ix: Ix) {
        let Some(parent) = self.data(ix).parent else {
            return;
        };
        let prev = self.data(ix).prev_sibling;
        let next = self.data(ix).next_sibling;
        match prev {
            Some(p) => self.data_mut(p).next_sibling = next,
            None => self.data_mut(parent).first_child = next,
        }
        match next {
            Some(n) => self.data_mut(n).prev_sibling = prev,
            None => self.data_mut(parent).last_child = prev,
        }
        let data = self.data_mut(ix);
        data.parent = None;
        data.prev_sibling = None;
        data.next_sibling = None;
        self.invalidate_order();
    }

    /// Invalidates every outstanding handle into the subtree at `ix`.
    pub(crate) fn bump_generations(&mut self, ix: Ix) {
        let members: Vec<Ix> = self.subtree_ix(ix).collect();
        for m in members {
            let slot = &mut self.slots[m.get()];
            slot.generation = slot.generation.wrapping_add(1);
        }
    }

    /// Frees the subtree at `ix` (which must already be unlinked).
    pub(crate) fn free_subtree(&mut self, ix: Ix) {
        let members: Vec<Ix> = self.subtree_ix(ix).collect();
        for m in members {
            let slot = &mut self.slots[m.get()];
            slot.generation = slot.generation.wrapping_add(1);
            slot.live = false;
            slot.data = NodeData::new(NodeKind::Document, 0);
            self.free.push(m);
        }
        self.invalidate_order();
    }

    // ---------------------------------------------------------------------
    // Namespaces in scope
    // ---------------------------------------------------------------------

    /// Resolves `prefix` against the `xmlns` declarations on `ix` and its
    /// ancestors. `None` asks for the default namespace.
    pub(crate) fn lookup_namespace(&self, ix: Ix, prefix: Option<&str>) -> Option<&str> {
        if prefix == Some("xml") {
            return Some(XML_NAMESPACE);
        }
        let mut current = Some(ix);
        while let Some(c) = current {
            if let NodeKind::Element { attributes, .. } = &self.data(c).kind {
                for a in attributes {
                    let declares = match (prefix, a.prefix.as_deref()) {
                        (None, None) => a.name == "xmlns",
                        (Some(p), Some("xmlns")) => a.name == p,
                        _ => false,
                    };
                    if declares {
                        return (!a.value.is_empty()).then_some(a.value.as_str());
                    }
                }
            }
            current = self.data(c).parent;
        }
        None
    }

    // ---------------------------------------------------------------------
    // Document order
    // ---------------------------------------------------------------------

    /// Position of `ix` in document order. Nodes outside the tree come after
    /// every connected node, grouped by detached subtree.
    pub(crate) fn rank(&self, ix: Ix) -> u32 {
        self.order.get_or_init(|| self.compute_order())[ix.get()]
    }

    pub(crate) fn invalidate_order(&mut self) {
        if self.order.get().is_some() {
            self.order = OnceLock::new();
        }
    }

    fn compute_order(&self) -> Vec<u32> {
        let mut ranks = vec![u32::MAX; self.slots.len()];
        let mut next = 0u32;
        let mut assign = |ranks: &mut Vec<u32>, top: Ix| {
            for ix in self.subtree_ix(top) {
                ranks[ix.get()] = next;
                next = next.saturating_add(1);
            }
        };
        assign(&mut ranks, self.root);
        for (index, slot) in self.slots.iter().enumerate().skip(1) {
            if slot.live && slot.data.parent.is_none() {
                if let Some(ix) = Ix::from_index(index) {
                    if ix != self.root {
                        assign(&mut ranks, ix);
                    }
                }
            }
        }
        ranks
    }

    // ---------------------------------------------------------------------
    // ID index
    // ---------------------------------------------------------------------

    /// Rebuilds the id index from the connected tree.
    pub(crate) fn reindex_ids(&mut self) {
        let mut map = HashMap::new();
        for ix in self.subtree_ix(self.root) {
            if let Some(value) = self.id_value(ix) {
                map.entry(value.to_string()).or_insert(ix);
            }
        }
        self.id_map = map;
    }

    pub(crate) fn subtree_has_ids(&self, ix: Ix) -> bool {
        self.subtree_ix(ix).any(|m| self.id_value(m).is_some())
    }

    fn id_value(&self, ix: Ix) -> Option<&str> {
        match &self.data(ix).kind {
            NodeKind::Element { attributes, .. } => attributes
                .iter()
                .find(|a| is_id_attribute(a))
                .map(|a| a.value.as_str()),
            _ => None,
        }
    }
}

pub(crate) fn is_id_attribute(a: &Attribute) -> bool {
    a.name == "id" && matches!(a.prefix.as_deref(), None | Some("xml"))
}

// ---------------------------------------------------------------------------
// Internal iterators
// ---------------------------------------------------------------------------

pub(crate) struct ChildrenIx<'a> {
    doc: &'a Document,
    next: Option<Ix>,
}

impl Iterator for ChildrenIx<'_> {
    type Item = Ix;

    fn next(&mut self) -> Option<Ix> {
        let current = self.next?;
        self.next = self.doc.data(current).next_sibling;
        Some(current)
    }
}

/// Pre-order traversal of a subtree, including its root.
pub(crate) struct SubtreeIx<'a> {
    doc: &'a Document,
    root: Ix,
    next: Option<Ix>,
}

impl Iterator for SubtreeIx<'_> {
    type Item = Ix;

    fn next(&mut self) -> Option<Ix> {
        let current = self.next?;
        let data = self.doc.data(current);
        if let Some(child) = data.first_child {
            self.next = Some(child);
            return Some(current);
        }
        let mut cursor = current;
        loop {
            if cursor == self.root {
                self.next = None;
                return Some(current);
            }
            let d = self.doc.data(cursor);
            if let Some(sibling) = d.next_sibling {
                self.next = Some(sibling);
                return Some(current);
            }
            match d.parent {
                Some(p) => cursor = p,
                None => {
                    self.next = None;
                    return Some(current);
                }
            }
        }
    }
}
