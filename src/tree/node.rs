//! Node payload definitions.
//!
//! The `NodeKind` enum is the closed set of node types a document can hold.
//! Each variant carries the node-type-specific payload (element name and
//! attributes, character data, processing instruction target); navigation
//! links live in the arena slot, not here.

use std::borrow::Cow;

/// The kind of a node and its associated data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// The document node; there is exactly one per `Document`.
    Document,

    /// An element node, e.g., `<svg:rect width="3">`.
    Element {
        /// The local part of the element name (`rect`).
        name: String,
        /// Namespace prefix as written (`svg`), if any.
        prefix: Option<String>,
        /// Namespace URI after resolution, if any.
        namespace: Option<String>,
        /// Attributes in source order. Qualified names are unique.
        attributes: Vec<Attribute>,
    },

    /// A text node containing character data.
    Text {
        /// The text content (references already expanded).
        content: String,
    },

    /// A CDATA section, e.g., `<![CDATA[...]]>`.
    CData {
        /// The CDATA content (no escaping applied).
        content: String,
    },

    /// A comment node, e.g., `<!-- ... -->`.
    Comment {
        /// The comment text (without the `<!--` and `-->` delimiters).
        content: String,
    },

    /// A processing instruction, e.g., `<?target data?>`.
    ProcessingInstruction {
        /// The PI target (e.g., `"xml-stylesheet"`).
        target: String,
        /// The PI data, possibly empty.
        data: String,
    },
}

impl NodeKind {
    /// Short lowercase name of the variant, for messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Element { .. } => "element",
            Self::Text { .. } => "text",
            Self::CData { .. } => "CDATA section",
            Self::Comment { .. } => "comment",
            Self::ProcessingInstruction { .. } => "processing instruction",
        }
    }

    /// Returns `true` for node kinds that may have children.
    #[must_use]
    pub fn is_container(&self) -> bool {
        matches!(self, Self::Document | Self::Element { .. })
    }
}

/// An attribute on an element.
///
/// Attributes are created by the parser or by
/// [`Document::set_attribute`](super::Document::set_attribute); each one
/// carries an identity that query results use to detect when the attribute
/// has since been removed.
#[derive(Debug, Clone)]
pub struct Attribute {
    /// The local part of the attribute name (`lang` for `xml:lang`).
    pub name: String,
    /// Namespace prefix as written, if any.
    pub prefix: Option<String>,
    /// Namespace URI after resolution, if any. Unprefixed attributes have
    /// no namespace.
    pub namespace: Option<String>,
    /// The attribute value (references expanded).
    pub value: String,
    pub(crate) serial: u64,
}

impl Attribute {
    pub(crate) fn new(
        prefix: Option<String>,
        name: String,
        namespace: Option<String>,
        value: String,
        serial: u64,
    ) -> Self {
        Self {
            name,
            prefix,
            namespace,
            value,
            serial,
        }
    }

    /// The attribute name as written, `prefix:name` or `name`.
    #[must_use]
    pub fn qualified_name(&self) -> Cow<'_, str> {
        qualified(self.prefix.as_deref(), &self.name)
    }

    /// Returns `true` if this is an `xmlns` or `xmlns:p` declaration.
    #[must_use]
    pub fn is_namespace_declaration(&self) -> bool {
        match &self.prefix {
            Some(p) => p == "xmlns",
            None => self.name == "xmlns",
        }
    }

    pub(crate) fn matches_qname(&self, qname: &str) -> bool {
        match &self.prefix {
            Some(p) => {
                qname.len() == p.len() + 1 + self.name.len()
                    && qname.starts_with(p.as_str())
                    && qname.as_bytes()[p.len()] == b':'
                    && qname.ends_with(self.name.as_str())
            }
            None => qname == self.name,
        }
    }
}

impl PartialEq for Attribute {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.prefix == other.prefix
            && self.namespace == other.namespace
            && self.value == other.value
    }
}

impl Eq for Attribute {}

pub(crate) fn qualified<'a>(prefix: Option<&str>, local: &'a str) -> Cow<'a, str> {
    match prefix {
        Some(p) => Cow::Owned(format!("{p}:{local}")),
        None => Cow::Borrowed(local),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn attr(prefix: Option<&str>, name: &str) -> Attribute {
        Attribute::new(
            prefix.map(str::to_string),
            name.to_string(),
            None,
            "v".to_string(),
            0,
        )
    }

    #[test]
    fn test_qualified_name() {
        assert_eq!(attr(Some("xml"), "lang").qualified_name(), "xml:lang");
        assert_eq!(attr(None, "id").qualified_name(), "id");
    }

    #[test]
    fn test_matches_qname() {
        assert!(attr(Some("xml"), "lang").matches_qname("xml:lang"));
        assert!(!attr(Some("xml"), "lang").matches_qname("lang"));
        assert!(!attr(Some("xml"), "lang").matches_qname("xmlxlang"));
        assert!(attr(None, "lang").matches_qname("lang"));
    }

    #[test]
    fn test_namespace_declaration_detection() {
        assert!(attr(None, "xmlns").is_namespace_declaration());
        assert!(attr(Some("xmlns"), "svg").is_namespace_declaration());
        assert!(!attr(Some("xml"), "lang").is_namespace_declaration());
    }

    #[test]
    fn test_equality_ignores_identity() {
        let mut a = attr(None, "id");
        let b = attr(None, "id");
        a.serial = 42;
        assert_eq!(a, b);
    }
}
