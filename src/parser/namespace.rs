//! XML names and namespace scoping.
//!
//! [`NamespaceResolver`] mirrors element nesting with a stack of binding
//! frames. The tree builder pushes a frame per start tag, and the serializer
//! reuses the same structure to decide where declarations must be re-emitted.

// -------------------------------------------------------------------------
// Well-known namespaces
// -------------------------------------------------------------------------

/// The XML namespace URI, pre-bound to the `xml` prefix.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// The namespace URI of `xmlns` declarations themselves.
pub const XMLNS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";

// -------------------------------------------------------------------------
// XML Name character classes (XML 1.0 §2.3)
// -------------------------------------------------------------------------

/// Returns `true` if `c` is a valid `NameStartChar` per XML 1.0 §2.3 `[4]`.
pub(crate) fn is_name_start_char(c: char) -> bool {
    matches!(c,
        ':' | 'A'..='Z' | '_' | 'a'..='z' |
        '\u{C0}'..='\u{D6}' | '\u{D8}'..='\u{F6}' | '\u{F8}'..='\u{2FF}' |
        '\u{370}'..='\u{37D}' | '\u{37F}'..='\u{1FFF}' |
        '\u{200C}'..='\u{200D}' | '\u{2070}'..='\u{218F}' |
        '\u{2C00}'..='\u{2FEF}' | '\u{3001}'..='\u{D7FF}' |
        '\u{F900}'..='\u{FDCF}' | '\u{FDF0}'..='\u{FFFD}' |
        '\u{10000}'..='\u{EFFFF}'
    )
}

/// Returns `true` if `c` is a valid `NameChar` per XML 1.0 §2.3 `[4a]`.
pub(crate) fn is_name_char(c: char) -> bool {
    is_name_start_char(c)
        || matches!(c,
            '-' | '.' | '0'..='9' | '\u{B7}' |
            '\u{300}'..='\u{36F}' | '\u{203F}'..='\u{2040}'
        )
}

/// Returns `true` if `c` is a valid `Char` per XML 1.0 §2.2 `[2]`.
pub(crate) fn is_xml_char(c: char) -> bool {
    matches!(c as u32,
        0x09 | 0x0A | 0x0D | 0x20..=0xD7FF | 0xE000..=0xFFFD | 0x0001_0000..=0x0010_FFFF
    )
}

/// Returns `true` if `name` is a well-formed qualified name: an XML `Name`
/// with at most one colon and non-empty prefix and local parts.
pub(crate) fn is_qname(name: &str) -> bool {
    let mut chars = name.chars();
    let starts_well = chars.next().is_some_and(|c| c != ':' && is_name_start_char(c));
    if !starts_well || !chars.all(is_name_char) {
        return false;
    }
    match name.find(':') {
        Some(pos) => pos + 1 < name.len() && !name[pos + 1..].contains(':'),
        None => true,
    }
}

/// Splits a qualified name into optional prefix and local part.
///
/// `"foo:bar"` → `(Some("foo"), "bar")`
/// `"bar"` → `(None, "bar")`
pub(crate) fn split_name(name: &str) -> (Option<&str>, &str) {
    match name.find(':') {
        Some(pos) => (Some(&name[..pos]), &name[pos + 1..]),
        None => (None, name),
    }
}

/// If `name` is a namespace declaration attribute, returns the prefix it
/// declares: `Some(None)` for `xmlns`, `Some(Some("p"))` for `xmlns:p`.
pub(crate) fn declared_prefix(name: &str) -> Option<Option<&str>> {
    if name == "xmlns" {
        Some(None)
    } else {
        name.strip_prefix("xmlns:").map(Some)
    }
}

// -------------------------------------------------------------------------
// Scoped bindings
// -------------------------------------------------------------------------

/// Scoped prefix-to-URI bindings.
///
/// Each frame holds the `xmlns` declarations introduced on one element.
/// Resolution walks the frames from innermost to outermost.
#[derive(Debug, Clone)]
pub(crate) struct NamespaceResolver {
    /// `(prefix, uri)` pairs; a `None` prefix is the default namespace and
    /// an empty URI undeclares it.
    stack: Vec<Vec<(Option<String>, String)>>,
}

impl Default for NamespaceResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl NamespaceResolver {
    /// Creates a new resolver with the `xml` prefix pre-bound.
    pub fn new() -> Self {
        let initial = vec![(Some("xml".to_string()), XML_NAMESPACE.to_string())];
        Self {
            stack: vec![initial],
        }
    }

    /// Pushes a new (empty) scope for an element.
    pub fn push_scope(&mut self) {
        self.stack.push(Vec::new());
    }

    /// Pops the innermost scope. The pre-bound root frame is never popped.
    pub fn pop_scope(&mut self) {
        if self.stack.len() > 1 {
            self.stack.pop();
        }
    }

    /// Binds a prefix to a URI in the innermost scope.
    pub fn bind(&mut self, prefix: Option<&str>, uri: &str) {
        if let Some(frame) = self.stack.last_mut() {
            frame.push((prefix.map(str::to_string), uri.to_string()));
        }
    }

    /// Resolves a prefix to its URI, or `None` if unbound.
    ///
    /// Use `prefix = None` to resolve the default namespace.
    pub fn resolve(&self, prefix: Option<&str>) -> Option<&str> {
        for frame in self.stack.iter().rev() {
            for (p, uri) in frame.iter().rev() {
                if p.as_deref() == prefix {
                    if uri.is_empty() {
                        return None;
                    }
                    return Some(uri.as_str());
                }
            }
        }
        None
    }
}
