//! HTML support.
//!
//! HTML goes through the same lexer and tree builder as XML, switched into
//! [`ParseMode::Html`]. This module holds the HTML element tables the
//! builder consults and the [`HtmlDocument`] convenience wrapper. With
//! [`ParseOptions::html`] the parser tolerates common real-world markup:
//!
//! - Missing closing tags (auto-closed based on HTML content model rules)
//! - Unquoted attribute values (`<div class=main>`)
//! - Void elements that never need closing (`<br>`, `<img>`, `<hr>`, etc.)
//! - Case-insensitive tag names
//! - Bare `&` characters and the HTML named character references
//! - Attributes without values (`<input disabled>`)
//!
//! # Examples
//!
//! ```
//! use xmlsift::html::parse_html;
//!
//! let doc = parse_html("<title>Hi</title><p>Hello <b>world</b>").unwrap();
//! assert_eq!(doc.title().as_deref(), Some("Hi"));
//! assert_eq!(doc.body().unwrap().text(), "Hello world");
//! ```

pub mod entities;

use std::io::Read;
use std::ops::{Deref, DerefMut};

use crate::error::Result;
use crate::parser::{self, ParseMode, ParseOptions};
use crate::tree::{Document, NodeRef};

// --- Element tables ---

/// Returns true if the given tag name (lowercase) is a void element that
/// must not have content.
pub(crate) fn is_void_element(tag: &str) -> bool {
    matches!(
        tag,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
            | "basefont"
            | "frame"
            | "isindex"
    )
}

/// Returns true if opening `tag` implicitly closes an open `open_tag`.
///
/// A `<p>` closes a previous `<p>`, a `<li>` closes a previous `<li>`,
/// and so on, following the optional end tag rules of HTML 4.01.
pub(crate) fn auto_closes(open_tag: &str, tag: &str) -> bool {
    match open_tag {
        "p" => matches!(
            tag,
            "p" | "div"
                | "ul"
                | "ol"
                | "dl"
                | "pre"
                | "table"
                | "blockquote"
                | "address"
                | "h1"
                | "h2"
                | "h3"
                | "h4"
                | "h5"
                | "h6"
                | "hr"
                | "form"
                | "fieldset"
                | "section"
                | "article"
                | "aside"
                | "header"
                | "footer"
                | "nav"
                | "figure"
                | "main"
                | "details"
        ),
        "li" => tag == "li",
        "dt" | "dd" => matches!(tag, "dt" | "dd"),
        "tr" => tag == "tr",
        "td" | "th" => matches!(tag, "td" | "th" | "tr"),
        "thead" | "tbody" => matches!(tag, "tbody" | "tfoot"),
        "tfoot" => tag == "tbody",
        "option" => matches!(tag, "option" | "optgroup"),
        "optgroup" => tag == "optgroup",
        "colgroup" => matches!(tag, "thead" | "tbody" | "tfoot" | "tr" | "colgroup"),
        _ => false,
    }
}

/// Returns true if `tag` is a raw text element whose content is not parsed
/// as markup.
pub(crate) fn is_raw_text_element(tag: &str) -> bool {
    matches!(tag, "script" | "style")
}

/// Returns true if `tag` belongs in `<head>` until body content appears.
pub(crate) fn is_head_content_element(tag: &str) -> bool {
    matches!(
        tag,
        "title" | "meta" | "link" | "base" | "style" | "script" | "noscript"
    )
}

// --- Documents ---

/// A parsed HTML document.
///
/// Dereferences to [`Document`], so the whole tree, query and edit API is
/// available; this type only adds accessors for the standard page
/// structure.
#[derive(Debug, Clone)]
pub struct HtmlDocument {
    doc: Document,
}

impl HtmlDocument {
    /// Parses HTML with the [`ParseOptions::html`] preset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyDocument`](crate::Error::EmptyDocument) if the
    /// input has no content, and lexer errors (such as limits) otherwise.
    pub fn parse(input: &str) -> Result<Self> {
        Self::parse_with_options(input, &ParseOptions::html())
    }

    /// Parses HTML with the given options. The mode is forced to
    /// [`ParseMode::Html`].
    ///
    /// # Errors
    ///
    /// See [`parse`](Self::parse).
    pub fn parse_with_options(input: &str, options: &ParseOptions) -> Result<Self> {
        let options = options.clone().mode(ParseMode::Html);
        parser::parse_str_with_options(input, &options).map(Self::from)
    }

    /// Parses HTML bytes, honoring a `<meta charset>` declaration.
    ///
    /// # Errors
    ///
    /// See [`parse`](Self::parse); also fails on undecodable input.
    pub fn parse_reader<R: Read>(reader: R, options: &ParseOptions) -> Result<Self> {
        let options = options.clone().mode(ParseMode::Html);
        parser::parse_reader(reader, &options).map(Self::from)
    }

    /// The `<head>` element.
    #[must_use]
    pub fn head(&self) -> Option<NodeRef<'_>> {
        self.doc.root_element()?.first_child_by_tag("head", None)
    }

    /// The `<body>` element.
    #[must_use]
    pub fn body(&self) -> Option<NodeRef<'_>> {
        self.doc.root_element()?.first_child_by_tag("body", None)
    }

    /// The text of the `<title>` element in `<head>`, whitespace-trimmed.
    #[must_use]
    pub fn title(&self) -> Option<String> {
        let title = self.head()?.first_child_by_tag("title", None)?;
        Some(title.text().trim().to_string())
    }

    /// Unwraps the underlying document.
    #[must_use]
    pub fn into_inner(self) -> Document {
        self.doc
    }
}

impl From<Document> for HtmlDocument {
    fn from(doc: Document) -> Self {
        Self { doc }
    }
}

impl Deref for HtmlDocument {
    type Target = Document;

    fn deref(&self) -> &Document {
        &self.doc
    }
}

impl DerefMut for HtmlDocument {
    fn deref_mut(&mut self) -> &mut Document {
        &mut self.doc
    }
}

/// Parses an HTML string with the [`ParseOptions::html`] preset.
///
/// # Errors
///
/// See [`HtmlDocument::parse`].
pub fn parse_html(input: &str) -> Result<HtmlDocument> {
    HtmlDocument::parse(input)
}
