//! XML and HTML parsing.
//!
//! Parsing is a single forward pass: a [`Lexer`] scans the input into
//! [`Token`]s and the tree builder consumes them, one token of lookahead at
//! a time, into a [`Document`]. The input is pulled from any
//! [`std::io::Read`] through a bounded buffer, so large documents are never
//! held in memory as raw bytes.
//!
//! There is no global parser state. Each parse call creates its own lexer,
//! builder and namespace scope stack from the [`ParseOptions`] it is given.

mod builder;
pub mod lexer;
pub(crate) mod namespace;
pub(crate) mod source;

pub use lexer::{tokenize, Lexeme, Lexer, Token};
pub use namespace::{XMLNS_NAMESPACE, XML_NAMESPACE};

use std::io::Read;

use crate::error::Result;
use crate::tree::Document;

/// Default maximum element nesting depth.
pub const DEFAULT_MAX_DEPTH: u32 = 256;

/// Default maximum number of attributes on a single element.
pub const DEFAULT_MAX_ATTRIBUTES: u32 = 256;

/// Default maximum length in bytes of an attribute value.
pub const DEFAULT_MAX_ATTRIBUTE_LENGTH: usize = 10 * 1024 * 1024;

/// Default maximum length in bytes of a text node.
pub const DEFAULT_MAX_TEXT_LENGTH: usize = 10 * 1024 * 1024;

/// Default maximum length in bytes of an element or attribute name.
pub const DEFAULT_MAX_NAME_LENGTH: usize = 50_000;

/// Markup dialect the lexer and builder accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    /// XML 1.0 with namespaces.
    #[default]
    Xml,
    /// HTML: case-insensitive names, unquoted attributes, raw-text
    /// elements and the HTML character reference table.
    Html,
}

/// Parse options controlling dialect, recovery and security limits.
///
/// Recovery is never implied: the default is strict XML, and lenient
/// parsing must be requested with [`recover`](Self::recover) or the
/// [`html`](Self::html) preset.
///
/// ```
/// use xmlsift::parser::ParseOptions;
///
/// let opts = ParseOptions::default()
///     .recover(true)
///     .no_blanks(true)
///     .max_depth(128);
/// assert!(opts.recover);
/// ```
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Markup dialect.
    pub mode: ParseMode,
    /// If true, apply the documented recovery action for structural errors
    /// instead of failing, recording each as a diagnostic.
    pub recover: bool,
    /// If true, drop whitespace-only text nodes.
    pub no_blanks: bool,
    /// Caller-declared input encoding label, overriding any in-document
    /// declaration (but not a byte-order mark).
    pub encoding: Option<String>,

    // -- Security limits --
    /// Maximum element nesting depth (default: 256).
    pub max_depth: u32,
    /// Maximum number of attributes on a single element (default: 256).
    pub max_attributes: u32,
    /// Maximum length in bytes of a single attribute value (default: 10 MB).
    pub max_attribute_length: usize,
    /// Maximum length in bytes of a single text node (default: 10 MB).
    pub max_text_length: usize,
    /// Maximum length in bytes of an element or attribute name (default: 50,000).
    pub max_name_length: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            mode: ParseMode::Xml,
            recover: false,
            no_blanks: false,
            encoding: None,
            max_depth: DEFAULT_MAX_DEPTH,
            max_attributes: DEFAULT_MAX_ATTRIBUTES,
            max_attribute_length: DEFAULT_MAX_ATTRIBUTE_LENGTH,
            max_text_length: DEFAULT_MAX_TEXT_LENGTH,
            max_name_length: DEFAULT_MAX_NAME_LENGTH,
        }
    }
}

impl ParseOptions {
    /// The HTML preset: HTML mode with recovery enabled.
    #[must_use]
    pub fn html() -> Self {
        Self::default().mode(ParseMode::Html).recover(true)
    }

    /// Sets the markup dialect.
    #[must_use]
    pub fn mode(mut self, mode: ParseMode) -> Self {
        self.mode = mode;
        self
    }

    /// Enables or disables error recovery mode.
    #[must_use]
    pub fn recover(mut self, yes: bool) -> Self {
        self.recover = yes;
        self
    }

    /// Enables or disables stripping of blank text nodes.
    #[must_use]
    pub fn no_blanks(mut self, yes: bool) -> Self {
        self.no_blanks = yes;
        self
    }

    /// Declares the input encoding by label (e.g. `"ISO-8859-1"`).
    #[must_use]
    pub fn encoding(mut self, label: &str) -> Self {
        self.encoding = Some(label.to_string());
        self
    }

    /// Sets the maximum element nesting depth.
    #[must_use]
    pub fn max_depth(mut self, max: u32) -> Self {
        self.max_depth = max;
        self
    }

    /// Sets the maximum number of attributes per element.
    #[must_use]
    pub fn max_attributes(mut self, max: u32) -> Self {
        self.max_attributes = max;
        self
    }

    /// Sets the maximum attribute value length in bytes.
    #[must_use]
    pub fn max_attribute_length(mut self, max: usize) -> Self {
        self.max_attribute_length = max;
        self
    }

    /// Sets the maximum text node length in bytes.
    #[must_use]
    pub fn max_text_length(mut self, max: usize) -> Self {
        self.max_text_length = max;
        self
    }

    /// Sets the maximum element/attribute name length in bytes.
    #[must_use]
    pub fn max_name_length(mut self, max: usize) -> Self {
        self.max_name_length = max;
        self
    }
}

/// Parses an XML string with default options.
///
/// # Errors
///
/// Returns the first error if the input is not well-formed XML.
pub fn parse_str(input: &str) -> Result<Document> {
    parse_str_with_options(input, &ParseOptions::default())
}

/// Parses a string with the given options.
///
/// The string is already decoded, so any encoding named in the options or
/// the document's declaration is recorded but not applied.
///
/// # Errors
///
/// Returns the first error if the input is malformed and recovery does not
/// apply.
pub fn parse_str_with_options(input: &str, options: &ParseOptions) -> Result<Document> {
    let mut options = options.clone();
    options.encoding = Some("UTF-8".to_string());
    parse_reader(input.as_bytes(), &options)
}

/// Parses raw bytes, detecting the encoding.
///
/// # Errors
///
/// Returns [`Error::Encoding`](crate::Error::Encoding) for undecodable
/// input, otherwise as for [`parse_str`].
pub fn parse_bytes(input: &[u8], options: &ParseOptions) -> Result<Document> {
    parse_reader(input, options)
}

/// Parses from a reader, pulling input incrementally.
///
/// # Errors
///
/// Returns [`Error::Io`](crate::Error::Io) if the reader fails, otherwise as
/// for [`parse_bytes`].
pub fn parse_reader<R: Read>(reader: R, options: &ParseOptions) -> Result<Document> {
    let lexer = tokenize(reader, options)?;
    builder::TreeBuilder::new(options).build(lexer)
}
