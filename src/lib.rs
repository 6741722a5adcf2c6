//! # xmlsift
//!
//! XML and HTML parsing into a mutable document tree, with XPath 1.0 and
//! CSS queries and a lazy serializer.
//!
//! Input is decoded incrementally from any [`std::io::Read`], tokenized in a
//! single forward pass and built into a [`Document`]: an arena of nodes
//! addressed by generation-checked [`NodeId`] handles. Handles into a
//! subtree that has since been detached or removed fail with
//! [`Error::StaleReference`] instead of reading stale data.
//!
//! ## Quick Start
//!
//! ```
//! use xmlsift::Document;
//!
//! let doc = Document::parse_str(r#"<a><b id="1">x</b><b id="2">y</b></a>"#).unwrap();
//! let hits = doc.xpath(r#"//b[@id="2"]"#).unwrap();
//! assert_eq!(hits.len(), 1);
//! assert_eq!(doc.resolve(&hits[0]).unwrap().text(), "y");
//! ```
//!
//! ## Modules
//!
//! - [`parser`]: parse options and entry points, lexer, tree builder
//! - [`tree`]: the document model and its edit operations
//! - [`xpath`]: query compilation and evaluation
//! - [`css`]: CSS selector translation
//! - [`serial`]: serialization to text and bytes
//! - [`html`]: HTML documents
//! - [`sync`]: sharing a document across threads
//! - [`encoding`]: input sniffing and output encoding

pub mod css;
pub mod encoding;
pub mod error;
pub mod html;
pub mod parser;
pub mod serial;
pub mod sync;
pub mod tree;
pub mod xpath;

// Re-export primary types at the crate root for convenience.
pub use error::{Error, ErrorSeverity, ParseDiagnostic, Result, SourceLocation};
pub use html::HtmlDocument;
pub use parser::{ParseMode, ParseOptions};
pub use sync::SharedDocument;
pub use tree::{AttrId, AttrRef, Attribute, Document, NodeId, NodeKind, NodeRef};
pub use xpath::{Item, ItemRef, NodeSet, Query, XPathValue};
