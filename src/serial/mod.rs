//! XML and HTML serialization.
//!
//! This module serializes a `Document` tree back to markup. Serialization
//! is a pure function of the current tree: it never modifies the document,
//! so a freshly parsed, unmodified document always serializes to the same
//! text.
//!
//! String output is UTF-8. Byte output ([`serialize_to_bytes`],
//! [`write_to`]) is encoded with the requested encoding, falling back to
//! the document's declared encoding and then UTF-8; characters the target
//! encoding cannot represent become numeric character references.

pub mod xml;

use std::io::Write;

use tracing::debug;

pub use xml::{
    fragments, serialize, serialize_node, serialize_with_options, Fragments, SerializeOptions,
};
pub(crate) use xml::write_node;

use crate::encoding;
use crate::error::Result;
use crate::tree::Document;

/// Serializes a document and encodes the result.
///
/// The encoding is [`SerializeOptions::encoding`] if set, else the
/// document's declared encoding, else UTF-8. The XML declaration, when
/// requested, names the encoding actually used.
///
/// Output in any encoding other than UTF-8 always starts with the XML
/// declaration (except in HTML mode), and UTF-16 output also with a
/// byte-order mark, so it can be parsed again.
///
/// # Errors
///
/// Returns [`Error::Encoding`](crate::Error::Encoding) for an unknown
/// encoding label.
///
/// # Examples
///
/// ```
/// use xmlsift::Document;
/// use xmlsift::serial::{serialize_to_bytes, SerializeOptions};
///
/// let doc = Document::parse_str("<p>caf\u{e9} \u{20ac}</p>").unwrap();
/// let opts = SerializeOptions::default().encoding("iso-8859-1");
/// assert_eq!(
///     serialize_to_bytes(&doc, &opts).unwrap(),
///     b"<?xml version=\"1.0\" encoding=\"iso-8859-1\"?>\n<p>caf\xE9 &#8364;</p>"
/// );
/// ```
pub fn serialize_to_bytes(doc: &Document, options: &SerializeOptions) -> Result<Vec<u8>> {
    let label = options
        .encoding
        .as_deref()
        .or(doc.encoding.as_deref())
        .unwrap_or("UTF-8");
    let target = encoding::lookup(label)?;
    let mut options = options.clone();
    options.encoding = Some(label.to_string());
    if target != encoding_rs::UTF_8 {
        options.xml_declaration = true;
    }
    let text = serialize_with_options(doc, &options);
    debug!(encoding = target.name(), bytes = text.len(), "serialized document");
    let mut bytes = encoding::bom(target).to_vec();
    bytes.extend(encoding::encode(&text, target));
    Ok(bytes)
}

/// Serializes a document into `writer`, encoded as for
/// [`serialize_to_bytes`]. UTF-8 output is streamed fragment by fragment.
///
/// # Errors
///
/// Returns [`Error::Encoding`](crate::Error::Encoding) for an unknown
/// encoding label and [`Error::Io`](crate::Error::Io) when the writer
/// fails.
pub fn write_to<W: Write>(doc: &Document, options: &SerializeOptions, mut writer: W) -> Result<()> {
    let label = options
        .encoding
        .as_deref()
        .or(doc.encoding.as_deref())
        .unwrap_or("UTF-8");
    let target = encoding::lookup(label)?;
    if target == encoding_rs::UTF_8 {
        let mut options = options.clone();
        options.encoding = Some(label.to_string());
        for fragment in fragments(doc, doc.root(), &options)? {
            writer.write_all(fragment.as_bytes())?;
        }
    } else {
        writer.write_all(&serialize_to_bytes(doc, options)?)?;
    }
    writer.flush()?;
    Ok(())
}
