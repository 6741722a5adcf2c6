//! Encoding selection and output transcoding.
//!
//! Input decoding itself is streaming and lives in the parser's character
//! source; this module decides *which* encoding to decode with and converts
//! serialized output back into bytes.
//!
//! # Encoding Selection
//!
//! The first bytes of the input are inspected once, before any decoding:
//!
//! 1. A Byte Order Mark wins unconditionally and is skipped.
//! 2. Otherwise an encoding label supplied by the caller is used.
//! 3. Otherwise an `encoding="..."` pseudo-attribute in a leading XML
//!    declaration (or, for HTML, a `<meta charset>` in the first kilobyte)
//!    is honored. These are read as ASCII, which every supported
//!    non-UTF-16 encoding agrees with for those bytes.
//! 4. Otherwise the input is UTF-8.

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};

use crate::error::{Error, Result};

/// Number of leading bytes inspected for a BOM or an encoding declaration.
pub const SNIFF_LEN: usize = 1024;

/// Detects a Byte Order Mark at the start of `bytes`.
///
/// Returns the indicated encoding and the number of BOM bytes to skip.
///
/// # Examples
///
/// ```
/// use xmlsift::encoding::detect_bom;
///
/// let (enc, skip) = detect_bom(b"\xEF\xBB\xBFhello").unwrap();
/// assert_eq!(enc.name(), "UTF-8");
/// assert_eq!(skip, 3);
///
/// assert!(detect_bom(b"<root/>").is_none());
/// ```
#[must_use]
pub fn detect_bom(bytes: &[u8]) -> Option<(&'static Encoding, usize)> {
    Encoding::for_bom(bytes)
}

/// Looks up an encoding by its WHATWG label (case-insensitive).
///
/// # Errors
///
/// Returns [`Error::Encoding`] at byte offset 0 if the label is unknown.
pub fn lookup(label: &str) -> Result<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| Error::Encoding {
        message: format!("unsupported encoding: {label}"),
        byte_offset: 0,
    })
}

/// Chooses the input encoding from the first bytes of the stream.
///
/// `prefix` should hold up to [`SNIFF_LEN`] bytes (fewer only at end of
/// input). Returns the encoding to decode with and the number of BOM bytes
/// to skip.
///
/// # Errors
///
/// Returns [`Error::Encoding`] if a caller-declared or in-document label is
/// not a known encoding.
pub fn select(
    prefix: &[u8],
    declared: Option<&str>,
    html: bool,
) -> Result<(&'static Encoding, usize)> {
    if let Some(found) = detect_bom(prefix) {
        return Ok(found);
    }
    if let Some(label) = declared {
        return Ok((lookup(label)?, 0));
    }
    let in_document = if html {
        sniff_meta_charset(prefix)
    } else {
        sniff_xml_declaration(prefix)
    };
    if let Some(label) = in_document {
        let encoding = lookup(&label)?;
        // A UTF-16 label read through ASCII bytes is self-contradictory.
        if encoding != UTF_16LE && encoding != UTF_16BE {
            return Ok((encoding, 0));
        }
        tracing::debug!(label = %label, "ignoring UTF-16 declaration without a BOM");
    }
    Ok((UTF_8, 0))
}

/// Extracts the `encoding` pseudo-attribute from a leading XML declaration,
/// treating the bytes as ASCII.
fn sniff_xml_declaration(bytes: &[u8]) -> Option<String> {
    if !bytes.starts_with(b"<?xml") {
        return None;
    }
    let decl_end = memchr::memmem::find(bytes, b"?>")?;
    let decl = &bytes[..decl_end];

    let enc_pos = memchr::memmem::find(decl, b"encoding")?;
    let after_enc = skip_ascii_whitespace(&decl[enc_pos + b"encoding".len()..]);
    let after_eq = skip_ascii_whitespace(after_enc.strip_prefix(b"=")?);

    quoted_ascii(after_eq)
}

/// Finds `charset=` inside the first `<meta` tag that has one.
fn sniff_meta_charset(bytes: &[u8]) -> Option<String> {
    let lower = bytes.to_ascii_lowercase();
    let mut from = 0;
    while let Some(rel) = memchr::memmem::find(&lower[from..], b"<meta") {
        let start = from + rel;
        let end = memchr::memchr(b'>', &lower[start..]).map_or(lower.len(), |e| start + e);
        let tag = &lower[start..end];
        if let Some(pos) = memchr::memmem::find(tag, b"charset") {
            let rest = skip_ascii_whitespace(&tag[pos + b"charset".len()..]);
            let rest = skip_ascii_whitespace(rest.strip_prefix(b"=")?);
            if let Some(value) = quoted_ascii(rest) {
                return Some(value);
            }
            let value: Vec<u8> = rest
                .iter()
                .copied()
                .take_while(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b':' | b'.'))
                .collect();
            if !value.is_empty() {
                return String::from_utf8(value).ok();
            }
        }
        from = end;
    }
    None
}

fn quoted_ascii(bytes: &[u8]) -> Option<String> {
    let quote = *bytes.first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let rest = &bytes[1..];
    let end = memchr::memchr(quote, rest)?;
    let value = &rest[..end];
    if value.is_ascii() && !value.is_empty() {
        String::from_utf8(value.to_vec()).ok()
    } else {
        None
    }
}

/// Skips leading ASCII whitespace bytes (space, tab, CR, LF).
fn skip_ascii_whitespace(bytes: &[u8]) -> &[u8] {
    let skip = bytes
        .iter()
        .take_while(|&&b| matches!(b, b' ' | b'\t' | b'\r' | b'\n'))
        .count();
    &bytes[skip..]
}

/// Encodes serialized text into `encoding`.
///
/// Characters the encoding cannot represent are written as decimal numeric
/// character references (`&#8364;`), so the output remains a faithful
/// rendering of the document. UTF-16 output carries no BOM.
///
/// # Examples
///
/// ```
/// use xmlsift::encoding::{encode, lookup};
///
/// let latin1 = lookup("iso-8859-1").unwrap();
/// assert_eq!(encode("caf\u{e9} \u{20ac}", latin1), b"caf\xE9 &#8364;");
/// ```
#[must_use]
pub fn encode(text: &str, encoding: &'static Encoding) -> Vec<u8> {
    if encoding == UTF_16LE {
        return text.encode_utf16().flat_map(u16::to_le_bytes).collect();
    }
    if encoding == UTF_16BE {
        return text.encode_utf16().flat_map(u16::to_be_bytes).collect();
    }
    let (bytes, _, _) = encoding.encode(text);
    bytes.into_owned()
}

/// The byte-order mark written ahead of `encoding` output. Only the
/// UTF-16 encodings get one, since input UTF-16 is only recognized by it.
#[must_use]
pub fn bom(encoding: &'static Encoding) -> &'static [u8] {
    if encoding == UTF_16LE {
        b"\xFF\xFE"
    } else if encoding == UTF_16BE {
        b"\xFE\xFF"
    } else {
        b""
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_bom_detection() {
        assert_eq!(detect_bom(b"\xFE\xFF\x00<"), Some((UTF_16BE, 2)));
        assert_eq!(detect_bom(b"\xFF\xFE<\x00"), Some((UTF_16LE, 2)));
        assert_eq!(detect_bom(b""), None);
        assert_eq!(detect_bom(b"\xEF"), None);
    }

    #[test]
    fn test_select_precedence_bom_beats_declared() {
        let (enc, skip) = select(b"\xEF\xBB\xBF<a/>", Some("latin1"), false).unwrap();
        assert_eq!(enc, UTF_8);
        assert_eq!(skip, 3);
    }

    #[test]
    fn test_select_precedence_declared_beats_document() {
        let input = b"<?xml version=\"1.0\" encoding=\"UTF-8\"?><a/>";
        let (enc, _) = select(input, Some("windows-1252"), false).unwrap();
        assert_eq!(enc.name(), "windows-1252");
    }

    #[test]
    fn test_select_uses_xml_declaration() {
        let input = b"<?xml version='1.0' encoding = 'ISO-8859-1'?><a/>";
        let (enc, skip) = select(input, None, false).unwrap();
        assert_eq!(enc.name(), "windows-1252");
        assert_eq!(skip, 0);
    }

    #[test]
    fn test_select_defaults_to_utf8() {
        assert_eq!(select(b"<a/>", None, false).unwrap(), (UTF_8, 0));
        assert_eq!(select(b"", None, false).unwrap(), (UTF_8, 0));
    }

    #[test]
    fn test_select_unknown_label_is_error() {
        let err = select(b"<a/>", Some("klingon"), false).unwrap_err();
        assert!(matches!(err, Error::Encoding { byte_offset: 0, .. }));
    }

    #[test]
    fn test_select_ignores_utf16_declaration_without_bom() {
        let input = b"<?xml version=\"1.0\" encoding=\"UTF-16\"?><a/>";
        assert_eq!(select(input, None, false).unwrap(), (UTF_8, 0));
    }

    #[test]
    fn test_meta_charset_sniffing() {
        let input = b"<html><head><META http-equiv=x Charset=\"Shift_JIS\"></head>";
        let (enc, _) = select(input, None, true).unwrap();
        assert_eq!(enc.name(), "Shift_JIS");

        let input = b"<html><head><meta charset=koi8-r></head>";
        let (enc, _) = select(input, None, true).unwrap();
        assert_eq!(enc.name(), "KOI8-R");
    }

    #[test]
    fn test_xml_declaration_ignored_in_html_mode() {
        let input = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><html/>";
        assert_eq!(select(input, None, true).unwrap(), (UTF_8, 0));
    }

    #[test]
    fn test_encode_utf16() {
        assert_eq!(encode("a\u{e9}", UTF_16LE), vec![b'a', 0, 0xE9, 0]);
        assert_eq!(encode("a", UTF_16BE), vec![0, b'a']);
        assert_eq!(detect_bom(bom(UTF_16BE)), Some((UTF_16BE, 2)));
        assert!(bom(UTF_8).is_empty());
    }

    #[test]
    fn test_encode_unmappable_becomes_char_ref() {
        let ascii = lookup("us-ascii").unwrap();
        // us-ascii is an alias of windows-1252 in the Encoding Standard.
        assert_eq!(encode("\u{3042}", ascii), b"&#12354;");
    }
}
