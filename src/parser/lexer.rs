//! Streaming tokenizer.
//!
//! The [`Lexer`] scans a decoded character stream into a lazy sequence of
//! [`Token`]s. It is a single forward pass with one token of lookahead and
//! never re-reads consumed input, so it can run over a socket or a pipe
//! without buffering the whole document.
//!
//! Whitespace-only text between tags is reported as ordinary [`Token::Text`];
//! deciding what to keep is the tree builder's job.
//!
//! # Examples
//!
//! ```
//! use xmlsift::parser::{tokenize, ParseOptions, Token};
//!
//! let tokens: Vec<Token> = tokenize(&b"<a x='1'>hi</a>"[..], &ParseOptions::default())
//!     .unwrap()
//!     .map(|lexeme| lexeme.unwrap().token)
//!     .collect();
//! assert_eq!(tokens.len(), 3);
//! assert_eq!(tokens[1], Token::Text("hi".to_string()));
//! ```

use std::borrow::Cow;
use std::io::Read;

use encoding_rs::Encoding;

use super::namespace::{is_name_char, is_name_start_char, is_xml_char};
use super::source::CharSource;
use super::{ParseMode, ParseOptions};
use crate::error::{Error, Result, SourceLocation};
use crate::html::{entities, is_raw_text_element};

/// A single lexical unit of markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// `<name attr="value" ...>` or `<name .../>`.
    StartTag {
        name: String,
        /// Attributes in source order, values with references expanded.
        attributes: Vec<(String, String)>,
        self_closing: bool,
    },
    /// `</name>`.
    EndTag { name: String },
    /// Character data with references expanded and line endings normalized.
    Text(String),
    /// `<!-- ... -->`.
    Comment(String),
    /// `<![CDATA[ ... ]]>`.
    CData(String),
    /// `<?target data?>`, including the XML declaration (target `xml`).
    ProcessingInstruction { target: String, data: String },
}

/// A token together with where it started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lexeme {
    pub token: Token,
    pub location: SourceLocation,
}

/// Creates a lexer over `reader`.
///
/// The encoding is chosen from the first bytes of the stream (see
/// [`crate::encoding`]).
///
/// # Errors
///
/// Returns [`Error::Io`] if the first read fails, or [`Error::Encoding`] if a
/// declared encoding label is unknown.
pub fn tokenize<R: Read>(reader: R, options: &ParseOptions) -> Result<Lexer<R>> {
    Lexer::new(reader, options)
}

/// The streaming tokenizer. See the [module documentation](self).
pub struct Lexer<R> {
    src: CharSource<R>,
    options: ParseOptions,
    /// Set after the first error or the end of input.
    done: bool,
    /// One token of lookahead.
    peeked: Option<Option<Result<Lexeme>>>,
    /// Name of the raw-text element whose content comes next (HTML only).
    raw_text: Option<String>,
    emitted_any: bool,
}

impl<R: Read> Lexer<R> {
    /// Creates a lexer. See [`tokenize`].
    ///
    /// # Errors
    ///
    /// See [`tokenize`].
    pub fn new(reader: R, options: &ParseOptions) -> Result<Self> {
        let src = CharSource::new(
            reader,
            options.encoding.as_deref(),
            options.mode == ParseMode::Html,
        )?;
        Ok(Self {
            src,
            options: options.clone(),
            done: false,
            peeked: None,
            raw_text: None,
            emitted_any: false,
        })
    }

    /// The encoding the input is being decoded with.
    #[must_use]
    pub fn encoding(&self) -> &'static Encoding {
        self.src.encoding()
    }

    /// Current read position (the end of the last token).
    #[must_use]
    pub fn location(&self) -> SourceLocation {
        self.src.location()
    }

    /// Returns the next token without consuming it.
    pub fn peek(&mut self) -> Option<&Result<Lexeme>> {
        if self.peeked.is_none() {
            let next = self.lex_next();
            self.peeked = Some(next);
        }
        self.peeked.as_ref().and_then(Option::as_ref)
    }

    fn html(&self) -> bool {
        self.options.mode == ParseMode::Html
    }

    /// Strict mode: unknown references and similar slips are fatal.
    fn strict(&self) -> bool {
        !self.html() && !self.options.recover
    }

    fn lex_next(&mut self) -> Option<Result<Lexeme>> {
        if self.done {
            return None;
        }
        match self.lex_token() {
            Ok(Some(lexeme)) => {
                self.emitted_any = true;
                Some(Ok(lexeme))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }

    fn lex_token(&mut self) -> Result<Option<Lexeme>> {
        loop {
            let location = self.src.location();
            if let Some(element) = self.raw_text.take() {
                if let Some(text) = self.raw_text_content(&element)? {
                    return Ok(Some(Lexeme {
                        token: Token::Text(text),
                        location,
                    }));
                }
            }
            let Some(c) = self.src.peek()? else {
                return Ok(None);
            };
            let token = if c == '<' && self.starts_markup()? {
                self.markup(location)?
            } else {
                Some(self.text()?)
            };
            // `None` means the construct was skipped (DOCTYPE, bogus markup).
            if let Some(token) = token {
                return Ok(Some(Lexeme { token, location }));
            }
        }
    }

    /// Whether the `<` at the read position begins markup. In XML every `<`
    /// does; in HTML a `<` followed by anything else is literal text.
    fn starts_markup(&mut self) -> Result<bool> {
        if !self.html() {
            return Ok(true);
        }
        self.src.ensure(2)?;
        Ok(self.src.window()[1..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || matches!(c, '/' | '!' | '?')))
    }

    // ---------------------------------------------------------------------
    // Markup
    // ---------------------------------------------------------------------

    fn markup(&mut self, start: SourceLocation) -> Result<Option<Token>> {
        if self.src.starts_with("<!--")? {
            return self.comment(start).map(Some);
        }
        if self.src.starts_with("<![CDATA[")? {
            return self.cdata(start).map(Some);
        }
        let doctype = if self.html() {
            self.src.starts_with_ci("<!doctype")?
        } else {
            self.src.starts_with("<!DOCTYPE")?
        };
        if doctype {
            self.skip_doctype(start)?;
            return Ok(None);
        }
        if self.src.starts_with("<!")? {
            if self.html() {
                self.skip_bogus(start)?;
                return Ok(None);
            }
            return Err(Error::syntax("unsupported markup declaration", start));
        }
        if self.src.starts_with("<?")? {
            return self.processing_instruction(start).map(Some);
        }
        if self.src.starts_with("</")? {
            return self.end_tag(start);
        }
        self.start_tag(start).map(Some)
    }

    fn comment(&mut self, start: SourceLocation) -> Result<Token> {
        self.src.advance(4);
        let Some(end) = self.src.find("-->")? else {
            return Err(Error::UnexpectedEof {
                context: "comment",
                location: start,
            });
        };
        let content = normalize_newlines(&self.src.window()[..end]).into_owned();
        self.check_text_length(content.len(), start)?;
        if self.strict() && (content.contains("--") || content.ends_with('-')) {
            return Err(Error::syntax("'--' is not allowed inside a comment", start));
        }
        self.src.advance(end + 3);
        Ok(Token::Comment(content))
    }

    fn cdata(&mut self, start: SourceLocation) -> Result<Token> {
        self.src.advance(9);
        let Some(end) = self.src.find("]]>")? else {
            return Err(Error::UnexpectedEof {
                context: "CDATA section",
                location: start,
            });
        };
        let content = normalize_newlines(&self.src.window()[..end]).into_owned();
        self.check_text_length(content.len(), start)?;
        self.src.advance(end + 3);
        Ok(Token::CData(content))
    }

    /// Skips `<!DOCTYPE ...>` including an internal subset in brackets.
    fn skip_doctype(&mut self, start: SourceLocation) -> Result<()> {
        let mut depth = 0u32;
        let mut quote: Option<char> = None;
        self.src.advance(2);
        loop {
            let Some(c) = self.src.next_char()? else {
                return Err(Error::UnexpectedEof {
                    context: "DOCTYPE declaration",
                    location: start,
                });
            };
            match (quote, c) {
                (Some(q), c) if c == q => quote = None,
                (Some(_), _) => {}
                (None, '"' | '\'') => quote = Some(c),
                (None, '[') => depth += 1,
                (None, ']') => depth = depth.saturating_sub(1),
                (None, '>') if depth == 0 => break,
                _ => {}
            }
        }
        tracing::trace!(line = start.line, "skipped DOCTYPE declaration");
        Ok(())
    }

    /// Skips HTML markup we don't model (`<!...>`, conditional comments).
    fn skip_bogus(&mut self, start: SourceLocation) -> Result<()> {
        let end = self.src.find_byte(0, |b| b == b'>')?;
        let len = self.src.window().len();
        self.src.advance((end + 1).min(len));
        tracing::trace!(line = start.line, "skipped bogus markup declaration");
        Ok(())
    }

    fn processing_instruction(&mut self, start: SourceLocation) -> Result<Token> {
        self.src.advance(2);
        let target = self.name(start)?;
        if target.is_empty() {
            return Err(Error::syntax("processing instruction without a target", start));
        }
        if !self.html() && target.eq_ignore_ascii_case("xml") && (target != "xml" || self.emitted_any) {
            return Err(Error::syntax(
                "the XML declaration is only allowed at the start of the document",
                start,
            ));
        }

        let terminator = if self.html() { ">" } else { "?>" };
        let Some(end) = self.src.find(terminator)? else {
            return Err(Error::UnexpectedEof {
                context: "processing instruction",
                location: start,
            });
        };
        let raw = &self.src.window()[..end];
        let raw = if self.html() { raw.strip_suffix('?').unwrap_or(raw) } else { raw };
        if !self.html() && !raw.is_empty() && !raw.starts_with(is_xml_whitespace) {
            return Err(Error::syntax(
                format!("expected whitespace after processing instruction target '{target}'"),
                start,
            ));
        }
        let data = normalize_newlines(raw.trim_start_matches(is_xml_whitespace)).into_owned();
        self.src.advance(end + terminator.len());
        Ok(Token::ProcessingInstruction { target, data })
    }

    fn end_tag(&mut self, start: SourceLocation) -> Result<Option<Token>> {
        self.src.advance(2);
        let mut name = self.name(start)?;
        if self.html() {
            // `</>`, `</ x>` and trailing junk are all tolerated.
            self.skip_bogus(start)?;
            if name.is_empty() {
                return Ok(None);
            }
            name.make_ascii_lowercase();
            return Ok(Some(Token::EndTag { name }));
        }
        if name.is_empty() {
            return Err(self.unexpected("element name in end tag", start));
        }
        self.skip_whitespace()?;
        match self.src.next_char()? {
            Some('>') => Ok(Some(Token::EndTag { name })),
            Some(c) => Err(Error::syntax(
                format!("unexpected '{c}' in end tag </{name}>"),
                start,
            )),
            None => Err(Error::UnexpectedEof {
                context: "end tag",
                location: start,
            }),
        }
    }

    fn start_tag(&mut self, start: SourceLocation) -> Result<Token> {
        self.src.advance(1);
        let mut name = self.name(start)?;
        if name.is_empty() {
            return Err(self.unexpected("element name", start));
        }
        if self.html() {
            name.make_ascii_lowercase();
        }

        let mut attributes: Vec<(String, String)> = Vec::new();
        let self_closing = loop {
            let had_space = self.skip_whitespace()?;
            match self.src.peek()? {
                None => {
                    return Err(Error::UnexpectedEof {
                        context: "start tag",
                        location: start,
                    })
                }
                Some('>') => {
                    self.src.advance(1);
                    break false;
                }
                Some('/') => {
                    self.src.advance(1);
                    if self.src.peek()? == Some('>') {
                        self.src.advance(1);
                        break true;
                    }
                    if !self.html() {
                        return Err(self.unexpected("'>' after '/' in start tag", start));
                    }
                }
                Some(_) if !had_space && !attributes.is_empty() && !self.html() => {
                    return Err(Error::syntax(
                        format!("expected whitespace between attributes of <{name}>"),
                        self.src.location(),
                    ));
                }
                Some(_) => {
                    let attr_loc = self.src.location();
                    let Some((attr_name, value)) = self.attribute(&name, start)? else {
                        continue;
                    };
                    if attributes.iter().any(|(n, _)| *n == attr_name) {
                        if self.html() {
                            continue;
                        }
                        return Err(Error::syntax(
                            format!("duplicate attribute '{attr_name}' on <{name}>"),
                            attr_loc,
                        ));
                    }
                    if attributes.len() >= self.options.max_attributes as usize {
                        return Err(Error::LimitExceeded {
                            limit: "attribute count limit",
                            location: attr_loc,
                        });
                    }
                    attributes.push((attr_name, value));
                }
            }
        };

        if self.html() && !self_closing && is_raw_text_element(&name) {
            self.raw_text = Some(name.clone());
        }
        Ok(Token::StartTag {
            name,
            attributes,
            self_closing,
        })
    }

    /// Lexes one attribute. Returns `None` when HTML junk was skipped.
    fn attribute(
        &mut self,
        element: &str,
        start: SourceLocation,
    ) -> Result<Option<(String, String)>> {
        let loc = self.src.location();
        let mut name = self.name(start)?;
        if name.is_empty() {
            if !self.html() {
                return Err(self.unexpected("attribute name", start));
            }
            self.src.next_char()?;
            return Ok(None);
        }
        if self.html() {
            name.make_ascii_lowercase();
        }
        self.skip_whitespace()?;
        if self.src.peek()? != Some('=') {
            if self.html() {
                return Ok(Some((name, String::new())));
            }
            return Err(Error::syntax(
                format!("attribute '{name}' on <{element}> has no value"),
                loc,
            ));
        }
        self.src.advance(1);
        self.skip_whitespace()?;
        let value = match self.src.peek()? {
            Some(q @ ('"' | '\'')) => {
                self.src.advance(1);
                self.quoted_value(q, start)?
            }
            Some(_) if self.html() => self.unquoted_value(start)?,
            Some(c) => {
                return Err(Error::syntax(
                    format!("attribute value must be quoted, found '{c}'"),
                    self.src.location(),
                ))
            }
            None => {
                return Err(Error::UnexpectedEof {
                    context: "start tag",
                    location: start,
                })
            }
        };
        Ok(Some((name, value)))
    }

    fn quoted_value(&mut self, quote: char, start: SourceLocation) -> Result<String> {
        let q = quote as u8;
        let html = self.html();
        let mut value = String::new();
        loop {
            let i = self
                .src
                .find_byte(0, |b| b == q || b == b'&' || (!html && b == b'<'))?;
            let window = self.src.window();
            value.push_str(&normalize_attribute_whitespace(&window[..i]));
            let stop = window.as_bytes().get(i).copied();
            self.src.advance(i);
            match stop {
                Some(b'&') => {
                    let expanded = self.reference()?;
                    value.push_str(&expanded);
                }
                Some(b'<') => {
                    return Err(Error::syntax(
                        "'<' is not allowed in attribute values",
                        self.src.location(),
                    ))
                }
                Some(_) => {
                    self.src.advance(1);
                    break;
                }
                None => {
                    return Err(Error::UnexpectedEof {
                        context: "attribute value",
                        location: start,
                    })
                }
            }
            self.check_attribute_length(value.len(), start)?;
        }
        self.check_attribute_length(value.len(), start)?;
        Ok(value)
    }

    fn unquoted_value(&mut self, start: SourceLocation) -> Result<String> {
        let mut value = String::new();
        loop {
            let i = self
                .src
                .find_byte(0, |b| b == b'&' || b == b'>' || b.is_ascii_whitespace())?;
            let window = self.src.window();
            value.push_str(&window[..i]);
            let stop = window.as_bytes().get(i).copied();
            self.src.advance(i);
            if stop == Some(b'&') {
                let expanded = self.reference()?;
                value.push_str(&expanded);
            } else {
                break;
            }
        }
        self.check_attribute_length(value.len(), start)?;
        Ok(value)
    }

    // ---------------------------------------------------------------------
    // Character data
    // ---------------------------------------------------------------------

    fn text(&mut self) -> Result<Token> {
        let start = self.src.location();
        let mut text = String::new();
        loop {
            let i = self.src.find_byte(0, |b| b == b'<' || b == b'&')?;
            let window = self.src.window();
            text.push_str(&normalize_newlines(&window[..i]));
            let stop = window.as_bytes().get(i).copied();
            self.src.advance(i);
            self.check_text_length(text.len(), start)?;
            match stop {
                Some(b'&') => {
                    let expanded = self.reference()?;
                    text.push_str(&expanded);
                }
                Some(_) if !self.starts_markup()? => {
                    text.push('<');
                    self.src.advance(1);
                }
                _ => break,
            }
        }
        Ok(Token::Text(text))
    }

    /// Content of `<script>`/`<style>` up to the matching end tag. Returns
    /// `None` when the element is empty.
    fn raw_text_content(&mut self, element: &str) -> Result<Option<String>> {
        let close = format!("</{element}");
        let mut from = 0;
        let end = loop {
            let Some(rel) = self.find_from(from, "</")? else {
                break self.src.window().len();
            };
            let at = from + rel;
            self.src.ensure(at + close.len() + 1)?;
            let window = self.src.window();
            let candidate = window.get(at..at + close.len());
            let after = window[at..].as_bytes().get(close.len()).copied();
            if candidate.is_some_and(|c| c.eq_ignore_ascii_case(&close))
                && after.map_or(true, |b| b == b'>' || b == b'/' || b.is_ascii_whitespace())
            {
                break at;
            }
            from = at + 2;
        };
        if end == 0 {
            return Ok(None);
        }
        let start = self.src.location();
        let text = normalize_newlines(&self.src.window()[..end]).into_owned();
        self.check_text_length(text.len(), start)?;
        self.src.advance(end);
        Ok(Some(text))
    }

    fn find_from(&mut self, from: usize, needle: &str) -> Result<Option<usize>> {
        loop {
            let window = self.src.window();
            if from <= window.len() {
                if let Some(i) = memchr::memmem::find(&window.as_bytes()[from..], needle.as_bytes()) {
                    return Ok(Some(i));
                }
            }
            if !self.src.fill()? {
                return Ok(None);
            }
        }
    }

    /// Expands the reference at the read position (which is on `&`).
    ///
    /// Returns the replacement text. Unknown or malformed references are an
    /// error in strict XML and literal text otherwise.
    fn reference(&mut self) -> Result<Cow<'static, str>> {
        let loc = self.src.location();
        let end = self
            .src
            .find_byte(1, |b| !(b.is_ascii_alphanumeric() || b == b'#'))?;
        let window = self.src.window();
        let body = &window[1..end.max(1)];
        let terminated = window.as_bytes().get(end) == Some(&b';');

        let resolved: Option<char> = if let Some(num) = body.strip_prefix('#') {
            let parsed = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => num.parse::<u32>().ok(),
            };
            parsed
                .and_then(char::from_u32)
                .filter(|&c| is_xml_char(c) && (terminated || self.html()))
        } else if terminated || self.html() {
            predefined_entity(body).or_else(|| {
                if self.html() {
                    entities::lookup_entity(body)
                } else {
                    None
                }
            })
        } else {
            None
        };

        if let Some(c) = resolved {
            let consumed = if terminated { end + 1 } else { end };
            self.src.advance(consumed);
            return Ok(Cow::Owned(c.to_string()));
        }

        if self.strict() {
            let message = if body.is_empty() || body == "#" {
                "'&' must start a reference; write '&amp;'".to_string()
            } else if !terminated {
                format!("reference '&{body}' is missing its ';'")
            } else if body.starts_with('#') {
                format!("invalid character reference '&{body};'")
            } else {
                format!("undefined entity '&{body};'")
            };
            return Err(Error::syntax(message, loc));
        }

        if terminated && !body.is_empty() {
            tracing::warn!(entity = body, line = loc.line, "keeping unknown entity reference literally");
            let literal = format!("&{body};");
            self.src.advance(end + 1);
            return Ok(Cow::Owned(literal));
        }
        self.src.advance(1);
        Ok(Cow::Borrowed("&"))
    }

    // ---------------------------------------------------------------------
    // Shared helpers
    // ---------------------------------------------------------------------

    /// Reads a name at the read position; an empty string means no name
    /// character was present.
    fn name(&mut self, start: SourceLocation) -> Result<String> {
        let html = self.html();
        let rest_ok = move |c: char| {
            if html {
                !(c.is_whitespace() || matches!(c, '/' | '>' | '=' | '<' | '"' | '\''))
            } else {
                is_name_char(c)
            }
        };
        let first_ok = move |c: char| if html { rest_ok(c) } else { is_name_start_char(c) };
        match self.src.peek()? {
            Some(c) if first_ok(c) => {}
            _ => return Ok(String::new()),
        }
        let mut scanned = 0;
        let len = loop {
            let window = self.src.window();
            if let Some(i) = window[scanned..]
                .char_indices()
                .find(|&(i, c)| !(if scanned + i == 0 { first_ok(c) } else { rest_ok(c) }))
                .map(|(i, _)| i)
            {
                break scanned + i;
            }
            scanned = window.len();
            if scanned > self.options.max_name_length {
                break scanned;
            }
            if !self.src.fill()? {
                break scanned;
            }
        };
        if len > self.options.max_name_length {
            return Err(Error::LimitExceeded {
                limit: "name length limit",
                location: start,
            });
        }
        let name = self.src.window()[..len].to_string();
        self.src.advance(len);
        Ok(name)
    }

    /// Skips whitespace; returns whether any was present.
    fn skip_whitespace(&mut self) -> Result<bool> {
        let i = self.src.find_byte(0, |b| !matches!(b, b' ' | b'\t' | b'\r' | b'\n'))?;
        self.src.advance(i);
        Ok(i > 0)
    }

    fn unexpected(&mut self, expected: &str, start: SourceLocation) -> Error {
        let location = self.src.location();
        match self.src.peek() {
            Ok(Some(c)) => Error::syntax(format!("expected {expected}, found '{c}'"), location),
            Ok(None) => Error::UnexpectedEof {
                context: "tag",
                location: start,
            },
            Err(e) => e,
        }
    }

    fn check_text_length(&self, len: usize, start: SourceLocation) -> Result<()> {
        if len > self.options.max_text_length {
            return Err(Error::LimitExceeded {
                limit: "text length limit",
                location: start,
            });
        }
        Ok(())
    }

    fn check_attribute_length(&self, len: usize, start: SourceLocation) -> Result<()> {
        if len > self.options.max_attribute_length {
            return Err(Error::LimitExceeded {
                limit: "attribute length limit",
                location: start,
            });
        }
        Ok(())
    }
}

impl<R: Read> Iterator for Lexer<R> {
    type Item = Result<Lexeme>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.peeked.take() {
            Some(peeked) => peeked,
            None => self.lex_next(),
        }
    }
}

fn predefined_entity(name: &str) -> Option<char> {
    match name {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => None,
    }
}

fn is_xml_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

/// Normalizes `\r\n` and lone `\r` to `\n` (XML 1.0 §2.11).
fn normalize_newlines(s: &str) -> Cow<'_, str> {
    if !s.contains('\r') {
        return Cow::Borrowed(s);
    }
    Cow::Owned(s.replace("\r\n", "\n").replace('\r', "\n"))
}

/// Attribute-value normalization (XML 1.0 §3.3.3) for literal whitespace.
fn normalize_attribute_whitespace(s: &str) -> Cow<'_, str> {
    if !s.contains(['\t', '\n', '\r']) {
        return Cow::Borrowed(s);
    }
    Cow::Owned(
        normalize_newlines(s)
            .chars()
            .map(|c| if matches!(c, '\t' | '\n') { ' ' } else { c })
            .collect(),
    )
}
