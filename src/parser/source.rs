//! Streaming decoded character source.
//!
//! [`CharSource`] pulls raw bytes from any [`Read`] implementation in
//! bounded chunks, decodes them incrementally with `encoding_rs`, and exposes
//! the not-yet-consumed decoded text as a `&str` window. Consumed text is
//! compacted away, so memory stays proportional to the largest single token
//! rather than to the document.
//!
//! The source tracks line, column and raw byte offset of the read position.
//! Byte offsets refer to the *undecoded* input, so they stay meaningful for
//! non-UTF-8 documents.

use std::io::Read;

use encoding_rs::{Decoder, DecoderResult, Encoding, UTF_16BE, UTF_16LE, UTF_8};

use crate::encoding;
use crate::error::{Error, Result, SourceLocation};

/// Raw bytes requested from the reader per fill.
const READ_CHUNK: usize = 8192;

/// Consumed decoded text is dropped once it exceeds this many bytes.
const COMPACT_THRESHOLD: usize = 16 * 1024;

/// How many raw input bytes one decoded character occupied.
#[derive(Debug, Clone, Copy)]
enum RawWidth {
    Utf8,
    Utf16,
    SingleByte,
    Reencode(&'static Encoding),
}

impl RawWidth {
    fn for_encoding(encoding: &'static Encoding) -> Self {
        if encoding == UTF_8 {
            Self::Utf8
        } else if encoding == UTF_16LE || encoding == UTF_16BE {
            Self::Utf16
        } else if encoding.is_single_byte() {
            Self::SingleByte
        } else {
            Self::Reencode(encoding)
        }
    }

    fn of(self, c: char) -> usize {
        match self {
            Self::Utf8 => c.len_utf8(),
            Self::Utf16 => c.len_utf16() * 2,
            Self::SingleByte => 1,
            Self::Reencode(enc) => {
                let mut buf = [0u8; 4];
                enc.encode(c.encode_utf8(&mut buf)).0.len()
            }
        }
    }
}

/// A decoded, position-tracking window over a byte stream.
pub(crate) struct CharSource<R> {
    reader: R,
    encoding: &'static Encoding,
    decoder: Decoder,
    width: RawWidth,
    /// Raw bytes read but not yet decoded.
    raw: Vec<u8>,
    /// Raw offset of `raw[0]` in the input.
    raw_base: usize,
    reader_done: bool,
    decoder_done: bool,
    /// Decoded text; `buf[pos..]` is unconsumed.
    buf: String,
    pos: usize,
    line: u32,
    column: u32,
    byte_offset: usize,
    after_cr: bool,
}

impl<R: Read> CharSource<R> {
    /// Sniffs the encoding from the first bytes of `reader` and prepares an
    /// incremental decoder for the rest.
    pub fn new(mut reader: R, declared: Option<&str>, html: bool) -> Result<Self> {
        let mut prefix = Vec::with_capacity(encoding::SNIFF_LEN);
        let mut chunk = [0u8; encoding::SNIFF_LEN];
        let mut reader_done = false;
        while prefix.len() < encoding::SNIFF_LEN {
            let want = encoding::SNIFF_LEN - prefix.len();
            let n = reader.read(&mut chunk[..want])?;
            if n == 0 {
                reader_done = true;
                break;
            }
            prefix.extend_from_slice(&chunk[..n]);
        }

        let (encoding, bom_len) = encoding::select(&prefix, declared, html)?;
        tracing::debug!(encoding = encoding.name(), bom_len, "selected input encoding");
        prefix.drain(..bom_len);

        Ok(Self {
            reader,
            encoding,
            decoder: encoding.new_decoder_without_bom_handling(),
            width: RawWidth::for_encoding(encoding),
            raw: prefix,
            raw_base: bom_len,
            reader_done,
            decoder_done: false,
            buf: String::new(),
            pos: 0,
            line: 1,
            column: 1,
            byte_offset: bom_len,
            after_cr: false,
        })
    }

    /// The encoding the input is being decoded with.
    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    /// The unconsumed decoded text currently buffered.
    pub fn window(&self) -> &str {
        &self.buf[self.pos..]
    }

    /// Location of the next unconsumed character.
    pub fn location(&self) -> SourceLocation {
        SourceLocation {
            line: self.line,
            column: self.column,
            byte_offset: self.byte_offset,
        }
    }

    /// Decodes more input into the window. Returns `false` once the input is
    /// exhausted and nothing was added.
    pub fn fill(&mut self) -> Result<bool> {
        if self.decoder_done {
            return Ok(false);
        }
        self.compact();
        loop {
            if self.raw.is_empty() && !self.reader_done {
                self.raw.resize(READ_CHUNK, 0);
                let n = self.reader.read(&mut self.raw)?;
                self.raw.truncate(n);
                if n == 0 {
                    self.reader_done = true;
                }
            }
            let before = self.buf.len();
            self.decode_pending()?;
            if self.buf.len() > before {
                return Ok(true);
            }
            if self.decoder_done {
                return Ok(false);
            }
        }
    }

    /// Makes sure at least `n` bytes of decoded text are buffered, unless
    /// the input ends first. Returns whether the window now holds `n` bytes.
    pub fn ensure(&mut self, n: usize) -> Result<bool> {
        while self.window().len() < n {
            if !self.fill()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Returns `true` if the window starts with `s`, filling as needed.
    pub fn starts_with(&mut self, s: &str) -> Result<bool> {
        self.ensure(s.len())?;
        Ok(self.window().starts_with(s))
    }

    /// Like [`starts_with`](Self::starts_with) but ASCII case-insensitive.
    pub fn starts_with_ci(&mut self, s: &str) -> Result<bool> {
        self.ensure(s.len())?;
        let w = self.window().as_bytes();
        Ok(w.len() >= s.len() && w[..s.len()].eq_ignore_ascii_case(s.as_bytes()))
    }

    /// Peeks at the next character, filling as needed.
    pub fn peek(&mut self) -> Result<Option<char>> {
        if self.window().is_empty() {
            self.fill()?;
        }
        Ok(self.window().chars().next())
    }

    /// Returns `true` once every character has been consumed.
    pub fn at_end(&mut self) -> Result<bool> {
        Ok(self.peek()?.is_none())
    }

    /// Consumes `n` bytes of decoded text, which must lie on a character
    /// boundary within the window.
    pub fn advance(&mut self, n: usize) {
        let end = (self.pos + n).min(self.buf.len());
        for c in self.buf[self.pos..end].chars() {
            self.byte_offset += self.width.of(c);
            match c {
                '\r' => {
                    self.line += 1;
                    self.column = 1;
                    self.after_cr = true;
                    continue;
                }
                '\n' if self.after_cr => {}
                '\n' => {
                    self.line += 1;
                    self.column = 1;
                }
                _ => self.column += 1,
            }
            self.after_cr = false;
        }
        self.pos = end;
    }

    /// Consumes and returns the next character.
    pub fn next_char(&mut self) -> Result<Option<char>> {
        let c = self.peek()?;
        if let Some(c) = c {
            self.advance(c.len_utf8());
        }
        Ok(c)
    }

    /// Finds the first occurrence of `needle` in the unconsumed input,
    /// decoding further input as needed. Returns its byte offset within the
    /// window, or `None` if the input ends first.
    pub fn find(&mut self, needle: &str) -> Result<Option<usize>> {
        let mut searched = 0;
        loop {
            let window = self.window();
            if let Some(i) = memchr::memmem::find(&window.as_bytes()[searched..], needle.as_bytes())
            {
                return Ok(Some(searched + i));
            }
            searched = window.len().saturating_sub(needle.len() - 1);
            if !self.fill()? {
                return Ok(None);
            }
        }
    }

    /// Finds the first byte at or after window offset `from` for which
    /// `stop` holds, decoding further input as needed. Returns the window
    /// length at end of input.
    pub fn find_byte(&mut self, from: usize, stop: impl Fn(u8) -> bool) -> Result<usize> {
        self.ensure(from)?;
        let mut searched = from;
        loop {
            let window = self.window().as_bytes();
            searched = searched.min(window.len());
            if let Some(i) = window[searched..].iter().position(|&b| stop(b)) {
                return Ok(searched + i);
            }
            searched = window.len();
            if !self.fill()? {
                return Ok(searched);
            }
        }
    }

    fn compact(&mut self) {
        if self.pos >= COMPACT_THRESHOLD && self.pos * 2 >= self.buf.len() {
            self.buf.drain(..self.pos);
            self.pos = 0;
        }
    }

    fn decode_pending(&mut self) -> Result<()> {
        let last = self.reader_done;
        let needed = self
            .decoder
            .max_utf8_buffer_length_without_replacement(self.raw.len())
            .unwrap_or(self.raw.len() * 3 + 16);
        self.buf.reserve(needed);

        let (result, read) =
            self.decoder
                .decode_to_string_without_replacement(&self.raw, &mut self.buf, last);
        match result {
            DecoderResult::InputEmpty => {
                self.raw_base += read;
                self.raw.drain(..read);
                if last {
                    self.decoder_done = true;
                }
                Ok(())
            }
            DecoderResult::OutputFull => {
                self.raw_base += read;
                self.raw.drain(..read);
                Ok(())
            }
            DecoderResult::Malformed(bad, extra) => {
                let byte_offset = self.raw_base + read - usize::from(extra) - usize::from(bad);
                Err(Error::Encoding {
                    message: format!(
                        "malformed byte sequence for {} ({bad} invalid byte(s))",
                        self.encoding.name()
                    ),
                    byte_offset,
                })
            }
        }
    }
}
