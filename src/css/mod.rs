//! CSS selector support.
//!
//! Selectors are not evaluated directly. [`to_xpath`] translates a selector
//! group into a relative path expression that selects the matching
//! descendants of the context node, and the query evaluator does the rest.
//!
//! ```
//! use xmlsift::css::to_xpath;
//!
//! assert_eq!(to_xpath("ul > li").unwrap(), "descendant::ul/child::li");
//! ```
//!
//! Supported syntax:
//!
//! - type selectors, `*`, `#id` and `.class`
//! - attribute selectors `[a]` and `[a op v]` with `=`, `~=`, `^=`, `$=`,
//!   `*=` and `|=`
//! - the descendant, `>`, `+` and `~` combinators, and `,` groups
//! - `:first-child`, `:last-child`, `:only-child`, `:empty`, `:root`,
//!   `:nth-child(n)` with an integer argument, and `:not(...)` around a
//!   compound selector without combinators

use crate::error::{Error, Result};
use crate::parser::namespace::{is_name_char, is_name_start_char};

/// Translates a CSS selector group into an equivalent path expression.
///
/// # Errors
///
/// Returns [`Error::InvalidQuerySyntax`] with the byte offset of the first
/// character that cannot be part of a supported selector.
pub fn to_xpath(selector: &str) -> Result<String> {
    let mut translator = Translator::new(selector);
    let mut alternatives = vec![translator.complex_selector()?];
    while translator.eat(b',') {
        alternatives.push(translator.complex_selector()?);
    }
    translator.skip_whitespace();
    if let Some(b) = translator.peek() {
        return Err(translator.error(&format!("unexpected '{}'", char::from(b))));
    }
    Ok(alternatives.join(" | "))
}

/// A compound selector reduced to an element test plus predicates.
#[derive(Debug, Default)]
struct Compound {
    /// Element name; `None` means any element.
    name: Option<String>,
    predicates: Vec<String>,
}

impl Compound {
    /// Renders the compound as a step along `axis`.
    fn step(&self, axis: &str) -> String {
        let mut out = format!("{axis}::{}", self.name.as_deref().unwrap_or("*"));
        for p in &self.predicates {
            out.push('[');
            out.push_str(p);
            out.push(']');
        }
        out
    }

    /// Renders the compound as a test on the context element.
    fn condition(&self) -> String {
        let mut parts = Vec::new();
        if let Some(name) = &self.name {
            parts.push(format!("self::{name}"));
        }
        parts.extend(self.predicates.iter().map(|p| format!("({p})")));
        if parts.is_empty() {
            "self::*".to_string()
        } else {
            parts.join(" and ")
        }
    }
}

struct Translator<'s> {
    input: &'s str,
    pos: usize,
}

impl<'s> Translator<'s> {
    fn new(input: &'s str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    fn eat(&mut self, b: u8) -> bool {
        self.skip_whitespace();
        if self.peek() == Some(b) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_str(&mut self, s: &str) -> bool {
        if self.input[self.pos..].starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    /// Skips whitespace, returning whether any was skipped.
    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r' | b'\x0C')) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn error(&self, message: &str) -> Error {
        Error::query(message, self.pos)
    }

    fn expect(&mut self, b: u8) -> Result<()> {
        if self.eat(b) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", char::from(b))))
        }
    }

    // -----------------------------------------------------------------------
    // Selectors
    // -----------------------------------------------------------------------

    fn complex_selector(&mut self) -> Result<String> {
        self.skip_whitespace();
        let mut path = self.compound()?.step("descendant");
        loop {
            let spaced = self.skip_whitespace();
            let combinator = match self.peek() {
                None | Some(b',') => break,
                Some(b @ (b'>' | b'+' | b'~')) => {
                    self.pos += 1;
                    self.skip_whitespace();
                    b
                }
                Some(_) if spaced => b' ',
                Some(b) => return Err(self.error(&format!("unexpected '{}'", char::from(b)))),
            };
            let next = self.compound()?;
            path.push('/');
            match combinator {
                b'>' => path.push_str(&next.step("child")),
                b'+' => {
                    path.push_str("following-sibling::*[1]");
                    if next.name.is_some() || !next.predicates.is_empty() {
                        path.push_str(&format!("[{}]", next.condition()));
                    }
                }
                b'~' => path.push_str(&next.step("following-sibling")),
                _ => path.push_str(&next.step("descendant")),
            }
        }
        Ok(path)
    }

    fn compound(&mut self) -> Result<Compound> {
        let mut compound = Compound::default();
        let start = self.pos;
        if self.peek() == Some(b'*') {
            self.pos += 1;
        } else if self.at_ident_start() {
            compound.name = Some(self.name()?);
        }
        loop {
            match self.peek() {
                Some(b'#') => {
                    self.pos += 1;
                    let id = self.ident()?;
                    compound.predicates.push(format!("@id = {}", literal(&id)));
                }
                Some(b'.') => {
                    self.pos += 1;
                    let class = self.ident()?;
                    compound.predicates.push(contains_word("@class", &class));
                }
                Some(b'[') => {
                    self.pos += 1;
                    let predicate = self.attribute_selector()?;
                    compound.predicates.push(predicate);
                }
                Some(b':') => {
                    self.pos += 1;
                    let predicate = self.pseudo_class()?;
                    compound.predicates.push(predicate);
                }
                _ => break,
            }
        }
        if self.pos == start {
            return Err(self.error("expected a selector"));
        }
        Ok(compound)
    }

    fn attribute_selector(&mut self) -> Result<String> {
        self.skip_whitespace();
        let name = self.name()?;
        let attr = format!("@{name}");
        self.skip_whitespace();
        if self.eat(b']') {
            return Ok(attr);
        }
        let op = ["~=", "^=", "$=", "*=", "|=", "="]
            .into_iter()
            .find(|op| self.eat_str(op))
            .ok_or_else(|| self.error("expected an attribute operator or ']'"))?;
        self.skip_whitespace();
        let value = match self.peek() {
            Some(q @ (b'"' | b'\'')) => self.quoted(q)?,
            _ => self.ident()?,
        };
        self.expect(b']')?;
        let v = literal(&value);
        Ok(match op {
            "=" => format!("{attr} = {v}"),
            "~=" => contains_word(&attr, &value),
            "|=" => format!("{attr} = {v} or starts-with({attr}, {})", literal(&format!("{value}-"))),
            // An empty operand never matches for the substring operators.
            _ if value.is_empty() => "false()".to_string(),
            "^=" => format!("starts-with({attr}, {v})"),
            "*=" => format!("contains({attr}, {v})"),
            _ => format!(
                "substring({attr}, string-length({attr}) - {} + 1) = {v}",
                value.chars().count()
            ),
        })
    }

    fn pseudo_class(&mut self) -> Result<String> {
        let start = self.pos;
        let name = self.ident()?.to_ascii_lowercase();
        Ok(match name.as_str() {
            "first-child" => "not(preceding-sibling::*)".to_string(),
            "last-child" => "not(following-sibling::*)".to_string(),
            "only-child" => "not(preceding-sibling::*) and not(following-sibling::*)".to_string(),
            "empty" => "not(* | text())".to_string(),
            "root" => "not(parent::*)".to_string(),
            "nth-child" => {
                self.expect(b'(')?;
                self.skip_whitespace();
                let digits_start = self.pos;
                while self.peek().is_some_and(|b| b.is_ascii_digit()) {
                    self.pos += 1;
                }
                let n: u64 = self.input[digits_start..self.pos]
                    .parse()
                    .map_err(|_| Error::query("expected a positive integer", digits_start))?;
                if n == 0 {
                    return Err(Error::query("expected a positive integer", digits_start));
                }
                self.expect(b')')?;
                format!("count(preceding-sibling::*) = {}", n - 1)
            }
            "not" => {
                self.expect(b'(')?;
                self.skip_whitespace();
                let inner = self.compound()?;
                self.expect(b')')?;
                format!("not({})", inner.condition())
            }
            _ => return Err(Error::query(&format!("unsupported pseudo-class ':{name}'"), start)),
        })
    }

    // -----------------------------------------------------------------------
    // Tokens
    // -----------------------------------------------------------------------

    fn at_ident_start(&self) -> bool {
        match self.peek() {
            Some(b) => b.is_ascii_alphabetic() || b == b'_' || b == b'-' || b == b'\\' || b >= 0x80,
            None => false,
        }
    }

    /// Reads an identifier that must also be a valid element or attribute
    /// name without a prefix.
    fn name(&mut self) -> Result<String> {
        let start = self.pos;
        let name = self.ident()?;
        let mut chars = name.chars();
        let valid = chars.next().is_some_and(|c| c != ':' && is_name_start_char(c))
            && chars.all(|c| c != ':' && is_name_char(c));
        if valid {
            Ok(name)
        } else {
            Err(Error::query(format!("'{name}' is not a valid name"), start))
        }
    }

    /// Reads an identifier, resolving backslash escapes.
    fn ident(&mut self) -> Result<String> {
        if !self.at_ident_start() {
            return Err(self.error("expected an identifier"));
        }
        let mut out = String::new();
        while let Some(c) = self.input[self.pos..].chars().next() {
            if c == '\\' {
                self.pos += 1;
                let escaped = self.input[self.pos..]
                    .chars()
                    .next()
                    .ok_or_else(|| self.error("unterminated escape"))?;
                out.push(escaped);
                self.pos += escaped.len_utf8();
            } else if c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii() {
                out.push(c);
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
        Ok(out)
    }

    fn quoted(&mut self, quote: u8) -> Result<String> {
        let start = self.pos;
        self.pos += 1;
        let rest = &self.input[self.pos..];
        let len = memchr::memchr(quote, rest.as_bytes())
            .ok_or_else(|| Error::query("unterminated string", start))?;
        let value = rest[..len].to_string();
        self.pos += len + 1;
        Ok(value)
    }
}

/// A string literal for `s`, using `concat()` when it holds both quote
/// characters.
fn literal(s: &str) -> String {
    if !s.contains('\'') {
        format!("'{s}'")
    } else if !s.contains('"') {
        format!("\"{s}\"")
    } else {
        let parts: Vec<String> = s.split('\'').map(|p| format!("'{p}'")).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

/// Whitespace-separated word match, as for `.class` and `~=`.
fn contains_word(attr: &str, word: &str) -> String {
    format!(
        "contains(concat(' ', normalize-space({attr}), ' '), {})",
        literal(&format!(" {word} "))
    )
}
