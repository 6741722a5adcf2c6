//! Query expression tokenizer.
//!
//! Scanning happens in two passes. The first pass reads raw tokens, emitting
//! every name as [`Token::Name`] and every `*` as [`Token::Star`]. The second
//! pass applies the disambiguation rules of the path language:
//!
//! - `*` is a multiply operator when the preceding token could end an
//!   operand, and a name test otherwise.
//! - `and`, `or`, `mod` and `div` are operators in the same position.
//! - A name followed by `(` is a function name or node type test.
//! - A name followed by `::` is an axis name.

use std::fmt;

use crate::error::{Error, Result};

/// Names that are node type tests rather than functions when followed by `(`.
const NODE_TYPE_NAMES: &[&str] = &["comment", "text", "processing-instruction", "node"];

/// A token of the query language.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Dot,
    DotDot,
    At,
    Comma,
    ColonColon,
    Slash,
    DoubleSlash,
    Pipe,
    Plus,
    Minus,
    /// Multiplication, after disambiguation.
    Star,
    Equal,
    NotEqual,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
    And,
    Or,
    Mod,
    Div,
    Number(f64),
    Literal(String),
    /// A name test: `foo`, `svg:rect`, `svg:*` or `*`.
    Name(String),
    /// `$name`, without the `$`.
    VariableReference(String),
    FunctionName(String),
    NodeType(String),
    AxisName(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LeftParen => f.write_str("("),
            Self::RightParen => f.write_str(")"),
            Self::LeftBracket => f.write_str("["),
            Self::RightBracket => f.write_str("]"),
            Self::Dot => f.write_str("."),
            Self::DotDot => f.write_str(".."),
            Self::At => f.write_str("@"),
            Self::Comma => f.write_str(","),
            Self::ColonColon => f.write_str("::"),
            Self::Slash => f.write_str("/"),
            Self::DoubleSlash => f.write_str("//"),
            Self::Pipe => f.write_str("|"),
            Self::Plus => f.write_str("+"),
            Self::Minus => f.write_str("-"),
            Self::Star => f.write_str("*"),
            Self::Equal => f.write_str("="),
            Self::NotEqual => f.write_str("!="),
            Self::LessThan => f.write_str("<"),
            Self::LessThanEqual => f.write_str("<="),
            Self::GreaterThan => f.write_str(">"),
            Self::GreaterThanEqual => f.write_str(">="),
            Self::And => f.write_str("and"),
            Self::Or => f.write_str("or"),
            Self::Mod => f.write_str("mod"),
            Self::Div => f.write_str("div"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Literal(s) => write!(f, "\"{s}\""),
            Self::Name(s) | Self::FunctionName(s) | Self::NodeType(s) | Self::AxisName(s) => {
                f.write_str(s)
            }
            Self::VariableReference(s) => write!(f, "${s}"),
        }
    }
}

/// Tokenizer over a query string.
///
/// Each token is paired with the byte offset where it starts, which the
/// parser uses to position its errors.
pub struct Lexer<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    #[must_use]
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
        }
    }

    /// Tokenizes the whole expression.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidQuerySyntax`] for an unterminated literal or
    /// a character that cannot start a token.
    pub fn tokenize(&mut self) -> Result<Vec<(Token, usize)>> {
        let mut tokens = Vec::new();
        loop {
            self.advance_while(|b| b.is_ascii_whitespace());
            if self.pos >= self.bytes.len() {
                break;
            }
            let start = self.pos;
            let token = self.next_raw_token()?;
            tokens.push((token, start));
        }
        disambiguate(&mut tokens);
        Ok(tokens)
    }

    fn next_raw_token(&mut self) -> Result<Token> {
        let ch = self.bytes[self.pos];
        let single = match ch {
            b'(' => Some(Token::LeftParen),
            b')' => Some(Token::RightParen),
            b'[' => Some(Token::LeftBracket),
            b']' => Some(Token::RightBracket),
            b'@' => Some(Token::At),
            b',' => Some(Token::Comma),
            b'|' => Some(Token::Pipe),
            b'+' => Some(Token::Plus),
            b'-' => Some(Token::Minus),
            b'=' => Some(Token::Equal),
            b'*' => Some(Token::Star),
            _ => None,
        };
        if let Some(token) = single {
            self.pos += 1;
            return Ok(token);
        }

        match ch {
            b':' if self.peek_at(1) == Some(b':') => {
                self.pos += 2;
                Ok(Token::ColonColon)
            }
            b'!' if self.peek_at(1) == Some(b'=') => {
                self.pos += 2;
                Ok(Token::NotEqual)
            }
            b'/' => Ok(self.pair(b'/', Token::DoubleSlash, Token::Slash)),
            b'<' => Ok(self.pair(b'=', Token::LessThanEqual, Token::LessThan)),
            b'>' => Ok(self.pair(b'=', Token::GreaterThanEqual, Token::GreaterThan)),
            b'.' => self.read_dot_or_number(),
            b'"' | b'\'' => self.read_literal(ch),
            b'$' => self.read_variable_reference(),
            b'0'..=b'9' => self.read_number(),
            _ if is_name_start_byte(ch) => Ok(self.read_name()),
            _ => {
                let c = self.input[self.pos..].chars().next().unwrap_or('?');
                Err(Error::query(format!("unexpected character '{c}'"), self.pos))
            }
        }
    }

    /// Reads a one- or two-byte operator: `doubled` if the next byte is
    /// `second`, `single` otherwise.
    fn pair(&mut self, second: u8, doubled: Token, single: Token) -> Token {
        if self.peek_at(1) == Some(second) {
            self.pos += 2;
            doubled
        } else {
            self.pos += 1;
            single
        }
    }

    fn read_dot_or_number(&mut self) -> Result<Token> {
        match self.peek_at(1) {
            Some(b'.') => {
                self.pos += 2;
                Ok(Token::DotDot)
            }
            Some(b'0'..=b'9') => self.read_number(),
            _ => {
                self.pos += 1;
                Ok(Token::Dot)
            }
        }
    }

    /// `Digits ('.' Digits?)? | '.' Digits`
    fn read_number(&mut self) -> Result<Token> {
        let start = self.pos;
        self.advance_while(|b| b.is_ascii_digit());
        if self.bytes.get(self.pos) == Some(&b'.') {
            self.pos += 1;
            self.advance_while(|b| b.is_ascii_digit());
        }
        let text = &self.input[start..self.pos];
        text.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| Error::query(format!("invalid number literal '{text}'"), start))
    }

    fn read_literal(&mut self, quote: u8) -> Result<Token> {
        let start = self.pos;
        let content_start = start + 1;
        match memchr::memchr(quote, &self.bytes[content_start..]) {
            Some(len) => {
                self.pos = content_start + len + 1;
                Ok(Token::Literal(
                    self.input[content_start..content_start + len].to_string(),
                ))
            }
            None => Err(Error::query("unterminated string literal", start)),
        }
    }

    fn read_variable_reference(&mut self) -> Result<Token> {
        let start = self.pos;
        self.pos += 1;
        if !self.bytes.get(self.pos).copied().is_some_and(is_name_start_byte) {
            return Err(Error::query("expected a name after '$'", start));
        }
        let name_start = self.pos;
        self.read_qname_tail();
        Ok(Token::VariableReference(
            self.input[name_start..self.pos].to_string(),
        ))
    }

    /// Reads an `NCName`, a `QName` or `prefix:*`. A `::` after the name is
    /// left for the axis separator.
    fn read_name(&mut self) -> Token {
        let start = self.pos;
        self.read_qname_tail();
        if self.bytes.get(self.pos) == Some(&b':') && self.peek_at(1) == Some(b'*') {
            self.pos += 2;
        }
        Token::Name(self.input[start..self.pos].to_string())
    }

    fn read_qname_tail(&mut self) {
        self.advance_while(is_name_byte);
        if self.bytes.get(self.pos) == Some(&b':')
            && self.peek_at(1).is_some_and(is_name_start_byte)
        {
            self.pos += 1;
            self.advance_while(is_name_byte);
        }
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn advance_while(&mut self, pred: impl Fn(u8) -> bool) {
        while self.bytes.get(self.pos).copied().is_some_and(&pred) {
            self.pos += 1;
        }
    }
}

/// Reclassifies raw tokens by context.
fn disambiguate(tokens: &mut [(Token, usize)]) {
    for i in 0..tokens.len() {
        let after_operand = i > 0 && is_operand_ending(&tokens[i - 1].0);
        let next = tokens.get(i + 1).map(|(t, _)| t.clone());
        let replacement = match &tokens[i].0 {
            Token::Star if !after_operand => Some(Token::Name("*".to_string())),
            Token::Name(name) if after_operand => match name.as_str() {
                "and" => Some(Token::And),
                "or" => Some(Token::Or),
                "mod" => Some(Token::Mod),
                "div" => Some(Token::Div),
                _ => None,
            },
            Token::Name(name) => match next {
                Some(Token::LeftParen) if NODE_TYPE_NAMES.contains(&name.as_str()) => {
                    Some(Token::NodeType(name.clone()))
                }
                Some(Token::LeftParen) => Some(Token::FunctionName(name.clone())),
                Some(Token::ColonColon) => Some(Token::AxisName(name.clone())),
                _ => None,
            },
            _ => None,
        };
        if let Some(token) = replacement {
            tokens[i].0 = token;
        }
    }
}

/// Returns `true` if `token` can end an operand, which makes a following
/// `*` a multiplication and a following `and` an operator.
fn is_operand_ending(token: &Token) -> bool {
    matches!(
        token,
        Token::RightParen
            | Token::RightBracket
            | Token::Dot
            | Token::DotDot
            | Token::Number(_)
            | Token::Literal(_)
            | Token::Name(_)
            | Token::VariableReference(_)
            | Token::NodeType(_)
    )
}

/// Bytes at or above 0x80 belong to non-ASCII characters, which are
/// accepted as name characters. Names therefore never split a UTF-8
/// sequence.
fn is_name_start_byte(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b >= 0x80
}

fn is_name_byte(b: u8) -> bool {
    is_name_start_byte(b) || b.is_ascii_digit() || b == b'-' || b == b'.'
}
