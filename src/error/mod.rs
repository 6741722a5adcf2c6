//! Error types and diagnostics.
//!
//! Every fallible operation in the crate returns [`Result`], whose error side
//! is the single [`Error`] enum. Lexing errors carry a [`SourceLocation`];
//! tree and query errors carry a node path or a character position, so a
//! caller can localize the fault without re-reading the document.
//!
//! In recovery mode the tree builder does not fail on structural problems.
//! It records a [`ParseDiagnostic`] on the document for each recovery action
//! it takes instead.

use std::fmt;

use crate::tree::NodeId;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Severity level for a parse diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorSeverity {
    /// A non-fatal issue that doesn't change the resulting tree.
    Warning,
    /// A recovered error: the tree differs from what the markup literally says.
    Error,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Source location within the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number (in characters, not bytes).
    pub column: u32,
    /// 0-based byte offset from the start of the raw input.
    pub byte_offset: usize,
}

impl SourceLocation {
    /// The location of the first byte of the input.
    pub const START: Self = Self {
        line: 1,
        column: 1,
        byte_offset: 0,
    };
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} (byte {})",
            self.line, self.column, self.byte_offset
        )
    }
}

/// A single recovery action recorded while parsing in lenient mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDiagnostic {
    /// The severity of this diagnostic.
    pub severity: ErrorSeverity,
    /// Human-readable description of what was wrong and what was done.
    pub message: String,
    /// Where in the source the problem was found.
    pub location: SourceLocation,
}

impl fmt::Display for ParseDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} at {}",
            self.severity, self.message, self.location
        )
    }
}

/// The crate-wide error type.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The input bytes are not valid in the selected encoding, or the
    /// encoding label itself is unknown.
    #[error("encoding error at byte {byte_offset}: {message}")]
    Encoding { message: String, byte_offset: usize },

    /// The input ended inside a construct.
    #[error("unexpected end of input in {context} starting at {location}")]
    UnexpectedEof {
        context: &'static str,
        location: SourceLocation,
    },

    /// Malformed markup that is not covered by a more specific kind.
    #[error("syntax error at {location}: {message}")]
    Syntax {
        message: String,
        location: SourceLocation,
    },

    /// An end tag did not match the innermost open element.
    #[error("mismatched end tag at {location}: expected </{expected}>, found </{found}> (open path {path})")]
    MismatchedTag {
        expected: String,
        found: String,
        path: String,
        location: SourceLocation,
    },

    /// Non-whitespace content, or a second root element, outside the root.
    #[error("content outside the root element at {location}")]
    ContentOutsideRoot { location: SourceLocation },

    /// The input ended with elements still open.
    #[error("unclosed element <{name}> at end of input (open path {path}, input ended at {location})")]
    UnclosedElement {
        name: String,
        path: String,
        location: SourceLocation,
    },

    /// A namespace prefix has no binding in scope.
    #[error("unbound namespace prefix '{prefix}'{}", at_location(.location))]
    UnboundNamespacePrefix {
        prefix: String,
        location: Option<SourceLocation>,
    },

    /// A node handle no longer designates a live node of this document.
    #[error("stale node reference {node}")]
    StaleReference { node: NodeId },

    /// A query expression or selector could not be parsed.
    #[error("invalid query at position {position}: {message}")]
    InvalidQuerySyntax { message: String, position: usize },

    /// A query called a function that is not implemented.
    #[error("unknown function '{name}' at position {position}")]
    UnknownFunction { name: String, position: usize },

    /// A query produced a value of the wrong type.
    #[error("query type error: expected {expected}, found {found}")]
    QueryType {
        expected: &'static str,
        found: &'static str,
    },

    /// A tree edit would break the single-owner tree invariant.
    #[error("invalid tree operation: {message}")]
    InvalidHierarchy { message: String },

    /// A name passed to a tree edit is not a valid XML name.
    #[error("invalid name '{name}'")]
    InvalidName { name: String },

    /// The input contained no root element.
    #[error("document has no root element")]
    EmptyDocument,

    /// A configured security limit was exceeded.
    #[error("{limit} exceeded at {location}")]
    LimitExceeded {
        limit: &'static str,
        location: SourceLocation,
    },

    /// The underlying reader or writer failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn at_location(location: &Option<SourceLocation>) -> String {
    location.as_ref().map_or_else(String::new, |loc| format!(" at {loc}"))
}

impl Error {
    /// Returns the source location for lexing and tree-building errors.
    #[must_use]
    pub fn location(&self) -> Option<SourceLocation> {
        match self {
            Self::UnexpectedEof { location, .. }
            | Self::Syntax { location, .. }
            | Self::MismatchedTag { location, .. }
            | Self::ContentOutsideRoot { location }
            | Self::UnclosedElement { location, .. }
            | Self::LimitExceeded { location, .. } => Some(*location),
            Self::UnboundNamespacePrefix { location, .. } => *location,
            Self::Encoding { byte_offset, .. } => Some(SourceLocation {
                line: 0,
                column: 0,
                byte_offset: *byte_offset,
            }),
            _ => None,
        }
    }

    pub(crate) fn syntax(message: impl Into<String>, location: SourceLocation) -> Self {
        Self::Syntax {
            message: message.into(),
            location,
        }
    }

    pub(crate) fn query(message: impl Into<String>, position: usize) -> Self {
        Self::InvalidQuerySyntax {
            message: message.into(),
            position,
        }
    }

    pub(crate) fn hierarchy(message: impl Into<String>) -> Self {
        Self::InvalidHierarchy {
            message: message.into(),
        }
    }
}
