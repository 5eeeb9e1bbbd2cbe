//! Parse Errors
//!
//! A single error type for the whole pipeline. Every failure aborts the
//! parse; there is no recovery and no partial result.

use thiserror::Error;

/// What stage produced the error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed tokens, unterminated constructs, undefined entity references
    Lexical,
    /// Unexpected token for the grammar position, or a semantic rule violation
    Syntax,
    /// The input source could not be read or decoded
    Io,
}

/// Error raised while reading or parsing a DTD
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}{message}", location(.source_id.as_deref(), .kind, .line, .column))]
pub struct ParseError {
    pub source_id: Option<String>,
    pub line: u32,
    pub column: u32,
    pub kind: ErrorKind,
    pub message: String,
}

impl ParseError {
    pub fn new(
        kind: ErrorKind,
        source_id: Option<String>,
        line: u32,
        column: u32,
        message: impl Into<String>,
    ) -> Self {
        ParseError {
            source_id,
            line,
            column,
            kind,
            message: message.into(),
        }
    }

    /// Source-level failure with no position
    pub fn io(source_id: Option<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, source_id, 0, 0, message)
    }

    pub fn is_lexical(&self) -> bool {
        self.kind == ErrorKind::Lexical
    }

    pub fn is_syntax(&self) -> bool {
        self.kind == ErrorKind::Syntax
    }
}

/// `source:line:column: ` prefix
fn location(source_id: Option<&str>, kind: &ErrorKind, line: &u32, column: &u32) -> String {
    match (source_id, *kind) {
        (Some(id), ErrorKind::Io) => format!("{}: ", id),
        (None, ErrorKind::Io) => String::new(),
        (Some(id), _) => format!("{}:{}:{}: ", id, line, column),
        (None, _) => format!("{}:{}: ", line, column),
    }
}

pub type Result<T> = std::result::Result<T, ParseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_with_source() {
        let err = ParseError::new(ErrorKind::Syntax, Some("book.dtd".into()), 3, 14, "Expected >");
        assert_eq!(err.to_string(), "book.dtd:3:14: Expected >");
    }

    #[test]
    fn test_display_without_source() {
        let err = ParseError::new(ErrorKind::Lexical, None, 1, 2, "Unterminated comment");
        assert_eq!(err.to_string(), "1:2: Unterminated comment");
        assert!(err.is_lexical());
        assert!(!err.is_syntax());
    }

    #[test]
    fn test_display_io() {
        let err = ParseError::io(Some("missing.dtd".into()), "No such file");
        assert_eq!(err.to_string(), "missing.dtd: No such file");
        assert_eq!(ParseError::io(None, "boom").to_string(), "boom");
    }
}
