//! Positioned error type shared by the lexer and the parser.

use serde::Serialize;
use thiserror::Error;

/// A 1-based location in the query text.
///
/// Lines advance on `\n`; columns count characters within the current line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn start() -> Self {
        Position { line: 1, column: 1 }
    }

    /// Move past `consumed`, updating line and column.
    pub(crate) fn advance(&mut self, consumed: &str) {
        for c in consumed.chars() {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }
}

/// The single failure shape for both lexing and parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("parse error at line {line}, col {column}: {message}")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, pos: Position) -> Self {
        ParseError {
            message: message.into(),
            line: pos.line,
            column: pos.column,
        }
    }
}
