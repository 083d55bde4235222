//! Compiler for a small log query language.
//!
//! A query selects log streams by label and filters their lines:
//!
//! ```text
//! {app="api", env=~"prod|staging"} |= "error" != "healthz"
//! ```
//!
//! [`parse_expr`] turns the text into an [`Expr`] chain, or a [`ParseError`]
//! carrying the line and column of the first problem.

pub mod query;

pub use query::{
    Expr, Lexer, MatchType, Matcher, ParseError, Position, Token, TokenKind, parse_expr,
    tokenize,
};
