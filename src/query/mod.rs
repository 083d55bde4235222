//! Log query language: stream selectors with chained line filters.
//!
//! Syntax:
//!   {name="value"}               - label equals value
//!   {name!="value"}              - label differs from value
//!   {name=~"re"}, {name!~"re"}   - label matches / doesn't match regex
//!   {a="1", b="2"}               - AND of matchers
//!   <query> |= "text"            - line contains text
//!   <query> != "text"            - line doesn't contain text
//!   <query> |~ "re", !~ "re"     - line matches / doesn't match regex
//!
//! Filters chain left to right and apply in the order written.

mod ast;
mod error;
mod lexer;
mod parser;

pub use ast::*;
pub use error::{ParseError, Position};
pub use lexer::{Lexer, Token, TokenKind, tokenize};
pub use parser::parse_expr;
