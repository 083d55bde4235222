//! Lexer/tokenizer for log queries.

use super::error::{ParseError, Position};
use std::fmt;
use winnow::ascii::multispace0;
use winnow::combinator::alt;
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::{any, one_of, take_till, take_while};

/// Token kinds.
///
/// `!=` and `!~` are shared by matchers and line filters; the parser decides
/// which role they play.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Punctuation
    OpenBrace,  // {
    CloseBrace, // }
    Comma,      // ,

    // Values
    Ident,
    Str,

    // Operators
    Eq,        // =
    Ne,        // !=
    Re,        // =~
    Nre,       // !~
    PipeExact, // |=
    PipeMatch, // |~
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::OpenBrace => "{",
            TokenKind::CloseBrace => "}",
            TokenKind::Comma => ",",
            TokenKind::Ident => "identifier",
            TokenKind::Str => "string",
            TokenKind::Eq => "=",
            TokenKind::Ne => "!=",
            TokenKind::Re => "=~",
            TokenKind::Nre => "!~",
            TokenKind::PipeExact => "|=",
            TokenKind::PipeMatch => "|~",
        };
        f.write_str(name)
    }
}

/// A lexed token. For strings `text` holds the decoded content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub pos: Position,
}

type PResult<T> = Result<T, ErrMode<ContextError>>;

fn backtrack() -> ErrMode<ContextError> {
    ErrMode::Backtrack(ContextError::new())
}

/// Lex an operator or punctuation, longest match first.
fn lex_symbol(input: &mut &str) -> PResult<TokenKind> {
    alt((
        "!=".value(TokenKind::Ne),
        "!~".value(TokenKind::Nre),
        "=~".value(TokenKind::Re),
        "|=".value(TokenKind::PipeExact),
        "|~".value(TokenKind::PipeMatch),
        "=".value(TokenKind::Eq),
        "{".value(TokenKind::OpenBrace),
        "}".value(TokenKind::CloseBrace),
        ",".value(TokenKind::Comma),
    ))
    .parse_next(input)
}

/// Lex a label name: a letter or `_`, then letters, digits, `_`, `.`, `-`.
fn lex_ident<'i>(input: &mut &'i str) -> PResult<&'i str> {
    (
        one_of(|c: char| c.is_alphabetic() || c == '_'),
        take_while(0.., |c: char| {
            c.is_alphanumeric() || c == '_' || c == '.' || c == '-'
        }),
    )
        .take()
        .parse_next(input)
}

enum LiteralError {
    NotTerminated,
    InvalidEscape,
}

/// Run of plain characters inside a literal.
fn literal_chunk<'i>(input: &mut &'i str) -> PResult<&'i str> {
    take_till(0.., ['"', '\\', '\n']).parse_next(input)
}

/// Lex the body of a string literal; `input` starts after the opening quote.
fn lex_string(input: &mut &str) -> Result<String, LiteralError> {
    let mut value = String::new();
    loop {
        let chunk = literal_chunk(input).map_err(|_| LiteralError::NotTerminated)?;
        value.push_str(chunk);

        let next: PResult<char> = any.parse_next(input);
        match next {
            Ok('"') => return Ok(value),
            Ok('\\') => {
                let c = lex_escape(input).map_err(|_| LiteralError::InvalidEscape)?;
                value.push(c);
            }
            // newline or end of input
            _ => return Err(LiteralError::NotTerminated),
        }
    }
}

/// Decode the escape following a backslash.
fn lex_escape(input: &mut &str) -> PResult<char> {
    let c: char = any.parse_next(input)?;
    let decoded = match c {
        'a' => '\u{07}',
        'b' => '\u{08}',
        'f' => '\u{0C}',
        'n' => '\n',
        'r' => '\r',
        't' => '\t',
        'v' => '\u{0B}',
        '\\' => '\\',
        '"' => '"',
        'x' => return lex_code_point(input, 2, 16).and_then(ascii_only),
        'u' => return lex_code_point(input, 4, 16),
        'U' => return lex_code_point(input, 8, 16),
        '0'..='7' => {
            let rest = take_while(2, |c: char| c.is_digit(8)).parse_next(input)?;
            let value = c.to_digit(8).unwrap_or(0) * 64
                + u32::from_str_radix(rest, 8).map_err(|_| backtrack())?;
            return char::from_u32(value).ok_or_else(backtrack).and_then(ascii_only);
        }
        _ => return Err(backtrack()),
    };
    Ok(decoded)
}

/// Exactly `digits` digits in `radix`, forming a valid char.
fn lex_code_point(input: &mut &str, digits: usize, radix: u32) -> PResult<char> {
    let raw = take_while(digits, |c: char| c.is_digit(radix)).parse_next(input)?;
    u32::from_str_radix(raw, radix)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(backtrack)
}

/// Byte escapes (`\x`, octal) must stay within ASCII to keep values valid UTF-8.
fn ascii_only(c: char) -> PResult<char> {
    if c.is_ascii() { Ok(c) } else { Err(backtrack()) }
}

/// Streaming lexer. Yields tokens until end of input or the first error.
pub struct Lexer<'a> {
    rest: &'a str,
    pos: Position,
    done: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer {
            rest: input,
            pos: Position::start(),
            done: false,
        }
    }

    /// Position just past the last consumed character.
    pub fn position(&self) -> Position {
        self.pos
    }

    /// Move the cursor to `remaining`, a suffix of the current input.
    fn advance_to(&mut self, remaining: &'a str) -> &'a str {
        let consumed = &self.rest[..self.rest.len() - remaining.len()];
        self.pos.advance(consumed);
        self.rest = remaining;
        consumed
    }

    fn skip_whitespace(&mut self) {
        let mut remaining = self.rest;
        let skipped: PResult<&str> = multispace0.parse_next(&mut remaining);
        if skipped.is_ok() {
            self.advance_to(remaining);
        }
    }

    fn lex_token(&mut self) -> Result<Token, ParseError> {
        let start = self.pos;
        let mut cursor = self.rest;

        if let Some(body) = cursor.strip_prefix('"') {
            cursor = body;
            return match lex_string(&mut cursor) {
                Ok(text) => {
                    self.advance_to(cursor);
                    Ok(Token {
                        kind: TokenKind::Str,
                        text,
                        pos: start,
                    })
                }
                // literal errors are reported where the literal begins
                Err(LiteralError::NotTerminated) => {
                    Err(ParseError::new("literal not terminated", start))
                }
                Err(LiteralError::InvalidEscape) => {
                    Err(ParseError::new("invalid char escape", start))
                }
            };
        }

        if let Ok(kind) = lex_symbol(&mut cursor) {
            let text = self.advance_to(cursor);
            return Ok(Token {
                kind,
                text: text.to_string(),
                pos: start,
            });
        }

        if let Ok(ident) = lex_ident(&mut cursor) {
            self.advance_to(cursor);
            return Ok(Token {
                kind: TokenKind::Ident,
                text: ident.to_string(),
                pos: start,
            });
        }

        let unexpected = self.rest.chars().next().unwrap_or_default();
        Err(ParseError::new(
            format!("unexpected character {:?}", unexpected),
            start,
        ))
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        self.skip_whitespace();
        if self.rest.is_empty() {
            self.done = true;
            return None;
        }

        let token = self.lex_token();
        if token.is_err() {
            self.done = true;
        }
        Some(token)
    }
}

/// Tokenize the entire input.
pub fn tokenize(input: &str) -> Result<Vec<Token>, ParseError> {
    Lexer::new(input).collect()
}
