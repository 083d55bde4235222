//! Parser for log queries.
//!
//! Grammar (in rough EBNF):
//!
//! query        = selector filter*
//! selector     = "{" matcher ("," matcher)* "}"
//! matcher      = IDENT match_op STRING
//! match_op     = "=" | "!=" | "=~" | "!~"
//! filter       = filter_op STRING
//! filter_op    = "|=" | "|~" | "!=" | "!~"

use super::ast::{Expr, MatchType, Matcher};
use super::error::ParseError;
use super::lexer::{Lexer, Token, TokenKind};

/// Parser state: pulls tokens one at a time from the lexer.
struct Parser<'a> {
    lexer: Lexer<'a>,
}

impl<'a> Parser<'a> {
    fn new(lexer: Lexer<'a>) -> Self {
        Parser { lexer }
    }

    fn advance(&mut self) -> Result<Option<Token>, ParseError> {
        self.lexer.next().transpose()
    }

    /// Error for `found` (or end of input) where `expected` was required.
    fn unexpected(&self, found: Option<&Token>, expected: &str) -> ParseError {
        match found {
            Some(tok) => ParseError::new(
                format!("unexpected {}, expected {}", tok.kind, expected),
                tok.pos,
            ),
            None => ParseError::new(
                format!("unexpected end of query, expected {}", expected),
                self.lexer.position(),
            ),
        }
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<Token, ParseError> {
        match self.advance()? {
            Some(tok) if tok.kind == kind => Ok(tok),
            other => Err(self.unexpected(other.as_ref(), expected)),
        }
    }

    /// Parse a full query: selector followed by any number of filters.
    fn parse_query(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_selector()?;

        while let Some(tok) = self.advance()? {
            let op = match tok.kind {
                TokenKind::PipeExact => MatchType::Equal,
                TokenKind::PipeMatch => MatchType::RegexMatch,
                TokenKind::Ne => MatchType::NotEqual,
                TokenKind::Nre => MatchType::RegexNotMatch,
                _ => return Err(self.unexpected(Some(&tok), "pipe")),
            };
            let pattern = self.expect(TokenKind::Str, "string")?.text;
            expr = Expr::Filter {
                left: Box::new(expr),
                op,
                pattern,
            };
        }

        Ok(expr)
    }

    /// Parse selector: "{" matcher ("," matcher)* "}"
    fn parse_selector(&mut self) -> Result<Expr, ParseError> {
        self.expect(TokenKind::OpenBrace, "{")?;

        let mut matchers = vec![self.parse_matcher()?];
        loop {
            match self.advance()? {
                Some(tok) if tok.kind == TokenKind::Comma => {
                    matchers.push(self.parse_matcher()?);
                }
                Some(tok) if tok.kind == TokenKind::CloseBrace => break,
                other => return Err(self.unexpected(other.as_ref(), ", or }")),
            }
        }

        Ok(Expr::Matchers { matchers })
    }

    /// Parse matcher: IDENT match_op STRING
    fn parse_matcher(&mut self) -> Result<Matcher, ParseError> {
        let name = self.expect(TokenKind::Ident, "identifier")?.text;

        let op = match self.advance()? {
            Some(tok) => match tok.kind {
                TokenKind::Eq => MatchType::Equal,
                TokenKind::Ne => MatchType::NotEqual,
                TokenKind::Re => MatchType::RegexMatch,
                TokenKind::Nre => MatchType::RegexNotMatch,
                _ => return Err(self.unexpected(Some(&tok), "match operator")),
            },
            None => return Err(self.unexpected(None, "match operator")),
        };

        let value = self.expect(TokenKind::Str, "string")?.text;
        Ok(Matcher { name, op, value })
    }
}

/// Parse a query string into an AST.
pub fn parse_expr(input: &str) -> Result<Expr, ParseError> {
    Parser::new(Lexer::new(input)).parse_query()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selector(matchers: Vec<Matcher>) -> Expr {
        Expr::Matchers { matchers }
    }

    fn filter(left: Expr, op: MatchType, pattern: &str) -> Expr {
        Expr::Filter {
            left: Box::new(left),
            op,
            pattern: pattern.into(),
        }
    }

    fn foo_bar() -> Expr {
        selector(vec![Matcher::new(MatchType::Equal, "foo", "bar")])
    }

    fn assert_error(input: &str, message: &str, line: usize, column: usize) {
        let err = parse_expr(input).unwrap_err();
        assert_eq!(
            err,
            ParseError {
                message: message.into(),
                line,
                column,
            },
            "input: {input}"
        );
    }

    #[test]
    fn test_simple_selector() {
        assert_eq!(parse_expr(r#"{foo="bar"}"#).unwrap(), foo_bar());
        assert_eq!(parse_expr(r#"{ foo = "bar" }"#).unwrap(), foo_bar());
    }

    #[test]
    fn test_dotted_label() {
        assert_eq!(
            parse_expr(r#"{http.url=~"^/admin"}"#).unwrap(),
            selector(vec![Matcher::new(MatchType::RegexMatch, "http.url", "^/admin")])
        );
    }

    #[test]
    fn test_matcher_operators() {
        for (op, expected) in [
            ("=", MatchType::Equal),
            ("!=", MatchType::NotEqual),
            ("=~", MatchType::RegexMatch),
            ("!~", MatchType::RegexNotMatch),
        ] {
            let ast = parse_expr(&format!(r#"{{ foo {op} "bar" }}"#)).unwrap();
            assert_eq!(ast, selector(vec![Matcher::new(expected, "foo", "bar")]));
        }
    }

    #[test]
    fn test_multiple_matchers_keep_order() {
        assert_eq!(
            parse_expr(r#"{ foo = "bar", bar != "baz" }"#).unwrap(),
            selector(vec![
                Matcher::new(MatchType::Equal, "foo", "bar"),
                Matcher::new(MatchType::NotEqual, "bar", "baz"),
            ])
        );
    }

    #[test]
    fn test_duplicate_matchers_are_kept() {
        let ast = parse_expr(r#"{a="1", a!="1", a="1"}"#).unwrap();
        assert_eq!(ast.matchers().len(), 3);
    }

    #[test]
    fn test_single_filter() {
        assert_eq!(
            parse_expr(r#"{foo="bar"} |= "baz""#).unwrap(),
            filter(foo_bar(), MatchType::Equal, "baz")
        );
    }

    #[test]
    fn test_filter_chain_is_left_leaning() {
        let ast = parse_expr(r#"{foo="bar"} |= "baz" |~ "blip" != "flip" !~ "flap""#).unwrap();
        let expected = filter(
            filter(
                filter(
                    filter(foo_bar(), MatchType::Equal, "baz"),
                    MatchType::RegexMatch,
                    "blip",
                ),
                MatchType::NotEqual,
                "flip",
            ),
            MatchType::RegexNotMatch,
            "flap",
        );
        assert_eq!(ast, expected);
    }

    #[test]
    fn test_escaped_values() {
        let ast = parse_expr(r#"{ foo = "ba\"r" } |= "a\\b""#).unwrap();
        assert_eq!(ast.matchers()[0].value, "ba\"r");
        assert_eq!(ast.filters(), vec![(MatchType::Equal, "a\\b")]);
    }

    #[test]
    fn test_unterminated_literal() {
        assert_error(r#"{foo="bar}"#, "literal not terminated", 1, 6);
    }

    #[test]
    fn test_truncated_filter() {
        assert_error(
            r#"{foo="bar"} |~"#,
            "unexpected end of query, expected string",
            1,
            15,
        );
    }

    #[test]
    fn test_unexpected_token_after_selector() {
        assert_error(
            r#"{foo="bar"} "foo""#,
            "unexpected string, expected pipe",
            1,
            13,
        );
        assert_error(
            r#"{foo="bar"} |= "a" = "b""#,
            "unexpected =, expected pipe",
            1,
            20,
        );
    }

    #[test]
    fn test_filter_operand_must_be_string() {
        assert_error(
            r#"{foo="bar"} |= bar"#,
            "unexpected identifier, expected string",
            1,
            16,
        );
    }

    #[test]
    fn test_empty_selector() {
        assert_error("{}", "unexpected }, expected identifier", 1, 2);
    }

    #[test]
    fn test_trailing_comma() {
        assert_error(
            r#"{foo="bar",}"#,
            "unexpected }, expected identifier",
            1,
            12,
        );
    }

    #[test]
    fn test_malformed_matchers() {
        assert_error(r#"{foo "bar"}"#, "unexpected string, expected match operator", 1, 6);
        assert_error(r#"{foo |= "bar"}"#, "unexpected |=, expected match operator", 1, 6);
        assert_error(r#"{foo = bar}"#, "unexpected identifier, expected string", 1, 8);
        assert_error(r#"{foo="bar" x="y"}"#, "unexpected identifier, expected , or }", 1, 12);
        assert_error("{foo", "unexpected end of query, expected match operator", 1, 5);
        assert_error(r#"{foo="bar""#, "unexpected end of query, expected , or }", 1, 11);
    }

    #[test]
    fn test_missing_selector() {
        assert_error("", "unexpected end of query, expected {", 1, 1);
        assert_error(r#"|= "foo""#, "unexpected |=, expected {", 1, 1);
    }

    #[test]
    fn test_lexer_errors_surface_unchanged() {
        assert_error(r#"{foo="bar"} | "baz""#, "unexpected character '|'", 1, 13);
    }

    #[test]
    fn test_multiline_positions() {
        assert_error(
            "{foo=\"bar\"}\n|= \"a\"\n  \"b\"",
            "unexpected string, expected pipe",
            3,
            3,
        );
        assert_error(
            "{foo=\"bar\"}\n|~ ",
            "unexpected end of query, expected string",
            2,
            4,
        );
    }

    #[test]
    fn test_parse_is_idempotent() {
        let query = r#"{app="api", env=~"prod|staging"} != "healthz" |~ "5\\d\\d""#;
        assert_eq!(parse_expr(query).unwrap(), parse_expr(query).unwrap());
    }

    #[test]
    fn test_long_filter_chain() {
        let mut query = String::from(r#"{a="b"}"#);
        for _ in 0..100_000 {
            query.push_str(r#" |= "x""#);
        }

        let ast = parse_expr(&query).unwrap();
        assert_eq!(ast.filters().len(), 100_000);
        assert_eq!(ast.matchers()[0].name, "a");

        let rendered = ast.to_string();
        assert_eq!(rendered, query);

        let reparsed = parse_expr(&rendered).unwrap();
        assert_eq!(reparsed, ast);
        assert_eq!(ast.clone(), reparsed);
        assert!(format!("{:?}", ast).starts_with("Expr { matchers"));

        drop(reparsed);
        drop(ast);
    }

    #[test]
    fn test_display_reparses() {
        for query in [
            r#"{foo="bar"}"#,
            r#"{ foo = "ba\"r", http.url !~ "^/admin" }"#,
            r#"{foo="bar"} |= "baz" |~ "blip" != "flip" !~ "flap""#,
            "{msg=\"tab\\tnew\\nline\\x01\"} |= \"\\\\\"",
        ] {
            let ast = parse_expr(query).unwrap();
            assert_eq!(parse_expr(&ast.to_string()).unwrap(), ast, "query: {query}");
        }
    }
}
