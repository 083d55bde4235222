//! AST types for log queries.

use serde::Serialize;
use serde::ser::{SerializeStruct, Serializer};
use std::fmt;
use std::mem;

/// Comparison used by both label matchers and line filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Equal,         // =   |=
    NotEqual,      // !=  !=
    RegexMatch,    // =~  |~
    RegexNotMatch, // !~  !~
}

impl MatchType {
    /// Operator as written inside a selector.
    pub fn matcher_symbol(self) -> &'static str {
        match self {
            MatchType::Equal => "=",
            MatchType::NotEqual => "!=",
            MatchType::RegexMatch => "=~",
            MatchType::RegexNotMatch => "!~",
        }
    }

    /// Operator as written in a line filter.
    pub fn filter_symbol(self) -> &'static str {
        match self {
            MatchType::Equal => "|=",
            MatchType::NotEqual => "!=",
            MatchType::RegexMatch => "|~",
            MatchType::RegexNotMatch => "!~",
        }
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.matcher_symbol())
    }
}

/// A single label matcher: `name op "value"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Matcher {
    pub name: String,
    pub op: MatchType,
    pub value: String,
}

impl Matcher {
    pub fn new(op: MatchType, name: impl Into<String>, value: impl Into<String>) -> Self {
        Matcher {
            name: name.into(),
            op,
            value: value.into(),
        }
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.op)?;
        write_quoted(f, &self.value)
    }
}

/// Root query expression.
///
/// Always a left-leaning chain: the innermost node is the selector and each
/// `Filter` wraps the expression written before it. Chains can be arbitrarily
/// long, so every trait impl below walks them with a loop.
pub enum Expr {
    /// Stream selector: `{foo="bar", baz=~"q.*"}`
    Matchers { matchers: Vec<Matcher> },

    /// Line filter: `<left> |= "pattern"`
    Filter {
        left: Box<Expr>,
        op: MatchType,
        pattern: String,
    },
}

/// One line filter as exposed in serialized output.
#[derive(Serialize)]
struct LineFilter<'a> {
    op: MatchType,
    pattern: &'a str,
}

impl Expr {
    /// Build a chain from a selector and filters in application order.
    pub fn from_parts<I>(matchers: Vec<Matcher>, filters: I) -> Self
    where
        I: IntoIterator<Item = (MatchType, String)>,
    {
        filters
            .into_iter()
            .fold(Expr::Matchers { matchers }, |left, (op, pattern)| {
                Expr::Filter {
                    left: Box::new(left),
                    op,
                    pattern,
                }
            })
    }

    /// Matchers of the selector at the root of the chain.
    pub fn matchers(&self) -> &[Matcher] {
        let mut expr = self;
        loop {
            match expr {
                Expr::Matchers { matchers } => return matchers,
                Expr::Filter { left, .. } => expr = left,
            }
        }
    }

    /// Line filters in the order they apply (leftmost first).
    pub fn filters(&self) -> Vec<(MatchType, &str)> {
        let mut filters = Vec::new();
        let mut expr = self;
        while let Expr::Filter { left, op, pattern } = expr {
            filters.push((*op, pattern.as_str()));
            expr = left;
        }
        filters.reverse();
        filters
    }
}

impl Drop for Expr {
    fn drop(&mut self) {
        let mut next = take_left(self);
        while let Some(mut expr) = next {
            next = take_left(&mut expr);
        }
    }
}

/// Detach the left side of a filter, leaving an empty selector in its place.
fn take_left(expr: &mut Expr) -> Option<Expr> {
    match expr {
        Expr::Filter { left, .. } => Some(mem::replace(
            left.as_mut(),
            Expr::Matchers {
                matchers: Vec::new(),
            },
        )),
        Expr::Matchers { .. } => None,
    }
}

impl Clone for Expr {
    fn clone(&self) -> Self {
        let filters = self
            .filters()
            .into_iter()
            .map(|(op, pattern)| (op, pattern.to_string()));
        Expr::from_parts(self.matchers().to_vec(), filters)
    }
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        self.matchers() == other.matchers() && self.filters() == other.filters()
    }
}

impl Eq for Expr {}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expr")
            .field("matchers", &self.matchers())
            .field("filters", &self.filters())
            .finish()
    }
}

/// Serialized flat, as `{"matchers": [...], "filters": [{"op", "pattern"}]}`.
impl Serialize for Expr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let filters: Vec<LineFilter<'_>> = self
            .filters()
            .into_iter()
            .map(|(op, pattern)| LineFilter { op, pattern })
            .collect();

        let mut state = serializer.serialize_struct("Expr", 2)?;
        state.serialize_field("matchers", self.matchers())?;
        state.serialize_field("filters", &filters)?;
        state.end()
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, m) in self.matchers().iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", m)?;
        }
        f.write_str("}")?;

        for (op, pattern) in self.filters() {
            write!(f, " {} ", op.filter_symbol())?;
            write_quoted(f, pattern)?;
        }
        Ok(())
    }
}

/// Write `s` as a double-quoted literal the lexer reads back unchanged.
fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c if c.is_ascii_control() => write!(f, "\\x{:02x}", c as u32)?,
            c => write!(f, "{}", c)?,
        }
    }
    f.write_str("\"")
}
