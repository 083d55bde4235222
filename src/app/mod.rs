use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use rayon::prelude::*;
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;

use crate::config::NamedQuery;
use logql::{Expr, ParseError, Token, parse_expr, tokenize};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Queries to compile
    pub queries: Vec<String>,

    /// Query file (YAML) with a `queries` map of name -> query
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Number of threads (default: all cores)
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum OutputFormat {
    /// `name: <canonical query>` or `name: <error>`
    #[value(name = "text")]
    Text,
    /// One JSON object per query and line
    #[value(name = "json")]
    Json,
    /// Token stream with positions
    #[value(name = "tokens")]
    Tokens,
}

/// Outcome of compiling one named query.
#[derive(Debug, Serialize)]
pub struct Report {
    pub name: String,
    pub query: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Expr(Expr),
    #[serde(skip)]
    Tokens(Vec<Token>),
    Error(ParseError),
}

impl Report {
    pub fn failed(&self) -> bool {
        matches!(self.outcome, Outcome::Error(_))
    }
}

fn compile(named: &NamedQuery, format: OutputFormat) -> Report {
    let outcome = match format {
        OutputFormat::Tokens => tokenize(&named.query).map(Outcome::Tokens),
        OutputFormat::Text | OutputFormat::Json => parse_expr(&named.query).map(Outcome::Expr),
    }
    .unwrap_or_else(Outcome::Error);

    if let Outcome::Error(err) = &outcome {
        tracing::debug!("Query '{}' failed: {}", named.name, err);
    }

    Report {
        name: named.name.clone(),
        query: named.query.clone(),
        outcome,
    }
}

/// Compile all queries in parallel; reports keep the input order.
pub fn compile_all(queries: &[NamedQuery], format: OutputFormat) -> Vec<Report> {
    queries.par_iter().map(|q| compile(q, format)).collect()
}

pub fn write_report<W: Write>(out: &mut W, report: &Report, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        serde_json::to_writer(&mut *out, report)?;
        writeln!(out)?;
        return Ok(());
    }

    match &report.outcome {
        Outcome::Expr(expr) => writeln!(out, "{}: {}", report.name, expr)?,
        Outcome::Error(err) => writeln!(out, "{}: {}", report.name, err)?,
        Outcome::Tokens(tokens) => {
            writeln!(out, "{}:", report.name)?;
            for tok in tokens {
                writeln!(
                    out,
                    "  {}:{} {} {:?}",
                    tok.pos.line, tok.pos.column, tok.kind, tok.text
                )?;
            }
        }
    }
    Ok(())
}

/// Compile and print every query; returns the number that failed.
pub fn run(queries: &[NamedQuery], format: OutputFormat) -> Result<usize> {
    let reports = compile_all(queries, format);

    let stdout = std::io::stdout();
    let mut out = std::io::BufWriter::new(stdout.lock());
    for report in &reports {
        write_report(&mut out, report, format).context("CLI: Failed to write report")?;
    }
    out.flush().context("CLI: Failed to flush output")?;

    Ok(reports.iter().filter(|r| r.failed()).count())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &str, query: &str) -> NamedQuery {
        NamedQuery {
            name: name.into(),
            query: query.into(),
        }
    }

    fn render(report: &Report, format: OutputFormat) -> String {
        let mut buf = Vec::new();
        write_report(&mut buf, report, format).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_compile_all_keeps_order() {
        let queries: Vec<NamedQuery> = (0..50)
            .map(|i| named(&format!("q{i}"), &format!("{{n=\"{i}\"}}")))
            .collect();
        let reports = compile_all(&queries, OutputFormat::Text);
        for (i, report) in reports.iter().enumerate() {
            assert_eq!(report.name, format!("q{i}"));
            assert!(!report.failed());
        }
    }

    #[test]
    fn test_text_output() {
        let report = compile(&named("ok", r#"{ app = "api" }  |= "err""#), OutputFormat::Text);
        assert_eq!(render(&report, OutputFormat::Text), "ok: {app=\"api\"} |= \"err\"\n");

        let report = compile(&named("bad", r#"{app="api"} |~"#), OutputFormat::Text);
        assert!(report.failed());
        assert_eq!(
            render(&report, OutputFormat::Text),
            "bad: parse error at line 1, col 15: unexpected end of query, expected string\n"
        );
    }

    #[test]
    fn test_json_output() {
        let report = compile(&named("ok", r#"{app="api"} != "debug""#), OutputFormat::Json);
        let value: serde_json::Value =
            serde_json::from_str(&render(&report, OutputFormat::Json)).unwrap();

        assert_eq!(value["name"], "ok");
        assert_eq!(value["expr"]["matchers"][0]["name"], "app");
        assert_eq!(value["expr"]["filters"][0]["op"], "not_equal");
        assert_eq!(value["expr"]["filters"][0]["pattern"], "debug");

        let report = compile(&named("bad", "{}"), OutputFormat::Json);
        let value: serde_json::Value =
            serde_json::from_str(&render(&report, OutputFormat::Json)).unwrap();
        assert_eq!(value["error"]["column"], 2);
        assert!(value.get("expr").is_none());
    }

    #[test]
    fn test_long_chain_output() {
        let query = format!(r#"{{job="x"}}{}"#, r#" != "y""#.repeat(20_000));
        let report = compile(&named("long", &query), OutputFormat::Json);
        let value: serde_json::Value =
            serde_json::from_str(&render(&report, OutputFormat::Json)).unwrap();
        assert_eq!(value["expr"]["filters"].as_array().unwrap().len(), 20_000);

        let text = render(&report, OutputFormat::Text);
        assert_eq!(text, format!("long: {}\n", query));
    }

    #[test]
    fn test_tokens_output() {
        let report = compile(&named("t", r#"{a="b"}"#), OutputFormat::Tokens);
        assert_eq!(
            render(&report, OutputFormat::Tokens),
            "t:\n  1:1 { \"{\"\n  1:2 identifier \"a\"\n  1:3 = \"=\"\n  1:4 string \"b\"\n  1:7 } \"}\"\n"
        );
    }
}
