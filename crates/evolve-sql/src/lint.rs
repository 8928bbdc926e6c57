//! Unsafe DDL lint.
//!
//! Flags `CREATE` / `DROP` of tables, schemas, databases, views and
//! sequences that lack an `IF [NOT] EXISTS` guard. Literals and comments
//! are blanked from a scratch copy first so they cannot match.

use regex::Regex;
use serde::Serialize;
use sqlparser::dialect::GenericDialect;
use sqlparser::tokenizer::{Token, Tokenizer, Whitespace};
use std::sync::OnceLock;

/// One lint finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LintIssue {
    pub message: String,
    /// 0-based line in the script
    pub line_number: usize,
    pub statement: String,
}

static DROP_RE: OnceLock<Regex> = OnceLock::new();
static CREATE_RE: OnceLock<Regex> = OnceLock::new();
static STRIP_RE: OnceLock<Regex> = OnceLock::new();

fn drop_regex() -> &'static Regex {
    DROP_RE.get_or_init(|| {
        Regex::new(r"(?i)\bDROP\s+(TABLE|SCHEMA|DATABASE|VIEW|SEQUENCE)\b(\s+IF\s+EXISTS\b)?")
            .expect("valid regex")
    })
}

fn create_regex() -> &'static Regex {
    CREATE_RE.get_or_init(|| {
        Regex::new(
            r"(?i)\bCREATE\s+(OR\s+REPLACE\s+)?(TABLE|SCHEMA|DATABASE|VIEW|SEQUENCE)\b(\s+IF\s+NOT\s+EXISTS\b)?",
        )
        .expect("valid regex")
    })
}

fn strip_regex() -> &'static Regex {
    STRIP_RE.get_or_init(|| {
        Regex::new(r"'(?:[^']|'')*'|--[^\n]*|/\*[\s\S]*?\*/").expect("valid regex")
    })
}

/// Lint one statement whose first line is `line_number` in the script.
pub fn lint_statement(sql: &str, line_number: usize) -> Vec<LintIssue> {
    let scratch = strip_literals_and_comments(sql);
    let mut issues = Vec::new();

    for caps in drop_regex().captures_iter(&scratch) {
        if caps.get(2).is_none() {
            let kind = caps[1].to_ascii_uppercase();
            issues.push(issue(
                format!("DROP {kind} statement without IF EXISTS guard"),
                sql,
                &scratch,
                caps.get(0).map_or(0, |m| m.start()),
                line_number,
            ));
        }
    }

    for caps in create_regex().captures_iter(&scratch) {
        let or_replace = caps.get(1).is_some();
        if caps.get(3).is_none() && !or_replace {
            let kind = caps[2].to_ascii_uppercase();
            issues.push(issue(
                format!("CREATE {kind} statement without IF NOT EXISTS guard"),
                sql,
                &scratch,
                caps.get(0).map_or(0, |m| m.start()),
                line_number,
            ));
        }
    }

    issues.sort_by_key(|i| i.line_number);
    issues
}

fn issue(
    message: String,
    sql: &str,
    scratch: &str,
    offset: usize,
    line_number: usize,
) -> LintIssue {
    // Stripping keeps newlines, so offsets map to the same line.
    let line = scratch[..offset].matches('\n').count();
    LintIssue {
        message,
        line_number: line_number + line,
        statement: sql.trim().to_string(),
    }
}

/// Replace string literals with `''` and comments with nothing, keeping
/// every newline so line numbers survive.
pub(crate) fn strip_literals_and_comments(sql: &str) -> String {
    let dialect = GenericDialect {};
    let tokens = match Tokenizer::new(&dialect, sql).tokenize() {
        Ok(tokens) => tokens,
        Err(e) => {
            log::debug!("Tokenizer failed ({e}), stripping with regex");
            return strip_with_regex(sql);
        }
    };

    let mut out = String::with_capacity(sql.len());
    for token in tokens {
        match &token {
            Token::Whitespace(Whitespace::SingleLineComment { .. })
            | Token::Whitespace(Whitespace::MultiLineComment(_)) => {
                push_newlines(&mut out, &token.to_string());
            }
            Token::SingleQuotedString(_)
            | Token::NationalStringLiteral(_)
            | Token::EscapedStringLiteral(_)
            | Token::HexStringLiteral(_)
            | Token::DollarQuotedString(_) => {
                out.push_str("''");
                push_newlines(&mut out, &token.to_string());
            }
            _ => out.push_str(&token.to_string()),
        }
    }
    out
}

fn strip_with_regex(sql: &str) -> String {
    strip_regex()
        .replace_all(sql, |caps: &regex::Captures<'_>| {
            let text = &caps[0];
            let newlines = "\n".repeat(text.matches('\n').count());
            if text.starts_with('\'') {
                format!("''{newlines}")
            } else {
                newlines
            }
        })
        .into_owned()
}

fn push_newlines(out: &mut String, text: &str) {
    for _ in 0..text.matches('\n').count() {
        out.push('\n');
    }
}

#[cfg(test)]
#[path = "lint_test.rs"]
mod tests;
