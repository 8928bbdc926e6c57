//! Split script content into executable statements.

use crate::error::{SqlError, SqlResult};
use crate::lint::{lint_statement, strip_literals_and_comments, LintIssue};
use crate::placeholder::Placeholders;
use evolve_core::{Dialect, Directives, LintLevel};
use serde::Serialize;

/// How statements are delimited in a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitStrategy {
    /// Statements end at a line holding only the delimiter (e.g. `GO`).
    /// `None` makes the whole script a single statement.
    Delimiter(Option<String>),
    /// Statements end at every `;`, which stays in the statement text.
    ///
    /// This is line oriented: a `;` inside a string literal or a comment
    /// also ends the statement.
    Terminator,
}

impl SplitStrategy {
    /// Strategy for `dialect`. A configured batch delimiter wins, then the
    /// terminator opt-in, then the dialect's default delimiter.
    pub fn for_dialect(
        dialect: Dialect,
        batch_delimiter: Option<&str>,
        split_on_terminator: bool,
    ) -> Self {
        match batch_delimiter {
            Some(d) => SplitStrategy::Delimiter(Some(d.to_string())),
            None if split_on_terminator => SplitStrategy::Terminator,
            None => SplitStrategy::Delimiter(
                dialect.default_batch_delimiter().map(str::to_string),
            ),
        }
    }
}

/// One executable unit of a script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SqlStatement {
    pub sql: String,
    /// 0-based line of the first non-blank line of the statement
    pub line_number: usize,
    pub must_execute_in_transaction: bool,
}

/// Builds statements from script content.
#[derive(Debug, Clone)]
pub struct SqlStatementBuilder {
    strategy: SplitStrategy,
    lint: LintLevel,
}

#[derive(Default)]
struct Pending {
    text: String,
    first_line: Option<usize>,
}

impl Pending {
    fn push(&mut self, chunk: &str, line: usize) {
        if self.first_line.is_none() && !chunk.trim().is_empty() {
            self.first_line = Some(line);
        }
        self.text.push_str(chunk);
    }
}

impl SqlStatementBuilder {
    pub fn new(strategy: SplitStrategy) -> Self {
        Self {
            strategy,
            lint: LintLevel::Off,
        }
    }

    pub fn with_lint(mut self, level: LintLevel) -> Self {
        self.lint = level;
        self
    }

    /// Substitute placeholders, split, then lint the statements.
    pub fn split(&self, content: &str, placeholders: &Placeholders) -> SqlResult<Vec<SqlStatement>> {
        let content = placeholders.replace(content);
        let statements = match &self.strategy {
            SplitStrategy::Delimiter(delimiter) => split_on_delimiter(&content, delimiter.as_deref()),
            SplitStrategy::Terminator => split_on_terminator(&content),
        };

        self.lint(&statements)?;
        Ok(statements)
    }

    fn lint(&self, statements: &[SqlStatement]) -> SqlResult<()> {
        if self.lint == LintLevel::Off {
            return Ok(());
        }

        let issues: Vec<LintIssue> = statements
            .iter()
            .flat_map(|s| lint_statement(&s.sql, s.line_number))
            .collect();

        match self.lint {
            LintLevel::Error if !issues.is_empty() => Err(SqlError::LintFailed { issues }),
            _ => {
                for issue in &issues {
                    log::warn!("SQL lint (line {}): {}", issue.line_number + 1, issue.message);
                }
                Ok(())
            }
        }
    }
}

fn split_on_delimiter(content: &str, delimiter: Option<&str>) -> Vec<SqlStatement> {
    let mut statements = Vec::new();
    let mut pending = Pending::default();
    let mut in_transaction = true;

    for (line_number, line) in content.lines().enumerate() {
        if Directives::is_tx_off_line(line) {
            in_transaction = false;
        }
        if delimiter.is_some_and(|d| line.trim().eq_ignore_ascii_case(d)) {
            flush(&mut pending, in_transaction, &mut statements);
            continue;
        }
        pending.push(line, line_number);
        pending.push("\n", line_number);
    }
    flush(&mut pending, in_transaction, &mut statements);

    statements
}

fn split_on_terminator(content: &str) -> Vec<SqlStatement> {
    let mut statements = Vec::new();
    let mut pending = Pending::default();
    let mut in_transaction = true;

    for (line_number, line) in content.lines().enumerate() {
        if Directives::is_tx_off_line(line) {
            in_transaction = false;
        }
        let mut rest = line;
        while let Some(pos) = rest.find(';') {
            pending.push(&rest[..=pos], line_number);
            flush(&mut pending, in_transaction, &mut statements);
            rest = &rest[pos + 1..];
        }
        pending.push(rest, line_number);
        pending.push("\n", line_number);
    }
    flush(&mut pending, in_transaction, &mut statements);

    statements
}

fn flush(pending: &mut Pending, in_transaction: bool, statements: &mut Vec<SqlStatement>) {
    let Pending { text, first_line } = std::mem::take(pending);
    let sql = text.trim();
    if sql.is_empty() || is_only_comments(sql) {
        return;
    }
    statements.push(SqlStatement {
        sql: sql.to_string(),
        line_number: first_line.unwrap_or(0),
        must_execute_in_transaction: in_transaction,
    });
}

fn is_only_comments(sql: &str) -> bool {
    strip_literals_and_comments(sql)
        .chars()
        .all(|c| c.is_whitespace() || c == ';')
}

#[cfg(test)]
#[path = "splitter_test.rs"]
mod tests;
