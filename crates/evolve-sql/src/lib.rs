//! evolve-sql - SQL layer for Evolve
//!
//! This crate turns raw script content into executable statements:
//! placeholder substitution, statement splitting by batch delimiter or
//! terminator, and a lint pass flagging unguarded DDL.

pub mod error;
pub mod lint;
pub mod placeholder;
pub mod splitter;

pub use error::{SqlError, SqlResult};
pub use lint::{lint_statement, LintIssue};
pub use placeholder::{replace_placeholders, Placeholders};
pub use splitter::{SplitStrategy, SqlStatement, SqlStatementBuilder};
