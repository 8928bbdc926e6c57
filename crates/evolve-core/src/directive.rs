//! Per-script directives declared in leading `--` comment lines.
//!
//! ```sql
//! -- evolve-tx-off
//! -- evolve-repeat-always
//! -- evolve-repeatable-deps=R__base_views.sql|R__functions.sql
//! CREATE VIEW ...
//! ```

/// Run the whole script outside of a transaction.
pub const TX_OFF: &str = "evolve-tx-off";

/// Re-run a repeatable script on every migrate, even when unchanged.
pub const REPEAT_ALWAYS: &str = "evolve-repeat-always";

/// Names of repeatable scripts that must run before this one.
pub const REPEATABLE_DEPS: &str = "evolve-repeatable-deps=";

/// Directives extracted from the head of a script.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directives {
    pub tx_off: bool,
    pub repeat_always: bool,
    pub dependencies: Vec<String>,
}

impl Directives {
    /// Scan the leading comment block of `content`.
    ///
    /// Blank lines are skipped; the scan stops at the first line that is
    /// not a `--` comment, so a batch separator such as `GO` ends it.
    pub fn parse(content: &str) -> Self {
        let mut directives = Directives::default();

        for line in content.lines() {
            let trimmed = line.trim().trim_start_matches('\u{feff}');
            if trimmed.is_empty() {
                continue;
            }
            let Some(comment) = trimmed.strip_prefix("--") else {
                break;
            };
            let comment = comment.trim();
            let lower = comment.to_ascii_lowercase();

            if lower.contains(TX_OFF) {
                directives.tx_off = true;
            }
            if lower.contains(REPEAT_ALWAYS) {
                directives.repeat_always = true;
            }
            if let Some(pos) = lower.find(REPEATABLE_DEPS) {
                let list = &comment[pos + REPEATABLE_DEPS.len()..];
                directives.dependencies.extend(
                    list.split('|')
                        .map(str::trim)
                        .filter(|d| !d.is_empty())
                        .map(String::from),
                );
            }
        }

        directives
    }

    /// Whether a single comment line carries the transaction-off directive.
    pub fn is_tx_off_line(line: &str) -> bool {
        line.trim()
            .strip_prefix("--")
            .is_some_and(|c| c.to_ascii_lowercase().contains(TX_OFF))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_directives() {
        let d = Directives::parse("CREATE TABLE t (id INT);");
        assert_eq!(d, Directives::default());
    }

    #[test]
    fn test_all_directives() {
        let d = Directives::parse(
            "-- evolve-tx-off\n\n-- evolve-repeat-always\n-- evolve-repeatable-deps=R__a.sql| R__b.sql\nSELECT 1;",
        );
        assert!(d.tx_off);
        assert!(d.repeat_always);
        assert_eq!(d.dependencies, vec!["R__a.sql", "R__b.sql"]);
    }

    #[test]
    fn test_stops_at_first_statement() {
        let d = Directives::parse("SELECT 1;\n-- evolve-tx-off\n");
        assert!(!d.tx_off);
    }

    #[test]
    fn test_batch_separator_ends_scan() {
        let d = Directives::parse("-- header\nGO\n-- evolve-repeat-always\n");
        assert!(!d.repeat_always);
    }

    #[test]
    fn test_directive_case_insensitive() {
        let d = Directives::parse("-- Evolve-Tx-Off\nSELECT 1;");
        assert!(d.tx_off);
    }

    #[test]
    fn test_is_tx_off_line() {
        assert!(Directives::is_tx_off_line("  -- evolve-tx-off"));
        assert!(!Directives::is_tx_off_line("SELECT 'evolve-tx-off'"));
    }
}
