//! End-to-end tests for the migration engine.
//!
//! Every test runs against one in-memory DuckDB database. Each `Evolve`
//! gets its own connection to it, and a separate connection is kept for
//! inspecting the result.

use evolve_core::{
    Command, EmbeddedMigrationLoader, EvolveConfig, LintLevel, TransactionMode, Version,
};
use evolve_db::{Database, DuckDbBackend, MetadataType, MigrationMetadata};
use evolve_engine::{CommandReport, ErrorKind, Evolve, EvolveError};

// ── Helpers ────────────────────────────────────────────────────────────

struct TestDb {
    db: DuckDbBackend,
}

impl TestDb {
    fn new() -> Self {
        Self {
            db: DuckDbBackend::in_memory().unwrap(),
        }
    }

    fn evolve(&self, config: EvolveConfig, scripts: &[(&str, &str)]) -> Evolve {
        Evolve::new(
            config,
            Box::new(self.db.try_clone().unwrap()),
            Box::new(EmbeddedMigrationLoader::new(scripts.iter().copied())),
        )
        .unwrap()
    }

    async fn rows(&self, schema: &str) -> Vec<MigrationMetadata> {
        self.db
            .metadata_table(schema, "changelog")
            .get_all()
            .await
            .unwrap()
    }

    async fn applied(&self, schema: &str) -> Vec<String> {
        self.rows(schema)
            .await
            .into_iter()
            .filter(|r| {
                r.success
                    && matches!(
                        r.kind,
                        MetadataType::Migration | MetadataType::RepeatableMigration
                    )
            })
            .map(|r| r.name)
            .collect()
    }

    async fn table_exists(&self, table: &str) -> bool {
        self.db
            .execute(&format!("SELECT * FROM {table} LIMIT 0"))
            .await
            .is_ok()
    }

    /// Fails unless `condition` (a boolean SQL expression) holds.
    async fn check(&self, condition: &str) {
        self.db
            .execute(&format!(
                "SELECT CASE WHEN {condition} THEN 1 ELSE error('check failed') END"
            ))
            .await
            .unwrap_or_else(|e| panic!("{condition}: {e}"));
    }
}

fn config(command: Command) -> EvolveConfig {
    EvolveConfig {
        command,
        lock_poll_interval_secs: 1,
        ..Default::default()
    }
}

const V1: (&str, &str) = ("V1__Create_users.sql", "CREATE TABLE users (id INT, name VARCHAR);");
const V2: (&str, &str) = (
    "V2__Insert_users.sql",
    "INSERT INTO users VALUES (1, 'ada');\nINSERT INTO users VALUES (2, 'grace');",
);
const V3: (&str, &str) = ("V3__Add_email.sql", "ALTER TABLE users ADD COLUMN email VARCHAR;");
const R_VIEW: (&str, &str) = (
    "R__Users_view.sql",
    "CREATE OR REPLACE VIEW user_names AS SELECT name FROM users;",
);

// ── Migrate ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_migrate_applies_all_scripts() {
    let t = TestDb::new();
    let report = t
        .evolve(config(Command::Migrate), &[V1, V2, V3, R_VIEW])
        .migrate()
        .await
        .unwrap();

    assert_eq!(report.applied, 4);
    assert_eq!(report.skipped, 0);
    t.check("(SELECT count(*) FROM users) = 2").await;
    assert!(t.table_exists("user_names").await);
    assert_eq!(
        t.applied("main").await,
        [
            "V1__Create_users.sql",
            "V2__Insert_users.sql",
            "V3__Add_email.sql",
            "R__Users_view.sql"
        ]
    );
}

#[tokio::test]
async fn test_migrate_is_idempotent() {
    let t = TestDb::new();
    let scripts = [V1, V2, V3, R_VIEW];
    t.evolve(config(Command::Migrate), &scripts)
        .migrate()
        .await
        .unwrap();

    let second = t
        .evolve(config(Command::Migrate), &scripts)
        .migrate()
        .await
        .unwrap();
    assert_eq!(second.applied, 0);
    t.check("(SELECT count(*) FROM users) = 2").await;
}

#[tokio::test]
async fn test_execute_dispatches_on_command() {
    let t = TestDb::new();
    let report = t
        .evolve(config(Command::Migrate), &[V1])
        .execute()
        .await
        .unwrap();
    assert!(matches!(report, CommandReport::Migrate(ref m) if m.applied == 1));

    let nothing = t
        .evolve(config(Command::DoNothing), &[V1])
        .execute()
        .await
        .unwrap();
    assert_eq!(nothing, CommandReport::DoNothing);
}

#[tokio::test]
async fn test_no_scripts_is_a_no_op() {
    let t = TestDb::new();
    let report = t
        .evolve(config(Command::Migrate), &[])
        .migrate()
        .await
        .unwrap();
    assert_eq!(report.applied, 0);
}

#[tokio::test]
async fn test_records_empty_schema_once() {
    let t = TestDb::new();
    t.evolve(config(Command::Migrate), &[]).migrate().await.unwrap();
    t.evolve(config(Command::Migrate), &[]).migrate().await.unwrap();

    let markers: Vec<_> = t
        .rows("main")
        .await
        .into_iter()
        .filter(|r| r.kind == MetadataType::EmptySchema)
        .collect();
    assert_eq!(markers.len(), 1);
    assert_eq!(markers[0].name, "main");
}

#[tokio::test]
async fn test_target_version() {
    let t = TestDb::new();
    let mut cfg = config(Command::Migrate);
    cfg.target_version = Some(Version::parse("2").unwrap());
    let report = t.evolve(cfg, &[V1, V2, V3]).migrate().await.unwrap();

    assert_eq!(report.applied, 2);
    t.check("NOT EXISTS (SELECT 1 FROM information_schema.columns WHERE column_name = 'email')")
        .await;
}

#[tokio::test]
async fn test_placeholders_are_replaced() {
    let t = TestDb::new();
    let mut cfg = config(Command::Migrate);
    cfg.placeholders.insert("table".into(), "accounts".into());
    t.evolve(cfg, &[("V1__Create.sql", "CREATE TABLE ${table} (id INT);")])
        .migrate()
        .await
        .unwrap();
    assert!(t.table_exists("accounts").await);
}

#[tokio::test]
async fn test_semicolon_inside_string_literal() {
    let t = TestDb::new();
    let seed = (
        "V2__Seed.sql",
        "INSERT INTO users VALUES (1, 'a;b');\nINSERT INTO users VALUES (2, 'c');",
    );
    let report = t
        .evolve(config(Command::Migrate), &[V1, seed])
        .migrate()
        .await
        .unwrap();
    assert_eq!(report.applied, 2);
    t.check("(SELECT count(*) FROM users WHERE name = 'a;b') = 1").await;
    t.check("(SELECT count(*) FROM users) = 2").await;
}

#[tokio::test]
async fn test_split_on_terminator() {
    let t = TestDb::new();
    let mut cfg = config(Command::Migrate);
    cfg.split_on_terminator = true;
    t.evolve(cfg.clone(), &[V1, V2]).migrate().await.unwrap();
    t.check("(SELECT count(*) FROM users) = 2").await;

    // Each line-final `;` ends a statement, even inside a literal.
    let seed = ("V3__Seed.sql", "INSERT INTO users VALUES (3, 'a;b');");
    let err = t.evolve(cfg, &[V1, V2, seed]).migrate().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Execution);
    t.check("(SELECT count(*) FROM users) = 2").await;
}

#[tokio::test]
async fn test_failed_script_is_recorded_and_stops_the_run() {
    let t = TestDb::new();
    let bad = ("V2__Bad.sql", "INSERT INTO missing_table VALUES (1);");
    let err = t
        .evolve(config(Command::Migrate), &[V1, bad, V3])
        .migrate()
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Execution);
    assert!(err.to_string().contains("V2__Bad.sql"));
    assert!(t.table_exists("users").await);

    let rows = t.rows("main").await;
    let failed: Vec<_> = rows.iter().filter(|r| !r.success).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].name, "V2__Bad.sql");
    assert!(!rows.iter().any(|r| r.name == "V3__Add_email.sql"));
}

#[tokio::test]
async fn test_failed_script_is_rolled_back() {
    let t = TestDb::new();
    let partial = (
        "V2__Partial.sql",
        "CREATE TABLE orders (id INT);\nINSERT INTO missing_table VALUES (1);",
    );
    t.evolve(config(Command::Migrate), &[V1, partial])
        .migrate()
        .await
        .unwrap_err();
    assert!(!t.table_exists("orders").await);
}

#[tokio::test]
async fn test_lint_error_stops_before_execution() {
    let t = TestDb::new();
    let mut cfg = config(Command::Migrate);
    cfg.sql_lint_level = LintLevel::Error;
    let err = t
        .evolve(cfg, &[("V1__Drop.sql", "DROP TABLE users;")])
        .migrate()
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SqlLint);
    assert!(err.to_string().contains("DROP TABLE"));
    assert!(t.applied("main").await.is_empty());
}

#[tokio::test]
async fn test_skip_next_migrations() {
    let t = TestDb::new();
    let mut cfg = config(Command::Migrate);
    cfg.skip_next_migrations = true;
    let report = t.evolve(cfg, &[V1, V2]).migrate().await.unwrap();

    assert_eq!(report.skipped, 2);
    assert_eq!(report.applied, 0);
    assert!(!t.table_exists("users").await);
    assert_eq!(t.applied("main").await.len(), 2);
}

// ── Validation and Repair ──────────────────────────────────────────────

#[tokio::test]
async fn test_migrate_repair_migrate() {
    let t = TestDb::new();
    t.evolve(config(Command::Migrate), &[V1, V2, V3])
        .migrate()
        .await
        .unwrap();

    let edited = (
        V2.0,
        "INSERT INTO users VALUES (1, 'ada');\r\nINSERT INTO users VALUES (3, 'linus');",
    );
    let scripts = [V1, edited, V3];

    let err = t
        .evolve(config(Command::Migrate), &scripts)
        .migrate()
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let repair = t
        .evolve(config(Command::Repair), &scripts)
        .repair()
        .await
        .unwrap();
    assert_eq!(repair.repaired, 1);

    let migrate = t
        .evolve(config(Command::Migrate), &scripts)
        .migrate()
        .await
        .unwrap();
    assert_eq!(migrate.applied, 0);

    let again = t
        .evolve(config(Command::Repair), &scripts)
        .repair()
        .await
        .unwrap();
    assert_eq!(again.repaired, 0);
}

#[tokio::test]
async fn test_line_endings_do_not_break_validation() {
    let t = TestDb::new();
    t.evolve(config(Command::Migrate), &[V1, V2])
        .migrate()
        .await
        .unwrap();

    let crlf = V2.1.replace('\n', "\r\n");
    let report = t
        .evolve(config(Command::Validate), &[V1, (V2.0, crlf.as_str())])
        .validate()
        .await
        .unwrap();
    assert_eq!(report.validated, 2);
    assert_eq!(report.pending, 0);
}

#[tokio::test]
async fn test_missing_script_fails_validation() {
    let t = TestDb::new();
    t.evolve(config(Command::Migrate), &[V1, V2])
        .migrate()
        .await
        .unwrap();

    let err = t
        .evolve(config(Command::Validate), &[V1])
        .validate()
        .await
        .unwrap_err();
    assert!(matches!(err, EvolveError::MissingScript { .. }));
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_validate_counts_pending() {
    let t = TestDb::new();
    t.evolve(config(Command::Migrate), &[V1])
        .migrate()
        .await
        .unwrap();

    let report = t
        .evolve(config(Command::Validate), &[V1, V2, V3, R_VIEW])
        .validate()
        .await
        .unwrap();
    assert_eq!(report.validated, 1);
    assert_eq!(report.pending, 3);
}

#[tokio::test]
async fn test_must_erase_on_validation_error() {
    let t = TestDb::new();
    let mut cfg = config(Command::Migrate);
    cfg.schemas = vec!["app".into()];
    let v1 = ("V1__Create.sql", "CREATE TABLE app.items (id INT);");
    let v2 = ("V2__Seed.sql", "INSERT INTO app.items VALUES (1);");
    t.evolve(cfg.clone(), &[v1, v2]).migrate().await.unwrap();

    let edited = ("V2__Seed.sql", "INSERT INTO app.items VALUES (1), (2);");
    cfg.must_erase_on_validation_error = true;
    let report = t.evolve(cfg, &[v1, edited]).migrate().await.unwrap();

    assert_eq!(report.applied, 2);
    t.check("(SELECT count(*) FROM app.items) = 2").await;
    assert_eq!(t.applied("app").await, ["V1__Create.sql", "V2__Seed.sql"]);
}

// ── Out of order and start version ─────────────────────────────────────

#[tokio::test]
async fn test_out_of_order() {
    let t = TestDb::new();
    let hotfix = ("V2__Hotfix.sql", "CREATE TABLE hotfix (id INT);");
    t.evolve(config(Command::Migrate), &[V1, V3])
        .migrate()
        .await
        .unwrap();

    let err = t
        .evolve(config(Command::Migrate), &[V1, hotfix, V3])
        .migrate()
        .await
        .unwrap_err();
    assert!(matches!(err, EvolveError::NotApplied { .. }));
    assert!(!t.table_exists("hotfix").await);

    let mut cfg = config(Command::Migrate);
    cfg.out_of_order = true;
    let report = t.evolve(cfg, &[V1, hotfix, V3]).migrate().await.unwrap();
    assert_eq!(report.applied, 1);
    assert!(t.table_exists("hotfix").await);
}

#[tokio::test]
async fn test_migrate_after_out_of_order_run() {
    let t = TestDb::new();
    let hotfix = ("V2__Hotfix.sql", "CREATE TABLE hotfix (id INT);");
    let later = ("V2_5__Later.sql", "CREATE TABLE later (id INT);");
    t.evolve(config(Command::Migrate), &[V1, V3])
        .migrate()
        .await
        .unwrap();

    let mut cfg = config(Command::Migrate);
    cfg.out_of_order = true;
    t.evolve(cfg, &[V1, hotfix, V3]).migrate().await.unwrap();

    // V2 is now the last applied row, so 2.5 lies ahead of it.
    let report = t
        .evolve(config(Command::Migrate), &[V1, hotfix, later, V3])
        .migrate()
        .await
        .unwrap();
    assert_eq!(report.applied, 1);
    assert!(t.table_exists("later").await);
    assert_eq!(
        t.applied("main").await,
        [
            "V1__Create_users.sql",
            "V3__Add_email.sql",
            "V2__Hotfix.sql",
            "V2_5__Later.sql"
        ]
    );
}

#[tokio::test]
async fn test_start_version() {
    let t = TestDb::new();
    let mut cfg = config(Command::Migrate);
    cfg.start_version = Some(Version::parse("2").unwrap());
    let existing = ("V1__Existing.sql", "SELECT error('must not run');");
    let v2 = ("V2__Create.sql", "CREATE TABLE items (id INT);");
    let report = t.evolve(cfg.clone(), &[existing, v2]).migrate().await.unwrap();
    assert_eq!(report.applied, 1);

    let marker: Vec<_> = t
        .rows("main")
        .await
        .into_iter()
        .filter(|r| r.kind == MetadataType::StartVersion)
        .collect();
    assert_eq!(marker.len(), 1);

    let again = t.evolve(cfg.clone(), &[existing, v2]).migrate().await.unwrap();
    assert_eq!(again.applied, 0);

    cfg.start_version = Some(Version::parse("3").unwrap());
    let err = t
        .evolve(cfg, &[existing, v2])
        .migrate()
        .await
        .unwrap_err();
    assert!(matches!(err, EvolveError::StartVersion { .. }));
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[tokio::test]
async fn test_start_version_after_migrations_is_rejected() {
    let t = TestDb::new();
    t.evolve(config(Command::Migrate), &[V1])
        .migrate()
        .await
        .unwrap();

    let mut cfg = config(Command::Migrate);
    cfg.start_version = Some(Version::parse("5").unwrap());
    let err = t.evolve(cfg, &[V1]).migrate().await.unwrap_err();
    assert!(matches!(err, EvolveError::StartVersion { .. }));
}

// ── Repeatable migrations ──────────────────────────────────────────────

#[tokio::test]
async fn test_repeatable_reruns_on_change() {
    let t = TestDb::new();
    t.evolve(config(Command::Migrate), &[V1, R_VIEW])
        .migrate()
        .await
        .unwrap();

    let changed = (
        R_VIEW.0,
        "CREATE OR REPLACE VIEW user_names AS SELECT name, id FROM users;",
    );
    let report = t
        .evolve(config(Command::Migrate), &[V1, changed])
        .migrate()
        .await
        .unwrap();
    assert_eq!(report.applied, 1);

    let unchanged = t
        .evolve(config(Command::Migrate), &[V1, changed])
        .migrate()
        .await
        .unwrap();
    assert_eq!(unchanged.applied, 0);
}

#[tokio::test]
async fn test_repeat_always() {
    let t = TestDb::new();
    let always = (
        "R__Refresh.sql",
        "-- evolve-repeat-always\nCREATE OR REPLACE VIEW one AS SELECT 1 AS x;",
    );
    t.evolve(config(Command::Migrate), &[always])
        .migrate()
        .await
        .unwrap();
    let report = t
        .evolve(config(Command::Migrate), &[always])
        .migrate()
        .await
        .unwrap();
    assert_eq!(report.applied, 1);
}

const R_A: (&str, &str) = (
    "R__A_view.sql",
    "CREATE OR REPLACE VIEW a_view AS SELECT x FROM b_view;",
);
const R_B: (&str, &str) = (
    "R__B_view.sql",
    "CREATE OR REPLACE VIEW b_view AS SELECT 1 AS x;",
);

#[tokio::test]
async fn test_repeatable_dependencies_order_execution() {
    let t = TestDb::new();
    let a = (
        R_A.0,
        "-- evolve-repeatable-deps=R__B_view.sql\nCREATE OR REPLACE VIEW a_view AS SELECT x FROM b_view;",
    );
    let report = t
        .evolve(config(Command::Migrate), &[a, R_B])
        .migrate()
        .await
        .unwrap();
    assert_eq!(report.applied, 2);
    assert_eq!(t.applied("main").await, ["R__B_view.sql", "R__A_view.sql"]);
}

#[tokio::test]
async fn test_repeatable_cycle_is_a_configuration_error() {
    let t = TestDb::new();
    let a = ("R__A.sql", "-- evolve-repeatable-deps=R__B.sql\nSELECT 1;");
    let b = ("R__B.sql", "-- evolve-repeatable-deps=R__A.sql\nSELECT 1;");
    let err = t
        .evolve(config(Command::Migrate), &[a, b])
        .migrate()
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(err.to_string().contains("R__A.sql"));
}

#[tokio::test]
async fn test_repeatable_without_retry_fails() {
    let t = TestDb::new();
    let err = t
        .evolve(config(Command::Migrate), &[R_A, R_B])
        .migrate()
        .await
        .unwrap_err();
    assert!(err.to_string().contains("R__A_view.sql"));
}

#[tokio::test]
async fn test_repeatable_retry_until_no_error() {
    let t = TestDb::new();
    let mut cfg = config(Command::Migrate);
    cfg.retry_repeatable_migrations_until_no_error = true;
    let report = t.evolve(cfg, &[R_A, R_B]).migrate().await.unwrap();

    assert_eq!(report.applied, 2);
    assert!(t.table_exists("a_view").await);
    let rows = t.rows("main").await;
    assert!(rows.iter().any(|r| r.name == "R__A_view.sql" && !r.success));
}

#[tokio::test]
async fn test_repeatable_retry_stops_when_stalled() {
    let t = TestDb::new();
    let mut cfg = config(Command::Migrate);
    cfg.retry_repeatable_migrations_until_no_error = true;
    let broken = ("R__Broken.sql", "CREATE OR REPLACE VIEW v AS SELECT * FROM nowhere;");
    let err = t.evolve(cfg, &[broken, R_B]).migrate().await.unwrap_err();

    assert!(matches!(err, EvolveError::RepeatableFailures { count: 1, .. }));
    assert!(t.table_exists("b_view").await);
}

// ── Transaction modes ──────────────────────────────────────────────────

#[tokio::test]
async fn test_commit_all_rolls_back_everything_on_failure() {
    let t = TestDb::new();
    let mut cfg = config(Command::Migrate);
    cfg.transaction_mode = TransactionMode::CommitAll;
    let bad = ("V2__Bad.sql", "INSERT INTO missing_table VALUES (1);");
    t.evolve(cfg, &[V1, bad]).migrate().await.unwrap_err();

    assert!(!t.table_exists("users").await);
    let rows = t.rows("main").await;
    assert!(!rows.iter().any(|r| r.name == V1.0));
    assert!(rows.iter().any(|r| r.name == "V2__Bad.sql" && !r.success));
}

#[tokio::test]
async fn test_commit_all_commits_on_success() {
    let t = TestDb::new();
    let mut cfg = config(Command::Migrate);
    cfg.transaction_mode = TransactionMode::CommitAll;
    let report = t.evolve(cfg, &[V1, V2, R_VIEW]).migrate().await.unwrap();

    assert_eq!(report.applied, 3);
    t.check("(SELECT count(*) FROM users) = 2").await;
    assert_eq!(t.applied("main").await.len(), 3);
}

#[tokio::test]
async fn test_rollback_all_is_a_dry_run() {
    let t = TestDb::new();
    let mut cfg = config(Command::Migrate);
    cfg.transaction_mode = TransactionMode::RollbackAll;
    let report = t.evolve(cfg, &[V1, V2]).migrate().await.unwrap();

    assert_eq!(report.applied, 2);
    assert!(!t.table_exists("users").await);
    assert!(t.applied("main").await.is_empty());
}

#[tokio::test]
async fn test_tx_off_script_rejected_in_commit_all() {
    let t = TestDb::new();
    let mut cfg = config(Command::Migrate);
    cfg.transaction_mode = TransactionMode::CommitAll;
    let tx_off = ("V2__Outside.sql", "-- evolve-tx-off\nCREATE TABLE outside (id INT);");
    let err = t.evolve(cfg, &[V1, tx_off]).migrate().await.unwrap_err();

    assert!(matches!(err, EvolveError::TransactionDisabled { .. }));
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert_eq!(
        err.to_string(),
        "[EV007] Migration V2__Outside.sql disables transactions, which commit_all does not allow"
    );
    assert!(!t.table_exists("users").await);
}

#[tokio::test]
async fn test_tx_off_script_runs_in_commit_each() {
    let t = TestDb::new();
    let tx_off = ("V2__Outside.sql", "-- evolve-tx-off\nCREATE TABLE outside (id INT);");
    let report = t
        .evolve(config(Command::Migrate), &[V1, tx_off])
        .migrate()
        .await
        .unwrap();
    assert_eq!(report.applied, 2);
    assert!(t.table_exists("outside").await);
}

// ── Erase ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_erase_respects_schema_markers() {
    let t = TestDb::new();
    t.db.create_schema("audit").await.unwrap();
    t.db.create_schema("legacy").await.unwrap();
    t.db.execute("CREATE TABLE legacy.kept (id INT)").await.unwrap();

    let mut cfg = config(Command::Migrate);
    cfg.schemas = vec!["app".into(), "audit".into(), "legacy".into()];
    t.evolve(
        cfg.clone(),
        &[(
            "V1__Tables.sql",
            "CREATE TABLE app.items (id INT);\nCREATE TABLE audit.log (id INT);",
        )],
    )
    .migrate()
    .await
    .unwrap();

    cfg.command = Command::Erase;
    let report = t.evolve(cfg, &[]).erase().await.unwrap();

    assert_eq!(report.dropped, ["app"]);
    assert_eq!(report.erased, ["audit"]);
    assert_eq!(report.skipped, ["legacy"]);
    assert!(!t.db.schema_exists("app").await.unwrap());
    assert!(t.db.schema_exists("audit").await.unwrap());
    assert!(t.db.schema_is_empty("audit").await.unwrap());
    assert!(t.table_exists("legacy.kept").await);
}

#[tokio::test]
async fn test_erase_disabled() {
    let t = TestDb::new();
    let mut cfg = config(Command::Erase);
    cfg.is_erase_disabled = true;
    let err = t.evolve(cfg, &[]).erase().await.unwrap_err();
    assert!(matches!(err, EvolveError::EraseDisabled));
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[tokio::test]
async fn test_erase_then_migrate_again() {
    let t = TestDb::new();
    let mut cfg = config(Command::Migrate);
    cfg.schemas = vec!["app".into()];
    let v1 = ("V1__Create.sql", "CREATE TABLE app.items (id INT);");
    t.evolve(cfg.clone(), &[v1]).migrate().await.unwrap();

    cfg.command = Command::Erase;
    t.evolve(cfg.clone(), &[v1]).erase().await.unwrap();

    cfg.command = Command::Migrate;
    let report = t.evolve(cfg, &[v1]).migrate().await.unwrap();
    assert_eq!(report.applied, 1);
}

// ── Info and cancellation ──────────────────────────────────────────────

#[tokio::test]
async fn test_info_without_metadata() {
    let t = TestDb::new();
    let report = t
        .evolve(config(Command::Info), &[V1, V2, R_VIEW])
        .info()
        .await
        .unwrap();

    assert!(report.rows.is_empty());
    assert_eq!(report.pending.len(), 3);
    assert!(!t.db.metadata_table("main", "changelog").is_exists().await.unwrap());
}

#[tokio::test]
async fn test_info_lists_history_and_pending() {
    let t = TestDb::new();
    t.evolve(config(Command::Migrate), &[V1])
        .migrate()
        .await
        .unwrap();

    let report = t
        .evolve(config(Command::Info), &[V1, V2])
        .info()
        .await
        .unwrap();
    assert!(report.rows.iter().any(|r| r.name == V1.0));
    assert_eq!(report.pending.len(), 1);
    assert_eq!(report.pending[0].name, V2.0);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["pending"][0]["version"], "2");
}

#[tokio::test]
async fn test_cancelled_before_lock() {
    let t = TestDb::new();
    let evolve = t.evolve(config(Command::Migrate), &[V1]);
    evolve.cancel_handle().cancel();

    let err = evolve.migrate().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert!(!t.table_exists("users").await);
}

#[tokio::test]
async fn test_cluster_mode_disabled() {
    let t = TestDb::new();
    let mut cfg = config(Command::Migrate);
    cfg.enable_cluster_mode = false;
    let evolve = t.evolve(cfg, &[V1]);
    evolve.cancel_handle().cancel();

    let report = evolve.migrate().await.unwrap();
    assert_eq!(report.applied, 1);
}
