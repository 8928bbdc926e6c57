use super::*;
use crate::migration::NamingConvention;

fn script(name: &str, deps: &[&str]) -> MigrationScript {
    let content = if deps.is_empty() {
        "SELECT 1;".to_string()
    } else {
        format!("-- evolve-repeatable-deps={}\nSELECT 1;", deps.join("|"))
    };
    MigrationScript::repeatable(name, content, &NamingConvention::new("R", "__", ".sql")).unwrap()
}

fn names(scripts: &[MigrationScript]) -> Vec<&str> {
    scripts.iter().map(|s| s.name()).collect()
}

#[test]
fn test_no_dependencies_keeps_order() {
    let sorted = sort_with_dependencies(vec![script("R__A.sql", &[]), script("R__B.sql", &[])]).unwrap();
    assert_eq!(names(&sorted), vec!["R__A.sql", "R__B.sql"]);
}

#[test]
fn test_chain_runs_dependencies_first() {
    let sorted = sort_with_dependencies(vec![
        script("R__A.sql", &["R__B.sql"]),
        script("R__B.sql", &["R__C"]),
        script("R__C.sql", &[]),
    ])
    .unwrap();
    assert_eq!(names(&sorted), vec!["R__C.sql", "R__B.sql", "R__A.sql"]);
}

#[test]
fn test_multiple_dependencies_in_declared_order() {
    let sorted = sort_with_dependencies(vec![
        script("R__A.sql", &["R__C.sql", "R__B.sql"]),
        script("R__B.sql", &[]),
        script("R__C.sql", &[]),
    ])
    .unwrap();
    assert_eq!(names(&sorted), vec!["R__C.sql", "R__B.sql", "R__A.sql"]);
}

#[test]
fn test_spaces_match_underscores() {
    let sorted = sort_with_dependencies(vec![
        script("R__A.sql", &["R__My_view.sql"]),
        script("R__My view.sql", &[]),
    ])
    .unwrap();
    assert_eq!(names(&sorted), vec!["R__My view.sql", "R__A.sql"]);
}

#[test]
fn test_cycle_is_reported() {
    let err = sort_with_dependencies(vec![
        script("R__A.sql", &["R__B.sql"]),
        script("R__B.sql", &["R__A.sql"]),
    ])
    .unwrap_err();
    match err {
        CoreError::CircularDependency { cycle } => {
            assert_eq!(cycle, "R__A.sql -> R__B.sql -> R__A.sql");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_self_dependency_is_a_cycle() {
    let err = sort_with_dependencies(vec![script("R__A.sql", &["R__A.sql"])]).unwrap_err();
    assert!(matches!(err, CoreError::CircularDependency { .. }));
}

#[test]
fn test_unknown_dependency() {
    let err = sort_with_dependencies(vec![script("R__A.sql", &["R__Missing.sql"])]).unwrap_err();
    match err {
        CoreError::UnknownDependency {
            migration,
            dependency,
        } => {
            assert_eq!(migration, "R__A.sql");
            assert_eq!(dependency, "R__Missing.sql");
        }
        other => panic!("unexpected error: {other}"),
    }
}
