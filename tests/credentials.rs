//! Credentials file tests against real files on disk

use std::fs;

use querier::connection::{load_target, CredentialsError};

// =============================================================================
// LOOKUP
// =============================================================================

#[test]
fn test_load_target_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("creds.toml");
    fs::write(
        &path,
        r#"
[news]
type = "replica"
ruser = "editor"
rpwd = "pw"
suffixes = "_es,_en"

[replica]
host = "10.0.0.7"
port = 27018
"#,
    )
    .unwrap();

    let target = load_target("news_en", &path).unwrap();
    assert_eq!(target.database, "news_en");
    assert_eq!(target.host, "10.0.0.7");
    assert_eq!(target.port, 27018);
    assert_eq!(
        target.uri(),
        "mongodb://editor:pw@10.0.0.7:27018/news_en?authSource=news_en"
    );
}

#[test]
fn test_exact_section_wins_over_suffix() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("creds.toml");
    fs::write(
        &path,
        r#"
[tw]
type = "a"
ruser = "suffix-user"
rpwd = "x"
suffixes = ["itter"]

[twitter]
type = "a"
ruser = "exact-user"
rpwd = "y"

[a]
host = "h"
port = 1
"#,
    )
    .unwrap();
    assert_eq!(load_target("twitter", &path).unwrap().user, "exact-user");
}

// =============================================================================
// FAILURES
// =============================================================================

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_target("db", &dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, CredentialsError::Read { .. }));
}

#[test]
fn test_missing_host_in_type_section() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("creds.toml");
    fs::write(&path, "[db]\ntype = \"srv\"\nruser = \"u\"\nrpwd = \"p\"\n[srv]\nport = 1\n").unwrap();
    let err = load_target("db", &path).unwrap_err();
    match err {
        CredentialsError::MissingOption { section, option } => {
            assert_eq!(section, "srv");
            assert_eq!(option, "host");
        }
        other => panic!("unexpected error: {}", other),
    }
}
