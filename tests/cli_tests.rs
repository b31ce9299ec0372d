use assert_cmd::Command;
use iplist2mmdb::{DataValue, Database};
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Helper to create an iplist2mmdb command with a clean log environment
fn iplist2mmdb_cmd() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("iplist2mmdb"));
    cmd.env_remove("RUST_LOG");
    cmd
}

fn iso_code(db: &Database, ip: &str) -> Option<String> {
    db.lookup(ip)
        .unwrap()
        .and_then(|hit| hit.data.get("country")?.get("iso_code")?.as_str().map(String::from))
}

#[test]
fn test_help() {
    iplist2mmdb_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("MaxMind DB country database"))
        .stdout(predicate::str::contains("--destination"));
}

#[test]
fn test_version() {
    iplist2mmdb_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("iplist2mmdb"));
}

#[test]
fn test_default_paths() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join("ip_list.txt"),
        "1.0.1.0/24\n[CF]\n41.78.124.0/22\n",
    )
    .unwrap();

    iplist2mmdb_cmd()
        .current_dir(temp_dir.path())
        .assert()
        .success()
        .stderr(predicate::str::contains(
            "successfully wrote mmdb to Country.mmdb",
        ));

    let db = Database::open(temp_dir.path().join("Country.mmdb")).unwrap();
    assert_eq!(db.database_type().as_deref(), Some("GeoIP2-Country"));
    assert_eq!(iso_code(&db, "1.0.1.9").as_deref(), Some("CN"));
    assert_eq!(iso_code(&db, "41.78.124.9").as_deref(), Some("CF"));
}

#[test]
fn test_custom_paths_and_database_type() {
    let temp_dir = TempDir::new().unwrap();
    let source = temp_dir.path().join("china.txt");
    let dest = temp_dir.path().join("out.mmdb");
    fs::write(&source, "[CN]\n203.0.113.0/24\n").unwrap();

    iplist2mmdb_cmd()
        .arg("-s")
        .arg(&source)
        .arg("-d")
        .arg(&dest)
        .arg("-t")
        .arg("GeoLite2-Country")
        .assert()
        .success();

    let db = Database::open(&dest).unwrap();
    assert_eq!(db.database_type().as_deref(), Some("GeoLite2-Country"));
    assert_eq!(
        db.metadata().get("record_size").and_then(DataValue::as_u64),
        Some(24)
    );
    assert_eq!(iso_code(&db, "203.0.113.77").as_deref(), Some("CN"));
}

#[test]
fn test_unknown_section_warns_and_continues() {
    let temp_dir = TempDir::new().unwrap();
    let source = temp_dir.path().join("list.txt");
    let dest = temp_dir.path().join("out.mmdb");
    fs::write(&source, "[CF]\n[us]\n41.78.124.0/22\n").unwrap();

    iplist2mmdb_cmd()
        .arg("--source")
        .arg(&source)
        .arg("--destination")
        .arg(&dest)
        .assert()
        .success()
        .stderr(predicate::str::contains("unknown section US, skip"));

    let db = Database::open(&dest).unwrap();
    assert_eq!(iso_code(&db, "41.78.124.1").as_deref(), Some("CF"));
}

#[test]
fn test_invalid_cidr_fails_without_output() {
    let temp_dir = TempDir::new().unwrap();
    let source = temp_dir.path().join("list.txt");
    let dest = temp_dir.path().join("out.mmdb");
    fs::write(&source, "1.0.0.0/24\nnot-a-cidr\n2.0.0.0/24\n").unwrap();

    iplist2mmdb_cmd()
        .arg("-s")
        .arg(&source)
        .arg("-d")
        .arg(&dest)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("not-a-cidr"))
        .stderr(predicate::str::contains("line 2"));

    assert!(!dest.exists());
}

#[test]
fn test_verbose_lists_known_sections() {
    let temp_dir = TempDir::new().unwrap();
    let source = temp_dir.path().join("list.txt");
    fs::write(&source, "[CF]\n41.78.124.0/22\n").unwrap();

    iplist2mmdb_cmd()
        .arg("-v")
        .arg("-s")
        .arg(&source)
        .arg("-d")
        .arg(temp_dir.path().join("out.mmdb"))
        .assert()
        .success()
        .stderr(predicate::str::contains("known sections: CN, CF"));
}

#[test]
fn test_error_reported_with_logging_off() {
    let temp_dir = TempDir::new().unwrap();
    let source = temp_dir.path().join("list.txt");
    fs::write(&source, "not-a-cidr\n").unwrap();

    iplist2mmdb_cmd()
        .env("RUST_LOG", "off")
        .arg("-s")
        .arg(&source)
        .arg("-d")
        .arg(temp_dir.path().join("out.mmdb"))
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Error: "))
        .stderr(predicate::str::contains("not-a-cidr"));
}

#[test]
fn test_missing_source_fails() {
    let temp_dir = TempDir::new().unwrap();
    let dest = temp_dir.path().join("out.mmdb");

    iplist2mmdb_cmd()
        .arg("-s")
        .arg(temp_dir.path().join("missing.txt"))
        .arg("-d")
        .arg(&dest)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to open"));

    assert!(!dest.exists());
}

#[test]
fn test_empty_source_writes_empty_database() {
    let temp_dir = TempDir::new().unwrap();
    let source = temp_dir.path().join("empty.txt");
    let dest = temp_dir.path().join("out.mmdb");
    fs::write(&source, "").unwrap();

    iplist2mmdb_cmd()
        .arg("-s")
        .arg(&source)
        .arg("-d")
        .arg(&dest)
        .assert()
        .success();

    let db = Database::open(&dest).unwrap();
    assert!(db.lookup("203.0.113.77").unwrap().is_none());
}

#[test]
fn test_stdin_source_with_verify() {
    let temp_dir = TempDir::new().unwrap();
    let dest = temp_dir.path().join("out.mmdb");

    iplist2mmdb_cmd()
        .arg("-s")
        .arg("-")
        .arg("-d")
        .arg(&dest)
        .arg("--verify")
        .write_stdin("[cf]\n41.78.124.0/22\n")
        .assert()
        .success()
        .stderr(predicate::str::contains("verified"));

    let db = Database::open(&dest).unwrap();
    assert_eq!(iso_code(&db, "41.78.124.1").as_deref(), Some("CF"));
}

#[test]
fn test_empty_database_type_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let source = temp_dir.path().join("list.txt");
    fs::write(&source, "1.0.0.0/24\n").unwrap();

    iplist2mmdb_cmd()
        .current_dir(temp_dir.path())
        .arg("-s")
        .arg(&source)
        .arg("-t")
        .arg("")
        .assert()
        .failure();

    assert!(!temp_dir.path().join("Country.mmdb").exists());
}
