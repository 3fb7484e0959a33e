#![allow(deprecated)] // cargo_bin is deprecated but still functional

use assert_cmd::Command;
use predicates::str::contains;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// A docvault command over a filesystem store rooted in `temp`.
fn docvault(temp: &Path) -> Command {
    let mut cmd = Command::cargo_bin("docvault").unwrap();
    cmd.env_clear()
        .env("DOCVAULT_CONFIG", temp.join("missing.toml"))
        .env("DOCVAULT_STORE__TYPE", "filesystem")
        .env("DOCVAULT_STORE__PATH", temp.join("records"))
        .env("DOCVAULT_VAULT__CHUNK_SIZE", "1024")
        .env("RUST_LOG", "warn");
    cmd
}

fn store_file(temp: &Path, name: &str, contents: &[u8], refs: &[&str]) -> String {
    let input = temp.join(name);
    fs::write(&input, contents).unwrap();

    let mut cmd = docvault(temp);
    cmd.arg("store").arg(&input);
    for r in refs {
        cmd.arg("--ref").arg(r);
    }
    let output = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8(output).unwrap().trim().to_string()
}

#[test]
fn store_then_get_round_trips_file() {
    let temp = TempDir::new().unwrap();
    let contents: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
    let id = store_file(temp.path(), "report.pdf", &contents, &[]);

    docvault(temp.path())
        .arg("get")
        .arg(&id)
        .arg("--output")
        .arg(temp.path().join("out"))
        .assert()
        .success()
        .stdout(contains("report.pdf"));

    let written = fs::read(temp.path().join("out").join("report.pdf")).unwrap();
    assert_eq!(written, contents);
}

#[test]
fn show_and_verify_report_chunks() {
    let temp = TempDir::new().unwrap();
    let id = store_file(temp.path(), "a.pdf", &[7u8; 3000], &["client=c-1"]);

    docvault(temp.path())
        .args(["show", &id])
        .assert()
        .success()
        .stdout(contains("Filename: a.pdf"))
        .stdout(contains("client: c-1"));

    docvault(temp.path())
        .args(["verify", &id])
        .assert()
        .success()
        .stdout(contains("ok"));
}

#[test]
fn verify_fails_for_missing_chunk() {
    let temp = TempDir::new().unwrap();
    let id = store_file(temp.path(), "a.pdf", &[1u8; 3000], &[]);
    fs::remove_file(
        temp.path()
            .join("records")
            .join("document_chunks")
            .join(format!("{id}_chunk_1.json")),
    )
    .unwrap();

    docvault(temp.path())
        .args(["verify", &id])
        .assert()
        .failure()
        .stdout(contains("FAILED"))
        .stdout(contains("retryable"));
}

#[test]
fn find_lists_matching_documents() {
    let temp = TempDir::new().unwrap();
    let first = store_file(temp.path(), "a.pdf", b"a", &["client=c-1"]);
    let _other = store_file(temp.path(), "b.pdf", b"b", &["client=c-2"]);

    docvault(temp.path())
        .args(["find", "client", "c-1"])
        .assert()
        .success()
        .stdout(contains(first.as_str()))
        .stdout(contains("a.pdf"));
}

#[test]
fn get_unknown_document_fails() {
    let temp = TempDir::new().unwrap();

    docvault(temp.path())
        .args(["get", "does-not-exist"])
        .assert()
        .failure()
        .stderr(contains("not found"));
}

#[test]
fn sweep_dry_run_reports_stats() {
    let temp = TempDir::new().unwrap();
    store_file(temp.path(), "a.pdf", b"abc", &[]);

    docvault(temp.path())
        .args(["sweep", "--dry-run"])
        .assert()
        .success()
        .stdout(contains("dry run"))
        .stdout(contains("Chunks scanned: 1"));
}
