//! Smoke tests for the `volumes-cli` demo binary, in the style of the
//! teacher's own `assert_cmd`-based CLI tests.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

#[test]
fn put_then_list_round_trips_through_the_cli() {
    let dir = tempdir().unwrap();

    Command::cargo_bin("volumes-cli")
        .unwrap()
        .args(["--data-dir", dir.path().to_str().unwrap(), "put", "vol", "/a.txt=hello"])
        .assert()
        .success();

    Command::cargo_bin("volumes-cli")
        .unwrap()
        .args(["--data-dir", dir.path().to_str().unwrap(), "list", "vol", "/", "--content", "true"])
        .assert()
        .success()
        .stdout(predicate::str::contains("hello"));
}

#[test]
fn patch_reads_a_request_body_from_stdin() {
    let dir = tempdir().unwrap();
    let body = r#"{"patches":[{"path":"/a.txt","content":"from stdin"}]}"#;

    Command::cargo_bin("volumes-cli")
        .unwrap()
        .args(["--data-dir", dir.path().to_str().unwrap(), "patch", "vol"])
        .write_stdin(body)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"accepted\": true"));
}

#[test]
fn no_subcommand_exits_nonzero() {
    let dir = tempdir().unwrap();

    Command::cargo_bin("volumes-cli")
        .unwrap()
        .args(["--data-dir", dir.path().to_str().unwrap()])
        .assert()
        .failure();
}
