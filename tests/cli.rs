//! Run the `froster` binary as a subprocess and check its behavior,
//! exercising `--local-archive-root` so the suite needs no real bucket.

use assert_cmd::Command;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;

fn run_froster() -> Command {
    Command::cargo_bin("froster").unwrap()
}

#[test]
fn help_lists_the_subcommands() {
    run_froster()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("archive"))
        .stdout(predicate::str::contains("restore"));
}

#[test]
fn no_args_fails_with_usage() {
    run_froster().assert().failure();
}

#[test]
fn archive_then_restore_round_trip() {
    let source = TempDir::new().unwrap();
    source.child("dataset.bin").write_binary(&vec![5u8; 2 * 1024 * 1024]).unwrap();
    let remote = TempDir::new().unwrap();
    let registry_dir = TempDir::new().unwrap();
    let registry = registry_dir.child("registry.json");

    run_froster()
        .arg("archive")
        .arg(source.path())
        .args(["--bucket", "test-bucket"])
        .args(["--local-archive-root", remote.path().to_str().unwrap()])
        .arg("--registry")
        .arg(registry.path())
        .assert()
        .success();

    source.child(".froster.md5sum").assert(predicate::path::is_file());

    // Archiving the same folder again without --force is rejected.
    run_froster()
        .arg("archive")
        .arg(source.path())
        .args(["--bucket", "test-bucket"])
        .args(["--local-archive-root", remote.path().to_str().unwrap()])
        .arg("--registry")
        .arg(registry.path())
        .assert()
        .failure();

    source.child("dataset.bin").assert(predicate::path::is_file());
    std::fs::remove_file(source.child("dataset.bin").path()).unwrap();
    std::fs::remove_file(source.child(".froster.md5sum").path()).unwrap();
    std::fs::remove_file(source.child("Froster.allfiles.csv").path()).unwrap();

    run_froster()
        .arg("restore")
        .arg(source.path())
        .args(["--bucket", "test-bucket"])
        .args(["--local-archive-root", remote.path().to_str().unwrap()])
        .arg("--registry")
        .arg(registry.path())
        .assert()
        .success();

    source.child("dataset.bin").assert(predicate::path::is_file());
}

#[test]
fn archive_rejects_a_folder_with_a_colliding_meta_file_name() {
    let source = TempDir::new().unwrap();
    source.child("dataset.bin").write_binary(&vec![5u8; 2 * 1024 * 1024]).unwrap();
    source.child("Froster.allfiles.csv").write_str("not froster's").unwrap();
    let remote = TempDir::new().unwrap();
    let registry_dir = TempDir::new().unwrap();
    let registry = registry_dir.child("registry.json");

    run_froster()
        .arg("archive")
        .arg(source.path())
        .args(["--bucket", "test-bucket"])
        .args(["--local-archive-root", remote.path().to_str().unwrap()])
        .arg("--registry")
        .arg(registry.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("reserved meta-file"));
}

#[test]
fn reset_removes_bookkeeping_files() {
    let source = TempDir::new().unwrap();
    source.child("dataset.bin").write_binary(&vec![5u8; 2 * 1024 * 1024]).unwrap();
    let remote = TempDir::new().unwrap();
    let registry_dir = TempDir::new().unwrap();
    let registry = registry_dir.child("registry.json");

    run_froster()
        .arg("archive")
        .arg(source.path())
        .args(["--bucket", "test-bucket"])
        .args(["--local-archive-root", remote.path().to_str().unwrap()])
        .arg("--registry")
        .arg(registry.path())
        .assert()
        .success();

    run_froster().arg("reset").arg(source.path()).assert().success();

    source.child(".froster.md5sum").assert(predicate::path::missing());
}
