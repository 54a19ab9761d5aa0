#![cfg(unix)]

use std::fs;

use assert_cmd::Command;
use predicates::str::contains;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn sapi() -> Command {
    Command::cargo_bin("sapi").unwrap()
}

fn root(temp: &TempDir) -> String {
    temp.path().to_str().unwrap().to_string()
}

#[test]
fn mkdir_ls_and_rm() {
    let temp = TempDir::new().unwrap();
    let base = root(&temp);

    sapi()
        .args(["mkdir", "-p", &format!("{base}/a/b")])
        .assert()
        .success();
    assert!(temp.path().join("a/b").is_dir());
    fs::write(temp.path().join("a/file.txt"), b"hello").unwrap();

    sapi()
        .args(["ls", &format!("{base}/a")])
        .assert()
        .success()
        .stdout("b\nfile.txt\n");

    sapi()
        .args(["rm", &format!("{base}/a")])
        .assert()
        .failure()
        .stderr(contains("failed to remove"));

    sapi()
        .args(["rm", "-r", &format!("{base}/a")])
        .assert()
        .success();
    assert!(!temp.path().join("a").exists());
}

#[test]
fn rm_removes_links_not_targets() {
    let temp = TempDir::new().unwrap();
    let base = root(&temp);
    fs::create_dir(temp.path().join("target")).unwrap();
    fs::write(temp.path().join("target/keep.txt"), b"keep").unwrap();
    std::os::unix::fs::symlink(temp.path().join("target"), temp.path().join("link")).unwrap();

    sapi()
        .args(["rm", "-r", &format!("{base}/link")])
        .assert()
        .success();
    assert!(fs::symlink_metadata(temp.path().join("link")).is_err());
    assert_eq!(fs::read(temp.path().join("target/keep.txt")).unwrap(), b"keep");
}

#[test]
fn cp_into_own_subdirectory_fails() {
    let temp = TempDir::new().unwrap();
    let base = root(&temp);
    fs::create_dir(temp.path().join("a")).unwrap();
    fs::write(temp.path().join("a/f"), b"f").unwrap();

    sapi()
        .args(["cp", "-r", &format!("{base}/a"), &format!("{base}/a/b")])
        .assert()
        .failure()
        .stderr(contains("failed to copy"));
    assert!(!temp.path().join("a/b").exists());
}

#[test]
fn mkdir_without_parents_fails() {
    let temp = TempDir::new().unwrap();
    sapi()
        .args(["mkdir", &format!("{}/x/y", root(&temp))])
        .assert()
        .failure()
        .stderr(contains("error: failed to create"));
}

#[test]
fn cp_and_cat() {
    let temp = TempDir::new().unwrap();
    let base = root(&temp);
    fs::create_dir(temp.path().join("src")).unwrap();
    fs::write(temp.path().join("src/notes.txt"), b"line one\nline two\n").unwrap();

    sapi()
        .args(["cp", &format!("{base}/src"), &format!("{base}/dst")])
        .assert()
        .failure()
        .stderr(contains("use -r"));

    sapi()
        .args(["cp", "-r", &format!("{base}/src"), &format!("{base}/dst")])
        .assert()
        .success();

    sapi()
        .args(["cat", &format!("{base}/dst/notes.txt")])
        .assert()
        .success()
        .stdout("line one\nline two\n");
}

#[test]
fn stat_as_json() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("data.bin");
    fs::write(&path, vec![0u8; 42]).unwrap();

    let output = sapi()
        .args(["stat", "--json", path.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["kind"], "file");
    assert_eq!(value["size"], 42);
}

#[test]
fn install_then_info() {
    let temp = TempDir::new().unwrap();
    let mount = root(&temp);
    let firmware = temp.path().join("payload.bin");
    fs::write(&firmware, vec![9u8; 700]).unwrap();

    sapi()
        .args([
            "install",
            firmware.to_str().unwrap(),
            "--mount",
            &mount,
            "--name",
            "fonts",
            "--app-version",
            "1.10",
            "--quiet",
        ])
        .assert()
        .success()
        .stdout(contains("Installed 764 bytes"));

    sapi()
        .args(["info", &format!("{mount}/fonts")])
        .assert()
        .success()
        .stdout(contains("Name: fonts"))
        .stdout(contains("Version: 1.10"));
}
