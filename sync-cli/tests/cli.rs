//! End-to-end tests for the `peersync` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Read;

fn peersync(data_dir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("peersync").unwrap();
    cmd.arg("--data-dir").arg(data_dir);
    cmd
}

#[test]
fn help_lists_commands() {
    Command::cargo_bin("peersync")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("push"))
        .stdout(predicate::str::contains("delete"));
}

#[test]
fn push_requires_files() {
    let dir = tempfile::tempdir().unwrap();
    peersync(dir.path())
        .args(["push", "--peer", "127.0.0.1"])
        .assert()
        .failure();
}

#[test]
fn push_delivers_add_frame() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let peer = listener.local_addr().unwrap().to_string();
    let receiver = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes).unwrap();
        bytes
    });

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("note.txt");
    std::fs::write(&file, b"payload").unwrap();

    peersync(dir.path())
        .args(["push", "--peer", &peer])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("Sent note.txt (7 bytes)"));

    let bytes = receiver.join().unwrap();
    // writeUTF("ADD")
    assert_eq!(&bytes[..5], b"\x00\x03ADD");
    assert!(bytes.ends_with(b"payload"));
}

#[test]
fn push_to_closed_port_fails_after_configured_attempts() {
    let closed = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .to_string();
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("fast.toml");
    std::fs::write(&config, "[sync]\nmax_attempts = 1\n").unwrap();
    let file = dir.path().join("a.txt");
    std::fs::write(&file, b"a").unwrap();

    peersync(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["push", "--peer", &closed])
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("completed with errors"));
}

#[test]
fn delete_rejects_path_names() {
    let dir = tempfile::tempdir().unwrap();
    peersync(dir.path())
        .args(["delete", "--peer", "127.0.0.1", "../etc/passwd"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cannot delete"));
}

#[test]
fn bad_config_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("broken.toml");
    std::fs::write(&config, "[client\nport = ").unwrap();

    peersync(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["delete", "--peer", "127.0.0.1", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("broken.toml"));
}

#[test]
fn explicit_config_must_exist() {
    let dir = tempfile::tempdir().unwrap();
    peersync(dir.path())
        .arg("--config")
        .arg(dir.path().join("missing.toml"))
        .args(["delete", "--peer", "127.0.0.1", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read config file"));
}
