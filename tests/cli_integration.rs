//! CLI integration tests
//!
//! Runs the `xkfw-grab` binary for everything that needs no live portal.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

/// Command with the account variables cleared so the host cannot leak in
fn grab_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("xkfw-grab");
    cmd.env_remove("XKFW_CONFIG")
        .env_remove("XKFW_USERNAME")
        .env_remove("XKFW_PASSWORD")
        .env_remove("XKFW_ATTEMPT_INTERVAL_MS");
    cmd
}

fn write_config(dir: &TempDir, content: &str) -> String {
    let path = dir.path().join("config.toml");
    std::fs::write(&path, content).unwrap();
    path.to_str().unwrap().to_string()
}

#[test]
fn test_version_flag() {
    let mut cmd = grab_cmd();
    cmd.arg("--version");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_help_flag() {
    let mut cmd = grab_cmd();
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("--course"))
        .stdout(predicate::str::contains("login"))
        .stdout(predicate::str::contains("init"));
}

#[test]
fn test_unknown_category_is_rejected() {
    let mut cmd = grab_cmd();
    cmd.args(["--course", "COMP30072701:seminar"]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("unknown category"));
}

#[test]
fn test_init_writes_template_once() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("xkfw").join("config.toml");

    let mut cmd = grab_cmd();
    cmd.args(["init", path.to_str().unwrap()]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Wrote configuration template"));

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains("[[courses]]"));
    assert!(content.contains("COMP30072701"));

    let mut again = grab_cmd();
    again.args(["init", path.to_str().unwrap()]);
    again
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_login_without_password_fails_before_network() {
    let temp_dir = TempDir::new().unwrap();
    // Port 9 is discard; nothing should be sent there anyway
    let config = write_config(
        &temp_dir,
        r#"
[account]
username = "2201111111"

[portal]
sso_base = "http://127.0.0.1:9"
xk_base = "http://127.0.0.1:9"
"#,
    );

    let mut cmd = grab_cmd();
    cmd.args(["login", "--config", &config]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("password is required"));
}

#[test]
fn test_grab_without_courses_fails() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(
        &temp_dir,
        r#"
[account]
username = "2201111111"
password = "secret"
"#,
    );

    let mut cmd = grab_cmd();
    cmd.args(["--config", &config]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("no courses configured"));
}

#[test]
fn test_invalid_config_file_fails() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(&temp_dir, "[portal]\naes_key = \"short\"\n");

    let mut cmd = grab_cmd();
    cmd.args(["login", "--config", &config]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("failed to load configuration"));
}
