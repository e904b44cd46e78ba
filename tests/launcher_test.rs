//! Launcher integration tests: drive the built binary's `launch` command
//! Run with: cargo test --test launcher_test

#![cfg(unix)]

use std::path::Path;
use std::process::{Command, Output};

fn launch(workdir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_roulette-bot"))
        .arg("launch")
        .args(args)
        .current_dir(workdir)
        .env_remove("SECRETS_PATH")
        .env("RUST_LOG", "debug")
        .output()
        .expect("Should run roulette-bot")
}

fn write_secret(dir: &Path) -> String {
    let secret = dir.join("service_account.json");
    std::fs::write(&secret, r#"{"client_email":"bot@example.iam.gserviceaccount.com"}"#).unwrap();
    secret.to_string_lossy().into_owned()
}

/// Secret present: copied before the bot starts, bot exit code passes through
#[test]
fn test_secret_copied_before_start() {
    let secrets = tempfile::tempdir().unwrap();
    let workdir = tempfile::tempdir().unwrap();
    let secret = write_secret(secrets.path());

    let output = launch(workdir.path(), &[
        "--secrets-path", &secret,
        "--", "sh", "-c", "test -f service_account.json && exit 7; exit 1",
    ]);

    assert_eq!(output.status.code(), Some(7), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let copied = std::fs::read_to_string(workdir.path().join("service_account.json")).unwrap();
    assert!(copied.contains("bot@example.iam.gserviceaccount.com"));
}

/// Secret absent: nothing halts startup, bot exit code passes through
#[test]
fn test_missing_secret_still_starts_bot() {
    let workdir = tempfile::tempdir().unwrap();
    let missing = workdir.path().join("nowhere").join("service_account.json");

    let output = launch(workdir.path(), &[
        "--secrets-path", missing.to_str().unwrap(),
        "--", "sh", "-c", "test ! -e service_account.json && exit 4; exit 1",
    ]);

    assert_eq!(output.status.code(), Some(4));
    assert!(!workdir.path().join("service_account.json").exists());
}

/// Exit status zero is preserved too
#[test]
fn test_success_passes_through() {
    let workdir = tempfile::tempdir().unwrap();
    let output = launch(workdir.path(), &["--secrets-path", "/nonexistent/sa.json", "--", "true"]);
    assert!(output.status.success());
}

/// Secrets location from the environment when no flag is given
#[test]
fn test_secrets_path_from_env() {
    let secrets = tempfile::tempdir().unwrap();
    let workdir = tempfile::tempdir().unwrap();
    let secret = write_secret(secrets.path());

    let output = Command::new(env!("CARGO_BIN_EXE_roulette-bot"))
        .args(["launch", "--", "sh", "-c", "test -f service_account.json"])
        .current_dir(workdir.path())
        .env("SECRETS_PATH", &secret)
        .output()
        .expect("Should run roulette-bot");

    assert!(output.status.success());
}

/// A broken setting elsewhere does not discard the secrets location
#[test]
fn test_secrets_path_from_env_with_bad_config() {
    let secrets = tempfile::tempdir().unwrap();
    let workdir = tempfile::tempdir().unwrap();
    let secret = write_secret(secrets.path());

    let output = Command::new(env!("CARGO_BIN_EXE_roulette-bot"))
        .args(["launch", "--", "sh", "-c", "test -f service_account.json"])
        .current_dir(workdir.path())
        .env("SECRETS_PATH", &secret)
        .env("PORT", "not-a-port")
        .output()
        .expect("Should run roulette-bot");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
}

/// An entrypoint that cannot be executed reports 127
#[test]
fn test_unstartable_entrypoint() {
    let workdir = tempfile::tempdir().unwrap();
    let output = launch(workdir.path(), &[
        "--secrets-path", "/nonexistent/sa.json",
        "--", "/nonexistent/bot-entrypoint",
    ]);
    assert_eq!(output.status.code(), Some(127));
}
