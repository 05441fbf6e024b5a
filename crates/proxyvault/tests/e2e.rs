// SPDX-FileCopyrightText: 2026 Proxyvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests that drive the `proxyvault` binary.
//!
//! Each test gets its own temp directory holding the database and acting as
//! the working directory, so no config file outside it is picked up.

use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

use proxyvault_storage::Database;
use proxyvault_test_utils::fixtures::insert_legacy_proxy;
use serde_json::Value;

const PASSPHRASE: &str = "e2e passphrase";

struct Vault {
    dir: tempfile::TempDir,
}

impl Vault {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn db_path(&self) -> PathBuf {
        self.dir.path().join("vault.db")
    }

    fn command(&self, passphrase: &str, args: &[&str]) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_proxyvault"));
        cmd.args(args)
            .current_dir(self.dir.path())
            .env("XDG_CONFIG_HOME", self.dir.path())
            .env("PROXYVAULT_STORAGE_DATABASE_PATH", self.db_path())
            .env("PROXYVAULT_VAULT_KDF_MEMORY_COST", "32768")
            .env("PROXYVAULT_VAULT_KDF_ITERATIONS", "2")
            .env("PROXYVAULT_MASTER_KEY", passphrase)
            .env_remove("PROXYVAULT_NEW_MASTER_KEY")
            .env("RUST_LOG", "proxyvault=warn")
            .stdin(Stdio::null());
        cmd
    }

    fn run(&self, args: &[&str]) -> Output {
        self.command(PASSPHRASE, args).output().unwrap()
    }

    fn run_ok(&self, args: &[&str]) -> String {
        let output = self.run(args);
        assert!(
            output.status.success(),
            "{args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8(output.stdout).unwrap()
    }

    fn json(&self, args: &[&str]) -> Value {
        serde_json::from_str(&self.run_ok(args)).unwrap()
    }

    async fn insert_legacy(&self, name: &str, username: &str, password: &str) -> String {
        let db = Database::open(&self.db_path().to_string_lossy()).await.unwrap();
        let id = insert_legacy_proxy(&db, name, Some(username), Some(password))
            .await
            .unwrap();
        db.close().await.unwrap();
        id
    }
}

#[test]
fn proxy_lifecycle_through_cli() {
    let vault = Vault::new();

    let id = vault
        .run_ok(&[
            "proxy", "add", "edge", "--host", "10.0.0.1", "--port", "3128", "--username", "u1",
            "--password", "p1",
        ])
        .trim()
        .to_string();

    let list = vault.json(&["proxy", "list", "--json"]);
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["name"], "edge");
    assert!(list[0].get("password").is_none());

    let hidden = vault.json(&["proxy", "show", &id, "--json"]);
    assert_eq!(hidden["has_secret"], true);
    assert!(hidden.get("password").is_none());

    vault.run_ok(&["proxy", "update", &id, "--password", "p2", "--port", "8080"]);
    let shown = vault.json(&["proxy", "show", &id, "--reveal", "--json"]);
    assert_eq!(shown["username"], "u1");
    assert_eq!(shown["password"], "p2");
    assert_eq!(shown["port"], 8080);

    vault.run_ok(&["proxy", "delete", &id]);
    let list = vault.json(&["proxy", "list", "--json"]);
    assert!(list.as_array().unwrap().is_empty());

    let missing = vault.run(&["proxy", "delete", &id]);
    assert!(!missing.status.success());
}

#[test]
fn plaintext_never_appears_in_the_database_file() {
    let vault = Vault::new();
    vault.run_ok(&[
        "proxy", "add", "edge", "--host", "10.0.0.1", "--port", "3128", "--password",
        "needle-in-db-7731",
    ]);

    let bytes = std::fs::read(vault.db_path()).unwrap();
    let haystack = String::from_utf8_lossy(&bytes);
    assert!(!haystack.contains("needle-in-db-7731"));
}

#[tokio::test]
async fn explicit_migration_and_verification() {
    let vault = Vault::new();
    // Creates the database and the master key; runs no startup migration.
    let status = vault.json(&["migration-status", "--json"]);
    assert_eq!(status["status"], "never_run");

    let id = vault.insert_legacy("legacy", "old-user", "old-pass").await;

    let status = vault.json(&["migration-status", "--json"]);
    assert_eq!(status["plaintext_remaining"], 1);

    let verify = vault.run(&["verify", "--json"]);
    assert_eq!(verify.status.code(), Some(2));

    let report = vault.json(&["migrate", "--json"]);
    assert_eq!(report["total_count"], 1);
    assert_eq!(report["migrated"].as_array().unwrap().len(), 1);

    let verify = vault.json(&["verify", "--json"]);
    assert_eq!(verify["valid"], true);
    assert_eq!(verify["plaintext_count"], 0);

    let status = vault.json(&["migration-status", "--json"]);
    assert_eq!(status["status"], "completed");
    assert_eq!(status["migrated_count"], 1);

    let shown = vault.json(&["proxy", "show", &id, "--reveal", "--json"]);
    assert_eq!(shown["username"], "old-user");
    assert_eq!(shown["password"], "old-pass");
}

#[tokio::test]
async fn proxy_commands_migrate_on_startup() {
    let vault = Vault::new();
    vault.run_ok(&["migration-status"]);
    vault.insert_legacy("legacy", "u", "p").await;

    vault.run_ok(&["proxy", "list"]);

    let status = vault.json(&["migration-status", "--json"]);
    assert_eq!(status["status"], "completed");
    assert_eq!(status["plaintext_remaining"], 0);
}

#[test]
fn wrong_passphrase_is_rejected() {
    let vault = Vault::new();
    vault.run_ok(&["proxy", "list"]);

    let output = vault
        .command("not the passphrase", &["proxy", "list"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid passphrase"));
}

#[test]
fn missing_passphrase_without_tty_fails() {
    let vault = Vault::new();
    let output = vault
        .command("", &["proxy", "list"])
        .env_remove("PROXYVAULT_MASTER_KEY")
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("PROXYVAULT_MASTER_KEY"));
}

#[test]
fn rotate_key_switches_passphrase() {
    let vault = Vault::new();
    let id = vault
        .run_ok(&[
            "proxy", "add", "edge", "--host", "10.0.0.1", "--port", "3128", "--password",
            "keep-me",
        ])
        .trim()
        .to_string();

    let output = vault
        .command(PASSPHRASE, &["rotate-key"])
        .env("PROXYVAULT_NEW_MASTER_KEY", "next passphrase")
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );

    let old = vault.run(&["proxy", "list"]);
    assert!(!old.status.success());

    let shown = vault
        .command("next passphrase", &["proxy", "show", &id, "--reveal", "--json"])
        .output()
        .unwrap();
    assert!(shown.status.success());
    let shown: Value = serde_json::from_slice(&shown.stdout).unwrap();
    assert_eq!(shown["password"], "keep-me");
}

#[test]
fn config_typo_is_reported() {
    let vault = Vault::new();
    std::fs::write(
        vault.dir.path().join("proxyvault.toml"),
        "[storage]\nbusy_timeout_mss = 10\n",
    )
    .unwrap();

    let output = vault.run(&["proxy", "list"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(!vault.db_path().exists());
}

#[test]
fn doctor_runs_without_a_database() {
    let vault = Vault::new();
    let stdout = vault.run_ok(&["doctor", "--plain"]);
    assert!(stdout.contains("proxyvault doctor"));
    assert!(stdout.contains("[WARN] Database"));
}
