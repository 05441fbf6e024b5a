// SPDX-FileCopyrightText: 2026 Proxyvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `proxyvault doctor` command implementation.
//!
//! Runs diagnostic checks against the proxyvault environment: configuration,
//! database reachability, keyring unlock, leftover plaintext, and the last
//! migration run.

use std::io::IsTerminal;
use std::time::{Duration, Instant};

use proxyvault_config::ProxyVaultConfig;
use proxyvault_core::types::MigrationState;
use proxyvault_core::ProxyVaultError;
use proxyvault_credentials::unlock_or_create;
use proxyvault_crypto::{get_master_passphrase, EncryptionEngine};
use proxyvault_storage::queries::{key_meta, migration_status, proxies};
use proxyvault_storage::{map_tr_err, Database};

/// Status of a diagnostic check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    /// Check passed successfully.
    Pass,
    /// Check passed with a warning.
    Warn,
    /// Check failed.
    Fail,
}

/// Result of a single diagnostic check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    /// Human-readable message.
    pub message: String,
    pub duration: Duration,
}

impl CheckResult {
    fn new(name: &str, status: CheckStatus, message: impl Into<String>, start: Instant) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: message.into(),
            duration: start.elapsed(),
        }
    }
}

/// Run the `proxyvault doctor` command.
///
/// With `--deep`, also runs the SQLite integrity check and reports heap usage.
/// With `--plain`, disables colored output.
pub async fn run_doctor(
    config: &ProxyVaultConfig,
    deep: bool,
    plain: bool,
) -> Result<(), ProxyVaultError> {
    let use_color = !plain && std::io::stdout().is_terminal();
    let mut results = Vec::new();

    results.push(check_config().await);
    let (db_result, db) = check_database(config).await;
    results.push(db_result);

    if let Some(db) = &db {
        results.push(check_keyring(db, config).await);
        results.push(check_plaintext(db).await);
        results.push(check_migration_status(db).await);
        if deep {
            results.push(check_db_integrity(db).await);
        }
    }
    if deep {
        results.push(check_memory_baseline().await);
    }

    print_results(&results, deep, use_color);

    if let Some(db) = db {
        db.close().await?;
    }
    Ok(())
}

fn print_results(results: &[CheckResult], deep: bool, use_color: bool) {
    println!();
    println!("  proxyvault doctor");
    println!("  {}", "-".repeat(50));

    let mut issues = 0;
    for result in results {
        let duration_ms = result.duration.as_millis();
        let line = if use_color {
            use colored::Colorize;
            let (symbol, message) = match result.status {
                CheckStatus::Pass => ("✓".green(), result.message.normal()),
                CheckStatus::Warn => ("!".yellow(), result.message.yellow()),
                CheckStatus::Fail => ("✗".red(), result.message.red()),
            };
            format!("    {symbol} {:<20} {message} ({duration_ms}ms)", result.name)
        } else {
            let tag = match result.status {
                CheckStatus::Pass => "[OK]  ",
                CheckStatus::Warn => "[WARN]",
                CheckStatus::Fail => "[FAIL]",
            };
            format!(
                "    {tag} {:<20} {} ({duration_ms}ms)",
                result.name, result.message
            )
        };
        if result.status != CheckStatus::Pass {
            issues += 1;
        }
        println!("{line}");
    }

    println!();
    if issues > 0 {
        let issue_word = if issues == 1 { "issue" } else { "issues" };
        println!("  {issues} {issue_word} found.");
        if !deep {
            println!("  Run with --deep for detailed diagnostics.");
        }
    } else {
        println!("  All checks passed.");
    }
    println!();
}

/// Check configuration loads without errors.
async fn check_config() -> CheckResult {
    let start = Instant::now();
    match proxyvault_config::load_and_validate() {
        Ok(_) => CheckResult::new("Configuration", CheckStatus::Pass, "valid", start),
        Err(errors) => CheckResult::new(
            "Configuration",
            CheckStatus::Fail,
            format!("{} error(s)", errors.len()),
            start,
        ),
    }
}

/// Check the database file exists and opens with the current schema.
async fn check_database(config: &ProxyVaultConfig) -> (CheckResult, Option<Database>) {
    let start = Instant::now();
    let db_path = &config.storage.database_path;

    if !std::path::Path::new(db_path).exists() {
        return (
            CheckResult::new(
                "Database",
                CheckStatus::Warn,
                format!("not found: {db_path} (will be created on first run)"),
                start,
            ),
            None,
        );
    }

    let db = match Database::open_with(&config.storage).await {
        Ok(db) => db,
        Err(e) => {
            return (
                CheckResult::new("Database", CheckStatus::Fail, format!("open failed: {e}"), start),
                None,
            );
        }
    };
    match db.ping().await {
        Ok(()) => (
            CheckResult::new("Database", CheckStatus::Pass, "connected", start),
            Some(db),
        ),
        Err(e) => (
            CheckResult::new("Database", CheckStatus::Fail, format!("query failed: {e}"), start),
            None,
        ),
    }
}

/// Check the master passphrase reproduces the stored key.
async fn check_keyring(db: &Database, config: &ProxyVaultConfig) -> CheckResult {
    let start = Instant::now();
    let meta = match db
        .connection()
        .call(|conn| key_meta::get(conn))
        .await
        .map_err(map_tr_err)
    {
        Ok(meta) => meta,
        Err(e) => {
            return CheckResult::new("Keyring", CheckStatus::Fail, format!("read failed: {e}"), start);
        }
    };
    if meta.is_none() {
        return CheckResult::new(
            "Keyring",
            CheckStatus::Warn,
            "no master key yet (created on first use)",
            start,
        );
    }

    let passphrase = match get_master_passphrase() {
        Ok(p) => p,
        Err(_) => {
            return CheckResult::new(
                "Keyring",
                CheckStatus::Warn,
                "skipped: no passphrase available",
                start,
            );
        }
    };
    let engine = EncryptionEngine::new(&config.vault);
    let result = unlock_or_create(db, &engine, &passphrase).await;
    engine.destroy();
    match result {
        Ok(_) => CheckResult::new("Keyring", CheckStatus::Pass, "unlocked", start),
        Err(ProxyVaultError::Config(msg)) => CheckResult::new("Keyring", CheckStatus::Fail, msg, start),
        Err(e) => CheckResult::new("Keyring", CheckStatus::Fail, format!("unlock failed: {e}"), start),
    }
}

/// Check no proxy still holds plaintext credentials.
async fn check_plaintext(db: &Database) -> CheckResult {
    let start = Instant::now();
    match db
        .connection()
        .call(|conn| proxies::count_plaintext(conn))
        .await
        .map_err(map_tr_err)
    {
        Ok(0) => CheckResult::new("Plaintext", CheckStatus::Pass, "none remaining", start),
        Ok(n) => CheckResult::new(
            "Plaintext",
            CheckStatus::Warn,
            format!("{n} proxies hold plaintext (run `proxyvault migrate`)"),
            start,
        ),
        Err(e) => CheckResult::new("Plaintext", CheckStatus::Fail, format!("count failed: {e}"), start),
    }
}

/// Report the outcome of the last migration run.
async fn check_migration_status(db: &Database) -> CheckResult {
    let start = Instant::now();
    let status = db
        .connection()
        .call(|conn| migration_status::get(conn))
        .await
        .map_err(map_tr_err);
    match status {
        Ok(None) => CheckResult::new("Migration", CheckStatus::Pass, "never run", start),
        Ok(Some(record)) => match record.status {
            MigrationState::Completed => CheckResult::new(
                "Migration",
                CheckStatus::Pass,
                format!("completed ({} migrated)", record.migrated_count),
                start,
            ),
            MigrationState::Failed => CheckResult::new(
                "Migration",
                CheckStatus::Warn,
                record
                    .error_message
                    .unwrap_or_else(|| format!("{} row(s) failed", record.failed_count)),
                start,
            ),
            MigrationState::InProgress => CheckResult::new(
                "Migration",
                CheckStatus::Warn,
                format!(
                    "interrupted after {} of {} rows",
                    record.migrated_count + record.failed_count,
                    record.total_count
                ),
                start,
            ),
            MigrationState::Pending => {
                CheckResult::new("Migration", CheckStatus::Pass, "pending", start)
            }
        },
        Err(e) => CheckResult::new("Migration", CheckStatus::Fail, format!("read failed: {e}"), start),
    }
}

/// Deep check: SQLite integrity check.
async fn check_db_integrity(db: &Database) -> CheckResult {
    let start = Instant::now();
    let result = db
        .connection()
        .call(|conn| -> Result<Vec<String>, rusqlite::Error> {
            let mut stmt = conn.prepare("PRAGMA integrity_check")?;
            let rows = stmt
                .query_map([], |row| row.get(0))?
                .filter_map(|r| r.ok())
                .collect();
            Ok(rows)
        })
        .await;

    match result {
        Ok(rows) if rows.len() == 1 && rows[0] == "ok" => {
            CheckResult::new("DB integrity", CheckStatus::Pass, "ok", start)
        }
        Ok(rows) => CheckResult::new(
            "DB integrity",
            CheckStatus::Fail,
            format!("{} issue(s) found", rows.len()),
            start,
        ),
        Err(e) => CheckResult::new("DB integrity", CheckStatus::Fail, format!("check failed: {e}"), start),
    }
}

/// Deep check: memory baseline via jemalloc.
async fn check_memory_baseline() -> CheckResult {
    let start = Instant::now();

    #[cfg(not(target_env = "msvc"))]
    {
        let _ = tikv_jemalloc_ctl::epoch::advance();
        let allocated = tikv_jemalloc_ctl::stats::allocated::read().unwrap_or(0);
        let resident = tikv_jemalloc_ctl::stats::resident::read().unwrap_or(0);
        let allocated_mb = allocated as f64 / (1024.0 * 1024.0);
        let resident_mb = resident as f64 / (1024.0 * 1024.0);
        CheckResult::new(
            "Memory baseline",
            CheckStatus::Pass,
            format!("heap: {allocated_mb:.1} MB, resident: {resident_mb:.1} MB"),
            start,
        )
    }

    #[cfg(target_env = "msvc")]
    {
        CheckResult::new(
            "Memory baseline",
            CheckStatus::Warn,
            "jemalloc not available on MSVC",
            start,
        )
    }
}
