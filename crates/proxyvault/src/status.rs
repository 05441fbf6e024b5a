// SPDX-FileCopyrightText: 2026 Proxyvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `proxyvault migration-status` command implementation.
//!
//! Reads the singleton migration status row and the count of proxies that
//! still hold plaintext. Neither read decrypts anything.

use std::io::IsTerminal;

use proxyvault_core::types::{MigrationState, MigrationStatusRecord};
use proxyvault_core::ProxyVaultError;
use proxyvault_storage::map_tr_err;
use proxyvault_storage::queries::proxies;
use serde::Serialize;

use crate::context::AppContext;

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct MigrationStatusResponse {
    /// `never_run` when no migration has started yet.
    pub status: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub total_count: u64,
    pub migrated_count: u64,
    pub failed_count: u64,
    pub error_message: Option<String>,
    pub plaintext_remaining: u64,
}

impl MigrationStatusResponse {
    fn new(record: Option<MigrationStatusRecord>, plaintext_remaining: u64) -> Self {
        match record {
            Some(r) => Self {
                status: r.status.to_string(),
                started_at: r.started_at,
                completed_at: r.completed_at,
                total_count: r.total_count,
                migrated_count: r.migrated_count,
                failed_count: r.failed_count,
                error_message: r.error_message,
                plaintext_remaining,
            },
            None => Self {
                status: "never_run".to_string(),
                started_at: None,
                completed_at: None,
                total_count: 0,
                migrated_count: 0,
                failed_count: 0,
                error_message: None,
                plaintext_remaining,
            },
        }
    }
}

/// Run the `proxyvault migration-status` command.
///
/// `--json` prints structured output for scripting. Colors are disabled by
/// `--plain` or when stdout is not a TTY.
pub async fn run_migration_status(
    ctx: &AppContext,
    json: bool,
    plain: bool,
) -> Result<(), ProxyVaultError> {
    let record = ctx.coordinator.get_status().await?;
    let plaintext = ctx
        .db
        .connection()
        .call(|conn| proxies::count_plaintext(conn))
        .await
        .map_err(map_tr_err)?;

    let response = MigrationStatusResponse::new(record, plaintext);
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&response).unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        let use_color = !plain && std::io::stdout().is_terminal();
        print_status(&response, use_color);
    }
    Ok(())
}

fn state_label(status: &str, use_color: bool) -> String {
    let tag = match status.parse::<MigrationState>() {
        Ok(MigrationState::Completed) => "[OK]",
        Ok(MigrationState::Failed) => "[FAIL]",
        Ok(MigrationState::InProgress) => "[WARN]",
        _ => "[--]",
    };
    if !use_color {
        return format!("{tag} {status}");
    }
    use colored::Colorize;
    match tag {
        "[OK]" => format!("{} {}", "✓".green(), status.green()),
        "[FAIL]" => format!("{} {}", "✗".red(), status.red()),
        "[WARN]" => format!("{} {}", "!".yellow(), status.yellow()),
        _ => status.to_string(),
    }
}

fn print_status(response: &MigrationStatusResponse, use_color: bool) {
    println!();
    println!("  proxyvault migration-status");
    println!("  {}", "-".repeat(35));
    println!("    State:     {}", state_label(&response.status, use_color));
    if let Some(started) = &response.started_at {
        println!("    Started:   {started}");
    }
    if let Some(completed) = &response.completed_at {
        println!("    Completed: {completed}");
    }
    println!(
        "    Progress:  {} migrated, {} failed of {}",
        response.migrated_count, response.failed_count, response.total_count
    );
    if let Some(message) = &response.error_message {
        println!("    Error:     {message}");
    }
    println!("    Plaintext: {} remaining", response.plaintext_remaining);
    println!();
    if response.plaintext_remaining > 0 {
        println!("  Run: proxyvault migrate");
        println!();
    }
}
