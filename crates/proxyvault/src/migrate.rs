// SPDX-FileCopyrightText: 2026 Proxyvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `proxyvault migrate` and `proxyvault verify`.

use proxyvault_core::types::short_id;
use proxyvault_core::ProxyVaultError;
use proxyvault_credentials::{MigrationReport, VerificationReport};

use crate::context::AppContext;

/// Run the plaintext migration. Returns `false` if any row failed.
pub async fn run_migrate(ctx: &AppContext, json: bool) -> Result<bool, ProxyVaultError> {
    let report = ctx.coordinator.run_migration().await?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        print_migration(&report);
    }
    Ok(report.success())
}

/// Verify the end state. Returns `false` if verification found problems.
pub async fn run_verify(ctx: &AppContext, json: bool) -> Result<bool, ProxyVaultError> {
    let report = ctx.coordinator.verify_migration().await?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        print_verification(&report);
    }
    Ok(report.valid)
}

fn print_migration(report: &MigrationReport) {
    println!();
    println!("  credential migration");
    println!("  {}", "-".repeat(35));
    println!("    Total:    {}", report.total_count);
    println!("    Migrated: {}", report.migrated_count());
    println!("    Skipped:  {}", report.skipped_count());
    println!("    Failed:   {}", report.failed_count());
    println!("    Took:     {}ms", report.duration.as_millis());
    for failure in &report.failed {
        println!("      {}  {}", short_id(&failure.id), failure.reason);
    }
    println!();
    if !report.success() {
        println!("  Failed rows keep their plaintext and are retried on the next run.");
        println!();
    }
}

fn print_verification(report: &VerificationReport) {
    println!();
    println!("  migration verification");
    println!("  {}", "-".repeat(35));
    println!(
        "    Result:    {}",
        if report.valid { "[OK] valid" } else { "[FAIL] problems found" }
    );
    println!("    Plaintext: {}", report.plaintext_count);
    println!("    Encrypted: {}", report.encrypted_count);
    for error in &report.errors {
        println!("      {error}");
    }
    println!();
}
