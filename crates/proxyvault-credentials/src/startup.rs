// SPDX-FileCopyrightText: 2026 Proxyvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Startup hook: migrate leftover plaintext before serving requests.

use proxyvault_config::model::MigrationConfig;
use proxyvault_core::ProxyVaultError;
use tracing::{debug, info, warn};

use crate::migration::{MigrationCoordinator, MigrationReport};

/// Run the plaintext migration if enabled and needed.
///
/// Returns the report when a migration ran. Row failures are logged, not
/// raised; the next startup retries them.
pub async fn run_startup_migration(
    coordinator: &MigrationCoordinator,
    config: &MigrationConfig,
) -> Result<Option<MigrationReport>, ProxyVaultError> {
    if !config.run_on_startup {
        debug!("startup migration disabled");
        return Ok(None);
    }
    if !coordinator.needs_migration().await? {
        debug!("no plaintext credentials found -- nothing to migrate");
        return Ok(None);
    }

    let report = coordinator.run_migration().await?;
    if !report.success() {
        warn!(
            failed = report.failed_count(),
            "some proxies could not be migrated; they will be retried on next startup"
        );
    }

    if config.verify_after_run {
        let verification = coordinator.verify_migration().await?;
        if verification.valid {
            info!(encrypted = verification.encrypted_count, "post-migration verification passed");
        } else {
            warn!(
                plaintext = verification.plaintext_count,
                errors = verification.errors.len(),
                "post-migration verification found problems"
            );
        }
    }

    Ok(Some(report))
}
