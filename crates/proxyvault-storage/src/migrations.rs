// SPDX-FileCopyrightText: 2026 Proxyvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Schema for the credential vault, embedded with refinery.
//!
//! `V1__initial_schema.sql` creates `credentials`, `proxies` (with the
//! legacy `username`/`password` plaintext columns kept readable for
//! migration), the singleton `credential_migration_status` row, and the
//! singleton `key_meta` row. Migrations run on every [`Database`] open.
//!
//! [`Database`]: crate::Database

use proxyvault_core::ProxyVaultError;
use tracing::debug;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Apply pending schema migrations.
///
/// Applied versions are recorded in `refinery_schema_history`, so reopening
/// an up-to-date vault applies nothing.
pub fn run_migrations(conn: &mut rusqlite::Connection) -> Result<(), ProxyVaultError> {
    let report = embedded::migrations::runner()
        .run(conn)
        .map_err(|e| ProxyVaultError::Storage {
            source: Box::new(e),
        })?;
    for migration in report.applied_migrations() {
        debug!(version = migration.version(), name = migration.name(), "schema migration applied");
    }
    Ok(())
}
