// SPDX-FileCopyrightText: 2026 Proxyvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bulk conversion of legacy plaintext proxy credentials into encrypted
//! credential records.
//!
//! Each row is migrated in its own transaction, so a failure on one row
//! never affects another, and progress is persisted after every row in the
//! singleton `credential_migration_status` record. Logs carry only 8-char id
//! prefixes and counts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use proxyvault_core::types::{short_id, CredentialType, MigrationState, MigrationStatusRecord};
use proxyvault_core::{CredentialCipher, DecryptError, ProxyVaultError};
use proxyvault_storage::queries::{credentials, migration_status, proxies};
use proxyvault_storage::{map_tr_err, now_timestamp, Database, ProxyRow};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::keyring::{is_current_key, stale_key_error};
use crate::repository::{new_entity_auth_record, WRITE_ATTEMPTS};
use crate::validation;

/// Outcome of migrating a single row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    /// A credential record was created and linked; plaintext cleared.
    Migrated,
    /// Nothing to encrypt: the row changed, vanished, or was already linked.
    Skipped { reason: &'static str },
    /// The row was left untouched.
    Failed { reason: String },
}

/// A row that could not be migrated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowFailure {
    pub id: String,
    pub reason: String,
}

/// Summary of one [`MigrationCoordinator::run_migration`] call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationReport {
    /// Rows in the snapshot taken at the start of the run.
    pub total_count: u64,
    pub migrated: Vec<String>,
    pub failed: Vec<RowFailure>,
    pub skipped: Vec<String>,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
}

impl MigrationReport {
    pub fn success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn migrated_count(&self) -> u64 {
        self.migrated.len() as u64
    }

    pub fn failed_count(&self) -> u64 {
        self.failed.len() as u64
    }

    pub fn skipped_count(&self) -> u64 {
        self.skipped.len() as u64
    }
}

mod duration_millis {
    pub fn serialize<S: serde::Serializer>(
        duration: &std::time::Duration,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }
}

/// Result of [`MigrationCoordinator::verify_migration`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    /// No plaintext rows remain and every `entity_auth` record decrypts.
    pub valid: bool,
    pub plaintext_count: u64,
    pub encrypted_count: u64,
    pub errors: Vec<String>,
}

/// Clears the single-flight flag when a run ends, however it ends.
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives the plaintext-to-encrypted conversion.
pub struct MigrationCoordinator {
    db: Database,
    cipher: Arc<dyn CredentialCipher>,
    running: AtomicBool,
}

impl MigrationCoordinator {
    pub fn new(db: Database, cipher: Arc<dyn CredentialCipher>) -> Self {
        Self {
            db,
            cipher,
            running: AtomicBool::new(false),
        }
    }

    /// Whether any proxy row still carries a non-empty plaintext secret.
    pub async fn needs_migration(&self) -> Result<bool, ProxyVaultError> {
        let count = self
            .db
            .connection()
            .call(|conn| proxies::count_plaintext(conn))
            .await
            .map_err(map_tr_err)?;
        Ok(count > 0)
    }

    /// Last recorded migration status, if a migration ever started.
    pub async fn get_status(&self) -> Result<Option<MigrationStatusRecord>, ProxyVaultError> {
        self.db
            .connection()
            .call(|conn| migration_status::get(conn))
            .await
            .map_err(map_tr_err)
    }

    /// Whether a run is in progress in this process.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Migrate every row that carries plaintext at the time of the call.
    ///
    /// Returns [`ProxyVaultError::MigrationInProgress`] if another run is
    /// active and [`ProxyVaultError::Config`] if the cipher holds no key.
    /// Per-row failures do not abort the run; they are listed in the report.
    pub async fn run_migration(&self) -> Result<MigrationReport, ProxyVaultError> {
        if self.cipher.key_id().is_none() {
            return Err(ProxyVaultError::Config(
                "encryption engine is not initialized".to_string(),
            ));
        }
        let Some(_guard) = RunGuard::acquire(&self.running) else {
            return Err(ProxyVaultError::MigrationInProgress);
        };

        let start = Instant::now();
        let started_at = now_timestamp();
        let snapshot = self
            .db
            .connection()
            .call(move |conn| {
                let rows = proxies::list_plaintext(conn)?;
                migration_status::begin(conn, rows.len() as u64, &started_at)?;
                Ok(rows)
            })
            .await
            .map_err(map_tr_err)?;

        let mut report = MigrationReport {
            total_count: snapshot.len() as u64,
            ..Default::default()
        };
        info!(total = report.total_count, "credential migration started");

        for row in snapshot {
            let id = row.id.clone();
            match self.migrate_row(row).await {
                RowOutcome::Migrated => {
                    debug!(proxy_id = %short_id(&id), "row migrated");
                    report.migrated.push(id.clone());
                }
                RowOutcome::Skipped { reason } => {
                    debug!(proxy_id = %short_id(&id), reason, "row skipped");
                    report.skipped.push(id.clone());
                }
                RowOutcome::Failed { reason } => {
                    warn!(proxy_id = %short_id(&id), reason = %reason, "row migration failed");
                    report.failed.push(RowFailure {
                        id: id.clone(),
                        reason,
                    });
                }
            }
            self.record_progress(&report, id).await;
        }

        report.duration = start.elapsed();
        let (state, message) = if report.success() {
            (MigrationState::Completed, None)
        } else {
            (
                MigrationState::Failed,
                Some(format!(
                    "{} of {} rows failed",
                    report.failed_count(),
                    report.total_count
                )),
            )
        };
        let completed_at = now_timestamp();
        self.db
            .connection()
            .call(move |conn| migration_status::finish(conn, state, &completed_at, message.as_deref()))
            .await
            .map_err(map_tr_err)?;

        info!(
            total = report.total_count,
            migrated = report.migrated_count(),
            skipped = report.skipped_count(),
            failed = report.failed_count(),
            duration_ms = report.duration.as_millis() as u64,
            "credential migration finished"
        );
        Ok(report)
    }

    async fn record_progress(&self, report: &MigrationReport, last_id: String) {
        let migrated = report.migrated_count();
        let failed = report.failed_count();
        let result = self
            .db
            .connection()
            .call(move |conn| migration_status::record_progress(conn, migrated, failed, &last_id))
            .await;
        if let Err(e) = result {
            warn!(error = %e, "failed to persist migration progress");
        }
    }

    async fn migrate_row(&self, row: ProxyRow) -> RowOutcome {
        if validation::validate_id(&row.id).is_err() {
            return RowOutcome::Failed {
                reason: "invalid proxy id".to_string(),
            };
        }
        for _ in 0..WRITE_ATTEMPTS {
            // `None` means the master key was rotated after encryption.
            if let Some(outcome) = self.try_migrate_row(row.clone()).await {
                return outcome;
            }
            debug!(proxy_id = %short_id(&row.id), "master key rotated during migration; re-encrypting");
        }
        RowOutcome::Failed {
            reason: stale_key_error().to_string(),
        }
    }

    async fn try_migrate_row(&self, row: ProxyRow) -> Option<RowOutcome> {
        let non_empty = |v: &Option<String>| v.as_deref().filter(|s| !s.is_empty()).map(str::to_owned);
        let username = match non_empty(&row.username).map(|u| self.cipher.encrypt(&u)).transpose() {
            Ok(v) => v,
            Err(e) => {
                return Some(RowOutcome::Failed {
                    reason: format!("encryption failed: {e}"),
                });
            }
        };
        let password = match self
            .cipher
            .encrypt(row.password.as_deref().unwrap_or_default())
        {
            Ok(v) => v,
            Err(e) => {
                return Some(RowOutcome::Failed {
                    reason: format!("encryption failed: {e}"),
                });
            }
        };

        let now = now_timestamp();
        let record = new_entity_auth_record(&row.id, &row.name, username, password, &now);

        let result = self
            .db
            .connection()
            .call(move |conn| -> Result<Option<RowOutcome>, rusqlite::Error> {
                let tx = conn.transaction()?;
                let Some(current) = proxies::get(&tx, &row.id)? else {
                    return Ok(Some(RowOutcome::Skipped {
                        reason: "row deleted since snapshot",
                    }));
                };
                if current.username != row.username || current.password != row.password {
                    return Ok(Some(RowOutcome::Skipped {
                        reason: "row changed since snapshot",
                    }));
                }
                if let Some(credential_id) = &current.credential_id
                    && credentials::exists(&tx, credential_id)?
                {
                    proxies::clear_plaintext(&tx, &row.id, &now)?;
                    tx.commit()?;
                    return Ok(Some(RowOutcome::Skipped {
                        reason: "already linked to a credential",
                    }));
                }
                if !is_current_key(&tx, &record.key_id)? {
                    return Ok(None);
                }
                credentials::insert(&tx, &record)?;
                proxies::link_and_clear_plaintext(&tx, &row.id, &record.id, &now)?;
                tx.commit()?;
                Ok(Some(RowOutcome::Migrated))
            })
            .await;

        match result {
            Ok(outcome) => outcome,
            Err(e) => Some(RowOutcome::Failed {
                reason: ProxyVaultError::transaction("migrate_row", e).to_string(),
            }),
        }
    }

    /// Check the end state: no plaintext rows, and every `entity_auth`
    /// record decrypts under the current key. Read-only.
    pub async fn verify_migration(&self) -> Result<VerificationReport, ProxyVaultError> {
        let (plaintext_count, records) = self
            .db
            .connection()
            .call(|conn| {
                let plaintext = proxies::count_plaintext(conn)?;
                let records = credentials::list_by_type(conn, CredentialType::EntityAuth)?;
                Ok((plaintext, records))
            })
            .await
            .map_err(map_tr_err)?;

        let key_id = self.cipher.key_id();
        let mut errors = Vec::new();
        if plaintext_count > 0 {
            errors.push(format!("{plaintext_count} proxies still hold plaintext credentials"));
        }

        for record in &records {
            let check = match &key_id {
                None => Err(DecryptError::NotInitialized),
                Some(current) if *current != record.key_id => Err(DecryptError::KeyMismatch),
                Some(_) => record
                    .encrypted_username
                    .as_deref()
                    .map(|u| self.cipher.decrypt(u))
                    .transpose()
                    .and_then(|_| self.cipher.decrypt(&record.encrypted_password))
                    .map(|_| ()),
            };
            if let Err(e) = check {
                errors.push(format!("credential {}: {e}", short_id(&record.id)));
            }
        }

        let report = VerificationReport {
            valid: errors.is_empty(),
            plaintext_count,
            encrypted_count: records.len() as u64,
            errors,
        };
        info!(
            valid = report.valid,
            plaintext = report.plaintext_count,
            encrypted = report.encrypted_count,
            errors = report.errors.len(),
            "credential migration verified"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_is_single_flight_and_resets() {
        let flag = AtomicBool::new(false);
        let guard = RunGuard::acquire(&flag).unwrap();
        assert!(RunGuard::acquire(&flag).is_none());
        drop(guard);
        assert!(!flag.load(Ordering::Acquire));
        assert!(RunGuard::acquire(&flag).is_some());
    }

    #[test]
    fn report_success_tracks_failures() {
        let mut report = MigrationReport::default();
        assert!(report.success());
        report.failed.push(RowFailure {
            id: "x".into(),
            reason: "invalid proxy id".into(),
        });
        assert!(!report.success());
        assert_eq!(report.failed_count(), 1);
    }

    #[test]
    fn report_serializes_duration_as_millis() {
        let report = MigrationReport {
            duration: Duration::from_millis(1500),
            ..Default::default()
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["duration"], 1500);
    }
}
