// SPDX-FileCopyrightText: 2026 Proxyvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Encrypted credential records, independent of the entity that owns them.

use proxyvault_core::types::{short_id, CredentialRecord, CredentialType};
use proxyvault_core::ProxyVaultError;
use proxyvault_storage::queries::credentials;
use proxyvault_storage::{map_tr_err, now_timestamp, Database};
use tracing::debug;

/// Read and audit access to the `credentials` table.
///
/// Inserts, rotations, and deletes happen inside the repository's and the
/// migration's transactions; this type owns the standalone operations.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    db: Database,
}

impl CredentialStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Fetch a record by id.
    pub async fn get(&self, id: &str) -> Result<Option<CredentialRecord>, ProxyVaultError> {
        let id = id.to_string();
        self.db
            .connection()
            .call(move |conn| credentials::get(conn, &id))
            .await
            .map_err(map_tr_err)
    }

    /// All records of one type.
    pub async fn list_by_type(
        &self,
        credential_type: CredentialType,
    ) -> Result<Vec<CredentialRecord>, ProxyVaultError> {
        self.db
            .connection()
            .call(move |conn| credentials::list_by_type(conn, credential_type))
            .await
            .map_err(map_tr_err)
    }

    /// Number of records, optionally of one type.
    pub async fn count(
        &self,
        credential_type: Option<CredentialType>,
    ) -> Result<u64, ProxyVaultError> {
        self.db
            .connection()
            .call(move |conn| credentials::count(conn, credential_type))
            .await
            .map_err(map_tr_err)
    }

    pub async fn exists(&self, id: &str) -> Result<bool, ProxyVaultError> {
        let id = id.to_string();
        self.db
            .connection()
            .call(move |conn| credentials::exists(conn, &id))
            .await
            .map_err(map_tr_err)
    }

    /// Increment `access_count` and stamp `last_accessed_at`.
    ///
    /// Returns `false` if the record no longer exists.
    pub async fn record_access(&self, id: &str) -> Result<bool, ProxyVaultError> {
        let owned = id.to_string();
        let now = now_timestamp();
        let touched = self
            .db
            .connection()
            .call(move |conn| credentials::record_access(conn, &owned, &now))
            .await
            .map_err(map_tr_err)?;
        debug!(credential_id = %short_id(id), touched, "credential access recorded");
        Ok(touched == 1)
    }
}
