// SPDX-FileCopyrightText: 2026 Proxyvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! CRUD for proxies whose secrets live in encrypted credential records.
//!
//! Invariants upheld here:
//! - no write ever puts plaintext into the legacy `proxies.username` /
//!   `proxies.password` columns, and no read hands them back;
//! - a proxy and its credential record are created, rotated, and deleted in
//!   the same transaction;
//! - decryption failures degrade to "no credentials" instead of erroring.

use std::sync::Arc;

use proxyvault_core::types::{
    short_id, AccessLevel, CredentialRecord, CredentialType, EncryptedValue, NewProxy, Proxy,
    ProxyFilter, ProxyUpdate, ProxyWithSecret, ENCRYPTION_ALGORITHM,
};
use proxyvault_core::{CredentialCipher, DecryptError, ProxyVaultError};
use proxyvault_storage::queries::{credentials, proxies};
use proxyvault_storage::{map_tr_err, now_timestamp, Database, ProxyRow};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};

use crate::keyring::{is_current_key, stale_key_error};
use crate::store::CredentialStore;
use crate::validation;

fn tx_err(operation: &'static str) -> impl Fn(tokio_rusqlite::Error<rusqlite::Error>) -> ProxyVaultError {
    move |e| ProxyVaultError::transaction(operation, e)
}

/// Convert a raw row into the caller-facing DTO, dropping legacy plaintext.
pub(crate) fn to_proxy(row: ProxyRow) -> Result<Proxy, ProxyVaultError> {
    if row.has_plaintext() {
        warn!(
            proxy_id = %short_id(&row.id),
            "proxy still holds legacy plaintext credentials; run `proxyvault migrate`"
        );
    }
    let protocol = row.protocol.parse().map_err(|_| {
        ProxyVaultError::Internal(format!(
            "proxy {} has unknown protocol `{}`",
            short_id(&row.id),
            row.protocol
        ))
    })?;
    Ok(Proxy {
        id: row.id,
        name: row.name,
        host: row.host,
        port: row.port,
        protocol,
        enabled: row.enabled,
        credential_id: row.credential_id,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

/// Build a fresh `entity_auth` record for `owner_id` from encrypted fields.
pub(crate) fn new_entity_auth_record(
    owner_id: &str,
    owner_name: &str,
    username: Option<EncryptedValue>,
    password: EncryptedValue,
    now: &str,
) -> CredentialRecord {
    CredentialRecord {
        id: uuid::Uuid::new_v4().to_string(),
        owner_entity_id: Some(owner_id.to_string()),
        name: format!("{owner_name} credentials"),
        credential_type: CredentialType::EntityAuth,
        encrypted_username: username.map(|v| v.ciphertext),
        encrypted_password: password.ciphertext,
        encryption_version: password.version,
        key_id: password.key_id,
        algorithm: ENCRYPTION_ALGORITHM.to_string(),
        access_level: AccessLevel::Standard,
        created_at: now.to_string(),
        updated_at: now.to_string(),
        last_accessed_at: None,
        access_count: 0,
    }
}

/// What happened inside an update transaction.
enum UpdateOutcome {
    Updated(ProxyRow),
    NotFound,
    KeyMismatch,
    /// The secret was encrypted under a key that a rotation has since retired.
    StaleKey,
}

/// Encrypt-and-commit attempts before a write gives up on a moving key.
pub(crate) const WRITE_ATTEMPTS: usize = 3;

/// Repository for proxies with encrypted credentials.
pub struct SecureProxyRepository {
    db: Database,
    cipher: Arc<dyn CredentialCipher>,
    store: CredentialStore,
}

impl SecureProxyRepository {
    pub fn new(db: Database, cipher: Arc<dyn CredentialCipher>) -> Self {
        let store = CredentialStore::new(db.clone());
        Self { db, cipher, store }
    }

    /// The credential store sharing this repository's database.
    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    fn encrypt(&self, secret: &SecretString) -> Result<EncryptedValue, ProxyVaultError> {
        self.cipher.encrypt(secret.expose_secret())
    }

    /// Create a proxy, and its credential record when a secret is supplied.
    ///
    /// Everything is validated and encrypted before the transaction opens, so
    /// a failure at any step leaves neither row behind. If the master key was
    /// rotated between encryption and commit, the secret is encrypted again
    /// under the new key.
    pub async fn add_proxy_with_secret(&self, new: NewProxy) -> Result<Proxy, ProxyVaultError> {
        validation::validate_new_proxy(&new)?;

        let proxy_id = uuid::Uuid::new_v4().to_string();
        for _ in 0..WRITE_ATTEMPTS {
            let now = now_timestamp();
            let credential = if new.username.is_some() || new.password.is_some() {
                let username = new.username.as_ref().map(|u| self.encrypt(u)).transpose()?;
                let password = match &new.password {
                    Some(p) => self.encrypt(p)?,
                    None => self.cipher.encrypt("")?,
                };
                Some(new_entity_auth_record(
                    &proxy_id, &new.name, username, password, &now,
                ))
            } else {
                None
            };

            let row = ProxyRow {
                id: proxy_id.clone(),
                name: new.name.clone(),
                host: new.host.clone(),
                port: new.port,
                protocol: new.protocol.to_string(),
                enabled: new.enabled,
                username: None,
                password: None,
                credential_id: credential.as_ref().map(|c| c.id.clone()),
                created_at: now.clone(),
                updated_at: now,
            };

            let stored = self
                .db
                .connection()
                .call(move |conn| -> Result<Option<ProxyRow>, rusqlite::Error> {
                    let tx = conn.transaction()?;
                    if let Some(credential) = &credential {
                        if !is_current_key(&tx, &credential.key_id)? {
                            return Ok(None);
                        }
                        credentials::insert(&tx, credential)?;
                    }
                    proxies::insert(&tx, &row)?;
                    tx.commit()?;
                    Ok(Some(row))
                })
                .await
                .map_err(tx_err("add_proxy_with_secret"))?;

            let Some(row) = stored else {
                debug!(proxy_id = %short_id(&proxy_id), "master key rotated during add; re-encrypting");
                continue;
            };
            info!(
                proxy_id = %short_id(&row.id),
                has_secret = row.credential_id.is_some(),
                "proxy added"
            );
            return to_proxy(row);
        }
        Err(stale_key_error())
    }

    /// Update a proxy's fields and, when supplied, its secret.
    ///
    /// A supplied secret rotates the linked record in place, or creates and
    /// links a new one. A record written under another key can only be
    /// replaced whole, since a stored field it would keep could not be
    /// carried over.
    pub async fn update_proxy(&self, update: ProxyUpdate) -> Result<Proxy, ProxyVaultError> {
        validation::validate_update(&update)?;

        for _ in 0..WRITE_ATTEMPTS {
            let outcome = self.try_update(&update).await?;
            match outcome {
                UpdateOutcome::Updated(row) => {
                    info!(proxy_id = %short_id(&row.id), "proxy updated");
                    return to_proxy(row);
                }
                UpdateOutcome::NotFound => {
                    return Err(ProxyVaultError::NotFound {
                        entity: "proxy",
                        id: update.id,
                    });
                }
                UpdateOutcome::KeyMismatch => {
                    return Err(ProxyVaultError::Validation(
                        "stored credentials were encrypted with a different key; \
                         supply both username and password to replace them"
                            .to_string(),
                    ));
                }
                UpdateOutcome::StaleKey => {
                    debug!(proxy_id = %short_id(&update.id), "master key rotated during update; re-encrypting");
                }
            }
        }
        Err(stale_key_error())
    }

    async fn try_update(&self, update: &ProxyUpdate) -> Result<UpdateOutcome, ProxyVaultError> {
        let username = update.username.as_ref().map(|u| self.encrypt(u)).transpose()?;
        let password = update.password.as_ref().map(|p| self.encrypt(p)).transpose()?;
        // Needed only if a username-only update has to create a record.
        let blank_password = if update.has_secret() && password.is_none() {
            Some(self.cipher.encrypt("")?)
        } else {
            None
        };

        let id = update.id.clone();
        let now = now_timestamp();
        let name = update.name.clone();
        let host = update.host.clone();
        let port = update.port;
        let protocol = update.protocol;
        let enabled = update.enabled;

        self.db
            .connection()
            .call(move |conn| {
                let tx = conn.transaction()?;
                let Some(mut row) = proxies::get(&tx, &id)? else {
                    return Ok(UpdateOutcome::NotFound);
                };

                if let Some(name) = name {
                    row.name = name;
                }
                if let Some(host) = host {
                    row.host = host;
                }
                if let Some(port) = port {
                    row.port = port;
                }
                if let Some(protocol) = protocol {
                    row.protocol = protocol.to_string();
                }
                if let Some(enabled) = enabled {
                    row.enabled = enabled;
                }
                row.updated_at = now.clone();
                proxies::update_details(&tx, &row)?;

                let Some(key_id) = password.as_ref().or(username.as_ref()).map(|v| v.key_id.clone())
                else {
                    tx.commit()?;
                    return Ok(UpdateOutcome::Updated(row));
                };
                if !is_current_key(&tx, &key_id)? {
                    return Ok(UpdateOutcome::StaleKey);
                }

                let existing = match &row.credential_id {
                    Some(credential_id) => credentials::get(&tx, credential_id)?,
                    None => None,
                };

                match existing {
                    Some(record) => {
                        // Fields this update would keep from the stored record.
                        let keeps_stored = password.is_none()
                            || (username.is_none() && record.encrypted_username.is_some());
                        if keeps_stored && record.key_id != key_id {
                            return Ok(UpdateOutcome::KeyMismatch);
                        }
                        let version = password
                            .as_ref()
                            .or(username.as_ref())
                            .map_or(record.encryption_version, |v| v.version);
                        let new_username = username.map(|v| v.ciphertext).or(record.encrypted_username);
                        let new_password =
                            password.map_or(record.encrypted_password, |v| v.ciphertext);
                        credentials::update_secret(
                            &tx,
                            &record.id,
                            new_username.as_deref(),
                            &new_password,
                            &key_id,
                            version,
                            &now,
                        )?;
                    }
                    None => {
                        let Some(password) = password.or(blank_password) else {
                            return Ok(UpdateOutcome::KeyMismatch);
                        };
                        let record =
                            new_entity_auth_record(&row.id, &row.name, username, password, &now);
                        credentials::insert(&tx, &record)?;
                        proxies::set_credential(&tx, &row.id, Some(&record.id), &now)?;
                        row.credential_id = Some(record.id);
                    }
                }

                tx.commit()?;
                Ok(UpdateOutcome::Updated(row))
            })
            .await
            .map_err(tx_err("update_proxy"))
    }

    /// Fetch a proxy with its secret decrypted.
    ///
    /// If the linked record cannot be decrypted the proxy is returned with no
    /// secret fields. A successful decryption bumps the record's access count
    /// on a best-effort basis.
    pub async fn get_proxy_with_decrypted_secret(
        &self,
        id: &str,
    ) -> Result<Option<ProxyWithSecret>, ProxyVaultError> {
        validation::validate_id(id)?;

        let owned = id.to_string();
        let joined = self
            .db
            .connection()
            .call(move |conn| proxies::get_with_credential(conn, &owned))
            .await
            .map_err(map_tr_err)?;

        let Some((row, credential)) = joined else {
            return Ok(None);
        };
        let proxy = to_proxy(row)?;

        let Some(record) = credential else {
            return Ok(Some(ProxyWithSecret {
                proxy,
                username: None,
                password: None,
            }));
        };

        match self.decrypt_record(&record) {
            Ok((username, password)) => {
                if let Err(e) = self.store.record_access(&record.id).await {
                    warn!(
                        credential_id = %short_id(&record.id),
                        error = %e,
                        "failed to record credential access"
                    );
                }
                Ok(Some(ProxyWithSecret {
                    proxy,
                    username,
                    password,
                }))
            }
            Err(e) => {
                warn!(
                    proxy_id = %short_id(&proxy.id),
                    credential_id = %short_id(&record.id),
                    error = %e,
                    "credential decryption failed; returning proxy without credentials"
                );
                Ok(Some(ProxyWithSecret {
                    proxy,
                    username: None,
                    password: None,
                }))
            }
        }
    }

    /// Decrypt both fields of a record. An empty password reads as absent.
    #[allow(clippy::type_complexity)]
    fn decrypt_record(
        &self,
        record: &CredentialRecord,
    ) -> Result<(Option<SecretString>, Option<SecretString>), DecryptError> {
        match self.cipher.key_id() {
            None => return Err(DecryptError::NotInitialized),
            Some(key_id) if key_id != record.key_id => return Err(DecryptError::KeyMismatch),
            Some(_) => {}
        }
        let username = record
            .encrypted_username
            .as_deref()
            .map(|u| self.cipher.decrypt(u))
            .transpose()?;
        let password = self.cipher.decrypt(&record.encrypted_password)?;
        let password = (!password.expose_secret().is_empty()).then_some(password);
        Ok((username, password))
    }

    /// Delete a proxy and its credential record. Returns `false` if absent.
    pub async fn delete_proxy(&self, id: &str) -> Result<bool, ProxyVaultError> {
        validation::validate_id(id)?;

        let owned = id.to_string();
        let deleted = self
            .db
            .connection()
            .call(move |conn| {
                let tx = conn.transaction()?;
                let Some(row) = proxies::get(&tx, &owned)? else {
                    return Ok(false);
                };
                if let Some(credential_id) = &row.credential_id {
                    credentials::delete(&tx, credential_id)?;
                }
                proxies::delete(&tx, &owned)?;
                tx.commit()?;
                Ok(true)
            })
            .await
            .map_err(tx_err("delete_proxy"))?;

        if deleted {
            info!(proxy_id = %short_id(id), "proxy deleted");
        } else {
            debug!(proxy_id = %short_id(id), "delete: proxy not found");
        }
        Ok(deleted)
    }

    /// Whether the proxy links to an existing credential record. No decryption.
    pub async fn has_secret(&self, id: &str) -> Result<bool, ProxyVaultError> {
        validation::validate_id(id)?;
        let owned = id.to_string();
        self.db
            .connection()
            .call(move |conn| proxies::has_credential(conn, &owned))
            .await
            .map_err(map_tr_err)
    }

    /// Fetch a proxy without its secret.
    pub async fn find_by_id(&self, id: &str) -> Result<Option<Proxy>, ProxyVaultError> {
        validation::validate_id(id)?;
        let owned = id.to_string();
        let row = self
            .db
            .connection()
            .call(move |conn| proxies::get(conn, &owned))
            .await
            .map_err(map_tr_err)?;
        row.map(to_proxy).transpose()
    }

    /// List proxies matching `filter`, ordered by name.
    pub async fn find_all(&self, filter: ProxyFilter) -> Result<Vec<Proxy>, ProxyVaultError> {
        let rows = self
            .db
            .connection()
            .call(move |conn| proxies::list(conn, &filter))
            .await
            .map_err(map_tr_err)?;
        rows.into_iter().map(to_proxy).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> ProxyRow {
        ProxyRow {
            id: "0f8fad5b-d9cb-469f-a165-70867728950e".into(),
            name: "edge".into(),
            host: "10.1.1.1".into(),
            port: 1080,
            protocol: "socks5".into(),
            enabled: true,
            username: Some("legacy-user".into()),
            password: Some("legacy-pass".into()),
            credential_id: None,
            created_at: "t".into(),
            updated_at: "t".into(),
        }
    }

    #[test]
    fn conversion_drops_legacy_plaintext() {
        let proxy = to_proxy(row()).unwrap();
        let debug = format!("{proxy:?}");
        assert!(!debug.contains("legacy-user"));
        assert!(!debug.contains("legacy-pass"));
        assert_eq!(proxy.protocol, proxyvault_core::types::ProxyProtocol::Socks5);
    }

    #[test]
    fn unknown_protocol_is_internal_error() {
        let mut bad = row();
        bad.protocol = "gopher".into();
        assert!(matches!(to_proxy(bad), Err(ProxyVaultError::Internal(_))));
    }
}
