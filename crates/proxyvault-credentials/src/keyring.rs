// SPDX-FileCopyrightText: 2026 Proxyvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Master key persistence: first-run creation, unlock, and passphrase rotation.
//!
//! Only the salt, the KDF parameters, and the key id are stored. The key is
//! re-derived from the passphrase on every unlock and checked against the
//! stored key id.

use std::sync::Arc;

use proxyvault_core::types::{short_id, ENCRYPTION_FORMAT_VERSION};
use proxyvault_core::ProxyVaultError;
use proxyvault_crypto::kdf::{self, KdfParams, SALT_LEN};
use proxyvault_crypto::{EncryptionEngine, SymmetricKey};
use proxyvault_storage::queries::{credentials, key_meta};
use proxyvault_storage::{map_tr_err, now_timestamp, Database, KeyMetaRow};
use rusqlite::TransactionBehavior;
use secrecy::SecretString;
use serde::Serialize;
use tracing::{info, warn};

/// How [`unlock_or_create`] loaded the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockOutcome {
    /// No key existed; a new one was derived and its metadata stored.
    Created,
    /// The stored key was re-derived from the passphrase.
    Unlocked,
}

/// Summary of a passphrase rotation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RotationReport {
    pub new_key_id: String,
    /// Records re-encrypted under the new key.
    pub rotated: Vec<String>,
    /// Records written under some other key, left untouched.
    pub skipped: Vec<String>,
    /// Records the current key could not decrypt, left untouched.
    pub failed: Vec<String>,
}

/// Load the master key into `engine`, creating it on first use.
///
/// A passphrase that does not reproduce the stored key id is rejected with
/// [`ProxyVaultError::Config`] and the engine stays uninitialized.
pub async fn unlock_or_create(
    db: &Database,
    engine: &EncryptionEngine,
    passphrase: &SecretString,
) -> Result<UnlockOutcome, ProxyVaultError> {
    let meta = db
        .connection()
        .call(|conn| key_meta::get(conn))
        .await
        .map_err(map_tr_err)?;

    match meta {
        Some(meta) => {
            let params = KdfParams::from_json(&meta.kdf_params)?;
            let salt: [u8; SALT_LEN] = meta.kdf_salt.as_slice().try_into().map_err(|_| {
                ProxyVaultError::Config("stored key salt has the wrong length".to_string())
            })?;
            let key = SymmetricKey::derive(passphrase, &salt, &params)?;
            if key.key_id() != meta.key_id {
                warn!(expected = %meta.key_id, "passphrase does not match the stored key");
                return Err(ProxyVaultError::Config(
                    "invalid passphrase: derived key does not match the stored key".to_string(),
                ));
            }
            engine.install(key);
            info!(key_id = %meta.key_id, "master key unlocked");
            Ok(UnlockOutcome::Unlocked)
        }
        None => {
            let params = *engine.kdf_params();
            let salt = kdf::generate_salt()?;
            let key = SymmetricKey::derive(passphrase, &salt, &params)?;
            let row = KeyMetaRow {
                kdf_salt: salt.to_vec(),
                kdf_params: params.to_json()?,
                key_id: key.key_id().to_string(),
                created_at: now_timestamp(),
                rotated_at: None,
            };
            db.connection()
                .call(move |conn| key_meta::insert(conn, &row))
                .await
                .map_err(map_tr_err)?;
            info!(key_id = %key.key_id(), "master key created");
            engine.install(key);
            Ok(UnlockOutcome::Created)
        }
    }
}

/// Whether `key_id` is the master key recorded in `key_meta`.
///
/// Databases without key metadata (raw-key engines) accept any key. Write
/// transactions call this before storing ciphertext, so a record encrypted
/// just before a rotation committed is never written under the retired key.
pub(crate) fn is_current_key(conn: &rusqlite::Connection, key_id: &str) -> rusqlite::Result<bool> {
    Ok(key_meta::get(conn)?.is_none_or(|meta| meta.key_id == key_id))
}

/// Error for a write that kept losing the race against key rotation.
pub(crate) fn stale_key_error() -> ProxyVaultError {
    ProxyVaultError::Config(
        "the master key was rotated while writing; unlock with the new passphrase".to_string(),
    )
}

enum RotationOutcome {
    Rotated(RotationReport),
    /// `key_meta` names a key other than the one loaded in the engine.
    KeyChanged,
}

/// Re-key every credential record under a key derived from `new_passphrase`.
///
/// Listing, re-encryption, the record updates, and the new key metadata all
/// happen inside one immediate transaction, and the engine switches to the
/// new key before the connection serves any other call. Writes that
/// encrypted under the old key in the meantime fail their key check and
/// retry under the new one.
pub async fn rotate_passphrase(
    db: &Database,
    engine: &Arc<EncryptionEngine>,
    new_passphrase: &SecretString,
    params: &KdfParams,
) -> Result<RotationReport, ProxyVaultError> {
    let old_key = engine.current_key().ok_or_else(|| {
        ProxyVaultError::Config("encryption engine is not initialized".to_string())
    })?;
    let salt = kdf::generate_salt()?;
    let new_key = SymmetricKey::derive(new_passphrase, &salt, params)?;
    let kdf_params = params.to_json()?;
    let old_key_id = old_key.key_id().to_string();
    let engine = Arc::clone(engine);

    let outcome = db
        .connection()
        .call(move |conn| -> Result<RotationOutcome, rusqlite::Error> {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            if !is_current_key(&tx, old_key.key_id())? {
                return Ok(RotationOutcome::KeyChanged);
            }

            let mut report = RotationReport {
                new_key_id: new_key.key_id().to_string(),
                ..Default::default()
            };
            let now = now_timestamp();
            for record in credentials::list_all(&tx)? {
                if record.key_id != old_key.key_id() {
                    report.skipped.push(record.id);
                    continue;
                }
                let username = match record.encrypted_username.as_deref() {
                    Some(u) => match EncryptionEngine::re_encrypt(u, &old_key, &new_key) {
                        Some(v) => Some(v.ciphertext),
                        None => {
                            warn!(credential_id = %short_id(&record.id), "rotation: cannot decrypt username");
                            report.failed.push(record.id);
                            continue;
                        }
                    },
                    None => None,
                };
                let Some(password) =
                    EncryptionEngine::re_encrypt(&record.encrypted_password, &old_key, &new_key)
                else {
                    warn!(credential_id = %short_id(&record.id), "rotation: cannot decrypt password");
                    report.failed.push(record.id);
                    continue;
                };
                credentials::update_secret(
                    &tx,
                    &record.id,
                    username.as_deref(),
                    &password.ciphertext,
                    new_key.key_id(),
                    ENCRYPTION_FORMAT_VERSION,
                    &now,
                )?;
                report.rotated.push(record.id);
            }

            if key_meta::rotate(&tx, &salt, &kdf_params, new_key.key_id(), &now)? == 0 {
                key_meta::insert(
                    &tx,
                    &KeyMetaRow {
                        kdf_salt: salt.to_vec(),
                        kdf_params: kdf_params.clone(),
                        key_id: new_key.key_id().to_string(),
                        created_at: now.clone(),
                        rotated_at: Some(now.clone()),
                    },
                )?;
            }
            tx.commit()?;
            engine.install(new_key);
            Ok(RotationOutcome::Rotated(report))
        })
        .await
        .map_err(|e| ProxyVaultError::transaction("rotate_passphrase", e))?;

    let RotationOutcome::Rotated(report) = outcome else {
        return Err(ProxyVaultError::Config(
            "the stored master key changed since unlock; unlock again before rotating".to_string(),
        ));
    };
    info!(
        old_key_id = %old_key_id,
        new_key_id = %report.new_key_id,
        rotated = report.rotated.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "master key rotated"
    );
    Ok(report)
}
