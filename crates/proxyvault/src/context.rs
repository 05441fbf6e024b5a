// SPDX-FileCopyrightText: 2026 Proxyvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared state for commands that need an unlocked vault.

use std::sync::Arc;

use proxyvault_config::ProxyVaultConfig;
use proxyvault_core::{CredentialCipher, ProxyVaultError};
use proxyvault_credentials::{
    unlock_or_create, MigrationCoordinator, SecureProxyRepository, UnlockOutcome,
};
use proxyvault_crypto::{get_master_passphrase, EncryptionEngine};
use proxyvault_storage::Database;
use tracing::{debug, info};

/// Open database, unlocked engine, and the services built on them.
pub struct AppContext {
    pub config: ProxyVaultConfig,
    pub db: Database,
    pub engine: Arc<EncryptionEngine>,
    pub repo: SecureProxyRepository,
    pub coordinator: MigrationCoordinator,
}

impl AppContext {
    /// Open the database and unlock (or create) the master key.
    pub async fn open(config: ProxyVaultConfig) -> Result<Self, ProxyVaultError> {
        let db = Database::open_with(&config.storage).await?;
        let engine = Arc::new(EncryptionEngine::new(&config.vault));

        let passphrase = get_master_passphrase()?;
        match unlock_or_create(&db, &engine, &passphrase).await? {
            UnlockOutcome::Created => {
                info!("new master key created; the passphrase cannot be recovered if lost")
            }
            UnlockOutcome::Unlocked => debug!("master key unlocked"),
        }

        let cipher: Arc<dyn CredentialCipher> = engine.clone();
        Ok(Self {
            repo: SecureProxyRepository::new(db.clone(), cipher.clone()),
            coordinator: MigrationCoordinator::new(db.clone(), cipher),
            config,
            db,
            engine,
        })
    }

    /// Drop the key from memory and checkpoint the database.
    pub async fn close(self) -> Result<(), ProxyVaultError> {
        self.engine.destroy();
        self.db.close().await
    }
}
