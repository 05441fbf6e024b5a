// SPDX-FileCopyrightText: 2026 Proxyvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! TestHarness for integration tests.
//!
//! Opens a migrated database in a temporary directory and wires an
//! initialized [`EncryptionEngine`] into the repository, the migration
//! coordinator, and the credential store.

use std::sync::Arc;

use proxyvault_core::{CredentialCipher, ProxyVaultError};
use proxyvault_credentials::{CredentialStore, MigrationCoordinator, SecureProxyRepository};
use proxyvault_crypto::{EncryptionEngine, KdfParams};
use proxyvault_storage::Database;

use crate::failing_cipher::FailingCipher;

/// Argon2 parameters small enough to keep tests fast.
pub const TEST_KDF_PARAMS: KdfParams = KdfParams {
    memory_cost: 8192,
    iterations: 1,
    parallelism: 1,
};

/// Builder for [`TestHarness`].
pub struct TestHarnessBuilder {
    key: Option<[u8; 32]>,
    uninitialized: bool,
    fail_after: Option<usize>,
}

impl Default for TestHarnessBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestHarnessBuilder {
    pub fn new() -> Self {
        Self {
            key: None,
            uninitialized: false,
            fail_after: None,
        }
    }

    /// Use a fixed master key instead of a random one.
    pub fn with_key(mut self, key: [u8; 32]) -> Self {
        self.key = Some(key);
        self
    }

    /// Leave the engine without a key.
    pub fn without_key(mut self) -> Self {
        self.uninitialized = true;
        self
    }

    /// Route repository and coordinator encryption through a
    /// [`FailingCipher`] that fails after `n` successful encryptions.
    pub fn with_failing_cipher(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    pub async fn build(self) -> Result<TestHarness, ProxyVaultError> {
        let temp_dir = tempfile::TempDir::new()
            .map_err(|e| ProxyVaultError::Internal(format!("failed to create temp dir: {e}")))?;
        let db_path = temp_dir.path().join("test.db");
        let db = Database::open(&db_path.to_string_lossy()).await?;

        let engine = Arc::new(EncryptionEngine::with_kdf_params(TEST_KDF_PARAMS));
        if !self.uninitialized {
            match self.key {
                Some(key) => engine.initialize_with_key(&key)?,
                None => engine.install(EncryptionEngine::generate_key()?),
            }
        }

        let cipher: Arc<dyn CredentialCipher> = match self.fail_after {
            Some(n) => Arc::new(FailingCipher::new(engine.clone(), n)),
            None => engine.clone() as Arc<dyn CredentialCipher>,
        };

        Ok(TestHarness {
            repo: SecureProxyRepository::new(db.clone(), cipher.clone()),
            coordinator: MigrationCoordinator::new(db.clone(), cipher.clone()),
            store: CredentialStore::new(db.clone()),
            db,
            engine,
            cipher,
            _temp_dir: temp_dir,
        })
    }
}

/// Everything needed to exercise the credential subsystem end to end.
pub struct TestHarness {
    pub db: Database,
    pub engine: Arc<EncryptionEngine>,
    pub cipher: Arc<dyn CredentialCipher>,
    pub repo: SecureProxyRepository,
    pub coordinator: MigrationCoordinator,
    pub store: CredentialStore,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Harness with a random key and a real cipher.
    pub async fn new() -> Result<Self, ProxyVaultError> {
        Self::builder().build().await
    }
}
