// SPDX-FileCopyrightText: 2026 Proxyvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A cipher that starts failing after a fixed number of encryptions.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use proxyvault_core::types::EncryptedValue;
use proxyvault_core::{CredentialCipher, DecryptError, ProxyVaultError};
use proxyvault_crypto::EncryptionEngine;
use secrecy::SecretString;

/// Wraps a real engine; encryption number `fail_after + 1` and every one
/// after it return [`ProxyVaultError::Crypto`]. Decryption always delegates.
pub struct FailingCipher {
    inner: Arc<EncryptionEngine>,
    fail_after: usize,
    calls: AtomicUsize,
}

impl FailingCipher {
    pub fn new(inner: Arc<EncryptionEngine>, fail_after: usize) -> Self {
        Self {
            inner,
            fail_after,
            calls: AtomicUsize::new(0),
        }
    }

    /// Fail every encryption.
    pub fn always(inner: Arc<EncryptionEngine>) -> Self {
        Self::new(inner, 0)
    }

    /// Number of encryption attempts so far.
    pub fn attempts(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CredentialCipher for FailingCipher {
    fn key_id(&self) -> Option<String> {
        self.inner.key_id()
    }

    fn encrypt(&self, plaintext: &str) -> Result<EncryptedValue, ProxyVaultError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n >= self.fail_after {
            return Err(ProxyVaultError::Crypto("injected encryption failure".to_string()));
        }
        self.inner.encrypt(plaintext)
    }

    fn decrypt(&self, encoded: &str) -> Result<SecretString, DecryptError> {
        self.inner.decrypt(encoded)
    }
}
