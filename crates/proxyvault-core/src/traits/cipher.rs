// SPDX-FileCopyrightText: 2026 Proxyvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cipher trait consumed by the credential repository and migration coordinator.

use secrecy::SecretString;

use crate::error::{DecryptError, ProxyVaultError};
use crate::types::EncryptedValue;

/// Symmetric authenticated cipher used to protect credential fields.
///
/// The software engine in `proxyvault-crypto` is the only implementation
/// shipped; a KMS- or HSM-backed cipher plugs in here.
pub trait CredentialCipher: Send + Sync + 'static {
    /// Identifier of the key currently in use, or `None` when no key is loaded.
    fn key_id(&self) -> Option<String>;

    /// Encrypt a secret. Fails loudly when no key is loaded.
    fn encrypt(&self, plaintext: &str) -> Result<EncryptedValue, ProxyVaultError>;

    /// Decrypt a wire-form blob. Never panics; every failure is a [`DecryptError`].
    fn decrypt(&self, encoded: &str) -> Result<SecretString, DecryptError>;
}
