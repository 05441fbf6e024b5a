// SPDX-FileCopyrightText: 2026 Proxyvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The 256-bit symmetric key and its identifier.

use proxyvault_core::ProxyVaultError;
use ring::digest::{digest, SHA256};
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroizing;

use crate::crypto;
use crate::kdf::{self, KdfParams, SALT_LEN};

/// Key length in bytes.
pub const KEY_LEN: usize = 32;

/// Length of a key identifier in hex characters.
pub const KEY_ID_LEN: usize = 16;

/// A 32-byte AES key, zeroized on drop.
///
/// Debug output omits the key material.
#[derive(Clone)]
pub struct SymmetricKey {
    bytes: Zeroizing<[u8; KEY_LEN]>,
    key_id: String,
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymmetricKey")
            .field("bytes", &"[REDACTED]")
            .field("key_id", &self.key_id)
            .finish()
    }
}

impl SymmetricKey {
    fn new(bytes: Zeroizing<[u8; KEY_LEN]>) -> Self {
        let key_id = compute_key_id(bytes.as_ref());
        Self { bytes, key_id }
    }

    /// Import raw key bytes. Anything but exactly 32 bytes is a config error.
    pub fn from_bytes(raw: &[u8]) -> Result<Self, ProxyVaultError> {
        if raw.len() != KEY_LEN {
            return Err(ProxyVaultError::Config(format!(
                "encryption key must be {KEY_LEN} bytes, got {}",
                raw.len()
            )));
        }
        let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
        bytes.copy_from_slice(raw);
        Ok(Self::new(bytes))
    }

    /// Generate a fresh random key.
    pub fn generate() -> Result<Self, ProxyVaultError> {
        Ok(Self::new(crypto::generate_random_key()?))
    }

    /// Derive a key from a passphrase with Argon2id.
    pub fn derive(
        passphrase: &SecretString,
        salt: &[u8; SALT_LEN],
        params: &KdfParams,
    ) -> Result<Self, ProxyVaultError> {
        let bytes = kdf::derive_key(passphrase.expose_secret().as_bytes(), salt, params)?;
        Ok(Self::new(bytes))
    }

    /// First 16 hex characters of SHA-256 over the key bytes.
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub(crate) fn bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

/// Identifier for a key: the first 16 hex characters of its SHA-256.
pub fn compute_key_id(key: &[u8]) -> String {
    let mut id = hex::encode(digest(&SHA256, key).as_ref());
    id.truncate(KEY_ID_LEN);
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_id_is_sha256_prefix() {
        let key = SymmetricKey::from_bytes(&[0u8; KEY_LEN]).unwrap();
        // SHA-256 of 32 zero bytes.
        assert_eq!(key.key_id(), "66687aadf862bd77");
        assert_eq!(key.key_id().len(), KEY_ID_LEN);
    }

    #[test]
    fn wrong_length_is_rejected() {
        for len in [0, 16, 31, 33, 64] {
            let err = SymmetricKey::from_bytes(&vec![1u8; len]).unwrap_err();
            assert!(matches!(err, ProxyVaultError::Config(_)), "len {len}");
        }
    }

    #[test]
    fn generated_keys_differ() {
        let a = SymmetricKey::generate().unwrap();
        let b = SymmetricKey::generate().unwrap();
        assert_ne!(a.key_id(), b.key_id());
    }

    #[test]
    fn debug_redacts_bytes() {
        let key = SymmetricKey::from_bytes(&[0xAB; KEY_LEN]).unwrap();
        let debug = format!("{key:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("171, 171"));
    }
}
