// SPDX-FileCopyrightText: 2026 Proxyvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The encryption engine: key lifecycle plus authenticated encrypt/decrypt.
//!
//! State machine: `Uninitialized -> Initialized(key_id) -> Uninitialized`.
//! Write paths (`encrypt`) fail loudly without a key; read paths (`decrypt`)
//! return a [`DecryptError`] value and never panic.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use proxyvault_config::model::VaultConfig;
use proxyvault_core::types::{EncryptedValue, ENCRYPTION_FORMAT_VERSION};
use proxyvault_core::{CredentialCipher, DecryptError, ProxyVaultError};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::blob::EncryptedBlob;
use crate::crypto;
use crate::kdf::{self, KdfParams, SALT_LEN};
use crate::key::SymmetricKey;

/// Holds at most one [`SymmetricKey`] and encrypts credential fields with it.
///
/// One engine is created at the binary's root and shared as
/// `Arc<EncryptionEngine>`; tests build independent engines.
pub struct EncryptionEngine {
    key: RwLock<Option<SymmetricKey>>,
    kdf: KdfParams,
}

impl std::fmt::Debug for EncryptionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionEngine")
            .field("key_id", &self.key_id())
            .field("kdf", &self.kdf)
            .finish()
    }
}

impl EncryptionEngine {
    /// Create an uninitialized engine using the configured KDF cost.
    pub fn new(config: &VaultConfig) -> Self {
        Self::with_kdf_params(KdfParams::from(config))
    }

    /// Create an uninitialized engine with explicit KDF parameters.
    pub fn with_kdf_params(kdf: KdfParams) -> Self {
        Self {
            key: RwLock::new(None),
            kdf,
        }
    }

    /// KDF parameters used by [`initialize`](Self::initialize).
    pub fn kdf_params(&self) -> &KdfParams {
        &self.kdf
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<SymmetricKey>> {
        self.key.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<SymmetricKey>> {
        self.key.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Derive the key from `password` and load it.
    ///
    /// Generates a fresh salt when none is given. Returns the salt actually
    /// used so the caller can persist it.
    pub fn initialize(
        &self,
        password: &SecretString,
        salt: Option<[u8; SALT_LEN]>,
    ) -> Result<[u8; SALT_LEN], ProxyVaultError> {
        let salt = match salt {
            Some(salt) => salt,
            None => kdf::generate_salt()?,
        };
        let key = SymmetricKey::derive(password, &salt, &self.kdf)?;
        self.install(key);
        Ok(salt)
    }

    /// Load a raw 32-byte key. Any other length is a config error.
    pub fn initialize_with_key(&self, raw_key: &[u8]) -> Result<(), ProxyVaultError> {
        let key = SymmetricKey::from_bytes(raw_key)?;
        self.install(key);
        Ok(())
    }

    /// Replace the loaded key, zeroizing the previous one.
    pub fn install(&self, key: SymmetricKey) {
        info!(key_id = %key.key_id(), "encryption key loaded");
        *self.write() = Some(key);
    }

    /// Generate a fresh random key without loading it.
    pub fn generate_key() -> Result<SymmetricKey, ProxyVaultError> {
        SymmetricKey::generate()
    }

    pub fn is_initialized(&self) -> bool {
        self.read().is_some()
    }

    /// Identifier of the loaded key.
    pub fn key_id(&self) -> Option<String> {
        self.read().as_ref().map(|k| k.key_id().to_string())
    }

    /// A copy of the loaded key, for rotation.
    pub fn current_key(&self) -> Option<SymmetricKey> {
        self.read().clone()
    }

    /// Drop the key. Calling this on an uninitialized engine is a no-op.
    pub fn destroy(&self) {
        if self.write().take().is_some() {
            info!("encryption key destroyed");
        }
    }

    /// Encrypt a UTF-8 secret under the loaded key.
    pub fn encrypt(&self, plaintext: &str) -> Result<EncryptedValue, ProxyVaultError> {
        let guard = self.read();
        let key = guard.as_ref().ok_or_else(|| {
            ProxyVaultError::Config("encryption engine is not initialized".to_string())
        })?;
        Self::encrypt_with(key, plaintext)
    }

    /// Decrypt a wire-form blob under the loaded key.
    pub fn decrypt(&self, encoded: &str) -> Result<SecretString, DecryptError> {
        let guard = self.read();
        let key = guard.as_ref().ok_or(DecryptError::NotInitialized)?;
        Self::decrypt_with(key, encoded)
    }

    /// Serialize `value` as JSON and encrypt it.
    pub fn encrypt_object<T: Serialize>(&self, value: &T) -> Result<EncryptedValue, ProxyVaultError> {
        let json = SecretString::from(
            serde_json::to_string(value)
                .map_err(|e| ProxyVaultError::Internal(format!("failed to serialize value: {e}")))?,
        );
        self.encrypt(json.expose_secret())
    }

    /// Decrypt a blob and deserialize its JSON plaintext.
    pub fn decrypt_object<T: DeserializeOwned>(&self, encoded: &str) -> Result<T, DecryptError> {
        let json = self.decrypt(encoded)?;
        serde_json::from_str(json.expose_secret()).map_err(|_| DecryptError::MalformedPlaintext)
    }

    /// Decrypt `encoded` with `old_key` and encrypt the plaintext with `new_key`.
    ///
    /// Returns `None` when `old_key` cannot decrypt the blob. The engine's own
    /// key is never touched.
    pub fn re_encrypt(
        encoded: &str,
        old_key: &SymmetricKey,
        new_key: &SymmetricKey,
    ) -> Option<EncryptedValue> {
        let plaintext = match Self::decrypt_with(old_key, encoded) {
            Ok(plaintext) => plaintext,
            Err(e) => {
                debug!(key_id = %old_key.key_id(), error = %e, "re-encrypt: old key rejected value");
                return None;
            }
        };
        Self::encrypt_with(new_key, plaintext.expose_secret()).ok()
    }

    /// Encrypt under an explicit key.
    pub fn encrypt_with(key: &SymmetricKey, plaintext: &str) -> Result<EncryptedValue, ProxyVaultError> {
        let blob = crypto::seal(key.bytes(), plaintext.as_bytes())?;
        Ok(EncryptedValue {
            ciphertext: blob.encode(),
            key_id: key.key_id().to_string(),
            version: ENCRYPTION_FORMAT_VERSION,
        })
    }

    /// Decrypt under an explicit key.
    pub fn decrypt_with(key: &SymmetricKey, encoded: &str) -> Result<SecretString, DecryptError> {
        let blob = EncryptedBlob::parse(encoded)?;
        let plaintext = crypto::open(key.bytes(), &blob)?;
        let text = std::str::from_utf8(&plaintext).map_err(|_| DecryptError::MalformedPlaintext)?;
        Ok(SecretString::from(text.to_string()))
    }
}

impl CredentialCipher for EncryptionEngine {
    fn key_id(&self) -> Option<String> {
        EncryptionEngine::key_id(self)
    }

    fn encrypt(&self, plaintext: &str) -> Result<EncryptedValue, ProxyVaultError> {
        EncryptionEngine::encrypt(self, plaintext)
    }

    fn decrypt(&self, encoded: &str) -> Result<SecretString, DecryptError> {
        EncryptionEngine::decrypt(self, encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::{IV_LEN, TAG_LEN};
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

    const FAST: KdfParams = KdfParams {
        memory_cost: 8192,
        iterations: 1,
        parallelism: 1,
    };

    fn engine() -> EncryptionEngine {
        let engine = EncryptionEngine::with_kdf_params(FAST);
        engine.initialize_with_key(&[7u8; 32]).unwrap();
        engine
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let engine = engine();
        let value = engine.encrypt("hunter2").unwrap();
        assert_eq!(value.version, ENCRYPTION_FORMAT_VERSION);
        assert_eq!(Some(value.key_id.clone()), engine.key_id());
        assert_eq!(engine.decrypt(&value.ciphertext).unwrap().expose_secret(), "hunter2");
    }

    #[test]
    fn wire_form_has_expected_segment_sizes() {
        let value = engine().encrypt("abc").unwrap();
        let parts: Vec<&str> = value.ciphertext.split(':').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(BASE64.decode(parts[0]).unwrap().len(), IV_LEN);
        assert_eq!(BASE64.decode(parts[1]).unwrap().len(), 3);
        assert_eq!(BASE64.decode(parts[2]).unwrap().len(), TAG_LEN);
    }

    #[test]
    fn same_plaintext_encrypts_differently() {
        let engine = engine();
        let a = engine.encrypt("same").unwrap();
        let b = engine.encrypt("same").unwrap();
        assert_ne!(a.ciphertext, b.ciphertext);
        assert_eq!(engine.decrypt(&a.ciphertext).unwrap().expose_secret(), "same");
        assert_eq!(engine.decrypt(&b.ciphertext).unwrap().expose_secret(), "same");
    }

    #[test]
    fn tampered_segments_fail_authentication() {
        let engine = engine();
        let value = engine.encrypt("payload").unwrap();
        let parts: Vec<&str> = value.ciphertext.split(':').collect();

        let mut ct = BASE64.decode(parts[1]).unwrap();
        ct[0] ^= 0x01;
        let tampered_ct = format!("{}:{}:{}", parts[0], BASE64.encode(&ct), parts[2]);
        assert_eq!(
            engine.decrypt(&tampered_ct).unwrap_err(),
            DecryptError::AuthenticationFailed
        );

        let mut tag = BASE64.decode(parts[2]).unwrap();
        tag[0] ^= 0x01;
        let tampered_tag = format!("{}:{}:{}", parts[0], parts[1], BASE64.encode(&tag));
        assert_eq!(
            engine.decrypt(&tampered_tag).unwrap_err(),
            DecryptError::AuthenticationFailed
        );
    }

    #[test]
    fn other_engine_cannot_decrypt() {
        let value = engine().encrypt("isolated").unwrap();
        let other = EncryptionEngine::with_kdf_params(FAST);
        other.initialize_with_key(&[8u8; 32]).unwrap();
        assert_eq!(
            other.decrypt(&value.ciphertext).unwrap_err(),
            DecryptError::AuthenticationFailed
        );
    }

    #[test]
    fn malformed_input_is_invalid_format() {
        let engine = engine();
        for bad in ["", "nope", "a:b", "a:b:c:d", "%%%:%%%:%%%"] {
            assert_eq!(engine.decrypt(bad).unwrap_err(), DecryptError::InvalidFormat);
        }
    }

    #[test]
    fn uninitialized_engine_refuses_to_encrypt() {
        let engine = EncryptionEngine::with_kdf_params(FAST);
        assert!(!engine.is_initialized());
        assert!(matches!(
            engine.encrypt("x").unwrap_err(),
            ProxyVaultError::Config(_)
        ));
        assert_eq!(engine.decrypt("a:b:c").unwrap_err(), DecryptError::NotInitialized);
    }

    #[test]
    fn bad_key_length_is_config_error() {
        let engine = EncryptionEngine::with_kdf_params(FAST);
        let err = engine.initialize_with_key(&[1u8; 31]).unwrap_err();
        assert!(matches!(err, ProxyVaultError::Config(_)));
        assert!(!engine.is_initialized());
    }

    #[test]
    fn password_initialization_returns_reusable_salt() {
        let password = SecretString::from("correct horse".to_string());

        let first = EncryptionEngine::with_kdf_params(FAST);
        let salt = first.initialize(&password, None).unwrap();
        let value = first.encrypt("secret").unwrap();

        let second = EncryptionEngine::with_kdf_params(FAST);
        assert_eq!(second.initialize(&password, Some(salt)).unwrap(), salt);
        assert_eq!(first.key_id(), second.key_id());
        assert_eq!(second.decrypt(&value.ciphertext).unwrap().expose_secret(), "secret");
    }

    #[test]
    fn destroy_is_idempotent() {
        let engine = engine();
        let value = engine.encrypt("gone").unwrap();
        engine.destroy();
        engine.destroy();
        assert!(!engine.is_initialized());
        assert_eq!(engine.key_id(), None);
        assert_eq!(
            engine.decrypt(&value.ciphertext).unwrap_err(),
            DecryptError::NotInitialized
        );
    }

    #[test]
    fn objects_round_trip_as_json() {
        #[derive(Debug, PartialEq, Serialize, serde::Deserialize)]
        struct Login {
            user: String,
            pass: String,
        }
        let engine = engine();
        let login = Login {
            user: "u1".into(),
            pass: "p1".into(),
        };
        let value = engine.encrypt_object(&login).unwrap();
        assert_eq!(engine.decrypt_object::<Login>(&value.ciphertext).unwrap(), login);

        let not_json = engine.encrypt("not json").unwrap();
        assert_eq!(
            engine.decrypt_object::<Login>(&not_json.ciphertext).unwrap_err(),
            DecryptError::MalformedPlaintext
        );
    }

    #[test]
    fn re_encrypt_uses_explicit_keys() {
        let old = SymmetricKey::from_bytes(&[1u8; 32]).unwrap();
        let new = SymmetricKey::from_bytes(&[2u8; 32]).unwrap();
        let engine = engine();
        let before = engine.key_id();

        let value = EncryptionEngine::encrypt_with(&old, "rotate me").unwrap();
        let rotated = EncryptionEngine::re_encrypt(&value.ciphertext, &old, &new).unwrap();
        assert_eq!(rotated.key_id, new.key_id());
        assert_eq!(
            EncryptionEngine::decrypt_with(&new, &rotated.ciphertext)
                .unwrap()
                .expose_secret(),
            "rotate me"
        );

        // Wrong old key yields None, and the engine's own key never changes.
        assert!(EncryptionEngine::re_encrypt(&value.ciphertext, &new, &old).is_none());
        assert_eq!(engine.key_id(), before);
    }

    #[test]
    fn works_through_the_cipher_trait() {
        let cipher: std::sync::Arc<dyn CredentialCipher> = std::sync::Arc::new(engine());
        let value = cipher.encrypt("via trait").unwrap();
        assert_eq!(cipher.decrypt(&value.ciphertext).unwrap().expose_secret(), "via trait");
        assert!(cipher.key_id().is_some());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn any_string_round_trips(plaintext in ".{0,512}", seed in any::<[u8; 32]>()) {
            let engine = EncryptionEngine::with_kdf_params(KdfParams::default());
            engine.initialize_with_key(&seed).unwrap();

            let value = engine.encrypt(&plaintext).unwrap();
            let decrypted = engine.decrypt(&value.ciphertext).unwrap();
            prop_assert_eq!(decrypted.expose_secret(), plaintext.as_str());
        }

        #[test]
        fn single_bit_flips_never_decrypt(plaintext in ".{1,64}", bit in 0usize..8) {
            let engine = EncryptionEngine::with_kdf_params(KdfParams::default());
            engine.initialize_with_key(&[3u8; 32]).unwrap();
            let value = engine.encrypt(&plaintext).unwrap();

            let mut blob = EncryptedBlob::parse(&value.ciphertext).unwrap();
            blob.ciphertext[0] ^= 1 << bit;
            prop_assert_eq!(
                engine.decrypt(&blob.encode()).unwrap_err(),
                DecryptError::AuthenticationFailed
            );
        }
    }
}
