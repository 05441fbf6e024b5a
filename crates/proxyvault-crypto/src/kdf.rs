// SPDX-FileCopyrightText: 2026 Proxyvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Argon2id key derivation from a passphrase.
//!
//! Derives a 32-byte key using Argon2id (Algorithm::Argon2id, Version::V0x13).
//! The parameters used are persisted next to the salt so a later unlock
//! re-derives the same key even if the configuration changed in between.

use proxyvault_config::model::VaultConfig;
use proxyvault_core::ProxyVaultError;
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// Salt length in bytes.
pub const SALT_LEN: usize = 16;

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub memory_cost: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl From<&VaultConfig> for KdfParams {
    fn from(config: &VaultConfig) -> Self {
        Self {
            memory_cost: config.kdf_memory_cost,
            iterations: config.kdf_iterations,
            parallelism: config.kdf_parallelism,
        }
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::from(&VaultConfig::default())
    }
}

impl KdfParams {
    /// JSON form stored in `key_meta.kdf_params`.
    pub fn to_json(&self) -> Result<String, ProxyVaultError> {
        serde_json::to_string(self)
            .map_err(|e| ProxyVaultError::Internal(format!("failed to encode KDF params: {e}")))
    }

    /// Parse the JSON form stored in `key_meta.kdf_params`.
    pub fn from_json(json: &str) -> Result<Self, ProxyVaultError> {
        serde_json::from_str(json)
            .map_err(|e| ProxyVaultError::Config(format!("stored KDF params are invalid: {e}")))
    }
}

/// Derive a 32-byte key from passphrase using Argon2id.
///
/// The returned key is wrapped in [`Zeroizing`] for automatic memory zeroing
/// on drop.
pub fn derive_key(
    passphrase: &[u8],
    salt: &[u8; SALT_LEN],
    params: &KdfParams,
) -> Result<Zeroizing<[u8; 32]>, ProxyVaultError> {
    let argon_params = argon2::Params::new(
        params.memory_cost,
        params.iterations,
        params.parallelism,
        Some(32),
    )
    .map_err(|e| ProxyVaultError::Crypto(format!("invalid Argon2id parameters: {e}")))?;

    let argon2 =
        argon2::Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, argon_params);

    let mut output = Zeroizing::new([0u8; 32]);
    argon2
        .hash_password_into(passphrase, salt, output.as_mut())
        .map_err(|e| ProxyVaultError::Crypto(format!("Argon2id key derivation failed: {e}")))?;

    Ok(output)
}

/// Generate a random salt for Argon2id.
pub fn generate_salt() -> Result<[u8; SALT_LEN], ProxyVaultError> {
    let rng = SystemRandom::new();
    let mut salt = [0u8; SALT_LEN];
    rng.fill(&mut salt)
        .map_err(|_| ProxyVaultError::Crypto("failed to generate random salt".to_string()))?;
    Ok(salt)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Low cost for fast tests.
    const FAST: KdfParams = KdfParams {
        memory_cost: 8192,
        iterations: 1,
        parallelism: 1,
    };

    #[test]
    fn derive_key_is_deterministic() {
        let salt = [1u8; SALT_LEN];
        let key1 = derive_key(b"test passphrase", &salt, &FAST).unwrap();
        let key2 = derive_key(b"test passphrase", &salt, &FAST).unwrap();
        assert_eq!(*key1, *key2);
    }

    #[test]
    fn passphrase_and_salt_both_matter() {
        let base = derive_key(b"one", &[1u8; SALT_LEN], &FAST).unwrap();
        let other_pass = derive_key(b"two", &[1u8; SALT_LEN], &FAST).unwrap();
        let other_salt = derive_key(b"one", &[2u8; SALT_LEN], &FAST).unwrap();
        assert_ne!(*base, *other_pass);
        assert_ne!(*base, *other_salt);
    }

    #[test]
    fn params_change_the_key() {
        let salt = [3u8; SALT_LEN];
        let a = derive_key(b"same", &salt, &FAST).unwrap();
        let b = derive_key(
            b"same",
            &salt,
            &KdfParams {
                iterations: 2,
                ..FAST
            },
        )
        .unwrap();
        assert_ne!(*a, *b);
    }

    #[test]
    fn invalid_params_are_crypto_errors() {
        let err = derive_key(
            b"x",
            &[0u8; SALT_LEN],
            &KdfParams {
                memory_cost: 1,
                iterations: 0,
                parallelism: 0,
            },
        )
        .unwrap_err();
        assert!(matches!(err, ProxyVaultError::Crypto(_)));
    }

    #[test]
    fn generate_salt_produces_random_values() {
        assert_ne!(generate_salt().unwrap(), generate_salt().unwrap());
    }

    #[test]
    fn params_json_round_trip() {
        let json = FAST.to_json().unwrap();
        assert_eq!(KdfParams::from_json(&json).unwrap(), FAST);
        assert!(KdfParams::from_json("not json").is_err());
    }
}
