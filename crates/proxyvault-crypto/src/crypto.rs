// SPDX-FileCopyrightText: 2026 Proxyvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Low-level AES-256-GCM seal/open operations.
//!
//! Every call to [`seal`] generates a fresh random 128-bit IV via the system
//! CSPRNG. IV reuse would be catastrophic for GCM security.

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::{AesGcm, Nonce};
use proxyvault_core::{DecryptError, ProxyVaultError};
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroizing;

use crate::blob::{EncryptedBlob, IV_LEN, TAG_LEN};

/// AES-256-GCM with a 16-byte IV and a 16-byte tag.
type Aes256Gcm16 = AesGcm<Aes256, U16>;

fn cipher(key: &[u8; 32]) -> Option<Aes256Gcm16> {
    Aes256Gcm16::new_from_slice(key).ok()
}

/// Encrypt plaintext with AES-256-GCM using a random 128-bit IV.
pub fn seal(key: &[u8; 32], plaintext: &[u8]) -> Result<EncryptedBlob, ProxyVaultError> {
    let cipher = cipher(key)
        .ok_or_else(|| ProxyVaultError::Crypto("failed to create AES-256-GCM key".to_string()))?;

    let rng = SystemRandom::new();
    let mut iv = [0u8; IV_LEN];
    rng.fill(&mut iv)
        .map_err(|_| ProxyVaultError::Crypto("failed to generate random IV".to_string()))?;

    let mut sealed = cipher
        .encrypt(Nonce::<U16>::from_slice(&iv), plaintext)
        .map_err(|_| ProxyVaultError::Crypto("AES-256-GCM encryption failed".to_string()))?;

    // aes-gcm appends the tag to the ciphertext.
    let split = sealed.len() - TAG_LEN;
    let mut tag = [0u8; TAG_LEN];
    tag.copy_from_slice(&sealed[split..]);
    sealed.truncate(split);

    Ok(EncryptedBlob {
        iv,
        ciphertext: sealed,
        tag,
    })
}

/// Decrypt and authenticate a blob with AES-256-GCM.
///
/// A wrong key and tampered data are indistinguishable: both are
/// [`DecryptError::AuthenticationFailed`].
pub fn open(key: &[u8; 32], blob: &EncryptedBlob) -> Result<Zeroizing<Vec<u8>>, DecryptError> {
    let cipher = cipher(key).ok_or(DecryptError::AuthenticationFailed)?;

    let mut sealed = Vec::with_capacity(blob.ciphertext.len() + TAG_LEN);
    sealed.extend_from_slice(&blob.ciphertext);
    sealed.extend_from_slice(&blob.tag);

    cipher
        .decrypt(Nonce::<U16>::from_slice(&blob.iv), sealed.as_slice())
        .map(Zeroizing::new)
        .map_err(|_| DecryptError::AuthenticationFailed)
}

/// Generate a random 32-byte key suitable for AES-256-GCM.
pub fn generate_random_key() -> Result<Zeroizing<[u8; 32]>, ProxyVaultError> {
    let rng = SystemRandom::new();
    let mut key = Zeroizing::new([0u8; 32]);
    rng.fill(key.as_mut())
        .map_err(|_| ProxyVaultError::Crypto("failed to generate random key".to_string()))?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_open_roundtrip() {
        let key = generate_random_key().unwrap();
        let blob = seal(&key, b"proxy password").unwrap();
        assert_eq!(open(&key, &blob).unwrap().as_slice(), b"proxy password");
    }

    #[test]
    fn ciphertext_length_matches_plaintext() {
        let key = generate_random_key().unwrap();
        let blob = seal(&key, b"hello").unwrap();
        assert_eq!(blob.ciphertext.len(), 5);
    }

    #[test]
    fn fresh_iv_per_call() {
        let key = generate_random_key().unwrap();
        let a = seal(&key, b"same input").unwrap();
        let b = seal(&key, b"same input").unwrap();
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn tampering_fails_authentication() {
        let key = generate_random_key().unwrap();
        let blob = seal(&key, b"do not tamper").unwrap();

        let mut bad_ct = blob.clone();
        bad_ct.ciphertext[0] ^= 0x01;
        assert_eq!(open(&key, &bad_ct), Err(DecryptError::AuthenticationFailed));

        let mut bad_tag = blob.clone();
        bad_tag.tag[15] ^= 0x80;
        assert_eq!(open(&key, &bad_tag), Err(DecryptError::AuthenticationFailed));

        let mut bad_iv = blob;
        bad_iv.iv[0] ^= 0x01;
        assert_eq!(open(&key, &bad_iv), Err(DecryptError::AuthenticationFailed));
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let blob = seal(&generate_random_key().unwrap(), b"secret").unwrap();
        let other = generate_random_key().unwrap();
        assert_eq!(open(&other, &blob), Err(DecryptError::AuthenticationFailed));
    }
}
