// SPDX-FileCopyrightText: 2026 Proxyvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for proxyvault.
//!
//! Two families are kept apart on purpose:
//!
//! - [`ProxyVaultError`] is returned by write paths and aborts the operation.
//!   Anything raised inside a wrapped transaction rolls the transaction back.
//! - [`DecryptError`] is returned by value on read paths. Callers absorb it
//!   into "no credentials available" instead of propagating it.
//!
//! Neither type ever carries plaintext secret material.

use thiserror::Error;

/// The primary error type used across proxyvault crates.
#[derive(Debug, Error)]
pub enum ProxyVaultError {
    /// Configuration errors: engine not initialized on a write path, a raw
    /// key of the wrong length, an invalid passphrase, or invalid settings.
    #[error("configuration error: {0}")]
    Config(String),

    /// Input rejected before any I/O (malformed identifier, out-of-range field).
    #[error("validation error: {0}")]
    Validation(String),

    /// A wrapped multi-statement transaction failed and was rolled back.
    #[error("transaction `{operation}` rolled back: {source}")]
    Transaction {
        operation: &'static str,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Storage backend errors outside of a wrapped transaction.
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Cryptographic failure on a write path (RNG, cipher construction, KDF).
    #[error("crypto error: {0}")]
    Crypto(String),

    /// A bulk migration is already running in this process.
    #[error("credential migration already in progress")]
    MigrationInProgress,

    /// The requested record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Structured decryption failure.
///
/// Descriptions are fixed strings so that nothing derived from the
/// ciphertext or plaintext can leak into logs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecryptError {
    /// The engine holds no key.
    #[error("encryption engine is not initialized")]
    NotInitialized,

    /// The blob is not `base64(iv):base64(ciphertext):base64(tag)`.
    #[error("invalid encrypted value format")]
    InvalidFormat,

    /// The record was written under a key the engine does not hold.
    #[error("credential was encrypted with a different key")]
    KeyMismatch,

    /// The authentication tag did not verify (wrong key or tampered data).
    #[error("authentication failed: wrong key or corrupted data")]
    AuthenticationFailed,

    /// Decryption succeeded but the plaintext is not valid UTF-8 or JSON.
    #[error("decrypted value is malformed")]
    MalformedPlaintext,
}

impl ProxyVaultError {
    /// Wrap a failure raised inside a named transaction.
    pub fn transaction<E>(operation: &'static str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Transaction {
            operation,
            source: Box::new(source),
        }
    }
}
