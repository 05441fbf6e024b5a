// SPDX-FileCopyrightText: 2026 Proxyvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for proxyvault.
//!
//! This crate provides the error types, domain types, and the cipher trait
//! shared by the storage, crypto, and credential crates.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{DecryptError, ProxyVaultError};
pub use traits::CredentialCipher;
pub use types::{
    AccessLevel, CredentialRecord, CredentialType, EncryptedValue, MigrationState,
    MigrationStatusRecord, Proxy, ProxyProtocol,
};
