// SPDX-FileCopyrightText: 2026 Proxyvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AES-256-GCM encryption engine for proxyvault credentials.
//!
//! A 32-byte key is either derived from a passphrase with Argon2id or
//! imported raw. Every value is sealed under a fresh 128-bit IV and stored in
//! the three-segment form `base64(iv):base64(ciphertext):base64(tag)`, tagged
//! with the key's identifier so a record can be matched to the key that
//! wrote it.

pub mod blob;
pub mod crypto;
pub mod engine;
pub mod kdf;
pub mod key;
pub mod prompt;

pub use blob::EncryptedBlob;
pub use engine::EncryptionEngine;
pub use kdf::KdfParams;
pub use key::{compute_key_id, SymmetricKey};
pub use prompt::{get_master_passphrase, get_new_master_passphrase};
