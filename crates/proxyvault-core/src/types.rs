// SPDX-FileCopyrightText: 2026 Proxyvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the storage, crypto, and credential crates.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Algorithm tag persisted on every credential record.
pub const ENCRYPTION_ALGORITHM: &str = "aes-256-gcm";

/// Version of the encrypted blob format written by this build.
pub const ENCRYPTION_FORMAT_VERSION: u32 = 1;

/// Kind of secret held by a credential record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CredentialType {
    /// Username/password authentication for an owning entity (e.g. a proxy).
    EntityAuth,
    /// A bare API key.
    ApiKey,
    /// Anything else.
    Generic,
}

/// Access classification of a credential record.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    #[default]
    Standard,
    Restricted,
}

/// Lifecycle state of the bulk plaintext migration.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MigrationState {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// Proxy wire protocol.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum ProxyProtocol {
    Http,
    Https,
    Socks4,
    Socks5,
}

/// Output of a successful encryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedValue {
    /// Three-part wire form `base64(iv):base64(ciphertext):base64(tag)`.
    pub ciphertext: String,
    /// Identifier of the key that produced the ciphertext.
    pub key_id: String,
    /// Blob format version.
    pub version: u32,
}

/// Encrypted-at-rest representation of a secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub id: String,
    pub owner_entity_id: Option<String>,
    pub name: String,
    pub credential_type: CredentialType,
    pub encrypted_username: Option<String>,
    pub encrypted_password: String,
    pub encryption_version: u32,
    pub key_id: String,
    pub algorithm: String,
    pub access_level: AccessLevel,
    pub created_at: String,
    pub updated_at: String,
    pub last_accessed_at: Option<String>,
    pub access_count: u64,
}

/// Singleton progress record for the plaintext migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationStatusRecord {
    pub status: MigrationState,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub total_count: u64,
    pub migrated_count: u64,
    pub failed_count: u64,
    pub last_processed_id: Option<String>,
    pub error_message: Option<String>,
}

/// A proxy as exposed to callers. Never carries secret material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proxy {
    pub id: String,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub protocol: ProxyProtocol,
    pub enabled: bool,
    pub credential_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A proxy together with its decrypted credentials.
///
/// Both secret fields are `None` when the proxy has no credential record or
/// when decryption failed.
#[derive(Debug)]
pub struct ProxyWithSecret {
    pub proxy: Proxy,
    pub username: Option<SecretString>,
    pub password: Option<SecretString>,
}

/// Input for creating a proxy.
#[derive(Debug)]
pub struct NewProxy {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub protocol: ProxyProtocol,
    pub enabled: bool,
    pub username: Option<SecretString>,
    pub password: Option<SecretString>,
}

/// Partial update of a proxy. `None` fields are left untouched.
#[derive(Debug, Default)]
pub struct ProxyUpdate {
    pub id: String,
    pub name: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub protocol: Option<ProxyProtocol>,
    pub enabled: Option<bool>,
    pub username: Option<SecretString>,
    pub password: Option<SecretString>,
}

impl ProxyUpdate {
    /// Whether this update carries a new secret.
    pub fn has_secret(&self) -> bool {
        self.username.is_some() || self.password.is_some()
    }
}

/// Typed filter for listing proxies. `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyFilter {
    pub protocol: Option<ProxyProtocol>,
    pub enabled: Option<bool>,
    pub has_credentials: Option<bool>,
}

/// First eight characters of an identifier, for log output.
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(8) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn credential_type_uses_snake_case() {
        assert_eq!(CredentialType::EntityAuth.to_string(), "entity_auth");
        assert_eq!(
            CredentialType::from_str("entity_auth").unwrap(),
            CredentialType::EntityAuth
        );
    }

    #[test]
    fn migration_state_round_trips_through_text() {
        for state in [
            MigrationState::Pending,
            MigrationState::InProgress,
            MigrationState::Completed,
            MigrationState::Failed,
        ] {
            assert_eq!(MigrationState::from_str(&state.to_string()).unwrap(), state);
        }
        assert_eq!(MigrationState::InProgress.to_string(), "in_progress");
    }

    #[test]
    fn protocol_parsing_is_case_insensitive() {
        assert_eq!(ProxyProtocol::from_str("SOCKS5").unwrap(), ProxyProtocol::Socks5);
        assert!(ProxyProtocol::from_str("ftp").is_err());
    }

    #[test]
    fn short_id_truncates_to_eight_chars() {
        assert_eq!(short_id("0123456789abcdef"), "01234567");
        assert_eq!(short_id("abc"), "abc");
    }
}
