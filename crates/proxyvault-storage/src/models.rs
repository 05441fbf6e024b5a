// SPDX-FileCopyrightText: 2026 Proxyvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Raw row types for tables whose shape differs from the domain types.
//!
//! `CredentialRecord` and `MigrationStatusRecord` from `proxyvault-core` map
//! one-to-one onto their tables and are used directly by the query modules.

/// A `proxies` row exactly as stored, legacy plaintext columns included.
///
/// Never hand this to callers outside the credential crate; convert it to a
/// `proxyvault_core::types::Proxy` first.
#[derive(Clone, PartialEq, Eq)]
pub struct ProxyRow {
    pub id: String,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub protocol: String,
    pub enabled: bool,
    /// Legacy plaintext username.
    pub username: Option<String>,
    /// Legacy plaintext password.
    pub password: Option<String>,
    pub credential_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl ProxyRow {
    /// True when either legacy column holds a non-empty value.
    pub fn has_plaintext(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
        present(&self.username) || present(&self.password)
    }
}

impl std::fmt::Debug for ProxyRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("ProxyRow")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("protocol", &self.protocol)
            .field("enabled", &self.enabled)
            .field("username", &redact(&self.username))
            .field("password", &redact(&self.password))
            .field("credential_id", &self.credential_id)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// The singleton `key_meta` row: how to re-derive the master key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMetaRow {
    pub kdf_salt: Vec<u8>,
    /// JSON-encoded KDF parameters.
    pub kdf_params: String,
    pub key_id: String,
    pub created_at: String,
    pub rotated_at: Option<String>,
}
