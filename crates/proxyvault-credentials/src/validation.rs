// SPDX-FileCopyrightText: 2026 Proxyvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Input bounds checked before any I/O.
//!
//! Error messages name the offending field and the limit, never the value
//! of a secret.

use proxyvault_core::types::{NewProxy, ProxyProtocol, ProxyUpdate};
use proxyvault_core::ProxyVaultError;
use secrecy::{ExposeSecret, SecretString};

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_HOST_LEN: usize = 253;
pub const MAX_USERNAME_LEN: usize = 255;
pub const MAX_PASSWORD_LEN: usize = 1024;

fn invalid(message: impl Into<String>) -> ProxyVaultError {
    ProxyVaultError::Validation(message.into())
}

/// Identifiers are UUIDs; anything else never reaches a query.
pub fn validate_id(id: &str) -> Result<(), ProxyVaultError> {
    uuid::Uuid::parse_str(id)
        .map(|_| ())
        .map_err(|_| invalid("id must be a UUID"))
}

pub fn validate_name(name: &str) -> Result<(), ProxyVaultError> {
    let len = name.chars().count();
    if name.trim().is_empty() || len > MAX_NAME_LEN {
        return Err(invalid(format!(
            "name must be 1-{MAX_NAME_LEN} characters, got {len}"
        )));
    }
    Ok(())
}

pub fn validate_host(host: &str) -> Result<(), ProxyVaultError> {
    let len = host.chars().count();
    if host.is_empty() || len > MAX_HOST_LEN {
        return Err(invalid(format!(
            "host must be 1-{MAX_HOST_LEN} characters, got {len}"
        )));
    }
    if host.chars().any(char::is_whitespace) {
        return Err(invalid("host must not contain whitespace"));
    }
    Ok(())
}

pub fn validate_port(port: u16) -> Result<(), ProxyVaultError> {
    if port == 0 {
        return Err(invalid("port must be between 1 and 65535"));
    }
    Ok(())
}

fn validate_secret(
    field: &str,
    value: Option<&SecretString>,
    max: usize,
) -> Result<(), ProxyVaultError> {
    if let Some(value) = value
        && value.expose_secret().len() > max
    {
        return Err(invalid(format!("{field} must be at most {max} bytes")));
    }
    Ok(())
}

/// Parse user-supplied protocol text.
pub fn parse_protocol(text: &str) -> Result<ProxyProtocol, ProxyVaultError> {
    text.trim()
        .parse()
        .map_err(|_| invalid(format!("unknown protocol `{text}`, expected http, https, socks4, or socks5")))
}

pub fn validate_new_proxy(proxy: &NewProxy) -> Result<(), ProxyVaultError> {
    validate_name(&proxy.name)?;
    validate_host(&proxy.host)?;
    validate_port(proxy.port)?;
    validate_secret("username", proxy.username.as_ref(), MAX_USERNAME_LEN)?;
    validate_secret("password", proxy.password.as_ref(), MAX_PASSWORD_LEN)?;
    Ok(())
}

pub fn validate_update(update: &ProxyUpdate) -> Result<(), ProxyVaultError> {
    validate_id(&update.id)?;
    if let Some(name) = &update.name {
        validate_name(name)?;
    }
    if let Some(host) = &update.host {
        validate_host(host)?;
    }
    if let Some(port) = update.port {
        validate_port(port)?;
    }
    validate_secret("username", update.username.as_ref(), MAX_USERNAME_LEN)?;
    validate_secret("password", update.password.as_ref(), MAX_PASSWORD_LEN)?;
    Ok(())
}
