// SPDX-FileCopyrightText: 2026 Proxyvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Passphrase acquisition via TTY prompt or environment variable.

use proxyvault_core::ProxyVaultError;
use secrecy::SecretString;

/// Environment variable holding the master passphrase.
pub const MASTER_KEY_ENV_VAR: &str = "PROXYVAULT_MASTER_KEY";

/// Environment variable holding the replacement passphrase for `rotate-key`.
pub const NEW_MASTER_KEY_ENV_VAR: &str = "PROXYVAULT_NEW_MASTER_KEY";

fn from_env(var: &str) -> Option<SecretString> {
    match std::env::var(var) {
        Ok(value) if !value.is_empty() => Some(SecretString::from(value)),
        _ => None,
    }
}

fn read_password(prompt: &str) -> Result<String, ProxyVaultError> {
    eprint!("{prompt}");
    rpassword::read_password()
        .map_err(|e| ProxyVaultError::Config(format!("failed to read passphrase: {e}")))
}

fn stdin_is_terminal() -> bool {
    std::io::IsTerminal::is_terminal(&std::io::stdin())
}

/// Get the master passphrase.
///
/// Priority:
/// 1. `PROXYVAULT_MASTER_KEY` environment variable (headless/systemd)
/// 2. Interactive TTY prompt via `rpassword`
///
/// Returns an error if neither source is available.
pub fn get_master_passphrase() -> Result<SecretString, ProxyVaultError> {
    if let Some(passphrase) = from_env(MASTER_KEY_ENV_VAR) {
        return Ok(passphrase);
    }

    if stdin_is_terminal() {
        let passphrase = read_password("Master passphrase: ")?;
        if passphrase.is_empty() {
            return Err(ProxyVaultError::Config(
                "empty passphrase not allowed".to_string(),
            ));
        }
        return Ok(SecretString::from(passphrase));
    }

    Err(ProxyVaultError::Config(format!(
        "no passphrase provided. Set {MASTER_KEY_ENV_VAR} or run interactively."
    )))
}

/// Get a replacement passphrase, confirming it when prompted interactively.
pub fn get_new_master_passphrase() -> Result<SecretString, ProxyVaultError> {
    if let Some(passphrase) = from_env(NEW_MASTER_KEY_ENV_VAR) {
        return Ok(passphrase);
    }

    if stdin_is_terminal() {
        let first = read_password("New master passphrase: ")?;
        let second = read_password("Confirm new master passphrase: ")?;
        if first != second {
            return Err(ProxyVaultError::Config(
                "passphrases do not match".to_string(),
            ));
        }
        if first.is_empty() {
            return Err(ProxyVaultError::Config(
                "empty passphrase not allowed".to_string(),
            ));
        }
        return Ok(SecretString::from(first));
    }

    Err(ProxyVaultError::Config(format!(
        "no new passphrase provided. Set {NEW_MASTER_KEY_ENV_VAR} or run interactively."
    )))
}
