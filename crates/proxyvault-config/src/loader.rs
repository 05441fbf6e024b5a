// SPDX-FileCopyrightText: 2026 Proxyvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Later layers override earlier ones:
//! 1. Compiled defaults
//! 2. `/etc/proxyvault/proxyvault.toml`
//! 3. `~/.config/proxyvault/proxyvault.toml`
//! 4. `./proxyvault.toml`
//! 5. `PROXYVAULT_*` environment variables

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::ProxyVaultConfig;

/// Config file name looked up in every layer.
pub const CONFIG_FILE_NAME: &str = "proxyvault.toml";

/// System-wide config file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/proxyvault/proxyvault.toml";

/// Config file paths in merge order (lowest precedence first).
pub fn config_file_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(SYSTEM_CONFIG_PATH)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("proxyvault").join(CONFIG_FILE_NAME));
    }
    paths.push(PathBuf::from(CONFIG_FILE_NAME));
    paths
}

/// Build the layered Figment (exposed for diagnostics).
pub fn build_figment() -> Figment {
    let mut figment = Figment::new().merge(Serialized::defaults(ProxyVaultConfig::default()));
    for path in config_file_paths() {
        figment = figment.merge(Toml::file(path));
    }
    figment.merge(env_provider())
}

/// Load configuration from the standard hierarchy with env var overrides.
pub fn load_config() -> Result<ProxyVaultConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from an inline TOML string (no files, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<ProxyVaultConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ProxyVaultConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from one explicit file with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<ProxyVaultConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ProxyVaultConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Environment provider mapping `PROXYVAULT_<SECTION>_<KEY>` to `section.key`.
///
/// Uses `Env::map()` rather than `Env::split("_")` because keys contain
/// underscores: `PROXYVAULT_STORAGE_BUSY_TIMEOUT_MS` must become
/// `storage.busy_timeout_ms`. The passphrase variables `PROXYVAULT_MASTER_KEY`
/// and `PROXYVAULT_NEW_MASTER_KEY` are excluded.
fn env_provider() -> Env {
    Env::prefixed("PROXYVAULT_")
        .ignore(&["master_key", "new_master_key"])
        .map(|key| map_env_key(key.as_str()).into())
}

pub(crate) fn map_env_key(key: &str) -> String {
    for section in ["storage", "vault", "migration", "logging"] {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
