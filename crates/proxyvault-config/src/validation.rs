// SPDX-FileCopyrightText: 2026 Proxyvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use crate::diagnostic::ConfigError;
use crate::model::ProxyVaultConfig;

/// Lowest Argon2id memory cost accepted outside of tests (32 MiB).
pub const MIN_KDF_MEMORY_COST: u32 = 32768;

/// Lowest Argon2id iteration count accepted.
pub const MIN_KDF_ITERATIONS: u32 = 2;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration, collecting every error.
pub fn validate_config(config: &ProxyVaultConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    if config.storage.busy_timeout_ms == 0 {
        fail("storage.busy_timeout_ms must be greater than 0".to_string());
    }

    if config.vault.kdf_memory_cost < MIN_KDF_MEMORY_COST {
        fail(format!(
            "vault.kdf_memory_cost must be at least {MIN_KDF_MEMORY_COST} (32 MiB), got {}",
            config.vault.kdf_memory_cost
        ));
    }

    if config.vault.kdf_iterations < MIN_KDF_ITERATIONS {
        fail(format!(
            "vault.kdf_iterations must be at least {MIN_KDF_ITERATIONS}, got {}",
            config.vault.kdf_iterations
        ));
    }

    if config.vault.kdf_parallelism < 1 {
        fail(format!(
            "vault.kdf_parallelism must be at least 1, got {}",
            config.vault.kdf_parallelism
        ));
    }

    let level = config.logging.level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        fail(format!(
            "logging.level `{}` is not one of {}",
            config.logging.level,
            LOG_LEVELS.join(", ")
        ));
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
