// SPDX-FileCopyrightText: 2026 Proxyvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `proxyvault rotate-key`.

use proxyvault_core::ProxyVaultError;
use proxyvault_credentials::rotate_passphrase;
use proxyvault_crypto::{get_new_master_passphrase, KdfParams};

use crate::context::AppContext;

/// Re-key every credential under a new passphrase.
///
/// Returns `false` when some records could not be decrypted with the current
/// key; those keep their old ciphertext.
pub async fn run_rotate_key(ctx: &AppContext) -> Result<bool, ProxyVaultError> {
    let new_passphrase = get_new_master_passphrase()?;
    let params = KdfParams::from(&ctx.config.vault);
    let report = rotate_passphrase(&ctx.db, &ctx.engine, &new_passphrase, &params).await?;

    println!();
    println!("  master key rotated");
    println!("  {}", "-".repeat(35));
    println!("    New key id: {}", report.new_key_id);
    println!("    Rotated:    {}", report.rotated.len());
    println!("    Skipped:    {} (other key)", report.skipped.len());
    println!("    Failed:     {}", report.failed.len());
    println!();
    if !report.failed.is_empty() {
        println!("  Records that failed stay under the old key and can no longer be read.");
        println!();
    }
    Ok(report.failed.is_empty())
}
