// SPDX-FileCopyrightText: 2026 Proxyvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Proxyvault - encrypted proxy credential storage.
//!
//! This is the binary entry point for the `proxyvault` CLI.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod context;
mod doctor;
mod migrate;
mod proxy;
mod rotate;
mod status;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use proxyvault_config::ProxyVaultConfig;
use proxyvault_core::ProxyVaultError;
use proxyvault_credentials::run_startup_migration;
use tracing::warn;

use crate::context::AppContext;

/// Proxyvault - encrypted proxy credential storage.
#[derive(Parser, Debug)]
#[command(name = "proxyvault", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage proxies and their credentials.
    Proxy {
        #[command(subcommand)]
        action: proxy::ProxyCommand,
    },
    /// Encrypt every legacy plaintext credential now.
    Migrate {
        /// Output the report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Check that no plaintext remains and every credential decrypts.
    Verify {
        /// Output the report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Show the last recorded migration status.
    MigrationStatus {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
        /// Disable colors.
        #[arg(long)]
        plain: bool,
    },
    /// Re-encrypt all credentials under a new master passphrase.
    RotateKey,
    /// Run diagnostic checks.
    Doctor {
        /// Also run the slower integrity and memory checks.
        #[arg(long)]
        deep: bool,
        /// Disable colors.
        #[arg(long)]
        plain: bool,
    },
}

impl Commands {
    /// Whether the leftover-plaintext migration should run before the command.
    fn wants_startup_migration(&self) -> bool {
        matches!(self, Commands::Proxy { .. } | Commands::RotateKey)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match proxyvault_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            proxyvault_config::render_errors(&errors);
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config.logging.level);

    match run(cli.command, config).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Dispatch a command. `Ok(false)` means it ran but found problems.
async fn run(command: Commands, config: ProxyVaultConfig) -> Result<bool, ProxyVaultError> {
    if let Commands::Doctor { deep, plain } = command {
        doctor::run_doctor(&config, deep, plain).await?;
        return Ok(true);
    }

    let ctx = AppContext::open(config).await?;

    if command.wants_startup_migration()
        && let Err(e) = run_startup_migration(&ctx.coordinator, &ctx.config.migration).await
    {
        warn!(error = %e, "startup migration failed");
    }

    let outcome = match command {
        Commands::Proxy { action } => proxy::run_proxy(&ctx, action).await.map(|()| true),
        Commands::Migrate { json } => migrate::run_migrate(&ctx, json).await,
        Commands::Verify { json } => migrate::run_verify(&ctx, json).await,
        Commands::MigrationStatus { json, plain } => {
            status::run_migration_status(&ctx, json, plain).await.map(|()| true)
        }
        Commands::RotateKey => rotate::run_rotate_key(&ctx).await,
        Commands::Doctor { .. } => Ok(true),
    };

    ctx.close().await?;
    outcome
}

/// Install the fmt subscriber. `RUST_LOG` wins over `[logging] level`.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("proxyvault={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}
