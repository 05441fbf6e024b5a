// SPDX-FileCopyrightText: 2026 Proxyvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `proxyvault proxy` subcommands.
//!
//! Secrets are read from flags or an interactive prompt and passed straight
//! to the repository; they are printed only by `show --reveal`.

use clap::Subcommand;
use proxyvault_core::types::{NewProxy, Proxy, ProxyFilter, ProxyProtocol, ProxyUpdate};
use proxyvault_core::ProxyVaultError;
use proxyvault_credentials::validation::parse_protocol;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use crate::context::AppContext;

#[derive(Subcommand, Debug)]
pub enum ProxyCommand {
    /// Add a proxy.
    Add {
        /// Unique display name.
        name: String,
        #[arg(long)]
        host: String,
        #[arg(long)]
        port: u16,
        /// http, https, socks4, or socks5.
        #[arg(long, default_value = "http", value_parser = protocol_arg)]
        protocol: ProxyProtocol,
        #[arg(long)]
        username: Option<String>,
        /// Password on the command line. Visible in the process list; prefer
        /// `--password-prompt`.
        #[arg(long, conflicts_with = "password_prompt")]
        password: Option<String>,
        /// Read the password from the terminal.
        #[arg(long)]
        password_prompt: bool,
        /// Create the proxy disabled.
        #[arg(long)]
        disabled: bool,
    },
    /// List proxies.
    List {
        #[arg(long, value_parser = protocol_arg)]
        protocol: Option<ProxyProtocol>,
        /// Only enabled (`true`) or disabled (`false`) proxies.
        #[arg(long)]
        enabled: Option<bool>,
        /// Only proxies with (`true`) or without (`false`) credentials.
        #[arg(long)]
        with_credentials: Option<bool>,
        #[arg(long)]
        json: bool,
    },
    /// Show one proxy.
    Show {
        id: String,
        /// Print the decrypted username and password.
        #[arg(long)]
        reveal: bool,
        #[arg(long)]
        json: bool,
    },
    /// Update a proxy. Only the given fields change.
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        #[arg(long, value_parser = protocol_arg)]
        protocol: Option<ProxyProtocol>,
        #[arg(long)]
        enabled: Option<bool>,
        #[arg(long)]
        username: Option<String>,
        #[arg(long, conflicts_with = "password_prompt")]
        password: Option<String>,
        #[arg(long)]
        password_prompt: bool,
    },
    /// Delete a proxy and its credentials.
    Delete { id: String },
}

fn protocol_arg(s: &str) -> Result<ProxyProtocol, String> {
    parse_protocol(s).map_err(|e| e.to_string())
}

/// Caller-facing view used by `show`.
#[derive(Debug, Serialize)]
struct ProxyView<'a> {
    #[serde(flatten)]
    proxy: &'a Proxy,
    has_secret: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
}

pub async fn run_proxy(ctx: &AppContext, command: ProxyCommand) -> Result<(), ProxyVaultError> {
    match command {
        ProxyCommand::Add {
            name,
            host,
            port,
            protocol,
            username,
            password,
            password_prompt,
            disabled,
        } => {
            let password = read_password(password, password_prompt)?;
            let proxy = ctx
                .repo
                .add_proxy_with_secret(NewProxy {
                    name,
                    host,
                    port,
                    protocol,
                    enabled: !disabled,
                    username: username.map(SecretString::from),
                    password,
                })
                .await?;
            println!("{}", proxy.id);
        }
        ProxyCommand::List {
            protocol,
            enabled,
            with_credentials,
            json,
        } => {
            let proxies = ctx
                .repo
                .find_all(ProxyFilter {
                    protocol,
                    enabled,
                    has_credentials: with_credentials,
                })
                .await?;
            if json {
                print_json(&proxies);
            } else {
                print_table(&proxies);
            }
        }
        ProxyCommand::Show { id, reveal, json } => {
            let found = ctx
                .repo
                .get_proxy_with_decrypted_secret(&id)
                .await?
                .ok_or_else(|| ProxyVaultError::NotFound {
                    entity: "proxy",
                    id: id.clone(),
                })?;
            let has_secret = found.username.is_some() || found.password.is_some();
            let view = ProxyView {
                proxy: &found.proxy,
                has_secret,
                username: reveal
                    .then(|| found.username.as_ref().map(|u| u.expose_secret()))
                    .flatten(),
                password: reveal
                    .then(|| found.password.as_ref().map(|p| p.expose_secret()))
                    .flatten(),
            };
            if json {
                print_json(&view);
            } else {
                print_view(&view);
            }
        }
        ProxyCommand::Update {
            id,
            name,
            host,
            port,
            protocol,
            enabled,
            username,
            password,
            password_prompt,
        } => {
            let password = read_password(password, password_prompt)?;
            let proxy = ctx
                .repo
                .update_proxy(ProxyUpdate {
                    id,
                    name,
                    host,
                    port,
                    protocol,
                    enabled,
                    username: username.map(SecretString::from),
                    password,
                })
                .await?;
            println!("updated {}", proxy.id);
        }
        ProxyCommand::Delete { id } => {
            if !ctx.repo.delete_proxy(&id).await? {
                return Err(ProxyVaultError::NotFound { entity: "proxy", id });
            }
            println!("deleted {id}");
        }
    }
    Ok(())
}

fn read_password(
    flag: Option<String>,
    prompt: bool,
) -> Result<Option<SecretString>, ProxyVaultError> {
    if prompt {
        let password = rpassword::prompt_password("Proxy password: ")
            .map_err(|e| ProxyVaultError::Internal(format!("failed to read password: {e}")))?;
        return Ok(Some(SecretString::from(password)));
    }
    Ok(flag.map(SecretString::from))
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn print_table(proxies: &[Proxy]) {
    if proxies.is_empty() {
        println!("no proxies");
        return;
    }
    println!(
        "{:<36}  {:<20}  {:<8}  {:<28}  {:<7}  CREDENTIALS",
        "ID", "NAME", "PROTOCOL", "ADDRESS", "ENABLED"
    );
    for p in proxies {
        println!(
            "{:<36}  {:<20}  {:<8}  {:<28}  {:<7}  {}",
            p.id,
            p.name,
            p.protocol,
            format!("{}:{}", p.host, p.port),
            if p.enabled { "yes" } else { "no" },
            if p.credential_id.is_some() { "yes" } else { "no" },
        );
    }
}

fn print_view(view: &ProxyView<'_>) {
    let p = view.proxy;
    println!();
    println!("  {}", p.name);
    println!("  {}", "-".repeat(35));
    println!("    Id:          {}", p.id);
    println!("    Address:     {}://{}:{}", p.protocol, p.host, p.port);
    println!("    Enabled:     {}", p.enabled);
    println!("    Credentials: {}", if view.has_secret { "set" } else { "none" });
    if let Some(username) = view.username {
        println!("    Username:    {username}");
    }
    if let Some(password) = view.password {
        println!("    Password:    {password}");
    }
    println!("    Updated:     {}", p.updated_at);
    println!();
}
