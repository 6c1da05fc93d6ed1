// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `storefront-session` command-line client.

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::config::SessionConfig;
use crate::coordinator::RefreshCoordinator;
use crate::session::AuthState;
use crate::store::{CredentialStore, EncryptedFileStore};
use crate::ApiClient;

#[derive(Debug, Parser)]
#[command(name = "storefront-session", version, about = "Storefront session client")]
pub struct Cli {
    #[command(flatten)]
    pub config: SessionConfig,

    /// Log format (json or text).
    #[arg(long, env = "STOREFRONT_LOG_FORMAT", default_value = "text", global = true)]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    #[arg(long, env = "STOREFRONT_LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sign in and store the credentials.
    Login {
        #[arg(long, env = "STOREFRONT_EMAIL")]
        email: String,
        #[arg(long, env = "STOREFRONT_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Sign out and delete the stored credentials.
    Logout,
    /// Restore the stored session and print it.
    Status,
    /// Force an access-token refresh.
    Refresh,
    /// Authenticated GET against the API, printing the response body.
    Get {
        /// Path relative to the API base URL, e.g. `/orders/`.
        path: String,
    },
    /// Keep the session fresh and log its events until interrupted.
    Watch,
    /// Print a new random store key (base64).
    Keygen,
}

/// Install the global subscriber. Logs go to stderr; stdout carries command output.
pub fn init_tracing(cli: &Cli) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    match cli.log_format.as_str() {
        "json" => fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).json().init(),
        _ => fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).init(),
    }
}

/// Open the encrypted credential store named by `config`.
pub fn open_store(config: &SessionConfig) -> anyhow::Result<EncryptedFileStore> {
    let key = config
        .store_key
        .as_deref()
        .context("a store key is required (--store-key or STOREFRONT_STORE_KEY)")?;
    let path = config.store_path();
    EncryptedFileStore::with_base64_key(&path, key)
        .with_context(|| format!("opening credential store {}", path.display()))
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Command::Keygen = cli.command {
        println!("{}", EncryptedFileStore::generate_key()?);
        return Ok(());
    }

    let store: Arc<dyn CredentialStore> = Arc::new(open_store(&cli.config)?);
    let coordinator = RefreshCoordinator::new(&cli.config, store);

    let result = match cli.command {
        Command::Login { email, password } => {
            let session = coordinator.login_with_password(&email, &password).await?;
            if session.must_change_password {
                warn!("password change required");
            }
            print_json(&session)
        }
        Command::Logout => {
            coordinator.restore().await;
            coordinator.logout(false).await?;
            info!("logged out");
            Ok(())
        }
        Command::Status => {
            let state = coordinator.restore().await;
            print_json(&serde_json::json!({ "state": state, "session": coordinator.current() }))
        }
        Command::Refresh => {
            require_session(&coordinator).await?;
            if !coordinator.refresh_access_token().await {
                anyhow::bail!("refresh failed");
            }
            print_json(&coordinator.current())
        }
        Command::Get { path } => {
            require_session(&coordinator).await?;
            let client = ApiClient::new(&cli.config);
            coordinator.attach(&client);
            let resp = client.get(&path).await?;
            println!("{}", resp.text());
            Ok(())
        }
        Command::Watch => watch(&coordinator).await,
        Command::Keygen => Ok(()),
    };

    coordinator.shutdown();
    result
}

async fn require_session(coordinator: &Arc<RefreshCoordinator>) -> anyhow::Result<()> {
    match coordinator.restore().await {
        AuthState::Authenticated => Ok(()),
        _ => anyhow::bail!("not logged in"),
    }
}

async fn watch(coordinator: &Arc<RefreshCoordinator>) -> anyhow::Result<()> {
    let mut events = coordinator.subscribe();
    require_session(coordinator).await?;
    info!("watching session, Ctrl-C to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(event) => {
                    print_json(&event)?;
                    if matches!(event, crate::SessionEvent::Ended { .. }) {
                        break;
                    }
                }
                Err(RecvError::Lagged(n)) => warn!(skipped = n, "session events lagged"),
                Err(RecvError::Closed) => break,
            },
        }
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
