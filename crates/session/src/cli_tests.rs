// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::MockBackend;

fn parse(args: &[&str]) -> Cli {
    let argv = std::iter::once("storefront-session").chain(args.iter().copied());
    Cli::try_parse_from(argv).unwrap_or_else(|e| panic!("parse failed: {e}"))
}

#[test]
fn parses_login() {
    let cli = parse(&["login", "--email", "ada@shop.test", "--password", "pw"]);
    match cli.command {
        Command::Login { email, password } => {
            assert_eq!(email, "ada@shop.test");
            assert_eq!(password, "pw");
        }
        other => panic!("unexpected command {other:?}"),
    }
}

#[test]
fn parses_global_config_flags() {
    let cli = parse(&["--api-url", "http://shop.test/api", "--refresh-buffer-ms", "1000", "status"]);
    assert_eq!(cli.config.api_url, "http://shop.test/api");
    assert_eq!(cli.config.refresh_buffer_ms, 1000);
    assert!(matches!(cli.command, Command::Status));
}

#[test]
fn parses_get_path() {
    let cli = parse(&["get", "/orders/"]);
    assert!(matches!(cli.command, Command::Get { ref path } if path == "/orders/"));
}

#[test]
fn log_flags_follow_subcommand() {
    let cli = parse(&["status", "--log-format", "json"]);
    assert_eq!(cli.log_format, "json");
    assert_eq!(cli.log_level, "info");
}

fn cli(config: &SessionConfig, command: Command) -> Cli {
    Cli { config: config.clone(), log_format: "text".into(), log_level: "info".into(), command }
}

#[test]
fn store_requires_key() {
    let mut config = SessionConfig::new("http://shop.test/api");
    config.store_key = None;
    let err = open_store(&config).err().map(|e| e.to_string()).unwrap_or_default();
    assert!(err.contains("store key is required"), "{err}");
}

#[tokio::test]
async fn login_then_status_through_encrypted_store() -> anyhow::Result<()> {
    let backend = MockBackend::start().await;
    let dir = tempfile::tempdir()?;
    let mut config = backend.config();
    config.store_path = Some(dir.path().join("credentials.bin"));
    config.store_key = Some(EncryptedFileStore::generate_key()?);

    run(cli(&config, Command::Login { email: "ada@shop.test".into(), password: "secret".into() }))
        .await?;
    assert!(dir.path().join("credentials.bin").exists());

    let store: Arc<dyn CredentialStore> = Arc::new(open_store(&config)?);
    let coordinator = RefreshCoordinator::new(&config, store);
    assert_eq!(coordinator.restore().await, AuthState::Authenticated);
    assert_eq!(coordinator.current().map(|s| s.email), Some("ada@shop.test".into()));
    coordinator.shutdown();

    run(cli(&config, Command::Logout)).await?;
    let err = run(cli(&config, Command::Refresh)).await;
    assert!(err.is_err());
    Ok(())
}
