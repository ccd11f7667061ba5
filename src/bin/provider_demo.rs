// src/bin/provider_demo.rs
//! Signing provider demo
//! Attaches a mock device to the registry and runs `getAccounts` / `signTransaction`
//! through the same pipeline a real transport would use.
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;
use trezor_provider::core::config::ProviderConfig;
use trezor_provider::core::logging::{init_logging, DEFAULT_DIRECTIVE};
use trezor_provider::hardware::{DeviceInfo, MockDevice, TransportEvent};
use trezor_provider::provider::{parse_tx_params, SigningProvider};
use trezor_provider::session::DeviceRegistry;

#[derive(Parser)]
#[command(name = "provider_demo")]
#[command(about = "Hardware wallet signing provider demo (mock device)")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// Provider config (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the account at the configured derivation path
    Accounts,
    /// Sign a legacy transaction given as a JSON txParams file
    Sign {
        /// Path to the txParams JSON
        tx: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(DEFAULT_DIRECTIVE)?;

    let config = match &args.config {
        Some(path) => ProviderConfig::load(path)?,
        None => ProviderConfig::default(),
    };

    let registry = Arc::new(DeviceRegistry::new());
    let provider = SigningProvider::from_config(&config, Arc::clone(&registry))?;

    // 传输层事件流：这里由 mock 设备充当
    let (events, rx) = mpsc::channel(8);
    let mut changes = registry.subscribe();
    let pump = tokio::spawn(Arc::clone(&registry).pump(rx));
    events
        .send(TransportEvent::Attached {
            info: DeviceInfo::new("mock-0001", "Mock Trezor"),
            transport: Arc::new(MockDevice::new()),
        })
        .await
        .context("transport event stream closed")?;
    // fail-fast 策略下必须等 pump 应用连接事件后再发请求
    changes.changed().await.context("device registry dropped")?;

    match args.command {
        Commands::Accounts => {
            let accounts = provider.get_accounts().await?;
            for account in accounts {
                println!("{}", account);
            }
        }
        Commands::Sign { tx } => {
            let content = std::fs::read_to_string(&tx).with_context(|| format!("reading {}", tx.display()))?;
            let params: serde_json::Value = serde_json::from_str(&content)?;
            let request = parse_tx_params(params)?;
            let raw = provider.sign_transaction(&request).await?;
            println!("{}", raw);
        }
    }

    drop(events);
    pump.await?;
    info!("done");
    Ok(())
}
