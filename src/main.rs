// Copyright (c) 2025 Veilmsg
// SPDX-License-Identifier: BUSL-1.1
use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::json;
use veilmsg_node::{
    config::AppConfig,
    crypto::{CodecConfig, FileKeyStore, KeyBundle, KeyVault, MessageCodec},
    node::{LoopbackTransport, NodeSession},
    tor::{HttpRpcDispatcher, TcpSocksProbe, TorConnectivityManager},
    utils::OsRandom,
};

#[derive(Parser)]
#[command(name = "veilmsg-node", about = "Privacy-preserving message transport node")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "./veilmsg.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a full key bundle and persist it under a logical name.
    Keygen {
        #[arg(long)]
        name: String,
    },
    /// Probe the configured Tor proxy and report connectivity.
    Probe,
    /// Make one private RPC call through the proxy.
    Call {
        #[arg(long)]
        endpoint: String,
        #[arg(long)]
        method: String,
    },
    /// Round-trip a message over the in-process loopback transport.
    Demo {
        #[arg(long, default_value = "hello over veilmsg")]
        message: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = AppConfig::from_toml_file(&cli.config).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "falling back to default configuration");
        AppConfig::default()
    });

    match cli.command {
        Command::Keygen { name } => {
            let vault = KeyVault::new(FileKeyStore::new(&config.key_store_path));
            let bundle = KeyBundle::generate_full(&OsRandom)?;
            vault.save(&name, &bundle)?;
            println!("🔑 Key bundle '{}' saved to {}", name, config.key_store_path);
        }
        Command::Probe => {
            let manager = build_manager(&config).await;
            manager.initialize().await?;
            println!("✅ Tor proxy reachable and SOCKS path verified");
        }
        Command::Call { endpoint, method } => {
            let manager = build_manager(&config).await;
            manager.initialize().await?;
            let result = manager
                .make_private_call(&endpoint, &method, json!([]))
                .await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Demo { message } => {
            run_demo(&config, &message).await?;
        }
    }
    Ok(())
}

async fn build_manager(config: &AppConfig) -> TorConnectivityManager {
    let manager = TorConnectivityManager::new(
        config.proxy.clone(),
        config.probe_timeout(),
        Arc::new(TcpSocksProbe::new(&config.check_url)),
        Arc::new(HttpRpcDispatcher::new()),
        Arc::new(OsRandom),
    );
    for endpoint in &config.endpoints {
        manager
            .register_endpoint(&endpoint.name, &endpoint.url, endpoint.timeout())
            .await;
    }
    manager
}

async fn run_demo(config: &AppConfig, message: &str) -> Result<()> {
    let rng = Arc::new(OsRandom);
    let key = veilmsg_node::crypto::generate_symmetric(rng.as_ref());

    let codec = MessageCodec::new(
        CodecConfig::symmetric(&config.topic, key.clone()),
        rng.clone(),
    )?;
    let encoder = MessageCodec::new(CodecConfig::symmetric(&config.topic, key), rng)?;

    let transport = LoopbackTransport::new();
    let session = NodeSession::new(transport, codec, None);

    let (tx, mut rx) = tokio::sync::mpsc::channel(1);
    session
        .set_observer(Box::new(move |decoded| {
            let _ = tx.try_send(decoded);
        }))
        .await;

    session.start().await?;
    session.publish(&encoder, message.as_bytes()).await?;

    let received = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await?
        .expect("observer delivered no message");
    println!("📨 Received: {}", String::from_utf8_lossy(&received.payload));

    session.shutdown().await?;
    Ok(())
}
