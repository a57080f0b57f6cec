//! Daemon status example
//!
//! Connects to the local node's daemon using the credentials from its
//! `config.yaml`, registers, and prints what the daemon is running.
//!
//! Run with: cargo run --example daemon_status
//!
//! Requires: a running node (`$CHIA_ROOT` or `~/.chia/mainnet`)

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use chia_rpc::{protocol::service_names, DaemonProxy, NodeConfig, RpcClient, RpcConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let node = NodeConfig::load_default()?;
    let endpoint = node.endpoint(service_names::DAEMON)?;
    println!("connecting to {endpoint}");

    let client = RpcClient::connect(&endpoint, RpcConfig::new("daemon-status")).await?;
    let daemon = DaemonProxy::new(client.handle());

    // ---
    println!("version:  {}", daemon.get_version().await?);
    println!("status:   {:?}", daemon.get_status().await?);

    for service in daemon.running_services().await? {
        println!("running:  {service}");
    }

    let farming = daemon.is_running(service_names::FARMER).await?;
    println!("farmer is {}", if farming { "up" } else { "down" });

    client.close().await?;
    Ok(())
}
