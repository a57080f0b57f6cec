//! Farmer events example
//!
//! Registers with the daemon and prints the farmer's signage point and
//! farming info events as they arrive. Stops on Ctrl-C or when the daemon
//! goes away.
//!
//! Run with: cargo run --example farmer_events
//!
//! Requires: a running node with the farmer started

use std::time::Duration;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use chia_rpc::{protocol::service_names, FarmerProxy, NodeConfig, RpcClient, RpcConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let endpoint = NodeConfig::load_default()?.endpoint(service_names::DAEMON)?;
    let client = RpcClient::connect(&endpoint, RpcConfig::new("farmer-events")).await?;

    let farmer = FarmerProxy::new(client.handle());

    farmer.on_new_signage_point(|event| {
        let sp = &event.signage_point;
        println!(
            "signage point {:>2}  difficulty {}  challenge {}",
            sp.signage_point_index, sp.difficulty, sp.challenge_hash
        );
    })?;

    farmer.on_new_farming_info(|event| {
        let info = &event.farming_info;
        println!(
            "farming info      {}/{} plots passed filter, {} proofs",
            info.passed_filter, info.total_plots, info.proofs
        );
    })?;

    let targets = farmer.get_reward_targets(false, None).await?;
    println!("farmer target {}", targets.farmer_target);
    println!("pool target   {}", targets.pool_target);

    // ---
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = tokio::time::sleep(Duration::from_secs(1)) => {
                if client.is_closed() {
                    println!("daemon closed the connection");
                    break;
                }
            }
        }
    }

    client.close().await?;
    Ok(())
}
