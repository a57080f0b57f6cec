#![allow(dead_code)]

use std::sync::Once;
use std::time::Duration;

use chia_rpc::{
    //
    create_memory_transport,
    MemoryPeer,
    Message,
    RpcClient,
    RpcConfig,
};
use tracing_subscriber::EnvFilter;

/// Install a test subscriber once per test binary. `RUST_LOG` selects levels.
pub fn init_logging() {
    // ---
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Client over an in-memory link, plus the daemon side of that link.
pub fn memory_client(transport_id: &str) -> (RpcClient, MemoryPeer) {
    memory_client_with(RpcConfig::new(transport_id))
}

pub fn memory_client_with(config: RpcConfig) -> (RpcClient, MemoryPeer) {
    // ---
    init_logging();

    let (transport, peer) = create_memory_transport(config.transport_id.clone());
    let client = RpcClient::with_transport(transport, config).expect("fresh transport");
    (client, peer)
}

/// Next request the client sent, failing the test if none arrives.
pub async fn expect_request(peer: &mut MemoryPeer) -> Message {
    // ---
    tokio::time::timeout(Duration::from_secs(5), peer.next_message())
        .await
        .expect("timed out waiting for a request")
        .expect("link closed while waiting for a request")
}
