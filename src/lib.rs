//! Correlated RPC and push events over the Chia daemon websocket
//!
//! This library opens one mutually-authenticated `wss` channel to a node's
//! daemon, registers a logical service name, and multiplexes any number of
//! concurrent requests over it. Responses are matched to requests by
//! correlation ID; everything else the daemon pushes is fanned out to event
//! handlers keyed by originating service and event name.
//!
//! ```no_run
//! use chia_rpc::{DaemonProxy, NodeConfig, RpcClient, RpcConfig};
//!
//! # async fn example() -> chia_rpc::Result<()> {
//! let endpoint = NodeConfig::load_default()?.endpoint("daemon")?;
//! let client = RpcClient::connect(&endpoint, RpcConfig::default()).await?;
//!
//! let daemon = DaemonProxy::new(client.handle());
//! println!("running: {:?}", daemon.running_services().await?);
//!
//! client.close().await?;
//! # Ok(())
//! # }
//! ```

#[macro_use]
mod macros;

// Import all sub modules once...
mod client;
mod domain;
mod sync;
mod transport;

mod correlation;
mod endpoint;
mod error;
mod events;
mod handshake;
mod node_config;
mod proxy;
mod rpc_config;

pub mod protocol;

// Re-export main types
pub use client::{ClientHandle, RpcClient};

pub use rpc_config::{RpcConfig, DEFAULT_MAX_MESSAGE_SIZE};

pub use correlation::{CorrelationId, CorrelationIdGenerator};
pub use endpoint::{Endpoint, Scheme};
pub use error::{ConnectError, RegistrationError, Result, RpcError};
pub use events::{Event, EventDispatcher, EventHandler, SubscriptionHandle, SubscriptionId};
pub use handshake::{registration_request, REGISTER_SERVICE};
pub use node_config::{default_root, NodeConfig, ROOT_ENV};
pub use protocol::Message;
pub use proxy::{
    //
    DaemonProxy,
    DaemonStatus,
    FarmerProxy,
    FarmingInfo,
    NewFarmingInfo,
    NewSignagePoint,
    RewardTargets,
    ServiceProxy,
    SignagePoint,
};

pub use transport::{create_memory_transport, create_websocket_transport, MemoryPeer};

// --- public re-exports
pub use domain::{
    //
    Frame,
    Inbound,
    LinkStatus,
    Transport,
    TransportBase,
    TransportPtr,
};
