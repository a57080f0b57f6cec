//! Public, transport-agnostic RPC configuration.
//!
//! Endpoint and credential selection live in [`Endpoint`](crate::Endpoint);
//! this type only carries the knobs that shape a channel once it is open.

use std::time::Duration;

use crate::protocol::service_names;

/// Default maximum size of one inbound message (50 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 50 * 1024 * 1024;

/// Channel configuration.
#[derive(Debug, Clone)]
pub struct RpcConfig {
    // ---
    /// Identifier for this channel, used in log lines.
    pub transport_id: String,

    /// Logical service name announced in the `register_service` handshake
    /// and used as `origin` on every request.
    ///
    /// Default: `wallet_ui`
    pub origin_service: String,

    /// How long a request waits for its response.
    ///
    /// Default: 30 seconds
    pub request_timeout: Duration,

    /// Deadline for DNS, TCP, TLS, and the websocket upgrade combined.
    ///
    /// Default: 10 seconds
    pub connect_timeout: Duration,

    /// Deadline for the `register_service` handshake.
    ///
    /// Default: 10 seconds
    pub register_timeout: Duration,

    /// Inbound frames buffered between the socket and the drain task.
    ///
    /// Default: 256
    pub inbound_capacity: usize,

    /// Largest inbound message accepted, in bytes.
    ///
    /// Default: 50 MiB
    pub max_message_size: usize,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            transport_id: "chia-rpc".to_string(),
            origin_service: service_names::WALLET_UI.to_string(),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            register_timeout: Duration::from_secs(10),
            inbound_capacity: 256,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl RpcConfig {
    // ---

    /// Default configuration with an explicit transport identifier.
    pub fn new(transport_id: impl Into<String>) -> Self {
        Self {
            transport_id: transport_id.into(),
            ..Self::default()
        }
    }

    /// Register under a different logical service name.
    ///
    /// # Example
    ///
    /// ```
    /// use chia_rpc::RpcConfig;
    ///
    /// let config = RpcConfig::new("farm-monitor").with_origin_service("farm_monitor");
    /// assert_eq!(config.origin_service, "farm_monitor");
    /// ```
    pub fn with_origin_service(mut self, service: impl Into<String>) -> Self {
        self.origin_service = service.into();
        self
    }

    /// Set the default per-request timeout.
    ///
    /// # Example
    ///
    /// ```
    /// use chia_rpc::RpcConfig;
    /// use std::time::Duration;
    ///
    /// let config = RpcConfig::default().with_request_timeout(Duration::from_secs(5));
    /// assert_eq!(config.request_timeout, Duration::from_secs(5));
    /// ```
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the connect deadline.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the registration handshake deadline.
    pub fn with_register_timeout(mut self, timeout: Duration) -> Self {
        self.register_timeout = timeout;
        self
    }

    /// Set the inbound buffer depth (at least one frame).
    pub fn with_inbound_capacity(mut self, capacity: usize) -> Self {
        self.inbound_capacity = capacity.max(1);
        self
    }

    /// Set the largest inbound message accepted.
    pub fn with_max_message_size(mut self, bytes: usize) -> Self {
        self.max_message_size = bytes;
        self
    }
}
