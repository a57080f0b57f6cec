use thiserror::Error;

/// Errors that can occur while talking to the daemon.
#[derive(Error, Debug)]
pub enum RpcError {
    /// The channel could not be opened.
    #[error("connect failed: {0}")]
    Connect(#[from] ConnectError),

    /// The `register_service` handshake did not succeed.
    #[error("service registration failed: {0}")]
    Registration(#[from] RegistrationError),

    /// Request timed out waiting for its response.
    #[error("request timed out")]
    Timeout,

    /// The channel closed (locally or remotely) before the operation completed.
    #[error("connection closed")]
    ConnectionClosed,

    /// The remote service answered with a well-formed error response.
    #[error("{command} failed: {message}")]
    Remote {
        /// Command the failing request carried.
        command: String,
        /// Error text reported by the remote service.
        message: String,
    },

    /// An inbound frame did not have the expected envelope shape.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Endpoint or node configuration is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// The operation is not valid in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl RpcError {
    /// True for failures that resolved a single request without affecting the channel.
    pub fn is_request_scoped(&self) -> bool {
        // ---
        matches!(
            self,
            RpcError::Timeout | RpcError::Remote { .. } | RpcError::Serialization(_)
        )
    }
}

/// Failure kinds reported while opening a channel.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    /// DNS resolution or TCP connect failed.
    #[error("network error: {0}")]
    Network(String),

    /// Loading credentials or the TLS handshake failed.
    #[error("TLS error: {0}")]
    Tls(String),

    /// The websocket upgrade was refused or malformed.
    #[error("websocket handshake failed: {0}")]
    Handshake(String),

    /// The connect deadline elapsed.
    #[error("connect deadline exceeded")]
    Timeout,

    /// The endpoint URI cannot be dialled.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The endpoint scheme has no duplex channel (e.g. `https`).
    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),
}

/// Failure kinds reported by the service registration handshake.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// The daemon refused the registration.
    #[error("rejected: {0}")]
    Rejected(String),

    /// The daemon reports the service name as already registered.
    #[error("service {0} is already registered")]
    AlreadyRegistered(String),

    /// No response arrived before the registration deadline.
    #[error("timed out")]
    TimedOut,

    /// The channel closed during the handshake.
    #[error("connection closed")]
    Closed,
}

/// Result type alias for RPC operations
pub type Result<T> = std::result::Result<T, RpcError>;
