//! Resolved endpoints.
//!
//! An [`Endpoint`] names one reachable service and the mutual-TLS
//! credentials used to reach it. It is resolved once, either from explicit
//! values or from the node configuration (see
//! [`NodeConfig`](crate::NodeConfig)), and never changes afterwards.

use std::fmt;
use std::path::{Path, PathBuf};

use url::Url;

use crate::{Result, RpcError};

/// Transport path selected by the endpoint scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// `wss://`: persistent duplex channel, handshake required.
    Wss,
    /// `https://`: stateless request/response, no events.
    Https,
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheme::Wss => f.write_str("wss"),
            Scheme::Https => f.write_str("https"),
        }
    }
}

/// One reachable service and its credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    // ---
    uri: Url,
    scheme: Scheme,
    cert_path: PathBuf,
    key_path: PathBuf,
    ca_path: Option<PathBuf>,
}

impl Endpoint {
    // ---

    /// Create an endpoint from explicit values.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Config`] if `uri` does not parse, has no host, or
    /// its scheme is neither `wss` nor `https`.
    pub fn new(
        uri: &str,
        cert_path: impl Into<PathBuf>,
        key_path: impl Into<PathBuf>,
    ) -> Result<Self> {
        // ---
        let uri = Url::parse(uri).map_err(|err| RpcError::Config(format!("uri {uri}: {err}")))?;

        let scheme = match uri.scheme() {
            "wss" => Scheme::Wss,
            "https" => Scheme::Https,
            other => {
                return Err(RpcError::Config(format!(
                    "unsupported scheme {other}, expected wss or https"
                )))
            }
        };

        if uri.host_str().is_none() {
            return Err(RpcError::Config(format!("uri {uri} has no host")));
        }

        Ok(Self {
            uri,
            scheme,
            cert_path: cert_path.into(),
            key_path: key_path.into(),
            ca_path: None,
        })
    }

    /// Verify the server certificate against this CA instead of accepting
    /// any certificate the daemon presents.
    pub fn with_ca(mut self, ca_path: impl Into<PathBuf>) -> Self {
        self.ca_path = Some(ca_path.into());
        self
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn cert_path(&self) -> &Path {
        &self.cert_path
    }

    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    pub fn ca_path(&self) -> Option<&Path> {
        self.ca_path.as_deref()
    }

    /// `host:port` for log lines.
    pub fn authority(&self) -> String {
        // ---
        let host = self.uri.host_str().unwrap_or_default();
        match self.uri.port_or_known_default() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uri)
    }
}
