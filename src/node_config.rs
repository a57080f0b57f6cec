//! Endpoint lookup in the node's `config.yaml`.
//!
//! The node keeps one configuration file under its root directory
//! (`<root>/config/config.yaml`). Credential paths inside it are relative to
//! that root unless absolute. Only the keys needed to reach a service are
//! read; everything else in the file is ignored.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::protocol::service_names;
use crate::{Endpoint, Result, RpcError};

/// Environment variable overriding the node root.
pub const ROOT_ENV: &str = "CHIA_ROOT";

const DEFAULT_HOSTNAME: &str = "localhost";
const DEFAULT_DAEMON_PORT: u16 = 55400;

#[derive(Debug, Clone, Deserialize)]
struct SslPair {
    private_crt: PathBuf,
    private_key: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
struct CaPair {
    crt: PathBuf,
}

#[derive(Debug, Deserialize)]
struct ServiceSection {
    rpc_port: Option<u16>,
    ssl: Option<SslPair>,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    self_hostname: Option<String>,
    daemon_port: Option<u16>,
    daemon_ssl: Option<SslPair>,
    private_ssl_ca: Option<CaPair>,
    #[serde(flatten)]
    sections: HashMap<String, serde_yaml::Value>,
}

/// Parsed node configuration.
#[derive(Debug)]
pub struct NodeConfig {
    // ---
    root: PathBuf,
    raw: RawConfig,
}

impl NodeConfig {
    // ---

    /// Load `config.yaml` from an explicit path.
    ///
    /// The node root is taken to be the parent of the file's `config/`
    /// directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        // ---
        let path = path.as_ref();
        let root = path
            .parent()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self::load_with_root(path, root)
    }

    /// Load `config.yaml` from `path`, resolving relative credential paths
    /// against `root`.
    pub fn load_with_root(path: impl AsRef<Path>, root: impl Into<PathBuf>) -> Result<Self> {
        // ---
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| {
            RpcError::Config(format!("cannot read {}: {err}", path.display()))
        })?;
        let config = Self::parse(&text, root)?;
        log_debug!("loaded node config from {}", path.display());
        Ok(config)
    }

    /// Load from the default location: `$CHIA_ROOT/config/config.yaml`,
    /// falling back to `~/.chia/mainnet`.
    pub fn load_default() -> Result<Self> {
        // ---
        let root = default_root()?;
        Self::load_with_root(root.join("config").join("config.yaml"), root)
    }

    /// Parse configuration text.
    pub fn parse(text: &str, root: impl Into<PathBuf>) -> Result<Self> {
        // ---
        let raw: RawConfig = serde_yaml::from_str(text)
            .map_err(|err| RpcError::Config(format!("invalid node config: {err}")))?;
        Ok(Self {
            root: root.into(),
            raw,
        })
    }

    /// Node root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Hostname services listen on.
    pub fn hostname(&self) -> &str {
        self.raw.self_hostname.as_deref().unwrap_or(DEFAULT_HOSTNAME)
    }

    /// Resolve the endpoint for `service`.
    ///
    /// `"daemon"` resolves to the daemon's `wss` endpoint; any other name is
    /// looked up as a config section (`full_node`, `wallet`, ...) and resolves
    /// to that service's `https` RPC endpoint. Service names with the
    /// `chia_` prefix are accepted as well.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Config`] if the section, port, or credentials are
    /// missing.
    pub fn endpoint(&self, service: &str) -> Result<Endpoint> {
        // ---
        let endpoint = if service == service_names::DAEMON {
            self.daemon_endpoint()?
        } else {
            self.service_endpoint(service)?
        };

        match self.ca_path() {
            Some(ca) => Ok(endpoint.with_ca(ca)),
            None => Ok(endpoint),
        }
    }

    fn daemon_endpoint(&self) -> Result<Endpoint> {
        // ---
        let port = self.raw.daemon_port.unwrap_or(DEFAULT_DAEMON_PORT);
        let ssl = self
            .raw
            .daemon_ssl
            .as_ref()
            .ok_or_else(|| RpcError::Config("daemon_ssl is missing".into()))?;

        Endpoint::new(
            &format!("wss://{}:{port}", self.hostname()),
            self.resolve(&ssl.private_crt),
            self.resolve(&ssl.private_key),
        )
    }

    fn service_endpoint(&self, service: &str) -> Result<Endpoint> {
        // ---
        let name = service.strip_prefix("chia_").unwrap_or(service);
        let value = self
            .raw
            .sections
            .get(name)
            .ok_or_else(|| RpcError::Config(format!("no section {name} in node config")))?;

        let section: ServiceSection = serde_yaml::from_value(value.clone())
            .map_err(|err| RpcError::Config(format!("section {name}: {err}")))?;

        let port = section
            .rpc_port
            .ok_or_else(|| RpcError::Config(format!("{name}.rpc_port is missing")))?;
        let ssl = section
            .ssl
            .ok_or_else(|| RpcError::Config(format!("{name}.ssl is missing")))?;

        Endpoint::new(
            &format!("https://{}:{port}", self.hostname()),
            self.resolve(&ssl.private_crt),
            self.resolve(&ssl.private_key),
        )
    }

    fn ca_path(&self) -> Option<PathBuf> {
        self.raw.private_ssl_ca.as_ref().map(|ca| self.resolve(&ca.crt))
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        // ---
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

/// `$CHIA_ROOT`, or `~/.chia/mainnet`.
pub fn default_root() -> Result<PathBuf> {
    // ---
    if let Some(root) = std::env::var_os(ROOT_ENV) {
        return Ok(PathBuf::from(root));
    }

    dirs::home_dir()
        .map(|home| home.join(".chia").join("mainnet"))
        .ok_or_else(|| RpcError::Config("cannot determine home directory".into()))
}
