use serde::Deserialize;
use serde_json::{json, Value};

use super::ServiceProxy;
use crate::handshake::REGISTER_SERVICE;
use crate::protocol::service_names;
use crate::{ClientHandle, Result};

/// Answer to `get_status`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DaemonStatus {
    /// Whether the node's keys and config have been initialized.
    #[serde(default)]
    pub genesis_initialized: bool,
}

#[derive(Deserialize)]
struct VersionResponse {
    version: String,
}

#[derive(Deserialize)]
struct IsRunningResponse {
    is_running: bool,
}

#[derive(Deserialize)]
struct RunningServicesResponse {
    #[serde(default)]
    running_services: Vec<String>,
}

/// The daemon's own service-management commands.
#[derive(Clone)]
pub struct DaemonProxy {
    proxy: ServiceProxy,
}

impl DaemonProxy {
    // ---

    pub fn new(handle: ClientHandle) -> Self {
        Self {
            proxy: ServiceProxy::new(handle, service_names::DAEMON),
        }
    }

    /// Underlying generic proxy.
    pub fn proxy(&self) -> &ServiceProxy {
        &self.proxy
    }

    /// Register `service` with the daemon.
    ///
    /// The channel already registers its own origin while connecting; this is
    /// for announcing additional service names.
    pub async fn register_service(&self, service: &str) -> Result<()> {
        // ---
        self.proxy
            .send_message(REGISTER_SERVICE, json!({ "service": service }), None)
            .await?;
        Ok(())
    }

    pub async fn ping(&self) -> Result<()> {
        // ---
        self.proxy.send_message("ping", Value::Null, None).await?;
        Ok(())
    }

    pub async fn get_status(&self) -> Result<DaemonStatus> {
        self.proxy.call("get_status", &json!({})).await
    }

    /// Version string of the running node software.
    pub async fn get_version(&self) -> Result<String> {
        // ---
        let response: VersionResponse = self.proxy.call("get_version", &json!({})).await?;
        Ok(response.version)
    }

    /// Whether `service` (e.g. `chia_farmer`) is running.
    pub async fn is_running(&self, service: &str) -> Result<bool> {
        // ---
        let response: IsRunningResponse = self
            .proxy
            .call("is_running", &json!({ "service": service }))
            .await?;
        Ok(response.is_running)
    }

    /// Names of every service the daemon has started.
    pub async fn running_services(&self) -> Result<Vec<String>> {
        // ---
        let response: RunningServicesResponse = self
            .proxy
            .call("running_services", &json!({}))
            .await?;
        Ok(response.running_services)
    }

    pub async fn start_service(&self, service: &str) -> Result<()> {
        // ---
        self.proxy
            .send_message(
                "start_service",
                json!({ "service": service, "testing": false }),
                None,
            )
            .await?;
        Ok(())
    }

    pub async fn stop_service(&self, service: &str) -> Result<()> {
        // ---
        self.proxy
            .send_message("stop_service", json!({ "service": service }), None)
            .await?;
        Ok(())
    }

    /// Ask the daemon to stop every service and exit.
    pub async fn exit(&self) -> Result<()> {
        // ---
        self.proxy.send_message("exit", Value::Null, None).await?;
        Ok(())
    }
}
