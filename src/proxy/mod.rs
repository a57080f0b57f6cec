//! Typed, service-scoped proxies.
//!
//! A proxy binds one destination service to a shared [`ClientHandle`]. It
//! builds requests, awaits correlated responses, and turns pushed events into
//! typed callbacks. Proxies never own the channel.

mod daemon;
mod farmer;

pub use daemon::{DaemonProxy, DaemonStatus};
pub use farmer::{FarmerProxy, FarmingInfo, NewFarmingInfo, NewSignagePoint, RewardTargets, SignagePoint};

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::{ClientHandle, Event, Result, SubscriptionHandle};

/// Generic proxy for one destination service.
///
/// # Example
///
/// ```no_run
/// use chia_rpc::{Endpoint, RpcClient, RpcConfig, ServiceProxy};
///
/// # async fn example() -> chia_rpc::Result<()> {
/// let endpoint = Endpoint::new("wss://localhost:55400", "daemon.crt", "daemon.key")?;
/// let client = RpcClient::connect(&endpoint, RpcConfig::default()).await?;
///
/// let wallet = ServiceProxy::new(client.handle(), "chia_wallet");
/// let height = wallet.send_message("get_height_info", serde_json::json!({}), None).await?;
/// println!("{height}");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ServiceProxy {
    // ---
    handle: ClientHandle,
    service: String,
}

impl ServiceProxy {
    // ---

    pub fn new(handle: ClientHandle, service: impl Into<String>) -> Self {
        Self {
            handle,
            service: service.into(),
        }
    }

    /// Destination service name.
    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn handle(&self) -> &ClientHandle {
        &self.handle
    }

    /// Send `command` and return the raw response payload.
    ///
    /// `timeout` defaults to the client's request timeout.
    ///
    /// # Errors
    ///
    /// See [`RpcClient::send_message`](crate::RpcClient::send_message).
    pub async fn send_message(
        &self,
        command: &str,
        data: Value,
        timeout: Option<Duration>,
    ) -> Result<Value> {
        // ---
        self.handle
            .send_message(&self.service, command, data, timeout)
            .await
    }

    /// Send a typed request and decode the typed response.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Serialization`](crate::RpcError::Serialization) if
    /// either payload does not convert, plus everything
    /// [`send_message`](Self::send_message) returns.
    pub async fn call<Req, Resp>(&self, command: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        // ---
        let data = serde_json::to_value(request)?;
        let response = self.send_message(command, data, None).await?;
        Ok(serde_json::from_value(response)?)
    }

    /// Invoke `callback` with the decoded payload of every `event` this
    /// service pushes.
    ///
    /// A payload that does not decode into `T` is logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::ConnectionClosed`](crate::RpcError::ConnectionClosed)
    /// if the channel is gone.
    pub fn on<T, F>(&self, event: &str, callback: F) -> Result<SubscriptionHandle>
    where
        T: DeserializeOwned + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        // ---
        self.handle
            .subscribe(&self.service, event, move |event: &Event| -> Result<()> {
                callback(event.parse::<T>()?);
                Ok(())
            })
    }

    /// Invoke `callback` for every event this service pushes.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::ConnectionClosed`](crate::RpcError::ConnectionClosed)
    /// if the channel is gone.
    pub fn on_any<F>(&self, callback: F) -> Result<SubscriptionHandle>
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        // ---
        self.handle
            .subscribe_all(&self.service, move |event: &Event| -> Result<()> {
                callback(event);
                Ok(())
            })
    }

    /// Remove a handler registered through this proxy.
    pub fn off(&self, subscription: &SubscriptionHandle) -> bool {
        self.handle.unsubscribe(subscription)
    }
}
