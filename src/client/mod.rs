// src/client/mod.rs
//! RPC client implementation.
//!
//! [`RpcClient`] owns one channel to the daemon: the transport, the pending
//! request table, the event registry, and the background drain task that
//! feeds them.
//!
//! # Architecture
//!
//! The drain task reads inbound frames in arrival order. Each frame is
//! parsed into a [`Message`] and offered to the correlator; a frame that
//! answers a pending request completes it, anything else is dispatched as an
//! [`Event`]. When the inbound sequence ends, every outstanding request
//! fails with [`RpcError::ConnectionClosed`] and the registry is cleared.
//!
//! # Ownership
//!
//! Only the `RpcClient` can close the channel. Proxies get a
//! [`ClientHandle`], a non-owning reference; once the client is closed or
//! dropped every handle call fails with `ConnectionClosed`.

mod correlator;
mod pending;

pub(crate) use correlator::Correlator;

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinHandle;

use crate::handshake;
use crate::sync::lock_ignore_poison;
use crate::transport::create_websocket_transport;
use crate::{
    // ---
    Endpoint,
    Event,
    EventDispatcher,
    EventHandler,
    Inbound,
    Message,
    Result,
    RpcConfig,
    RpcError,
    SubscriptionHandle,
    TransportPtr,
};

/// Running RPC client instance.
///
/// Dropping the client tears the channel down: outstanding requests fail
/// with `ConnectionClosed` and the socket is closed in the background. Call
/// [`RpcClient::close`] to wait for that to finish.
pub struct RpcClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    // ---
    config: RpcConfig,
    correlator: Arc<Correlator>,
    events: Arc<EventDispatcher>,
    drain_task: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        // ---
        if let Some(task) = lock_ignore_poison(&self.drain_task).take() {
            task.abort();
        }
        self.correlator.shutdown();
        self.events.clear();
    }
}

impl ClientInner {
    // ---

    async fn request(
        &self,
        destination: &str,
        command: &str,
        data: Value,
        timeout: Option<Duration>,
    ) -> Result<Message> {
        // ---
        let message = Message::request(command, destination, &self.config.origin_service, data);
        let timeout = timeout.unwrap_or(self.config.request_timeout);
        self.correlator.submit(message, timeout).await
    }

    fn is_closed(&self) -> bool {
        self.correlator.is_closed() || self.correlator.transport().is_closed()
    }

    fn transport_id(&self) -> &str {
        self.correlator.transport().transport_id()
    }
}

impl RpcClient {
    // ---

    /// Open a channel to `endpoint` and register `config.origin_service`.
    ///
    /// The channel is closed again if registration fails.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Connect`] if the channel cannot be opened and
    /// [`RpcError::Registration`] if the handshake fails.
    pub async fn connect(endpoint: &Endpoint, config: RpcConfig) -> Result<Self> {
        // ---
        let transport = create_websocket_transport(endpoint, &config).await?;
        Self::connect_with_transport(transport, config).await
    }

    /// Register over an already-open transport.
    ///
    /// Like [`connect`](Self::connect), the transport is closed if
    /// registration fails.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Registration`] if the handshake fails.
    pub async fn connect_with_transport(transport: TransportPtr, config: RpcConfig) -> Result<Self> {
        // ---
        let client = Self::with_transport(transport, config)?;

        if let Err(err) = client.register().await {
            if let Err(_close_err) = client.close().await {
                log_debug!("close after failed registration: {_close_err}");
            }
            return Err(err);
        }

        Ok(client)
    }

    /// Open a channel to `endpoint` without registering.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Connect`] if the channel cannot be opened,
    /// including [`ConnectError::UnsupportedScheme`](crate::ConnectError::UnsupportedScheme)
    /// for `https` endpoints.
    pub async fn open(endpoint: &Endpoint, config: RpcConfig) -> Result<Self> {
        // ---
        let transport = create_websocket_transport(endpoint, &config).await?;
        Self::with_transport(transport, config)
    }

    /// Create a client over an already-open transport.
    ///
    /// This is the constructor you want for tests and for custom transports.
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::InvalidState`] if the transport's inbound sequence
    /// was already taken.
    pub fn with_transport(transport: TransportPtr, config: RpcConfig) -> Result<Self> {
        // ---
        let inbound = transport.take_inbound()?;

        let correlator = Arc::new(Correlator::new(transport));
        let events = Arc::new(EventDispatcher::new());

        let drain_task = tokio::spawn(drain(
            inbound,
            Arc::clone(&correlator),
            Arc::clone(&events),
        ));

        let inner = ClientInner {
            config,
            correlator,
            events,
            drain_task: Mutex::new(Some(drain_task)),
        };

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Run the `register_service` handshake for `config.origin_service`.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Registration`] with the
    /// [`RegistrationError`](crate::RegistrationError) kind.
    pub async fn register(&self) -> Result<()> {
        // ---
        let config = &self.inner.config;
        handshake::register_service(
            &self.inner.correlator,
            &config.origin_service,
            config.register_timeout,
        )
        .await
    }

    /// Non-owning handle for proxies.
    pub fn handle(&self) -> ClientHandle {
        ClientHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Send `command` to `destination` and return the response payload.
    ///
    /// `timeout` defaults to `config.request_timeout`.
    ///
    /// # Errors
    ///
    /// - [`RpcError::Timeout`] if no response arrives in time
    /// - [`RpcError::ConnectionClosed`] if the channel is or becomes closed
    /// - [`RpcError::Remote`] if the service reports failure
    pub async fn send_message(
        &self,
        destination: &str,
        command: &str,
        data: Value,
        timeout: Option<Duration>,
    ) -> Result<Value> {
        // ---
        let response = self
            .inner
            .request(destination, command, data, timeout)
            .await?;
        Ok(response.data)
    }

    /// The channel's event registry.
    pub fn events(&self) -> &EventDispatcher {
        &self.inner.events
    }

    pub fn config(&self) -> &RpcConfig {
        &self.inner.config
    }

    /// Requests still waiting for a response.
    pub fn pending_requests(&self) -> usize {
        self.inner.correlator.pending_len()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Close the channel and wait for the drain task to finish.
    ///
    /// Outstanding requests fail with `ConnectionClosed`. Idempotent.
    pub async fn close(&self) -> Result<()> {
        // ---
        log_debug!("{}: closing client", self.inner.transport_id());
        self.inner.correlator.transport().close().await?;

        let task = lock_ignore_poison(&self.inner.drain_task).take();
        if let Some(task) = task {
            if let Err(_err) = task.await {
                log_warn!("{}: drain task ended abnormally: {_err}", self.inner.transport_id());
            }
        }

        self.inner.correlator.shutdown();
        self.inner.events.clear();
        Ok(())
    }
}

/// Non-owning reference to a client's channel, handed to proxies.
///
/// Cheap to clone. Cannot close the channel.
#[derive(Clone)]
pub struct ClientHandle {
    inner: Weak<ClientInner>,
}

impl ClientHandle {
    // ---

    fn upgrade(&self) -> Result<Arc<ClientInner>> {
        self.inner.upgrade().ok_or(RpcError::ConnectionClosed)
    }

    /// See [`RpcClient::send_message`].
    pub async fn send_message(
        &self,
        destination: &str,
        command: &str,
        data: Value,
        timeout: Option<Duration>,
    ) -> Result<Value> {
        // ---
        let inner = self.upgrade()?;
        let response = inner.request(destination, command, data, timeout).await?;
        Ok(response.data)
    }

    /// Register `handler` for `event` pushed by `service`.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::ConnectionClosed`] if the channel is gone.
    pub fn subscribe<H>(&self, service: &str, event: &str, handler: H) -> Result<SubscriptionHandle>
    where
        H: EventHandler + 'static,
    {
        // ---
        let inner = self.live()?;
        Ok(inner.events.register(service, event, handler))
    }

    /// Register `handler` for every event pushed by `service`.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::ConnectionClosed`] if the channel is gone.
    pub fn subscribe_all<H>(&self, service: &str, handler: H) -> Result<SubscriptionHandle>
    where
        H: EventHandler + 'static,
    {
        // ---
        let inner = self.live()?;
        Ok(inner.events.register_all(service, handler))
    }

    /// Remove a handler. Returns `false` if it was not registered or the
    /// channel is gone.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        // ---
        match self.inner.upgrade() {
            Some(inner) => inner.events.deregister(handle),
            None => false,
        }
    }

    /// The origin service requests are sent from.
    pub fn origin_service(&self) -> Option<String> {
        self.inner
            .upgrade()
            .map(|inner| inner.config.origin_service.clone())
    }

    pub fn is_closed(&self) -> bool {
        self.inner.upgrade().map_or(true, |inner| inner.is_closed())
    }

    fn live(&self) -> Result<Arc<ClientInner>> {
        // ---
        let inner = self.upgrade()?;
        if inner.is_closed() {
            return Err(RpcError::ConnectionClosed);
        }
        Ok(inner)
    }
}

/// Drain the inbound sequence until the connection ends.
async fn drain(mut inbound: Inbound, correlator: Arc<Correlator>, events: Arc<EventDispatcher>) {
    // ---
    let transport_id = correlator.transport().transport_id().to_string();
    log_debug!("{transport_id}: drain task started");

    while let Some(frame) = inbound.recv().await {
        let message = match Message::from_frame(&frame) {
            Ok(message) => message,
            Err(_err) => {
                log_warn!("{transport_id}: skipping inbound frame: {_err}");
                continue;
            }
        };

        if let Some(unmatched) = correlator.on_inbound(message) {
            let event = Event::from(unmatched);
            let _invoked = events.dispatch(&event);
            log_trace!(
                "{transport_id}: event {}/{} -> {_invoked} handlers",
                event.origin,
                event.command
            );
        }
    }

    let _failed = correlator.shutdown();
    events.clear();
    log_debug!("{transport_id}: inbound closed, {_failed} requests failed");
}
