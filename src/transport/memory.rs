//! In-memory transport implementation.
//!
//! A pure in-process implementation of the domain-level `Transport` trait.
//! The client side is an ordinary [`TransportPtr`]; the other end is a
//! [`MemoryPeer`] that plays the daemon: it reads what the client sent,
//! pushes responses and events, and can drop the connection.
//!
//! ## Reference Semantics
//!
//! The in-memory transport defines the **reference behavior** for the
//! transport layer:
//!
//! - Frames are delivered in the order they were pushed.
//! - No frames are dropped due to timing or scheduling.
//! - `MemoryPeer::disconnect()` behaves like an abrupt remote closure: the
//!   link is marked closed immediately and the inbound sequence ends once
//!   already-delivered frames are drained.
//! - `close()` behaves like a local close: nothing is yielded afterwards.
//!
//! ## Non-Goals
//!
//! No TLS, framing limits, or network failure modes are emulated.

use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::mpsc;

use crate::sync::lock_ignore_poison;
use crate::{
    // ---
    Frame,
    Inbound,
    LinkStatus,
    Message,
    Result,
    RpcError,
    Transport,
    TransportBase,
    TransportPtr,
};

/// Default depth of the inbound queue.
const INBOUND_CAPACITY: usize = 64;

/// Both directions of one in-memory link.
struct Link {
    // ---
    to_client: Mutex<Option<mpsc::Sender<Frame>>>,
    to_peer: Mutex<Option<mpsc::UnboundedSender<Frame>>>,
    status: Arc<LinkStatus>,
}

impl Link {
    fn sever(&self) {
        // ---
        lock_ignore_poison(&self.to_client).take();
        lock_ignore_poison(&self.to_peer).take();
    }
}

/// In-memory transport (client side).
struct MemoryTransport {
    // ---
    base: TransportBase,
    link: Arc<Link>,
    inbound: Mutex<Option<Inbound>>,
}

#[async_trait::async_trait]
impl Transport for MemoryTransport {
    // ---
    fn base(&self) -> &TransportBase {
        &self.base
    }

    async fn send(&self, frame: Frame) -> Result<()> {
        // ---
        if self.is_closed() {
            return Err(RpcError::ConnectionClosed);
        }

        let to_peer = lock_ignore_poison(&self.link.to_peer).clone();
        let Some(to_peer) = to_peer else {
            return Err(RpcError::ConnectionClosed);
        };

        log_trace!("{}: send {} bytes", self.transport_id(), frame.len());
        to_peer.send(frame).map_err(|_| RpcError::ConnectionClosed)
    }

    fn take_inbound(&self) -> Result<Inbound> {
        // ---
        lock_ignore_poison(&self.inbound)
            .take()
            .ok_or_else(|| RpcError::InvalidState("inbound sequence already taken".into()))
    }

    async fn close(&self) -> Result<()> {
        // ---
        if self.base.status.is_closed_locally() {
            return Ok(());
        }

        log_debug!("{}: closing memory transport", self.transport_id());
        self.base.status.mark_closed_locally();
        self.link.sever();
        Ok(())
    }
}

/// Daemon side of an in-memory link.
///
/// # Testing Only
///
/// Exposed so integration tests and local simulations can stand in for a
/// real daemon.
pub struct MemoryPeer {
    // ---
    outbound: mpsc::UnboundedReceiver<Frame>,
    link: Arc<Link>,
}

impl MemoryPeer {
    // ---

    /// Deliver a raw frame to the client.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::ConnectionClosed`] if the link is closed.
    pub async fn push(&self, frame: impl Into<Frame>) -> Result<()> {
        // ---
        let to_client = lock_ignore_poison(&self.link.to_client).clone();
        let Some(to_client) = to_client else {
            return Err(RpcError::ConnectionClosed);
        };

        to_client
            .send(frame.into())
            .await
            .map_err(|_| RpcError::ConnectionClosed)
    }

    /// Deliver a message to the client.
    pub async fn push_message(&self, message: &Message) -> Result<()> {
        self.push(message.to_frame()?).await
    }

    /// Answer `request` with `data`, as the daemon would.
    pub async fn respond(&self, request: &Message, data: Value) -> Result<()> {
        self.push_message(&Message::response_to(request, data)).await
    }

    /// Next frame the client sent, or `None` once the link is closed.
    pub async fn next_frame(&mut self) -> Option<Frame> {
        self.outbound.recv().await
    }

    /// Next message the client sent. Malformed frames are skipped.
    pub async fn next_message(&mut self) -> Option<Message> {
        // ---
        loop {
            let frame = self.outbound.recv().await?;
            match Message::from_frame(&frame) {
                Ok(message) => return Some(message),
                Err(_err) => {
                    log_warn!("memory peer: skipping unparsable frame: {_err}");
                }
            }
        }
    }

    /// Drop the connection from the daemon side.
    pub fn disconnect(&self) {
        // ---
        log_debug!("memory peer: disconnecting");
        self.link.status.mark_closed();
        self.link.sever();
    }

    /// True once either side closed the link.
    pub fn is_closed(&self) -> bool {
        self.link.status.is_closed()
    }
}

/// Create a connected in-memory transport and its daemon-side peer.
pub fn create_memory_transport(transport_id: impl Into<String>) -> (TransportPtr, MemoryPeer) {
    // ---
    let base = TransportBase::new(transport_id);
    log_debug!("{}: create memory transport", base.transport_id);

    let (to_client, from_peer) = mpsc::channel(INBOUND_CAPACITY);
    let (to_peer, outbound) = mpsc::unbounded_channel();

    let link = Arc::new(Link {
        to_client: Mutex::new(Some(to_client)),
        to_peer: Mutex::new(Some(to_peer)),
        status: Arc::clone(&base.status),
    });

    let inbound = Inbound::new(from_peer, Arc::clone(&base.status));

    let transport = MemoryTransport {
        base,
        link: Arc::clone(&link),
        inbound: Mutex::new(Some(inbound)),
    };

    (Arc::new(transport), MemoryPeer { outbound, link })
}
