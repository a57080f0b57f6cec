// src/domain/transport.rs

//! Transport domain abstractions.
//!
//! This module defines the channel interface the correlator and the drain
//! loop are written against. It intentionally avoids any reference to
//! websockets, TLS, or message semantics.
//!
//! A transport is responsible only for moving opaque text frames over one
//! duplex connection and for reporting when that connection is gone.
//! Correlation, timeouts, and event routing are handled elsewhere.
//!
//! Concrete implementations live under `src/transport/`.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::Result;

/// One text frame on the channel.
///
/// Frames are immutable and cheap to clone.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Frame(Arc<str>);

impl Frame {
    /// Borrow the frame text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length of the frame in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for an empty frame.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Arc<str>> for Frame {
    fn from(value: Arc<str>) -> Self {
        Frame(value)
    }
}

impl From<String> for Frame {
    fn from(value: String) -> Self {
        Frame(value.into())
    }
}

impl From<&str> for Frame {
    fn from(value: &str) -> Self {
        Frame(value.into())
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Liveness flags shared between a transport, its connection task, and
/// its inbound sequence.
#[derive(Debug, Default)]
pub struct LinkStatus {
    // ---
    closed: AtomicBool,
    closed_locally: AtomicBool,
}

impl LinkStatus {
    /// Create a status for a live link.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Mark the link dead (remote closure, I/O failure).
    pub fn mark_closed(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Mark the link closed by the local side. Frames still buffered in the
    /// inbound sequence are discarded from this point on.
    pub fn mark_closed_locally(&self) {
        self.closed_locally.store(true, Ordering::Release);
        self.closed.store(true, Ordering::Release);
    }

    /// True once the link is dead for any reason.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// True once `close()` has been called locally.
    pub fn is_closed_locally(&self) -> bool {
        self.closed_locally.load(Ordering::Acquire)
    }
}

/// Shared base state for all transport implementations.
///
/// Each concrete transport embeds this as a field named `base` so the
/// default `Transport` methods can delegate to it.
#[derive(Debug)]
pub struct TransportBase {
    /// Identifier used in log lines.
    pub transport_id: String,
    /// Link liveness.
    pub status: Arc<LinkStatus>,
}

impl TransportBase {
    /// Create a new base for a live link.
    pub fn new(transport_id: impl Into<String>) -> Self {
        Self {
            transport_id: transport_id.into(),
            status: LinkStatus::new(),
        }
    }
}

/// The single inbound frame sequence of a channel.
///
/// `recv()` yields frames in arrival order and returns `None` once the
/// connection is gone: that `None` is the connection-closed signal. After a
/// local `close()` no further frames are yielded, even if some were already
/// buffered.
pub struct Inbound {
    // ---
    frames: mpsc::Receiver<Frame>,
    status: Arc<LinkStatus>,
}

impl Inbound {
    /// Wrap a frame receiver.
    pub fn new(frames: mpsc::Receiver<Frame>, status: Arc<LinkStatus>) -> Self {
        Self { frames, status }
    }

    /// Wait for the next inbound frame.
    pub async fn recv(&mut self) -> Option<Frame> {
        // ---
        if self.status.is_closed_locally() {
            return None;
        }

        let frame = self.frames.recv().await?;

        if self.status.is_closed_locally() {
            return None;
        }
        Some(frame)
    }
}

/// Duplex channel abstraction.
///
/// Implementations must ensure that:
/// - `send()` only hands the frame to the connection; it does not wait for
///   network I/O to finish.
/// - `take_inbound()` succeeds at most once; the returned sequence is the
///   only consumer of inbound frames.
/// - an unexpected remote closure marks the link closed immediately and ends
///   the inbound sequence.
/// - `close()` is idempotent and safe to call concurrently with `send()` and
///   with a pending `Inbound::recv()`.
///
/// The in-memory transport is the reference implementation of these
/// semantics.
///
/// # Notes
///
/// This trait uses `async_trait`; consumers should treat the methods as
/// normal `async fn`s.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    // ---
    /// Returns a reference to the shared base state.
    fn base(&self) -> &TransportBase;

    /// Identifier used in log lines.
    fn transport_id(&self) -> &str {
        &self.base().transport_id
    }

    /// True once the link is closed, locally or remotely.
    fn is_closed(&self) -> bool {
        self.base().status.is_closed()
    }

    /// Queue a frame for transmission.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::ConnectionClosed`](crate::RpcError::ConnectionClosed)
    /// if the link is closed.
    async fn send(&self, frame: Frame) -> Result<()>;

    /// Take the inbound frame sequence.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::InvalidState`](crate::RpcError::InvalidState) if it
    /// was already taken.
    fn take_inbound(&self) -> Result<Inbound>;

    /// Close the link and release its resources.
    async fn close(&self) -> Result<()>;
}

/// Shared transport pointer.
///
/// Cloning only bumps a reference count; all clones share the connection.
pub type TransportPtr = Arc<dyn Transport>;
