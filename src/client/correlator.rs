//! Request/response correlation over one channel.
//!
//! Every outbound request gets a fresh correlation ID stamped into its
//! `request_id` and a slot in the pending table. The drain task hands every
//! inbound message to [`Correlator::on_inbound`], which completes the
//! matching slot or gives the message back for event dispatch.
//!
//! # Resolution
//!
//! A pending entry is resolved exactly once, by whichever of these removes
//! it from the table first:
//!
//! - a matching response (`on_inbound`)
//! - the request deadline (`submit`)
//! - the caller dropping the `submit` future
//! - channel teardown (`shutdown`), which fails it with `ConnectionClosed`
//!
//! The table lock is only held for map operations, never across an
//! `.await`.

use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time;

use super::pending::{Completion, PendingRequests};
use crate::correlation::CorrelationIdGenerator;
use crate::sync::lock_ignore_poison;
use crate::{CorrelationId, Message, Result, RpcError, TransportPtr};

pub(crate) struct Correlator {
    // ---
    transport: TransportPtr,
    ids: CorrelationIdGenerator,
    pending: Mutex<PendingRequests>,
}

/// Removes a pending entry when the owning `submit` future goes away.
///
/// Removing an entry that was already resolved is a no-op.
struct PendingGuard<'a> {
    // ---
    pending: &'a Mutex<PendingRequests>,
    id: &'a CorrelationId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        // ---
        if lock_ignore_poison(self.pending).remove(self.id.as_str()) {
            log_debug!("request {} abandoned before it resolved", self.id);
        }
    }
}

impl Correlator {
    // ---

    pub fn new(transport: TransportPtr) -> Self {
        // ---
        Self {
            transport,
            ids: CorrelationIdGenerator::new(),
            pending: Mutex::new(PendingRequests::new()),
        }
    }

    /// Send `message` as a request and wait for its response.
    ///
    /// The message's `request_id` is overwritten with a fresh correlation ID.
    ///
    /// # Errors
    ///
    /// - [`RpcError::Timeout`] if no response arrives within `timeout`
    /// - [`RpcError::ConnectionClosed`] if the channel closes first, or was
    ///   already closed
    /// - [`RpcError::Remote`] if the response reports failure
    /// - [`RpcError::Serialization`] if the message cannot be encoded
    pub async fn submit(&self, mut message: Message, timeout: Duration) -> Result<Message> {
        // ---
        let id = self.ids.next_id();
        message.request_id = id.to_string();
        let frame = message.to_frame()?;

        let mut rx = lock_ignore_poison(&self.pending).register(id.clone())?;
        let _guard = PendingGuard {
            pending: &self.pending,
            id: &id,
        };

        log_trace!(
            "{}: request {} {} -> {}",
            self.transport.transport_id(),
            id,
            message.command,
            message.destination
        );

        self.transport.send(frame).await?;

        let outcome = match time::timeout(timeout, &mut rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(RpcError::ConnectionClosed),
            Err(_elapsed) => self.expire(&id, &mut rx),
        };

        outcome?.check()
    }

    /// Resolve the deadline race for `id`.
    ///
    /// If the entry is still pending the timeout wins. Otherwise a response
    /// or teardown removed it first and its outcome is already in `rx`.
    fn expire(&self, id: &CorrelationId, rx: &mut oneshot::Receiver<Completion>) -> Completion {
        // ---
        if lock_ignore_poison(&self.pending).remove(id.as_str()) {
            log_debug!(
                "{}: request {} timed out",
                self.transport.transport_id(),
                id
            );
            return Err(RpcError::Timeout);
        }

        rx.try_recv().unwrap_or(Err(RpcError::ConnectionClosed))
    }

    /// Complete the pending request `message` answers.
    ///
    /// Returns the message back when nothing is waiting for it; the caller
    /// treats it as an event.
    pub fn on_inbound(&self, message: Message) -> Option<Message> {
        // ---
        if message.request_id.is_empty() {
            return Some(message);
        }

        let request_id = message.request_id.clone();
        let unmatched = lock_ignore_poison(&self.pending).complete(&request_id, Ok(message));

        match unmatched {
            None => {
                log_trace!(
                    "{}: response {} delivered",
                    self.transport.transport_id(),
                    request_id
                );
                None
            }
            Some(returned) => {
                let message = returned.ok()?;
                if message.ack {
                    log_debug!(
                        "{}: no pending request for response {} ({})",
                        self.transport.transport_id(),
                        request_id,
                        message.command
                    );
                }
                Some(message)
            }
        }
    }

    /// Close the table and fail every outstanding request with
    /// [`RpcError::ConnectionClosed`]. Returns how many were failed.
    pub fn shutdown(&self) -> usize {
        // ---
        let failed = lock_ignore_poison(&self.pending).fail_all();
        if failed > 0 {
            log_debug!(
                "{}: failed {failed} outstanding requests on close",
                self.transport.transport_id()
            );
        }
        failed
    }

    pub fn pending_len(&self) -> usize {
        lock_ignore_poison(&self.pending).len()
    }

    pub fn is_closed(&self) -> bool {
        lock_ignore_poison(&self.pending).is_closed()
    }

    pub fn transport(&self) -> &TransportPtr {
        &self.transport
    }
}
