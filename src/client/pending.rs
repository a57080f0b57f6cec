use std::collections::HashMap;

use tokio::sync::oneshot;

use crate::{CorrelationId, Message, Result, RpcError};

/// Outcome delivered to a waiting request.
pub(crate) type Completion = Result<Message>;

/// Tracks pending requests waiting for responses.
///
/// Maps correlation IDs to oneshot senders. Every path that resolves an
/// entry (response, timeout, cancellation, teardown) does so by removing it
/// from the map, so whichever path removes it first is the only one that
/// completes it.
///
/// Not synchronized; the correlator keeps it behind a mutex.
pub(super) struct PendingRequests {
    // ---
    requests: HashMap<CorrelationId, oneshot::Sender<Completion>>,
    closed: bool,
}

impl PendingRequests {
    // ---

    /// Create a new empty pending requests tracker
    pub fn new() -> Self {
        // ---
        Self {
            requests: HashMap::new(),
            closed: false,
        }
    }

    /// Register a new pending request
    ///
    /// Returns a receiver that will be notified when the request resolves.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::ConnectionClosed`] once the table is closed, and
    /// [`RpcError::InvalidState`] if `correlation_id` is already pending.
    pub fn register(
        &mut self,
        correlation_id: CorrelationId,
    ) -> Result<oneshot::Receiver<Completion>> {
        // ---
        if self.closed {
            return Err(RpcError::ConnectionClosed);
        }
        if self.requests.contains_key(&correlation_id) {
            return Err(RpcError::InvalidState(format!(
                "correlation id {correlation_id} is already pending"
            )));
        }

        let (tx, rx) = oneshot::channel();
        self.requests.insert(correlation_id, tx);
        Ok(rx)
    }

    /// Complete a pending request with its outcome
    ///
    /// Returns the outcome back if `correlation_id` is not pending, so the
    /// caller can route it elsewhere.
    pub fn complete(&mut self, correlation_id: &str, outcome: Completion) -> Option<Completion> {
        // ---
        match self.requests.remove(correlation_id) {
            Some(tx) => {
                // Receiver may already be gone (cancelled caller).
                let _ = tx.send(outcome);
                None
            }
            None => Some(outcome),
        }
    }

    /// Remove a pending request without delivering anything
    ///
    /// Used for timeout and cancellation cleanup.
    pub fn remove(&mut self, correlation_id: &str) -> bool {
        // ---
        self.requests.remove(correlation_id).is_some()
    }

    /// Close the table and fail every pending request with
    /// [`RpcError::ConnectionClosed`].
    ///
    /// Returns the number of requests failed.
    pub fn fail_all(&mut self) -> usize {
        // ---
        self.closed = true;

        let failed = self.requests.len();
        for (_, tx) in self.requests.drain() {
            let _ = tx.send(Err(RpcError::ConnectionClosed));
        }
        failed
    }

    /// Get the number of pending requests
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::{json, Value};

    fn response(id: &str) -> Message {
        // ---
        let mut req = Message::request("ping", "daemon", "wallet_ui", Value::Null);
        req.request_id = id.to_string();
        Message::response_to(&req, json!({"success": true}))
    }

    #[test]
    fn test_register_and_complete() {
        // ---
        let mut pending = PendingRequests::new();
        let id = CorrelationId::from("a1");

        let rx = pending.register(id.clone()).unwrap();
        assert_eq!(pending.len(), 1);

        assert!(pending.complete(id.as_str(), Ok(response("a1"))).is_none());
        assert_eq!(pending.len(), 0);

        let received = rx.blocking_recv().unwrap().unwrap();
        assert_eq!(received.request_id, "a1");
    }

    #[test]
    fn test_complete_unknown_id_returns_outcome() {
        // ---
        let mut pending = PendingRequests::new();

        let returned = pending.complete("nope", Ok(response("nope")));
        assert!(matches!(returned, Some(Ok(msg)) if msg.request_id == "nope"));
    }

    #[test]
    fn test_remove_and_complete_are_exclusive() {
        // ---
        let mut pending = PendingRequests::new();
        let id = CorrelationId::from("b2");
        let mut rx = pending.register(id.clone()).unwrap();

        assert!(pending.remove(id.as_str()));
        assert!(!pending.remove(id.as_str()));

        // A response arriving after the timeout path won is not delivered.
        assert!(pending.complete(id.as_str(), Ok(response("b2"))).is_some());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        // ---
        let mut pending = PendingRequests::new();
        let id = CorrelationId::from("c3");

        let _rx = pending.register(id.clone()).unwrap();
        assert!(matches!(
            pending.register(id),
            Err(RpcError::InvalidState(_))
        ));
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn test_fail_all_closes_table() {
        // ---
        let mut pending = PendingRequests::new();
        let receivers: Vec<_> = (0..3)
            .map(|i| pending.register(CorrelationId::from(format!("id-{i}"))).unwrap())
            .collect();

        assert_eq!(pending.fail_all(), 3);
        assert_eq!(pending.len(), 0);
        assert!(pending.is_closed());

        for rx in receivers {
            assert!(matches!(
                rx.blocking_recv().unwrap(),
                Err(RpcError::ConnectionClosed)
            ));
        }

        assert!(matches!(
            pending.register(CorrelationId::from("late")),
            Err(RpcError::ConnectionClosed)
        ));
        assert_eq!(pending.fail_all(), 0);
    }
}
