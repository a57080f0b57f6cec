//! The `register_service` handshake.
//!
//! A fresh daemon connection is anonymous. Until the client announces a
//! logical service name the daemon has nowhere to route responses and
//! pushed events, so registration is the first exchange on every channel.

use std::time::Duration;

use serde_json::json;

use crate::client::Correlator;
use crate::protocol::service_names;
use crate::{Message, RegistrationError, Result, RpcError};

/// Command name of the handshake request.
pub const REGISTER_SERVICE: &str = "register_service";

/// Build the handshake request for `local_service`.
pub fn registration_request(local_service: &str) -> Message {
    // ---
    Message::request(
        REGISTER_SERVICE,
        service_names::DAEMON,
        local_service,
        json!({ "service": local_service }),
    )
}

/// Register `local_service` with the daemon and wait for its answer.
///
/// # Errors
///
/// Returns [`RpcError::Registration`] with:
/// - [`RegistrationError::TimedOut`] if no answer arrives within `deadline`
/// - [`RegistrationError::Closed`] if the channel closes first
/// - [`RegistrationError::AlreadyRegistered`] if the daemon says the name is taken
/// - [`RegistrationError::Rejected`] for any other refusal
pub(crate) async fn register_service(
    correlator: &Correlator,
    local_service: &str,
    deadline: Duration,
) -> Result<()> {
    // ---
    let transport_id = correlator.transport().transport_id().to_string();
    log_debug!("{transport_id}: registering as {local_service}");

    let outcome = correlator
        .submit(registration_request(local_service), deadline)
        .await;

    match outcome {
        Ok(_) => {
            log_info!("{transport_id}: registered as {local_service}");
            Ok(())
        }
        Err(err) => {
            let err = classify(err, local_service);
            log_warn!("{transport_id}: {err}");
            Err(err)
        }
    }
}

fn classify(err: RpcError, local_service: &str) -> RpcError {
    // ---
    let kind = match err {
        RpcError::Timeout => RegistrationError::TimedOut,
        RpcError::ConnectionClosed => RegistrationError::Closed,
        RpcError::Remote { message, .. } => {
            if message.to_ascii_lowercase().contains("already registered") {
                RegistrationError::AlreadyRegistered(local_service.to_string())
            } else {
                RegistrationError::Rejected(message)
            }
        }
        other => return other,
    };
    RpcError::Registration(kind)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_request_shape() {
        // ---
        let msg = registration_request("wallet_ui");
        assert_eq!(msg.command, "register_service");
        assert_eq!(msg.destination, "daemon");
        assert_eq!(msg.origin, "wallet_ui");
        assert_eq!(msg.data, json!({"service": "wallet_ui"}));
        assert!(!msg.ack);
    }

    #[test]
    fn test_classify() {
        // ---
        let remote = |message: &str| RpcError::Remote {
            command: REGISTER_SERVICE.into(),
            message: message.into(),
        };

        assert!(matches!(
            classify(RpcError::Timeout, "ui"),
            RpcError::Registration(RegistrationError::TimedOut)
        ));
        assert!(matches!(
            classify(RpcError::ConnectionClosed, "ui"),
            RpcError::Registration(RegistrationError::Closed)
        ));
        assert!(matches!(
            classify(remote("Service ui Already Registered"), "ui"),
            RpcError::Registration(RegistrationError::AlreadyRegistered(name)) if name == "ui"
        ));
        assert!(matches!(
            classify(remote("not allowed"), "ui"),
            RpcError::Registration(RegistrationError::Rejected(msg)) if msg == "not allowed"
        ));
        assert!(matches!(
            classify(RpcError::Protocol("x".into()), "ui"),
            RpcError::Protocol(_)
        ));
    }
}
