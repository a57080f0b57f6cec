use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::Frame;
use crate::{Result, RpcError};

/// The daemon's wire envelope.
///
/// Every frame on the websocket is one of these, serialized as a JSON text
/// frame. Requests carry `ack = false`; the daemon answers with the same
/// `request_id`, `ack = true`, and origin/destination swapped. Pushed events
/// reuse the shape with the event name in `command`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Command name (requests/responses) or event name (pushed events).
    pub command: String,

    /// `true` on responses.
    #[serde(default)]
    pub ack: bool,

    /// Command-specific payload.
    #[serde(default)]
    pub data: Value,

    /// Correlation identifier.
    #[serde(default)]
    pub request_id: String,

    /// Logical service the message is addressed to.
    #[serde(default)]
    pub destination: String,

    /// Logical service the message came from.
    #[serde(default)]
    pub origin: String,
}

impl Message {
    // ---

    /// Build an outbound request. The correlator stamps `request_id`.
    pub fn request(
        command: impl Into<String>,
        destination: impl Into<String>,
        origin: impl Into<String>,
        data: Value,
    ) -> Self {
        // ---
        let data = match data {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };

        Self {
            command: command.into(),
            ack: false,
            data,
            request_id: String::new(),
            destination: destination.into(),
            origin: origin.into(),
        }
    }

    /// Build the response a daemon would send for `request`.
    pub fn response_to(request: &Message, data: Value) -> Self {
        // ---
        Self {
            command: request.command.clone(),
            ack: true,
            data,
            request_id: request.request_id.clone(),
            destination: request.origin.clone(),
            origin: request.destination.clone(),
        }
    }

    /// Build an unsolicited event as pushed by `origin`.
    pub fn event(
        origin: impl Into<String>,
        destination: impl Into<String>,
        command: impl Into<String>,
        data: Value,
    ) -> Self {
        // ---
        Self {
            command: command.into(),
            ack: false,
            data,
            request_id: String::new(),
            destination: destination.into(),
            origin: origin.into(),
        }
    }

    /// Parse an inbound frame.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Protocol`] if the frame is not a message envelope.
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        // ---
        serde_json::from_str(frame.as_str())
            .map_err(|err| RpcError::Protocol(format!("malformed message: {err}")))
    }

    /// Serialize into a text frame.
    pub fn to_frame(&self) -> Result<Frame> {
        // ---
        Ok(Frame::from(serde_json::to_string(self)?))
    }

    /// Whether the payload reports success.
    ///
    /// An explicit `success` flag wins. Without one, the presence of an
    /// `error` string marks a failure.
    pub fn is_success(&self) -> bool {
        // ---
        match self.data.get("success").and_then(Value::as_bool) {
            Some(flag) => flag,
            None => self.error_message().is_none(),
        }
    }

    /// Error text carried by a failed response, if any.
    pub fn error_message(&self) -> Option<&str> {
        self.data.get("error").and_then(Value::as_str)
    }

    /// Convert a response into its payload, surfacing remote failures.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Remote`] when the response reports failure.
    pub fn into_result(self) -> Result<Value> {
        self.check().map(|message| message.data)
    }

    /// Pass a successful response through, or surface its remote failure.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Remote`] when the response reports failure.
    pub fn check(self) -> Result<Self> {
        // ---
        if self.is_success() {
            return Ok(self);
        }

        let message = self
            .error_message()
            .unwrap_or("remote service reported failure without an error message")
            .to_string();

        Err(RpcError::Remote {
            command: self.command,
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_field_names() {
        // ---
        let mut msg = Message::request("ping", "daemon", "wallet_ui", Value::Null);
        msg.request_id = "abc".into();

        let value: Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({
                "command": "ping",
                "ack": false,
                "data": {},
                "request_id": "abc",
                "destination": "daemon",
                "origin": "wallet_ui",
            })
        );
    }

    #[test]
    fn test_parse_sparse_event() {
        // ---
        let frame = Frame::from(r#"{"command":"new_farming_info","origin":"chia_farmer"}"#);
        let msg = Message::from_frame(&frame).unwrap();
        assert_eq!(msg.command, "new_farming_info");
        assert!(msg.request_id.is_empty());
        assert!(!msg.ack);
        assert_eq!(msg.data, Value::Null);
    }

    #[test]
    fn test_malformed_frame_is_protocol_error() {
        // ---
        let err = Message::from_frame(&Frame::from("not json")).unwrap_err();
        assert!(matches!(err, RpcError::Protocol(_)));

        let err = Message::from_frame(&Frame::from(r#"{"ack":true}"#)).unwrap_err();
        assert!(matches!(err, RpcError::Protocol(_)));
    }

    #[test]
    fn test_response_to_swaps_routing() {
        // ---
        let mut req = Message::request("get_status", "daemon", "wallet_ui", Value::Null);
        req.request_id = "42".into();

        let resp = Message::response_to(&req, json!({"success": true}));
        assert!(resp.ack);
        assert_eq!(resp.request_id, "42");
        assert_eq!(resp.origin, "daemon");
        assert_eq!(resp.destination, "wallet_ui");
    }

    #[test]
    fn test_success_and_error_detection() {
        // ---
        let req = Message::request("x", "daemon", "ui", Value::Null);

        let ok = Message::response_to(&req, json!({"success": true, "value": 1}));
        assert_eq!(ok.into_result().unwrap()["value"], 1);

        let implicit_ok = Message::response_to(&req, json!({"value": 1}));
        assert!(implicit_ok.is_success());

        let failed = Message::response_to(&req, json!({"success": false, "error": "nope"}));
        match failed.into_result() {
            Err(RpcError::Remote { command, message }) => {
                assert_eq!(command, "x");
                assert_eq!(message, "nope");
            }
            other => panic!("unexpected: {other:?}"),
        }

        let error_only = Message::response_to(&req, json!({"error": "bad"}));
        assert!(!error_only.is_success());
    }
}
