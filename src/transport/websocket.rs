//! Secure websocket transport using `tokio-tungstenite`.
//!
//! This module implements the `Transport` trait over a `wss://` connection
//! to the daemon, authenticated with the endpoint's client certificate. It
//! follows an **actor-based concurrency model**.
//!
//! ## Concurrency model
//!
//! - A single background **actor task** owns the socket (both halves).
//! - The actor is responsible for:
//!   - writing outbound text frames handed to it by `send()`,
//!   - reading inbound frames and forwarding them, in arrival order, to the
//!     channel's single inbound sequence,
//!   - the close handshake.
//! - `send()` only enqueues a command; it never waits for the write.
//!
//! ## Connection behavior
//!
//! Connection is **eager**: [`create_websocket_transport`] resolves, dials,
//! completes TLS and the websocket upgrade within the configured deadline,
//! and only then spawns the actor. Failures are reported as distinct
//! [`ConnectError`] kinds. There is no reconnect; a dead link stays dead and
//! the composition root decides whether to open a new one.
//!
//! ## Closure
//!
//! When the daemon closes the socket, or a read/write fails, the actor marks
//! the link closed before it exits and drops the inbound sender, which ends
//! the inbound sequence. Later `send()` calls fail with
//! [`RpcError::ConnectionClosed`].

use std::sync::{Arc, Mutex};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_tungstenite::{connect_async_tls_with_config, Connector, MaybeTlsStream, WebSocketStream};

use crate::sync::lock_ignore_poison;
use crate::transport::tls;
use crate::{
    //
    ConnectError,
    Endpoint,
    Frame,
    Inbound,
    LinkStatus,
    Result,
    RpcConfig,
    RpcError,
    Scheme,
    Transport,
    TransportBase,
    TransportPtr,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const COMMAND_CAPACITY: usize = 64;

//
// Actor commands
//

enum Cmd {
    //
    Send { frame: Frame },
    Close { resp: oneshot::Sender<()> },
}

enum ActorStep {
    //
    Continue,
    Stop,
}

/// Websocket implementation of the `Transport` trait.
///
/// Represents a single authenticated connection to one daemon.
pub struct WebSocketTransport {
    // ---
    base: TransportBase,
    cmd_tx: mpsc::Sender<Cmd>,
    inbound: Mutex<Option<Inbound>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl WebSocketTransport {
    // ---

    /// Spawn the connection actor for an established socket.
    fn spawn(transport_id: String, socket: WsStream, inbound_capacity: usize) -> TransportPtr {
        // ---
        let base = TransportBase::new(transport_id);

        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (inbound_tx, inbound_rx) = mpsc::channel(inbound_capacity.max(1));
        let (sink, stream) = socket.split();

        let actor = WebSocketActor {
            transport_id: base.transport_id.clone(),
            sink,
            stream,
            cmd_rx,
            inbound_tx,
            status: Arc::clone(&base.status),
        };

        let inbound = Inbound::new(inbound_rx, Arc::clone(&base.status));
        let task = tokio::spawn(actor.run());

        Arc::new(Self {
            base,
            cmd_tx,
            inbound: Mutex::new(Some(inbound)),
            task: Mutex::new(Some(task)),
        })
    }
}

struct WebSocketActor {
    // ---
    transport_id: String, // for logging only
    sink: SplitSink<WsStream, WsMessage>,
    stream: SplitStream<WsStream>,
    cmd_rx: mpsc::Receiver<Cmd>,
    inbound_tx: mpsc::Sender<Frame>,
    status: Arc<LinkStatus>,
}

impl WebSocketActor {
    // ---

    async fn run(mut self) {
        // ---
        log_debug!("{}: connection actor started", self.transport_id);

        loop {
            let step = tokio::select! {
                cmd = self.cmd_rx.recv() => self.handle_cmd(cmd).await,
                incoming = self.stream.next() => self.handle_incoming(incoming).await,
            };

            if matches!(step, ActorStep::Stop) {
                break;
            }
        }

        // Dependents must observe the closure before the inbound sequence ends.
        self.status.mark_closed();
        log_info!("{}: connection closed", self.transport_id);
    }

    async fn handle_cmd(&mut self, cmd: Option<Cmd>) -> ActorStep {
        // ---
        match cmd {
            Some(Cmd::Send { frame }) => {
                log_trace!("{}: write {} bytes", self.transport_id, frame.len());
                match self.sink.send(WsMessage::Text(frame.as_str().to_owned())).await {
                    Ok(()) => ActorStep::Continue,
                    Err(_err) => {
                        log_error!("{}: write failed: {_err}", self.transport_id);
                        ActorStep::Stop
                    }
                }
            }
            Some(Cmd::Close { resp }) => {
                self.shutdown().await;
                let _ = resp.send(());
                ActorStep::Stop
            }
            None => {
                // Every transport handle is gone.
                self.shutdown().await;
                ActorStep::Stop
            }
        }
    }

    async fn handle_incoming(
        &mut self,
        incoming: Option<std::result::Result<WsMessage, WsError>>,
    ) -> ActorStep {
        // ---
        match incoming {
            Some(Ok(WsMessage::Text(text))) => self.deliver(Frame::from(text)).await,
            Some(Ok(WsMessage::Binary(bytes))) => match String::from_utf8(bytes) {
                Ok(text) => self.deliver(Frame::from(text)).await,
                Err(_err) => {
                    log_warn!(
                        "{}: dropping non-UTF-8 binary frame: {_err}",
                        self.transport_id
                    );
                    ActorStep::Continue
                }
            },
            Some(Ok(WsMessage::Ping(_))) | Some(Ok(WsMessage::Pong(_))) => {
                // tungstenite queues the pong reply itself
                ActorStep::Continue
            }
            Some(Ok(WsMessage::Close(_frame))) => {
                log_info!("{}: daemon closed the socket: {_frame:?}", self.transport_id);
                ActorStep::Stop
            }
            Some(Ok(WsMessage::Frame(_))) => ActorStep::Continue,
            Some(Err(_err)) => {
                log_error!("{}: read failed: {_err}", self.transport_id);
                ActorStep::Stop
            }
            None => {
                log_info!("{}: socket stream ended", self.transport_id);
                ActorStep::Stop
            }
        }
    }

    async fn deliver(&mut self, frame: Frame) -> ActorStep {
        // ---
        log_trace!("{}: read {} bytes", self.transport_id, frame.len());
        match self.inbound_tx.send(frame).await {
            Ok(()) => ActorStep::Continue,
            Err(_) => {
                log_debug!("{}: inbound consumer gone", self.transport_id);
                ActorStep::Stop
            }
        }
    }

    async fn shutdown(&mut self) {
        // ---
        log_debug!("{}: closing socket", self.transport_id);
        if let Err(_err) = self.sink.close().await {
            log_debug!("{}: close handshake failed: {_err}", self.transport_id);
        }
    }
} // WebSocketActor

#[async_trait::async_trait]
impl Transport for WebSocketTransport {
    // ---

    fn base(&self) -> &TransportBase {
        &self.base
    }

    async fn send(&self, frame: Frame) -> Result<()> {
        // ---
        if self.is_closed() {
            return Err(RpcError::ConnectionClosed);
        }

        self.cmd_tx
            .send(Cmd::Send { frame })
            .await
            .map_err(|_| RpcError::ConnectionClosed)
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
        self.base.status.mark_closed_locally();

        let (tx, rx) = oneshot::channel();
        if self.cmd_tx.send(Cmd::Close { resp: tx }).await.is_ok() {
            let _ = rx.await;
        }

        let task = lock_ignore_poison(&self.task).take();
        if let Some(task) = task {
            let _ = task.await;
        }

        Ok(())
    }
}

/// Open a secure websocket channel to `endpoint`.
///
/// Credentials are loaded first, so an unreadable or invalid certificate
/// fails without touching the network. DNS, TCP, TLS, and the websocket
/// upgrade must all complete within `config.connect_timeout`.
///
/// # Errors
///
/// Returns [`RpcError::Connect`] with:
/// - [`ConnectError::UnsupportedScheme`] for non-`wss` endpoints
/// - [`ConnectError::Tls`] for credential or TLS handshake failures
/// - [`ConnectError::Network`] for DNS/TCP failures
/// - [`ConnectError::Handshake`] when the websocket upgrade is refused
/// - [`ConnectError::Timeout`] when the deadline elapses
pub async fn create_websocket_transport(
    endpoint: &Endpoint,
    config: &RpcConfig,
) -> Result<TransportPtr> {
    // ---
    if endpoint.scheme() != Scheme::Wss {
        return Err(ConnectError::UnsupportedScheme(endpoint.scheme().to_string()).into());
    }

    let connector = tls::connector(endpoint)?;

    let request = endpoint
        .uri()
        .as_str()
        .into_client_request()
        .map_err(|err| ConnectError::InvalidEndpoint(err.to_string()))?;

    let mut ws_config = WebSocketConfig::default();
    ws_config.max_message_size = Some(config.max_message_size);
    ws_config.max_frame_size = Some(config.max_message_size);

    log_debug!(
        "{}: connecting to {}",
        config.transport_id,
        endpoint.authority()
    );

    let connecting = connect_async_tls_with_config(
        request,
        Some(ws_config),
        false,
        Some(Connector::NativeTls(connector)),
    );

    let socket = match time::timeout(config.connect_timeout, connecting).await {
        Ok(Ok((socket, _response))) => socket,
        Ok(Err(err)) => return Err(classify_connect_error(err).into()),
        Err(_elapsed) => return Err(ConnectError::Timeout.into()),
    };

    log_info!(
        "{}: connected to {}",
        config.transport_id,
        endpoint.authority()
    );

    Ok(WebSocketTransport::spawn(
        config.transport_id.clone(),
        socket,
        config.inbound_capacity,
    ))
}

fn classify_connect_error(err: WsError) -> ConnectError {
    // ---
    match err {
        WsError::Io(err) => ConnectError::Network(err.to_string()),
        WsError::Tls(err) => ConnectError::Tls(err.to_string()),
        WsError::Url(err) => ConnectError::InvalidEndpoint(err.to_string()),
        other => ConnectError::Handshake(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    // ---
    use std::time::Duration;

    use tokio::net::TcpListener;

    use super::*;

    type ServerStream = WebSocketStream<TcpStream>;

    /// Plain `ws://` pair: the daemon side and a transport over the client side.
    async fn socket_pair() -> (ServerStream, TransportPtr) {
        // ---
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            tokio_tungstenite::accept_async(tcp).await.unwrap()
        });

        let (socket, _response) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .unwrap();
        let transport = WebSocketTransport::spawn("ws-test".into(), socket, 8);

        (server.await.unwrap(), transport)
    }

    async fn next_text(server: &mut ServerStream) -> Option<String> {
        // ---
        while let Some(msg) = server.next().await {
            match msg.unwrap() {
                WsMessage::Text(text) => return Some(text),
                WsMessage::Close(_) => return None,
                _ => continue,
            }
        }
        None
    }

    #[tokio::test]
    async fn test_frames_flow_both_ways() {
        // ---
        let (mut server, transport) = socket_pair().await;
        let mut inbound = transport.take_inbound().unwrap();

        transport.send(Frame::from("hello")).await.unwrap();
        assert_eq!(next_text(&mut server).await.as_deref(), Some("hello"));

        server.send(WsMessage::Text("world".into())).await.unwrap();
        assert_eq!(inbound.recv().await.unwrap().as_str(), "world");

        server.send(WsMessage::Binary(b"utf8 binary".to_vec())).await.unwrap();
        assert_eq!(inbound.recv().await.unwrap().as_str(), "utf8 binary");

        assert!(transport.take_inbound().is_err());
        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_bad_binary_and_ping_are_skipped() {
        // ---
        let (mut server, transport) = socket_pair().await;
        let mut inbound = transport.take_inbound().unwrap();

        server.send(WsMessage::Binary(vec![0xff, 0xfe, 0xfd])).await.unwrap();
        server.send(WsMessage::Ping(b"are you there".to_vec())).await.unwrap();
        server.send(WsMessage::Text("after".into())).await.unwrap();

        assert_eq!(inbound.recv().await.unwrap().as_str(), "after");
        assert!(!transport.is_closed());

        // The pong went out on the same socket.
        let pong = tokio::time::timeout(Duration::from_secs(5), server.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(pong, WsMessage::Pong(b"are you there".to_vec()));

        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_remote_close_ends_inbound() {
        // ---
        let (mut server, transport) = socket_pair().await;
        let mut inbound = transport.take_inbound().unwrap();

        server.send(WsMessage::Text("last".into())).await.unwrap();
        server.close(None).await.unwrap();

        assert_eq!(inbound.recv().await.unwrap().as_str(), "last");
        assert!(inbound.recv().await.is_none());

        assert!(transport.is_closed());
        assert!(matches!(
            transport.send(Frame::from("too late")).await,
            Err(RpcError::ConnectionClosed)
        ));

        // Closing a remotely closed link is still fine.
        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_local_close_is_idempotent() {
        // ---
        let (mut server, transport) = socket_pair().await;
        let mut inbound = transport.take_inbound().unwrap();

        transport.close().await.unwrap();
        transport.close().await.unwrap();

        assert!(transport.is_closed());
        assert!(inbound.recv().await.is_none());
        assert!(matches!(
            transport.send(Frame::from("after close")).await,
            Err(RpcError::ConnectionClosed)
        ));

        // The daemon side sees the close handshake, not more data.
        assert_eq!(next_text(&mut server).await, None);
    }
}
