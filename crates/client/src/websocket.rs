// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket transport for the relay protocol.
//!
//! Each `connect` call spawns one socket task that owns the connection:
//!
//! ```text
//! authenticate ──► open socket ──► send auth ──► wait for connected ──► pump frames
//!      ▲                                                                    │
//!      └──────────────── backoff ◄── disconnected ◄── connection lost ◄─────┘
//! ```
//!
//! The task reports every state change through the [`EventSink`]. If it
//! cannot reconnect within `suspend_after`, it reports `suspended` and stops
//! until `connect` is called again. An exhausted [`AuthGate`] or a fatal
//! server error code reports `failed` and also stops the task.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use pulse_core::protocol::{is_fatal_code, ERR_CAPABILITY_DENIED, ERR_TOKEN_EXPIRED};
use pulse_core::{ClientMessage, ServerMessage, TokenParams, TransportState};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::auth::{AuthError, AuthGate};
use crate::channel::DEFAULT_CHANNEL;
use crate::transport::{
    ChannelMessage, ErrorInfo, EventSink, StateChange, Transport, TransportError,
    TransportFactory, TransportResult, CODE_CONNECTION_LOST, CODE_UNREACHABLE,
};
use crate::BoxFuture;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Connection settings for [`WebSocketTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebSocketOptions {
    /// Relay URL (`ws://` or `wss://`).
    pub url: String,
    /// Channel the requested token must grant.
    pub channel: String,
    /// Client identity requested for the token.
    pub client_id: Option<String>,
    /// Initial delay for exponential backoff (milliseconds).
    pub initial_delay_ms: u64,
    /// Maximum delay between reconnection attempts (seconds).
    pub max_delay_secs: u64,
    /// How long to keep retrying before reporting `suspended`.
    pub suspend_after: Duration,
    /// Limit for opening the socket and for the relay to confirm auth.
    pub handshake_timeout: Duration,
}

impl Default for WebSocketOptions {
    fn default() -> Self {
        WebSocketOptions {
            url: "ws://127.0.0.1:7891".to_string(),
            channel: DEFAULT_CHANNEL.to_string(),
            client_id: None,
            initial_delay_ms: 100,
            max_delay_secs: 30,
            suspend_after: Duration::from_secs(120),
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

impl WebSocketOptions {
    fn token_params(&self) -> TokenParams {
        TokenParams {
            client_id: self.client_id.clone(),
            ..TokenParams::for_channel(self.channel.clone())
        }
    }
}

/// Creates one [`WebSocketTransport`] per connection session.
#[derive(Debug, Clone)]
pub struct WebSocketFactory {
    options: Arc<WebSocketOptions>,
}

impl WebSocketFactory {
    pub fn new(options: WebSocketOptions) -> Self {
        WebSocketFactory {
            options: Arc::new(options),
        }
    }

    pub fn options(&self) -> &WebSocketOptions {
        &self.options
    }
}

impl TransportFactory for WebSocketFactory {
    type Transport = WebSocketTransport;

    fn create(&mut self, auth: AuthGate, events: EventSink) -> WebSocketTransport {
        WebSocketTransport::new(Arc::clone(&self.options), auth, events)
    }
}

/// Transport state shared between the transport and its socket task.
///
/// Uses an atomic so `state()` never waits on the socket task.
#[derive(Debug)]
struct SharedState {
    state: AtomicU8,
}

impl SharedState {
    fn new() -> Self {
        SharedState {
            state: AtomicU8::new(TransportState::Initialized.as_u8()),
        }
    }

    fn get(&self) -> TransportState {
        TransportState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn swap(&self, state: TransportState) -> TransportState {
        TransportState::from_u8(self.state.swap(state.as_u8(), Ordering::AcqRel))
    }
}

/// WebSocket transport implementation using tokio-tungstenite.
pub struct WebSocketTransport {
    options: Arc<WebSocketOptions>,
    gate: AuthGate,
    sink: EventSink,
    shared: Arc<SharedState>,
    /// Frames for the current socket task, if one is running.
    outbound: Option<mpsc::UnboundedSender<ClientMessage>>,
    /// Stops the current socket task.
    cancel: Option<CancellationToken>,
}

impl WebSocketTransport {
    pub fn new(options: Arc<WebSocketOptions>, gate: AuthGate, sink: EventSink) -> Self {
        WebSocketTransport {
            options,
            gate,
            sink,
            shared: Arc::new(SharedState::new()),
            outbound: None,
            cancel: None,
        }
    }

    fn stop_task(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        self.outbound = None;
    }

    fn send(&self, message: ClientMessage) -> TransportResult<()> {
        if self.shared.get() != TransportState::Connected {
            return Err(TransportError::ConnectionClosed);
        }
        let outbound = self
            .outbound
            .as_ref()
            .ok_or(TransportError::ConnectionClosed)?;
        outbound
            .send(message)
            .map_err(|_| TransportError::SendFailed("socket task has stopped".to_string()))
    }
}

impl Transport for WebSocketTransport {
    fn connect(&mut self) -> BoxFuture<'_, TransportResult<()>> {
        Box::pin(async move {
            let previous = self.shared.get();
            match previous {
                TransportState::Connecting | TransportState::Connected => return Ok(()),
                TransportState::Closed => return Err(TransportError::ConnectionClosed),
                _ => {}
            }

            self.stop_task();
            let cancel = CancellationToken::new();
            let (tx, rx) = mpsc::unbounded_channel();
            self.outbound = Some(tx);
            self.cancel = Some(cancel.clone());

            self.shared.swap(TransportState::Connecting);
            self.sink.state(StateChange {
                previous,
                current: TransportState::Connecting,
                reason: None,
            });

            let task = SocketTask {
                params: self.options.token_params(),
                options: Arc::clone(&self.options),
                gate: self.gate.clone(),
                sink: self.sink.clone(),
                shared: Arc::clone(&self.shared),
                outbound: rx,
                cancel,
            };
            tokio::spawn(task.run());
            Ok(())
        })
    }

    fn close(&mut self) -> BoxFuture<'_, TransportResult<()>> {
        Box::pin(async move {
            self.stop_task();
            let previous = self.shared.swap(TransportState::Closed);
            if previous != TransportState::Closed {
                debug!(session = self.sink.session(), "websocket transport closed");
                self.sink.state(StateChange {
                    previous,
                    current: TransportState::Closed,
                    reason: None,
                });
            }
            Ok(())
        })
    }

    fn state(&self) -> TransportState {
        self.shared.get()
    }

    fn subscribe<'a>(&'a mut self, channel: &'a str) -> BoxFuture<'a, TransportResult<()>> {
        Box::pin(async move { self.send(ClientMessage::attach(channel)) })
    }

    fn unsubscribe<'a>(&'a mut self, channel: &'a str) -> BoxFuture<'a, TransportResult<()>> {
        Box::pin(async move { self.send(ClientMessage::detach(channel)) })
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.stop_task();
    }
}

/// How one socket session ended.
#[derive(Debug)]
enum SocketOutcome {
    /// The transport was closed, dropped or reconnected.
    Cancelled,
    /// The connection dropped or could not be made; worth retrying.
    Lost { reason: ErrorInfo, was_connected: bool },
    /// Retrying cannot help.
    Fatal(ErrorInfo),
}

impl SocketOutcome {
    fn lost(code: u16, message: impl Into<String>, was_connected: bool) -> Self {
        SocketOutcome::Lost {
            reason: ErrorInfo::new(code, message),
            was_connected,
        }
    }

    fn from_auth(err: AuthError, gate: &AuthGate) -> Self {
        if err.is_exhausted() {
            return SocketOutcome::Fatal(ErrorInfo::from_auth(&err));
        }
        if gate.is_exhausted() {
            // this failure used up the last attempt
            let exhausted = AuthError::Exhausted {
                attempts: gate.failures(),
            };
            return SocketOutcome::Fatal(ErrorInfo::from_auth(&exhausted));
        }
        SocketOutcome::Lost {
            reason: ErrorInfo::from_auth(&err),
            was_connected: false,
        }
    }
}

struct SocketTask {
    options: Arc<WebSocketOptions>,
    params: TokenParams,
    gate: AuthGate,
    sink: EventSink,
    shared: Arc<SharedState>,
    outbound: mpsc::UnboundedReceiver<ClientMessage>,
    cancel: CancellationToken,
}

impl SocketTask {
    /// Connect, and reconnect with exponential backoff until suspended,
    /// failed or cancelled.
    async fn run(mut self) {
        let session = self.sink.session();
        let initial_delay_ms = self.options.initial_delay_ms;
        let max_delay_ms = self.options.max_delay_secs.saturating_mul(1000);
        let mut delay_ms = initial_delay_ms;
        let mut stalled_since = Instant::now();
        let mut attempt = 0u32;

        loop {
            attempt = attempt.saturating_add(1);
            debug!(session, attempt, url = %self.options.url, "opening realtime socket");

            match self.connect_once().await {
                SocketOutcome::Cancelled => return,
                SocketOutcome::Fatal(reason) => {
                    self.transition(TransportState::Failed, Some(reason));
                    return;
                }
                SocketOutcome::Lost {
                    reason,
                    was_connected,
                } => {
                    if was_connected {
                        stalled_since = Instant::now();
                        delay_ms = initial_delay_ms;
                        attempt = 0;
                    }
                    if stalled_since.elapsed() >= self.options.suspend_after {
                        self.transition(TransportState::Suspended, Some(reason));
                        return;
                    }
                    debug!(session, attempt, delay_ms, "realtime socket lost: {}", reason);
                    self.transition(TransportState::Disconnected, Some(reason));
                }
            }

            // Wait with exponential backoff, checking for cancellation
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = tokio::time::sleep(Duration::from_millis(delay_ms)) => {}
            }
            delay_ms = std::cmp::min(delay_ms.saturating_mul(2), max_delay_ms);
            self.transition(TransportState::Connecting, None);
        }
    }

    async fn connect_once(&mut self) -> SocketOutcome {
        let cancel = self.cancel.clone();
        tokio::select! {
            _ = cancel.cancelled() => SocketOutcome::Cancelled,
            outcome = self.session() => outcome,
        }
    }

    /// One socket from authentication to disconnection.
    async fn session(&mut self) -> SocketOutcome {
        let token_request = match self.gate.authenticate(&self.params).await {
            Ok(request) => request,
            Err(e) => return SocketOutcome::from_auth(e, &self.gate),
        };

        let timeout = self.options.handshake_timeout;
        let opened = tokio::time::timeout(
            timeout,
            tokio_tungstenite::connect_async(self.options.url.as_str()),
        )
        .await;
        let ws = match opened {
            Ok(Ok((ws, _))) => ws,
            Ok(Err(e)) => return SocketOutcome::lost(CODE_UNREACHABLE, e.to_string(), false),
            Err(_) => return SocketOutcome::lost(CODE_UNREACHABLE, "socket open timed out", false),
        };
        let (mut sink, mut source) = ws.split();

        if let Err(e) = send_frame(&mut sink, &ClientMessage::auth(token_request)).await {
            return SocketOutcome::lost(CODE_CONNECTION_LOST, e, false);
        }
        let connection_id = match tokio::time::timeout(timeout, await_connected(&mut source)).await
        {
            Ok(Ok(id)) => id,
            Ok(Err(outcome)) => return outcome,
            Err(_) => {
                return SocketOutcome::lost(CODE_UNREACHABLE, "relay did not confirm auth", false)
            }
        };

        // frames queued for an earlier socket are meaningless on this one
        while self.outbound.try_recv().is_ok() {}

        info!(session = self.sink.session(), connection_id = %connection_id, "realtime connected");
        self.transition(TransportState::Connected, None);
        self.pump(&mut sink, &mut source).await
    }

    /// Forward outbound frames and deliver inbound events until the socket
    /// ends.
    async fn pump(&mut self, sink: &mut WsSink, source: &mut WsSource) -> SocketOutcome {
        loop {
            tokio::select! {
                outbound = self.outbound.recv() => {
                    let Some(message) = outbound else {
                        let _ = sink.send(Message::Close(None)).await;
                        return SocketOutcome::Cancelled;
                    };
                    trace!("sending {:?}", message);
                    if let Err(e) = send_frame(sink, &message).await {
                        return SocketOutcome::lost(CODE_CONNECTION_LOST, e, true);
                    }
                }
                frame = source.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(outcome) = self.on_text(sink, &text).await {
                            return outcome;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        return SocketOutcome::lost(CODE_CONNECTION_LOST, "closed by relay", true);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        return SocketOutcome::lost(CODE_CONNECTION_LOST, e.to_string(), true);
                    }
                },
            }
        }
    }

    async fn on_text(&mut self, sink: &mut WsSink, text: &str) -> Option<SocketOutcome> {
        let message = match ServerMessage::from_json(text) {
            Ok(message) => message,
            Err(e) => {
                warn!("ignoring malformed relay frame: {}", e);
                return None;
            }
        };

        match message {
            ServerMessage::Event {
                channel,
                name,
                data,
            } => {
                self.sink.message(ChannelMessage {
                    channel,
                    name,
                    data,
                });
            }
            ServerMessage::Error { code, message } if code == ERR_TOKEN_EXPIRED => {
                debug!("token expired; renewing");
                let request = match self.gate.authenticate(&self.params).await {
                    Ok(request) => request,
                    Err(e) => {
                        return Some(match SocketOutcome::from_auth(e, &self.gate) {
                            SocketOutcome::Lost { reason, .. } => SocketOutcome::Lost {
                                reason,
                                was_connected: true,
                            },
                            other => other,
                        });
                    }
                };
                trace!("renewing after: {}", message);
                if let Err(e) = send_frame(sink, &ClientMessage::auth(request)).await {
                    return Some(SocketOutcome::lost(CODE_CONNECTION_LOST, e, true));
                }
            }
            ServerMessage::Error { code, message } if code == ERR_CAPABILITY_DENIED => {
                warn!(code, "channel access denied: {}", message);
            }
            ServerMessage::Error { code, message } if is_fatal_code(code) => {
                return Some(SocketOutcome::Fatal(ErrorInfo::new(code, message)));
            }
            ServerMessage::Error { code, message } => {
                warn!(code, "relay error: {}", message);
            }
            other => trace!("relay frame: {:?}", other),
        }
        None
    }

    /// Apply a state change unless this task has been superseded.
    fn transition(&self, current: TransportState, reason: Option<ErrorInfo>) {
        if self.cancel.is_cancelled() {
            return;
        }
        let previous = self.shared.swap(current);
        if previous != current || reason.is_some() {
            self.sink.state(StateChange {
                previous,
                current,
                reason,
            });
        }
    }
}

async fn send_frame(sink: &mut WsSink, message: &ClientMessage) -> Result<(), String> {
    let json = message.to_json().map_err(|e| e.to_string())?;
    sink.send(Message::Text(json.into()))
        .await
        .map_err(|e| e.to_string())
}

/// Read frames until the relay accepts or rejects the auth frame.
async fn await_connected(source: &mut WsSource) -> Result<String, SocketOutcome> {
    loop {
        match source.next().await {
            Some(Ok(Message::Text(text))) => match ServerMessage::from_json(&text) {
                Ok(ServerMessage::Connected { connection_id }) => return Ok(connection_id),
                Ok(ServerMessage::Error { code, message }) if is_fatal_code(code) => {
                    return Err(SocketOutcome::Fatal(ErrorInfo::new(code, message)));
                }
                Ok(ServerMessage::Error { code, message }) => {
                    return Err(SocketOutcome::lost(code, message, false));
                }
                Ok(other) => trace!("frame before connected: {:?}", other),
                Err(e) => warn!("ignoring malformed relay frame: {}", e),
            },
            Some(Ok(Message::Close(_))) | None => {
                return Err(SocketOutcome::lost(
                    CODE_CONNECTION_LOST,
                    "relay closed the socket during auth",
                    false,
                ));
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                return Err(SocketOutcome::lost(CODE_CONNECTION_LOST, e.to_string(), false));
            }
        }
    }
}

#[cfg(test)]
#[path = "websocket_tests.rs"]
mod tests;
