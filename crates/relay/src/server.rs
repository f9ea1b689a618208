// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket server implementation.
//!
//! Handles client connections, token verification, channel attachment and
//! event fanout.
//!
//! A connection must send `auth` before anything but `ping` is accepted.
//! Signature and key errors close the socket; an expired token only gets an
//! error reply so the client can re-authenticate on the same socket. The
//! relay also sends `token expired` on its own once the accepted token runs
//! out.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use pulse_core::protocol::{
    is_fatal_code, ERR_BAD_REQUEST, ERR_CAPABILITY_DENIED, ERR_TOKEN_EXPIRED,
};
use pulse_core::{ClientMessage, ServerMessage, TokenRequest};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::state::{ChannelEvent, RelayState};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Run the WebSocket server on the given address.
pub async fn run(addr: SocketAddr, state: RelayState) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on: {}", addr);
    serve(listener, state).await
}

/// Accept connections from an already bound listener.
pub async fn serve(
    listener: TcpListener,
    state: RelayState,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let state = state.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, state).await {
                error!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }
}

/// Per-connection protocol state.
#[derive(Debug, Default)]
pub(crate) struct Connection {
    id: Option<String>,
    token: Option<TokenRequest>,
    attached: HashSet<String>,
    expiry_sent: bool,
}

impl Connection {
    fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    fn wants(&self, event: &ChannelEvent) -> bool {
        self.attached.contains(&event.channel)
    }

    /// Time left on the accepted token, unless expiry was already reported.
    fn token_remaining(&self, now_ms: i64) -> Option<Duration> {
        if self.expiry_sent {
            return None;
        }
        let token = self.token.as_ref()?;
        let remaining = token.expires_at_ms().saturating_sub(now_ms).max(0);
        Some(Duration::from_millis(u64::try_from(remaining).unwrap_or(0)))
    }
}

/// What to do after processing a client frame.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct Reply {
    pub messages: Vec<ServerMessage>,
    pub close: bool,
}

impl Reply {
    fn none() -> Self {
        Reply::default()
    }

    fn one(message: ServerMessage) -> Self {
        Reply {
            messages: vec![message],
            close: false,
        }
    }

    fn closing(message: ServerMessage) -> Self {
        Reply {
            messages: vec![message],
            close: true,
        }
    }
}

/// Handle a single WebSocket connection.
pub(crate) async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: RelayState,
) -> Result<(), BoxError> {
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    info!("New WebSocket connection from: {}", peer_addr);

    let (mut ws_sink, mut ws_stream) = ws_stream.split();
    let mut broadcast_rx = state.subscribe();
    let mut conn = Connection::default();

    loop {
        let remaining = conn.token_remaining(state.now_ms());

        tokio::select! {
            // Handle incoming messages from client
            msg = ws_stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = handle_text(&text, &mut conn, &state);
                        for message in &reply.messages {
                            ws_sink.send(Message::Text(message.to_json()?.into())).await?;
                        }
                        if reply.close {
                            info!("Closing connection from {} after auth rejection", peer_addr);
                            let _ = ws_sink.close().await;
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("Client {} disconnected", peer_addr);
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        ws_sink.send(Message::Pong(data)).await?;
                    }
                    Some(Ok(_)) => {
                        // Ignore other message types (Binary, Pong, Frame)
                    }
                    Some(Err(e)) => {
                        error!("WebSocket error from {}: {}", peer_addr, e);
                        break;
                    }
                    None => {
                        info!("Client {} stream ended", peer_addr);
                        break;
                    }
                }
            }

            // Forward events on attached channels
            broadcast = broadcast_rx.recv() => {
                match broadcast {
                    Ok(event) => {
                        if !conn.wants(&event) {
                            continue;
                        }
                        let message = ServerMessage::event(event.channel, event.name, event.data);
                        if let Err(e) = ws_sink.send(Message::Text(message.to_json()?.into())).await {
                            warn!("Failed to send event to {}: {}", peer_addr, e);
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Client {} lagged by {} events", peer_addr, n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }

            // Tell the client its token ran out
            _ = tokio::time::sleep(remaining.unwrap_or_default()), if remaining.is_some() => {
                conn.expiry_sent = true;
                debug!("Token for {} expired", peer_addr);
                let message = ServerMessage::error(ERR_TOKEN_EXPIRED, "token expired; re-authenticate");
                ws_sink.send(Message::Text(message.to_json()?.into())).await?;
            }
        }
    }

    info!("Connection closed: {}", peer_addr);
    Ok(())
}

/// Process one text frame.
pub(crate) fn handle_text(text: &str, conn: &mut Connection, state: &RelayState) -> Reply {
    match ClientMessage::from_json(text) {
        Ok(msg) => handle_client_message(msg, conn, state),
        Err(e) => {
            debug!("Malformed client frame: {}", e);
            Reply::one(ServerMessage::error(
                ERR_BAD_REQUEST,
                format!("malformed message: {}", e),
            ))
        }
    }
}

/// Process a client message and return the replies.
pub(crate) fn handle_client_message(
    msg: ClientMessage,
    conn: &mut Connection,
    state: &RelayState,
) -> Reply {
    debug!("Received message: {:?}", msg);

    match msg {
        ClientMessage::Auth { token_request } => match state.authorize(&token_request) {
            Ok(()) => {
                let id = conn
                    .id
                    .get_or_insert_with(|| state.next_connection_id())
                    .clone();
                info!(connection_id = %id, key = %token_request.key_name, "authenticated");
                conn.token = Some(token_request);
                conn.expiry_sent = false;
                Reply::one(ServerMessage::connected(id))
            }
            Err(rejection) => {
                warn!(code = rejection.code, "auth rejected: {}", rejection.message);
                let message = ServerMessage::error(rejection.code, rejection.message);
                if is_fatal_code(rejection.code) {
                    Reply::closing(message)
                } else {
                    Reply::one(message)
                }
            }
        },

        ClientMessage::Ping { id } => Reply::one(ServerMessage::pong(id)),

        _ if !conn.is_authenticated() => Reply::one(ServerMessage::error(
            ERR_BAD_REQUEST,
            "authenticate before sending other messages",
        )),

        ClientMessage::Attach { channel } => {
            if let Some(reply) = check_access(conn, state, &channel) {
                return reply;
            }
            conn.attached.insert(channel.clone());
            debug!("Attached to {}", channel);
            Reply::one(ServerMessage::attached(channel))
        }

        ClientMessage::Detach { channel } => {
            conn.attached.remove(&channel);
            Reply::one(ServerMessage::detached(channel))
        }

        ClientMessage::Publish {
            channel,
            name,
            data,
        } => {
            if let Some(reply) = check_access(conn, state, &channel) {
                return reply;
            }
            let reached = state.publish(ChannelEvent {
                channel,
                name,
                data,
            });
            debug!("Published to {} connections", reached);
            Reply::none()
        }
    }
}

/// Error reply if the connection's token cannot be used for `channel`.
fn check_access(conn: &Connection, state: &RelayState, channel: &str) -> Option<Reply> {
    let token = conn.token.as_ref()?;
    if token.is_expired(state.now_ms()) {
        return Some(Reply::one(ServerMessage::error(
            ERR_TOKEN_EXPIRED,
            "token expired; re-authenticate",
        )));
    }
    if !token.allows(channel) {
        return Some(Reply::one(ServerMessage::error(
            ERR_CAPABILITY_DENIED,
            format!("token does not grant access to '{}'", channel),
        )));
    }
    None
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
