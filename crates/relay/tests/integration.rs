// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Integration tests for the pulse-relay binary.

#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::process::{Child, Command, Stdio};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use pulse_core::{ClientMessage, ServerMessage, TokenParams, TokenRequest};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

const KEY: &str = "it.key";
const SECRET: &str = "it-secret";

/// Spawns the relay and kills it on drop.
struct RelayProcess {
    child: Child,
    port: u16,
}

impl RelayProcess {
    fn spawn() -> Self {
        let port = 50152 + (std::process::id() % 1000) as u16;

        let child = Command::new(env!("CARGO_BIN_EXE_pulse-relay"))
            .arg("--bind")
            .arg(format!("127.0.0.1:{}", port))
            .arg("--key-name")
            .arg(KEY)
            .arg("--key-secret")
            .arg(SECRET)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn relay process");

        RelayProcess { child, port }
    }

    fn ws_url(&self) -> String {
        format!("ws://127.0.0.1:{}", self.port)
    }
}

impl Drop for RelayProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

async fn next_message<S>(stream: &mut S) -> ServerMessage
where
    S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    match tokio::time::timeout(Duration::from_secs(5), stream.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => ServerMessage::from_json(&text).unwrap(),
        other => panic!("Expected a text frame, got {:?}", other),
    }
}

#[tokio::test]
async fn relay_authenticates_and_answers_pings() {
    let relay = RelayProcess::spawn();

    // CI runners can be slow, so retry generously
    let mut ws_stream = None;
    for _ in 0..20 {
        if let Ok(Ok((stream, _))) =
            tokio::time::timeout(Duration::from_millis(500), connect_async(&relay.ws_url())).await
        {
            ws_stream = Some(stream);
            break;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    let ws_stream = ws_stream.expect("should connect to relay within retries");
    let (mut sink, mut stream) = ws_stream.split();

    let ping = serde_json::json!({"type": "ping", "id": 12345});
    sink.send(Message::Text(ping.to_string().into()))
        .await
        .expect("send ping");
    assert_eq!(next_message(&mut stream).await, ServerMessage::pong(12345));

    let request = TokenRequest::sign(
        KEY,
        SECRET,
        &TokenParams::for_channel("inventory"),
        chrono::Utc::now().timestamp_millis(),
        60_000,
        "it",
    );
    let auth = ClientMessage::auth(request).to_json().unwrap();
    sink.send(Message::Text(auth.into())).await.expect("send auth");

    match next_message(&mut stream).await {
        ServerMessage::Connected { connection_id } => assert!(connection_id.starts_with("conn-")),
        other => panic!("Expected connected, got {:?}", other),
    }
}
