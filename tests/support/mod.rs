// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Scripted in-memory hub for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::future::BoxFuture;
use hubsocket::{Client, ClientBuilder, Connector, ProtocolError, Transport, TransportPeer};
use serde_json::{Value, json};
use tokio::sync::{Mutex, mpsc};
use url::Url;

/// Version the mock hub advertises.
pub const HUB_VERSION: &str = "2024.6.1";

/// Connector handing each dialed connection to the test as a [`HubSession`].
pub struct MockConnector {
    sessions: mpsc::UnboundedSender<TransportPeer>,
    refusals: AtomicUsize,
    dials: AtomicUsize,
}

impl MockConnector {
    /// Refuses the next `count` dials.
    pub fn refuse_next(&self, count: usize) {
        self.refusals.store(count, Ordering::SeqCst);
    }

    /// Returns how many times the client dialed.
    pub fn dials(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }
}

impl Connector for MockConnector {
    fn connect<'a>(&'a self, _url: &'a Url) -> BoxFuture<'a, Result<Transport, ProtocolError>> {
        Box::pin(async move {
            self.dials.fetch_add(1, Ordering::SeqCst);
            let refused = self
                .refusals
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if refused {
                return Err(ProtocolError::ConnectionFailed("refused".to_string()));
            }

            let (transport, peer) = Transport::pair(64);
            self.sessions
                .send(peer)
                .map_err(|_| ProtocolError::ConnectionFailed("test hub gone".to_string()))?;
            Ok(transport)
        })
    }
}

/// The test's side of the mock hub.
pub struct MockHub {
    pub connector: Arc<MockConnector>,
    sessions: Mutex<mpsc::UnboundedReceiver<TransportPeer>>,
}

impl MockHub {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            connector: Arc::new(MockConnector {
                sessions: tx,
                refusals: AtomicUsize::new(0),
                dials: AtomicUsize::new(0),
            }),
            sessions: Mutex::new(rx),
        }
    }

    /// A builder wired to this hub.
    pub fn builder(&self) -> ClientBuilder {
        Client::builder()
            .host("hub.test:8123")
            .access_token("test-token")
            .connector(Arc::clone(&self.connector) as Arc<dyn Connector>)
    }

    /// A client with default settings wired to this hub.
    pub fn client(&self) -> Client {
        self.builder().build().expect("valid test config")
    }

    /// Waits for the client to dial.
    pub async fn accept(&self) -> HubSession {
        let peer = self
            .sessions
            .lock()
            .await
            .recv()
            .await
            .expect("connector dropped");
        HubSession {
            peer,
            answer_pings: true,
        }
    }

    /// Runs `client.run()` against a fresh session with the given states.
    ///
    /// Returns the session and the baseline subscription ID.
    pub async fn start(&self, client: &Client, states: Value) -> (HubSession, u64) {
        let run = {
            let client = client.clone();
            tokio::spawn(async move { client.run().await })
        };
        let mut session = self.accept().await;
        let baseline = session.serve_startup(states).await;
        run.await.expect("run task").expect("client run");
        (session, baseline)
    }
}

/// One connection as seen by the hub.
pub struct HubSession {
    peer: TransportPeer,
    /// Answer heartbeat pings transparently while waiting for other frames.
    pub answer_pings: bool,
}

impl HubSession {
    /// Receives the next raw frame, or `None` once the client hung up.
    pub async fn recv_raw(&mut self) -> Option<Value> {
        let text = self.peer.recv().await?;
        Some(serde_json::from_str(&text).expect("client sent invalid JSON"))
    }

    /// Receives the next frame that is not an answered ping.
    pub async fn recv(&mut self) -> Option<Value> {
        loop {
            let frame = self.recv_raw().await?;
            if self.answer_pings && frame["type"] == "ping" {
                self.pong(id_of(&frame)).await;
                continue;
            }
            return Some(frame);
        }
    }

    /// Receives the next frame and checks its type.
    pub async fn expect(&mut self, kind: &str) -> Value {
        let frame = self.recv().await.expect("client hung up");
        assert_eq!(frame["type"], kind, "unexpected frame {frame}");
        frame
    }

    /// Returns true if the client closed its side.
    pub async fn is_closed(&mut self) -> bool {
        tokio::time::timeout(Duration::from_secs(1), self.recv())
            .await
            .map(|frame| frame.is_none())
            .unwrap_or(false)
    }

    pub async fn send(&self, frame: Value) {
        assert!(self.peer.send(frame.to_string()).await, "client hung up");
    }

    /// Simulates a transport failure.
    pub async fn fail(&self) {
        self.peer
            .fail(ProtocolError::Transport("connection reset by peer".to_string()))
            .await;
    }

    // ========== Handshake ==========

    pub async fn greet(&self) {
        self.send(json!({"type": "auth_required", "ha_version": HUB_VERSION}))
            .await;
    }

    pub async fn handshake(&mut self) {
        self.greet().await;
        let auth = self.expect("auth").await;
        assert_eq!(auth["access_token"], "test-token");
        self.send(json!({"type": "auth_ok", "ha_version": HUB_VERSION}))
            .await;
    }

    /// Serves handshake, `get_states` and the baseline subscription.
    pub async fn serve_startup(&mut self, states: Value) -> u64 {
        self.handshake().await;

        let get_states = self.expect("get_states").await;
        self.reply(id_of(&get_states), states).await;

        let subscribe = self.expect("subscribe_events").await;
        assert_eq!(subscribe["event_type"], "state_changed");
        let baseline = id_of(&subscribe);
        self.reply(baseline, Value::Null).await;
        baseline
    }

    // ========== Replies ==========

    pub async fn reply(&self, id: u64, result: Value) {
        self.send(json!({"id": id, "type": "result", "success": true, "result": result}))
            .await;
    }

    pub async fn reply_error(&self, id: u64, code: &str, message: &str) {
        self.send(json!({
            "id": id,
            "type": "result",
            "success": false,
            "error": {"code": code, "message": message}
        }))
        .await;
    }

    pub async fn pong(&self, id: u64) {
        self.send(json!({"id": id, "type": "pong"})).await;
    }

    // ========== Events ==========

    pub async fn event(&self, subscription: u64, event_type: &str, data: Value) {
        self.send(json!({
            "id": subscription,
            "type": "event",
            "event": {
                "event_type": event_type,
                "data": data,
                "origin": "LOCAL",
                "time_fired": "2024-06-01T12:00:00+00:00"
            }
        }))
        .await;
    }

    pub async fn state_changed(&self, subscription: u64, entity_id: &str, old: Option<&str>, new: Option<&str>) {
        let snapshot = |state: &str| json!({"entity_id": entity_id, "state": state, "attributes": {}});
        self.event(
            subscription,
            "state_changed",
            json!({
                "entity_id": entity_id,
                "old_state": old.map(snapshot),
                "new_state": new.map(snapshot),
            }),
        )
        .await;
    }
}

pub fn id_of(frame: &Value) -> u64 {
    frame["id"].as_u64().expect("frame without id")
}

/// A `get_states` payload with one snapshot per `(entity_id, state)`.
pub fn states(entries: &[(&str, &str)]) -> Value {
    Value::Array(
        entries
            .iter()
            .map(|(entity_id, state)| {
                json!({
                    "entity_id": entity_id,
                    "state": state,
                    "attributes": {"friendly_name": entity_id},
                    "last_changed": "2024-06-01T11:00:00+00:00",
                    "last_updated": "2024-06-01T11:00:00+00:00",
                    "context": {"id": "01HZX", "parent_id": null, "user_id": null}
                })
            })
            .collect(),
    )
}

/// Polls `check` until it holds, failing after a few seconds.
pub async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}
