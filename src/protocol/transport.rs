// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Duplex text transport to the hub.
//!
//! A [`Transport`] is a pair of channels: text frames to send, and text
//! frames (or transport failures) received. The default
//! [`WebSocketConnector`] backs it with a `tokio-tungstenite` socket driven
//! by one writer task and one reader task. Tests and embedders can supply
//! their own [`Connector`], typically built on [`Transport::pair`].

use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use crate::error::ProtocolError;

/// Buffered outbound frames per connection.
const OUTBOUND_CAPACITY: usize = 64;

/// Buffered inbound frames per connection.
const INBOUND_CAPACITY: usize = 256;

/// Opens transports to the hub.
pub trait Connector: Send + Sync + 'static {
    /// Dials the given URL.
    fn connect<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<Transport, ProtocolError>>;
}

/// One established connection.
///
/// Dropping the outbound sender closes the connection.
#[derive(Debug)]
pub struct Transport {
    pub(crate) outgoing: mpsc::Sender<String>,
    pub(crate) incoming: mpsc::Receiver<Result<String, ProtocolError>>,
}

impl Transport {
    /// Creates a transport from its two channel halves.
    #[must_use]
    pub fn new(
        outgoing: mpsc::Sender<String>,
        incoming: mpsc::Receiver<Result<String, ProtocolError>>,
    ) -> Self {
        Self { outgoing, incoming }
    }

    /// Creates an in-memory transport and the peer that plays the hub.
    #[must_use]
    pub fn pair(capacity: usize) -> (Self, TransportPeer) {
        let (out_tx, out_rx) = mpsc::channel(capacity);
        let (in_tx, in_rx) = mpsc::channel(capacity);
        (
            Self::new(out_tx, in_rx),
            TransportPeer {
                from_client: out_rx,
                to_client: in_tx,
            },
        )
    }

    /// Sends one frame directly, bypassing request correlation.
    pub(crate) async fn send(&self, frame: String) -> Result<(), ProtocolError> {
        self.outgoing
            .send(frame)
            .await
            .map_err(|_| ProtocolError::Closed)
    }

    /// Receives one frame directly.
    pub(crate) async fn recv(&mut self) -> Result<String, ProtocolError> {
        self.incoming.recv().await.unwrap_or(Err(ProtocolError::Closed))
    }
}

/// The far end of an in-memory [`Transport`].
#[derive(Debug)]
pub struct TransportPeer {
    from_client: mpsc::Receiver<String>,
    to_client: mpsc::Sender<Result<String, ProtocolError>>,
}

impl TransportPeer {
    /// Receives the next frame the client sent, or `None` once it hung up.
    pub async fn recv(&mut self) -> Option<String> {
        self.from_client.recv().await
    }

    /// Delivers a frame to the client. Returns false if it hung up.
    pub async fn send(&self, frame: impl Into<String>) -> bool {
        self.to_client.send(Ok(frame.into())).await.is_ok()
    }

    /// Delivers a transport failure to the client.
    pub async fn fail(&self, error: ProtocolError) -> bool {
        self.to_client.send(Err(error)).await.is_ok()
    }
}

/// Connector for real hubs over `ws://` or `wss://`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl Connector for WebSocketConnector {
    fn connect<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<Transport, ProtocolError>> {
        Box::pin(async move {
            tracing::info!(url = %url, "Connecting to websocket");

            let (stream, _response) = tokio_tungstenite::connect_async(url.as_str())
                .await
                .map_err(|e| ProtocolError::ConnectionFailed(e.to_string()))?;
            let (mut sink, mut source) = stream.split();

            let (out_tx, mut out_rx) = mpsc::channel::<String>(OUTBOUND_CAPACITY);
            let (in_tx, in_rx) = mpsc::channel(INBOUND_CAPACITY);

            // Single writer: every outbound frame passes through this task.
            tokio::spawn(async move {
                while let Some(frame) = out_rx.recv().await {
                    if let Err(e) = sink.send(Message::Text(frame.into())).await {
                        tracing::warn!(error = %e, "Websocket write failed");
                        break;
                    }
                }
                let _ = sink.close().await;
                tracing::debug!("Websocket writer stopped");
            });

            tokio::spawn(async move {
                while let Some(message) = source.next().await {
                    let forwarded = match message {
                        Ok(Message::Text(text)) => Ok(text.as_str().to_owned()),
                        Ok(Message::Close(frame)) => {
                            tracing::info!(?frame, "Websocket close frame received");
                            break;
                        }
                        // tungstenite answers control frames itself
                        Ok(_) => continue,
                        Err(e) => Err(ProtocolError::Transport(e.to_string())),
                    };
                    let failed = forwarded.is_err();
                    if in_tx.send(forwarded).await.is_err() || failed {
                        break;
                    }
                }
                tracing::debug!("Websocket reader stopped");
            });

            Ok(Transport::new(out_tx, in_rx))
        })
    }
}
