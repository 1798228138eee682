// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Request/response correlation.
//!
//! The [`Correlator`] assigns request IDs, writes commands through the single
//! outbound channel of the current connection, and routes each `result` or
//! `pong` reply back to the task waiting for it.
//!
//! # Generations
//!
//! Every reconnect starts a new connection generation. [`Correlator::reset`]
//! fails all outstanding requests with `CommandError::ConnectionReset`,
//! resets the ID counter and bumps the generation, so a reply for an ID
//! issued before the reset can never reach a request issued after it.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use super::Command;
use crate::error::{CommandError, Error, ProtocolError};

/// First request ID of every connection generation.
pub(crate) const INITIAL_ID: u64 = 1;

type Outcome = Result<Value, CommandError>;

struct Pending {
    generation: u64,
    tx: oneshot::Sender<Outcome>,
}

struct Inner {
    next_id: u64,
    generation: u64,
    pending: HashMap<u64, Pending>,
    writer: Option<mpsc::Sender<String>>,
}

/// Matches outbound commands with inbound replies.
pub(crate) struct Correlator {
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for Correlator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Correlator")
            .field("next_id", &inner.next_id)
            .field("generation", &inner.generation)
            .field("pending", &inner.pending.len())
            .field("attached", &inner.writer.is_some())
            .finish()
    }
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}

impl Correlator {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_id: INITIAL_ID,
                generation: 0,
                pending: HashMap::new(),
                writer: None,
            }),
        }
    }

    // ========================================================================
    // Connection generations
    // ========================================================================

    /// Attaches the outbound channel of a freshly authenticated connection.
    pub(crate) fn attach(&self, writer: mpsc::Sender<String>) {
        self.inner.lock().writer = Some(writer);
    }

    /// Detaches the writer and fails every outstanding request.
    ///
    /// Returns the number of requests that were failed.
    pub(crate) fn reset(&self) -> usize {
        let drained: Vec<(u64, Pending)> = {
            let mut inner = self.inner.lock();
            inner.next_id = INITIAL_ID;
            inner.generation += 1;
            inner.writer = None;
            inner.pending.drain().collect()
        };

        let count = drained.len();
        for (id, pending) in drained {
            let _ = pending.tx.send(Err(CommandError::ConnectionReset { id }));
        }
        if count > 0 {
            tracing::debug!(count, "Failed outstanding requests on reset");
        }
        count
    }

    // ========================================================================
    // Requests
    // ========================================================================

    /// Returns the ID the next request will receive.
    #[cfg(test)]
    pub(crate) fn peek_next_id(&self) -> u64 {
        self.inner.lock().next_id
    }

    /// Returns the number of requests awaiting a reply.
    pub(crate) fn pending_count(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// Reserves an ID and registers a pending request without sending.
    ///
    /// Used when the caller must know the ID before the reply can arrive,
    /// e.g. to route the events of a subscription.
    pub(crate) fn register(&self) -> Result<PendingRequest<'_>, Error> {
        let mut inner = self.inner.lock();
        let writer = inner.writer.clone().ok_or(Error::NotConnected)?;
        let id = inner.next_id;
        inner.next_id += 1;
        let generation = inner.generation;
        let (tx, rx) = oneshot::channel();
        inner.pending.insert(id, Pending { generation, tx });

        Ok(PendingRequest {
            correlator: self,
            id,
            generation,
            writer,
            rx: Some(rx),
        })
    }

    /// Sends a command and waits for its reply.
    ///
    /// # Errors
    ///
    /// - `Error::NotConnected` if no connection is attached
    /// - `CommandError::Server` if the hub reports a failure
    /// - `CommandError::Timeout` if no reply arrives in time
    /// - `CommandError::ConnectionReset` if the connection is reset meanwhile
    pub(crate) async fn send_and_await<C>(
        &self,
        command: &C,
        timeout: Duration,
    ) -> Result<Value, Error>
    where
        C: Command + ?Sized,
    {
        let request = self.register()?;
        request.send(command, timeout).await
    }

    /// Routes a reply to its waiting request.
    ///
    /// Returns false if no request with this ID is outstanding.
    pub(crate) fn resolve(&self, id: u64, outcome: Outcome) -> bool {
        let pending = self.inner.lock().pending.remove(&id);
        match pending {
            Some(pending) => {
                if pending.tx.send(outcome).is_err() {
                    tracing::trace!(id, "Requester went away before reply");
                }
                true
            }
            None => {
                tracing::debug!(id, "Dropping reply for unknown request");
                false
            }
        }
    }

    fn forget(&self, id: u64, generation: u64) {
        let mut inner = self.inner.lock();
        if let Entry::Occupied(entry) = inner.pending.entry(id)
            && entry.get().generation == generation
        {
            entry.remove();
        }
    }
}

/// A registered request awaiting its reply.
///
/// Dropping it deregisters the ID, so the pending table cannot leak even
/// when the waiting future is cancelled.
pub(crate) struct PendingRequest<'a> {
    correlator: &'a Correlator,
    id: u64,
    generation: u64,
    writer: mpsc::Sender<String>,
    rx: Option<oneshot::Receiver<Outcome>>,
}

impl PendingRequest<'_> {
    /// Returns the request ID.
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Writes the command and waits for the reply or the deadline.
    ///
    /// The deadline covers the write as well as the reply, so a stalled
    /// outbound channel still ends in `CommandError::Timeout`.
    pub(crate) async fn send<C>(mut self, command: &C, timeout: Duration) -> Result<Value, Error>
    where
        C: Command + ?Sized,
    {
        let id = self.id;
        let frame = command.encode(id);
        tracing::debug!(id, kind = %command.message_type(), "Sending command");

        let Some(mut rx) = self.rx.take() else {
            return Err(CommandError::ConnectionReset { id }.into());
        };

        #[allow(clippy::cast_possible_truncation)]
        let timeout_ms = timeout.as_millis() as u64;

        let writer = &self.writer;
        let exchange = async move {
            tokio::select! {
                // A reset may land while the write is still queued.
                reply = &mut rx => return settle(id, reply),
                sent = writer.send(frame) => {
                    if sent.is_err() {
                        let closed = ProtocolError::ChannelClosed("outbound writer".to_string());
                        return Err(Error::from(closed));
                    }
                }
            }
            settle(id, rx.await)
        };

        tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| CommandError::Timeout { id, timeout_ms })?
    }
}

fn settle(id: u64, reply: Result<Outcome, oneshot::error::RecvError>) -> Result<Value, Error> {
    let outcome = reply.map_err(|_| CommandError::ConnectionReset { id })?;
    Ok(outcome?)
}

impl Drop for PendingRequest<'_> {
    fn drop(&mut self) {
        self.correlator.forget(self.id, self.generation);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::protocol::{GetConfig, GetStates, Ping};

    fn attached() -> (Arc<Correlator>, mpsc::Receiver<String>) {
        let correlator = Arc::new(Correlator::new());
        let (tx, rx) = mpsc::channel(64);
        correlator.attach(tx);
        (correlator, rx)
    }

    fn sent_id(frame: &str) -> u64 {
        let value: Value = serde_json::from_str(frame).unwrap();
        value["id"].as_u64().unwrap()
    }

    #[tokio::test]
    async fn not_connected_without_writer() {
        let correlator = Correlator::new();
        let err = correlator
            .send_and_await(&Ping, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotConnected));
    }

    #[tokio::test]
    async fn ids_start_at_one_and_increase() {
        let (correlator, _rx) = attached();
        let a = correlator.register().unwrap();
        let b = correlator.register().unwrap();
        assert_eq!(a.id(), INITIAL_ID);
        assert_eq!(b.id(), INITIAL_ID + 1);
        assert_eq!(correlator.pending_count(), 2);

        drop(a);
        drop(b);
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn concurrent_requests_get_their_own_replies() {
        let (correlator, mut rx) = attached();

        let mut handles = Vec::new();
        for _ in 0..10 {
            let correlator = Arc::clone(&correlator);
            handles.push(tokio::spawn(async move {
                correlator
                    .send_and_await(&GetConfig, Duration::from_secs(5))
                    .await
            }));
        }

        let mut ids = Vec::new();
        for _ in 0..10 {
            ids.push(sent_id(&rx.recv().await.unwrap()));
        }
        // Answer in reverse order, echoing the ID in the payload.
        for id in ids.iter().rev() {
            assert!(correlator.resolve(*id, Ok(json!({ "echo": id }))));
        }

        let mut echoed = Vec::new();
        for handle in handles {
            let value = handle.await.unwrap().unwrap();
            echoed.push(value["echo"].as_u64().unwrap());
        }
        echoed.sort_unstable();
        ids.sort_unstable();
        assert_eq!(echoed, ids);
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn server_failure_is_returned() {
        let (correlator, mut rx) = attached();
        let c = Arc::clone(&correlator);
        let task =
            tokio::spawn(async move { c.send_and_await(&GetStates, Duration::from_secs(5)).await });

        let id = sent_id(&rx.recv().await.unwrap());
        correlator.resolve(
            id,
            Err(CommandError::Server {
                code: "unauthorized".to_string(),
                message: "nope".to_string(),
            }),
        );

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            Error::Command(CommandError::Server { ref code, .. }) if code == "unauthorized"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_deregisters_request() {
        let (correlator, _rx) = attached();
        let err = correlator
            .send_and_await(&Ping, Duration::from_secs(10))
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(correlator.pending_count(), 0);
        assert!(!correlator.resolve(1, Ok(Value::Null)));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_writer_still_times_out() {
        let correlator = Correlator::new();
        let (tx, _rx) = mpsc::channel(1);
        correlator.attach(tx);

        // The first frame fills the channel, the second cannot be written.
        for expected in [INITIAL_ID, INITIAL_ID + 1] {
            let err = correlator
                .send_and_await(&Ping, Duration::from_secs(1))
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                Error::Command(CommandError::Timeout { id, timeout_ms: 1000 }) if id == expected
            ));
        }
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_interrupts_a_stalled_write() {
        let correlator = Arc::new(Correlator::new());
        let (tx, _rx) = mpsc::channel(1);
        tx.try_send("occupied".to_string()).unwrap();
        correlator.attach(tx);

        let c = Arc::clone(&correlator);
        let task = tokio::spawn(async move { c.send_and_await(&Ping, Duration::from_secs(60)).await });
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(correlator.reset(), 1);
        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::Command(CommandError::ConnectionReset { id: 1 })));
    }

    #[tokio::test]
    async fn reset_fails_outstanding_and_restarts_ids() {
        let (correlator, mut rx) = attached();
        let c = Arc::clone(&correlator);
        let task =
            tokio::spawn(async move { c.send_and_await(&GetStates, Duration::from_secs(60)).await });
        let old_id = sent_id(&rx.recv().await.unwrap());

        assert_eq!(correlator.reset(), 1);
        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            Error::Command(CommandError::ConnectionReset { id }) if id == old_id
        ));

        assert_eq!(correlator.peek_next_id(), INITIAL_ID);
        assert!(matches!(correlator.register(), Err(Error::NotConnected)));
    }

    #[tokio::test]
    async fn stale_guard_does_not_remove_new_generation_request() {
        let (correlator, _rx) = attached();
        let old = correlator.register().unwrap();
        correlator.reset();

        let (tx, _rx2) = mpsc::channel(4);
        correlator.attach(tx);
        let new = correlator.register().unwrap();
        assert_eq!(new.id(), old.id());

        drop(old);
        assert_eq!(correlator.pending_count(), 1);
        drop(new);
        assert_eq!(correlator.pending_count(), 0);
    }
}
