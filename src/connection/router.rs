// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Inbound frame routing.
//!
//! One router task runs per connection generation. It reads frames in the
//! order the hub sent them and:
//!
//! - resolves `result` and `pong` replies through the correlator
//! - applies `state_changed` events of the baseline subscription to the
//!   cache, then hands them to the dispatcher
//! - passes events of user subscriptions to their handlers on the pool
//!
//! Malformed or unknown frames are logged and dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::ProtocolError;
use crate::event::EventSubscriptions;
use crate::protocol::frame::{Envelope, EventFrame, ResultFrame};
use crate::protocol::{Correlator, MessageType};
use crate::state::StateCache;
use crate::subscription::{Dispatcher, WorkerPool};

/// Wire ID of the current baseline `state_changed` subscription.
///
/// Zero means no baseline subscription is active.
#[derive(Debug, Default)]
pub(crate) struct BaselineId(AtomicU64);

impl BaselineId {
    pub(crate) fn set(&self, id: u64) {
        self.0.store(id, Ordering::Release);
    }

    pub(crate) fn clear(&self) {
        self.0.store(0, Ordering::Release);
    }

    fn matches(&self, id: u64) -> bool {
        id != 0 && self.0.load(Ordering::Acquire) == id
    }
}

/// Shared handles the router writes into.
#[derive(Debug, Clone)]
pub(crate) struct Router {
    pub(crate) correlator: Arc<Correlator>,
    pub(crate) cache: Arc<StateCache>,
    pub(crate) dispatcher: Arc<Dispatcher>,
    pub(crate) subscriptions: Arc<EventSubscriptions>,
    pub(crate) pool: WorkerPool,
    pub(crate) baseline: Arc<BaselineId>,
}

impl Router {
    /// Reads frames until the transport fails or the generation ends.
    ///
    /// A transport failure or end of stream cancels `generation`.
    pub(crate) async fn run(
        self,
        mut incoming: mpsc::Receiver<Result<String, ProtocolError>>,
        generation: CancellationToken,
    ) {
        loop {
            let frame = tokio::select! {
                () = generation.cancelled() => break,
                frame = incoming.recv() => frame,
            };

            match frame {
                Some(Ok(text)) => self.route(&text),
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Read failed, connection lost");
                    generation.cancel();
                    break;
                }
                None => {
                    tracing::info!("Hub closed the connection");
                    generation.cancel();
                    break;
                }
            }
        }
        tracing::debug!("Read loop stopped");
    }

    /// Routes one text frame.
    pub(crate) fn route(&self, text: &str) {
        let envelope: Envelope = match serde_json::from_str(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping undecodable frame");
                return;
            }
        };

        match envelope.message_type() {
            MessageType::Pong => {
                if let Some(id) = envelope.id {
                    self.correlator.resolve(id, Ok(Value::Null));
                }
            }
            MessageType::Result => match serde_json::from_str::<ResultFrame>(text) {
                Ok(frame) => {
                    let id = frame.id;
                    self.correlator.resolve(id, frame.into_outcome());
                }
                Err(e) => tracing::warn!(id = ?envelope.id, error = %e, "Dropping malformed result"),
            },
            MessageType::Event => match serde_json::from_str::<EventFrame>(text) {
                Ok(frame) => self.route_event(frame),
                Err(e) => tracing::warn!(id = ?envelope.id, error = %e, "Dropping malformed event"),
            },
            other => {
                tracing::debug!(kind = %envelope.kind, known = other != MessageType::Unknown, "Ignoring frame");
            }
        }
    }

    fn route_event(&self, frame: EventFrame) {
        let EventFrame { id, event } = frame;

        if self.baseline.matches(id) && event.is_state_changed() {
            match event.state_change() {
                Ok(change) => {
                    tracing::trace!(entity_id = %change.entity_id, "State changed");
                    self.cache.apply(&change);
                    self.dispatcher.dispatch(change);
                }
                Err(e) => tracing::warn!(error = %e, "Dropping malformed state change"),
            }
            return;
        }

        match self.subscriptions.handler_for(id) {
            Some(handler) => {
                self.pool.spawn(move || handler(&event));
            }
            None => {
                tracing::debug!(id, event_type = %event.event_type, "Event for unknown subscription");
            }
        }
    }
}
