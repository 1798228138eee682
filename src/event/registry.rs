// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Handlers for raw event subscriptions.
//!
//! A subscription keeps a stable [`SubscriptionId`] for the caller while
//! its wire ID (the ID of the `subscribe_events` request) changes with every
//! reconnect.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use super::Event;

/// Unique identifier for an event subscription.
///
/// Returned by [`Client::subscribe_events`](crate::Client::subscribe_events)
/// and accepted by
/// [`Client::unsubscribe_events`](crate::Client::unsubscribe_events).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Returns the raw ID value.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sub({})", self.0)
    }
}

/// Callback invoked for each event of a subscription.
pub(crate) type EventHandler = Arc<dyn Fn(&Event) + Send + Sync>;

struct Entry {
    event_type: Option<String>,
    handler: EventHandler,
    wire_id: Option<u64>,
}

#[derive(Default)]
struct Tables {
    entries: HashMap<SubscriptionId, Entry>,
    by_wire_id: HashMap<u64, SubscriptionId>,
}

/// Registry of raw event subscriptions.
pub(crate) struct EventSubscriptions {
    next_id: AtomicU64,
    tables: RwLock<Tables>,
}

impl std::fmt::Debug for EventSubscriptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSubscriptions")
            .field("count", &self.tables.read().entries.len())
            .finish_non_exhaustive()
    }
}

impl Default for EventSubscriptions {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSubscriptions {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            tables: RwLock::new(Tables::default()),
        }
    }

    /// Registers a handler that is not yet bound to a wire ID.
    pub(crate) fn insert(&self, event_type: Option<String>, handler: EventHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.tables.write().entries.insert(
            id,
            Entry {
                event_type,
                handler,
                wire_id: None,
            },
        );
        id
    }

    /// Binds a subscription to the wire ID of its `subscribe_events` request.
    ///
    /// A previous binding is replaced. Returns false if the subscription was
    /// removed meanwhile.
    pub(crate) fn bind(&self, id: SubscriptionId, wire_id: u64) -> bool {
        let mut tables = self.tables.write();
        let Some(entry) = tables.entries.get_mut(&id) else {
            return false;
        };
        let previous = entry.wire_id.replace(wire_id);
        if let Some(previous) = previous {
            tables.by_wire_id.remove(&previous);
        }
        tables.by_wire_id.insert(wire_id, id);
        true
    }

    /// Removes a subscription, returning its current wire ID if bound.
    pub(crate) fn remove(&self, id: SubscriptionId) -> Option<Option<u64>> {
        let mut tables = self.tables.write();
        let entry = tables.entries.remove(&id)?;
        if let Some(wire_id) = entry.wire_id {
            tables.by_wire_id.remove(&wire_id);
        }
        Some(entry.wire_id)
    }

    /// Returns the handler bound to a wire ID.
    pub(crate) fn handler_for(&self, wire_id: u64) -> Option<EventHandler> {
        let tables = self.tables.read();
        let id = tables.by_wire_id.get(&wire_id)?;
        tables.entries.get(id).map(|e| Arc::clone(&e.handler))
    }

    /// Forgets every wire binding; used when the connection is reset.
    pub(crate) fn unbind_all(&self) {
        let mut tables = self.tables.write();
        tables.by_wire_id.clear();
        for entry in tables.entries.values_mut() {
            entry.wire_id = None;
        }
    }

    /// Lists the subscriptions to re-issue after a reconnect.
    pub(crate) fn pending_resubscribe(&self) -> Vec<(SubscriptionId, Option<String>)> {
        self.tables
            .read()
            .entries
            .iter()
            .filter(|(_, e)| e.wire_id.is_none())
            .map(|(id, e)| (*id, e.event_type.clone()))
            .collect()
    }

    /// Returns the number of subscriptions.
    pub(crate) fn len(&self) -> usize {
        self.tables.read().entries.len()
    }
}
