// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Local cache of the latest known entity snapshots.
//!
//! Besides copy-out reads the cache keeps typed watch channels in sync: a
//! value returned by [`StateCache::watch`] is filled from the current entry
//! and replaced every time the entity's snapshot changes.

use std::collections::HashMap;
use std::fmt;

use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use tokio::sync::watch;

use super::{EntitySnapshot, StateChangeEvent};

/// Pushes a snapshot into one typed watch channel.
///
/// Returns false once every receiver is gone.
type Refresh = Box<dyn Fn(&EntitySnapshot) -> bool + Send + Sync>;

/// Map from entity ID to its latest snapshot.
///
/// The connection's read loop is the only writer. Readers always receive
/// copies, never references into the live map.
#[derive(Default)]
pub struct StateCache {
    entries: RwLock<HashMap<String, EntitySnapshot>>,
    // Lock order: `watchers` before `entries`.
    watchers: Mutex<HashMap<String, Vec<Refresh>>>,
}

impl fmt::Debug for StateCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateCache")
            .field("entities", &self.entries.read().len())
            .field("watched", &self.watchers.lock().len())
            .finish()
    }
}

impl StateCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of one entity's snapshot.
    #[must_use]
    pub fn get(&self, entity_id: &str) -> Option<EntitySnapshot> {
        self.entries.read().get(entity_id).cloned()
    }

    /// Returns a copy of every cached snapshot.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, EntitySnapshot> {
        self.entries.read().clone()
    }

    /// Returns the number of cached entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Keeps a typed view of one entity up to date.
    ///
    /// The receiver starts with the cached snapshot decoded as `T`, or `None`
    /// if the entity is not cached yet. It is updated on every full-state
    /// fetch and every state change of the entity. A snapshot that does not
    /// decode as `T` is logged and the previous value is kept.
    ///
    /// The watch is dropped together with its last receiver.
    pub fn watch<T>(&self, entity_id: impl Into<String>) -> watch::Receiver<Option<T>>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        let entity_id = entity_id.into();
        let mut watchers = self.watchers.lock();

        let initial = self.get(&entity_id).and_then(|s| decode_watched(&s));
        let (tx, rx) = watch::channel(initial);

        watchers
            .entry(entity_id)
            .or_default()
            .push(Box::new(move |snapshot: &EntitySnapshot| {
                if tx.is_closed() {
                    return false;
                }
                if let Some(value) = decode_watched(snapshot) {
                    tx.send_replace(Some(value));
                }
                true
            }));
        rx
    }

    /// Applies a state change.
    ///
    /// The entry is overwritten with the new snapshot. Events without a new
    /// state leave the cache untouched. Returns true if the cache changed.
    pub(crate) fn apply(&self, event: &StateChangeEvent) -> bool {
        let Some(new_state) = &event.new_state else {
            tracing::trace!(entity_id = %event.entity_id, "State change without new state");
            return false;
        };
        self.entries
            .write()
            .insert(event.entity_id.clone(), new_state.clone());

        let mut watchers = self.watchers.lock();
        if let Some(list) = watchers.get_mut(&event.entity_id) {
            list.retain(|refresh| refresh(new_state));
            if list.is_empty() {
                watchers.remove(&event.entity_id);
            }
        }
        true
    }

    /// Replaces the whole cache with a fresh full-state fetch.
    pub(crate) fn replace_all(&self, snapshots: Vec<EntitySnapshot>) {
        let fresh: HashMap<_, _> = snapshots
            .into_iter()
            .map(|s| (s.entity_id.clone(), s))
            .collect();
        tracing::debug!(entities = fresh.len(), "Seeded state cache");
        *self.entries.write() = fresh;

        let mut watchers = self.watchers.lock();
        let entries = self.entries.read();
        watchers.retain(|entity_id, list| {
            if let Some(snapshot) = entries.get(entity_id) {
                list.retain(|refresh| refresh(snapshot));
            }
            !list.is_empty()
        });
    }
}

fn decode_watched<T: DeserializeOwned>(snapshot: &EntitySnapshot) -> Option<T> {
    match snapshot.decode() {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(entity_id = %snapshot.entity_id, error = %e, "Watched entity did not decode");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_overwrites_wholesale() {
        let cache = StateCache::new();
        let mut first = EntitySnapshot::new("light.kitchen", "on");
        first.attributes.insert("brightness".into(), 100.into());
        cache.apply(&StateChangeEvent::new("light.kitchen", None, Some(first)));

        let second = EntitySnapshot::new("light.kitchen", "off");
        cache.apply(&StateChangeEvent::new("light.kitchen", None, Some(second)));

        let cached = cache.get("light.kitchen").unwrap();
        assert_eq!(cached.state.as_str(), "off");
        assert!(cached.attributes.is_empty());
    }

    #[test]
    fn removal_leaves_entry_untouched() {
        let cache = StateCache::new();
        cache.replace_all(vec![EntitySnapshot::new("sensor.temp", "20")]);

        let changed = cache.apply(&StateChangeEvent::new(
            "sensor.temp",
            Some(EntitySnapshot::new("sensor.temp", "20")),
            None,
        ));

        assert!(!changed);
        assert_eq!(cache.get("sensor.temp").unwrap().state.as_str(), "20");
    }

    #[test]
    fn replace_all_drops_stale_entries() {
        let cache = StateCache::new();
        cache.replace_all(vec![
            EntitySnapshot::new("light.a", "on"),
            EntitySnapshot::new("light.b", "off"),
        ]);
        assert_eq!(cache.len(), 2);

        cache.replace_all(vec![EntitySnapshot::new("light.c", "on")]);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("light.a").is_none());
    }

    #[test]
    fn reads_are_copies() {
        let cache = StateCache::new();
        cache.replace_all(vec![EntitySnapshot::new("light.a", "on")]);

        let mut copy = cache.snapshot();
        copy.clear();
        assert!(!cache.is_empty());
    }

    #[derive(Debug, PartialEq, serde::Deserialize)]
    struct Light {
        state: String,
        #[serde(default)]
        attributes: LightAttributes,
    }

    #[derive(Debug, Default, PartialEq, serde::Deserialize)]
    struct LightAttributes {
        brightness: Option<u8>,
    }

    fn change(entity_id: &str, snapshot: EntitySnapshot) -> StateChangeEvent {
        StateChangeEvent::new(entity_id, None, Some(snapshot))
    }

    #[test]
    fn watch_is_filled_by_fetch_and_follows_changes() {
        let cache = StateCache::new();
        let mut light = cache.watch::<Light>("light.kitchen");
        assert!(light.borrow().is_none());

        cache.replace_all(vec![EntitySnapshot::new("light.kitchen", "off")]);
        assert!(light.has_changed().unwrap());
        assert_eq!(light.borrow_and_update().as_ref().unwrap().state, "off");

        let mut on = EntitySnapshot::new("light.kitchen", "on");
        on.attributes.insert("brightness".into(), 200.into());
        cache.apply(&change("light.kitchen", on));

        let current = light.borrow_and_update();
        let current = current.as_ref().unwrap();
        assert_eq!(current.state, "on");
        assert_eq!(current.attributes.brightness, Some(200));
    }

    #[test]
    fn watch_starts_from_cached_entry() {
        let cache = StateCache::new();
        cache.replace_all(vec![EntitySnapshot::new("light.hall", "on")]);

        let light = cache.watch::<Light>("light.hall");
        assert_eq!(light.borrow().as_ref().unwrap().state, "on");
    }

    #[test]
    fn undecodable_snapshot_keeps_previous_value() {
        #[derive(Debug, serde::Deserialize)]
        struct Numeric {
            attributes: NumericAttributes,
        }

        #[derive(Debug, serde::Deserialize)]
        struct NumericAttributes {
            value: u32,
        }

        let cache = StateCache::new();
        let mut good = EntitySnapshot::new("sensor.count", "3");
        good.attributes.insert("value".into(), 3.into());
        cache.replace_all(vec![good]);
        let numeric = cache.watch::<Numeric>("sensor.count");

        let mut bad = EntitySnapshot::new("sensor.count", "x");
        bad.attributes.insert("value".into(), "x".into());
        cache.apply(&change("sensor.count", bad));

        assert_eq!(numeric.borrow().as_ref().unwrap().attributes.value, 3);
        assert_eq!(cache.get("sensor.count").unwrap().state.as_str(), "x");
    }

    #[test]
    fn dropped_watch_is_forgotten() {
        let cache = StateCache::new();
        drop(cache.watch::<Light>("light.kitchen"));
        assert_eq!(cache.watchers.lock().len(), 1);

        cache.apply(&change("light.kitchen", EntitySnapshot::new("light.kitchen", "on")));
        assert!(cache.watchers.lock().is_empty());
    }
}
