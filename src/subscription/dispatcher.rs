// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fan-out of state changes to matching listeners.
//!
//! Each entity gets its own dispatch lane. A lane handles one event at a
//! time: the listeners matched for that event run concurrently on the
//! [`WorkerPool`], and the lane waits for all of them before taking the
//! entity's next event. Lanes of different entities run independently.
//!
//! A lane retires as soon as its queue is empty, so idle entities hold no
//! task. Each queue is bounded; when listeners fall that far behind, new
//! events for the entity are dropped and logged. The state cache is updated
//! before dispatch and is never affected.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::join_all;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;

use super::{ListenerRegistry, WorkerPool};
use crate::state::StateChangeEvent;

/// Events a single lane may queue before new ones are dropped.
pub(crate) const LANE_CAPACITY: usize = 1024;

type Queue = mpsc::Receiver<Arc<StateChangeEvent>>;

#[derive(Debug)]
struct Lane {
    id: u64,
    tx: mpsc::Sender<Arc<StateChangeEvent>>,
}

#[derive(Debug, Default)]
struct Lanes {
    open: HashMap<String, Lane>,
    next_id: u64,
}

impl Lanes {
    /// Removes the lane if its queue is drained.
    ///
    /// Runs under the same lock as `dispatch`, so no event can slip into a
    /// queue between the emptiness check and the removal.
    fn retire(&mut self, entity_id: &str, id: u64, queue: &Queue) -> bool {
        if !queue.is_empty() {
            return false;
        }
        if self.open.get(entity_id).is_some_and(|lane| lane.id == id) {
            self.open.remove(entity_id);
        }
        true
    }
}

/// Delivers state changes to registered listeners.
#[derive(Debug)]
pub(crate) struct Dispatcher {
    registry: Arc<ListenerRegistry>,
    pool: WorkerPool,
    lanes: Arc<Mutex<Lanes>>,
    lane_tasks: TaskTracker,
    lane_capacity: usize,
}

impl Dispatcher {
    pub(crate) fn new(registry: Arc<ListenerRegistry>, pool: WorkerPool) -> Self {
        Self {
            registry,
            pool,
            lanes: Arc::new(Mutex::new(Lanes::default())),
            lane_tasks: TaskTracker::new(),
            lane_capacity: LANE_CAPACITY,
        }
    }

    #[cfg(test)]
    fn with_lane_capacity(mut self, capacity: usize) -> Self {
        self.lane_capacity = capacity.max(1);
        self
    }

    /// Queues an event on its entity's lane. Never blocks.
    pub(crate) fn dispatch(&self, event: StateChangeEvent) {
        let mut event = Arc::new(event);
        let mut lanes = self.lanes.lock();

        if let Some(lane) = lanes.open.get(&event.entity_id) {
            match lane.tx.try_send(event) {
                Ok(()) => return,
                Err(mpsc::error::TrySendError::Full(dropped)) => {
                    tracing::warn!(
                        entity_id = %dropped.entity_id,
                        capacity = self.lane_capacity,
                        "Listeners are falling behind, dropping state change"
                    );
                    return;
                }
                // Lane task is gone; start a new one below.
                Err(mpsc::error::TrySendError::Closed(returned)) => event = returned,
            }
        }

        let (tx, rx) = mpsc::channel(self.lane_capacity);
        let entity_id = event.entity_id.clone();
        if tx.try_send(event).is_err() {
            return;
        }
        let id = lanes.next_id;
        lanes.next_id += 1;
        self.lane_tasks.spawn(run_lane(
            entity_id.clone(),
            id,
            rx,
            Arc::clone(&self.lanes),
            Arc::clone(&self.registry),
            self.pool.clone(),
        ));
        lanes.open.insert(entity_id, Lane { id, tx });
    }

    #[cfg(test)]
    fn active_lanes(&self) -> usize {
        self.lanes.lock().open.len()
    }

    /// Stops accepting events and waits until queued events and running
    /// listeners have finished.
    pub(crate) async fn shutdown(&self) {
        self.lanes.lock().open.clear();
        self.lane_tasks.close();
        self.lane_tasks.wait().await;
        self.pool.drain().await;
        self.lane_tasks.reopen();
    }
}

async fn run_lane(
    entity_id: String,
    id: u64,
    mut queue: Queue,
    lanes: Arc<Mutex<Lanes>>,
    registry: Arc<ListenerRegistry>,
    pool: WorkerPool,
) {
    while let Some(event) = queue.recv().await {
        deliver(&entity_id, &event, &registry, &pool).await;
        if lanes.lock().retire(&entity_id, id, &queue) {
            break;
        }
    }
    tracing::trace!(entity_id = %entity_id, "Dispatch lane closed");
}

async fn deliver(
    entity_id: &str,
    event: &Arc<StateChangeEvent>,
    registry: &ListenerRegistry,
    pool: &WorkerPool,
) {
    let listeners = registry.matching(&event.entity_id);
    if listeners.is_empty() {
        return;
    }

    let jobs = listeners.into_iter().map(|listener| {
        let event = Arc::clone(event);
        pool.spawn(move || {
            listener.fire(&event);
        })
    });

    for result in join_all(jobs.collect::<Vec<_>>()).await {
        if let Err(e) = result {
            tracing::error!(entity_id = %entity_id, error = %e, "Listener callback failed");
        }
    }
}
