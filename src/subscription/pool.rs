// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bounded pool for listener invocations.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;

/// Runs listener callbacks with bounded concurrency.
///
/// At most `size` callbacks run at once; further jobs wait for a permit.
/// Every job is tracked so that shutdown can wait for in-flight callbacks.
/// Clones share the same permits and tracker.
///
/// # Examples
///
/// ```
/// use hubsocket::subscription::WorkerPool;
///
/// let pool = WorkerPool::new(8);
/// assert_eq!(pool.size(), 8);
/// ```
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
    size: usize,
}

impl WorkerPool {
    /// Default number of concurrent listener invocations.
    pub const DEFAULT_SIZE: usize = 64;

    /// Creates a pool allowing `size` concurrent jobs (at least one).
    #[must_use]
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            tracker: TaskTracker::new(),
            size,
        }
    }

    /// Returns the concurrency limit.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the number of jobs queued or running.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Schedules a job. It starts once a permit is free.
    pub(crate) fn spawn<F>(&self, job: F) -> JoinHandle<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        self.tracker.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            job();
        })
    }

    /// Waits until every scheduled job has finished.
    pub(crate) async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SIZE)
    }
}
