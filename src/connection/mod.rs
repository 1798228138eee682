// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Connection management.
//!
//! The [`ConnectionManager`] owns one connection generation at a time. Each
//! generation goes through:
//!
//! 1. dial through the configured connector
//! 2. authenticate
//! 3. start the read loop and the heartbeat
//! 4. seed the state cache with `get_states`
//! 5. subscribe to `state_changed`, then re-issue user subscriptions
//!
//! A supervisor task waits for the generation to end. Unless the client is
//! closing, it resets the correlator, waits the reconnect delay and starts
//! the next generation. Only an explicit credential rejection stops it.

mod auth;
mod heartbeat;
mod router;
mod state;

pub use state::ConnectionState;

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::config::ClientConfig;
use crate::error::{CommandError, Error, ParseError, Result};
use crate::event::{EventHandler, EventSubscriptions, SubscriptionId};
use crate::protocol::{
    Command, Correlator, GetStates, SubscribeEvents, Transport, UnsubscribeEvents,
};
use crate::state::{EntitySnapshot, STATE_CHANGED, StateCache};
use crate::subscription::{Dispatcher, ListenerRegistry};

use heartbeat::Heartbeat;
use router::{BaselineId, Router};
use state::StateBus;

#[derive(Debug, Default)]
struct Lifecycle {
    /// Present while running; cancelling it stops every task.
    shutdown: Option<CancellationToken>,
    /// Set by `close`; the manager cannot be started again.
    closed: bool,
}

/// Owns the connection to the hub and everything fed by it.
#[derive(Debug)]
pub(crate) struct ConnectionManager {
    config: ClientConfig,
    shared: Router,
    state: StateBus,
    lifecycle: Mutex<Lifecycle>,
    tasks: TaskTracker,
}

impl ConnectionManager {
    pub(crate) fn new(config: ClientConfig, registry: Arc<ListenerRegistry>) -> Self {
        let pool = config.worker_pool().clone();
        let shared = Router {
            correlator: Arc::new(Correlator::new()),
            cache: Arc::new(StateCache::new()),
            dispatcher: Arc::new(Dispatcher::new(registry, pool.clone())),
            subscriptions: Arc::new(EventSubscriptions::new()),
            pool,
            baseline: Arc::new(BaselineId::default()),
        };
        Self {
            config,
            shared,
            state: StateBus::new(),
            lifecycle: Mutex::new(Lifecycle::default()),
            tasks: TaskTracker::new(),
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub(crate) fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub(crate) fn cache(&self) -> &StateCache {
        &self.shared.cache
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.state.current()
    }

    pub(crate) fn state_events(&self) -> broadcast::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Establishes the first generation and starts the supervisor.
    ///
    /// Any failure here is returned to the caller and nothing is retried.
    pub(crate) async fn start(self: &Arc<Self>) -> Result<()> {
        let shutdown = {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.closed {
                return Err(Error::Closed);
            }
            if lifecycle.shutdown.is_some() {
                return Err(Error::AlreadyRunning);
            }
            let token = CancellationToken::new();
            lifecycle.shutdown = Some(token.clone());
            token
        };

        let outcome = tokio::select! {
            () = shutdown.cancelled() => Err(Error::Closed),
            outcome = self.establish(&shutdown) => outcome,
        };

        match outcome {
            Ok(generation) => {
                self.tasks
                    .spawn(Arc::clone(self).supervise(shutdown, generation));
                Ok(())
            }
            Err(e) => {
                self.stop(&shutdown, &e);
                Err(e)
            }
        }
    }

    /// Stops every task and fails outstanding commands.
    ///
    /// Listener callbacks already running are not interrupted.
    pub(crate) async fn close(&self) {
        let shutdown = {
            let mut lifecycle = self.lifecycle.lock();
            lifecycle.closed = true;
            lifecycle.shutdown.take()
        };
        if let Some(shutdown) = shutdown {
            shutdown.cancel();
        }

        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();

        self.teardown();
        self.state.set(ConnectionState::Disconnected);
        tracing::info!("Connection closed");
    }

    /// Waits for queued and running listener callbacks.
    pub(crate) async fn drain_listeners(&self) {
        self.shared.dispatcher.shutdown().await;
        self.shared.pool.drain().await;
    }

    async fn supervise(self: Arc<Self>, shutdown: CancellationToken, mut generation: CancellationToken) {
        loop {
            generation.cancelled().await;
            if shutdown.is_cancelled() {
                return;
            }

            tracing::warn!("Connection lost");
            self.teardown();

            match self.reconnect(&shutdown).await {
                Some(next) => generation = next,
                None => return,
            }
        }
    }

    async fn reconnect(&self, shutdown: &CancellationToken) -> Option<CancellationToken> {
        let mut attempt = 0u32;
        loop {
            attempt = attempt.saturating_add(1);
            self.state.set(ConnectionState::Reconnecting { attempt });

            tokio::select! {
                () = shutdown.cancelled() => return None,
                () = tokio::time::sleep(self.config.reconnect_delay()) => {}
            }

            let outcome = tokio::select! {
                () = shutdown.cancelled() => return None,
                outcome = self.establish(shutdown) => outcome,
            };

            match outcome {
                Ok(generation) => {
                    tracing::info!(attempt, "Reconnected");
                    return Some(generation);
                }
                Err(e) if e.is_auth_rejected() => {
                    tracing::error!(error = %e, "Credentials rejected, giving up");
                    self.stop(shutdown, &e);
                    return None;
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Reconnect failed");
                    self.teardown();
                }
            }
        }
    }

    /// Runs steps 1 to 5 and returns the token of the new generation.
    async fn establish(&self, shutdown: &CancellationToken) -> Result<CancellationToken> {
        let url = self.config.url();

        self.state.set(ConnectionState::Connecting);
        let mut transport = self.config.connector().connect(url).await?;

        self.state.set(ConnectionState::Authenticating);
        let version = auth::authenticate(&mut transport, &self.config).await?;

        let Transport { outgoing, incoming } = transport;
        self.shared.correlator.attach(outgoing);

        let generation = shutdown.child_token();
        self.tasks
            .spawn(self.shared.clone().run(incoming, generation.clone()));
        self.tasks.spawn(
            Heartbeat::from_config(&self.config)
                .run(Arc::clone(&self.shared.correlator), generation.clone()),
        );

        if let Err(e) = self.prepare().await {
            generation.cancel();
            self.teardown();
            return Err(e);
        }

        self.state.set(ConnectionState::Ready);
        tracing::info!(
            url = %url,
            version = %version,
            entities = self.shared.cache.len(),
            "Connected to hub"
        );
        Ok(generation)
    }

    /// Seeds the cache and issues every subscription.
    async fn prepare(&self) -> Result<()> {
        let timeout = self.config.request_timeout();

        let states = self
            .shared
            .correlator
            .send_and_await(&GetStates, timeout)
            .await?;
        let snapshots: Vec<EntitySnapshot> =
            serde_json::from_value(states).map_err(ParseError::from)?;
        self.shared.cache.replace_all(snapshots);

        // The ID must be known before the first event can arrive.
        let request = self.shared.correlator.register()?;
        self.shared.baseline.set(request.id());
        request
            .send(&SubscribeEvents::of_type(STATE_CHANGED), timeout)
            .await?;

        for (id, event_type) in self.shared.subscriptions.pending_resubscribe() {
            match self.issue_subscription(id, event_type).await {
                Ok(()) => tracing::debug!(subscription = %id, "Resubscribed"),
                Err(
                    e @ (Error::NotConnected
                    | Error::Protocol(_)
                    | Error::Command(CommandError::ConnectionReset { .. })),
                ) => return Err(e),
                Err(e) => tracing::warn!(subscription = %id, error = %e, "Resubscribe failed"),
            }
        }
        Ok(())
    }

    /// Forgets the current generation's wire state.
    fn teardown(&self) {
        self.shared.baseline.clear();
        self.shared.subscriptions.unbind_all();
        self.shared.correlator.reset();
    }

    /// Ends the run after a fatal error.
    fn stop(&self, shutdown: &CancellationToken, error: &Error) {
        shutdown.cancel();
        self.lifecycle.lock().shutdown = None;
        self.teardown();

        if error.is_auth_rejected() {
            self.state.set(ConnectionState::Failed(error.to_string()));
        } else {
            self.state.set(ConnectionState::Disconnected);
        }
    }

    // ========================================================================
    // Requests
    // ========================================================================

    pub(crate) async fn request<C>(&self, command: &C) -> Result<Value>
    where
        C: Command + ?Sized,
    {
        self.shared
            .correlator
            .send_and_await(command, self.config.request_timeout())
            .await
    }

    /// Registers an event handler and subscribes it if connected.
    ///
    /// While disconnected the subscription is kept and issued on the next
    /// connect.
    pub(crate) async fn subscribe(
        &self,
        event_type: Option<String>,
        handler: EventHandler,
    ) -> Result<SubscriptionId> {
        let id = self.shared.subscriptions.insert(event_type.clone(), handler);

        match self.issue_subscription(id, event_type).await {
            Ok(()) => Ok(id),
            Err(Error::NotConnected | Error::Command(CommandError::ConnectionReset { .. })) => {
                tracing::debug!(subscription = %id, "Not connected, subscribing on next connect");
                Ok(id)
            }
            Err(e) => {
                self.shared.subscriptions.remove(id);
                Err(e)
            }
        }
    }

    pub(crate) async fn unsubscribe(&self, id: SubscriptionId) -> Result<()> {
        match self.shared.subscriptions.remove(id) {
            None => {
                tracing::debug!(subscription = %id, "Unknown subscription");
                Ok(())
            }
            Some(None) => Ok(()),
            Some(Some(wire_id)) => match self.request(&UnsubscribeEvents::new(wire_id)).await {
                Ok(_) | Err(Error::NotConnected) => Ok(()),
                Err(e) => Err(e),
            },
        }
    }

    async fn issue_subscription(&self, id: SubscriptionId, event_type: Option<String>) -> Result<()> {
        let command = match event_type {
            Some(event_type) => SubscribeEvents::of_type(event_type),
            None => SubscribeEvents::all(),
        };

        let request = self.shared.correlator.register()?;
        if !self.shared.subscriptions.bind(id, request.id()) {
            // Removed while we were registering.
            return Ok(());
        }
        request.send(&command, self.config.request_timeout()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use futures_util::future::BoxFuture;
    use url::Url;

    use super::*;
    use crate::config::ClientBuilder;
    use crate::error::ProtocolError;
    use crate::protocol::Connector;

    struct Unreachable;

    impl Connector for Unreachable {
        fn connect<'a>(&'a self, _url: &'a Url) -> BoxFuture<'a, std::result::Result<Transport, ProtocolError>> {
            Box::pin(async { Err(ProtocolError::ConnectionFailed("refused".to_string())) })
        }
    }

    fn manager() -> Arc<ConnectionManager> {
        let config = ClientBuilder::new()
            .host("hass.local")
            .access_token("token")
            .connector(Arc::new(Unreachable))
            .into_config()
            .unwrap();
        Arc::new(ConnectionManager::new(
            config,
            Arc::new(ListenerRegistry::new()),
        ))
    }

    #[tokio::test]
    async fn dial_failure_is_returned_and_not_retried() {
        let manager = manager();
        let mut events = manager.state_events();

        let err = manager.start().await.unwrap_err();
        assert!(matches!(err, Error::Protocol(ProtocolError::ConnectionFailed(_))));
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(events.recv().await.unwrap(), ConnectionState::Connecting);
        assert_eq!(events.recv().await.unwrap(), ConnectionState::Disconnected);

        // Not running anymore, so a second start is allowed.
        assert!(matches!(
            manager.start().await.unwrap_err(),
            Error::Protocol(_)
        ));
    }

    #[tokio::test]
    async fn closed_manager_cannot_start() {
        let manager = manager();
        manager.close().await;
        assert!(matches!(manager.start().await.unwrap_err(), Error::Closed));
    }

    #[tokio::test]
    async fn requests_fail_fast_when_not_connected() {
        let manager = manager();
        let err = manager.request(&GetStates).await.unwrap_err();
        assert!(matches!(err, Error::NotConnected));
    }

    #[tokio::test]
    async fn subscription_is_kept_while_disconnected() {
        let manager = manager();
        let handler: EventHandler = Arc::new(|_: &crate::event::Event| {});
        let id = manager
            .subscribe(Some("custom".to_string()), handler)
            .await
            .unwrap();
        assert_eq!(
            manager.shared.subscriptions.pending_resubscribe(),
            vec![(id, Some("custom".to_string()))]
        );

        manager.unsubscribe(id).await.unwrap();
        assert_eq!(manager.shared.subscriptions.len(), 0);
    }
}
