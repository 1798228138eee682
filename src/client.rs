// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The client handle.

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{broadcast, watch};

use crate::config::{ClientBuilder, ClientConfig};
use crate::connection::{ConnectionManager, ConnectionState};
use crate::error::{ParseError, Result};
use crate::event::{Event, SubscriptionId};
use crate::protocol::{CallService, Command, FireEvent, GetConfig, GetPanels, GetServices, GetStates};
use crate::state::{EntitySnapshot, StateChangeEvent};
use crate::subscription::{FilterOptions, ListenerId, ListenerRegistry, Matcher};

/// A client for the hub's websocket API.
///
/// The client is cheaply cloneable; clones share the connection, the state
/// cache and the listeners.
///
/// # Examples
///
/// ```no_run
/// use hubsocket::Client;
/// use hubsocket::subscription::FilterOptions;
///
/// #[tokio::main]
/// async fn main() -> hubsocket::Result<()> {
///     let client = Client::builder()
///         .host("homeassistant.local:8123")
///         .access_token("long-lived-token")
///         .build()?;
///
///     client.add_entity_listener("light.kitchen", FilterOptions::new(), |change| {
///         println!("kitchen light: {:?}", change.new_value());
///     });
///
///     client.run().await?;
///     client
///         .call_service("light", "toggle", None, Some(serde_json::json!({"entity_id": "light.kitchen"})))
///         .await?;
///
///     client.shutdown().await;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Client {
    connection: Arc<ConnectionManager>,
    listeners: Arc<ListenerRegistry>,
}

impl Client {
    /// Creates a builder for configuring a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub(crate) fn new(config: ClientConfig) -> Self {
        let listeners = Arc::new(ListenerRegistry::new());
        Self {
            connection: Arc::new(ConnectionManager::new(config, Arc::clone(&listeners))),
            listeners,
        }
    }

    /// Returns the client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        self.connection.config()
    }

    // ========== Lifecycle ==========

    /// Connects, authenticates, seeds the state cache and subscribes to
    /// state changes.
    ///
    /// Returns once the client is ready. From then on, lost connections are
    /// re-established in the background until [`close`](Self::close) is
    /// called or the hub rejects the credentials.
    ///
    /// # Errors
    ///
    /// - `Error::AlreadyRunning` or `Error::Closed` if called at the wrong time
    /// - `Error::Protocol` if the hub cannot be reached
    /// - `Error::Auth` if authentication fails
    /// - `Error::Command` if seeding the cache or subscribing fails
    pub async fn run(&self) -> Result<()> {
        self.connection.start().await
    }

    /// Disconnects and stops reconnecting.
    ///
    /// Outstanding commands fail with `CommandError::ConnectionReset`.
    /// Listener callbacks already running are left to finish on their own.
    /// A closed client cannot be run again.
    pub async fn close(&self) {
        self.connection.close().await;
    }

    /// Closes the client and waits for pending listener callbacks.
    pub async fn shutdown(&self) {
        self.connection.close().await;
        self.connection.drain_listeners().await;
    }

    /// Returns the current connection state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Subscribes to connection state transitions.
    #[must_use]
    pub fn connection_events(&self) -> broadcast::Receiver<ConnectionState> {
        self.connection.state_events()
    }

    // ========== Commands ==========

    /// Sends any command and returns the `result` payload.
    ///
    /// # Errors
    ///
    /// - `Error::NotConnected` if no connection is established
    /// - `CommandError::Server` if the hub reports a failure
    /// - `CommandError::Timeout` if the reply does not arrive in time
    /// - `CommandError::ConnectionReset` if the connection drops meanwhile
    pub async fn send_command<C>(&self, command: &C) -> Result<Value>
    where
        C: Command + ?Sized,
    {
        self.connection.request(command).await
    }

    /// Fetches every entity snapshot from the hub.
    ///
    /// This does not touch the state cache.
    ///
    /// # Errors
    ///
    /// Same as [`send_command`](Self::send_command), plus `Error::Parse` if the
    /// reply is not a list of snapshots.
    pub async fn get_states(&self) -> Result<Vec<EntitySnapshot>> {
        let value = self.send_command(&GetStates).await?;
        Ok(serde_json::from_value(value).map_err(ParseError::from)?)
    }

    /// Fetches the hub configuration.
    ///
    /// # Errors
    ///
    /// Same as [`send_command`](Self::send_command).
    pub async fn get_config(&self) -> Result<Value> {
        self.send_command(&GetConfig).await
    }

    /// Fetches the available services, grouped by domain.
    ///
    /// # Errors
    ///
    /// Same as [`send_command`](Self::send_command).
    pub async fn get_services(&self) -> Result<Value> {
        self.send_command(&GetServices).await
    }

    /// Fetches the registered frontend panels.
    ///
    /// # Errors
    ///
    /// Same as [`send_command`](Self::send_command).
    pub async fn get_panels(&self) -> Result<Value> {
        self.send_command(&GetPanels).await
    }

    /// Calls a service, e.g. `light.turn_on`.
    ///
    /// # Errors
    ///
    /// Same as [`send_command`](Self::send_command).
    pub async fn call_service(
        &self,
        domain: &str,
        service: &str,
        data: Option<Value>,
        target: Option<Value>,
    ) -> Result<Value> {
        let mut call = CallService::new(domain, service);
        if let Some(data) = data {
            call = call.with_data(data);
        }
        if let Some(target) = target {
            call = call.with_target(target);
        }
        self.send_command(&call).await
    }

    /// Fires an event on the hub's event bus.
    ///
    /// # Errors
    ///
    /// Same as [`send_command`](Self::send_command).
    pub async fn fire_event(&self, event_type: &str, data: Option<Value>) -> Result<Value> {
        let mut fire = FireEvent::new(event_type);
        if let Some(data) = data {
            fire = fire.with_data(data);
        }
        self.send_command(&fire).await
    }

    // ========== Event Subscriptions ==========

    /// Subscribes to raw events, of one type or of all types.
    ///
    /// The subscription survives reconnects. When called before
    /// [`run`](Self::run) or while reconnecting, it is issued as soon as the
    /// client is connected.
    ///
    /// # Errors
    ///
    /// `CommandError::Server` or `CommandError::Timeout` if the hub does not
    /// accept the subscription.
    pub async fn subscribe_events<F>(
        &self,
        event_type: Option<&str>,
        callback: F,
    ) -> Result<SubscriptionId>
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.connection
            .subscribe(event_type.map(str::to_string), Arc::new(callback))
            .await
    }

    /// Cancels a subscription created by
    /// [`subscribe_events`](Self::subscribe_events).
    ///
    /// # Errors
    ///
    /// `CommandError` if the hub rejects the `unsubscribe_events` request.
    /// The local handler is removed regardless.
    pub async fn unsubscribe_events(&self, id: SubscriptionId) -> Result<()> {
        self.connection.unsubscribe(id).await
    }

    // ========== State Cache ==========

    /// Returns a copy of every cached entity snapshot.
    #[must_use]
    pub fn states(&self) -> HashMap<String, EntitySnapshot> {
        self.connection.cache().snapshot()
    }

    /// Returns the cached snapshot of one entity.
    #[must_use]
    pub fn state(&self, entity_id: &str) -> Option<EntitySnapshot> {
        self.connection.cache().get(entity_id)
    }

    /// Keeps a typed view of one entity in sync with the cache.
    ///
    /// `T` is decoded from the whole snapshot (`entity_id`, `state`,
    /// `attributes`, timestamps). The value is filled by the startup fetch,
    /// refreshed after every reconnect and replaced on every state change.
    /// It stays `None` until the entity is first seen.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use serde::Deserialize;
    ///
    /// #[derive(Deserialize)]
    /// struct Sun {
    ///     state: String,
    /// }
    ///
    /// # async fn example(client: hubsocket::Client) {
    /// let mut sun = client.watch_entity::<Sun>("sun.sun");
    /// while sun.changed().await.is_ok() {
    ///     if let Some(sun) = sun.borrow().as_ref() {
    ///         println!("sun is {}", sun.state);
    ///     }
    /// }
    /// # }
    /// ```
    #[must_use]
    pub fn watch_entity<T>(&self, entity_id: impl Into<String>) -> watch::Receiver<Option<T>>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        self.connection.cache().watch(entity_id)
    }

    // ========== Listeners ==========

    /// Registers a listener for the entities selected by `matcher`.
    pub fn listen<F>(&self, matcher: Matcher, filter: FilterOptions, callback: F) -> ListenerId
    where
        F: Fn(&StateChangeEvent) + Send + Sync + 'static,
    {
        self.listeners.register(matcher, filter, Arc::new(callback))
    }

    /// Listens to one entity.
    pub fn add_entity_listener<F>(
        &self,
        entity_id: impl Into<String>,
        filter: FilterOptions,
        callback: F,
    ) -> ListenerId
    where
        F: Fn(&StateChangeEvent) + Send + Sync + 'static,
    {
        self.listen(Matcher::entity(entity_id), filter, callback)
    }

    /// Listens to several entities with one callback.
    ///
    /// Returns one ID per entity.
    pub fn add_entities_listener<I, S, F>(
        &self,
        entity_ids: I,
        filter: FilterOptions,
        callback: F,
    ) -> Vec<ListenerId>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&StateChangeEvent) + Send + Sync + 'static,
    {
        let callback: crate::subscription::ListenerCallback = Arc::new(callback);
        entity_ids
            .into_iter()
            .map(|id| {
                self.listeners
                    .register(Matcher::entity(id), filter.clone(), Arc::clone(&callback))
            })
            .collect()
    }

    /// Listens to every entity whose ID matches a regular expression.
    ///
    /// # Errors
    ///
    /// Returns `Error::Pattern` if the expression does not compile.
    pub fn add_regex_listener<F>(
        &self,
        pattern: &str,
        filter: FilterOptions,
        callback: F,
    ) -> Result<ListenerId>
    where
        F: Fn(&StateChangeEvent) + Send + Sync + 'static,
    {
        Ok(self.listen(Matcher::pattern(pattern)?, filter, callback))
    }

    /// Listens to every entity of a domain, e.g. `light`.
    pub fn add_domain_listener<F>(
        &self,
        domain: impl Into<String>,
        filter: FilterOptions,
        callback: F,
    ) -> ListenerId
    where
        F: Fn(&StateChangeEvent) + Send + Sync + 'static,
    {
        self.listen(Matcher::domain(domain), filter, callback)
    }

    /// Listens to every entity whose ID contains `needle`.
    pub fn add_substring_listener<F>(
        &self,
        needle: impl Into<String>,
        filter: FilterOptions,
        callback: F,
    ) -> ListenerId
    where
        F: Fn(&StateChangeEvent) + Send + Sync + 'static,
    {
        self.listen(Matcher::substring(needle), filter, callback)
    }

    /// Removes a listener. Returns false if it was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// Returns the number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}
