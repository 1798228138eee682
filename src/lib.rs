// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `hubsocket` - A Rust client for the Home Assistant websocket API.
//!
//! The client keeps one authenticated websocket connection to the hub,
//! mirrors every entity's state in a local cache and calls your listeners
//! when entities change.
//!
//! # Supported Features
//!
//! - **Connection management**: authentication, heartbeat, automatic
//!   reconnect with cache re-seeding and subscription replay
//! - **Commands**: `get_states`, `get_config`, `get_services`, `get_panels`,
//!   `call_service`, `fire_event` and any custom [`Command`]
//! - **State cache**: thread-safe copy-out reads of the latest snapshots and
//!   typed per-entity watch channels
//! - **Entity listeners**: match by entity ID, regular expression, domain or
//!   substring, with [`FilterOptions`] and typed [conditions](compare)
//! - **Raw event subscriptions** that survive reconnects
//!
//! # Quick Start
//!
//! ```no_run
//! use hubsocket::Client;
//!
//! #[tokio::main]
//! async fn main() -> hubsocket::Result<()> {
//!     let client = Client::builder()
//!         .host("homeassistant.local:8123")
//!         .access_token("long-lived-token")
//!         .build()?;
//!
//!     client.run().await?;
//!
//!     if let Some(sun) = client.state("sun.sun") {
//!         println!("sun is {}", sun.state);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Listening to Entities
//!
//! Listeners may be registered before or after [`Client::run`]. Callbacks run
//! on a bounded worker pool; events for the same entity arrive in order.
//!
//! ```no_run
//! use hubsocket::Client;
//! use hubsocket::compare::{Comparison, Condition};
//! use hubsocket::subscription::FilterOptions;
//!
//! # async fn example(client: Client) -> hubsocket::Result<()> {
//! let filter = FilterOptions::new()
//!     .ignore_unavailable()
//!     .ignore_previous_missing()
//!     .ignore_no_change();
//!
//! client.add_regex_listener(r"^binary_sensor\..*_door$", filter, |change| {
//!     if change.new_value().is_some_and(|v| v.as_bool_or(false)) {
//!         println!("{} opened", change.entity_id);
//!     }
//! })?;
//!
//! client.add_entity_listener(
//!     "sensor.outdoor_temperature",
//!     FilterOptions::new().condition(Condition::new(Comparison::Greater, 30.0)),
//!     |change| println!("hot: {:?}", change.new_value()),
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Connection Events
//!
//! ```no_run
//! use hubsocket::{Client, ConnectionState};
//!
//! # async fn example(client: Client) {
//! let mut events = client.connection_events();
//! while let Ok(state) = events.recv().await {
//!     if let ConnectionState::Failed(reason) = state {
//!         eprintln!("giving up: {reason}");
//!         break;
//!     }
//! }
//! # }
//! ```

mod client;
pub mod compare;
pub mod config;
mod connection;
pub mod error;
pub mod event;
pub mod protocol;
pub mod state;
pub mod subscription;
pub mod types;

pub use client::Client;
pub use compare::{Comparison, Condition, Operand, compare};
pub use config::{ClientBuilder, ClientConfig};
pub use connection::ConnectionState;
pub use error::{
    AuthError, CommandError, CompareError, ConfigError, Error, ParseError, ProtocolError, Result,
    ValueError,
};
pub use event::{Event, SubscriptionId};
pub use protocol::{Command, Connector, Transport, TransportPeer, WebSocketConnector};
pub use state::{EntitySnapshot, StateCache, StateChangeEvent};
pub use subscription::{FilterOptions, ListenerId, Matcher, WorkerPool};
pub use types::{Context, EntityId, StateValue, Version};
