// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Entity listeners.
//!
//! A listener is a [`Matcher`] selecting entities, [`FilterOptions`]
//! deciding which of their changes are interesting, and a callback. Every
//! state change received from the hub is matched against all listeners, in
//! the order exact ID, pattern, domain, substring.
//!
//! Callbacks run on a bounded [`WorkerPool`]. Events for the same entity
//! are delivered in order; events for different entities are not ordered
//! relative to each other.
//!
//! # Examples
//!
//! ```no_run
//! use hubsocket::Client;
//! use hubsocket::compare::{Comparison, Condition};
//! use hubsocket::subscription::FilterOptions;
//!
//! # async fn example(client: Client) -> hubsocket::Result<()> {
//! let filter = FilterOptions::new()
//!     .ignore_unavailable()
//!     .ignore_no_change()
//!     .condition(Condition::new(Comparison::Greater, 25.0));
//!
//! client.add_domain_listener("sensor", filter, |change| {
//!     println!("{} is now {:?}", change.entity_id, change.new_value());
//! });
//! # Ok(())
//! # }
//! ```

mod dispatcher;
mod filter;
mod listener;
mod pool;

pub(crate) use dispatcher::Dispatcher;
pub use filter::FilterOptions;
pub(crate) use listener::ListenerRegistry;
pub use listener::{ListenerCallback, ListenerId, Matcher};
pub use pool::WorkerPool;
