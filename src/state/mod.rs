// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Entity state types and the local state cache.
//!
//! [`EntitySnapshot`] is the hub's view of one entity. A
//! [`StateChangeEvent`] carries the transition pushed for a `state_changed`
//! event, and the [`StateCache`] keeps the latest snapshot per entity.
//!
//! # Examples
//!
//! ```
//! use hubsocket::state::{EntitySnapshot, StateChangeEvent};
//!
//! let event = StateChangeEvent::new(
//!     "binary_sensor.door",
//!     None,
//!     Some(EntitySnapshot::new("binary_sensor.door", "open")),
//! );
//!
//! assert_eq!(event.domain(), "binary_sensor");
//! assert_eq!(event.new_value().unwrap().as_bool(), Ok(true));
//! ```

mod cache;
mod entity;
mod state_change;

pub use cache::StateCache;
pub use entity::EntitySnapshot;
pub use state_change::{STATE_CHANGED, StateChangeEvent};
