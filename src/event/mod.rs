// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Events pushed by the hub.
//!
//! Every `event` frame carries an [`Event`]. Events of type `state_changed`
//! on the client's own subscription feed the state cache and entity
//! listeners; events on subscriptions made with
//! [`Client::subscribe_events`](crate::Client::subscribe_events) are handed
//! to the registered handler as-is.
//!
//! # Examples
//!
//! ```
//! use hubsocket::event::Event;
//!
//! let event: Event = serde_json::from_str(r#"{
//!     "event_type": "call_service",
//!     "data": {"domain": "light", "service": "turn_on"},
//!     "origin": "LOCAL",
//!     "time_fired": "2024-05-01T10:00:00+00:00"
//! }"#).unwrap();
//!
//! assert_eq!(event.event_type, "call_service");
//! assert_eq!(event.data["domain"], "light");
//! ```

mod registry;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use registry::SubscriptionId;
pub(crate) use registry::{EventHandler, EventSubscriptions};

use crate::error::ParseError;
use crate::state::{STATE_CHANGED, StateChangeEvent};
use crate::types::Context;

/// One event from the hub's event bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event type, e.g. `state_changed`.
    pub event_type: String,
    /// Event payload.
    #[serde(default)]
    pub data: Value,
    /// `LOCAL` or `REMOTE`.
    #[serde(default)]
    pub origin: Option<String>,
    /// When the event was fired.
    #[serde(default)]
    pub time_fired: Option<DateTime<Utc>>,
    /// Context of the event.
    #[serde(default)]
    pub context: Option<Context>,
}

impl Event {
    /// Returns true for entity state changes.
    #[must_use]
    pub fn is_state_changed(&self) -> bool {
        self.event_type == STATE_CHANGED
    }

    /// Decodes the payload into a caller-defined type.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::Json` if the payload does not match `T`.
    pub fn decode_data<T: DeserializeOwned>(&self) -> Result<T, ParseError> {
        Ok(T::deserialize(&self.data)?)
    }

    /// Decodes the payload of a `state_changed` event.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::Json` if the payload is malformed.
    pub fn state_change(&self) -> Result<StateChangeEvent, ParseError> {
        self.decode_data()
    }
}
