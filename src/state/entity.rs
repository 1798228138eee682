// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Entity snapshots as reported by the hub.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ParseError;
use crate::types::{Context, StateValue, domain_of};

/// The hub's reported state and attributes for one entity at a point in time.
///
/// Snapshots are replaced wholesale on every state change; they are never
/// merged field by field.
///
/// # Examples
///
/// ```
/// use hubsocket::state::EntitySnapshot;
///
/// let snapshot: EntitySnapshot = serde_json::from_str(r#"{
///     "entity_id": "light.kitchen",
///     "state": "on",
///     "attributes": {"brightness": 180, "friendly_name": "Kitchen"}
/// }"#).unwrap();
///
/// assert_eq!(snapshot.domain(), "light");
/// assert_eq!(snapshot.state.as_bool(), Ok(true));
/// assert_eq!(snapshot.attribute::<u8>("brightness"), Some(180));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    /// Entity ID, e.g. `light.kitchen`.
    pub entity_id: String,
    /// Raw state value.
    pub state: StateValue,
    /// Integration-specific attributes.
    #[serde(default)]
    pub attributes: Map<String, Value>,
    /// When the state value last changed.
    #[serde(default)]
    pub last_changed: Option<DateTime<Utc>>,
    /// When the state or attributes last changed.
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
    /// When the entity last reported, even without a change.
    #[serde(default)]
    pub last_reported: Option<DateTime<Utc>>,
    /// Context of the change that produced this snapshot.
    #[serde(default)]
    pub context: Option<Context>,
}

impl EntitySnapshot {
    /// Creates a snapshot with the given state and no attributes.
    #[must_use]
    pub fn new(entity_id: impl Into<String>, state: impl Into<StateValue>) -> Self {
        Self {
            entity_id: entity_id.into(),
            state: state.into(),
            attributes: Map::new(),
            last_changed: None,
            last_updated: None,
            last_reported: None,
            context: None,
        }
    }

    /// Returns the entity's domain.
    #[must_use]
    pub fn domain(&self) -> &str {
        domain_of(&self.entity_id)
    }

    /// Returns an attribute decoded as `T`.
    ///
    /// Returns `None` if the attribute is missing or has a different shape.
    #[must_use]
    pub fn attribute<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| T::deserialize(v).ok())
    }

    /// Returns the `friendly_name` attribute, if any.
    #[must_use]
    pub fn friendly_name(&self) -> Option<&str> {
        self.attributes.get("friendly_name").and_then(Value::as_str)
    }

    /// Decodes the whole snapshot into a caller-defined struct.
    ///
    /// `T` sees the wire shape: `entity_id`, `state`, `attributes` and the
    /// timestamps.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::Json` if the snapshot does not match `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ParseError> {
        let value = serde_json::to_value(self)?;
        Ok(T::deserialize(value)?)
    }

    /// Decodes all attributes into a caller-defined struct.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::Json` if the attributes do not match `T`.
    pub fn decode_attributes<T: DeserializeOwned>(&self) -> Result<T, ParseError> {
        let value = Value::Object(self.attributes.clone());
        Ok(T::deserialize(value)?)
    }
}
