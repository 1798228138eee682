// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! State change notifications.

use serde::{Deserialize, Serialize};

use super::EntitySnapshot;
use crate::types::{StateValue, domain_of};

/// Event type the hub uses for entity state changes.
pub const STATE_CHANGED: &str = "state_changed";

/// One entity's transition from an old snapshot to a new one.
///
/// Either side may be absent: `old_state` is missing when the entity is
/// first created, and `new_state` is missing when it is removed.
///
/// # Examples
///
/// ```
/// use hubsocket::state::{EntitySnapshot, StateChangeEvent};
///
/// let event = StateChangeEvent::new(
///     "light.kitchen",
///     Some(EntitySnapshot::new("light.kitchen", "off")),
///     Some(EntitySnapshot::new("light.kitchen", "on")),
/// );
/// assert_eq!(event.old_value().map(|s| s.as_str()), Some("off"));
/// assert!(!event.is_unchanged());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChangeEvent {
    /// The entity that changed.
    pub entity_id: String,
    /// Snapshot before the change.
    #[serde(default)]
    pub old_state: Option<EntitySnapshot>,
    /// Snapshot after the change.
    #[serde(default)]
    pub new_state: Option<EntitySnapshot>,
}

impl StateChangeEvent {
    /// Creates a state change event.
    #[must_use]
    pub fn new(
        entity_id: impl Into<String>,
        old_state: Option<EntitySnapshot>,
        new_state: Option<EntitySnapshot>,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            old_state,
            new_state,
        }
    }

    /// Returns the entity's domain.
    #[must_use]
    pub fn domain(&self) -> &str {
        domain_of(&self.entity_id)
    }

    /// Returns the raw state before the change.
    #[must_use]
    pub fn old_value(&self) -> Option<&StateValue> {
        self.old_state.as_ref().map(|s| &s.state)
    }

    /// Returns the raw state after the change.
    #[must_use]
    pub fn new_value(&self) -> Option<&StateValue> {
        self.new_state.as_ref().map(|s| &s.state)
    }

    /// Returns true if the raw state value did not change.
    ///
    /// Attribute-only updates count as unchanged.
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.old_value() == self.new_value()
    }
}
