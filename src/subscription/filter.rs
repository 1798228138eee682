// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-listener filters deciding whether a matched listener fires.

use crate::compare::{Condition, compare};
use crate::state::StateChangeEvent;

/// Suppression flags and conditions for one listener.
///
/// A listener fires unless one of the enabled flags suppresses the event.
/// Conditions are evaluated against the new state and can only short-cut to
/// firing; a condition that does not hold never suppresses.
///
/// # Examples
///
/// ```
/// use hubsocket::state::{EntitySnapshot, StateChangeEvent};
/// use hubsocket::subscription::FilterOptions;
///
/// let filter = FilterOptions::new().ignore_previous_unavailable();
///
/// let event = StateChangeEvent::new(
///     "light.kitchen",
///     Some(EntitySnapshot::new("light.kitchen", "unavailable")),
///     Some(EntitySnapshot::new("light.kitchen", "on")),
/// );
/// assert!(!filter.should_fire(&event));
/// assert!(FilterOptions::new().should_fire(&event));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterOptions {
    ignore_unavailable: bool,
    ignore_unknown: bool,
    ignore_previous_unavailable: bool,
    ignore_previous_unknown: bool,
    ignore_previous_missing: bool,
    ignore_no_change: bool,
    conditions: Vec<Condition>,
}

impl FilterOptions {
    /// Creates a filter that lets everything through.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Suppresses events whose new state is `unavailable`.
    #[must_use]
    pub fn ignore_unavailable(mut self) -> Self {
        self.ignore_unavailable = true;
        self
    }

    /// Suppresses events whose new state is `unknown`.
    #[must_use]
    pub fn ignore_unknown(mut self) -> Self {
        self.ignore_unknown = true;
        self
    }

    /// Suppresses events whose previous state was `unavailable`.
    #[must_use]
    pub fn ignore_previous_unavailable(mut self) -> Self {
        self.ignore_previous_unavailable = true;
        self
    }

    /// Suppresses events whose previous state was `unknown`.
    #[must_use]
    pub fn ignore_previous_unknown(mut self) -> Self {
        self.ignore_previous_unknown = true;
        self
    }

    /// Suppresses events without a previous state (newly created entities).
    #[must_use]
    pub fn ignore_previous_missing(mut self) -> Self {
        self.ignore_previous_missing = true;
        self
    }

    /// Suppresses events whose raw state value did not change.
    #[must_use]
    pub fn ignore_no_change(mut self) -> Self {
        self.ignore_no_change = true;
        self
    }

    /// Adds a condition on the new state.
    #[must_use]
    pub fn condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Returns the configured conditions.
    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Decides whether a listener with this filter fires for `event`.
    #[must_use]
    pub fn should_fire(&self, event: &StateChangeEvent) -> bool {
        let old = event.old_value();
        let new = event.new_value();

        if self.ignore_previous_missing && old.is_none() {
            return false;
        }
        if let Some(old) = old {
            if self.ignore_previous_unknown && old.is_unknown() {
                return false;
            }
            if self.ignore_previous_unavailable && old.is_unavailable() {
                return false;
            }
        }
        if let Some(new) = new {
            if self.ignore_unknown && new.is_unknown() {
                return false;
            }
            if self.ignore_unavailable && new.is_unavailable() {
                return false;
            }
        }
        if self.ignore_no_change
            && let (Some(old), Some(new)) = (old, new)
            && old == new
        {
            return false;
        }

        // Conditions only ever short-cut to firing.
        if let Some(new) = new {
            for condition in &self.conditions {
                match compare(condition, new.as_str()) {
                    Ok(true) => return true,
                    Ok(false) => {}
                    Err(e) => {
                        tracing::warn!(
                            entity_id = %event.entity_id,
                            error = %e,
                            "Listener condition could not be evaluated"
                        );
                    }
                }
            }
        }
        true
    }
}
