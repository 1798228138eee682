// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Raw entity state values.
//!
//! Home Assistant reports every entity state as text. [`StateValue`] keeps
//! that text and interprets it on demand as a boolean, number or time.

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ValueError;

/// State text reported for entities that are offline.
pub const UNAVAILABLE: &str = "unavailable";

/// State text reported for entities whose state is not known.
pub const UNKNOWN: &str = "unknown";

/// The raw state of an entity, interpreted lazily.
///
/// # Examples
///
/// ```
/// use hubsocket::types::StateValue;
///
/// let state = StateValue::from("on");
/// assert_eq!(state.as_bool(), Ok(true));
///
/// let temp = StateValue::from("21.5");
/// assert_eq!(temp.as_f64(), Ok(21.5));
/// assert!(temp.as_i64().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct StateValue(String);

impl StateValue {
    /// Creates a state value from raw text.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the raw text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the entity is unavailable.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        self.0 == UNAVAILABLE
    }

    /// Returns true if the entity state is unknown.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN
    }

    /// Interprets the state as a boolean.
    ///
    /// Recognizes `on`/`off`, `true`/`false`, `locked`/`unlocked` and
    /// `open`/`closed`, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::NotConvertible` for any other text.
    pub fn as_bool(&self) -> Result<bool, ValueError> {
        parse_bool(&self.0)
    }

    /// Interprets the state as a boolean, falling back to `default`.
    #[must_use]
    pub fn as_bool_or(&self, default: bool) -> bool {
        self.as_bool().unwrap_or(default)
    }

    /// Interprets the state as a signed integer.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::NotConvertible` if the text is not an integer.
    pub fn as_i64(&self) -> Result<i64, ValueError> {
        parse_i64(&self.0)
    }

    /// Interprets the state as a floating point number.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::NotConvertible` if the text is not a number.
    pub fn as_f64(&self) -> Result<f64, ValueError> {
        parse_f64(&self.0)
    }

    /// Interprets the state as a time of day using a `chrono` format string.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::NotConvertible` if the text does not match.
    pub fn as_time(&self, format: &str) -> Result<NaiveTime, ValueError> {
        NaiveTime::parse_from_str(&self.0, format).map_err(|_| self.not_convertible("time"))
    }

    /// Interprets the state as an RFC 3339 timestamp.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::NotConvertible` if the text is not RFC 3339.
    pub fn as_datetime(&self) -> Result<DateTime<FixedOffset>, ValueError> {
        DateTime::parse_from_rfc3339(&self.0).map_err(|_| self.not_convertible("datetime"))
    }

    fn not_convertible(&self, target: &'static str) -> ValueError {
        ValueError::NotConvertible {
            value: self.0.clone(),
            target,
        }
    }
}

/// Parses paired on/off vocabularies into a boolean.
pub(crate) fn parse_bool(raw: &str) -> Result<bool, ValueError> {
    match raw.to_lowercase().as_str() {
        "on" | "true" | "locked" | "open" => Ok(true),
        "off" | "false" | "unlocked" | "closed" => Ok(false),
        _ => Err(ValueError::NotConvertible {
            value: raw.to_string(),
            target: "bool",
        }),
    }
}

pub(crate) fn parse_i64(raw: &str) -> Result<i64, ValueError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| ValueError::NotConvertible {
            value: raw.to_string(),
            target: "integer",
        })
}

pub(crate) fn parse_f64(raw: &str) -> Result<f64, ValueError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| ValueError::NotConvertible {
            value: raw.to_string(),
            target: "float",
        })
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StateValue {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for StateValue {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for StateValue {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for StateValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Some integrations report numbers or booleans; keep their JSON text.
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(match value {
            serde_json::Value::String(s) => Self(s),
            serde_json::Value::Null => Self(UNKNOWN.to_string()),
            other => Self(other.to_string()),
        })
    }
}
