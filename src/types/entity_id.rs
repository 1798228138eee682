// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Entity identifiers of the form `domain.name`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ParseError;

/// Separator between the domain and the object name.
pub const DOMAIN_SEPARATOR: char = '.';

/// Returns the domain part of an entity ID (everything before the first `.`).
///
/// IDs without a separator are their own domain.
///
/// # Examples
///
/// ```
/// use hubsocket::types::domain_of;
///
/// assert_eq!(domain_of("light.kitchen"), "light");
/// assert_eq!(domain_of("sun"), "sun");
/// ```
#[must_use]
pub fn domain_of(entity_id: &str) -> &str {
    entity_id
        .split_once(DOMAIN_SEPARATOR)
        .map_or(entity_id, |(domain, _)| domain)
}

/// A validated entity ID.
///
/// # Examples
///
/// ```
/// use hubsocket::types::EntityId;
///
/// let id: EntityId = "light.kitchen".parse().unwrap();
/// assert_eq!(id.domain(), "light");
/// assert_eq!(id.name(), "kitchen");
/// assert_eq!(id.to_string(), "light.kitchen");
///
/// assert!("kitchen".parse::<EntityId>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId {
    domain: String,
    name: String,
}

impl EntityId {
    /// Creates an entity ID from its parts.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::InvalidEntityId` if either part is empty or the
    /// domain contains the separator.
    pub fn new(domain: impl Into<String>, name: impl Into<String>) -> Result<Self, ParseError> {
        let domain = domain.into();
        let name = name.into();
        if domain.is_empty() || name.is_empty() || domain.contains(DOMAIN_SEPARATOR) {
            return Err(ParseError::InvalidEntityId(format!("{domain}.{name}")));
        }
        Ok(Self { domain, name })
    }

    /// Returns the domain, e.g. `light`.
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Returns the object name, e.g. `kitchen`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl FromStr for EntityId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(DOMAIN_SEPARATOR) {
            Some((domain, name)) if !name.contains(DOMAIN_SEPARATOR) => Self::new(domain, name),
            _ => Err(ParseError::InvalidEntityId(s.to_string())),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{DOMAIN_SEPARATOR}{}", self.domain, self.name)
    }
}

impl Serialize for EntityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_ids() {
        let id: EntityId = "binary_sensor.front_door".parse().unwrap();
        assert_eq!(id.domain(), "binary_sensor");
        assert_eq!(id.name(), "front_door");
    }

    #[test]
    fn rejects_malformed_ids() {
        for raw in ["", "light", ".kitchen", "light.", "a.b.c"] {
            assert!(raw.parse::<EntityId>().is_err(), "{raw}");
        }
    }

    #[test]
    fn domain_of_handles_missing_separator() {
        assert_eq!(domain_of("switch.porch"), "switch");
        assert_eq!(domain_of("zone"), "zone");
        assert_eq!(domain_of(""), "");
    }

    #[test]
    fn serde_as_string() {
        let id: EntityId = serde_json::from_str("\"light.den\"").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"light.den\"");
    }
}
