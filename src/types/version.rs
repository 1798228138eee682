// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Hub release versions.

use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// A `major.minor.patch` Home Assistant release.
///
/// Pre-release and development suffixes on the patch component are ignored,
/// so `2024.10.0b1` parses as `2024.10.0`.
///
/// # Examples
///
/// ```
/// use hubsocket::types::Version;
///
/// let v: Version = "2024.10.3".parse().unwrap();
/// assert!(v >= Version::new(2024, 1, 0));
/// assert_eq!(v.to_string(), "2024.10.3");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    major: u32,
    minor: u32,
    patch: u32,
}

impl Version {
    /// Creates a version from its components.
    #[must_use]
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Returns the major component (the release year).
    #[must_use]
    pub const fn major(&self) -> u32 {
        self.major
    }

    /// Returns the minor component (the release month).
    #[must_use]
    pub const fn minor(&self) -> u32 {
        self.minor
    }

    /// Returns the patch component.
    #[must_use]
    pub const fn patch(&self) -> u32 {
        self.patch
    }

    /// Returns true if this version is at least `minimum`.
    #[must_use]
    pub fn at_least(&self, minimum: Version) -> bool {
        *self >= minimum
    }
}

impl FromStr for Version {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::InvalidVersion(s.to_string());

        let mut parts = s.trim().splitn(3, '.');
        let major = parts.next().ok_or_else(invalid)?;
        let minor = parts.next().ok_or_else(invalid)?;
        let patch = parts.next().ok_or_else(invalid)?;

        let patch_digits: String = patch.chars().take_while(char::is_ascii_digit).collect();

        Ok(Self {
            major: major.parse().map_err(|_| invalid())?,
            minor: minor.parse().map_err(|_| invalid())?,
            patch: patch_digits.parse().map_err(|_| invalid())?,
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
