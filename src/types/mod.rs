// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types shared across the client.
//!
//! # Types
//!
//! - [`StateValue`] - Raw entity state text with typed accessors
//! - [`EntityId`] - Validated `domain.name` identifier
//! - [`Version`] - Hub release version used for the handshake check
//! - [`Context`] - Origin context attached to states and events

mod context;
mod entity_id;
mod state_value;
mod version;

pub use context::Context;
pub use entity_id::{DOMAIN_SEPARATOR, EntityId, domain_of};
pub(crate) use state_value::{parse_bool, parse_f64, parse_i64};
pub use state_value::{StateValue, UNAVAILABLE, UNKNOWN};
pub use version::Version;
