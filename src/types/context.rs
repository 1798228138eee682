// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use serde::{Deserialize, Serialize};

/// Origin context the hub attaches to events, states and service calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    /// Context ID.
    #[serde(default)]
    pub id: Option<String>,
    /// ID of the context that caused this one.
    #[serde(default)]
    pub parent_id: Option<String>,
    /// User that triggered the change, if any.
    #[serde(default)]
    pub user_id: Option<String>,
}
