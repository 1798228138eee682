// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Connection lifecycle states and their broadcast bus.

use std::fmt;

use parking_lot::RwLock;
use tokio::sync::broadcast;

/// Default channel capacity for lifecycle notifications.
const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Lifecycle of the connection to the hub.
///
/// ```text
/// Disconnected -> Connecting -> Authenticating -> Ready
///                     ^                             |
///                     +------- Reconnecting <-------+
///                                   |
///                                   v
///                                 Failed
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not running.
    Disconnected,
    /// Dialing the hub.
    Connecting,
    /// Exchanging the greeting and credentials.
    Authenticating,
    /// Authenticated, cache seeded and state changes subscribed.
    Ready,
    /// The connection was lost; waiting before the next attempt.
    Reconnecting {
        /// Reconnect attempt, starting at 1 for each outage.
        attempt: u32,
    },
    /// The hub rejected the credentials. Terminal.
    Failed(String),
}

impl ConnectionState {
    /// Returns true if commands can be sent.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Returns true if the client will not connect again on its own.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Failed(_))
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Connecting => f.write_str("connecting"),
            Self::Authenticating => f.write_str("authenticating"),
            Self::Ready => f.write_str("ready"),
            Self::Reconnecting { attempt } => write!(f, "reconnecting (attempt {attempt})"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Current state plus a broadcast of every transition.
///
/// Slow receivers may lag and lose intermediate transitions; the current
/// state is always available through [`StateBus::current`].
#[derive(Debug)]
pub(crate) struct StateBus {
    current: RwLock<ConnectionState>,
    sender: broadcast::Sender<ConnectionState>,
}

impl StateBus {
    pub(crate) fn new() -> Self {
        let (sender, _) = broadcast::channel(DEFAULT_CHANNEL_CAPACITY);
        Self {
            current: RwLock::new(ConnectionState::Disconnected),
            sender,
        }
    }

    pub(crate) fn current(&self) -> ConnectionState {
        self.current.read().clone()
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<ConnectionState> {
        self.sender.subscribe()
    }

    /// Records a transition and publishes it.
    ///
    /// Repeating the current state is not a transition and is not published.
    pub(crate) fn set(&self, state: ConnectionState) {
        {
            let mut current = self.current.write();
            if *current == state {
                return;
            }
            *current = state.clone();
        }
        tracing::debug!(state = %state, "Connection state changed");
        // No subscribers is fine
        let _ = self.sender.send(state);
    }
}

impl Default for StateBus {
    fn default() -> Self {
        Self::new()
    }
}
