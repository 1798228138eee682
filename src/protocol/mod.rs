// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wire protocol for the hub's websocket API.
//!
//! - [`Command`] and its implementations encode outbound commands
//! - [`MessageType`] classifies frames by their `type` field
//! - [`Connector`] and [`Transport`] abstract the duplex socket
//!
//! Request correlation is internal: commands are sent through the client,
//! which assigns IDs and matches replies.

mod command;
pub(crate) mod correlator;
pub(crate) mod frame;
mod transport;

pub use command::{
    CallService, Command, FireEvent, GetConfig, GetPanels, GetServices, GetStates, Ping,
    SubscribeEvents, UnsubscribeEvents,
};
pub(crate) use correlator::Correlator;
pub use frame::MessageType;
pub use transport::{Connector, Transport, TransportPeer, WebSocketConnector};
