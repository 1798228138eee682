// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wire frames exchanged with the hub.
//!
//! Every frame is a JSON object carrying a `type` discriminator. Frames sent
//! after authentication also carry an integer `id` that correlates a command
//! with its `result` or `pong` reply.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CommandError, ParseError};
use crate::event::Event;

/// The `type` discriminator of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Greeting sent by the hub when a connection opens.
    AuthRequired,
    /// Credentials sent by the client.
    Auth,
    /// The hub accepted the credentials.
    AuthOk,
    /// The hub rejected the credentials.
    AuthInvalid,
    /// Reply to a command.
    Result,
    /// Event on an active subscription.
    Event,
    /// Heartbeat probe.
    Ping,
    /// Heartbeat reply.
    Pong,
    /// Starts an event subscription.
    SubscribeEvents,
    /// Ends an event subscription.
    UnsubscribeEvents,
    /// Fires a custom event on the hub's bus.
    FireEvent,
    /// Invokes a service.
    CallService,
    /// Fetches every entity snapshot.
    GetStates,
    /// Fetches the hub configuration.
    GetConfig,
    /// Fetches the service catalogue.
    GetServices,
    /// Fetches the registered panels.
    GetPanels,
    /// Any type this client does not know.
    Unknown,
}

impl MessageType {
    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AuthRequired => "auth_required",
            Self::Auth => "auth",
            Self::AuthOk => "auth_ok",
            Self::AuthInvalid => "auth_invalid",
            Self::Result => "result",
            Self::Event => "event",
            Self::Ping => "ping",
            Self::Pong => "pong",
            Self::SubscribeEvents => "subscribe_events",
            Self::UnsubscribeEvents => "unsubscribe_events",
            Self::FireEvent => "fire_event",
            Self::CallService => "call_service",
            Self::GetStates => "get_states",
            Self::GetConfig => "get_config",
            Self::GetServices => "get_services",
            Self::GetPanels => "get_panels",
            Self::Unknown => "unknown",
        }
    }

    /// Maps a wire name to a message type.
    #[must_use]
    pub fn from_wire(name: &str) -> Self {
        match name {
            "auth_required" => Self::AuthRequired,
            "auth" => Self::Auth,
            "auth_ok" => Self::AuthOk,
            "auth_invalid" => Self::AuthInvalid,
            "result" => Self::Result,
            "event" => Self::Event,
            "ping" => Self::Ping,
            "pong" => Self::Pong,
            "subscribe_events" => Self::SubscribeEvents,
            "unsubscribe_events" => Self::UnsubscribeEvents,
            "fire_event" => Self::FireEvent,
            "call_service" => Self::CallService,
            "get_states" => Self::GetStates,
            "get_config" => Self::GetConfig,
            "get_services" => Self::GetServices,
            "get_panels" => Self::GetPanels,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Minimal view of an inbound frame used for routing.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Envelope {
    #[serde(default)]
    pub(crate) id: Option<u64>,
    #[serde(rename = "type")]
    pub(crate) kind: String,
}

impl Envelope {
    pub(crate) fn message_type(&self) -> MessageType {
        MessageType::from_wire(&self.kind)
    }
}

/// Error detail of a failed command.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ErrorDetail {
    #[serde(default, deserialize_with = "code_as_string")]
    pub(crate) code: String,
    #[serde(default)]
    pub(crate) message: String,
}

/// Error codes are usually strings, but older integrations send numbers.
fn code_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Reply to a command.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ResultFrame {
    pub(crate) id: u64,
    pub(crate) success: bool,
    #[serde(default)]
    pub(crate) error: Option<ErrorDetail>,
    #[serde(default)]
    pub(crate) result: Option<Value>,
}

impl ResultFrame {
    /// Converts the reply into the command's outcome.
    pub(crate) fn into_outcome(self) -> Result<Value, CommandError> {
        if self.success {
            return Ok(self.result.unwrap_or(Value::Null));
        }
        let detail = self.error.unwrap_or_default();
        Err(CommandError::Server {
            code: detail.code,
            message: detail.message,
        })
    }
}

/// A pushed event for a subscription.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct EventFrame {
    pub(crate) id: u64,
    pub(crate) event: Event,
}

/// Frames of the authentication phase.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AuthPhaseFrame {
    #[serde(rename = "type")]
    pub(crate) kind: String,
    #[serde(default)]
    pub(crate) ha_version: Option<String>,
    #[serde(default)]
    pub(crate) message: Option<String>,
}

impl AuthPhaseFrame {
    pub(crate) fn message_type(&self) -> MessageType {
        MessageType::from_wire(&self.kind)
    }
}

/// Credential frame. It is the only outbound frame without an `id`.
#[derive(Serialize)]
pub(crate) struct AuthFrame<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    access_token: &'a str,
}

impl<'a> AuthFrame<'a> {
    pub(crate) fn new(access_token: &'a str) -> Self {
        Self {
            kind: MessageType::Auth.as_str(),
            access_token,
        }
    }

    pub(crate) fn encode(&self) -> Result<String, ParseError> {
        Ok(serde_json::to_string(self)?)
    }
}
