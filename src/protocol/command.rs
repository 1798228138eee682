// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Commands sent to the hub.
//!
//! Each command is encoded as `{"id": <id>, "type": <type>, ...fields}`.
//! The `id` is assigned at send time by the correlator.
//!
//! # Examples
//!
//! ```
//! use hubsocket::protocol::{CallService, Command};
//! use serde_json::json;
//!
//! let cmd = CallService::new("light", "turn_on")
//!     .with_data(json!({"brightness": 128}))
//!     .with_entity("light.kitchen");
//!
//! let frame: serde_json::Value = serde_json::from_str(&cmd.encode(7)).unwrap();
//! assert_eq!(frame["id"], 7);
//! assert_eq!(frame["type"], "call_service");
//! assert_eq!(frame["target"]["entity_id"], "light.kitchen");
//! ```

use serde_json::{Map, Value};

use super::MessageType;

/// A command that can be sent over the socket.
pub trait Command: Send + Sync {
    /// Returns the wire type of this command.
    fn message_type(&self) -> MessageType;

    /// Returns the command-specific fields.
    fn fields(&self) -> Map<String, Value> {
        Map::new()
    }

    /// Encodes the command with the given request ID.
    fn encode(&self, id: u64) -> String {
        let mut frame = self.fields();
        frame.insert("id".to_string(), Value::from(id));
        frame.insert(
            "type".to_string(),
            Value::from(self.message_type().as_str()),
        );
        Value::Object(frame).to_string()
    }
}

/// Liveness probe answered with a `pong`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ping;

impl Command for Ping {
    fn message_type(&self) -> MessageType {
        MessageType::Ping
    }
}

/// Fetches every entity snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct GetStates;

impl Command for GetStates {
    fn message_type(&self) -> MessageType {
        MessageType::GetStates
    }
}

/// Fetches the hub configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct GetConfig;

impl Command for GetConfig {
    fn message_type(&self) -> MessageType {
        MessageType::GetConfig
    }
}

/// Fetches the service catalogue.
#[derive(Debug, Clone, Copy, Default)]
pub struct GetServices;

impl Command for GetServices {
    fn message_type(&self) -> MessageType {
        MessageType::GetServices
    }
}

/// Fetches the registered frontend panels.
#[derive(Debug, Clone, Copy, Default)]
pub struct GetPanels;

impl Command for GetPanels {
    fn message_type(&self) -> MessageType {
        MessageType::GetPanels
    }
}

/// Subscribes to pushed events, optionally of one type only.
#[derive(Debug, Clone, Default)]
pub struct SubscribeEvents {
    event_type: Option<String>,
}

impl SubscribeEvents {
    /// Subscribes to every event type.
    #[must_use]
    pub fn all() -> Self {
        Self { event_type: None }
    }

    /// Subscribes to one event type.
    #[must_use]
    pub fn of_type(event_type: impl Into<String>) -> Self {
        Self {
            event_type: Some(event_type.into()),
        }
    }

    /// Returns the subscribed event type, if restricted.
    #[must_use]
    pub fn event_type(&self) -> Option<&str> {
        self.event_type.as_deref()
    }
}

impl Command for SubscribeEvents {
    fn message_type(&self) -> MessageType {
        MessageType::SubscribeEvents
    }

    fn fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        if let Some(event_type) = &self.event_type {
            fields.insert("event_type".to_string(), Value::from(event_type.as_str()));
        }
        fields
    }
}

/// Cancels a subscription by the ID of its `subscribe_events` request.
#[derive(Debug, Clone, Copy)]
pub struct UnsubscribeEvents {
    subscription: u64,
}

impl UnsubscribeEvents {
    /// Creates the command for the given subscription request ID.
    #[must_use]
    pub fn new(subscription: u64) -> Self {
        Self { subscription }
    }
}

impl Command for UnsubscribeEvents {
    fn message_type(&self) -> MessageType {
        MessageType::UnsubscribeEvents
    }

    fn fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("subscription".to_string(), Value::from(self.subscription));
        fields
    }
}

/// Fires a custom event on the hub's event bus.
#[derive(Debug, Clone)]
pub struct FireEvent {
    event_type: String,
    event_data: Option<Value>,
}

impl FireEvent {
    /// Creates an event without data.
    #[must_use]
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            event_data: None,
        }
    }

    /// Attaches event data.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.event_data = Some(data);
        self
    }
}

impl Command for FireEvent {
    fn message_type(&self) -> MessageType {
        MessageType::FireEvent
    }

    fn fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert(
            "event_type".to_string(),
            Value::from(self.event_type.as_str()),
        );
        if let Some(data) = &self.event_data {
            fields.insert("event_data".to_string(), data.clone());
        }
        fields
    }
}

/// Calls a service, e.g. `light.turn_on`.
#[derive(Debug, Clone)]
pub struct CallService {
    domain: String,
    service: String,
    service_data: Option<Value>,
    target: Option<Value>,
}

impl CallService {
    /// Creates a service call without data or target.
    #[must_use]
    pub fn new(domain: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            service: service.into(),
            service_data: None,
            target: None,
        }
    }

    /// Sets the service data payload.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.service_data = Some(data);
        self
    }

    /// Sets an arbitrary target object (`entity_id`, `device_id`, `area_id`).
    #[must_use]
    pub fn with_target(mut self, target: Value) -> Self {
        self.target = Some(target);
        self
    }

    /// Targets a single entity.
    #[must_use]
    pub fn with_entity(self, entity_id: impl Into<String>) -> Self {
        let mut target = Map::new();
        target.insert("entity_id".to_string(), Value::from(entity_id.into()));
        self.with_target(Value::Object(target))
    }

    /// Returns the service domain.
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Returns the service name.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }
}

impl Command for CallService {
    fn message_type(&self) -> MessageType {
        MessageType::CallService
    }

    fn fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("domain".to_string(), Value::from(self.domain.as_str()));
        fields.insert("service".to_string(), Value::from(self.service.as_str()));
        if let Some(data) = &self.service_data {
            fields.insert("service_data".to_string(), data.clone());
        }
        if let Some(target) = &self.target {
            fields.insert("target".to_string(), target.clone());
        }
        fields
    }
}
