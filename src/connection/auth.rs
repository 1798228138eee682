// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Authentication handshake.
//!
//! The hub opens with an `auth_required` greeting carrying its version. The
//! client answers with its access token until the hub replies `auth_ok`
//! (done) or `auth_invalid` (fatal). Any other reply is retried after a
//! pause, up to the configured number of attempts.

use secrecy::ExposeSecret;

use crate::config::ClientConfig;
use crate::error::{AuthError, ParseError, ProtocolError, Result};
use crate::protocol::MessageType;
use crate::protocol::Transport;
use crate::protocol::frame::{AuthFrame, AuthPhaseFrame};
use crate::types::Version;

/// Runs the handshake and returns the hub's version.
pub(crate) async fn authenticate(transport: &mut Transport, config: &ClientConfig) -> Result<Version> {
    let version = read_greeting(transport, config.minimum_version()).await?;
    tracing::debug!(version = %version, "Received auth greeting");

    let credentials = AuthFrame::new(config.access_token().expose_secret()).encode()?;
    let attempts = config.auth_attempts();

    for attempt in 1..=attempts {
        transport.send(credentials.clone()).await?;
        let reply = transport.recv().await?;

        match serde_json::from_str::<AuthPhaseFrame>(&reply) {
            Ok(frame) if frame.message_type() == MessageType::AuthOk => {
                tracing::info!(version = %version, attempt, "Authenticated");
                return Ok(version);
            }
            Ok(frame) if frame.message_type() == MessageType::AuthInvalid => {
                let message = frame.message.unwrap_or_default();
                tracing::error!(message = %message, "Credentials rejected");
                return Err(AuthError::Invalid(message).into());
            }
            Ok(frame) => {
                tracing::warn!(attempt, kind = %frame.kind, "Authentication not confirmed");
            }
            Err(e) => {
                tracing::warn!(attempt, error = %e, "Undecodable authentication reply");
            }
        }

        if attempt < attempts {
            tokio::time::sleep(config.auth_retry_delay()).await;
        }
    }

    Err(AuthError::AttemptsExhausted { attempts }.into())
}

async fn read_greeting(transport: &mut Transport, minimum: Version) -> Result<Version> {
    let text = transport.recv().await?;
    let greeting: AuthPhaseFrame = serde_json::from_str(&text).map_err(ParseError::from)?;

    if greeting.message_type() != MessageType::AuthRequired {
        return Err(ProtocolError::UnexpectedMessage {
            expected: MessageType::AuthRequired.as_str(),
            received: greeting.kind,
        }
        .into());
    }

    let raw = greeting.ha_version.ok_or(AuthError::MissingVersion)?;
    let version: Version = raw.parse()?;
    if !version.at_least(minimum) {
        return Err(AuthError::UnsupportedVersion {
            found: version.to_string(),
            minimum: minimum.to_string(),
        }
        .into());
    }
    Ok(version)
}
