// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Client configuration.
//!
//! [`ClientBuilder`] collects the settings and validates them when the client
//! is built. The result is an immutable [`ClientConfig`] shared by every
//! connection the client makes.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::Client;
use crate::error::{ConfigError, Result};
use crate::protocol::{Connector, WebSocketConnector};
use crate::subscription::WorkerPool;
use crate::types::Version;

/// Path of the websocket endpoint on the hub.
pub const WEBSOCKET_PATH: &str = "/api/websocket";

/// Oldest hub release this client talks to.
pub const MINIMUM_VERSION: Version = Version::new(2024, 1, 0);

/// Validated, immutable client settings.
#[derive(Clone)]
pub struct ClientConfig {
    url: Url,
    access_token: SecretString,
    heartbeat_interval: Duration,
    pong_timeout: Duration,
    max_missed_pongs: u32,
    request_timeout: Duration,
    minimum_version: Version,
    auth_attempts: u32,
    auth_retry_delay: Duration,
    reconnect_delay: Duration,
    worker_pool: WorkerPool,
    connector: Arc<dyn Connector>,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("url", &self.url.as_str())
            .field("access_token", &self.access_token)
            .field("heartbeat_interval", &self.heartbeat_interval)
            .field("pong_timeout", &self.pong_timeout)
            .field("max_missed_pongs", &self.max_missed_pongs)
            .field("request_timeout", &self.request_timeout)
            .field("minimum_version", &self.minimum_version)
            .field("auth_attempts", &self.auth_attempts)
            .field("auth_retry_delay", &self.auth_retry_delay)
            .field("reconnect_delay", &self.reconnect_delay)
            .field("worker_pool", &self.worker_pool)
            .finish_non_exhaustive()
    }
}

impl ClientConfig {
    /// Returns the websocket URL.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub(crate) fn access_token(&self) -> &SecretString {
        &self.access_token
    }

    /// Returns the interval between liveness probes.
    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    /// Returns how long a liveness probe may wait for its pong.
    #[must_use]
    pub fn pong_timeout(&self) -> Duration {
        self.pong_timeout
    }

    /// Returns the number of consecutive missed pongs that forces a reconnect.
    #[must_use]
    pub fn max_missed_pongs(&self) -> u32 {
        self.max_missed_pongs
    }

    /// Returns the deadline for ordinary commands.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Returns the oldest accepted hub version.
    #[must_use]
    pub fn minimum_version(&self) -> Version {
        self.minimum_version
    }

    /// Returns how many credential frames are sent before giving up.
    #[must_use]
    pub fn auth_attempts(&self) -> u32 {
        self.auth_attempts
    }

    /// Returns the pause between authentication attempts.
    #[must_use]
    pub fn auth_retry_delay(&self) -> Duration {
        self.auth_retry_delay
    }

    /// Returns the pause between reconnect attempts.
    #[must_use]
    pub fn reconnect_delay(&self) -> Duration {
        self.reconnect_delay
    }

    /// Returns the pool running listener callbacks.
    #[must_use]
    pub fn worker_pool(&self) -> &WorkerPool {
        &self.worker_pool
    }

    pub(crate) fn connector(&self) -> &dyn Connector {
        self.connector.as_ref()
    }
}

/// Builder for [`Client`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use hubsocket::Client;
///
/// let client = Client::builder()
///     .host("homeassistant.local:8123")
///     .access_token("long-lived-token")
///     .heartbeat_interval(Duration::from_secs(15))
///     .build()?;
///
/// assert_eq!(
///     client.config().url().as_str(),
///     "ws://homeassistant.local:8123/api/websocket"
/// );
/// # Ok::<(), hubsocket::Error>(())
/// ```
#[must_use]
pub struct ClientBuilder {
    host: String,
    port: Option<u16>,
    access_token: Option<SecretString>,
    secure: bool,
    heartbeat_interval: Duration,
    pong_timeout: Duration,
    max_missed_pongs: u32,
    request_timeout: Duration,
    minimum_version: Version,
    auth_attempts: u32,
    auth_retry_delay: Duration,
    reconnect_delay: Duration,
    worker_pool: Option<WorkerPool>,
    connector: Option<Arc<dyn Connector>>,
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("secure", &self.secure)
            .finish_non_exhaustive()
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: None,
            access_token: None,
            secure: false,
            heartbeat_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(10),
            max_missed_pongs: 3,
            request_timeout: Duration::from_secs(10),
            minimum_version: MINIMUM_VERSION,
            auth_attempts: 5,
            auth_retry_delay: Duration::from_secs(2),
            reconnect_delay: Duration::from_secs(5),
            worker_pool: None,
            connector: None,
        }
    }
}

impl ClientBuilder {
    /// Creates a builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the hub host, optionally with a `:port` suffix.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Overrides the port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the long-lived access token.
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(SecretString::from(token.into()));
        self
    }

    /// Uses `wss://` instead of `ws://`.
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Sets the interval between liveness probes (default: 30 seconds).
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Sets how long to wait for a pong (default: 10 seconds).
    pub fn pong_timeout(mut self, timeout: Duration) -> Self {
        self.pong_timeout = timeout;
        self
    }

    /// Sets the consecutive missed pongs that force a reconnect (default: 3).
    pub fn max_missed_pongs(mut self, count: u32) -> Self {
        self.max_missed_pongs = count;
        self
    }

    /// Sets the deadline for ordinary commands (default: 10 seconds).
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the oldest accepted hub version (default: 2024.1.0).
    pub fn minimum_version(mut self, version: Version) -> Self {
        self.minimum_version = version;
        self
    }

    /// Sets how many credential frames are sent before giving up (default: 5).
    pub fn auth_attempts(mut self, attempts: u32) -> Self {
        self.auth_attempts = attempts;
        self
    }

    /// Sets the pause between authentication attempts (default: 2 seconds).
    pub fn auth_retry_delay(mut self, delay: Duration) -> Self {
        self.auth_retry_delay = delay;
        self
    }

    /// Sets the pause between reconnect attempts (default: 5 seconds).
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Runs listener callbacks on the given pool.
    pub fn worker_pool(mut self, pool: WorkerPool) -> Self {
        self.worker_pool = Some(pool);
        self
    }

    /// Dials through a custom connector instead of a websocket.
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Validates the settings and creates the client.
    ///
    /// The client does not connect until [`Client::run`] is called.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the host or token is missing, the host does
    /// not form a valid URL, or a numeric setting is zero.
    pub fn build(self) -> Result<Client> {
        Ok(Client::new(self.into_config()?))
    }

    pub(crate) fn into_config(self) -> std::result::Result<ClientConfig, ConfigError> {
        let host = self.host.trim();
        if host.is_empty() {
            return Err(ConfigError::MissingHost);
        }
        let access_token = match self.access_token {
            Some(token) if !secrecy::ExposeSecret::expose_secret(&token).is_empty() => token,
            _ => return Err(ConfigError::MissingToken),
        };

        check_positive("max_missed_pongs", self.max_missed_pongs)?;
        check_positive("auth_attempts", self.auth_attempts)?;
        check_duration("heartbeat_interval", self.heartbeat_interval)?;
        check_duration("pong_timeout", self.pong_timeout)?;
        check_duration("request_timeout", self.request_timeout)?;

        let url = websocket_url(host, self.port, self.secure)?;

        Ok(ClientConfig {
            url,
            access_token,
            heartbeat_interval: self.heartbeat_interval,
            pong_timeout: self.pong_timeout,
            max_missed_pongs: self.max_missed_pongs,
            request_timeout: self.request_timeout,
            minimum_version: self.minimum_version,
            auth_attempts: self.auth_attempts,
            auth_retry_delay: self.auth_retry_delay,
            reconnect_delay: self.reconnect_delay,
            worker_pool: self.worker_pool.unwrap_or_default(),
            connector: self
                .connector
                .unwrap_or_else(|| Arc::new(WebSocketConnector)),
        })
    }
}

fn check_positive(setting: &'static str, value: u32) -> std::result::Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::OutOfRange { setting, min: 1 });
    }
    Ok(())
}

fn check_duration(setting: &'static str, value: Duration) -> std::result::Result<(), ConfigError> {
    if value.is_zero() {
        return Err(ConfigError::OutOfRange { setting, min: 1 });
    }
    Ok(())
}

/// Builds `ws[s]://<host>[:port]/api/websocket`.
fn websocket_url(
    host: &str,
    port: Option<u16>,
    secure: bool,
) -> std::result::Result<Url, ConfigError> {
    let invalid = |message: String| ConfigError::InvalidHost {
        host: host.to_string(),
        message,
    };

    if host.contains('/') {
        return Err(invalid("host must not contain a scheme or path".to_string()));
    }

    let scheme = if secure { "wss" } else { "ws" };
    let mut url = Url::parse(&format!("{scheme}://{host}{WEBSOCKET_PATH}"))
        .map_err(|e| invalid(e.to_string()))?;
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("empty host name".to_string()));
    }
    if let Some(port) = port {
        url.set_port(Some(port))
            .map_err(|()| invalid("port cannot be set".to_string()))?;
    }
    Ok(url)
}
