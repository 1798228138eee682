// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Liveness probing.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::ClientConfig;
use crate::error::{CommandError, Error};
use crate::protocol::{Correlator, Ping};

/// Sends a `ping` every interval and declares the connection lost after
/// too many consecutive unanswered probes.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Heartbeat {
    interval: Duration,
    pong_timeout: Duration,
    max_missed: u32,
}

impl Heartbeat {
    pub(crate) fn new(interval: Duration, pong_timeout: Duration, max_missed: u32) -> Self {
        Self {
            interval,
            pong_timeout,
            max_missed: max_missed.max(1),
        }
    }

    pub(crate) fn from_config(config: &ClientConfig) -> Self {
        Self::new(
            config.heartbeat_interval(),
            config.pong_timeout(),
            config.max_missed_pongs(),
        )
    }

    /// Probes until the generation ends.
    ///
    /// Cancels `generation` once when the miss threshold is reached.
    pub(crate) async fn run(self, correlator: Arc<Correlator>, generation: CancellationToken) {
        let mut ticks = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut missed = 0u32;

        loop {
            tokio::select! {
                () = generation.cancelled() => return,
                _ = ticks.tick() => {}
            }

            let outcome = tokio::select! {
                () = generation.cancelled() => return,
                outcome = correlator.send_and_await(&Ping, self.pong_timeout) => outcome,
            };

            match outcome {
                Ok(_) => {
                    if missed > 0 {
                        tracing::debug!(missed, "Pong received, resetting miss count");
                    }
                    missed = 0;
                }
                Err(Error::NotConnected | Error::Command(CommandError::ConnectionReset { .. })) => {
                    return;
                }
                Err(e) => {
                    missed += 1;
                    tracing::warn!(missed, max = self.max_missed, error = %e, "Heartbeat probe failed");
                }
            }

            if missed >= self.max_missed {
                tracing::warn!(missed, "Hub stopped answering, forcing reconnect");
                generation.cancel();
                return;
            }
        }
    }
}
