//! Keepalive and dead-link detection.
//!
//! While connected, every `interval` the monitor either sends a `PING`
//! heartbeat or, if nothing has been received for longer than `timeout`,
//! declares the link dead by cancelling the connection token. The session
//! owner performs the actual teardown, so a dead link is reported exactly
//! once no matter which task noticed it.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::LinkConfig;
use crate::frame::Frame;
use crate::network::LinkSender;
use crate::state::LinkState;

/// Outcome of one liveness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Beat {
    /// Link healthy; send a heartbeat.
    Send,
    /// Transfer in flight; neither probe nor judge.
    Skip,
    /// Nothing heard for this long.
    Dead(Duration),
}

#[derive(Debug, Clone, Copy)]
pub struct Heartbeat {
    interval: Duration,
    timeout: Duration,
    suspend_during_transfer: bool,
}

impl Heartbeat {
    pub fn new(interval: Duration, timeout: Duration, suspend_during_transfer: bool) -> Self {
        Self {
            interval,
            timeout,
            suspend_during_transfer,
        }
    }

    pub fn from_config(config: &LinkConfig) -> Self {
        Self::new(
            config.heartbeat_interval(),
            config.liveness_timeout(),
            config.suspend_liveness_during_transfer,
        )
    }

    pub fn check(&self, state: &LinkState) -> Beat {
        if self.suspend_during_transfer && state.transfer_active(self.timeout) {
            return Beat::Skip;
        }
        let silent = state.silence();
        if silent > self.timeout {
            Beat::Dead(silent)
        } else {
            Beat::Send
        }
    }

    /// Run until the link is declared dead or `token` is cancelled.
    pub async fn run(self, state: &Mutex<LinkState>, sender: &LinkSender, token: &CancellationToken) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = ticker.tick() => {}
            }

            let beat = match state.lock() {
                Ok(state) => self.check(&state),
                Err(_) => {
                    warn!("link state lock poisoned, stopping heartbeat");
                    token.cancel();
                    return;
                }
            };

            match beat {
                Beat::Skip => trace!("transfer active, heartbeat skipped"),
                Beat::Dead(silent) => {
                    warn!(silent_ms = silent.as_millis() as u64, "link silent, declaring dead");
                    token.cancel();
                    return;
                }
                Beat::Send => {
                    if let Err(e) = sender.send_control(Frame::heartbeat()).await {
                        debug!("heartbeat send failed: {e}");
                        token.cancel();
                        return;
                    }
                    trace!("heartbeat sent");
                }
            }
        }
    }
}
