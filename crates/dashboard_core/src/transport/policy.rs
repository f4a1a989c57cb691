use std::time::Duration;

use tracing::{info, warn};

use super::TransportError;
use crate::state::LinkStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Connecting,
    Connected,
    Disconnected,
    Error {
        failures: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportMode {
    /// Single websocket channel.
    #[default]
    WebSocket,
    /// Websocket when reachable, otherwise HTTP polling of the status endpoint.
    Compatible,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub fallback_after_errors: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub fallback_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            fallback_after_errors: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(5000),
            fallback_delay: Duration::from_millis(1000),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (1-based): doubles from the
    /// base delay and never exceeds the cap.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Reconnect { delay: Duration },
    /// Close and reopen in [`TransportMode::Compatible`]. Issued at most once
    /// per tracker.
    FallBack { delay: Duration },
}

impl Decision {
    pub fn delay(self) -> Duration {
        match self {
            Decision::Reconnect { delay } | Decision::FallBack { delay } => delay,
        }
    }
}

/// Connection state machine: CONNECTING -> CONNECTED <-> DISCONNECTED, with
/// ERROR counting consecutive connection failures.
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    policy: ReconnectPolicy,
    state: ConnectionState,
    mode: TransportMode,
    consecutive_errors: u32,
    attempt: u32,
    fell_back: bool,
}

impl ConnectionTracker {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            state: ConnectionState::Connecting,
            mode: TransportMode::WebSocket,
            consecutive_errors: 0,
            attempt: 0,
            fell_back: false,
        }
    }

    pub fn status(&self) -> LinkStatus {
        LinkStatus {
            state: self.state,
            mode: self.mode,
        }
    }

    pub fn mode(&self) -> TransportMode {
        self.mode
    }

    pub fn has_fallen_back(&self) -> bool {
        self.fell_back
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    pub fn connecting(&mut self) -> LinkStatus {
        self.state = ConnectionState::Connecting;
        self.status()
    }

    pub fn on_connected(&mut self) -> LinkStatus {
        self.state = ConnectionState::Connected;
        self.consecutive_errors = 0;
        self.attempt = 0;
        info!(mode = ?self.mode, "transport: connected");
        self.status()
    }

    /// An established session ended.
    pub fn on_closed(&mut self) -> (LinkStatus, Decision) {
        self.state = ConnectionState::Disconnected;
        self.attempt = self.attempt.saturating_add(1);
        let delay = self.policy.backoff(self.attempt);
        info!(delay_ms = delay.as_millis() as u64, "transport: disconnected");
        (self.status(), Decision::Reconnect { delay })
    }

    /// A connection attempt failed.
    pub fn on_error(&mut self, err: &TransportError) -> (LinkStatus, Decision) {
        self.consecutive_errors = self.consecutive_errors.saturating_add(1);
        self.attempt = self.attempt.saturating_add(1);
        self.state = ConnectionState::Error {
            failures: self.consecutive_errors,
        };

        let threshold = self.policy.fallback_after_errors.max(1);
        if !self.fell_back && self.consecutive_errors >= threshold {
            self.fell_back = true;
            self.mode = TransportMode::Compatible;
            warn!(
                failures = self.consecutive_errors,
                kind = err.kind(),
                error = %err,
                "transport: falling back to compatible mode"
            );
            return (
                self.status(),
                Decision::FallBack {
                    delay: self.policy.fallback_delay,
                },
            );
        }

        let delay = self.policy.backoff(self.attempt);
        warn!(
            failures = self.consecutive_errors,
            kind = err.kind(),
            error = %err,
            delay_ms = delay.as_millis() as u64,
            "transport: connection attempt failed"
        );
        (self.status(), Decision::Reconnect { delay })
    }
}

#[cfg(test)]
#[path = "../tests/policy_tests.rs"]
mod tests;
