//! # Link Health Monitor
//!
//! Tracks liveness of the long-range radio and restarts the module when it
//! goes quiet.
//!
//! ```text
//!          silence >= interval              restart ok + valid frame
//!   OK ───────────────────────► RECONNECTING ─────────────────────────► OK
//!                                    │
//!                                    │ time in RECONNECTING >= reconnect timeout
//!                                    ▼
//!                              DISCONNECTED (terminal until reset)
//! ```
//!
//! The state machine only advances on health-check ticks spaced by the check
//! interval, so a dead module is restarted at most once per interval.

use std::fmt;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use super::radio::{hard_restart, Delay, LongRangeRadio, RestartTimings};

/// Liveness state of the long-range link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Ok,
    Reconnecting,
    Disconnected,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LinkState::Ok => "OK",
            LinkState::Reconnecting => "RECONNECTING",
            LinkState::Disconnected => "DISCONNECTED",
        };
        f.write_str(name)
    }
}

/// Health monitor tunables
#[derive(Debug, Clone, Copy)]
pub struct HealthSettings {
    /// Spacing of health-check ticks, also the silence threshold
    pub check_interval: Duration,
    /// Longest time allowed in RECONNECTING before giving up
    pub reconnect_timeout: Duration,
    /// Frequency the radio is reinitialized at
    pub frequency_hz: u64,
    pub restart_timings: RestartTimings,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_millis(5000),
            reconnect_timeout: Duration::from_millis(10_000),
            frequency_hz: 433_000_000,
            restart_timings: RestartTimings::default(),
        }
    }
}

/// OK / RECONNECTING / DISCONNECTED state machine for the long-range link
#[derive(Debug)]
pub struct LinkHealthMonitor {
    settings: HealthSettings,
    state: LinkState,
    healthy: bool,
    last_valid_frame: Instant,
    last_check: Instant,
    reconnecting_since: Option<Instant>,
    restart_succeeded: bool,
    restart_count: u32,
}

impl LinkHealthMonitor {
    /// Create a monitor in the OK state, treating `now` as the last valid frame
    pub fn new(settings: HealthSettings, now: Instant) -> Self {
        Self {
            settings,
            state: LinkState::Ok,
            healthy: true,
            last_valid_frame: now,
            last_check: now,
            reconnecting_since: None,
            restart_succeeded: false,
            restart_count: 0,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// `false` from the moment silence is detected until the link recovers
    pub fn is_healthy(&self) -> bool {
        self.healthy
    }

    pub fn last_valid_frame(&self) -> Instant {
        self.last_valid_frame
    }

    /// Successful module restarts since creation
    pub fn restart_count(&self) -> u32 {
        self.restart_count
    }

    /// Record a CRC-valid frame.
    ///
    /// Completes recovery when it follows a successful restart.
    pub fn record_valid_frame(&mut self, now: Instant) {
        self.last_valid_frame = now;

        if self.state == LinkState::Reconnecting && self.restart_succeeded {
            info!(
                "Long-range link recovered after {} restart(s)",
                self.restart_count
            );
            self.state = LinkState::Ok;
            self.healthy = true;
            self.reconnecting_since = None;
            self.restart_succeeded = false;
        }
    }

    /// Advance the state machine; only acts once per check interval.
    ///
    /// While RECONNECTING each tick performs one hard restart of `radio`.
    /// A failed restart is retried on the next tick.
    pub fn poll<R, D>(&mut self, now: Instant, radio: &mut R, delay: &mut D) -> LinkState
    where
        R: LongRangeRadio + ?Sized,
        D: Delay + ?Sized,
    {
        if now.saturating_duration_since(self.last_check) < self.settings.check_interval {
            return self.state;
        }
        self.last_check = now;

        match self.state {
            LinkState::Disconnected => return self.state,
            LinkState::Ok => {
                let silence = now.saturating_duration_since(self.last_valid_frame);
                if silence < self.settings.check_interval {
                    return self.state;
                }

                warn!(
                    "No valid frame for {} ms, reconnecting long-range radio",
                    silence.as_millis()
                );
                self.state = LinkState::Reconnecting;
                self.healthy = false;
                self.reconnecting_since = Some(now);
                self.restart_succeeded = false;
            }
            LinkState::Reconnecting => {}
        }

        let since = self.reconnecting_since.unwrap_or(now);
        if now.saturating_duration_since(since) >= self.settings.reconnect_timeout {
            error!(
                "Long-range link lost: no recovery within {} ms, giving up",
                self.settings.reconnect_timeout.as_millis()
            );
            self.state = LinkState::Disconnected;
            self.restart_succeeded = false;
            return self.state;
        }

        match hard_restart(
            radio,
            delay,
            self.settings.frequency_hz,
            &self.settings.restart_timings,
        ) {
            Ok(()) => {
                self.restart_count += 1;
                self.restart_succeeded = true;
                info!(
                    "Long-range radio restarted ({} total), waiting for a valid frame",
                    self.restart_count
                );
            }
            Err(e) => {
                self.restart_succeeded = false;
                warn!("Long-range radio restart failed: {}", e);
            }
        }

        self.state
    }

    /// Leave DISCONNECTED (or any state) and start over in OK
    pub fn reset(&mut self, now: Instant) {
        info!("Link health monitor reset from {}", self.state);
        self.state = LinkState::Ok;
        self.healthy = true;
        self.last_valid_frame = now;
        self.last_check = now;
        self.reconnecting_since = None;
        self.restart_succeeded = false;
    }
}
