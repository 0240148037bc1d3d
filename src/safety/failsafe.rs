//! # Failsafe Supervisor
//!
//! Short-timeout watchdog that forces an all-stop when validated commands
//! stop arriving. Runs independently of link health: it guards against a
//! vehicle driving away on its last command, not against radio faults.

use std::time::{Duration, Instant};

use tracing::{info, warn};

/// Failsafe tunables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailsafeSettings {
    /// Silence after which the failsafe engages
    pub timeout: Duration,
    /// Spacing between re-triggers while the failsafe stays engaged
    pub rearm: Duration,
}

impl Default for FailsafeSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(300),
            rearm: Duration::from_millis(1000),
        }
    }
}

/// Communication-loss watchdog
#[derive(Debug)]
pub struct FailsafeSupervisor {
    settings: FailsafeSettings,
    last_valid_time: Instant,
    active: bool,
}

impl FailsafeSupervisor {
    /// Create an inactive supervisor whose timer starts at `now`
    pub fn new(settings: FailsafeSettings, now: Instant) -> Self {
        Self {
            settings,
            last_valid_time: now,
            active: false,
        }
    }

    /// Record a validated packet; clears the active state
    pub fn reset(&mut self, now: Instant) {
        self.last_valid_time = now;
        if self.active {
            self.active = false;
            info!("Failsafe cleared, valid commands resumed");
        }
    }

    /// Run once per control cycle.
    ///
    /// Returns `true` when the timeout fired on this call. After firing, the
    /// timer is pushed forward so the next trigger comes `rearm` later
    /// instead of on every cycle; the supervisor stays active meanwhile.
    pub fn check(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last_valid_time) <= self.settings.timeout {
            return false;
        }

        if !self.active {
            warn!(
                "FAILSAFE engaged: no valid command for more than {} ms",
                self.settings.timeout.as_millis()
            );
            self.active = true;
        }

        self.last_valid_time = now + self.settings.rearm.saturating_sub(self.settings.timeout);
        true
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn settings(&self) -> &FailsafeSettings {
        &self.settings
    }
}
