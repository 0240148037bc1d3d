//! Long-range radio abstraction and the hard restart sequence.

use std::time::Duration;

use tracing::debug;

use crate::error::Result;

/// Long-range radio module as seen by the control loop.
///
/// Every method must return promptly: receive is a non-blocking poll.
#[cfg_attr(test, mockall::automock)]
pub trait LongRangeRadio {
    /// Start a radio session at `frequency_hz`
    fn begin(&mut self, frequency_hz: u64) -> Result<()>;

    /// End the current radio session
    fn end(&mut self);

    /// Drive the module's hardware reset line
    fn set_reset(&mut self, high: bool) -> Result<()>;

    /// Take one received packet, if a complete one is waiting
    fn poll_frame(&mut self) -> Result<Option<Vec<u8>>>;

    /// Send one packet
    fn transmit(&mut self, frame: &[u8]) -> Result<()>;
}

/// Bounded blocking delay
pub trait Delay {
    fn delay(&mut self, duration: Duration);
}

/// Delay backed by `std::thread::sleep`
#[derive(Debug, Default, Clone, Copy)]
pub struct StdDelay;

impl Delay for StdDelay {
    fn delay(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Fixed waits of the restart sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartTimings {
    /// After ending the session, before pulling reset low
    pub settle: Duration,
    /// Reset held low
    pub reset_low: Duration,
    /// After releasing reset, before reinitializing
    pub boot: Duration,
}

impl Default for RestartTimings {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(100),
            reset_low: Duration::from_millis(10),
            boot: Duration::from_millis(50),
        }
    }
}

/// Hard-restart the radio module.
///
/// Ends the session, pulses the reset line low then high, and reinitializes
/// at `frequency_hz`. Total blocking time is bounded by `timings`.
pub fn hard_restart<R, D>(
    radio: &mut R,
    delay: &mut D,
    frequency_hz: u64,
    timings: &RestartTimings,
) -> Result<()>
where
    R: LongRangeRadio + ?Sized,
    D: Delay + ?Sized,
{
    debug!("Restarting long-range radio module");

    radio.end();
    delay.delay(timings.settle);
    radio.set_reset(false)?;
    delay.delay(timings.reset_low);
    radio.set_reset(true)?;
    delay.delay(timings.boot);

    radio.begin(frequency_hz)
}
