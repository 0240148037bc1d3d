//! # Motor Actuator
//!
//! Sole owner of the four drive PWM channels.

use tracing::{debug, warn};

use super::speed::SpeedSelector;
use super::validate;
use crate::error::Result;
use crate::io::PwmOutput;
use crate::protocol::packet::MotorCommand;

/// PWM channel ids of the H-bridge inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorChannels {
    pub left_forward: u32,
    pub left_reverse: u32,
    pub right_forward: u32,
    pub right_reverse: u32,
}

impl MotorChannels {
    /// Build from `[left fwd, left rev, right fwd, right rev]`
    pub fn from_array(channels: [u32; 4]) -> Self {
        Self {
            left_forward: channels[0],
            left_reverse: channels[1],
            right_forward: channels[2],
            right_reverse: channels[3],
        }
    }
}

/// Applies validated drive commands at the selected speed level
#[derive(Debug)]
pub struct MotorActuator<P: PwmOutput> {
    pwm: P,
    channels: MotorChannels,
    speed: SpeedSelector,
    applied: Option<[u16; 4]>,
}

impl<P: PwmOutput> MotorActuator<P> {
    pub fn new(pwm: P, channels: MotorChannels, speed: SpeedSelector) -> Self {
        Self {
            pwm,
            channels,
            speed,
            applied: None,
        }
    }

    /// Validate and apply a drive command; conflicts and zero resolve to stop
    pub fn execute(&mut self, command: MotorCommand) -> Result<()> {
        if let Err(conflict) = validate(command) {
            warn!("{}", conflict);
            return self.stop();
        }

        if command.is_stop() {
            return self.stop();
        }

        self.control(
            command.left_forward(),
            command.left_reverse(),
            command.right_forward(),
            command.right_reverse(),
        )
    }

    /// Drive each flagged channel at the current speed level, others at zero.
    ///
    /// All four channels are written even if one write fails; the first
    /// error is returned.
    pub fn control(
        &mut self,
        left_forward: bool,
        left_reverse: bool,
        right_forward: bool,
        right_reverse: bool,
    ) -> Result<()> {
        let duty = self.speed.duty();
        let level = |on: bool| if on { duty } else { 0 };

        let duties = [
            level(left_forward),
            level(left_reverse),
            level(right_forward),
            level(right_reverse),
        ];
        let channels = [
            self.channels.left_forward,
            self.channels.left_reverse,
            self.channels.right_forward,
            self.channels.right_reverse,
        ];

        let mut first_error = None;
        for (channel, duty) in channels.into_iter().zip(duties) {
            if let Err(e) = self.pwm.write(channel, duty) {
                first_error.get_or_insert(e);
            }
        }

        if self.applied != Some(duties) {
            debug!(
                "Motors L(fwd {} rev {}) R(fwd {} rev {})",
                duties[0], duties[1], duties[2], duties[3]
            );
            self.applied = Some(duties);
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Zero all four channels
    pub fn stop(&mut self) -> Result<()> {
        self.control(false, false, false, false)
    }

    /// Feed the speed toggle input for this cycle
    pub fn handle_speed_toggle(&mut self, pressed: bool) -> bool {
        self.speed.update(pressed)
    }

    pub fn speed(&self) -> &SpeedSelector {
        &self.speed
    }

    /// Duties written by the most recent actuation, in channel order
    pub fn applied(&self) -> Option<[u16; 4]> {
        self.applied
    }
}
