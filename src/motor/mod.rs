//! # Motor Module
//!
//! Drive command validation and PWM actuation of the two tracks.
//!
//! ## Bitmask
//!
//! | Bit | Meaning |
//! |-----|---------|
//! | 0 | left forward |
//! | 1 | left reverse |
//! | 2 | right forward |
//! | 3 | right reverse |
//!
//! Forward and reverse set together on one side is a conflict. Conflicting
//! commands are never interpreted; they always resolve to stop.

pub mod actuator;
pub mod speed;

pub use actuator::{MotorActuator, MotorChannels};
pub use speed::{SpeedSelector, SPEED_LEVEL_COUNT};

use std::fmt;

use thiserror::Error;

use crate::protocol::packet::MotorCommand;

/// Vehicle side a conflict was detected on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => f.write_str("left"),
            Side::Right => f.write_str("right"),
        }
    }
}

/// Forward and reverse requested on the same side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("conflicting command {command}: {side} motor asked to drive forward and reverse")]
pub struct CommandConflict {
    pub command: MotorCommand,
    pub side: Side,
}

/// Reject commands driving one side both ways at once
pub fn validate(command: MotorCommand) -> Result<(), CommandConflict> {
    if command.left_forward() && command.left_reverse() {
        return Err(CommandConflict {
            command,
            side: Side::Left,
        });
    }

    if command.right_forward() && command.right_reverse() {
        return Err(CommandConflict {
            command,
            side: Side::Right,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_non_conflicting() {
        for bits in [0b0000, 0b0001, 0b0010, 0b0100, 0b1000, 0b0101, 0b1010, 0b0110, 0b1001] {
            assert!(validate(MotorCommand::from_bits(bits)).is_ok(), "0b{:04b}", bits);
        }
    }

    #[test]
    fn test_validate_rejects_every_conflict() {
        for bits in 0..=0b1111u8 {
            let left = bits & 0b0011 == 0b0011;
            let right = bits & 0b1100 == 0b1100;
            let result = validate(MotorCommand::from_bits(bits));

            assert_eq!(result.is_err(), left || right, "0b{:04b}", bits);
        }
    }

    #[test]
    fn test_conflict_reports_side() {
        let err = validate(MotorCommand::from_bits(0b0011)).unwrap_err();
        assert_eq!(err.side, Side::Left);

        let err = validate(MotorCommand::from_bits(0b1100)).unwrap_err();
        assert_eq!(err.side, Side::Right);
    }
}
