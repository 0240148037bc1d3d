//! # Command Frame Constants and Types
//!
//! Wire layout of the long-range command frame:
//!
//! | Byte | Field |
//! |------|-------|
//! | 0 | robot id |
//! | 1 | motor command bitmask (low nibble) |
//! | 2 | speed edge (0/1) |
//! | 3 | landing state (0/1) |
//! | 4-5 | CRC16 over bytes 0-3, big-endian |

use std::fmt;

use thiserror::Error;

/// Complete frame size in bytes
pub const FRAME_SIZE: usize = 6;

/// Bytes covered by the CRC
pub const PAYLOAD_SIZE: usize = 4;

/// Byte offsets inside a frame
pub const ROBOT_ID_OFFSET: usize = 0;
pub const MOTOR_OFFSET: usize = 1;
pub const SPEED_EDGE_OFFSET: usize = 2;
pub const LANDING_OFFSET: usize = 3;
pub const CRC_OFFSET: usize = 4;

/// Left track forward
pub const MOTOR_LEFT_FORWARD: u8 = 0b0001;
/// Left track reverse
pub const MOTOR_LEFT_REVERSE: u8 = 0b0010;
/// Right track forward
pub const MOTOR_RIGHT_FORWARD: u8 = 0b0100;
/// Right track reverse
pub const MOTOR_RIGHT_REVERSE: u8 = 0b1000;

/// Bits of the motor byte that carry meaning
pub const MOTOR_COMMAND_MASK: u8 = 0b1111;

/// 4-bit motor intent bitmask.
///
/// Bits above the low nibble are discarded on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct MotorCommand(u8);

impl MotorCommand {
    /// All motors stopped
    pub const STOP: MotorCommand = MotorCommand(0);

    /// Build a command from a raw byte, keeping only the low nibble
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & MOTOR_COMMAND_MASK)
    }

    /// Build a command from the four drive flags
    pub const fn from_flags(
        left_forward: bool,
        left_reverse: bool,
        right_forward: bool,
        right_reverse: bool,
    ) -> Self {
        let mut bits = 0;
        if left_forward {
            bits |= MOTOR_LEFT_FORWARD;
        }
        if left_reverse {
            bits |= MOTOR_LEFT_REVERSE;
        }
        if right_forward {
            bits |= MOTOR_RIGHT_FORWARD;
        }
        if right_reverse {
            bits |= MOTOR_RIGHT_REVERSE;
        }
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn left_forward(self) -> bool {
        self.0 & MOTOR_LEFT_FORWARD != 0
    }

    pub const fn left_reverse(self) -> bool {
        self.0 & MOTOR_LEFT_REVERSE != 0
    }

    pub const fn right_forward(self) -> bool {
        self.0 & MOTOR_RIGHT_FORWARD != 0
    }

    pub const fn right_reverse(self) -> bool {
        self.0 & MOTOR_RIGHT_REVERSE != 0
    }

    pub const fn is_stop(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for MotorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0b{:04b}", self.0)
    }
}

/// Decoded, CRC-checked and address-checked command frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandPacket {
    /// Target robot id
    pub robot_id: u8,

    /// Motor intent
    pub motor_command: MotorCommand,

    /// Speed toggle input as sampled by the operator node
    pub speed_edge: bool,

    /// Landing gear intent
    pub landing_state: bool,

    /// Checksum as received
    pub crc16: u16,
}

/// Reasons a received frame is discarded before any field is used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Received length differs from [`FRAME_SIZE`]
    #[error("wrong frame length: expected {expected} bytes, got {actual}")]
    WrongLength { expected: usize, actual: usize },

    /// Checksum over the payload does not match the trailer
    #[error("CRC mismatch: computed 0x{computed:04X}, received 0x{received:04X}")]
    CrcMismatch { computed: u16, received: u16 },

    /// CRC-valid frame addressed to another robot
    #[error("frame addressed to robot {actual}, expected {expected}")]
    AddressMismatch { expected: u8, actual: u8 },
}

impl FrameError {
    /// Whether the frame passed its checksum before being rejected.
    ///
    /// Such frames still prove the long-range radio is receiving.
    pub fn is_crc_valid(&self) -> bool {
        matches!(self, FrameError::AddressMismatch { .. })
    }
}
