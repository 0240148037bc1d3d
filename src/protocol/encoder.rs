//! # Command Frame Encoder
//!
//! Builds the 6-byte long-range frame sent by the operator node.

use super::crc::crc16_ccitt;
use super::packet::*;

/// Encode operator intent into a complete frame
///
/// # Arguments
///
/// * `robot_id` - Target vehicle id
/// * `motor_command` - Drive bitmask
/// * `speed_edge` - Speed toggle flag for this cycle
/// * `landing_state` - Current landing gear intent
///
/// # Returns
///
/// * `[u8; FRAME_SIZE]` - Payload followed by big-endian CRC16
///
/// # Examples
///
/// ```
/// use rov_link::protocol::encoder::encode;
/// use rov_link::protocol::packet::MotorCommand;
///
/// let frame = encode(69, MotorCommand::from_bits(0b0101), false, true);
/// assert_eq!(&frame[..4], &[69, 0b0101, 0, 1]);
/// ```
pub fn encode(
    robot_id: u8,
    motor_command: MotorCommand,
    speed_edge: bool,
    landing_state: bool,
) -> [u8; FRAME_SIZE] {
    let mut frame = [0u8; FRAME_SIZE];
    frame[ROBOT_ID_OFFSET] = robot_id;
    frame[MOTOR_OFFSET] = motor_command.bits();
    frame[SPEED_EDGE_OFFSET] = speed_edge as u8;
    frame[LANDING_OFFSET] = landing_state as u8;

    let crc = crc16_ccitt(&frame[..PAYLOAD_SIZE]);
    frame[CRC_OFFSET..].copy_from_slice(&crc.to_be_bytes());

    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let frame = encode(69, MotorCommand::from_bits(0b1001), true, false);

        assert_eq!(frame[ROBOT_ID_OFFSET], 69);
        assert_eq!(frame[MOTOR_OFFSET], 0b1001);
        assert_eq!(frame[SPEED_EDGE_OFFSET], 1);
        assert_eq!(frame[LANDING_OFFSET], 0);
    }

    #[test]
    fn test_encode_crc_is_big_endian() {
        let frame = encode(69, MotorCommand::STOP, false, false);
        let crc = crc16_ccitt(&frame[..PAYLOAD_SIZE]);

        assert_eq!(frame[4], (crc >> 8) as u8);
        assert_eq!(frame[5], (crc & 0xFF) as u8);
    }

    #[test]
    fn test_encode_different_data_different_crc() {
        let frame1 = encode(69, MotorCommand::from_bits(0b0001), false, false);
        let frame2 = encode(69, MotorCommand::from_bits(0b0100), false, false);

        assert_ne!(frame1[4..], frame2[4..]);
    }
}
