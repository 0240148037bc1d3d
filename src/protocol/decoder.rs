//! # Command Frame Decoder
//!
//! Validates received frames. Checks run in wire order: length, checksum,
//! then robot id, so no field is trusted before the CRC has matched.

use super::crc::crc16_ccitt;
use super::packet::*;

/// Decode and validate a received frame
///
/// # Arguments
///
/// * `frame` - Raw bytes as delivered by the radio
/// * `target_id` - Robot id this node answers to
///
/// # Returns
///
/// * `Result<CommandPacket, FrameError>` - Packet, or the reason it was discarded
///
/// # Errors
///
/// Returns error if:
/// - Frame length is not [`FRAME_SIZE`]
/// - CRC check fails
/// - Robot id differs from `target_id`
pub fn decode(frame: &[u8], target_id: u8) -> Result<CommandPacket, FrameError> {
    if frame.len() != FRAME_SIZE {
        return Err(FrameError::WrongLength {
            expected: FRAME_SIZE,
            actual: frame.len(),
        });
    }

    let received = u16::from_be_bytes([frame[CRC_OFFSET], frame[CRC_OFFSET + 1]]);
    let computed = crc16_ccitt(&frame[..PAYLOAD_SIZE]);

    if computed != received {
        return Err(FrameError::CrcMismatch { computed, received });
    }

    let robot_id = frame[ROBOT_ID_OFFSET];
    if robot_id != target_id {
        return Err(FrameError::AddressMismatch {
            expected: target_id,
            actual: robot_id,
        });
    }

    Ok(CommandPacket {
        robot_id,
        motor_command: MotorCommand::from_bits(frame[MOTOR_OFFSET]),
        speed_edge: frame[SPEED_EDGE_OFFSET] != 0,
        landing_state: frame[LANDING_OFFSET] != 0,
        crc16: received,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::encoder::encode;

    const ROBOT_ID: u8 = 69;

    #[test]
    fn test_decode_valid_frame() {
        let frame = encode(ROBOT_ID, MotorCommand::from_bits(0b0101), true, true);
        let packet = decode(&frame, ROBOT_ID).unwrap();

        assert_eq!(packet.robot_id, ROBOT_ID);
        assert_eq!(packet.motor_command.bits(), 0b0101);
        assert!(packet.speed_edge);
        assert!(packet.landing_state);
        assert_eq!(packet.crc16, u16::from_be_bytes([frame[4], frame[5]]));
    }

    #[test]
    fn test_decode_recovers_every_motor_and_flag_combination() {
        for bits in 0..=MOTOR_COMMAND_MASK {
            for speed_edge in [false, true] {
                for landing_state in [false, true] {
                    let motor = MotorCommand::from_bits(bits);
                    let frame = encode(ROBOT_ID, motor, speed_edge, landing_state);
                    let packet = decode(&frame, ROBOT_ID).unwrap();

                    assert_eq!(packet.motor_command, motor);
                    assert_eq!(packet.speed_edge, speed_edge);
                    assert_eq!(packet.landing_state, landing_state);
                }
            }
        }
    }

    #[test]
    fn test_decode_wrong_length() {
        let frame = encode(ROBOT_ID, MotorCommand::STOP, false, false);

        assert_eq!(
            decode(&frame[..5], ROBOT_ID),
            Err(FrameError::WrongLength { expected: 6, actual: 5 })
        );

        let mut long = frame.to_vec();
        long.push(0);
        assert!(matches!(
            decode(&long, ROBOT_ID),
            Err(FrameError::WrongLength { actual: 7, .. })
        ));

        assert!(decode(&[], ROBOT_ID).is_err());
    }

    #[test]
    fn test_decode_crc_error() {
        let mut frame = encode(ROBOT_ID, MotorCommand::STOP, false, false);
        frame[5] ^= 0xFF;

        assert!(matches!(
            decode(&frame, ROBOT_ID),
            Err(FrameError::CrcMismatch { .. })
        ));
    }

    #[test]
    fn test_decode_address_mismatch() {
        let frame = encode(12, MotorCommand::from_bits(0b0001), false, false);

        assert_eq!(
            decode(&frame, ROBOT_ID),
            Err(FrameError::AddressMismatch { expected: ROBOT_ID, actual: 12 })
        );
    }

    #[test]
    fn test_corrupted_robot_id_fails_crc_not_address() {
        let mut frame = encode(ROBOT_ID, MotorCommand::STOP, false, false);
        frame[0] ^= 0x01;

        assert!(matches!(
            decode(&frame, ROBOT_ID),
            Err(FrameError::CrcMismatch { .. })
        ));
    }

    #[test]
    fn test_every_single_bit_error_is_detected() {
        let frame = encode(ROBOT_ID, MotorCommand::from_bits(0b0110), true, false);

        for bit in 0..FRAME_SIZE * 8 {
            let mut corrupted = frame;
            corrupted[bit / 8] ^= 1 << (bit % 8);

            assert!(
                matches!(decode(&corrupted, ROBOT_ID), Err(FrameError::CrcMismatch { .. })),
                "single-bit error at bit {} went undetected",
                bit
            );
        }
    }

    #[test]
    fn test_every_double_bit_error_is_detected() {
        let frame = encode(ROBOT_ID, MotorCommand::from_bits(0b1001), false, true);
        let total_bits = FRAME_SIZE * 8;

        for first in 0..total_bits {
            for second in (first + 1)..total_bits {
                let mut corrupted = frame;
                corrupted[first / 8] ^= 1 << (first % 8);
                corrupted[second / 8] ^= 1 << (second % 8);

                assert!(
                    decode(&corrupted, ROBOT_ID).is_err(),
                    "double-bit error at bits {} and {} went undetected",
                    first,
                    second
                );
            }
        }
    }

    #[test]
    fn test_nonzero_flag_bytes_read_as_true() {
        let mut frame = [ROBOT_ID, 0, 7, 2, 0, 0];
        let crc = crc16_ccitt(&frame[..PAYLOAD_SIZE]);
        frame[4..].copy_from_slice(&crc.to_be_bytes());

        let packet = decode(&frame, ROBOT_ID).unwrap();
        assert!(packet.speed_edge);
        assert!(packet.landing_state);
    }
}
