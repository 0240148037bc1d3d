//! # CRC16-CCITT (reflected) Implementation
//!
//! CRC16 checksum protecting the 4 payload bytes of a command frame.
//!
//! **Polynomial**: 0x1021 (x^16 + x^12 + x^5 + 1)
//! **Initial Value**: 0xFFFF
//! **Final XOR**: 0x0000
//! **Reflected**: input and output (the MCRF4XX parameter set)

/// CRC16-CCITT polynomial in normal (MSB-first) notation
pub const CRC16_POLY: u16 = 0x1021;

/// CRC16 initial register value
pub const CRC16_INIT: u16 = 0xFFFF;

/// CRC16 final XOR value
pub const CRC16_XOR_OUT: u16 = 0x0000;

/// Polynomial bit-reversed for the LSB-first (reflected) register
const CRC16_POLY_REFLECTED: u16 = CRC16_POLY.reverse_bits();

/// Precomputed CRC16 lookup table for fast calculation
const CRC16_TABLE: [u16; 256] = generate_crc16_table();

/// Generate reflected CRC16 lookup table at compile time
const fn generate_crc16_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;

    while i < 256 {
        let mut crc = i as u16;
        let mut j = 0;

        while j < 8 {
            if (crc & 0x0001) != 0 {
                crc = (crc >> 1) ^ CRC16_POLY_REFLECTED;
            } else {
                crc >>= 1;
            }
            j += 1;
        }

        table[i] = crc;
        i += 1;
    }

    table
}

/// Calculate reflected CRC16-CCITT checksum using lookup table
///
/// # Arguments
///
/// * `data` - Byte slice to calculate CRC for (the frame payload)
///
/// # Returns
///
/// * `u16` - Calculated checksum, transmitted big-endian on the wire
///
/// # Examples
///
/// ```
/// use rov_link::protocol::crc::crc16_ccitt;
///
/// assert_eq!(crc16_ccitt(b"123456789"), 0x6F91);
/// ```
pub fn crc16_ccitt(data: &[u8]) -> u16 {
    let mut crc = CRC16_INIT;

    for &byte in data {
        crc = (crc >> 8) ^ CRC16_TABLE[((crc ^ byte as u16) & 0x00FF) as usize];
    }

    crc ^ CRC16_XOR_OUT
}

/// Bit-at-a-time reference implementation, used to check the table
#[allow(dead_code)]
fn crc16_ccitt_slow(data: &[u8]) -> u16 {
    let mut crc = CRC16_INIT;

    for &byte in data {
        crc ^= byte as u16;

        for _ in 0..8 {
            if (crc & 0x0001) != 0 {
                crc = (crc >> 1) ^ CRC16_POLY_REFLECTED;
            } else {
                crc >>= 1;
            }
        }
    }

    crc ^ CRC16_XOR_OUT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc16_empty_is_init() {
        assert_eq!(crc16_ccitt(&[]), CRC16_INIT);
    }

    #[test]
    fn test_crc16_check_value() {
        // Standard check string for CRC-16/MCRF4XX
        assert_eq!(crc16_ccitt(b"123456789"), 0x6F91);
        assert_eq!(crc16_ccitt_slow(b"123456789"), 0x6F91);
    }

    #[test]
    fn test_reflected_polynomial() {
        assert_eq!(CRC16_POLY_REFLECTED, 0x8408);
    }

    #[test]
    fn test_crc16_lookup_table_matches_slow() {
        let test_data = [
            vec![0x45, 0x00, 0x00, 0x00],
            vec![0x45, 0x05, 0x01, 0x01],
            vec![0xFF, 0xFE, 0xFD, 0xFC],
            vec![0x00; 4],
            vec![0xFF; 10],
        ];

        for data in test_data.iter() {
            assert_eq!(
                crc16_ccitt(data),
                crc16_ccitt_slow(data),
                "CRC mismatch for data: {:?}",
                data
            );
        }
    }

    #[test]
    fn test_crc16_changes_with_data() {
        let crc1 = crc16_ccitt(&[0x45, 0x01, 0x00, 0x00]);
        let crc2 = crc16_ccitt(&[0x45, 0x02, 0x00, 0x00]);

        assert_ne!(crc1, crc2, "CRC should change when data changes");
    }
}
