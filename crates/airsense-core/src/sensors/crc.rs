//! CRC-8 used by the Sensirion-style I2C framing of both the DHT20 and the
//! SGP30: polynomial 0x31, initial value 0xFF, no reflection, no final XOR.

use ::crc::{CRC_8_NRSC_5, Crc};

const CRC8: Crc<u8> = Crc::<u8>::new(&CRC_8_NRSC_5);

/// Compute the checksum over `data`.
pub fn crc8(data: &[u8]) -> u8 {
    CRC8.checksum(data)
}

/// Encode a 16-bit word as `[msb, lsb, crc]`.
pub fn encode_word(word: u16) -> [u8; 3] {
    let [msb, lsb] = word.to_be_bytes();
    [msb, lsb, crc8(&[msb, lsb])]
}

/// Decode a `[msb, lsb, crc]` triple, returning `None` on checksum mismatch.
pub fn decode_word(chunk: &[u8]) -> Option<u16> {
    match chunk {
        [msb, lsb, crc] if crc8(&[*msb, *lsb]) == *crc => Some(u16::from_be_bytes([*msb, *lsb])),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datasheet_vector() {
        // Sensirion datasheets give 0xBEEF -> 0x92.
        assert_eq!(crc8(&[0xBE, 0xEF]), 0x92);
    }

    #[test]
    fn test_dht20_frame_checksum() {
        assert_eq!(crc8(&[0x1C, 0x80, 0x00, 0x06, 0x00, 0x00]), 0x4E);
        assert_eq!(crc8(&[]), 0xFF);
    }

    #[test]
    fn test_decode_rejects_corrupted_word() {
        let mut word = encode_word(0x1234);
        assert_eq!(decode_word(&word), Some(0x1234));

        word[1] ^= 0x01;
        assert_eq!(decode_word(&word), None);
    }

    #[test]
    fn test_decode_rejects_short_chunk() {
        assert_eq!(decode_word(&[0x12, 0x34]), None);
    }
}
