//! # Hex Encoding/Decoding Utilities
//!
//! Helpers used throughout the decoder for key material, diagnostics and
//! telegram fixtures. Telegram dumps are conventionally written as hex with
//! optional spaces and `|` separators (`|2A442D2C...|`); [`decode_hex`]
//! accepts that form directly.

use thiserror::Error;

/// Errors that can occur during hex operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HexError {
    #[error("Odd number of hex characters: {0}")]
    OddLength(usize),

    #[error("Empty hex string")]
    EmptyString,

    #[error("Hex decoding error: {0}")]
    DecodeError(String),
}

/// Encode bytes to a lowercase hex string.
pub fn encode_hex(data: &[u8]) -> String {
    hex::encode(data)
}

/// Decode a hex string to bytes.
///
/// Accepts upper and lowercase characters; whitespace and the `|`
/// separators used in telegram dumps are stripped first.
pub fn decode_hex(hex_str: &str) -> Result<Vec<u8>, HexError> {
    let cleaned: String = hex_str
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '|')
        .collect();

    if cleaned.is_empty() {
        return Err(HexError::EmptyString);
    }
    if cleaned.len() % 2 != 0 {
        return Err(HexError::OddLength(cleaned.len()));
    }

    hex::decode(&cleaned).map_err(|e| HexError::DecodeError(e.to_string()))
}

/// Format bytes as "2a 44 2d 2c" for log lines and explanations.
pub fn format_hex_compact(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_roundtrip() {
        let data = vec![0x2A, 0x44, 0x2D, 0x2C, 0x07, 0x85, 0x69, 0x06];
        let encoded = encode_hex(&data);
        let decoded = decode_hex(&encoded).unwrap();
        assert_eq!(data, decoded);
    }

    #[test]
    fn test_decode_telegram_dump_form() {
        let dump = "|2A 44 2D 2C|";
        assert_eq!(decode_hex(dump).unwrap(), vec![0x2A, 0x44, 0x2D, 0x2C]);
    }

    #[test]
    fn test_format_compact() {
        let data = vec![0x2A, 0x44, 0x2D, 0x2C];
        assert_eq!(format_hex_compact(&data), "2a 44 2d 2c");
    }

    #[test]
    fn test_errors() {
        assert!(decode_hex("").is_err());
        assert!(decode_hex("2a4").is_err());
        assert!(decode_hex("zz").is_err());
    }
}
