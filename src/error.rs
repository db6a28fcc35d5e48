//! # wM-Bus Error Handling
//!
//! This module defines the WmBusError enum, the crate-wide error type that
//! unifies the layer-local errors raised while decoding a telegram.

use thiserror::Error;

use crate::payload::record::RecordError;
use crate::units::UnitError;
use crate::wmbus::crypto::CryptoError;
use crate::wmbus::frame::FrameError;

/// Represents the different error types that can occur while decoding a
/// wM-Bus telegram. Per-layer errors convert into this via `From`.
#[derive(Debug, Error)]
pub enum WmBusError {
    /// The link-layer frame failed structural or CRC validation.
    #[error(transparent)]
    Framing(#[from] FrameError),

    /// Decryption failed (bad key material, mode mismatch, bad ciphertext).
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// A data record was malformed or ran past the end of the content.
    #[error(transparent)]
    Record(#[from] RecordError),

    /// A unit conversion or quantity assertion failed.
    #[error(transparent)]
    Unit(#[from] UnitError),

    /// A packed date or date-time field held an out-of-range component.
    #[error("Invalid date field: {0}")]
    InvalidDate(String),

    /// No registered driver matched the telegram's address fields.
    #[error(
        "No driver for meter: manufacturer 0x{manufacturer:04X} ({flag}), \
         device type 0x{device_type:02X}, version 0x{version:02X}"
    )]
    UnknownMeter {
        manufacturer: u16,
        flag: String,
        device_type: u8,
        version: u8,
    },

    /// A field inside an otherwise valid telegram could not be decoded.
    #[error("Malformed field at offset {offset}: {reason}")]
    MalformedField { offset: usize, reason: String },

    /// Key store lookup or key parsing failed.
    #[error("Key error: {0}")]
    Key(String),
}
