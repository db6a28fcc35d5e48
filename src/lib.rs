//! # wmbus-rs - A Rust Crate for Decoding Wireless M-Bus Telegrams
//!
//! The wmbus-rs crate decodes wM-Bus (EN 13757) telegrams as transmitted by
//! utility meters: water, heat, gas and electricity. It takes the raw frame
//! bytes a radio hands over and produces named physical quantities.
//!
//! ## Features
//!
//! - Parse EN 13757-4 link-layer frames, with or without trailing CRC bytes
//! - Handle extended link layer (ELL) and transport layer (TPL) headers
//! - Decrypt payloads protected by TPL security mode 5/7 (AES-CBC) or the
//!   ELL counter mode (AES-CTR), with per-device keys from a [`KeyStore`]
//! - Parse DIF/VIF data records into an indexed, queryable record set
//! - Decode BCD, little-endian integer, real and packed date values with
//!   unit-aware scaling and conversion
//! - Dispatch telegrams to meter drivers matched by manufacturer and
//!   device type, producing immutable serializable readings
//! - Annotate every decoded byte range for `explanation_report` hex-dump
//!   style debugging
//!
//! ## Usage
//!
//! ```rust
//! use wmbus_rs::{KeyStore, MeterRegistry, Quantity, Telegram, Unit};
//!
//! let keys = KeyStore::new();
//! let bytes = [
//!     0x14, 0x44, 0xEE, 0x4D, 0x90, 0x01, 0x16, 0x76, 0x3C, 0x06, 0x7A,
//!     0x2A, 0x00, 0x00, 0x00, 0x0C, 0x13, 0x30, 0x12, 0x00, 0x00,
//! ];
//! let mut telegram = Telegram::decode(&bytes, &keys)?;
//!
//! let registry = MeterRegistry::with_builtin_drivers();
//! let reading = registry.dispatch(&mut telegram)?;
//! let total = reading.value(Quantity::Volume, Unit::CubicMeter)?;
//! assert!((total - 1.23).abs() < 1e-9);
//! # Ok::<(), wmbus_rs::WmBusError>(())
//! ```

pub mod constants;
pub mod error;
pub mod keys;
pub mod logging;
pub mod meters;
pub mod payload;
pub mod telegram;
pub mod units;
pub mod util;
pub mod wmbus;

pub use crate::error::WmBusError;
pub use crate::keys::KeyStore;

// Telegram pipeline
pub use crate::telegram::{DispatchState, LinkMode, StatusFlags, Telegram, TelegramStatus};
pub use crate::wmbus::{crc16, AesKey, CryptoError, EncryptionMode, FrameError, WmBusFrame};

// Data records and values
pub use crate::payload::{DoubleValue, DvKey, DvRecord, RecordError, RecordIndex};
pub use crate::units::{convert, Quantity, Unit, UnitError};

// Meter drivers
pub use crate::meters::{
    DriverSpec, FieldReading, FieldSpec, FieldValue, MeterReading, MeterRegistry,
};

/// Decode one received telegram, decrypting with a key from `keys` when
/// the headers call for one.
///
/// # Arguments
/// * `data` - Raw frame bytes, CRC-stripped or with CRCs still attached
/// * `keys` - Per-device AES keys, looked up by device id
///
/// # Returns
/// * `Ok(Telegram)` - Parsed telegram with its record index populated
/// * `Err(WmBusError)` - Framing, decryption or header parsing failed
pub fn decode_telegram(data: &[u8], keys: &KeyStore) -> Result<Telegram, WmBusError> {
    Telegram::decode(data, keys)
}

/// Decode a telegram given as a hex dump. Whitespace and `|` separators
/// are accepted, as commonly found in log excerpts.
///
/// # Arguments
/// * `telegram` - Hex-encoded frame bytes
/// * `keys` - Per-device AES keys, looked up by device id
///
/// # Returns
/// * `Ok(Telegram)` - Parsed telegram with its record index populated
/// * `Err(WmBusError)` - Bad hex, framing, decryption or header parse error
pub fn decode_hex_telegram(telegram: &str, keys: &KeyStore) -> Result<Telegram, WmBusError> {
    Telegram::decode_hex(telegram, keys)
}
