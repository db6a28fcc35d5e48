//! # Utility Modules
//!
//! Common helpers used throughout the wmbus-rs crate.

pub mod hex;

// Re-export commonly used functions
pub use hex::{decode_hex, encode_hex, format_hex_compact};
