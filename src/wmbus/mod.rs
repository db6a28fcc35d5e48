//! # Wireless M-Bus (wM-Bus) Link and Encryption Layers
//!
//! This module handles everything between raw received bytes and decrypted
//! application content: EN 13757-4 link-layer frame parsing with CRC
//! validation, and the AES payload encryption schemes (TPL security modes
//! 5/7 and ELL counter mode).

pub mod crypto;
pub mod frame;

// Re-export the necessary types and functions from the submodules
pub use crypto::{AesKey, CryptoError, EncryptionMode};
pub use frame::{crc16, FrameError, WmBusFrame};
