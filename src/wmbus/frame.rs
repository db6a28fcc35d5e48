//! # wM-Bus Link-Layer Frame Parsing
//!
//! This module parses the EN 13757-4 link layer of a wM-Bus telegram: the
//! length field, the C-field, the address block (manufacturer, device id,
//! version, device type) and the CI field that selects the transport layer
//! that follows.
//!
//! Telegrams reach us in one of two shapes:
//!
//! - **CRC stripped**: most receiver dongles verify and remove the link CRC
//!   before handing the frame over, so the buffer is exactly `L + 1` bytes.
//! - **CRC attached**: raw captures keep the final 16-bit CRC, making the
//!   buffer `L + 3` bytes. The CRC is then verified here with the EN 13757-4
//!   polynomial (0x3D65, final complement) before parsing continues.
//!
//! Anything else is a framing defect and the frame is rejected before the
//! decoding core ever sees it.

use thiserror::Error;

use crate::constants::{
    CRC_POLY, C_FIELD_ACC_NR, C_FIELD_SND_IR, C_FIELD_SND_NR, LINK_HEADER_LEN,
};
use crate::util::hex::{decode_hex, HexError};

/// Link-layer framing errors. Frames failing these checks are rejected at
/// the transport boundary and never enter the decode pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrameError {
    #[error("Frame too short: need {needed} bytes, got {actual}")]
    TooShort { needed: usize, actual: usize },

    #[error("Length field mismatch: L-field declares {declared} bytes, buffer holds {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("CRC check failed: frame carries {expected:04X}, calculated {calculated:04X}")]
    CrcMismatch { expected: u16, calculated: u16 },

    #[error("Invalid hex telegram: {0}")]
    BadHex(String),
}

impl From<HexError> for FrameError {
    fn from(e: HexError) -> Self {
        FrameError::BadHex(e.to_string())
    }
}

/// A parsed wM-Bus link-layer frame.
///
/// The address block fields are stored as read off the wire: the
/// manufacturer id and device id are little-endian, and the device id keeps
/// its BCD digits (format it with
/// [`format_device_id`](crate::payload::data_encoding::format_device_id) to
/// get the serial number printed on the meter).
#[derive(Debug, Clone, PartialEq)]
pub struct WmBusFrame {
    /// L-field: number of bytes following it, excluding any CRC.
    pub length: u8,
    /// C-field (0x44 SND-NR, 0x46 SND-IR, 0x47 ACC-NR from meters).
    pub control: u8,
    /// Manufacturer FLAG id, little-endian on the wire.
    pub manufacturer: u16,
    /// Device id, four BCD bytes read little-endian.
    pub device_id: u32,
    /// Meter firmware/protocol version byte.
    pub version: u8,
    /// Device type (medium) byte, e.g. 0x07 for water.
    pub device_type: u8,
    /// CI field selecting the transport layer that follows.
    pub control_info: u8,
    /// Everything after the CI field, CRC excluded.
    pub payload: Vec<u8>,
}

impl WmBusFrame {
    /// Parses a wM-Bus frame from a byte buffer.
    ///
    /// Accepts both CRC-stripped (`L + 1` bytes) and CRC-attached
    /// (`L + 3` bytes) buffers; any other length is a [`FrameError`].
    pub fn parse(data: &[u8]) -> Result<WmBusFrame, FrameError> {
        // L + C + M(2) + ID(4) + V + T + CI is the minimum useful frame.
        if data.len() < LINK_HEADER_LEN + 1 {
            return Err(FrameError::TooShort {
                needed: LINK_HEADER_LEN + 1,
                actual: data.len(),
            });
        }

        let length = data[0];
        let declared = length as usize + 1;

        let body = if data.len() == declared {
            // CRC already stripped by the receiver.
            &data[..declared]
        } else if data.len() == declared + 2 {
            // Trailing CRC present, check it over L..end-of-data.
            let expected = u16::from_le_bytes([data[declared], data[declared + 1]]);
            let calculated = crc16(&data[..declared]);
            if expected != calculated {
                return Err(FrameError::CrcMismatch {
                    expected,
                    calculated,
                });
            }
            &data[..declared]
        } else {
            return Err(FrameError::LengthMismatch {
                declared,
                actual: data.len(),
            });
        };

        let control = body[1];
        if !matches!(control, C_FIELD_SND_NR | C_FIELD_SND_IR | C_FIELD_ACC_NR) {
            log::debug!("Unusual C-field 0x{:02X}, continuing", control);
        }

        let manufacturer = u16::from_le_bytes([body[2], body[3]]);
        let device_id = u32::from_le_bytes([body[4], body[5], body[6], body[7]]);
        let version = body[8];
        let device_type = body[9];
        let control_info = body[10];
        let payload = body[LINK_HEADER_LEN + 1..].to_vec();

        Ok(WmBusFrame {
            length,
            control,
            manufacturer,
            device_id,
            version,
            device_type,
            control_info,
            payload,
        })
    }

    /// Parses a frame from a hex telegram dump, e.g.
    /// `"2E44EE4D9001167630067A..."` or the pipe-framed form loggers emit.
    pub fn parse_hex(telegram: &str) -> Result<WmBusFrame, FrameError> {
        let bytes = decode_hex(telegram)?;
        Self::parse(&bytes)
    }

    /// The six-byte A-field (device id, version, device type) as it appears
    /// on the wire. Used for IV derivation by the encryption layer.
    pub fn address_field(&self) -> [u8; 6] {
        let id = self.device_id.to_le_bytes();
        [
            id[0],
            id[1],
            id[2],
            id[3],
            self.version,
            self.device_type,
        ]
    }
}

/// CRC-16 per EN 13757-4: polynomial 0x3D65, zero initial value, final
/// complement. Known-answer: `crc16(b"123456789") == 0xC2B7`.
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc = 0u16;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ CRC_POLY;
            } else {
                crc <<= 1;
            }
        }
    }
    !crc
}
