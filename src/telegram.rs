//! # Telegram Decoding Pipeline
//!
//! A [`Telegram`] is one received wM-Bus message carried through the whole
//! decode chain: link-layer frame parse, extended link layer (ELL) and
//! transport layer (TPL) header handling, payload decryption, and the data
//! record parse that feeds the [`RecordIndex`].
//!
//! The telegram also accumulates an append-only explanation trail mapping
//! byte offsets to human-readable notes. Offsets refer to the decoded view
//! of the telegram (link header, then any ELL/TPL headers, then decrypted
//! content), so [`Telegram::explanation_report`] reads like an annotated
//! hex dump. Drivers append their own notes per record via
//! [`Telegram::add_record_explanation`].
//!
//! Decoding a telegram is synchronous and owns all of its state; failures
//! are terminal for that telegram only and always leave one diagnostic log
//! line behind.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::constants::{
    AES_BLOCK_LEN, CI_ELL_SHORT, CI_RESP_LONG_HEADER, CI_RESP_NO_HEADER, CI_RESP_SHORT_HEADER,
    C_FIELD_ACC_NR, C_FIELD_SND_IR, C_FIELD_SND_NR, LINK_HEADER_LEN, TPL_CFG_MASK_BLOCKS,
    TPL_CFG_MASK_MODE,
};
use crate::error::WmBusError;
use crate::keys::KeyStore;
use crate::meters::manufacturer;
use crate::payload::data_encoding::format_device_id;
use crate::payload::record::{parse_dv_records, RecordError};
use crate::payload::RecordIndex;
use crate::util::hex::{decode_hex, encode_hex, format_hex_compact};
use crate::wmbus::crypto::{self, CryptoError, EncryptionMode};
use crate::wmbus::frame::{FrameError, WmBusFrame};

/// Radio link mode the telegram was received on. Supplied by the transport
/// layer; the decoder itself never infers it from the bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkMode {
    #[default]
    Any,
    S1,
    T1,
    C1,
    N1,
}

bitflags! {
    /// TPL status byte per EN 13757-3. An all-zero byte means the meter
    /// reports no problems.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct StatusFlags: u8 {
        /// Application busy (lower status field 01).
        const APPLICATION_BUSY  = 0b0000_0001;
        /// Application error (lower status field 10).
        const APPLICATION_ERROR = 0b0000_0010;
        /// Battery or supply voltage low.
        const POWER_LOW         = 0b0000_0100;
        /// Permanent error, needs service.
        const PERMANENT_ERROR   = 0b0000_1000;
        /// Temporary error, self-clearing.
        const TEMPORARY_ERROR   = 0b0001_0000;
        /// Manufacturer specific bits 5-7.
        const MANUFACTURER_1    = 0b0010_0000;
        const MANUFACTURER_2    = 0b0100_0000;
        const MANUFACTURER_3    = 0b1000_0000;
    }
}

impl StatusFlags {
    /// Short text for explanations and diagnostics, "OK" when clear.
    pub fn describe(&self) -> String {
        if self.is_empty() {
            return "OK".to_string();
        }
        self.iter_names()
            .map(|(name, _)| name)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Address block carried by a long TPL header (CI 0x72). When present it
/// identifies the true origin of the telegram (e.g. behind a repeater) and
/// takes precedence over the link-layer address for IV derivation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TplAddress {
    pub device_id: u32,
    pub manufacturer: u16,
    pub version: u8,
    pub device_type: u8,
}

/// Transport layer header (CI 0x7A short form or 0x72 long form).
#[derive(Debug, Clone, PartialEq)]
pub struct TplHeader {
    /// Access number, incremented by the meter per transmission.
    pub access_number: u8,
    /// Meter status byte.
    pub status: StatusFlags,
    /// Configuration word holding security mode and encrypted block count.
    pub configuration: u16,
    /// Long-header address block, absent for the short form.
    pub address: Option<TplAddress>,
}

impl TplHeader {
    /// Number of leading 16-byte blocks the configuration word declares
    /// encrypted (security modes 5 and 7).
    pub fn encrypted_blocks(&self) -> usize {
        ((self.configuration & TPL_CFG_MASK_BLOCKS) >> 4) as usize
    }
}

/// Extended link layer header (CI 0x8D).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EllHeader {
    pub communication_control: u8,
    pub access_number: u8,
    /// Session number; its top three bits carry the encryption method.
    pub session_number: u32,
}

impl EllHeader {
    /// ENC field from the session number: 0 = plaintext, 1 = AES-CTR.
    pub fn security_mode(&self) -> u8 {
        ((self.session_number >> 29) & 0x07) as u8
    }
}

/// Whether every record in the telegram parsed cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelegramStatus {
    /// All content bytes were consumed into records.
    Full,
    /// Parsing stopped early; the records gathered before the stop are valid.
    Partial,
}

/// Where the telegram stands in driver dispatch. The registry moves it
/// forward; a telegram no driver claims stays `Unmatched`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DispatchState {
    #[default]
    Unmatched,
    Matched,
    Processed,
}

/// One fully decoded wM-Bus message.
#[derive(Debug, Clone)]
pub struct Telegram {
    /// Link-layer frame fields and raw payload.
    pub frame: WmBusFrame,
    /// Radio mode the frame arrived on, if the transport supplied it.
    pub link_mode: LinkMode,
    /// Transport layer header, when the CI declares one.
    pub tpl: Option<TplHeader>,
    /// Extended link layer header, when the CI declares one.
    pub ell: Option<EllHeader>,
    /// Outermost encryption scheme that protected the payload.
    pub encryption: EncryptionMode,
    /// Decrypted application content the records were parsed from.
    pub content: Vec<u8>,
    /// Lookup index over the parsed data records.
    pub records: RecordIndex,
    /// Full or partial parse.
    pub status: TelegramStatus,
    /// Progress through driver matching and content processing.
    pub dispatch: DispatchState,
    /// The error that stopped a partial parse.
    pub parse_error: Option<RecordError>,
    /// Trailing manufacturer-specific block (offset, bytes), if any.
    pub manufacturer_data: Option<(usize, Vec<u8>)>,
    /// Offset of `content[0]` in the decoded view; record offsets are
    /// relative to content.
    content_base: usize,
    explanations: Vec<(usize, String)>,
}

impl Telegram {
    /// Decodes a telegram from raw frame bytes, decrypting with a key from
    /// `keys` when the headers signal encryption.
    pub fn decode(data: &[u8], keys: &KeyStore) -> Result<Telegram, WmBusError> {
        let frame = WmBusFrame::parse(data)?;
        let device = format_device_id(frame.device_id);
        let mut explanations: Vec<(usize, String)> = Vec::new();

        explanations.push((
            0,
            format!("{:02x} length ({} bytes)", frame.length, frame.length),
        ));
        explanations.push((
            1,
            format!("{:02x} c-field ({})", frame.control, c_field_name(frame.control)),
        ));
        explanations.push((
            2,
            format!(
                "{} manufacturer ({})",
                encode_hex(&frame.manufacturer.to_le_bytes()),
                describe_manufacturer(frame.manufacturer)
            ),
        ));
        explanations.push((
            4,
            format!(
                "{} device id ({})",
                encode_hex(&frame.device_id.to_le_bytes()),
                device
            ),
        ));
        explanations.push((8, format!("{:02x} version", frame.version)));
        explanations.push((
            9,
            format!(
                "{:02x} device type ({})",
                frame.device_type,
                media_name(frame.device_type)
            ),
        ));

        let mut ci = frame.control_info;
        // Offset of the next unread byte in the decoded view.
        let mut cursor = LINK_HEADER_LEN + 1;
        let mut body: Vec<u8> = frame.payload.clone();
        explanations.push((10, format!("{:02x} ci-field ({})", ci, ci_name(ci))));

        let mut ell = None;
        let mut encryption = EncryptionMode::None;

        // Extended link layer comes first; its decryption reveals an inner
        // CI that selects the transport layer below.
        if ci == CI_ELL_SHORT {
            if body.len() < 6 {
                return Err(WmBusError::MalformedField {
                    offset: cursor,
                    reason: "extended link layer header truncated".to_string(),
                });
            }
            let header = EllHeader {
                communication_control: body[0],
                access_number: body[1],
                session_number: u32::from_le_bytes([body[2], body[3], body[4], body[5]]),
            };
            explanations.push((cursor, format!("{:02x} ell-cc", body[0])));
            explanations.push((cursor + 1, format!("{:02x} ell-acc", body[1])));
            explanations.push((
                cursor + 2,
                format!(
                    "{} ell-sn (security mode {})",
                    encode_hex(&body[2..6]),
                    header.security_mode()
                ),
            ));
            let rest = body[6..].to_vec();
            cursor += 6;

            match header.security_mode() {
                0 => {
                    body = rest;
                }
                1 => {
                    let key = keys.key_for(frame.device_id).ok_or_else(|| {
                        log::warn!("telegram from {device}: ELL encrypted but no key configured");
                        WmBusError::from(CryptoError::MissingKey {
                            device: device.clone(),
                        })
                    })?;
                    let iv = crypto::ell_iv(
                        &frame,
                        header.communication_control,
                        header.session_number,
                    );
                    body = crypto::decrypt_ell_payload(key, &rest, &iv).map_err(|e| {
                        log::warn!("telegram from {device}: ELL decryption failed: {e}");
                        e
                    })?;
                    encryption = EncryptionMode::AesCtr;
                    explanations.push((cursor, "payload crc (verified)".to_string()));
                    // The two payload CRC bytes are checked and stripped.
                    cursor += 2;
                }
                mode => {
                    log::warn!("telegram from {device}: unsupported ELL security mode {mode}");
                    return Err(CryptoError::UnsupportedMode { mode }.into());
                }
            }
            ell = Some(header);

            if body.is_empty() {
                return Err(WmBusError::MalformedField {
                    offset: cursor,
                    reason: "no application data after extended link layer".to_string(),
                });
            }
            ci = body[0];
            explanations.push((cursor, format!("{:02x} tpl-ci-field ({})", ci, ci_name(ci))));
            body = body[1..].to_vec();
            cursor += 1;
        }

        // Transport layer header. The long form repeats the address block;
        // when present it overrides the link address for IV derivation.
        let mut tpl = None;
        let mut tpl_mode = EncryptionMode::None;
        let mut tpl_acc = 0u8;
        let mut enc_blocks = 0usize;
        let mut iv_frame = frame.clone();

        match ci {
            CI_RESP_NO_HEADER => {}
            CI_RESP_SHORT_HEADER => {
                if body.len() < 4 {
                    return Err(WmBusError::MalformedField {
                        offset: cursor,
                        reason: "short TPL header truncated".to_string(),
                    });
                }
                let status = StatusFlags::from_bits_retain(body[1]);
                let configuration = u16::from_le_bytes([body[2], body[3]]);
                tpl_mode = EncryptionMode::from_tpl_config(configuration).map_err(|e| {
                    log::warn!("telegram from {device}: {e}");
                    e
                })?;
                tpl_acc = body[0];
                enc_blocks = ((configuration & TPL_CFG_MASK_BLOCKS) >> 4) as usize;

                explanations.push((cursor, format!("{:02x} tpl-acc", body[0])));
                explanations.push((
                    cursor + 1,
                    format!("{:02x} tpl-status ({})", body[1], status.describe()),
                ));
                explanations.push((
                    cursor + 2,
                    format!(
                        "{} tpl-config (security mode {}, {} encrypted blocks)",
                        encode_hex(&body[2..4]),
                        (configuration & TPL_CFG_MASK_MODE) >> 8,
                        enc_blocks
                    ),
                ));

                tpl = Some(TplHeader {
                    access_number: body[0],
                    status,
                    configuration,
                    address: None,
                });
                body = body[4..].to_vec();
                cursor += 4;
            }
            CI_RESP_LONG_HEADER => {
                if body.len() < 12 {
                    return Err(WmBusError::MalformedField {
                        offset: cursor,
                        reason: "long TPL header truncated".to_string(),
                    });
                }
                let address = TplAddress {
                    device_id: u32::from_le_bytes([body[0], body[1], body[2], body[3]]),
                    manufacturer: u16::from_le_bytes([body[4], body[5]]),
                    version: body[6],
                    device_type: body[7],
                };
                let status = StatusFlags::from_bits_retain(body[9]);
                let configuration = u16::from_le_bytes([body[10], body[11]]);
                tpl_mode = EncryptionMode::from_tpl_config(configuration).map_err(|e| {
                    log::warn!("telegram from {device}: {e}");
                    e
                })?;
                tpl_acc = body[8];
                enc_blocks = ((configuration & TPL_CFG_MASK_BLOCKS) >> 4) as usize;

                iv_frame.device_id = address.device_id;
                iv_frame.manufacturer = address.manufacturer;
                iv_frame.version = address.version;
                iv_frame.device_type = address.device_type;

                explanations.push((
                    cursor,
                    format!(
                        "{} tpl-id ({})",
                        encode_hex(&body[0..4]),
                        format_device_id(address.device_id)
                    ),
                ));
                explanations.push((
                    cursor + 4,
                    format!(
                        "{} tpl-mfct ({})",
                        encode_hex(&body[4..6]),
                        describe_manufacturer(address.manufacturer)
                    ),
                ));
                explanations.push((cursor + 6, format!("{:02x} tpl-version", body[6])));
                explanations.push((
                    cursor + 7,
                    format!("{:02x} tpl-type ({})", body[7], media_name(body[7])),
                ));
                explanations.push((cursor + 8, format!("{:02x} tpl-acc", body[8])));
                explanations.push((
                    cursor + 9,
                    format!("{:02x} tpl-status ({})", body[9], status.describe()),
                ));
                explanations.push((
                    cursor + 10,
                    format!(
                        "{} tpl-config (security mode {}, {} encrypted blocks)",
                        encode_hex(&body[10..12]),
                        (configuration & TPL_CFG_MASK_MODE) >> 8,
                        enc_blocks
                    ),
                ));

                tpl = Some(TplHeader {
                    access_number: body[8],
                    status,
                    configuration,
                    address: Some(address),
                });
                body = body[12..].to_vec();
                cursor += 12;
            }
            0x79 => {
                log::warn!(
                    "telegram from {device}: compact frame without a cached format signature"
                );
                return Err(WmBusError::MalformedField {
                    offset: cursor - 1,
                    reason: "compact frame without a cached format signature".to_string(),
                });
            }
            other => {
                log::warn!("telegram from {device}: unsupported CI field 0x{other:02X}");
                return Err(WmBusError::MalformedField {
                    offset: cursor - 1,
                    reason: format!("unsupported CI field 0x{other:02X}"),
                });
            }
        }

        // Mode 5/7 encrypt only the leading blocks; records may continue in
        // plaintext after the encrypted region.
        let content = if tpl_mode.is_encrypted() && enc_blocks > 0 {
            let enc_len = enc_blocks * AES_BLOCK_LEN;
            if body.len() < enc_len {
                log::warn!(
                    "telegram from {device}: config declares {enc_blocks} encrypted blocks, \
                     only {} bytes follow",
                    body.len()
                );
                return Err(CryptoError::DecryptionFailed {
                    reason: format!(
                        "config declares {enc_blocks} encrypted blocks but only {} bytes follow",
                        body.len()
                    ),
                }
                .into());
            }
            // The long header's address block names the true sender, so it
            // also selects the key.
            let key = keys.key_for(iv_frame.device_id).ok_or_else(|| {
                log::warn!("telegram from {device}: encrypted but no key configured");
                WmBusError::from(CryptoError::MissingKey {
                    device: format_device_id(iv_frame.device_id),
                })
            })?;
            let iv = match tpl_mode {
                EncryptionMode::AesCbcIv => crypto::mode5_iv(&iv_frame, tpl_acc),
                EncryptionMode::AesCbcNoIv => [0u8; AES_BLOCK_LEN],
                _ => unreachable!(),
            };
            let mut plain = crypto::decrypt_tpl_payload(key, &body[..enc_len], &iv)
                .map_err(|e| {
                    log::warn!("telegram from {device}: decryption failed: {e}");
                    e
                })?;
            let mode_number = if tpl_mode == EncryptionMode::AesCbcIv { 5 } else { 7 };
            explanations.push((
                cursor,
                format!("decrypted {enc_len} bytes (security mode {mode_number})"),
            ));
            log::debug!(
                "telegram from {device}: decrypted content {}",
                format_hex_compact(&plain)
            );
            plain.extend_from_slice(&body[enc_len..]);
            plain
        } else {
            body
        };

        if encryption == EncryptionMode::None {
            encryption = tpl_mode;
        }

        let result = parse_dv_records(&content);
        let status = if result.is_partial() {
            TelegramStatus::Partial
        } else {
            TelegramStatus::Full
        };
        if let Some(err) = &result.error {
            log::warn!("telegram from {device}: partial decode: {err}");
        }
        if result.more_records_follow {
            log::debug!("telegram from {device}: more records follow in a later telegram");
        }

        Ok(Telegram {
            frame,
            link_mode: LinkMode::Any,
            tpl,
            ell,
            encryption,
            records: RecordIndex::new(result.records),
            status,
            dispatch: DispatchState::Unmatched,
            parse_error: result.error,
            manufacturer_data: result.manufacturer_data,
            content,
            content_base: cursor,
            explanations,
        })
    }

    /// Decodes a telegram from a hex dump (whitespace and `|` accepted).
    pub fn decode_hex(telegram: &str, keys: &KeyStore) -> Result<Telegram, WmBusError> {
        let bytes = decode_hex(telegram).map_err(FrameError::from)?;
        Telegram::decode(&bytes, keys)
    }

    /// The device id as printed on the meter.
    pub fn device_id_string(&self) -> String {
        format_device_id(self.frame.device_id)
    }

    pub fn is_partial(&self) -> bool {
        self.status == TelegramStatus::Partial
    }

    /// Appends a driver note for a record. `content_offset` is the record's
    /// offset as reported by the index; it is mapped into the decoded view.
    pub fn add_record_explanation(&mut self, content_offset: usize, text: impl Into<String>) {
        self.explanations
            .push((self.content_base + content_offset, text.into()));
    }

    /// All annotations gathered so far, unsorted, as (offset, text).
    pub fn explanations(&self) -> &[(usize, String)] {
        &self.explanations
    }

    /// The annotation trail sorted by offset, one line per entry. Entries
    /// sharing an offset keep their append order.
    pub fn explanation_report(&self) -> String {
        let mut entries = self.explanations.clone();
        entries.sort_by_key(|(offset, _)| *offset);
        entries
            .iter()
            .map(|(offset, text)| format!("{offset:03}: {text}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Human name for an EN 13757-3 device type (medium) byte.
pub fn media_name(device_type: u8) -> &'static str {
    match device_type {
        0x00 => "Other",
        0x01 => "Oil meter",
        0x02 => "Electricity meter",
        0x03 => "Gas meter",
        0x04 => "Heat meter",
        0x05 => "Steam meter",
        0x06 => "Warm water meter",
        0x07 => "Water meter",
        0x08 => "Heat cost allocator",
        0x09 => "Compressed air meter",
        0x0A | 0x0B => "Cooling meter",
        0x0C => "Heat meter (inlet)",
        0x0D => "Heat/cooling meter",
        0x0E => "Bus/system component",
        0x15 => "Hot water meter",
        0x16 => "Cold water meter",
        0x17 => "Dual water meter",
        0x18 => "Pressure meter",
        0x1A => "Smoke detector",
        0x1B => "Room sensor",
        0x1C => "Gas detector",
        0x21 => "Valve",
        0x25 => "Display unit",
        0x28 => "Waste water meter",
        0x29 => "Garbage meter",
        _ => "Unknown medium",
    }
}

fn c_field_name(control: u8) -> &'static str {
    match control {
        C_FIELD_SND_NR => "SND-NR",
        C_FIELD_SND_IR => "SND-IR",
        C_FIELD_ACC_NR => "ACC-NR",
        _ => "unknown",
    }
}

fn ci_name(ci: u8) -> &'static str {
    match ci {
        CI_RESP_NO_HEADER => "response without TPL header",
        CI_RESP_SHORT_HEADER => "response, short TPL header",
        CI_RESP_LONG_HEADER => "response, long TPL header",
        CI_ELL_SHORT => "extended link layer",
        0x79 => "compact frame",
        _ => "unknown",
    }
}

fn describe_manufacturer(id: u16) -> String {
    let flag = manufacturer::flag_string(id);
    match manufacturer::manufacturer_name(id) {
        Some(name) => format!("{flag}, {name}"),
        None => flag,
    }
}
