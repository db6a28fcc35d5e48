//! DIF/VIF data record parsing.
//!
//! Telegram content after the transport header is a sequence of data
//! records: a DIF byte with optional DIFE extensions, a VIF byte with
//! optional VIFE extensions, then the value bytes whose length the DIF
//! announces. The parser walks that sequence and captures each record with
//! its byte offset; decoding the captured bytes into typed values is
//! [`DvRecord::decode`].
//!
//! A record that runs past the end of the buffer, or one with a malformed
//! header, stops the walk. Everything parsed before the bad record is
//! kept and the stop reason is reported, so a clipped telegram still
//! yields its complete records.

use log::{debug, warn};
use thiserror::Error;

use crate::constants::{
    DIF_LVAR, DIF_MANUFACTURER_SPECIFIC, DIF_MASK_DATA, DIF_MASK_FUNCTION, DIF_MASK_STORAGE_LSB,
    DIF_MORE_RECORDS_FOLLOW, DIFE_MASK_STORAGE, DIFE_MASK_SUBUNIT, DIFE_MASK_TARIFF, EXTENSION_BIT,
    IDLE_FILLER, MAX_EXTENSION_BYTES, VIF_MASK_VALUE,
};
use crate::error::WmBusError;
use crate::payload::data_encoding::{
    decode_bcd, decode_date, decode_datetime, decode_datetime_seconds, decode_float, decode_int,
    decode_string,
};
use crate::payload::vif::{resolve_vib, VifInfo};
use crate::units::{Quantity, Unit};

/// Errors raised while walking the record sequence.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RecordError {
    #[error("Unknown VIF: 0x{0:02X}")]
    UnknownVif(u8),

    #[error("Unknown VIFE: 0x{0:02X}")]
    UnknownVife(u8),

    #[error("Escape VIF 0x{0:02X} without an extension code")]
    MissingVife(u8),

    #[error("Extension chain exceeds {MAX_EXTENSION_BYTES} bytes at offset {offset}")]
    ExtensionOverflow { offset: usize },

    #[error("Record at offset {offset} runs past the end of content")]
    Truncated { offset: usize },

    #[error("Reserved DIF 0x{dif:02X} at offset {offset}")]
    ReservedDif { dif: u8, offset: usize },

    #[error("Unsupported LVAR length code 0x{lvar:02X} at offset {offset}")]
    InvalidLvar { lvar: u8, offset: usize },
}

/// Function field of a data record (DIF bits 4-5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFunction {
    Instantaneous,
    Maximum,
    Minimum,
    ValueDuringError,
}

/// The DIF byte plus its captured DIFE chain.
#[derive(Debug, Clone, Default)]
pub struct DataInfoBlock {
    pub dif: u8,
    pub difes: Vec<u8>,
}

/// The VIF byte plus its captured VIFE chain. `custom_label` holds the
/// ASCII unit of a plain-text VIF (code 0x7C).
#[derive(Debug, Clone, Default)]
pub struct ValueInfoBlock {
    pub vif: u8,
    pub vifes: Vec<u8>,
    pub custom_label: Option<String>,
}

/// One data record as captured from telegram content.
#[derive(Debug, Clone)]
pub struct DvRecord {
    pub dib: DataInfoBlock,
    pub vib: ValueInfoBlock,
    /// Offset of the DIF byte inside the content buffer.
    pub offset: usize,
    /// LVAR length code, for records with a variable-length data field.
    pub lvar: Option<u8>,
    /// Raw value bytes in wire order.
    pub data: Vec<u8>,
}

/// A decoded record value.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedValue {
    Numeric {
        value: f64,
        unit: Unit,
        quantity: Quantity,
    },
    Text(String),
    Date(chrono::NaiveDate),
    DateTime(chrono::NaiveDateTime),
    /// Raw bytes kept for records whose VIF the tables do not cover.
    Binary(Vec<u8>),
}

impl DecodedValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DecodedValue::Numeric { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn unit(&self) -> Option<Unit> {
        match self {
            DecodedValue::Numeric { unit, .. } => Some(*unit),
            DecodedValue::Date(_) => Some(Unit::Date),
            DecodedValue::DateTime(_) => Some(Unit::DateTime),
            _ => None,
        }
    }
}

impl DvRecord {
    /// The record's lookup key: DIB and VIB bytes as lowercase hex, the
    /// form drivers use to address known registers ("0c13", "04fd17").
    pub fn key(&self) -> String {
        let mut bytes = Vec::with_capacity(2 + self.dib.difes.len() + self.vib.vifes.len());
        bytes.push(self.dib.dif);
        bytes.extend_from_slice(&self.dib.difes);
        bytes.push(self.vib.vif);
        bytes.extend_from_slice(&self.vib.vifes);
        hex::encode(bytes)
    }

    /// Storage number: DIF bit 6 is the least significant bit, each DIFE
    /// contributes four more.
    pub fn storage_number(&self) -> u32 {
        let mut storage = u32::from((self.dib.dif & DIF_MASK_STORAGE_LSB) >> 6);
        for (i, dife) in self.dib.difes.iter().enumerate() {
            storage |= u32::from(dife & DIFE_MASK_STORAGE) << (4 * i + 1);
        }
        storage
    }

    /// Tariff from the DIFE chain, two bits per extension.
    pub fn tariff(&self) -> u32 {
        let mut tariff = 0u32;
        for (i, dife) in self.dib.difes.iter().enumerate() {
            tariff |= u32::from((dife & DIFE_MASK_TARIFF) >> 4) << (2 * i);
        }
        tariff
    }

    /// Subunit from the DIFE chain, one bit per extension.
    pub fn subunit(&self) -> u32 {
        let mut subunit = 0u32;
        for (i, dife) in self.dib.difes.iter().enumerate() {
            subunit |= u32::from((dife & DIFE_MASK_SUBUNIT) >> 6) << i;
        }
        subunit
    }

    pub fn function(&self) -> RecordFunction {
        match (self.dib.dif & DIF_MASK_FUNCTION) >> 4 {
            0 => RecordFunction::Instantaneous,
            1 => RecordFunction::Maximum,
            2 => RecordFunction::Minimum,
            _ => RecordFunction::ValueDuringError,
        }
    }

    /// Resolves the VIB into unit/scale/quantity information.
    pub fn vif_info(&self) -> Result<VifInfo, RecordError> {
        if self.vib.custom_label.is_some() {
            return Ok(VifInfo::custom());
        }
        resolve_vib(self.vib.vif, &self.vib.vifes)
    }

    /// Decodes the captured value bytes according to the DIF data field
    /// code and the resolved VIF.
    ///
    /// Records with a VIF outside the tables stay raw (`Binary`) rather
    /// than failing the telegram; date fields with impossible components
    /// fail with `InvalidDate`.
    pub fn decode(&self) -> Result<DecodedValue, WmBusError> {
        let info = match self.vif_info() {
            Ok(info) => info,
            Err(
                err @ (RecordError::UnknownVif(_)
                | RecordError::UnknownVife(_)
                | RecordError::MissingVife(_)),
            ) => {
                debug!("Record at offset {} kept raw: {err}", self.offset);
                return Ok(DecodedValue::Binary(self.data.clone()));
            }
            Err(err) => return Err(err.into()),
        };

        if info.unit == Unit::Date {
            return Ok(DecodedValue::Date(decode_date(&self.data)?));
        }
        if info.unit == Unit::DateTime {
            return match self.data.len() {
                6 => Ok(DecodedValue::DateTime(decode_datetime_seconds(&self.data)?)),
                _ => Ok(DecodedValue::DateTime(decode_datetime(&self.data)?)),
            };
        }

        if let Some(lvar) = self.lvar {
            return self.decode_lvar(lvar, &info);
        }

        let code = self.dib.dif & DIF_MASK_DATA;
        let raw = match code {
            0x0 | 0x8 => return Ok(DecodedValue::Binary(Vec::new())),
            0x1..=0x4 | 0x6 | 0x7 => {
                let (_, v) = decode_int(&self.data, self.data.len())
                    .map_err(|_| self.malformed("bad integer field"))?;
                v as f64
            }
            0x5 => {
                let (_, v) =
                    decode_float(&self.data).map_err(|_| self.malformed("bad float field"))?;
                f64::from(v)
            }
            0x9..=0xC | 0xE => {
                let (_, v) = decode_bcd(&self.data, self.data.len())
                    .map_err(|_| self.malformed("bad BCD digit"))?;
                v as f64
            }
            _ => return Ok(DecodedValue::Binary(self.data.clone())),
        };

        Ok(DecodedValue::Numeric {
            value: raw * info.scale,
            unit: info.unit,
            quantity: info.quantity,
        })
    }

    fn decode_lvar(&self, lvar: u8, info: &VifInfo) -> Result<DecodedValue, WmBusError> {
        match lvar {
            0x00..=0xBF => Ok(DecodedValue::Text(decode_string(&self.data))),
            0xC0..=0xC9 | 0xD0..=0xD9 => {
                let (_, v) = decode_bcd(&self.data, self.data.len())
                    .map_err(|_| self.malformed("bad BCD digit in LVAR field"))?;
                let value = if lvar >= 0xD0 { -(v as f64) } else { v as f64 };
                Ok(DecodedValue::Numeric {
                    value: value * info.scale,
                    unit: info.unit,
                    quantity: info.quantity,
                })
            }
            _ => Ok(DecodedValue::Binary(self.data.clone())),
        }
    }

    fn malformed(&self, reason: &str) -> WmBusError {
        WmBusError::MalformedField {
            offset: self.offset,
            reason: reason.to_string(),
        }
    }
}

/// Result of walking a content buffer.
#[derive(Debug, Default)]
pub struct DvParseResult {
    pub records: Vec<DvRecord>,
    /// Why the walk stopped before the end of content, when it did.
    pub error: Option<RecordError>,
    /// A 0x1F DIF announced a continuation telegram.
    pub more_records_follow: bool,
    /// Offset and bytes of a manufacturer specific tail (0x0F DIF).
    pub manufacturer_data: Option<(usize, Vec<u8>)>,
}

impl DvParseResult {
    pub fn is_partial(&self) -> bool {
        self.error.is_some()
    }
}

/// Walks `content` and captures every data record.
///
/// Idle filler bytes (0x2F) between records are skipped; a 0x0F or 0x1F
/// DIF ends the walk as the standard requires. Errors never discard
/// records already parsed.
pub fn parse_dv_records(content: &[u8]) -> DvParseResult {
    let mut out = DvParseResult::default();
    let mut pos = 0usize;

    while pos < content.len() {
        if content[pos] == IDLE_FILLER {
            pos += 1;
            continue;
        }

        let dif = content[pos];
        if dif == DIF_MANUFACTURER_SPECIFIC || dif == DIF_MORE_RECORDS_FOLLOW {
            if dif == DIF_MORE_RECORDS_FOLLOW {
                out.more_records_follow = true;
            }
            let tail = &content[pos + 1..];
            if !tail.is_empty() {
                out.manufacturer_data = Some((pos + 1, tail.to_vec()));
            }
            break;
        }

        match parse_record(content, pos) {
            Ok((next, record)) => {
                out.records.push(record);
                pos = next;
            }
            Err(err) => {
                warn!("Record parse stopped at offset {pos}: {err}");
                out.error = Some(err);
                break;
            }
        }
    }

    out
}

fn parse_record(content: &[u8], start: usize) -> Result<(usize, DvRecord), RecordError> {
    let mut pos = start;

    let dif = content[pos];
    pos += 1;

    let mut difes = Vec::new();
    let mut extension = dif & EXTENSION_BIT != 0;
    while extension {
        if difes.len() == MAX_EXTENSION_BYTES {
            return Err(RecordError::ExtensionOverflow { offset: pos });
        }
        let dife = *content
            .get(pos)
            .ok_or(RecordError::Truncated { offset: start })?;
        pos += 1;
        extension = dife & EXTENSION_BIT != 0;
        difes.push(dife);
    }

    let vif = *content
        .get(pos)
        .ok_or(RecordError::Truncated { offset: start })?;
    pos += 1;

    let mut custom_label = None;
    if vif & VIF_MASK_VALUE == 0x7C {
        let len = *content
            .get(pos)
            .ok_or(RecordError::Truncated { offset: start })? as usize;
        pos += 1;
        let chars = content
            .get(pos..pos + len)
            .ok_or(RecordError::Truncated { offset: start })?;
        custom_label = Some(decode_string(chars));
        pos += len;
    }

    let mut vifes = Vec::new();
    let mut extension = vif & EXTENSION_BIT != 0;
    while extension {
        if vifes.len() == MAX_EXTENSION_BYTES {
            return Err(RecordError::ExtensionOverflow { offset: pos });
        }
        let vife = *content
            .get(pos)
            .ok_or(RecordError::Truncated { offset: start })?;
        pos += 1;
        extension = vife & EXTENSION_BIT != 0;
        vifes.push(vife);
    }

    let mut lvar = None;
    let len = match dif & DIF_MASK_DATA {
        DIF_LVAR => {
            let code = *content
                .get(pos)
                .ok_or(RecordError::Truncated { offset: start })?;
            pos += 1;
            lvar = Some(code);
            lvar_length(code).ok_or(RecordError::InvalidLvar {
                lvar: code,
                offset: pos - 1,
            })?
        }
        code => dif_data_length(code).ok_or(RecordError::ReservedDif { dif, offset: start })?,
    };

    let data = content
        .get(pos..pos + len)
        .ok_or(RecordError::Truncated { offset: start })?
        .to_vec();
    pos += len;

    Ok((
        pos,
        DvRecord {
            dib: DataInfoBlock { dif, difes },
            vib: ValueInfoBlock {
                vif,
                vifes,
                custom_label,
            },
            offset: start,
            lvar,
            data,
        },
    ))
}

/// Value length announced by a DIF data field code. `None` for LVAR
/// (a length byte follows) and the reserved special-function code.
pub fn dif_data_length(code: u8) -> Option<usize> {
    match code & DIF_MASK_DATA {
        0x0 => Some(0),
        0x1 => Some(1),
        0x2 => Some(2),
        0x3 => Some(3),
        0x4 => Some(4),
        0x5 => Some(4), // 32-bit real
        0x6 => Some(6),
        0x7 => Some(8),
        0x8 => Some(0), // selection for readout
        0x9 => Some(1),
        0xA => Some(2),
        0xB => Some(3),
        0xC => Some(4),
        0xE => Some(6),
        _ => None,
    }
}

/// Data length behind an LVAR length code.
fn lvar_length(code: u8) -> Option<usize> {
    match code {
        0x00..=0xBF => Some(code as usize),
        // Positive and negative BCD, (code - base) bytes
        0xC0..=0xC9 => Some((code - 0xC0) as usize),
        0xD0..=0xD9 => Some((code - 0xD0) as usize),
        // Binary number, (code - 0xE0) bytes
        0xE0..=0xEF => Some((code - 0xE0) as usize),
        _ => None,
    }
}
