//! # wM-Bus Data Encoding and Decoding
//!
//! Decoders for the value encodings a DIF can announce: BCD, fixed-width
//! binary integers, IEEE-754 floats, packed date/time types and LVAR
//! strings. All multi-byte values arrive least significant byte first on
//! the wire.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use nom::{bytes::complete::take, combinator::map, IResult};

use crate::error::WmBusError;

/// Decodes a binary-coded decimal value of `size` bytes into a signed
/// integer. The most significant byte is last on the wire; an 0xF in its
/// high nibble marks a negative value. Any other nibble above 9 is
/// rejected.
pub fn decode_bcd(input: &[u8], size: usize) -> IResult<&[u8], i64> {
    let (rest, bytes) = take(size)(input)?;

    let mut value: i64 = 0;
    let mut negative = false;
    for (i, &byte) in bytes.iter().enumerate().rev() {
        let hi = (byte >> 4) & 0x0F;
        let lo = byte & 0x0F;

        if i == size - 1 && hi == 0x0F {
            negative = true;
        } else {
            if hi > 9 {
                return Err(nom::Err::Error(nom::error::Error::new(
                    input,
                    nom::error::ErrorKind::Verify,
                )));
            }
            value = value * 10 + i64::from(hi);
        }

        if lo > 9 {
            return Err(nom::Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Verify,
            )));
        }
        value = value * 10 + i64::from(lo);
    }

    Ok((rest, if negative { -value } else { value }))
}

/// Encodes a signed integer as `size` bytes of wire-order BCD, the inverse
/// of [`decode_bcd`]. Values that need more digits than fit are truncated
/// at the top, as a meter register would wrap.
pub fn encode_bcd(value: i64, size: usize) -> Vec<u8> {
    let mut digits = value.unsigned_abs();
    let mut out = vec![0u8; size];

    for byte in out.iter_mut() {
        let ones = (digits % 10) as u8;
        digits /= 10;
        let tens = (digits % 10) as u8;
        digits /= 10;
        *byte = (tens << 4) | ones;
    }

    if value < 0 {
        if let Some(last) = out.last_mut() {
            *last = (*last & 0x0F) | 0xF0;
        }
    }

    out
}

/// Decodes a little-endian two's-complement integer of 1, 2, 3, 4, 6 or 8
/// bytes.
pub fn decode_int(input: &[u8], size: usize) -> IResult<&[u8], i64> {
    let (rest, bytes) = take(size)(input)?;

    let value = match size {
        1 => i64::from(bytes[0] as i8),
        2 => i64::from(i16::from_le_bytes([bytes[0], bytes[1]])),
        3 => {
            let raw = i64::from(bytes[0]) | i64::from(bytes[1]) << 8 | i64::from(bytes[2]) << 16;
            (raw << 40) >> 40
        }
        4 => i64::from(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
        6 => {
            let mut raw: i64 = 0;
            for (i, &b) in bytes.iter().enumerate() {
                raw |= i64::from(b) << (i * 8);
            }
            (raw << 16) >> 16
        }
        8 => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(bytes);
            i64::from_le_bytes(raw)
        }
        _ => {
            return Err(nom::Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Tag,
            )))
        }
    };

    Ok((rest, value))
}

/// Decodes a little-endian IEEE-754 single precision float.
pub fn decode_float(input: &[u8]) -> IResult<&[u8], f32> {
    map(take(4usize), |b: &[u8]| {
        f32::from_le_bytes([b[0], b[1], b[2], b[3]])
    })(input)
}

/// Decodes a Type G (CP16) packed date.
///
/// Out-of-range components fail; a day of 0 or a month of 13 is never
/// clamped into a real date.
pub fn decode_date(input: &[u8]) -> Result<NaiveDate, WmBusError> {
    if input.len() < 2 {
        return Err(WmBusError::InvalidDate(format!(
            "Type G date needs 2 bytes, got {}",
            input.len()
        )));
    }

    let day = u32::from(input[0] & 0x1F);
    let month = u32::from(input[1] & 0x0F);
    let year = 2000 + i32::from(((input[0] & 0xE0) >> 5) | ((input[1] & 0xF0) >> 1));

    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return Err(WmBusError::InvalidDate(format!(
            "out of range: year {year} month {month} day {day}"
        )));
    }

    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
        WmBusError::InvalidDate(format!("no such date: year {year} month {month} day {day}"))
    })
}

/// Decodes a Type F (CP32) packed date and time.
///
/// Bit 7 of the first byte is the "time invalid" flag set by meters with a
/// dead clock.
pub fn decode_datetime(input: &[u8]) -> Result<NaiveDateTime, WmBusError> {
    if input.len() < 4 {
        return Err(WmBusError::InvalidDate(format!(
            "Type F date-time needs 4 bytes, got {}",
            input.len()
        )));
    }
    if input[0] & 0x80 != 0 {
        return Err(WmBusError::InvalidDate(
            "time marked invalid by the meter".to_string(),
        ));
    }

    let minute = u32::from(input[0] & 0x3F);
    let hour = u32::from(input[1] & 0x1F);
    let date = decode_date(&input[2..4])?;

    let time = NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| {
        WmBusError::InvalidDate(format!("out of range: hour {hour} minute {minute}"))
    })?;

    Ok(NaiveDateTime::new(date, time))
}

/// Decodes a Type I (CP48) packed date and time with seconds.
pub fn decode_datetime_seconds(input: &[u8]) -> Result<NaiveDateTime, WmBusError> {
    if input.len() < 6 {
        return Err(WmBusError::InvalidDate(format!(
            "Type I date-time needs 6 bytes, got {}",
            input.len()
        )));
    }
    if input[0] & 0x40 != 0 {
        return Err(WmBusError::InvalidDate(
            "time marked invalid by the meter".to_string(),
        ));
    }

    let second = u32::from(input[0] & 0x3F);
    let minute = u32::from(input[1] & 0x3F);
    let hour = u32::from(input[2] & 0x1F);
    let date = decode_date(&input[3..5])?;

    let time = NaiveTime::from_hms_opt(hour, minute, second).ok_or_else(|| {
        WmBusError::InvalidDate(format!(
            "out of range: hour {hour} minute {minute} second {second}"
        ))
    })?;

    Ok(NaiveDateTime::new(date, time))
}

/// Decodes an LVAR text payload. Characters arrive least significant
/// first, so the wire order is reversed.
pub fn decode_string(src: &[u8]) -> String {
    src.iter().rev().map(|&b| b as char).collect()
}

/// Reads the 4-byte BCD device address as its raw little-endian value.
/// Printing it as 8 hex digits yields the serial number on the meter's
/// label.
pub fn decode_device_id(input: &[u8]) -> IResult<&[u8], u32> {
    map(take(4usize), |bytes: &[u8]| {
        let mut value = 0u32;
        for (i, &byte) in bytes.iter().enumerate() {
            value |= u32::from(byte) << (i * 8);
        }
        value
    })(input)
}

/// Formats a device address the way it is printed on the meter.
pub fn format_device_id(id: u32) -> String {
    format!("{id:08x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use proptest::proptest;

    #[test]
    fn test_decode_bcd_wire_order() {
        // 1230 on the wire, least significant byte first
        let bytes = [0x30, 0x12, 0x00, 0x00];
        let (rest, value) = decode_bcd(&bytes, 4).unwrap();
        assert!(rest.is_empty());
        assert_eq!(value, 1230);
    }

    #[test]
    fn test_decode_bcd_negative_sign_nibble() {
        let bytes = [0x78, 0x56, 0x34, 0xF2];
        let (_, value) = decode_bcd(&bytes, 4).unwrap();
        assert_eq!(value, -2345678);
    }

    #[test]
    fn test_decode_bcd_rejects_hex_digits() {
        let bytes = [0x3A, 0x12, 0x00, 0x00];
        assert!(decode_bcd(&bytes, 4).is_err());
        // 0xF allowed only as the sign position
        let bytes = [0x30, 0xF2, 0x00, 0x00];
        assert!(decode_bcd(&bytes, 4).is_err());
    }

    #[test]
    fn test_encode_bcd_round_trip() {
        for value in [0i64, 7, 1230, 99999999, -12345] {
            let bytes = encode_bcd(value, 4);
            let (_, decoded) = decode_bcd(&bytes, 4).unwrap();
            assert_eq!(decoded, value);
        }
    }

    #[test]
    fn test_decode_int_little_endian() {
        let bytes = [0x39, 0x30];
        let (_, value) = decode_int(&bytes, 2).unwrap();
        assert_eq!(value, 12345);

        let bytes = [0xFF, 0xFF];
        let (_, value) = decode_int(&bytes, 2).unwrap();
        assert_eq!(value, -1);

        let bytes = [0x15, 0xCD, 0x5B, 0x07];
        let (_, value) = decode_int(&bytes, 4).unwrap();
        assert_eq!(value, 123456789);
    }

    #[test]
    fn test_decode_int_sign_extends_odd_widths() {
        let bytes = [0xFE, 0xFF, 0xFF];
        let (_, value) = decode_int(&bytes, 3).unwrap();
        assert_eq!(value, -2);

        let bytes = [0x00, 0x00, 0x00, 0x00, 0x00, 0x80];
        let (_, value) = decode_int(&bytes, 6).unwrap();
        assert_eq!(value, -(1i64 << 47));
    }

    #[test]
    fn test_decode_int_rejects_bad_width() {
        let bytes = [0x00; 8];
        assert!(decode_int(&bytes, 5).is_err());
    }

    #[test]
    fn test_decode_float() {
        let bytes = 1.5f32.to_le_bytes();
        let (_, value) = decode_float(&bytes).unwrap();
        assert_eq!(value, 1.5);
    }

    #[test]
    fn test_decode_date() {
        // 2021-03-31: day 31, month 3, year 21
        let bytes = [(21 & 0x07) << 5 | 31, ((21 & 0x78) << 1) | 3];
        let date = decode_date(&bytes).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2021, 3, 31).unwrap());
    }

    #[test]
    fn test_decode_date_rejects_day_zero() {
        let bytes = [(21 & 0x07) << 5, ((21 & 0x78) << 1) | 3];
        assert!(matches!(
            decode_date(&bytes),
            Err(WmBusError::InvalidDate(_))
        ));
    }

    #[test]
    fn test_decode_date_rejects_month_13() {
        let bytes = [(21 & 0x07) << 5 | 15, ((21 & 0x78) << 1) | 13];
        assert!(matches!(
            decode_date(&bytes),
            Err(WmBusError::InvalidDate(_))
        ));
    }

    #[test]
    fn test_decode_datetime() {
        // 2021-03-31 14:45
        let bytes = [45, 14, (21 & 0x07) << 5 | 31, ((21 & 0x78) << 1) | 3];
        let dt = decode_datetime(&bytes).unwrap();
        assert_eq!(
            dt,
            NaiveDate::from_ymd_opt(2021, 3, 31)
                .unwrap()
                .and_hms_opt(14, 45, 0)
                .unwrap()
        );
    }

    #[test]
    fn test_decode_datetime_invalid_flag() {
        let bytes = [0x80 | 45, 14, (21 & 0x07) << 5 | 31, ((21 & 0x78) << 1) | 3];
        assert!(decode_datetime(&bytes).is_err());
    }

    #[test]
    fn test_decode_string_reverses_wire_order() {
        let bytes = [b'8', b'7', b'5', b'M', b'O', b'C'];
        assert_eq!(decode_string(&bytes), "COM578");
    }

    #[test]
    fn test_device_id() {
        let bytes = [0x78, 0x56, 0x34, 0x12];
        let (_, id) = decode_device_id(&bytes).unwrap();
        assert_eq!(id, 0x12345678);
        assert_eq!(format_device_id(id), "12345678");
    }

    proptest! {
        #[test]
        fn prop_bcd_round_trip(value in 0i64..100_000_000) {
            let bytes = encode_bcd(value, 4);
            let (_, decoded) = decode_bcd(&bytes, 4).unwrap();
            prop_assert_eq!(decoded, value);
        }

        #[test]
        fn prop_bcd_negative_round_trip(value in -10_000_000i64..0) {
            let bytes = encode_bcd(value, 4);
            let (_, decoded) = decode_bcd(&bytes, 4).unwrap();
            prop_assert_eq!(decoded, value);
        }

        #[test]
        fn prop_int_round_trip(value in i32::MIN..i32::MAX) {
            let bytes = value.to_le_bytes();
            let (_, decoded) = decode_int(&bytes, 4).unwrap();
            prop_assert_eq!(decoded, i64::from(value));
        }
    }
}
