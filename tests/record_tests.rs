//! Record walk and index tests against hand-assembled content buffers,
//! covering storage disambiguation, variable-length data, the date types
//! and the ways a walk can stop early.

use chrono::{NaiveDate, Timelike};
use wmbus_rs::payload::parse_dv_records;
use wmbus_rs::{Quantity, RecordError, RecordIndex, Unit, WmBusError};

fn index_of(content: &[u8]) -> RecordIndex {
    RecordIndex::new(parse_dv_records(content).records)
}

#[test]
fn test_bcd_volume_record() {
    let content = [0x0C, 0x13, 0x30, 0x12, 0x00, 0x00];
    let index = index_of(&content);

    let key = index.find_key(Quantity::Volume, 0).unwrap();
    let value = index.extract_double(&key).unwrap().unwrap();
    assert!((value.in_unit(Unit::CubicMeter).unwrap() - 1.23).abs() < 1e-9);
    assert!((value.in_unit(Unit::Litre).unwrap() - 1230.0).abs() < 1e-6);
}

#[test]
fn test_filler_separated_records_parse_clean() {
    let content = [
        0x0C, 0x13, 0x30, 0x12, 0x00, 0x00, 0x2F, 0x2F, 0x02, 0x3B, 0xAA, 0x01,
    ];
    let result = parse_dv_records(&content);

    assert_eq!(result.records.len(), 2);
    assert!(result.error.is_none());
    assert!(!result.is_partial());
    assert_eq!(result.records[1].offset, 8);
}

#[test]
fn test_truncated_record_keeps_earlier_ones() {
    // The flow record announces 2 data bytes but only 1 follows.
    let content = [0x0C, 0x13, 0x30, 0x12, 0x00, 0x00, 0x02, 0x3B, 0xAA];
    let result = parse_dv_records(&content);

    assert_eq!(result.records.len(), 1);
    assert!(matches!(result.error, Some(RecordError::Truncated { .. })));
    assert!(result.is_partial());

    let index = RecordIndex::new(result.records);
    let key = index.find_key(Quantity::Volume, 0).unwrap();
    assert!(index.extract_double(&key).unwrap().is_some());
}

#[test]
fn test_manufacturer_block_captured_with_offset() {
    let content = [
        0x0C, 0x13, 0x30, 0x12, 0x00, 0x00, 0x0F, 0xDE, 0xAD, 0xBE,
    ];
    let result = parse_dv_records(&content);

    assert_eq!(result.records.len(), 1);
    assert!(result.error.is_none());
    assert_eq!(result.manufacturer_data, Some((7, vec![0xDE, 0xAD, 0xBE])));
}

#[test]
fn test_more_records_follow_marker() {
    let content = [0x0C, 0x13, 0x30, 0x12, 0x00, 0x00, 0x1F];
    let result = parse_dv_records(&content);

    assert_eq!(result.records.len(), 1);
    assert!(result.more_records_follow);
    assert!(!result.is_partial());
}

#[test]
fn test_storage_number_tells_current_from_frozen() {
    // Same VIF twice: storage 0 holds the running total, storage 1 the
    // value frozen at the billing date.
    let content = [
        0x04, 0x13, 0x4A, 0x69, 0x00, 0x00, 0x44, 0x13, 0xA8, 0x61, 0x00, 0x00,
    ];
    let index = index_of(&content);

    let current = index.find_storage_key(Quantity::Volume, 0, 0).unwrap();
    let frozen = index.find_storage_key(Quantity::Volume, 1, 0).unwrap();

    let current = index.extract_double(&current).unwrap().unwrap();
    let frozen = index.extract_double(&frozen).unwrap().unwrap();
    assert!((current.in_unit(Unit::CubicMeter).unwrap() - 26.954).abs() < 1e-9);
    assert!((frozen.in_unit(Unit::CubicMeter).unwrap() - 25.0).abs() < 1e-9);

    // Plain occurrence search walks parse order regardless of storage.
    let first = index.find_key(Quantity::Volume, 0).unwrap();
    let second = index.find_key(Quantity::Volume, 1).unwrap();
    assert_eq!(index.record(&first).unwrap().offset, 0);
    assert_eq!(index.record(&second).unwrap().offset, 6);
    assert!(index.find_key(Quantity::Volume, 2).is_none());
}

#[test]
fn test_lvar_text_comes_back_unreversed() {
    let content = [0x0D, 0x78, 0x03, b'C', b'B', b'A'];
    let index = index_of(&content);

    let key = index.find_key(Quantity::Dimensionless, 0).unwrap();
    let (text, offset) = index.extract_text(&key).unwrap().unwrap();
    assert_eq!(text, "ABC");
    assert_eq!(offset, 0);
}

#[test]
fn test_type_f_datetime() {
    let content = [0x04, 0x6D, 0x1E, 0x0E, 0xEC, 0x25];
    let index = index_of(&content);

    let key = index.find_key(Quantity::PointInTime, 0).unwrap();
    let (stamp, _) = index.extract_datetime(&key).unwrap().unwrap();
    assert_eq!(stamp.date(), NaiveDate::from_ymd_opt(2023, 5, 12).unwrap());
    assert_eq!(stamp.hour(), 14);
    assert_eq!(stamp.minute(), 30);
}

#[test]
fn test_type_g_date_anchors_to_midnight() {
    let content = [0x02, 0x6C, 0xEC, 0x25];
    let index = index_of(&content);

    let key = index.find_key(Quantity::PointInTime, 0).unwrap();
    let (stamp, _) = index.extract_datetime(&key).unwrap().unwrap();
    assert_eq!(stamp.date(), NaiveDate::from_ymd_opt(2023, 5, 12).unwrap());
    assert_eq!(stamp.hour(), 0);
    assert_eq!(stamp.minute(), 0);
}

#[test]
fn test_invalid_date_parses_but_fails_extraction() {
    // Month 0 is outside Type G's calendar.
    let content = [0x02, 0x6C, 0x0C, 0x20];
    let result = parse_dv_records(&content);
    assert_eq!(result.records.len(), 1);
    assert!(result.error.is_none());

    let index = RecordIndex::new(result.records);
    let key = index.find_key(Quantity::PointInTime, 0).unwrap();
    match index.extract_datetime(&key) {
        Err(WmBusError::InvalidDate(_)) => {}
        other => panic!("expected InvalidDate, got {other:?}"),
    }
}

#[test]
fn test_runaway_extension_chain_stops_the_walk() {
    let mut content = vec![0x82];
    content.extend_from_slice(&[0x80; 11]);
    let result = parse_dv_records(&content);

    assert!(result.records.is_empty());
    assert!(matches!(
        result.error,
        Some(RecordError::ExtensionOverflow { .. })
    ));
}
