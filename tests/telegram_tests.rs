//! End-to-end decode pipeline tests: link layer through decryption to the
//! record index, using fixtures encrypted with the crate's own primitives
//! so the deterministic IV construction is exercised both ways.

use wmbus_rs::wmbus::crypto::{
    apply_aes_ctr, ell_iv, encrypt_aes_cbc, mode5_iv, pad_with_filler,
};
use wmbus_rs::{
    crc16, decode_hex_telegram, decode_telegram, AesKey, CryptoError, EncryptionMode, KeyStore,
    MeterRegistry, Quantity, TelegramStatus, Unit, WmBusError, WmBusFrame,
};

const GOLDEN_PLAIN: [u8; 21] = [
    0x14, 0x44, 0xEE, 0x4D, 0x90, 0x01, 0x16, 0x76, 0x3C, 0x06, 0x7A, 0x2A, 0x00, 0x00, 0x00,
    0x0C, 0x13, 0x30, 0x12, 0x00, 0x00,
];

fn test_key() -> AesKey {
    AesKey::from_hex("000102030405060708090A0B0C0D0E0F").unwrap()
}

fn golden_total(telegram: &wmbus_rs::Telegram) -> f64 {
    let key = telegram.records.find_key(Quantity::Volume, 0).unwrap();
    telegram
        .records
        .extract_double(&key)
        .unwrap()
        .unwrap()
        .in_unit(Unit::CubicMeter)
        .unwrap()
}

/// Builds a mode 5 encrypted Sontex frame around the golden volume record.
fn build_mode5_frame(key: &AesKey) -> Vec<u8> {
    let mut content = vec![0x2F, 0x2F, 0x0C, 0x13, 0x30, 0x12, 0x00, 0x00];
    pad_with_filler(&mut content);

    let link = WmBusFrame {
        length: 0x1E,
        control: 0x44,
        manufacturer: 0x4DEE,
        device_id: 0x76160190,
        version: 0x3C,
        device_type: 0x06,
        control_info: 0x7A,
        payload: Vec::new(),
    };
    let iv = mode5_iv(&link, 0x2A);
    let ciphertext = encrypt_aes_cbc(key, &content, &iv).unwrap();
    assert_eq!(ciphertext.len(), 16);

    // Short TPL header: acc 0x2A, status OK, config mode 5 with 1 block.
    let mut frame = vec![
        0x1E, 0x44, 0xEE, 0x4D, 0x90, 0x01, 0x16, 0x76, 0x3C, 0x06, 0x7A, 0x2A, 0x00, 0x10, 0x05,
    ];
    frame.extend_from_slice(&ciphertext);
    frame
}

/// Builds an ELL AES-CTR Kamstrup frame whose inner content is a plain
/// CI 0x78 volume record.
fn build_ell_frame(key: &AesKey) -> Vec<u8> {
    let session_number: u32 = (1 << 29) | 0x0012_3456; // ENC = 1
    let inner = [0x78, 0x0C, 0x13, 0x30, 0x12, 0x00, 0x00];

    let mut payload = Vec::new();
    payload.extend_from_slice(&crc16(&inner).to_le_bytes());
    payload.extend_from_slice(&inner);

    let link = WmBusFrame {
        length: 0x19,
        control: 0x44,
        manufacturer: 0x2C2D,
        device_id: 0x12345678,
        version: 0x1B,
        device_type: 0x16,
        control_info: 0x8D,
        payload: Vec::new(),
    };
    let iv = ell_iv(&link, 0x20, session_number);
    let ciphertext = apply_aes_ctr(key, &payload, &iv);

    let mut frame = vec![
        0x19, 0x44, 0x2D, 0x2C, 0x78, 0x56, 0x34, 0x12, 0x1B, 0x16, 0x8D, 0x20, 0x33,
    ];
    frame.extend_from_slice(&session_number.to_le_bytes());
    frame.extend_from_slice(&ciphertext);
    frame
}

#[test]
fn test_plaintext_telegram_end_to_end() {
    let telegram = decode_telegram(&GOLDEN_PLAIN, &KeyStore::new()).unwrap();

    assert_eq!(telegram.status, TelegramStatus::Full);
    assert_eq!(telegram.encryption, EncryptionMode::None);
    assert_eq!(telegram.device_id_string(), "76160190");
    assert_eq!(telegram.records.len(), 1);
    assert!((golden_total(&telegram) - 1.23).abs() < 1e-9);
}

#[test]
fn test_crc_attached_frame_decodes_identically() {
    let mut with_crc = GOLDEN_PLAIN.to_vec();
    let crc = crc16(&GOLDEN_PLAIN);
    with_crc.extend_from_slice(&crc.to_le_bytes());

    let telegram = decode_telegram(&with_crc, &KeyStore::new()).unwrap();
    assert!((golden_total(&telegram) - 1.23).abs() < 1e-9);
}

#[test]
fn test_hex_telegram_with_separators() {
    let telegram = decode_hex_telegram(
        "|1444EE4D90011676 3C067A2A0000000C 13301200 00|",
        &KeyStore::new(),
    )
    .unwrap();
    assert_eq!(telegram.records.len(), 1);
}

#[test]
fn test_mode5_roundtrip() {
    let key = test_key();
    let frame = build_mode5_frame(&key);

    let mut keys = KeyStore::new();
    keys.add_key("76160190", key);

    let telegram = decode_telegram(&frame, &keys).unwrap();
    assert_eq!(telegram.encryption, EncryptionMode::AesCbcIv);
    assert_eq!(telegram.status, TelegramStatus::Full);
    assert!((golden_total(&telegram) - 1.23).abs() < 1e-9);
}

#[test]
fn test_mode5_wrong_key_fails_without_partial_plaintext() {
    let frame = build_mode5_frame(&test_key());

    let mut keys = KeyStore::new();
    keys.add_key(
        "76160190",
        AesKey::from_hex("FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF").unwrap(),
    );

    match decode_telegram(&frame, &keys) {
        Err(WmBusError::Crypto(CryptoError::DecryptionFailed { .. })) => {}
        other => panic!("expected DecryptionFailed, got {other:?}"),
    }
}

#[test]
fn test_mode5_missing_key_names_the_device() {
    let frame = build_mode5_frame(&test_key());

    match decode_telegram(&frame, &KeyStore::new()) {
        Err(WmBusError::Crypto(CryptoError::MissingKey { device })) => {
            assert_eq!(device, "76160190");
        }
        other => panic!("expected MissingKey, got {other:?}"),
    }
}

#[test]
fn test_wrong_length_key_rejected_at_construction() {
    match AesKey::from_bytes(&[0u8; 8]) {
        Err(CryptoError::InvalidKeyLength { expected, actual }) => {
            assert_eq!(expected, 16);
            assert_eq!(actual, 8);
        }
        other => panic!("expected InvalidKeyLength, got {other:?}"),
    }
}

#[test]
fn test_mode7_zero_iv_roundtrip() {
    let key = test_key();
    let mut content = vec![0x2F, 0x2F, 0x0C, 0x13, 0x30, 0x12, 0x00, 0x00];
    pad_with_filler(&mut content);
    let ciphertext = encrypt_aes_cbc(&key, &content, &[0u8; 16]).unwrap();

    // Config word 0x0710: security mode 7, one encrypted block.
    let mut frame = vec![
        0x1E, 0x44, 0xEE, 0x4D, 0x90, 0x01, 0x16, 0x76, 0x3C, 0x06, 0x7A, 0x2A, 0x00, 0x10, 0x07,
    ];
    frame.extend_from_slice(&ciphertext);

    let mut keys = KeyStore::new();
    keys.add_key("76160190", key);

    let telegram = decode_telegram(&frame, &keys).unwrap();
    assert_eq!(telegram.encryption, EncryptionMode::AesCbcNoIv);
    assert!((golden_total(&telegram) - 1.23).abs() < 1e-9);
}

#[test]
fn test_long_tpl_address_overrides_link_address() {
    let key = test_key();

    // The link layer names the repeater; the long TPL header names the
    // originating Sontex meter. Key selection and the IV both follow the
    // TPL address.
    let mut content = vec![0x2F, 0x2F, 0x0C, 0x13, 0x30, 0x12, 0x00, 0x00];
    pad_with_filler(&mut content);

    let originator = WmBusFrame {
        length: 0x26,
        control: 0x44,
        manufacturer: 0x4DEE,
        device_id: 0x76160190,
        version: 0x3C,
        device_type: 0x06,
        control_info: 0x72,
        payload: Vec::new(),
    };
    let iv = mode5_iv(&originator, 0x2A);
    let ciphertext = encrypt_aes_cbc(&key, &content, &iv).unwrap();

    // Link address 99999999 / AAA, CI 0x72, then the 12-byte TPL header:
    // originator id, manufacturer, version, type, acc, status, config.
    let mut frame = vec![
        0x26, 0x44, 0x21, 0x04, 0x99, 0x99, 0x99, 0x99, 0x01, 0x00, 0x72,
    ];
    frame.extend_from_slice(&[0x90, 0x01, 0x16, 0x76, 0xEE, 0x4D, 0x3C, 0x06]);
    frame.extend_from_slice(&[0x2A, 0x00, 0x10, 0x05]);
    frame.extend_from_slice(&ciphertext);

    // The key is registered under the originator, not the link address.
    let mut keys = KeyStore::new();
    keys.add_key("76160190", key);

    let mut telegram = decode_telegram(&frame, &keys).unwrap();
    assert_eq!(telegram.encryption, EncryptionMode::AesCbcIv);
    let address = telegram.tpl.as_ref().unwrap().address.unwrap();
    assert_eq!(address.device_id, 0x76160190);
    assert_eq!(address.manufacturer, 0x4DEE);
    assert!((golden_total(&telegram) - 1.23).abs() < 1e-9);

    let report = telegram.explanation_report();
    assert!(report.contains("tpl-id (76160190)"), "{report}");
    assert!(report.contains("tpl-mfct (SON, Sontex SA)"), "{report}");

    // Dispatch matches on the TPL address as well.
    let registry = MeterRegistry::with_builtin_drivers();
    let reading = registry.dispatch(&mut telegram).unwrap();
    assert_eq!(reading.driver, "supercom587");
    assert_eq!(reading.device_id, "76160190");
}

#[test]
fn test_ell_ctr_roundtrip() {
    let key = test_key();
    let frame = build_ell_frame(&key);

    let mut keys = KeyStore::new();
    keys.add_key("12345678", key);

    let telegram = decode_telegram(&frame, &keys).unwrap();
    assert_eq!(telegram.encryption, EncryptionMode::AesCtr);
    let ell = telegram.ell.as_ref().unwrap();
    assert_eq!(ell.security_mode(), 1);
    assert_eq!(telegram.records.len(), 1);
    assert!((golden_total(&telegram) - 1.23).abs() < 1e-9);
}

#[test]
fn test_ell_wrong_key_fails_payload_crc() {
    let frame = build_ell_frame(&test_key());

    let mut keys = KeyStore::new();
    keys.add_key(
        "12345678",
        AesKey::from_hex("FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF").unwrap(),
    );

    match decode_telegram(&frame, &keys) {
        Err(WmBusError::Crypto(CryptoError::DecryptionFailed { .. })) => {}
        other => panic!("expected DecryptionFailed, got {other:?}"),
    }
}

#[test]
fn test_truncated_telegram_keeps_complete_records() {
    // Volume record followed by a flow record missing its last byte.
    let frame = [
        0x17, 0x44, 0xEE, 0x4D, 0x90, 0x01, 0x16, 0x76, 0x3C, 0x06, 0x7A, 0x2A, 0x00, 0x00, 0x00,
        0x0C, 0x13, 0x30, 0x12, 0x00, 0x00, 0x02, 0x3B, 0xAA,
    ];

    let telegram = decode_telegram(&frame, &KeyStore::new()).unwrap();
    assert_eq!(telegram.status, TelegramStatus::Partial);
    assert!(telegram.is_partial());
    assert!(telegram.parse_error.is_some());
    assert_eq!(telegram.records.len(), 1);
    assert!((golden_total(&telegram) - 1.23).abs() < 1e-9);
}

#[test]
fn test_explanation_report_reads_like_a_dump() {
    let telegram = decode_telegram(&GOLDEN_PLAIN, &KeyStore::new()).unwrap();
    let report = telegram.explanation_report();

    assert!(report.contains("length (20 bytes)"), "{report}");
    assert!(report.contains("manufacturer (SON, Sontex SA)"), "{report}");
    assert!(report.contains("device id (76160190)"), "{report}");
    assert!(report.contains("ci-field"), "{report}");
    assert!(report.contains("tpl-status (OK)"), "{report}");

    // Offsets ascend line by line.
    let offsets: Vec<usize> = report
        .lines()
        .map(|line| line[..3].parse().unwrap())
        .collect();
    let mut sorted = offsets.clone();
    sorted.sort_unstable();
    assert_eq!(offsets, sorted);
}
