//! Sontex Supercom 587 water meter.
//!
//! Media 0x06 (warm water) and 0x07 (water), firmware version 0x3C,
//! transmitting on T1 with mode 5 AES-CBC. Publishes the total water
//! consumption register.

use crate::error::WmBusError;
use crate::meters::{DriverSpec, FieldSpec, FieldValue};
use crate::telegram::{LinkMode, Telegram};
use crate::units::{Quantity, Unit};
use crate::wmbus::crypto::EncryptionMode;

/// FLAG id for "SON".
const SONTEX: u16 = 0x4DEE;

pub fn driver() -> DriverSpec {
    DriverSpec {
        name: "supercom587",
        manufacturer: SONTEX,
        media: &[0x06, 0x07],
        expected_version: Some(0x3C),
        link_mode: LinkMode::T1,
        encryption_mode: EncryptionMode::AesCbcIv,
        fields: vec![FieldSpec {
            name: "total",
            quantity: Quantity::Volume,
            unit: Unit::CubicMeter,
            description: "The total water consumption recorded by this meter.",
            extract: total_consumption,
        }],
    }
}

fn total_consumption(telegram: &mut Telegram) -> Result<Option<FieldValue>, WmBusError> {
    let key = match telegram.records.find_key(Quantity::Volume, 0) {
        Some(key) => key,
        None => return Ok(None),
    };
    let total = match telegram.records.extract_double(&key)? {
        Some(value) => value,
        None => return Ok(None),
    };
    let m3 = total.in_unit(Unit::CubicMeter)?;
    telegram.add_record_explanation(total.offset, format!("total consumption ({m3:.3} m3)"));
    Ok(Some(FieldValue::Numeric {
        value: m3,
        unit: Unit::CubicMeter,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyStore;
    use crate::meters::MeterRegistry;

    fn registry() -> MeterRegistry {
        let registry = MeterRegistry::new();
        registry.register(driver());
        registry
    }

    #[test]
    fn test_decodes_total_consumption() {
        // 8 digit BCD register 00001230, VIF 0x13 scales by 1e-3.
        let frame = [
            0x14, 0x44, 0xEE, 0x4D, 0x90, 0x01, 0x16, 0x76, 0x3C, 0x06, 0x7A, 0x2A, 0x00, 0x00,
            0x00, 0x0C, 0x13, 0x30, 0x12, 0x00, 0x00,
        ];
        let mut telegram = Telegram::decode(&frame, &KeyStore::new()).unwrap();
        let reading = registry().dispatch(&mut telegram).unwrap();

        assert_eq!(reading.driver, "supercom587");
        let total = reading.value(Quantity::Volume, Unit::CubicMeter).unwrap();
        assert!((total - 1.23).abs() < 1e-9);

        let report = telegram.explanation_report();
        assert!(report.contains("total consumption (1.230 m3)"), "{report}");
    }

    #[test]
    fn test_missing_volume_is_skipped() {
        // Only an external temperature record; no volume register at all.
        let frame = [
            0x0E, 0x44, 0xEE, 0x4D, 0x90, 0x01, 0x16, 0x76, 0x3C, 0x06, 0x78, 0x02, 0x65, 0xE6,
            0x08,
        ];
        let mut telegram = Telegram::decode(&frame, &KeyStore::new()).unwrap();
        let reading = registry().dispatch(&mut telegram).unwrap();

        assert!(reading.field("total").is_none());
        assert!(!reading.has_value(Quantity::Volume));
        assert!(reading.diagnostics.is_empty());
    }
}
