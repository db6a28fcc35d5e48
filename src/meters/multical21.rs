//! Kamstrup Multical 21 water meter.
//!
//! Media 0x16 (cold water) or 0x06, firmware version 0x1B. Transmits on
//! C1 with an extended link layer and AES-CTR payload encryption.
//! Publishes the consumption registers and both temperature sensors.

use crate::error::WmBusError;
use crate::meters::{DriverSpec, FieldSpec, FieldValue};
use crate::telegram::{LinkMode, Telegram};
use crate::units::{Quantity, Unit};
use crate::wmbus::crypto::EncryptionMode;

/// FLAG id for "KAM".
const KAMSTRUP: u16 = 0x2C2D;

pub fn driver() -> DriverSpec {
    DriverSpec {
        name: "multical21",
        manufacturer: KAMSTRUP,
        media: &[0x16, 0x06],
        expected_version: Some(0x1B),
        link_mode: LinkMode::C1,
        encryption_mode: EncryptionMode::AesCtr,
        fields: vec![
            FieldSpec {
                name: "total",
                quantity: Quantity::Volume,
                unit: Unit::CubicMeter,
                description: "The total water consumption recorded by this meter.",
                extract: total_consumption,
            },
            FieldSpec {
                name: "target",
                quantity: Quantity::Volume,
                unit: Unit::CubicMeter,
                description: "The total water consumption at the most recent billing date.",
                extract: target_consumption,
            },
            FieldSpec {
                name: "flow_temperature",
                quantity: Quantity::Temperature,
                unit: Unit::Celsius,
                description: "The water temperature measured in the flow tube.",
                extract: flow_temperature,
            },
            FieldSpec {
                name: "external_temperature",
                quantity: Quantity::Temperature,
                unit: Unit::Celsius,
                description: "The ambient temperature around the meter.",
                extract: external_temperature,
            },
        ],
    }
}

fn total_consumption(telegram: &mut Telegram) -> Result<Option<FieldValue>, WmBusError> {
    let key = match telegram.records.find_storage_key(Quantity::Volume, 0, 0) {
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

/// Consumption frozen at the billing date, reported under storage 1.
fn target_consumption(telegram: &mut Telegram) -> Result<Option<FieldValue>, WmBusError> {
    let key = match telegram.records.find_storage_key(Quantity::Volume, 1, 0) {
        Some(key) => key,
        None => return Ok(None),
    };
    let target = match telegram.records.extract_double(&key)? {
        Some(value) => value,
        None => return Ok(None),
    };
    let m3 = target.in_unit(Unit::CubicMeter)?;
    telegram.add_record_explanation(target.offset, format!("target consumption ({m3:.3} m3)"));
    Ok(Some(FieldValue::Numeric {
        value: m3,
        unit: Unit::CubicMeter,
    }))
}

// The meter reports the flow sensor before the ambient sensor, so the
// two temperature records are told apart by occurrence.

fn flow_temperature(telegram: &mut Telegram) -> Result<Option<FieldValue>, WmBusError> {
    temperature(telegram, 0, "flow temperature")
}

fn external_temperature(telegram: &mut Telegram) -> Result<Option<FieldValue>, WmBusError> {
    temperature(telegram, 1, "external temperature")
}

fn temperature(
    telegram: &mut Telegram,
    nth: usize,
    label: &str,
) -> Result<Option<FieldValue>, WmBusError> {
    let key = match telegram.records.find_key(Quantity::Temperature, nth) {
        Some(key) => key,
        None => return Ok(None),
    };
    let reading = match telegram.records.extract_double(&key)? {
        Some(value) => value,
        None => return Ok(None),
    };
    let celsius = reading.in_unit(Unit::Celsius)?;
    telegram.add_record_explanation(reading.offset, format!("{label} ({celsius:.1} C)"));
    Ok(Some(FieldValue::Numeric {
        value: celsius,
        unit: Unit::Celsius,
    }))
}
