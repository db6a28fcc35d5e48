//! Sensus iPerl water meter.
//!
//! Media 0x06 or 0x07, firmware version 0x68, T1 with mode 5 AES-CBC.
//! Publishes the total consumption and the maximum flow seen since the
//! last reset.

use crate::error::WmBusError;
use crate::meters::{DriverSpec, FieldSpec, FieldValue};
use crate::telegram::{LinkMode, Telegram};
use crate::units::{Quantity, Unit};
use crate::wmbus::crypto::EncryptionMode;

/// FLAG id for "SEN".
const SENSUS: u16 = 0x4CAE;

pub fn driver() -> DriverSpec {
    DriverSpec {
        name: "iperl",
        manufacturer: SENSUS,
        media: &[0x06, 0x07],
        expected_version: Some(0x68),
        link_mode: LinkMode::T1,
        encryption_mode: EncryptionMode::AesCbcIv,
        fields: vec![
            FieldSpec {
                name: "total",
                quantity: Quantity::Volume,
                unit: Unit::CubicMeter,
                description: "The total water consumption recorded by this meter.",
                extract: total_consumption,
            },
            FieldSpec {
                name: "max_flow",
                quantity: Quantity::Flow,
                unit: Unit::CubicMeterPerHour,
                description: "The maximum flow recorded during the reporting period.",
                extract: max_flow,
            },
        ],
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

fn max_flow(telegram: &mut Telegram) -> Result<Option<FieldValue>, WmBusError> {
    let key = match telegram.records.find_key(Quantity::Flow, 0) {
        Some(key) => key,
        None => return Ok(None),
    };
    let flow = match telegram.records.extract_double(&key)? {
        Some(value) => value,
        None => return Ok(None),
    };
    let m3h = flow.in_unit(Unit::CubicMeterPerHour)?;
    telegram.add_record_explanation(flow.offset, format!("max flow ({m3h:.3} m3/h)"));
    Ok(Some(FieldValue::Numeric {
        value: m3h,
        unit: Unit::CubicMeterPerHour,
    }))
}
