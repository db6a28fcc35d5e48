//! Meter driver registry and dispatch.
//!
//! Every supported meter model is a [`DriverSpec`]: a declarative claim on
//! a manufacturer and a set of device types, plus the fields the driver
//! publishes. [`MeterRegistry`] scans the registered specs in order and
//! hands the telegram to the first one that claims it; the driver's field
//! extractors then pull values out of the record index and the dispatch
//! returns a fresh immutable [`MeterReading`]. Drivers keep no mutable
//! state of their own, so concurrent decodes of telegrams from the same
//! meter never race.
//!
//! The registry is built once at startup, normally via
//! [`MeterRegistry::with_builtin_drivers`], and is read-locked for the
//! duration of each dispatch.

pub mod iperl;
pub mod manufacturer;
pub mod multical21;
pub mod supercom587;

use std::sync::{Arc, RwLock};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

use crate::error::WmBusError;
use crate::payload::data_encoding::format_device_id;
use crate::telegram::{media_name, DispatchState, LinkMode, Telegram};
use crate::units::{assert_quantity, convert, Quantity, Unit, UnitError};
use crate::wmbus::crypto::EncryptionMode;

/// Pulls one field's value out of a telegram. Returning `Ok(None)` means
/// the meter did not report the quantity; the field is skipped, not an
/// error.
pub type FieldExtractor = fn(&mut Telegram) -> Result<Option<FieldValue>, WmBusError>;

/// A decoded field value, tagged with how to print it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Numeric { value: f64, unit: Unit },
    Timestamp(NaiveDateTime),
    Text(String),
}

impl FieldValue {
    /// The quantity family this value belongs to.
    pub fn quantity(&self) -> Quantity {
        match self {
            FieldValue::Numeric { unit, .. } => unit.quantity(),
            FieldValue::Timestamp(_) => Quantity::PointInTime,
            FieldValue::Text(_) => Quantity::Text,
        }
    }
}

/// One named quantity a driver publishes.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub quantity: Quantity,
    pub unit: Unit,
    pub description: &'static str,
    pub extract: FieldExtractor,
}

/// Declarative description of one meter model: which telegrams it claims
/// and which fields it publishes.
#[derive(Debug, Clone)]
pub struct DriverSpec {
    pub name: &'static str,
    /// FLAG manufacturer id this driver claims.
    pub manufacturer: u16,
    /// Device type bytes this driver accepts.
    pub media: &'static [u8],
    /// Firmware version the driver was written against. A mismatch is
    /// logged and recorded, never fatal; vendors ship silent revisions.
    pub expected_version: Option<u8>,
    /// Radio mode this meter model transmits on.
    pub link_mode: LinkMode,
    /// Encryption scheme the model normally applies.
    pub encryption_mode: EncryptionMode,
    pub fields: Vec<FieldSpec>,
}

impl DriverSpec {
    fn claims(&self, manufacturer: u16, device_type: u8) -> bool {
        self.manufacturer == manufacturer && self.media.contains(&device_type)
    }
}

/// One field of a [`MeterReading`], in driver declaration order.
#[derive(Debug, Clone, Serialize)]
pub struct FieldReading {
    pub name: &'static str,
    pub description: &'static str,
    pub value: FieldValue,
}

/// The immutable result of dispatching one telegram.
#[derive(Debug, Clone, Serialize)]
pub struct MeterReading {
    /// Name of the driver that processed the telegram.
    pub driver: &'static str,
    /// Device id as printed on the meter.
    pub device_id: String,
    /// Three-letter FLAG code of the sender.
    pub manufacturer: String,
    /// Human-readable device type.
    pub media: String,
    /// When this reading was decoded.
    pub timestamp: DateTime<Utc>,
    /// Extracted fields, in the order the driver declares them.
    pub values: Vec<FieldReading>,
    /// Anything unusual seen during dispatch: version drift, truncated
    /// content, fields that failed to decode.
    pub diagnostics: Vec<String>,
    /// True when the telegram's record parse stopped early.
    pub partial: bool,
}

impl MeterReading {
    /// The field registered under `name`, if the meter reported it.
    pub fn field(&self, name: &str) -> Option<&FieldReading> {
        self.values.iter().find(|field| field.name == name)
    }

    /// Whether any extracted field carries the given quantity.
    pub fn has_value(&self, quantity: Quantity) -> bool {
        self.values
            .iter()
            .any(|field| field.value.quantity() == quantity)
    }

    /// The first value of `quantity` in declaration order, converted to
    /// `unit`. Callers gate on [`has_value`](Self::has_value); asking for
    /// a quantity the reading does not carry is an error.
    pub fn value(&self, quantity: Quantity, unit: Unit) -> Result<f64, UnitError> {
        assert_quantity(unit, quantity)?;
        for field in &self.values {
            if let FieldValue::Numeric { value, unit: from } = &field.value {
                if from.quantity() == quantity {
                    return convert(*value, *from, unit);
                }
            }
        }
        Err(UnitError::NotAvailable(quantity))
    }
}

/// Registry of meter drivers. Cloning shares the underlying list.
#[derive(Default, Clone)]
pub struct MeterRegistry {
    inner: Arc<RwLock<Vec<DriverSpec>>>,
}

impl MeterRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with every driver this crate ships.
    pub fn with_builtin_drivers() -> Self {
        let registry = Self::new();
        registry.register(supercom587::driver());
        registry.register(multical21::driver());
        registry.register(iperl::driver());
        registry
    }

    /// Appends a driver. Registration order is the dispatch tie-break:
    /// when two drivers claim the same telegram, the earlier one wins.
    pub fn register(&self, spec: DriverSpec) {
        self.inner.write().unwrap().push(spec);
    }

    /// Names of all registered drivers, in registration order.
    pub fn registered_drivers(&self) -> Vec<&'static str> {
        self.inner.read().unwrap().iter().map(|d| d.name).collect()
    }

    /// Matches the telegram to a driver and runs the driver's field
    /// extractors over it.
    ///
    /// The telegram moves `Unmatched` → `Matched` → `Processed`; a
    /// telegram no driver claims stays `Unmatched` and the dispatch ends
    /// with [`WmBusError::UnknownMeter`]. A single failing field is
    /// recorded in the reading's diagnostics and skipped, it never fails
    /// the dispatch.
    pub fn dispatch(&self, telegram: &mut Telegram) -> Result<MeterReading, WmBusError> {
        // The long TPL header names the true sender when the telegram
        // travelled through a repeater; match on that over the link
        // address.
        let address = telegram.tpl.as_ref().and_then(|tpl| tpl.address);
        let (manufacturer, device_id, version, device_type) = match address {
            Some(addr) => (
                addr.manufacturer,
                addr.device_id,
                addr.version,
                addr.device_type,
            ),
            None => (
                telegram.frame.manufacturer,
                telegram.frame.device_id,
                telegram.frame.version,
                telegram.frame.device_type,
            ),
        };
        let device = format_device_id(device_id);

        let drivers = self.inner.read().unwrap();
        let spec = match drivers
            .iter()
            .find(|spec| spec.claims(manufacturer, device_type))
        {
            Some(spec) => spec,
            None => {
                let flag = manufacturer::flag_string(manufacturer);
                log::warn!(
                    "no driver for telegram from {device}: manufacturer 0x{manufacturer:04X} \
                     ({flag}), device type 0x{device_type:02X}, version 0x{version:02X}"
                );
                return Err(WmBusError::UnknownMeter {
                    manufacturer,
                    flag,
                    device_type,
                    version,
                });
            }
        };
        telegram.dispatch = DispatchState::Matched;

        let mut diagnostics = Vec::new();

        if let Some(expected) = spec.expected_version {
            if expected != version {
                log::info!(
                    "driver {} matched {device} with version 0x{version:02X} where \
                     0x{expected:02X} was expected, decoding leniently",
                    spec.name
                );
                diagnostics.push(format!(
                    "version 0x{version:02X} differs from expected 0x{expected:02X}"
                ));
            }
        }
        if spec.encryption_mode.is_encrypted() && !telegram.encryption.is_encrypted() {
            log::debug!(
                "driver {} expects {:?} but the telegram from {device} was plaintext",
                spec.name,
                spec.encryption_mode
            );
        }
        if telegram.link_mode != LinkMode::Any && telegram.link_mode != spec.link_mode {
            log::debug!(
                "telegram from {device} arrived on {:?}, driver {} declares {:?}",
                telegram.link_mode,
                spec.name,
                spec.link_mode
            );
        }
        if telegram.is_partial() {
            let note = match &telegram.parse_error {
                Some(err) => format!("partial content: {err}"),
                None => "partial content".to_string(),
            };
            diagnostics.push(note);
        }
        if let Some(tpl) = &telegram.tpl {
            if !tpl.status.is_empty() {
                diagnostics.push(format!("meter status: {}", tpl.status.describe()));
            }
        }

        let mut values = Vec::new();
        for field in &spec.fields {
            match (field.extract)(telegram) {
                Ok(Some(value)) => values.push(FieldReading {
                    name: field.name,
                    description: field.description,
                    value,
                }),
                Ok(None) => {}
                Err(err) => {
                    log::warn!(
                        "driver {}: field {} of telegram from {device} failed: {err}",
                        spec.name,
                        field.name
                    );
                    diagnostics.push(format!("{}: {err}", field.name));
                }
            }
        }
        telegram.dispatch = DispatchState::Processed;

        Ok(MeterReading {
            driver: spec.name,
            device_id: device,
            manufacturer: manufacturer::flag_string(manufacturer),
            media: media_name(device_type).to_string(),
            timestamp: Utc::now(),
            values,
            diagnostics,
            partial: telegram.is_partial(),
        })
    }
}
