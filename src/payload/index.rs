//! Key-value access to parsed data records.
//!
//! Drivers rarely care about record positions; they ask for "the second
//! volume register" or "the record with key 0c13". [`RecordIndex`] keeps
//! the parse-ordered records and answers those questions
//! deterministically. Two records may share the same DIB/VIB hex key
//! (same register reported twice); they are told apart by an occurrence
//! counter instead of one overwriting the other.

use std::collections::HashMap;

use crate::error::WmBusError;
use crate::payload::record::{DecodedValue, DvRecord};
use crate::units::{convert, Quantity, Unit, UnitError};

/// Addresses one record: the DIB/VIB hex key plus which occurrence of
/// that key, for telegrams that repeat a register.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DvKey {
    pub hex: String,
    pub occurrence: usize,
}

impl DvKey {
    pub fn new(hex: impl Into<String>) -> Self {
        DvKey {
            hex: hex.into(),
            occurrence: 0,
        }
    }
}

/// A numeric value pulled out of a record, still in the unit the VIF
/// table assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct DoubleValue {
    pub value: f64,
    pub unit: Unit,
    pub quantity: Quantity,
    /// Offset of the source record inside the telegram content.
    pub offset: usize,
}

impl DoubleValue {
    /// The value converted into `unit`.
    pub fn in_unit(&self, unit: Unit) -> Result<f64, UnitError> {
        convert(self.value, self.unit, unit)
    }
}

/// Parse-ordered records with key lookup.
#[derive(Debug, Default, Clone)]
pub struct RecordIndex {
    records: Vec<DvRecord>,
    by_hex: HashMap<String, Vec<usize>>,
}

impl RecordIndex {
    pub fn new(records: Vec<DvRecord>) -> Self {
        let mut by_hex: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, record) in records.iter().enumerate() {
            by_hex.entry(record.key()).or_default().push(i);
        }
        RecordIndex { records, by_hex }
    }

    pub fn records(&self) -> &[DvRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Finds the nth record (0-based, parse order) whose resolved VIF
    /// quantity matches. Absence is an answer, not an error.
    pub fn find_key(&self, quantity: Quantity, nth: usize) -> Option<DvKey> {
        self.matching_keys(quantity, None).nth(nth)
    }

    /// Like [`find_key`](Self::find_key) but only considers records with
    /// the given storage number, so current values (storage 0) can be
    /// told apart from historical ones.
    pub fn find_storage_key(
        &self,
        quantity: Quantity,
        storage_number: u32,
        nth: usize,
    ) -> Option<DvKey> {
        self.matching_keys(quantity, Some(storage_number)).nth(nth)
    }

    fn matching_keys<'a>(
        &'a self,
        quantity: Quantity,
        storage_number: Option<u32>,
    ) -> impl Iterator<Item = DvKey> + 'a {
        let mut seen: HashMap<String, usize> = HashMap::new();
        self.records.iter().filter_map(move |record| {
            let hex = record.key();
            let occurrence = seen.entry(hex.clone()).or_insert(0);
            let key = DvKey {
                hex,
                occurrence: *occurrence,
            };
            *occurrence += 1;

            let matches_quantity = record
                .vif_info()
                .map(|info| info.quantity == quantity)
                .unwrap_or(false);
            let matches_storage =
                storage_number.map_or(true, |wanted| record.storage_number() == wanted);
            (matches_quantity && matches_storage).then_some(key)
        })
    }

    /// The record behind a key, if present.
    pub fn record(&self, key: &DvKey) -> Option<&DvRecord> {
        self.by_hex
            .get(&key.hex)
            .and_then(|positions| positions.get(key.occurrence))
            .map(|&i| &self.records[i])
    }

    /// Decodes the record behind `key` as a number.
    ///
    /// `Ok(None)` when the key is absent or the record is not numeric;
    /// `Err` only when the record exists but its bytes are broken.
    pub fn extract_double(&self, key: &DvKey) -> Result<Option<DoubleValue>, WmBusError> {
        let record = match self.record(key) {
            Some(record) => record,
            None => return Ok(None),
        };
        match record.decode()? {
            DecodedValue::Numeric {
                value,
                unit,
                quantity,
            } => Ok(Some(DoubleValue {
                value,
                unit,
                quantity,
                offset: record.offset,
            })),
            _ => Ok(None),
        }
    }

    /// Decodes the record behind `key` as a point in time. Type G dates
    /// come back as midnight.
    pub fn extract_datetime(
        &self,
        key: &DvKey,
    ) -> Result<Option<(chrono::NaiveDateTime, usize)>, WmBusError> {
        let record = match self.record(key) {
            Some(record) => record,
            None => return Ok(None),
        };
        match record.decode()? {
            DecodedValue::DateTime(dt) => Ok(Some((dt, record.offset))),
            DecodedValue::Date(d) => {
                let midnight = d.and_hms_opt(0, 0, 0).ok_or_else(|| {
                    WmBusError::InvalidDate(format!("cannot anchor date {d} to midnight"))
                })?;
                Ok(Some((midnight, record.offset)))
            }
            _ => Ok(None),
        }
    }

    /// Decodes the record behind `key` as text.
    pub fn extract_text(&self, key: &DvKey) -> Result<Option<(String, usize)>, WmBusError> {
        let record = match self.record(key) {
            Some(record) => record,
            None => return Ok(None),
        };
        match record.decode()? {
            DecodedValue::Text(s) => Ok(Some((s, record.offset))),
            _ => Ok(None),
        }
    }
}
