//! Physical quantities and unit conversion for decoded meter values.
//!
//! Every decoded record carries a [`Unit`], and every unit belongs to exactly
//! one [`Quantity`] family. [`convert`] translates values inside a family;
//! asking it to cross families is an error, never a silent pass-through.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by unit conversion and quantity assertions.
#[derive(Debug, Error, PartialEq)]
pub enum UnitError {
    /// The two units measure different quantities.
    #[error("Cannot convert {from} to {to}: {} is not {}", .from.quantity(), .to.quantity())]
    UnitMismatch { from: Unit, to: Unit },

    /// A value of one quantity was requested in a unit of another.
    #[error("Requested {requested} but the field carries {actual}")]
    QuantityMismatch {
        requested: Quantity,
        actual: Quantity,
    },

    /// The reading carries no value of the requested quantity.
    #[error("No {0} value available")]
    NotAvailable(Quantity),
}

/// The physical quantity a value measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quantity {
    Energy,
    Volume,
    Mass,
    Power,
    Flow,
    MassFlow,
    Temperature,
    Pressure,
    Voltage,
    Amperage,
    Time,
    PointInTime,
    Hca,
    Text,
    Dimensionless,
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Quantity::Energy => "energy",
            Quantity::Volume => "volume",
            Quantity::Mass => "mass",
            Quantity::Power => "power",
            Quantity::Flow => "flow",
            Quantity::MassFlow => "mass flow",
            Quantity::Temperature => "temperature",
            Quantity::Pressure => "pressure",
            Quantity::Voltage => "voltage",
            Quantity::Amperage => "amperage",
            Quantity::Time => "time",
            Quantity::PointInTime => "point in time",
            Quantity::Hca => "heat cost allocation",
            Quantity::Text => "text",
            Quantity::Dimensionless => "dimensionless",
        };
        write!(f, "{name}")
    }
}

/// A concrete measurement unit. The variants form closed conversion
/// families, one per [`Quantity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    // Energy
    KilowattHour,
    Megajoule,
    Gigajoule,
    // Volume
    CubicMeter,
    Litre,
    CubicFeet,
    // Mass
    Kilogram,
    Tonne,
    // Power
    Watt,
    Kilowatt,
    JoulePerHour,
    // Flow
    CubicMeterPerHour,
    LitrePerHour,
    // Mass flow
    KilogramPerHour,
    // Temperature
    Celsius,
    Fahrenheit,
    Kelvin,
    // Pressure
    Bar,
    Millibar,
    // Electrical
    Volt,
    Ampere,
    // Time
    Second,
    Minute,
    Hour,
    Day,
    // Point in time (dates carry no scale factor)
    DateTime,
    Date,
    // Counters and allocators
    HcaUnit,
    Counter,
}

impl Unit {
    /// The quantity family this unit belongs to.
    pub fn quantity(&self) -> Quantity {
        match self {
            Unit::KilowattHour | Unit::Megajoule | Unit::Gigajoule => Quantity::Energy,
            Unit::CubicMeter | Unit::Litre | Unit::CubicFeet => Quantity::Volume,
            Unit::Kilogram | Unit::Tonne => Quantity::Mass,
            Unit::Watt | Unit::Kilowatt | Unit::JoulePerHour => Quantity::Power,
            Unit::CubicMeterPerHour | Unit::LitrePerHour => Quantity::Flow,
            Unit::KilogramPerHour => Quantity::MassFlow,
            Unit::Celsius | Unit::Fahrenheit | Unit::Kelvin => Quantity::Temperature,
            Unit::Bar | Unit::Millibar => Quantity::Pressure,
            Unit::Volt => Quantity::Voltage,
            Unit::Ampere => Quantity::Amperage,
            Unit::Second | Unit::Minute | Unit::Hour | Unit::Day => Quantity::Time,
            Unit::DateTime | Unit::Date => Quantity::PointInTime,
            Unit::HcaUnit => Quantity::Hca,
            Unit::Counter => Quantity::Dimensionless,
        }
    }

    /// Conventional short symbol, as printed in explanations.
    pub fn symbol(&self) -> &'static str {
        match self {
            Unit::KilowattHour => "kWh",
            Unit::Megajoule => "MJ",
            Unit::Gigajoule => "GJ",
            Unit::CubicMeter => "m3",
            Unit::Litre => "l",
            Unit::CubicFeet => "ft3",
            Unit::Kilogram => "kg",
            Unit::Tonne => "t",
            Unit::Watt => "W",
            Unit::Kilowatt => "kW",
            Unit::JoulePerHour => "J/h",
            Unit::CubicMeterPerHour => "m3/h",
            Unit::LitrePerHour => "l/h",
            Unit::KilogramPerHour => "kg/h",
            Unit::Celsius => "C",
            Unit::Fahrenheit => "F",
            Unit::Kelvin => "K",
            Unit::Bar => "bar",
            Unit::Millibar => "mbar",
            Unit::Volt => "V",
            Unit::Ampere => "A",
            Unit::Second => "s",
            Unit::Minute => "min",
            Unit::Hour => "h",
            Unit::Day => "d",
            Unit::DateTime => "datetime",
            Unit::Date => "date",
            Unit::HcaUnit => "hca",
            Unit::Counter => "counter",
        }
    }

    /// Factor into the family's base unit (kWh, m3, kg, kW, m3/h, bar, s).
    /// Temperature is affine and handled separately in [`convert`].
    fn base_factor(&self) -> f64 {
        match self {
            Unit::KilowattHour => 1.0,
            Unit::Megajoule => 1.0 / 3.6,
            Unit::Gigajoule => 1000.0 / 3.6,
            Unit::CubicMeter => 1.0,
            Unit::Litre => 0.001,
            Unit::CubicFeet => 0.028316846592,
            Unit::Kilogram => 1.0,
            Unit::Tonne => 1000.0,
            Unit::Watt => 0.001,
            Unit::Kilowatt => 1.0,
            Unit::JoulePerHour => 1.0 / 3_600_000.0,
            Unit::CubicMeterPerHour => 1.0,
            Unit::LitrePerHour => 0.001,
            Unit::Bar => 1.0,
            Unit::Millibar => 0.001,
            Unit::Second => 1.0,
            Unit::Minute => 60.0,
            Unit::Hour => 3600.0,
            Unit::Day => 86400.0,
            _ => 1.0,
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

fn to_kelvin(value: f64, unit: Unit) -> f64 {
    match unit {
        Unit::Celsius => value + 273.15,
        Unit::Fahrenheit => (value - 32.0) * 5.0 / 9.0 + 273.15,
        _ => value,
    }
}

fn from_kelvin(value: f64, unit: Unit) -> f64 {
    match unit {
        Unit::Celsius => value - 273.15,
        Unit::Fahrenheit => (value - 273.15) * 9.0 / 5.0 + 32.0,
        _ => value,
    }
}

/// Converts `value` from one unit to another inside the same quantity
/// family. Conversion across families fails with
/// [`UnitError::UnitMismatch`].
pub fn convert(value: f64, from: Unit, to: Unit) -> Result<f64, UnitError> {
    if from == to {
        return Ok(value);
    }
    if from.quantity() != to.quantity() {
        return Err(UnitError::UnitMismatch { from, to });
    }
    if from.quantity() == Quantity::Temperature {
        return Ok(from_kelvin(to_kelvin(value, from), to));
    }
    Ok(value * from.base_factor() / to.base_factor())
}

/// Checks that a unit measures the expected quantity, as drivers do before
/// handing a value out in a caller-chosen unit.
pub fn assert_quantity(unit: Unit, expected: Quantity) -> Result<(), UnitError> {
    if unit.quantity() == expected {
        Ok(())
    } else {
        Err(UnitError::QuantityMismatch {
            requested: expected,
            actual: unit.quantity(),
        })
    }
}
