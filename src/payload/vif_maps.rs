//! VIF/VIFE Mapping Tables and Lookup Functions
//!
//! Lookup tables for wM-Bus Value Information Fields (VIF) and their FD/FB
//! extension sets as defined in EN 13757-3. Each entry maps a code to the
//! unit the raw value is scaled into, the power-of-ten scale factor, the
//! quantity family and a readable name. Adding a vendor code means
//! appending one table line.
//!
//! Codes not listed here (reserved ranges, readout wildcards) resolve to
//! `None`; the record parser keeps such records raw instead of guessing.

use crate::payload::vif::VifInfo;
use crate::units::{Quantity, Unit};

/// Primary VIF codes (extension bit stripped) per EN 13757-3 table 10.
///
/// Scales follow the standard's formulas, e.g. volume is 10^(nnn-6) m3 so
/// code 0x13 carries 10^-3 m3 per count.
pub const VIF_CODES: &[(u8, Unit, f64, Quantity, &str)] = &[
    // Energy 10^(nnn-3) Wh
    (0x00, Unit::KilowattHour, 1e-6, Quantity::Energy, "Energy"),
    (0x01, Unit::KilowattHour, 1e-5, Quantity::Energy, "Energy"),
    (0x02, Unit::KilowattHour, 1e-4, Quantity::Energy, "Energy"),
    (0x03, Unit::KilowattHour, 1e-3, Quantity::Energy, "Energy"),
    (0x04, Unit::KilowattHour, 1e-2, Quantity::Energy, "Energy"),
    (0x05, Unit::KilowattHour, 1e-1, Quantity::Energy, "Energy"),
    (0x06, Unit::KilowattHour, 1.0, Quantity::Energy, "Energy"),
    (0x07, Unit::KilowattHour, 10.0, Quantity::Energy, "Energy"),
    // Energy 10^nnn J
    (0x08, Unit::Megajoule, 1e-6, Quantity::Energy, "Energy"),
    (0x09, Unit::Megajoule, 1e-5, Quantity::Energy, "Energy"),
    (0x0A, Unit::Megajoule, 1e-4, Quantity::Energy, "Energy"),
    (0x0B, Unit::Megajoule, 1e-3, Quantity::Energy, "Energy"),
    (0x0C, Unit::Megajoule, 1e-2, Quantity::Energy, "Energy"),
    (0x0D, Unit::Megajoule, 1e-1, Quantity::Energy, "Energy"),
    (0x0E, Unit::Megajoule, 1.0, Quantity::Energy, "Energy"),
    (0x0F, Unit::Megajoule, 10.0, Quantity::Energy, "Energy"),
    // Volume 10^(nnn-6) m3
    (0x10, Unit::CubicMeter, 1e-6, Quantity::Volume, "Volume"),
    (0x11, Unit::CubicMeter, 1e-5, Quantity::Volume, "Volume"),
    (0x12, Unit::CubicMeter, 1e-4, Quantity::Volume, "Volume"),
    (0x13, Unit::CubicMeter, 1e-3, Quantity::Volume, "Volume"),
    (0x14, Unit::CubicMeter, 1e-2, Quantity::Volume, "Volume"),
    (0x15, Unit::CubicMeter, 1e-1, Quantity::Volume, "Volume"),
    (0x16, Unit::CubicMeter, 1.0, Quantity::Volume, "Volume"),
    (0x17, Unit::CubicMeter, 10.0, Quantity::Volume, "Volume"),
    // Mass 10^(nnn-3) kg
    (0x18, Unit::Kilogram, 1e-3, Quantity::Mass, "Mass"),
    (0x19, Unit::Kilogram, 1e-2, Quantity::Mass, "Mass"),
    (0x1A, Unit::Kilogram, 1e-1, Quantity::Mass, "Mass"),
    (0x1B, Unit::Kilogram, 1.0, Quantity::Mass, "Mass"),
    (0x1C, Unit::Kilogram, 10.0, Quantity::Mass, "Mass"),
    (0x1D, Unit::Kilogram, 100.0, Quantity::Mass, "Mass"),
    (0x1E, Unit::Kilogram, 1e3, Quantity::Mass, "Mass"),
    (0x1F, Unit::Kilogram, 1e4, Quantity::Mass, "Mass"),
    // On time, unit selected by the low bits
    (0x20, Unit::Second, 1.0, Quantity::Time, "On time"),
    (0x21, Unit::Minute, 1.0, Quantity::Time, "On time"),
    (0x22, Unit::Hour, 1.0, Quantity::Time, "On time"),
    (0x23, Unit::Day, 1.0, Quantity::Time, "On time"),
    // Operating time
    (0x24, Unit::Second, 1.0, Quantity::Time, "Operating time"),
    (0x25, Unit::Minute, 1.0, Quantity::Time, "Operating time"),
    (0x26, Unit::Hour, 1.0, Quantity::Time, "Operating time"),
    (0x27, Unit::Day, 1.0, Quantity::Time, "Operating time"),
    // Power 10^(nnn-3) W
    (0x28, Unit::Watt, 1e-3, Quantity::Power, "Power"),
    (0x29, Unit::Watt, 1e-2, Quantity::Power, "Power"),
    (0x2A, Unit::Watt, 1e-1, Quantity::Power, "Power"),
    (0x2B, Unit::Watt, 1.0, Quantity::Power, "Power"),
    (0x2C, Unit::Watt, 10.0, Quantity::Power, "Power"),
    (0x2D, Unit::Watt, 100.0, Quantity::Power, "Power"),
    (0x2E, Unit::Watt, 1e3, Quantity::Power, "Power"),
    (0x2F, Unit::Watt, 1e4, Quantity::Power, "Power"),
    // Power 10^nnn J/h
    (0x30, Unit::JoulePerHour, 1.0, Quantity::Power, "Power"),
    (0x31, Unit::JoulePerHour, 10.0, Quantity::Power, "Power"),
    (0x32, Unit::JoulePerHour, 100.0, Quantity::Power, "Power"),
    (0x33, Unit::JoulePerHour, 1e3, Quantity::Power, "Power"),
    (0x34, Unit::JoulePerHour, 1e4, Quantity::Power, "Power"),
    (0x35, Unit::JoulePerHour, 1e5, Quantity::Power, "Power"),
    (0x36, Unit::JoulePerHour, 1e6, Quantity::Power, "Power"),
    (0x37, Unit::JoulePerHour, 1e7, Quantity::Power, "Power"),
    // Volume flow 10^(nnn-6) m3/h
    (0x38, Unit::CubicMeterPerHour, 1e-6, Quantity::Flow, "Volume flow"),
    (0x39, Unit::CubicMeterPerHour, 1e-5, Quantity::Flow, "Volume flow"),
    (0x3A, Unit::CubicMeterPerHour, 1e-4, Quantity::Flow, "Volume flow"),
    (0x3B, Unit::CubicMeterPerHour, 1e-3, Quantity::Flow, "Volume flow"),
    (0x3C, Unit::CubicMeterPerHour, 1e-2, Quantity::Flow, "Volume flow"),
    (0x3D, Unit::CubicMeterPerHour, 1e-1, Quantity::Flow, "Volume flow"),
    (0x3E, Unit::CubicMeterPerHour, 1.0, Quantity::Flow, "Volume flow"),
    (0x3F, Unit::CubicMeterPerHour, 10.0, Quantity::Flow, "Volume flow"),
    // Volume flow ext. 10^(nnn-7) m3/min, folded into m3/h
    (0x40, Unit::CubicMeterPerHour, 6e-6, Quantity::Flow, "Volume flow"),
    (0x41, Unit::CubicMeterPerHour, 6e-5, Quantity::Flow, "Volume flow"),
    (0x42, Unit::CubicMeterPerHour, 6e-4, Quantity::Flow, "Volume flow"),
    (0x43, Unit::CubicMeterPerHour, 6e-3, Quantity::Flow, "Volume flow"),
    (0x44, Unit::CubicMeterPerHour, 6e-2, Quantity::Flow, "Volume flow"),
    (0x45, Unit::CubicMeterPerHour, 0.6, Quantity::Flow, "Volume flow"),
    (0x46, Unit::CubicMeterPerHour, 6.0, Quantity::Flow, "Volume flow"),
    (0x47, Unit::CubicMeterPerHour, 60.0, Quantity::Flow, "Volume flow"),
    // Volume flow ext. 10^(nnn-9) m3/s, folded into m3/h
    (0x48, Unit::CubicMeterPerHour, 3.6e-6, Quantity::Flow, "Volume flow"),
    (0x49, Unit::CubicMeterPerHour, 3.6e-5, Quantity::Flow, "Volume flow"),
    (0x4A, Unit::CubicMeterPerHour, 3.6e-4, Quantity::Flow, "Volume flow"),
    (0x4B, Unit::CubicMeterPerHour, 3.6e-3, Quantity::Flow, "Volume flow"),
    (0x4C, Unit::CubicMeterPerHour, 3.6e-2, Quantity::Flow, "Volume flow"),
    (0x4D, Unit::CubicMeterPerHour, 0.36, Quantity::Flow, "Volume flow"),
    (0x4E, Unit::CubicMeterPerHour, 3.6, Quantity::Flow, "Volume flow"),
    (0x4F, Unit::CubicMeterPerHour, 36.0, Quantity::Flow, "Volume flow"),
    // Mass flow 10^(nnn-3) kg/h
    (0x50, Unit::KilogramPerHour, 1e-3, Quantity::MassFlow, "Mass flow"),
    (0x51, Unit::KilogramPerHour, 1e-2, Quantity::MassFlow, "Mass flow"),
    (0x52, Unit::KilogramPerHour, 1e-1, Quantity::MassFlow, "Mass flow"),
    (0x53, Unit::KilogramPerHour, 1.0, Quantity::MassFlow, "Mass flow"),
    (0x54, Unit::KilogramPerHour, 10.0, Quantity::MassFlow, "Mass flow"),
    (0x55, Unit::KilogramPerHour, 100.0, Quantity::MassFlow, "Mass flow"),
    (0x56, Unit::KilogramPerHour, 1e3, Quantity::MassFlow, "Mass flow"),
    (0x57, Unit::KilogramPerHour, 1e4, Quantity::MassFlow, "Mass flow"),
    // Temperatures 10^(nn-3) degrees C (difference in K)
    (0x58, Unit::Celsius, 1e-3, Quantity::Temperature, "Flow temperature"),
    (0x59, Unit::Celsius, 1e-2, Quantity::Temperature, "Flow temperature"),
    (0x5A, Unit::Celsius, 1e-1, Quantity::Temperature, "Flow temperature"),
    (0x5B, Unit::Celsius, 1.0, Quantity::Temperature, "Flow temperature"),
    (0x5C, Unit::Celsius, 1e-3, Quantity::Temperature, "Return temperature"),
    (0x5D, Unit::Celsius, 1e-2, Quantity::Temperature, "Return temperature"),
    (0x5E, Unit::Celsius, 1e-1, Quantity::Temperature, "Return temperature"),
    (0x5F, Unit::Celsius, 1.0, Quantity::Temperature, "Return temperature"),
    (0x60, Unit::Kelvin, 1e-3, Quantity::Temperature, "Temperature difference"),
    (0x61, Unit::Kelvin, 1e-2, Quantity::Temperature, "Temperature difference"),
    (0x62, Unit::Kelvin, 1e-1, Quantity::Temperature, "Temperature difference"),
    (0x63, Unit::Kelvin, 1.0, Quantity::Temperature, "Temperature difference"),
    (0x64, Unit::Celsius, 1e-3, Quantity::Temperature, "External temperature"),
    (0x65, Unit::Celsius, 1e-2, Quantity::Temperature, "External temperature"),
    (0x66, Unit::Celsius, 1e-1, Quantity::Temperature, "External temperature"),
    (0x67, Unit::Celsius, 1.0, Quantity::Temperature, "External temperature"),
    // Pressure 10^(nn-3) bar
    (0x68, Unit::Bar, 1e-3, Quantity::Pressure, "Pressure"),
    (0x69, Unit::Bar, 1e-2, Quantity::Pressure, "Pressure"),
    (0x6A, Unit::Bar, 1e-1, Quantity::Pressure, "Pressure"),
    (0x6B, Unit::Bar, 1.0, Quantity::Pressure, "Pressure"),
    // Time points
    (0x6C, Unit::Date, 1.0, Quantity::PointInTime, "Date"),
    (0x6D, Unit::DateTime, 1.0, Quantity::PointInTime, "Date and time"),
    // Heat cost allocation
    (0x6E, Unit::HcaUnit, 1.0, Quantity::Hca, "H.C.A. units"),
    // Durations
    (0x70, Unit::Second, 1.0, Quantity::Time, "Averaging duration"),
    (0x71, Unit::Minute, 1.0, Quantity::Time, "Averaging duration"),
    (0x72, Unit::Hour, 1.0, Quantity::Time, "Averaging duration"),
    (0x73, Unit::Day, 1.0, Quantity::Time, "Averaging duration"),
    (0x74, Unit::Second, 1.0, Quantity::Time, "Actuality duration"),
    (0x75, Unit::Minute, 1.0, Quantity::Time, "Actuality duration"),
    (0x76, Unit::Hour, 1.0, Quantity::Time, "Actuality duration"),
    (0x77, Unit::Day, 1.0, Quantity::Time, "Actuality duration"),
    // Identification
    (0x78, Unit::Counter, 1.0, Quantity::Dimensionless, "Fabrication number"),
    (0x79, Unit::Counter, 1.0, Quantity::Dimensionless, "Enhanced identification"),
    (0x7A, Unit::Counter, 1.0, Quantity::Dimensionless, "Bus address"),
    (0x7F, Unit::Counter, 1.0, Quantity::Dimensionless, "Manufacturer specific"),
];

/// VIFE codes behind the 0xFD escape (EN 13757-3 table 12 subset).
///
/// The voltage (0x40-0x4F) and current (0x50-0x5F) ranges are computed in
/// [`lookup_vife_fd`] from their exponent formulas instead of being listed.
pub const VIFE_FD_CODES: &[(u8, Unit, f64, Quantity, &str)] = &[
    (0x08, Unit::Counter, 1.0, Quantity::Dimensionless, "Access number"),
    (0x09, Unit::Counter, 1.0, Quantity::Dimensionless, "Medium"),
    (0x0A, Unit::Counter, 1.0, Quantity::Dimensionless, "Manufacturer"),
    (0x0B, Unit::Counter, 1.0, Quantity::Dimensionless, "Parameter set identification"),
    (0x0C, Unit::Counter, 1.0, Quantity::Dimensionless, "Model / version"),
    (0x0D, Unit::Counter, 1.0, Quantity::Dimensionless, "Hardware version"),
    (0x0E, Unit::Counter, 1.0, Quantity::Dimensionless, "Firmware version"),
    (0x0F, Unit::Counter, 1.0, Quantity::Dimensionless, "Software version"),
    (0x10, Unit::Counter, 1.0, Quantity::Dimensionless, "Customer location"),
    (0x11, Unit::Counter, 1.0, Quantity::Dimensionless, "Customer"),
    (0x17, Unit::Counter, 1.0, Quantity::Dimensionless, "Error flags"),
    (0x18, Unit::Counter, 1.0, Quantity::Dimensionless, "Error mask"),
    (0x1A, Unit::Counter, 1.0, Quantity::Dimensionless, "Digital output"),
    (0x1B, Unit::Counter, 1.0, Quantity::Dimensionless, "Digital input"),
    (0x20, Unit::Counter, 1.0, Quantity::Dimensionless, "First storage number"),
    (0x21, Unit::Counter, 1.0, Quantity::Dimensionless, "Last storage number"),
    (0x60, Unit::Counter, 1.0, Quantity::Dimensionless, "Reset counter"),
    (0x61, Unit::Counter, 1.0, Quantity::Dimensionless, "Cumulation counter"),
    (0x70, Unit::DateTime, 1.0, Quantity::PointInTime, "Date and time of battery change"),
    (0x74, Unit::Day, 1.0, Quantity::Time, "Remaining battery life time"),
];

/// VIFE codes behind the 0xFB escape (EN 13757-3 table 14 subset).
pub const VIFE_FB_CODES: &[(u8, Unit, f64, Quantity, &str)] = &[
    (0x00, Unit::KilowattHour, 1e2, Quantity::Energy, "Energy"),
    (0x01, Unit::KilowattHour, 1e3, Quantity::Energy, "Energy"),
    (0x08, Unit::Gigajoule, 1e-1, Quantity::Energy, "Energy"),
    (0x09, Unit::Gigajoule, 1.0, Quantity::Energy, "Energy"),
    (0x10, Unit::CubicMeter, 100.0, Quantity::Volume, "Volume"),
    (0x11, Unit::CubicMeter, 1e3, Quantity::Volume, "Volume"),
    (0x21, Unit::CubicFeet, 1e-1, Quantity::Volume, "Volume"),
];

fn info_from(entry: &(u8, Unit, f64, Quantity, &'static str), vif: u16) -> VifInfo {
    VifInfo {
        vif,
        unit: entry.1,
        scale: entry.2,
        quantity: entry.3,
        description: entry.4,
    }
}

/// Looks up a primary VIF code (extension bit already stripped).
pub fn lookup_primary_vif(code: u8) -> Option<VifInfo> {
    VIF_CODES
        .iter()
        .find(|entry| entry.0 == code)
        .map(|entry| info_from(entry, u16::from(code)))
}

/// Looks up a VIFE code behind the 0xFD escape.
pub fn lookup_vife_fd(code: u8) -> Option<VifInfo> {
    let code = code & 0x7F;
    if (0x40..=0x4F).contains(&code) {
        // Voltage 10^(nnnn-9) V
        let scale = 10f64.powi(i32::from(code & 0x0F) - 9);
        return Some(VifInfo {
            vif: 0x100 + u16::from(code),
            unit: Unit::Volt,
            scale,
            quantity: Quantity::Voltage,
            description: "Voltage",
        });
    }
    if (0x50..=0x5F).contains(&code) {
        // Current 10^(nnnn-12) A
        let scale = 10f64.powi(i32::from(code & 0x0F) - 12);
        return Some(VifInfo {
            vif: 0x100 + u16::from(code),
            unit: Unit::Ampere,
            scale,
            quantity: Quantity::Amperage,
            description: "Current",
        });
    }
    VIFE_FD_CODES
        .iter()
        .find(|entry| entry.0 == code)
        .map(|entry| info_from(entry, 0x100 + u16::from(code)))
}

/// Looks up a VIFE code behind the 0xFB escape.
pub fn lookup_vife_fb(code: u8) -> Option<VifInfo> {
    let code = code & 0x7F;
    VIFE_FB_CODES
        .iter()
        .find(|entry| entry.0 == code)
        .map(|entry| info_from(entry, 0x200 + u16::from(code)))
}
