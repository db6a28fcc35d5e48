//! Value Information Block resolution.
//!
//! A VIB is the VIF byte plus any VIFE extension bytes captured by the
//! record parser. Resolution turns the chain into a single [`VifInfo`]:
//! the 0xFD/0xFB escapes select the extension tables, and trailing
//! multiplicative correction VIFEs fold into the scale factor.

use log::debug;

use crate::constants::VIF_MASK_VALUE;
use crate::payload::record::RecordError;
use crate::payload::vif_maps::{lookup_primary_vif, lookup_vife_fb, lookup_vife_fd};
use crate::units::{Quantity, Unit};

/// Resolved value information: what the raw number means and how to scale
/// it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VifInfo {
    /// Table coordinate: 0x000-0x0FF primary, 0x1nn for FD, 0x2nn for FB.
    pub vif: u16,
    pub unit: Unit,
    pub scale: f64,
    pub quantity: Quantity,
    pub description: &'static str,
}

impl VifInfo {
    /// Info used for records carrying a plain-text VIF (code 0x7C).
    pub fn custom() -> Self {
        VifInfo {
            vif: 0x7C,
            unit: Unit::Counter,
            scale: 1.0,
            quantity: Quantity::Dimensionless,
            description: "Plain-text unit",
        }
    }
}

/// Resolves a captured VIF byte and its VIFE chain into a [`VifInfo`].
///
/// Escape VIFs consume the first extension byte as the table code. Any
/// remaining extension bytes are treated as combinable VIFEs: the
/// multiplicative correction range 0x70-0x77 adjusts the scale, everything
/// else is logged and skipped so one exotic extension cannot sink an
/// otherwise good record.
pub fn resolve_vib(vif: u8, vifes: &[u8]) -> Result<VifInfo, RecordError> {
    let (mut info, combinables) = match vif {
        0xFD => {
            let code = *vifes.first().ok_or(RecordError::MissingVife(vif))?;
            let info = lookup_vife_fd(code).ok_or(RecordError::UnknownVife(code))?;
            (info, &vifes[1..])
        }
        0xFB => {
            let code = *vifes.first().ok_or(RecordError::MissingVife(vif))?;
            let info = lookup_vife_fb(code).ok_or(RecordError::UnknownVife(code))?;
            (info, &vifes[1..])
        }
        _ => {
            let code = vif & VIF_MASK_VALUE;
            let info = lookup_primary_vif(code).ok_or(RecordError::UnknownVif(vif))?;
            (info, vifes)
        }
    };

    for &vife in combinables {
        let code = vife & VIF_MASK_VALUE;
        if (0x70..=0x77).contains(&code) {
            // Multiplicative correction factor 10^(nnn-6)
            info.scale *= 10f64.powi(i32::from(code & 0x07) - 6);
        } else {
            debug!("Ignoring combinable VIFE 0x{vife:02X}");
        }
    }

    Ok(info)
}
