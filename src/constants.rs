//! wM-Bus Protocol Constants
//!
//! Bit masks and field codes used across the decoder, based on the
//! EN 13757-3 (application layer) and EN 13757-4 (wireless link layer)
//! standards.

/// DIF mask for the data field (length/encoding code)
pub const DIF_MASK_DATA: u8 = 0x0F;

/// DIF mask for the function field (instantaneous, max, min, error)
pub const DIF_MASK_FUNCTION: u8 = 0x30;

/// DIF bit carrying the least significant storage number bit
pub const DIF_MASK_STORAGE_LSB: u8 = 0x40;

/// DIFE mask for storage number bits
pub const DIFE_MASK_STORAGE: u8 = 0x0F;

/// DIFE mask for tariff bits
pub const DIFE_MASK_TARIFF: u8 = 0x30;

/// DIFE mask for the subunit (device) bit
pub const DIFE_MASK_SUBUNIT: u8 = 0x40;

/// Extension bit shared by DIF, DIFE, VIF and VIFE bytes
pub const EXTENSION_BIT: u8 = 0x80;

/// VIF value with the extension bit stripped
pub const VIF_MASK_VALUE: u8 = 0x7F;

/// Idle filler byte; also the mode 5/7 decryption verification pair
pub const IDLE_FILLER: u8 = 0x2F;

/// DIF announcing a manufacturer specific data block
pub const DIF_MANUFACTURER_SPECIFIC: u8 = 0x0F;

/// DIF announcing that more records follow in a subsequent telegram
pub const DIF_MORE_RECORDS_FOLLOW: u8 = 0x1F;

/// Hard cap on DIFE/VIFE chain length (10 extensions per EN 13757-3)
pub const MAX_EXTENSION_BYTES: usize = 10;

/// LVAR data field code (variable length, length byte follows the VIB)
pub const DIF_LVAR: u8 = 0x0D;

// ----------------------------------------------------------------------------
// Link layer (EN 13757-4)
// ----------------------------------------------------------------------------

/// C-field of a meter-originated SND-NR frame
pub const C_FIELD_SND_NR: u8 = 0x44;

/// C-field of a meter-originated SND-IR (installation request) frame
pub const C_FIELD_SND_IR: u8 = 0x46;

/// C-field of an ACC-NR frame (no data, keep-alive)
pub const C_FIELD_ACC_NR: u8 = 0x47;

/// Link-layer header length: L, C, M(2), ID(4), version, type
pub const LINK_HEADER_LEN: usize = 10;

/// CRC-16 polynomial for EN 13757-4 (both frame formats)
pub const CRC_POLY: u16 = 0x3D65;

// ----------------------------------------------------------------------------
// Transport layer CI codes and TPL header layout
// ----------------------------------------------------------------------------

/// CI: variable data records, no TPL header
pub const CI_RESP_NO_HEADER: u8 = 0x78;

/// CI: variable data records, short TPL header (ACC, STATUS, CONFIG)
pub const CI_RESP_SHORT_HEADER: u8 = 0x7A;

/// CI: variable data records, long TPL header (address block + ACC/STATUS/CONFIG)
pub const CI_RESP_LONG_HEADER: u8 = 0x72;

/// CI: extended link layer with session number (ELL III, encrypted)
pub const CI_ELL_SHORT: u8 = 0x8D;

/// TPL config word mask for the security mode bits
pub const TPL_CFG_MASK_MODE: u16 = 0x1F00;

/// TPL config word mask for the encrypted 16-byte block count (modes 5/7)
pub const TPL_CFG_MASK_BLOCKS: u16 = 0x00F0;

/// AES block size used by all supported security modes
pub const AES_BLOCK_LEN: usize = 16;
