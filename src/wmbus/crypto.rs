//! # wM-Bus Payload Decryption
//!
//! AES handling for the two encryption layers a meter telegram can carry:
//!
//! - **TPL security modes 5 and 7** (EN 13757-3 / OMS 7.2.4): AES-128-CBC
//!   over the leading blocks of the application payload. Mode 5 derives the
//!   IV from the link address block and the access number; mode 7 uses an
//!   all-zero IV. A correct key yields a plaintext starting with the
//!   `2F 2F` verification pair.
//! - **ELL encryption** (EN 13757-4 extended link layer): AES-128-CTR with
//!   an IV built from the address block plus the ELL's communication
//!   control and session number. The decrypted payload carries its own
//!   CRC-16 in the first two bytes.
//!
//! Both IV constructions are deterministic functions of header fields, so
//! replaying a captured telegram with the right key reproduces the decode
//! bit for bit. Key material is zeroized on drop, and a failed decryption
//! zeroizes the candidate plaintext before returning.

use aes::cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes128;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::constants::{AES_BLOCK_LEN, IDLE_FILLER, TPL_CFG_MASK_MODE};
use crate::util::hex::decode_hex;
use crate::wmbus::frame::{crc16, WmBusFrame};

/// Decryption failures. Any of these drops the telegram; none of them
/// leaves partial plaintext behind.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CryptoError {
    #[error("Invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("Invalid key hex: {0}")]
    InvalidKeyHex(String),

    #[error("Ciphertext length {actual} is not a multiple of {block_size}")]
    InvalidDataLength { block_size: usize, actual: usize },

    #[error("Unsupported security mode {mode}")]
    UnsupportedMode { mode: u8 },

    #[error("Telegram from {device} is encrypted but no key is configured")]
    MissingKey { device: String },

    #[error("Decryption failed: {reason}")]
    DecryptionFailed { reason: String },
}

/// Encryption scheme applied to a telegram's payload, as signaled by the
/// TPL configuration word or by an ELL control information field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionMode {
    /// Payload is plaintext.
    None,
    /// TPL security mode 5: AES-128-CBC, IV from address block + access number.
    AesCbcIv,
    /// TPL security mode 7: AES-128-CBC with an all-zero IV.
    AesCbcNoIv,
    /// ELL encryption: AES-128-CTR, IV from address block + CC + SN.
    AesCtr,
}

impl EncryptionMode {
    /// Reads the security mode bits out of a TPL configuration word.
    pub fn from_tpl_config(config: u16) -> Result<EncryptionMode, CryptoError> {
        let mode = ((config & TPL_CFG_MASK_MODE) >> 8) as u8;
        match mode {
            0 => Ok(EncryptionMode::None),
            5 => Ok(EncryptionMode::AesCbcIv),
            7 => Ok(EncryptionMode::AesCbcNoIv),
            other => Err(CryptoError::UnsupportedMode { mode: other }),
        }
    }

    pub fn is_encrypted(&self) -> bool {
        !matches!(self, EncryptionMode::None)
    }
}

/// A 128-bit AES key.
///
/// The raw bytes are wiped when the key is dropped and never appear in
/// `Debug` output, so keys can be threaded through logging-heavy code paths
/// without leaking.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct AesKey {
    key: [u8; 16],
}

impl AesKey {
    /// Builds a key from exactly 16 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<AesKey, CryptoError> {
        if bytes.len() != 16 {
            return Err(CryptoError::InvalidKeyLength {
                expected: 16,
                actual: bytes.len(),
            });
        }
        let mut key = [0u8; 16];
        key.copy_from_slice(bytes);
        Ok(AesKey { key })
    }

    /// Builds a key from a 32-digit hex string, the form keys appear in
    /// configuration files.
    pub fn from_hex(hex_str: &str) -> Result<AesKey, CryptoError> {
        let bytes = decode_hex(hex_str).map_err(|e| CryptoError::InvalidKeyHex(e.to_string()))?;
        AesKey::from_bytes(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.key
    }
}

impl std::fmt::Debug for AesKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AesKey(****)")
    }
}

/// Builds the mode 5 CBC IV: manufacturer (2 bytes LE), address field
/// (device id LE, version, type), then the access number repeated eight
/// times.
pub fn mode5_iv(frame: &WmBusFrame, access_number: u8) -> [u8; 16] {
    let mut iv = [0u8; 16];
    iv[0..2].copy_from_slice(&frame.manufacturer.to_le_bytes());
    iv[2..8].copy_from_slice(&frame.address_field());
    for byte in iv.iter_mut().skip(8) {
        *byte = access_number;
    }
    iv
}

/// Builds the ELL CTR IV: manufacturer (2 bytes LE), address field (6
/// bytes), communication control, session number (4 bytes LE), then the
/// frame number and block counter both starting at zero.
pub fn ell_iv(frame: &WmBusFrame, communication_control: u8, session_number: u32) -> [u8; 16] {
    let mut iv = [0u8; 16];
    iv[0..2].copy_from_slice(&frame.manufacturer.to_le_bytes());
    iv[2..8].copy_from_slice(&frame.address_field());
    iv[8] = communication_control;
    iv[9..13].copy_from_slice(&session_number.to_le_bytes());
    iv
}

fn cipher_for(key: &AesKey) -> Aes128 {
    Aes128::new(GenericArray::from_slice(key.as_bytes()))
}

/// AES-128-CBC decryption without padding removal. wM-Bus pads with `2F`
/// idle fillers which the record parser skips, so the plaintext is returned
/// as-is.
pub fn decrypt_aes_cbc(
    key: &AesKey,
    ciphertext: &[u8],
    iv: &[u8; 16],
) -> Result<Vec<u8>, CryptoError> {
    if ciphertext.len() % AES_BLOCK_LEN != 0 {
        return Err(CryptoError::InvalidDataLength {
            block_size: AES_BLOCK_LEN,
            actual: ciphertext.len(),
        });
    }

    let cipher = cipher_for(key);
    let mut plaintext = Vec::with_capacity(ciphertext.len());
    let mut chain = *iv;

    for chunk in ciphertext.chunks_exact(AES_BLOCK_LEN) {
        let mut block = GenericArray::clone_from_slice(chunk);
        cipher.decrypt_block(&mut block);
        for (out, prev) in block.iter_mut().zip(chain.iter()) {
            *out ^= prev;
        }
        plaintext.extend_from_slice(&block);
        chain.copy_from_slice(chunk);
    }

    Ok(plaintext)
}

/// AES-128-CBC encryption of block-aligned data. Pad with
/// [`pad_with_filler`] first; used to build replay fixtures for testing.
pub fn encrypt_aes_cbc(
    key: &AesKey,
    plaintext: &[u8],
    iv: &[u8; 16],
) -> Result<Vec<u8>, CryptoError> {
    if plaintext.len() % AES_BLOCK_LEN != 0 {
        return Err(CryptoError::InvalidDataLength {
            block_size: AES_BLOCK_LEN,
            actual: plaintext.len(),
        });
    }

    let cipher = cipher_for(key);
    let mut ciphertext = Vec::with_capacity(plaintext.len());
    let mut chain = *iv;

    for chunk in plaintext.chunks_exact(AES_BLOCK_LEN) {
        let mut block = GenericArray::clone_from_slice(chunk);
        for (b, prev) in block.iter_mut().zip(chain.iter()) {
            *b ^= prev;
        }
        cipher.encrypt_block(&mut block);
        ciphertext.extend_from_slice(&block);
        chain.copy_from_slice(&block);
    }

    Ok(ciphertext)
}

/// AES-128-CTR keystream application, its own inverse. The block counter is
/// the final IV byte, matching the ELL layout where FN and BC occupy the
/// last three bytes.
pub fn apply_aes_ctr(key: &AesKey, data: &[u8], iv: &[u8; 16]) -> Vec<u8> {
    let cipher = cipher_for(key);
    let mut output = Vec::with_capacity(data.len());
    let mut counter = *iv;

    for chunk in data.chunks(AES_BLOCK_LEN) {
        let mut keystream = GenericArray::clone_from_slice(&counter);
        cipher.encrypt_block(&mut keystream);
        for (i, &byte) in chunk.iter().enumerate() {
            output.push(byte ^ keystream[i]);
        }
        counter[15] = counter[15].wrapping_add(1);
    }

    output
}

/// Appends `2F` idle fillers until the buffer is block-aligned.
pub fn pad_with_filler(data: &mut Vec<u8>) {
    while data.len() % AES_BLOCK_LEN != 0 {
        data.push(IDLE_FILLER);
    }
}

/// Decrypts a mode 5/7 TPL payload and checks the `2F 2F` verification
/// pair. A wrong key fails here and the candidate plaintext is wiped, so
/// callers never observe garbage records.
pub fn decrypt_tpl_payload(
    key: &AesKey,
    ciphertext: &[u8],
    iv: &[u8; 16],
) -> Result<Vec<u8>, CryptoError> {
    let mut plaintext = decrypt_aes_cbc(key, ciphertext, iv)?;

    if plaintext.len() < 2 || plaintext[0] != IDLE_FILLER || plaintext[1] != IDLE_FILLER {
        plaintext.zeroize();
        return Err(CryptoError::DecryptionFailed {
            reason: "verification bytes 2F 2F not found, wrong key?".into(),
        });
    }

    Ok(plaintext)
}

/// Decrypts an ELL payload and checks the leading payload CRC. On success
/// the two CRC bytes are stripped and the remaining application data is
/// returned.
pub fn decrypt_ell_payload(
    key: &AesKey,
    ciphertext: &[u8],
    iv: &[u8; 16],
) -> Result<Vec<u8>, CryptoError> {
    let mut plaintext = apply_aes_ctr(key, ciphertext, iv);

    if plaintext.len() < 2 {
        plaintext.zeroize();
        return Err(CryptoError::DecryptionFailed {
            reason: "ELL payload too short for its CRC".into(),
        });
    }

    let expected = u16::from_le_bytes([plaintext[0], plaintext[1]]);
    let calculated = crc16(&plaintext[2..]);
    if expected != calculated {
        plaintext.zeroize();
        return Err(CryptoError::DecryptionFailed {
            reason: format!(
                "ELL payload CRC mismatch ({expected:04X} != {calculated:04X}), wrong key?"
            ),
        });
    }

    let content = plaintext[2..].to_vec();
    Ok(content)
}
